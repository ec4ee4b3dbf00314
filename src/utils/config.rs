//! 编辑器配置：JSON 文件，所有字段都有默认值

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::data_core::AppError;
use crate::utils::fs::read_json_file;
use crate::utils::input::is_valid_xml_name;

/// GUI 启动时从工作目录读取的配置文件名
pub const CONFIG_FILE_NAME: &str = "novel_editor.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// 新建文档时的根元素名称
    pub default_root_name: String,
    /// 新建文档使用的模板文件；设置后"新建"即加载该模板
    pub template_path: Option<PathBuf>,
    /// 保存时的缩进空格数
    pub indent: usize,
    /// 日志级别：trace/debug/info/warn/error
    pub log_level: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_root_name: "novel".to_string(),
            template_path: None,
            indent: 2,
            log_level: "info".to_string(),
        }
    }
}

impl EditorConfig {
    /// 文件不存在时返回默认配置；文件存在但内容错误时报错
    pub fn load_or_default(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            tracing::info!("未找到配置文件 {}，使用默认配置", path.display());
            return Ok(Self::default());
        }
        let config: Self = read_json_file(path)?;
        config.validate()?;
        tracing::info!("已加载配置文件 {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !is_valid_xml_name(&self.default_root_name) {
            return Err(AppError::Config(format!(
                "default_root_name 不是合法的XML名称: {:?}",
                self.default_root_name
            )));
        }
        self.max_level()?;
        Ok(())
    }

    pub fn max_level(&self) -> Result<tracing::Level, AppError> {
        tracing::Level::from_str(self.log_level.trim())
            .map_err(|_| AppError::Config(format!("未知的日志级别: {:?}", self.log_level)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = EditorConfig::load_or_default(Path::new("/nonexistent/novel_editor.json"))
            .expect("缺少配置文件不应报错");
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.max_level().unwrap(), tracing::Level::INFO);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"indent": 4, "template_path": "Base.xml"}}"#).unwrap();

        let config = EditorConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.indent, 4);
        assert_eq!(config.template_path, Some(PathBuf::from("Base.xml")));
        assert_eq!(config.default_root_name, "novel");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ indent: ").unwrap();
        assert!(matches!(
            EditorConfig::load_or_default(file.path()),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_root_name": "two words"}}"#).unwrap();
        assert!(matches!(
            EditorConfig::load_or_default(file.path()),
            Err(AppError::Config(_))
        ));

        let config = EditorConfig {
            log_level: "loud".to_string(),
            ..EditorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
