//! VM桥接层：连接Slint UI与EditorState数据模型
//!
//! 注意：回调绑定在main.rs中实现，因为依赖于Slint生成的类型
//! 这里只提供公共常量和错误到提示文本的映射

use crate::model::data_core::AppError;
use crate::model::xml_doc::DocError;
use crate::model::shadow_tree::TreeEditError;

// === 常量定义（消除魔法值） ===
pub const STATUS_READY: &str = "就绪";
pub const STATUS_LOADING: &str = "正在加载文件...";
pub const STATUS_LOADED: &str = "文件加载完成";
pub const STATUS_CREATED: &str = "已新建文档";
pub const STATUS_SAVED: &str = "保存成功";
pub const STATUS_NODE_ADDED: &str = "已添加节点";
pub const STATUS_NODE_REMOVED: &str = "已删除节点";
pub const STATUS_NO_FILE_SELECTED: &str = "未选择文件";
pub const STATUS_ERROR_PREFIX: &str = "错误: ";

pub const DIALOG_TITLE_ERROR: &str = "错误";
pub const DIALOG_TITLE_WARNING: &str = "提示";

/// 错误对应的对话框标题
pub fn dialog_title(err: &AppError) -> &'static str {
    match err {
        AppError::NoSelection | AppError::NotAnElement | AppError::InvalidInput(_) => {
            DIALOG_TITLE_WARNING
        }
        AppError::Doc(DocError::InvalidArgument(_)) => DIALOG_TITLE_WARNING,
        _ => DIALOG_TITLE_ERROR,
    }
}

/// 面向用户的提示文本
pub fn user_message(err: &AppError) -> String {
    match err {
        AppError::NoSelection => "请先在树中选择一个元素节点".to_string(),
        AppError::NotAnElement => "所选行是属性或文本，请选择元素节点".to_string(),
        AppError::CannotRemoveRoot => "根元素不能删除".to_string(),
        AppError::Doc(DocError::NotLoaded) => "请先新建或打开一个文档".to_string(),
        AppError::Doc(DocError::Load { path, .. }) => {
            format!("无法打开文件 {}，原文档保持不变", path.display())
        }
        AppError::Tree(TreeEditError::InvalidName(name)) => format!("名称无效: {}", name),
        other => format!("{}{}", STATUS_ERROR_PREFIX, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_errors_are_warnings() {
        assert_eq!(dialog_title(&AppError::NoSelection), DIALOG_TITLE_WARNING);
        assert_eq!(dialog_title(&AppError::NotAnElement), DIALOG_TITLE_WARNING);
        assert_eq!(dialog_title(&AppError::CannotRemoveRoot), DIALOG_TITLE_ERROR);
        assert_eq!(
            dialog_title(&AppError::Doc(DocError::InvalidArgument("x".into()))),
            DIALOG_TITLE_WARNING
        );
    }

    #[test]
    fn test_user_message() {
        assert_eq!(user_message(&AppError::CannotRemoveRoot), "根元素不能删除");
        let msg = user_message(&AppError::State("没有可保存的文档".into()));
        assert!(msg.starts_with(STATUS_ERROR_PREFIX));
        assert!(msg.contains("没有可保存的文档"));
    }
}
