//! EditorState：编辑器核心状态，把用户意图翻译为文档与影子树操作

use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;

use crate::model::shadow_tree::{
    build_shadow_tree, reconcile, DisplayTree, FlatRow, ReconcileReport, RowId, TreeEditError,
};
use crate::model::xml_doc::{DocError, NodeId, XmlEditor};
use crate::utils::config::EditorConfig;
use crate::utils::input::parse_attribute_input;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON解析失败: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Doc(#[from] DocError),
    #[error(transparent)]
    Tree(#[from] TreeEditError),
    #[error("配置错误: {0}")]
    Config(String),
    #[error("状态错误: {0}")]
    State(String),
    #[error("输入无效: {0}")]
    InvalidInput(String),
    #[error("未选择节点")]
    NoSelection,
    #[error("所选行不是元素节点")]
    NotAnElement,
    #[error("不能删除根节点")]
    CannotRemoveRoot,
}

/// 单一所有者：文档、显示树与路径只由这里修改
#[derive(Debug, Default)]
pub struct EditorState {
    pub config: EditorConfig,
    /// 当前文档的规范保存路径（"另存为"之后随之更新）
    pub source_path: Option<PathBuf>,
    editor: XmlEditor,
    tree: DisplayTree,
    selected: Option<RowId>,
    dirty: bool,
}

impl EditorState {
    pub fn new(config: EditorConfig) -> Self {
        let editor = XmlEditor::with_indent(config.indent);
        Self {
            config,
            editor,
            ..Self::default()
        }
    }

    pub fn editor(&self) -> &XmlEditor {
        &self.editor
    }

    pub fn tree(&self) -> &DisplayTree {
        &self.tree
    }

    pub fn selected(&self) -> Option<RowId> {
        self.selected
    }

    /// 是否有尚未保存的修改
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn visible_rows(&self) -> Vec<FlatRow> {
        self.tree.visible_rows()
    }

    /// 新建文档：配置了模板则加载模板，否则创建只有根元素的空文档
    pub fn new_document(&mut self) -> Result<(), AppError> {
        match self.config.template_path.clone() {
            Some(template) => {
                self.editor.open_file(&template)?;
                tracing::info!("已从模板新建文档: {}", template.display());
            }
            None => {
                self.editor.create_new(&self.config.default_root_name)?;
                tracing::info!("已新建文档，根元素 <{}>", self.config.default_root_name);
            }
        }
        // 模板路径不作为保存位置
        self.source_path = None;
        self.dirty = false;
        self.tree = build_shadow_tree(&self.editor);
        self.selected = self.tree.root().map(|r| r.id);
        Ok(())
    }

    /// 加载XML文件并构建影子树；失败时文档与显示树都保持原状
    pub fn load_file(&mut self, p: &Path) -> Result<(), AppError> {
        let start = Instant::now();
        self.editor.open_file(p)?;
        self.tree = build_shadow_tree(&self.editor);
        self.source_path = Some(p.to_path_buf()); // 设置规范保存路径
        self.selected = None;
        self.dirty = false;
        tracing::info!(
            "文件加载成功: {}，{} 个元素，{} 行，耗时: {:.1}ms",
            p.display(),
            self.editor.node_count(),
            self.tree.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// 回写显示树后保存到规范路径
    pub fn save(&mut self) -> Result<ReconcileReport, AppError> {
        let path = self
            .source_path
            .clone()
            .ok_or_else(|| AppError::State("尚未指定保存路径，请使用另存为".into()))?;
        self.save_to(&path)
    }

    /// 回写显示树后保存到新路径，并把它设为规范路径
    pub fn save_as(&mut self, p: &Path) -> Result<ReconcileReport, AppError> {
        let report = self.save_to(p)?;
        self.source_path = Some(p.to_path_buf());
        Ok(report)
    }

    fn save_to(&mut self, p: &Path) -> Result<ReconcileReport, AppError> {
        if !self.editor.is_loaded() {
            return Err(AppError::State("没有可保存的文档".into()));
        }
        let start = Instant::now();
        let report = self.apply_display_edits();
        self.editor.save_file_as(p)?;
        self.dirty = false;
        tracing::info!(
            "文件保存成功: {}，回写 {} 个元素，耗时: {:.1}ms",
            p.display(),
            report.elements_visited,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(report)
    }

    fn apply_display_edits(&mut self) -> ReconcileReport {
        reconcile(&self.tree, &mut self.editor)
    }

    /// 重建显示树，保留展开状态
    fn rebuild_tree(&mut self) {
        let expanded = self.tree.expanded_nodes();
        self.tree = build_shadow_tree(&self.editor);
        self.tree.restore_expansion(&expanded);
    }

    fn select_node(&mut self, node: NodeId) -> Option<RowId> {
        let row = self.tree.find_row_for_node(node).map(|r| r.id);
        if let Some(id) = row {
            self.tree.expand_to(id);
        }
        self.selected = row;
        row
    }

    fn selected_element_node(&self) -> Result<NodeId, AppError> {
        let id = self.selected.ok_or(AppError::NoSelection)?;
        let row = self.tree.row(id).ok_or(AppError::NoSelection)?;
        row.node().ok_or(AppError::NotAnElement)
    }

    pub fn select(&mut self, row: RowId) -> Result<(), AppError> {
        if self.tree.row(row).is_none() {
            return Err(TreeEditError::RowNotFound(row).into());
        }
        self.selected = Some(row);
        Ok(())
    }

    pub fn toggle_expanded(&mut self, row: RowId) -> Result<bool, AppError> {
        Ok(self.tree.toggle_expanded(row)?)
    }

    /// 在所选元素下追加子元素；attribute_input 为 "name=value"，
    /// 格式不正确时忽略属性但仍添加节点。返回新节点的显示行
    pub fn add_node(&mut self, name: &str, attribute_input: &str) -> Result<RowId, AppError> {
        let parent = self.selected_element_node()?;
        // 先回写已有的显示编辑，避免重建时丢失
        self.apply_display_edits();
        let child = self.editor.add_child_node(parent, name.trim())?;

        if !attribute_input.trim().is_empty() {
            match parse_attribute_input(attribute_input) {
                Some((key, value)) => self.editor.modify_node_attribute(child, &key, &value),
                None => tracing::warn!("忽略格式错误的属性输入: {:?}", attribute_input),
            }
        }

        self.dirty = true;
        self.rebuild_tree();
        tracing::info!("已添加节点 <{}>", name.trim());
        self.select_node(child)
            .ok_or_else(|| AppError::State("新节点未出现在显示树中".into()))
    }

    /// 删除所选元素及其子树，选中其父元素。返回父元素的显示行
    pub fn remove_selected_node(&mut self) -> Result<RowId, AppError> {
        let node = self.selected_element_node()?;
        let parent = self.editor.parent_of(node).ok_or(AppError::CannotRemoveRoot)?;
        self.apply_display_edits();
        let name = self
            .editor
            .element(node)
            .map(|el| el.name.clone())
            .unwrap_or_default();
        self.editor.remove_child_node(parent, node)?;

        self.dirty = true;
        self.rebuild_tree();
        tracing::info!("已删除节点 <{}>", name);
        self.select_node(parent)
            .ok_or_else(|| AppError::State("父节点未出现在显示树中".into()))
    }

    /// 修改属性行（保存时回写）
    pub fn edit_attribute(&mut self, row: RowId, name: &str, value: &str) -> Result<(), AppError> {
        self.tree.set_attribute_row(row, name, value)?;
        self.dirty = true;
        Ok(())
    }

    /// 设置元素文本；row 可以是元素行或文本行
    pub fn edit_text(&mut self, row: RowId, text: &str) -> Result<Option<RowId>, AppError> {
        let id = self.tree.set_text_row(row, text)?;
        self.dirty = true;
        Ok(id)
    }

    /// 为元素行添加属性，输入格式 "name=value"
    pub fn add_attribute(&mut self, element_row: RowId, input: &str) -> Result<RowId, AppError> {
        let (name, value) = parse_attribute_input(input)
            .ok_or_else(|| AppError::InvalidInput(format!("属性格式应为 name=value: {:?}", input)))?;
        let id = self.tree.add_attribute_row(element_row, &name, &value)?;
        self.tree.expand_to(id);
        self.dirty = true;
        Ok(id)
    }

    /// 删除属性行或文本行（保存时回写）
    pub fn remove_row(&mut self, row: RowId) -> Result<(), AppError> {
        let parent = self.tree.parent_row(row).map(|p| p.id);
        self.tree.remove_row(row)?;
        if self.selected == Some(row) {
            self.selected = parent;
        }
        self.dirty = true;
        Ok(())
    }
}
