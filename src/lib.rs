//! 互动小说场景 XML 编辑器库
//!
//! 提供XML文档包装（加载、增删节点、修改值与属性、保存）、
//! 影子树构建与回写，以及编辑器状态控制。遵循MVVM架构模式，
//! 图形界面位于 `gui` 特性下的可执行程序中

pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use model::data_core::{AppError, EditorState};
pub use model::shadow_tree::{
    build_shadow_tree, reconcile, DisplayRow, DisplayTree, FlatRow, NodeKind, ReconcileReport,
    RowContent, RowId, TreeEditError,
};
pub use model::xml_doc::{DocError, NodeId, XmlDocument, XmlElement, XmlEditor};
pub use utils::config::EditorConfig;
