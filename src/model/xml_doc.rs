//! XmlEditor：持有唯一的内存 XML 文档，提供节点查询/增删/修改与整体读写

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::model::xml_codec::{write_document, CodecError};
use crate::utils::fs::{read_xml_file, write_xml_file};
use crate::utils::input::is_valid_xml_name;

new_key_type! {
    /// 元素句柄。元素被删除后旧句柄失效（视为"空节点"）
    pub struct NodeId;
}

/// 文档代号。NodeId 只在同一个 SlotMap 内唯一，不同文档的句柄可能相同，
/// 持有句柄的一方需同时记录代号以识别它属于哪份文档
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Error, Debug)]
pub enum DocError {
    #[error("加载失败 {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
    #[error("保存失败 {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
    #[error("文档尚未加载")]
    NotLoaded,
    #[error("参数无效: {0}")]
    InvalidArgument(String),
}

/// XML 声明 `<?xml version=... encoding=... standalone=...?>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for XmlDeclaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// 标签名（同级之间可以重复）
    pub name: String,
    /// 文本内容；空串或纯空白统一存为 None
    pub text: Option<String>,
    /// 按文档顺序排列的属性，名称在同一元素内唯一
    pub attributes: Vec<(String, String)>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: None,
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// 插入或覆盖属性（覆盖时保持原位置）
    pub(crate) fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub(crate) fn set_text(&mut self, text: &str) {
        self.text = if text.trim().is_empty() {
            None
        } else {
            Some(text.to_string())
        };
    }
}

/// 元素树本体：元素存放在 SlotMap 中，父子关系通过 NodeId 维护
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: SlotMap<NodeId, XmlElement>,
    root: NodeId,
    generation: u64,
    declaration: Option<XmlDeclaration>,
}

impl XmlDocument {
    pub fn with_root(root: XmlElement) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(XmlElement {
            parent: None,
            ..root
        });
        Self {
            nodes,
            root,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            declaration: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// 每份新建或解析出的文档各不相同
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn declaration(&self) -> Option<&XmlDeclaration> {
        self.declaration.as_ref()
    }

    pub fn set_declaration(&mut self, declaration: Option<XmlDeclaration>) {
        self.declaration = declaration;
    }

    pub fn get(&self, id: NodeId) -> Option<&XmlElement> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut XmlElement> {
        self.nodes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 追加为 parent 的最后一个子元素；parent 不存在时返回 None
    pub(crate) fn append_child(&mut self, parent: NodeId, element: XmlElement) -> Option<NodeId> {
        if !self.nodes.contains_key(parent) {
            return None;
        }
        let id = self.nodes.insert(XmlElement {
            parent: Some(parent),
            children: Vec::new(),
            ..element
        });
        self.nodes[parent].children.push(id);
        Some(id)
    }

    /// 从父元素摘除并销毁整棵子树
    fn remove_subtree(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes.get(child).and_then(|el| el.parent) {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != child);
            }
        }
        let mut stack = vec![child];
        while let Some(id) = stack.pop() {
            if let Some(el) = self.nodes.remove(id) {
                stack.extend(el.children);
            }
        }
    }
}

/// 文档包装器：Unloaded（doc 为 None）或 Loaded
#[derive(Debug)]
pub struct XmlEditor {
    doc: Option<XmlDocument>,
    indent: usize,
}

impl Default for XmlEditor {
    fn default() -> Self {
        Self::with_indent(2)
    }
}

impl XmlEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定保存时的缩进宽度（0 表示不换行缩进）
    pub fn with_indent(indent: usize) -> Self {
        Self { doc: None, indent }
    }

    pub fn is_loaded(&self) -> bool {
        self.doc.is_some()
    }

    pub fn document(&self) -> Option<&XmlDocument> {
        self.doc.as_ref()
    }

    /// 读取并解析文件；失败时保留原文档不变
    pub fn open_file(&mut self, path: &Path) -> Result<(), DocError> {
        let doc = read_xml_file(path).map_err(|source| DocError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("已解析 {}：{} 个元素", path.display(), doc.len());
        self.doc = Some(doc);
        Ok(())
    }

    /// 丢弃当前文档，新建只含声明与空根元素的文档
    pub fn create_new(&mut self, root_name: &str) -> Result<(), DocError> {
        if !is_valid_xml_name(root_name) {
            return Err(DocError::InvalidArgument(format!(
                "根元素名称无效: {:?}",
                root_name
            )));
        }
        let mut doc = XmlDocument::with_root(XmlElement::new(root_name));
        doc.set_declaration(Some(XmlDeclaration::default()));
        self.doc = Some(doc);
        Ok(())
    }

    /// 直接替换为已解析的文档
    pub fn replace_document(&mut self, doc: XmlDocument) {
        self.doc = Some(doc);
    }

    /// 当前文档的代号；未加载时为 None
    pub fn generation(&self) -> Option<u64> {
        self.doc.as_ref().map(XmlDocument::generation)
    }

    pub fn get_root_node(&self) -> Option<NodeId> {
        self.doc.as_ref().map(XmlDocument::root)
    }

    pub fn element(&self, id: NodeId) -> Option<&XmlElement> {
        self.doc.as_ref()?.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.element(id)?.parent
    }

    /// 子元素列表；节点不存在时为空
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(XmlElement::children).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.doc.as_ref().map_or(0, XmlDocument::len)
    }

    /// 返回 parent 下第一个标签为 name 的子元素
    pub fn get_child_node(&self, parent: NodeId, name: &str) -> Result<Option<NodeId>, DocError> {
        let el = self.element(parent).ok_or_else(|| absent("父节点"))?;
        Ok(el
            .children
            .iter()
            .copied()
            .find(|c| self.element(*c).is_some_and(|child| child.name == name)))
    }

    /// 新建空元素并追加为 parent 的最后一个子元素
    pub fn add_child_node(&mut self, parent: NodeId, name: &str) -> Result<NodeId, DocError> {
        if !is_valid_xml_name(name) {
            return Err(DocError::InvalidArgument(format!("节点名称无效: {:?}", name)));
        }
        self.doc
            .as_mut()
            .and_then(|doc| doc.append_child(parent, XmlElement::new(name)))
            .ok_or_else(|| absent("父节点"))
    }

    /// 摘除并销毁 child；child 不是 parent 的直接子元素时报错且文档不变
    pub fn remove_child_node(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocError> {
        let doc = self.doc.as_mut().ok_or_else(|| absent("父节点"))?;
        if doc.get(parent).is_none() {
            return Err(absent("父节点"));
        }
        let child_parent = doc.get(child).ok_or_else(|| absent("子节点"))?.parent;
        if child_parent != Some(parent) {
            return Err(DocError::InvalidArgument(
                "子节点不属于给定的父节点".to_string(),
            ));
        }
        doc.remove_subtree(child);
        Ok(())
    }

    /// 设置文本内容；节点不存在时静默忽略
    pub fn modify_node_value(&mut self, node: NodeId, text: &str) {
        match self.doc.as_mut().and_then(|doc| doc.get_mut(node)) {
            Some(el) => el.set_text(text),
            None => tracing::debug!("modify_node_value: 节点不存在，忽略"),
        }
    }

    /// 插入或覆盖属性；节点不存在时静默忽略
    pub fn modify_node_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        match self.doc.as_mut().and_then(|doc| doc.get_mut(node)) {
            Some(el) => el.set_attribute(name, value),
            None => tracing::debug!("modify_node_attribute: 节点不存在，忽略 {}", name),
        }
    }

    /// 删除属性，返回是否真的删除了；节点不存在时静默忽略
    pub fn remove_node_attribute(&mut self, node: NodeId, name: &str) -> bool {
        let Some(el) = self.doc.as_mut().and_then(|doc| doc.get_mut(node)) else {
            tracing::debug!("remove_node_attribute: 节点不存在，忽略 {}", name);
            return false;
        };
        let before = el.attributes.len();
        el.attributes.retain(|(k, _)| k != name);
        el.attributes.len() != before
    }

    pub fn save_file(&self, path: &Path) -> Result<(), DocError> {
        let doc = self.doc.as_ref().ok_or(DocError::NotLoaded)?;
        write_xml_file(path, doc, self.indent).map_err(|source| DocError::Save {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 与 save_file 行为相同；规范路径由调用方（EditorState）维护
    pub fn save_file_as(&self, path: &Path) -> Result<(), DocError> {
        self.save_file(path)
    }

    pub fn to_xml_string(&self) -> Result<String, DocError> {
        let doc = self.doc.as_ref().ok_or(DocError::NotLoaded)?;
        write_document(doc, self.indent).map_err(|source| DocError::Save {
            path: PathBuf::new(),
            source,
        })
    }

    /// 从根开始先序深度优先查找第一个标签为 name 的元素
    pub fn get_node_by_name(&self, name: &str) -> Option<NodeId> {
        let doc = self.doc.as_ref()?;
        let mut stack = vec![doc.root()];
        while let Some(id) = stack.pop() {
            let Some(el) = doc.get(id) else { continue };
            if el.name == name {
                return Some(id);
            }
            stack.extend(el.children.iter().rev().copied());
        }
        None
    }
}

fn absent(what: &str) -> DocError {
    DocError::InvalidArgument(format!("{}为空或已被删除", what))
}
