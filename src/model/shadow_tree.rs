//! 影子树（Shadow Tree）：把 XML 文档镜像为可展示、可编辑的显示树，保存时再回写
//!
//! 显示行带显式类型（元素 / 属性 / 文本），元素行携带对应的 NodeId，
//! 回写时按 NodeId 定位元素，不依赖标签名或标签文本的形状。

use std::collections::HashSet;

use thiserror::Error;

use crate::model::xml_doc::{NodeId, XmlEditor};

/// 显示行标识，在一次构建出的显示树内唯一
pub type RowId = u32;

/// 显示行类型（与 UI 展示解耦）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Attribute,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowContent {
    Element { node: NodeId, tag: String },
    Attribute { name: String, value: String },
    Text { value: String },
}

#[derive(Debug, Clone)]
pub struct DisplayRow {
    pub id: RowId,
    pub content: RowContent,
    pub children: Vec<DisplayRow>,
    /// 是否展开（用于折叠/展开功能）
    pub expanded: bool,
}

impl DisplayRow {
    pub fn kind(&self) -> NodeKind {
        match self.content {
            RowContent::Element { .. } => NodeKind::Element,
            RowContent::Attribute { .. } => NodeKind::Attribute,
            RowContent::Text { .. } => NodeKind::Text,
        }
    }

    /// 展示文本：元素为标签名，属性为 "name : value"，文本为文本本身
    pub fn label(&self) -> String {
        match &self.content {
            RowContent::Element { tag, .. } => tag.clone(),
            RowContent::Attribute { name, value } => format!("{} : {}", name, value),
            RowContent::Text { value } => value.clone(),
        }
    }

    /// 显示树中待保存的文本：元素行取其文本子行，文本行取自身
    pub fn text_value(&self) -> Option<&str> {
        match &self.content {
            RowContent::Text { value } => Some(value.as_str()),
            RowContent::Element { .. } => self.children.iter().find_map(|c| match &c.content {
                RowContent::Text { value } => Some(value.as_str()),
                _ => None,
            }),
            RowContent::Attribute { .. } => None,
        }
    }

    /// 元素行对应的 XML 元素
    pub fn node(&self) -> Option<NodeId> {
        match self.content {
            RowContent::Element { node, .. } => Some(node),
            _ => None,
        }
    }

    fn find(&self, id: RowId) -> Option<&DisplayRow> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: RowId) -> Option<&mut DisplayRow> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    fn find_parent(&self, id: RowId) -> Option<&DisplayRow> {
        if self.children.iter().any(|c| c.id == id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_parent(id))
    }

    fn find_parent_mut(&mut self, id: RowId) -> Option<&mut DisplayRow> {
        if self.children.iter().any(|c| c.id == id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_parent_mut(id))
    }

    /// 先序遍历，父节点先于子节点，子节点从左到右
    fn find_first<'a>(&'a self, pred: &dyn Fn(&DisplayRow) -> bool) -> Option<&'a DisplayRow> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_first(pred))
    }
}

/// 扁平行：供 UI 列表直接渲染
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    pub id: RowId,
    pub label: String,
    pub kind: NodeKind,
    /// 节点深度（用于UI缩进显示）
    pub depth: u32,
    pub has_children: bool,
    pub expanded: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TreeEditError {
    #[error("显示行不存在: {0}")]
    RowNotFound(RowId),
    #[error("显示行类型不符: 期望 {expected:?}, 实际 {actual:?}")]
    WrongKind { expected: NodeKind, actual: NodeKind },
    #[error("属性名无效: {0:?}")]
    InvalidName(String),
    #[error("属性已存在: {0}")]
    DuplicateAttribute(String),
}

/// 回写结果统计；warnings 记录被跳过的分支
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub elements_visited: usize,
    pub attributes_applied: usize,
    pub attributes_removed: usize,
    pub texts_applied: usize,
    pub texts_cleared: usize,
    pub warnings: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DisplayTree {
    root: Option<DisplayRow>,
    next_id: RowId,
    /// 构建时文档的代号，回写时据此拒绝其他文档
    generation: Option<u64>,
}

/// 从文档构建显示树（整体重建）
pub fn build_shadow_tree(editor: &XmlEditor) -> DisplayTree {
    let mut tree = DisplayTree {
        generation: editor.generation(),
        ..DisplayTree::default()
    };
    let Some(root) = editor.get_root_node() else {
        tracing::warn!("文档尚未加载，显示树为空");
        return tree;
    };
    tree.root = tree.build_row(editor, root);
    if let Some(row) = tree.root.as_mut() {
        row.expanded = true; // 根节点默认展开
    }
    tree
}

/// 把显示树回写到文档：属性按行覆盖（无对应行的属性被删除），
/// 文本取最后一个文本行（无文本行则清空），子元素按 NodeId 递归。
/// 文档中没有对应显示行的子元素保持不变。
pub fn reconcile(tree: &DisplayTree, editor: &mut XmlEditor) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    match (tree.root(), editor.get_root_node()) {
        (None, _) => report.warnings.push("显示树为空，未回写任何内容".to_string()),
        (_, None) => report.warnings.push("文档尚未加载，未回写任何内容".to_string()),
        _ if tree.generation != editor.generation() => report
            .warnings
            .push("显示树来自另一份文档，未回写任何内容".to_string()),
        (Some(row), Some(root)) if row.node() == Some(root) => {
            reconcile_element(row, root, editor, &mut report);
        }
        (Some(row), Some(_)) => report
            .warnings
            .push(format!("显示树根节点 <{}> 与文档根元素不对应", row.label())),
    }
    for w in &report.warnings {
        tracing::warn!("回写: {}", w);
    }
    report
}

fn reconcile_element(row: &DisplayRow, node: NodeId, editor: &mut XmlEditor, report: &mut ReconcileReport) {
    report.elements_visited += 1;
    let mut text: Option<&str> = None;
    let mut shown: Vec<&str> = Vec::new();

    for child in &row.children {
        match &child.content {
            RowContent::Attribute { name, value } => {
                editor.modify_node_attribute(node, name, value);
                shown.push(name.as_str());
                report.attributes_applied += 1;
            }
            RowContent::Element { node: child_node, tag } => {
                if editor.parent_of(*child_node) == Some(node) {
                    reconcile_element(child, *child_node, editor, report);
                } else {
                    report
                        .warnings
                        .push(format!("元素 <{}> 在文档中已不存在，跳过该分支", tag));
                }
            }
            RowContent::Text { value } => text = Some(value.as_str()),
        }
    }

    let stale: Vec<String> = editor
        .element(node)
        .map(|el| {
            el.attributes
                .iter()
                .filter(|(k, _)| !shown.contains(&k.as_str()))
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default();
    for name in stale {
        if editor.remove_node_attribute(node, &name) {
            report.attributes_removed += 1;
        }
    }

    match text {
        Some(value) => {
            editor.modify_node_value(node, value);
            report.texts_applied += 1;
        }
        None => {
            if editor.element(node).is_some_and(|el| el.text.is_some()) {
                editor.modify_node_value(node, "");
                report.texts_cleared += 1;
            }
        }
    }
}

impl DisplayTree {
    fn alloc_id(&mut self) -> RowId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn leaf(&mut self, content: RowContent) -> DisplayRow {
        DisplayRow {
            id: self.alloc_id(),
            content,
            children: Vec::new(),
            expanded: false,
        }
    }

    /// 元素行：文本行 → 属性行（文档顺序）→ 子元素行（递归）
    fn build_row(&mut self, editor: &XmlEditor, id: NodeId) -> Option<DisplayRow> {
        let el = editor.element(id)?;
        let mut row = self.leaf(RowContent::Element {
            node: id,
            tag: el.name.clone(),
        });
        if let Some(text) = el.text().filter(|t| !t.is_empty()) {
            let text_row = self.leaf(RowContent::Text {
                value: text.to_string(),
            });
            row.children.push(text_row);
        }
        for (name, value) in &el.attributes {
            let attr_row = self.leaf(RowContent::Attribute {
                name: name.clone(),
                value: value.clone(),
            });
            row.children.push(attr_row);
        }
        for child in el.children() {
            match self.build_row(editor, *child) {
                Some(child_row) => row.children.push(child_row),
                None => tracing::warn!("构建显示树: 子元素已失效，跳过"),
            }
        }
        Some(row)
    }

    pub fn root(&self) -> Option<&DisplayRow> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// 全部行数（不考虑展开状态）
    pub fn len(&self) -> usize {
        fn count(row: &DisplayRow) -> usize {
            1 + row.children.iter().map(count).sum::<usize>()
        }
        self.root.as_ref().map_or(0, count)
    }

    pub fn row(&self, id: RowId) -> Option<&DisplayRow> {
        self.root.as_ref()?.find(id)
    }

    fn row_mut(&mut self, id: RowId) -> Result<&mut DisplayRow, TreeEditError> {
        self.root
            .as_mut()
            .and_then(|r| r.find_mut(id))
            .ok_or(TreeEditError::RowNotFound(id))
    }

    pub fn parent_row(&self, id: RowId) -> Option<&DisplayRow> {
        self.root.as_ref()?.find_parent(id)
    }

    /// 按展示文本先序查找，第一个匹配者胜出
    pub fn find_row_by_label(&self, label: &str) -> Option<&DisplayRow> {
        self.root.as_ref()?.find_first(&|r| r.label() == label)
    }

    pub fn find_row_for_node(&self, node: NodeId) -> Option<&DisplayRow> {
        self.root.as_ref()?.find_first(&|r| r.node() == Some(node))
    }

    /// 元素行本身，或属性/文本行所属的元素行
    pub fn owning_element(&self, id: RowId) -> Option<&DisplayRow> {
        let row = self.row(id)?;
        match row.kind() {
            NodeKind::Element => Some(row),
            _ => self.parent_row(id),
        }
    }

    fn element_row_mut(&mut self, id: RowId) -> Result<&mut DisplayRow, TreeEditError> {
        let row = self.row_mut(id)?;
        match row.kind() {
            NodeKind::Element => Ok(row),
            actual => Err(TreeEditError::WrongKind {
                expected: NodeKind::Element,
                actual,
            }),
        }
    }

    /// 修改属性行的名称与值；同一元素下不允许重名
    pub fn set_attribute_row(&mut self, id: RowId, name: &str, value: &str) -> Result<(), TreeEditError> {
        let name = name.trim();
        if !crate::utils::input::is_valid_xml_name(name) {
            return Err(TreeEditError::InvalidName(name.to_string()));
        }
        let parent = self
            .root
            .as_ref()
            .and_then(|r| r.find_parent(id))
            .ok_or(TreeEditError::RowNotFound(id))?;
        let clash = parent.children.iter().any(|c| {
            c.id != id && matches!(&c.content, RowContent::Attribute { name: n, .. } if n == name)
        });
        if clash {
            return Err(TreeEditError::DuplicateAttribute(name.to_string()));
        }

        let row = self.row_mut(id)?;
        let actual = row.kind();
        match &mut row.content {
            RowContent::Attribute { name: n, value: v } => {
                *n = name.to_string();
                *v = value.to_string();
                Ok(())
            }
            _ => Err(TreeEditError::WrongKind {
                expected: NodeKind::Attribute,
                actual,
            }),
        }
    }

    /// 在元素行下新增属性行；同名属性已存在时改为覆盖其值
    pub fn add_attribute_row(&mut self, element: RowId, name: &str, value: &str) -> Result<RowId, TreeEditError> {
        let name = name.trim();
        if !crate::utils::input::is_valid_xml_name(name) {
            return Err(TreeEditError::InvalidName(name.to_string()));
        }
        let new_id = self.next_id;
        let row = self.element_row_mut(element)?;

        for child in row.children.iter_mut() {
            if let RowContent::Attribute { name: n, value: v } = &mut child.content {
                if n.as_str() == name {
                    *v = value.to_string();
                    return Ok(child.id);
                }
            }
        }
        // 插在第一个子元素行之前，保持 文本 → 属性 → 子元素 的顺序
        let at = row
            .children
            .iter()
            .position(|c| c.kind() == NodeKind::Element)
            .unwrap_or(row.children.len());
        row.children.insert(
            at,
            DisplayRow {
                id: new_id,
                content: RowContent::Attribute {
                    name: name.to_string(),
                    value: value.to_string(),
                },
                children: Vec::new(),
                expanded: false,
            },
        );
        self.next_id += 1;
        Ok(new_id)
    }

    /// 设置元素文本。id 可以是元素行或其文本行；空文本删除文本行。
    /// 返回文本行的 id（删除时为 None）
    pub fn set_text_row(&mut self, id: RowId, text: &str) -> Result<Option<RowId>, TreeEditError> {
        let element = match self.row(id).map(DisplayRow::kind) {
            None => return Err(TreeEditError::RowNotFound(id)),
            Some(NodeKind::Text) => self
                .parent_row(id)
                .map(|p| p.id)
                .ok_or(TreeEditError::RowNotFound(id))?,
            Some(NodeKind::Element) => id,
            Some(actual) => {
                return Err(TreeEditError::WrongKind {
                    expected: NodeKind::Text,
                    actual,
                })
            }
        };
        // 与读取文件时一致：首尾空白不保留，纯空白视为删除
        let text = text.trim();
        let new_id = self.next_id;
        let row = self.element_row_mut(element)?;
        let existing = row.children.iter().position(|c| c.kind() == NodeKind::Text);

        match (existing, text.is_empty()) {
            (Some(i), true) => {
                row.children.remove(i);
                Ok(None)
            }
            (None, true) => Ok(None),
            (Some(i), false) => {
                row.children[i].content = RowContent::Text {
                    value: text.to_string(),
                };
                Ok(Some(row.children[i].id))
            }
            (None, false) => {
                row.children.insert(
                    0,
                    DisplayRow {
                        id: new_id,
                        content: RowContent::Text {
                            value: text.to_string(),
                        },
                        children: Vec::new(),
                        expanded: false,
                    },
                );
                self.next_id += 1;
                Ok(Some(new_id))
            }
        }
    }

    /// 删除属性行或文本行；元素行需通过文档删除节点后重建
    pub fn remove_row(&mut self, id: RowId) -> Result<DisplayRow, TreeEditError> {
        let kind = self.row(id).map(DisplayRow::kind).ok_or(TreeEditError::RowNotFound(id))?;
        if kind == NodeKind::Element {
            return Err(TreeEditError::WrongKind {
                expected: NodeKind::Attribute,
                actual: kind,
            });
        }
        let parent = self
            .root
            .as_mut()
            .and_then(|r| r.find_parent_mut(id))
            .ok_or(TreeEditError::RowNotFound(id))?;
        let i = parent
            .children
            .iter()
            .position(|c| c.id == id)
            .ok_or(TreeEditError::RowNotFound(id))?;
        Ok(parent.children.remove(i))
    }

    /// 切换展开状态，返回新状态
    pub fn toggle_expanded(&mut self, id: RowId) -> Result<bool, TreeEditError> {
        let row = self.row_mut(id)?;
        row.expanded = !row.expanded;
        Ok(row.expanded)
    }

    /// 展开 id 的所有祖先，使其可见
    pub fn expand_to(&mut self, id: RowId) {
        let mut current = id;
        while let Some(parent) = self.root.as_mut().and_then(|r| r.find_parent_mut(current)) {
            parent.expanded = true;
            current = parent.id;
        }
    }

    /// 已展开的元素（重建前记录，重建后恢复）
    pub fn expanded_nodes(&self) -> HashSet<NodeId> {
        fn collect(row: &DisplayRow, out: &mut HashSet<NodeId>) {
            if row.expanded {
                if let Some(node) = row.node() {
                    out.insert(node);
                }
            }
            row.children.iter().for_each(|c| collect(c, out));
        }
        let mut out = HashSet::new();
        if let Some(root) = &self.root {
            collect(root, &mut out);
        }
        out
    }

    pub fn restore_expansion(&mut self, nodes: &HashSet<NodeId>) {
        fn apply(row: &mut DisplayRow, nodes: &HashSet<NodeId>) {
            if row.node().is_some_and(|n| nodes.contains(&n)) {
                row.expanded = true;
            }
            row.children.iter_mut().for_each(|c| apply(c, nodes));
        }
        if let Some(root) = self.root.as_mut() {
            apply(root, nodes);
        }
    }

    /// 按展开状态扁平化为可见行列表
    pub fn visible_rows(&self) -> Vec<FlatRow> {
        fn walk(row: &DisplayRow, depth: u32, out: &mut Vec<FlatRow>) {
            out.push(FlatRow {
                id: row.id,
                label: row.label(),
                kind: row.kind(),
                depth,
                has_children: !row.children.is_empty(),
                expanded: row.expanded,
            });
            if row.expanded {
                for child in &row.children {
                    walk(child, depth + 1, out);
                }
            }
        }
        let mut out = Vec::with_capacity(64);
        if let Some(root) = &self.root {
            walk(root, 0, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn editor_from(content: &str) -> XmlEditor {
        let mut file = NamedTempFile::new().expect("创建临时文件失败");
        file.write_all(content.as_bytes()).expect("写入临时文件失败");
        let mut editor = XmlEditor::new();
        editor.open_file(file.path()).expect("加载文件失败");
        editor
    }

    fn child_labels(row: &DisplayRow) -> Vec<String> {
        row.children.iter().map(DisplayRow::label).collect()
    }

    #[test]
    fn test_build_scene_tree() {
        let editor = editor_from(r#"<novel><scene id="1">Hello</scene></novel>"#);
        let tree = build_shadow_tree(&editor);

        let root = tree.root().expect("应该有根行");
        assert_eq!(root.label(), "novel");
        assert_eq!(root.node(), editor.get_root_node());
        assert_eq!(child_labels(root), vec!["scene"]);

        let scene = &root.children[0];
        assert_eq!(scene.kind(), NodeKind::Element);
        assert_eq!(child_labels(scene), vec!["Hello", "id : 1"]);
        assert_eq!(scene.children[0].kind(), NodeKind::Text);
        assert_eq!(scene.children[1].kind(), NodeKind::Attribute);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_build_shows_root_attributes() {
        let editor = editor_from(r#"<novel title="Dawn"><scene/></novel>"#);
        let tree = build_shadow_tree(&editor);
        assert_eq!(child_labels(tree.root().unwrap()), vec!["title : Dawn", "scene"]);
    }

    #[test]
    fn test_build_unloaded_is_empty() {
        let tree = build_shadow_tree(&XmlEditor::new());
        assert!(tree.is_empty());
        assert!(tree.visible_rows().is_empty());
    }

    #[test]
    fn test_roundtrip_without_edits_is_identity() {
        let mut editor = editor_from(
            r#"<novel title="t"><scene id="1" mood="calm">Hello<choice target="2">Go</choice></scene><ending>Fin</ending></novel>"#,
        );
        let before = editor.to_xml_string().unwrap();
        let tree = build_shadow_tree(&editor);

        let report = reconcile(&tree, &mut editor);
        assert!(report.is_clean(), "无编辑时不应有警告: {:?}", report.warnings);
        assert_eq!(report.elements_visited, 4);
        assert_eq!(report.attributes_removed, 0);
        assert_eq!(report.texts_cleared, 0);
        assert_eq!(editor.to_xml_string().unwrap(), before);
    }

    #[test]
    fn test_removing_text_row_clears_text() {
        let mut editor = editor_from(r#"<novel><scene id="1">Hello</scene></novel>"#);
        let mut tree = build_shadow_tree(&editor);
        let text_row = tree.find_row_by_label("Hello").unwrap().id;

        tree.remove_row(text_row).expect("删除文本行应该成功");
        let report = reconcile(&tree, &mut editor);

        let scene = editor.get_node_by_name("scene").unwrap();
        assert!(editor.element(scene).unwrap().text().is_none(), "文本应被清空");
        assert_eq!(editor.element(scene).unwrap().attribute("id"), Some("1"));
        assert_eq!(report.texts_cleared, 1);
    }

    #[test]
    fn test_removing_attribute_row_removes_attribute() {
        let mut editor = editor_from(r#"<novel><scene id="1" mood="dark"/></novel>"#);
        let mut tree = build_shadow_tree(&editor);
        let mood = tree.find_row_by_label("mood : dark").unwrap().id;
        tree.remove_row(mood).unwrap();

        let report = reconcile(&tree, &mut editor);
        let scene = editor.get_node_by_name("scene").unwrap();
        assert_eq!(editor.element(scene).unwrap().attribute("mood"), None);
        assert_eq!(report.attributes_removed, 1);
    }

    #[test]
    fn test_text_with_colon_stays_text() {
        let mut editor = editor_from(r#"<novel><line>Narrator: it begins</line></novel>"#);
        let tree = build_shadow_tree(&editor);
        let row = tree.find_row_by_label("Narrator: it begins").unwrap();
        assert_eq!(row.kind(), NodeKind::Text);

        reconcile(&tree, &mut editor);
        let line = editor.get_node_by_name("line").unwrap();
        let el = editor.element(line).unwrap();
        assert_eq!(el.text(), Some("Narrator: it begins"));
        assert!(el.attributes.is_empty(), "带冒号的文本不应变成属性");
    }

    #[test]
    fn test_duplicate_sibling_tags_reconcile_by_identity() {
        let mut editor = editor_from(r#"<novel><scene>first</scene><scene>second</scene></novel>"#);
        let mut tree = build_shadow_tree(&editor);
        let second_text = tree.find_row_by_label("second").unwrap().id;
        tree.set_text_row(second_text, "changed").unwrap();

        reconcile(&tree, &mut editor);
        let root = editor.get_root_node().unwrap();
        let scenes = editor.children_of(root).to_vec();
        assert_eq!(editor.element(scenes[0]).unwrap().text(), Some("first"));
        assert_eq!(editor.element(scenes[1]).unwrap().text(), Some("changed"));
    }

    #[test]
    fn test_stale_element_row_is_reported() {
        let mut editor = editor_from(r#"<novel><scene/><other/></novel>"#);
        let tree = build_shadow_tree(&editor);
        let root = editor.get_root_node().unwrap();
        let scene = editor.get_child_node(root, "scene").unwrap().unwrap();
        editor.remove_child_node(root, scene).unwrap();

        let report = reconcile(&tree, &mut editor);
        assert_eq!(report.warnings.len(), 1, "失效分支应产生一条警告");
        assert_eq!(report.elements_visited, 2);
    }

    #[test]
    fn test_reconcile_against_other_document_is_rejected() {
        let editor = editor_from(r#"<novel title="old"><scene/></novel>"#);
        let tree = build_shadow_tree(&editor);
        let mut other = XmlEditor::new();
        other.create_new("novel").unwrap();
        let root = other.get_root_node().unwrap();
        other.modify_node_value(root, "keep");

        let report = reconcile(&tree, &mut other);
        assert!(!report.is_clean());
        assert_eq!(report.elements_visited, 0);
        let el = other.element(root).unwrap();
        assert!(el.attributes.is_empty(), "不应把旧文档的属性写入新文档");
        assert_eq!(el.text(), Some("keep"));
    }

    #[test]
    fn test_tree_from_replaced_document_is_rejected() {
        let mut editor = editor_from(r#"<novel><scene id="1"/></novel>"#);
        let tree = build_shadow_tree(&editor);
        editor.create_new("novel").unwrap();

        let report = reconcile(&tree, &mut editor);
        assert_eq!(report.elements_visited, 0);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(editor.node_count(), 1);
    }

    #[test]
    fn test_attribute_row_edits() {
        let mut editor = editor_from(r#"<novel><scene id="1" mood="dark"/></novel>"#);
        let mut tree = build_shadow_tree(&editor);
        let scene_row = tree.find_row_by_label("scene").unwrap().id;
        let id_row = tree.find_row_by_label("id : 1").unwrap().id;

        assert_eq!(
            tree.set_attribute_row(id_row, "mood", "x"),
            Err(TreeEditError::DuplicateAttribute("mood".to_string()))
        );
        assert_eq!(
            tree.set_attribute_row(scene_row, "a", "b"),
            Err(TreeEditError::WrongKind {
                expected: NodeKind::Attribute,
                actual: NodeKind::Element
            })
        );
        tree.set_attribute_row(id_row, "key", "7").unwrap();
        let added = tree.add_attribute_row(scene_row, "music", "rain").unwrap();
        let again = tree.add_attribute_row(scene_row, "music", "storm").unwrap();
        assert_eq!(added, again, "同名属性应覆盖而不是新增");
        assert!(tree.add_attribute_row(scene_row, "bad name", "1").is_err());

        reconcile(&tree, &mut editor);
        let scene = editor.get_node_by_name("scene").unwrap();
        let el = editor.element(scene).unwrap();
        assert_eq!(el.attribute("id"), None, "改名后旧属性应被删除");
        assert_eq!(el.attribute("key"), Some("7"));
        assert_eq!(el.attribute("music"), Some("storm"));
        assert_eq!(el.attribute("mood"), Some("dark"));
    }

    #[test]
    fn test_set_text_row_on_element() {
        let mut editor = editor_from(r#"<novel><scene id="1"/></novel>"#);
        let mut tree = build_shadow_tree(&editor);
        let scene_row = tree.find_row_by_label("scene").unwrap().id;

        let text_row = tree.set_text_row(scene_row, "Once").unwrap().expect("应新建文本行");
        assert_eq!(tree.row(text_row).unwrap().kind(), NodeKind::Text);
        assert_eq!(tree.row(scene_row).unwrap().children[0].id, text_row, "文本行应在最前");

        reconcile(&tree, &mut editor);
        let scene = editor.get_node_by_name("scene").unwrap();
        assert_eq!(editor.element(scene).unwrap().text(), Some("Once"));

        assert_eq!(tree.set_text_row(text_row, "").unwrap(), None);
        assert!(tree.row(text_row).is_none(), "空文本应删除文本行");
    }

    #[test]
    fn test_text_value_follows_pending_edits() {
        let editor = editor_from(r#"<novel><scene id="1">Hello</scene></novel>"#);
        let mut tree = build_shadow_tree(&editor);
        let scene_row = tree.find_row_by_label("scene").unwrap().id;
        assert_eq!(tree.row(scene_row).unwrap().text_value(), Some("Hello"));

        // 未保存的修改应立即体现在元素行上，而文档仍是旧值
        tree.set_text_row(scene_row, "Changed").unwrap();
        assert_eq!(tree.row(scene_row).unwrap().text_value(), Some("Changed"));
        let scene = editor.get_node_by_name("scene").unwrap();
        assert_eq!(editor.element(scene).unwrap().text(), Some("Hello"));

        tree.set_text_row(scene_row, "").unwrap();
        assert_eq!(tree.row(scene_row).unwrap().text_value(), None);
        let attr_row = tree.find_row_by_label("id : 1").unwrap();
        assert_eq!(attr_row.text_value(), None);
    }

    #[test]
    fn test_whitespace_text_removes_text_row() {
        let mut editor = editor_from(r#"<novel><scene>Hello</scene></novel>"#);
        let mut tree = build_shadow_tree(&editor);
        let text_row = tree.find_row_by_label("Hello").unwrap().id;

        assert_eq!(tree.set_text_row(text_row, "   ").unwrap(), None);
        assert!(tree.row(text_row).is_none());

        let scene_row = tree.find_row_by_label("scene").unwrap().id;
        let trimmed = tree.set_text_row(scene_row, "  Bye \n").unwrap().unwrap();
        assert_eq!(tree.row(trimmed).unwrap().label(), "Bye");

        reconcile(&tree, &mut editor);
        let out = NamedTempFile::new().unwrap();
        editor.save_file(out.path()).unwrap();
        let mut reloaded = XmlEditor::new();
        reloaded.open_file(out.path()).unwrap();
        let scene = reloaded.get_node_by_name("scene").unwrap();
        assert_eq!(reloaded.element(scene).unwrap().text(), Some("Bye"));
    }

    #[test]
    fn test_remove_element_row_is_rejected() {
        let editor = editor_from("<novel><scene/></novel>");
        let mut tree = build_shadow_tree(&editor);
        let scene_row = tree.find_row_by_label("scene").unwrap().id;
        assert!(tree.remove_row(scene_row).is_err());
        assert!(matches!(tree.remove_row(999), Err(TreeEditError::RowNotFound(999))));
    }

    #[test]
    fn test_find_by_label_is_preorder() {
        let editor = editor_from(
            r#"<novel><chapter><scene id="deep"/></chapter><scene id="shallow"/></novel>"#,
        );
        let tree = build_shadow_tree(&editor);
        let found = tree.find_row_by_label("scene").unwrap();
        let node = found.node().unwrap();
        assert_eq!(editor.element(node).unwrap().attribute("id"), Some("deep"));

        let chapter = editor.get_node_by_name("chapter").unwrap();
        assert_eq!(tree.find_row_for_node(chapter).unwrap().label(), "chapter");
        assert!(tree.find_row_by_label("missing").is_none());
    }

    #[test]
    fn test_visible_rows_follow_expansion() {
        let editor = editor_from(r#"<novel><scene id="1"><choice/></scene></novel>"#);
        let mut tree = build_shadow_tree(&editor);

        let rows = tree.visible_rows();
        assert_eq!(rows.len(), 2, "默认只展开根节点");
        assert_eq!(rows[1].label, "scene");
        assert_eq!(rows[1].depth, 1);
        assert!(rows[1].has_children);

        assert!(tree.toggle_expanded(rows[1].id).unwrap());
        let labels: Vec<String> = tree.visible_rows().into_iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["novel", "scene", "id : 1", "choice"]);

        let choice = tree.find_row_by_label("choice").unwrap().id;
        let expanded = tree.expanded_nodes();
        assert_eq!(expanded.len(), 2);
        let mut rebuilt = build_shadow_tree(&editor);
        rebuilt.restore_expansion(&expanded);
        assert_eq!(rebuilt.visible_rows().len(), 4);

        let mut fresh = build_shadow_tree(&editor);
        fresh.expand_to(choice);
        assert_eq!(fresh.visible_rows().len(), 4);
    }
}
