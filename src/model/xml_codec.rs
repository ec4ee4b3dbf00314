//! XML 文本 <-> XmlDocument 的转换（基于 quick-xml 事件流）
//!
//! 读取时：元素的文本与 CDATA 片段原样拼接，元素结束时整体去除首尾空白，
//! 成为单一文本值（写回时位于子元素之前）；注释、处理指令与 DOCTYPE 被跳过，不会写回。

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::escape::unescape;
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::model::xml_doc::{NodeId, XmlDeclaration, XmlDocument, XmlElement};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML解析失败: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("属性解析失败: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("转义序列无效: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
    #[error("XML结构错误: {0}")]
    Malformed(String),
}

fn utf8(bytes: &[u8]) -> Result<&str, CodecError> {
    std::str::from_utf8(bytes).map_err(|e| CodecError::Malformed(format!("非UTF-8内容: {}", e)))
}

/// 解析完整文档：恰好一个根元素，可选 XML 声明
pub fn parse_document(src: &str) -> Result<XmlDocument, CodecError> {
    let mut reader = Reader::from_str(src);
    let mut doc: Option<XmlDocument> = None;
    let mut declaration = None;
    // 当前打开的元素链（栈顶为最内层）
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Decl(d) => declaration = Some(read_declaration(&d)?),
            Event::Start(e) => {
                let id = open_element(&mut doc, &stack, &e)?;
                stack.push(id);
            }
            Event::Empty(e) => {
                open_element(&mut doc, &stack, &e)?;
            }
            // 结束标签与开始标签是否匹配由 quick-xml 校验
            Event::End(_) => {
                if let (Some(id), Some(doc)) = (stack.pop(), doc.as_mut()) {
                    finish_text(doc, id);
                }
            }
            Event::Text(t) => {
                let text = unescape(utf8(&t)?)?;
                push_text(&mut doc, &stack, &text)?;
            }
            Event::CData(c) => {
                push_text(&mut doc, &stack, utf8(&c)?)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last().and_then(|id| doc.as_ref()?.get(*id)) {
        return Err(CodecError::Malformed(format!("元素未闭合: <{}>", open.name)));
    }
    let mut doc = doc.ok_or_else(|| CodecError::Malformed("缺少根元素".to_string()))?;
    doc.set_declaration(declaration);
    Ok(doc)
}

fn read_declaration(d: &BytesDecl<'_>) -> Result<XmlDeclaration, CodecError> {
    let version = utf8(&d.version()?)?.to_string();
    let encoding = match d.encoding() {
        Some(enc) => Some(utf8(&enc?)?.to_string()),
        None => None,
    };
    let standalone = match d.standalone() {
        Some(sa) => Some(utf8(&sa?)?.to_string()),
        None => None,
    };
    Ok(XmlDeclaration {
        version,
        encoding,
        standalone,
    })
}

fn open_element(
    doc: &mut Option<XmlDocument>,
    stack: &[NodeId],
    start: &BytesStart<'_>,
) -> Result<NodeId, CodecError> {
    let mut element = XmlElement::new(utf8(start.name().as_ref())?);
    for attr in start.attributes() {
        let attr = attr?;
        let key = utf8(attr.key.as_ref())?;
        let value = unescape(utf8(&attr.value)?)?;
        element.attributes.push((key.to_string(), value.into_owned()));
    }

    if doc.is_none() {
        let created = XmlDocument::with_root(element);
        let root = created.root();
        *doc = Some(created);
        return Ok(root);
    }
    let (Some(existing), Some(parent)) = (doc.as_mut(), stack.last()) else {
        return Err(CodecError::Malformed(format!(
            "存在多个根元素: <{}>",
            element.name
        )));
    };
    existing
        .append_child(*parent, element)
        .ok_or_else(|| CodecError::Malformed("父元素丢失".to_string()))
}

fn push_text(doc: &mut Option<XmlDocument>, stack: &[NodeId], text: &str) -> Result<(), CodecError> {
    let el = match (doc.as_mut(), stack.last()) {
        (Some(doc), Some(id)) => doc.get_mut(*id),
        _ => None,
    };
    let Some(el) = el else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(CodecError::Malformed("根元素之外存在文本".to_string()));
    };
    match el.text.as_mut() {
        Some(existing) => existing.push_str(text),
        None => el.text = Some(text.to_string()),
    }
    Ok(())
}

/// 元素结束：拼接好的原始文本整体去除首尾空白，纯空白视为无文本
fn finish_text(doc: &mut XmlDocument, id: NodeId) {
    let Some(el) = doc.get_mut(id) else {
        return;
    };
    el.text = el
        .text
        .take()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
}

/// 序列化为 XML 文本；indent 为 0 时输出单行
pub fn write_document(doc: &XmlDocument, indent: usize) -> Result<String, CodecError> {
    let mut writer = if indent > 0 {
        Writer::new_with_indent(Vec::new(), b' ', indent)
    } else {
        Writer::new(Vec::new())
    };
    if let Some(decl) = doc.declaration() {
        writer.write_event(Event::Decl(BytesDecl::new(
            &decl.version,
            decl.encoding.as_deref(),
            decl.standalone.as_deref(),
        )))?;
    }
    write_element(&mut writer, doc, doc.root())?;

    let mut out = String::from_utf8(writer.into_inner())
        .map_err(|e| CodecError::Malformed(format!("输出不是UTF-8: {}", e)))?;
    out.push('\n');
    Ok(out)
}

fn write_element(writer: &mut Writer<Vec<u8>>, doc: &XmlDocument, id: NodeId) -> Result<(), CodecError> {
    let Some(el) = doc.get(id) else {
        return Ok(());
    };
    let start = BytesStart::new(el.name.as_str())
        .with_attributes(el.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    if el.text.is_none() && el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = el.text.as_deref() {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &el.children {
        write_element(writer, doc, *child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}
