//! IO helper: safe file read/write for XML documents and JSON config

use std::{fs::File, io::BufReader, path::Path};

use serde::de::DeserializeOwned;

use crate::model::data_core::AppError;
use crate::model::xml_codec::{parse_document, write_document, CodecError};
use crate::model::xml_doc::XmlDocument;

/// 从文件读取并解析XML文档
pub fn read_xml_file(p: &Path) -> Result<XmlDocument, CodecError> {
    let src = std::fs::read_to_string(p)?;
    parse_document(&src)
}

/// 将XML文档保存到文件（先完整序列化，再一次性写入）
pub fn write_xml_file(p: &Path, doc: &XmlDocument, indent: usize) -> Result<(), CodecError> {
    let xml = write_document(doc, indent)?;
    std::fs::write(p, xml)?;
    Ok(())
}

/// 从文件读取JSON数据
pub fn read_json_file<T: DeserializeOwned>(p: &Path) -> Result<T, AppError> {
    let f = File::open(p)?;
    let rdr = BufReader::new(f);
    let v: T = serde_json::from_reader(rdr)?;
    Ok(v)
}
