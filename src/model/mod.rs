pub mod data_core;
pub mod performance;
pub mod shadow_tree;
pub mod xml_codec;
pub mod xml_doc;
