//! 性能基准测试模块
//!
//! 用于测试大文档解析、影子树构建、回写与序列化的性能

use std::fmt::Write as _;
use std::time::Instant;

use crate::model::shadow_tree::{build_shadow_tree, reconcile};
use crate::model::xml_codec::parse_document;
use crate::model::xml_doc::XmlEditor;

/// 性能测试结果
#[derive(Debug)]
pub struct PerformanceResult {
    pub operation: String,
    pub duration_ms: u128,
    pub success: bool,
    pub details: String,
}

impl PerformanceResult {
    pub fn new(operation: &str, duration_ms: u128, success: bool, details: &str) -> Self {
        Self {
            operation: operation.to_string(),
            duration_ms,
            success,
            details: details.to_string(),
        }
    }
}

/// 生成大型测试小说文档：scenes 个场景，每个场景 choices 个选项
pub fn generate_large_novel(scenes: usize, choices: usize) -> String {
    let mut xml = String::with_capacity(scenes * (64 + choices * 48));
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<novel title=\"性能测试\" generated=\"true\">\n");
    for s in 0..scenes {
        let _ = writeln!(
            xml,
            "  <scene id=\"s{}\" mood=\"{}\">",
            s,
            if s % 2 == 0 { "calm" } else { "tense" }
        );
        let _ = writeln!(xml, "    <text>第 {} 幕：夜色 &amp; 雨声</text>", s);
        for c in 0..choices {
            let _ = writeln!(
                xml,
                "    <choice target=\"s{}\">选项 {}</choice>",
                (s + c + 1) % scenes.max(1),
                c
            );
        }
        xml.push_str("  </scene>\n");
    }
    xml.push_str("</novel>\n");
    xml
}

/// 测试XML解析性能
pub fn benchmark_xml_parsing(xml: &str) -> PerformanceResult {
    let start = Instant::now();
    let result = parse_document(xml);
    let duration = start.elapsed();

    match result {
        Ok(doc) => PerformanceResult::new(
            "XML解析",
            duration.as_millis(),
            true,
            &format!("解析了 {} 字节，{} 个元素", xml.len(), doc.len()),
        ),
        Err(e) => PerformanceResult::new(
            "XML解析",
            duration.as_millis(),
            false,
            &format!("解析失败: {}", e),
        ),
    }
}

/// 测试影子树构建性能
pub fn benchmark_shadow_tree_build(editor: &XmlEditor) -> PerformanceResult {
    let start = Instant::now();
    let tree = build_shadow_tree(editor);
    let duration = start.elapsed();

    PerformanceResult::new(
        "影子树构建",
        duration.as_millis(),
        !tree.is_empty(),
        &format!("构建了 {} 行", tree.len()),
    )
}

/// 测试回写性能（未编辑的显示树整体回写）
pub fn benchmark_reconcile(editor: &mut XmlEditor) -> PerformanceResult {
    let tree = build_shadow_tree(editor);
    let start = Instant::now();
    let report = reconcile(&tree, editor);
    let duration = start.elapsed();

    PerformanceResult::new(
        "影子树回写",
        duration.as_millis(),
        report.is_clean(),
        &format!(
            "回写了 {} 个元素，{} 个属性",
            report.elements_visited, report.attributes_applied
        ),
    )
}

/// 测试序列化性能
pub fn benchmark_serialization(editor: &XmlEditor) -> PerformanceResult {
    let start = Instant::now();
    let result = editor.to_xml_string();
    let duration = start.elapsed();

    match result {
        Ok(xml) => PerformanceResult::new(
            "XML序列化",
            duration.as_millis(),
            true,
            &format!("序列化了 {} 字节", xml.len()),
        ),
        Err(e) => PerformanceResult::new(
            "XML序列化",
            duration.as_millis(),
            false,
            &format!("序列化失败: {}", e),
        ),
    }
}

/// 默认测试规模：(场景数, 每个场景的选项数)
pub const DEFAULT_SUITE_SIZES: [(usize, usize); 3] = [
    (50, 3),    // 小型
    (500, 5),   // 中型
    (5000, 8),  // 大型
];

/// 运行综合性能测试（默认规模）
pub fn run_performance_suite() -> Vec<PerformanceResult> {
    run_performance_suite_with(&DEFAULT_SUITE_SIZES)
}

/// 按给定规模运行：每个规模依次生成、解析、构建影子树、回写、序列化
pub fn run_performance_suite_with(sizes: &[(usize, usize)]) -> Vec<PerformanceResult> {
    let mut results = Vec::new();

    for &(scenes, choices) in sizes {
        tracing::info!("测试规模：{} 个场景，每个 {} 个选项", scenes, choices);

        let start = Instant::now();
        let xml = generate_large_novel(scenes, choices);
        results.push(PerformanceResult::new(
            &format!("数据生成({}x{})", scenes, choices),
            start.elapsed().as_millis(),
            true,
            &format!("生成了 {} 字节", xml.len()),
        ));

        results.push(benchmark_xml_parsing(&xml));

        let mut editor = XmlEditor::new();
        match parse_document(&xml) {
            Ok(doc) => editor.replace_document(doc),
            Err(e) => {
                tracing::error!("生成的文档无法解析: {}", e);
                continue;
            }
        }
        results.push(benchmark_shadow_tree_build(&editor));
        results.push(benchmark_reconcile(&mut editor));
        results.push(benchmark_serialization(&editor));
    }

    for r in &results {
        tracing::info!("{}: {}ms {}", r.operation, r.duration_ms, r.details);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_large_novel() {
        let xml = generate_large_novel(3, 2);
        let doc = parse_document(&xml).expect("生成的文档应可解析");
        // 根 + 3 × (scene + text + 2 choice)
        assert_eq!(doc.len(), 1 + 3 * 4);
    }

    #[test]
    fn test_performance_benchmarks() {
        let xml = generate_large_novel(20, 3);

        let parse_result = benchmark_xml_parsing(&xml);
        assert!(parse_result.success, "{}", parse_result.details);
        assert!(parse_result.duration_ms < 1000); // 应该在1秒内完成

        let mut editor = XmlEditor::new();
        editor.replace_document(parse_document(&xml).unwrap());

        let tree_result = benchmark_shadow_tree_build(&editor);
        assert!(tree_result.success);
        assert!(tree_result.duration_ms < 1000);

        let reconcile_result = benchmark_reconcile(&mut editor);
        assert!(reconcile_result.success, "{}", reconcile_result.details);

        let serialize_result = benchmark_serialization(&editor);
        assert!(serialize_result.success);
    }

    #[test]
    fn test_run_performance_suite_small() {
        let results = run_performance_suite_with(&[(5, 2), (30, 3)]);
        // 每个规模：生成、解析、构建、回写、序列化
        assert_eq!(results.len(), 2 * 5);
        for r in &results {
            assert!(r.success, "{} 失败: {}", r.operation, r.details);
        }
        assert!(results[0].operation.contains("5x2"));
    }

    #[test]
    fn test_run_performance_suite_default() {
        let results = run_performance_suite();
        assert_eq!(results.len(), DEFAULT_SUITE_SIZES.len() * 5);
        assert!(results.iter().all(|r| r.success));
    }

    #[test]
    fn test_parse_failure_is_reported() {
        let result = benchmark_xml_parsing("<novel>");
        assert!(!result.success);
        assert!(result.details.contains("解析失败"));
    }
}
