//! 文件级转换流程：读取 → 解析 → 过滤 → 排布 → 写出。
//!
//! 每次调用都拥有自己的记录列表和轨道占用表，调用之间不共享状态。

use std::fs;
use std::path::Path;

use crate::ass_generator::{STYLE_PREFIX, generate_ass};
use crate::comment_filter::{BlockFilter, suppress_duplicates};
use crate::danmaku_parser::parse_danmaku_xml;
use crate::error::{ConvertError, ConvertResult};
use crate::types::{ConversionSummary, RenderConfig};

/// 生成形如 `Danmaku2ASS_1a2b` 的随机样式名。
#[must_use]
pub fn random_style_id() -> String {
    format!("{STYLE_PREFIX}{:04x}", rand::random::<u16>())
}

/// 把弹幕 XML 文本转换为 ASS 文本。
///
/// 文档完整生成后才返回，任何错误都不会产生部分输出。
pub fn convert_str<F>(
    content: &str,
    config: &RenderConfig,
    style_id: &str,
    progress: F,
) -> ConvertResult<(String, ConversionSummary)>
where
    F: FnMut(u32),
{
    run_pipeline(content, config, style_id, progress).inspect_err(|err| {
        log::error!(target: "danmaku::convert", "弹幕转换失败: {err}");
    })
}

fn run_pipeline<F>(
    content: &str,
    config: &RenderConfig,
    style_id: &str,
    progress: F,
) -> ConvertResult<(String, ConversionSummary)>
where
    F: FnMut(u32),
{
    // 屏蔽规则先编译，避免在解析之后才发现配置错误
    let block_filter = BlockFilter::new(&config.block_patterns)?;

    let report = parse_danmaku_xml(content, config.base_font_size())?;
    let ingested = report.records.len();

    let (records, filtered) = block_filter.apply(report.records);
    let (records, suppressed) = if config.reduce_comments {
        suppress_duplicates(records)
    } else {
        (records, 0)
    };

    if records.is_empty() {
        return Err(ConvertError::EmptyResult);
    }

    let document = generate_ass(&records, config, style_id, progress)?;

    let summary = ConversionSummary {
        schema: report.schema.to_string(),
        ingested,
        script_dropped: report.script_dropped,
        malformed_dropped: report.malformed_dropped,
        filtered,
        suppressed,
        shed: document.shed,
        emitted: document.emitted,
    };
    log::info!(
        target: "danmaku::convert",
        "转换完成: 共 {} 条，输出 {} 条",
        summary.ingested,
        summary.emitted
    );

    Ok((document.content, summary))
}

/// 转换单个弹幕文件并写出 ASS 文件。
///
/// 输出文件的目录需要事先存在。
pub fn convert_file<F>(
    input: &Path,
    output: &Path,
    config: &RenderConfig,
    progress: F,
) -> ConvertResult<ConversionSummary>
where
    F: FnMut(u32),
{
    log::info!(target: "danmaku::convert", "开始转换 {}", input.display());

    let content = fs::read_to_string(input)
        .map_err(|source| ConvertError::InputUnreadable {
            path: input.to_path_buf(),
            source,
        })
        .inspect_err(|err| log::error!(target: "danmaku::convert", "{err}"))?;

    let style_id = random_style_id();
    let (ass, summary) = convert_str(&content, config, &style_id, progress)?;

    fs::write(output, ass)
        .map_err(|source| ConvertError::OutputUnwritable {
            path: output.to_path_buf(),
            source,
        })
        .inspect_err(|err| log::error!(target: "danmaku::convert", "{err}"))?;

    log::info!(target: "danmaku::convert", "已写出 {}", output.display());
    Ok(summary)
}
