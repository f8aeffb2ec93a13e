//! XML 弹幕解析器
//!
//! 支持 B 站两种弹幕文件布局。格式依据文件开头的 XML 声明判断，与扩展名无关：
//!
//! - `Bilibili`：`<?xml version="1.0" ...?><i>`，`p` 属性为
//!   `时间(秒),模式,字号,颜色,发送时间,弹幕池,用户哈希,行号`；
//! - `Bilibili2`：`<?xml version="2.0" ...?><i>`，`p` 属性为
//!   `id,?,时间(毫秒),模式,字号,颜色,发送时间,...`。

use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use crate::error::ConvertError;
use crate::placed_payload::decode_placed_payload;
use crate::types::{
    CommentKind, CommentRecord, DEFAULT_PLACED_FONT_SIZE, FixedEdge, IngestReport, SchemaVariant,
    ScrollDirection,
};
use crate::utils::{line_count, text_length};

/// 格式检测只查看文件开头的这部分内容。
const HEADER_SCAN_LEN: usize = 128;

/// 字号按此基准缩放：源文件中的 25 号字对应配置的基础字号。
const SOURCE_BASE_FONT_SIZE: f64 = 25.0;

const MODE_SCRIPT: u8 = 8;

// 允许 BOM、声明前的空白、单双引号以及声明与容器元素之间的空白。
static XML_DECL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\u{feff}?\s*<\?xml\s+version\s*=\s*["']([12])\.0["'][^>]*\?>\s*<i[\s>/]"#)
        .expect("未能编译 XML_DECL_REGEX")
});

/// `p` 属性中各字段的位置。
struct FieldLayout {
    min_fields: usize,
    time: usize,
    /// 时间字段的单位换算到秒的除数。
    time_divisor: f64,
    mode: usize,
    size: usize,
    color: usize,
}

const LAYOUT_BILIBILI: FieldLayout = FieldLayout {
    min_fields: 5,
    time: 0,
    time_divisor: 1.0,
    mode: 1,
    size: 2,
    color: 3,
};

const LAYOUT_BILIBILI2: FieldLayout = FieldLayout {
    min_fields: 7,
    time: 2,
    time_divisor: 1000.0,
    mode: 3,
    size: 4,
    color: 5,
};

impl SchemaVariant {
    const fn field_layout(self) -> &'static FieldLayout {
        match self {
            Self::Bilibili2 => &LAYOUT_BILIBILI2,
            Self::Bilibili | Self::Unknown => &LAYOUT_BILIBILI,
        }
    }
}

/// 单条 `<d>` 元素的处理结果。
enum EntryOutcome {
    Record(CommentRecord),
    Script,
    Malformed(&'static str),
}

/// 根据文件开头的 XML 声明检测弹幕格式。
#[must_use]
pub fn detect_schema(content: &str) -> SchemaVariant {
    let mut end = content.len().min(HEADER_SCAN_LEN);
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    let head = &content[..end];

    match XML_DECL_REGEX
        .captures(head)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    {
        Some("1") => SchemaVariant::Bilibili,
        Some("2") => SchemaVariant::Bilibili2,
        _ => SchemaVariant::Unknown,
    }
}

/// 解析弹幕文件内容。
///
/// # 参数
///
/// * `content` - 弹幕 XML 文本。
/// * `base_font_size` - 配置的基础字号，字号字段无法解析时使用。
///
/// # 返回
///
/// * `Ok(IngestReport)` - 按文件顺序排列的弹幕以及解析统计。
/// * `Err(ConvertError::InvalidFormat)` - 找不到 `<i>` 容器元素。
///
/// 单条弹幕字段不足或数值无法解析时只丢弃该条，不影响整个文件。
pub fn parse_danmaku_xml(content: &str, base_font_size: f64) -> Result<IngestReport, ConvertError> {
    let schema = detect_schema(content);
    log::info!(target: "danmaku::parser", "检测到弹幕格式: {schema}");

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let container_has_children = loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"i" => break true,
            Ok(Event::Empty(e)) if e.name().as_ref() == b"i" => break false,
            Ok(Event::Eof) => {
                return Err(ConvertError::InvalidFormat(
                    "未找到弹幕容器元素 <i>".to_string(),
                ));
            }
            Err(e) => {
                return Err(ConvertError::InvalidFormat(format!(
                    "在位置 {} 处 XML 解析失败: {e}",
                    reader.error_position()
                )));
            }
            Ok(_) => {}
        }
    };

    let mut report = IngestReport {
        schema,
        records: Vec::with_capacity(content.matches("<d ").count()),
        total_entries: 0,
        script_dropped: 0,
        malformed_dropped: 0,
    };

    if !container_has_children {
        return Ok(report);
    }

    let layout = schema.field_layout();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"d" => {
                report.total_entries += 1;
                let attr = read_p_attribute(&e, reader.decoder());
                let text = match read_comment_text(&mut reader) {
                    Ok(text) => text,
                    Err(err) => {
                        log::warn!(target: "danmaku::parser", "读取弹幕文本失败，停止解析: {err}");
                        report.malformed_dropped += 1;
                        break;
                    }
                };
                let outcome = match attr {
                    Some(p) => build_record(&p, text, layout, base_font_size),
                    None => EntryOutcome::Malformed("缺少 p 属性"),
                };
                tally(&mut report, outcome);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"d" => {
                report.total_entries += 1;
                tally(&mut report, EntryOutcome::Malformed("弹幕文本为空"));
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"i" => break,
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!(
                    target: "danmaku::parser",
                    "在位置 {} 处 XML 解析失败，保留已解析的 {} 条弹幕: {e}",
                    reader.error_position(),
                    report.records.len()
                );
                break;
            }
            Ok(_) => {}
        }
    }

    log::info!(
        target: "danmaku::parser",
        "共 {} 条弹幕: 有效 {}，脚本弹幕 {}，格式错误 {}",
        report.total_entries,
        report.records.len(),
        report.script_dropped,
        report.malformed_dropped
    );

    Ok(report)
}

fn tally(report: &mut IngestReport, outcome: EntryOutcome) {
    match outcome {
        EntryOutcome::Record(record) => report.records.push(record),
        EntryOutcome::Script => report.script_dropped += 1,
        EntryOutcome::Malformed(reason) => {
            log::debug!(target: "danmaku::parser", "丢弃第 {} 条弹幕: {reason}", report.total_entries);
            report.malformed_dropped += 1;
        }
    }
}

fn read_p_attribute(e: &BytesStart<'_>, decoder: Decoder) -> Option<String> {
    let attr = e.try_get_attribute("p").ok()??;
    attr.decode_and_unescape_value(decoder)
        .ok()
        .map(|v| v.into_owned())
}

/// 读取 `<d>` 元素内的文本，直到对应的结束标签。
fn read_comment_text(reader: &mut Reader<&[u8]>) -> Result<String, quick_xml::Error> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(t) => match t.unescape() {
                Ok(s) => text.push_str(&s),
                // 含未知实体时保留原始文本
                Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
            },
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(e) if e.name().as_ref() == b"d" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(text)
}

fn build_record(
    p: &str,
    text: String,
    layout: &FieldLayout,
    base_font_size: f64,
) -> EntryOutcome {
    let fields: Vec<&str> = p.split(',').map(str::trim).collect();
    if fields.len() < layout.min_fields {
        return EntryOutcome::Malformed("p 属性字段不足");
    }

    let Ok(raw_mode) = fields[layout.mode].parse::<u8>() else {
        return EntryOutcome::Malformed("无法解析弹幕模式");
    };
    if raw_mode == MODE_SCRIPT {
        return EntryOutcome::Script;
    }

    let Some(time) = fields[layout.time]
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .map(|t| t / layout.time_divisor)
    else {
        return EntryOutcome::Malformed("无法解析弹幕时间");
    };

    let Ok(color) = fields[layout.color].parse::<i64>() else {
        return EntryOutcome::Malformed("无法解析弹幕颜色");
    };
    let color = (color & 0x00ff_ffff) as u32;

    if text.is_empty() {
        return EntryOutcome::Malformed("弹幕文本为空");
    }

    let declared_size = fields[layout.size]
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s > 0.0);

    let kind = match raw_mode {
        1 => CommentKind::Scroll(ScrollDirection::Leftward),
        4 => CommentKind::Fixed(FixedEdge::Bottom),
        5 => CommentKind::Fixed(FixedEdge::Top),
        6 => CommentKind::Scroll(ScrollDirection::Rightward),
        7 => {
            // 定位弹幕使用源文件字号，不按基础字号缩放
            let font_size = declared_size.unwrap_or(DEFAULT_PLACED_FONT_SIZE);
            return EntryOutcome::Record(CommentRecord {
                time,
                raw_mode,
                kind: CommentKind::Placed(decode_placed_payload(&text)),
                color,
                font_size,
                text,
                estimated_width: 0.0,
                estimated_height: 0.0,
            });
        }
        _ => return EntryOutcome::Malformed("未知的弹幕模式"),
    };

    let text = text.replace("/n", "\n");
    let font_size =
        declared_size.map_or(base_font_size, |s| s * base_font_size / SOURCE_BASE_FONT_SIZE);

    EntryOutcome::Record(CommentRecord {
        time,
        raw_mode,
        kind,
        color,
        font_size,
        estimated_width: text_length(&text) as f64 * font_size,
        estimated_height: line_count(&text) as f64 * font_size,
        text,
    })
}
