use std::fmt::Write as FmtWrite;

use crate::error::ConvertError;
use crate::lane_scheduler::LaneOccupancy;
use crate::positioned_comment::write_positioned_comment;
use crate::types::{CommentKind, CommentRecord, FixedEdge, RenderConfig, ScrollDirection};
use crate::utils::{ass_escape, convert_color, format_ass_time};

/// 样式名前缀，后接 4 位十六进制随机数。
pub const STYLE_PREFIX: &str = "Danmaku2ASS_";

/// 每处理这么多条弹幕报告一次进度。
const PROGRESS_INTERVAL: usize = 100;

/// 生成结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssDocument {
    pub content: String,
    /// 写出的 Dialogue 行数。
    pub emitted: usize,
    /// 因轨道饱和被丢弃的弹幕数。
    pub shed: usize,
}

/// 根据渲染配置写入 `[Script Info]`、`[V4+ Styles]` 和 `[Events]` 头部。
pub fn write_ass_header(
    out: &mut String,
    config: &RenderConfig,
    style_id: &str,
) -> Result<(), ConvertError> {
    let width = config.stage_width;
    let height = config.stage_height;
    let font_size = config.base_font_size();
    let outline = (font_size / 25.0).max(1.0);
    let alpha = opacity_to_alpha(config.text_opacity);

    writeln!(out, "[Script Info]")?;
    writeln!(out, "; Script generated by danmaku2ass")?;
    writeln!(out, "ScriptType: v4.00+")?;
    writeln!(out, "PlayResX: {width}")?;
    writeln!(out, "PlayResY: {height}")?;
    writeln!(out, "Aspect Ratio: {width}:{height}")?;
    writeln!(out, "Collisions: Normal")?;
    writeln!(out, "WrapStyle: 2")?;
    writeln!(out, "ScaledBorderAndShadow: yes")?;
    writeln!(out, "YCbCr Matrix: TV.601")?;
    writeln!(out)?;

    writeln!(out, "[V4+ Styles]")?;
    writeln!(
        out,
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding"
    )?;
    writeln!(
        out,
        "Style: {style_id}, {face}, {font_size:.0}, &H{alpha:02X}FFFFFF, &H{alpha:02X}FFFFFF, &H{alpha:02X}000000, &H{alpha:02X}000000, 0, 0, 0, 0, 100, 100, 0.00, 0.00, 1, {outline:.0}, 0, 7, 0, 0, 0, 0",
        face = config.font_face,
    )?;
    writeln!(out)?;

    writeln!(out, "[Events]")?;
    writeln!(
        out,
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
    )?;
    Ok(())
}

/// 不透明度 (0.0 - 1.0) 转为 ASS 的透明度 (0 = 不透明, 255 = 全透明)。
#[must_use]
pub fn opacity_to_alpha(opacity: f64) -> u8 {
    let alpha = 255.0 - (opacity.clamp(0.0, 1.0) * 255.0).round();
    alpha as u8
}

/// 字号与颜色的覆盖标签，与样式默认值相同时省略。
pub(crate) fn push_size_and_color(
    styles: &mut String,
    font_size: f64,
    color: u32,
    base_font_size: f64,
) -> Result<(), ConvertError> {
    if (font_size - base_font_size).abs() > 1.0 {
        write!(styles, "\\fs{font_size:.0}")?;
    }
    push_color(styles, color)
}

pub(crate) fn push_color(styles: &mut String, color: u32) -> Result<(), ConvertError> {
    if color != 0xffffff {
        write!(styles, "\\c&H{}&", convert_color(color))?;
        // 黑色文字加白色描边
        if color == 0x000000 {
            styles.push_str("\\3c&HFFFFFF&");
        }
    }
    Ok(())
}

/// 写入一条滚动弹幕，在滚动时长内从画面一侧移动到另一侧。
pub fn write_moving_comment(
    out: &mut String,
    record: &CommentRecord,
    direction: ScrollDirection,
    row: usize,
    config: &RenderConfig,
    style_id: &str,
) -> Result<(), ConvertError> {
    let width = config.stage_width;
    let length = record.estimated_width;
    let mut styles = match direction {
        ScrollDirection::Leftward => format!("\\move({width}, {row}, {:.0}, {row})", -length),
        ScrollDirection::Rightward => format!("\\move({:.0}, {row}, {width}, {row})", -length),
    };
    push_size_and_color(
        &mut styles,
        record.font_size,
        record.color,
        config.base_font_size(),
    )?;

    write_dialogue(
        out,
        2,
        record.time,
        record.time + config.duration_marquee,
        style_id,
        &styles,
        &ass_escape(&record.text),
    )
}

/// 写入一条固定弹幕：水平居中，顶端弹幕从上往下排，底端弹幕从下往上排。
pub fn write_still_comment(
    out: &mut String,
    record: &CommentRecord,
    edge: FixedEdge,
    row: usize,
    config: &RenderConfig,
    style_id: &str,
) -> Result<(), ConvertError> {
    let center = config.stage_width / 2;
    let mut styles = match edge {
        FixedEdge::Top => format!("\\an8\\pos({center}, {row})"),
        FixedEdge::Bottom => {
            let y = (config.stage_height as usize).saturating_sub(row);
            format!("\\an2\\pos({center}, {y})")
        }
    };
    push_size_and_color(
        &mut styles,
        record.font_size,
        record.color,
        config.base_font_size(),
    )?;

    write_dialogue(
        out,
        2,
        record.time,
        record.time + config.duration_still,
        style_id,
        &styles,
        &ass_escape(&record.text),
    )
}

pub(crate) fn write_dialogue(
    out: &mut String,
    layer: i32,
    start: f64,
    end: f64,
    style_id: &str,
    styles: &str,
    text: &str,
) -> Result<(), ConvertError> {
    writeln!(
        out,
        "Dialogue: {layer},{},{},{style_id},,0000,0000,0000,,{{{styles}}}{text}",
        format_ass_time(start),
        format_ass_time(end),
    )?;
    Ok(())
}

/// 按输入顺序为所有弹幕分配轨道并生成完整的 ASS 文档。
///
/// `progress` 每 100 条弹幕收到一次 0 - 100 的进度，结束时收到 100。
pub fn generate_ass<F>(
    records: &[CommentRecord],
    config: &RenderConfig,
    style_id: &str,
    mut progress: F,
) -> Result<AssDocument, ConvertError>
where
    F: FnMut(u32),
{
    let mut content = String::with_capacity(records.len() * 120 + 1024);
    write_ass_header(&mut content, config, style_id)?;

    let mut lanes = LaneOccupancy::new(config);
    let mut emitted = 0;
    let mut shed = 0;

    for (index, record) in records.iter().enumerate() {
        if index % PROGRESS_INTERVAL == 0 {
            progress((index * 100 / records.len()) as u32);
        }

        let written = match &record.kind {
            CommentKind::Placed(_) => {
                Some(write_positioned_comment(&mut content, record, config, style_id)?)
            }
            CommentKind::Scroll(direction) => lanes
                .schedule(record)
                .map(|row| {
                    write_moving_comment(&mut content, record, *direction, row, config, style_id)
                })
                .transpose()?,
            CommentKind::Fixed(edge) => lanes
                .schedule(record)
                .map(|row| write_still_comment(&mut content, record, *edge, row, config, style_id))
                .transpose()?,
        };

        if written.is_some() {
            emitted += 1;
        } else {
            log::debug!(
                target: "danmaku::layout",
                "轨道已满，丢弃 @{:.2}s: {}",
                record.time,
                record.text
            );
            shed += 1;
        }
    }

    progress(100);
    log::info!(
        target: "danmaku::layout",
        "生成了 {emitted} 条弹幕，{shed} 条因轨道已满被丢弃"
    );

    Ok(AssDocument {
        content,
        emitted,
        shed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: f64, kind: CommentKind, text: &str, color: u32) -> CommentRecord {
        CommentRecord {
            time,
            raw_mode: 1,
            kind,
            color,
            font_size: 23.0,
            text: text.to_string(),
            estimated_width: 23.0 * text.chars().count() as f64,
            estimated_height: 23.0,
        }
    }

    fn dialogues(content: &str) -> Vec<&str> {
        content
            .lines()
            .filter(|line| line.starts_with("Dialogue:"))
            .collect()
    }

    #[test]
    fn test_header() {
        let mut header = String::new();
        write_ass_header(&mut header, &RenderConfig::default(), "Danmaku2ASS_test").unwrap();
        insta::assert_snapshot!(header, @r"
        [Script Info]
        ; Script generated by danmaku2ass
        ScriptType: v4.00+
        PlayResX: 1080
        PlayResY: 720
        Aspect Ratio: 1080:720
        Collisions: Normal
        WrapStyle: 2
        ScaledBorderAndShadow: yes
        YCbCr Matrix: TV.601

        [V4+ Styles]
        Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
        Style: Danmaku2ASS_test, sans-serif, 23, &H66FFFFFF, &H66FFFFFF, &H66000000, &H66000000, 0, 0, 0, 0, 100, 100, 0.00, 0.00, 1, 1, 0, 7, 0, 0, 0, 0

        [Events]
        Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
        ");
    }

    #[test]
    fn test_opacity_to_alpha() {
        assert_eq!(opacity_to_alpha(1.0), 0);
        assert_eq!(opacity_to_alpha(0.0), 255);
        assert_eq!(opacity_to_alpha(0.6), 0x66);
        assert_eq!(opacity_to_alpha(3.0), 0);
    }

    #[test]
    fn test_moving_comments() {
        let config = RenderConfig::default();
        let records = vec![
            record(0.0, CommentKind::Scroll(ScrollDirection::Leftward), "A", 0xffffff),
            record(0.0, CommentKind::Scroll(ScrollDirection::Leftward), "B", 0xffffff),
            record(1.0, CommentKind::Scroll(ScrollDirection::Rightward), "C", 0xff0000),
        ];
        let doc = generate_ass(&records, &config, "S", |_| {}).unwrap();
        assert_eq!(doc.emitted, 3);
        assert_eq!(doc.shed, 0);
        assert_eq!(
            dialogues(&doc.content),
            vec![
                "Dialogue: 2,0:00:00.00,0:00:12.00,S,,0000,0000,0000,,{\\move(1080, 0, -23, 0)}A",
                "Dialogue: 2,0:00:00.00,0:00:12.00,S,,0000,0000,0000,,{\\move(1080, 23, -23, 23)}B",
                "Dialogue: 2,0:00:01.00,0:00:13.00,S,,0000,0000,0000,,{\\move(-23, 0, 1080, 0)\\c&H0000FF&}C",
            ]
        );
    }

    #[test]
    fn test_still_comments() {
        let config = RenderConfig::default();
        let mut big = record(0.5, CommentKind::Fixed(FixedEdge::Bottom), "底", 0x000000);
        big.font_size = 36.0;
        let records = vec![
            record(0.0, CommentKind::Fixed(FixedEdge::Top), "顶", 0xffffff),
            big,
        ];
        let doc = generate_ass(&records, &config, "S", |_| {}).unwrap();
        assert_eq!(
            dialogues(&doc.content),
            vec![
                "Dialogue: 2,0:00:00.00,0:00:06.00,S,,0000,0000,0000,,{\\an8\\pos(540, 0)}顶",
                "Dialogue: 2,0:00:00.50,0:00:06.50,S,,0000,0000,0000,,{\\an2\\pos(540, 720)\\fs36\\c&H000000&\\3c&HFFFFFF&}底",
            ]
        );
    }

    #[test]
    fn test_saturation_is_counted() {
        let config = RenderConfig {
            stage_height: 46,
            reserve_blank: 0.0,
            ..RenderConfig::default()
        };
        let records: Vec<CommentRecord> = (0..3)
            .map(|_| record(0.0, CommentKind::Fixed(FixedEdge::Top), "满", 0xffffff))
            .collect();
        let doc = generate_ass(&records, &config, "S", |_| {}).unwrap();
        assert_eq!(doc.emitted, 2);
        assert_eq!(doc.shed, 1);
        assert_eq!(dialogues(&doc.content).len(), 2);
    }

    #[test]
    fn test_progress_reports() {
        let records: Vec<CommentRecord> = (0..250)
            .map(|i| {
                record(
                    f64::from(i),
                    CommentKind::Scroll(ScrollDirection::Leftward),
                    "x",
                    0xffffff,
                )
            })
            .collect();
        let mut seen = Vec::new();
        generate_ass(&records, &RenderConfig::default(), "S", |p| seen.push(p)).unwrap();
        assert_eq!(seen, vec![0, 40, 80, 100]);
    }
}
