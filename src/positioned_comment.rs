//! 定位弹幕（模式 7）的 ASS 输出
//!
//! 坐标先从旧版播放器舞台按比例映射到画面，存在旋转时再做透视投影。

use std::fmt::Write as FmtWrite;

use crate::ass_generator::{opacity_to_alpha, push_color, write_dialogue};
use crate::error::ConvertError;
use crate::flash_rotation::{
    FlashRotation, PLAYER_HEIGHT, PLAYER_WIDTH, convert_flash_rotation, zoom_factor,
};
use crate::types::{
    CommentKind, CommentRecord, PlacedArgs, PlacedCoord, PlacedPayload, RenderConfig,
};
use crate::utils::ass_escape;

/// 播放器坐标到画面坐标的映射。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageMapping {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl StageMapping {
    #[must_use]
    pub fn new(config: &RenderConfig) -> Self {
        let (scale, offset_x, offset_y) = zoom_factor(
            (PLAYER_WIDTH, PLAYER_HEIGHT),
            (f64::from(config.stage_width), f64::from(config.stage_height)),
        );
        Self {
            scale,
            offset_x,
            offset_y,
        }
    }

    #[must_use]
    pub fn x(&self, coord: PlacedCoord) -> f64 {
        self.map(coord, PLAYER_WIDTH) + self.offset_x
    }

    #[must_use]
    pub fn y(&self, coord: PlacedCoord) -> f64 {
        self.map(coord, PLAYER_HEIGHT) + self.offset_y
    }

    fn map(&self, coord: PlacedCoord, player_extent: f64) -> f64 {
        match coord {
            PlacedCoord::Absolute(v) => self.scale * v,
            PlacedCoord::Relative(v) => player_extent * self.scale * v,
        }
    }
}

/// 写入一条定位弹幕。纯文本载荷按默认参数显示在左上角。
pub fn write_positioned_comment(
    out: &mut String,
    record: &CommentRecord,
    config: &RenderConfig,
    style_id: &str,
) -> Result<(), ConvertError> {
    let plain;
    let args: &PlacedArgs = match &record.kind {
        CommentKind::Placed(PlacedPayload::Structured(args)) => args,
        CommentKind::Placed(PlacedPayload::PlainText(text)) => {
            plain = PlacedArgs::plain(text);
            &plain
        }
        CommentKind::Scroll(_) | CommentKind::Fixed(_) => {
            return Err(ConvertError::InvalidFormat(format!(
                "模式 {} 的弹幕不是定位弹幕",
                record.raw_mode
            )));
        }
    };

    let styles = placed_styles(record, args, config)?;
    write_dialogue(
        out,
        -1,
        record.time,
        record.time + args.lifetime_ms / 1000.0,
        style_id,
        &styles,
        &ass_escape(&args.text),
    )
}

/// 生成定位弹幕的覆盖标签。
pub fn placed_styles(
    record: &CommentRecord,
    args: &PlacedArgs,
    config: &RenderConfig,
) -> Result<String, ConvertError> {
    let mapping = StageMapping::new(config);
    let width = f64::from(config.stage_width);
    let height = f64::from(config.stage_height);

    let from = (mapping.x(args.from_x), mapping.y(args.from_y));
    let to = (mapping.x(args.to_x), mapping.y(args.to_y));
    let moves = from != to;
    let start_ms = args.delay_ms;
    let end_ms = args.delay_ms + args.duration_ms;

    let mut styles = String::new();

    if args.rotate_y != 0 || args.rotate_z != 0 {
        let project = |(x, y): (f64, f64)| {
            convert_flash_rotation(args.rotate_y, args.rotate_z, x, y, width, height)
        };
        let from_rot = project(from);
        let to_rot = project(to);

        write!(
            styles,
            "\\org({}, {})",
            config.stage_width / 2,
            config.stage_height / 2
        )?;
        push_anchor(
            &mut styles,
            (from_rot.x, from_rot.y),
            (to_rot.x, to_rot.y),
            start_ms,
            end_ms,
        )?;
        push_rotation(&mut styles, &from_rot)?;
        if moves {
            write!(styles, "\\t({start_ms:.0}, {end_ms:.0}, ")?;
            push_rotation(&mut styles, &to_rot)?;
            styles.push(')');
        }
    } else {
        push_anchor(&mut styles, from, to, start_ms, end_ms)?;
    }

    if let Some(face) = &args.font_face {
        write!(styles, "\\fn{}", ass_escape(face))?;
    }
    let font_size = args.font_size.unwrap_or(record.font_size) * mapping.scale;
    write!(styles, "\\fs{font_size:.0}")?;
    push_color(&mut styles, record.color)?;

    let from_alpha = opacity_to_alpha(args.from_alpha);
    let to_alpha = opacity_to_alpha(args.to_alpha);
    if from_alpha == to_alpha {
        write!(styles, "\\alpha&H{from_alpha:02X}&")?;
    } else {
        let lifetime = args.lifetime_ms;
        write!(
            styles,
            "\\fade({from_alpha}, {to_alpha}, {to_alpha}, 0, {lifetime:.0}, {lifetime:.0}, {lifetime:.0})"
        )?;
    }

    if !args.border {
        styles.push_str("\\bord0");
    }
    Ok(styles)
}

fn push_anchor(
    styles: &mut String,
    from: (f64, f64),
    to: (f64, f64),
    start_ms: f64,
    end_ms: f64,
) -> Result<(), ConvertError> {
    if from == to {
        write!(styles, "\\pos({:.0}, {:.0})", from.0, from.1)?;
    } else {
        write!(
            styles,
            "\\move({:.0}, {:.0}, {:.0}, {:.0}, {start_ms:.0}, {end_ms:.0})",
            from.0, from.1, to.0, to.1
        )?;
    }
    Ok(())
}

fn push_rotation(styles: &mut String, rot: &FlashRotation) -> Result<(), ConvertError> {
    write!(
        styles,
        "\\frx{:.0}\\fry{:.0}\\frz{:.0}\\fscx{:.0}\\fscy{:.0}",
        rot.rot_x, rot.rot_y, rot.rot_z, rot.scale, rot.scale
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placed_payload::decode_placed_payload;

    /// 与播放器舞台尺寸相同的画面，坐标映射为恒等变换。
    fn player_config() -> RenderConfig {
        RenderConfig {
            stage_width: 672,
            stage_height: 438,
            ..RenderConfig::default()
        }
    }

    fn placed(time: f64, payload: &str) -> CommentRecord {
        CommentRecord {
            time,
            raw_mode: 7,
            kind: CommentKind::Placed(decode_placed_payload(payload)),
            color: 0xffffff,
            font_size: 25.0,
            text: payload.to_string(),
            estimated_width: 0.0,
            estimated_height: 0.0,
        }
    }

    fn emit(record: &CommentRecord, config: &RenderConfig) -> String {
        let mut out = String::new();
        write_positioned_comment(&mut out, record, config, "S").unwrap();
        out
    }

    #[test]
    fn test_fade_when_alpha_differs() {
        let line = emit(&placed(1.0, r#"{"x":10,"y":20,"alpha":"1-0"}"#), &player_config());
        assert_eq!(
            line,
            "Dialogue: -1,0:00:01.00,0:00:05.50,S,,0000,0000,0000,,{\\pos(10, 20)\\fs25\\fade(0, 255, 255, 0, 4500, 4500, 4500)}\n"
        );
    }

    #[test]
    fn test_static_alpha() {
        let line = emit(
            &placed(0.0, r#"{"text":"hi","x":0.5,"y":0.5,"alpha":"0.6"}"#),
            &player_config(),
        );
        assert!(line.contains("{\\pos(336, 219)\\fs25\\alpha&H66&}hi"), "{line}");
        assert!(!line.contains("\\fade"));
    }

    #[test]
    fn test_moving_with_delay() {
        let line = emit(
            &placed(
                0.0,
                r#"{"text":"走","x":0,"y":0,"to_x":100,"to_y":50,"duration":2000,"delay":500,"border":false}"#,
            ),
            &player_config(),
        );
        assert!(line.contains("\\move(0, 0, 100, 50, 500, 2500)"), "{line}");
        assert!(line.ends_with("\\bord0}走\n"), "{line}");
    }

    #[test]
    fn test_zoom_applies_to_position_and_size() {
        let config = RenderConfig {
            stage_width: 1344,
            stage_height: 876,
            ..RenderConfig::default()
        };
        let line = emit(&placed(0.0, r#"{"text":"x","x":10,"y":20,"size":30}"#), &config);
        assert!(line.contains("{\\pos(20, 40)\\fs60\\alpha&H00&}x"), "{line}");
    }

    #[test]
    fn test_rotation_tags() {
        let line = emit(
            &placed(0.0, r#"{"text":"转","x":336,"y":219,"rotate_z":45}"#),
            &player_config(),
        );
        assert!(line.contains("\\org(336, 219)\\pos(336, 219)"), "{line}");
        assert!(line.contains("\\frx0\\fry0\\frz-45\\fscx100\\fscy100"), "{line}");
        assert!(!line.contains("\\t("));
    }

    #[test]
    fn test_rotated_moving_comment() {
        let line = emit(
            &placed(
                0.0,
                r#"{"text":"r","x":100,"y":100,"to_x":300,"to_y":200,"rotate_y":30,"rotate_z":20,"duration":1000,"delay":200}"#,
            ),
            &player_config(),
        );
        assert_eq!(
            line,
            "Dialogue: -1,0:00:00.00,0:00:04.50,S,,0000,0000,0000,,{\\org(336, 219)\\move(-319, 152, 285, 213, 200, 1200)\\frx10\\fry-28\\frz-17\\fscx216\\fscy216\\t(200, 1200, \\frx10\\fry-28\\frz-17\\fscx109\\fscy109)\\fs25\\alpha&H00&}r\n"
        );
    }

    #[test]
    fn test_plain_text_payload() {
        let line = emit(&placed(2.0, "纯文本/n第二行"), &player_config());
        assert_eq!(
            line,
            "Dialogue: -1,0:00:02.00,0:00:06.50,S,,0000,0000,0000,,{\\pos(0, 0)\\fs25\\alpha&H00&}纯文本\\N第二行\n"
        );
    }

    #[test]
    fn test_custom_font_and_color() {
        let mut record = placed(0.0, r#"{"text":"x","font":"Noto Sans{}"}"#);
        record.color = 0x000000;
        let line = emit(&record, &player_config());
        assert!(
            line.contains("\\fnNoto Sans\\{\\}\\fs25\\c&H000000&\\3c&HFFFFFF&"),
            "{line}"
        );
    }

    #[test]
    fn test_trajectory_record_is_rejected() {
        let mut record = placed(0.0, "x");
        record.kind = CommentKind::Scroll(crate::types::ScrollDirection::Leftward);
        let mut out = String::new();
        assert!(write_positioned_comment(&mut out, &record, &player_config(), "S").is_err());
        assert!(out.is_empty());
    }
}
