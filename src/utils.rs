use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConvertError;

/// 用于替换行首空格的数字空格 (U+2007)，避免渲染器吞掉前导空白。
const FIGURE_SPACE: char = '\u{2007}';

// H:MM:SS.CC
static ASS_TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+):(\d{2}):(\d{2})\.(\d{2})\s*$").expect("未能编译 ASS_TIME_REGEX")
});

/// 将秒数格式化为 ASS 时间字符串 `H:MM:SS.CC`。
///
/// 先四舍五入到最近的厘秒，再分解为时、分、秒、厘秒。负数按 0 处理。
#[must_use]
pub fn format_ass_time(seconds: f64) -> String {
    let total_cs = (seconds * 100.0).round().max(0.0) as u64;
    let cs = total_cs % 100;
    let total_seconds = total_cs / 100;
    let secs = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let minutes = total_minutes % 60;
    let hours = total_minutes / 60;
    format!("{hours}:{minutes:02}:{secs:02}.{cs:02}")
}

/// 解析 ASS 时间字符串 (H:MM:SS.CC)，返回秒数。
pub fn parse_ass_time(time_str: &str) -> Result<f64, ConvertError> {
    let caps = ASS_TIME_REGEX
        .captures(time_str)
        .ok_or_else(|| ConvertError::InvalidTime(time_str.to_string()))?;

    let field = |idx: usize| -> Result<u64, ConvertError> {
        caps[idx]
            .parse::<u64>()
            .map_err(|_| ConvertError::InvalidTime(time_str.to_string()))
    };
    let (h, m, s, cs) = (field(1)?, field(2)?, field(3)?, field(4)?);
    if m >= 60 || s >= 60 {
        return Err(ConvertError::InvalidTime(time_str.to_string()));
    }

    let total_cs = ((h * 60 + m) * 60 + s) * 100 + cs;
    Ok(total_cs as f64 / 100.0)
}

/// 将 24 位 RGB 颜色转换为 ASS 使用的 `BBGGRR` 十六进制表示。
#[must_use]
pub fn convert_color(rgb: u32) -> String {
    match rgb & 0x00ff_ffff {
        0x000000 => "000000".to_string(),
        0xffffff => "FFFFFF".to_string(),
        rgb => {
            let r = (rgb >> 16) & 0xff;
            let g = (rgb >> 8) & 0xff;
            let b = rgb & 0xff;
            format!("{b:02X}{g:02X}{r:02X}")
        }
    }
}

/// 转义 ASS 文本。
///
/// - `\`、`{`、`}` 前加反斜杠；
/// - 换行替换为 `\N`；
/// - 每行的前导空格替换为等量的 U+2007；
/// - 丢弃其余控制字符（制表符视为空格）。
#[must_use]
pub fn ass_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for ch in text.replace("\r\n", "\n").chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            '\t' => escaped.push(' '),
            '\n' => escaped.push('\n'),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }

    escaped
        .split('\n')
        .map(replace_leading_spaces)
        .collect::<Vec<_>>()
        .join("\\N")
}

fn replace_leading_spaces(line: &str) -> String {
    let rest = line.trim_start_matches(' ');
    let leading = line.len() - rest.len();
    if leading == 0 {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + leading * 2);
    out.extend(std::iter::repeat_n(FIGURE_SPACE, leading));
    out.push_str(rest);
    out
}

/// 最长一行的字符数。这只是字形宽度的粗略近似。
#[must_use]
pub fn text_length(text: &str) -> usize {
    text.split('\n')
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
}

#[must_use]
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}
