//! 定位弹幕（模式 7）载荷解码
//!
//! 载荷可能是 JSON 对象、B 站实际使用的 JSON 数组，或者干脆是一段纯文本。
//! 解码在解析阶段完成一次，生成阶段不再重复处理。

use serde_json::{Map, Value};

use crate::types::{DEFAULT_PLACED_LIFETIME_MS, PlacedArgs, PlacedCoord, PlacedPayload};

// JSON 数组形式各字段的下标
const ARR_X: usize = 0;
const ARR_Y: usize = 1;
const ARR_ALPHA: usize = 2;
const ARR_LIFETIME_S: usize = 3;
const ARR_TEXT: usize = 4;
const ARR_ROTATE_Z: usize = 5;
const ARR_ROTATE_Y: usize = 6;
const ARR_TO_X: usize = 7;
const ARR_TO_Y: usize = 8;
const ARR_DURATION_MS: usize = 9;
const ARR_DELAY_MS: usize = 10;
const ARR_BORDER: usize = 11;
const ARR_FONT: usize = 12;

/// 解码定位弹幕的原始文本。
#[must_use]
pub fn decode_placed_payload(raw: &str) -> PlacedPayload {
    let trimmed = raw.trim();
    let parsed = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str::<Value>(trimmed).ok()
    } else {
        None
    };

    match parsed {
        Some(Value::Object(obj)) => PlacedPayload::Structured(Box::new(args_from_object(&obj))),
        Some(Value::Array(arr)) => PlacedPayload::Structured(Box::new(args_from_array(&arr))),
        _ => {
            log::debug!(target: "danmaku::placed", "定位弹幕载荷不是 JSON，按纯文本处理: {raw}");
            PlacedPayload::PlainText(raw.replace("/n", "\n"))
        }
    }
}

fn args_from_object(obj: &Map<String, Value>) -> PlacedArgs {
    let mut args = PlacedArgs::plain("");

    args.text = obj.get("text").map(value_to_text).unwrap_or_default();
    args.from_x = obj.get("x").and_then(coord).unwrap_or_default();
    args.from_y = obj.get("y").and_then(coord).unwrap_or_default();
    args.to_x = obj.get("to_x").and_then(coord).unwrap_or(args.from_x);
    args.to_y = obj.get("to_y").and_then(coord).unwrap_or(args.from_y);
    (args.from_alpha, args.to_alpha) = obj.get("alpha").map_or((1.0, 1.0), alpha_pair);
    args.rotate_y = obj.get("rotate_y").and_then(number).map_or(0, round_degrees);
    args.rotate_z = obj.get("rotate_z").and_then(number).map_or(0, round_degrees);
    args.lifetime_ms = obj
        .get("lifetime")
        .and_then(number)
        .unwrap_or(DEFAULT_PLACED_LIFETIME_MS);
    args.duration_ms = obj
        .get("duration")
        .and_then(number)
        .unwrap_or(args.lifetime_ms);
    args.delay_ms = obj.get("delay").and_then(number).unwrap_or(0.0);
    args.font_face = obj
        .get("font")
        .map(value_to_text)
        .filter(|face| !face.is_empty());
    args.font_size = obj
        .get("size")
        .or_else(|| obj.get("font_size"))
        .and_then(number);
    args.border = obj.get("border").is_none_or(truthy);

    args
}

fn args_from_array(arr: &[Value]) -> PlacedArgs {
    let mut args = PlacedArgs::plain("");

    args.text = arr.get(ARR_TEXT).map(value_to_text).unwrap_or_default();
    args.from_x = arr.get(ARR_X).and_then(coord).unwrap_or_default();
    args.from_y = arr.get(ARR_Y).and_then(coord).unwrap_or_default();
    args.to_x = arr.get(ARR_TO_X).and_then(coord).unwrap_or(args.from_x);
    args.to_y = arr.get(ARR_TO_Y).and_then(coord).unwrap_or(args.from_y);
    (args.from_alpha, args.to_alpha) = arr.get(ARR_ALPHA).map_or((1.0, 1.0), alpha_pair);
    args.rotate_z = arr.get(ARR_ROTATE_Z).and_then(number).map_or(0, round_degrees);
    args.rotate_y = arr.get(ARR_ROTATE_Y).and_then(number).map_or(0, round_degrees);
    // 数组形式的存活时间以秒为单位
    args.lifetime_ms = arr
        .get(ARR_LIFETIME_S)
        .and_then(number)
        .map_or(DEFAULT_PLACED_LIFETIME_MS, |s| s * 1000.0);
    args.duration_ms = arr
        .get(ARR_DURATION_MS)
        .and_then(number)
        .unwrap_or(args.lifetime_ms);
    args.delay_ms = arr.get(ARR_DELAY_MS).and_then(number).unwrap_or(0.0);
    args.border = arr.get(ARR_BORDER).is_none_or(truthy);
    args.font_face = arr
        .get(ARR_FONT)
        .map(value_to_text)
        .filter(|face| !face.is_empty());

    args
}

fn value_to_text(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    text.replace("/n", "\n")
}

/// 接受 JSON 数字或数字字符串。
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn coord(value: &Value) -> Option<PlacedCoord> {
    let is_integral = match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    };
    let n = number(value)?;
    if is_integral || n > 1.0 {
        Some(PlacedCoord::Absolute(n))
    } else {
        Some(PlacedCoord::Relative(n))
    }
}

/// 解析 `"起始-结束"` 形式的不透明度，缺省的结束值等于起始值。
fn alpha_pair(value: &Value) -> (f64, f64) {
    if let Some(n) = value.as_f64() {
        return (n, n);
    }
    let raw = value_to_text(value);
    let mut parts = raw.split('-');
    let from = parts
        .next()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(1.0);
    let to = parts
        .next()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(from);
    (from, to)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().eq_ignore_ascii_case("false"),
        Value::Number(n) => n.as_f64().is_none_or(|n| n != 0.0),
        _ => true,
    }
}

fn round_degrees(deg: f64) -> i32 {
    deg.round() as i32
}
