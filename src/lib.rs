//! 将 B 站弹幕 XML 转换为 ASS 字幕。
//!
//! 流程分为解析（[`danmaku_parser`]）、过滤（[`comment_filter`]）、轨道排布
//! （[`lane_scheduler`]）和输出（[`ass_generator`]、[`positioned_comment`]），
//! 由 [`converter`] 串联。

pub mod app_settings;
pub mod ass_generator;
pub mod comment_filter;
pub mod converter;
pub mod danmaku_parser;
pub mod error;
pub mod flash_rotation;
pub mod lane_scheduler;
pub mod logger;
pub mod placed_payload;
pub mod positioned_comment;
pub mod types;
pub mod utils;

pub use converter::{convert_file, convert_str};
pub use error::{ConvertError, ConvertResult};
pub use types::{ConversionSummary, RenderConfig};
