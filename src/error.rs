use std::path::PathBuf;
use std::{fmt, io};

use thiserror::Error;

/// 弹幕转换过程中可能发生的错误。
#[derive(Debug, Error)]
pub enum ConvertError {
    /// 弹幕文件无法打开或读取。
    #[error("无法读取弹幕文件 {path:?}: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// 未找到可识别的弹幕容器元素。
    #[error("无效的弹幕格式: {0}")]
    InvalidFormat(String),
    /// 解析成功，但没有剩余可用的弹幕。
    #[error("未发现有效弹幕数据")]
    EmptyResult,
    /// 输出文件无法创建或写入。
    #[error("无法创建输出文件 {path:?}: {source}")]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// 无效的 ASS 时间字符串。
    #[error("无效的时间格式: {0}")]
    InvalidTime(String),
    /// 屏蔽规则无法编译为正则表达式。
    #[error("无效的屏蔽规则 '{pattern}': {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// 配置文件加载失败。
    #[error("配置错误: {0}")]
    Config(String),
    /// 字符串格式化错误。
    #[error("格式错误: {0}")]
    Fmt(#[from] fmt::Error),
}

impl ConvertError {
    /// 输入不可读或格式无法识别时返回 `true`。
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(self, Self::InputUnreadable { .. } | Self::InvalidFormat(_))
    }
}

pub type ConvertResult<T> = std::result::Result<T, ConvertError>;
