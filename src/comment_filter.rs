//! 弹幕过滤：屏蔽规则与重复弹幕合并
//!
//! 两个过滤步骤都只删除弹幕，不改变剩余弹幕的顺序。

use std::collections::VecDeque;

use regex::Regex;

use crate::error::ConvertError;
use crate::types::CommentRecord;

/// 重复判定的回溯时间窗口（秒）。
pub const SUPPRESSION_WINDOW_SECS: f64 = 10.0;

/// 窗口内相似弹幕达到该数量时丢弃新弹幕。
const SIMILAR_LIMIT: usize = 3;

/// 等长文本逐字符相同的比例超过该值即视为相似。
const CHAR_MATCH_RATIO: f64 = 0.8;

/// 按正则表达式屏蔽弹幕。
#[derive(Debug, Default)]
pub struct BlockFilter {
    patterns: Vec<Regex>,
}

impl BlockFilter {
    pub fn new(patterns: &[String]) -> Result<Self, ConvertError> {
        let patterns = patterns
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                Regex::new(p).map_err(|source| ConvertError::InvalidFilter {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn is_blocked(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }

    /// 移除命中屏蔽规则的弹幕，返回剩余弹幕和移除数量。
    #[must_use]
    pub fn apply(&self, records: Vec<CommentRecord>) -> (Vec<CommentRecord>, usize) {
        if self.is_empty() {
            return (records, 0);
        }
        let before = records.len();
        let kept: Vec<CommentRecord> = records
            .into_iter()
            .filter(|record| !self.is_blocked(record.display_text()))
            .collect();
        let removed = before - kept.len();
        log::info!(target: "danmaku::filter", "屏蔽规则移除了 {removed} 条弹幕");
        (kept, removed)
    }
}

/// 两段（已去除首尾空白的）文本是否相似。
#[must_use]
pub fn is_similar(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let len = a.chars().count();
    if len == 0 {
        return false;
    }
    // 长度不同时 hamming 返回错误
    strsim::hamming(a, b).is_ok_and(|distance| {
        let matched = len - distance;
        matched as f64 / len as f64 > CHAR_MATCH_RATIO
    })
}

/// 合并重复弹幕。
///
/// 对每条弹幕，统计前 10 秒内已保留的弹幕中与之相似的数量，达到 3 条即丢弃。
/// 返回剩余弹幕和被丢弃的数量。
#[must_use]
pub fn suppress_duplicates(records: Vec<CommentRecord>) -> (Vec<CommentRecord>, usize) {
    let mut window: VecDeque<(f64, String)> = VecDeque::new();
    let mut kept = Vec::with_capacity(records.len());
    let mut removed = 0;

    for record in records {
        let time = record.time;
        window.retain(|(kept_time, _)| time - kept_time <= SUPPRESSION_WINDOW_SECS);

        let text = record.display_text().trim();
        let similar = window
            .iter()
            .filter(|(_, kept_text)| is_similar(kept_text, text))
            .count();

        if similar >= SIMILAR_LIMIT {
            log::debug!(target: "danmaku::filter", "合并重复弹幕 @{time:.2}s: {text}");
            removed += 1;
            continue;
        }

        window.push_back((time, text.to_string()));
        kept.push(record);
    }

    log::info!(target: "danmaku::filter", "重复弹幕合并移除了 {removed} 条弹幕");
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommentKind, ScrollDirection};

    fn comment(time: f64, text: &str) -> CommentRecord {
        CommentRecord {
            time,
            raw_mode: 1,
            kind: CommentKind::Scroll(ScrollDirection::Leftward),
            color: 0xffffff,
            font_size: 25.0,
            text: text.to_string(),
            estimated_width: 25.0 * text.chars().count() as f64,
            estimated_height: 25.0,
        }
    }

    fn texts(records: &[CommentRecord]) -> Vec<&str> {
        records.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_is_similar() {
        assert!(is_similar("666", "666"));
        assert!(is_similar("哈哈哈哈哈哈", "哈哈哈哈哈啊"));
        assert!(!is_similar("abcde", "abcxx"));
        assert!(!is_similar("abc", "abcd"));
        assert!(is_similar("", ""));
    }

    #[test]
    fn test_fourth_duplicate_is_dropped() {
        let records = vec![
            comment(0.0, "666"),
            comment(1.0, " 666 "),
            comment(2.0, "666"),
            comment(3.0, "666"),
            comment(3.5, "不一样"),
        ];
        let (kept, removed) = suppress_duplicates(records);
        assert_eq!(removed, 1);
        assert_eq!(texts(&kept), vec!["666", " 666 ", "666", "不一样"]);
    }

    #[test]
    fn test_window_expires() {
        let records = vec![
            comment(0.0, "草"),
            comment(1.0, "草"),
            comment(2.0, "草"),
            comment(12.5, "草"),
        ];
        let (kept, removed) = suppress_duplicates(records);
        assert_eq!(removed, 0);
        assert_eq!(kept.len(), 4);
    }

    #[test]
    fn test_suppression_never_adds() {
        let records: Vec<CommentRecord> = (0..50)
            .map(|i| comment(f64::from(i) * 0.1, if i % 2 == 0 { "前方高能" } else { "hello" }))
            .collect();
        let total = records.len();
        let (kept, removed) = suppress_duplicates(records);
        assert_eq!(kept.len() + removed, total);
        assert!(kept.len() <= total);
    }

    #[test]
    fn test_block_filter() {
        let filter = BlockFilter::new(&["^广告".to_string(), "剧透".to_string()]).unwrap();
        let records = vec![
            comment(0.0, "广告位招租"),
            comment(1.0, "不要剧透"),
            comment(2.0, "正常弹幕"),
        ];
        let (kept, removed) = filter.apply(records);
        assert_eq!(removed, 2);
        assert_eq!(texts(&kept), vec!["正常弹幕"]);
    }

    #[test]
    fn test_block_filter_rejects_bad_pattern() {
        let err = BlockFilter::new(&["(".to_string()]).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidFilter { .. }));
    }
}
