//! 弹幕轨道调度
//!
//! 四条轨道（右向左滚动、顶端、底端、左向右滚动）各自维护一组按像素划分的行。
//! 每条弹幕按行号从小到大寻找第一段足够容纳它的空闲行，找不到则丢弃。
//! 占用表只存在于一次转换之内。

use crate::types::{CommentRecord, RenderConfig};

pub const LANE_COUNT: usize = 4;

/// 行上最后一条弹幕的信息，足以判断它何时让出该行。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occupant {
    pub start: f64,
    pub width: f64,
}

#[derive(Debug)]
pub struct LaneOccupancy {
    rows: [Vec<Option<Occupant>>; LANE_COUNT],
    /// 可用的行数：画面高度减去底部保留区域。
    usable_rows: usize,
    stage_width: f64,
    duration_marquee: f64,
    duration_still: f64,
}

impl LaneOccupancy {
    #[must_use]
    pub fn new(config: &RenderConfig) -> Self {
        let usable_rows = config.stage_height.saturating_sub(config.bottom_reserved()) as usize;
        Self {
            rows: Default::default(),
            usable_rows,
            stage_width: f64::from(config.stage_width),
            duration_marquee: config.duration_marquee,
            duration_still: config.duration_still,
        }
    }

    #[must_use]
    pub const fn usable_rows(&self) -> usize {
        self.usable_rows
    }

    /// 为弹幕分配行并登记占用。定位弹幕或轨道已满时返回 `None`。
    pub fn schedule(&mut self, record: &CommentRecord) -> Option<usize> {
        let lane = record.lane()?;
        let row = self.find_available_row(record)?;
        self.mark(lane, row, row_span(record), record);
        Some(row)
    }

    /// 从第 0 行开始寻找第一段空闲行。
    #[must_use]
    pub fn find_available_row(&self, record: &CommentRecord) -> Option<usize> {
        let lane = record.lane()?;
        let span = row_span(record);
        if span > self.usable_rows {
            return None;
        }

        let mut row = 0;
        while row + span <= self.usable_rows {
            let free = self.free_rows(lane, row, span, record);
            if free >= span {
                return Some(row);
            }
            // 任何包含阻塞行的起点都不可用，直接跳过它
            row += free + 1;
        }
        None
    }

    /// 从 `start` 开始连续空闲的行数，最多数到 `span`。
    fn free_rows(&self, lane: usize, start: usize, span: usize, record: &CommentRecord) -> usize {
        let rows = &self.rows[lane];
        (start..start + span)
            .take_while(|&row| {
                rows.get(row).copied().flatten().is_none_or(|occupant| {
                    !self.occupant_blocks(lane, occupant, record.time, record.estimated_width)
                })
            })
            .count()
    }

    /// 已占用该行的弹幕在 `time` 时刻是否仍会与宽度为 `width` 的新弹幕重叠。
    #[must_use]
    pub fn occupant_blocks(&self, lane: usize, occupant: Occupant, time: f64, width: f64) -> bool {
        match lane {
            1 | 2 => occupant.start + self.duration_still > time,
            _ => {
                // 旧弹幕的尾部离开入场边缘
                let tail_cleared = self.threshold_time(time, occupant.width);
                // 新弹幕速度更快时，不能在旧弹幕离场前追上它
                let not_caught = self.threshold_time(time, width);
                occupant.start > tail_cleared.min(not_caught)
            }
        }
    }

    /// `time - 滚动时长 × (1 - 画面宽度 / (文本宽度 + 画面宽度))`
    fn threshold_time(&self, time: f64, text_width: f64) -> f64 {
        let total = text_width + self.stage_width;
        if total <= 0.0 {
            return time - self.duration_marquee;
        }
        time - self.duration_marquee * (1.0 - self.stage_width / total)
    }

    fn mark(&mut self, lane: usize, row: usize, span: usize, record: &CommentRecord) {
        let occupant = Occupant {
            start: record.time,
            width: record.estimated_width,
        };
        let rows = &mut self.rows[lane];
        if rows.len() < row + span {
            rows.resize(row + span, None);
        }
        for slot in &mut rows[row..row + span] {
            *slot = Some(occupant);
        }
    }
}

/// 多行文本需要占用的行数。
fn row_span(record: &CommentRecord) -> usize {
    (record.estimated_height.ceil() as usize).max(1)
}
