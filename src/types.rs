use serde::{Deserialize, Serialize};
use strum::Display;

/// 弹幕文件的格式变体，依据文件内容（而非扩展名）检测。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SchemaVariant {
    /// `<?xml version="1.0" ...?><i>`，`p` 属性为 `时间(秒),模式,字号,颜色,...`
    Bilibili,
    /// `<?xml version="2.0" ...?><i>`，`p` 属性为 `id,?,时间(毫秒),模式,字号,颜色,...`
    Bilibili2,
    /// 无法识别，按 `Bilibili` 的字段布局尽力解析。
    Unknown,
}

/// 滚动弹幕的运动方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// 从右向左（模式 1）。
    Leftward,
    /// 从左向右（模式 6，逆向弹幕）。
    Rightward,
}

/// 固定弹幕贴靠的画面边缘。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedEdge {
    /// 顶端弹幕（模式 5）。
    Top,
    /// 底端弹幕（模式 4）。
    Bottom,
}

/// 弹幕的渲染类别，在解析时一次性确定。
#[derive(Debug, Clone, PartialEq)]
pub enum CommentKind {
    Scroll(ScrollDirection),
    Fixed(FixedEdge),
    Placed(PlacedPayload),
}

impl CommentKind {
    /// 轨道编号：0 = 右向左滚动，1 = 顶端，2 = 底端，3 = 左向右滚动。
    /// 定位弹幕不参与轨道调度，返回 `None`。
    #[must_use]
    pub const fn lane(&self) -> Option<usize> {
        match self {
            Self::Scroll(ScrollDirection::Leftward) => Some(0),
            Self::Fixed(FixedEdge::Top) => Some(1),
            Self::Fixed(FixedEdge::Bottom) => Some(2),
            Self::Scroll(ScrollDirection::Rightward) => Some(3),
            Self::Placed(_) => None,
        }
    }

    #[must_use]
    pub const fn is_placed(&self) -> bool {
        matches!(self, Self::Placed(_))
    }
}

/// 定位弹幕的坐标值。
///
/// 整数或大于 1 的小数视为播放器像素坐标，不大于 1 的小数视为相对播放器尺寸的比例。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacedCoord {
    Absolute(f64),
    Relative(f64),
}

impl Default for PlacedCoord {
    fn default() -> Self {
        Self::Absolute(0.0)
    }
}

/// 解码后的定位弹幕参数。时间单位均为毫秒。
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedArgs {
    pub text: String,
    pub from_x: PlacedCoord,
    pub from_y: PlacedCoord,
    pub to_x: PlacedCoord,
    pub to_y: PlacedCoord,
    /// 起止不透明度，0.0 - 1.0。
    pub from_alpha: f64,
    pub to_alpha: f64,
    /// 旋转角度（度）。
    pub rotate_y: i32,
    pub rotate_z: i32,
    pub lifetime_ms: f64,
    pub duration_ms: f64,
    pub delay_ms: f64,
    pub font_face: Option<String>,
    pub font_size: Option<f64>,
    pub border: bool,
}

pub const DEFAULT_PLACED_LIFETIME_MS: f64 = 4500.0;
pub const DEFAULT_PLACED_FONT_SIZE: f64 = 25.0;

impl PlacedArgs {
    /// 仅有文本、其余参数取默认值的定位弹幕。
    #[must_use]
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            from_x: PlacedCoord::default(),
            from_y: PlacedCoord::default(),
            to_x: PlacedCoord::default(),
            to_y: PlacedCoord::default(),
            from_alpha: 1.0,
            to_alpha: 1.0,
            rotate_y: 0,
            rotate_z: 0,
            lifetime_ms: DEFAULT_PLACED_LIFETIME_MS,
            duration_ms: DEFAULT_PLACED_LIFETIME_MS,
            delay_ms: 0.0,
            font_face: None,
            font_size: None,
            border: true,
        }
    }
}

/// 定位弹幕的载荷：JSON 结构或纯文本。
#[derive(Debug, Clone, PartialEq)]
pub enum PlacedPayload {
    Structured(Box<PlacedArgs>),
    PlainText(String),
}

/// 一条解析后的弹幕。
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    /// 出现时间（秒）。
    pub time: f64,
    /// 源文件中的原始模式编号。
    pub raw_mode: u8,
    pub kind: CommentKind,
    /// 24 位 RGB 颜色。
    pub color: u32,
    pub font_size: f64,
    /// 显示文本，`/n` 已展开为换行。定位弹幕保留原始载荷文本。
    pub text: String,
    /// 估算宽度：最长行字符数 × 字号。
    pub estimated_width: f64,
    /// 估算高度：行数 × 字号。
    pub estimated_height: f64,
}

impl CommentRecord {
    #[must_use]
    pub const fn lane(&self) -> Option<usize> {
        self.kind.lane()
    }

    /// 实际显示的文本。定位弹幕取载荷中的文本。
    #[must_use]
    pub fn display_text(&self) -> &str {
        match &self.kind {
            CommentKind::Placed(PlacedPayload::Structured(args)) => &args.text,
            CommentKind::Placed(PlacedPayload::PlainText(text)) => text,
            CommentKind::Scroll(_) | CommentKind::Fixed(_) => &self.text,
        }
    }
}

/// 一次解析的结果及统计。
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub schema: SchemaVariant,
    pub records: Vec<CommentRecord>,
    /// 容器内声称为弹幕的 `<d>` 元素总数。
    pub total_entries: usize,
    /// 被忽略的脚本弹幕（模式 8）数量。
    pub script_dropped: usize,
    /// 字段不足、数值无法解析或模式未知而被丢弃的数量。
    pub malformed_dropped: usize,
}

/// 渲染配置，单次转换内不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub font_size: u32,
    /// 文字不透明度，0.0 - 1.0。
    pub text_opacity: f64,
    /// 滚动弹幕停留时间（秒）。
    pub duration_marquee: f64,
    /// 固定弹幕停留时间（秒）。
    pub duration_still: f64,
    /// 画面底部保留为空白的比例，0.0 - 1.0。
    pub reserve_blank: f64,
    pub reduce_comments: bool,
    pub stage_width: u32,
    pub stage_height: u32,
    pub font_face: String,
    /// 屏蔽规则（正则表达式），匹配文本的弹幕将被移除。
    pub block_patterns: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_size: 23,
            text_opacity: 0.6,
            duration_marquee: 12.0,
            duration_still: 6.0,
            reserve_blank: 0.667,
            reduce_comments: false,
            stage_width: 1080,
            stage_height: 720,
            font_face: "sans-serif".to_string(),
            block_patterns: Vec::new(),
        }
    }
}

impl RenderConfig {
    /// 底部保留区域的像素高度。
    #[must_use]
    pub fn bottom_reserved(&self) -> u32 {
        let reserved = f64::from(self.stage_height) * self.reserve_blank.clamp(0.0, 1.0);
        reserved as u32
    }

    #[must_use]
    pub fn base_font_size(&self) -> f64 {
        f64::from(self.font_size)
    }
}

/// 一次转换的统计信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub schema: String,
    pub ingested: usize,
    pub script_dropped: usize,
    pub malformed_dropped: usize,
    pub filtered: usize,
    pub suppressed: usize,
    /// 因轨道饱和被丢弃的弹幕数量。
    pub shed: usize,
    pub emitted: usize,
}
