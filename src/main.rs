use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use danmaku_converter::app_settings::AppSettings;
use danmaku_converter::{RenderConfig, convert_file, logger};

/// 命令行参数。
#[derive(Parser, Debug)]
#[command(
    name = "danmaku2ass",
    version,
    about = "将 B 站弹幕 XML 转换为 ASS 字幕"
)]
struct CliArgs {
    /// 输入的弹幕 XML 文件。
    #[arg(index = 1)]
    input: PathBuf,

    /// 输出文件路径，默认与输入同名、扩展名为 .ass。
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 画面尺寸，例如 1920x1080。
    #[arg(short = 's', long = "size", value_parser = parse_stage_size)]
    stage_size: Option<(u32, u32)>,

    /// 字体名称。
    #[arg(long = "font")]
    font_face: Option<String>,

    /// 基准字号。
    #[arg(long = "fontsize")]
    font_size: Option<u32>,

    /// 文字不透明度 (0.0 - 1.0)。
    #[arg(long = "alpha")]
    text_opacity: Option<f64>,

    /// 滚动弹幕的停留时间（秒）。
    #[arg(long)]
    duration_marquee: Option<f64>,

    /// 固定弹幕的停留时间（秒）。
    #[arg(long)]
    duration_still: Option<f64>,

    /// 画面底部保留为空白的比例 (0.0 - 1.0)。
    #[arg(long)]
    reserve_blank: Option<f64>,

    /// 合并短时间内的重复弹幕。
    #[arg(long)]
    reduce: bool,

    /// 屏蔽匹配该正则表达式的弹幕，可重复指定。
    #[arg(long = "block", value_name = "REGEX")]
    block_patterns: Vec<String>,

    /// 配置文件路径，默认使用数据目录下的 danmaku2ass.ini。
    #[arg(long)]
    config: Option<PathBuf>,

    /// 同时把日志写入文件。
    #[arg(long)]
    log_file: bool,
}

fn parse_stage_size(raw: &str) -> Result<(u32, u32), String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("'{raw}' 不是 宽x高 格式"))?;
    let width = w.trim().parse::<u32>().map_err(|e| format!("无效的宽度: {e}"))?;
    let height = h.trim().parse::<u32>().map_err(|e| format!("无效的高度: {e}"))?;
    if width == 0 || height == 0 {
        return Err("画面尺寸必须大于 0".to_string());
    }
    Ok((width, height))
}

/// 在同一行刷新进度。输出失败不影响转换。
fn report_progress<W: Write>(out: &mut W, percent: u32) {
    if let Err(e) = write!(out, "\r进度: {percent:>3}%").and_then(|()| out.flush()) {
        log::debug!(target: "danmaku::cli", "进度输出失败: {e}");
    }
}

impl CliArgs {
    /// 命令行参数覆盖配置文件中的值。
    fn apply_overrides(&self, config: &mut RenderConfig) {
        if let Some((width, height)) = self.stage_size {
            config.stage_width = width;
            config.stage_height = height;
        }
        if let Some(face) = &self.font_face {
            config.font_face = face.clone();
        }
        if let Some(size) = self.font_size {
            config.font_size = size;
        }
        if let Some(opacity) = self.text_opacity {
            config.text_opacity = opacity;
        }
        if let Some(duration) = self.duration_marquee {
            config.duration_marquee = duration;
        }
        if let Some(duration) = self.duration_still {
            config.duration_still = duration;
        }
        if let Some(blank) = self.reserve_blank {
            config.reserve_blank = blank;
        }
        if self.reduce {
            config.reduce_comments = true;
        }
        config
            .block_patterns
            .extend(self.block_patterns.iter().cloned());
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let mut settings = match &args.config {
        Some(path) => match AppSettings::load_from_path(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => AppSettings::load(),
    };
    if args.log_file {
        settings.log_settings.enable_file_log = true;
    }
    logger::init_logger(&settings.log_settings);

    let mut config = settings.render;
    args.apply_overrides(&mut config);
    match serde_json::to_string(&config) {
        Ok(json) => log::debug!(target: "danmaku::cli", "渲染配置: {json}"),
        Err(e) => log::warn!(target: "danmaku::cli", "无法序列化渲染配置: {e}"),
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("ass"));

    let result = convert_file(&args.input, &output, &config, |percent| {
        report_progress(&mut std::io::stderr(), percent);
    });
    eprintln!();

    match result {
        Ok(summary) => {
            if let Ok(json) = serde_json::to_string(&summary) {
                log::info!(target: "danmaku::cli", "统计: {json}");
            }
            eprintln!(
                "已生成 {}：输出 {} 条弹幕，共解析 {} 条",
                output.display(),
                summary.emitted,
                summary.ingested
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("转换失败: {e}");
            ExitCode::FAILURE
        }
    }
}
