use chrono::Local;
use directories::ProjectDirs;
use fern::Dispatch;
use std::fs;
use std::path::PathBuf;

use crate::app_settings::LogSettings;

fn get_log_file_path() -> Result<PathBuf, String> {
    if let Some(proj_dirs) = ProjectDirs::from("com", "Danmaku2ASS", "Danmaku2ASS") {
        let log_dir = proj_dirs.data_local_dir();
        if !log_dir.exists() {
            fs::create_dir_all(log_dir)
                .map_err(|e| format!("无法创建日志目录 {log_dir:?}: {e}"))?;
        }
        Ok(log_dir.join("danmaku2ass.log"))
    } else {
        let current_dir_log_path = PathBuf::from("danmaku2ass.log");
        eprintln!("无法获取项目日志目录，将尝试在当前目录创建日志: {current_dir_log_path:?}");
        Ok(current_dir_log_path)
    }
}

fn format_dispatch(settings: &LogSettings) -> Dispatch {
    Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
                record.level(),
                message
            ))
        })
        .level(settings.log_level)
}

/// 初始化全局日志：输出到 stderr，按设置额外写入日志文件。
///
/// 重复调用时只打印一条提示。
pub fn init_logger(settings: &LogSettings) {
    let mut dispatch = format_dispatch(settings).chain(std::io::stderr());

    if settings.enable_file_log {
        match get_log_file_path().and_then(|path| {
            fern::log_file(&path)
                .map(|file| (path.clone(), file))
                .map_err(|e| format!("无法打开日志文件 {path:?}: {e}"))
        }) {
            Ok((path, log_file)) => {
                eprintln!("[Logger Init] 文件日志已启用。日志文件将被写入: {path:?}");
                dispatch = dispatch.chain(log_file);
            }
            Err(e) => {
                eprintln!("{e}。文件日志将被禁用。");
            }
        }
    }

    if let Err(e) = dispatch.apply() {
        eprintln!("日志记录器初始化失败: {e}");
    } else {
        log::debug!(target: "danmaku::logger", "日志记录器已初始化。");
    }
}
