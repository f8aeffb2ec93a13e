use directories::ProjectDirs;
use ini::{Ini, Properties};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConvertError;
use crate::types::RenderConfig;

const CONFIG_SECTION: &str = "config";
const LOGGING_SECTION: &str = "Logging";
// 多个屏蔽规则在同一个键中的分隔符
const MULTI_VALUE_DELIMITER: &str = ";;;";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub enable_file_log: bool,
    pub log_level: LevelFilter,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            enable_file_log: false,
            log_level: LevelFilter::Info,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppSettings {
    pub render: RenderConfig,
    pub log_settings: LogSettings,
}

impl AppSettings {
    /// 默认配置文件位置：`<数据目录>/danmaku2ass.ini`。
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("com", "Danmaku2ASS", "Danmaku2ASS") {
            Some(proj_dirs.data_local_dir().join("danmaku2ass.ini"))
        } else {
            log::error!(target: "danmaku::settings", "无法获取项目配置目录路径。");
            None
        }
    }

    /// 从默认位置加载配置。文件不存在或无法解析时使用默认配置。
    #[must_use]
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            log::warn!(target: "danmaku::settings", "无法确定配置文件路径。将使用默认配置。");
            return AppSettings::default();
        };
        if !path.exists() {
            log::info!(target: "danmaku::settings", "配置文件 {path:?} 未找到。将使用默认配置。");
            return AppSettings::default();
        }
        match Self::load_from_path(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!(target: "danmaku::settings", "{e}。将使用默认配置。");
                AppSettings::default()
            }
        }
    }

    /// 从指定文件加载配置，文件必须存在且格式正确。
    pub fn load_from_path(path: &Path) -> Result<Self, ConvertError> {
        let conf = Ini::load_from_file(path)
            .map_err(|e| ConvertError::Config(format!("加载配置文件 {path:?} 失败: {e}")))?;
        log::info!(target: "danmaku::settings", "从 {path:?} 加载配置成功。");
        Ok(Self::from_ini(&conf))
    }

    /// 读取 `[config]` 与 `[Logging]` 区域，缺失或无效的键取默认值。
    #[must_use]
    pub fn from_ini(conf: &Ini) -> Self {
        let defaults = RenderConfig::default();
        let render = match conf.section(Some(CONFIG_SECTION)) {
            Some(section) => RenderConfig {
                font_size: read_value(section, "fontSize", defaults.font_size),
                text_opacity: read_value(section, "textOpacity", defaults.text_opacity),
                reserve_blank: read_value(section, "reverseBlank", defaults.reserve_blank),
                duration_marquee: read_value(
                    section,
                    "durationMarquee",
                    defaults.duration_marquee,
                ),
                duration_still: read_value(section, "durationStill", defaults.duration_still),
                reduce_comments: read_bool(section, "isReduceComments", defaults.reduce_comments),
                stage_width: read_value(section, "stageWidth", defaults.stage_width),
                stage_height: read_value(section, "stageHeight", defaults.stage_height),
                font_face: section
                    .get("fontFace")
                    .map(str::trim)
                    .filter(|face| !face.is_empty())
                    .map_or(defaults.font_face, str::to_string),
                block_patterns: section
                    .get("blockPatterns")
                    .map(|raw| {
                        raw.split(MULTI_VALUE_DELIMITER)
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            None => defaults,
        };

        let log_defaults = LogSettings::default();
        let log_settings = match conf.section(Some(LOGGING_SECTION)) {
            Some(section) => LogSettings {
                enable_file_log: read_bool(section, "EnableFileLog", log_defaults.enable_file_log),
                log_level: read_value(section, "LogLevel", log_defaults.log_level),
            },
            None => log_defaults,
        };

        AppSettings {
            render,
            log_settings,
        }
    }
}

fn read_value<T: FromStr>(section: &Properties, key: &str, default: T) -> T {
    match section.get(key) {
        None => default,
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            log::warn!(target: "danmaku::settings", "配置项 {key} 的值 '{raw}' 无效，使用默认值。");
            default
        }),
    }
}

fn read_bool(section: &Properties, key: &str, default: bool) -> bool {
    match section.get(key).map(|s| s.trim().to_ascii_lowercase()) {
        None => default,
        Some(raw) => match raw.as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                log::warn!(target: "danmaku::settings", "配置项 {key} 的值 '{raw}' 无效，使用默认值。");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ini() {
        let conf = Ini::load_from_str(
            "[config]\n\
             fontSize=36\n\
             textOpacity=0.8\n\
             reverseBlank=0\n\
             durationMarquee=8.5\n\
             isReduceComments=true\n\
             stageWidth=1920\n\
             stageHeight=1080\n\
             fontFace=Microsoft YaHei\n\
             blockPatterns=广告;;; 剧透 ;;;\n\
             [Logging]\n\
             EnableFileLog=1\n\
             LogLevel=debug\n",
        )
        .unwrap();
        let settings = AppSettings::from_ini(&conf);
        let render = &settings.render;
        assert_eq!(render.font_size, 36);
        assert_eq!(render.text_opacity, 0.8);
        assert_eq!(render.reserve_blank, 0.0);
        assert_eq!(render.duration_marquee, 8.5);
        assert_eq!(render.duration_still, 6.0);
        assert!(render.reduce_comments);
        assert_eq!((render.stage_width, render.stage_height), (1920, 1080));
        assert_eq!(render.font_face, "Microsoft YaHei");
        assert_eq!(render.block_patterns, vec!["广告", "剧透"]);
        assert!(settings.log_settings.enable_file_log);
        assert_eq!(settings.log_settings.log_level, LevelFilter::Debug);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let conf = Ini::load_from_str("[config]\nfontSize=big\nisReduceComments=maybe\n").unwrap();
        let settings = AppSettings::from_ini(&conf);
        assert_eq!(settings.render, RenderConfig::default());
        assert_eq!(settings.log_settings, LogSettings::default());
    }

    #[test]
    fn test_empty_ini_is_default() {
        let settings = AppSettings::from_ini(&Ini::new());
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let path = std::env::temp_dir().join("danmaku2ass-does-not-exist.ini");
        let err = AppSettings::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }
}
