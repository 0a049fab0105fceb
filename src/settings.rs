use std::path::PathBuf;
use std::time::Duration;

use crate::canvas::BlendMode;

/// Application settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Language code (e.g. "en", "ko"). Empty string = auto-detect system language.
    pub language: String,
    /// Session log verbosity
    pub log_level: log::LevelFilter,
    /// Directory that root-relative image URLs resolve against
    pub asset_root: PathBuf,
    /// Base image shown at startup
    pub default_image_url: String,
    /// URL handed back by the generation stub
    pub placeholder_url: String,
    /// Simulated generation latency
    pub generation_delay_ms: u64,
    /// Generation gives up after this long
    pub generation_timeout_ms: u64,
    /// Image loads give up after this long
    pub load_timeout_ms: u64,
    /// Initial wash opacity (0.0–1.0)
    pub default_opacity: f32,
    /// Initial blend mode
    pub default_blend_mode: BlendMode,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            language: String::new(), // empty = auto-detect on first boot
            log_level: log::LevelFilter::Info,
            asset_root: PathBuf::from("public"),
            default_image_url: "/dd.png".to_string(),
            placeholder_url: "/api/placeholder/512/512".to_string(),
            generation_delay_ms: 1000,
            generation_timeout_ms: 30_000,
            load_timeout_ms: 10_000,
            default_opacity: 0.5,
            default_blend_mode: BlendMode::Color,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/huewash/huewash_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\huewash\huewash_settings.cfg
    /// On macOS:   ~/Library/Application Support/huewash/huewash_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("huewash");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("huewash_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_default();
            let config_dir = PathBuf::from(appdata).join("huewash");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("huewash_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("huewash");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("huewash_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("huewash_settings.cfg")))
        }
    }

    pub fn generation_delay(&self) -> Duration {
        Duration::from_millis(self.generation_delay_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            log::warn!("could not save settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "language={}\n\
             log_level={}\n\
             asset_root={}\n\
             default_image_url={}\n\
             placeholder_url={}\n\
             generation_delay_ms={}\n\
             generation_timeout_ms={}\n\
             load_timeout_ms={}\n\
             default_opacity={}\n\
             default_blend_mode={}\n",
            self.language,
            self.log_level.as_str().to_lowercase(),
            self.asset_root.display(),
            self.default_image_url,
            self.placeholder_url,
            self.generation_delay_ms,
            self.generation_timeout_ms,
            self.load_timeout_ms,
            self.default_opacity,
            self.default_blend_mode.name(),
        )
    }

    /// Parse `key=value` lines. Unknown keys and unparsable values keep the default.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "language" => s.language = val.to_string(),
                "log_level" => {
                    if let Ok(level) = val.parse::<log::LevelFilter>() {
                        s.log_level = level;
                    }
                }
                "asset_root" => {
                    if !val.is_empty() {
                        s.asset_root = PathBuf::from(val);
                    }
                }
                "default_image_url" => s.default_image_url = val.to_string(),
                "placeholder_url" => {
                    if !val.is_empty() {
                        s.placeholder_url = val.to_string();
                    }
                }
                "generation_delay_ms" => {
                    if let Ok(v) = val.parse() {
                        s.generation_delay_ms = v;
                    }
                }
                "generation_timeout_ms" => {
                    if let Ok(v) = val.parse() {
                        s.generation_timeout_ms = v;
                    }
                }
                "load_timeout_ms" => {
                    if let Ok(v) = val.parse() {
                        s.load_timeout_ms = v;
                    }
                }
                "default_opacity" => {
                    if let Ok(v) = val.parse::<f32>()
                        && (0.0..=1.0).contains(&v)
                    {
                        s.default_opacity = v;
                    }
                }
                "default_blend_mode" => {
                    if let Some(mode) = BlendMode::from_name(val) {
                        s.default_blend_mode = mode;
                    }
                }
                _ => log::debug!("ignoring unknown setting {:?}", key),
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_text_loads_back() {
        let settings = AppSettings {
            language: "ko".into(),
            log_level: log::LevelFilter::Debug,
            asset_root: PathBuf::from("/srv/img"),
            default_image_url: "/base.png".into(),
            placeholder_url: "/api/placeholder/256/256".into(),
            generation_delay_ms: 250,
            generation_timeout_ms: 900,
            load_timeout_ms: 4000,
            default_opacity: 0.75,
            default_blend_mode: BlendMode::SoftLight,
        };
        assert_eq!(AppSettings::from_config_str(&settings.to_config_string()), settings);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let s = AppSettings::from_config_str(
            "# comment\n\
             default_opacity=1.5\n\
             default_blend_mode=darken\n\
             generation_delay_ms=soon\n\
             log_level=loud\n\
             mystery=1\n\
             no equals sign here\n",
        );
        assert_eq!(s, AppSettings::default());
    }

    #[test]
    fn durations() {
        let s = AppSettings::default();
        assert_eq!(s.generation_delay(), Duration::from_secs(1));
        assert_eq!(s.load_timeout(), Duration::from_secs(10));
    }
}
