//! Hot-reloadable JSON configuration at `<AppData>/SpotlightDimmer/config.json`.
//! The wire format's field names and defaults are specified exactly, so this
//! module follows that contract rather than the TOML format this project
//! historically used.

use crate::overlay_calculator::{OverlayCalculationConfig, OverlayMode};
use crate::primitives::Color;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Debounce window: OS file watchers frequently fire two or three times
/// per logical save.
const DEBOUNCE_WINDOW_MS: u64 = 100;
/// Quiesce delay before re-reading, to let the writer finish.
const QUIESCE_DELAY_MS: u64 = 50;

fn schema_url_for_version(version: &str) -> String {
    let truncated = version.split('+').next().unwrap_or(version);
    format!(
        "https://raw.githubusercontent.com/thomazmoura/spotlight-dimmer/main/schemas/config.v{}.schema.json",
        truncated
    )
}

fn parse_mode(s: &str) -> OverlayMode {
    match s.to_ascii_lowercase().as_str() {
        "fullscreen" => OverlayMode::FullScreen,
        "partial" => OverlayMode::Partial,
        "partialwithactive" => OverlayMode::PartialWithActive,
        _ => OverlayMode::FullScreen,
    }
}

fn mode_to_str(mode: OverlayMode) -> &'static str {
    match mode {
        OverlayMode::FullScreen => "FullScreen",
        OverlayMode::Partial => "Partial",
        OverlayMode::PartialWithActive => "PartialWithActive",
    }
}

fn deserialize_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OverlayMode, D::Error> {
    let s = String::deserialize(deserializer)?;
    Ok(parse_mode(&s))
}

fn serialize_mode<S: Serializer>(mode: &OverlayMode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(mode_to_str(*mode))
}

fn deserialize_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Color, D::Error> {
    let s = String::deserialize(deserializer)?;
    Ok(Color::from_hex(&s))
}

fn serialize_color<S: Serializer>(color: &Color, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&color.to_hex())
}

fn deserialize_clamped_u8<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.clamp(0, 255) as u8)
}

fn deserialize_retention_days<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.clamp(1, 365) as u16)
}

const LOG_LEVELS: [&str; 6] = ["Trace", "Debug", "Information", "Warning", "Error", "Critical"];

fn deserialize_log_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let s = String::deserialize(deserializer)?;
    match LOG_LEVELS.iter().find(|l| l.eq_ignore_ascii_case(&s)) {
        Some(canonical) => Ok(canonical.to_string()),
        None => Ok("Information".to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OverlayConfig {
    #[serde(rename = "Mode", serialize_with = "serialize_mode", deserialize_with = "deserialize_mode")]
    pub mode: OverlayMode,
    #[serde(rename = "InactiveColor", serialize_with = "serialize_color", deserialize_with = "deserialize_color")]
    pub inactive_color: Color,
    #[serde(rename = "InactiveOpacity", deserialize_with = "deserialize_clamped_u8")]
    pub inactive_opacity: u8,
    #[serde(rename = "ActiveColor", serialize_with = "serialize_color", deserialize_with = "deserialize_color")]
    pub active_color: Color,
    #[serde(rename = "ActiveOpacity", deserialize_with = "deserialize_clamped_u8")]
    pub active_opacity: u8,
    #[serde(rename = "ExcludeFromScreenCapture")]
    pub exclude_from_screen_capture: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            mode: OverlayMode::FullScreen,
            inactive_color: Color::from_hex("#000000"),
            inactive_opacity: 153,
            active_color: Color::from_hex("#000000"),
            active_opacity: 102,
            exclude_from_screen_capture: false,
        }
    }
}

impl OverlayConfig {
    pub fn to_calculation_config(&self) -> OverlayCalculationConfig {
        OverlayCalculationConfig {
            mode: self.mode,
            inactive_color: self.inactive_color,
            inactive_opacity: self.inactive_opacity,
            active_color: self.active_color,
            active_opacity: self.active_opacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemConfig {
    #[serde(rename = "RendererBackend")]
    pub renderer_backend: String,
    #[serde(rename = "EnableLogging")]
    pub enable_logging: bool,
    #[serde(rename = "LogLevel", deserialize_with = "deserialize_log_level")]
    pub log_level: String,
    #[serde(rename = "LogRetentionDays", deserialize_with = "deserialize_retention_days")]
    pub log_retention_days: u16,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            renderer_backend: "LayeredWindow".to_string(),
            enable_logging: true,
            log_level: "Information".to_string(),
            log_retention_days: 7,
        }
    }
}

impl SystemConfig {
    /// Maps the configured level name to a `log` crate filter. Unknown names
    /// cannot reach here: `deserialize_log_level` already canonicalizes or
    /// falls back to `"Information"`.
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.log_level.as_str() {
            "Trace" => log::LevelFilter::Trace,
            "Debug" => log::LevelFilter::Debug,
            "Warning" => log::LevelFilter::Warn,
            "Error" | "Critical" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        }
    }
}

/// Named snapshot of the overlay fields. Data, not state: applying one
/// copies its fields into the active `Overlay` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(flatten)]
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "$schema", default)]
    pub schema: String,
    #[serde(rename = "ConfigVersion", default)]
    pub config_version: String,
    #[serde(rename = "Overlay")]
    pub overlay: OverlayConfig,
    #[serde(rename = "System")]
    pub system: SystemConfig,
    #[serde(rename = "Profiles", default)]
    pub profiles: Vec<Profile>,
    #[serde(rename = "CurrentProfile", default)]
    pub current_profile: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            schema: schema_url_for_version(APP_VERSION),
            config_version: APP_VERSION.to_string(),
            overlay: OverlayConfig::default(),
            system: SystemConfig::default(),
            profiles: Vec::new(),
            current_profile: None,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf, String> {
        let app_data = std::env::var("APPDATA").map_err(|_| "APPDATA environment variable not set".to_string())?;
        let dir = PathBuf::from(app_data).join("SpotlightDimmer");
        std::fs::create_dir_all(&dir).map_err(|e| format!("failed to create config directory: {}", e))?;
        Ok(dir.join("config.json"))
    }

    /// Loads the config file, writing a default if absent. Injects a schema
    /// URL when missing or stale, re-serializing to disk on a best-effort
    /// basis (write failures log and continue in memory). Any parse failure
    /// falls back to defaults, since there is no prior in-memory config to
    /// keep at initial load time.
    pub fn load() -> Self {
        let path = match Self::config_path() {
            Ok(p) => p,
            Err(e) => {
                log::error!(target: "config", "cannot resolve config path: {}", e);
                return Config::default();
            }
        };

        if !path.exists() {
            let default = Config::default();
            if let Err(e) = default.save() {
                log::error!(target: "config", "failed to write default config: {}", e);
            }
            return default;
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!(target: "config", "failed to read config file, using defaults: {}", e);
                return Config::default();
            }
        };

        let mut config = match serde_json::from_str::<Config>(&contents) {
            Ok(c) => c,
            Err(e) => {
                log::warn!(target: "config", "config parse failed, using defaults: {}", e);
                return Config::default();
            }
        };

        if config.schema.is_empty() || config.config_version != APP_VERSION {
            config.schema = schema_url_for_version(APP_VERSION);
            config.config_version = APP_VERSION.to_string();
            if let Err(e) = config.save() {
                log::error!(target: "config", "failed to persist injected schema: {}", e);
            }
        }

        config
    }

    /// Re-parses `contents` as a standalone update, used by the hot-reload
    /// watcher. Unlike `load`, a parse failure here must keep the caller's
    /// previous configuration, so it returns `None` rather than a default.
    pub fn reparse(contents: &str) -> Option<Config> {
        match serde_json::from_str::<Config>(contents) {
            Ok(c) => Some(c),
            Err(e) => {
                log::warn!(target: "config", "config parse failed on reload, keeping previous config: {}", e);
                None
            }
        }
    }

    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path()?;
        let serialized = serde_json::to_string_pretty(self).map_err(|e| format!("failed to serialize config: {}", e))?;
        std::fs::write(&path, serialized).map_err(|e| format!("failed to write config file: {}", e))
    }

    pub fn list_profiles(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        names
    }

    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Copies a profile's overlay fields into the active `Overlay` block and
    /// marks it current.
    pub fn apply_profile(&mut self, name: &str) -> bool {
        if let Some(profile) = self.get_profile(name).cloned() {
            self.overlay = profile.overlay;
            self.current_profile = Some(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn save_profile(&mut self, name: &str) {
        let overlay = self.overlay;
        if let Some(existing) = self.profiles.iter_mut().find(|p| p.name == name) {
            existing.overlay = overlay;
        } else {
            self.profiles.push(Profile { name: name.to_string(), overlay });
        }
    }

    pub fn delete_profile(&mut self, name: &str) {
        self.profiles.retain(|p| p.name != name);
        if self.current_profile.as_deref() == Some(name) {
            self.current_profile = None;
        }
    }
}

#[cfg(windows)]
pub use watcher::ConfigWatcher;

#[cfg(windows)]
mod watcher {
    use super::*;
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::JoinHandle;
    use winapi::um::fileapi::{FindFirstChangeNotificationW, FindNextChangeNotification, FILE_NOTIFY_CHANGE_LAST_WRITE};
    use winapi::um::handleapi::INVALID_HANDLE_VALUE;
    use winapi::um::synchapi::WaitForSingleObject;
    use winapi::um::winbase::WAIT_OBJECT_0;

    /// Watches the config file's parent directory for changes and delivers
    /// debounced, quiesced, re-parsed `Config` values over `sender`.
    pub struct ConfigWatcher {
        stop_flag: Arc<AtomicBool>,
        thread: Option<JoinHandle<()>>,
    }

    impl ConfigWatcher {
        pub fn start(path: PathBuf, sender: Sender<Config>, current: Arc<Mutex<Config>>) -> Result<Self, String> {
            let dir = path.parent().ok_or("config path has no parent directory")?.to_path_buf();
            let stop_flag = Arc::new(AtomicBool::new(false));
            let stop_flag_for_thread = stop_flag.clone();

            let thread = std::thread::Builder::new()
                .name("spotlight-dimmer-config-watch".into())
                .spawn(move || run_watch_loop(dir, path, sender, current, stop_flag_for_thread))
                .map_err(|e| format!("failed to spawn config watcher thread: {}", e))?;

            Ok(ConfigWatcher { stop_flag, thread: Some(thread) })
        }
    }

    impl Drop for ConfigWatcher {
        fn drop(&mut self) {
            self.stop_flag.store(true, Ordering::SeqCst);
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    fn to_wstring(s: &std::path::Path) -> Vec<u16> {
        OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
    }

    fn run_watch_loop(
        dir: PathBuf,
        config_path: PathBuf,
        sender: Sender<Config>,
        current: Arc<Mutex<Config>>,
        stop_flag: Arc<AtomicBool>,
    ) {
        unsafe {
            let wide_dir = to_wstring(&dir);
            let handle = FindFirstChangeNotificationW(wide_dir.as_ptr(), 0, FILE_NOTIFY_CHANGE_LAST_WRITE);
            if handle == INVALID_HANDLE_VALUE {
                log::error!(target: "config", "failed to watch config directory: {:?}", dir);
                return;
            }

            while !stop_flag.load(Ordering::SeqCst) {
                let wait_result = WaitForSingleObject(handle, 100);
                if wait_result != WAIT_OBJECT_0 {
                    continue;
                }

                // Debounce: absorb any further notifications the OS fires
                // for the same logical save within the debounce window.
                std::thread::sleep(Duration::from_millis(DEBOUNCE_WINDOW_MS));
                std::thread::sleep(Duration::from_millis(QUIESCE_DELAY_MS));

                if let Ok(contents) = std::fs::read_to_string(&config_path) {
                    if let Some(new_config) = Config::reparse(&contents) {
                        *current.lock().unwrap() = new_config.clone();
                        let _ = sender.send(new_config);
                    }
                }

                FindNextChangeNotification(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.overlay.mode, OverlayMode::FullScreen);
        assert_eq!(config.overlay.inactive_color, Color::from_hex("#000000"));
        assert_eq!(config.overlay.inactive_opacity, 153);
        assert_eq!(config.overlay.active_opacity, 102);
        assert!(!config.overlay.exclude_from_screen_capture);
        assert_eq!(config.system.renderer_backend, "LayeredWindow");
        assert!(config.system.enable_logging);
        assert_eq!(config.system.log_level, "Information");
        assert_eq!(config.system.log_retention_days, 7);
        assert!(config.profiles.is_empty());
        assert!(config.current_profile.is_none());
    }

    #[test]
    fn round_trip_serialize_deserialize() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn schema_is_first_key_in_serialized_output() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let schema_pos = json.find("\"$schema\"").unwrap();
        let version_pos = json.find("\"ConfigVersion\"").unwrap();
        assert!(schema_pos < version_pos);
    }

    #[test]
    fn unknown_mode_falls_back_to_fullscreen() {
        assert_eq!(parse_mode("not-a-mode"), OverlayMode::FullScreen);
        assert_eq!(parse_mode("partial"), OverlayMode::Partial);
        assert_eq!(parse_mode("PARTIALWITHACTIVE"), OverlayMode::PartialWithActive);
    }

    #[test]
    fn opacity_out_of_range_is_clamped() {
        let json = r#"{
            "$schema": "x", "ConfigVersion": "1.0.0",
            "Overlay": {"Mode":"FullScreen","InactiveColor":"#000000","InactiveOpacity":999,"ActiveColor":"#000000","ActiveOpacity":-5,"ExcludeFromScreenCapture":false},
            "System": {"RendererBackend":"LayeredWindow","EnableLogging":true,"LogLevel":"Information","LogRetentionDays":7},
            "Profiles": [], "CurrentProfile": null
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.overlay.inactive_opacity, 255);
        assert_eq!(config.overlay.active_opacity, 0);
    }

    #[test]
    fn malformed_color_degrades_to_black() {
        let json = r#"{
            "$schema": "x", "ConfigVersion": "1.0.0",
            "Overlay": {"Mode":"FullScreen","InactiveColor":"not-a-color","InactiveOpacity":100,"ActiveColor":"#000000","ActiveOpacity":100,"ExcludeFromScreenCapture":false},
            "System": {"RendererBackend":"LayeredWindow","EnableLogging":true,"LogLevel":"Information","LogRetentionDays":7},
            "Profiles": [], "CurrentProfile": null
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.overlay.inactive_color, Color::BLACK);
    }

    #[test]
    fn profile_apply_list_and_delete() {
        let mut config = Config::default();
        config.overlay.mode = OverlayMode::PartialWithActive;
        config.save_profile("dark-mode");
        config.overlay = OverlayConfig::default();

        assert_eq!(config.list_profiles(), vec!["dark-mode"]);
        assert!(config.apply_profile("dark-mode"));
        assert_eq!(config.overlay.mode, OverlayMode::PartialWithActive);
        assert_eq!(config.current_profile.as_deref(), Some("dark-mode"));

        config.delete_profile("dark-mode");
        assert!(config.list_profiles().is_empty());
        assert!(config.current_profile.is_none());
    }

    #[test]
    fn level_filter_maps_every_configured_level() {
        let mut system = SystemConfig::default();
        for (name, expected) in [
            ("Trace", log::LevelFilter::Trace),
            ("Debug", log::LevelFilter::Debug),
            ("Information", log::LevelFilter::Info),
            ("Warning", log::LevelFilter::Warn),
            ("Error", log::LevelFilter::Error),
            ("Critical", log::LevelFilter::Error),
        ] {
            system.log_level = name.to_string();
            assert_eq!(system.level_filter(), expected);
        }
    }

    #[test]
    fn save_then_reparse_round_trips_through_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.overlay.mode = OverlayMode::Partial;
        config.overlay.inactive_opacity = 200;
        let serialized = serde_json::to_string_pretty(&config).unwrap();
        std::fs::write(&path, &serialized).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let reparsed = Config::reparse(&contents).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn reparse_keeps_previous_config_on_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid json").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(Config::reparse(&contents).is_none());
    }

    #[test]
    fn retention_days_out_of_range_is_clamped() {
        let json = r#"{
            "$schema": "x", "ConfigVersion": "1.0.0",
            "Overlay": {"Mode":"FullScreen","InactiveColor":"#000000","InactiveOpacity":100,"ActiveColor":"#000000","ActiveOpacity":100,"ExcludeFromScreenCapture":false},
            "System": {"RendererBackend":"LayeredWindow","EnableLogging":true,"LogLevel":"Information","LogRetentionDays":999},
            "Profiles": [], "CurrentProfile": null
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.system.log_retention_days, 365);
    }
}
