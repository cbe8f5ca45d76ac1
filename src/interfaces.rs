//! Trait seams to the collaborators spec.md §1 declares out of scope: the
//! system tray icon/menu, the auto-start-at-login registry entry, the
//! configuration GUI process, and the installer. None of them is implemented
//! in this crate; `Engine` reaches them only through these traits, and they
//! reach `Engine` only through [`TrayCommand`] and the accessors `Engine`
//! exposes.

use crate::config::Config;
use crate::primitives::Rectangle;

/// Opaque auto-start-at-login manager (spec.md §6 "Ingoing events expected
/// from collaborators not in scope"). The registry/launch-agent/systemd-unit
/// mechanics are platform bootstrapping outside the core's scope.
pub trait AutoStartManager {
    fn enable(&self) -> bool;
    fn disable(&self) -> bool;
    fn is_enabled(&self) -> bool;
}

/// Commands the system tray (or any other external controller) sends into
/// the engine. Named after spec.md §6's "Ingoing events expected from
/// collaborators not in scope" list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayCommand {
    PauseStateChanged(bool),
    ProfileSelected(String),
    ToggleLogging(bool),
    OpenConfigFile,
    QuitRequested,
}

/// Outgoing events (spec.md §6 "Outgoing events provided to collaborators"):
/// the tray icon, the configuration GUI, and any future log-viewer subscribe
/// through this trait rather than the engine reaching into them directly.
/// Default bodies are no-ops so an observer only needs to override the
/// events it actually cares about.
pub trait EngineObserver {
    fn on_configuration_changed(&self, _config: &Config) {}
    fn on_focused_display_changed(&self, _display_index: i32, _bounds: Rectangle) {}
    fn on_window_position_changed(&self, _display_index: i32, _bounds: Rectangle) {}
    fn on_check_displays_requested(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingObserver {
        configs_seen: std::cell::RefCell<Vec<String>>,
    }

    impl EngineObserver for RecordingObserver {
        fn on_configuration_changed(&self, config: &Config) {
            self.configs_seen.borrow_mut().push(config.config_version.clone());
        }
    }

    #[test]
    fn observer_default_methods_are_no_ops() {
        struct SilentObserver;
        impl EngineObserver for SilentObserver {}
        let observer = SilentObserver;
        observer.on_focused_display_changed(0, Rectangle::new(0, 0, 1, 1));
        observer.on_window_position_changed(0, Rectangle::new(0, 0, 1, 1));
        observer.on_check_displays_requested();
    }

    #[test]
    fn observer_can_override_just_one_event() {
        let observer = RecordingObserver { configs_seen: std::cell::RefCell::new(Vec::new()) };
        let mut config = Config::default();
        config.config_version = "1.2.3".to_string();
        observer.on_configuration_changed(&config);
        assert_eq!(observer.configs_seen.borrow().as_slice(), ["1.2.3"]);
    }
}
