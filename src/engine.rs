//! Wiring / lifecycle (spec.md §2 item 10, §4.9). Owns every OS resource the
//! engine needs — the overlay window pool, the message window, the focus
//! tracker's hooks, and the configuration watcher — and connects the OS
//! event stream to the Overlay Calculator and Overlay Renderer. This is the
//! only module that knows about all the others; every lower-level component
//! stays ignorant of its siblings.

use crate::config::{Config, ConfigWatcher};
use crate::display_monitor;
use crate::error::{CoreError, CoreResult};
use crate::focus_decider::{FocusChangeDecider, FocusDecision};
use crate::focus_tracker::FocusTracker;
use crate::interfaces::{EngineObserver, TrayCommand};
use crate::message_window::{EngineEvent, MessageWindow};
use crate::monitor::MonitorInventory;
use crate::overlay_calculator::{self, AppState, OverlayCalculationConfig};
use crate::overlay_renderer::{create_renderer_backend, RendererBackend};
use crate::platform::{DefaultDisplayManager, DefaultWindowManager};
use crate::primitives::Rectangle;
use crate::window_inspector::WindowInspector;
use std::mem;
use std::ptr;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use winapi::um::winuser::{
    DispatchMessageW, GetMessageW, PostQuitMessage, PostThreadMessageW, TranslateMessage, MSG,
    WM_QUIT,
};

/// Owns every OS handle the core acquires and runs the single-threaded
/// message pump described in spec.md §5. Must be constructed and run on the
/// same thread (the "engine thread"); `thread_id` lets an external signal
/// handler or tray thread post the quit message that unblocks `run`.
///
/// Field order is deliberate: struct fields drop top-to-bottom, and this is
/// the exact reverse of acquisition order (config watcher and focus tracker
/// started last, stopped first; renderer window pool torn down last; monitor
/// inventory needs no teardown) — see spec.md §3 "Ownership".
pub struct Engine {
    config_watcher: Option<ConfigWatcher>,
    focus_tracker: FocusTracker,
    message_window: MessageWindow,
    renderer: Box<dyn RendererBackend>,
    window_inspector: WindowInspector,
    monitor_inventory: MonitorInventory,

    decider: FocusChangeDecider,
    app_state: AppState,
    config: Config,
    calc_config: OverlayCalculationConfig,
    shared_config: Arc<Mutex<Config>>,
    paused: bool,
    last_focused_display_index: i32,
    last_focused_bounds: Option<Rectangle>,
    event_rx: Receiver<EngineEvent>,
    config_rx: Receiver<Config>,
    observer: Option<Box<dyn EngineObserver>>,
    engine_thread_id: u32,
}

impl Engine {
    /// Performs the full startup sequence (spec.md §4.9 "Wiring"). Must run
    /// on the thread that will later call `run`. Fatal failures (empty
    /// monitor enumeration, overlay window creation, hook registration)
    /// propagate so `main` can exit with a non-zero code per spec.md §6.
    pub fn start(observer: Option<Box<dyn EngineObserver>>) -> CoreResult<Self> {
        let engine_thread_id = unsafe { winapi::um::processthreadsapi::GetCurrentThreadId() };

        let monitor_inventory = MonitorInventory::new(Box::new(DefaultDisplayManager))?;
        let window_inspector = WindowInspector::new(Box::new(DefaultWindowManager));

        let config = Config::load();
        let calc_config = config.overlay.to_calculation_config();

        let mut renderer = create_renderer_backend(&config.system.renderer_backend);
        renderer.create_overlays(monitor_inventory.snapshot(), &calc_config)?;
        let accepted = renderer.update_screen_capture_exclusion(config.overlay.exclude_from_screen_capture);
        log::debug!(target: "engine", "screen capture exclusion requested on startup, {} window(s) accepted", accepted);

        let app_state = AppState::new(monitor_inventory.snapshot());

        let (event_tx, event_rx) = channel::<EngineEvent>();
        let message_window = MessageWindow::new(event_tx)
            .map_err(CoreError::WindowCreationFailed)?;
        message_window.arm_safety_poll();

        let focus_tracker = FocusTracker::start(message_window.handle())
            .map_err(CoreError::HookRegistrationFailed)?;

        let shared_config = Arc::new(Mutex::new(config.clone()));
        let (config_tx, config_rx) = channel::<Config>();
        let config_watcher = match Config::config_path() {
            Ok(path) => match ConfigWatcher::start(path, config_tx, shared_config.clone()) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    log::error!(target: "engine", "config hot reload disabled: {}", e);
                    None
                }
            },
            Err(e) => {
                log::error!(target: "engine", "cannot resolve config path, hot reload disabled: {}", e);
                None
            }
        };

        // Narrows the filter `main::init_logging` seeded at process start;
        // it cannot widen past what that seed allowed env_logger to emit.
        log::set_max_level(if config.system.enable_logging {
            config.system.level_filter()
        } else {
            log::LevelFilter::Off
        });

        let mut engine = Engine {
            config_watcher,
            focus_tracker,
            message_window,
            renderer,
            window_inspector,
            monitor_inventory,
            decider: FocusChangeDecider::new(),
            app_state,
            config,
            calc_config,
            shared_config,
            paused: false,
            last_focused_display_index: -1,
            last_focused_bounds: None,
            event_rx,
            config_rx,
            observer,
            engine_thread_id,
        };

        engine.refresh_focus_and_recalculate();
        log::info!(target: "engine", "started with {} display(s)", engine.monitor_inventory.snapshot().len());
        Ok(engine)
    }

    pub fn thread_id(&self) -> u32 {
        self.engine_thread_id
    }

    /// Posts the message that unblocks `run`'s message pump from any
    /// thread, given only the engine thread's id (spec.md §9 "Shutdown
    /// message posting").
    pub fn post_quit(engine_thread_id: u32) {
        unsafe {
            PostThreadMessageW(engine_thread_id, WM_QUIT, 0, 0);
        }
    }

    /// Blocks pumping Win32 messages until a `WM_QUIT` is posted (by
    /// `post_quit` or a `TrayCommand::QuitRequested`). Every dispatched
    /// message may have queued engine events through the message window's
    /// wndproc; those are drained and handled after each dispatch, still on
    /// the engine thread.
    pub fn run(&mut self) -> CoreResult<()> {
        loop {
            let mut msg: MSG = unsafe { mem::zeroed() };
            let result = unsafe { GetMessageW(&mut msg, ptr::null_mut(), 0, 0) };
            if result <= 0 {
                break;
            }
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
            self.drain_events();
        }
        log::info!(target: "engine", "message pump exited, shutting down");
        Ok(())
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                EngineEvent::FocusObservationReady => self.handle_focus_observation(),
                EngineEvent::CheckDisplaysRequested => self.handle_check_displays_requested(),
            }
        }
        while let Ok(new_config) = self.config_rx.try_recv() {
            self.handle_config_changed(new_config);
        }
    }

    fn handle_focus_observation(&mut self) {
        let Some(foreground) = self.window_inspector.foreground_window() else {
            return;
        };
        let content = self.window_inspector.resolve_uwp_content(foreground);
        let bounds = self.window_inspector.visible_bounds(content);
        let display_index = bounds
            .map(|b| self.monitor_inventory.display_index_for_bounds(b))
            .unwrap_or(-1);

        match self.decider.process(display_index, bounds) {
            FocusDecision::DisplayChanged => {
                self.last_focused_display_index = display_index;
                self.last_focused_bounds = bounds;
                self.recalculate();
                if let (Some(observer), Some(bounds)) = (&self.observer, bounds) {
                    observer.on_focused_display_changed(display_index, bounds);
                }
            }
            FocusDecision::PositionChanged => {
                self.last_focused_display_index = display_index;
                self.last_focused_bounds = bounds;
                self.recalculate();
                if let (Some(observer), Some(bounds)) = (&self.observer, bounds) {
                    observer.on_window_position_changed(display_index, bounds);
                }
            }
            FocusDecision::Ignored | FocusDecision::NoChange => {}
        }
    }

    /// Re-snapshots displays, rebuilds `AppState`, and recreates the overlay
    /// pool (spec.md §4.6). Display indices are not guaranteed stable across
    /// a topology change, so the decider is reset and focus is re-derived
    /// from scratch rather than trusted from before the rebuild.
    fn handle_check_displays_requested(&mut self) {
        match display_monitor::handle_check_displays_requested(
            &mut self.monitor_inventory,
            self.renderer.as_mut(),
            &self.calc_config,
        ) {
            Ok(new_state) => {
                self.app_state = new_state;
                if let Some(observer) = &self.observer {
                    observer.on_check_displays_requested();
                }
                self.refresh_focus_and_recalculate();
            }
            Err(e) => log::error!(target: "engine", "failed to rebuild display inventory: {}", e),
        }
    }

    fn handle_config_changed(&mut self, new_config: Config) {
        let backend_changed = new_config.system.renderer_backend != self.config.system.renderer_backend;
        self.config = new_config;
        self.calc_config = self.config.overlay.to_calculation_config();

        log::set_max_level(if self.config.system.enable_logging {
            self.config.system.level_filter()
        } else {
            log::LevelFilter::Off
        });

        if backend_changed {
            log::info!(target: "engine", "renderer backend changed to '{}'", self.config.system.renderer_backend);
            self.renderer = create_renderer_backend(&self.config.system.renderer_backend);
            if let Err(e) = self.renderer.create_overlays(self.monitor_inventory.snapshot(), &self.calc_config) {
                log::error!(target: "engine", "failed to recreate overlays for new backend: {}", e);
            }
        } else if let Err(e) = self.renderer.update_brush_colors(&self.calc_config) {
            log::warn!(target: "engine", "failed to update brush colors: {}", e);
        }

        let accepted = self.renderer.update_screen_capture_exclusion(self.config.overlay.exclude_from_screen_capture);
        log::debug!(target: "engine", "screen capture exclusion updated, {} window(s) accepted", accepted);

        if !self.paused {
            self.recalculate();
        }

        if let Some(observer) = &self.observer {
            observer.on_configuration_changed(&self.config);
        }
    }

    fn refresh_focus_and_recalculate(&mut self) {
        let (bounds, display_index) = match self.window_inspector.foreground_window() {
            Some(foreground) => {
                let content = self.window_inspector.resolve_uwp_content(foreground);
                let bounds = self.window_inspector.visible_bounds(content);
                let display_index = bounds
                    .map(|b| self.monitor_inventory.display_index_for_bounds(b))
                    .unwrap_or(-1);
                (bounds, display_index)
            }
            None => (None, -1),
        };

        self.last_focused_bounds = bounds;
        self.last_focused_display_index = display_index;
        self.decider = FocusChangeDecider::new();
        let _ = self.decider.process(display_index, bounds);
        self.recalculate();
    }

    /// Runs the calculator and applies the result, unless paused (spec.md
    /// §4.9: "When paused... short-circuit `update_overlays` until
    /// resumed").
    fn recalculate(&mut self) {
        if self.paused {
            return;
        }
        overlay_calculator::calculate(
            &mut self.app_state,
            self.last_focused_bounds,
            self.last_focused_display_index,
            &self.calc_config,
        );
        if let Err(e) = self.renderer.update_overlays(&self.app_state) {
            log::warn!(target: "engine", "update_overlays failed: {}", e);
        }
    }

    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.renderer.hide_all_overlays();
        log::info!(target: "engine", "paused");
    }

    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        log::info!(target: "engine", "resumed");
        self.recalculate();
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn apply_profile(&mut self, name: &str) -> bool {
        if !self.config.apply_profile(name) {
            return false;
        }
        if let Err(e) = self.config.save() {
            log::error!(target: "engine", "failed to persist applied profile: {}", e);
        }
        *self.shared_config.lock().unwrap() = self.config.clone();
        self.calc_config = self.config.overlay.to_calculation_config();
        if let Err(e) = self.renderer.update_brush_colors(&self.calc_config) {
            log::warn!(target: "engine", "failed to update brush colors after profile switch: {}", e);
        }
        self.recalculate();
        if let Some(observer) = &self.observer {
            observer.on_configuration_changed(&self.config);
        }
        true
    }

    fn set_logging_enabled(&mut self, enabled: bool) {
        self.config.system.enable_logging = enabled;
        if let Err(e) = self.config.save() {
            log::error!(target: "engine", "failed to persist logging toggle: {}", e);
        }
        log::set_max_level(if enabled { self.config.system.level_filter() } else { log::LevelFilter::Off });
    }

    /// Handles a command from the system tray (spec.md §6 "Ingoing events
    /// expected from collaborators not in scope").
    pub fn handle_tray_command(&mut self, command: TrayCommand) {
        match command {
            TrayCommand::PauseStateChanged(true) => self.pause(),
            TrayCommand::PauseStateChanged(false) => self.resume(),
            TrayCommand::ProfileSelected(name) => {
                if !self.apply_profile(&name) {
                    log::warn!(target: "engine", "tray selected unknown profile '{}'", name);
                }
            }
            TrayCommand::ToggleLogging(enabled) => self.set_logging_enabled(enabled),
            TrayCommand::OpenConfigFile => match Config::config_path() {
                Ok(path) => log::info!(target: "engine", "config file is at {:?}", path),
                Err(e) => log::error!(target: "engine", "cannot resolve config path: {}", e),
            },
            TrayCommand::QuitRequested => unsafe {
                PostQuitMessage(0);
            },
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.renderer.cleanup_overlays();
        log::info!(target: "engine", "shut down");
    }
}
