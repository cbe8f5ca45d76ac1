//! Process entry point: DPI awareness, the single-instance guard, and the
//! engine's startup/message-pump/shutdown sequence. Everything else lives in
//! the library crate so it can be unit tested without spawning a process.

#[cfg(windows)]
fn main() {
    init_logging();

    set_dpi_awareness();

    if !ensure_single_instance() {
        log::warn!(target: "main", "another instance is already running; exiting");
        show_already_running_message();
        std::process::exit(0);
    }

    log::info!(target: "main", "spotlight-dimmer starting");

    let mut engine = match spotlight_dimmer::engine::Engine::start(None) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!(target: "main", "startup failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = engine.run() {
        log::error!(target: "main", "engine exited with an error: {}", e);
        std::process::exit(1);
    }

    std::process::exit(0);
}

/// Seeds `env_logger`'s filter from the persisted config rather than from
/// `RUST_LOG` alone, since spec.md §6 makes `System.LogLevel` the source of
/// truth for verbosity. `RUST_LOG`, if set, still overrides it — useful for
/// one-off debugging without touching the config file. Reads the config file
/// a second time (`Engine::start` reads it again to build the engine itself);
/// that's an acceptable cost for a config this small, read once at startup.
///
/// Caveat: `env_logger`'s own per-target filter is fixed at this call and
/// cannot be loosened afterward. `Engine`'s runtime `log::set_max_level`
/// calls (on a logging toggle or a hot-reloaded `LogLevel`) can only narrow
/// verbosity below what's seeded here, never widen it past it.
#[cfg(windows)]
fn init_logging() {
    let config = spotlight_dimmer::config::Config::load();
    let initial_level = if config.system.enable_logging {
        config.system.level_filter()
    } else {
        log::LevelFilter::Off
    };

    env_logger::Builder::new()
        .filter_level(initial_level)
        .parse_env("RUST_LOG")
        .init();
}

/// Creates a named mutex so a second launch can detect the first and exit
/// instead of fighting it over the same overlay window pool. The handle is
/// intentionally leaked: it only needs to outlive this process, and the OS
/// reclaims it at process exit.
#[cfg(windows)]
fn ensure_single_instance() -> bool {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use std::ptr;
    use winapi::shared::winerror::ERROR_ALREADY_EXISTS;
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::synchapi::CreateMutexW;

    let mutex_name: Vec<u16> = OsStr::new("Global\\SpotlightDimmerSingleInstanceMutex")
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    unsafe {
        let mutex_handle = CreateMutexW(ptr::null_mut(), 0, mutex_name.as_ptr());
        if mutex_handle.is_null() {
            log::error!(target: "main", "failed to create single-instance mutex, allowing launch to proceed");
            return true;
        }
        GetLastError() != ERROR_ALREADY_EXISTS
    }
}

#[cfg(windows)]
fn show_already_running_message() {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use std::ptr;
    use winapi::um::winuser::{MessageBoxW, MB_ICONWARNING, MB_OK};

    let to_wstring = |s: &str| -> Vec<u16> { OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect() };
    let title = to_wstring("Spotlight Dimmer");
    let message = to_wstring(
        "Spotlight Dimmer is already running.\n\nOnly one instance can run at a time to prevent overlay conflicts.\n\nCheck your system tray for the running instance.",
    );
    unsafe {
        MessageBoxW(ptr::null_mut(), message.as_ptr(), title.as_ptr(), MB_OK | MB_ICONWARNING);
    }
}

/// Puts the process in Per-Monitor-V2 DPI awareness so every rectangle the
/// engine measures (monitor bounds, window bounds) is in physical pixels.
/// Without this, overlays would be positioned using scaled coordinates and
/// every invariant in spec.md §8 would silently misalign on a scaled
/// display.
#[cfg(windows)]
fn set_dpi_awareness() {
    use winapi::shared::windef::DPI_AWARENESS_CONTEXT;
    use winapi::um::winuser::SetProcessDpiAwarenessContext;

    const DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2: DPI_AWARENESS_CONTEXT = -4isize as DPI_AWARENESS_CONTEXT;

    unsafe {
        if SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) == 0 {
            log::warn!(target: "main", "failed to set per-monitor DPI awareness; overlays may misalign at non-100% scaling");
        }
    }
}

#[cfg(not(windows))]
fn main() {
    eprintln!("Spotlight Dimmer's overlay engine is Windows-only (it draws through the Win32/DWM overlay surface).");
    std::process::exit(1);
}
