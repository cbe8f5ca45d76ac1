use thiserror::Error;

/// The closed set of failures the engine can encounter, each bound to the
/// handling policy fixed for its kind (fatal/log-and-continue/silent
/// fallback/swallow). Call sites apply that policy rather than re-deciding it
/// ad hoc.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("monitor enumeration returned no displays")]
    MonitorEnumerationEmpty,

    #[error("overlay window creation failed: {0}")]
    WindowCreationFailed(String),

    #[error("hook registration failed: {0}")]
    HookRegistrationFailed(String),

    #[error("overlay window update failed: {0}")]
    WindowUpdateFailed(String),

    #[error("DWM extended frame bounds unavailable")]
    DwmBoundsUnavailable,

    #[error("UWP content window resolution failed")]
    UwpResolutionFailed,

    #[error("config file parse failed: {0}")]
    ConfigParseFailed(String),

    #[error("config file write failed: {0}")]
    ConfigWriteFailed(String),

    #[error("screen capture exclusion unsupported on this window")]
    ScreenCaptureExclusionUnsupported,

    #[error("display inventory changed mid-update")]
    DisplayChangeDuringUpdate,
}

pub type CoreResult<T> = Result<T, CoreError>;
