//! Reacts to `CheckDisplaysRequested` (fired by the engine message window
//! immediately on `WM_DISPLAYCHANGE` and again 2 s later as a safety
//! re-fire — see `message_window.rs`) by re-snapshotting the monitor
//! inventory and rebuilding everything that is sized per-display.

use crate::error::CoreResult;
use crate::monitor::MonitorInventory;
use crate::overlay_calculator::AppState;
use crate::overlay_renderer::RendererBackend;
use crate::overlay_calculator::OverlayCalculationConfig;
use crate::monitor::DisplayInfo;

/// Re-snapshots displays, rebuilds `AppState`, recreates the overlay window
/// pool, and returns the fresh inventory so the caller can run one
/// recalculation against it. Stateless: all the state it touches is owned
/// by the caller (the Wiring layer).
pub fn handle_check_displays_requested(
    inventory: &mut MonitorInventory,
    renderer: &mut dyn RendererBackend,
    config: &OverlayCalculationConfig,
) -> CoreResult<AppState> {
    inventory.refresh()?;
    let displays: Vec<DisplayInfo> = inventory.snapshot().to_vec();
    renderer.create_overlays(&displays, config)?;
    Ok(AppState::new(&displays))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::platform::{DisplayManager, RawDisplay};
    use crate::primitives::Rectangle;

    struct FakeDisplayManager {
        displays: Vec<RawDisplay>,
    }

    impl DisplayManager for FakeDisplayManager {
        fn enumerate_displays(&self) -> CoreResult<Vec<RawDisplay>> {
            if self.displays.is_empty() {
                Err(CoreError::MonitorEnumerationEmpty)
            } else {
                Ok(self.displays.clone())
            }
        }
    }

    struct FakeRenderer {
        create_overlays_calls: usize,
    }

    impl RendererBackend for FakeRenderer {
        fn create_overlays(&mut self, _displays: &[DisplayInfo], _config: &OverlayCalculationConfig) -> CoreResult<()> {
            self.create_overlays_calls += 1;
            Ok(())
        }
        fn update_overlays(&mut self, _state: &AppState) -> CoreResult<()> {
            Ok(())
        }
        fn update_brush_colors(&mut self, _config: &OverlayCalculationConfig) -> CoreResult<()> {
            Ok(())
        }
        fn update_screen_capture_exclusion(&mut self, _exclude: bool) -> usize {
            0
        }
        fn hide_all_overlays(&mut self) {}
        fn cleanup_overlays(&mut self) {}
        fn dispose(&mut self) {}
    }

    #[test]
    fn rebuilds_app_state_and_recreates_overlays_on_display_change() {
        let manager = FakeDisplayManager {
            displays: vec![RawDisplay { bounds: Rectangle::new(0, 0, 1920, 1080), is_primary: true }],
        };
        let mut inventory = MonitorInventory::new(Box::new(manager)).unwrap();
        let mut renderer = FakeRenderer { create_overlays_calls: 0 };
        let config = OverlayCalculationConfig::default();

        let state = handle_check_displays_requested(&mut inventory, &mut renderer, &config).unwrap();

        assert_eq!(state.displays.len(), 1);
        assert_eq!(renderer.create_overlays_calls, 1);
    }
}
