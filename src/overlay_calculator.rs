//! Pure, synchronous, zero-allocation engine that turns display topology,
//! the focused window's bounds, and a configuration into overlay slot
//! states. All state lives in `AppState`, preallocated once at startup.

use crate::monitor::DisplayInfo;
use crate::primitives::{Color, OverlayRegion, Rectangle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    FullScreen,
    Partial,
    PartialWithActive,
}

/// The calculator's contract: richer user configuration (log level, backend
/// selection, profiles) is the Configuration Manager's concern and gets
/// projected down to this struct before `calculate` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayCalculationConfig {
    pub mode: OverlayMode,
    pub inactive_color: Color,
    pub inactive_opacity: u8,
    pub active_color: Color,
    pub active_opacity: u8,
}

impl Default for OverlayCalculationConfig {
    fn default() -> Self {
        OverlayCalculationConfig {
            mode: OverlayMode::FullScreen,
            inactive_color: Color::BLACK,
            inactive_opacity: 153,
            active_color: Color::BLACK,
            active_opacity: 102,
        }
    }
}

/// Mutable slot: region is fixed at construction, the rest is updated in
/// place every `calculate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayDefinition {
    pub region: OverlayRegion,
    pub bounds: Rectangle,
    pub color: Color,
    pub opacity: u8,
    pub is_visible: bool,
}

impl OverlayDefinition {
    pub fn new(region: OverlayRegion) -> Self {
        OverlayDefinition {
            region,
            bounds: Rectangle::default(),
            color: Color::BLACK,
            opacity: 0,
            is_visible: false,
        }
    }

    fn hide(&mut self) {
        self.is_visible = false;
    }

    fn show(&mut self, bounds: Rectangle, color: Color, opacity: u8) {
        self.bounds = bounds;
        self.color = color;
        self.opacity = opacity;
        self.is_visible = true;
    }
}

/// One display's full set of six overlay slots, created once per display at
/// startup and reused for the process lifetime (until a display-topology
/// change rebuilds the whole `AppState`).
#[derive(Debug, Clone)]
pub struct DisplayOverlayState {
    pub display_index: u32,
    pub display_bounds: Rectangle,
    pub overlays: [OverlayDefinition; 6],
}

impl DisplayOverlayState {
    pub fn new(display_index: u32, display_bounds: Rectangle) -> Self {
        DisplayOverlayState {
            display_index,
            display_bounds,
            overlays: OverlayRegion::ALL.map(OverlayDefinition::new),
        }
    }

    fn overlay_mut(&mut self, region: OverlayRegion) -> &mut OverlayDefinition {
        &mut self.overlays[region.index()]
    }
}

/// Ordered array of `DisplayOverlayState`, one entry per display in
/// inventory order. Rebuilt wholesale only when the display-topology
/// monitor detects a change.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub displays: Vec<DisplayOverlayState>,
}

impl AppState {
    pub fn new(displays: &[DisplayInfo]) -> Self {
        AppState {
            displays: displays
                .iter()
                .map(|d| DisplayOverlayState::new(d.index, d.bounds))
                .collect(),
        }
    }
}

/// Mutates `state` in place. Given the same inputs, produces the same
/// output byte-for-byte; never fails.
pub fn calculate(
    state: &mut AppState,
    focused_window_bounds: Option<Rectangle>,
    focused_display_index: i32,
    config: &OverlayCalculationConfig,
) {
    for display in &mut state.displays {
        for overlay in &mut display.overlays {
            overlay.hide();
        }
    }

    for display in &mut state.displays {
        let is_focused_display = display.display_index as i32 == focused_display_index;

        if !is_focused_display || focused_window_bounds.is_none() {
            display.overlay_mut(OverlayRegion::FullScreen).show(
                display.display_bounds,
                config.inactive_color,
                config.inactive_opacity,
            );
            continue;
        }

        let window_bounds = focused_window_bounds.unwrap();

        match config.mode {
            OverlayMode::FullScreen => {
                // every overlay stays hidden: this display is fully bright
            }
            OverlayMode::Partial | OverlayMode::PartialWithActive => {
                let clamped = display.display_bounds.intersect(&window_bounds);
                apply_side_overlays(display, clamped, config.inactive_color, config.inactive_opacity);

                if config.mode == OverlayMode::PartialWithActive && !clamped.is_empty() {
                    display.overlay_mut(OverlayRegion::Center).show(
                        clamped,
                        config.active_color,
                        config.active_opacity,
                    );
                }
            }
        }
    }
}

fn apply_side_overlays(display: &mut DisplayOverlayState, clamped: Rectangle, color: Color, opacity: u8) {
    if clamped.is_empty() {
        // Window entirely off the display: no overlap to carve sides around,
        // so every side would otherwise degenerate to the full display strip.
        return;
    }

    let d = display.display_bounds;

    let top = Rectangle::new(d.left(), d.top(), d.width, clamped.top() - d.top());
    let bottom = Rectangle::new(d.left(), clamped.bottom(), d.width, d.bottom() - clamped.bottom());
    let left = Rectangle::new(d.left(), clamped.top(), clamped.left() - d.left(), clamped.height);
    let right = Rectangle::new(clamped.right(), clamped.top(), d.right() - clamped.right(), clamped.height);

    for (region, rect) in [
        (OverlayRegion::Top, top),
        (OverlayRegion::Bottom, bottom),
        (OverlayRegion::Left, left),
        (OverlayRegion::Right, right),
    ] {
        if !rect.is_empty() {
            display.overlay_mut(region).show(rect, color, opacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual_monitor_displays() -> Vec<DisplayInfo> {
        vec![
            DisplayInfo { index: 0, bounds: Rectangle::new(0, 0, 1920, 1080) },
            DisplayInfo { index: 1, bounds: Rectangle::new(1920, 0, 1920, 1080) },
        ]
    }

    fn overlay(state: &AppState, display_index: u32, region: OverlayRegion) -> OverlayDefinition {
        state.displays[display_index as usize].overlays[region.index()]
    }

    // S1
    #[test]
    fn fullscreen_mode_dual_monitor_focus_switch() {
        let displays = dual_monitor_displays();
        let mut state = AppState::new(&displays);
        let config = OverlayCalculationConfig { mode: OverlayMode::FullScreen, ..Default::default() };

        calculate(&mut state, Some(Rectangle::new(100, 100, 800, 600)), 0, &config);
        assert!(!overlay(&state, 0, OverlayRegion::FullScreen).is_visible);
        let d1 = overlay(&state, 1, OverlayRegion::FullScreen);
        assert!(d1.is_visible);
        assert_eq!(d1.bounds, Rectangle::new(1920, 0, 1920, 1080));

        calculate(&mut state, Some(Rectangle::new(2020, 100, 1000, 700)), 1, &config);
        assert!(!overlay(&state, 1, OverlayRegion::FullScreen).is_visible);
        let d0 = overlay(&state, 0, OverlayRegion::FullScreen);
        assert!(d0.is_visible);
        assert_eq!(d0.bounds, Rectangle::new(0, 0, 1920, 1080));
    }

    // S2
    #[test]
    fn partial_mode_centered_window() {
        let displays = vec![DisplayInfo { index: 0, bounds: Rectangle::new(0, 0, 1920, 1080) }];
        let mut state = AppState::new(&displays);
        let config = OverlayCalculationConfig { mode: OverlayMode::Partial, ..Default::default() };

        calculate(&mut state, Some(Rectangle::new(400, 200, 1120, 680)), 0, &config);

        assert_eq!(overlay(&state, 0, OverlayRegion::Top).bounds, Rectangle::new(0, 0, 1920, 200));
        assert_eq!(overlay(&state, 0, OverlayRegion::Bottom).bounds, Rectangle::new(0, 880, 1920, 200));
        assert_eq!(overlay(&state, 0, OverlayRegion::Left).bounds, Rectangle::new(0, 200, 400, 680));
        assert_eq!(overlay(&state, 0, OverlayRegion::Right).bounds, Rectangle::new(1520, 200, 400, 680));
        assert!(!overlay(&state, 0, OverlayRegion::Center).is_visible);
        assert!(!overlay(&state, 0, OverlayRegion::FullScreen).is_visible);
    }

    // S3
    #[test]
    fn partial_with_active_adds_center_overlay() {
        let displays = vec![DisplayInfo { index: 0, bounds: Rectangle::new(0, 0, 1920, 1080) }];
        let mut state = AppState::new(&displays);
        let config = OverlayCalculationConfig { mode: OverlayMode::PartialWithActive, ..Default::default() };

        calculate(&mut state, Some(Rectangle::new(400, 200, 1120, 680)), 0, &config);

        let center = overlay(&state, 0, OverlayRegion::Center);
        assert!(center.is_visible);
        assert_eq!(center.bounds, Rectangle::new(400, 200, 1120, 680));
        assert_eq!(center.color, config.active_color);
        assert_eq!(center.opacity, config.active_opacity);
    }

    // S5
    #[test]
    fn partial_mode_window_fills_display_hides_all_sides() {
        let displays = vec![DisplayInfo { index: 0, bounds: Rectangle::new(0, 0, 1920, 1080) }];
        let mut state = AppState::new(&displays);
        let config = OverlayCalculationConfig { mode: OverlayMode::Partial, ..Default::default() };

        calculate(&mut state, Some(Rectangle::new(0, 0, 1920, 1080)), 0, &config);

        for region in [OverlayRegion::Top, OverlayRegion::Bottom, OverlayRegion::Left, OverlayRegion::Right] {
            assert!(!overlay(&state, 0, region).is_visible);
        }
    }

    #[test]
    fn invariant_at_most_one_of_fullscreen_or_partial_set_visible() {
        let displays = dual_monitor_displays();
        let mut state = AppState::new(&displays);
        let config = OverlayCalculationConfig { mode: OverlayMode::PartialWithActive, ..Default::default() };
        calculate(&mut state, Some(Rectangle::new(100, 100, 800, 600)), 0, &config);

        for display in &state.displays {
            let fullscreen_visible = display.overlays[OverlayRegion::FullScreen.index()].is_visible;
            let any_partial_visible = [OverlayRegion::Top, OverlayRegion::Bottom, OverlayRegion::Left, OverlayRegion::Right, OverlayRegion::Center]
                .iter()
                .any(|r| display.overlays[r.index()].is_visible);
            assert!(!(fullscreen_visible && any_partial_visible));
        }
    }

    #[test]
    fn invariant_visible_overlays_are_within_display_bounds_and_nonempty() {
        let displays = vec![DisplayInfo { index: 0, bounds: Rectangle::new(0, 0, 1920, 1080) }];
        let mut state = AppState::new(&displays);
        let config = OverlayCalculationConfig { mode: OverlayMode::PartialWithActive, ..Default::default() };
        calculate(&mut state, Some(Rectangle::new(400, 200, 1120, 680)), 0, &config);

        let display_bounds = state.displays[0].display_bounds;
        for overlay in &state.displays[0].overlays {
            if overlay.is_visible {
                assert!(overlay.bounds.width > 0 && overlay.bounds.height > 0);
                assert_eq!(display_bounds.intersect(&overlay.bounds), overlay.bounds);
            }
        }
    }

    #[test]
    fn invariant_non_focused_displays_show_only_fullscreen_inactive() {
        let displays = dual_monitor_displays();
        let mut state = AppState::new(&displays);
        let config = OverlayCalculationConfig { mode: OverlayMode::PartialWithActive, ..Default::default() };
        calculate(&mut state, Some(Rectangle::new(100, 100, 800, 600)), 0, &config);

        let d1 = &state.displays[1];
        assert!(d1.overlays[OverlayRegion::FullScreen.index()].is_visible);
        assert_eq!(d1.overlays[OverlayRegion::FullScreen.index()].color, config.inactive_color);
        assert_eq!(d1.overlays[OverlayRegion::FullScreen.index()].opacity, config.inactive_opacity);
        for region in [OverlayRegion::Top, OverlayRegion::Bottom, OverlayRegion::Left, OverlayRegion::Right, OverlayRegion::Center] {
            assert!(!d1.overlays[region.index()].is_visible);
        }
    }

    #[test]
    fn calculate_is_idempotent() {
        let displays = dual_monitor_displays();
        let mut state = AppState::new(&displays);
        let config = OverlayCalculationConfig { mode: OverlayMode::PartialWithActive, ..Default::default() };
        calculate(&mut state, Some(Rectangle::new(100, 100, 800, 600)), 0, &config);
        let first = state.clone();
        calculate(&mut state, Some(Rectangle::new(100, 100, 800, 600)), 0, &config);
        for (a, b) in first.displays.iter().zip(state.displays.iter()) {
            assert_eq!(a.overlays, b.overlays);
        }
    }

    #[test]
    fn window_entirely_off_display_leaves_focused_display_blank() {
        let displays = vec![DisplayInfo { index: 0, bounds: Rectangle::new(0, 0, 1920, 1080) }];
        let mut state = AppState::new(&displays);
        let config = OverlayCalculationConfig { mode: OverlayMode::PartialWithActive, ..Default::default() };
        calculate(&mut state, Some(Rectangle::new(5000, 5000, 100, 100)), 0, &config);
        for overlay in &state.displays[0].overlays {
            assert!(!overlay.is_visible);
        }
    }
}
