//! Pure state machine turning raw focus observations into update decisions.
//! Holds no OS resources; every rule is total and side-effect free besides
//! updating its own two fields.

use crate::primitives::Rectangle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDecision {
    Ignored,
    DisplayChanged,
    PositionChanged,
    NoChange,
}

pub struct FocusChangeDecider {
    last_display_index: i32,
    last_bounds: Option<Rectangle>,
}

impl Default for FocusChangeDecider {
    fn default() -> Self {
        FocusChangeDecider { last_display_index: -1, last_bounds: None }
    }
}

impl FocusChangeDecider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, observed_display_index: i32, observed_bounds: Option<Rectangle>) -> FocusDecision {
        // Rule 1: zero-dimension bounds present.
        if let Some(bounds) = observed_bounds {
            if bounds.width == 0 || bounds.height == 0 {
                if observed_display_index != self.last_display_index {
                    self.last_display_index = observed_display_index;
                    self.last_bounds = None;
                }
                return FocusDecision::Ignored;
            }
        } else {
            // Rule 2: no bounds at all.
            return FocusDecision::Ignored;
        }

        let observed_bounds = observed_bounds.unwrap();
        let display_changed = observed_display_index != self.last_display_index;
        let bounds_changed = Some(observed_bounds) != self.last_bounds;

        if display_changed {
            self.last_display_index = observed_display_index;
            self.last_bounds = Some(observed_bounds);
            FocusDecision::DisplayChanged
        } else if bounds_changed {
            self.last_bounds = Some(observed_bounds);
            FocusDecision::PositionChanged
        } else {
            FocusDecision::NoChange
        }
    }
}
