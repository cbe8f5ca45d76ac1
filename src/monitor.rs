//! Enumerates displays and maps window rectangles to the display that
//! contains most of them. Indices are stable only within one snapshot.

use crate::error::CoreResult;
use crate::platform::DisplayManager;
use crate::primitives::Rectangle;

/// `(index, bounds)`. The index is a stable ordinal within one inventory
/// snapshot; it is not a persistent identifier across display-topology
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayInfo {
    pub index: u32,
    pub bounds: Rectangle,
}

pub struct MonitorInventory {
    display_manager: Box<dyn DisplayManager>,
    cache: Vec<DisplayInfo>,
}

impl MonitorInventory {
    pub fn new(display_manager: Box<dyn DisplayManager>) -> CoreResult<Self> {
        let mut inventory = MonitorInventory { display_manager, cache: Vec::new() };
        inventory.refresh()?;
        Ok(inventory)
    }

    /// Re-enumerates displays and replaces the cache. Must be called at
    /// least once before `snapshot` is meaningful; `new` does this.
    pub fn refresh(&mut self) -> CoreResult<()> {
        let raw = self.display_manager.enumerate_displays()?;
        self.cache = raw
            .into_iter()
            .enumerate()
            .map(|(index, d)| DisplayInfo { index: index as u32, bounds: d.bounds })
            .collect();
        Ok(())
    }

    /// Returns the cached inventory without reallocating or re-enumerating.
    pub fn snapshot(&self) -> &[DisplayInfo] {
        &self.cache
    }

    /// Index of the display containing the largest portion of `bounds`, or
    /// -1 if the inventory is empty or `bounds` overlaps no display at all.
    pub fn display_index_for_bounds(&self, bounds: Rectangle) -> i32 {
        let mut best_index: i32 = -1;
        let mut best_area: i64 = 0;
        for display in &self.cache {
            let area = display.bounds.overlap_area(&bounds);
            if area > best_area {
                best_area = area;
                best_index = display.index as i32;
            }
        }
        best_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::platform::RawDisplay;

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

    fn dual_monitor_inventory() -> MonitorInventory {
        let manager = FakeDisplayManager {
            displays: vec![
                RawDisplay { bounds: Rectangle::new(0, 0, 1920, 1080), is_primary: true },
                RawDisplay { bounds: Rectangle::new(1920, 0, 1920, 1080), is_primary: false },
            ],
        };
        MonitorInventory::new(Box::new(manager)).unwrap()
    }

    #[test]
    fn snapshot_assigns_stable_indices_in_enumeration_order() {
        let inventory = dual_monitor_inventory();
        let snapshot = inventory.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].index, 0);
        assert_eq!(snapshot[1].index, 1);
    }

    #[test]
    fn display_index_for_bounds_picks_largest_overlap() {
        let inventory = dual_monitor_inventory();
        assert_eq!(inventory.display_index_for_bounds(Rectangle::new(100, 100, 800, 600)), 0);
        assert_eq!(inventory.display_index_for_bounds(Rectangle::new(2020, 100, 1000, 700)), 1);
    }

    #[test]
    fn display_index_for_bounds_window_spanning_both_picks_majority() {
        let inventory = dual_monitor_inventory();
        // mostly on D0, a sliver on D1
        assert_eq!(inventory.display_index_for_bounds(Rectangle::new(1800, 0, 300, 1080)), 0);
    }

    #[test]
    fn display_index_for_bounds_no_overlap_is_negative_one() {
        let inventory = dual_monitor_inventory();
        assert_eq!(inventory.display_index_for_bounds(Rectangle::new(-5000, -5000, 10, 10)), -1);
    }

    #[test]
    fn new_fails_when_enumeration_is_empty() {
        let manager = FakeDisplayManager { displays: vec![] };
        let result = MonitorInventory::new(Box::new(manager));
        assert!(matches!(result, Err(CoreError::MonitorEnumerationEmpty)));
    }
}
