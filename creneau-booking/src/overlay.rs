use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use uuid::Uuid;

use creneau_availability::SlotView;

/// Local overlay state for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMark {
    /// Marked reserved before the server answered.
    Optimistic,
    /// Server agreed; the reservation is real.
    Confirmed,
    /// Server disagreed; server truth stands.
    RolledBack,
}

/// Optimistic local view layered over the authoritative availability
/// snapshot. The UI marks a slot reserved the instant a hold is
/// requested; a conflict rolls that mark back in one deterministic
/// operation.
#[derive(Debug, Default)]
pub struct SlotOverlay {
    marks: HashMap<Uuid, OverlayMark>,
}

impl SlotOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_optimistic(&mut self, slot_id: Uuid) {
        self.marks.insert(slot_id, OverlayMark::Optimistic);
    }

    pub fn confirm(&mut self, slot_id: Uuid) {
        self.marks.insert(slot_id, OverlayMark::Confirmed);
    }

    pub fn roll_back(&mut self, slot_id: Uuid) {
        self.marks.insert(slot_id, OverlayMark::RolledBack);
    }

    pub fn mark(&self, slot_id: Uuid) -> Option<OverlayMark> {
        self.marks.get(&slot_id).copied()
    }

    /// Locally reserved: optimistic or confirmed, not rolled back.
    pub fn is_reserved(&self, slot_id: Uuid) -> bool {
        matches!(
            self.mark(slot_id),
            Some(OverlayMark::Optimistic | OverlayMark::Confirmed)
        )
    }

    /// Fold the overlay into an availability view for display. Rolled
    /// back slots keep whatever the server said.
    pub fn apply(&self, view: &mut BTreeMap<NaiveDate, Vec<SlotView>>) {
        for entries in view.values_mut() {
            for entry in entries.iter_mut() {
                if self.is_reserved(entry.slot_id) {
                    entry.available = false;
                    entry.yours = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn view_with(slot_id: Uuid) -> BTreeMap<NaiveDate, Vec<SlotView>> {
        let mut view = BTreeMap::new();
        view.insert(
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            vec![SlotView {
                slot_id,
                start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
                available: true,
                yours: false,
            }],
        );
        view
    }

    #[test]
    fn test_optimistic_mark_then_rollback() {
        let slot_id = Uuid::new_v4();
        let mut overlay = SlotOverlay::new();

        overlay.mark_optimistic(slot_id);
        assert!(overlay.is_reserved(slot_id));

        let mut view = view_with(slot_id);
        overlay.apply(&mut view);
        let entry = &view.values().next().unwrap()[0];
        assert!(!entry.available);
        assert!(entry.yours);

        overlay.roll_back(slot_id);
        assert!(!overlay.is_reserved(slot_id));
        assert_eq!(overlay.mark(slot_id), Some(OverlayMark::RolledBack));

        // server truth stands again
        let mut view = view_with(slot_id);
        overlay.apply(&mut view);
        assert!(view.values().next().unwrap()[0].available);
    }

    #[test]
    fn test_confirmed_stays_reserved() {
        let slot_id = Uuid::new_v4();
        let mut overlay = SlotOverlay::new();
        overlay.mark_optimistic(slot_id);
        overlay.confirm(slot_id);
        assert_eq!(overlay.mark(slot_id), Some(OverlayMark::Confirmed));
        assert!(overlay.is_reserved(slot_id));
    }

    #[test]
    fn test_unmarked_slots_untouched() {
        let overlay = SlotOverlay::new();
        let slot_id = Uuid::new_v4();
        let mut view = view_with(slot_id);
        overlay.apply(&mut view);
        assert!(view.values().next().unwrap()[0].available);
        assert_eq!(overlay.mark(slot_id), None);
    }
}
