//! Local bookkeeping of the local party's offer.
//!
//! The ledger keeps two views:
//!
//! - the *intended* offer, a slot → item map maintained by successful add/remove
//!   commands,
//! - the *confirmed* offer, replaced wholesale from every version-changed snapshot.
//!
//! The only way to learn whether an add or remove took effect is the next
//! version-changed snapshot, so the two can drift apart in between.
//! [`OfferLedger::validate`] must pass before ready-up or accept is sent.

use std::collections::BTreeMap;

use crate::snapshot::OfferVec;
use crate::telemetry::{InvariantChecker, InvariantViolation};
use crate::{ItemRef, Slot, TradeError};

/// Intended and confirmed views of the local offer.
#[derive(Debug, Clone, Default)]
pub struct OfferLedger {
    intended: BTreeMap<Slot, ItemRef>,
    confirmed: OfferVec,
}

impl OfferLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The lowest slot not holding an item.
    #[must_use]
    pub fn next_free_slot(&self) -> Slot {
        // keys are sorted, so the first gap is the first key that differs from its index
        let mut candidate = 0_u32;
        for slot in self.intended.keys() {
            if slot.as_u32() != candidate {
                break;
            }
            candidate += 1;
        }
        Slot::new(candidate)
    }

    /// Records `item` at `slot` after the server accepted the add.
    pub fn assign(&mut self, slot: Slot, item: ItemRef) {
        self.intended.insert(slot, item);
    }

    /// Frees `slot` after the server accepted the removal.
    pub fn release(&mut self, slot: Slot) -> Option<ItemRef> {
        self.intended.remove(&slot)
    }

    /// The slot holding `item`, if it is offered.
    #[must_use]
    pub fn slot_of(&self, item: &ItemRef) -> Option<Slot> {
        self.intended
            .iter()
            .find_map(|(slot, held)| (held == item).then_some(*slot))
    }

    /// The intended offer, ordered by slot.
    #[must_use]
    pub fn intended(&self) -> &BTreeMap<Slot, ItemRef> {
        &self.intended
    }

    /// The offer the server last confirmed.
    #[must_use]
    pub fn confirmed(&self) -> &[ItemRef] {
        &self.confirmed
    }

    /// Replaces the confirmed offer with a fresh server view.
    pub fn replace_confirmed(&mut self, confirmed: OfferVec) {
        self.confirmed = confirmed;
    }

    /// Number of items in the intended offer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intended.len()
    }

    /// Returns `true` if nothing is intended to be offered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intended.is_empty()
    }

    /// Checks that the intended and confirmed offers hold the same items.
    ///
    /// # Errors
    /// Returns [`TradeError::OfferMismatch`] on a count mismatch or any item present
    /// in one view and missing from the other.
    pub fn validate(&self) -> Result<(), TradeError> {
        let mut intended: Vec<ItemRef> = self.intended.values().copied().collect();
        let mut confirmed: Vec<ItemRef> = self.confirmed.to_vec();
        intended.sort_unstable();
        confirmed.sort_unstable();
        if intended == confirmed {
            return Ok(());
        }
        Err(TradeError::OfferMismatch {
            intended,
            confirmed,
        })
    }
}

impl InvariantChecker for OfferLedger {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen: Vec<&ItemRef> = self.intended.values().collect();
        seen.sort_unstable();
        if let Some(pair) = seen.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(InvariantViolation::new(
                "OfferLedger",
                "an item occupies more than one slot",
            )
            .with_details(format!("item {}", pair[0])));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::{AppId, AssetId, ContextId};

    fn hat(asset: u64) -> ItemRef {
        ItemRef::new(AppId::new(440), ContextId::new(2), AssetId::new(asset))
    }

    #[test]
    fn slots_are_assigned_densely() {
        let mut ledger = OfferLedger::new();
        for (i, asset) in [10, 11, 12].into_iter().enumerate() {
            let slot = ledger.next_free_slot();
            assert_eq!(slot, Slot::new(i as u32));
            ledger.assign(slot, hat(asset));
        }
        assert_eq!(ledger.next_free_slot(), Slot::new(3));
    }

    #[test]
    fn lowest_free_slot_is_reused() {
        let mut ledger = OfferLedger::new();
        for asset in [10, 11, 12] {
            let slot = ledger.next_free_slot();
            ledger.assign(slot, hat(asset));
        }
        let slot = ledger.slot_of(&hat(11)).unwrap();
        assert_eq!(slot, Slot::new(1));
        assert_eq!(ledger.release(slot), Some(hat(11)));
        assert_eq!(ledger.next_free_slot(), Slot::new(1));
    }

    #[test]
    fn slot_zero_reused_first() {
        let mut ledger = OfferLedger::new();
        ledger.assign(Slot::new(0), hat(1));
        ledger.assign(Slot::new(1), hat(2));
        ledger.release(Slot::new(0));
        assert_eq!(ledger.next_free_slot(), Slot::new(0));
    }

    #[test]
    fn unknown_item_has_no_slot() {
        let ledger = OfferLedger::new();
        assert_eq!(ledger.slot_of(&hat(1)), None);
    }

    #[test]
    fn validate_passes_on_same_set_in_any_order() {
        let mut ledger = OfferLedger::new();
        ledger.assign(Slot::new(0), hat(1));
        ledger.assign(Slot::new(1), hat(2));
        ledger.replace_confirmed([hat(2), hat(1)].into_iter().collect());
        assert!(ledger.validate().is_ok());
    }

    #[test]
    fn validate_fails_when_confirmed_omits_item() {
        let mut ledger = OfferLedger::new();
        ledger.assign(Slot::new(0), hat(1));
        ledger.assign(Slot::new(1), hat(2));
        ledger.replace_confirmed([hat(1)].into_iter().collect());
        match ledger.validate() {
            Err(TradeError::OfferMismatch {
                intended,
                confirmed,
            }) => {
                assert_eq!(intended, vec![hat(1), hat(2)]);
                assert_eq!(confirmed, vec![hat(1)]);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn validate_fails_on_same_count_different_items() {
        let mut ledger = OfferLedger::new();
        ledger.assign(Slot::new(0), hat(1));
        ledger.replace_confirmed([hat(9)].into_iter().collect());
        assert!(ledger.validate().is_err());
    }

    #[test]
    fn validate_fails_when_server_shows_extra_item() {
        let mut ledger = OfferLedger::new();
        ledger.replace_confirmed([hat(3)].into_iter().collect());
        assert!(ledger.validate().is_err());
    }

    #[test]
    fn empty_ledger_validates() {
        assert!(OfferLedger::new().validate().is_ok());
    }

    #[test]
    fn duplicate_item_breaks_invariant() {
        let mut ledger = OfferLedger::new();
        ledger.assign(Slot::new(0), hat(1));
        assert!(ledger.check_invariants().is_ok());
        ledger.assign(Slot::new(3), hat(1));
        assert!(ledger.check_invariants().is_err());
    }
}
