// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Positional price ledger and the reconciliation pass that repairs it after
//! free-form slot edits.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::item::{ItemKind, ItemStack};

#[derive(Clone, Debug, Default, PartialEq)]
struct PriceEntry {
    price: Decimal,
    /// Kind the price was established for. A slot whose contents changed kind
    /// since then carries a stale positional price.
    anchor: Option<ItemKind>,
}

/// Per-slot unit prices, parallel to a kiosk's canonical slots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceLedger {
    entries: Vec<PriceEntry>,
}

/// Counts of slots touched by one [`PriceLedger::reconcile`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub cleared: usize,
    pub collapsed: usize,
    pub inherited: usize,
}

impl ReconcileSummary {
    pub fn is_noop(&self) -> bool {
        self.cleared == 0 && self.collapsed == 0 && self.inherited == 0
    }
}

impl PriceLedger {
    pub fn zeroed(len: usize) -> Self {
        Self {
            entries: vec![PriceEntry::default(); len],
        }
    }

    /// Builds a ledger from persisted prices, anchoring every nonzero price to
    /// the item currently stored in its slot.
    pub fn load(prices: &[Decimal], slots: &[Option<ItemStack>]) -> Self {
        let entries = prices
            .iter()
            .zip(slots)
            .map(|(&price, slot)| PriceEntry {
                price,
                anchor: slot
                    .as_ref()
                    .filter(|_| price > Decimal::ZERO)
                    .map(|item| item.kind.clone()),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn price(&self, slot: usize) -> Decimal {
        self.entries.get(slot).map(|e| e.price).unwrap_or_default()
    }

    pub fn prices(&self) -> Vec<Decimal> {
        self.entries.iter().map(|e| e.price).collect()
    }

    pub(crate) fn set(&mut self, slot: usize, price: Decimal, kind: &ItemKind) {
        if let Some(entry) = self.entries.get_mut(slot) {
            entry.price = price;
            entry.anchor = (price > Decimal::ZERO).then(|| kind.clone());
        }
    }

    pub(crate) fn clear(&mut self, slot: usize) {
        if let Some(entry) = self.entries.get_mut(slot) {
            *entry = PriceEntry::default();
        }
    }

    /// Recomputes prices after the slots were edited.
    ///
    /// Pass one zeroes emptied slots and records the first nonzero price seen
    /// for each kind; a later slot of the same kind whose price is not anchored
    /// to its current contents collapses onto that first price. Pass two lets
    /// unpriced, non-empty slots inherit the recorded price for their kind.
    /// Every priced slot is re-anchored afterwards, so a second pass over the
    /// same slots changes nothing.
    pub fn reconcile(&mut self, slots: &[Option<ItemStack>]) -> ReconcileSummary {
        debug_assert_eq!(self.entries.len(), slots.len());
        let mut summary = ReconcileSummary::default();
        let mut listed: HashMap<&ItemKind, Decimal> = HashMap::new();

        for (entry, slot) in self.entries.iter_mut().zip(slots) {
            let Some(item) = slot else {
                if !entry.price.is_zero() {
                    summary.cleared += 1;
                }
                *entry = PriceEntry::default();
                continue;
            };
            if entry.price.is_zero() {
                continue;
            }
            let anchored = entry.anchor.as_ref() == Some(&item.kind);
            match listed.get(&item.kind) {
                None => {
                    listed.insert(&item.kind, entry.price);
                }
                Some(&first) if first != entry.price && !anchored => {
                    entry.price = first;
                    summary.collapsed += 1;
                }
                Some(_) => {}
            }
        }

        for (entry, slot) in self.entries.iter_mut().zip(slots) {
            let Some(item) = slot else { continue };
            if entry.price.is_zero() {
                if let Some(&price) = listed.get(&item.kind) {
                    entry.price = price;
                    summary.inherited += 1;
                }
            }
            entry.anchor = (entry.price > Decimal::ZERO).then(|| item.kind.clone());
        }

        summary
    }
}
