// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::{
    error::{KioskError, Result},
    item::{self, ItemStack},
    kind::ShopKind,
    ledger::PriceLedger,
};

/// Price-decorated rendering of one canonical slot.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplaySlot {
    pub item: ItemStack,
    pub price: Decimal,
    pub price_label: String,
}

impl DisplaySlot {
    pub fn for_sale(&self) -> bool {
        self.price > Decimal::ZERO
    }
}

/// Units taken from one slot by a purchase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotDrain {
    pub slot: usize,
    pub taken: u32,
    pub price: Decimal,
    pub emptied: bool,
}

/// Canonical slots paired with their customer-facing display copy.
///
/// Every mutation goes through this type so the display is refreshed before
/// anyone can observe it again.
pub struct InventoryMirror<K: ShopKind> {
    canonical: Vec<Option<ItemStack>>,
    display: Vec<Option<DisplaySlot>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ShopKind> InventoryMirror<K> {
    pub fn new(canonical: Vec<Option<ItemStack>>, ledger: &PriceLedger) -> Self {
        let canonical: Vec<_> = canonical.into_iter().map(item::normalize).collect();
        let mut mirror = Self {
            display: vec![None; canonical.len()],
            canonical,
            _kind: PhantomData,
        };
        mirror.refresh(ledger);
        mirror
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.iter().all(Option::is_none)
    }

    pub fn canonical(&self) -> &[Option<ItemStack>] {
        &self.canonical
    }

    pub fn display(&self) -> &[Option<DisplaySlot>] {
        &self.display
    }

    pub fn refresh(&mut self, ledger: &PriceLedger) {
        for slot in 0..self.canonical.len() {
            self.refresh_slot(slot, ledger);
        }
    }

    fn refresh_slot(&mut self, slot: usize, ledger: &PriceLedger) {
        self.display[slot] = self.canonical[slot]
            .as_ref()
            .map(|item| K::decorate(item, ledger.price(slot)));
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.canonical.len() {
            return Err(KioskError::InvalidSlot {
                slot,
                len: self.canonical.len(),
            });
        }
        Ok(())
    }

    /// Replaces a slot's contents, returning what was there.
    pub fn put(
        &mut self,
        slot: usize,
        item: Option<ItemStack>,
        ledger: &PriceLedger,
    ) -> Result<Option<ItemStack>> {
        self.check_slot(slot)?;
        let previous = std::mem::replace(&mut self.canonical[slot], item::normalize(item));
        self.refresh_slot(slot, ledger);
        Ok(previous)
    }

    /// Swaps slot contents. Prices stay with their positions.
    pub fn swap(&mut self, a: usize, b: usize, ledger: &PriceLedger) -> Result<()> {
        self.check_slot(a)?;
        self.check_slot(b)?;
        self.canonical.swap(a, b);
        self.refresh_slot(a, ledger);
        self.refresh_slot(b, ledger);
        Ok(())
    }

    pub fn similar_slots<'a>(&'a self, item: &'a ItemStack) -> impl Iterator<Item = usize> + 'a {
        self.canonical
            .iter()
            .enumerate()
            .filter(move |(_, slot)| slot.as_ref().is_some_and(|s| s.is_similar(item)))
            .map(|(idx, _)| idx)
    }

    pub fn stock_of(&self, item: &ItemStack) -> u64 {
        self.similar_slots(item)
            .filter_map(|idx| self.canonical[idx].as_ref())
            .map(|s| s.quantity as u64)
            .sum()
    }

    /// First matching slot scanning forward from slot 0.
    pub fn first_similar(&self, item: &ItemStack) -> Option<usize> {
        self.similar_slots(item).next()
    }

    /// Plans taking `quantity` units, draining the highest matching slot first.
    /// The plan falls short when stock is insufficient.
    pub fn plan_drain(&self, item: &ItemStack, quantity: u32, ledger: &PriceLedger) -> Vec<SlotDrain> {
        let mut remaining = quantity;
        let mut plan = Vec::new();
        for slot in (0..self.canonical.len()).rev() {
            if remaining == 0 {
                break;
            }
            let Some(stock) = self.canonical[slot].as_ref().filter(|s| s.is_similar(item)) else {
                continue;
            };
            let taken = stock.quantity.min(remaining);
            remaining -= taken;
            plan.push(SlotDrain {
                slot,
                taken,
                price: ledger.price(slot),
                emptied: taken == stock.quantity,
            });
        }
        plan
    }

    /// Applies a plan from [`Self::plan_drain`]; emptied slots lose their price.
    pub fn apply_drain(&mut self, plan: &[SlotDrain], ledger: &mut PriceLedger) {
        for drain in plan {
            let slot = &mut self.canonical[drain.slot];
            if let Some(stock) = slot.as_mut() {
                stock.quantity = stock.quantity.saturating_sub(drain.taken);
            }
            *slot = item::normalize(slot.take());
            if slot.is_none() {
                ledger.clear(drain.slot);
            }
            self.refresh_slot(drain.slot, ledger);
        }
    }

    /// Rolls the canonical slots back to an earlier snapshot.
    pub fn restore(&mut self, canonical: Vec<Option<ItemStack>>, ledger: &PriceLedger) {
        self.canonical = canonical;
        self.refresh(ledger);
    }
}
