// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! In-process collaborators for embedding the engine without external
//! services, and for tests. Each can be told to fail its mutating calls.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use core_types::{ActorId, KioskId};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::{
    error::StoreError,
    item::{ItemKind, ItemStack},
    services::{BalanceService, BuyerInventory, KioskStore, ServiceError, TransferError},
    storage::KioskRecord,
};

pub const PLAYER_INVENTORY_SLOTS: usize = 36;

#[derive(Default)]
pub struct MemoryBank {
    balances: Mutex<HashMap<ActorId, Decimal>>,
    fail_transfers: AtomicBool,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, actor: ActorId, amount: Decimal) {
        *self.balances.lock().entry(actor).or_default() += amount;
    }

    pub fn balance_of(&self, actor: ActorId) -> Decimal {
        self.balances.lock().get(&actor).copied().unwrap_or_default()
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }
}

impl BalanceService for MemoryBank {
    fn balance(&self, actor: ActorId) -> Result<Decimal, ServiceError> {
        Ok(self.balance_of(actor))
    }

    fn transfer(&self, from: ActorId, to: ActorId, amount: Decimal) -> Result<(), TransferError> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(ServiceError::new("bank", "transfers unavailable").into());
        }
        if amount < Decimal::ZERO {
            return Err(ServiceError::new("bank", format!("invalid amount {amount}")).into());
        }
        let mut balances = self.balances.lock();
        let balance = balances.get(&from).copied().unwrap_or_default();
        if balance < amount {
            return Err(TransferError::InsufficientFunds {
                balance,
                required: amount,
            });
        }
        *balances.entry(from).or_default() -= amount;
        *balances.entry(to).or_default() += amount;
        Ok(())
    }
}

/// Fixed-size player inventories.
pub struct MemoryInventory {
    slots: usize,
    inventories: Mutex<HashMap<ActorId, Vec<Option<ItemStack>>>>,
    fail_grants: AtomicBool,
}

impl Default for MemoryInventory {
    fn default() -> Self {
        Self::with_slots(PLAYER_INVENTORY_SLOTS)
    }
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(slots: usize) -> Self {
        Self {
            slots,
            inventories: Mutex::new(HashMap::new()),
            fail_grants: AtomicBool::new(false),
        }
    }

    pub fn fail_grants(&self, fail: bool) {
        self.fail_grants.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self, actor: ActorId, kind: &ItemKind) -> u64 {
        self.inventories
            .lock()
            .get(&actor)
            .map(|slots| {
                slots
                    .iter()
                    .flatten()
                    .filter(|stack| &stack.kind == kind)
                    .map(|stack| stack.quantity as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    pub fn contents(&self, actor: ActorId) -> Vec<Option<ItemStack>> {
        self.inventories
            .lock()
            .get(&actor)
            .cloned()
            .unwrap_or_else(|| vec![None; self.slots])
    }

    /// Overwrites one slot of the actor's inventory.
    pub fn set_slot(&self, actor: ActorId, slot: usize, item: Option<ItemStack>) {
        let mut inventories = self.inventories.lock();
        let slots = inventories
            .entry(actor)
            .or_insert_with(|| vec![None; self.slots]);
        if let Some(target) = slots.get_mut(slot) {
            *target = item;
        }
    }

    /// Stacks merge only when nothing but the quantity differs.
    fn stacks_with(stack: &ItemStack, item: &ItemStack) -> bool {
        stack.with_quantity(0) == item.with_quantity(0)
    }

    fn held(slots: &[Option<ItemStack>], item: &ItemStack) -> u64 {
        slots
            .iter()
            .flatten()
            .filter(|stack| Self::stacks_with(stack, item))
            .map(|stack| stack.quantity as u64)
            .sum()
    }

    fn capacity_in(slots: &[Option<ItemStack>], item: &ItemStack) -> u64 {
        slots
            .iter()
            .map(|slot| match slot {
                None => item.max_stack as u64,
                Some(stack) if Self::stacks_with(stack, item) => {
                    stack.max_stack.saturating_sub(stack.quantity) as u64
                }
                Some(_) => 0,
            })
            .sum()
    }
}

impl BuyerInventory for MemoryInventory {
    fn available_capacity(&self, actor: ActorId, item: &ItemStack) -> Result<u64, ServiceError> {
        let inventories = self.inventories.lock();
        Ok(match inventories.get(&actor) {
            Some(slots) => Self::capacity_in(slots, item),
            None => self.slots as u64 * item.max_stack as u64,
        })
    }

    fn grant(&self, actor: ActorId, item: &ItemStack, quantity: u32) -> Result<(), ServiceError> {
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(ServiceError::new("inventory", "grants unavailable"));
        }
        let mut inventories = self.inventories.lock();
        let slots = inventories
            .entry(actor)
            .or_insert_with(|| vec![None; self.slots]);
        if Self::capacity_in(slots, item) < quantity as u64 {
            return Err(ServiceError::new(
                "inventory",
                format!("no room for {quantity} {}", item.kind),
            ));
        }
        let mut remaining = quantity;
        for stack in slots.iter_mut().flatten() {
            if remaining == 0 {
                break;
            }
            if Self::stacks_with(stack, item) {
                let added = stack.max_stack.saturating_sub(stack.quantity).min(remaining);
                stack.quantity += added;
                remaining -= added;
            }
        }
        for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
            if remaining == 0 {
                break;
            }
            let added = item.max_stack.min(remaining);
            *slot = Some(item.with_quantity(added));
            remaining -= added;
        }
        Ok(())
    }

    fn revoke(&self, actor: ActorId, item: &ItemStack, quantity: u32) -> Result<(), ServiceError> {
        let mut inventories = self.inventories.lock();
        let Some(slots) = inventories.get_mut(&actor) else {
            return Err(ServiceError::new("inventory", "nothing to revoke"));
        };
        let held = Self::held(slots, item);
        if held < quantity as u64 {
            return Err(ServiceError::new(
                "inventory",
                format!("holds {held} {}, cannot revoke {quantity}", item.kind),
            ));
        }
        let mut remaining = quantity;
        for slot in slots.iter_mut().rev() {
            if remaining == 0 {
                break;
            }
            let Some(stack) = slot
                .as_mut()
                .filter(|stack| Self::stacks_with(stack, item))
            else {
                continue;
            };
            let taken = stack.quantity.min(remaining);
            stack.quantity -= taken;
            remaining -= taken;
            if stack.quantity == 0 {
                *slot = None;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKioskStore {
    records: Mutex<HashMap<KioskId, KioskRecord>>,
    fail_saves: AtomicBool,
}

impl MemoryKioskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: KioskRecord) {
        self.records.lock().insert(record.id, record);
    }

    pub fn record(&self, kiosk: KioskId) -> Option<KioskRecord> {
        self.records.lock().get(&kiosk).cloned()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl KioskStore for MemoryKioskStore {
    fn load(&self, kiosk: KioskId) -> Result<KioskRecord, StoreError> {
        self.record(kiosk).ok_or(StoreError::NotFound { kiosk })
    }

    fn save(&self, record: &KioskRecord) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("saves unavailable")));
        }
        record.validate()?;
        self.insert(record.clone());
        Ok(())
    }

    fn create(&self, record: &KioskRecord) -> Result<(), StoreError> {
        record.validate()?;
        let mut records = self.records.lock();
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists { kiosk: record.id });
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn remove(&self, kiosk: KioskId) -> Result<KioskRecord, StoreError> {
        self.records
            .lock()
            .remove(&kiosk)
            .ok_or(StoreError::NotFound { kiosk })
    }

    fn list(&self) -> Result<Vec<KioskId>, StoreError> {
        let mut ids: Vec<_> = self.records.lock().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn bank_moves_funds_and_refuses_overdrafts() {
        let bank = MemoryBank::new();
        let (buyer, seller) = (ActorId::from_name("buyer"), ActorId::from_name("seller"));
        bank.deposit(buyer, dec!(10));

        bank.transfer(buyer, seller, dec!(4)).unwrap();
        assert_eq!(bank.balance_of(buyer), dec!(6));
        assert_eq!(bank.balance_of(seller), dec!(4));

        let err = bank.transfer(buyer, seller, dec!(7)).unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { .. }));

        bank.fail_transfers(true);
        assert!(matches!(
            bank.transfer(buyer, seller, dec!(1)),
            Err(TransferError::Service(_))
        ));
        assert_eq!(bank.balance_of(buyer), dec!(6));
    }

    #[test]
    fn inventory_capacity_counts_free_slots_and_headroom() {
        let inv = MemoryInventory::with_slots(3);
        let actor = ActorId::from_name("buyer");
        let wood = ItemStack::new("wood", 1);
        assert_eq!(inv.available_capacity(actor, &wood).unwrap(), 192);

        inv.set_slot(actor, 0, Some(ItemStack::new("wood", 60)));
        inv.set_slot(actor, 1, Some(ItemStack::new("stone", 1)));
        assert_eq!(inv.available_capacity(actor, &wood).unwrap(), 4 + 64);

        inv.grant(actor, &wood, 10).unwrap();
        assert_eq!(inv.count(actor, &wood.kind), 70);
        assert_eq!(inv.contents(actor)[2].as_ref().unwrap().quantity, 6);

        assert!(inv.grant(actor, &wood, 100).is_err());
        inv.revoke(actor, &wood, 10).unwrap();
        assert_eq!(inv.count(actor, &wood.kind), 60);
        assert!(inv.contents(actor)[2].is_none());
        assert!(inv.revoke(actor, &wood, 61).is_err());
    }

    #[test]
    fn differently_named_stacks_do_not_merge() {
        let inv = MemoryInventory::with_slots(2);
        let actor = ActorId::from_name("buyer");
        let plain = ItemStack::new("wood", 1);
        let named = plain.clone().with_display_name("Heirloom");

        inv.grant(actor, &plain, 5).unwrap();
        inv.grant(actor, &named, 2).unwrap();
        let contents = inv.contents(actor);
        assert_eq!(contents[0].as_ref().unwrap().quantity, 5);
        assert_eq!(contents[1], Some(named.with_quantity(2)));
        assert_eq!(inv.count(actor, &plain.kind), 7);

        assert_eq!(inv.available_capacity(actor, &named).unwrap(), 62);
        assert!(inv.revoke(actor, &named, 3).is_err());
    }
}
