// Copyright (c) James Kassemi, SC, US. All rights reserved.

use chrono::{DateTime, Utc};
use core_types::{ActorId, KioskId, ShopVariantId};
use log::debug;
use rust_decimal::Decimal;

use crate::{
    error::{KioskError, Result},
    item::ItemStack,
    kind::{ShopKind, VendingMachine},
    ledger::{PriceLedger, ReconcileSummary},
    mirror::{DisplaySlot, InventoryMirror},
    storage::KioskRecord,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    Owner,
    Customer,
}

/// One actor's exclusive binding to a kiosk's slots and prices.
pub struct KioskSession<K: ShopKind = VendingMachine> {
    actor: ActorId,
    kiosk: KioskId,
    owner: ActorId,
    variant: ShopVariantId,
    pub(crate) mirror: InventoryMirror<K>,
    pub(crate) ledger: PriceLedger,
    opened_at: DateTime<Utc>,
    closed: bool,
}

impl<K: ShopKind> KioskSession<K> {
    pub fn from_record(actor: ActorId, record: KioskRecord) -> Result<Self> {
        record.validate()?;
        let ledger = if record.prices.is_empty() {
            PriceLedger::zeroed(record.slots.len())
        } else {
            PriceLedger::load(&record.prices, &record.slots)
        };
        let mirror = InventoryMirror::new(record.slots, &ledger);
        Ok(Self {
            actor,
            kiosk: record.id,
            owner: record.owner,
            variant: record.variant,
            mirror,
            ledger,
            opened_at: Utc::now(),
            closed: false,
        })
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn kiosk(&self) -> KioskId {
        self.kiosk
    }

    pub fn owner(&self) -> ActorId {
        self.owner
    }

    pub fn variant(&self) -> ShopVariantId {
        self.variant
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn is_owner(&self) -> bool {
        self.actor == self.owner
    }

    pub fn view_mode(&self) -> ViewMode {
        if self.is_owner() {
            ViewMode::Owner
        } else {
            ViewMode::Customer
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub fn ledger(&self) -> &PriceLedger {
        &self.ledger
    }

    pub fn canonical(&self) -> &[Option<ItemStack>] {
        self.mirror.canonical()
    }

    fn ensure_owner(&self) -> Result<()> {
        if !self.is_owner() {
            return Err(KioskError::NotAuthorized {
                actor: self.actor,
                kiosk: self.kiosk,
            });
        }
        Ok(())
    }

    /// Prices every slot holding `item`'s kind. Returns how many slots changed;
    /// zero matches is not an error.
    pub fn set_price(&mut self, item: &ItemStack, price: Decimal) -> Result<usize> {
        self.ensure_owner()?;
        if price < Decimal::ZERO {
            return Err(KioskError::InvalidPrice { price });
        }
        let slots: Vec<usize> = self.mirror.similar_slots(item).collect();
        for &slot in &slots {
            self.ledger.set(slot, price, &item.kind);
        }
        self.mirror.refresh(&self.ledger);
        debug!(
            "kiosk {} priced {} at {price:.2} across {} slots",
            self.kiosk,
            item.kind,
            slots.len()
        );
        Ok(slots.len())
    }

    pub fn put_slot(&mut self, slot: usize, item: Option<ItemStack>) -> Result<Option<ItemStack>> {
        self.ensure_owner()?;
        self.mirror.put(slot, item, &self.ledger)
    }

    pub fn swap_slots(&mut self, a: usize, b: usize) -> Result<()> {
        self.ensure_owner()?;
        self.mirror.swap(a, b, &self.ledger)
    }

    pub fn display_view(&self) -> Vec<Option<DisplaySlot>> {
        self.mirror.display().to_vec()
    }

    pub fn owner_view(&self) -> Result<Vec<Option<ItemStack>>> {
        self.ensure_owner()?;
        Ok(self.mirror.canonical().to_vec())
    }

    pub fn reconcile(&mut self) -> ReconcileSummary {
        let summary = self.ledger.reconcile(self.mirror.canonical());
        self.mirror.refresh(&self.ledger);
        summary
    }

    pub fn to_record(&self) -> KioskRecord {
        KioskRecord {
            id: self.kiosk,
            owner: self.owner,
            variant: self.variant,
            slots: self.mirror.canonical().to_vec(),
            prices: self.ledger.prices(),
            updated_at: Some(Utc::now()),
        }
    }

    pub(crate) fn snapshot(&self) -> (Vec<Option<ItemStack>>, PriceLedger) {
        (self.mirror.canonical().to_vec(), self.ledger.clone())
    }

    pub(crate) fn restore(&mut self, snapshot: (Vec<Option<ItemStack>>, PriceLedger)) {
        let (canonical, ledger) = snapshot;
        self.ledger = ledger;
        self.mirror.restore(canonical, &self.ledger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record() -> KioskRecord {
        let mut record = KioskRecord::empty(
            KioskId::from_name("stall"),
            ActorId::from_name("owner"),
            0,
            4,
        );
        record.slots[0] = Some(ItemStack::new("wood", 10));
        record.slots[2] = Some(ItemStack::new("wood", 3));
        record.slots[3] = Some(ItemStack::new("stone", 1));
        record
    }

    fn owner_session() -> KioskSession {
        KioskSession::from_record(ActorId::from_name("owner"), record()).unwrap()
    }

    #[test]
    fn set_price_covers_every_similar_slot() {
        let mut session = owner_session();
        assert_eq!(session.view_mode(), ViewMode::Owner);
        let updated = session
            .set_price(&ItemStack::new("wood", 1), dec!(2.5))
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(
            session.ledger().prices(),
            vec![dec!(2.5), dec!(0), dec!(2.5), dec!(0)]
        );
        assert_eq!(
            session.display_view()[2].as_ref().unwrap().price_label,
            "Price: $2.50"
        );
        assert_eq!(session.set_price(&ItemStack::new("gold", 1), dec!(9)).unwrap(), 0);
    }

    #[test]
    fn set_price_rejects_bad_prices_and_customers() {
        let mut session = owner_session();
        assert!(matches!(
            session.set_price(&ItemStack::new("wood", 1), dec!(-0.01)),
            Err(KioskError::InvalidPrice { .. })
        ));
        assert!(session.ledger().prices().iter().all(|p| p.is_zero()));

        let mut customer =
            KioskSession::<VendingMachine>::from_record(ActorId::from_name("buyer"), record())
                .unwrap();
        assert_eq!(customer.view_mode(), ViewMode::Customer);
        assert!(matches!(
            customer.set_price(&ItemStack::new("wood", 1), dec!(1)),
            Err(KioskError::NotAuthorized { .. })
        ));
        assert!(matches!(
            customer.put_slot(1, None),
            Err(KioskError::NotAuthorized { .. })
        ));
        assert!(customer.owner_view().is_err());
        assert_eq!(customer.display_view().len(), 4);
    }

    #[test]
    fn owner_edits_reconcile_into_the_record() {
        let mut session = owner_session();
        session.set_price(&ItemStack::new("wood", 1), dec!(2)).unwrap();
        session
            .put_slot(1, Some(ItemStack::new("wood", 5)))
            .unwrap();
        let removed = session.put_slot(2, None).unwrap();
        assert_eq!(removed.unwrap().quantity, 3);
        session.swap_slots(1, 3).unwrap();
        assert!(matches!(
            session.swap_slots(1, 9),
            Err(KioskError::InvalidSlot { slot: 9, len: 4 })
        ));

        let summary = session.reconcile();
        assert_eq!(summary.cleared, 1);
        assert_eq!(summary.inherited, 1);
        let record = session.to_record();
        assert!(record.slots[2].is_none());
        assert_eq!(record.slots[3].as_ref().unwrap().quantity, 5);
        assert_eq!(record.prices, vec![dec!(2), dec!(0), dec!(0), dec!(2)]);
        assert!(session.reconcile().is_noop());
    }

    #[test]
    fn corrupt_records_are_refused() {
        let mut bad = record();
        bad.prices = vec![dec!(1)];
        assert!(matches!(
            KioskSession::<VendingMachine>::from_record(ActorId::from_name("owner"), bad),
            Err(KioskError::Store(_))
        ));

        let mut legacy = record();
        legacy.prices.clear();
        let session =
            KioskSession::<VendingMachine>::from_record(ActorId::from_name("owner"), legacy)
                .unwrap();
        assert_eq!(session.ledger().len(), 4);
    }
}
