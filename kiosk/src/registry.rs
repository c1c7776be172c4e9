// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use core_types::{
    status::{OverallStatus, ServiceStatusReporter, ServiceStatusSnapshot, StatusGauge},
    ActorId, KioskId, ShopVariantId,
};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::{
    config::KioskConfig,
    error::{KioskError, Result, StoreError},
    item::ItemStack,
    kind::{ShopKind, VendingMachine},
    ledger::ReconcileSummary,
    mirror::DisplaySlot,
    purchase::{PurchaseReceipt, PurchaseRequest},
    services::{BalanceService, BuyerInventory, CounterStore, KioskStore},
    session::{KioskSession, ViewMode},
    storage::{JsonCounterStore, JsonKioskStore, KioskRecord},
};

type SharedSession<K> = Arc<Mutex<KioskSession<K>>>;

/// External services a registry drives.
pub struct Collaborators {
    pub store: Arc<dyn KioskStore>,
    pub counters: Arc<dyn CounterStore>,
    pub balances: Arc<dyn BalanceService>,
    pub inventory: Arc<dyn BuyerInventory>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub actor: ActorId,
    pub kiosk: KioskId,
    pub owner: ActorId,
    pub view_mode: ViewMode,
    pub opened_at: DateTime<Utc>,
}

impl SessionInfo {
    fn of<K: ShopKind>(session: &KioskSession<K>) -> Self {
        Self {
            actor: session.actor(),
            kiosk: session.kiosk(),
            owner: session.owner(),
            view_mode: session.view_mode(),
            opened_at: session.opened_at(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClosedSession {
    pub kiosk: KioskId,
    pub reconciled: ReconcileSummary,
}

#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub closed: usize,
    /// Sessions dropped after their final save failed.
    pub failed: Vec<(ActorId, KioskError)>,
}

enum ActorEntry<K: ShopKind> {
    /// Claimed while the kiosk record loads; `ticket` tells a cancelled open
    /// apart from a newer one by the same actor.
    Opening { kiosk: KioskId, ticket: u64 },
    Open {
        kiosk: KioskId,
        session: SharedSession<K>,
    },
}

impl<K: ShopKind> ActorEntry<K> {
    fn kiosk(&self) -> KioskId {
        match self {
            ActorEntry::Opening { kiosk, .. } | ActorEntry::Open { kiosk, .. } => *kiosk,
        }
    }
}

struct SessionTables<K: ShopKind> {
    by_kiosk: HashMap<KioskId, ActorId>,
    by_actor: HashMap<ActorId, ActorEntry<K>>,
    next_ticket: u64,
}

impl<K: ShopKind> SessionTables<K> {
    fn new() -> Self {
        Self {
            by_kiosk: HashMap::new(),
            by_actor: HashMap::new(),
            next_ticket: 0,
        }
    }

    fn unclaim_kiosk(&mut self, kiosk: KioskId, actor: ActorId) {
        if self.by_kiosk.get(&kiosk) == Some(&actor) {
            self.by_kiosk.remove(&kiosk);
        }
    }

    fn release(&mut self, actor: ActorId, kiosk: KioskId) {
        self.by_actor.remove(&actor);
        self.unclaim_kiosk(kiosk, actor);
    }

    fn pending(&self) -> usize {
        self.by_actor
            .values()
            .filter(|entry| matches!(entry, ActorEntry::Opening { .. }))
            .count()
    }
}

/// Process-wide table of open kiosk sessions.
///
/// The table lock only guards the two lookup maps and is never held while a
/// session lock is acquired. Sessions are locked first, the table second.
pub struct SessionRegistry<K: ShopKind = VendingMachine> {
    config: KioskConfig,
    store: Arc<dyn KioskStore>,
    counters: Arc<dyn CounterStore>,
    balances: Arc<dyn BalanceService>,
    inventory: Arc<dyn BuyerInventory>,
    tables: Mutex<SessionTables<K>>,
}

fn load_error(kiosk: KioskId, err: StoreError) -> KioskError {
    match err {
        StoreError::NotFound { .. } => KioskError::KioskNotFound { kiosk },
        other => KioskError::Store(other),
    }
}

impl<K: ShopKind> SessionRegistry<K> {
    pub fn new(config: KioskConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            store: collaborators.store,
            counters: collaborators.counters,
            balances: collaborators.balances,
            inventory: collaborators.inventory,
            tables: Mutex::new(SessionTables::new()),
        }
    }

    /// Wires the JSON kiosk and counter stores under the configured state dir.
    pub fn bootstrap(
        config: KioskConfig,
        balances: Arc<dyn BalanceService>,
        inventory: Arc<dyn BuyerInventory>,
    ) -> Result<Self> {
        config.ensure_dirs()?;
        let store = Arc::new(JsonKioskStore::new(config.kiosks_dir()));
        let counters = Arc::new(JsonCounterStore::open(config.counters_path())?);
        info!(
            "kiosk registry using state dir {}",
            config.state_dir().display()
        );
        Ok(Self::new(
            config,
            Collaborators {
                store,
                counters,
                balances,
                inventory,
            },
        ))
    }

    pub fn config(&self) -> &KioskConfig {
        &self.config
    }

    /// Claims `kiosk` for `actor` and loads its session.
    pub fn open(&self, actor: ActorId, kiosk: KioskId) -> Result<SessionInfo> {
        let ticket = {
            let mut tables = self.tables.lock();
            if let Some(&holder) = tables.by_kiosk.get(&kiosk) {
                return Err(KioskError::AlreadyInUse { kiosk, holder });
            }
            if let Some(entry) = tables.by_actor.get(&actor) {
                return Err(KioskError::ActorBusy {
                    actor,
                    kiosk: entry.kiosk(),
                });
            }
            let ticket = tables.next_ticket;
            tables.next_ticket += 1;
            tables.by_kiosk.insert(kiosk, actor);
            tables
                .by_actor
                .insert(actor, ActorEntry::Opening { kiosk, ticket });
            ticket
        };

        let loaded = self
            .store
            .load(kiosk)
            .map_err(|err| load_error(kiosk, err))
            .and_then(|record| KioskSession::<K>::from_record(actor, record));

        let mut tables = self.tables.lock();
        let claimed = matches!(
            tables.by_actor.get(&actor),
            Some(ActorEntry::Opening { kiosk: k, ticket: t }) if *k == kiosk && *t == ticket
        );
        if !claimed {
            debug!("open of kiosk {kiosk} by {actor} cancelled by disconnect");
            return Err(KioskError::SessionNotFound { actor });
        }
        match loaded {
            Ok(session) => {
                let info = SessionInfo::of(&session);
                tables.by_actor.insert(
                    actor,
                    ActorEntry::Open {
                        kiosk,
                        session: Arc::new(Mutex::new(session)),
                    },
                );
                info!("{actor} opened kiosk {kiosk} as {:?}", info.view_mode);
                Ok(info)
            }
            Err(err) => {
                tables.release(actor, kiosk);
                if err.is_defect() {
                    error!("failed to load kiosk {kiosk} for {actor}: {err}");
                }
                Err(err)
            }
        }
    }

    /// Reconciles, saves and ends the actor's session. Closing when nothing is
    /// open is a no-op. A failed save leaves the session open.
    pub fn close(&self, actor: ActorId) -> Result<Option<ClosedSession>> {
        self.teardown(actor, false)
    }

    /// Same as [`Self::close`] but the session is dropped even when the final
    /// save fails; a pending open is cancelled.
    pub fn disconnect(&self, actor: ActorId) -> Result<Option<ClosedSession>> {
        self.teardown(actor, true)
    }

    fn teardown(&self, actor: ActorId, force: bool) -> Result<Option<ClosedSession>> {
        let shared = {
            let mut tables = self.tables.lock();
            match tables.by_actor.get(&actor) {
                None => return Ok(None),
                Some(ActorEntry::Opening { kiosk, .. }) => {
                    let kiosk = *kiosk;
                    tables.release(actor, kiosk);
                    debug!("cancelled pending open of kiosk {kiosk} by {actor}");
                    return Ok(None);
                }
                Some(ActorEntry::Open { session, .. }) => Arc::clone(session),
            }
        };

        let mut session = shared.lock();
        if session.is_closed() {
            return Ok(None);
        }
        let kiosk = session.kiosk();
        let reconciled = session.reconcile();
        let failure = match self.store.save(&session.to_record()) {
            Ok(()) => None,
            Err(err) => {
                error!("failed to persist kiosk {kiosk} for {actor}: {err}");
                if !force {
                    return Err(err.into());
                }
                Some(err)
            }
        };
        session.mark_closed();
        self.tables.lock().release(actor, kiosk);
        drop(session);

        match failure {
            None => {
                info!("{actor} closed kiosk {kiosk}");
                Ok(Some(ClosedSession { kiosk, reconciled }))
            }
            Some(err) => Err(err.into()),
        }
    }

    fn session_of(&self, actor: ActorId) -> Result<SharedSession<K>> {
        match self.tables.lock().by_actor.get(&actor) {
            Some(ActorEntry::Open { session, .. }) => Ok(Arc::clone(session)),
            _ => Err(KioskError::SessionNotFound { actor }),
        }
    }

    fn with_session<T>(
        &self,
        actor: ActorId,
        f: impl FnOnce(&mut KioskSession<K>) -> Result<T>,
    ) -> Result<T> {
        let shared = self.session_of(actor)?;
        let mut session = shared.lock();
        if session.is_closed() {
            return Err(KioskError::SessionNotFound { actor });
        }
        f(&mut session)
    }

    pub fn session_info(&self, actor: ActorId) -> Option<SessionInfo> {
        self.with_session(actor, |session| Ok(SessionInfo::of(session)))
            .ok()
    }

    pub fn set_price(&self, actor: ActorId, item: &ItemStack, price: Decimal) -> Result<usize> {
        self.with_session(actor, |session| session.set_price(item, price))
    }

    pub fn put_slot(
        &self,
        actor: ActorId,
        slot: usize,
        item: Option<ItemStack>,
    ) -> Result<Option<ItemStack>> {
        self.with_session(actor, |session| session.put_slot(slot, item))
    }

    pub fn swap_slots(&self, actor: ActorId, a: usize, b: usize) -> Result<()> {
        self.with_session(actor, |session| session.swap_slots(a, b))
    }

    pub fn display_view(&self, actor: ActorId) -> Result<Vec<Option<DisplaySlot>>> {
        self.with_session(actor, |session| Ok(session.display_view()))
    }

    pub fn owner_view(&self, actor: ActorId) -> Result<Vec<Option<ItemStack>>> {
        self.with_session(actor, |session| session.owner_view())
    }

    /// Buys from the kiosk the actor has open. The session lock is held from
    /// validation through settlement and the follow-up save.
    pub fn purchase(&self, actor: ActorId, request: &PurchaseRequest) -> Result<PurchaseReceipt> {
        let shared = self.session_of(actor)?;
        let mut session = shared.lock();
        if session.is_closed() {
            return Err(KioskError::SessionNotFound { actor });
        }
        let mut receipt = session.purchase(
            request,
            self.balances.as_ref(),
            self.inventory.as_ref(),
            self.config.pricing,
        )?;

        session.reconcile();
        match self.store.save(&session.to_record()) {
            Ok(()) => {
                receipt.persisted = true;
                if self.config.close_after_purchase {
                    session.mark_closed();
                    self.tables.lock().release(actor, receipt.kiosk);
                    debug!("{actor} session on kiosk {} ended by purchase", receipt.kiosk);
                }
            }
            Err(err) => {
                error!(
                    "kiosk {} sale to {actor} settled but not persisted: {err}",
                    receipt.kiosk
                );
            }
        }
        Ok(receipt)
    }

    /// Creates an empty kiosk at `kiosk` for `owner`, who must have unlocked
    /// `variant` unless it is the configured default.
    pub fn place_kiosk(
        &self,
        owner: ActorId,
        kiosk: KioskId,
        variant: ShopVariantId,
    ) -> Result<KioskRecord> {
        if variant != self.config.default_variant
            && !self.counters.unlocked_set(owner)?.contains(&variant)
        {
            return Err(KioskError::VariantLocked { variant });
        }
        let record = KioskRecord::empty(kiosk, owner, variant, K::SLOT_COUNT);
        self.store.create(&record)?;
        if let Err(err) = self.counters.increment_owned(owner) {
            error!("failed to count kiosk {kiosk} for {owner}: {err}");
            if let Err(undo) = self.store.remove(kiosk) {
                error!("failed to undo placement of kiosk {kiosk}: {undo}");
            }
            return Err(err.into());
        }
        info!("{owner} placed {} {kiosk}", K::LABEL);
        Ok(record)
    }

    /// Deletes a kiosk nobody has open and returns its final contents.
    pub fn remove_kiosk(&self, actor: ActorId, kiosk: KioskId) -> Result<KioskRecord> {
        {
            let mut tables = self.tables.lock();
            if let Some(&holder) = tables.by_kiosk.get(&kiosk) {
                return Err(KioskError::AlreadyInUse { kiosk, holder });
            }
            tables.by_kiosk.insert(kiosk, actor);
        }

        let removed = self
            .store
            .load(kiosk)
            .map_err(|err| load_error(kiosk, err))
            .and_then(|record| {
                if record.owner != actor {
                    return Err(KioskError::NotAuthorized { actor, kiosk });
                }
                self.store.remove(kiosk).map_err(|err| load_error(kiosk, err))
            });
        self.tables.lock().unclaim_kiosk(kiosk, actor);
        let record = removed?;

        if let Err(err) = self.counters.decrement_owned(record.owner) {
            error!("failed to uncount kiosk {kiosk} for {}: {err}", record.owner);
        }
        info!("{actor} removed kiosk {kiosk}");
        Ok(record)
    }

    /// Returns whether the variant was newly unlocked.
    pub fn unlock_variant(&self, actor: ActorId, variant: ShopVariantId) -> Result<bool> {
        Ok(self.counters.add_unlocked(actor, variant)?)
    }

    pub fn unlocked_variants(&self, actor: ActorId) -> Result<BTreeSet<ShopVariantId>> {
        Ok(self.counters.unlocked_set(actor)?)
    }

    pub fn owned_count(&self, actor: ActorId) -> Result<u32> {
        Ok(self.counters.owned_count(actor)?)
    }

    pub fn holder_of(&self, kiosk: KioskId) -> Option<ActorId> {
        self.tables.lock().by_kiosk.get(&kiosk).copied()
    }

    pub fn active_sessions(&self) -> usize {
        let tables = self.tables.lock();
        tables.by_actor.len() - tables.pending()
    }

    pub fn pending_opens(&self) -> usize {
        self.tables.lock().pending()
    }

    pub fn is_empty(&self) -> bool {
        let tables = self.tables.lock();
        tables.by_actor.is_empty() && tables.by_kiosk.is_empty()
    }

    /// Reconciles and saves every open session, then empties the registry.
    /// Sessions whose save fails are still dropped and reported.
    pub fn shutdown(&self) -> ShutdownReport {
        let actors: Vec<ActorId> = self.tables.lock().by_actor.keys().copied().collect();
        let mut report = ShutdownReport::default();
        for actor in actors {
            match self.teardown(actor, true) {
                Ok(Some(_)) => report.closed += 1,
                Ok(None) => {}
                Err(err) => report.failed.push((actor, err)),
            }
        }
        {
            let mut tables = self.tables.lock();
            tables.by_actor.clear();
            tables.by_kiosk.clear();
        }
        if report.failed.is_empty() {
            info!("kiosk registry drained {} sessions", report.closed);
        } else {
            warn!(
                "kiosk registry drained {} sessions, {} lost edits",
                report.closed,
                report.failed.len()
            );
        }
        report
    }
}

impl<K: ShopKind> ServiceStatusReporter for SessionRegistry<K> {
    fn service_name(&self) -> &'static str {
        "kiosk-registry"
    }

    fn status(&self) -> ServiceStatusSnapshot {
        let (active, pending) = {
            let tables = self.tables.lock();
            let pending = tables.pending();
            (tables.by_actor.len() - pending, pending)
        };
        ServiceStatusSnapshot {
            name: self.service_name().to_string(),
            overall: OverallStatus::Ok,
            warnings: Vec::new(),
            gauges: vec![
                StatusGauge::new("active_sessions", active as f64).with_unit("sessions"),
                StatusGauge::new("pending_opens", pending as f64).with_unit("sessions"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBank, MemoryInventory, MemoryKioskStore};
    use rust_decimal_macros::dec;
    use std::{
        sync::{Barrier, Mutex as StdMutex},
        thread,
    };

    struct Harness {
        registry: SessionRegistry,
        store: Arc<MemoryKioskStore>,
        owner: ActorId,
        kiosk: KioskId,
    }

    fn harness() -> Harness {
        let owner = ActorId::from_name("owner");
        let kiosk = KioskId::from_name("market-square");
        let store = Arc::new(MemoryKioskStore::new());
        let mut record = KioskRecord::empty(kiosk, owner, 0, VendingMachine::SLOT_COUNT);
        record.slots[0] = Some(ItemStack::new("wood", 10));
        record.prices[0] = dec!(2);
        store.insert(record);
        let registry = SessionRegistry::new(
            KioskConfig::default(),
            Collaborators {
                store: store.clone(),
                counters: Arc::new(JsonCounterStore::ephemeral()),
                balances: Arc::new(MemoryBank::new()),
                inventory: Arc::new(MemoryInventory::new()),
            },
        );
        Harness {
            registry,
            store,
            owner,
            kiosk,
        }
    }

    #[test]
    fn second_open_is_refused_until_close() {
        let h = harness();
        let buyer = ActorId::from_name("buyer");
        let info = h.registry.open(h.owner, h.kiosk).unwrap();
        assert_eq!(info.view_mode, ViewMode::Owner);
        assert_eq!(h.registry.holder_of(h.kiosk), Some(h.owner));

        let err = h.registry.open(buyer, h.kiosk).unwrap_err();
        assert!(matches!(err, KioskError::AlreadyInUse { holder, .. } if holder == h.owner));
        assert!(!err.is_defect());

        assert!(h.registry.close(h.owner).unwrap().is_some());
        assert!(h.registry.close(h.owner).unwrap().is_none());
        assert!(h.registry.is_empty());
        assert_eq!(
            h.registry.open(buyer, h.kiosk).unwrap().view_mode,
            ViewMode::Customer
        );
    }

    #[test]
    fn actor_cannot_hold_two_sessions() {
        let h = harness();
        let other = KioskId::from_name("harbor");
        h.store
            .insert(KioskRecord::empty(other, h.owner, 0, VendingMachine::SLOT_COUNT));
        h.registry.open(h.owner, h.kiosk).unwrap();
        assert!(matches!(
            h.registry.open(h.owner, other),
            Err(KioskError::ActorBusy { kiosk, .. }) if kiosk == h.kiosk
        ));
    }

    #[test]
    fn missing_kiosk_releases_the_claim() {
        let h = harness();
        let ghost = KioskId::from_name("ghost");
        assert!(matches!(
            h.registry.open(h.owner, ghost),
            Err(KioskError::KioskNotFound { .. })
        ));
        assert!(h.registry.is_empty());
    }

    #[test]
    fn operations_without_a_session_are_not_found() {
        let h = harness();
        let actor = ActorId::from_name("nobody");
        assert!(matches!(
            h.registry.set_price(actor, &ItemStack::new("wood", 1), dec!(1)),
            Err(KioskError::SessionNotFound { .. })
        ));
        assert!(matches!(
            h.registry
                .purchase(actor, &PurchaseRequest::new(ItemStack::new("wood", 1), 1)),
            Err(KioskError::SessionNotFound { .. })
        ));
        assert!(h.registry.session_info(actor).is_none());
    }

    #[test]
    fn failed_close_keeps_session_and_disconnect_drops_it() {
        let h = harness();
        h.registry.open(h.owner, h.kiosk).unwrap();
        h.registry.set_price(h.owner, &ItemStack::new("wood", 1), dec!(3)).unwrap();
        h.store.fail_saves(true);

        let err = h.registry.close(h.owner).unwrap_err();
        assert!(err.is_defect());
        assert_eq!(h.registry.active_sessions(), 1);

        h.store.fail_saves(false);
        h.registry.disconnect(h.owner).unwrap();
        assert!(h.registry.is_empty());
        assert_eq!(h.store.record(h.kiosk).unwrap().prices[0], dec!(3));
    }

    struct GatedStore {
        inner: MemoryKioskStore,
        entered: Barrier,
        resume: Barrier,
        gate: StdMutex<bool>,
    }

    impl KioskStore for GatedStore {
        fn load(&self, kiosk: KioskId) -> std::result::Result<KioskRecord, StoreError> {
            if *self.gate.lock().unwrap() {
                self.entered.wait();
                self.resume.wait();
            }
            self.inner.load(kiosk)
        }

        fn save(&self, record: &KioskRecord) -> std::result::Result<(), StoreError> {
            self.inner.save(record)
        }

        fn create(&self, record: &KioskRecord) -> std::result::Result<(), StoreError> {
            self.inner.create(record)
        }

        fn remove(&self, kiosk: KioskId) -> std::result::Result<KioskRecord, StoreError> {
            self.inner.remove(kiosk)
        }

        fn list(&self) -> std::result::Result<Vec<KioskId>, StoreError> {
            self.inner.list()
        }
    }

    #[test]
    fn disconnect_during_open_cancels_it() {
        let owner = ActorId::from_name("owner");
        let kiosk = KioskId::from_name("slow");
        let store = Arc::new(GatedStore {
            inner: MemoryKioskStore::new(),
            entered: Barrier::new(2),
            resume: Barrier::new(2),
            gate: StdMutex::new(true),
        });
        store
            .inner
            .insert(KioskRecord::empty(kiosk, owner, 0, VendingMachine::SLOT_COUNT));
        let registry: SessionRegistry = SessionRegistry::new(
            KioskConfig::default(),
            Collaborators {
                store: store.clone(),
                counters: Arc::new(JsonCounterStore::ephemeral()),
                balances: Arc::new(MemoryBank::new()),
                inventory: Arc::new(MemoryInventory::new()),
            },
        );

        thread::scope(|scope| {
            let opening = scope.spawn(|| registry.open(owner, kiosk));
            store.entered.wait();
            assert_eq!(registry.pending_opens(), 1);
            assert_eq!(registry.holder_of(kiosk), Some(owner));
            assert!(registry.disconnect(owner).unwrap().is_none());
            store.resume.wait();
            let result = opening.join().unwrap();
            assert!(matches!(result, Err(KioskError::SessionNotFound { .. })));
        });
        assert!(registry.is_empty());

        *store.gate.lock().unwrap() = false;
        assert!(registry.open(owner, kiosk).is_ok());
    }

    #[test]
    fn removal_requires_owner_and_an_idle_kiosk() {
        let h = harness();
        let stranger = ActorId::from_name("stranger");
        assert!(matches!(
            h.registry.remove_kiosk(stranger, h.kiosk),
            Err(KioskError::NotAuthorized { .. })
        ));
        assert!(h.registry.holder_of(h.kiosk).is_none());

        h.registry.open(stranger, h.kiosk).unwrap();
        assert!(matches!(
            h.registry.remove_kiosk(h.owner, h.kiosk),
            Err(KioskError::AlreadyInUse { .. })
        ));
        h.registry.close(stranger).unwrap();

        let removed = h.registry.remove_kiosk(h.owner, h.kiosk).unwrap();
        assert_eq!(removed.slots[0].as_ref().unwrap().quantity, 10);
        assert!(h.store.record(h.kiosk).is_none());
        assert_eq!(h.registry.owned_count(h.owner).unwrap(), 0);
    }

    #[test]
    fn status_reports_session_gauges() {
        let h = harness();
        h.registry.open(h.owner, h.kiosk).unwrap();
        let status = h.registry.status();
        assert_eq!(status.name, "kiosk-registry");
        assert_eq!(status.gauge("active_sessions"), Some(1.0));
        assert_eq!(status.gauge("pending_opens"), Some(0.0));
    }

    #[test]
    fn default_variant_needs_no_unlock() {
        let h = harness();
        let builder = ActorId::from_name("builder");
        assert!(h.registry.unlocked_variants(builder).unwrap().is_empty());

        let placed = h
            .registry
            .place_kiosk(builder, KioskId::from_name("corner"), 0)
            .unwrap();
        assert_eq!(placed.variant, 0);
        assert_eq!(h.registry.owned_count(builder).unwrap(), 1);
        assert!(matches!(
            h.registry.place_kiosk(builder, KioskId::from_name("alley"), 1),
            Err(KioskError::VariantLocked { variant: 1 })
        ));
    }

    #[test]
    fn concurrent_unlocks_are_all_kept() {
        let h = harness();
        let variants: Vec<ShopVariantId> = (1..=8).collect();
        let barrier = Barrier::new(variants.len());

        let added: Vec<bool> = thread::scope(|scope| {
            let handles: Vec<_> = variants
                .iter()
                .map(|&variant| {
                    let (registry, barrier, owner) = (&h.registry, &barrier, h.owner);
                    scope.spawn(move || {
                        barrier.wait();
                        registry.unlock_variant(owner, variant).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(added.iter().all(|&fresh| fresh));
        assert_eq!(
            h.registry.unlocked_variants(h.owner).unwrap(),
            variants.into_iter().collect::<BTreeSet<_>>()
        );
    }
}
