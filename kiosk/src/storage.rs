// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use core_types::{ActorId, KioskId, ShopVariantId};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::StoreError,
    item::ItemStack,
    services::{CounterStore, KioskStore},
};

/// Persisted form of a kiosk: canonical slots plus the parallel price ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KioskRecord {
    pub id: KioskId,
    pub owner: ActorId,
    #[serde(default)]
    pub variant: ShopVariantId,
    pub slots: Vec<Option<ItemStack>>,
    #[serde(default)]
    pub prices: Vec<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl KioskRecord {
    pub fn empty(id: KioskId, owner: ActorId, variant: ShopVariantId, slot_count: usize) -> Self {
        Self {
            id,
            owner,
            variant,
            slots: vec![None; slot_count],
            prices: vec![Decimal::ZERO; slot_count],
            updated_at: Some(Utc::now()),
        }
    }

    /// An empty price list is accepted and read as all zero.
    pub fn validate(&self) -> Result<(), StoreError> {
        if !self.prices.is_empty() && self.prices.len() != self.slots.len() {
            return Err(self.corrupt(format!(
                "{} prices for {} slots",
                self.prices.len(),
                self.slots.len()
            )));
        }
        if let Some((slot, price)) = self
            .prices
            .iter()
            .enumerate()
            .find(|(_, p)| **p < Decimal::ZERO)
        {
            return Err(self.corrupt(format!("slot {slot} has invalid price {price}")));
        }
        Ok(())
    }

    pub fn price(&self, slot: usize) -> Decimal {
        self.prices.get(slot).copied().unwrap_or_default()
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::Corrupt {
            kiosk: self.id,
            reason,
        }
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let file = fs::File::create(&tmp)?;
    serde_json::to_writer_pretty(file, value)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// One pretty-printed `<kiosk-id>.json` file per kiosk under `root`.
pub struct JsonKioskStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl JsonKioskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, kiosk: KioskId) -> PathBuf {
        self.root.join(format!("{kiosk}.json"))
    }

    fn read(&self, kiosk: KioskId) -> Result<KioskRecord, StoreError> {
        let path = self.file_path(kiosk);
        if !path.exists() {
            return Err(StoreError::NotFound { kiosk });
        }
        let record: KioskRecord = read_json(&path)?;
        if record.id != kiosk {
            return Err(StoreError::Corrupt {
                kiosk,
                reason: format!("file holds kiosk {}", record.id),
            });
        }
        Ok(record)
    }
}

impl KioskStore for JsonKioskStore {
    fn load(&self, kiosk: KioskId) -> Result<KioskRecord, StoreError> {
        let _guard = self.lock.lock();
        self.read(kiosk)
    }

    fn save(&self, record: &KioskRecord) -> Result<(), StoreError> {
        record.validate()?;
        let _guard = self.lock.lock();
        write_atomic(&self.file_path(record.id), record)
    }

    fn create(&self, record: &KioskRecord) -> Result<(), StoreError> {
        record.validate()?;
        let _guard = self.lock.lock();
        let path = self.file_path(record.id);
        if path.exists() {
            return Err(StoreError::AlreadyExists { kiosk: record.id });
        }
        write_atomic(&path, record)
    }

    fn remove(&self, kiosk: KioskId) -> Result<KioskRecord, StoreError> {
        let _guard = self.lock.lock();
        let record = self.read(kiosk)?;
        fs::remove_file(self.file_path(kiosk))?;
        Ok(record)
    }

    fn list(&self) -> Result<Vec<KioskId>, StoreError> {
        let _guard = self.lock.lock();
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<KioskId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct CounterEntry {
    #[serde(default)]
    owned: u32,
    #[serde(default)]
    unlocked: BTreeSet<ShopVariantId>,
}

/// Per-actor counters kept in a single JSON document. An ephemeral store
/// never touches the filesystem.
pub struct JsonCounterStore {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<ActorId, CounterEntry>>,
}

impl JsonCounterStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            read_json(&path)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub fn ephemeral() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn read<T>(&self, actor: ActorId, f: impl FnOnce(&CounterEntry) -> T) -> T {
        let entries = self.entries.lock();
        match entries.get(&actor) {
            Some(entry) => f(entry),
            None => f(&CounterEntry::default()),
        }
    }

    /// Applies `f` and persists; on a failed write the entry is rolled back.
    fn update<T>(
        &self,
        actor: ActorId,
        f: impl FnOnce(&mut CounterEntry) -> T,
    ) -> Result<T, StoreError> {
        let mut entries = self.entries.lock();
        let before = entries.get(&actor).cloned();
        let out = f(entries.entry(actor).or_default());
        if let Some(path) = &self.path {
            if let Err(err) = write_atomic(path, &*entries) {
                match before {
                    Some(entry) => entries.insert(actor, entry),
                    None => entries.remove(&actor),
                };
                return Err(err);
            }
        }
        Ok(out)
    }
}

impl CounterStore for JsonCounterStore {
    fn increment_owned(&self, actor: ActorId) -> Result<u32, StoreError> {
        self.update(actor, |entry| {
            entry.owned = entry.owned.saturating_add(1);
            entry.owned
        })
    }

    fn decrement_owned(&self, actor: ActorId) -> Result<u32, StoreError> {
        self.update(actor, |entry| {
            entry.owned = entry.owned.saturating_sub(1);
            entry.owned
        })
    }

    fn owned_count(&self, actor: ActorId) -> Result<u32, StoreError> {
        Ok(self.read(actor, |entry| entry.owned))
    }

    fn unlocked_set(&self, actor: ActorId) -> Result<BTreeSet<ShopVariantId>, StoreError> {
        Ok(self.read(actor, |entry| entry.unlocked.clone()))
    }

    fn add_unlocked(&self, actor: ActorId, variant: ShopVariantId) -> Result<bool, StoreError> {
        self.update(actor, |entry| entry.unlocked.insert(variant))
    }

    fn set_unlocked_set(
        &self,
        actor: ActorId,
        unlocked: &BTreeSet<ShopVariantId>,
    ) -> Result<(), StoreError> {
        self.update(actor, |entry| entry.unlocked = unlocked.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn stocked_record() -> KioskRecord {
        let mut record = KioskRecord::empty(
            KioskId::from_name("stall"),
            ActorId::from_name("owner"),
            1,
            3,
        );
        record.slots[0] = Some(ItemStack::new("wood", 10));
        record.prices[0] = dec!(2);
        record
    }

    #[test]
    fn kiosk_store_round_trips_and_lists() {
        let dir = tempdir().unwrap();
        let store = JsonKioskStore::new(dir.path().join("kiosks"));
        assert!(store.list().unwrap().is_empty());

        let record = stocked_record();
        store.create(&record).unwrap();
        assert!(matches!(
            store.create(&record),
            Err(StoreError::AlreadyExists { .. })
        ));
        assert_eq!(store.load(record.id).unwrap(), record);
        assert_eq!(store.list().unwrap(), vec![record.id]);

        let removed = store.remove(record.id).unwrap();
        assert_eq!(removed.slots[0].as_ref().unwrap().quantity, 10);
        assert!(matches!(
            store.load(record.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn validation_rejects_mismatched_or_negative_prices() {
        let mut record = stocked_record();
        record.prices.pop();
        assert!(matches!(record.validate(), Err(StoreError::Corrupt { .. })));

        let mut record = stocked_record();
        record.prices[1] = dec!(-1);
        assert!(matches!(record.validate(), Err(StoreError::Corrupt { .. })));

        let mut record = stocked_record();
        record.prices.clear();
        assert!(record.validate().is_ok());
        assert_eq!(record.price(0), dec!(0));
    }

    #[test]
    fn counters_persist_and_floor_at_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counters.json");
        let actor = ActorId::from_name("owner");
        {
            let store = JsonCounterStore::open(&path).unwrap();
            assert_eq!(store.decrement_owned(actor).unwrap(), 0);
            assert_eq!(store.increment_owned(actor).unwrap(), 1);
            assert_eq!(store.increment_owned(actor).unwrap(), 2);
            store
                .set_unlocked_set(actor, &BTreeSet::from([1, 3]))
                .unwrap();
        }
        let reopened = JsonCounterStore::open(&path).unwrap();
        assert_eq!(reopened.owned_count(actor).unwrap(), 2);
        assert_eq!(reopened.unlocked_set(actor).unwrap(), BTreeSet::from([1, 3]));
        assert!(reopened
            .unlocked_set(ActorId::from_name("stranger"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn parallel_unlocks_all_reach_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counters.json");
        let actor = ActorId::from_name("owner");
        let store = JsonCounterStore::open(&path).unwrap();
        let barrier = std::sync::Barrier::new(6);

        std::thread::scope(|scope| {
            for variant in 0..6 {
                let (store, barrier) = (&store, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    assert!(store.add_unlocked(actor, variant).unwrap());
                });
            }
        });
        assert!(!store.add_unlocked(actor, 2).unwrap());

        let reopened = JsonCounterStore::open(&path).unwrap();
        assert_eq!(
            reopened.unlocked_set(actor).unwrap(),
            (0..6).collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn fractional_prices_round_trip_exactly() {
        let dir = tempdir().unwrap();
        let store = JsonKioskStore::new(dir.path());
        let mut record = stocked_record();
        record.prices[0] = dec!(0.1);
        store.create(&record).unwrap();

        let loaded = store.load(record.id).unwrap();
        assert_eq!(loaded.price(0) * dec!(3), dec!(0.3));
    }
}
