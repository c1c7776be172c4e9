// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared-resource kiosk engine.
//!
//! A kiosk is a fixed row of item slots with a parallel price ledger. At most
//! one actor holds a [`KioskSession`] on a kiosk at a time; the session owns an
//! [`InventoryMirror`] (canonical slots plus their price-decorated display copy)
//! and the working [`PriceLedger`], which is reconciled and written back when
//! the session ends.
//!
//! The crate exposes:
//! - [`SessionRegistry`]: open/close/disconnect, owner edits, purchases,
//!   kiosk placement and removal, and the shutdown drain.
//! - [`services`]: collaborator contracts (balances, buyer inventory, counters,
//!   kiosk persistence) with JSON-file and in-memory implementations.
//! - [`ShopKind`]: capability describing a kiosk family; [`VendingMachine`] is
//!   the stock one.

pub mod config;
pub mod error;
pub mod item;
pub mod kind;
pub mod ledger;
pub mod memory;
pub mod mirror;
pub mod purchase;
pub mod registry;
pub mod services;
pub mod session;
pub mod storage;

pub use config::KioskConfig;
pub use error::{KioskError, Result, StoreError};
pub use item::{ItemKind, ItemStack};
pub use kind::{ShopKind, VendingMachine};
pub use ledger::{PriceLedger, ReconcileSummary};
pub use memory::{MemoryBank, MemoryInventory, MemoryKioskStore};
pub use mirror::{DisplaySlot, InventoryMirror, SlotDrain};
pub use purchase::{PurchaseReceipt, PurchaseRequest};
pub use registry::{ClosedSession, Collaborators, SessionInfo, SessionRegistry, ShutdownReport};
pub use services::{
    BalanceService, BuyerInventory, CounterStore, KioskStore, ServiceError, TransferError,
};
pub use session::{KioskSession, ViewMode};
pub use storage::{JsonCounterStore, JsonKioskStore, KioskRecord};
