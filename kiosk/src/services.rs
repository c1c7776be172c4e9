// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Contracts for the collaborators the engine calls out to. All calls are
//! synchronous and report failure through their return value.

use std::collections::BTreeSet;

use core_types::{ActorId, KioskId, ShopVariantId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{error::StoreError, item::ItemStack, storage::KioskRecord};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{service} failure: {message}")]
pub struct ServiceError {
    pub service: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("balance {balance} cannot cover {required}")]
    InsufficientFunds { balance: Decimal, required: Decimal },
    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub trait BalanceService: Send + Sync + 'static {
    fn balance(&self, actor: ActorId) -> Result<Decimal, ServiceError>;
    fn transfer(&self, from: ActorId, to: ActorId, amount: Decimal) -> Result<(), TransferError>;
}

pub trait BuyerInventory: Send + Sync + 'static {
    /// Units of `item`'s kind the actor can still carry.
    fn available_capacity(&self, actor: ActorId, item: &ItemStack) -> Result<u64, ServiceError>;
    fn grant(&self, actor: ActorId, item: &ItemStack, quantity: u32) -> Result<(), ServiceError>;
    /// Takes back units handed out by a grant whose settlement failed.
    fn revoke(&self, actor: ActorId, item: &ItemStack, quantity: u32) -> Result<(), ServiceError>;
}

/// Long-lived per-actor ownership and unlock counters.
pub trait CounterStore: Send + Sync + 'static {
    fn increment_owned(&self, actor: ActorId) -> Result<u32, StoreError>;
    /// Never drops below zero.
    fn decrement_owned(&self, actor: ActorId) -> Result<u32, StoreError>;
    fn owned_count(&self, actor: ActorId) -> Result<u32, StoreError>;
    fn unlocked_set(&self, actor: ActorId) -> Result<BTreeSet<ShopVariantId>, StoreError>;
    /// Adds one variant in a single step. Returns false if it was already
    /// unlocked.
    fn add_unlocked(&self, actor: ActorId, variant: ShopVariantId) -> Result<bool, StoreError>;
    fn set_unlocked_set(
        &self,
        actor: ActorId,
        unlocked: &BTreeSet<ShopVariantId>,
    ) -> Result<(), StoreError>;
}

pub trait KioskStore: Send + Sync + 'static {
    fn load(&self, kiosk: KioskId) -> Result<KioskRecord, StoreError>;
    fn save(&self, record: &KioskRecord) -> Result<(), StoreError>;
    /// Fails with `AlreadyExists` when the id is taken.
    fn create(&self, record: &KioskRecord) -> Result<(), StoreError>;
    fn remove(&self, kiosk: KioskId) -> Result<KioskRecord, StoreError>;
    fn list(&self) -> Result<Vec<KioskId>, StoreError>;
}
