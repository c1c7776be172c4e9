// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::io;

use core_types::{ActorId, KioskId, ShopVariantId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{item::ItemKind, services::ServiceError};

pub type Result<T> = std::result::Result<T, KioskError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("kiosk {kiosk} not found")]
    NotFound { kiosk: KioskId },
    #[error("kiosk {kiosk} already exists")]
    AlreadyExists { kiosk: KioskId },
    #[error("kiosk {kiosk} record is corrupt: {reason}")]
    Corrupt { kiosk: KioskId, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Every outcome a caller of the engine can observe.
#[derive(Debug, Error)]
pub enum KioskError {
    #[error("kiosk {kiosk} is in use by {holder}")]
    AlreadyInUse { kiosk: KioskId, holder: ActorId },
    #[error("actor {actor} already holds a session on kiosk {kiosk}")]
    ActorBusy { actor: ActorId, kiosk: KioskId },
    #[error("no open session for actor {actor}")]
    SessionNotFound { actor: ActorId },
    #[error("actor {actor} is not the owner of kiosk {kiosk}")]
    NotAuthorized { actor: ActorId, kiosk: KioskId },
    #[error("kiosk {kiosk} does not exist")]
    KioskNotFound { kiosk: KioskId },
    #[error("quantity must be positive, got {quantity}")]
    InvalidQuantity { quantity: u32 },
    #[error("price must not be negative, got {price}")]
    InvalidPrice { price: Decimal },
    #[error("slot {slot} out of range for {len} slots")]
    InvalidSlot { slot: usize, len: usize },
    #[error("requested {requested} units but only {available} in stock")]
    InsufficientStock { requested: u64, available: u64 },
    #[error("requested {requested} units but buyer has room for {available}")]
    InsufficientSpace { requested: u64, available: u64 },
    #[error("purchase costs {required} but balance is {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },
    #[error("{item} is not priced for sale")]
    NotForSale { item: ItemKind },
    #[error("shop variant {variant} has not been unlocked")]
    VariantLocked { variant: ShopVariantId },
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl KioskError {
    /// Collaborator failures are defects; everything else is an expected outcome.
    pub fn is_defect(&self) -> bool {
        matches!(self, KioskError::Service(_) | KioskError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_collaborator_failures_are_defects() {
        let stock = KioskError::InsufficientStock {
            requested: 4,
            available: 1,
        };
        assert!(!stock.is_defect());
        let busy = KioskError::AlreadyInUse {
            kiosk: KioskId::from_name("k"),
            holder: ActorId::from_name("a"),
        };
        assert!(!busy.is_defect());
        let service = KioskError::from(ServiceError::new("bank", "timeout"));
        assert!(service.is_defect());
        assert_eq!(service.to_string(), "service error: bank failure: timeout");
    }
}
