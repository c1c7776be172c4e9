// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Custom model number identifying a purchasable shop appearance.
pub type ShopVariantId = u32;

/// Stable identity of a connected (or previously connected) actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

/// Identity of the physical anchor a kiosk is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KioskId(Uuid);

macro_rules! uuid_identity {
    ($name:ident, $namespace:literal) => {
        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Deterministic id derived from a human readable name.
            pub fn from_name(name: &str) -> Self {
                let namespace = Uuid::new_v5(&Uuid::NAMESPACE_OID, $namespace.as_bytes());
                Self(Uuid::new_v5(&namespace, name.as_bytes()))
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value).map(Self)
            }
        }
    };
}

uuid_identity!(ActorId, "kiosk.actor.v1");
uuid_identity!(KioskId, "kiosk.anchor.v1");
