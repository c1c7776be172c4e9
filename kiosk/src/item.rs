// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_STACK: u32 = 64;

/// Type key for stackable items. Two stacks are "similar" when their kinds match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKind(String);

impl ItemKind {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stack of items occupying one slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: ItemKind,
    pub quantity: u32,
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

fn default_max_stack() -> u32 {
    DEFAULT_MAX_STACK
}

impl ItemStack {
    pub fn new(kind: impl Into<String>, quantity: u32) -> Self {
        Self {
            kind: ItemKind::new(kind),
            quantity,
            max_stack: DEFAULT_MAX_STACK,
            display_name: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_max_stack(mut self, max_stack: u32) -> Self {
        self.max_stack = max_stack.max(1);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Same stack with a different quantity.
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }

    /// Type equality; quantity, name and attributes are ignored.
    pub fn is_similar(&self, other: &ItemStack) -> bool {
        self.kind == other.kind
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.kind.as_str())
    }
}

/// Collapses zero-quantity stacks into empty slots.
pub fn normalize(slot: Option<ItemStack>) -> Option<ItemStack> {
    slot.filter(|stack| !stack.is_empty())
}
