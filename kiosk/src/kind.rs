// Copyright (c) James Kassemi, SC, US. All rights reserved.

use rust_decimal::Decimal;

use crate::{item::ItemStack, mirror::DisplaySlot};

/// Capability describing one family of kiosks: how many slots it holds and
/// how its stock is decorated for customers.
pub trait ShopKind: Send + Sync + 'static {
    const LABEL: &'static str;
    const SLOT_COUNT: usize;

    fn price_label(price: Decimal) -> String {
        if price > Decimal::ZERO {
            format!("Price: ${price:.2}")
        } else {
            "Not for sale".to_string()
        }
    }

    fn decorate(item: &ItemStack, price: Decimal) -> DisplaySlot {
        DisplaySlot {
            item: item.clone(),
            price,
            price_label: Self::price_label(price),
        }
    }
}

/// Three rows of nine slots.
#[derive(Clone, Copy, Debug, Default)]
pub struct VendingMachine;

impl ShopKind for VendingMachine {
    const LABEL: &'static str = "Vending Machine";
    const SLOT_COUNT: usize = 27;
}
