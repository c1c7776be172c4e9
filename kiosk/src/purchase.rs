// Copyright (c) James Kassemi, SC, US. All rights reserved.

use core_types::{ActorId, KioskId, PricingPolicy};
use log::{error, info, warn};
use rust_decimal::Decimal;

use crate::{
    error::{KioskError, Result},
    item::{ItemKind, ItemStack},
    kind::ShopKind,
    mirror::SlotDrain,
    services::{BalanceService, BuyerInventory, TransferError},
    session::KioskSession,
};

#[derive(Clone, Debug, PartialEq)]
pub struct PurchaseRequest {
    /// Only the kind is matched; name and attributes are informational.
    pub item: ItemStack,
    pub quantity: u32,
}

impl PurchaseRequest {
    pub fn new(item: ItemStack, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PurchaseReceipt {
    pub kiosk: KioskId,
    pub buyer: ActorId,
    pub owner: ActorId,
    pub item: ItemKind,
    pub quantity: u32,
    /// Average when slots were charged individually.
    pub unit_price: Decimal,
    pub total_cost: Decimal,
    pub drained: Vec<SlotDrain>,
    /// Stacks handed to the buyer, each carrying the quantity granted.
    pub granted: Vec<ItemStack>,
    /// Whether the kiosk was saved after settlement.
    pub persisted: bool,
}

struct Quote {
    unit_price: Decimal,
    total_cost: Decimal,
}

/// Stacks to hand over for a drain plan. Drained slots holding identical
/// stacks share one grant.
fn grants_for(plan: &[SlotDrain], canonical: &[Option<ItemStack>]) -> Vec<ItemStack> {
    let mut grants: Vec<ItemStack> = Vec::with_capacity(plan.len());
    for drain in plan {
        let Some(stack) = canonical[drain.slot].as_ref() else {
            continue;
        };
        match grants.last_mut() {
            Some(last) if last.with_quantity(drain.taken) == stack.with_quantity(drain.taken) => {
                last.quantity += drain.taken;
            }
            _ => grants.push(stack.with_quantity(drain.taken)),
        }
    }
    grants
}

impl<K: ShopKind> KioskSession<K> {
    fn quote(
        &self,
        request: &PurchaseRequest,
        plan: &[SlotDrain],
        policy: PricingPolicy,
    ) -> Result<Quote> {
        let quantity = Decimal::from(request.quantity);
        let not_for_sale = || KioskError::NotForSale {
            item: request.item.kind.clone(),
        };
        let (unit_price, total_cost) = match policy {
            PricingPolicy::FirstListed => {
                let unit = self
                    .mirror
                    .first_similar(&request.item)
                    .map(|slot| self.ledger.price(slot))
                    .unwrap_or_default();
                if unit <= Decimal::ZERO {
                    return Err(not_for_sale());
                }
                (unit, unit * quantity)
            }
            PricingPolicy::PerSlot => {
                if plan.iter().any(|drain| drain.price <= Decimal::ZERO) {
                    return Err(not_for_sale());
                }
                let total: Decimal = plan
                    .iter()
                    .map(|drain| drain.price * Decimal::from(drain.taken))
                    .sum();
                (total / quantity, total)
            }
        };
        Ok(Quote {
            unit_price,
            total_cost,
        })
    }

    fn revoke_grants(&self, inventory: &dyn BuyerInventory, grants: &[ItemStack]) {
        let buyer = self.actor();
        for stack in grants {
            if let Err(err) = inventory.revoke(buyer, stack, stack.quantity) {
                error!(
                    "kiosk {} could not revoke {} {} from {buyer}: {err}",
                    self.kiosk(),
                    stack.quantity,
                    stack.kind
                );
            }
        }
    }

    /// Validates and settles a purchase by the session actor.
    ///
    /// Checks run in order (quantity, stock, space, price, funds) and abort
    /// without side effects. Space is checked against the stacks the buyer
    /// will actually receive. Settlement drains stock from the highest slot
    /// down, grants each drained stack, then moves funds; a failed grant or
    /// transfer restores the drained slots and prices and revokes whatever
    /// was already granted.
    pub fn purchase(
        &mut self,
        request: &PurchaseRequest,
        balances: &dyn BalanceService,
        inventory: &dyn BuyerInventory,
        policy: PricingPolicy,
    ) -> Result<PurchaseReceipt> {
        let buyer = self.actor();
        let quantity = request.quantity;
        if quantity == 0 {
            return Err(KioskError::InvalidQuantity { quantity });
        }

        let available = self.mirror.stock_of(&request.item);
        if available < quantity as u64 {
            return Err(KioskError::InsufficientStock {
                requested: quantity as u64,
                available,
            });
        }

        let plan = self.mirror.plan_drain(&request.item, quantity, &self.ledger);
        let grants = grants_for(&plan, self.mirror.canonical());
        let mut capacity = u64::MAX;
        for stack in &grants {
            capacity = capacity.min(inventory.available_capacity(buyer, stack)?);
        }
        if capacity < quantity as u64 {
            return Err(KioskError::InsufficientSpace {
                requested: quantity as u64,
                available: capacity,
            });
        }

        let quote = self.quote(request, &plan, policy)?;
        let balance = balances.balance(buyer)?;
        if balance < quote.total_cost {
            return Err(KioskError::InsufficientFunds {
                required: quote.total_cost,
                available: balance,
            });
        }

        let snapshot = self.snapshot();
        self.mirror.apply_drain(&plan, &mut self.ledger);

        for (done, stack) in grants.iter().enumerate() {
            if let Err(err) = inventory.grant(buyer, stack, stack.quantity) {
                self.restore(snapshot);
                error!(
                    "kiosk {} grant of {} {} to {buyer} failed: {err}",
                    self.kiosk(),
                    stack.quantity,
                    stack.kind
                );
                self.revoke_grants(inventory, &grants[..done]);
                return Err(err.into());
            }
        }

        if let Err(err) = balances.transfer(buyer, self.owner(), quote.total_cost) {
            self.restore(snapshot);
            self.revoke_grants(inventory, &grants);
            return Err(match err {
                TransferError::InsufficientFunds { balance, required } => {
                    warn!(
                        "kiosk {} transfer refused for {buyer}: balance {balance:.2} below {required:.2}",
                        self.kiosk()
                    );
                    KioskError::InsufficientFunds {
                        required,
                        available: balance,
                    }
                }
                TransferError::Service(err) => {
                    error!("kiosk {} transfer from {buyer} failed: {err}", self.kiosk());
                    KioskError::Service(err)
                }
            });
        }

        info!(
            "kiosk {} sold {quantity} {} to {buyer} for {:.2}",
            self.kiosk(),
            request.item.kind,
            quote.total_cost
        );
        Ok(PurchaseReceipt {
            kiosk: self.kiosk(),
            buyer,
            owner: self.owner(),
            item: request.item.kind.clone(),
            quantity,
            unit_price: quote.unit_price,
            total_cost: quote.total_cost,
            drained: plan,
            granted: grants,
            persisted: false,
        })
    }
}
