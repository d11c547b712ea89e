use common::ProductId;
use serde::{Deserialize, Serialize};

use super::InventoryError;

/// One ledger operation, as applied by a reservation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryOp {
    Reserve(u32),
    Release(u32),
    DecreaseQuantity(u32),
}

/// Outcome of a clamping operation.
///
/// `release` and `decrease_quantity` never fail; when asked to remove more
/// than is there they floor the value at zero. `applied` is what actually
/// moved, so callers can tell a clamped call apart from an exact one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub requested: u32,
    pub applied: u32,
}

impl Adjustment {
    fn exact(amount: u32) -> Self {
        Self {
            requested: amount,
            applied: amount,
        }
    }

    /// Returns true if less was applied than requested.
    pub fn is_clamped(&self) -> bool {
        self.applied < self.requested
    }
}

/// Stock level of a single product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    product_id: ProductId,
    quantity: u32,
    reserved: u32,
}

impl InventoryRecord {
    /// Creates a record with nothing reserved.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            reserved: 0,
        }
    }

    /// Creates a record with an existing reservation.
    pub fn with_reserved(
        product_id: impl Into<ProductId>,
        quantity: u32,
        reserved: u32,
    ) -> Result<Self, InventoryError> {
        let product_id = product_id.into();
        if reserved > quantity {
            return Err(InventoryError::ReservedExceedsQuantity {
                product_id,
                quantity,
                reserved,
            });
        }
        Ok(Self {
            product_id,
            quantity,
            reserved,
        })
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    /// Stock that can still be reserved.
    pub fn available(&self) -> u32 {
        self.quantity - self.reserved
    }

    pub fn can_reserve(&self, amount: u32) -> bool {
        amount <= self.available()
    }

    /// Sets aside `amount` units for an order.
    ///
    /// Fails without changing anything when `amount` exceeds [`available`].
    ///
    /// [`available`]: InventoryRecord::available
    pub fn reserve(&mut self, amount: u32) -> Result<(), InventoryError> {
        if !self.can_reserve(amount) {
            return Err(InventoryError::InsufficientStock {
                product_id: self.product_id.clone(),
                requested: amount,
                available: self.available(),
            });
        }
        self.reserved += amount;
        Ok(())
    }

    /// Returns reserved units to the available pool, flooring at zero.
    pub fn release(&mut self, amount: u32) -> Adjustment {
        let applied = amount.min(self.reserved);
        self.reserved -= applied;
        Adjustment {
            requested: amount,
            applied,
        }
    }

    /// Removes shipped units from stock and from the reservation.
    ///
    /// Both values floor at zero independently. Because `reserved` is capped
    /// by `quantity` before the subtraction, and is reduced by at least as
    /// much as `quantity` unless it hits zero first, the record stays valid.
    pub fn decrease_quantity(&mut self, amount: u32) -> Adjustment {
        let applied = amount.min(self.quantity);
        self.quantity -= applied;
        self.reserved = self.reserved.saturating_sub(amount).min(self.quantity);
        Adjustment {
            requested: amount,
            applied,
        }
    }

    /// Replaces the on-hand quantity, keeping the reservation.
    pub fn set_quantity(&mut self, quantity: u32) -> Result<(), InventoryError> {
        if quantity < self.reserved {
            return Err(InventoryError::QuantityBelowReserved {
                product_id: self.product_id.clone(),
                quantity,
                reserved: self.reserved,
            });
        }
        self.quantity = quantity;
        Ok(())
    }

    /// Applies one ledger operation.
    pub fn apply(&mut self, op: InventoryOp) -> Result<Adjustment, InventoryError> {
        match op {
            InventoryOp::Reserve(amount) => self.reserve(amount).map(|()| Adjustment::exact(amount)),
            InventoryOp::Release(amount) => Ok(self.release(amount)),
            InventoryOp::DecreaseQuantity(amount) => Ok(self.decrease_quantity(amount)),
        }
    }
}
