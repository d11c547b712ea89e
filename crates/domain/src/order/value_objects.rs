//! Value objects for the order domain.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// A line of an order: one product, how many, at what unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Human-readable product name.
    pub product_name: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit.
    #[serde(rename = "price")]
    pub unit_price: Money,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns quantity × unit price, or None on overflow.
    pub fn subtotal(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }

    /// Checks the field constraints of a single line.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.product_id.is_blank() {
            return Err(OrderError::MissingField { field: "productId" });
        }
        if self.product_name.trim().is_empty() {
            return Err(OrderError::MissingField {
                field: "productName",
            });
        }
        if self.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: self.product_id.clone(),
                quantity: self.quantity,
            });
        }
        if self.unit_price.is_negative() {
            return Err(OrderError::InvalidPrice {
                product_id: self.product_id.clone(),
                price: self.unit_price,
            });
        }
        Ok(())
    }
}

/// Payment confirmation details attached to `mark_paid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub payment_id: String,
    pub payment_method: String,
}

impl PaymentDetails {
    pub fn new(payment_id: impl Into<String>, payment_method: impl Into<String>) -> Self {
        Self {
            payment_id: payment_id.into(),
            payment_method: payment_method.into(),
        }
    }
}

/// Shipment details attached to `mark_shipped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentDetails {
    pub tracking_number: String,
    pub carrier: String,
}

impl ShipmentDetails {
    pub fn new(tracking_number: impl Into<String>, carrier: impl Into<String>) -> Self {
        Self {
            tracking_number: tracking_number.into(),
            carrier: carrier.into(),
        }
    }
}
