//! Read-only view of the host's order at finalize time.

use crate::types::{Amount, CustomerId};
use serde::{Deserialize, Serialize};

/// Classification of a payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    Bank,
    /// Deferred payment charged to the customer's account. Increases
    /// outstanding risk instead of settling the sale.
    PayLater,
}

impl PaymentType {
    pub fn is_deferred(self) -> bool {
        matches!(self, Self::PayLater)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLine {
    pub payment_method: PaymentMethod,
    /// Signed; refunds are negative.
    pub amount: Amount,
}

impl PaymentLine {
    pub fn new(payment_method: PaymentMethod, amount: Amount) -> Self {
        Self {
            payment_method,
            amount,
        }
    }

    pub fn payment_type(&self) -> PaymentType {
        self.payment_method.payment_type
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub uid: String,
    #[serde(default)]
    pub customer: Option<CustomerId>,
    #[serde(default)]
    pub payment_lines: Vec<PaymentLine>,
}

impl Order {
    pub fn new(uid: impl Into<String>, customer: Option<CustomerId>) -> Self {
        Self {
            uid: uid.into(),
            customer,
            payment_lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, payment_method: PaymentMethod, amount: Amount) -> Self {
        self.payment_lines.push(PaymentLine::new(payment_method, amount));
        self
    }
}
