//! Risk profile: how a customer's `risk_total` and `risk_exception` are
//! derived from receivable balances.
//!
//! This runs on the record-refresh side, never inside the guard. Hosts
//! that compute risk elsewhere can ignore it and write the two attributes
//! directly.
//!
//! RULES:
//!   - Only components with `include` set contribute to the total.
//!   - A component limit of zero means "not locked".
//!   - A credit limit of zero never raises the exception flag by itself.

use crate::{
    customer::CustomerRecord,
    types::Amount,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskComponentKind {
    /// Draft or pro-forma customer invoices.
    InvoiceDraft,
    /// Receivable on the partner account, not yet due.
    InvoiceOpen,
    /// Receivable on the partner account, past due.
    InvoiceUnpaid,
    /// Open residual on other receivable accounts.
    AccountAmount,
    /// Past-due residual on other receivable accounts.
    AccountAmountUnpaid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskComponent {
    pub kind: RiskComponentKind,
    pub amount: Amount,
    #[serde(default)]
    pub limit: Amount,
    #[serde(default)]
    pub include: bool,
}

impl RiskComponent {
    pub fn included(kind: RiskComponentKind, amount: Amount) -> Self {
        Self {
            kind,
            amount,
            limit: Amount::ZERO,
            include: true,
        }
    }

    pub fn with_limit(mut self, limit: Amount) -> Self {
        self.limit = limit;
        self
    }

    pub fn is_exceeded(&self) -> bool {
        !self.limit.is_zero() && self.amount > self.limit
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub components: Vec<RiskComponent>,
    pub credit_limit: Amount,
}

impl RiskProfile {
    pub fn new(credit_limit: Amount) -> Self {
        Self {
            components: Vec::new(),
            credit_limit,
        }
    }

    pub fn with_component(mut self, component: RiskComponent) -> Self {
        self.components.push(component);
        self
    }

    /// Sum of the included components, saturating at the `Amount` bounds.
    pub fn risk_total(&self) -> Amount {
        self.components
            .iter()
            .filter(|c| c.include)
            .fold(Amount::ZERO, |acc, c| acc.saturating_add(c.amount))
    }

    pub fn exceeded_components(&self) -> Vec<RiskComponentKind> {
        self.components
            .iter()
            .filter(|c| c.is_exceeded())
            .map(|c| c.kind)
            .collect()
    }

    pub fn risk_exception(&self) -> bool {
        if self.components.iter().any(RiskComponent::is_exceeded) {
            return true;
        }
        !self.credit_limit.is_zero() && self.risk_total() > self.credit_limit
    }

    /// Write total, flag and limit onto the record.
    pub fn apply_to(&self, record: &mut CustomerRecord) {
        record.risk_total = Some(self.risk_total());
        record.risk_exception = Some(self.risk_exception());
        record.credit_limit = Some(self.credit_limit);
    }
}
