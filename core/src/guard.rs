//! Risk guard. Decides, at finalize time, whether a sale may go through.
//!
//! DECISION (in order):
//!   1. Resolve the order's customer, then its commercial account. The
//!      commercial account's risk attributes are authoritative so that all
//!      contacts of one company share a single pool.
//!   2. Sum the strictly positive pay-later lines of the order.
//!   3. Block if the pool carries the risk-exception flag.
//!   4. Block if risk_total + pending > credit_limit (strict).
//!   5. Otherwise allow.
//!
//! RULES:
//!   - The flag is read before the amounts. A flagged account blocks even
//!     when its figures were not loaded.
//!   - Sums are checked. A total too large to represent is over any limit.
//!   - The guard never returns an error. Every failure is a Block with its
//!     own message, so the finalize workflow has exactly two outcomes.
//!   - The guard never writes. It is safe to evaluate the same order twice.

use crate::{
    config::{GuardConfig, MissingRiskDataPolicy},
    customer::CustomerRecord,
    order::{Order, PaymentLine},
    store::CustomerStore,
    types::{Amount, CustomerId},
};
use serde::Serialize;

/// Deferred amount the order would add to the customer's risk.
///
/// Refund lines (non-positive pay-later amounts) are excluded, not
/// subtracted. Saturates at `Amount::MAX`.
pub fn pending_credit_amount(lines: &[PaymentLine]) -> Amount {
    checked_pending(lines).unwrap_or(Amount::MAX)
}

/// `None` when the sum does not fit in an `Amount`.
fn checked_pending(lines: &[PaymentLine]) -> Option<Amount> {
    lines
        .iter()
        .filter(|line| line.payment_type().is_deferred())
        .map(|line| line.amount)
        .filter(|amount| *amount > Amount::ZERO)
        .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
}

/// Why a sale was blocked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    /// The commercial account is flagged; amounts are irrelevant.
    RiskException { commercial_id: CustomerId },
    CreditLimitExceeded {
        commercial_id: CustomerId,
        risk_total: Amount,
        pending: Amount,
        credit_limit: Amount,
    },
    /// The loader did not deliver a risk attribute.
    RiskDataUnavailable {
        customer_id: CustomerId,
        field: &'static str,
    },
    CustomerNotFound { customer_id: CustomerId },
    CommercialAccountNotFound {
        customer_id: CustomerId,
        commercial_id: CustomerId,
    },
    /// Deferred payment without a customer to charge.
    CustomerRequired,
    StoreUnavailable { reason: String },
}

impl BlockReason {
    /// True for the two outcomes shown with the configured risk-exceeded
    /// message. Only `CreditLimitExceeded` can be cleared by changing the
    /// payment mix; a flagged account blocks every sale.
    pub fn is_risk_exceeded(&self) -> bool {
        matches!(
            self,
            Self::RiskException { .. } | Self::CreditLimitExceeded { .. }
        )
    }
}

/// A block as shown to the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub reason: BlockReason,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RiskDecision {
    Allow,
    Block(Rejection),
}

impl RiskDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Allow => None,
            Self::Block(rejection) => Some(rejection),
        }
    }
}

/// The decision plus the figures it was made on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub order_uid: String,
    pub customer_id: Option<CustomerId>,
    pub commercial_id: Option<CustomerId>,
    pub pending_credit_amount: Amount,
    pub risk_total: Option<Amount>,
    pub credit_limit: Option<Amount>,
    pub decision: RiskDecision,
}

/// Amount figures of an unflagged commercial account.
struct RiskPool {
    risk_total: Amount,
    credit_limit: Amount,
}

pub struct RiskGuard<S> {
    store: S,
    config: GuardConfig,
}

impl<S: CustomerStore> RiskGuard<S> {
    pub fn new(store: S, config: GuardConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn evaluate(&self, order: &Order) -> RiskDecision {
        self.assess(order).decision
    }

    pub fn assess(&self, order: &Order) -> RiskAssessment {
        let pending = pending_credit_amount(&order.payment_lines);
        let mut assessment = RiskAssessment {
            order_uid: order.uid.clone(),
            customer_id: order.customer,
            commercial_id: None,
            pending_credit_amount: pending,
            risk_total: None,
            credit_limit: None,
            decision: RiskDecision::Allow,
        };

        let customer_id = match order.customer {
            Some(id) => id,
            None if pending.is_zero() => {
                log::debug!("order={} no customer and nothing deferred", order.uid);
                return assessment;
            }
            None => {
                assessment.decision = self.block(order, BlockReason::CustomerRequired);
                return assessment;
            }
        };

        let (commercial_id, commercial) = match self.resolve_commercial(customer_id) {
            Ok(resolved) => resolved,
            Err(reason) => {
                assessment.decision = self.block(order, reason);
                return assessment;
            }
        };
        assessment.commercial_id = Some(commercial_id);
        assessment.risk_total = commercial.risk_total;
        assessment.credit_limit = commercial.credit_limit;

        if commercial.risk_exception == Some(true) {
            assessment.decision =
                self.block(order, BlockReason::RiskException { commercial_id });
            return assessment;
        }

        let pool = match self.pool(commercial_id, &commercial) {
            Ok(pool) => pool,
            Err(reason) => {
                assessment.decision = self.block(order, reason);
                return assessment;
            }
        };
        assessment.risk_total = Some(pool.risk_total);
        assessment.credit_limit = Some(pool.credit_limit);

        log::debug!(
            "order={} customer={customer_id} commercial={commercial_id} risk_total={} pending={pending} limit={}",
            order.uid,
            pool.risk_total,
            pool.credit_limit
        );

        let exposure = checked_pending(&order.payment_lines)
            .and_then(|pending| pool.risk_total.checked_add(pending));
        let over_limit = match exposure {
            Some(exposure) => exposure > pool.credit_limit,
            None => {
                log::warn!("order={} risk exposure overflows", order.uid);
                true
            }
        };

        assessment.decision = if over_limit {
            self.block(
                order,
                BlockReason::CreditLimitExceeded {
                    commercial_id,
                    risk_total: pool.risk_total,
                    pending,
                    credit_limit: pool.credit_limit,
                },
            )
        } else {
            RiskDecision::Allow
        };
        assessment
    }

    fn resolve_commercial(
        &self,
        customer_id: CustomerId,
    ) -> Result<(CustomerId, CustomerRecord), BlockReason> {
        let customer = self
            .fetch(customer_id)?
            .ok_or(BlockReason::CustomerNotFound { customer_id })?;
        let commercial_id =
            customer
                .commercial_account_id
                .ok_or(BlockReason::RiskDataUnavailable {
                    customer_id,
                    field: "commercial_account_id",
                })?;
        let commercial = if commercial_id == customer.id {
            customer
        } else {
            self.fetch(commercial_id)?
                .ok_or(BlockReason::CommercialAccountNotFound {
                    customer_id,
                    commercial_id,
                })?
        };
        Ok((commercial_id, commercial))
    }

    /// Amount figures of the commercial account, after the missing-data
    /// policy. The flag must still be present unless the policy reads it
    /// as unset.
    fn pool(
        &self,
        commercial_id: CustomerId,
        commercial: &CustomerRecord,
    ) -> Result<RiskPool, BlockReason> {
        self.required(
            commercial.risk_exception,
            commercial_id,
            "risk_exception",
            false,
        )?;
        Ok(RiskPool {
            risk_total: self.required(
                commercial.risk_total,
                commercial_id,
                "risk_total",
                Amount::ZERO,
            )?,
            credit_limit: self.required(
                commercial.credit_limit,
                commercial_id,
                "credit_limit",
                Amount::ZERO,
            )?,
        })
    }

    fn fetch(&self, id: CustomerId) -> Result<Option<CustomerRecord>, BlockReason> {
        self.store.lookup(id).map_err(|e| {
            log::error!("customer={id} lookup failed: {e}");
            BlockReason::StoreUnavailable {
                reason: e.to_string(),
            }
        })
    }

    fn required<T>(
        &self,
        value: Option<T>,
        customer_id: CustomerId,
        field: &'static str,
        zero: T,
    ) -> Result<T, BlockReason> {
        match (value, self.config.missing_risk_data) {
            (Some(v), _) => Ok(v),
            (None, MissingRiskDataPolicy::TreatAsZero) => Ok(zero),
            (None, MissingRiskDataPolicy::Block) => {
                Err(BlockReason::RiskDataUnavailable { customer_id, field })
            }
        }
    }

    fn block(&self, order: &Order, reason: BlockReason) -> RiskDecision {
        let (title, body) = self.render(&reason);
        log::warn!("order={} blocked: {title} ({reason:?})", order.uid);
        RiskDecision::Block(Rejection {
            reason,
            title,
            body,
        })
    }

    fn render(&self, reason: &BlockReason) -> (String, String) {
        let messages = &self.config.messages;
        match reason {
            BlockReason::RiskException { .. } | BlockReason::CreditLimitExceeded { .. } => (
                messages.risk_exceeded_title.clone(),
                messages.risk_exceeded_body.clone(),
            ),
            BlockReason::RiskDataUnavailable { customer_id, field } => (
                "Customer Risk Data Unavailable".into(),
                format!(
                    "The {field} of customer {customer_id} is not loaded. \
                     Reload customer data or select another payment method."
                ),
            ),
            BlockReason::CustomerNotFound { customer_id } => (
                "Customer Not Found".into(),
                format!("Customer {customer_id} is not loaded. Select another customer."),
            ),
            BlockReason::CommercialAccountNotFound {
                customer_id,
                commercial_id,
            } => (
                "Commercial Account Not Found".into(),
                format!(
                    "Customer {customer_id} belongs to commercial account {commercial_id}, \
                     which is not loaded. The sale cannot be checked against its credit limit."
                ),
            ),
            BlockReason::CustomerRequired => (
                "Customer Required".into(),
                "Select a customer before using a pay-later payment method.".into(),
            ),
            BlockReason::StoreUnavailable { reason } => (
                "Customer Risk Data Unavailable".into(),
                format!("Customer risk data could not be read: {reason}"),
            ),
        }
    }
}
