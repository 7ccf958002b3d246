//! Credit-risk guard for point-of-sale finalization.
//!
//! Before a sale is finalized, the guard checks the customer's pooled
//! risk (open credit plus this order's pay-later lines) against the
//! commercial account's credit limit, and blocks the sale when the limit
//! would be exceeded or the account is flagged.

pub mod config;
pub mod customer;
pub mod error;
pub mod guard;
pub mod order;
pub mod risk_profile;
pub mod store;
pub mod types;
pub mod validator;

pub use config::GuardConfig;
pub use customer::CustomerRecord;
pub use error::{RiskError, RiskResult};
pub use guard::{pending_credit_amount, BlockReason, Rejection, RiskAssessment, RiskDecision, RiskGuard};
pub use order::{Order, PaymentLine, PaymentMethod, PaymentType};
pub use store::{CustomerStore, InMemoryCustomerStore, SqliteCustomerStore};
pub use validator::{FinalizeOutcome, FinalizePipeline, LogNotifier, Notifier, OrderValidator};
