//! Finalize pipeline: the gate the host calls instead of finalizing
//! directly.
//!
//! EXECUTION ORDER: validators run in registration order. The first
//! rejection wins; later validators are not consulted.
//!
//! RULES:
//!   - On rejection the notifier fires exactly once and the finalize
//!     operation is never called. Nothing to roll back.
//!   - On success the finalize operation runs unmodified and its result
//!     is handed back as-is.

use crate::{
    guard::{Rejection, RiskDecision, RiskGuard},
    order::Order,
    store::CustomerStore,
};

/// A pre-commit check on an order about to be finalized.
pub trait OrderValidator {
    /// Stable name, used in logs.
    fn name(&self) -> &'static str;

    fn validate(&self, order: &Order) -> Result<(), Rejection>;
}

impl<T: OrderValidator + ?Sized> OrderValidator for &T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn validate(&self, order: &Order) -> Result<(), Rejection> {
        (**self).validate(order)
    }
}

impl<S: CustomerStore> OrderValidator for RiskGuard<S> {
    fn name(&self) -> &'static str {
        "financial_risk"
    }

    fn validate(&self, order: &Order) -> Result<(), Rejection> {
        match self.evaluate(order) {
            RiskDecision::Allow => Ok(()),
            RiskDecision::Block(rejection) => Err(rejection),
        }
    }
}

/// Surfaces a rejection to the operator (the host's error popup).
pub trait Notifier {
    fn notify(&self, title: &str, body: &str);
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn notify(&self, title: &str, body: &str) {
        (**self).notify(title, body)
    }
}

/// Writes rejections to the log. For headless hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        log::warn!("{title}: {body}");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome<T> {
    Finalized(T),
    Blocked(Rejection),
}

impl<T> FinalizeOutcome<T> {
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized(_))
    }
}

pub struct FinalizePipeline<'a> {
    validators: Vec<Box<dyn OrderValidator + 'a>>,
    notifier: Box<dyn Notifier + 'a>,
}

impl<'a> FinalizePipeline<'a> {
    pub fn new(notifier: impl Notifier + 'a) -> Self {
        Self {
            validators: Vec::new(),
            notifier: Box::new(notifier),
        }
    }

    /// Register a validator. Call in the order they should run.
    pub fn register(&mut self, validator: impl OrderValidator + 'a) -> &mut Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn validator_names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Run the validators only. Does not notify.
    pub fn check(&self, order: &Order) -> Result<(), Rejection> {
        for validator in &self.validators {
            if let Err(rejection) = validator.validate(order) {
                log::debug!(
                    "order={} rejected by validator '{}'",
                    order.uid,
                    validator.name()
                );
                return Err(rejection);
            }
        }
        Ok(())
    }

    /// Gate `finalize` behind the validators.
    pub fn finalize<T, F>(&self, order: &Order, finalize: F) -> FinalizeOutcome<T>
    where
        F: FnOnce(&Order) -> T,
    {
        match self.check(order) {
            Ok(()) => {
                log::info!("order={} passed {} validator(s)", order.uid, self.validators.len());
                FinalizeOutcome::Finalized(finalize(order))
            }
            Err(rejection) => {
                self.notifier.notify(&rejection.title, &rejection.body);
                FinalizeOutcome::Blocked(rejection)
            }
        }
    }
}
