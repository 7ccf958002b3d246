//! Customer stores.
//!
//! The guard only ever sees the `CustomerStore` trait. Two adapters ship
//! with the crate: a `HashMap` for hosts that already hold their partner
//! records in memory, and a SQLite-backed store.
//!
//! RULE: Only store/ talks to the database.

use crate::{
    customer::CustomerRecord,
    error::RiskResult,
    types::CustomerId,
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

mod sqlite;

pub use sqlite::SqliteCustomerStore;

/// Synchronous, read-only lookup of augmented customer records.
pub trait CustomerStore {
    /// `Ok(None)` when the id does not resolve.
    fn lookup(&self, id: CustomerId) -> RiskResult<Option<CustomerRecord>>;
}

impl<T: CustomerStore + ?Sized> CustomerStore for &T {
    fn lookup(&self, id: CustomerId) -> RiskResult<Option<CustomerRecord>> {
        (**self).lookup(id)
    }
}

impl<T: CustomerStore + ?Sized> CustomerStore for Arc<T> {
    fn lookup(&self, id: CustomerId) -> RiskResult<Option<CustomerRecord>> {
        (**self).lookup(id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerStore {
    customers: HashMap<CustomerId, CustomerRecord>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&mut self, record: CustomerRecord) {
        self.customers.insert(record.id, record);
    }

    /// Load a batch of records as delivered by the host's sync layer.
    /// Returns how many were loaded.
    pub fn load_json(&mut self, records: &[Value]) -> RiskResult<usize> {
        for raw in records {
            self.insert(CustomerRecord::from_loaded(raw)?);
        }
        log::debug!("loaded {} customer records", records.len());
        Ok(records.len())
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

impl FromIterator<CustomerRecord> for InMemoryCustomerStore {
    fn from_iter<I: IntoIterator<Item = CustomerRecord>>(iter: I) -> Self {
        let mut store = Self::new();
        for record in iter {
            store.insert(record);
        }
        store
    }
}

impl CustomerStore for InMemoryCustomerStore {
    fn lookup(&self, id: CustomerId) -> RiskResult<Option<CustomerRecord>> {
        Ok(self.customers.get(&id).cloned())
    }
}
