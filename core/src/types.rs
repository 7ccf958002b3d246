//! Shared primitive types used across the guard.

/// Host identifier of a customer (partner) record.
pub type CustomerId = i64;

/// Monetary amount. Carried through unrounded.
pub type Amount = rust_decimal::Decimal;
