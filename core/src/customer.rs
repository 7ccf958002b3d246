//! Customer record augmentation.
//!
//! The host's record loader must fetch four extra attributes on every
//! customer so the guard can decide without a remote call. The manifest
//! below is the contract; `from_loaded` is the reader for what the loader
//! actually delivered.
//!
//! RULE: an attribute the loader did not deliver is `None`, never a
//! default. Whether `None` blocks or reads as zero is the guard's call.

use crate::{
    error::{RiskError, RiskResult},
    types::{Amount, CustomerId},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Host field names the loader must include when syncing customers.
pub const RISK_FIELD_MANIFEST: [&str; 4] = [
    "risk_exception",
    "risk_total",
    "credit_limit",
    "commercial_partner_id",
];

/// Fails on the first manifest field missing from `loaded_fields`.
pub fn assert_manifest(loaded_fields: &[&str]) -> RiskResult<()> {
    for field in RISK_FIELD_MANIFEST {
        if !loaded_fields.contains(&field) {
            return Err(RiskError::MissingManifestField { field });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: CustomerId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub risk_exception: Option<bool>,
    #[serde(default)]
    pub risk_total: Option<Amount>,
    #[serde(default)]
    pub credit_limit: Option<Amount>,
    #[serde(default)]
    pub commercial_account_id: Option<CustomerId>,
}

impl CustomerRecord {
    /// A top-level account carrying its own risk pool.
    pub fn commercial(
        id: CustomerId,
        name: impl Into<String>,
        risk_total: Amount,
        credit_limit: Amount,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            risk_exception: Some(false),
            risk_total: Some(risk_total),
            credit_limit: Some(credit_limit),
            commercial_account_id: Some(id),
        }
    }

    /// A contact rolling up to `commercial_id`, with no risk data of its own.
    pub fn sub_account(id: CustomerId, name: impl Into<String>, commercial_id: CustomerId) -> Self {
        Self {
            id,
            name: name.into(),
            risk_exception: None,
            risk_total: None,
            credit_limit: None,
            commercial_account_id: Some(commercial_id),
        }
    }

    pub fn with_risk_exception(mut self, flag: bool) -> Self {
        self.risk_exception = Some(flag);
        self
    }

    pub fn is_commercial(&self) -> bool {
        self.commercial_account_id == Some(self.id)
    }

    /// Parse one record as the host loader delivers it.
    ///
    /// Accepts `commercial_partner_id` as a bare id or a `[id, "name"]`
    /// pair, and amounts as JSON numbers or decimal strings. `null` and
    /// `false` mean the attribute is unset.
    pub fn from_loaded(value: &Value) -> RiskResult<Self> {
        let obj = value.as_object().ok_or_else(|| RiskError::SchemaMismatch {
            field: "<record>".into(),
            reason: "expected a JSON object".into(),
        })?;

        let id = obj
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| mismatch("id", "expected an integer id"))?;
        let name = match obj.get("name") {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };

        Ok(Self {
            id,
            name,
            risk_exception: loaded_bool(obj, "risk_exception")?,
            risk_total: loaded_amount(obj, "risk_total")?,
            credit_limit: loaded_amount(obj, "credit_limit")?,
            commercial_account_id: loaded_many2one(obj, "commercial_partner_id")?,
        })
    }
}

fn mismatch(field: &str, reason: &str) -> RiskError {
    RiskError::SchemaMismatch {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn loaded_bool(obj: &Map<String, Value>, field: &str) -> RiskResult<Option<bool>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(mismatch(field, &format!("expected a boolean, got {other}"))),
    }
}

fn loaded_amount(obj: &Map<String, Value>, field: &'static str) -> RiskResult<Option<Amount>> {
    let raw = match obj.get(field) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(mismatch(field, &format!("expected an amount, got {other}")));
        }
    };
    parse_amount(field, &raw).map(Some)
}

fn loaded_many2one(obj: &Map<String, Value>, field: &str) -> RiskResult<Option<CustomerId>> {
    match obj.get(field) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| mismatch(field, "expected an integer id")),
        Some(Value::Array(pair)) => pair
            .first()
            .and_then(Value::as_i64)
            .map(Some)
            .ok_or_else(|| mismatch(field, "expected [id, name]")),
        Some(other) => Err(mismatch(field, &format!("expected a reference, got {other}"))),
    }
}

/// Parse a decimal amount; scientific notation is accepted since JSON
/// serializers emit it for large floats.
pub(crate) fn parse_amount(field: &'static str, raw: &str) -> RiskResult<Amount> {
    Amount::from_str(raw)
        .or_else(|_| Amount::from_scientific(raw))
        .map_err(|_| RiskError::InvalidAmount {
            field,
            value: raw.to_string(),
        })
}
