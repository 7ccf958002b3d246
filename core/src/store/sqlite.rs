use super::CustomerStore;
use crate::{
    customer::{parse_amount, CustomerRecord},
    error::RiskResult,
    risk_profile::RiskProfile,
    types::CustomerId,
};
use rusqlite::{params, Connection, OptionalExtension};

pub struct SqliteCustomerStore {
    conn: Connection,
}

/// Raw row before amount parsing; decimal parse errors are ours, not
/// rusqlite's, so they are handled outside the row mapper.
struct CustomerRow {
    id: CustomerId,
    name: String,
    risk_exception: Option<bool>,
    risk_total: Option<String>,
    credit_limit: Option<String>,
    commercial_account_id: Option<CustomerId>,
}

impl CustomerRow {
    fn into_record(self) -> RiskResult<CustomerRecord> {
        Ok(CustomerRecord {
            id: self.id,
            name: self.name,
            risk_exception: self.risk_exception,
            risk_total: self
                .risk_total
                .map(|raw| parse_amount("risk_total", &raw))
                .transpose()?,
            credit_limit: self
                .credit_limit
                .map(|raw| parse_amount("credit_limit", &raw))
                .transpose()?,
            commercial_account_id: self.commercial_account_id,
        })
    }
}

impl SqliteCustomerStore {
    pub fn open(path: &str) -> RiskResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RiskResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> RiskResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_customer_risk.sql"))?;
        Ok(())
    }

    // ── Customer ──────────────────────────────────────────────────

    pub fn upsert_customer(&self, c: &CustomerRecord) -> RiskResult<()> {
        self.conn.execute(
            "INSERT INTO customer_risk (
                customer_id, name, risk_exception, risk_total, credit_limit,
                commercial_account_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(customer_id) DO UPDATE SET
                name                  = excluded.name,
                risk_exception        = excluded.risk_exception,
                risk_total            = excluded.risk_total,
                credit_limit          = excluded.credit_limit,
                commercial_account_id = excluded.commercial_account_id",
            params![
                c.id,
                &c.name,
                c.risk_exception,
                c.risk_total.map(|a| a.to_string()),
                c.credit_limit.map(|a| a.to_string()),
                c.commercial_account_id,
            ],
        )?;
        Ok(())
    }

    /// Overwrite the computed risk attributes of one customer.
    /// Returns false if the customer does not exist.
    pub fn apply_risk_profile(&self, id: CustomerId, profile: &RiskProfile) -> RiskResult<bool> {
        let updated = self.conn.execute(
            "UPDATE customer_risk
             SET risk_total = ?1, risk_exception = ?2, credit_limit = ?3
             WHERE customer_id = ?4",
            params![
                profile.risk_total().to_string(),
                profile.risk_exception(),
                profile.credit_limit.to_string(),
                id,
            ],
        )?;
        if updated > 0 {
            log::debug!(
                "customer={id} risk refreshed: total={} exception={}",
                profile.risk_total(),
                profile.risk_exception()
            );
        }
        Ok(updated > 0)
    }

    pub fn customer_count(&self) -> RiskResult<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM customer_risk", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl CustomerStore for SqliteCustomerStore {
    fn lookup(&self, id: CustomerId) -> RiskResult<Option<CustomerRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT customer_id, name, risk_exception, risk_total, credit_limit,
                        commercial_account_id
                 FROM customer_risk WHERE customer_id = ?1",
                params![id],
                |row| {
                    Ok(CustomerRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        risk_exception: row.get(2)?,
                        risk_total: row.get(3)?,
                        credit_limit: row.get(4)?,
                        commercial_account_id: row.get(5)?,
                    })
                },
            )
            .optional()?;
        row.map(CustomerRow::into_record).transpose()
    }
}
