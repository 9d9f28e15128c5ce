// src/store/mod.rs

//! Persistence gateway.
//!
//! Every business operation reaches storage through [`Gateway`]. Rows travel as
//! JSON maps ([`Record`]) and are decoded into typed models by the caller.

use std::sync::Arc;

use async_trait::async_trait;

pub mod memory;
pub mod postgres;
pub mod query;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use query::{
    Attribute, ColumnType, Condition, Direction, Entity, FieldViolation, Include, Op, Order,
    Query, Record,
};

/// Errors reported by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write referenced a row that does not exist.
    #[error("foreign key violation on {constraint}")]
    ForeignKey { constraint: String },

    /// One or more fields were rejected.
    #[error("validation failed: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),

    /// A row could not be turned into the expected shape.
    #[error("failed to decode {entity} row: {message}")]
    Decode { entity: &'static str, message: String },

    #[error("{0}")]
    Database(String),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl StoreError {
    pub fn violations(&self) -> Option<&[FieldViolation]> {
        match self {
            StoreError::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for StoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut violations: Vec<FieldViolation> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field));
                    FieldViolation::new(field.as_ref(), message)
                })
            })
            .collect();
        // field_errors() is backed by a HashMap
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        StoreError::Validation(violations)
    }
}

/// Constraint checking mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxMode {
    #[default]
    Immediate,
    /// Foreign-key and uniqueness checks run at commit.
    Deferred,
}

/// Writes that can run either directly against the store or inside a transaction.
#[async_trait]
pub trait Writer: Send {
    /// Applies `patch` to every row matching `conditions`. Returns affected rows.
    async fn update(
        &mut self,
        entity: Entity,
        patch: &Record,
        conditions: &[Condition],
    ) -> Result<u64, StoreError>;

    /// Inserts a row and returns it as stored (with its generated `id`).
    async fn create(&mut self, entity: Entity, fields: &Record) -> Result<Record, StoreError>;
}

/// An open transaction. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait StoreTransaction: Writer {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn find_all(&self, entity: Entity, query: &Query) -> Result<Vec<Record>, StoreError>;

    async fn find_one(&self, entity: Entity, query: &Query) -> Result<Option<Record>, StoreError>;

    /// Number of rows matching the query's conditions; projection and paging are ignored.
    async fn count(&self, entity: Entity, query: &Query) -> Result<i64, StoreError>;

    /// `SUM(CAST(column AS INTEGER))` over matching rows. `None` when nothing matched.
    async fn sum(&self, entity: Entity, column: &str, query: &Query)
    -> Result<Option<i64>, StoreError>;

    async fn update(
        &self,
        entity: Entity,
        patch: &Record,
        conditions: &[Condition],
    ) -> Result<u64, StoreError>;

    async fn create(&self, entity: Entity, fields: &Record) -> Result<Record, StoreError>;

    async fn begin(&self, mode: TxMode) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

pub type SharedGateway = Arc<dyn Gateway>;

/// Fixed-width RFC 3339, so stored timestamps also sort correctly as text.
pub(crate) fn timestamp(t: chrono::DateTime<chrono::Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Fills in `id`, column defaults and timestamps for a row about to be inserted.
pub(crate) fn prepare_insert(entity: Entity, fields: &Record) -> Record {
    let mut row = fields.clone();
    for column in entity.columns() {
        if let Some(default) = entity.column_default(column) {
            row.entry(column).or_insert(default);
        }
    }
    let now = serde_json::Value::String(timestamp(chrono::Utc::now()));
    row.entry("id")
        .or_insert_with(|| serde_json::Value::String(uuid::Uuid::new_v4().to_string()));
    row.entry("created_at").or_insert_with(|| now.clone());
    row.entry("updated_at").or_insert(now);
    row
}

/// Stamps `updated_at` on a patch unless the caller set it.
pub(crate) fn prepare_update(patch: &Record) -> Record {
    let mut row = patch.clone();
    row.entry("updated_at")
        .or_insert_with(|| serde_json::Value::String(timestamp(chrono::Utc::now())));
    row
}

/// Rejects inserts that leave a required column empty.
pub(crate) fn check_required(entity: Entity, row: &Record) -> Result<(), StoreError> {
    let missing: Vec<FieldViolation> = entity
        .required_columns()
        .iter()
        .filter(|c| row.get(**c).is_none_or(|v| v.is_null()))
        .map(|c| FieldViolation::new(*c, format!("{}.{} cannot be null", entity.table(), c)))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(missing))
    }
}
