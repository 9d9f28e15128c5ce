// src/store/memory.rs

//! In-process store with the same observable behaviour as [`super::PgStore`].
//! Backs the test suites and local runs without a database.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    Gateway, StoreError, StoreTransaction, TxMode, Writer, check_required, prepare_insert,
    prepare_update,
    query::{Bound, Condition, Direction, Entity, Op, Query, Record, check_query, convert_row},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<Entity, Vec<Record>>,
}

#[derive(Debug, Clone)]
enum Pending {
    Update {
        entity: Entity,
        patch: Record,
        conditions: Vec<Condition>,
    },
    Create {
        entity: Entity,
        row: Record,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Converts a patch or insert to column types, as the database would on write.
fn normalize(entity: Entity, row: &Record) -> Result<Record, StoreError> {
    let converted = convert_row(entity, row).map_err(StoreError::Validation)?;
    Ok(converted
        .into_iter()
        .map(|(column, bound)| (column, bound.into_json()))
        .collect())
}

/// `CAST(text AS INTEGER)`: a 32-bit integer or an error.
fn cast_integer(text: &str) -> Result<i32, StoreError> {
    let wide: i64 = text.parse().map_err(|_| {
        StoreError::Database(format!("invalid input syntax for type integer: \"{}\"", text))
    })?;
    i32::try_from(wide).map_err(|_| StoreError::Database("integer out of range".to_string()))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn matches(entity: Entity, row: &Record, conditions: &[Condition]) -> Result<bool, StoreError> {
    for condition in conditions {
        let ty = entity.column_type(&condition.column).ok_or_else(|| {
            StoreError::Database(format!("unknown column {}", condition.column))
        })?;
        let stored = row.get(&condition.column).unwrap_or(&Value::Null);

        let to_json = |value: &Value| {
            Bound::convert(ty, value)
                .map(Bound::into_json)
                .map_err(StoreError::Database)
        };

        let hit = match condition.op {
            Op::In => {
                let mut found = false;
                for candidate in condition.value.as_array().into_iter().flatten() {
                    if compare(stored, &to_json(candidate)?) == Some(Ordering::Equal) {
                        found = true;
                        break;
                    }
                }
                found
            }
            op => {
                let wanted = to_json(&condition.value)?;
                // SQL comparisons against NULL never match
                if stored.is_null() || wanted.is_null() {
                    false
                } else {
                    match (op, compare(stored, &wanted)) {
                        (_, None) => false,
                        (Op::Eq | Op::In, Some(o)) => o == Ordering::Equal,
                        (Op::Ne, Some(o)) => o != Ordering::Equal,
                        (Op::Gt, Some(o)) => o == Ordering::Greater,
                        (Op::Gte, Some(o)) => o != Ordering::Less,
                        (Op::Lt, Some(o)) => o == Ordering::Less,
                        (Op::Lte, Some(o)) => o != Ordering::Greater,
                    }
                }
            }
        };

        if !hit {
            return Ok(false);
        }
    }
    Ok(true)
}

impl Tables {
    fn table(&self, entity: Entity) -> &[Record] {
        self.rows.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    fn select(&self, entity: Entity, query: &Query) -> Result<Vec<Record>, StoreError> {
        check_query(entity, query).map_err(StoreError::Validation)?;

        let mut hits = Vec::new();
        for row in self.table(entity) {
            if matches(entity, row, &query.conditions)? {
                hits.push(row);
            }
        }

        for order in query.order.iter().rev() {
            hits.sort_by(|a, b| {
                let ord = compare(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                )
                .unwrap_or(Ordering::Equal);
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);

        Ok(hits
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| self.project(entity, row, query))
            .collect())
    }

    fn project(&self, entity: Entity, row: &Record, query: &Query) -> Record {
        let mut out = Record::new();

        if query.attributes.is_empty() {
            for column in entity.columns() {
                out.insert(
                    column.to_string(),
                    row.get(column).cloned().unwrap_or(Value::Null),
                );
            }
        } else {
            for attribute in &query.attributes {
                out.insert(
                    attribute.output_name().to_string(),
                    row.get(&attribute.column).cloned().unwrap_or(Value::Null),
                );
            }
        }

        for include in &query.include {
            let Some(relation) = entity.relation_to(include.entity) else {
                continue;
            };
            let joined = row.get(relation.foreign_key).and_then(|fk| {
                self.table(include.entity)
                    .iter()
                    .find(|target| target.get("id") == Some(fk))
            });
            let columns: Vec<&str> = if include.attributes.is_empty() {
                include.entity.columns().collect()
            } else {
                include.attributes.iter().map(String::as_str).collect()
            };
            for column in columns {
                let value = joined
                    .and_then(|t| t.get(column).cloned())
                    .unwrap_or(Value::Null);
                out.insert(format!("{}.{}", relation.name, column), value);
            }
        }

        out
    }

    fn check_foreign_keys(&self, entity: Entity, row: &Record) -> Result<(), StoreError> {
        for relation in entity.relations() {
            let Some(fk) = row.get(relation.foreign_key).filter(|v| !v.is_null()) else {
                continue;
            };
            let exists = self
                .table(relation.target)
                .iter()
                .any(|target| target.get("id") == Some(fk));
            if !exists {
                return Err(StoreError::ForeignKey {
                    constraint: format!("{}_{}_fkey", entity.table(), relation.foreign_key),
                });
            }
        }
        Ok(())
    }

    fn update(
        &mut self,
        entity: Entity,
        patch: &Record,
        conditions: &[Condition],
        check_fk: bool,
    ) -> Result<u64, StoreError> {
        let patch = normalize(entity, &prepare_update(patch))?;

        let mut targets = Vec::new();
        for (index, row) in self.table(entity).iter().enumerate() {
            if matches(entity, row, conditions)? {
                targets.push(index);
            }
        }

        let mut updated = Vec::with_capacity(targets.len());
        for &index in &targets {
            let mut row = self.table(entity)[index].clone();
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            if check_fk {
                self.check_foreign_keys(entity, &row)?;
            }
            updated.push((index, row));
        }

        let table = self.rows.entry(entity).or_default();
        for (index, row) in updated {
            table[index] = row;
        }
        Ok(targets.len() as u64)
    }

    fn insert(&mut self, entity: Entity, row: Record, check_fk: bool) -> Result<Record, StoreError> {
        if check_fk {
            self.check_foreign_keys(entity, &row)?;
        }
        self.rows.entry(entity).or_default().push(row.clone());
        Ok(row)
    }

    fn apply(&mut self, op: &Pending, check_fk: bool) -> Result<(), StoreError> {
        match op {
            Pending::Update {
                entity,
                patch,
                conditions,
            } => self.update(*entity, patch, conditions, check_fk).map(|_| ()),
            Pending::Create { entity, row } => self.insert(*entity, row.clone(), check_fk).map(|_| ()),
        }
    }

    /// Full referential check of the tables a transaction touched.
    fn check_all(&self, entities: impl IntoIterator<Item = Entity>) -> Result<(), StoreError> {
        for entity in entities {
            for row in self.table(entity) {
                self.check_foreign_keys(entity, row)?;
            }
        }
        Ok(())
    }
}

fn new_row(entity: Entity, fields: &Record) -> Result<Record, StoreError> {
    let row = normalize(entity, &prepare_insert(entity, fields))?;
    check_required(entity, &row)?;
    Ok(row)
}

#[async_trait]
impl Gateway for MemoryStore {
    async fn find_all(&self, entity: Entity, query: &Query) -> Result<Vec<Record>, StoreError> {
        self.tables.read().await.select(entity, query)
    }

    async fn find_one(&self, entity: Entity, query: &Query) -> Result<Option<Record>, StoreError> {
        let query = query.clone().limit(1);
        Ok(self.tables.read().await.select(entity, &query)?.into_iter().next())
    }

    async fn count(&self, entity: Entity, query: &Query) -> Result<i64, StoreError> {
        let rows = self.tables.read().await.select(entity, &query.unpaged())?;
        Ok(rows.len() as i64)
    }

    async fn sum(
        &self,
        entity: Entity,
        column: &str,
        query: &Query,
    ) -> Result<Option<i64>, StoreError> {
        let query = query.unpaged().select([column]);
        let rows = self.tables.read().await.select(entity, &query)?;

        let mut total: Option<i64> = None;
        for row in rows {
            let value = match row.get(column) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) => cast_integer(s.trim())?,
                Some(Value::Number(n)) => cast_integer(&n.to_string())?,
                Some(other) => {
                    return Err(StoreError::Database(format!(
                        "cannot cast {} to integer",
                        other
                    )));
                }
            };
            total = Some(
                total
                    .unwrap_or(0)
                    .checked_add(i64::from(value))
                    .ok_or_else(|| StoreError::Database("bigint out of range".to_string()))?,
            );
        }
        Ok(total)
    }

    async fn update(
        &self,
        entity: Entity,
        patch: &Record,
        conditions: &[Condition],
    ) -> Result<u64, StoreError> {
        self.tables
            .write()
            .await
            .update(entity, patch, conditions, true)
    }

    async fn create(&self, entity: Entity, fields: &Record) -> Result<Record, StoreError> {
        let row = new_row(entity, fields)?;
        self.tables.write().await.insert(entity, row, true)
    }

    async fn begin(&self, mode: TxMode) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let working = self.tables.read().await.clone();
        Ok(Box::new(MemoryTransaction {
            live: Arc::clone(&self.tables),
            working,
            log: Vec::new(),
            mode,
        }))
    }
}

/// Writes land in a private copy and are replayed onto the live tables on commit.
pub struct MemoryTransaction {
    live: Arc<RwLock<Tables>>,
    working: Tables,
    log: Vec<Pending>,
    mode: TxMode,
}

impl MemoryTransaction {
    fn immediate(&self) -> bool {
        self.mode == TxMode::Immediate
    }
}

#[async_trait]
impl Writer for MemoryTransaction {
    async fn update(
        &mut self,
        entity: Entity,
        patch: &Record,
        conditions: &[Condition],
    ) -> Result<u64, StoreError> {
        let patch = prepare_update(patch);
        let affected = self
            .working
            .update(entity, &patch, conditions, self.immediate())?;
        self.log.push(Pending::Update {
            entity,
            patch,
            conditions: conditions.to_vec(),
        });
        Ok(affected)
    }

    async fn create(&mut self, entity: Entity, fields: &Record) -> Result<Record, StoreError> {
        let row = new_row(entity, fields)?;
        let stored = self.working.insert(entity, row.clone(), self.immediate())?;
        self.log.push(Pending::Create { entity, row });
        Ok(stored)
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut live = self.live.write().await;
        let mut staged = live.clone();

        for op in &self.log {
            staged.apply(op, self.mode == TxMode::Immediate)?;
        }
        if self.mode == TxMode::Deferred {
            staged.check_all(self.log.iter().map(|op| match op {
                Pending::Update { entity, .. } | Pending::Create { entity, .. } => *entity,
            }))?;
        }

        *live = staged;
        Ok(())
    }
}
