// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{
    Executor, PgPool, Postgres, QueryBuilder, Transaction,
    error::ErrorKind,
    postgres::PgDatabaseError,
    types::Json,
};

use super::{
    Gateway, StoreError, StoreTransaction, TxMode, Writer, check_required, prepare_insert,
    prepare_update,
    query::{
        Bound, Condition, Direction, Entity, FieldViolation, Op, Query, Record, check_columns,
        check_query, convert_row,
    },
};

/// Gateway backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Normalizes driver errors into the store's taxonomy.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    let Some(db) = err.as_database_error() else {
        return StoreError::Database(err.to_string());
    };

    let pg = db.try_downcast_ref::<PgDatabaseError>();
    let column = pg.and_then(|e| e.column()).unwrap_or("value");
    let table = pg.and_then(|e| e.table()).unwrap_or("row");

    match db.kind() {
        ErrorKind::ForeignKeyViolation => StoreError::ForeignKey {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        ErrorKind::NotNullViolation => StoreError::Validation(vec![FieldViolation::new(
            column,
            format!("{}.{} cannot be null", table, column),
        )]),
        ErrorKind::UniqueViolation => StoreError::Validation(vec![FieldViolation::new(
            column,
            format!(
                "{} must be unique",
                db.constraint().unwrap_or(column)
            ),
        )]),
        ErrorKind::CheckViolation => StoreError::Validation(vec![FieldViolation::new(
            column,
            db.message().to_string(),
        )]),
        _ => StoreError::Database(db.message().to_string()),
    }
}

fn push_bound(qb: &mut QueryBuilder<'_, Postgres>, bound: Bound) {
    match bound {
        Bound::Null => {
            qb.push("NULL");
        }
        Bound::Uuid(v) => {
            qb.push_bind(v);
        }
        Bound::Text(v) => {
            qb.push_bind(v);
        }
        Bound::Integer(v) => {
            qb.push_bind(v);
        }
        Bound::Float(v) => {
            qb.push_bind(v);
        }
        Bound::Bool(v) => {
            qb.push_bind(v);
        }
        Bound::Timestamp(v) => {
            qb.push_bind(v);
        }
    }
}

fn bind_filter(entity: Entity, column: &str, value: &serde_json::Value) -> Result<Bound, StoreError> {
    let ty = entity.column_type(column).ok_or_else(|| {
        StoreError::Validation(vec![FieldViolation::new(
            column,
            format!("{} is not a column of {}", column, entity.table()),
        )])
    })?;
    Bound::convert(ty, value).map_err(|m| StoreError::Validation(vec![FieldViolation::new(column, m)]))
}

/// Appends `WHERE ...` for `conditions`, qualifying columns with `alias`.
fn push_where(
    qb: &mut QueryBuilder<'_, Postgres>,
    entity: Entity,
    alias: &str,
    conditions: &[Condition],
) -> Result<(), StoreError> {
    for (i, condition) in conditions.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(format!("{}.\"{}\"", alias, condition.column));

        match condition.op {
            Op::In => {
                let values = condition.value.as_array().cloned().unwrap_or_default();
                if values.is_empty() {
                    // IN () is not valid SQL
                    qb.push(" IS NULL AND FALSE");
                    continue;
                }
                qb.push(" IN (");
                for (j, value) in values.iter().enumerate() {
                    if j > 0 {
                        qb.push(", ");
                    }
                    let bound = bind_filter(entity, &condition.column, value)?;
                    push_bound(qb, bound);
                }
                qb.push(")");
            }
            op => {
                qb.push(format!(" {} ", op.sql()));
                let bound = bind_filter(entity, &condition.column, &condition.value)?;
                push_bound(qb, bound);
            }
        }
    }
    Ok(())
}

fn push_from(qb: &mut QueryBuilder<'_, Postgres>, entity: Entity, query: &Query) {
    qb.push(format!(" FROM \"{}\" AS base", entity.table()));
    for (i, include) in query.include.iter().enumerate() {
        if let Some(relation) = entity.relation_to(include.entity) {
            qb.push(format!(
                " LEFT JOIN \"{}\" AS inc{i} ON inc{i}.\"id\" = base.\"{}\"",
                include.entity.table(),
                relation.foreign_key
            ));
        }
    }
}

/// Builds `SELECT row_to_json(q) FROM (SELECT ...) AS q` for a read query.
fn select_rows(entity: Entity, query: &Query) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    check_query(entity, query).map_err(StoreError::Validation)?;

    let mut projection: Vec<String> = if query.attributes.is_empty() {
        entity
            .columns()
            .map(|c| format!("base.\"{c}\" AS \"{c}\""))
            .collect()
    } else {
        query
            .attributes
            .iter()
            .map(|a| format!("base.\"{}\" AS \"{}\"", a.column, a.output_name()))
            .collect()
    };

    for (i, include) in query.include.iter().enumerate() {
        let Some(relation) = entity.relation_to(include.entity) else {
            continue;
        };
        let columns: Vec<&str> = if include.attributes.is_empty() {
            include.entity.columns().collect()
        } else {
            include.attributes.iter().map(String::as_str).collect()
        };
        projection.extend(
            columns
                .into_iter()
                .map(|c| format!("inc{i}.\"{c}\" AS \"{}.{c}\"", relation.name)),
        );
    }

    let order = (!query.order.is_empty()).then(|| {
        query
            .order
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("base.\"{}\" {}", o.column, dir)
            })
            .collect::<Vec<_>>()
            .join(", ")
    });

    // the outer scan does not inherit the subquery's order, so carry it as a column
    let mut qb = match &order {
        Some(order) => {
            projection.push(format!("row_number() OVER (ORDER BY {order}) AS \"_position\""));
            QueryBuilder::new("SELECT to_jsonb(q) - '_position' FROM (SELECT ")
        }
        None => QueryBuilder::new("SELECT row_to_json(q) FROM (SELECT "),
    };
    qb.push(projection.join(", "));
    push_from(&mut qb, entity, query);
    push_where(&mut qb, entity, "base", &query.conditions)?;

    if let Some(order) = &order {
        qb.push(" ORDER BY ");
        qb.push(order);
    }
    if let Some(offset) = query.offset {
        qb.push(" OFFSET ");
        qb.push_bind(offset as i64);
    }
    if let Some(limit) = query.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
    }
    qb.push(") AS q");
    if order.is_some() {
        qb.push(" ORDER BY q.\"_position\"");
    }

    Ok(qb)
}

async fn run_update<'c, E>(
    executor: E,
    entity: Entity,
    patch: &Record,
    conditions: &[Condition],
) -> Result<u64, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    let fields = convert_row(entity, &prepare_update(patch)).map_err(StoreError::Validation)?;
    check_columns(entity, conditions.iter().map(|c| c.column.as_str()))
        .map_err(StoreError::Validation)?;

    let mut qb = QueryBuilder::new(format!("UPDATE \"{}\" AS base SET ", entity.table()));
    for (i, (column, bound)) in fields.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(format!("\"{}\" = ", column));
        push_bound(&mut qb, bound);
    }
    push_where(&mut qb, entity, "base", conditions)?;

    let result = qb.build().execute(executor).await.map_err(map_sqlx)?;
    Ok(result.rows_affected())
}

async fn run_create<'c, E>(executor: E, entity: Entity, fields: &Record) -> Result<Record, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    let row = prepare_insert(entity, fields);
    let converted = convert_row(entity, &row).map_err(StoreError::Validation)?;
    check_required(entity, &row)?;

    let columns: Vec<String> = converted.iter().map(|(c, _)| format!("\"{}\"", c)).collect();
    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO \"{}\" ({}) VALUES (",
        entity.table(),
        columns.join(", ")
    ));
    for (i, (_, bound)) in converted.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_bound(&mut qb, bound);
    }
    qb.push(format!(") RETURNING row_to_json(\"{}\".*)", entity.table()));

    let Json(stored) = qb
        .build_query_scalar::<Json<Record>>()
        .fetch_one(executor)
        .await
        .map_err(map_sqlx)?;
    Ok(stored)
}

#[async_trait]
impl Gateway for PgStore {
    async fn find_all(&self, entity: Entity, query: &Query) -> Result<Vec<Record>, StoreError> {
        let mut qb = select_rows(entity, query)?;
        let rows = qb
            .build_query_scalar::<Json<Record>>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(|Json(r)| r).collect())
    }

    async fn find_one(&self, entity: Entity, query: &Query) -> Result<Option<Record>, StoreError> {
        let mut qb = select_rows(entity, &query.clone().limit(1))?;
        let row = qb
            .build_query_scalar::<Json<Record>>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(|Json(r)| r))
    }

    async fn count(&self, entity: Entity, query: &Query) -> Result<i64, StoreError> {
        let query = query.unpaged();
        check_query(entity, &query).map_err(StoreError::Validation)?;

        let mut qb = QueryBuilder::new("SELECT COUNT(*)");
        push_from(&mut qb, entity, &query);
        push_where(&mut qb, entity, "base", &query.conditions)?;

        qb.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn sum(
        &self,
        entity: Entity,
        column: &str,
        query: &Query,
    ) -> Result<Option<i64>, StoreError> {
        let query = query.unpaged();
        check_columns(entity, [column]).map_err(StoreError::Validation)?;
        check_query(entity, &query).map_err(StoreError::Validation)?;

        let mut qb = QueryBuilder::new(format!("SELECT SUM(CAST(base.\"{}\" AS INTEGER))", column));
        push_from(&mut qb, entity, &query);
        push_where(&mut qb, entity, "base", &query.conditions)?;

        qb.build_query_scalar::<Option<i64>>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn update(
        &self,
        entity: Entity,
        patch: &Record,
        conditions: &[Condition],
    ) -> Result<u64, StoreError> {
        run_update(&self.pool, entity, patch, conditions).await
    }

    async fn create(&self, entity: Entity, fields: &Record) -> Result<Record, StoreError> {
        run_create(&self.pool, entity, fields).await
    }

    async fn begin(&self, mode: TxMode) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        if mode == TxMode::Deferred {
            sqlx::query("SET CONSTRAINTS ALL DEFERRED")
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
        }
        Ok(Box::new(PgTransaction { tx }))
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Writer for PgTransaction {
    async fn update(
        &mut self,
        entity: Entity,
        patch: &Record,
        conditions: &[Condition],
    ) -> Result<u64, StoreError> {
        run_update(&mut *self.tx, entity, patch, conditions).await
    }

    async fn create(&mut self, entity: Entity, fields: &Record) -> Result<Record, StoreError> {
        run_create(&mut *self.tx, entity, fields).await
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx)
    }
}
