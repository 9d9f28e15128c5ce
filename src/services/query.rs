// src/services/query.rs

use std::str::FromStr;

use serde::de::DeserializeOwned;

use crate::{
    error::AppError,
    models::decode,
    store::{Entity, Gateway, Query, Record},
};

/// Read operations the generic helper can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    FindAll,
    FindOne,
    FindAndCountAll,
}

impl FromStr for QueryMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "findAll" | "find_all" => Ok(QueryMode::FindAll),
            "findOne" | "find_one" => Ok(QueryMode::FindOne),
            "findAndCountAll" | "find_and_count_all" => Ok(QueryMode::FindAndCountAll),
            other => Err(AppError::UnsupportedMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    All(Vec<Record>),
    One(Option<Record>),
    /// `count` ignores offset and limit; `rows` honours them.
    Counted { count: i64, rows: Vec<Record> },
}

impl QueryOutput {
    pub fn is_empty(&self) -> bool {
        match self {
            QueryOutput::All(rows) => rows.is_empty(),
            QueryOutput::One(row) => row.is_none(),
            QueryOutput::Counted { rows, .. } => rows.is_empty(),
        }
    }

    pub fn into_rows(self) -> Vec<Record> {
        match self {
            QueryOutput::All(rows) | QueryOutput::Counted { rows, .. } => rows,
            QueryOutput::One(row) => row.into_iter().collect(),
        }
    }
}

/// Runs `query` against `entity` in the requested mode.
pub async fn query(
    store: &dyn Gateway,
    entity: Entity,
    mode: QueryMode,
    query: &Query,
) -> Result<QueryOutput, AppError> {
    tracing::debug!(table = entity.table(), ?mode, "dispatching query");

    let output = match mode {
        QueryMode::FindAll => QueryOutput::All(store.find_all(entity, query).await?),
        QueryMode::FindOne => QueryOutput::One(store.find_one(entity, query).await?),
        QueryMode::FindAndCountAll => {
            let count = store.count(entity, query).await?;
            let rows = store.find_all(entity, query).await?;
            QueryOutput::Counted { count, rows }
        }
    };
    Ok(output)
}

/// Same as [`query`], with the mode given by name.
pub async fn query_by_name(
    store: &dyn Gateway,
    entity: Entity,
    mode: &str,
    q: &Query,
) -> Result<QueryOutput, AppError> {
    let mode: QueryMode = mode.parse()?;
    query(store, entity, mode, q).await
}

pub async fn find_all<T: DeserializeOwned>(
    store: &dyn Gateway,
    entity: Entity,
    q: &Query,
) -> Result<Vec<T>, AppError> {
    query(store, entity, QueryMode::FindAll, q)
        .await?
        .into_rows()
        .into_iter()
        .map(|r| decode(entity, r).map_err(AppError::from))
        .collect()
}

pub async fn find_one<T: DeserializeOwned>(
    store: &dyn Gateway,
    entity: Entity,
    q: &Query,
) -> Result<Option<T>, AppError> {
    match query(store, entity, QueryMode::FindOne, q).await? {
        QueryOutput::One(Some(row)) => Ok(Some(decode(entity, row)?)),
        _ => Ok(None),
    }
}

pub async fn find_and_count_all<T: DeserializeOwned>(
    store: &dyn Gateway,
    entity: Entity,
    q: &Query,
) -> Result<(i64, Vec<T>), AppError> {
    match query(store, entity, QueryMode::FindAndCountAll, q).await? {
        QueryOutput::Counted { count, rows } => {
            let rows = rows
                .into_iter()
                .map(|r| decode(entity, r).map_err(AppError::from))
                .collect::<Result<Vec<T>, _>>()?;
            Ok((count, rows))
        }
        other => Err(AppError::InternalServerError(format!(
            "unexpected query output: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes() {
        assert_eq!("findAll".parse::<QueryMode>().unwrap(), QueryMode::FindAll);
        assert_eq!("find_one".parse::<QueryMode>().unwrap(), QueryMode::FindOne);
        assert_eq!(
            "findAndCountAll".parse::<QueryMode>().unwrap(),
            QueryMode::FindAndCountAll
        );
    }

    #[test]
    fn rejects_unknown_modes() {
        let err = "findByPk".parse::<QueryMode>().unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMode(ref m) if m == "findByPk"));
    }

    #[test]
    fn single_row_output_flattens() {
        assert!(QueryOutput::One(None).is_empty());
        assert_eq!(QueryOutput::One(Some(Record::new())).into_rows().len(), 1);
    }
}
