// src/models/mod.rs

pub mod exercise;
pub mod progress;
pub mod question;
pub mod result;
pub mod role;
pub mod user;

use serde::{Serialize, de::DeserializeOwned};

use crate::store::{Entity, Record, StoreError};

/// Decodes a gateway row into a typed model.
pub fn decode<T: DeserializeOwned>(entity: Entity, record: Record) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::Object(record)).map_err(|e| StoreError::Decode {
        entity: entity.table(),
        message: e.to_string(),
    })
}

/// Encodes a patch or new row for the gateway. `None` fields are expected to be skipped.
pub fn encode<T: Serialize>(value: &T) -> Result<Record, serde_json::Error> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected an object, got {}",
            other
        ))),
    }
}
