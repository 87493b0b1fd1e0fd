//! Storage seam behind repositories.
//!
//! # Responsibility
//! - Define the row shape (`EntityData`) exchanged with storage.
//! - Provide an in-memory document mapper for tests and embedded use.
//!
//! # Invariants
//! - `MemoryMapper` returns detached copies; callers never share row state.

use crate::entity::{EntityId, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Persisted shape of one entity: scalars plus many-has-one foreign keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    pub id: EntityId,
    pub values: BTreeMap<String, Value>,
    pub references: BTreeMap<String, Option<EntityId>>,
}

impl EntityData {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            values: BTreeMap::new(),
            references: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.values.insert(property.to_string(), value.into());
        self
    }

    pub fn with_reference(mut self, property: &str, target: Option<EntityId>) -> Self {
        self.references.insert(property.to_string(), target);
        self
    }
}

pub type MapperResult<T> = Result<T, MapperError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapperError {
    InvalidData(String),
    Unavailable(String),
}

impl Display for MapperError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidData(message) => write!(f, "invalid stored entity data: {message}"),
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
        }
    }
}

impl Error for MapperError {}

/// Row-level storage contract used by repositories.
pub trait Mapper {
    fn find(&self, id: EntityId) -> MapperResult<Option<EntityData>>;
    fn ids(&self) -> MapperResult<Vec<EntityId>>;
    fn persist(&mut self, data: &EntityData) -> MapperResult<()>;
    /// Returns `false` when no row existed.
    fn remove(&mut self, id: EntityId) -> MapperResult<bool>;
}

/// In-memory mapper storing each row as a JSON document.
#[derive(Debug, Default)]
pub struct MemoryMapper {
    rows: BTreeMap<EntityId, String>,
}

impl MemoryMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds rows, e.g. to simulate pre-existing storage.
    pub fn with_rows(rows: impl IntoIterator<Item = EntityData>) -> MapperResult<Self> {
        let mut mapper = Self::new();
        for row in rows {
            mapper.persist(&row)?;
        }
        Ok(mapper)
    }

    /// Stores a raw document; used to exercise corrupt-row handling.
    pub fn insert_raw(&mut self, id: EntityId, document: impl Into<String>) {
        self.rows.insert(id, document.into());
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Mapper for MemoryMapper {
    fn find(&self, id: EntityId) -> MapperResult<Option<EntityData>> {
        let Some(document) = self.rows.get(&id) else {
            return Ok(None);
        };
        let data: EntityData = serde_json::from_str(document)
            .map_err(|err| MapperError::InvalidData(format!("row {id}: {err}")))?;
        if data.id != id {
            return Err(MapperError::InvalidData(format!(
                "row {id} carries mismatched id {}",
                data.id
            )));
        }
        Ok(Some(data))
    }

    fn ids(&self) -> MapperResult<Vec<EntityId>> {
        Ok(self.rows.keys().copied().collect())
    }

    fn persist(&mut self, data: &EntityData) -> MapperResult<()> {
        let document = serde_json::to_string(data)
            .map_err(|err| MapperError::InvalidData(format!("row {}: {err}", data.id)))?;
        self.rows.insert(data.id, document);
        Ok(())
    }

    fn remove(&mut self, id: EntityId) -> MapperResult<bool> {
        Ok(self.rows.remove(&id).is_some())
    }
}
