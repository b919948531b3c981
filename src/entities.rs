use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{PosteriorError, Result};

/// A half-open span `[start, end)` of character offsets into a target text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entity {
    pub start: usize,
    pub end: usize,
    /// Entity type assigned by the extractor, if it wrote one.
    #[serde(default)]
    pub label: Option<String>,
    /// Surface text as seen by the extractor, if it wrote one.
    #[serde(default)]
    pub text: Option<String>,
}

impl Entity {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            label: None,
            text: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(PosteriorError::InvalidSpan {
                start: self.start,
                end: self.end,
                reason: "span must be non-empty".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct EntityRecord {
    ents: Vec<Entity>,
}

// Extractor output shows up both as a plain list and as an index-keyed object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntityDocument {
    List(Vec<EntityRecord>),
    Indexed(BTreeMap<String, EntityRecord>),
}

impl EntityDocument {
    fn into_records(self) -> Result<Vec<EntityRecord>> {
        match self {
            EntityDocument::List(records) => Ok(records),
            EntityDocument::Indexed(map) => {
                let mut keyed = Vec::with_capacity(map.len());
                for (key, record) in map {
                    let idx = key.trim().parse::<usize>().map_err(|_| {
                        PosteriorError::EntityDocument(format!(
                            "example key {key:?} is not an integer index"
                        ))
                    })?;
                    keyed.push((idx, record));
                }
                // BTreeMap orders "10" before "2"
                keyed.sort_by_key(|(idx, _)| *idx);
                for (expected, (idx, _)) in keyed.iter().enumerate() {
                    if *idx != expected {
                        return Err(PosteriorError::EntityDocument(format!(
                            "example indexes must cover 0..{}, missing {expected}",
                            keyed.len()
                        )));
                    }
                }
                Ok(keyed.into_iter().map(|(_, record)| record).collect())
            }
        }
    }
}

/// Parses an entity document from a JSON string.
pub fn parse_entities(json: &str) -> Result<Vec<Vec<Entity>>> {
    let document: EntityDocument = serde_json::from_str(json).map_err(|e| {
        PosteriorError::EntityDocument(format!(
            "expected a list (or index-keyed object) of {{\"ents\": [...]}} records: {e}"
        ))
    })?;

    let records = document.into_records()?;
    let mut entities = Vec::with_capacity(records.len());
    for record in records {
        for entity in &record.ents {
            entity.validate()?;
        }
        entities.push(record.ents);
    }
    Ok(entities)
}

/// Loads the per-example entity lists from `path`.
pub fn load_entities(path: impl AsRef<Path>) -> Result<Vec<Vec<Entity>>> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_entities(&contents)
}
