use std::path::Path;

use crate::entities::{load_entities, Entity};
use crate::error::{PosteriorError, Result};
use crate::utils::read_lines;

/// One aligned (source, target, entities) triple. Identity is its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub source: String,
    pub target: String,
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    examples: Vec<Example>,
}

impl Dataset {
    /// Zips the three collections, failing if their lengths differ.
    pub fn from_parts(
        sources: Vec<String>,
        targets: Vec<String>,
        entities: Vec<Vec<Entity>>,
    ) -> Result<Self> {
        if sources.len() != targets.len() || targets.len() != entities.len() {
            return Err(PosteriorError::LengthMismatch {
                sources: sources.len(),
                targets: targets.len(),
                entities: entities.len(),
            });
        }

        let examples = sources
            .into_iter()
            .zip(targets)
            .zip(entities)
            .map(|((source, target), entities)| Example {
                source,
                target,
                entities,
            })
            .collect();
        Ok(Self { examples })
    }

    pub fn load(
        source_path: impl AsRef<Path>,
        target_path: impl AsRef<Path>,
        ent_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let sources = read_lines(source_path)?;
        let targets = read_lines(target_path)?;
        let entities = load_entities(ent_path)?;
        Self::from_parts(sources, targets, entities)
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Total number of entities across all examples.
    pub fn entity_count(&self) -> usize {
        self.examples.iter().map(|e| e.entities.len()).sum()
    }
}
