use super::{Entity, ModelBuilder};
use crate::{Error, Result};

use indexmap::IndexMap;

/// Entity definitions, loaded once and shared read-only by all requests.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub entities: IndexMap<String, Entity>,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn entity(&self, name: &str) -> Result<&Entity> {
        self.get(name)
            .ok_or_else(|| Error::invalid_statement(format!("unknown entity `{name}`")))
    }
}
