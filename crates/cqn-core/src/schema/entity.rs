use super::Element;
use crate::{Error, Result};

use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct Entity {
    /// Entity name, also used as the table name
    pub name: String,

    pub elements: IndexMap<String, Element>,
}

impl Entity {
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.get(name)
    }

    /// Like [`Entity::element`], failing with a compilation error when missing.
    pub fn expect_element(&self, name: &str) -> Result<&Element> {
        self.element(name).ok_or_else(|| {
            Error::invalid_statement(format!(
                "unknown element `{name}` of entity `{}`",
                self.name
            ))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements.values().filter(|element| element.key)
    }

    /// Elements stored as table columns, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements
            .values()
            .filter(|element| element.primitive().is_some())
    }

    pub fn associations(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements.values().filter(|element| element.is_association())
    }
}
