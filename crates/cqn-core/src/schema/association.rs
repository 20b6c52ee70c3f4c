use super::{Entity, Model};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// A relationship from the declaring entity to a target entity.
#[derive(Debug, Clone)]
pub struct Association {
    /// Name of the associated entity
    pub target: String,

    pub cardinality: Cardinality,

    /// True when the target's lifecycle is owned by the declaring entity
    pub composition: bool,

    pub foreign_key: ForeignKey,
}

/// Where the foreign-key columns of an association are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeySide {
    /// The declaring entity holds the FK columns (managed to-one, `author_ID`).
    Source,

    /// The target entity holds the FK columns (backlink, `parent_ID` on children).
    Target,
}

#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub side: ForeignKeySide,
    pub fields: Vec<ForeignKeyField>,
}

#[derive(Debug, Clone)]
pub struct ForeignKeyField {
    /// The element acting as the foreign key
    pub fk: String,

    /// The key element on the other side that `fk` references
    pub key: String,
}

impl Association {
    pub fn to_one(target: impl Into<String>) -> Association {
        Association {
            target: target.into(),
            cardinality: Cardinality::One,
            composition: false,
            foreign_key: ForeignKey {
                side: ForeignKeySide::Source,
                fields: vec![],
            },
        }
    }

    pub fn to_many(target: impl Into<String>) -> Association {
        Association {
            target: target.into(),
            cardinality: Cardinality::Many,
            composition: false,
            foreign_key: ForeignKey {
                side: ForeignKeySide::Target,
                fields: vec![],
            },
        }
    }

    pub fn composition(mut self) -> Association {
        self.composition = true;
        self
    }

    /// Foreign-key pairs `(fk, key)` stored on the declaring entity.
    pub fn keys_on_source<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.foreign_key = ForeignKey::new(ForeignKeySide::Source, pairs);
        self
    }

    /// Foreign-key pairs `(fk, key)` stored on the target entity.
    pub fn keys_on_target<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.foreign_key = ForeignKey::new(ForeignKeySide::Target, pairs);
        self
    }

    pub fn is_to_one(&self) -> bool {
        self.cardinality == Cardinality::One
    }

    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    pub fn target<'a>(&self, model: &'a Model) -> Result<&'a Entity> {
        model.entity(&self.target)
    }
}

impl ForeignKey {
    fn new<'a>(side: ForeignKeySide, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        ForeignKey {
            side,
            fields: pairs
                .into_iter()
                .map(|(fk, key)| ForeignKeyField {
                    fk: fk.to_string(),
                    key: key.to_string(),
                })
                .collect(),
        }
    }
}
