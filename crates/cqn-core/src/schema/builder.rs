use super::{Association, Element, ElementTy, Entity, ForeignKeySide, Model, Type};
use crate::{stmt::Value, Error, Result};

use indexmap::IndexMap;

/// Assembles a [`Model`] and verifies its associations.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    entities: IndexMap<String, Entity>,
    duplicates: Vec<String>,
}

/// Builds one entity's element list.
#[derive(Debug)]
pub struct EntityBuilder {
    entity: Entity,
}

impl ModelBuilder {
    pub fn entity(mut self, name: &str, f: impl FnOnce(EntityBuilder) -> EntityBuilder) -> Self {
        let builder = f(EntityBuilder {
            entity: Entity {
                name: name.to_string(),
                elements: IndexMap::new(),
            },
        });

        if self
            .entities
            .insert(name.to_string(), builder.entity)
            .is_some()
        {
            self.duplicates.push(name.to_string());
        }

        self
    }

    pub fn build(mut self) -> Result<Model> {
        if let Some(name) = self.duplicates.first() {
            return Err(Error::invalid_schema(format!("duplicate entity `{name}`")));
        }

        // Managed to-one associations get their FK elements generated from
        // the target key when the model does not declare them.
        let mut generated = vec![];

        for entity in self.entities.values() {
            for element in entity.elements.values() {
                let Some(assoc) = element.association() else {
                    continue;
                };

                let target = self.entities.get(&assoc.target).ok_or_else(|| {
                    Error::invalid_schema(format!(
                        "association `{}.{}` targets unknown entity `{}`",
                        entity.name, element.name, assoc.target
                    ))
                })?;

                // The referenced key lives on the side opposite the FK columns.
                let key_owner = match assoc.foreign_key.side {
                    ForeignKeySide::Source => target,
                    ForeignKeySide::Target => entity,
                };

                for field in &assoc.foreign_key.fields {
                    let key = key_owner.element(&field.key).and_then(Element::primitive);

                    let Some(key_ty) = key else {
                        return Err(Error::invalid_schema(format!(
                            "foreign key of `{}.{}` references unknown key `{}.{}`",
                            entity.name, element.name, key_owner.name, field.key
                        )));
                    };

                    if assoc.foreign_key.side == ForeignKeySide::Source
                        && !entity.elements.contains_key(&field.fk)
                    {
                        generated.push((
                            entity.name.clone(),
                            Element::new(field.fk.clone(), key_ty.clone()),
                        ));
                    }
                }
            }
        }

        for (entity, element) in generated {
            if let Some(entity) = self.entities.get_mut(&entity) {
                entity.elements.insert(element.name.clone(), element);
            }
        }

        // Backlink FK columns must exist on the target once generation is done.
        for entity in self.entities.values() {
            for element in entity.associations() {
                let Some(assoc) = element.association() else {
                    continue;
                };

                if assoc.foreign_key.side != ForeignKeySide::Target {
                    continue;
                }

                let target = &self.entities[&assoc.target];

                for field in &assoc.foreign_key.fields {
                    if target.element(&field.fk).and_then(Element::primitive).is_none() {
                        return Err(Error::invalid_schema(format!(
                            "foreign key `{}.{}` of `{}.{}` is not a stored element",
                            assoc.target, field.fk, entity.name, element.name
                        )));
                    }
                }
            }
        }

        Ok(Model {
            entities: self.entities,
        })
    }
}

impl EntityBuilder {
    pub fn element(mut self, name: &str, ty: impl Into<ElementTy>) -> Self {
        self.entity
            .elements
            .insert(name.to_string(), Element::new(name, ty));
        self
    }

    pub fn key(mut self, name: &str, ty: Type) -> Self {
        let mut element = Element::new(name, ty);
        element.key = true;
        element.not_null = true;
        self.entity.elements.insert(name.to_string(), element);
        self
    }

    pub fn association(self, name: &str, assoc: Association) -> Self {
        self.element(name, assoc)
    }

    /// Marks the most recently added element as NOT NULL.
    pub fn not_null(mut self) -> Self {
        if let Some((_, element)) = self.entity.elements.last_mut() {
            element.not_null = true;
        }
        self
    }

    /// Sets the insert default of the most recently added element.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        if let Some((_, element)) = self.entity.elements.last_mut() {
            element.default = Some(value.into());
        }
        self
    }
}
