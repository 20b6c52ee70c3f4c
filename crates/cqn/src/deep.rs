//! Preparation of deep (nested) write payloads.
//!
//! Before a deep insert or update reaches the compiler, missing UUID keys are
//! generated and foreign keys are copied between parents and their associated
//! records, so that every flattened row carries the keys linking it to its
//! parent.

use crate::Event;

use cqn_core::{
    schema::{Association, Entity, ForeignKeySide, Model, Type},
    stmt::{Record, Value},
    Error, Result,
};
use std::mem;

/// A composition explicitly set to null. The children stored for it before
/// the write have to be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteAssoc {
    /// Element path from the root record, e.g. `["toOneChild"]`
    pub path: Vec<String>,

    /// Entity declaring the composition
    pub entity: String,

    /// The composition element
    pub element: String,
}

/// Prepares `data`, a record or a list of records of `entity`, for `event`.
///
/// * On [`Event::Create`], UUID keys that are absent get a generated value.
/// * Associated records are prepared first, then keys are propagated:
///   a managed to-one copies the child's key into the parent's FK elements,
///   a backlink copies the parent's key into each child's FK elements.
/// * Children of compositions are prepared as creates, since a deep write
///   (re)inserts them.
///
/// Plain key elements are left alone. Key associations are handled like any
/// other association, so their structured value is flattened into FK
/// elements.
pub fn prepare(
    model: &Model,
    entity: &Entity,
    data: &mut Value,
    event: Event,
) -> Result<Vec<DeleteAssoc>> {
    let mut cx = Prepare {
        model,
        path: vec![],
        deletes: vec![],
    };
    cx.value(entity, data, event)?;
    Ok(cx.deletes)
}

struct Prepare<'a> {
    model: &'a Model,

    /// Association path of the record being prepared
    path: Vec<String>,

    deletes: Vec<DeleteAssoc>,
}

impl Prepare<'_> {
    fn value(&mut self, entity: &Entity, data: &mut Value, event: Event) -> Result<()> {
        match data {
            Value::Null => Ok(()),
            Value::Record(record) => self.record(entity, record, event),
            Value::List(items) => {
                for item in items {
                    self.value(entity, item, event)?;
                }
                Ok(())
            }
            value => Err(Error::invalid_statement(format!(
                "data for `{}` must be a record or a list of records; got {value:?}",
                entity.name
            ))),
        }
    }

    fn record(&mut self, entity: &Entity, record: &mut Record, event: Event) -> Result<()> {
        if event.is_create() {
            generate_keys(entity, record);
        }

        for element in entity.associations() {
            let Some(assoc) = element.association() else {
                continue;
            };

            let Some(slot) = record.get_mut(&element.name) else {
                continue;
            };

            let mut child = mem::take(slot);

            if child.is_null() {
                if assoc.composition {
                    let mut path = self.path.clone();
                    path.push(element.name.clone());
                    self.deletes.push(DeleteAssoc {
                        path,
                        entity: entity.name.clone(),
                        element: element.name.clone(),
                    });
                }

                if assoc.foreign_key.side == ForeignKeySide::Source {
                    for field in &assoc.foreign_key.fields {
                        record.insert(field.fk.clone(), Value::Null);
                    }
                }

                record.insert(element.name.clone(), child);
                continue;
            }

            let target = assoc.target(self.model)?;
            let child_event = match (assoc.composition, event) {
                (true, Event::Delete) => Event::Delete,
                (true, _) => Event::Create,
                (false, event) => event,
            };

            self.path.push(element.name.clone());
            let prepared = self.value(target, &mut child, child_event);
            self.path.pop();
            prepared?;

            propagate(assoc, record, &mut child);
            record.insert(element.name.clone(), child);
        }

        Ok(())
    }
}

/// Generates UUID keys that are absent from `record`.
fn generate_keys(entity: &Entity, record: &mut Record) {
    for key in entity.keys() {
        if key.primitive() == Some(&Type::Uuid) && !record.has_value(&key.name) {
            record.insert(
                key.name.clone(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
    }
}

/// Copies key values across `assoc` between `parent` and the prepared
/// `child` data.
fn propagate(assoc: &Association, parent: &mut Record, child: &mut Value) {
    match assoc.foreign_key.side {
        ForeignKeySide::Source => {
            // A to-one child is a single record; lists take their first entry
            let child = match child {
                Value::Record(record) => Some(&*record),
                Value::List(items) => items.first().and_then(Value::as_record),
                _ => None,
            };

            let Some(child) = child else {
                return;
            };

            for field in &assoc.foreign_key.fields {
                if let Some(value) = child.get(&field.key).filter(|value| !value.is_null()) {
                    parent.insert(field.fk.clone(), value.clone());
                }
            }
        }
        ForeignKeySide::Target => {
            let children: Vec<&mut Record> = match child {
                Value::Record(record) => vec![record],
                Value::List(items) => items.iter_mut().filter_map(Value::as_record_mut).collect(),
                _ => vec![],
            };

            for child in children {
                for field in &assoc.foreign_key.fields {
                    if let Some(value) = parent.get(&field.key).filter(|value| !value.is_null()) {
                        child.insert(field.fk.clone(), value.clone());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqn_core::schema::{Association, Model, Type};
    use pretty_assertions::assert_eq;

    fn model() -> Model {
        Model::builder()
            .entity("RootUUID", |e| {
                e.key("ID", Type::Uuid)
                    .element("name", Type::string())
                    .association(
                        "toOneChild",
                        Association::to_one("ChildUUID")
                            .composition()
                            .keys_on_source([("toOneChild_ID", "ID")]),
                    )
            })
            .entity("ChildUUID", |e| {
                e.key("ID", Type::Uuid)
                    .element("text", Type::string())
                    .association(
                        "toManySubChild",
                        Association::to_many("SubChildUUID")
                            .composition()
                            .keys_on_target([("backlink_ID", "ID")]),
                    )
            })
            .entity("SubChildUUID", |e| {
                e.key("ID", Type::Uuid)
                    .element("text", Type::string())
                    .element("backlink_ID", Type::Uuid)
            })
            .build()
            .unwrap()
    }

    fn str_of<'a>(record: &'a Record, name: &str) -> &'a str {
        record[name].as_str().unwrap()
    }

    #[test]
    fn generates_and_propagates_keys_on_create() {
        let model = model();
        let root = model.entity("RootUUID").unwrap();

        let mut data = Value::Record(
            Record::new().with("ID", "root-1").with(
                "toOneChild",
                Record::new().with("text", "abc").with(
                    "toManySubChild",
                    vec![
                        Record::new().with("text", "a"),
                        Record::new().with("text", "b"),
                    ],
                ),
            ),
        );

        let deletes = prepare(&model, root, &mut data, Event::Create).unwrap();
        assert!(deletes.is_empty());

        let root = data.as_record().unwrap();
        assert_eq!(str_of(root, "ID"), "root-1");

        let child = root["toOneChild"].as_record().unwrap();
        let child_id = str_of(child, "ID");
        assert_eq!(child_id.len(), 36);
        assert_eq!(str_of(root, "toOneChild_ID"), child_id);

        let sub_children = child["toManySubChild"].as_list().unwrap();
        assert_eq!(sub_children.len(), 2);
        for sub_child in sub_children {
            let sub_child = sub_child.as_record().unwrap();
            assert!(!str_of(sub_child, "ID").is_empty());
            assert_eq!(str_of(sub_child, "backlink_ID"), child_id);
        }
    }

    #[test]
    fn absent_root_key_is_generated() {
        let model = model();
        let root = model.entity("RootUUID").unwrap();

        let mut data = Value::List(vec![
            Value::Record(Record::new().with("name", "a")),
            Value::Record(Record::new().with("name", "b")),
        ]);
        prepare(&model, root, &mut data, Event::Create).unwrap();

        let ids: Vec<_> = data
            .as_list()
            .unwrap()
            .iter()
            .map(|row| str_of(row.as_record().unwrap(), "ID").to_string())
            .collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn update_keeps_root_keys_and_creates_children() {
        let model = model();
        let root = model.entity("RootUUID").unwrap();

        let mut data = Value::Record(
            Record::new().with("name", "renamed").with(
                "toOneChild",
                Record::new().with("text", "abc"),
            ),
        );
        prepare(&model, root, &mut data, Event::Update).unwrap();

        let root = data.as_record().unwrap();
        assert!(!root.contains_key("ID"));
        let child = root["toOneChild"].as_record().unwrap();
        assert_eq!(str_of(root, "toOneChild_ID"), str_of(child, "ID"));
    }

    #[test]
    fn null_composition_is_marked_for_deletion() {
        let model = model();
        let root = model.entity("RootUUID").unwrap();

        let mut data = Value::Record(
            Record::new()
                .with("ID", "root-1")
                .with("toOneChild", Value::Null),
        );
        let deletes = prepare(&model, root, &mut data, Event::Update).unwrap();

        assert_eq!(
            deletes,
            [DeleteAssoc {
                path: vec!["toOneChild".to_string()],
                entity: "RootUUID".to_string(),
                element: "toOneChild".to_string(),
            }]
        );
        let root = data.as_record().unwrap();
        assert_eq!(root["toOneChild_ID"], Value::Null);
        assert_eq!(root["toOneChild"], Value::Null);
    }

    #[test]
    fn null_data_is_a_no_op() {
        let model = model();
        let root = model.entity("RootUUID").unwrap();

        let mut data = Value::Null;
        assert!(prepare(&model, root, &mut data, Event::Create)
            .unwrap()
            .is_empty());
        assert_eq!(data, Value::Null);

        let mut data = Value::from("nope");
        assert!(prepare(&model, root, &mut data, Event::Create)
            .unwrap_err()
            .is_invalid_statement());
    }
}
