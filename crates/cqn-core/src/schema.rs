mod association;
pub use association::{Association, Cardinality, ForeignKey, ForeignKeyField, ForeignKeySide};

mod builder;
pub use builder::{EntityBuilder, ModelBuilder};

mod element;
pub use element::{Element, ElementTy};

mod entity;
pub use entity::Entity;

mod model;
pub use model::Model;

mod ty;
pub use ty::{Type, TypeTag};
