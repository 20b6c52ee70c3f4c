use super::{Association, Type, TypeTag};
use crate::stmt::Value;

#[derive(Debug, Clone)]
pub struct Element {
    /// The element name, also used as the column name
    pub name: String,

    /// Primitive or association
    pub ty: ElementTy,

    /// True if the element is part of the primary key
    pub key: bool,

    pub not_null: bool,

    /// Value used on insert when the payload omits the element
    pub default: Option<Value>,
}

#[derive(Debug, Clone)]
pub enum ElementTy {
    Primitive(Type),
    Association(Association),
}

impl Element {
    pub fn new(name: impl Into<String>, ty: impl Into<ElementTy>) -> Element {
        Element {
            name: name.into(),
            ty: ty.into(),
            key: false,
            not_null: false,
            default: None,
        }
    }

    /// The primitive type when the element is stored as a column.
    pub fn primitive(&self) -> Option<&Type> {
        match &self.ty {
            ElementTy::Primitive(ty) => Some(ty),
            ElementTy::Association(_) => None,
        }
    }

    pub fn association(&self) -> Option<&Association> {
        match &self.ty {
            ElementTy::Association(assoc) => Some(assoc),
            ElementTy::Primitive(_) => None,
        }
    }

    pub fn is_association(&self) -> bool {
        matches!(self.ty, ElementTy::Association(_))
    }

    pub fn is_composition(&self) -> bool {
        self.association().is_some_and(|assoc| assoc.composition)
    }

    pub fn tag(&self) -> TypeTag {
        match &self.ty {
            ElementTy::Primitive(ty) => ty.tag(),
            ElementTy::Association(assoc) if assoc.composition => TypeTag::Composition,
            ElementTy::Association(_) => TypeTag::Association,
        }
    }
}

impl From<Type> for ElementTy {
    fn from(value: Type) -> Self {
        ElementTy::Primitive(value)
    }
}

impl From<Association> for ElementTy {
    fn from(value: Association) -> Self {
        ElementTy::Association(value)
    }
}
