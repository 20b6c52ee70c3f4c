use super::{Formatter, ToSql};

use cqn_core::{schema::TypeTag, stmt::Value, Result};

/// A value bound to a `?N` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: Value,

    /// Element type of the column the value is written to or compared
    /// against, when known
    pub ty: Option<TypeTag>,
}

/// 1-based position of a parameter, rendered as `?N`.
pub struct Placeholder(pub usize);

impl Param {
    pub fn new(value: Value, ty: Option<TypeTag>) -> Param {
        Param { value, ty }
    }

    /// True when the parameter carries raw bytes, which are stored as
    /// base64 text. Strings bound to binary columns are taken as already
    /// encoded.
    pub fn is_binary(&self) -> bool {
        match &self.value {
            Value::Bytes(_) => true,
            Value::Stream(stream) => {
                stream.is_binary()
                    || matches!(self.ty, Some(TypeTag::Binary | TypeTag::LargeBinary))
            }
            _ => false,
        }
    }
}

impl Formatter<'_> {
    pub(super) fn push_param(&mut self, value: Value, ty: Option<TypeTag>) -> Placeholder {
        self.params.push(Param::new(value, ty));
        Placeholder(self.params.len())
    }
}

impl ToSql for Placeholder {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        fmt!(f, "?" self.0);
        Ok(())
    }
}
