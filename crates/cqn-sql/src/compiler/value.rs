use super::{Comma, Formatter, Literal, ToSql};
use crate::convert;

use cqn_core::{schema::TypeTag, stmt::Value, Error, Result};

/// A value bound as a parameter and wrapped by the input converter of the
/// element type it is written to or compared against.
pub(super) struct Input<'a>(pub(super) &'a Value, pub(super) Option<TypeTag>);

impl ToSql for &Value {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        Input(self, None).to_sql(f)
    }
}

impl ToSql for Input<'_> {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let Input(value, ty) = self;

        let value = match (value, ty) {
            (Value::Null, _) => {
                fmt!(f, "NULL");
                return Ok(());
            }
            // Structured columns store their JSON text
            (Value::Record(_) | Value::List(_), Some(TypeTag::Struct | TypeTag::Array)) => {
                Value::String(value.to_json()?.to_string())
            }
            (Value::List(items), _) => {
                if items.is_empty() {
                    return Err(Error::invalid_statement("empty list value"));
                }

                fmt!(f, "(" Comma(items.iter().map(|item| Input(item, ty))) ")");
                return Ok(());
            }
            (Value::Record(_), _) => {
                return Err(Error::invalid_statement(format!(
                    "cannot serialize structured value into a scalar position: {value:?}"
                )));
            }
            // The pattern text of a regex literal outside `like`
            (Value::Regex(source), _) => Value::String(source.clone()),
            (value, _) => value.clone(),
        };

        let placeholder = f.push_param(value, ty);

        match ty.and_then(convert::input_converter) {
            Some(converter) => {
                let placeholder = f.capture(|f| placeholder.to_sql(f))?;
                fmt!(f, converter(&placeholder));
            }
            None => fmt!(f, placeholder),
        }

        Ok(())
    }
}

impl Formatter<'_> {
    /// Renders a value as an inline SQL literal, for DDL defaults.
    pub(super) fn literal(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => fmt!(self, "NULL"),
            Value::Bool(true) => fmt!(self, "TRUE"),
            Value::Bool(false) => fmt!(self, "FALSE"),
            Value::I64(v) => fmt!(self, v.to_string()),
            Value::Double(v) => fmt!(self, v.to_string()),
            Value::Decimal(v) => fmt!(self, Literal(v)),
            Value::String(v) => fmt!(self, Literal(v)),
            _ => {
                return Err(Error::invalid_statement(format!(
                    "value cannot be used as a default: {value:?}"
                )))
            }
        }
        Ok(())
    }
}
