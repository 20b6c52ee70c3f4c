use base64::{engine::general_purpose::STANDARD, Engine as _};
use cqn_core::{stmt::Value as CoreValue, Error, Result};
use cqn_sql::Param;
use rusqlite::{
    types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef},
    Row,
};

/// A bind value in the shape the engine accepts.
#[derive(Debug)]
pub struct Value(CoreValue);

impl From<CoreValue> for Value {
    fn from(value: CoreValue) -> Self {
        Self(value)
    }
}

impl Value {
    /// Converts this SQLite driver value into the core value.
    pub fn into_inner(self) -> CoreValue {
        self.0
    }

    /// Resolves a bound parameter into a value the engine can take
    /// synchronously.
    ///
    /// Streams are drained completely. Binary payloads, whether raw bytes or
    /// drained binary streams, are stored as base64 text.
    pub async fn bind(param: &Param) -> Result<Value> {
        let value = match &param.value {
            CoreValue::Stream(stream) => {
                let bytes = stream.read_all().await?;
                if param.is_binary() {
                    CoreValue::String(STANDARD.encode(bytes))
                } else {
                    CoreValue::String(String::from_utf8(bytes).map_err(Error::stream_drain)?)
                }
            }
            CoreValue::Bytes(bytes) => CoreValue::String(STANDARD.encode(bytes)),
            value => value.clone(),
        };

        Ok(Value(value))
    }

    /// Converts a SQLite value within a row to a core value.
    pub fn from_sql(row: &Row<'_>, index: usize) -> rusqlite::Result<Self> {
        let value = match row.get_ref(index)? {
            ValueRef::Null => CoreValue::Null,
            ValueRef::Integer(value) => CoreValue::I64(value),
            ValueRef::Real(value) => CoreValue::Double(value),
            ValueRef::Text(value) => CoreValue::String(String::from_utf8_lossy(value).into_owned()),
            ValueRef::Blob(value) => CoreValue::Bytes(value.to_vec()),
        };

        Ok(Value(value))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use cqn_core::stmt::Value;

        match &self.0 {
            Value::Bool(true) => Ok(ToSqlOutput::Owned(SqlValue::Integer(1))),
            Value::Bool(false) => Ok(ToSqlOutput::Owned(SqlValue::Integer(0))),
            Value::I64(v) => Ok(ToSqlOutput::Owned(SqlValue::Integer(*v))),
            Value::Double(v) => Ok(ToSqlOutput::Owned(SqlValue::Real(*v))),
            Value::Decimal(v) | Value::String(v) | Value::Regex(v) => {
                Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())))
            }
            Value::Bytes(v) => Ok(ToSqlOutput::Owned(SqlValue::Text(STANDARD.encode(v)))),
            Value::Null => Ok(ToSqlOutput::Owned(SqlValue::Null)),
            value => Err(rusqlite::Error::ToSqlConversionFailure(
                format!("value cannot be bound as a parameter: {value:?}").into(),
            )),
        }
    }
}
