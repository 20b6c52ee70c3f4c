use crate::{Error, Result};

use std::str::FromStr;

/// Semantic type of a stored element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Uuid,
    Boolean,
    Integer,
    Int64,
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Double,
    Date,
    Time,
    DateTime,
    Timestamp,
    String {
        length: Option<u32>,
    },
    LargeString,
    Binary {
        length: Option<u32>,
    },
    LargeBinary,
    /// Structured value stored as serialized JSON text
    Struct,
    /// Array value stored as serialized JSON text
    Array,
}

/// Parameterless type tag used to key the conversion tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Uuid,
    Boolean,
    Integer,
    Int64,
    Decimal,
    Double,
    Date,
    Time,
    DateTime,
    Timestamp,
    String,
    LargeString,
    Binary,
    LargeBinary,
    Struct,
    Array,
    Association,
    Composition,
}

impl Type {
    pub fn string() -> Type {
        Type::String { length: None }
    }

    pub fn decimal() -> Type {
        Type::Decimal {
            precision: None,
            scale: None,
        }
    }

    pub fn binary() -> Type {
        Type::Binary { length: None }
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            Type::Uuid => TypeTag::Uuid,
            Type::Boolean => TypeTag::Boolean,
            Type::Integer => TypeTag::Integer,
            Type::Int64 => TypeTag::Int64,
            Type::Decimal { .. } => TypeTag::Decimal,
            Type::Double => TypeTag::Double,
            Type::Date => TypeTag::Date,
            Type::Time => TypeTag::Time,
            Type::DateTime => TypeTag::DateTime,
            Type::Timestamp => TypeTag::Timestamp,
            Type::String { .. } => TypeTag::String,
            Type::LargeString => TypeTag::LargeString,
            Type::Binary { .. } => TypeTag::Binary,
            Type::LargeBinary => TypeTag::LargeBinary,
            Type::Struct => TypeTag::Struct,
            Type::Array => TypeTag::Array,
        }
    }

    /// True for types whose payload is raw bytes.
    pub fn is_binary(&self) -> bool {
        matches!(self, Type::Binary { .. } | Type::LargeBinary)
    }
}

impl FromStr for Type {
    type Err = Error;

    /// Parses a CDS builtin type name such as `cds.Decimal` or `Timestamp`.
    fn from_str(s: &str) -> Result<Type> {
        let name = s.strip_prefix("cds.").unwrap_or(s);

        Ok(match name {
            "UUID" => Type::Uuid,
            "Boolean" => Type::Boolean,
            "Integer" | "Int32" | "Int16" | "UInt8" => Type::Integer,
            "Int64" => Type::Int64,
            "Decimal" => Type::decimal(),
            "Double" => Type::Double,
            "Date" => Type::Date,
            "Time" => Type::Time,
            "DateTime" => Type::DateTime,
            "Timestamp" => Type::Timestamp,
            "String" => Type::string(),
            "LargeString" => Type::LargeString,
            "Binary" => Type::binary(),
            "LargeBinary" => Type::LargeBinary,
            "Map" | "struct" => Type::Struct,
            "array" => Type::Array,
            _ => return Err(Error::invalid_statement(format!("Not supported type: {s}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_builtin_names() {
        assert_eq!("cds.Boolean".parse::<Type>().unwrap(), Type::Boolean);
        assert_eq!("Timestamp".parse::<Type>().unwrap(), Type::Timestamp);
        assert_eq!("cds.Decimal".parse::<Type>().unwrap().tag(), TypeTag::Decimal);
    }

    #[test]
    fn parse_unknown_name() {
        let err = "cds.DoEsNoTeXiSt".parse::<Type>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid statement: Not supported type: cds.DoEsNoTeXiSt"
        );
    }
}
