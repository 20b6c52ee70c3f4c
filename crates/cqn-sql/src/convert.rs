//! Per-type SQL conversion tables.
//!
//! Input converters wrap a bound value before it is written to a column.
//! Output converters wrap a column before it is read back, so that every
//! row value comes out in its canonical textual or JSON form. Lookups are
//! explicit: a tag missing from a table has no converter.

use cqn_core::schema::{Type, TypeTag};

/// Wraps the SQL fragment `e` in a conversion expression.
pub type Converter = fn(&str) -> String;

pub const INPUT_CONVERTERS: &[(TypeTag, Converter)] = &[
    (TypeTag::Date, |e| format!("strftime('%Y-%m-%d',{e})")),
    (TypeTag::Time, |e| format!("strftime('%H:%M:%S',{e})")),
    (TypeTag::DateTime, |e| format!("ISO({e})")),
    (TypeTag::Timestamp, |e| format!("ISO({e})")),
];

pub const OUTPUT_CONVERTERS: &[(TypeTag, Converter)] = &[
    (TypeTag::Struct, |e| format!("{e}->'$'")),
    (TypeTag::Array, |e| format!("{e}->'$'")),
    (TypeTag::Association, |e| format!("{e}->'$'")),
    (TypeTag::Composition, |e| format!("{e}->'$'")),
    (TypeTag::Boolean, |e| {
        format!("CASE {e} when 1 then 'true' when 0 then 'false' END ->'$'")
    }),
    // Second precision, 20 characters including the trailing `Z`
    (TypeTag::DateTime, |e| format!("substr({e},0,20)||'Z'")),
    // Millisecond precision
    (TypeTag::Timestamp, |e| format!("ISO({e})")),
    // Stored as text, so every digit written is read back
    (TypeTag::Decimal, |e| format!("CAST({e} as TEXT)")),
    (TypeTag::Double, |e| format!("nullif(quote({e}),'NULL')->'$'")),
    (TypeTag::Int64, |e| format!("CAST({e} as TEXT)")),
    (TypeTag::Binary, |e| format!("{e} || ''")),
];

fn lookup(table: &[(TypeTag, Converter)], tag: TypeTag) -> Option<Converter> {
    table
        .iter()
        .find(|(entry, _)| *entry == tag)
        .map(|(_, converter)| *converter)
}

pub fn input_converter(tag: TypeTag) -> Option<Converter> {
    lookup(INPUT_CONVERTERS, tag)
}

pub fn output_converter(tag: TypeTag) -> Option<Converter> {
    lookup(OUTPUT_CONVERTERS, tag)
}

/// Applies the input converter of `tag` to `e`, if there is one.
pub fn convert_input(tag: TypeTag, e: &str) -> String {
    match input_converter(tag) {
        Some(converter) => converter(e),
        None => e.to_string(),
    }
}

/// Applies the output converter of `tag` to `e`, if there is one.
pub fn convert_output(tag: TypeTag, e: &str) -> String {
    match output_converter(tag) {
        Some(converter) => converter(e),
        None => e.to_string(),
    }
}

/// The storage type used for `ty` in `CREATE TABLE`.
///
/// Date, time and decimal types map to dedicated `*_TEXT` names so the
/// engine gives them text affinity and keeps their strings untouched. A
/// numeric affinity would round decimals to 15 significant digits.
pub fn storage_type(ty: &Type) -> String {
    match ty {
        Type::Uuid => "NVARCHAR(36)".to_string(),
        Type::Boolean => "BOOLEAN".to_string(),
        Type::Integer => "INTEGER".to_string(),
        Type::Int64 => "BIGINT".to_string(),
        Type::Decimal {
            precision: Some(precision),
            scale,
        } => format!("DECIMAL_TEXT({precision},{})", scale.unwrap_or(0)),
        Type::Decimal { .. } => "DECIMAL_TEXT".to_string(),
        Type::Double => "DOUBLE".to_string(),
        Type::String { length } => format!("NVARCHAR({})", length.unwrap_or(5000)),
        Type::LargeString => "NCLOB".to_string(),
        Type::Binary { length } => format!("BINARY_BLOB({})", length.unwrap_or(5000)),
        Type::LargeBinary => "BLOB".to_string(),
        Type::Date => "DATE_TEXT".to_string(),
        Type::Time => "TIME_TEXT".to_string(),
        Type::DateTime => "DATETIME_TEXT".to_string(),
        Type::Timestamp => "TIMESTAMP_TEXT".to_string(),
        Type::Struct | Type::Array => "NCLOB".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_converters() {
        assert_eq!(
            convert_input(TypeTag::Date, "?1"),
            "strftime('%Y-%m-%d',?1)"
        );
        assert_eq!(convert_input(TypeTag::Timestamp, "?1"), "ISO(?1)");
        assert_eq!(convert_input(TypeTag::String, "?1"), "?1");
        assert!(input_converter(TypeTag::Boolean).is_none());
    }

    #[test]
    fn output_converters() {
        assert_eq!(
            convert_output(TypeTag::Boolean, "flag"),
            "CASE flag when 1 then 'true' when 0 then 'false' END ->'$'"
        );
        assert_eq!(
            convert_output(TypeTag::DateTime, "modifiedAt"),
            "substr(modifiedAt,0,20)||'Z'"
        );
        assert_eq!(
            convert_output(TypeTag::Decimal, "price"),
            "CAST(price as TEXT)"
        );
        assert_eq!(convert_output(TypeTag::Int64, "n"), "CAST(n as TEXT)");
        assert_eq!(convert_output(TypeTag::Uuid, "ID"), "ID");
    }

    #[test]
    fn storage_types() {
        assert_eq!(storage_type(&Type::Uuid), "NVARCHAR(36)");
        assert_eq!(storage_type(&Type::string()), "NVARCHAR(5000)");
        assert_eq!(
            storage_type(&Type::String { length: Some(111) }),
            "NVARCHAR(111)"
        );
        assert_eq!(storage_type(&Type::binary()), "BINARY_BLOB(5000)");
        assert_eq!(
            storage_type(&Type::Decimal {
                precision: Some(10),
                scale: Some(3)
            }),
            "DECIMAL_TEXT(10,3)"
        );
        assert_eq!(storage_type(&Type::decimal()), "DECIMAL_TEXT");
        assert_eq!(storage_type(&Type::Timestamp), "TIMESTAMP_TEXT");
    }
}
