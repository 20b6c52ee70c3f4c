use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use rusqlite::{
    functions::{Context, FunctionFlags},
    types::ValueRef,
    Connection as RusqliteConnection,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Variables visible to SQL through `session_context('<name>')`.
pub(crate) type SessionContext = Arc<Mutex<HashMap<String, String>>>;

/// Registers `session_context`, `regexp` and `ISO` on `connection`.
pub(crate) fn register(
    connection: &RusqliteConnection,
    session: SessionContext,
) -> rusqlite::Result<()> {
    connection.create_scalar_function(
        "session_context",
        1,
        FunctionFlags::SQLITE_UTF8,
        move |ctx| {
            let key: String = ctx.get(0)?;
            let session = session
                .lock()
                .map_err(|_| user_error("session context lock poisoned"))?;
            Ok(session.get(&key).cloned())
        },
    )?;

    connection.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        regexp,
    )?;

    connection.create_scalar_function(
        "ISO",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| iso(ctx.get_raw(0)).map_err(user_error),
    )?;

    Ok(())
}

/// `regexp(pattern, text)`: 1 when `text` matches, 0 when it does not and
/// NULL when either argument is NULL.
fn regexp(ctx: &Context<'_>) -> rusqlite::Result<Option<bool>> {
    if matches!(ctx.get_raw(0), ValueRef::Null) {
        return Ok(None);
    }

    let text = match ctx.get_raw(1) {
        ValueRef::Null => return Ok(None),
        ValueRef::Text(text) | ValueRef::Blob(text) => String::from_utf8_lossy(text).into_owned(),
        ValueRef::Integer(value) => value.to_string(),
        ValueRef::Real(value) => value.to_string(),
    };

    // The compiled pattern is cached for as long as the argument is constant
    let re = ctx.get_or_create_aux(0, |pattern| -> Result<Regex, BoxError> {
        Ok(Regex::new(pattern.as_str()?)?)
    })?;

    Ok(Some(re.is_match(&text)))
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn user_error(message: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(message.into().into())
}

/// Canonicalizes a date/time value to UTC ISO 8601 with millisecond
/// precision, e.g. `2020-01-01T08:00:00.000Z`. Empty text is passed
/// through unchanged.
fn iso(value: ValueRef<'_>) -> Result<Option<String>, String> {
    let datetime = match value {
        ValueRef::Null => return Ok(None),
        ValueRef::Text(b"") => return Ok(Some(String::new())),
        ValueRef::Integer(millis) => DateTime::from_timestamp_millis(millis),
        ValueRef::Real(millis) => DateTime::from_timestamp_millis(millis as i64),
        ValueRef::Text(text) => std::str::from_utf8(text).ok().and_then(parse_datetime),
        ValueRef::Blob(_) => None,
    };

    match datetime {
        Some(datetime) => Ok(Some(
            datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        )),
        None => Err(match value {
            ValueRef::Text(text) => format!(
                "invalid date/time value: `{}`",
                String::from_utf8_lossy(text)
            ),
            value => format!("invalid date/time value: {value:?}"),
        }),
    }
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.to_utc());
    }

    if let Ok(datetime) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(datetime.to_utc());
    }

    // Date/time without an offset is taken as UTC
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}
