use super::{Formatter, ToSql};
use crate::reserved;

use cqn_core::Result;

/// An identifier, double-quoted when it is a keyword or not a plain name.
pub(super) struct Ident<S>(pub(super) S);

/// A single-quoted string literal.
pub(super) struct Literal<S>(pub(super) S);

pub(super) fn needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();

    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    !plain || reserved::is_reserved(name)
}

impl<S: AsRef<str>> ToSql for Ident<S> {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let name = self.0.as_ref();

        if needs_quotes(name) {
            f.dst.push('"');
            f.dst.push_str(&name.replace('"', "\"\""));
            f.dst.push('"');
        } else {
            f.dst.push_str(name);
        }

        Ok(())
    }
}

impl<S: AsRef<str>> ToSql for Literal<S> {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        f.dst.push('\'');
        f.dst.push_str(&self.0.as_ref().replace('\'', "''"));
        f.dst.push('\'');
        Ok(())
    }
}
