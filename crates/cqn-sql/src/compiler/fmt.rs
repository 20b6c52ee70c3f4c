use super::Formatter;

use cqn_core::Result;

macro_rules! fmt {
    ($f:expr, $( $fragments:expr )*) => {{
        $(
            $fragments.to_sql($f)?;
        )*
    }};
}

pub(super) trait ToSql {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()>;
}

impl ToSql for &str {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        f.dst.push_str(self);
        Ok(())
    }
}

impl ToSql for &String {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        f.dst.push_str(self);
        Ok(())
    }
}

impl ToSql for u64 {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        f.dst.push_str(&self.to_string());
        Ok(())
    }
}

impl ToSql for usize {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        (self as u64).to_sql(f)
    }
}

impl<T: ToSql> ToSql for Option<T> {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        match self {
            Some(fragment) => fragment.to_sql(f),
            None => Ok(()),
        }
    }
}
