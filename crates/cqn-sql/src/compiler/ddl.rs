use super::{Comma, Formatter, Ident, ToSql};
use crate::convert;

use cqn_core::{schema::Element, stmt, Result};

impl ToSql for &stmt::CreateTable {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let entity = f.compiler.model.entity(&self.entity)?;

        fmt!(f, "CREATE TABLE " Ident(&entity.name) " (");

        let mut s = "";
        for column in entity.columns() {
            fmt!(f, s "\n    " column);
            s = ",";
        }

        let keys: Vec<_> = entity.keys().map(|key| Ident(&key.name)).collect();
        if !keys.is_empty() {
            fmt!(f, ",\n    PRIMARY KEY(" Comma(keys) ")");
        }

        fmt!(f, "\n)");
        Ok(())
    }
}

impl ToSql for &Element {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let Some(ty) = self.primitive() else {
            return Ok(());
        };

        fmt!(f, Ident(&self.name) " " convert::storage_type(ty));

        if self.not_null {
            fmt!(f, " NOT NULL");
        }

        if let Some(default) = &self.default {
            fmt!(f, " DEFAULT ");
            f.literal(default)?;
        }
        Ok(())
    }
}

impl ToSql for &stmt::DropTable {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        fmt!(f, "DROP TABLE ");
        if self.if_exists {
            fmt!(f, "IF EXISTS ");
        }
        fmt!(f, Ident(&self.entity));
        Ok(())
    }
}
