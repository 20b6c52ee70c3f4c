use super::Expr;

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    /// Entity to delete from
    pub from: String,

    /// Rows to delete; all rows when `None`
    pub filter: Option<Expr>,
}

impl Delete {
    pub fn from(entity: impl Into<String>) -> Self {
        Delete {
            from: entity.into(),
            filter: None,
        }
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(Expr::and_opt(self.filter.take(), expr));
        self
    }
}
