use super::{Expr, Record};

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub entity: String,

    pub filter: Option<Expr>,

    /// Values to assign, possibly containing nested association data
    pub data: Record,

    /// Assignments computed from expressions, e.g. `stock = stock - 1`
    pub with: Vec<(String, Expr)>,
}

impl Update {
    pub fn entity(entity: impl Into<String>) -> Self {
        Update {
            entity: entity.into(),
            filter: None,
            data: Record::default(),
            with: vec![],
        }
    }

    pub fn data(mut self, data: Record) -> Self {
        self.data = data;
        self
    }

    pub fn set(mut self, element: impl Into<String>, expr: Expr) -> Self {
        self.with.push((element.into(), expr));
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(Expr::and_opt(self.filter.take(), expr));
        self
    }
}
