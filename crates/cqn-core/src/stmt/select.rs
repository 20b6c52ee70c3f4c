use super::Expr;
use crate::schema::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub from: Source,

    /// Projection; all columns when empty
    pub columns: Vec<Column>,

    pub distinct: bool,

    /// WHERE clause
    pub filter: Option<Expr>,

    pub group_by: Vec<Expr>,

    pub having: Option<Expr>,

    pub order_by: Vec<OrderBy>,

    pub limit: Option<Limit>,

    /// At most one row is expected
    pub one: bool,

    /// Project each row as a single JSON object column named `_json_`
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Entity(SourceEntity),
    Select { query: Box<Select>, alias: String },
    Join(Box<Join>),
}

/// An entity reference, optionally narrowed by an inline filter
/// (`from: {ref: [{id, where}]}` in CQN).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntity {
    pub name: String,
    pub alias: Option<String>,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub left: Source,
    pub right: Source,
    pub on: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub expr: Expr,
    pub alias: Option<String>,
    pub cast: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub rows: u64,
    pub offset: Option<u64>,
}

impl Select {
    pub fn from(entity: impl Into<String>) -> Select {
        Select::from_source(Source::entity(entity))
    }

    pub fn from_source(from: Source) -> Select {
        Select {
            from,
            columns: vec![],
            distinct: false,
            filter: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
            one: false,
            json: false,
        }
    }

    pub fn column(mut self, column: impl Into<Column>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn columns<C: Into<Column>>(mut self, columns: impl IntoIterator<Item = C>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(Expr::and_opt(self.filter.take(), expr));
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn having(mut self, expr: Expr) -> Self {
        self.having = Some(Expr::and_opt(self.having.take(), expr));
        self
    }

    pub fn order_by(mut self, expr: Expr, direction: Option<Direction>) -> Self {
        self.order_by.push(OrderBy { expr, direction });
        self
    }

    pub fn limit(mut self, rows: u64, offset: Option<u64>) -> Self {
        self.limit = Some(Limit { rows, offset });
        self
    }

    pub fn one(mut self) -> Self {
        self.one = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

impl Source {
    pub fn entity(name: impl Into<String>) -> Source {
        Source::Entity(SourceEntity {
            name: name.into(),
            alias: None,
            filter: None,
        })
    }

    /// Entity source with an inline filter.
    pub fn entity_where(name: impl Into<String>, filter: Expr) -> Source {
        Source::Entity(SourceEntity {
            name: name.into(),
            alias: None,
            filter: Some(filter),
        })
    }

    pub fn select(query: Select, alias: impl Into<String>) -> Source {
        Source::Select {
            query: Box::new(query),
            alias: alias.into(),
        }
    }

    pub fn join(kind: JoinKind, left: Source, right: Source, on: Expr) -> Source {
        Source::Join(Box::new(Join {
            kind,
            left,
            right,
            on,
        }))
    }

    pub fn entity_name(&self) -> Option<&str> {
        match self {
            Source::Entity(entity) => Some(&entity.name),
            _ => None,
        }
    }
}

impl Column {
    pub fn new(expr: Expr) -> Column {
        Column {
            expr,
            alias: None,
            cast: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn cast(mut self, ty: Type) -> Self {
        self.cast = Some(ty);
        self
    }
}

impl From<Expr> for Column {
    fn from(value: Expr) -> Self {
        Column::new(value)
    }
}

impl From<&str> for Column {
    fn from(value: &str) -> Self {
        Column::new(Expr::ref_(value))
    }
}
