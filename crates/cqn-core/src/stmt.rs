mod ddl;
pub use ddl::{CreateTable, DropTable};

mod delete;
pub use delete::Delete;

mod expr;
pub use expr::{BinaryOp, Expr, ExprBinaryOp, ExprFunc, ExprInList, ExprLike, ExprRef, XprToken};

mod insert;
pub use insert::Insert;

mod record;
pub use record::Record;

mod select;
pub use select::{Column, Direction, Join, JoinKind, Limit, OrderBy, Select, Source, SourceEntity};

mod update;
pub use update::Update;

mod value;
pub use value::Value;

mod value_stream;
pub use value_stream::ValueStream;

/// A query or data-modification command.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    CreateTable(CreateTable),
    DropTable(DropTable),
}

impl Statement {
    /// Name of the entity the statement reads from or writes to, when it has one.
    pub fn target(&self) -> Option<&str> {
        match self {
            Statement::Select(select) => select.from.entity_name(),
            Statement::Insert(insert) => Some(&insert.into),
            Statement::Update(update) => Some(&update.entity),
            Statement::Delete(delete) => Some(&delete.from),
            Statement::CreateTable(create) => Some(&create.entity),
            Statement::DropTable(drop) => Some(&drop.entity),
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self, Statement::Select(_))
    }
}

impl From<Select> for Statement {
    fn from(value: Select) -> Self {
        Statement::Select(value)
    }
}

impl From<Insert> for Statement {
    fn from(value: Insert) -> Self {
        Statement::Insert(value)
    }
}

impl From<Update> for Statement {
    fn from(value: Update) -> Self {
        Statement::Update(value)
    }
}

impl From<Delete> for Statement {
    fn from(value: Delete) -> Self {
        Statement::Delete(value)
    }
}

impl From<CreateTable> for Statement {
    fn from(value: CreateTable) -> Self {
        Statement::CreateTable(value)
    }
}

impl From<DropTable> for Statement {
    fn from(value: DropTable) -> Self {
        Statement::DropTable(value)
    }
}
