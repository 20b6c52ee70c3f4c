use cqn_core::{
    schema::{Model, Type, TypeTag},
    stmt::{
        BinaryOp, CreateTable, Delete, DropTable, Expr, Insert, Record, Select, Statement, Update,
        Value,
    },
};
use cqn_sql::{CompiledStatement, Compiler};
use pretty_assertions::assert_eq;

fn model() -> Model {
    Model::builder()
        .entity("Books", |e| {
            e.key("ID", Type::Integer)
                .element("title", Type::String { length: Some(111) })
                .not_null()
                .element("stock", Type::Integer)
                .element("createdAt", Type::Timestamp)
                .element("published", Type::Date)
                .element("meta", Type::Struct)
                .element("cover", Type::binary())
        })
        .entity("Settings", |e| {
            e.key("name", Type::string())
                .element("value", Type::string())
                .default("none")
                .element("enabled", Type::Boolean)
                .default(true)
        })
        .build()
        .unwrap()
}

fn compile(stmt: impl Into<Statement>) -> CompiledStatement {
    let model = model();
    Compiler::sqlite(&model).compile(&stmt.into()).unwrap()
}

#[test]
fn insert_entries() {
    let compiled = compile(
        Insert::into("Books")
            .entry(
                Record::new()
                    .with("ID", 1)
                    .with("title", "Wuthering Heights")
                    .with("createdAt", "2020-01-01T10:00:00.000+02:00"),
            )
            .entry(Record::new().with("ID", 2)),
    );

    assert_eq!(
        compiled.sql,
        "INSERT INTO Books (ID, title, createdAt) VALUES (?1, ?2, ISO(?3)), (?4, NULL, NULL)"
    );

    let tags: Vec<_> = compiled.params.iter().map(|param| param.ty).collect();
    assert_eq!(
        tags,
        [
            Some(TypeTag::Integer),
            Some(TypeTag::String),
            Some(TypeTag::Timestamp),
            Some(TypeTag::Integer),
        ]
    );
}

#[test]
fn insert_fills_defaults() {
    let compiled = compile(Insert::into("Settings").entry(Record::new().with("name", "theme")));

    assert_eq!(
        compiled.sql,
        "INSERT INTO Settings (name, value, enabled) VALUES (?1, ?2, ?3)"
    );
    assert_eq!(compiled.params[1].value, Value::from("none"));
    assert_eq!(compiled.params[2].value, Value::Bool(true));
}

#[test]
fn insert_structured_and_binary_values() {
    let compiled = compile(
        Insert::into("Books").entry(
            Record::new()
                .with("ID", 1)
                .with("meta", Record::new().with("pages", 416))
                .with("cover", vec![1u8, 2, 3]),
        ),
    );

    assert_eq!(
        compiled.sql,
        "INSERT INTO Books (ID, meta, cover) VALUES (?1, ?2, ?3)"
    );
    assert_eq!(compiled.params[1].value, Value::from("{\"pages\":416}"));
    assert!(compiled.params[2].is_binary());
}

#[test]
fn insert_rows_and_dates() {
    let compiled = compile(Insert::into("Books").rows(
        ["ID", "published"],
        vec![
            vec![Value::from(1), Value::from("2020-01-01")],
            vec![Value::from(2), Value::Null],
        ],
    ));

    assert_eq!(
        compiled.sql,
        "INSERT INTO Books (ID, published) VALUES \
         (?1, strftime('%Y-%m-%d',?2)), (?3, NULL)"
    );
}

#[test]
fn insert_as_select() {
    let compiled = compile(
        Insert::into("Books")
            .rows(["ID", "title"], vec![])
            .as_select(Select::from("Books").columns(["ID", "title"])),
    );

    assert_eq!(
        compiled.sql,
        "INSERT INTO Books (ID, title) SELECT ID, title FROM Books"
    );
}

#[test]
fn insert_rejects_unknown_elements_and_bad_rows() {
    let model = model();
    let compiler = Compiler::sqlite(&model);

    let err = compiler
        .compile(&Insert::into("Books").entry(Record::new().with("nope", 1)).into())
        .unwrap_err();
    assert!(err.is_invalid_statement());

    let err = compiler
        .compile(
            &Insert::into("Books")
                .rows(["ID", "title"], vec![vec![Value::from(1)]])
                .into(),
        )
        .unwrap_err();
    assert!(err.is_invalid_statement());

    let err = compiler
        .compile(
            &Insert::into("Books")
                .entry(Record::new().with("ID", 1).with("title", Record::new()))
                .into(),
        )
        .unwrap_err();
    assert!(err.is_invalid_statement());
}

#[test]
fn update_skips_keys() {
    let compiled = compile(
        Update::entity("Books")
            .data(Record::new().with("ID", 1).with("title", "Catweazle"))
            .set(
                "stock",
                Expr::binary_op(Expr::ref_("stock"), BinaryOp::Sub, Expr::val(1)),
            )
            .filter(Expr::eq(Expr::ref_("ID"), Expr::val(1))),
    );

    assert_eq!(
        compiled.sql,
        "UPDATE Books SET title = ?1, stock = stock - ?2 WHERE ID = ?3"
    );
    assert_eq!(compiled.params.len(), 3);
}

#[test]
fn update_without_assignments_fails() {
    let model = model();
    let err = Compiler::sqlite(&model)
        .compile(&Update::entity("Books").data(Record::new().with("ID", 1)).into())
        .unwrap_err();

    assert!(err.is_invalid_statement());
}

#[test]
fn delete() {
    let compiled = compile(Delete::from("Books").filter(Expr::lt(
        Expr::ref_("published"),
        Expr::val("2000-01-01"),
    )));

    assert_eq!(
        compiled.sql,
        "DELETE FROM Books WHERE published < strftime('%Y-%m-%d',?1)"
    );

    let compiled = compile(Delete::from("Books"));
    assert_eq!(compiled.sql, "DELETE FROM Books");
}

#[test]
fn create_table() {
    let compiled = compile(CreateTable::new("Books"));

    assert_eq!(
        compiled.sql,
        "CREATE TABLE Books (\n    \
         ID INTEGER NOT NULL,\n    \
         title NVARCHAR(111) NOT NULL,\n    \
         stock INTEGER,\n    \
         createdAt TIMESTAMP_TEXT,\n    \
         published DATE_TEXT,\n    \
         meta NCLOB,\n    \
         cover BINARY_BLOB(5000),\n    \
         PRIMARY KEY(ID)\n)"
    );

    let compiled = compile(CreateTable::new("Settings"));
    assert_eq!(
        compiled.sql,
        "CREATE TABLE Settings (\n    \
         name NVARCHAR(5000) NOT NULL,\n    \
         value NVARCHAR(5000) DEFAULT 'none',\n    \
         enabled BOOLEAN DEFAULT TRUE,\n    \
         PRIMARY KEY(name)\n)"
    );
}

#[test]
fn drop_table() {
    let compiled = compile(DropTable::new("Books"));
    assert_eq!(compiled.sql, "DROP TABLE IF EXISTS Books");
}
