use cqn::{
    schema::{Association, Model, Type},
    stmt::{Column, Delete, Direction, Expr, Insert, Record, Select, Update, Value},
    Outcome, Service, Session, SqliteConfig, StreamOutput,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn model() -> Arc<Model> {
    let model = Model::builder()
        .entity("RootUUID", |e| {
            e.key("ID", Type::Uuid)
                .element("name", Type::string())
                .association(
                    "toOneChild",
                    Association::to_one("ChildUUID")
                        .composition()
                        .keys_on_source([("toOneChild_ID", "ID")]),
                )
        })
        .entity("ChildUUID", |e| {
            e.key("ID", Type::Uuid)
                .element("text", Type::string())
                .association(
                    "toManySubChild",
                    Association::to_many("SubChildUUID")
                        .composition()
                        .keys_on_target([("backlink_ID", "ID")]),
                )
        })
        .entity("SubChildUUID", |e| {
            e.key("ID", Type::Uuid)
                .element("text", Type::string())
                .element("backlink_ID", Type::Uuid)
        })
        .entity("Books", |e| {
            e.key("ID", Type::Integer)
                .element("title", Type::string())
                .element(
                    "price",
                    Type::Decimal {
                        precision: Some(16),
                        scale: Some(3),
                    },
                )
                .element("stock", Type::Int64)
                .element("cover", Type::binary())
        })
        .build()
        .unwrap();

    Arc::new(model)
}

async fn deployed(service: &Service) -> Session {
    let session = service.session(None).await.unwrap();
    session.deploy().await.unwrap();
    session
}

async fn rows(session: &Session, select: Select) -> Vec<Record> {
    session.run(select).await.unwrap().into_rows().unwrap()
}

async fn count(session: &Session, entity: &str) -> usize {
    rows(session, Select::from(entity)).await.len()
}

fn deep_root() -> Insert {
    Insert::into("RootUUID").entry(
        Record::new().with("ID", "root-1").with("name", "root").with(
            "toOneChild",
            Record::new().with("text", "abc").with(
                "toManySubChild",
                vec![
                    Record::new().with("text", "a"),
                    Record::new().with("text", "b"),
                ],
            ),
        ),
    )
}

fn by_id(id: &str) -> Expr {
    Expr::eq(Expr::ref_("ID"), Expr::val(id))
}

#[tokio::test]
async fn deep_insert_generates_keys_and_backlinks() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;

    let outcome = session.run(deep_root()).await.unwrap();
    assert_eq!(outcome, Outcome::Changes(1));

    let roots = rows(&session, Select::from("RootUUID")).await;
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["name"], Value::from("root"));

    let child_id = roots[0]["toOneChild_ID"].as_str().unwrap().to_string();
    assert_eq!(child_id.len(), 36);

    let children = rows(&session, Select::from("ChildUUID")).await;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["ID"], Value::from(&child_id));
    assert_eq!(children[0]["text"], Value::from("abc"));

    let sub_children = rows(
        &session,
        Select::from("SubChildUUID")
            .columns(["text"])
            .filter(Expr::eq(Expr::ref_("backlink_ID"), Expr::val(&child_id)))
            .order_by(Expr::ref_("text"), None),
    )
    .await;
    assert_eq!(
        sub_children,
        [
            Record::new().with("text", "a"),
            Record::new().with("text", "b"),
        ]
    );
}

#[tokio::test]
async fn update_to_null_deletes_the_composition() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;
    session.run(deep_root()).await.unwrap();

    let outcome = session
        .run(Update::entity("RootUUID").data(
            Record::new()
                .with("ID", "root-1")
                .with("toOneChild", Value::Null),
        ))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Changes(1));

    assert_eq!(count(&session, "ChildUUID").await, 0);
    assert_eq!(count(&session, "SubChildUUID").await, 0);

    let roots = rows(&session, Select::from("RootUUID")).await;
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["name"], Value::from("root"));
    assert_eq!(roots[0]["toOneChild_ID"], Value::Null);
}

#[tokio::test]
async fn update_replaces_the_composition() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;
    session.run(deep_root()).await.unwrap();

    let old_child = rows(&session, Select::from("ChildUUID")).await.remove(0);

    session
        .run(
            Update::entity("RootUUID")
                .data(Record::new().with("toOneChild", Record::new().with("text", "new")))
                .filter(by_id("root-1")),
        )
        .await
        .unwrap();

    let children = rows(&session, Select::from("ChildUUID")).await;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["text"], Value::from("new"));
    assert_ne!(children[0]["ID"], old_child["ID"]);
    assert_eq!(count(&session, "SubChildUUID").await, 0);

    let root = rows(&session, Select::from("RootUUID")).await.remove(0);
    assert_eq!(root["toOneChild_ID"], children[0]["ID"]);
}

#[tokio::test]
async fn flat_update_writes_own_columns() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;
    session
        .run(Insert::into("Books").entries([
            Record::new().with("ID", 1).with("title", "Wuthering Heights"),
            Record::new().with("ID", 2).with("title", "Jane Eyre"),
        ]))
        .await
        .unwrap();

    let outcome = session
        .run(
            Update::entity("Books")
                .data(Record::new().with("title", "Catweazle"))
                .filter(Expr::eq(Expr::ref_("ID"), Expr::val(2))),
        )
        .await
        .unwrap();
    assert_eq!(outcome.changes(), Some(1));

    let titles = rows(
        &session,
        Select::from("Books")
            .columns(["title"])
            .order_by(Expr::ref_("ID"), None),
    )
    .await;
    assert_eq!(
        titles,
        [
            Record::new().with("title", "Wuthering Heights"),
            Record::new().with("title", "Catweazle"),
        ]
    );
}

#[tokio::test]
async fn duplicate_insert_is_normalized() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;
    session.run(deep_root()).await.unwrap();

    let err = session.run(deep_root()).await.unwrap_err();
    assert!(err.is_unique_constraint());
    assert_eq!(err.domain_code(), Some("ENTITY_ALREADY_EXISTS"));
    assert_eq!(err.http_status(), Some(400));
    assert!(err
        .original_message()
        .unwrap()
        .contains("UNIQUE constraint failed"));
}

#[tokio::test]
async fn duplicate_child_on_update_is_normalized() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;

    session
        .run(Insert::into("ChildUUID").entries([
            Record::new()
                .with("ID", "c1")
                .with("toManySubChild", vec![Record::new().with("ID", "s1")]),
            Record::new()
                .with("ID", "c2")
                .with("toManySubChild", vec![Record::new().with("ID", "s2")]),
        ]))
        .await
        .unwrap();
    assert_eq!(count(&session, "SubChildUUID").await, 2);

    let err = session
        .run(
            Update::entity("ChildUUID")
                .data(Record::new().with(
                    "toManySubChild",
                    vec![Record::new().with("ID", "s2").with("text", "x")],
                ))
                .filter(by_id("c1")),
        )
        .await
        .unwrap_err();

    assert_eq!(err.domain_code(), Some("UNIQUE_CONSTRAINT_VIOLATION"));
    assert_eq!(err.http_status(), Some(400));
}

#[tokio::test]
async fn delete_cascades_through_compositions() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;
    session.run(deep_root()).await.unwrap();
    session
        .run(Insert::into("RootUUID").entry(Record::new().with("ID", "root-2")))
        .await
        .unwrap();

    let outcome = session
        .run(Delete::from("RootUUID").filter(by_id("root-1")))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Changes(1));

    assert_eq!(count(&session, "RootUUID").await, 1);
    assert_eq!(count(&session, "ChildUUID").await, 0);
    assert_eq!(count(&session, "SubChildUUID").await, 0);
}

#[tokio::test]
async fn select_restores_decimals_integers_and_binaries() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;

    session
        .run(
            Insert::into("Books").entry(
                Record::new()
                    .with("ID", 1)
                    .with("price", Value::Decimal("1234.5".to_string()))
                    .with("stock", 9_007_199_254_740_993_i64)
                    .with("cover", vec![1u8, 2, 3]),
            ),
        )
        .await
        .unwrap();

    let book = rows(
        &session,
        Select::from("Books")
            .columns(["price", "stock", "cover"])
            .one(),
    )
    .await
    .remove(0);

    assert_eq!(book["price"], Value::Decimal("1234.5".to_string()));
    assert_eq!(book["stock"], Value::I64(9_007_199_254_740_993));
    assert_eq!(book["cover"], Value::Bytes(vec![1, 2, 3]));
}

#[tokio::test]
async fn decimals_keep_every_digit_and_compare_by_value() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;

    let decimal = |text: &str| Value::Decimal(text.to_string());
    session
        .run(
            Insert::into("Books")
                .entry(Record::new().with("ID", 1).with("price", decimal("9999999999999.999")))
                .entry(Record::new().with("ID", 2).with("price", decimal("9.5")))
                .entry(Record::new().with("ID", 3).with("price", decimal("10"))),
        )
        .await
        .unwrap();

    let books = rows(
        &session,
        Select::from("Books")
            .columns(["ID", "price"])
            .filter(Expr::gt(Expr::ref_("price"), Expr::val(decimal("9.75"))))
            .order_by(Expr::ref_("price"), Some(Direction::Desc)),
    )
    .await;

    let prices: Vec<_> = books.iter().map(|book| book["price"].clone()).collect();
    assert_eq!(prices, [decimal("9999999999999.999"), decimal("10")]);
}

#[tokio::test]
async fn one_without_match_returns_no_rows() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;

    let found = rows(
        &session,
        Select::from("Books")
            .filter(Expr::eq(Expr::ref_("ID"), Expr::val(42)))
            .one(),
    )
    .await;
    assert!(found.is_empty());
}

#[tokio::test]
async fn stream_reads_binary_columns() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;
    session
        .run(Insert::into("Books").entry(Record::new().with("ID", 1).with("cover", vec![7u8; 64])))
        .await
        .unwrap();

    let output = session
        .stream(
            Select::from("Books")
                .column("cover")
                .filter(Expr::eq(Expr::ref_("ID"), Expr::val(1))),
            true,
        )
        .await
        .unwrap();
    assert_eq!(&output.into_bytes().await.unwrap().unwrap()[..], &[7u8; 64][..]);

    let output = session
        .stream(
            Select::from("Books")
                .column("cover")
                .filter(Expr::eq(Expr::ref_("ID"), Expr::val(2))),
            true,
        )
        .await
        .unwrap();
    assert!(matches!(output, StreamOutput::NoContent));
}

#[tokio::test]
async fn session_variables_are_visible_to_sql() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let session = deployed(&service).await;
    session
        .run(Insert::into("Books").entry(Record::new().with("ID", 1)))
        .await
        .unwrap();

    session.set([("$user.id", "alice")]).unwrap();

    let row = rows(
        &session,
        Select::from("Books")
            .column(Column::new(Expr::ref_("$user.id")).alias("user"))
            .column(Column::new(Expr::ref_("$now")).alias("now")),
    )
    .await
    .remove(0);

    assert_eq!(row["user"], Value::from("alice"));
    assert!(row["now"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn released_session_rejects_work() {
    let service = Service::new(SqliteConfig::in_memory(), model());
    let mut session = deployed(&service).await;

    session.release();
    assert!(session.is_released());

    let err = session.set([("$user.id", "alice")]).unwrap_err();
    assert!(err.to_string().contains("cannot set session context"));

    assert!(session.run(Select::from("Books")).await.is_err());
}

#[tokio::test]
async fn tenants_get_their_own_databases() {
    let dir = tempfile::tempdir().unwrap();
    let service = Service::new(SqliteConfig::file(dir.path().join("db.sqlite")), model());

    let t1 = service.session(Some("t1")).await.unwrap();
    t1.deploy().await.unwrap();
    t1.run(Insert::into("Books").entry(Record::new().with("ID", 1)))
        .await
        .unwrap();

    let t2 = service.session(Some("t2")).await.unwrap();
    t2.deploy().await.unwrap();

    assert_eq!(count(&t1, "Books").await, 1);
    assert_eq!(count(&t2, "Books").await, 0);
    assert!(dir.path().join("db-t1.sqlite").exists());
    assert!(dir.path().join("db-t2.sqlite").exists());

    t2.run(Insert::into("Books").entry(Record::new().with("ID", 1)))
        .await
        .unwrap();
    let row = rows(
        &t2,
        Select::from("Books").column(Column::new(Expr::ref_("$tenant")).alias("tenant")),
    )
    .await
    .remove(0);
    assert_eq!(row["tenant"], Value::from("t2"));
}
