use crate::{deep, keys, Event};

use async_recursion::async_recursion;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cqn_core::{
    err,
    schema::{Element, Entity, ForeignKeySide, Model, Type},
    stmt::{CreateTable, Delete, DropTable, Expr, Insert, Record, Select, Statement, Update, Value},
    Error, Result, WriteKind,
};
use cqn_driver_sqlite::{Pool, PoolConnection, RunResult, SqliteConfig, StreamOutput};
use cqn_sql::{CompiledStatement, Compiler, OutputColumn};
use indexmap::IndexMap;
use std::{collections::HashMap, mem, sync::Arc};
use tokio::sync::Mutex;

/// A SQLite-backed CQN service.
///
/// Holds the model and one connection pool per tenant database. Pools are
/// created on first use.
#[derive(Debug)]
pub struct Service {
    config: SqliteConfig,
    model: Arc<Model>,
    pools: Mutex<HashMap<Option<String>, Pool>>,
}

/// Result of [`Session::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rows read by a SELECT
    Rows(Vec<Record>),

    /// Number of rows written to the statement's target entity
    Changes(u64),
}

/// One logical unit of work on a pooled connection.
///
/// Session variables set on the session are visible to SQL through
/// `session_context`. They are cleared when the session is released.
#[derive(Debug)]
pub struct Session {
    model: Arc<Model>,
    connection: Option<PoolConnection>,
}

impl Service {
    pub fn new(config: SqliteConfig, model: Arc<Model>) -> Service {
        Service {
            config,
            model,
            pools: Mutex::new(HashMap::new()),
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Acquires a connection to `tenant`'s database, or to the shared
    /// database when no tenant is given.
    ///
    /// `$now` (and `$tenant`, when given) are set on the new session.
    pub async fn session(&self, tenant: Option<&str>) -> Result<Session> {
        let pool = self.pool(tenant).await?;
        let connection = pool.get().await?;

        let now = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        connection.set([("$now", now)])?;
        if let Some(tenant) = tenant {
            connection.set([("$tenant", tenant)])?;
        }

        Ok(Session {
            model: self.model.clone(),
            connection: Some(connection),
        })
    }

    async fn pool(&self, tenant: Option<&str>) -> Result<Pool> {
        let mut pools = self.pools.lock().await;
        let key = tenant.map(str::to_string);

        if let Some(pool) = pools.get(&key) {
            return Ok(pool.clone());
        }

        let pool = Pool::for_tenant(&self.config, tenant)?;
        pools.insert(key, pool.clone());
        Ok(pool)
    }
}

impl Outcome {
    pub fn into_rows(self) -> Result<Vec<Record>> {
        match self {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Changes(_) => Err(err!("statement did not return rows")),
        }
    }

    pub fn changes(&self) -> Option<u64> {
        match self {
            Outcome::Changes(changes) => Some(*changes),
            Outcome::Rows(_) => None,
        }
    }
}

impl Session {
    /// Merges `variables` into the session context.
    pub fn set<K, V>(&self, variables: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.connection()
            .map_err(|e| e.context(err!("cannot set session context")))?
            .set(variables)
    }

    /// Returns the connection to its pool. Any later use of the session
    /// fails.
    pub fn release(&mut self) {
        self.connection = None;
    }

    pub fn is_released(&self) -> bool {
        self.connection.is_none()
    }

    /// (Re)creates the tables of all entities.
    pub async fn deploy(&self) -> Result<()> {
        for entity in self.model.entities.values() {
            self.run(DropTable::new(entity.name.clone())).await?;
            self.run(CreateTable::new(entity.name.clone())).await?;
        }
        Ok(())
    }

    pub async fn run(&self, stmt: impl Into<Statement>) -> Result<Outcome> {
        let stmt = stmt.into();

        match stmt {
            Statement::Select(select) => Ok(Outcome::Rows(self.query(select).await?)),
            Statement::Insert(insert) => Ok(Outcome::Changes(self.insert(insert).await?)),
            Statement::Update(update) => Ok(Outcome::Changes(self.update(update).await?)),
            Statement::Delete(delete) => Ok(Outcome::Changes(self.delete(delete).await?)),
            stmt @ (Statement::CreateTable(_) | Statement::DropTable(_)) => {
                let compiled = self.compile(&stmt)?;
                self.connection()?.exec(&compiled.sql)?;
                Ok(Outcome::Changes(0))
            }
        }
    }

    /// Streams `select` as compiled, without post-processing.
    pub async fn stream(&self, select: Select, one: bool) -> Result<StreamOutput> {
        let compiled = self.compile(&select.into())?;
        self.connection()?
            .prepare(compiled.sql)?
            .stream(&compiled.params, one)
            .await
    }

    fn connection(&self) -> Result<&PoolConnection> {
        self.connection
            .as_ref()
            .ok_or_else(|| err!("no database connection acquired"))
    }

    fn compile(&self, stmt: &Statement) -> Result<CompiledStatement> {
        Compiler::sqlite(&self.model).compile(stmt)
    }

    async fn execute(&self, stmt: Statement) -> Result<RunResult> {
        let compiled = self.compile(&stmt)?;
        self.connection()?
            .prepare(compiled.sql)?
            .run(&compiled.params)
            .await
    }

    /// Reads rows as JSON objects and restores the values the JSON text
    /// cannot carry: decimals, 64-bit integers and binaries.
    async fn query(&self, mut select: Select) -> Result<Vec<Record>> {
        select.json = true;
        let one = select.one;

        let compiled = self.compile(&select.into())?;
        let output = self
            .connection()?
            .prepare(compiled.sql)?
            .stream(&compiled.params, one)
            .await?;

        let StreamOutput::Json(rows) = output else {
            return Err(err!("query did not produce JSON rows"));
        };
        let bytes = rows.concat().await?;

        // No row matched
        if bytes.is_empty() {
            return Ok(vec![]);
        }

        let payloads = match serde_json::from_slice(&bytes)? {
            serde_json::Value::Array(payloads) if !one => payloads,
            payload if one => vec![payload],
            payload => return Err(err!("unexpected JSON rows: {payload}")),
        };

        payloads
            .into_iter()
            .map(|payload| decode_row(&compiled.columns, payload))
            .collect()
    }

    async fn insert(&self, insert: Insert) -> Result<u64> {
        // Bulk rows and INSERT ... SELECT are written as they are
        if insert.is_bulk() || insert.source.is_some() {
            let result = self
                .execute(insert.into())
                .await
                .map_err(|e| normalize(e, WriteKind::Insert))?;
            return Ok(result.changes);
        }

        let entity = self.model.entity(&insert.into)?;
        let mut data = Value::List(insert.entries.into_iter().map(Value::Record).collect());
        deep::prepare(&self.model, entity, &mut data, Event::Create)?;

        let mut rows = IndexMap::new();
        flatten(&self.model, entity, data, &mut rows)?;

        self.insert_rows(rows, WriteKind::Insert).await
    }

    /// Inserts flattened rows, one statement per entity in insertion order.
    /// Returns the changes of the first entity.
    async fn insert_rows(&self, rows: IndexMap<String, Vec<Record>>, kind: WriteKind) -> Result<u64> {
        let mut changes = None;

        for (entity, records) in rows {
            let result = self
                .execute(Insert::into(entity).entries(records).into())
                .await
                .map_err(|e| normalize(e, kind))?;
            changes.get_or_insert(result.changes);
        }

        Ok(changes.unwrap_or(0))
    }

    async fn update(&self, update: Update) -> Result<u64> {
        let entity = self.model.entity(&update.entity)?;

        let mut data = update.data;
        keys::enrich_from_where(entity, update.filter.as_ref(), &mut data);

        // Without a filter, a payload carrying every key targets that row
        let filter = match update.filter {
            None if entity.keys().all(|key| data.has_value(&key.name)) => {
                Some(key_filter(entity, &data))
            }
            filter => filter,
        };

        let is_deep = entity
            .associations()
            .any(|element| element.is_composition() && data.contains_key(&element.name));

        if !is_deep {
            let mut value = Value::Record(data);
            deep::prepare(&self.model, entity, &mut value, Event::Update)?;
            let data = own_columns(entity, into_record(value)?);
            return self.update_rows(entity, filter, data, update.with).await;
        }

        // Every matching row gets its compositions replaced
        let parents = self.select_keys(entity, filter).await?;
        let mut changes = 0;

        for parent in &parents {
            let mut value = Value::Record(data.clone());
            if let Value::Record(record) = &mut value {
                for key in entity.keys() {
                    if let Some(key_value) = parent.get(&key.name) {
                        record.insert(key.name.clone(), key_value.clone());
                    }
                }
            }

            let deletes = deep::prepare(&self.model, entity, &mut value, Event::Update)?;
            let mut record = into_record(value)?;

            for delete in deletes.iter().filter(|delete| delete.path.len() == 1) {
                let element = entity.expect_element(&delete.element)?;
                self.delete_children(entity, element, parent).await?;
            }

            let mut rows = IndexMap::new();
            for element in entity.associations() {
                if !element.is_composition() {
                    continue;
                }

                let Some(children) = record.get_mut(&element.name).map(mem::take) else {
                    continue;
                };

                if children.is_null() {
                    continue;
                }

                self.delete_children(entity, element, parent).await?;

                let target = self.model.entity(&association(element)?.target)?;
                flatten(&self.model, target, children, &mut rows)?;
            }

            let filter = key_filter(entity, parent);
            changes += self
                .update_rows(entity, Some(filter), own_columns(entity, record), update.with.clone())
                .await?;

            self.insert_rows(rows, WriteKind::Update).await?;
        }

        Ok(changes)
    }

    /// Writes the stored columns of `data` to every row matching `filter`.
    async fn update_rows(
        &self,
        entity: &Entity,
        filter: Option<Expr>,
        data: Record,
        with: Vec<(String, Expr)>,
    ) -> Result<u64> {
        let has_assignments = with.len()
            + data
                .keys()
                .filter(|name| entity.element(name).is_some_and(|element| !element.key))
                .count()
            > 0;

        // Nothing to write besides keys: report the rows the filter matches
        if !has_assignments {
            return Ok(self.select_keys(entity, filter).await?.len() as u64);
        }

        let update = Update {
            entity: entity.name.clone(),
            filter,
            data,
            with,
        };

        let result = self
            .execute(update.into())
            .await
            .map_err(|e| normalize(e, WriteKind::Update))?;
        Ok(result.changes)
    }

    async fn delete(&self, delete: Delete) -> Result<u64> {
        let entity = self.model.entity(&delete.from)?;
        self.delete_where(entity, delete.filter).await
    }

    /// Deletes the rows of `entity` matching `filter`, cascading through
    /// compositions first.
    async fn delete_where(&self, entity: &Entity, filter: Option<Expr>) -> Result<u64> {
        let compositions: Vec<&Element> = entity
            .associations()
            .filter(|element| element.is_composition())
            .collect();

        if !compositions.is_empty() {
            let parents = self.select_keys(entity, filter.clone()).await?;
            for parent in &parents {
                for element in &compositions {
                    self.delete_children(entity, element, parent).await?;
                }
            }
        }

        let delete = Delete {
            from: entity.name.clone(),
            filter,
        };
        Ok(self.execute(delete.into()).await?.changes)
    }

    /// Deletes the children `parent` holds through the composition `element`.
    #[async_recursion]
    async fn delete_children(
        &self,
        entity: &Entity,
        element: &Element,
        parent: &Record,
    ) -> Result<u64> {
        let assoc = association(element)?;
        let target = self.model.entity(&assoc.target)?;

        let mut conjuncts = vec![];
        for field in &assoc.foreign_key.fields {
            let (column, value) = match assoc.foreign_key.side {
                ForeignKeySide::Target => (&field.fk, parent.get(&field.key)),
                ForeignKeySide::Source => (&field.key, parent.get(&field.fk)),
            };

            let Some(value) = value.filter(|value| !value.is_null()) else {
                return Ok(0);
            };

            conjuncts.push(Expr::eq(
                Expr::path([column.as_str()]),
                Expr::val(value.clone()),
            ));
        }

        if conjuncts.is_empty() {
            return Ok(0);
        }

        tracing::debug!(
            entity = %entity.name,
            element = %element.name,
            target = %target.name,
            "deleting composition children"
        );

        self.delete_where(target, Some(Expr::and(conjuncts))).await
    }

    /// Keys of the rows matching `filter`, plus the foreign keys of to-one
    /// compositions stored on the row.
    async fn select_keys(&self, entity: &Entity, filter: Option<Expr>) -> Result<Vec<Record>> {
        let mut columns: Vec<&str> = entity
            .keys()
            .filter(|key| key.primitive().is_some())
            .map(|key| key.name.as_str())
            .collect();

        for element in entity.associations() {
            let Some(assoc) = element.association() else {
                continue;
            };

            if assoc.composition && assoc.foreign_key.side == ForeignKeySide::Source {
                columns.extend(assoc.foreign_key.fields.iter().map(|field| field.fk.as_str()));
            }
        }

        let mut select = Select::from(entity.name.clone()).columns(columns);
        select.filter = filter;
        self.query(select).await
    }
}

fn association(element: &Element) -> Result<&cqn_core::schema::Association> {
    element.association().ok_or_else(|| {
        Error::invalid_statement(format!("`{}` is not an association", element.name))
    })
}

fn into_record(value: Value) -> Result<Record> {
    match value {
        Value::Record(record) => Ok(record),
        value => Err(Error::invalid_statement(format!(
            "expected a record; got {value:?}"
        ))),
    }
}

/// The stored-column part of `data`.
fn own_columns(entity: &Entity, data: Record) -> Record {
    data.into_iter()
        .filter(|(name, _)| {
            entity
                .element(name)
                .is_some_and(|element| element.primitive().is_some())
        })
        .collect()
}

/// `key = value AND ...` for the keys of `row`.
fn key_filter(entity: &Entity, row: &Record) -> Expr {
    Expr::and(
        entity
            .keys()
            .filter_map(|key| {
                let value = row.get(&key.name)?;
                Some(Expr::eq(
                    Expr::path([key.name.as_str()]),
                    Expr::val(value.clone()),
                ))
            })
            .collect(),
    )
}

/// Splits deep `data` into per-entity rows, parents before their children.
/// Non-composition association data only contributes foreign keys, which
/// preparation has already copied.
fn flatten(
    model: &Model,
    entity: &Entity,
    data: Value,
    rows: &mut IndexMap<String, Vec<Record>>,
) -> Result<()> {
    match data {
        Value::Null => Ok(()),
        Value::List(items) => {
            for item in items {
                flatten(model, entity, item, rows)?;
            }
            Ok(())
        }
        Value::Record(record) => {
            let mut row = Record::new();
            let mut children = vec![];

            for (name, value) in record {
                let element = entity.expect_element(&name)?;
                match element.association() {
                    None => {
                        row.insert(name, value);
                    }
                    Some(assoc) if assoc.composition => children.push((&assoc.target, value)),
                    Some(_) => {}
                }
            }

            rows.entry(entity.name.clone()).or_default().push(row);

            for (target, value) in children {
                flatten(model, model.entity(target)?, value, rows)?;
            }
            Ok(())
        }
        value => Err(Error::invalid_statement(format!(
            "data for `{}` must be a record or a list of records; got {value:?}",
            entity.name
        ))),
    }
}

fn normalize(err: Error, kind: WriteKind) -> Error {
    let err = err.normalize_unique(kind);

    if err.is_unique_constraint() {
        tracing::warn!(
            code = err.domain_code(),
            original = err.original_message(),
            "unique constraint violation"
        );
    }

    err
}

/// Converts one `_json_` payload into a record, typed by the output columns.
fn decode_row(columns: &[OutputColumn], payload: serde_json::Value) -> Result<Record> {
    let mut record = into_record(Value::from_json(payload))?;

    for column in columns {
        let Some(ty) = &column.ty else {
            continue;
        };

        if let Some(value) = record.get_mut(&column.name) {
            *value = decode_value(ty, mem::take(value));
        }
    }

    Ok(record)
}

fn decode_value(ty: &Type, value: Value) -> Value {
    match (ty, value) {
        (Type::Decimal { .. }, Value::String(text)) => Value::Decimal(text),
        (Type::Decimal { .. }, Value::I64(v)) => Value::Decimal(v.to_string()),
        (Type::Int64, Value::String(text)) => match text.parse() {
            Ok(v) => Value::I64(v),
            Err(_) => Value::String(text),
        },
        (Type::Binary { .. } | Type::LargeBinary, Value::String(text)) => {
            match STANDARD.decode(&text) {
                Ok(bytes) => Value::Bytes(bytes),
                Err(_) => Value::String(text),
            }
        }
        (_, value) => value,
    }
}
