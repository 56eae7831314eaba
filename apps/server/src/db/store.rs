//! PostgreSQL-backed `DocumentStore` implementation
//!
//! Documents live in one `documents` table keyed by `(collection, id)`. Unique
//! indexes are enforced through `document_keys`, whose primary key is
//! `(collection, index_name, key)`: a document and all of its keys are written
//! in one transaction, so the second of two racing inserts fails with SQLSTATE
//! 23505 and nothing of it is persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ris_models::{payload::JsonObject, StoreId};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row};
use uuid::Uuid;

use crate::db::filter::array_index;
use crate::db::{
    Document, DocumentStore, FieldPath, Filter, StoreError, StoreResult, UniqueIndex,
};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PostgresDocumentStore {
    pub(crate) pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_indexes(
        conn: &mut PgConnection,
        collection: &str,
    ) -> StoreResult<Vec<UniqueIndex>> {
        let rows = sqlx::query(
            "SELECT definition FROM unique_indexes
             WHERE collection = $1
             ORDER BY name",
        )
        .bind(collection)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx(e, collection, None))?;

        rows.into_iter()
            .map(|row| {
                let definition: JsonValue = row
                    .try_get("definition")
                    .map_err(|e| map_sqlx(e, collection, None))?;
                serde_json::from_value(definition).map_err(|e| {
                    StoreError::Corrupt(format!("unique index definition on {collection}: {e}"))
                })
            })
            .collect()
    }

    async fn insert_keys(
        conn: &mut PgConnection,
        collection: &str,
        index: &UniqueIndex,
        doc_id: Uuid,
        body: &JsonValue,
    ) -> StoreResult<()> {
        for key in index.keys(body) {
            sqlx::query(
                "INSERT INTO document_keys (collection, index_name, key, doc_id)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(collection)
            .bind(&index.name)
            .bind(&key)
            .bind(doc_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx(e, collection, Some(&index.name)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.find_many(collection, filter, 1).await?.into_iter().next())
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        let mut compiled = FilterSql::new(2);
        let predicate = compiled.compile(filter, "d.body");
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        // Note: `predicate` only interpolates placeholders and fixed SQL; values are bound.
        let sql = format!(
            "SELECT d.id, d.body, d.created_at
             FROM documents d
             WHERE d.collection = $1 AND ({predicate})
             ORDER BY d.seq ASC
             LIMIT {limit}"
        );

        let mut query = sqlx::query(&sql).bind(collection);
        for bind in compiled.binds {
            query = bind.apply(query);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, collection, None))?;

        rows.iter()
            .map(|row| row_to_document(row, collection))
            .collect()
    }

    async fn get(&self, collection: &str, id: StoreId) -> StoreResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, body, created_at FROM documents
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx(e, collection, None))?;

        row.as_ref()
            .map(|row| row_to_document(row, collection))
            .transpose()
    }

    async fn insert_one(&self, collection: &str, mut body: JsonObject) -> StoreResult<StoreId> {
        let id = StoreId::new();
        body.insert("id".to_string(), JsonValue::String(id.to_string()));
        let body = JsonValue::Object(body);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx(e, collection, None))?;

        // Shared lock: inserts run concurrently but never overlap an index rebuild.
        sqlx::query("SELECT pg_advisory_xact_lock_shared(hashtext($1))")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx(e, collection, None))?;

        let indexes = Self::load_indexes(&mut *tx, collection).await?;

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(*id.as_uuid())
            .bind(&body)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx(e, collection, None))?;

        for index in &indexes {
            Self::insert_keys(&mut *tx, collection, index, *id.as_uuid(), &body).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx(e, collection, None))?;

        Ok(id)
    }

    async fn ensure_unique_index(
        &self,
        collection: &str,
        index: &UniqueIndex,
    ) -> StoreResult<()> {
        let definition = serde_json::to_value(index)
            .map_err(|e| StoreError::Corrupt(format!("unique index {}: {e}", index.name)))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx(e, collection, None))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx(e, collection, None))?;

        let existing: Option<JsonValue> = sqlx::query_scalar(
            "SELECT definition FROM unique_indexes WHERE collection = $1 AND name = $2",
        )
        .bind(collection)
        .bind(&index.name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx(e, collection, None))?;

        if existing.as_ref() == Some(&definition) {
            tx.commit()
                .await
                .map_err(|e| map_sqlx(e, collection, None))?;
            return Ok(());
        }

        tracing::info!(collection, index = %index.name, "Building unique index");

        sqlx::query(
            "INSERT INTO unique_indexes (collection, name, definition)
             VALUES ($1, $2, $3)
             ON CONFLICT (collection, name) DO UPDATE SET definition = EXCLUDED.definition",
        )
        .bind(collection)
        .bind(&index.name)
        .bind(&definition)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx(e, collection, None))?;

        sqlx::query("DELETE FROM document_keys WHERE collection = $1 AND index_name = $2")
            .bind(collection)
            .bind(&index.name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx(e, collection, None))?;

        let rows = sqlx::query(
            "SELECT id, body FROM documents
             WHERE collection = $1
             ORDER BY seq ASC",
        )
        .bind(collection)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx(e, collection, None))?;

        for row in rows {
            let id: Uuid = row
                .try_get("id")
                .map_err(|e| map_sqlx(e, collection, None))?;
            let body: JsonValue = row
                .try_get("body")
                .map_err(|e| map_sqlx(e, collection, None))?;
            Self::insert_keys(&mut *tx, collection, index, id, &body).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx(e, collection, None))?;

        Ok(())
    }
}

fn row_to_document(row: &PgRow, collection: &str) -> StoreResult<Document> {
    let id: Uuid = row
        .try_get("id")
        .map_err(|e| map_sqlx(e, collection, None))?;
    let body: JsonValue = row
        .try_get("body")
        .map_err(|e| map_sqlx(e, collection, None))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| map_sqlx(e, collection, None))?;

    Ok(Document {
        id: StoreId::from_uuid(id),
        body,
        created_at,
    })
}

fn map_sqlx(err: sqlx::Error, collection: &str, index: Option<&str>) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::UniqueViolation {
                collection: collection.to_string(),
                index: index
                    .or_else(|| db_err.constraint())
                    .unwrap_or("unknown")
                    .to_string(),
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Database(err),
    }
}

enum Bind {
    Text(String),
    Json(JsonValue),
}

impl Bind {
    fn apply<'q>(
        self,
        query: sqlx::query::Query<'q, Postgres, PgArguments>,
    ) -> sqlx::query::Query<'q, Postgres, PgArguments> {
        match self {
            Bind::Text(value) => query.bind(value),
            Bind::Json(value) => query.bind(value),
        }
    }
}

/// Compiles a [`Filter`] into a SQL predicate over a JSONB expression.
///
/// Every leaf becomes an `EXISTS` over `jsonb_path_query`. Lax mode supplies the
/// array fan-out and the non-array-as-singleton indexing that [`Filter::matches`]
/// reproduces in memory.
struct FilterSql {
    binds: Vec<Bind>,
    first_param: usize,
    next_alias: usize,
}

impl FilterSql {
    fn new(first_param: usize) -> Self {
        Self {
            binds: Vec::new(),
            first_param,
            next_alias: 0,
        }
    }

    fn param(&mut self, bind: Bind) -> String {
        self.binds.push(bind);
        format!("${}", self.first_param + self.binds.len() - 1)
    }

    fn alias(&mut self) -> usize {
        self.next_alias += 1;
        self.next_alias
    }

    fn compile(&mut self, filter: &Filter, target: &str) -> String {
        match filter {
            Filter::Eq { path, value } => {
                let path = self.param(Bind::Text(json_path(path)));
                let value = self.param(Bind::Json(value.clone()));
                let m = self.alias();
                format!(
                    "EXISTS (SELECT 1 FROM jsonb_path_query({target}, {path}::jsonpath) AS m{m}(v) \
                     WHERE m{m}.v = {value}::jsonb \
                     OR (jsonb_typeof(m{m}.v) = 'array' AND m{m}.v @> jsonb_build_array({value}::jsonb)))"
                )
            }
            Filter::EndsWith { path, suffix } => {
                let path = self.param(Bind::Text(json_path(path)));
                let pattern = self.param(Bind::Text(format!("%{}", escape_like(suffix))));
                let m = self.alias();
                format!(
                    "EXISTS (SELECT 1 FROM jsonb_path_query({target}, {path}::jsonpath) AS m{m}(v) \
                     WHERE jsonb_typeof(m{m}.v) = 'string' AND (m{m}.v #>> '{{}}') LIKE {pattern} ESCAPE '\\')"
                )
            }
            Filter::ElemMatch { path, filter } => {
                let path = self.param(Bind::Text(json_path(path)));
                let m = self.alias();
                let inner = self.compile(filter, &format!("e{m}.v"));
                format!(
                    "EXISTS (SELECT 1 FROM jsonb_path_query({target}, {path}::jsonpath) AS m{m}(v), \
                     jsonb_array_elements(CASE WHEN jsonb_typeof(m{m}.v) = 'array' \
                     THEN m{m}.v ELSE jsonb_build_array(m{m}.v) END) AS e{m}(v) \
                     WHERE {inner})"
                )
            }
            Filter::And(filters) => self.combine(filters, "AND", "TRUE", target),
            Filter::Or(filters) => self.combine(filters, "OR", "FALSE", target),
        }
    }

    fn combine(&mut self, filters: &[Filter], op: &str, empty: &str, target: &str) -> String {
        if filters.is_empty() {
            return empty.to_string();
        }
        let parts: Vec<String> = filters
            .iter()
            .map(|f| format!("({})", self.compile(f, target)))
            .collect();
        parts.join(&format!(" {op} "))
    }
}

/// `basedOn.0.reference` -> `lax $."basedOn"[0]."reference"`
fn json_path(path: &FieldPath) -> String {
    let mut out = String::from("lax $");
    for segment in path.segments() {
        if let Some(index) = array_index(segment) {
            out.push_str(&format!("[{index}]"));
        } else {
            let escaped = segment.replace('\\', "\\\\").replace('"', "\\\"");
            out.push_str(&format!(".\"{escaped}\""));
        }
    }
    out
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
