use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use ragweed_core::{
    check_dimensions, Document, DocumentStore, DocumentStream, DuplicatePolicy, Filter,
    RagweedError,
};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::response::query_result::QueryResult;
use scylla::value::{CqlValue, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::CassandraConfig;
use crate::cql;

/// Row shape shared by point lookups, scans, and ANN queries.
type DocumentRow = (
    String,
    Option<String>,
    Option<BTreeMap<String, String>>,
    Option<Vec<f32>>,
);

/// A [`DocumentStore`] backed by Apache Cassandra or ScyllaDB.
///
/// Holds one shared driver session for its whole lifetime; concurrent
/// callers rely on the driver's connection pooling. Call
/// [`ensure_schema`](CassandraDocumentStore::ensure_schema) once after
/// construction to create the keyspace, table, and SAI indexes.
#[derive(Debug)]
pub struct CassandraDocumentStore {
    session: Arc<Session>,
    config: CassandraConfig,
}

impl CassandraDocumentStore {
    /// Connect to the cluster described by `config` and verify the
    /// connection with a probe query.
    pub async fn connect(config: CassandraConfig) -> Result<Self, RagweedError> {
        config.validate()?;
        info!(contact_points = ?config.contact_points, "connecting to Cassandra");

        let mut builder = SessionBuilder::new()
            .known_nodes(&config.contact_points)
            .connection_timeout(config.connect_timeout);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.user(username, password);
        }
        let session = builder
            .build()
            .await
            .map_err(|e| RagweedError::Connection(e.to_string()))?;

        session
            .query_unpaged("SELECT release_version FROM system.local", &[])
            .await
            .map_err(|e| RagweedError::Connection(e.to_string()))?;

        info!("connected to Cassandra");
        Ok(Self {
            session: Arc::new(session),
            config,
        })
    }

    /// Build a store on top of an already-established session, so several
    /// stores can share one driver session.
    pub fn with_session(
        session: Arc<Session>,
        config: CassandraConfig,
    ) -> Result<Self, RagweedError> {
        config.validate()?;
        Ok(Self { session, config })
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &CassandraConfig {
        &self.config
    }

    /// Return the shared driver session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Idempotently create the keyspace, document table, and SAI indexes.
    ///
    /// Fails with [`RagweedError::Schema`] when the table already exists
    /// with a different embedding dimensionality, since `CREATE TABLE IF
    /// NOT EXISTS` would otherwise silently keep the old column type.
    pub async fn ensure_schema(&self) -> Result<(), RagweedError> {
        if let Some(existing) = self.existing_embedding_dim().await? {
            if existing != self.config.embedding_dim {
                return Err(RagweedError::Schema(format!(
                    "table {}.{} already stores vector<float, {existing}>, \
                     but the store is configured for {} dimensions",
                    self.config.keyspace, self.config.table, self.config.embedding_dim
                )));
            }
        }

        let statements = [
            cql::create_keyspace(&self.config.keyspace, self.config.replication_factor),
            cql::create_table(
                &self.config.keyspace,
                &self.config.table,
                self.config.embedding_dim,
            ),
            cql::create_vector_index(&self.config.keyspace, &self.config.table),
            cql::create_meta_index(&self.config.keyspace, &self.config.table),
        ];
        for statement in &statements {
            self.session
                .query_unpaged(statement.as_str(), &[])
                .await
                .map_err(|e| RagweedError::Schema(e.to_string()))?;
        }

        info!(
            keyspace = %self.config.keyspace,
            table = %self.config.table,
            dim = self.config.embedding_dim,
            "schema ready"
        );
        Ok(())
    }

    /// Read the declared dimensionality of an existing `embedding` column,
    /// if the table is already present.
    async fn existing_embedding_dim(&self) -> Result<Option<usize>, RagweedError> {
        let result = self
            .session
            .query_unpaged(
                cql::SELECT_EMBEDDING_TYPE,
                (self.config.keyspace.as_str(), self.config.table.as_str()),
            )
            .await
            .map_err(|e| RagweedError::Store(e.to_string()))?;

        let Some((type_string,)) = first_row::<(String,)>(result)? else {
            return Ok(None);
        };
        match cql::vector_dim_from_type(&type_string) {
            Some(dim) => Ok(Some(dim)),
            None => Err(RagweedError::Schema(format!(
                "column 'embedding' of {}.{} has type '{type_string}', expected a float vector",
                self.config.keyspace, self.config.table
            ))),
        }
    }

    /// Collect the ids of all documents matching a filter.
    async fn matching_ids(&self, filter: &Filter) -> Result<Vec<String>, RagweedError> {
        let statement = cql::select_ids(&self.config.keyspace, &self.config.table, Some(filter));
        let pager = self
            .session
            .query_iter(statement, &[])
            .await
            .map_err(|e| RagweedError::Store(e.to_string()))?;
        let mut rows = pager
            .rows_stream::<(String,)>()
            .map_err(|e| RagweedError::Store(e.to_string()))?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await {
            let (id,) = row.map_err(|e| RagweedError::Store(e.to_string()))?;
            ids.push(id);
        }
        Ok(ids)
    }
}

#[async_trait]
impl DocumentStore for CassandraDocumentStore {
    fn embedding_dim(&self) -> usize {
        self.config.embedding_dim
    }

    async fn count_documents(&self) -> Result<u64, RagweedError> {
        let result = self
            .session
            .query_unpaged(cql::count(&self.config.keyspace, &self.config.table), &[])
            .await
            .map_err(|e| RagweedError::Store(e.to_string()))?;
        let count = first_row::<(i64,)>(result)?.map(|(n,)| n).unwrap_or(0);
        Ok(count as u64)
    }

    async fn write_documents(
        &self,
        docs: Vec<Document>,
        policy: DuplicatePolicy,
    ) -> Result<usize, RagweedError> {
        // Validate the whole batch before issuing any statement.
        for doc in &docs {
            let embedding = doc.embedding.as_deref().ok_or_else(|| {
                RagweedError::Validation(format!("document '{}' has no embedding", doc.id))
            })?;
            check_dimensions(embedding, self.config.embedding_dim)?;
        }

        let fail_on_duplicate = policy == DuplicatePolicy::Fail;
        let statement = cql::insert_document(
            &self.config.keyspace,
            &self.config.table,
            fail_on_duplicate,
        );

        let mut written = 0;
        for mut doc in docs {
            if doc.id.is_empty() {
                doc.id = Uuid::new_v4().to_string();
            }
            let embedding = doc.embedding.as_ref().ok_or_else(|| {
                RagweedError::Validation(format!("document '{}' has no embedding", doc.id))
            })?;

            let result = self
                .session
                .query_unpaged(
                    statement.as_str(),
                    (&doc.id, &doc.content, &doc.metadata, embedding),
                )
                .await
                .map_err(|e| RagweedError::Store(e.to_string()))?;

            if fail_on_duplicate && !lwt_applied(result)? {
                return Err(RagweedError::Duplicate(doc.id));
            }
            debug!(id = %doc.id, "wrote document");
            written += 1;
        }
        Ok(written)
    }

    async fn get_document_by_id(&self, id: &str) -> Result<Document, RagweedError> {
        let result = self
            .session
            .query_unpaged(
                cql::select_by_id(&self.config.keyspace, &self.config.table),
                (id,),
            )
            .await
            .map_err(|e| RagweedError::Store(e.to_string()))?;

        match first_row::<DocumentRow>(result)? {
            Some(row) => Ok(document_from_row(row)),
            None => Err(RagweedError::NotFound(id.to_string())),
        }
    }

    fn get_all_documents(&self, filter: Option<Filter>) -> DocumentStream<'_> {
        let statement =
            cql::select_documents(&self.config.keyspace, &self.config.table, filter.as_ref());
        Box::pin(async_stream::try_stream! {
            let pager = self
                .session
                .query_iter(statement, &[])
                .await
                .map_err(|e| RagweedError::Store(e.to_string()))?;
            let mut rows = pager
                .rows_stream::<DocumentRow>()
                .map_err(|e| RagweedError::Store(e.to_string()))?;
            while let Some(row) = rows.next().await {
                let row = row.map_err(|e| RagweedError::Store(e.to_string()))?;
                yield document_from_row(row);
            }
        })
    }

    async fn query_by_embedding_with_score(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<(Document, f32)>, RagweedError> {
        check_dimensions(embedding, self.config.embedding_dim)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let statement = cql::ann_select(&self.config.keyspace, &self.config.table, filter, top_k);
        let vector = embedding.to_vec();
        let result = self
            .session
            .query_unpaged(statement, (&vector, &vector))
            .await
            .map_err(|e| RagweedError::Store(e.to_string()))?;

        let rows_result = result
            .into_rows_result()
            .map_err(|e| RagweedError::Store(e.to_string()))?;
        let rows = rows_result
            .rows::<(
                String,
                Option<String>,
                Option<BTreeMap<String, String>>,
                Option<Vec<f32>>,
                Option<f32>,
            )>()
            .map_err(|e| RagweedError::Store(e.to_string()))?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, content, meta, emb, score) =
                row.map_err(|e| RagweedError::Store(e.to_string()))?;
            scored.push((
                document_from_row((id, content, meta, emb)),
                score.unwrap_or(0.0),
            ));
        }
        Ok(scored)
    }

    async fn delete_documents(&self, ids: &[&str]) -> Result<u64, RagweedError> {
        if ids.is_empty() {
            return Ok(0);
        }

        // CQL deletes do not report whether a row existed, so check first
        // to produce an accurate count. Absent ids are not an error.
        let select = cql::select_id(&self.config.keyspace, &self.config.table);
        let delete = cql::delete_by_id(&self.config.keyspace, &self.config.table);

        let mut deleted = 0;
        for id in ids {
            let result = self
                .session
                .query_unpaged(select.as_str(), (*id,))
                .await
                .map_err(|e| RagweedError::Store(e.to_string()))?;
            if first_row::<(String,)>(result)?.is_none() {
                continue;
            }

            self.session
                .query_unpaged(delete.as_str(), (*id,))
                .await
                .map_err(|e| RagweedError::Store(e.to_string()))?;
            debug!(id = %id, "deleted document");
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn delete_by_filter(&self, filter: &Filter) -> Result<u64, RagweedError> {
        let ids = self.matching_ids(filter).await?;
        let delete = cql::delete_by_id(&self.config.keyspace, &self.config.table);
        for id in &ids {
            self.session
                .query_unpaged(delete.as_str(), (id,))
                .await
                .map_err(|e| RagweedError::Store(e.to_string()))?;
        }
        Ok(ids.len() as u64)
    }

    async fn clear(&self) -> Result<(), RagweedError> {
        self.session
            .query_unpaged(
                cql::truncate(&self.config.keyspace, &self.config.table),
                &[],
            )
            .await
            .map_err(|e| RagweedError::Store(e.to_string()))?;
        Ok(())
    }
}

/// Deserialize the first row of a result, or `None` when the result set is
/// empty.
fn first_row<R>(result: QueryResult) -> Result<Option<R>, RagweedError>
where
    R: for<'frame, 'metadata> scylla::deserialize::row::DeserializeRow<'frame, 'metadata>,
{
    let rows_result = result
        .into_rows_result()
        .map_err(|e| RagweedError::Store(e.to_string()))?;
    let mut rows = rows_result
        .rows::<R>()
        .map_err(|e| RagweedError::Store(e.to_string()))?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(RagweedError::Store(e.to_string())),
        None => Ok(None),
    }
}

/// Read the `[applied]` column of a lightweight-transaction result.
fn lwt_applied(result: QueryResult) -> Result<bool, RagweedError> {
    match first_row::<Row>(result)? {
        Some(row) => Ok(matches!(
            row.columns.first(),
            Some(Some(CqlValue::Boolean(true)))
        )),
        None => Ok(true),
    }
}

fn document_from_row((id, content, meta, embedding): DocumentRow) -> Document {
    Document {
        id,
        content: content.unwrap_or_default(),
        metadata: meta.unwrap_or_default(),
        embedding,
    }
}
