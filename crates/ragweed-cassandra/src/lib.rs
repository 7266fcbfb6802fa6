//! Apache Cassandra / ScyllaDB document store for Ragweed.
//!
//! This crate provides [`CassandraDocumentStore`], an implementation of the
//! [`DocumentStore`](ragweed_core::DocumentStore) trait backed by a
//! Cassandra-compatible cluster with storage-attached-index (SAI) vector
//! search. Documents live in a single table:
//!
//! - `id text PRIMARY KEY`
//! - `content text`
//! - `meta map<text, text>`
//! - `embedding vector<float, D>`
//!
//! ANN queries, indexing, replication, and consistency are all handled by
//! the database; this crate only maps documents to rows and filters to CQL.
//!
//! # Example
//!
//! ```rust,no_run
//! use ragweed_cassandra::{CassandraConfig, CassandraDocumentStore};
//! use ragweed_core::{Document, DocumentStore, DuplicatePolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CassandraConfig::new(vec!["127.0.0.1:9042"], "ragweed", "documents", 1024);
//! let store = CassandraDocumentStore::connect(config).await?;
//! store.ensure_schema().await?;
//!
//! let doc = Document::new("1", "Hello world").with_embedding(vec![0.1; 1024]);
//! store.write_documents(vec![doc], DuplicatePolicy::Overwrite).await?;
//! let hits = store.query_by_embedding(&[0.1; 1024], 1, None).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod cql;
mod document_store;

pub use config::CassandraConfig;
pub use document_store::CassandraDocumentStore;

// Re-export the driver session types for callers that share a session.
pub use scylla::client::session::Session;
pub use scylla::client::session_builder::SessionBuilder;
