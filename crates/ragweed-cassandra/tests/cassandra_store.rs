use ragweed_cassandra::{CassandraConfig, CassandraDocumentStore};
use ragweed_core::DocumentStore;

#[test]
fn config_new_sets_fields() {
    let config = CassandraConfig::new(vec!["127.0.0.1:9042"], "ragweed", "documents", 1024);
    assert_eq!(config.keyspace, "ragweed");
    assert_eq!(config.table, "documents");
    assert_eq!(config.embedding_dim, 1024);
}

#[tokio::test]
async fn connect_validates_config_before_dialing() {
    // Invalid identifiers must be rejected locally, without a cluster.
    let config = CassandraConfig::new(vec!["127.0.0.1:9042"], "bad keyspace", "documents", 8);
    let err = CassandraDocumentStore::connect(config).await.unwrap_err();
    assert!(matches!(err, ragweed_core::RagweedError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Integration tests — require a running Cassandra 5+ / vector-capable
// cluster. Contact points come from CASSANDRA_CONTACT_POINTS
// (default 127.0.0.1:9042). Run with:
//   cargo test -p ragweed-cassandra -- --ignored
// ---------------------------------------------------------------------------

mod integration {
    use super::*;
    use futures::TryStreamExt;
    use ragweed_core::{Document, DuplicatePolicy, Filter, RagweedError};

    const DIM: usize = 8;

    async fn setup_store(table: &str) -> CassandraDocumentStore {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let contact_points = std::env::var("CASSANDRA_CONTACT_POINTS")
            .unwrap_or_else(|_| "127.0.0.1:9042".to_string());
        let points: Vec<String> = contact_points.split(',').map(str::to_string).collect();

        let config = CassandraConfig::new(points, "ragweed_test", table, DIM);
        let store = CassandraDocumentStore::connect(config)
            .await
            .expect("failed to connect to Cassandra");
        store.ensure_schema().await.expect("failed to ensure schema");
        store.clear().await.expect("failed to clear table");
        store
    }

    fn doc(id: &str, content: &str, axis: usize) -> Document {
        let mut embedding = vec![0.0; DIM];
        embedding[axis] = 1.0;
        Document::new(id, content).with_embedding(embedding)
    }

    #[tokio::test]
    #[ignore = "requires running Cassandra with vector search"]
    async fn write_then_fetch_round_trip() {
        let store = setup_store("round_trip").await;

        let original = doc("1", "Hello world", 0).with_meta("lang", "en");
        store
            .write_documents(vec![original.clone()], DuplicatePolicy::Overwrite)
            .await
            .unwrap();

        let fetched = store.get_document_by_id("1").await.unwrap();
        assert_eq!(fetched, original);
        assert_eq!(store.count_documents().await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "requires running Cassandra with vector search"]
    async fn ann_query_orders_by_similarity() {
        let store = setup_store("ann_query").await;
        store
            .write_documents(
                vec![doc("a", "first axis", 0), doc("b", "second axis", 1)],
                DuplicatePolicy::Overwrite,
            )
            .await
            .unwrap();

        let mut query = vec![0.0; DIM];
        query[0] = 1.0;
        let scored = store
            .query_by_embedding_with_score(&query, 2, None)
            .await
            .unwrap();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].0.id, "a");
        assert!(scored[0].1 >= scored[1].1);

        let top_one = store.query_by_embedding(&query, 1, None).await.unwrap();
        assert_eq!(top_one.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires running Cassandra with vector search"]
    async fn dimension_mismatch_is_rejected() {
        let store = setup_store("dim_check").await;

        let bad = Document::new("short", "wrong shape").with_embedding(vec![0.0; DIM - 1]);
        let err = store
            .write_documents(vec![bad], DuplicatePolicy::Overwrite)
            .await
            .unwrap_err();
        assert!(matches!(err, RagweedError::Validation(_)));

        let err = store
            .query_by_embedding(&vec![0.0; DIM + 1], 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RagweedError::Validation(_)));
    }

    #[tokio::test]
    #[ignore = "requires running Cassandra with vector search"]
    async fn schema_conflict_on_different_dimensionality() {
        let store = setup_store("schema_conflict").await;

        let mut config = store.config().clone();
        config.embedding_dim = DIM + 1;
        let conflicting =
            CassandraDocumentStore::with_session(store.session().clone(), config).unwrap();

        let err = conflicting.ensure_schema().await.unwrap_err();
        assert!(matches!(err, RagweedError::Schema(_)));
    }

    #[tokio::test]
    #[ignore = "requires running Cassandra with vector search"]
    async fn filtered_scan_and_delete() {
        let store = setup_store("filters").await;
        store
            .write_documents(
                vec![
                    doc("1", "systems text", 0).with_meta("genre", "systems"),
                    doc("2", "food text", 1).with_meta("genre", "food"),
                    doc("3", "more systems", 2).with_meta("genre", "systems"),
                ],
                DuplicatePolicy::Overwrite,
            )
            .await
            .unwrap();

        let filter = Filter::new().eq("genre", "systems");
        let matching: Vec<Document> = store
            .get_all_documents(Some(filter.clone()))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(matching.len(), 2);

        assert_eq!(store.delete_by_filter(&filter).await.unwrap(), 2);
        assert_eq!(store.count_documents().await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "requires running Cassandra with vector search"]
    async fn duplicate_policy_and_delete_counts() {
        let store = setup_store("duplicates").await;
        store
            .write_documents(vec![doc("1", "original", 0)], DuplicatePolicy::Fail)
            .await
            .unwrap();

        let err = store
            .write_documents(vec![doc("1", "imposter", 1)], DuplicatePolicy::Fail)
            .await
            .unwrap_err();
        assert!(matches!(err, RagweedError::Duplicate(_)));

        // Overwrite replaces silently.
        store
            .write_documents(vec![doc("1", "replacement", 1)], DuplicatePolicy::Overwrite)
            .await
            .unwrap();
        let fetched = store.get_document_by_id("1").await.unwrap();
        assert_eq!(fetched.content, "replacement");

        // Deleting a missing id counts zero, not an error.
        assert_eq!(store.delete_documents(&["ghost"]).await.unwrap(), 0);
        assert_eq!(store.delete_documents(&["1", "ghost"]).await.unwrap(), 1);
        let err = store.get_document_by_id("1").await.unwrap_err();
        assert!(matches!(err, RagweedError::NotFound(_)));
    }
}
