use std::time::Duration;

use ragweed_core::RagweedError;

use crate::cql;

/// Configuration for a [`CassandraDocumentStore`](crate::CassandraDocumentStore).
///
/// Immutable after construction; pointing at a different table or changing
/// the dimensionality requires a new store instance. The similarity
/// function is fixed to cosine.
#[derive(Debug, Clone)]
pub struct CassandraConfig {
    /// Cluster contact points as `host:port` pairs
    /// (e.g. `["127.0.0.1:9042"]`).
    pub contact_points: Vec<String>,
    /// Keyspace holding the document table.
    pub keyspace: String,
    /// Table name to store documents in.
    pub table: String,
    /// Vector dimensionality (must match your embedding model).
    pub embedding_dim: usize,
    /// Optional username for authentication.
    pub username: Option<String>,
    /// Optional password for authentication.
    pub password: Option<String>,
    /// Replication factor used when the keyspace is created.
    pub replication_factor: u32,
    /// Driver connection timeout.
    pub connect_timeout: Duration,
}

impl CassandraConfig {
    /// Create a new configuration with required fields.
    pub fn new(
        contact_points: Vec<impl Into<String>>,
        keyspace: impl Into<String>,
        table: impl Into<String>,
        embedding_dim: usize,
    ) -> Self {
        Self {
            contact_points: contact_points.into_iter().map(Into::into).collect(),
            keyspace: keyspace.into(),
            table: table.into(),
            embedding_dim,
            username: None,
            password: None,
            replication_factor: 1,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set authentication credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the replication factor used when creating the keyspace.
    pub fn with_replication_factor(mut self, replication_factor: u32) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Set the driver connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validate the configuration once, at store construction.
    ///
    /// Keyspace and table names are interpolated into CQL text, so they
    /// are restricted to identifier characters.
    pub(crate) fn validate(&self) -> Result<(), RagweedError> {
        if self.contact_points.is_empty() {
            return Err(RagweedError::Validation(
                "at least one contact point is required".to_string(),
            ));
        }
        if self.embedding_dim == 0 {
            return Err(RagweedError::Validation(
                "embedding_dim must be greater than zero".to_string(),
            ));
        }
        for (what, name) in [("keyspace", &self.keyspace), ("table", &self.table)] {
            if !cql::is_valid_identifier(name) {
                return Err(RagweedError::Validation(format!(
                    "invalid {what} name '{name}': only alphanumeric and underscore characters are allowed",
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_defaults() {
        let config = CassandraConfig::new(vec!["127.0.0.1:9042"], "ragweed", "documents", 1024);
        assert_eq!(config.contact_points, vec!["127.0.0.1:9042"]);
        assert_eq!(config.keyspace, "ragweed");
        assert_eq!(config.table, "documents");
        assert_eq!(config.embedding_dim, 1024);
        assert!(config.username.is_none());
        assert_eq!(config.replication_factor, 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn builder_chain() {
        let config = CassandraConfig::new(vec!["cass1:9042", "cass2:9042"], "ks", "docs", 768)
            .with_credentials("user", "secret")
            .with_replication_factor(3)
            .with_connect_timeout(Duration::from_secs(5));
        assert_eq!(config.contact_points.len(), 2);
        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.replication_factor, 3);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn validate_accepts_sane_config() {
        let config = CassandraConfig::new(vec!["127.0.0.1:9042"], "ks_1", "docs_2024", 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_identifiers() {
        let config = CassandraConfig::new(vec!["h:9042"], "ks; DROP KEYSPACE x", "docs", 64);
        assert!(config.validate().is_err());

        let config = CassandraConfig::new(vec!["h:9042"], "ks", "docs'--", 64);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_contact_points_and_zero_dim() {
        let config = CassandraConfig::new(Vec::<String>::new(), "ks", "docs", 64);
        assert!(config.validate().is_err());

        let config = CassandraConfig::new(vec!["h:9042"], "ks", "docs", 0);
        assert!(config.validate().is_err());
    }
}
