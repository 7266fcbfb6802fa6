//! CQL statement building and filter translation.
//!
//! Everything here is pure string assembly so it can be tested without a
//! cluster. Keyspace and table names are validated identifiers (see
//! [`is_valid_identifier`]); filter values are escaped by quote doubling.

use ragweed_core::{Condition, Filter};

pub(crate) const DOCUMENT_COLUMNS: &str = "id, content, meta, embedding";

/// True when `name` is safe to interpolate as a keyspace or table name:
/// non-empty, starts with a letter or underscore, and contains only
/// alphanumeric ASCII characters and underscores.
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render a text value as a single-quoted CQL literal.
pub(crate) fn quote_text(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn map_access(field: &str) -> String {
    format!("meta[{}]", quote_text(field))
}

fn condition_to_cql(condition: &Condition) -> String {
    match condition {
        Condition::Eq { field, value } => format!("{} = {}", map_access(field), quote_text(value)),
        Condition::Gt { field, value } => format!("{} > {}", map_access(field), quote_text(value)),
        Condition::Gte { field, value } => {
            format!("{} >= {}", map_access(field), quote_text(value))
        }
        Condition::Lt { field, value } => format!("{} < {}", map_access(field), quote_text(value)),
        Condition::Lte { field, value } => {
            format!("{} <= {}", map_access(field), quote_text(value))
        }
        Condition::In { field, values } => {
            let list = values
                .iter()
                .map(|v| quote_text(v))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} IN ({})", map_access(field), list)
        }
    }
}

/// Translate a filter into a CQL `WHERE` body (without the keyword).
/// Returns `None` for an absent or empty filter.
pub(crate) fn where_clause(filter: Option<&Filter>) -> Option<String> {
    let filter = filter.filter(|f| !f.is_empty())?;
    Some(
        filter
            .conditions
            .iter()
            .map(condition_to_cql)
            .collect::<Vec<_>>()
            .join(" AND "),
    )
}

pub(crate) fn create_keyspace(keyspace: &str, replication_factor: u32) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH replication = \
         {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
    )
}

pub(crate) fn create_table(keyspace: &str, table: &str, dim: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.{table} (\
         id text PRIMARY KEY, \
         content text, \
         meta map<text, text>, \
         embedding vector<float, {dim}>)"
    )
}

/// SAI index over the embedding column; the similarity function is fixed
/// to cosine.
pub(crate) fn create_vector_index(keyspace: &str, table: &str) -> String {
    format!(
        "CREATE CUSTOM INDEX IF NOT EXISTS {table}_embedding_ann ON {keyspace}.{table} (embedding) \
         USING 'sai' WITH OPTIONS = {{'similarity_function': 'cosine'}}"
    )
}

/// SAI index over metadata entries so filters work on the ANN path, where
/// `ALLOW FILTERING` is not accepted.
pub(crate) fn create_meta_index(keyspace: &str, table: &str) -> String {
    format!(
        "CREATE CUSTOM INDEX IF NOT EXISTS {table}_meta_entries ON {keyspace}.{table} (ENTRIES(meta)) \
         USING 'sai'"
    )
}

pub(crate) fn insert_document(keyspace: &str, table: &str, if_not_exists: bool) -> String {
    let mut statement = format!(
        "INSERT INTO {keyspace}.{table} ({DOCUMENT_COLUMNS}) VALUES (?, ?, ?, ?)"
    );
    if if_not_exists {
        statement.push_str(" IF NOT EXISTS");
    }
    statement
}

pub(crate) fn select_by_id(keyspace: &str, table: &str) -> String {
    format!("SELECT {DOCUMENT_COLUMNS} FROM {keyspace}.{table} WHERE id = ?")
}

pub(crate) fn select_id(keyspace: &str, table: &str) -> String {
    format!("SELECT id FROM {keyspace}.{table} WHERE id = ?")
}

/// Full scan, optionally narrowed by a filter. Scans over non-key columns
/// need `ALLOW FILTERING`.
pub(crate) fn select_documents(keyspace: &str, table: &str, filter: Option<&Filter>) -> String {
    match where_clause(filter) {
        Some(clause) => format!(
            "SELECT {DOCUMENT_COLUMNS} FROM {keyspace}.{table} WHERE {clause} ALLOW FILTERING"
        ),
        None => format!("SELECT {DOCUMENT_COLUMNS} FROM {keyspace}.{table}"),
    }
}

/// Id-only variant of [`select_documents`], used to count filter deletes.
pub(crate) fn select_ids(keyspace: &str, table: &str, filter: Option<&Filter>) -> String {
    match where_clause(filter) {
        Some(clause) => {
            format!("SELECT id FROM {keyspace}.{table} WHERE {clause} ALLOW FILTERING")
        }
        None => format!("SELECT id FROM {keyspace}.{table}"),
    }
}

/// ANN query ordered by cosine similarity, with the score as a fifth
/// column. Binds the query vector twice: once for the score projection and
/// once for the `ANN OF` ordering.
pub(crate) fn ann_select(
    keyspace: &str,
    table: &str,
    filter: Option<&Filter>,
    top_k: usize,
) -> String {
    let where_part = match where_clause(filter) {
        Some(clause) => format!(" WHERE {clause}"),
        None => String::new(),
    };
    format!(
        "SELECT {DOCUMENT_COLUMNS}, similarity_cosine(embedding, ?) FROM {keyspace}.{table}\
         {where_part} ORDER BY embedding ANN OF ? LIMIT {top_k}"
    )
}

pub(crate) fn delete_by_id(keyspace: &str, table: &str) -> String {
    format!("DELETE FROM {keyspace}.{table} WHERE id = ?")
}

pub(crate) fn truncate(keyspace: &str, table: &str) -> String {
    format!("TRUNCATE {keyspace}.{table}")
}

pub(crate) fn count(keyspace: &str, table: &str) -> String {
    format!("SELECT COUNT(*) FROM {keyspace}.{table}")
}

/// Statement used to look up the embedding column's declared type in
/// `system_schema`, for the dimensionality conflict check.
pub(crate) const SELECT_EMBEDDING_TYPE: &str = "SELECT type FROM system_schema.columns \
     WHERE keyspace_name = ? AND table_name = ? AND column_name = 'embedding'";

/// Parse the dimensionality out of a `vector<float, N>` type string as it
/// appears in `system_schema.columns`.
pub(crate) fn vector_dim_from_type(type_string: &str) -> Option<usize> {
    let inner = type_string
        .trim()
        .strip_prefix("vector<")?
        .strip_suffix('>')?;
    let (element, dim) = inner.split_once(',')?;
    if element.trim() != "float" {
        return None;
    }
    dim.trim().parse().ok()
}
