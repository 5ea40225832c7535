//! Partition store database schema.

/// SQL to create the records table.
///
/// The table identifier is interpolated, not bound; it has been validated
/// against `[A-Za-z_][A-Za-z0-9_]*` by `StoreConfig`.
#[must_use]
pub fn create_records_table(table: &str) -> String {
    format!(
        r"
CREATE TABLE IF NOT EXISTS {table} (
    partition_key TEXT NOT NULL,
    sort_key      BIGINT NOT NULL,
    attributes    JSONB NOT NULL,
    PRIMARY KEY (partition_key, sort_key)
);
"
    )
}
