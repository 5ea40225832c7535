//! `PostgreSQL` implementation of the `PartitionStore` trait.

use async_trait::async_trait;
use chronicle_core::error::RecorderError;
use chronicle_core::store::{
    Attributes, Direction, PageToken, PartitionStore, StoreError, StorePage, StoreQuery,
    StoreRecord,
};
use chronicle_store::StoreConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

const DEFAULT_ENDPOINT: &str = "postgres://localhost:5432/chronicle";
const DEFAULT_PAGE_SIZE: usize = 100;

/// PostgreSQL-backed partition store.
///
/// Records live in one table with a composite primary key on
/// `(partition_key, sort_key)`; attribute maps are persisted as JSONB.
/// Conditional puts ride on `ON CONFLICT DO NOTHING`, and range queries use
/// keyset pagination over the sort key.
#[derive(Debug, Clone)]
pub struct PgPartitionStore {
    pool: PgPool,
    table: String,
}

impl PgPartitionStore {
    /// Creates a store over an existing pool. The table identifier comes
    /// from the validated `config`.
    #[must_use]
    pub fn new(pool: PgPool, config: &StoreConfig) -> Self {
        Self {
            pool,
            table: config.store.clone(),
        }
    }

    /// Connects to the endpoint named by `config` (or the default local
    /// endpoint) and creates the records table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Access`] if the connection or the schema
    /// statement fails.
    pub async fn connect(config: &StoreConfig) -> Result<Self, RecorderError> {
        let endpoint = config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(endpoint)
            .await
            .map_err(|err| RecorderError::Access {
                store: config.store.clone(),
                message: err.to_string(),
            })?;
        let store = Self::new(pool, config);
        sqlx::query(&crate::schema::create_records_table(&store.table))
            .execute(&store.pool)
            .await
            .map_err(|err| RecorderError::Access {
                store: store.table.clone(),
                message: err.to_string(),
            })?;
        Ok(store)
    }

    fn unavailable(&self, context: &str, message: String) -> StoreError {
        tracing::error!(store = %self.table, context, message = %message, "store unavailable");
        StoreError::Unavailable {
            store: self.table.clone(),
            message,
        }
    }

    fn encode_attributes(&self, record: &StoreRecord) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(&record.attributes)
            .map_err(|err| self.unavailable("encode attributes", err.to_string()))
    }

    fn decode_row(&self, row: &sqlx::postgres::PgRow) -> Result<StoreRecord, StoreError> {
        let partition_key: String = row
            .try_get("partition_key")
            .map_err(|err| self.unavailable("decode row", err.to_string()))?;
        let sort_key: i64 = row
            .try_get("sort_key")
            .map_err(|err| self.unavailable("decode row", err.to_string()))?;
        let attributes: serde_json::Value = row
            .try_get("attributes")
            .map_err(|err| self.unavailable("decode row", err.to_string()))?;
        let attributes: Attributes = serde_json::from_value(attributes)
            .map_err(|err| self.unavailable("decode attributes", err.to_string()))?;
        Ok(StoreRecord {
            partition_key,
            sort_key,
            attributes,
        })
    }
}

#[async_trait]
impl PartitionStore for PgPartitionStore {
    fn store_id(&self) -> &str {
        &self.table
    }

    async fn conditional_put(&self, record: StoreRecord) -> Result<(), StoreError> {
        let attributes = self.encode_attributes(&record)?;
        let sql = format!(
            "INSERT INTO {} (partition_key, sort_key, attributes) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(&record.partition_key)
            .bind(record.sort_key)
            .bind(attributes)
            .execute(&self.pool)
            .await
            .map_err(|err| self.unavailable("conditional put", err.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                partition_key: record.partition_key,
                sort_key: record.sort_key,
            });
        }
        Ok(())
    }

    async fn batch_put(&self, records: Vec<StoreRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut encoded = Vec::with_capacity(records.len());
        for record in &records {
            encoded.push(self.encode_attributes(record)?);
        }
        // One multi-row statement: any item failure (including a key
        // collision) aborts the whole batch rather than dropping the item.
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} (partition_key, sort_key, attributes) ",
            self.table
        ));
        builder.push_values(records.iter().zip(encoded), |mut row, (record, attributes)| {
            row.push_bind(&record.partition_key)
                .push_bind(record.sort_key)
                .push_bind(attributes);
        });
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|err| self.unavailable("batch put", err.to_string()))?;
        Ok(())
    }

    async fn query(&self, query: StoreQuery) -> Result<StorePage, StoreError> {
        let page_size = query
            .limit
            .map_or(DEFAULT_PAGE_SIZE, |limit| limit.min(DEFAULT_PAGE_SIZE));

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT partition_key, sort_key, attributes FROM {} WHERE partition_key = ",
            self.table
        ));
        builder.push_bind(&query.partition_key);
        if let Some(gt) = query.range.gt {
            builder.push(" AND sort_key > ").push_bind(gt);
        }
        if let Some(lte) = query.range.lte {
            builder.push(" AND sort_key <= ").push_bind(lte);
        }
        if let Some(token) = query.start {
            match query.direction {
                Direction::Ascending => builder.push(" AND sort_key > "),
                Direction::Descending => builder.push(" AND sort_key < "),
            };
            builder.push_bind(token.last_sort_key);
        }
        match query.direction {
            Direction::Ascending => builder.push(" ORDER BY sort_key ASC"),
            Direction::Descending => builder.push(" ORDER BY sort_key DESC"),
        };
        // Fetch one extra row to learn whether another page exists.
        let fetch = i64::try_from(page_size + 1)
            .map_err(|err| self.unavailable("query", err.to_string()))?;
        builder.push(" LIMIT ").push_bind(fetch);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|err| self.unavailable("query", err.to_string()))?;

        let has_more = rows.len() > page_size;
        let mut records = Vec::with_capacity(rows.len().min(page_size));
        for row in rows.iter().take(page_size) {
            records.push(self.decode_row(row)?);
        }
        let next = if has_more {
            records.last().map(|record| PageToken {
                last_sort_key: record.sort_key,
            })
        } else {
            None
        };
        Ok(StorePage { records, next })
    }
}
