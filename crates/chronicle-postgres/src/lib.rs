//! Chronicle Postgres — `PostgreSQL` implementation of the partition store.

pub mod pg_partition_store;
pub mod schema;

pub use pg_partition_store::PgPartitionStore;
