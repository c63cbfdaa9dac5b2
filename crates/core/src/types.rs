/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The `pre_id` value marking the head of a sibling chain.
pub const CHAIN_HEAD: DbId = 0;
