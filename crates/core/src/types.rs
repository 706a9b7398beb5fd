/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Match identity, shared with the relational `matches` table.
pub type MatchId = DbId;

/// Player identity, shared with the relational `players` table.
pub type PlayerId = DbId;

/// Opaque identifier of one live client connection.
pub type SessionId = String;
