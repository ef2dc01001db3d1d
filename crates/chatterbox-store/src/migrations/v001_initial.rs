//! v001 -- Initial schema creation.
//!
//! One table per value shape: scalar values, set members and sorted-set
//! members.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Scalar values (user records, email index)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS kv (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Sets (friends, memberships, pending requests)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS set_members (
    key    TEXT NOT NULL,
    member TEXT NOT NULL,

    PRIMARY KEY (key, member)
);

-- ----------------------------------------------------------------
-- Sorted sets (message logs)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sorted_set_members (
    seq    INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order, breaks score ties
    key    TEXT NOT NULL,
    member TEXT NOT NULL,
    score  INTEGER NOT NULL,

    UNIQUE (key, member)
);

CREATE INDEX IF NOT EXISTS idx_sorted_set_key_score
    ON sorted_set_members(key, score, seq);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
