//! v001 -- Initial schema creation.
//!
//! Creates the five core tables: `users`, `requests`, `chats`,
//! `chat_history`, and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    user_id       INTEGER PRIMARY KEY NOT NULL, -- platform snowflake
    display_name  TEXT NOT NULL,
    total_chats   INTEGER NOT NULL DEFAULT 0,
    total_minutes INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL                 -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Requests
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS requests (
    request_id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id             INTEGER NOT NULL,       -- FK -> users(user_id)
    group_id            INTEGER NOT NULL,       -- originating community group
    topic               TEXT NOT NULL,
    description         TEXT,
    is_public           INTEGER NOT NULL DEFAULT 1,  -- boolean 0/1
    status              TEXT NOT NULL DEFAULT 'pending',
    created_at          TEXT NOT NULL,
    announce_channel_id INTEGER,                -- public announcement post,
    announce_message_id INTEGER,                -- set after the fact

    FOREIGN KEY (user_id) REFERENCES users(user_id)
);

-- At most one pending request per user, enforced at the store level.
CREATE UNIQUE INDEX IF NOT EXISTS idx_requests_one_pending
    ON requests(user_id) WHERE status = 'pending';

CREATE INDEX IF NOT EXISTS idx_requests_status_created
    ON requests(status, created_at DESC);

-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    chat_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    requester_id INTEGER NOT NULL,              -- FK -> users(user_id)
    accepter_id  INTEGER NOT NULL,              -- FK -> users(user_id)
    request_id   INTEGER NOT NULL,              -- FK -> requests(request_id)
    group_id     INTEGER NOT NULL,
    topic        TEXT NOT NULL,                 -- copied from the request
    status       TEXT NOT NULL DEFAULT 'active',
    started_at   TEXT NOT NULL,
    ended_at     TEXT,                          -- null while active

    FOREIGN KEY (requester_id) REFERENCES users(user_id),
    FOREIGN KEY (accepter_id)  REFERENCES users(user_id),
    FOREIGN KEY (request_id)   REFERENCES requests(request_id)
);

-- At most one active chat per user in either role.
CREATE UNIQUE INDEX IF NOT EXISTS idx_chats_active_requester
    ON chats(requester_id) WHERE status = 'active';
CREATE UNIQUE INDEX IF NOT EXISTS idx_chats_active_accepter
    ON chats(accepter_id) WHERE status = 'active';

-- ----------------------------------------------------------------
-- Chat history (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_history (
    history_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id          INTEGER NOT NULL,          -- FK -> chats(chat_id)
    requester_id     INTEGER NOT NULL,
    accepter_id      INTEGER NOT NULL,
    group_id         INTEGER NOT NULL,
    topic            TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    started_at       TEXT NOT NULL,
    ended_at         TEXT NOT NULL,

    FOREIGN KEY (chat_id) REFERENCES chats(chat_id)
);

CREATE INDEX IF NOT EXISTS idx_history_requester ON chat_history(requester_id);
CREATE INDEX IF NOT EXISTS idx_history_accepter  ON chat_history(accepter_id);

-- ----------------------------------------------------------------
-- Messages (append-only ledger)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    message_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id        INTEGER NOT NULL,            -- FK -> chats(chat_id)
    sender_id      INTEGER NOT NULL,            -- FK -> users(user_id)
    content        TEXT NOT NULL DEFAULT '',    -- empty if attachment-only
    has_attachment INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    sent_at        TEXT NOT NULL,

    FOREIGN KEY (chat_id)   REFERENCES chats(chat_id),
    FOREIGN KEY (sender_id) REFERENCES users(user_id)
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
    ON messages(chat_id, sent_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
