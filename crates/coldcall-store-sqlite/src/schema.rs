//! SQL schema for the Coldcall SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS scripts (
    script_id                TEXT PRIMARY KEY,
    active                   INTEGER NOT NULL DEFAULT 0,
    target_types             TEXT NOT NULL,    -- JSON array: 'lead' | 'customer'
    questions                TEXT NOT NULL,    -- JSON array of Question
    greeting_text            TEXT NOT NULL,
    closing_text             TEXT NOT NULL,
    max_retries_per_question INTEGER NOT NULL,
    activated_at             TEXT,             -- ISO 8601 UTC
    created_at               TEXT NOT NULL
);

-- One row per dialing attempt. A retry is always a new row; terminal rows
-- are never updated except for the summary/qualification columns.
CREATE TABLE IF NOT EXISTS calls (
    call_id        TEXT PRIMARY KEY,
    target_id      TEXT NOT NULL,
    target_type    TEXT NOT NULL,              -- 'lead' | 'customer'
    customer_name  TEXT NOT NULL,
    phone_number   TEXT NOT NULL,
    script_id      TEXT NOT NULL REFERENCES scripts(script_id),
    status         TEXT NOT NULL DEFAULT 'pending',
    direction      TEXT NOT NULL DEFAULT 'outbound',
    attempt_number INTEGER NOT NULL,
    current_question_index   INTEGER NOT NULL DEFAULT 0,
    current_question_retries INTEGER NOT NULL DEFAULT 0,
    initiated_by   TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    started_at     TEXT,
    ended_at       TEXT,
    total_questions_asked    INTEGER NOT NULL DEFAULT 0,
    total_questions_answered INTEGER NOT NULL DEFAULT 0,
    call_summary   TEXT,
    qualification  TEXT                        -- JSON QualificationResult
);

-- Transcript lines are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS call_messages (
    message_id        TEXT PRIMARY KEY,
    call_id           TEXT NOT NULL REFERENCES calls(call_id),
    role              TEXT NOT NULL,           -- 'ai' | 'client'
    content           TEXT NOT NULL,
    question_key      TEXT,
    timestamp_in_call INTEGER NOT NULL,        -- seconds from call start
    recorded_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS scripts_active_idx      ON scripts(active);
CREATE INDEX IF NOT EXISTS calls_status_idx        ON calls(status);
CREATE INDEX IF NOT EXISTS calls_target_idx        ON calls(target_id, target_type);
CREATE INDEX IF NOT EXISTS calls_created_idx       ON calls(created_at);
CREATE INDEX IF NOT EXISTS call_messages_call_idx  ON call_messages(call_id);

PRAGMA user_version = 1;
";
