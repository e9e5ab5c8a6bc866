//! [`SqliteStore`] — the SQLite implementation of [`ScriptStore`] and
//! [`CallStore`].

use std::path::Path;

use chrono::Utc;
use coldcall_core::{
  call::{Call, CallStatus, Direction, NewCall},
  message::{CallMessage, NewMessage},
  outcome::QualificationResult,
  script::{NewScript, Script, TargetType},
  store::{
    CallAnalytics, CallFilter, CallLimits, CallProgress, CallRejection,
    CallStore, DailyCount, ScriptStore, StatusCount,
  },
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawCall, RawMessage, RawScript, decode_status, encode_direction,
    encode_dt, encode_qualification, encode_questions, encode_role,
    encode_status, encode_target_type, encode_target_types, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Row mapping ─────────────────────────────────────────────────────────────

const CALL_COLUMNS: &str = "call_id, target_id, target_type, customer_name, \
   phone_number, script_id, status, direction, attempt_number, \
   current_question_index, current_question_retries, initiated_by, \
   created_at, started_at, ended_at, total_questions_asked, \
   total_questions_answered, call_summary, qualification";

const SCRIPT_COLUMNS: &str = "script_id, active, target_types, questions, \
   greeting_text, closing_text, max_retries_per_question, activated_at, \
   created_at";

fn raw_call_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCall> {
  Ok(RawCall {
    call_id:        row.get(0)?,
    target_id:      row.get(1)?,
    target_type:    row.get(2)?,
    customer_name:  row.get(3)?,
    phone_number:   row.get(4)?,
    script_id:      row.get(5)?,
    status:         row.get(6)?,
    direction:      row.get(7)?,
    attempt_number: row.get(8)?,
    current_question_index:   row.get(9)?,
    current_question_retries: row.get(10)?,
    initiated_by: row.get(11)?,
    created_at:   row.get(12)?,
    started_at:   row.get(13)?,
    ended_at:     row.get(14)?,
    total_questions_asked:    row.get(15)?,
    total_questions_answered: row.get(16)?,
    call_summary:  row.get(17)?,
    qualification: row.get(18)?,
  })
}

fn raw_script_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawScript> {
  Ok(RawScript {
    script_id:                row.get(0)?,
    active:                   row.get(1)?,
    target_types:             row.get(2)?,
    questions:                row.get(3)?,
    greeting_text:            row.get(4)?,
    closing_text:             row.get(5)?,
    max_retries_per_question: row.get(6)?,
    activated_at:             row.get(7)?,
    created_at:               row.get(8)?,
  })
}

/// Wrap a decode failure that occurs inside a connection closure.
fn other_err(
  e: impl std::error::Error + Send + Sync + 'static,
) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

// ─── Closure outcomes ────────────────────────────────────────────────────────

// Domain verdicts carried out of a connection closure as data, so the typed
// error is constructed outside the database thread.

enum CallTxOutcome {
  Done(RawCall),
  NotFound,
  Terminal,
  Illegal { from: CallStatus },
  NotTerminal,
  Regression,
}

enum CreateOutcome {
  Created(u32),
  Rejected(CallRejection),
}

enum MsgOutcome {
  Inserted,
  NotFound,
  Terminal,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Coldcall store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ScriptStore impl ────────────────────────────────────────────────────────

impl ScriptStore for SqliteStore {
  type Error = Error;

  async fn add_script(&self, input: NewScript) -> Result<Script> {
    input.validate()?;

    let now = Utc::now();
    let script = Script {
      script_id:                Uuid::new_v4(),
      active:                   input.active,
      target_types:             input.target_types,
      questions:                input.questions,
      greeting_text:            input.greeting_text,
      closing_text:             input.closing_text,
      max_retries_per_question: input.max_retries_per_question,
      activated_at:             input.active.then_some(now),
      created_at:               now,
    };

    let id_str           = encode_uuid(script.script_id);
    let active           = script.active;
    let target_types_str = encode_target_types(&script.target_types)?;
    let questions_str    = encode_questions(&script.questions)?;
    let greeting         = script.greeting_text.clone();
    let closing          = script.closing_text.clone();
    let max_retries      = script.max_retries_per_question;
    let activated_str    = script.activated_at.map(encode_dt);
    let created_str      = encode_dt(script.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO scripts (
             script_id, active, target_types, questions, greeting_text,
             closing_text, max_retries_per_question, activated_at, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            active,
            target_types_str,
            questions_str,
            greeting,
            closing,
            max_retries,
            activated_str,
            created_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(script)
  }

  async fn get_script(&self, id: Uuid) -> Result<Option<Script>> {
    let id_str = encode_uuid(id);
    let sql = format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE script_id = ?1");

    let raw: Option<RawScript> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], raw_script_from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawScript::into_script).transpose()
  }

  async fn active_script_for(
    &self,
    target_type: TargetType,
  ) -> Result<Option<Script>> {
    // target_types is a JSON array of quoted strings, so a LIKE over the
    // quoted token is an exact membership test.
    let pattern = format!("%\"{}\"%", encode_target_type(target_type));
    let sql = format!(
      "SELECT {SCRIPT_COLUMNS} FROM scripts
       WHERE active = 1 AND target_types LIKE ?1
       ORDER BY activated_at DESC, script_id DESC
       LIMIT 1"
    );

    let raw: Option<RawScript> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![pattern], raw_script_from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawScript::into_script).transpose()
  }

  async fn list_scripts(&self) -> Result<Vec<Script>> {
    let sql = format!("SELECT {SCRIPT_COLUMNS} FROM scripts ORDER BY created_at");

    let raws: Vec<RawScript> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], raw_script_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawScript::into_script).collect()
  }
}

// ─── CallStore impl ──────────────────────────────────────────────────────────

impl CallStore for SqliteStore {
  type Error = Error;

  async fn create_call(
    &self,
    input: NewCall,
    limits: CallLimits,
  ) -> Result<Result<Call, CallRejection>> {
    let call_id    = Uuid::new_v4();
    let created_at = Utc::now();

    let id_str        = encode_uuid(call_id);
    let target_id_str = encode_uuid(input.target_id);
    let tt_str        = encode_target_type(input.target_type).to_owned();
    let name          = input.customer_name.clone();
    let phone         = input.phone_number.clone();
    let script_id_str = encode_uuid(input.script_id);
    let initiated_by  = input.initiated_by.clone();
    let created_str   = encode_dt(created_at);
    let max_active    = limits.max_active_calls;
    let max_attempts  = limits.max_attempts_per_target;

    // The ceiling checks and the insert run in one IMMEDIATE transaction so
    // a concurrent create cannot slip between the count and the reserve.
    let outcome: CreateOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(
          rusqlite::TransactionBehavior::Immediate,
        )?;

        let active: u32 = tx.query_row(
          "SELECT COUNT(*) FROM calls
           WHERE status IN ('pending', 'ringing', 'in_progress')",
          [],
          |r| r.get(0),
        )?;
        if active >= max_active {
          return Ok(CreateOutcome::Rejected(CallRejection::ConcurrencyLimit {
            active,
            max: max_active,
          }));
        }

        let attempts: u32 = tx.query_row(
          "SELECT COUNT(*) FROM calls WHERE target_id = ?1 AND target_type = ?2",
          rusqlite::params![target_id_str, tt_str],
          |r| r.get(0),
        )?;
        if attempts >= max_attempts {
          return Ok(CreateOutcome::Rejected(CallRejection::MaxAttempts {
            attempts,
            max: max_attempts,
          }));
        }

        tx.execute(
          "INSERT INTO calls (
             call_id, target_id, target_type, customer_name, phone_number,
             script_id, status, direction, attempt_number, initiated_by,
             created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            id_str,
            target_id_str,
            tt_str,
            name,
            phone,
            script_id_str,
            encode_status(CallStatus::Pending),
            encode_direction(Direction::Outbound),
            attempts + 1,
            initiated_by,
            created_str,
          ],
        )?;
        tx.commit()?;

        Ok(CreateOutcome::Created(attempts + 1))
      })
      .await?;

    let attempt_number = match outcome {
      CreateOutcome::Created(n) => n,
      CreateOutcome::Rejected(r) => return Ok(Err(r)),
    };

    Ok(Ok(Call {
      call_id,
      target_id: input.target_id,
      target_type: input.target_type,
      customer_name: input.customer_name,
      phone_number: input.phone_number,
      script_id: input.script_id,
      status: CallStatus::Pending,
      direction: Direction::Outbound,
      attempt_number,
      current_question_index: 0,
      current_question_retries: 0,
      initiated_by: input.initiated_by,
      created_at,
      started_at: None,
      ended_at: None,
      total_questions_asked: 0,
      total_questions_answered: 0,
      call_summary: None,
      qualification: None,
    }))
  }

  async fn get_call(&self, id: Uuid) -> Result<Option<Call>> {
    let id_str = encode_uuid(id);
    let sql = format!("SELECT {CALL_COLUMNS} FROM calls WHERE call_id = ?1");

    let raw: Option<RawCall> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], raw_call_from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCall::into_call).transpose()
  }

  async fn transition_status(&self, id: Uuid, next: CallStatus) -> Result<Call> {
    let id_str   = encode_uuid(id);
    let next_str = encode_status(next).to_owned();
    let now_str  = encode_dt(Utc::now());
    let sql      = format!("SELECT {CALL_COLUMNS} FROM calls WHERE call_id = ?1");

    let outcome: CallTxOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(
          rusqlite::TransactionBehavior::Immediate,
        )?;

        let status_str: Option<String> = tx
          .query_row(
            "SELECT status FROM calls WHERE call_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(status_str) = status_str else {
          return Ok(CallTxOutcome::NotFound);
        };
        let current = decode_status(&status_str).map_err(other_err)?;

        if current == next {
          // Idempotent webhook redelivery.
          let raw = tx.query_row(&sql, rusqlite::params![id_str], raw_call_from_row)?;
          tx.commit()?;
          return Ok(CallTxOutcome::Done(raw));
        }
        if !current.can_transition_to(next) {
          return Ok(CallTxOutcome::Illegal { from: current });
        }

        if next.is_terminal() {
          tx.execute(
            "UPDATE calls SET status = ?2, ended_at = COALESCE(ended_at, ?3)
             WHERE call_id = ?1",
            rusqlite::params![id_str, next_str, now_str],
          )?;
        } else if next == CallStatus::InProgress {
          tx.execute(
            "UPDATE calls SET status = ?2, started_at = COALESCE(started_at, ?3)
             WHERE call_id = ?1",
            rusqlite::params![id_str, next_str, now_str],
          )?;
        } else {
          tx.execute(
            "UPDATE calls SET status = ?2 WHERE call_id = ?1",
            rusqlite::params![id_str, next_str],
          )?;
        }

        let raw = tx.query_row(&sql, rusqlite::params![id_str], raw_call_from_row)?;
        tx.commit()?;
        Ok(CallTxOutcome::Done(raw))
      })
      .await?;

    match outcome {
      CallTxOutcome::Done(raw) => raw.into_call(),
      CallTxOutcome::NotFound => Err(Error::CallNotFound(id)),
      CallTxOutcome::Illegal { from } => Err(Error::Core(
        coldcall_core::Error::IllegalTransition { from, to: next },
      )),
      _ => unreachable!("transition_status yields Done/NotFound/Illegal"),
    }
  }

  async fn append_message(&self, input: NewMessage) -> Result<CallMessage> {
    let message = CallMessage {
      message_id:        Uuid::new_v4(),
      call_id:           input.call_id,
      role:              input.role,
      content:           input.content,
      question_key:      input.question_key,
      timestamp_in_call: input.timestamp_in_call,
      recorded_at:       Utc::now(),
    };

    let msg_id_str   = encode_uuid(message.message_id);
    let call_id_str  = encode_uuid(message.call_id);
    let role_str     = encode_role(message.role).to_owned();
    let content      = message.content.clone();
    let question_key = message.question_key.clone();
    let ts_in_call   = message.timestamp_in_call;
    let recorded_str = encode_dt(message.recorded_at);
    let call_id      = message.call_id;

    let outcome: MsgOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(
          rusqlite::TransactionBehavior::Immediate,
        )?;

        let status_str: Option<String> = tx
          .query_row(
            "SELECT status FROM calls WHERE call_id = ?1",
            rusqlite::params![call_id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(status_str) = status_str else {
          return Ok(MsgOutcome::NotFound);
        };
        if decode_status(&status_str).map_err(other_err)?.is_terminal() {
          return Ok(MsgOutcome::Terminal);
        }

        tx.execute(
          "INSERT INTO call_messages (
             message_id, call_id, role, content, question_key,
             timestamp_in_call, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            msg_id_str,
            call_id_str,
            role_str,
            content,
            question_key,
            ts_in_call,
            recorded_str,
          ],
        )?;
        tx.commit()?;
        Ok(MsgOutcome::Inserted)
      })
      .await?;

    match outcome {
      MsgOutcome::Inserted => Ok(message),
      MsgOutcome::NotFound => Err(Error::CallNotFound(call_id)),
      MsgOutcome::Terminal => {
        Err(Error::Core(coldcall_core::Error::TerminalCall(call_id)))
      }
    }
  }

  async fn get_messages(&self, call_id: Uuid) -> Result<Vec<CallMessage>> {
    let id_str = encode_uuid(call_id);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT message_id, call_id, role, content, question_key,
                  timestamp_in_call, recorded_at
           FROM call_messages WHERE call_id = ?1
           ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawMessage {
              message_id:        row.get(0)?,
              call_id:           row.get(1)?,
              role:              row.get(2)?,
              content:           row.get(3)?,
              question_key:      row.get(4)?,
              timestamp_in_call: row.get(5)?,
              recorded_at:       row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn update_progress(
    &self,
    id: Uuid,
    progress: CallProgress,
  ) -> Result<Call> {
    let id_str = encode_uuid(id);
    let sql    = format!("SELECT {CALL_COLUMNS} FROM calls WHERE call_id = ?1");

    let outcome: CallTxOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(
          rusqlite::TransactionBehavior::Immediate,
        )?;

        let row: Option<(String, u32, u32, u32)> = tx
          .query_row(
            "SELECT status, current_question_index, total_questions_asked,
                    total_questions_answered
             FROM calls WHERE call_id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
          )
          .optional()?;
        let Some((status_str, index, asked, answered)) = row else {
          return Ok(CallTxOutcome::NotFound);
        };
        if decode_status(&status_str).map_err(other_err)?.is_terminal() {
          return Ok(CallTxOutcome::Terminal);
        }
        if progress.current_question_index < index
          || progress.total_questions_asked < asked
          || progress.total_questions_answered < answered
        {
          return Ok(CallTxOutcome::Regression);
        }

        tx.execute(
          "UPDATE calls SET
             current_question_index = ?2,
             current_question_retries = ?3,
             total_questions_asked = ?4,
             total_questions_answered = ?5
           WHERE call_id = ?1",
          rusqlite::params![
            id_str,
            progress.current_question_index,
            progress.current_question_retries,
            progress.total_questions_asked,
            progress.total_questions_answered,
          ],
        )?;

        let raw = tx.query_row(&sql, rusqlite::params![id_str], raw_call_from_row)?;
        tx.commit()?;
        Ok(CallTxOutcome::Done(raw))
      })
      .await?;

    match outcome {
      CallTxOutcome::Done(raw) => raw.into_call(),
      CallTxOutcome::NotFound => Err(Error::CallNotFound(id)),
      CallTxOutcome::Terminal => Err(Error::Core(
        coldcall_core::Error::TerminalCall(id),
      )),
      CallTxOutcome::Regression => Err(Error::NonMonotonicProgress(id)),
      _ => unreachable!("update_progress yields Done/NotFound/Terminal/Regression"),
    }
  }

  async fn set_summary(&self, id: Uuid, summary: String) -> Result<Call> {
    self.set_enrichment(id, "call_summary", summary).await
  }

  async fn set_qualification(
    &self,
    id: Uuid,
    qualification: QualificationResult,
  ) -> Result<Call> {
    let json = encode_qualification(&qualification)?;
    self.set_enrichment(id, "qualification", json).await
  }

  async fn count_attempts(
    &self,
    target_id: Uuid,
    target_type: TargetType,
  ) -> Result<u32> {
    let target_id_str = encode_uuid(target_id);
    let tt_str        = encode_target_type(target_type).to_owned();

    let count: u32 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM calls WHERE target_id = ?1 AND target_type = ?2",
          rusqlite::params![target_id_str, tt_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count)
  }

  async fn analytics(&self, filter: &CallFilter) -> Result<CallAnalytics> {
    let tt_str    = filter.target_type.map(|t| encode_target_type(t).to_owned());
    let since_str = filter.since.map(encode_dt);
    let until_str = filter.until.map(encode_dt);

    // NULL-tolerant guards keep the statement static so every parameter is
    // always bound.
    const WHERE_CLAUSE: &str = "(?1 IS NULL OR target_type = ?1)
       AND (?2 IS NULL OR created_at >= ?2)
       AND (?3 IS NULL OR created_at <= ?3)";

    let raw = self
      .conn
      .call(move |conn| {
        let params = rusqlite::params![tt_str, since_str, until_str];

        let mut stmt = conn.prepare(&format!(
          "SELECT status, COUNT(*) FROM calls WHERE {WHERE_CLAUSE}
           GROUP BY status"
        ))?;
        let status_counts = stmt
          .query_map(params, |r| Ok((r.get::<_, String>(0)?, r.get::<_, u64>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let (total, avg_asked, avg_answered): (u64, Option<f64>, Option<f64>) =
          conn.query_row(
            &format!(
              "SELECT COUNT(*), AVG(total_questions_asked),
                      AVG(total_questions_answered)
               FROM calls WHERE {WHERE_CLAUSE}"
            ),
            params,
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )?;

        let avg_duration: Option<f64> = conn.query_row(
          &format!(
            "SELECT AVG((julianday(ended_at) - julianday(started_at)) * 86400.0)
             FROM calls
             WHERE {WHERE_CLAUSE}
               AND started_at IS NOT NULL AND ended_at IS NOT NULL"
          ),
          params,
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT date(created_at), COUNT(*) FROM calls WHERE {WHERE_CLAUSE}
           GROUP BY date(created_at) ORDER BY date(created_at)"
        ))?;
        let daily = stmt
          .query_map(params, |r| Ok((r.get::<_, String>(0)?, r.get::<_, u64>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((status_counts, total, avg_asked, avg_answered, avg_duration, daily))
      })
      .await?;

    let (status_counts, total, avg_asked, avg_answered, avg_duration, daily) = raw;

    let by_status = status_counts
      .into_iter()
      .map(|(s, count)| Ok(StatusCount { status: decode_status(&s)?, count }))
      .collect::<Result<Vec<_>>>()?;

    let completed = by_status
      .iter()
      .find(|sc| sc.status == CallStatus::Completed)
      .map_or(0, |sc| sc.count);
    let success_rate = if total == 0 {
      0.0
    } else {
      completed as f64 / total as f64
    };

    let daily_counts = daily
      .into_iter()
      .map(|(d, count)| {
        let date = chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d")
          .map_err(|e| Error::DateParse(e.to_string()))?;
        Ok(DailyCount { date, count })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(CallAnalytics {
      total_calls: total,
      by_status,
      success_rate,
      avg_duration_seconds: avg_duration.unwrap_or(0.0),
      avg_questions_asked: avg_asked.unwrap_or(0.0),
      avg_questions_answered: avg_answered.unwrap_or(0.0),
      daily_counts,
    })
  }
}

impl SqliteStore {
  /// Shared write path for the two enrichment columns; only legal once the
  /// call is terminal.
  async fn set_enrichment(
    &self,
    id: Uuid,
    column: &'static str,
    value: String,
  ) -> Result<Call> {
    let id_str = encode_uuid(id);
    let sql    = format!("SELECT {CALL_COLUMNS} FROM calls WHERE call_id = ?1");

    let outcome: CallTxOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(
          rusqlite::TransactionBehavior::Immediate,
        )?;

        let status_str: Option<String> = tx
          .query_row(
            "SELECT status FROM calls WHERE call_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(status_str) = status_str else {
          return Ok(CallTxOutcome::NotFound);
        };
        if !decode_status(&status_str).map_err(other_err)?.is_terminal() {
          return Ok(CallTxOutcome::NotTerminal);
        }

        tx.execute(
          &format!("UPDATE calls SET {column} = ?2 WHERE call_id = ?1"),
          rusqlite::params![id_str, value],
        )?;

        let raw = tx.query_row(&sql, rusqlite::params![id_str], raw_call_from_row)?;
        tx.commit()?;
        Ok(CallTxOutcome::Done(raw))
      })
      .await?;

    match outcome {
      CallTxOutcome::Done(raw) => raw.into_call(),
      CallTxOutcome::NotFound => Err(Error::CallNotFound(id)),
      CallTxOutcome::NotTerminal => Err(Error::Core(
        coldcall_core::Error::CallNotTerminal(id),
      )),
      _ => unreachable!("set_enrichment yields Done/NotFound/NotTerminal"),
    }
  }
}
