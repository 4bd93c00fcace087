//! [`SqliteStore`] — the SQLite implementation of [`CareStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use kincare_core::{
  care::{Advice, NewAdvice, NewTask, Task},
  consult::{
    ChatMessage, ConsultSession, DEFAULT_TITLE, NewSession, Role, TitleState,
  },
  member::{FamilyMember, NewMember, NewUser, User},
  store::{
    CareStore, CompletionCommit, CompletionReceipt, TurnCommit, TurnReceipt,
  },
};

use crate::{
  Result,
  encode::{
    RawAdvice, RawMember, RawMessage, RawSession, RawTask, RawUser, decode_tags,
    encode_dt, encode_list, encode_role, encode_tags, encode_title_state,
    encode_uuid, now,
  },
  schema::SCHEMA,
};

// ─── Column lists ────────────────────────────────────────────────────────────

const USER_COLUMNS: &str = "user_id, external_id, nickname, avatar_url, \
                            full_name, gender, age, created_at";

const MEMBER_COLUMNS: &str = "member_id, user_id, name, relation, gender, age, \
                              height, weight, allergies, meds, special_status, \
                              tags, created_at";

const ADVICE_COLUMNS: &str =
  "advice_id, user_id, member_id, title, reason, tags, detail, created_at";

const TASK_COLUMNS: &str = "task_id, user_id, member_id, title, freq, due, \
                            done, detail, logs, created_at";

const SESSION_COLUMNS: &str =
  "session_id, user_id, member_id, title, title_state, created_at";

const MESSAGE_COLUMNS: &str =
  "message_id, session_id, role, content, created_at";

fn user_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawUser> {
  Ok(RawUser {
    user_id:     r.get(0)?,
    external_id: r.get(1)?,
    nickname:    r.get(2)?,
    avatar_url:  r.get(3)?,
    full_name:   r.get(4)?,
    gender:      r.get(5)?,
    age:         r.get(6)?,
    created_at:  r.get(7)?,
  })
}

fn member_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawMember> {
  Ok(RawMember {
    member_id:      r.get(0)?,
    user_id:        r.get(1)?,
    name:           r.get(2)?,
    relation:       r.get(3)?,
    gender:         r.get(4)?,
    age:            r.get(5)?,
    height:         r.get(6)?,
    weight:         r.get(7)?,
    allergies:      r.get(8)?,
    meds:           r.get(9)?,
    special_status: r.get(10)?,
    tags:           r.get(11)?,
    created_at:     r.get(12)?,
  })
}

fn advice_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawAdvice> {
  Ok(RawAdvice {
    advice_id:  r.get(0)?,
    user_id:    r.get(1)?,
    member_id:  r.get(2)?,
    title:      r.get(3)?,
    reason:     r.get(4)?,
    tags:       r.get(5)?,
    detail:     r.get(6)?,
    created_at: r.get(7)?,
  })
}

fn task_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawTask> {
  Ok(RawTask {
    task_id:    r.get(0)?,
    user_id:    r.get(1)?,
    member_id:  r.get(2)?,
    title:      r.get(3)?,
    freq:       r.get(4)?,
    due:        r.get(5)?,
    done:       r.get(6)?,
    detail:     r.get(7)?,
    logs:       r.get(8)?,
    created_at: r.get(9)?,
  })
}

fn session_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
  Ok(RawSession {
    session_id:  r.get(0)?,
    user_id:     r.get(1)?,
    member_id:   r.get(2)?,
    title:       r.get(3)?,
    title_state: r.get(4)?,
    created_at:  r.get(5)?,
  })
}

fn message_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawMessage> {
  Ok(RawMessage {
    message_id: r.get(0)?,
    session_id: r.get(1)?,
    role:       r.get(2)?,
    content:    r.get(3)?,
    created_at: r.get(4)?,
  })
}

/// Carries a decode failure out of a `conn.call` closure.
fn into_call_error(e: crate::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

// ─── Pre-encoded rows ────────────────────────────────────────────────────────
//
// Multi-record writes are built and encoded before entering the connection
// thread, so the closure only has rusqlite errors to report.

struct AdviceInsert {
  record: Advice,
  params: [String; 8],
}

impl AdviceInsert {
  fn build(input: NewAdvice) -> Result<Self> {
    let record = Advice {
      advice_id:  Uuid::new_v4(),
      user_id:    input.user_id,
      member_id:  input.member_id,
      title:      input.title,
      reason:     input.reason,
      tags:       input.tags,
      detail:     input.detail,
      created_at: now(),
    };
    let params = [
      encode_uuid(record.advice_id),
      encode_uuid(record.user_id),
      encode_uuid(record.member_id),
      record.title.clone(),
      record.reason.clone(),
      encode_list(&record.tags)?,
      encode_list(&record.detail)?,
      encode_dt(record.created_at),
    ];
    Ok(Self { record, params })
  }

  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO advice (advice_id, user_id, member_id, title, reason, tags,
                           detail, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      rusqlite::params_from_iter(self.params.iter()),
    )?;
    Ok(())
  }
}

struct TaskInsert {
  record: Task,
  params: [String; 9],
}

impl TaskInsert {
  fn build(input: NewTask) -> Result<Self> {
    let record = Task {
      task_id:    Uuid::new_v4(),
      user_id:    input.user_id,
      member_id:  input.member_id,
      title:      input.title,
      freq:       input.freq,
      due:        input.due,
      done:       false,
      detail:     input.detail,
      logs:       Vec::new(),
      created_at: now(),
    };
    let params = [
      encode_uuid(record.task_id),
      encode_uuid(record.user_id),
      encode_uuid(record.member_id),
      record.title.clone(),
      record.freq.clone(),
      record.due.clone(),
      encode_list(&record.detail)?,
      encode_list(&record.logs)?,
      encode_dt(record.created_at),
    ];
    Ok(Self { record, params })
  }

  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO tasks (task_id, user_id, member_id, title, freq, due, done,
                          detail, logs, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9)",
      rusqlite::params_from_iter(self.params.iter()),
    )?;
    Ok(())
  }
}

struct MessageInsert {
  record: ChatMessage,
  params: [String; 5],
}

impl MessageInsert {
  fn build(session_id: Uuid, role: Role, content: String) -> Self {
    let record = ChatMessage {
      message_id: Uuid::new_v4(),
      session_id,
      role,
      content,
      created_at: now(),
    };
    let params = [
      encode_uuid(record.message_id),
      encode_uuid(record.session_id),
      encode_role(record.role).to_owned(),
      record.content.clone(),
      encode_dt(record.created_at),
    ];
    Self { record, params }
  }

  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO messages (message_id, session_id, role, content, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params_from_iter(self.params.iter()),
    )?;
    Ok(())
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Kincare store backed by a single SQLite file.
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

  /// Fetch one row by primary key.
  async fn fetch_one<R, F>(
    &self,
    table: &'static str,
    columns: &'static str,
    key: &'static str,
    id: Uuid,
    map: F,
  ) -> Result<Option<R>>
  where
    R: Send + 'static,
    F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<R> + Send + 'static,
  {
    let id_str = encode_uuid(id);
    let sql = format!("SELECT {columns} FROM {table} WHERE {key} = ?1");
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], map)
            .optional()?,
        )
      })
      .await?;
    Ok(raw)
  }

  /// Run a `SELECT` and collect every row.
  async fn fetch_many<R, F>(
    &self,
    sql: String,
    params: Vec<String>,
    map: F,
  ) -> Result<Vec<R>>
  where
    R: Send + 'static,
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<R> + Send + 'static,
  {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), map)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(raws)
  }

  /// Run a single `DELETE`; returns whether a row was removed.
  async fn delete_one(&self, sql: &'static str, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params![id_str])?))
      .await?;
    Ok(n > 0)
  }
}

// ─── CareStore impl ──────────────────────────────────────────────────────────

impl CareStore for SqliteStore {
  type Error = crate::Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:     Uuid::new_v4(),
      external_id: input.external_id,
      nickname:    input.nickname,
      avatar_url:  None,
      full_name:   None,
      gender:      None,
      age:         None,
      created_at:  now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let ext_id   = user.external_id.clone();
    let nickname = user.nickname.clone();
    let at_str   = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, external_id, nickname, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, ext_id, nickname, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    self
      .fetch_one("users", USER_COLUMNS, "user_id", id, user_row)
      .await?
      .map(RawUser::into_user)
      .transpose()
  }

  async fn find_user_by_external_id<'a>(
    &'a self,
    external_id: &'a str,
  ) -> Result<Option<User>> {
    let ext_id = external_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE external_id = ?1"),
              rusqlite::params![ext_id],
              user_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn update_user(&self, user: User) -> Result<()> {
    let id_str = encode_uuid(user.user_id);
    let User { nickname, avatar_url, full_name, gender, age, .. } = user;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE users
              SET nickname = ?2, avatar_url = ?3, full_name = ?4,
                  gender = ?5, age = ?6
            WHERE user_id = ?1",
          rusqlite::params![id_str, nickname, avatar_url, full_name, gender, age],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Members ───────────────────────────────────────────────────────────────

  async fn add_member(&self, input: NewMember) -> Result<FamilyMember> {
    let member = FamilyMember {
      member_id:      Uuid::new_v4(),
      user_id:        input.user_id,
      name:           input.name,
      relation:       input.relation,
      gender:         input.gender,
      age:            input.age,
      height:         input.height,
      weight:         input.weight,
      allergies:      input.allergies,
      meds:           input.meds,
      special_status: input.special_status,
      tags:           input.tags,
      created_at:     now(),
    };

    let id_str   = encode_uuid(member.member_id);
    let user_str = encode_uuid(member.user_id);
    let tags_str = encode_tags(&member.tags)?;
    let at_str   = encode_dt(member.created_at);
    let m        = member.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO members (
             member_id, user_id, name, relation, gender, age, height, weight,
             allergies, meds, special_status, tags, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            id_str,
            user_str,
            m.name,
            m.relation,
            m.gender,
            m.age,
            m.height,
            m.weight,
            m.allergies,
            m.meds,
            m.special_status,
            tags_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(member)
  }

  async fn get_member(&self, id: Uuid) -> Result<Option<FamilyMember>> {
    self
      .fetch_one("members", MEMBER_COLUMNS, "member_id", id, member_row)
      .await?
      .map(RawMember::into_member)
      .transpose()
  }

  async fn list_members(&self, user_id: Uuid) -> Result<Vec<FamilyMember>> {
    self
      .fetch_many(
        format!(
          "SELECT {MEMBER_COLUMNS} FROM members WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC"
        ),
        vec![encode_uuid(user_id)],
        member_row,
      )
      .await?
      .into_iter()
      .map(RawMember::into_member)
      .collect()
  }

  async fn update_member(&self, member: FamilyMember) -> Result<()> {
    let id_str   = encode_uuid(member.member_id);
    let tags_str = encode_tags(&member.tags)?;
    let m        = member;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE members
              SET name = ?2, relation = ?3, gender = ?4, age = ?5, height = ?6,
                  weight = ?7, allergies = ?8, meds = ?9, special_status = ?10,
                  tags = ?11
            WHERE member_id = ?1",
          rusqlite::params![
            id_str,
            m.name,
            m.relation,
            m.gender,
            m.age,
            m.height,
            m.weight,
            m.allergies,
            m.meds,
            m.special_status,
            tags_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_member(&self, id: Uuid) -> Result<bool> {
    self.delete_one("DELETE FROM members WHERE member_id = ?1", id).await
  }

  // ── Advice ────────────────────────────────────────────────────────────────

  async fn add_advice(&self, input: NewAdvice) -> Result<Advice> {
    let row = AdviceInsert::build(input)?;
    let row = self
      .conn
      .call(move |conn| {
        row.insert(conn)?;
        Ok(row)
      })
      .await?;
    Ok(row.record)
  }

  async fn get_advice(&self, id: Uuid) -> Result<Option<Advice>> {
    self
      .fetch_one("advice", ADVICE_COLUMNS, "advice_id", id, advice_row)
      .await?
      .map(RawAdvice::into_advice)
      .transpose()
  }

  async fn list_advice(&self, user_id: Uuid, member_id: Uuid) -> Result<Vec<Advice>> {
    self
      .fetch_many(
        format!(
          "SELECT {ADVICE_COLUMNS} FROM advice
            WHERE user_id = ?1 AND member_id = ?2
            ORDER BY created_at DESC, rowid DESC"
        ),
        vec![encode_uuid(user_id), encode_uuid(member_id)],
        advice_row,
      )
      .await?
      .into_iter()
      .map(RawAdvice::into_advice)
      .collect()
  }

  // ── Tasks ─────────────────────────────────────────────────────────────────

  async fn add_task(&self, input: NewTask) -> Result<Task> {
    let row = TaskInsert::build(input)?;
    let row = self
      .conn
      .call(move |conn| {
        row.insert(conn)?;
        Ok(row)
      })
      .await?;
    Ok(row.record)
  }

  async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
    self
      .fetch_one("tasks", TASK_COLUMNS, "task_id", id, task_row)
      .await?
      .map(RawTask::into_task)
      .transpose()
  }

  async fn list_tasks(&self, user_id: Uuid, member_id: Uuid) -> Result<Vec<Task>> {
    self
      .fetch_many(
        format!(
          "SELECT {TASK_COLUMNS} FROM tasks
            WHERE user_id = ?1 AND member_id = ?2
            ORDER BY created_at DESC, rowid DESC"
        ),
        vec![encode_uuid(user_id), encode_uuid(member_id)],
        task_row,
      )
      .await?
      .into_iter()
      .map(RawTask::into_task)
      .collect()
  }

  async fn complete_task(
    &self,
    commit: CompletionCommit,
  ) -> Result<Option<CompletionReceipt>> {
    let task_str = encode_uuid(commit.task_id);
    let log      = commit.log_entry;
    let evolve   = commit.evolve;

    let done = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let flipped = tx.execute(
          "UPDATE tasks
              SET done = 1, logs = json_insert(logs, '$[#]', ?2)
            WHERE task_id = ?1 AND done = 0",
          rusqlite::params![task_str, log],
        )?;

        let Some(raw) = tx
          .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?1"),
            rusqlite::params![task_str],
            task_row,
          )
          .optional()?
        else {
          return Ok(None);
        };
        if flipped == 0 {
          return Ok(Some((raw, None)));
        }

        let stored: Option<String> = tx
          .query_row(
            "SELECT tags FROM members WHERE member_id = ?1",
            rusqlite::params![raw.member_id],
            |r| r.get(0),
          )
          .optional()?;

        let profile = match stored {
          Some(stored) => {
            let tags = evolve(decode_tags(&stored).map_err(into_call_error)?, &raw.title);
            tx.execute(
              "UPDATE members SET tags = ?2 WHERE member_id = ?1",
              rusqlite::params![
                raw.member_id,
                encode_tags(&tags).map_err(into_call_error)?
              ],
            )?;
            Some(tags)
          }
          None => None,
        };

        tx.commit()?;
        Ok(Some((raw, profile)))
      })
      .await?;

    done
      .map(|(raw, profile)| Ok(CompletionReceipt { task: raw.into_task()?, profile }))
      .transpose()
  }

  // ── Consultations ─────────────────────────────────────────────────────────

  async fn create_session(
    &self,
    input: NewSession,
  ) -> Result<(ConsultSession, ChatMessage)> {
    let session = ConsultSession {
      session_id:  Uuid::new_v4(),
      user_id:     input.user_id,
      member_id:   input.member_id,
      title:       DEFAULT_TITLE.to_owned(),
      title_state: TitleState::Default,
      created_at:  now(),
    };
    let welcome =
      MessageInsert::build(session.session_id, Role::Assistant, input.welcome);

    let params = [
      encode_uuid(session.session_id),
      encode_uuid(session.user_id),
      encode_uuid(session.member_id),
      session.title.clone(),
      encode_title_state(session.title_state).to_owned(),
      encode_dt(session.created_at),
    ];

    let welcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO sessions (session_id, user_id, member_id, title,
                                 title_state, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params_from_iter(params.iter()),
        )?;
        welcome.insert(&tx)?;
        tx.commit()?;
        Ok(welcome)
      })
      .await?;

    Ok((session, welcome.record))
  }

  async fn get_session(&self, id: Uuid) -> Result<Option<ConsultSession>> {
    self
      .fetch_one("sessions", SESSION_COLUMNS, "session_id", id, session_row)
      .await?
      .map(RawSession::into_session)
      .transpose()
  }

  async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<ConsultSession>> {
    self
      .fetch_many(
        format!(
          "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC"
        ),
        vec![encode_uuid(user_id)],
        session_row,
      )
      .await?
      .into_iter()
      .map(RawSession::into_session)
      .collect()
  }

  async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
    self
      .fetch_many(
        format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages WHERE session_id = ?1
           ORDER BY created_at ASC, rowid ASC"
        ),
        vec![encode_uuid(session_id)],
        message_row,
      )
      .await?
      .into_iter()
      .map(RawMessage::into_message)
      .collect()
  }

  async fn commit_turn(&self, commit: TurnCommit) -> Result<TurnReceipt> {
    let TurnCommit { session_id, messages, advice, tasks, title } = commit;

    let messages: Vec<MessageInsert> = messages
      .into_iter()
      .map(|turn| MessageInsert::build(session_id, turn.role, turn.content))
      .collect();
    let advice = advice
      .into_iter()
      .map(AdviceInsert::build)
      .collect::<Result<Vec<_>>>()?;
    let tasks = tasks
      .into_iter()
      .map(TaskInsert::build)
      .collect::<Result<Vec<_>>>()?;
    let session_str = encode_uuid(session_id);
    let summarized  = encode_title_state(TitleState::Summarized);

    let (messages, advice, tasks) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for m in &messages {
          m.insert(&tx)?;
        }
        for a in &advice {
          a.insert(&tx)?;
        }
        for t in &tasks {
          t.insert(&tx)?;
        }
        if let Some(title) = title {
          tx.execute(
            "UPDATE sessions SET title = ?2, title_state = ?3
              WHERE session_id = ?1",
            rusqlite::params![session_str, title, summarized],
          )?;
        }
        tx.commit()?;
        Ok((messages, advice, tasks))
      })
      .await?;

    Ok(TurnReceipt {
      messages: messages.into_iter().map(|m| m.record).collect(),
      advice:   advice.into_iter().map(|a| a.record).collect(),
      tasks:    tasks.into_iter().map(|t| t.record).collect(),
    })
  }

  async fn delete_session(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM messages WHERE session_id = ?1",
          rusqlite::params![id_str],
        )?;
        let n = tx.execute(
          "DELETE FROM sessions WHERE session_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(n)
      })
      .await?;
    Ok(n > 0)
  }
}
