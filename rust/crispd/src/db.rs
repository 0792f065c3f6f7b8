use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::model::{Account, Assessment, AssessmentResult, Submission, User};

pub const DB_FILE_NAME: &str = "crisp.sqlite3";

/// Each table keeps the full record as a JSON document in `doc`, with the
/// fields used for lookups mirrored into plain columns.
pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            doc TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            doc TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            doc TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            assessment_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            doc TEXT NOT NULL,
            FOREIGN KEY(assessment_id) REFERENCES assessments(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_assessment ON submissions(assessment_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_assessment_user
         ON submissions(assessment_id, user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessment_results(
            id TEXT PRIMARY KEY,
            assessment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            doc TEXT NOT NULL,
            UNIQUE(assessment_id, student_id),
            FOREIGN KEY(assessment_id) REFERENCES assessments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessment_results_assessment
         ON assessment_results(assessment_id)",
        [],
    )?;

    Ok(conn)
}

fn get_doc<T: DeserializeOwned>(
    conn: &Connection,
    table: &str,
    id: &str,
) -> anyhow::Result<Option<T>> {
    let sql = format!("SELECT doc FROM {} WHERE id = ?", table);
    let doc: Option<String> = conn
        .query_row(&sql, [id], |r| r.get(0))
        .optional()?;
    match doc {
        Some(text) => Ok(Some(
            serde_json::from_str(&text).with_context(|| format!("corrupt {} row {}", table, id))?,
        )),
        None => Ok(None),
    }
}

fn list_docs<T, P>(conn: &Connection, sql: &str, params: P) -> anyhow::Result<Vec<T>>
where
    T: DeserializeOwned,
    P: rusqlite::Params,
{
    let mut stmt = conn.prepare(sql)?;
    let texts = stmt
        .query_map(params, |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    texts
        .iter()
        .map(|t| serde_json::from_str(t).context("corrupt document"))
        .collect()
}

pub fn insert_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users(id, doc) VALUES(?, ?)",
        (&user.id, serde_json::to_string(user)?),
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    get_doc(conn, "users", id)
}

pub fn list_users(conn: &Connection) -> anyhow::Result<Vec<User>> {
    list_docs(conn, "SELECT doc FROM users ORDER BY rowid", [])
}

pub fn insert_account(conn: &Connection, account: &Account) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO accounts(id, user_id, email, doc) VALUES(?, ?, ?, ?)",
        (
            &account.id,
            &account.user,
            &account.email,
            serde_json::to_string(account)?,
        ),
    )?;
    Ok(())
}

pub fn get_account(conn: &Connection, id: &str) -> anyhow::Result<Option<Account>> {
    get_doc(conn, "accounts", id)
}

pub fn account_email_taken(conn: &Connection, email: &str) -> anyhow::Result<bool> {
    let hit: Option<i64> = conn
        .query_row("SELECT 1 FROM accounts WHERE email = ?", [email], |r| r.get(0))
        .optional()?;
    Ok(hit.is_some())
}

pub fn upsert_assessment(conn: &Connection, assessment: &Assessment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO assessments(id, title, doc, updated_at) VALUES(?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           title = excluded.title,
           doc = excluded.doc,
           updated_at = excluded.updated_at",
        (
            &assessment.id,
            &assessment.title,
            serde_json::to_string(assessment)?,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

pub fn get_assessment(conn: &Connection, id: &str) -> anyhow::Result<Option<Assessment>> {
    get_doc(conn, "assessments", id)
}

pub fn list_assessments(conn: &Connection) -> anyhow::Result<Vec<Assessment>> {
    list_docs(conn, "SELECT doc FROM assessments ORDER BY title, rowid", [])
}

/// Removes the assessment together with its submissions and results.
pub fn delete_assessment(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    conn.execute("DELETE FROM assessment_results WHERE assessment_id = ?", [id])?;
    conn.execute("DELETE FROM submissions WHERE assessment_id = ?", [id])?;
    let n = conn.execute("DELETE FROM assessments WHERE id = ?", [id])?;
    Ok(n > 0)
}

pub fn insert_submission(conn: &Connection, submission: &Submission) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO submissions(id, assessment_id, user_id, submitted_at, doc)
         VALUES(?, ?, ?, ?, ?)",
        (
            &submission.id,
            &submission.assessment,
            &submission.user,
            submission.submitted_at.to_rfc3339(),
            serde_json::to_string(submission)?,
        ),
    )?;
    Ok(())
}

pub fn update_submission(conn: &Connection, submission: &Submission) -> anyhow::Result<()> {
    let n = conn.execute(
        "UPDATE submissions SET submitted_at = ?, doc = ? WHERE id = ?",
        (
            submission.submitted_at.to_rfc3339(),
            serde_json::to_string(submission)?,
            &submission.id,
        ),
    )?;
    if n == 0 {
        anyhow::bail!("submission {} vanished during update", submission.id);
    }
    Ok(())
}

pub fn get_submission(conn: &Connection, id: &str) -> anyhow::Result<Option<Submission>> {
    get_doc(conn, "submissions", id)
}

pub fn delete_submission(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM submissions WHERE id = ?", [id])?;
    Ok(n > 0)
}

pub fn list_submissions(
    conn: &Connection,
    assessment_id: &str,
    user_id: Option<&str>,
) -> anyhow::Result<Vec<Submission>> {
    match user_id {
        Some(uid) => list_docs(
            conn,
            "SELECT doc FROM submissions
             WHERE assessment_id = ? AND user_id = ?
             ORDER BY submitted_at, rowid",
            (assessment_id, uid),
        ),
        None => list_docs(
            conn,
            "SELECT doc FROM submissions WHERE assessment_id = ? ORDER BY submitted_at, rowid",
            [assessment_id],
        ),
    }
}

pub fn find_result(
    conn: &Connection,
    assessment_id: &str,
    student_id: &str,
) -> anyhow::Result<Option<AssessmentResult>> {
    let doc: Option<String> = conn
        .query_row(
            "SELECT doc FROM assessment_results WHERE assessment_id = ? AND student_id = ?",
            (assessment_id, student_id),
            |r| r.get(0),
        )
        .optional()?;
    match doc {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn upsert_result(conn: &Connection, result: &AssessmentResult) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO assessment_results(id, assessment_id, student_id, doc) VALUES(?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET doc = excluded.doc",
        (
            &result.id,
            &result.assessment,
            &result.student,
            serde_json::to_string(result)?,
        ),
    )?;
    Ok(())
}

pub fn list_results(
    conn: &Connection,
    assessment_id: &str,
) -> anyhow::Result<Vec<AssessmentResult>> {
    list_docs(
        conn,
        "SELECT doc FROM assessment_results WHERE assessment_id = ? ORDER BY rowid",
        [assessment_id],
    )
}
