use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use time::OffsetDateTime;

use crate::error::AppError;
use crate::model::{FeedMessage, Message};

/// The home timeline never grows past this many entries.
pub const TIMELINE_LIMIT: i64 = 100;

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_feed(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeedMessage> {
    Ok(FeedMessage {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text: row.get(2)?,
        created_at: row.get(3)?,
        username: row.get(4)?,
        image_url: row.get(5)?,
    })
}

/// Stores a new message stamped with the current time.
pub fn create_message(conn: &Connection, user_id: i64, text: &str) -> Result<Message, AppError> {
    let created_at = OffsetDateTime::now_utc().unix_timestamp();
    let res = conn.execute(
        "INSERT INTO messages (user_id, text, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, text, created_at],
    );
    match res {
        Ok(_) => Ok(Message {
            id: conn.last_insert_rowid(),
            user_id,
            text: text.to_string(),
            created_at,
        }),
        Err(e) if matches!(e.sqlite_error_code(), Some(ErrorCode::ConstraintViolation)) => {
            Err(AppError::NotFound)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_message(conn: &Connection, message_id: i64) -> Result<Option<Message>, AppError> {
    let msg = conn
        .query_row(
            "SELECT id, user_id, text, created_at FROM messages WHERE id = ?1",
            params![message_id],
            row_to_message,
        )
        .optional()?;
    Ok(msg)
}

/// Fetches a message together with its author's name and avatar.
pub fn get_with_author(
    conn: &Connection,
    message_id: i64,
) -> Result<Option<FeedMessage>, AppError> {
    let msg = conn
        .query_row(
            "SELECT m.id, m.user_id, m.text, m.created_at, u.username, u.image_url \
             FROM messages m JOIN users u ON u.id = m.user_id WHERE m.id = ?1",
            params![message_id],
            row_to_feed,
        )
        .optional()?;
    Ok(msg)
}

pub fn delete_message(conn: &Connection, message_id: i64) -> Result<(), AppError> {
    let n = conn.execute("DELETE FROM messages WHERE id = ?1", params![message_id])?;
    if n == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// All of one user's messages, newest first.
pub fn messages_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Message>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, text, created_at FROM messages \
         WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_message)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// The home feed for `user_id`: their own messages plus those of everyone
/// they follow, newest first, capped at [`TIMELINE_LIMIT`].
pub fn timeline(conn: &Connection, user_id: i64) -> Result<Vec<FeedMessage>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.user_id, m.text, m.created_at, u.username, u.image_url \
         FROM messages m JOIN users u ON u.id = m.user_id \
         WHERE m.user_id = ?1 \
            OR m.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?1) \
         ORDER BY m.created_at DESC, m.id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, TIMELINE_LIMIT], row_to_feed)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
