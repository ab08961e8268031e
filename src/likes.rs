use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppError;

/// Marks `message_id` as liked by `user_id`. Liking twice keeps a single
/// row and liking your own message is silently skipped.
pub fn like_message(conn: &Connection, user_id: i64, message_id: i64) -> Result<(), AppError> {
    let author: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM messages WHERE id = ?1",
            params![message_id],
            |row| row.get(0),
        )
        .optional()?;
    match author {
        None => Err(AppError::NotFound),
        Some(author) if author == user_id => Ok(()),
        Some(_) => {
            conn.execute(
                "INSERT OR IGNORE INTO likes (user_id, message_id) VALUES (?1, ?2)",
                params![user_id, message_id],
            )?;
            Ok(())
        }
    }
}

/// Removes the like if present. Unliking something never liked is a no-op.
pub fn unlike_message(conn: &Connection, user_id: i64, message_id: i64) -> Result<(), AppError> {
    conn.execute(
        "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
        params![user_id, message_id],
    )?;
    Ok(())
}

pub fn is_liking(conn: &Connection, user_id: i64, message_id: i64) -> Result<bool, AppError> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE user_id = ?1 AND message_id = ?2",
        params![user_id, message_id],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

/// Ids of every message `user_id` has liked, for rendering star state.
pub fn liked_ids(conn: &Connection, user_id: i64) -> Result<HashSet<i64>, AppError> {
    let mut stmt = conn.prepare("SELECT message_id FROM likes WHERE user_id = ?1")?;
    let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
    let mut out = HashSet::new();
    for row in rows {
        out.insert(row?);
    }
    Ok(out)
}
