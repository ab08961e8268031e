use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::auth;
use crate::error::AppError;
use crate::model::{User, UserStats, DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL};

pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
    })
}

/// Creates an account with a freshly hashed password. A blank avatar URL
/// falls back to the stock image.
pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
    image_url: Option<&str>,
) -> Result<User, AppError> {
    let username = username.trim();
    let email = email.trim();
    let password_hash = auth::hash_password(password)?;
    let image = match image_url.map(str::trim) {
        Some(url) if !url.is_empty() => url,
        _ => DEFAULT_IMAGE_URL,
    };
    let res = conn.execute(
        "INSERT INTO users (username, email, password_hash, image_url, header_image_url) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![username, email, password_hash, image, DEFAULT_HEADER_IMAGE_URL],
    );
    match res {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            get_user(conn, id)?.ok_or(AppError::NotFound)
        }
        Err(e) if matches!(e.sqlite_error_code(), Some(ErrorCode::ConstraintViolation)) => {
            if username_exists(conn, username)? {
                Err(AppError::UsernameTaken)
            } else {
                Err(AppError::EmailTaken)
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Looks the user up by name and checks the password. Returns `None` for
/// unknown names and wrong passwords alike.
pub fn authenticate(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    match get_by_username(conn, username.trim())? {
        Some(user) if auth::verify_password(password, &user.password_hash) => Ok(Some(user)),
        _ => Ok(None),
    }
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>, AppError> {
    let user = conn
        .query_row(
            "SELECT id, username, email, password_hash, image_url, header_image_url, bio \
             FROM users WHERE id = ?1",
            params![user_id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn get_by_username(conn: &Connection, username: &str) -> Result<Option<User>, AppError> {
    let user = conn
        .query_row(
            "SELECT id, username, email, password_hash, image_url, header_image_url, bio \
             FROM users WHERE username = ?1",
            params![username],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Lists users whose name contains `query`, or everyone when no query is
/// given. Ordered by signup so results are stable.
pub fn search_users(conn: &Connection, query: Option<&str>) -> Result<Vec<User>, AppError> {
    let mut out = Vec::new();
    match query.map(str::trim) {
        Some(q) if !q.is_empty() => {
            let pattern = format!("%{}%", q);
            let mut stmt = conn.prepare(
                "SELECT id, username, email, password_hash, image_url, header_image_url, bio \
                 FROM users WHERE username LIKE ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![pattern], row_to_user)?;
            for row in rows {
                out.push(row?);
            }
        }
        _ => {
            let mut stmt = conn.prepare(
                "SELECT id, username, email, password_hash, image_url, header_image_url, bio \
                 FROM users ORDER BY id",
            )?;
            let rows = stmt.query_map([], row_to_user)?;
            for row in rows {
                out.push(row?);
            }
        }
    }
    Ok(out)
}

/// Rewrites the profile fields. Blank image URLs fall back to the stock
/// images and a blank bio is stored as NULL.
pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    username: &str,
    email: &str,
    image_url: &str,
    header_image_url: &str,
    bio: &str,
) -> Result<(), AppError> {
    let username = username.trim();
    let email = email.trim();
    let image = match image_url.trim() {
        "" => DEFAULT_IMAGE_URL,
        url => url,
    };
    let header = match header_image_url.trim() {
        "" => DEFAULT_HEADER_IMAGE_URL,
        url => url,
    };
    let bio = match bio.trim() {
        "" => None,
        b => Some(b),
    };
    let res = conn.execute(
        "UPDATE users SET username = ?1, email = ?2, image_url = ?3, header_image_url = ?4, \
         bio = ?5 WHERE id = ?6",
        params![username, email, image, header, bio, user_id],
    );
    match res {
        Ok(0) => Err(AppError::NotFound),
        Ok(_) => Ok(()),
        Err(e) if matches!(e.sqlite_error_code(), Some(ErrorCode::ConstraintViolation)) => {
            let taken: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE username = ?1 AND id <> ?2",
                params![username, user_id],
                |row| row.get(0),
            )?;
            if taken > 0 {
                Err(AppError::UsernameTaken)
            } else {
                Err(AppError::EmailTaken)
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Removes the account. Messages, follows and likes go with it through
/// the cascading foreign keys.
pub fn delete_user(conn: &Connection, user_id: i64) -> Result<(), AppError> {
    let n = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    if n == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub fn user_stats(conn: &Connection, user_id: i64) -> Result<UserStats, AppError> {
    let stats = conn.query_row(
        "SELECT \
            (SELECT COUNT(*) FROM messages WHERE user_id = ?1), \
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1), \
            (SELECT COUNT(*) FROM follows WHERE followed_id = ?1), \
            (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
        params![user_id],
        |row| {
            Ok(UserStats {
                messages: row.get(0)?,
                following: row.get(1)?,
                followers: row.get(2)?,
                likes: row.get(3)?,
            })
        },
    )?;
    Ok(stats)
}

fn username_exists(conn: &Connection, username: &str) -> Result<bool, AppError> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}
