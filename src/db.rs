use anyhow::Result;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

/// Open a single connection and apply the schema. Used by unit tests.
pub fn init_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// Open the shared connection pool and apply the schema.
pub fn open_pool<P: AsRef<Path>>(path: P) -> Result<Pool<SqliteConnectionManager>> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
    });
    let pool = Pool::new(manager)?;
    pool.get()?.execute_batch(SCHEMA)?;
    Ok(pool)
}

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  username TEXT UNIQUE NOT NULL,
  email TEXT UNIQUE NOT NULL,
  password_hash TEXT NOT NULL,
  image_url TEXT NOT NULL,
  header_image_url TEXT NOT NULL,
  bio TEXT
);

CREATE TABLE IF NOT EXISTS messages (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  text TEXT NOT NULL,
  created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS follows (
  follower_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  followed_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  PRIMARY KEY (follower_id, followed_id)
);

CREATE TABLE IF NOT EXISTS likes (
  user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  message_id INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
  PRIMARY KEY (user_id, message_id)
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    #[test]
    fn schema_applies_twice() {
        let conn = init_db(":memory:").unwrap();
        conn.execute_batch(SCHEMA).unwrap();
    }

    #[test]
    fn foreign_keys_enforced() {
        let conn = init_db(":memory:").unwrap();
        let res = conn.execute(
            "INSERT INTO messages (user_id, text, created_at) VALUES (999, 'hi', 0)",
            [],
        );
        assert!(res.is_err());
    }

    #[test]
    fn deleting_a_user_cascades() {
        let conn = init_db(":memory:").unwrap();
        conn.execute(
            "INSERT INTO users (username, email, password_hash, image_url, header_image_url)
             VALUES ('a', 'a@x.com', 'h', '/i', '/h')",
            [],
        )
        .unwrap();
        let uid = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO messages (user_id, text, created_at) VALUES (?1, 'hi', 0)",
            params![uid],
        )
        .unwrap();
        conn.execute("DELETE FROM users WHERE id = ?1", params![uid])
            .unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
