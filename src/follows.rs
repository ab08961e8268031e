use std::collections::HashSet;

use rusqlite::{params, Connection, ErrorCode};

use crate::error::AppError;
use crate::model::User;
use crate::users::row_to_user;

/// Records `follower_id` following `followed_id`. Following someone twice
/// leaves the single edge in place.
pub fn follow(conn: &Connection, follower_id: i64, followed_id: i64) -> Result<(), AppError> {
    let res = conn.execute(
        "INSERT OR IGNORE INTO follows (follower_id, followed_id) VALUES (?1, ?2)",
        params![follower_id, followed_id],
    );
    match res {
        Ok(_) => Ok(()),
        Err(e) if matches!(e.sqlite_error_code(), Some(ErrorCode::ConstraintViolation)) => {
            Err(AppError::NotFound)
        }
        Err(e) => Err(e.into()),
    }
}

/// Removes the follow edge if present. Unfollowing someone never followed
/// is a no-op.
pub fn unfollow(conn: &Connection, follower_id: i64, followed_id: i64) -> Result<(), AppError> {
    conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
        params![follower_id, followed_id],
    )?;
    Ok(())
}

pub fn is_following(
    conn: &Connection,
    follower_id: i64,
    followed_id: i64,
) -> Result<bool, AppError> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
        params![follower_id, followed_id],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

/// Users that `user_id` follows, oldest account first.
pub fn following(conn: &Connection, user_id: i64) -> Result<Vec<User>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.email, u.password_hash, u.image_url, u.header_image_url, \
         u.bio FROM users u JOIN follows f ON f.followed_id = u.id \
         WHERE f.follower_id = ?1 ORDER BY u.id",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_user)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Users that follow `user_id`, oldest account first.
pub fn followers(conn: &Connection, user_id: i64) -> Result<Vec<User>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.email, u.password_hash, u.image_url, u.header_image_url, \
         u.bio FROM users u JOIN follows f ON f.follower_id = u.id \
         WHERE f.followed_id = ?1 ORDER BY u.id",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_user)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Ids of everyone `user_id` follows, for membership checks while rendering.
pub fn following_ids(conn: &Connection, user_id: i64) -> Result<HashSet<i64>, AppError> {
    let mut stmt = conn.prepare("SELECT followed_id FROM follows WHERE follower_id = ?1")?;
    let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
    let mut out = HashSet::new();
    for row in rows {
        out.insert(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::users::create_user;

    fn conn_with_users() -> (Connection, i64, i64, i64) {
        let conn = db::init_db(":memory:").unwrap();
        let a = create_user(&conn, "alice", "a@example.com", "hunter22", None)
            .unwrap()
            .id;
        let b = create_user(&conn, "bob", "b@example.com", "hunter22", None)
            .unwrap()
            .id;
        let c = create_user(&conn, "carol", "c@example.com", "hunter22", None)
            .unwrap()
            .id;
        (conn, a, b, c)
    }

    #[test]
    fn follow_then_unfollow() {
        let (conn, alice, bob, _) = conn_with_users();

        assert!(!is_following(&conn, alice, bob).unwrap());
        follow(&conn, alice, bob).unwrap();
        assert!(is_following(&conn, alice, bob).unwrap());
        assert!(!is_following(&conn, bob, alice).unwrap());

        unfollow(&conn, alice, bob).unwrap();
        assert!(!is_following(&conn, alice, bob).unwrap());
        unfollow(&conn, alice, bob).unwrap();
    }

    #[test]
    fn following_twice_keeps_one_edge() {
        let (conn, alice, bob, _) = conn_with_users();
        follow(&conn, alice, bob).unwrap();
        follow(&conn, alice, bob).unwrap();
        assert_eq!(following(&conn, alice).unwrap().len(), 1);
    }

    #[test]
    fn follow_missing_user_is_not_found() {
        let (conn, alice, _, _) = conn_with_users();
        assert!(matches!(
            follow(&conn, alice, 999).unwrap_err(),
            AppError::NotFound
        ));
    }

    #[test]
    fn lists_both_directions() {
        let (conn, alice, bob, carol) = conn_with_users();
        follow(&conn, alice, bob).unwrap();
        follow(&conn, alice, carol).unwrap();
        follow(&conn, carol, bob).unwrap();

        let names: Vec<_> = following(&conn, alice)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["bob", "carol"]);

        let names: Vec<_> = followers(&conn, bob)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "carol"]);
        assert!(followers(&conn, alice).unwrap().is_empty());
    }

    #[test]
    fn following_ids_matches_edges() {
        let (conn, alice, bob, carol) = conn_with_users();
        follow(&conn, alice, bob).unwrap();
        follow(&conn, alice, carol).unwrap();

        let ids = following_ids(&conn, alice).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&bob));
        assert!(ids.contains(&carol));
        assert!(following_ids(&conn, bob).unwrap().is_empty());
    }
}
