use std::net::{SocketAddr, TcpListener};

use tokio::task::JoinHandle;
use warbler::{
    app::{build_router, AppState},
    config::Config,
    follows, messages, users,
};

async fn spawn_server() -> (SocketAddr, JoinHandle<()>, AppState, tempfile::TempDir) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let config = Config {
        bind: addr.to_string(),
        database_path: tmp.path().join("warbler.db"),
        session_secret: Some("integration-test-secret".to_string()),
        session_expire_hours: 24,
        logging_enabled: false,
    };
    let state = AppState::new(config).unwrap();
    let app = build_router(state.clone());
    let server = tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    (addr, server, state, tmp)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

async fn get_text(client: &reqwest::Client, addr: SocketAddr, path: &str) -> String {
    client
        .get(url(addr, path))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
}

fn csrf_from(html: &str) -> String {
    let marker = "name=\"csrf_token\" value=\"";
    let start = html.find(marker).expect("page should embed a csrf token") + marker.len();
    let end = html[start..].find('"').unwrap() + start;
    html[start..end].to_string()
}

async fn sign_up(client: &reqwest::Client, addr: SocketAddr, username: &str) {
    let html = get_text(client, addr, "/signup").await;
    let csrf = csrf_from(&html);
    let email = format!("{}@example.com", username);
    let resp = client
        .post(url(addr, "/signup"))
        .form(&[
            ("username", username),
            ("email", email.as_str()),
            ("password", "hunter22"),
            ("csrf_token", csrf.as_str()),
        ])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

async fn post_message(client: &reqwest::Client, addr: SocketAddr, text: &str) {
    let html = get_text(client, addr, "/messages/new").await;
    let csrf = csrf_from(&html);
    let resp = client
        .post(url(addr, "/messages/new"))
        .form(&[("text", text), ("csrf_token", csrf.as_str())])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

fn user_id(state: &AppState, username: &str) -> i64 {
    let conn = state.pool.get().unwrap();
    users::get_by_username(&conn, username).unwrap().unwrap().id
}

fn latest_message_id(state: &AppState, username: &str) -> i64 {
    let conn = state.pool.get().unwrap();
    let user = users::get_by_username(&conn, username).unwrap().unwrap();
    messages::messages_for_user(&conn, user.id)
        .unwrap()
        .first()
        .unwrap()
        .id
}

fn count(state: &AppState, sql: &str) -> i64 {
    let conn = state.pool.get().unwrap();
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[tokio::test]
async fn signup_login_logout_flow() {
    let (addr, server, _state, _tmp) = spawn_server().await;
    let client = client();

    // anonymous landing page
    let html = get_text(&client, addr, "/").await;
    assert!(html.contains("What's Happening?"));

    // signup logs the new user in and lands on the timeline
    sign_up(&client, addr, "alice").await;
    let html = get_text(&client, addr, "/").await;
    assert!(html.contains("Your timeline"));
    assert!(html.contains("@alice"));

    // logout needs the forgery token from the navbar form
    let csrf = csrf_from(&html);
    let resp = client
        .post(url(addr, "/logout"))
        .form(&[("csrf_token", csrf.as_str())])
        .send()
        .await
        .unwrap();
    let html = resp.text().await.unwrap();
    assert!(html.contains("Welcome back."));
    assert!(html.contains("Logged out successfully."));

    let html = get_text(&client, addr, "/").await;
    assert!(html.contains("What's Happening?"));

    // wrong password re-renders the login form
    let login_page = get_text(&client, addr, "/login").await;
    let csrf = csrf_from(&login_page);
    let resp = client
        .post(url(addr, "/login"))
        .form(&[
            ("username", "alice"),
            ("password", "wrong-password"),
            ("csrf_token", csrf.as_str()),
        ])
        .send()
        .await
        .unwrap();
    let html = resp.text().await.unwrap();
    assert!(html.contains("Invalid credentials."));

    // correct password greets the user on the timeline
    let resp = client
        .post(url(addr, "/login"))
        .form(&[
            ("username", "alice"),
            ("password", "hunter22"),
            ("csrf_token", csrf.as_str()),
        ])
        .send()
        .await
        .unwrap();
    let html = resp.text().await.unwrap();
    assert!(html.contains("Hello, alice!"));
    assert!(html.contains("Your timeline"));

    server.abort();
}

#[tokio::test]
async fn duplicate_signup_keeps_original_account() {
    let (addr, server, state, _tmp) = spawn_server().await;
    let alice = client();
    sign_up(&alice, addr, "alice").await;

    // same username, different email
    let intruder = client();
    let html = get_text(&intruder, addr, "/signup").await;
    let csrf = csrf_from(&html);
    let resp = intruder
        .post(url(addr, "/signup"))
        .form(&[
            ("username", "alice"),
            ("email", "other@example.com"),
            ("password", "different"),
            ("csrf_token", csrf.as_str()),
        ])
        .send()
        .await
        .unwrap();
    let html = resp.text().await.unwrap();
    assert!(html.contains("Username already taken"));

    // same email, different username
    let resp = intruder
        .post(url(addr, "/signup"))
        .form(&[
            ("username", "somebody"),
            ("email", "alice@example.com"),
            ("password", "different"),
            ("csrf_token", csrf.as_str()),
        ])
        .send()
        .await
        .unwrap();
    let html = resp.text().await.unwrap();
    assert!(html.contains("E-mail already taken"));

    // the original account is untouched
    assert_eq!(count(&state, "SELECT COUNT(*) FROM users"), 1);
    let conn = state.pool.get().unwrap();
    assert!(users::authenticate(&conn, "alice", "hunter22")
        .unwrap()
        .is_some());
    assert!(users::authenticate(&conn, "alice", "different")
        .unwrap()
        .is_none());

    server.abort();
}

#[tokio::test]
async fn follow_unfollow_shapes_the_timeline() {
    let (addr, server, state, _tmp) = spawn_server().await;
    let alice = client();
    let bob = client();
    let carol = client();
    sign_up(&alice, addr, "alice").await;
    sign_up(&bob, addr, "bob").await;
    sign_up(&carol, addr, "carol").await;

    post_message(&bob, addr, "bob says hi").await;
    post_message(&carol, addr, "carol was here").await;
    post_message(&alice, addr, "my own words").await;

    // not following anyone: only own messages
    let html = get_text(&alice, addr, "/").await;
    assert!(html.contains("my own words"));
    assert!(!html.contains("bob says hi"));

    // follow bob, twice to prove the edge stays single
    let bob_id = user_id(&state, "bob");
    let alice_id = user_id(&state, "alice");
    let csrf = csrf_from(&html);
    for _ in 0..2 {
        let resp = alice
            .post(url(addr, &format!("/users/follow/{}", bob_id)))
            .form(&[("csrf_token", csrf.as_str())])
            .send()
            .await
            .unwrap();
        let html = resp.text().await.unwrap();
        assert!(html.contains("Following"));
        assert!(html.contains("@bob"));
    }
    assert_eq!(count(&state, "SELECT COUNT(*) FROM follows"), 1);

    // timeline now carries bob but not carol
    let html = get_text(&alice, addr, "/").await;
    assert!(html.contains("bob says hi"));
    assert!(html.contains("my own words"));
    assert!(!html.contains("carol was here"));

    // bob sees alice among his followers
    let html = get_text(&bob, addr, &format!("/users/{}/followers", bob_id)).await;
    assert!(html.contains("@alice"));

    // unfollow twice, second one is a no-op
    for _ in 0..2 {
        let resp = alice
            .post(url(addr, &format!("/users/stop-following/{}", bob_id)))
            .form(&[("csrf_token", csrf.as_str())])
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
    }
    assert_eq!(count(&state, "SELECT COUNT(*) FROM follows"), 0);
    let html = get_text(&alice, addr, "/").await;
    assert!(!html.contains("bob says hi"));

    let conn = state.pool.get().unwrap();
    assert!(!follows::is_following(&conn, alice_id, bob_id).unwrap());

    server.abort();
}

#[tokio::test]
async fn likes_are_idempotent_and_never_own_messages() {
    let (addr, server, state, _tmp) = spawn_server().await;
    let alice = client();
    let bob = client();
    sign_up(&alice, addr, "alice").await;
    sign_up(&bob, addr, "bob").await;

    post_message(&bob, addr, "like me maybe").await;
    let msg_id = latest_message_id(&state, "bob");

    // like twice: a single row
    let html = get_text(&alice, addr, &format!("/messages/{}", msg_id)).await;
    assert!(html.contains(&format!("/messages/{}/like", msg_id)));
    let csrf = csrf_from(&html);
    for _ in 0..2 {
        let resp = alice
            .post(url(addr, &format!("/messages/{}/like", msg_id)))
            .form(&[("csrf_token", csrf.as_str())])
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
    }
    assert_eq!(count(&state, "SELECT COUNT(*) FROM likes"), 1);

    // the message page now offers unlike
    let html = get_text(&alice, addr, &format!("/messages/{}", msg_id)).await;
    assert!(html.contains(&format!("/messages/{}/unlike", msg_id)));

    // liking your own message is silently skipped
    let bob_html = get_text(&bob, addr, "/").await;
    let bob_csrf = csrf_from(&bob_html);
    let resp = bob
        .post(url(addr, &format!("/messages/{}/like", msg_id)))
        .form(&[("csrf_token", bob_csrf.as_str())])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(count(&state, "SELECT COUNT(*) FROM likes"), 1);

    // unlike twice ends with no rows
    for _ in 0..2 {
        let resp = alice
            .post(url(addr, &format!("/messages/{}/unlike", msg_id)))
            .form(&[("csrf_token", csrf.as_str())])
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
    }
    assert_eq!(count(&state, "SELECT COUNT(*) FROM likes"), 0);

    server.abort();
}

#[tokio::test]
async fn message_create_view_delete() {
    let (addr, server, state, _tmp) = spawn_server().await;
    let alice = client();
    let bob = client();
    sign_up(&alice, addr, "alice").await;
    sign_up(&bob, addr, "bob").await;

    post_message(&alice, addr, "read me then delete me").await;
    let msg_id = latest_message_id(&state, "alice");
    let alice_id = user_id(&state, "alice");

    // visible on the profile and detail pages
    let html = get_text(&alice, addr, &format!("/users/{}", alice_id)).await;
    assert!(html.contains("read me then delete me"));
    let html = get_text(&alice, addr, &format!("/messages/{}", msg_id)).await;
    assert!(html.contains("read me then delete me"));

    // someone else cannot delete it
    let bob_html = get_text(&bob, addr, "/").await;
    let bob_csrf = csrf_from(&bob_html);
    let resp = bob
        .post(url(addr, &format!("/messages/{}/delete", msg_id)))
        .form(&[("csrf_token", bob_csrf.as_str())])
        .send()
        .await
        .unwrap();
    let html = resp.text().await.unwrap();
    assert!(html.contains("Access unauthorized."));
    assert_eq!(count(&state, "SELECT COUNT(*) FROM messages"), 1);

    // the author can
    let html = get_text(&alice, addr, &format!("/messages/{}", msg_id)).await;
    let csrf = csrf_from(&html);
    let resp = alice
        .post(url(addr, &format!("/messages/{}/delete", msg_id)))
        .form(&[("csrf_token", csrf.as_str())])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(count(&state, "SELECT COUNT(*) FROM messages"), 0);

    let resp = alice
        .get(url(addr, &format!("/messages/{}", msg_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    server.abort();
}

#[tokio::test]
async fn deleting_a_user_removes_everything_they_own() {
    let (addr, server, state, _tmp) = spawn_server().await;
    let alice = client();
    let bob = client();
    sign_up(&alice, addr, "alice").await;
    sign_up(&bob, addr, "bob").await;

    post_message(&bob, addr, "first").await;
    post_message(&bob, addr, "second").await;
    let bob_id = user_id(&state, "bob");
    let msg_id = latest_message_id(&state, "bob");

    // alice follows bob and likes one of his messages
    let html = get_text(&alice, addr, "/").await;
    let csrf = csrf_from(&html);
    alice
        .post(url(addr, &format!("/users/follow/{}", bob_id)))
        .form(&[("csrf_token", csrf.as_str())])
        .send()
        .await
        .unwrap();
    alice
        .post(url(addr, &format!("/messages/{}/like", msg_id)))
        .form(&[("csrf_token", csrf.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(count(&state, "SELECT COUNT(*) FROM follows"), 1);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM likes"), 1);

    // bob deletes his account and lands on the signup page
    let bob_html = get_text(&bob, addr, "/").await;
    let bob_csrf = csrf_from(&bob_html);
    let resp = bob
        .post(url(addr, "/users/delete"))
        .form(&[("csrf_token", bob_csrf.as_str())])
        .send()
        .await
        .unwrap();
    let html = resp.text().await.unwrap();
    assert!(html.contains("Join Warbler today."));

    // his rows and every edge touching them are gone
    assert_eq!(count(&state, "SELECT COUNT(*) FROM users"), 1);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM messages"), 0);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM follows"), 0);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM likes"), 0);

    // his session is gone and his profile 404s
    let html = get_text(&bob, addr, "/").await;
    assert!(html.contains("What's Happening?"));
    let resp = alice
        .get(url(addr, &format!("/users/{}", bob_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    server.abort();
}

#[tokio::test]
async fn login_attempts_are_rate_limited() {
    let (addr, server, _state, _tmp) = spawn_server().await;
    let client = client();
    sign_up(&client, addr, "alice").await;

    let html = get_text(&client, addr, "/login").await;
    let csrf = csrf_from(&html);
    let mut last = String::new();
    for _ in 0..6 {
        let resp = client
            .post(url(addr, "/login"))
            .form(&[
                ("username", "alice"),
                ("password", "wrong-password"),
                ("csrf_token", csrf.as_str()),
            ])
            .send()
            .await
            .unwrap();
        last = resp.text().await.unwrap();
    }
    assert!(last.contains("Too many login attempts."));

    server.abort();
}
