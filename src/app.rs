use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, Request, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rand::RngCore;
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::auth;
use crate::config::Config;
use crate::cookies::{self, Flash};
use crate::db;
use crate::error::AppError;
use crate::follows;
use crate::forms::{CsrfForm, EditProfileForm, LoginForm, MessageForm, SignupForm};
use crate::likes;
use crate::messages;
use crate::model::User;
use crate::templates;
use crate::users;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<SqliteConnectionManager>,
    pub session_secret: Vec<u8>,
    pub login_limiter: auth::LoginRateLimiter,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let pool = db::open_pool(&config.database_path)?;
        let session_secret = match &config.session_secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                tracing::warn!("no session secret configured, sessions will not survive restarts");
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };
        Ok(Self {
            pool,
            session_secret,
            login_limiter: auth::LoginRateLimiter::new(5, std::time::Duration::from_secs(60)),
            config,
        })
    }
}

/// Build the HTTP application router.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/users", get(users_index))
        .route("/users/profile", get(profile_form).post(profile_update))
        .route("/users/delete", post(delete_profile))
        .route("/users/:id", get(users_show))
        .route("/users/:id/following", get(users_following))
        .route("/users/:id/followers", get(users_followers))
        .route("/users/follow/:id", post(follow_user))
        .route("/users/stop-following/:id", post(unfollow_user))
        .route("/messages/new", get(message_form).post(message_create))
        .route("/messages/:id", get(messages_show))
        .route("/messages/:id/like", post(like_message))
        .route("/messages/:id/unlike", post(unlike_message))
        .layer(middleware::from_fn(require_login));
    Router::new()
        .route("/", get(home))
        .route("/signup", get(signup_form).post(signup))
        .route("/login", get(login_form).post(login))
        .route("/logout", post(logout))
        .route("/static/*path", get(static_asset))
        .route("/messages/:id/delete", post(message_delete))
        .merge(protected)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(middleware::from_fn(no_store_middleware))
        .with_state(state)
}

/// The user resolved from the session cookie, if any.
#[derive(Clone)]
struct CurrentUser(Option<User>);

/// The request-forgery token every form must echo back.
#[derive(Clone)]
struct CsrfToken(String);

#[derive(Clone)]
struct RequestCookies(HashMap<String, String>);

async fn session_middleware<B>(
    State(state): State<AppState>,
    mut req: Request<B>,
    next: Next<B>,
) -> Response {
    let jar = cookies::parse(
        req.headers()
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok()),
    );
    let viewer = match resolve_user(&state, &jar) {
        Ok(viewer) => viewer,
        Err(e) => return e.into_response(),
    };
    let (csrf_token, issue_csrf) = match jar.get(cookies::CSRF_COOKIE) {
        Some(token) if !token.is_empty() => (token.clone(), false),
        _ => (cookies::new_csrf_token(), true),
    };
    req.extensions_mut().insert(CurrentUser(viewer));
    req.extensions_mut().insert(CsrfToken(csrf_token.clone()));
    req.extensions_mut().insert(RequestCookies(jar));
    let mut res = next.run(req).await;
    if issue_csrf {
        append_cookie(&mut res, &cookies::csrf(&csrf_token));
    }
    res
}

fn resolve_user(
    state: &AppState,
    jar: &HashMap<String, String>,
) -> Result<Option<User>, AppError> {
    let token = match jar.get(cookies::SESSION_COOKIE) {
        Some(token) => token,
        None => return Ok(None),
    };
    let user_id = match auth::verify_session(&state.session_secret, token) {
        Some(id) => id,
        None => return Ok(None),
    };
    let conn = state.pool.get()?;
    users::get_user(&conn, user_id)
}

async fn require_login<B>(req: Request<B>, next: Next<B>) -> Response {
    let logged_in = req
        .extensions()
        .get::<CurrentUser>()
        .map(|viewer| viewer.0.is_some())
        .unwrap_or(false);
    if !logged_in {
        return unauthorized();
    }
    next.run(req).await
}

async fn no_store_middleware<B>(req: Request<B>, next: Next<B>) -> Response {
    let mut res = next.run(req).await;
    res.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    res
}

fn append_cookie(res: &mut Response, cookie: &str) {
    if let Ok(value) = header::HeaderValue::from_str(cookie) {
        res.headers_mut().append(header::SET_COOKIE, value);
    }
}

fn redirect_flash(to: &str, flash: &Flash) -> Response {
    let mut res = Redirect::to(to).into_response();
    append_cookie(&mut res, &cookies::flash(flash));
    res
}

fn unauthorized() -> Response {
    redirect_flash("/", &Flash::danger("Access unauthorized."))
}

fn csrf_ok(jar: &HashMap<String, String>, submitted: &str) -> bool {
    !submitted.is_empty()
        && jar
            .get(cookies::CSRF_COOKIE)
            .map(|token| token == submitted)
            .unwrap_or(false)
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

/// Everything a rendered page needs besides its body: the viewer for the
/// navbar, the pending flash and the forgery token for forms.
struct PageChrome {
    viewer: Option<User>,
    csrf_token: String,
    flash: Option<Flash>,
    consumed_flash: bool,
}

fn chrome(viewer: CurrentUser, csrf: CsrfToken, jar: &RequestCookies) -> PageChrome {
    let flash = cookies::take_flash(&jar.0);
    PageChrome {
        viewer: viewer.0,
        csrf_token: csrf.0,
        consumed_flash: flash.is_some(),
        flash,
    }
}

impl PageChrome {
    /// Shows `flash` on this response instead of whatever the cookie held.
    fn with_flash(mut self, flash: Flash) -> Self {
        self.flash = Some(flash);
        self
    }

    fn respond(&self, title: &str, body: &str) -> Result<Response, AppError> {
        let html = templates::render_page(
            title,
            self.viewer.as_ref(),
            self.flash.as_ref(),
            &self.csrf_token,
            body,
        )?;
        let mut res = Html(html).into_response();
        if self.consumed_flash {
            append_cookie(&mut res, &cookies::clear(cookies::FLASH_COOKIE));
        }
        Ok(res)
    }
}

fn viewer_sets(
    conn: &Connection,
    viewer: Option<&User>,
) -> Result<(HashSet<i64>, HashSet<i64>), AppError> {
    match viewer {
        Some(v) => Ok((
            follows::following_ids(conn, v.id)?,
            likes::liked_ids(conn, v.id)?,
        )),
        None => Ok((HashSet::new(), HashSet::new())),
    }
}

async fn home(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    match chrome.viewer.clone() {
        Some(user) => {
            let conn = state.pool.get()?;
            let feed = messages::timeline(&conn, user.id)?;
            let liked = likes::liked_ids(&conn, user.id)?;
            let body = templates::home_body(&feed, user.id, &liked, &chrome.csrf_token)?;
            chrome.respond("Warbler", &body)
        }
        None => {
            let body = templates::home_anon_body()?;
            chrome.respond("Warbler", &body)
        }
    }
}

async fn signup_form(
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let body = templates::signup_body(&SignupForm::default(), &[], &chrome.csrf_token)?;
    let mut res = chrome.respond("Sign up / Warbler", &body)?;
    // Opening the signup page ends any existing session.
    append_cookie(&mut res, &cookies::clear(cookies::SESSION_COOKIE));
    Ok(res)
}

async fn signup(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let mut errors = form.validate();
    if !csrf_ok(&jar.0, &form.csrf_token) {
        errors.push("Invalid CSRF token.".to_string());
    }
    let mut flash = None;
    if errors.is_empty() {
        let conn = state.pool.get()?;
        let image = match form.image_url.trim() {
            "" => None,
            url => Some(url),
        };
        match users::create_user(&conn, &form.username, &form.email, &form.password, image) {
            Ok(user) => {
                let token = auth::issue_session(
                    &state.session_secret,
                    user.id,
                    Duration::hours(state.config.session_expire_hours),
                )?;
                let mut res = Redirect::to("/").into_response();
                append_cookie(
                    &mut res,
                    &cookies::session(&token, state.config.session_expire_hours),
                );
                return Ok(res);
            }
            Err(AppError::UsernameTaken) => flash = Some(Flash::danger("Username already taken")),
            Err(AppError::EmailTaken) => flash = Some(Flash::danger("E-mail already taken")),
            Err(e) => return Err(e),
        }
    }
    let chrome = match flash {
        Some(f) => chrome.with_flash(f),
        None => chrome,
    };
    let body = templates::signup_body(&form, &errors, &chrome.csrf_token)?;
    let mut res = chrome.respond("Sign up / Warbler", &body)?;
    append_cookie(&mut res, &cookies::clear(cookies::SESSION_COOKIE));
    Ok(res)
}

async fn login_form(
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let body = templates::login_body(&LoginForm::default(), &[], &chrome.csrf_token)?;
    chrome.respond("Log in / Warbler", &body)
}

async fn login(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let mut errors = form.validate();
    if !csrf_ok(&jar.0, &form.csrf_token) {
        errors.push("Invalid CSRF token.".to_string());
    }
    let mut flash = None;
    if errors.is_empty() {
        if !state.login_limiter.check(&form.username).await {
            flash = Some(Flash::danger("Too many login attempts. Try again soon."));
        } else {
            let conn = state.pool.get()?;
            match users::authenticate(&conn, &form.username, &form.password)? {
                Some(user) => {
                    let token = auth::issue_session(
                        &state.session_secret,
                        user.id,
                        Duration::hours(state.config.session_expire_hours),
                    )?;
                    let mut res = redirect_flash(
                        "/",
                        &Flash::success(&format!("Hello, {}!", user.username)),
                    );
                    append_cookie(
                        &mut res,
                        &cookies::session(&token, state.config.session_expire_hours),
                    );
                    return Ok(res);
                }
                None => flash = Some(Flash::danger("Invalid credentials.")),
            }
        }
    }
    let chrome = match flash {
        Some(f) => chrome.with_flash(f),
        None => chrome,
    };
    let body = templates::login_body(&form, &errors, &chrome.csrf_token)?;
    chrome.respond("Log in / Warbler", &body)
}

async fn logout(
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<CsrfForm>,
) -> Response {
    let mut res = Redirect::to("/login").into_response();
    if csrf_ok(&jar.0, &form.csrf_token) {
        append_cookie(&mut res, &cookies::clear(cookies::SESSION_COOKIE));
        append_cookie(&mut res, &cookies::flash(&Flash::info("Logged out successfully.")));
    }
    res
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

async fn users_index(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let conn = state.pool.get()?;
    let q = query.q.as_deref();
    let found = users::search_users(&conn, q)?;
    let (viewer_following, _) = viewer_sets(&conn, chrome.viewer.as_ref())?;
    let body = templates::users_body(
        &found,
        q,
        chrome.viewer.as_ref(),
        &viewer_following,
        &chrome.csrf_token,
    )?;
    chrome.respond("Users / Warbler", &body)
}

async fn users_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let user_id = parse_id(&id)?;
    let conn = state.pool.get()?;
    let user = users::get_user(&conn, user_id)?.ok_or(AppError::NotFound)?;
    let stats = users::user_stats(&conn, user.id)?;
    let msgs = messages::messages_for_user(&conn, user.id)?;
    let (viewer_following, liked) = viewer_sets(&conn, chrome.viewer.as_ref())?;
    let body = templates::user_detail_body(
        &user,
        &stats,
        &msgs,
        chrome.viewer.as_ref(),
        &viewer_following,
        &liked,
        &chrome.csrf_token,
    )?;
    chrome.respond(&format!("@{} / Warbler", user.username), &body)
}

async fn users_following(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let user_id = parse_id(&id)?;
    let conn = state.pool.get()?;
    let user = users::get_user(&conn, user_id)?.ok_or(AppError::NotFound)?;
    let stats = users::user_stats(&conn, user.id)?;
    let members = follows::following(&conn, user.id)?;
    let (viewer_following, _) = viewer_sets(&conn, chrome.viewer.as_ref())?;
    let body = templates::following_body(
        &user,
        &stats,
        &members,
        chrome.viewer.as_ref(),
        &viewer_following,
        &chrome.csrf_token,
    )?;
    chrome.respond(&format!("@{} / Warbler", user.username), &body)
}

async fn users_followers(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let user_id = parse_id(&id)?;
    let conn = state.pool.get()?;
    let user = users::get_user(&conn, user_id)?.ok_or(AppError::NotFound)?;
    let stats = users::user_stats(&conn, user.id)?;
    let members = follows::followers(&conn, user.id)?;
    let (viewer_following, _) = viewer_sets(&conn, chrome.viewer.as_ref())?;
    let body = templates::followers_body(
        &user,
        &stats,
        &members,
        chrome.viewer.as_ref(),
        &viewer_following,
        &chrome.csrf_token,
    )?;
    chrome.respond(&format!("@{} / Warbler", user.username), &body)
}

async fn follow_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    let viewer = match viewer.0 {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };
    let target = parse_id(&id)?;
    let conn = state.pool.get()?;
    if users::get_user(&conn, target)?.is_none() {
        return Err(AppError::NotFound);
    }
    if csrf_ok(&jar.0, &form.csrf_token) {
        follows::follow(&conn, viewer.id, target)?;
    }
    Ok(Redirect::to(&format!("/users/{}/following", viewer.id)).into_response())
}

async fn unfollow_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    let viewer = match viewer.0 {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };
    let target = parse_id(&id)?;
    let conn = state.pool.get()?;
    if users::get_user(&conn, target)?.is_none() {
        return Err(AppError::NotFound);
    }
    if csrf_ok(&jar.0, &form.csrf_token) {
        follows::unfollow(&conn, viewer.id, target)?;
    }
    Ok(Redirect::to(&format!("/users/{}/following", viewer.id)).into_response())
}

async fn profile_form(
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let user = match chrome.viewer.clone() {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };
    let form = EditProfileForm {
        username: user.username.clone(),
        email: user.email.clone(),
        image_url: user.image_url.clone(),
        header_image_url: user.header_image_url.clone(),
        bio: user.bio.clone().unwrap_or_default(),
        ..Default::default()
    };
    let body = templates::edit_profile_body(&form, &[], user.id, &chrome.csrf_token)?;
    chrome.respond("Edit profile / Warbler", &body)
}

async fn profile_update(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<EditProfileForm>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let user = match chrome.viewer.clone() {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };
    let mut errors = form.validate();
    if !csrf_ok(&jar.0, &form.csrf_token) {
        errors.push("Invalid CSRF token.".to_string());
    }
    let mut flash = None;
    if errors.is_empty() {
        let conn = state.pool.get()?;
        if users::authenticate(&conn, &user.username, &form.password)?.is_some() {
            match users::update_profile(
                &conn,
                user.id,
                &form.username,
                &form.email,
                &form.image_url,
                &form.header_image_url,
                &form.bio,
            ) {
                Ok(()) => {
                    return Ok(redirect_flash(
                        &format!("/users/{}", user.id),
                        &Flash::success("Edit successful!"),
                    ))
                }
                Err(AppError::UsernameTaken) => {
                    flash = Some(Flash::danger("Username already taken"))
                }
                Err(AppError::EmailTaken) => flash = Some(Flash::danger("E-mail already taken")),
                Err(e) => return Err(e),
            }
        } else {
            flash = Some(Flash::danger("Invalid credentials."));
        }
    }
    let chrome = match flash {
        Some(f) => chrome.with_flash(f),
        None => chrome,
    };
    let body = templates::edit_profile_body(&form, &errors, user.id, &chrome.csrf_token)?;
    chrome.respond("Edit profile / Warbler", &body)
}

async fn delete_profile(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    let viewer = match viewer.0 {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };
    let mut res = Redirect::to("/signup").into_response();
    if csrf_ok(&jar.0, &form.csrf_token) {
        let conn = state.pool.get()?;
        users::delete_user(&conn, viewer.id)?;
        append_cookie(&mut res, &cookies::clear(cookies::SESSION_COOKIE));
    }
    Ok(res)
}

async fn message_form(
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let body = templates::new_message_body(&MessageForm::default(), &[], &chrome.csrf_token)?;
    chrome.respond("New message / Warbler", &body)
}

async fn message_create(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<MessageForm>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let user = match chrome.viewer.clone() {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };
    let mut errors = form.validate();
    if !csrf_ok(&jar.0, &form.csrf_token) {
        errors.push("Invalid CSRF token.".to_string());
    }
    if errors.is_empty() {
        let conn = state.pool.get()?;
        messages::create_message(&conn, user.id, &form.text)?;
        return Ok(Redirect::to(&format!("/users/{}", user.id)).into_response());
    }
    let body = templates::new_message_body(&form, &errors, &chrome.csrf_token)?;
    chrome.respond("New message / Warbler", &body)
}

async fn messages_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Extension(jar): Extension<RequestCookies>,
) -> Result<Response, AppError> {
    let chrome = chrome(viewer, csrf, &jar);
    let message_id = parse_id(&id)?;
    let conn = state.pool.get()?;
    let msg = messages::get_with_author(&conn, message_id)?.ok_or(AppError::NotFound)?;
    let liking = match &chrome.viewer {
        Some(v) => likes::is_liking(&conn, v.id, msg.id)?,
        None => false,
    };
    let body =
        templates::message_detail_body(&msg, chrome.viewer.as_ref(), liking, &chrome.csrf_token)?;
    chrome.respond("Message / Warbler", &body)
}

async fn message_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    let message_id = parse_id(&id)?;
    let conn = state.pool.get()?;
    let msg = messages::get_message(&conn, message_id)?.ok_or(AppError::NotFound)?;
    let viewer = match viewer.0 {
        Some(user) if user.id == msg.user_id => user,
        _ => return Ok(unauthorized()),
    };
    if csrf_ok(&jar.0, &form.csrf_token) {
        messages::delete_message(&conn, msg.id)?;
    }
    Ok(Redirect::to(&format!("/users/{}", viewer.id)).into_response())
}

async fn like_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    let viewer = match viewer.0 {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };
    let message_id = parse_id(&id)?;
    let conn = state.pool.get()?;
    let msg = messages::get_message(&conn, message_id)?.ok_or(AppError::NotFound)?;
    if csrf_ok(&jar.0, &form.csrf_token) && viewer.id != msg.user_id {
        likes::like_message(&conn, viewer.id, msg.id)?;
    }
    Ok(Redirect::to("/").into_response())
}

async fn unlike_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(jar): Extension<RequestCookies>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    let viewer = match viewer.0 {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };
    let message_id = parse_id(&id)?;
    let conn = state.pool.get()?;
    let msg = messages::get_message(&conn, message_id)?.ok_or(AppError::NotFound)?;
    if csrf_ok(&jar.0, &form.csrf_token) && viewer.id != msg.user_id {
        likes::unlike_message(&conn, viewer.id, msg.id)?;
    }
    Ok(Redirect::to("/").into_response())
}

async fn static_asset(Path(path): Path<String>) -> Response {
    templates::static_response(&path)
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(templates::not_found_page())).into_response()
}

/// Run the HTTP server with the provided configuration.
pub async fn run_http_server(config: Config) -> Result<()> {
    let addr: SocketAddr = config.bind.parse()?;
    tracing::info!(bind = %addr, database = %config.database_path.display(), "starting warbler");
    let state = AppState::new(config)?;
    axum::Server::bind(&addr)
        .serve(build_router(state).into_make_service())
        .await?;
    Ok(())
}
