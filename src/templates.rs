use std::borrow::Cow;
use std::collections::HashSet;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use rust_embed::RustEmbed;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::cookies::Flash;
use crate::error::AppError;
use crate::forms::{EditProfileForm, LoginForm, MessageForm, SignupForm};
use crate::model::{FeedMessage, Message, User, UserStats};

#[derive(RustEmbed)]
#[folder = "templates"]
struct Templates;

#[derive(RustEmbed)]
#[folder = "static"]
struct Assets;

fn load(name: &'static str) -> Result<String, AppError> {
    let file = Templates::get(name).ok_or(AppError::MissingTemplate(name))?;
    Ok(String::from_utf8_lossy(file.data.as_ref()).into_owned())
}

fn esc(text: &str) -> String {
    html_escape::encode_text(text).to_string()
}

fn esc_attr(text: &str) -> String {
    html_escape::encode_quoted_attribute(text).to_string()
}

/// Renders a unix timestamp like "12 August 2026".
pub fn format_date(ts: i64) -> String {
    match OffsetDateTime::from_unix_timestamp(ts) {
        Ok(dt) => dt
            .format(format_description!("[day padding:none] [month repr:long] [year]"))
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

fn nav_links(viewer: Option<&User>, csrf_token: &str) -> String {
    match viewer {
        Some(user) => format!(
            r#"<form class="nav-search" method="get" action="/users">
        <input type="text" name="q" placeholder="Search Warbler">
      </form>
      <ul class="nav-links">
        <li><a href="/users/{id}">@{username}</a></li>
        <li><a href="/messages/new">New Message</a></li>
        <li>
          <form method="post" action="/logout">
            <input type="hidden" name="csrf_token" value="{csrf}">
            <button type="submit" class="link-button">Log out</button>
          </form>
        </li>
      </ul>"#,
            id = user.id,
            username = esc(&user.username),
            csrf = esc_attr(csrf_token),
        ),
        None => r#"<ul class="nav-links">
        <li><a href="/login">Log in</a></li>
        <li><a href="/signup">Sign up</a></li>
      </ul>"#
            .to_string(),
    }
}

fn flash_banner(flash: Option<&Flash>) -> String {
    match flash {
        Some(f) => format!(
            r#"<div class="alert alert-{}">{}</div>"#,
            esc_attr(&f.category),
            esc(&f.message)
        ),
        None => String::new(),
    }
}

fn form_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let mut items = String::new();
    for error in errors {
        items.push_str(&format!("<li>{}</li>", esc(error)));
    }
    format!(r#"<ul class="form-errors">{}</ul>"#, items)
}

/// Wraps a body fragment in the shared layout with navbar and flash banner.
pub fn render_page(
    title: &str,
    viewer: Option<&User>,
    flash: Option<&Flash>,
    csrf_token: &str,
    body: &str,
) -> Result<String, AppError> {
    let mut html = load("layout.html")?;
    html = html.replace("PAGE_TITLE", &esc(title));
    html = html.replace("NAV_LINKS", &nav_links(viewer, csrf_token));
    html = html.replace("FLASH_BANNER", &flash_banner(flash));
    html = html.replace("PAGE_BODY", body);
    Ok(html)
}

fn like_form(message: &FeedMessage, liked: bool, csrf_token: &str) -> String {
    let (action, star, label) = if liked {
        (format!("/messages/{}/unlike", message.id), "&#9733;", "Unlike")
    } else {
        (format!("/messages/{}/like", message.id), "&#9734;", "Like")
    };
    format!(
        r#"<form class="like-form" method="post" action="{action}">
        <input type="hidden" name="csrf_token" value="{csrf}">
        <button type="submit" title="{label}">{star}</button>
      </form>"#,
        action = action,
        csrf = esc_attr(csrf_token),
        label = label,
        star = star,
    )
}

fn delete_message_form(message_id: i64, csrf_token: &str) -> String {
    format!(
        r#"<form class="delete-form" method="post" action="/messages/{id}/delete">
        <input type="hidden" name="csrf_token" value="{csrf}">
        <button type="submit">Delete</button>
      </form>"#,
        id = message_id,
        csrf = esc_attr(csrf_token),
    )
}

fn feed_item(
    message: &FeedMessage,
    viewer_id: Option<i64>,
    liked: &HashSet<i64>,
    csrf_token: &str,
) -> String {
    let actions = match viewer_id {
        Some(viewer) if viewer != message.user_id => {
            like_form(message, liked.contains(&message.id), csrf_token)
        }
        _ => String::new(),
    };
    format!(
        r#"<li class="feed-item">
      <a href="/users/{user_id}"><img class="avatar" src="{image}" alt="{username}"></a>
      <div class="feed-body">
        <a class="author" href="/users/{user_id}">@{username}</a>
        <p class="text"><a href="/messages/{id}">{text}</a></p>
        <span class="timestamp">{date}</span>
      </div>
      {actions}
    </li>
"#,
        id = message.id,
        user_id = message.user_id,
        image = esc_attr(&message.image_url),
        username = esc(&message.username),
        text = esc(&message.text),
        date = format_date(message.created_at),
        actions = actions,
    )
}

fn follow_form(
    user: &User,
    viewer: Option<&User>,
    viewer_following: &HashSet<i64>,
    csrf_token: &str,
) -> String {
    match viewer {
        Some(v) if v.id != user.id => {
            let (action, label) = if viewer_following.contains(&user.id) {
                (format!("/users/stop-following/{}", user.id), "Unfollow")
            } else {
                (format!("/users/follow/{}", user.id), "Follow")
            };
            format!(
                r#"<form class="follow-form" method="post" action="{action}">
        <input type="hidden" name="csrf_token" value="{csrf}">
        <button type="submit">{label}</button>
      </form>"#,
                action = action,
                csrf = esc_attr(csrf_token),
                label = label,
            )
        }
        _ => String::new(),
    }
}

fn user_card(
    user: &User,
    viewer: Option<&User>,
    viewer_following: &HashSet<i64>,
    csrf_token: &str,
) -> String {
    let bio_line = user
        .bio
        .as_ref()
        .map(|bio| format!(r#"<p class="bio">{}</p>"#, esc(bio)))
        .unwrap_or_default();
    format!(
        r#"<li class="user-card">
      <a href="/users/{id}"><img class="avatar" src="{image}" alt="{username}"></a>
      <div class="card-body">
        <a class="author" href="/users/{id}">@{username}</a>
        {bio_line}
      </div>
      {follow_form}
    </li>
"#,
        id = user.id,
        image = esc_attr(&user.image_url),
        username = esc(&user.username),
        bio_line = bio_line,
        follow_form = follow_form(user, viewer, viewer_following, csrf_token),
    )
}

fn profile_header(
    user: &User,
    stats: &UserStats,
    viewer: Option<&User>,
    viewer_following: &HashSet<i64>,
    csrf_token: &str,
) -> String {
    let bio_line = user
        .bio
        .as_ref()
        .map(|bio| format!(r#"<p class="bio">{}</p>"#, esc(bio)))
        .unwrap_or_default();
    let actions = match viewer {
        Some(v) if v.id == user.id => format!(
            r#"<div class="profile-actions">
        <a class="btn" href="/users/profile">Edit Profile</a>
        <form method="post" action="/users/delete">
          <input type="hidden" name="csrf_token" value="{csrf}">
          <button type="submit" class="btn-danger">Delete Profile</button>
        </form>
      </div>"#,
            csrf = esc_attr(csrf_token),
        ),
        Some(_) => follow_form(user, viewer, viewer_following, csrf_token),
        None => String::new(),
    };
    format!(
        r#"<header class="profile" style="background-image: url('{header}')">
      <img class="profile-avatar" src="{image}" alt="{username}">
      <div class="profile-info">
        <h2>@{username}</h2>
        {bio_line}
        <ul class="stats">
          <li><a href="/users/{id}">{messages}</a> Messages</li>
          <li><a href="/users/{id}/following">{following}</a> Following</li>
          <li><a href="/users/{id}/followers">{followers}</a> Followers</li>
          <li>{likes} Likes</li>
        </ul>
        {actions}
      </div>
    </header>"#,
        id = user.id,
        header = esc_attr(&user.header_image_url),
        image = esc_attr(&user.image_url),
        username = esc(&user.username),
        bio_line = bio_line,
        messages = stats.messages,
        following = stats.following,
        followers = stats.followers,
        likes = stats.likes,
        actions = actions,
    )
}

pub fn home_body(
    feed: &[FeedMessage],
    viewer_id: i64,
    liked: &HashSet<i64>,
    csrf_token: &str,
) -> Result<String, AppError> {
    let items = if feed.is_empty() {
        r#"<li class="empty">No messages yet. Follow people to fill your timeline.</li>"#
            .to_string()
    } else {
        let mut out = String::new();
        for message in feed {
            out.push_str(&feed_item(message, Some(viewer_id), liked, csrf_token));
        }
        out
    };
    Ok(load("home.html")?.replace("FEED_MESSAGES", &items))
}

pub fn home_anon_body() -> Result<String, AppError> {
    load("home_anon.html")
}

pub fn signup_body(
    form: &SignupForm,
    errors: &[String],
    csrf_token: &str,
) -> Result<String, AppError> {
    let mut html = load("signup.html")?;
    html = html.replace("FORM_ERRORS", &form_errors(errors));
    html = html.replace("CSRF_TOKEN", &esc_attr(csrf_token));
    html = html.replace("USERNAME_VALUE", &esc_attr(&form.username));
    html = html.replace("EMAIL_VALUE", &esc_attr(&form.email));
    html = html.replace("IMAGE_URL_VALUE", &esc_attr(&form.image_url));
    Ok(html)
}

pub fn login_body(
    form: &LoginForm,
    errors: &[String],
    csrf_token: &str,
) -> Result<String, AppError> {
    let mut html = load("login.html")?;
    html = html.replace("FORM_ERRORS", &form_errors(errors));
    html = html.replace("CSRF_TOKEN", &esc_attr(csrf_token));
    html = html.replace("USERNAME_VALUE", &esc_attr(&form.username));
    Ok(html)
}

pub fn users_body(
    users: &[User],
    query: Option<&str>,
    viewer: Option<&User>,
    viewer_following: &HashSet<i64>,
    csrf_token: &str,
) -> Result<String, AppError> {
    let heading = match query.map(str::trim) {
        Some(q) if !q.is_empty() => format!("Users matching \"{}\"", esc(q)),
        _ => "All users".to_string(),
    };
    let cards = if users.is_empty() {
        r#"<li class="empty">Sorry, no users found.</li>"#.to_string()
    } else {
        let mut out = String::new();
        for user in users {
            out.push_str(&user_card(user, viewer, viewer_following, csrf_token));
        }
        out
    };
    let mut html = load("users.html")?;
    html = html.replace("SEARCH_HEADING", &heading);
    html = html.replace("USER_CARDS", &cards);
    Ok(html)
}

pub fn user_detail_body(
    user: &User,
    stats: &UserStats,
    messages: &[Message],
    viewer: Option<&User>,
    viewer_following: &HashSet<i64>,
    liked: &HashSet<i64>,
    csrf_token: &str,
) -> Result<String, AppError> {
    let items = if messages.is_empty() {
        r#"<li class="empty">No messages yet.</li>"#.to_string()
    } else {
        let mut out = String::new();
        for message in messages {
            let entry = FeedMessage {
                id: message.id,
                user_id: message.user_id,
                text: message.text.clone(),
                created_at: message.created_at,
                username: user.username.clone(),
                image_url: user.image_url.clone(),
            };
            out.push_str(&feed_item(&entry, viewer.map(|v| v.id), liked, csrf_token));
        }
        out
    };
    let mut html = load("user_detail.html")?;
    html = html.replace(
        "PROFILE_HEADER",
        &profile_header(user, stats, viewer, viewer_following, csrf_token),
    );
    html = html.replace("USER_MESSAGES", &items);
    Ok(html)
}

fn member_list_body(
    template: &'static str,
    empty_text: &str,
    user: &User,
    stats: &UserStats,
    members: &[User],
    viewer: Option<&User>,
    viewer_following: &HashSet<i64>,
    csrf_token: &str,
) -> Result<String, AppError> {
    let cards = if members.is_empty() {
        format!(r#"<li class="empty">{}</li>"#, empty_text)
    } else {
        let mut out = String::new();
        for member in members {
            out.push_str(&user_card(member, viewer, viewer_following, csrf_token));
        }
        out
    };
    let mut html = load(template)?;
    html = html.replace(
        "PROFILE_HEADER",
        &profile_header(user, stats, viewer, viewer_following, csrf_token),
    );
    html = html.replace("USER_CARDS", &cards);
    Ok(html)
}

pub fn following_body(
    user: &User,
    stats: &UserStats,
    members: &[User],
    viewer: Option<&User>,
    viewer_following: &HashSet<i64>,
    csrf_token: &str,
) -> Result<String, AppError> {
    member_list_body(
        "following.html",
        "Not following anyone yet.",
        user,
        stats,
        members,
        viewer,
        viewer_following,
        csrf_token,
    )
}

pub fn followers_body(
    user: &User,
    stats: &UserStats,
    members: &[User],
    viewer: Option<&User>,
    viewer_following: &HashSet<i64>,
    csrf_token: &str,
) -> Result<String, AppError> {
    member_list_body(
        "followers.html",
        "No followers yet.",
        user,
        stats,
        members,
        viewer,
        viewer_following,
        csrf_token,
    )
}

pub fn edit_profile_body(
    form: &EditProfileForm,
    errors: &[String],
    user_id: i64,
    csrf_token: &str,
) -> Result<String, AppError> {
    let mut html = load("edit_profile.html")?;
    html = html.replace("FORM_ERRORS", &form_errors(errors));
    html = html.replace("CSRF_TOKEN", &esc_attr(csrf_token));
    html = html.replace("USERNAME_VALUE", &esc_attr(&form.username));
    html = html.replace("EMAIL_VALUE", &esc_attr(&form.email));
    // HEADER_IMAGE_URL_VALUE first, IMAGE_URL_VALUE is a substring of it.
    html = html.replace("HEADER_IMAGE_URL_VALUE", &esc_attr(&form.header_image_url));
    html = html.replace("IMAGE_URL_VALUE", &esc_attr(&form.image_url));
    html = html.replace("BIO_VALUE", &esc(&form.bio));
    html = html.replace("PROFILE_USER_ID", &user_id.to_string());
    Ok(html)
}

pub fn new_message_body(
    form: &MessageForm,
    errors: &[String],
    csrf_token: &str,
) -> Result<String, AppError> {
    let mut html = load("new_message.html")?;
    html = html.replace("FORM_ERRORS", &form_errors(errors));
    html = html.replace("CSRF_TOKEN", &esc_attr(csrf_token));
    html = html.replace("TEXT_VALUE", &esc(&form.text));
    Ok(html)
}

pub fn message_detail_body(
    message: &FeedMessage,
    viewer: Option<&User>,
    liking: bool,
    csrf_token: &str,
) -> Result<String, AppError> {
    let actions = match viewer {
        Some(v) if v.id == message.user_id => delete_message_form(message.id, csrf_token),
        Some(_) => like_form(message, liking, csrf_token),
        None => String::new(),
    };
    let mut html = load("message_detail.html")?;
    html = html.replace("AUTHOR_ID", &message.user_id.to_string());
    html = html.replace("AUTHOR_IMAGE", &esc_attr(&message.image_url));
    html = html.replace("AUTHOR_USERNAME", &esc(&message.username));
    html = html.replace("MESSAGE_TEXT", &esc(&message.text));
    html = html.replace("MESSAGE_DATE", &format_date(message.created_at));
    html = html.replace("MESSAGE_ACTIONS", &actions);
    Ok(html)
}

/// The full 404 page. Falls back to bare markup if the templates are
/// somehow missing so error rendering can never itself fail.
pub fn not_found_page() -> String {
    error_shell("Page not found / Warbler", "not_found.html")
}

/// The full 500 page.
pub fn error_page() -> String {
    error_shell("Server error / Warbler", "error.html")
}

fn error_shell(title: &str, template: &'static str) -> String {
    let body = load(template).unwrap_or_else(|_| format!("<h2>{}</h2>", esc(title)));
    render_page(title, None, None, "", &body).unwrap_or_else(|_| {
        format!("<!DOCTYPE html><html><body>{}</body></html>", body)
    })
}

/// Serves an embedded static asset, guessing the content type from the
/// file extension.
pub fn static_response(path: &str) -> Response {
    if let Some(content) = Assets::get(path) {
        let body: Cow<[u8]> = content.data;
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_str(mime.as_ref()).unwrap(),
        );
        (headers, body.into_owned()).into_response()
    } else {
        (StatusCode::NOT_FOUND, Html(not_found_page())).into_response()
    }
}
