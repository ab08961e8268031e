use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

pub const MAX_USERNAME_CHARS: usize = 30;
pub const MAX_EMAIL_CHARS: usize = 50;
pub const MIN_PASSWORD_CHARS: usize = 6;
pub const MAX_MESSAGE_CHARS: usize = 140;

fn check_username(username: &str, errors: &mut Vec<String>) {
    if username.trim().is_empty() {
        errors.push("Username is required.".into());
    } else if username.chars().count() > MAX_USERNAME_CHARS {
        errors.push(format!(
            "Username must be at most {} characters.",
            MAX_USERNAME_CHARS
        ));
    }
}

fn check_email(email: &str, errors: &mut Vec<String>) {
    if email.trim().is_empty() {
        errors.push("E-mail is required.".into());
    } else if email.chars().count() > MAX_EMAIL_CHARS {
        errors.push(format!("E-mail must be at most {} characters.", MAX_EMAIL_CHARS));
    } else if !EMAIL_RE.is_match(email.trim()) {
        errors.push("E-mail is invalid.".into());
    }
}

fn check_password(password: &str, errors: &mut Vec<String>) {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        errors.push(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_CHARS
        ));
    }
}

/// Fields of the signup form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl SignupForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_username(&self.username, &mut errors);
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        errors
    }
}

/// Fields of the login form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl LoginForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_username(&self.username, &mut errors);
        check_password(&self.password, &mut errors);
        errors
    }
}

/// Fields of the profile edit form. The password confirms the change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub header_image_url: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl EditProfileForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_username(&self.username, &mut errors);
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        errors
    }
}

/// Fields of the new-message form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl MessageForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.text.trim().is_empty() {
            errors.push("Message text is required.".into());
        } else if self.text.chars().count() > MAX_MESSAGE_CHARS {
            errors.push(format!(
                "Message text must be at most {} characters.",
                MAX_MESSAGE_CHARS
            ));
        }
        errors
    }
}

/// Body of button-only POST forms, carrying just the forgery token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: String,
}
