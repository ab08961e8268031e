use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::templates;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("not_found")]
    NotFound,
    #[error("username_taken")]
    UsernameTaken,
    #[error("email_taken")]
    EmailTaken,
    #[error("password_hash")]
    Hash,
    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("pool: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("session_token: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),
    #[error("missing_template: {0}")]
    MissingTemplate(&'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => {
                (StatusCode::NOT_FOUND, Html(templates::not_found_page())).into_response()
            }
            // Normally caught by the handlers and surfaced as form errors.
            AppError::UsernameTaken | AppError::EmailTaken => {
                (StatusCode::BAD_REQUEST, Html(templates::error_page())).into_response()
            }
            other => {
                tracing::error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(templates::error_page()),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let res = AppError::NotFound.into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_errors_map_to_500() {
        let res = AppError::from(rusqlite::Error::InvalidQuery).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
