//! Warbler is a small server-rendered social network: short messages,
//! follows and likes on top of SQLite.

pub mod app;
pub mod auth;
pub mod config;
pub mod cookies;
pub mod db;
pub mod error;
pub mod follows;
pub mod forms;
pub mod likes;
pub mod messages;
pub mod model;
pub mod templates;
pub mod users;
