//! HTTP route handlers.

pub mod auth;
pub mod chat;
pub mod consultations;
pub mod health;
pub mod labs;
pub mod users;
