//! Custom Axum extractors.

pub mod calendar_access;
pub mod json_body;
pub mod user_auth;

pub use calendar_access::{CalendarAccess, CALENDAR_TOKEN_HEADER};
pub use json_body::{JsonBody, OptionalJsonBody};
pub use user_auth::UserAuth;
