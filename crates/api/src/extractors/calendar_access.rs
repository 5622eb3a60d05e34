//! Calendar access token extractor.

use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::services::CalendarToken;

/// Header carrying the approver's calendar OAuth access token.
pub const CALENDAR_TOKEN_HEADER: &str = "X-Calendar-Token";

/// Optional calendar token. Absent or blank headers yield `None`, leaving the
/// calendar steps skipped rather than failing the request.
#[derive(Debug, Clone, Default)]
pub struct CalendarAccess(pub Option<CalendarToken>);

impl CalendarAccess {
    pub fn token(&self) -> Option<&CalendarToken> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CalendarAccess
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(CALENDAR_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(CalendarToken::parse);
        Ok(CalendarAccess(token))
    }
}
