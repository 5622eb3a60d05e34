//! Outbound service clients.

pub mod firebase_auth;
pub mod google_calendar;

pub use firebase_auth::FirebaseIdentityProvider;
pub use google_calendar::GoogleCalendarGateway;
