//! Domain services for LabX.
//!
//! Services contain business logic that operates on domain models.

pub mod account;
pub mod calendar;
pub mod chat;
pub mod conflict;
pub mod consultation;
pub mod feed;
pub mod identity;
pub mod lifecycle;
pub mod store;

pub use account::AccountService;
pub use calendar::{
    CalendarError, CalendarEvent, CalendarGateway, CalendarSync, CalendarToken, FreeBusyQuery,
    MockCalendarGateway,
};
pub use chat::ChatBoard;
pub use conflict::ConflictChecker;
pub use consultation::{ApprovalOutcome, ConsultationService};
pub use feed::{ChangeFeed, ConsultationChange, Subscription};
pub use identity::{IdentityError, IdentityProvider, IdentitySession, MockIdentityProvider};
pub use lifecycle::StatusLifecycle;
pub use store::{
    ChatStore, ConsultationStore, ExpectedVersion, InMemoryChatStore, InMemoryConsultationStore,
    InMemoryUserStore, UserStore,
};
