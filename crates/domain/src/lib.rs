//! Domain layer for the LabX consultation backend.
//!
//! This crate contains:
//! - Domain models (ConsultationRecord, UserProfile, ChatMessage, lab slots)
//! - Business logic services (conflict checking, status lifecycle, accounts, chat)
//! - Store and gateway traits with in-memory and mock implementations
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::{ConflictDetail, DomainError, StoreError};
