//! Shared utilities and common types for the LabX backend.
//!
//! This crate provides common functionality used across all other crates:
//! - School account validation (e-mail domains, class and register options)
//! - ISO-8601 time formatting with explicit offsets
//! - JWT issuing and verification for API sessions

pub mod jwt;
pub mod time;
pub mod validation;
