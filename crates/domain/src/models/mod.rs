//! Domain models for LabX.

pub mod chat;
pub mod consultation;
pub mod lab_booking;
pub mod user;

pub use chat::{ChatMessage, ChatThread};
pub use consultation::{
    BusyInterval, ConsultationFilter, ConsultationRecord, ConsultationStatus, StudentRef,
    TeacherRef, TimeWindow,
};
pub use lab_booking::{LabBooking, SlotSelection};
pub use user::{Actor, Role, UserProfile};
