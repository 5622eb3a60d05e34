//! Storage abstractions for consultations, profiles and chat messages.
//!
//! The PostgreSQL implementations live in the `persistence` crate. The
//! in-memory implementations here back local runs and tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::chat::ChatMessage;
use crate::models::consultation::{ConsultationFilter, ConsultationRecord, ConsultationStatus};
use crate::models::user::UserProfile;
use shared::validation::normalize_email;

/// Version of a record that a conditional write expects to replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedVersion {
    pub status: ConsultationStatus,
    pub updated_at: DateTime<Utc>,
}

impl ExpectedVersion {
    pub fn of(record: &ConsultationRecord) -> Self {
        Self {
            status: record.status,
            updated_at: record.updated_at,
        }
    }

    fn matches(&self, record: &ConsultationRecord) -> bool {
        record.status == self.status && record.updated_at == self.updated_at
    }
}

/// Consultation collection.
#[async_trait::async_trait]
pub trait ConsultationStore: Send + Sync {
    async fn insert(&self, record: &ConsultationRecord) -> Result<(), StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<ConsultationRecord>, StoreError>;

    /// Records matching `filter`, ordered by `scheduled_at`.
    async fn list(&self, filter: &ConsultationFilter)
        -> Result<Vec<ConsultationRecord>, StoreError>;

    /// Replaces the stored record only if it still matches `expected`.
    /// Returns `false` when it no longer does (or is gone).
    ///
    /// Implementations refuse to store two overlapping approved records for
    /// one teacher, reporting [`StoreError::Rejected`].
    async fn update_if(
        &self,
        record: &ConsultationRecord,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError>;

    /// Deletes the record only if it still matches `expected`.
    async fn delete_if(&self, id: Uuid, expected: ExpectedVersion) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// `users` collection.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert(&self, profile: &UserProfile) -> Result<(), StoreError>;

    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Profiles whose class is `Staff`, ordered by name.
    async fn list_staff(&self) -> Result<Vec<UserProfile>, StoreError>;
}

/// `chatMessages` collection.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert(&self, message: &ChatMessage) -> Result<(), StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<ChatMessage>, StoreError>;

    /// All messages, oldest first.
    async fn list(&self) -> Result<Vec<ChatMessage>, StoreError>;

    /// Deletes a message and every reply beneath it.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

/// Consultation store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryConsultationStore {
    records: Mutex<HashMap<Uuid, ConsultationRecord>>,
}

impl InMemoryConsultationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConsultationStore for InMemoryConsultationStore {
    async fn insert(&self, record: &ConsultationRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        if records.contains_key(&record.id) {
            return Err(StoreError::Rejected(format!(
                "consultation {} already exists",
                record.id
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ConsultationRecord>, StoreError> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        Ok(records.get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &ConsultationFilter,
    ) -> Result<Vec<ConsultationRecord>, StoreError> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        let mut matching: Vec<ConsultationRecord> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(matching)
    }

    async fn update_if(
        &self,
        record: &ConsultationRecord,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        match records.get(&record.id) {
            Some(current) if expected.matches(current) => {}
            _ => return Ok(false),
        }

        if record.status == ConsultationStatus::Approved {
            let interval = record.busy_interval();
            let clash = records.values().any(|other| {
                other.id != record.id
                    && other.status == ConsultationStatus::Approved
                    && other.teacher.email == record.teacher.email
                    && other.busy_interval().overlaps(&interval)
            });
            if clash {
                return Err(StoreError::Rejected(format!(
                    "approved consultations overlap for {}",
                    record.teacher.email
                )));
            }
        }

        records.insert(record.id, record.clone());
        Ok(true)
    }

    async fn delete_if(&self, id: Uuid, expected: ExpectedVersion) -> Result<bool, StoreError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        match records.get(&id) {
            Some(current) if expected.matches(current) => {
                records.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.records.lock().map(|_| ()).map_err(|_| poisoned())
    }
}

/// Profile store held in process memory, keyed by uid.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    profiles: Mutex<HashMap<String, UserProfile>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn upsert(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let mut profiles = self.profiles.lock().map_err(|_| poisoned())?;
        let taken = profiles
            .values()
            .any(|p| p.uid != profile.uid && p.email == profile.email);
        if taken {
            return Err(StoreError::Rejected(format!(
                "email {} already belongs to another profile",
                profile.email
            )));
        }
        profiles.insert(profile.uid.clone(), profile.clone());
        Ok(())
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
        let profiles = self.profiles.lock().map_err(|_| poisoned())?;
        Ok(profiles.get(uid).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        let email = normalize_email(email);
        let profiles = self.profiles.lock().map_err(|_| poisoned())?;
        Ok(profiles.values().find(|p| p.email == email).cloned())
    }

    async fn list_staff(&self) -> Result<Vec<UserProfile>, StoreError> {
        let profiles = self.profiles.lock().map_err(|_| poisoned())?;
        let mut staff: Vec<UserProfile> =
            profiles.values().filter(|p| p.is_staff()).cloned().collect();
        staff.sort_by(|a, b| {
            a.first_name
                .cmp(&b.first_name)
                .then_with(|| a.last_name.cmp(&b.last_name))
        });
        Ok(staff)
    }
}

/// Chat store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    messages: Mutex<HashMap<Uuid, ChatMessage>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ChatStore for InMemoryChatStore {
    async fn insert(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().map_err(|_| poisoned())?;
        if let Some(parent) = message.reply_to_id {
            if !messages.contains_key(&parent) {
                return Err(StoreError::Rejected(format!(
                    "reply target {} does not exist",
                    parent
                )));
            }
        }
        messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ChatMessage>, StoreError> {
        let messages = self.messages.lock().map_err(|_| poisoned())?;
        Ok(messages.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<ChatMessage>, StoreError> {
        let messages = self.messages.lock().map_err(|_| poisoned())?;
        let mut all: Vec<ChatMessage> = messages.values().cloned().collect();
        all.sort_by_key(|m| m.timestamp);
        Ok(all)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut messages = self.messages.lock().map_err(|_| poisoned())?;
        if !messages.contains_key(&id) {
            return Ok(false);
        }

        let mut doomed: HashSet<Uuid> = HashSet::from([id]);
        loop {
            let before = doomed.len();
            for message in messages.values() {
                if message.reply_to_id.is_some_and(|parent| doomed.contains(&parent)) {
                    doomed.insert(message.id);
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        messages.retain(|id, _| !doomed.contains(id));
        Ok(true)
    }
}
