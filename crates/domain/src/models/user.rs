//! User profile domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::DomainError;
use shared::validation::{is_staff_class, normalize_email, STAFF_CLASS};

/// Role of an account, derived from its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            other => Err(DomainError::validation(format!("Unknown role '{}'", other))),
        }
    }
}

/// Profile document stored alongside an identity provider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserProfile {
    pub uid: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub class_name: String,
    pub register_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn role(&self) -> Role {
        if is_staff_class(&self.class_name) {
            Role::Staff
        } else {
            Role::Student
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role() == Role::Staff
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// The authenticated identity this profile acts as.
    pub fn actor(&self) -> Actor {
        Actor::new(self.uid.clone(), &self.email, self.role())
    }
}

/// Display name for an e-mail, falling back to the e-mail itself.
pub fn display_name_for(email: &str, profiles: &[UserProfile]) -> String {
    let email = normalize_email(email);
    profiles
        .iter()
        .find(|p| p.email == email)
        .map(UserProfile::display_name)
        .filter(|name| !name.is_empty())
        .unwrap_or(email)
}

/// Authenticated caller of a domain operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub uid: String,
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn new(uid: impl Into<String>, email: &str, role: Role) -> Self {
        Self {
            uid: uid.into(),
            email: normalize_email(email),
            role,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

/// Request to create an account.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,

    pub confirm_password: String,

    #[serde(default)]
    pub is_staff: bool,

    #[serde(default)]
    pub class_name: Option<String>,

    #[serde(default)]
    pub register_number: Option<String>,
}

/// Request to sign in.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Request to update the caller's own profile.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    pub class_name: String,

    pub register_number: String,
}

/// Profile as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ProfileResponse {
    pub uid: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub email: String,
    pub class_name: String,
    pub register_number: String,
    pub role: Role,
}

impl From<&UserProfile> for ProfileResponse {
    fn from(profile: &UserProfile) -> Self {
        Self {
            uid: profile.uid.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            display_name: profile.display_name(),
            email: profile.email.clone(),
            class_name: profile.class_name.clone(),
            register_number: profile.register_number.clone(),
            role: profile.role(),
        }
    }
}

/// Staff entry for the teacher picker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StaffMember {
    pub name: String,
    pub email: String,
}

impl From<&UserProfile> for StaffMember {
    fn from(profile: &UserProfile) -> Self {
        Self {
            name: profile.display_name(),
            email: profile.email.clone(),
        }
    }
}

/// Class and register values forced onto staff accounts.
pub fn staff_class_fields() -> (String, String) {
    (STAFF_CLASS.to_string(), STAFF_CLASS.to_string())
}
