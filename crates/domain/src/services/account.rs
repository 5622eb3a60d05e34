//! Account registration, sign-in and profile management.

use std::sync::Arc;

use chrono::Utc;

use crate::error::DomainError;
use crate::models::user::{
    staff_class_fields, RegisterRequest, UpdateProfileRequest, UserProfile,
};
use crate::services::identity::IdentityProvider;
use crate::services::store::UserStore;
use shared::validation::{
    is_staff_class, normalize_email, validate_class_name, validate_not_blank,
    validate_register_number, validate_school_email,
};

pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserStore>,
}

fn invalid(err: validator::ValidationError) -> DomainError {
    DomainError::Validation(
        err.message
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.code.to_string()),
    )
}

fn required(value: &str, field: &str) -> Result<String, DomainError> {
    validate_not_blank(value)
        .map_err(|_| DomainError::validation(format!("{} is required", field)))?;
    Ok(value.trim().to_string())
}

/// Class and register number for a student, which may not claim `Staff`.
fn student_class_fields(
    class_name: Option<&str>,
    register_number: Option<&str>,
) -> Result<(String, String), DomainError> {
    let class_name = required(class_name.unwrap_or_default(), "Class")?;
    let register_number = required(register_number.unwrap_or_default(), "Register number")?;

    if is_staff_class(&class_name) || is_staff_class(&register_number) {
        return Err(DomainError::validation(
            "Only staff accounts can use the Staff class",
        ));
    }
    validate_class_name(&class_name).map_err(invalid)?;
    validate_register_number(&register_number).map_err(invalid)?;
    Ok((class_name, register_number))
}

impl AccountService {
    pub fn new(identity: Arc<dyn IdentityProvider>, users: Arc<dyn UserStore>) -> Self {
        Self { identity, users }
    }

    /// Creates the provider account, stores the profile and sends the
    /// verification mail. The account cannot sign in until verified.
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, DomainError> {
        let first_name = required(&request.first_name, "First name")?;
        let last_name = required(&request.last_name, "Last name")?;
        validate_school_email(&request.email, request.is_staff).map_err(invalid)?;
        required(&request.password, "Password")?;
        if request.password != request.confirm_password {
            return Err(DomainError::validation("Passwords do not match"));
        }

        let (class_name, register_number) = if request.is_staff {
            staff_class_fields()
        } else {
            student_class_fields(
                request.class_name.as_deref(),
                request.register_number.as_deref(),
            )?
        };

        let email = normalize_email(&request.email);
        let session = self.identity.sign_up(&email, &request.password).await?;

        let now = Utc::now();
        let profile = UserProfile {
            uid: session.uid.clone(),
            first_name,
            last_name,
            email,
            class_name,
            register_number,
            created_at: now,
            updated_at: now,
        };
        self.users.upsert(&profile).await?;
        self.identity.send_email_verification(&session).await?;

        tracing::info!(
            uid = %profile.uid,
            role = %profile.role(),
            "Account registered, verification email sent"
        );
        Ok(profile)
    }

    /// Signs in through the provider. Unverified e-mails are refused.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, DomainError> {
        let session = self.identity.sign_in(email, password).await?;
        if !session.email_verified {
            tracing::info!(uid = %session.uid, "Login refused, email not verified");
            return Err(DomainError::authorization(
                "Please verify your email before logging in",
            ));
        }

        let profile = self
            .users
            .find_by_uid(&session.uid)
            .await?
            .ok_or_else(|| DomainError::NotFound("Profile".to_string()))?;

        tracing::info!(uid = %profile.uid, "User logged in");
        Ok(profile)
    }

    pub async fn profile(&self, uid: &str) -> Result<UserProfile, DomainError> {
        self.users
            .find_by_uid(uid)
            .await?
            .ok_or_else(|| DomainError::NotFound("Profile".to_string()))
    }

    /// Updates names and class. Staff keep the `Staff` class.
    pub async fn update_profile(
        &self,
        uid: &str,
        request: &UpdateProfileRequest,
    ) -> Result<UserProfile, DomainError> {
        let current = self.profile(uid).await?;
        let first_name = required(&request.first_name, "First name")?;
        let last_name = required(&request.last_name, "Last name")?;

        let (class_name, register_number) = if current.is_staff() {
            staff_class_fields()
        } else {
            student_class_fields(
                Some(request.class_name.as_str()),
                Some(request.register_number.as_str()),
            )?
        };

        let updated = UserProfile {
            first_name,
            last_name,
            class_name,
            register_number,
            updated_at: Utc::now(),
            ..current
        };
        self.users.upsert(&updated).await?;
        Ok(updated)
    }

    /// Staff profiles, optionally narrowed by a case-insensitive name or
    /// e-mail search.
    pub async fn staff_directory(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<UserProfile>, DomainError> {
        let staff = self.users.list_staff().await?;
        let needle = search.map(|s| s.trim().to_lowercase()).unwrap_or_default();
        if needle.is_empty() {
            return Ok(staff);
        }
        Ok(staff
            .into_iter()
            .filter(|p| {
                p.display_name().to_lowercase().contains(&needle)
                    || p.email.contains(&needle)
            })
            .collect())
    }

    /// The staff member with `email`, for booking against.
    pub async fn find_staff(&self, email: &str) -> Result<UserProfile, DomainError> {
        let profile = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Teacher {}", normalize_email(email))))?;
        if !profile.is_staff() {
            return Err(DomainError::validation(format!(
                "{} is not a staff member",
                profile.email
            )));
        }
        Ok(profile)
    }
}
