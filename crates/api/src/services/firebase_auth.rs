//! Firebase Authentication identity provider.
//!
//! Implements the IdentityProvider trait over the Identity Toolkit REST API
//! (`accounts:signUp`, `accounts:sendOobCode`, `accounts:signInWithPassword`
//! and `accounts:lookup`).

use std::time::Duration;

use domain::services::{IdentityError, IdentityProvider, IdentitySession};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::validation::normalize_email;

use crate::config::IdentityConfig;

/// Firebase identity provider using the Identity Toolkit v1 API.
pub struct FirebaseIdentityProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'static str,
    id_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    email: String,
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
}

/// Maps an Identity Toolkit error code (e.g. `EMAIL_EXISTS` or
/// `WEAK_PASSWORD : Password should be at least 6 characters`).
fn map_provider_error(message: &str) -> IdentityError {
    let (code, detail) = match message.split_once(':') {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };

    match code {
        "EMAIL_EXISTS" => IdentityError::EmailExists,
        "EMAIL_NOT_FOUND"
        | "INVALID_PASSWORD"
        | "INVALID_LOGIN_CREDENTIALS"
        | "INVALID_EMAIL"
        | "MISSING_PASSWORD"
        | "USER_DISABLED" => IdentityError::InvalidCredentials,
        "WEAK_PASSWORD" if detail.is_empty() => {
            IdentityError::WeakPassword("Password is too weak".to_string())
        }
        "WEAK_PASSWORD" => IdentityError::WeakPassword(detail.to_string()),
        _ => IdentityError::Provider(message.to_string()),
    }
}

impl FirebaseIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}", self.base_url, method)
    }

    async fn call<B, R>(&self, method: &str, body: &B) -> Result<R, IdentityError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.endpoint(method))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| IdentityError::Provider(format!("Unexpected response: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        let err = match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(parsed) => map_provider_error(&parsed.error.message),
            Err(_) => IdentityError::Provider(format!("{}: {}", status, text)),
        };
        tracing::debug!(
            method = %method,
            status = %status,
            error = %err,
            "Identity provider call failed"
        );
        Err(err)
    }

    async fn email_verified(&self, id_token: &str, uid: &str) -> Result<bool, IdentityError> {
        let lookup: LookupResponse = self.call("lookup", &LookupRequest { id_token }).await?;
        Ok(lookup
            .users
            .iter()
            .find(|u| u.local_id == uid)
            .map(|u| u.email_verified)
            .unwrap_or(false))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<IdentitySession, IdentityError> {
        let email = normalize_email(email);
        let response: AuthResponse = self
            .call(
                "signUp",
                &PasswordRequest {
                    email: &email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        tracing::info!(uid = %response.local_id, "Identity account created");
        Ok(IdentitySession {
            uid: response.local_id,
            email: normalize_email(&response.email),
            id_token: response.id_token,
            email_verified: false,
        })
    }

    async fn send_email_verification(
        &self,
        session: &IdentitySession,
    ) -> Result<(), IdentityError> {
        let _: serde_json::Value = self
            .call(
                "sendOobCode",
                &OobCodeRequest {
                    request_type: "VERIFY_EMAIL",
                    id_token: &session.id_token,
                },
            )
            .await?;
        tracing::info!(uid = %session.uid, "Verification email requested");
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentitySession, IdentityError> {
        let email = normalize_email(email);
        let response: AuthResponse = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email: &email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        let email_verified = self
            .email_verified(&response.id_token, &response.local_id)
            .await?;

        Ok(IdentitySession {
            uid: response.local_id,
            email: normalize_email(&response.email),
            id_token: response.id_token,
            email_verified,
        })
    }
}
