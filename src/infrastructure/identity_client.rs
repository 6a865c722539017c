use crate::infrastructure::error::{CoreError, IdentityErrorCode};
use async_trait::async_trait;
use reqwest::Client;

const DEFAULT_IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, Clone)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}

/// Federated sign-in: the shell has already run the provider popup and
/// holds a provider-issued token; the backend exchanges it for an identity.
#[derive(Debug, Clone)]
pub struct ProviderAssertion {
    pub provider_id: String,
    pub provider_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInResponse {
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn sign_in_with_provider(
        &self,
        assertion: ProviderAssertion,
    ) -> Result<SignInResponse, CoreError>;

    async fn sign_in_with_password(
        &self,
        credentials: PasswordCredentials,
    ) -> Result<SignInResponse, CoreError>;

    async fn sign_up(&self, credentials: PasswordCredentials) -> Result<SignInResponse, CoreError>;

    async fn refresh_access_token(&self, refresh_token: &str)
        -> Result<SignInResponse, CoreError>;
}

/// Maps the provider's reason codes onto the fixed taxonomy. Unrecognized
/// codes fall through to `Unknown` rather than failing classification.
pub fn classify_provider_code(code: &str) -> IdentityErrorCode {
    let normalized = code.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auth/popup-closed-by-user" | "auth/cancelled-popup-request" | "user_cancelled" => {
            IdentityErrorCode::Cancelled
        }
        "auth/popup-blocked" | "popup_blocked" => IdentityErrorCode::PopupBlocked,
        "auth/network-request-failed" | "network_error" => IdentityErrorCode::Network,
        "auth/user-not-found"
        | "auth/wrong-password"
        | "auth/invalid-email"
        | "email_not_found"
        | "invalid_password"
        | "invalid_login_credentials"
        | "invalid_email" => IdentityErrorCode::InvalidCredential,
        "auth/email-already-in-use" | "email_exists" => IdentityErrorCode::AccountExists,
        "auth/weak-password" => IdentityErrorCode::WeakPassword,
        "auth/too-many-requests" | "too_many_attempts_try_later" => {
            IdentityErrorCode::TooManyRequests
        }
        code if code.starts_with("weak_password") => IdentityErrorCode::WeakPassword,
        _ => IdentityErrorCode::Unknown,
    }
}

pub fn identity_error(provider_code: &str, message: impl Into<String>) -> CoreError {
    CoreError::Identity {
        code: classify_provider_code(provider_code),
        message: message.into(),
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestIdentityClient {
    client: Client,
    endpoint_base: String,
    api_key: String,
}

#[derive(Debug, serde::Deserialize)]
struct IdentityPayload {
    #[serde(rename = "localId")]
    local_id: Option<String>,
    email: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "idToken")]
    id_token: Option<String>,
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(rename = "expiresIn")]
    expires_in: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct IdentityErrorPayload {
    error: Option<IdentityErrorBody>,
}

#[derive(Debug, serde::Deserialize)]
struct IdentityErrorBody {
    message: Option<String>,
}

impl ReqwestIdentityClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint_base: DEFAULT_IDENTITY_ENDPOINT.to_string(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/accounts:{action}?key={}",
            self.endpoint_base.trim_end_matches('/'),
            self.api_key
        )
    }

    async fn post_json(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<SignInResponse, CoreError> {
        let response = self
            .client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|error| CoreError::Identity {
                code: IdentityErrorCode::Network,
                message: format!("request failed: {error}"),
            })?;

        let status = response.status();
        let raw = response.text().await.map_err(|error| CoreError::Identity {
            code: IdentityErrorCode::Network,
            message: format!("failed to read response body: {error}"),
        })?;

        if !status.is_success() {
            let provider_code = serde_json::from_str::<IdentityErrorPayload>(&raw)
                .ok()
                .and_then(|payload| payload.error)
                .and_then(|body| body.message)
                .unwrap_or_default();
            return Err(identity_error(
                &provider_code,
                format!("identity api error: http {}; code={provider_code}", status.as_u16()),
            ));
        }

        let payload: IdentityPayload =
            serde_json::from_str(&raw).map_err(|error| CoreError::Identity {
                code: IdentityErrorCode::Unknown,
                message: format!("unexpected identity response: {error}"),
            })?;
        Self::response_from_payload(payload)
    }

    fn response_from_payload(payload: IdentityPayload) -> Result<SignInResponse, CoreError> {
        let user_id = payload
            .local_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
            .ok_or_else(|| CoreError::Identity {
                code: IdentityErrorCode::Unknown,
                message: "identity response is missing localId".to_string(),
            })?;
        let id_token = payload
            .id_token
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
            .ok_or_else(|| CoreError::Identity {
                code: IdentityErrorCode::Unknown,
                message: "identity response is missing idToken".to_string(),
            })?;
        let expires_in = payload
            .expires_in
            .as_deref()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(3600);

        Ok(SignInResponse {
            user_id,
            email: payload.email.unwrap_or_default(),
            display_name: payload
                .display_name
                .filter(|value| !value.trim().is_empty()),
            id_token,
            refresh_token: payload.refresh_token,
            expires_in,
        })
    }
}

#[async_trait]
impl IdentityClient for ReqwestIdentityClient {
    async fn sign_in_with_provider(
        &self,
        assertion: ProviderAssertion,
    ) -> Result<SignInResponse, CoreError> {
        if assertion.provider_token.trim().is_empty() {
            return Err(identity_error(
                "user_cancelled",
                "provider returned no token".to_string(),
            ));
        }
        self.post_json(
            &self.endpoint("signInWithIdp"),
            serde_json::json!({
                "postBody": format!(
                    "id_token={}&providerId={}",
                    assertion.provider_token, assertion.provider_id
                ),
                "requestUri": "http://localhost",
                "returnSecureToken": true,
            }),
        )
        .await
    }

    async fn sign_in_with_password(
        &self,
        credentials: PasswordCredentials,
    ) -> Result<SignInResponse, CoreError> {
        self.post_json(
            &self.endpoint("signInWithPassword"),
            serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    async fn sign_up(&self, credentials: PasswordCredentials) -> Result<SignInResponse, CoreError> {
        self.post_json(
            &self.endpoint("signUp"),
            serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<SignInResponse, CoreError> {
        if refresh_token.trim().is_empty() {
            return Err(CoreError::Identity {
                code: IdentityErrorCode::InvalidCredential,
                message: "refresh token must not be empty".to_string(),
            });
        }
        self.post_json(
            &self.endpoint("signInWithRefreshToken"),
            serde_json::json!({
                "grantType": "refresh_token",
                "refreshToken": refresh_token,
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_the_documented_codes() {
        assert_eq!(
            classify_provider_code("auth/popup-closed-by-user"),
            IdentityErrorCode::Cancelled
        );
        assert_eq!(
            classify_provider_code("auth/popup-blocked"),
            IdentityErrorCode::PopupBlocked
        );
        assert_eq!(
            classify_provider_code("auth/network-request-failed"),
            IdentityErrorCode::Network
        );
        assert_eq!(
            classify_provider_code("INVALID_LOGIN_CREDENTIALS"),
            IdentityErrorCode::InvalidCredential
        );
        assert_eq!(
            classify_provider_code("EMAIL_EXISTS"),
            IdentityErrorCode::AccountExists
        );
        assert_eq!(
            classify_provider_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            IdentityErrorCode::WeakPassword
        );
        assert_eq!(
            classify_provider_code("TOO_MANY_ATTEMPTS_TRY_LATER"),
            IdentityErrorCode::TooManyRequests
        );
        assert_eq!(
            classify_provider_code("SOMETHING_ELSE"),
            IdentityErrorCode::Unknown
        );
    }

    #[test]
    fn classified_errors_carry_fixed_user_messages() {
        let error = identity_error("EMAIL_EXISTS", "identity api error: http 400");
        assert_eq!(
            error.user_message(),
            "This email is already registered. Please sign in instead."
        );
    }

    #[test]
    fn payload_missing_token_is_rejected() {
        let payload = IdentityPayload {
            local_id: Some("user-1".to_string()),
            email: Some("student@example.edu".to_string()),
            display_name: None,
            id_token: None,
            refresh_token: None,
            expires_in: None,
        };
        assert!(ReqwestIdentityClient::response_from_payload(payload).is_err());
    }

    #[test]
    fn payload_defaults_expiry_when_absent() {
        let payload = IdentityPayload {
            local_id: Some("user-1".to_string()),
            email: Some("student@example.edu".to_string()),
            display_name: Some("  ".to_string()),
            id_token: Some("token".to_string()),
            refresh_token: Some("refresh".to_string()),
            expires_in: None,
        };
        let response =
            ReqwestIdentityClient::response_from_payload(payload).expect("valid payload");
        assert_eq!(response.expires_in, 3600);
        assert!(response.display_name.is_none());
    }
}
