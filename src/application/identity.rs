use crate::domain::models::{ProviderToken, Role, UserIdentity};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::CoreError;
use crate::infrastructure::identity_client::{
    IdentityClient, PasswordCredentials, ProviderAssertion, SignInResponse,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

const TOKEN_LEEWAY_SECONDS: i64 = 60;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureTokenResult {
    Existing(ProviderToken),
    Refreshed(ProviderToken),
    ReauthenticationRequired,
}

/// Drives sign-in/sign-out against the identity gateway and keeps custody
/// of the provider token between runs. Created at app start, torn down
/// (token deleted) at sign-out.
pub struct IdentitySession<S, C>
where
    S: CredentialStore,
    C: IdentityClient,
{
    credential_store: Arc<S>,
    identity_client: Arc<C>,
    teacher_email_domains: Vec<String>,
    now_provider: NowProvider,
}

impl<S, C> IdentitySession<S, C>
where
    S: CredentialStore,
    C: IdentityClient,
{
    pub fn new(
        credential_store: Arc<S>,
        identity_client: Arc<C>,
        teacher_email_domains: Vec<String>,
    ) -> Self {
        Self {
            credential_store,
            identity_client,
            teacher_email_domains,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn sign_in_with_provider(
        &self,
        assertion: ProviderAssertion,
    ) -> Result<UserIdentity, CoreError> {
        if assertion.provider_id.trim().is_empty() {
            return Err(CoreError::Validation(
                "provider id must not be empty".to_string(),
            ));
        }
        let response = self.identity_client.sign_in_with_provider(assertion).await?;
        self.complete_sign_in(response)
    }

    pub async fn sign_in_with_password(
        &self,
        credentials: PasswordCredentials,
    ) -> Result<UserIdentity, CoreError> {
        validate_credentials(&credentials)?;
        let response = self
            .identity_client
            .sign_in_with_password(credentials)
            .await?;
        self.complete_sign_in(response)
    }

    pub async fn sign_up(
        &self,
        credentials: PasswordCredentials,
    ) -> Result<UserIdentity, CoreError> {
        validate_credentials(&credentials)?;
        let response = self.identity_client.sign_up(credentials).await?;
        self.complete_sign_in(response)
    }

    /// Discards the stored token; the gateway holds no server-side session.
    pub fn sign_out(&self) -> Result<(), CoreError> {
        self.credential_store.delete_token()
    }

    /// A valid stored token is reused; an expired one with a refresh token
    /// is refreshed silently; everything else requires a fresh sign-in.
    pub async fn ensure_access_token(&self) -> Result<EnsureTokenResult, CoreError> {
        let Some(stored) = self.credential_store.load_token()? else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        if stored.is_valid_at((self.now_provider)(), TOKEN_LEEWAY_SECONDS) {
            return Ok(EnsureTokenResult::Existing(stored));
        }

        let Some(refresh_token) = stored.refresh_token.clone() else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };
        match self
            .identity_client
            .refresh_access_token(&refresh_token)
            .await
        {
            Ok(response) => {
                let mut token = self.token_from_response(&response);
                if token.refresh_token.is_none() {
                    token.refresh_token = Some(refresh_token);
                }
                self.credential_store.save_token(&token)?;
                Ok(EnsureTokenResult::Refreshed(token))
            }
            Err(CoreError::Identity { .. }) => Ok(EnsureTokenResult::ReauthenticationRequired),
            Err(error) => Err(error),
        }
    }

    pub fn resolve_role(&self, email: &str) -> Role {
        let Some((_, domain)) = email.rsplit_once('@') else {
            return Role::Student;
        };
        let domain = domain.to_ascii_lowercase();
        if !domain.is_empty()
            && self
                .teacher_email_domains
                .iter()
                .any(|candidate| candidate == &domain)
        {
            Role::Teacher
        } else {
            Role::Student
        }
    }

    fn complete_sign_in(&self, response: SignInResponse) -> Result<UserIdentity, CoreError> {
        let token = self.token_from_response(&response);
        self.credential_store.save_token(&token)?;

        let display_name = response
            .display_name
            .clone()
            .unwrap_or_else(|| {
                response
                    .email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });
        let identity = UserIdentity {
            id: response.user_id,
            email: response.email.clone(),
            display_name,
            role: self.resolve_role(&response.email),
        };
        identity.validate().map_err(CoreError::Validation)?;
        Ok(identity)
    }

    fn token_from_response(&self, response: &SignInResponse) -> ProviderToken {
        ProviderToken {
            access_token: response.id_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expires_at: (self.now_provider)() + Duration::seconds(response.expires_in.max(0)),
            token_type: "Bearer".to_string(),
            scope: None,
        }
    }
}

fn validate_credentials(credentials: &PasswordCredentials) -> Result<(), CoreError> {
    if credentials.email.trim().is_empty() {
        return Err(CoreError::Validation("email must not be empty".to_string()));
    }
    if credentials.password.is_empty() {
        return Err(CoreError::Validation(
            "password must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::credential_store::InMemoryCredentialStore;
    use crate::infrastructure::error::IdentityErrorCode;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum FakeResponse {
        Success(SignInResponse),
        IdentityError(&'static str),
    }

    impl Default for FakeResponse {
        fn default() -> Self {
            Self::Success(SignInResponse {
                user_id: "user-1".to_string(),
                email: "student@example.edu".to_string(),
                display_name: Some("Student One".to_string()),
                id_token: "id-token".to_string(),
                refresh_token: Some("refresh-token".to_string()),
                expires_in: 3600,
            })
        }
    }

    #[derive(Debug, Default)]
    struct FakeIdentityClient {
        response: Mutex<FakeResponse>,
        refresh_response: Mutex<FakeResponse>,
        refresh_calls: AtomicUsize,
    }

    impl FakeIdentityClient {
        fn set_response(&self, response: FakeResponse) {
            *self.response.lock().expect("response mutex poisoned") = response;
        }

        fn set_refresh_response(&self, response: FakeResponse) {
            *self
                .refresh_response
                .lock()
                .expect("refresh mutex poisoned") = response;
        }

        fn resolve(&self, slot: &Mutex<FakeResponse>) -> Result<SignInResponse, CoreError> {
            match slot.lock().expect("response mutex poisoned").clone() {
                FakeResponse::Success(value) => Ok(value),
                FakeResponse::IdentityError(code) => Err(CoreError::Identity {
                    code: crate::infrastructure::identity_client::classify_provider_code(code),
                    message: code.to_string(),
                }),
            }
        }
    }

    #[async_trait]
    impl IdentityClient for FakeIdentityClient {
        async fn sign_in_with_provider(
            &self,
            _assertion: ProviderAssertion,
        ) -> Result<SignInResponse, CoreError> {
            self.resolve(&self.response)
        }

        async fn sign_in_with_password(
            &self,
            _credentials: PasswordCredentials,
        ) -> Result<SignInResponse, CoreError> {
            self.resolve(&self.response)
        }

        async fn sign_up(
            &self,
            _credentials: PasswordCredentials,
        ) -> Result<SignInResponse, CoreError> {
            self.resolve(&self.response)
        }

        async fn refresh_access_token(
            &self,
            _refresh_token: &str,
        ) -> Result<SignInResponse, CoreError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.resolve(&self.refresh_response)
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn session(
        store: Arc<InMemoryCredentialStore>,
        client: Arc<FakeIdentityClient>,
    ) -> IdentitySession<InMemoryCredentialStore, FakeIdentityClient> {
        IdentitySession::new(store, client, vec!["staff.school.edu".to_string()])
            .with_now_provider(Arc::new(|| {
                DateTime::parse_from_rfc3339("2026-03-02T12:00:00Z")
                    .expect("valid datetime")
                    .with_timezone(&Utc)
            }))
    }

    #[tokio::test]
    async fn password_sign_in_stores_token_and_resolves_student_role() {
        let store = Arc::new(InMemoryCredentialStore::default());
        let client = Arc::new(FakeIdentityClient::default());
        let session = session(Arc::clone(&store), client);

        let identity = session
            .sign_in_with_password(PasswordCredentials {
                email: "student@example.edu".to_string(),
                password: "secret".to_string(),
            })
            .await
            .expect("sign in");

        assert_eq!(identity.role, Role::Student);
        assert_eq!(identity.display_name, "Student One");
        let token = store.load_token().expect("load").expect("token stored");
        assert_eq!(token.access_token, "id-token");
        assert_eq!(token.expires_at, fixed_time("2026-03-02T13:00:00Z"));
    }

    #[tokio::test]
    async fn teacher_domain_resolves_teacher_role_and_fallback_display_name() {
        let store = Arc::new(InMemoryCredentialStore::default());
        let client = Arc::new(FakeIdentityClient::default());
        client.set_response(FakeResponse::Success(SignInResponse {
            user_id: "user-2".to_string(),
            email: "jordan@staff.school.edu".to_string(),
            display_name: None,
            id_token: "id-token".to_string(),
            refresh_token: None,
            expires_in: 3600,
        }));
        let session = session(Arc::clone(&store), client);

        let identity = session
            .sign_in_with_provider(ProviderAssertion {
                provider_id: "microsoft.com".to_string(),
                provider_token: "provider-token".to_string(),
            })
            .await
            .expect("sign in");

        assert_eq!(identity.role, Role::Teacher);
        assert_eq!(identity.display_name, "jordan");
    }

    #[tokio::test]
    async fn blank_credentials_fail_before_reaching_the_gateway() {
        let store = Arc::new(InMemoryCredentialStore::default());
        let client = Arc::new(FakeIdentityClient::default());
        let session = session(store, client);

        let result = session
            .sign_in_with_password(PasswordCredentials {
                email: "  ".to_string(),
                password: "secret".to_string(),
            })
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn provider_failure_surfaces_classified_code() {
        let store = Arc::new(InMemoryCredentialStore::default());
        let client = Arc::new(FakeIdentityClient::default());
        client.set_response(FakeResponse::IdentityError("EMAIL_EXISTS"));
        let session = session(Arc::clone(&store), client);

        let result = session
            .sign_up(PasswordCredentials {
                email: "student@example.edu".to_string(),
                password: "secret".to_string(),
            })
            .await;
        match result {
            Err(CoreError::Identity { code, .. }) => {
                assert_eq!(code, IdentityErrorCode::AccountExists);
            }
            other => panic!("expected identity error, got {other:?}"),
        }
        assert!(store.load_token().expect("load").is_none());
    }

    #[tokio::test]
    async fn sign_out_discards_the_stored_token() {
        let store = Arc::new(InMemoryCredentialStore::default());
        let client = Arc::new(FakeIdentityClient::default());
        let session = session(Arc::clone(&store), client);

        session
            .sign_in_with_password(PasswordCredentials {
                email: "student@example.edu".to_string(),
                password: "secret".to_string(),
            })
            .await
            .expect("sign in");
        session.sign_out().expect("sign out");
        assert!(store.load_token().expect("load").is_none());
    }

    #[tokio::test]
    async fn valid_stored_token_is_reused_without_refresh() {
        let store = Arc::new(InMemoryCredentialStore::default());
        store
            .save_token(&ProviderToken {
                access_token: "stored".to_string(),
                refresh_token: Some("refresh".to_string()),
                expires_at: fixed_time("2026-03-02T13:00:00Z"),
                token_type: "Bearer".to_string(),
                scope: None,
            })
            .expect("seed token");
        let client = Arc::new(FakeIdentityClient::default());
        let session = session(store, Arc::clone(&client));

        let result = session.ensure_access_token().await.expect("ensure token");
        assert!(matches!(result, EnsureTokenResult::Existing(_)));
        assert_eq!(client.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_keeps_refresh_token() {
        let store = Arc::new(InMemoryCredentialStore::default());
        store
            .save_token(&ProviderToken {
                access_token: "stale".to_string(),
                refresh_token: Some("refresh".to_string()),
                expires_at: fixed_time("2026-03-02T11:00:00Z"),
                token_type: "Bearer".to_string(),
                scope: None,
            })
            .expect("seed token");
        let client = Arc::new(FakeIdentityClient::default());
        client.set_refresh_response(FakeResponse::Success(SignInResponse {
            user_id: "user-1".to_string(),
            email: "student@example.edu".to_string(),
            display_name: None,
            id_token: "fresh".to_string(),
            refresh_token: None,
            expires_in: 3600,
        }));
        let session = session(Arc::clone(&store), Arc::clone(&client));

        let result = session.ensure_access_token().await.expect("ensure token");
        match result {
            EnsureTokenResult::Refreshed(token) => {
                assert_eq!(token.access_token, "fresh");
                assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
            }
            other => panic!("expected refreshed token, got {other:?}"),
        }
        assert_eq!(client.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_requires_reauthentication() {
        let store = Arc::new(InMemoryCredentialStore::default());
        store
            .save_token(&ProviderToken {
                access_token: "stale".to_string(),
                refresh_token: Some("refresh".to_string()),
                expires_at: fixed_time("2026-03-02T11:00:00Z"),
                token_type: "Bearer".to_string(),
                scope: None,
            })
            .expect("seed token");
        let client = Arc::new(FakeIdentityClient::default());
        client.set_refresh_response(FakeResponse::IdentityError("INVALID_LOGIN_CREDENTIALS"));
        let session = session(store, client);

        let result = session.ensure_access_token().await.expect("ensure token");
        assert_eq!(result, EnsureTokenResult::ReauthenticationRequired);
    }

    #[tokio::test]
    async fn missing_token_requires_reauthentication() {
        let store = Arc::new(InMemoryCredentialStore::default());
        let client = Arc::new(FakeIdentityClient::default());
        let session = session(store, client);
        let result = session.ensure_access_token().await.expect("ensure token");
        assert_eq!(result, EnsureTokenResult::ReauthenticationRequired);
    }
}
