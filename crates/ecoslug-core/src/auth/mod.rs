//! Google OAuth client and shared sign-in state.
//!
//! The sync coordinator only consumes the narrow [`AuthProvider`] view; the
//! [`GoogleAuthClient`] implements it on top of Google's OAuth token and
//! userinfo endpoints with persisted sessions.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{compact_text, normalize_text_option, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const REVOKE_ENDPOINT: &str = "https://oauth2.googleapis.com/revoke";
const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Authenticated user's basic profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

/// Bearer credential plus the profile it belongs to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub identity: Identity,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("identity", &self.identity)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Persistence seam for stored sessions (keychain, file, in-memory).
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Callback invoked whenever the signed-in identity changes.
pub type StateListener = Box<dyn Fn(Option<&Identity>) + Send + Sync>;

type SharedListener = Arc<dyn Fn(Option<&Identity>) + Send + Sync>;

/// Sign-in state as consumed by the sync coordinator.
pub trait AuthProvider: Send + Sync {
    /// Currently signed-in identity, if any.
    fn identity(&self) -> Option<Identity>;

    /// Bearer token authorizing remote store calls, if signed in.
    fn access_token(&self) -> Option<String>;

    /// Register a listener for sign-in/sign-out transitions.
    fn on_state_change(&self, listener: StateListener);
}

/// Google OAuth client configuration.
///
/// The client secret is optional: installed-app clients carry one, but it is
/// not treated as confidential by Google for this client type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
}

#[derive(Clone)]
pub struct GoogleAuthClient<S: SessionPersistence> {
    config: GoogleAuthConfig,
    client: Client,
    store: S,
    session: Arc<RwLock<Option<AuthSession>>>,
    listeners: Arc<Mutex<Vec<SharedListener>>>,
}

impl<S: SessionPersistence> GoogleAuthClient<S> {
    pub fn new(config: GoogleAuthConfig, store: S) -> AuthResult<Self> {
        let client_id = normalize_text_option(Some(config.client_id)).ok_or(
            AuthError::InvalidConfiguration("Google client id must not be empty"),
        )?;

        Ok(Self {
            config: GoogleAuthConfig {
                client_id,
                client_secret: normalize_text_option(config.client_secret),
            },
            client: Client::builder().build()?,
            store,
            session: Arc::new(RwLock::new(None)),
            listeners: Arc::new(Mutex::new(Vec::new())),
        })
    }

    #[must_use]
    pub fn current_session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Restore the persisted session, refreshing it when expired.
    ///
    /// A failed refresh clears the stored session rather than erroring, so a
    /// revoked grant degrades to the signed-out state.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            self.install_session(Some(stored_session.clone()));
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                self.install_session(None);
                Ok(None)
            }
        }
    }

    /// Sign in with a refresh token minted by an external consent flow.
    pub async fn sign_in_with_refresh_token(
        &self,
        refresh_token: &str,
    ) -> AuthResult<AuthSession> {
        let session = self.refresh_session(refresh_token).await?;
        Ok(session)
    }

    /// Exchange a refresh token for a fresh access token and profile.
    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(client_secret) = &self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        let payload = response.json::<TokenResponse>().await?;

        let access_token = normalize_text_option(payload.access_token).ok_or_else(|| {
            AuthError::Api("Token response did not include an access_token".to_string())
        })?;
        let expires_in = payload.expires_in.ok_or_else(|| {
            AuthError::Api("Token response did not include expires_in".to_string())
        })?;

        let identity = self.fetch_identity(&access_token).await?;
        let session = AuthSession {
            access_token,
            // Google's refresh grant does not rotate the refresh token.
            refresh_token: refresh_token.to_string(),
            expires_at: unix_timestamp_now().saturating_add(expires_in),
            identity,
        };

        self.store.save_session(&session)?;
        self.install_session(Some(session.clone()));
        Ok(session)
    }

    /// Revoke the current grant and clear all sign-in state.
    pub async fn sign_out(&self) -> AuthResult<()> {
        if let Some(session) = self.current_session() {
            let response = self
                .client
                .post(REVOKE_ENDPOINT)
                .form(&[("token", session.refresh_token.as_str())])
                .send()
                .await?;
            // 400 means the token was already revoked or expired.
            if !(response.status().is_success() || response.status() == StatusCode::BAD_REQUEST) {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AuthError::Api(parse_api_error(status, &body)));
            }
        }

        self.store.clear_session()?;
        self.install_session(None);
        Ok(())
    }

    async fn fetch_identity(&self, access_token: &str) -> AuthResult<Identity> {
        let response = self
            .client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        let payload = response.json::<UserInfoResponse>().await?;
        Ok(payload.into())
    }

    fn install_session(&self, session: Option<AuthSession>) {
        {
            let mut slot = self.session.write().unwrap_or_else(PoisonError::into_inner);
            *slot = session.clone();
        }

        let identity = session.map(|session| session.identity);
        // Snapshot before invoking so listeners may register further
        // listeners without deadlocking.
        let snapshot: Vec<SharedListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &snapshot {
            listener(identity.as_ref());
        }
    }
}

impl<S: SessionPersistence> AuthProvider for GoogleAuthClient<S> {
    fn identity(&self) -> Option<Identity> {
        self.current_session()
            .filter(|session| !session.is_expired())
            .map(|session| session.identity)
    }

    fn access_token(&self) -> Option<String> {
        self.current_session()
            .filter(|session| !session.is_expired())
            .map(|session| session.access_token)
    }

    fn on_state_change(&self, listener: StateListener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::from(listener));
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}

impl From<UserInfoResponse> for Identity {
    fn from(value: UserInfoResponse) -> Self {
        Self {
            id: value.sub,
            name: value.name,
            email: value.email,
            picture: value.picture,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<OAuthErrorBody>(body) {
        if let Some(message) = payload.error_description.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
