//! Session lifecycle management.
//!
//! Owns the authenticated-user state and orchestrates login, registration,
//! logout, email verification and password reset against the auth
//! endpoints. Token custody lives in the gateway; this module decides when
//! tokens are adopted and when the session falls back to logged out.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::gateway::single_flight::SingleFlight;
use crate::gateway::Gateway;
use crate::models::User;
use crate::notify::Notifier;
use crate::storage::{slots, Storage};

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    user: Option<User>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Anonymous,
            user: None,
        }
    }
}

/// Persisted subset of the session state. Tokens live in their own slots,
/// owned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthSnapshot {
    user: Option<User>,
    is_authenticated: bool,
}

fn partialize(state: &SessionState) -> AuthSnapshot {
    AuthSnapshot {
        user: state.user.clone(),
        is_authenticated: matches!(
            state.phase,
            SessionPhase::Authenticated | SessionPhase::Refreshing
        ),
    }
}

fn hydrate_state(snapshot: AuthSnapshot) -> SessionState {
    SessionState {
        phase: if snapshot.is_authenticated {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        },
        user: snapshot.user,
    }
}

/// Manages the authentication session.
#[derive(Clone)]
pub struct SessionManager {
    gateway: Gateway,
    state: Arc<RwLock<SessionState>>,
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    profile_flight: Arc<SingleFlight<Result<User, ApiError>>>,
}

impl SessionManager {
    pub fn new(
        gateway: Gateway,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(SessionState::default())),
            storage,
            notifier,
            profile_flight: Arc::new(SingleFlight::new()),
        }
    }

    // ---- accessors ----

    /// Current user profile, if fetched.
    pub fn user(&self) -> Option<User> {
        self.state.read().expect("session lock poisoned").user.clone()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.state.read().expect("session lock poisoned").phase
    }

    /// True iff an access token is held and the user has been fetched.
    pub fn is_authenticated(&self) -> bool {
        let state = self.state.read().expect("session lock poisoned");
        matches!(
            state.phase,
            SessionPhase::Authenticated | SessionPhase::Refreshing
        ) && state.user.is_some()
            && self.gateway.access_token().is_some()
    }

    // ---- operations ----

    /// Authenticate with email and password. On failure the prior session
    /// state is left untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let prior = {
            let mut state = self.state.write().expect("session lock poisoned");
            let prior = state.phase;
            state.phase = SessionPhase::Authenticating;
            prior
        };

        match self.gateway.login(email, password).await {
            Ok(auth) => {
                self.gateway.adopt_tokens(&auth.tokens());
                {
                    let mut state = self.state.write().expect("session lock poisoned");
                    state.user = Some(auth.user.clone());
                    state.phase = SessionPhase::Authenticated;
                }
                self.persist();
                self.notifier.success("Logged in successfully");
                Ok(auth.user)
            }
            Err(err) => {
                let mut state = self.state.write().expect("session lock poisoned");
                state.phase = prior;
                drop(state);
                Err(err)
            }
        }
    }

    /// Create an account. Success does not authenticate; the account still
    /// requires email verification.
    pub async fn register(&self, email: &str, password: &str, locale: &str) -> Result<(), ApiError> {
        self.gateway.register(email, password, locale).await?;
        self.notifier
            .success("Registration successful. Please check your email for verification.");
        Ok(())
    }

    /// Clear the session from memory and storage. Idempotent, no network.
    pub fn logout(&self) {
        self.gateway.clear_tokens();
        {
            let mut state = self.state.write().expect("session lock poisoned");
            state.user = None;
            state.phase = SessionPhase::Anonymous;
        }
        if let Err(err) = self.storage.remove(slots::AUTH_STATE) {
            tracing::warn!(error = %err, "failed to clear auth snapshot");
        }
        self.notifier.success("Logged out successfully");
    }

    /// Fetch the current user profile with the stored access token.
    /// Concurrent callers share one outstanding request. A failed fetch
    /// falls back to a fully logged-out state rather than keeping a
    /// dangling authenticated-without-user session.
    pub async fn refresh_user(&self) -> Result<(), ApiError> {
        if self.gateway.access_token().is_none() {
            return Ok(());
        }

        {
            let mut state = self.state.write().expect("session lock poisoned");
            if state.phase == SessionPhase::Authenticated {
                state.phase = SessionPhase::Refreshing;
            }
        }

        let this = self.clone();
        self.profile_flight
            .run(move || async move { this.fetch_current_user().await })
            .await
            .map(|_| ())
    }

    async fn fetch_current_user(&self) -> Result<User, ApiError> {
        match self.gateway.current_user().await {
            Ok(user) => {
                {
                    let mut state = self.state.write().expect("session lock poisoned");
                    state.user = Some(user.clone());
                    state.phase = SessionPhase::Authenticated;
                }
                self.persist();
                Ok(user)
            }
            Err(err) => {
                self.logout();
                Err(err)
            }
        }
    }

    /// Stateless pass-through: confirm an email address.
    pub async fn verify_email(&self, token: &str) -> Result<(), ApiError> {
        self.gateway.verify_email(token).await?;
        self.notifier.success("Email verified successfully");
        Ok(())
    }

    /// Stateless pass-through: request a password reset email.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        self.gateway.request_password_reset(email).await?;
        self.notifier.success("Password reset email sent");
        Ok(())
    }

    /// Stateless pass-through: set a new password with a reset token.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        self.gateway.reset_password(token, new_password).await?;
        self.notifier.success("Password reset successfully");
        Ok(())
    }

    /// OAuth callback path: adopt the access token immediately, then
    /// validate it by fetching the profile. If validation fails the session
    /// reverts to logged out.
    pub async fn set_token(&self, token: &str) -> Result<(), ApiError> {
        self.gateway.adopt_access_token(token);
        {
            let mut state = self.state.write().expect("session lock poisoned");
            state.phase = SessionPhase::Authenticated;
        }
        self.persist();
        self.refresh_user().await
    }

    /// Restore the persisted session subset on startup.
    pub fn hydrate(&self) -> Result<(), ApiError> {
        self.gateway.load_tokens()?;
        if let Some(raw) = self.storage.read(slots::AUTH_STATE)? {
            match serde_json::from_str::<AuthSnapshot>(&raw) {
                Ok(snapshot) => {
                    let mut state = self.state.write().expect("session lock poisoned");
                    *state = hydrate_state(snapshot);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "discarding unreadable auth snapshot");
                }
            }
        }
        Ok(())
    }

    fn persist(&self) {
        let snapshot = {
            let state = self.state.read().expect("session lock poisoned");
            partialize(&state)
        };
        match serde_json::to_string(&snapshot) {
            Ok(raw) => {
                if let Err(err) = self.storage.write(slots::AUTH_STATE, &raw) {
                    tracing::warn!(error = %err, "failed to persist auth snapshot");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize auth snapshot"),
        }
    }
}
