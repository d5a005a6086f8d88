//! Venue session lifecycle
//!
//! The session is the only state that outlives a cycle. It is created lazily,
//! reused while established, and dropped when a login attempt fails so the
//! next cycle starts from scratch.

pub mod angel;
pub mod totp;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::VenueConfig;
use crate::error::AuthError;
pub use angel::AngelOneClient;
pub use totp::PasscodeGenerator;

/// Credentials sent to the venue's session-creation endpoint
#[derive(Clone)]
pub struct LoginRequest {
    pub client_id: String,
    pub mpin: String,
    pub passcode: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Venue session creation. Returns the session token on success.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenueAuthenticator: Send + Sync {
    async fn create_session(&self, request: &LoginRequest) -> Result<String, AuthError>;
}

/// Session state held between cycles
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: String,
    established: bool,
    established_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_established(&self) -> bool {
        self.established
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn establish(&mut self, token: String) {
        self.token = token;
        self.established = true;
        self.established_at = Some(Utc::now());
    }

    fn invalidate(&mut self) {
        self.token.clear();
        self.established = false;
        self.established_at = None;
    }

    fn older_than(&self, max_age: Duration) -> bool {
        match self.established_at {
            Some(at) => Utc::now()
                .signed_duration_since(at)
                .to_std()
                .map(|age| age >= max_age)
                .unwrap_or(false),
            None => true,
        }
    }
}

/// Session context handed to the catalog client and to every strategy job
#[derive(Clone)]
pub struct SessionHandle {
    pub token: String,
    pub client_id: String,
    pub api_key: String,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Owns the authenticated venue session
pub struct SessionManager {
    authenticator: Box<dyn VenueAuthenticator>,
    passcodes: PasscodeGenerator,
    client_id: String,
    mpin: String,
    api_key: String,
    max_age: Option<Duration>,
    session: Session,
}

impl SessionManager {
    pub fn new(
        authenticator: Box<dyn VenueAuthenticator>,
        config: &VenueConfig,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            authenticator,
            passcodes: PasscodeGenerator::from_base32(&config.totp_secret)?,
            client_id: config.client_id.clone(),
            mpin: config.mpin.clone(),
            api_key: config.api_key.clone(),
            max_age: config.max_session_age_secs.map(Duration::from_secs),
            session: Session::default(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the held session can be reused without contacting the venue
    pub fn is_usable(&self) -> bool {
        if !self.session.is_established() {
            return false;
        }
        match self.max_age {
            Some(max_age) => !self.session.older_than(max_age),
            None => true,
        }
    }

    /// Drop the held session; the next `ensure_session` logs in again.
    pub fn invalidate(&mut self) {
        if self.session.is_established() {
            info!("Venue session invalidated");
        }
        self.session.invalidate();
    }

    /// Return the held session, logging in first if none is usable.
    ///
    /// Never retries: a failure leaves the session not-established and the
    /// caller decides when to try again.
    pub async fn ensure_session(&mut self) -> Result<SessionHandle, AuthError> {
        if self.is_usable() {
            debug!("Reusing established venue session");
            return Ok(self.handle());
        }

        if self.session.is_established() {
            info!("Venue session exceeded its maximum age, re-authenticating");
        }
        self.session.invalidate();

        info!(client_id = %self.client_id, "Authenticating with venue");

        let request = LoginRequest {
            client_id: self.client_id.clone(),
            mpin: self.mpin.clone(),
            passcode: self.passcodes.current()?,
        };

        match self.authenticator.create_session(&request).await {
            Ok(token) => {
                self.session.establish(token);
                info!("Venue session established");
                Ok(self.handle())
            }
            Err(e) => {
                error!(error = %e, "Venue authentication failed");
                Err(e)
            }
        }
    }

    fn handle(&self) -> SessionHandle {
        SessionHandle {
            token: self.session.token().to_string(),
            client_id: self.client_id.clone(),
            api_key: self.api_key.clone(),
        }
    }
}
