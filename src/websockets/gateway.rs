use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::session::{Identity, IdentityResolver, LookupError, TokenConfig};
use crate::shared::AppError;

pub const REASON_TOKEN_REQUIRED: &str = "Authentication token required";
pub const REASON_USER_NOT_FOUND: &str = "User not found";
pub const REASON_INVALID_TOKEN: &str = "Invalid authentication token";

#[derive(Debug, Error, PartialEq)]
pub enum GatewayError {
    #[error("Missing authentication token")]
    MissingToken,

    #[error("Invalid authentication token: {0}")]
    InvalidToken(String),

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl From<GatewayError> for AppError {
    fn from(error: GatewayError) -> Self {
        let reason = match error {
            GatewayError::MissingToken => REASON_TOKEN_REQUIRED,
            GatewayError::InvalidToken(_) => REASON_INVALID_TOKEN,
            GatewayError::UserNotFound | GatewayError::Lookup(_) => REASON_USER_NOT_FOUND,
        };
        AppError::Unauthorized(reason.to_string())
    }
}

/// Records that the client or transport gave up on a pending handshake
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Guard that aborts the signal when dropped, unless disarmed first.
    /// Held across the handshake so a cancelled request future trips the signal.
    pub fn guard(&self) -> AbortGuard {
        AbortGuard {
            signal: self.clone(),
            armed: true,
        }
    }
}

pub struct AbortGuard {
    signal: AbortSignal,
    armed: bool,
}

impl AbortGuard {
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            self.signal.abort();
        }
    }
}

/// Result of a handshake that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeOutcome {
    Accepted(Identity),
    /// The request went away while the identity was being resolved
    Aborted,
}

/// Authenticates upgrade requests: token verification, then identity lookup
pub struct Gateway {
    tokens: TokenConfig,
    identities: Arc<dyn IdentityResolver>,
}

impl Gateway {
    pub fn new(tokens: TokenConfig, identities: Arc<dyn IdentityResolver>) -> Self {
        Self { tokens, identities }
    }

    /// Runs the handshake for one request.
    ///
    /// The abort flag is re-checked after the identity lookup; an aborted
    /// handshake yields [`HandshakeOutcome::Aborted`] and must not touch the transport.
    #[instrument(skip(self, token, abort))]
    pub async fn authenticate(
        &self,
        token: Option<&str>,
        abort: &AbortSignal,
    ) -> Result<HandshakeOutcome, GatewayError> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => {
                warn!("WebSocket handshake without token");
                return Err(GatewayError::MissingToken);
            }
        };

        let claims = self.tokens.validate_token(token).map_err(|e| {
            warn!(error = %e, "WebSocket handshake with invalid token");
            GatewayError::InvalidToken(e.to_string())
        })?;

        let resolved = self.identities.resolve(&claims).await;

        if abort.is_aborted() {
            debug!(subject = %claims.id, "Handshake aborted during identity lookup");
            return Ok(HandshakeOutcome::Aborted);
        }

        match resolved {
            Ok(Some(identity)) => {
                info!(
                    subject = %identity.id,
                    collection = %identity.collection,
                    "WebSocket authentication successful"
                );
                Ok(HandshakeOutcome::Accepted(identity))
            }
            Ok(None) => {
                warn!(
                    subject = %claims.id,
                    collection = %claims.collection,
                    "Token subject not found"
                );
                Err(GatewayError::UserNotFound)
            }
            Err(e) => {
                warn!(subject = %claims.id, error = %e, "Identity lookup failed");
                Err(GatewayError::Lookup(e))
            }
        }
    }
}
