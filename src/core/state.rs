//! State Management
//!
//! Anti-CSRF `state` parameter generation and validation for the
//! authorization-code flow. One state value is held per session, written when
//! the authorization redirect is built and consumed when the code exchange
//! response echoes it back.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{ApiError, AuthorizationError};

/// State manager interface (for dependency injection).
pub trait StateManager: Send + Sync {
    /// Generate a new state value and store it, replacing any previous one.
    fn issue(&self) -> String;

    /// Validate and consume the stored state against a received value.
    ///
    /// A mismatch or an expired/absent stored state is fatal; nothing may be
    /// persisted after a failed validation.
    fn validate(&self, received: &str) -> Result<(), ApiError>;

    /// Peek at the stored state without consuming it.
    fn current(&self) -> Option<String>;
}

/// In-memory state manager holding a single session slot.
pub struct InMemoryStateManager {
    slot: Mutex<Option<(String, Instant)>>,
    max_age: Duration,
}

impl InMemoryStateManager {
    /// Create new state manager with default TTL (10 minutes).
    pub fn new() -> Self {
        Self::with_max_age(Duration::from_secs(600))
    }

    /// Create state manager with custom TTL.
    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            max_age,
        }
    }

    fn generate_random_state() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let digest = Sha256::digest(bytes);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl Default for InMemoryStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager for InMemoryStateManager {
    fn issue(&self) -> String {
        let state = Self::generate_random_state();
        *self.slot.lock().unwrap() = Some((state.clone(), Instant::now()));
        state
    }

    fn validate(&self, received: &str) -> Result<(), ApiError> {
        let stored = self.slot.lock().unwrap().take();

        let (expected, issued_at) = stored.ok_or_else(|| {
            ApiError::Authorization(AuthorizationError::StateMismatch {
                expected: "<none>".to_string(),
                received: received.to_string(),
            })
        })?;

        if issued_at.elapsed() > self.max_age {
            return Err(ApiError::Authorization(AuthorizationError::StateExpired));
        }

        if expected != received {
            return Err(ApiError::Authorization(AuthorizationError::StateMismatch {
                expected,
                received: received.to_string(),
            }));
        }

        Ok(())
    }

    fn current(&self) -> Option<String> {
        self.slot.lock().unwrap().as_ref().map(|(s, _)| s.clone())
    }
}

/// Mock state manager for testing.
#[derive(Default)]
pub struct MockStateManager {
    slot: Mutex<Option<String>>,
    next_state: Mutex<Option<String>>,
    validate_history: Mutex<Vec<String>>,
}

impl MockStateManager {
    /// Create new mock state manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the next state to issue.
    pub fn set_next_state(&self, state: impl Into<String>) -> &Self {
        *self.next_state.lock().unwrap() = Some(state.into());
        self
    }

    /// Pre-populate the stored state.
    pub fn set_stored_state(&self, state: impl Into<String>) -> &Self {
        *self.slot.lock().unwrap() = Some(state.into());
        self
    }

    /// Get validate history.
    pub fn get_validate_history(&self) -> Vec<String> {
        self.validate_history.lock().unwrap().clone()
    }
}

impl StateManager for MockStateManager {
    fn issue(&self) -> String {
        let state = self
            .next_state
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| format!("mock-state-{}", rand::random::<u32>()));
        *self.slot.lock().unwrap() = Some(state.clone());
        state
    }

    fn validate(&self, received: &str) -> Result<(), ApiError> {
        self.validate_history
            .lock()
            .unwrap()
            .push(received.to_string());

        let stored = self.slot.lock().unwrap().take();
        match stored {
            Some(expected) if expected == received => Ok(()),
            Some(expected) => Err(ApiError::Authorization(AuthorizationError::StateMismatch {
                expected,
                received: received.to_string(),
            })),
            None => Err(ApiError::Authorization(AuthorizationError::StateMismatch {
                expected: "<none>".to_string(),
                received: received.to_string(),
            })),
        }
    }

    fn current(&self) -> Option<String> {
        self.slot.lock().unwrap().clone()
    }
}
