//! Authentication Collaborator Seam
//!
//! Notex does not manage sessions itself; it consumes an authentication
//! collaborator through the narrow [`SessionProvider`] trait. A `None` user
//! id on any mutating store call is reported as `Unauthenticated`, never
//! silently ignored.

use std::sync::RwLock;

/// Read-only view of the active session.
///
/// Implementations must be cheap to call; the store consults the session on
/// every operation so that mid-flight sign-out is observed immediately.
pub trait SessionProvider: Send + Sync {
    /// The authenticated user's id, or `None` when signed out.
    fn current_user_id(&self) -> Option<String>;
}

/// In-process session holder for embedding and tests.
///
/// Supports sign-in/sign-out transitions so session-expiry paths can be
/// exercised without a real auth stack.
///
/// # Examples
///
/// ```rust
/// use notex_core::auth::{SessionProvider, StaticSession};
///
/// let session = StaticSession::new("user-1");
/// assert_eq!(session.current_user_id().as_deref(), Some("user-1"));
///
/// session.sign_out();
/// assert!(session.current_user_id().is_none());
/// ```
#[derive(Debug, Default)]
pub struct StaticSession {
    user_id: RwLock<Option<String>>,
}

impl StaticSession {
    /// Session already signed in as `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: RwLock::new(Some(user_id.into())),
        }
    }

    /// Session with nobody signed in.
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Replace the active user.
    pub fn sign_in(&self, user_id: impl Into<String>) {
        if let Ok(mut guard) = self.user_id.write() {
            *guard = Some(user_id.into());
        }
    }

    /// Clear the active user (session expiry).
    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.user_id.write() {
            *guard = None;
        }
    }
}

impl SessionProvider for StaticSession {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.read().ok().and_then(|guard| guard.clone())
    }
}
