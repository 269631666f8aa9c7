//! Session identity.
//!
//! The [`SessionHolder`] is the single source of truth for who is logged in.
//! The user survives restarts through the `auth_user` cache key, and every
//! change is published on a watch channel so the synchronizer can react.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use ecomall_core::{CurrentUser, UserId};

use crate::api::{ApiError, NewAccount, StoreApi};
use crate::cache::{LocalCache, keys, load_or_none, store_or_warn};

/// Holds the current user, if any.
pub struct SessionHolder {
    cache: Arc<dyn LocalCache>,
    sender: watch::Sender<Option<CurrentUser>>,
}

impl SessionHolder {
    /// Restore the session persisted in `cache`.
    pub fn new(cache: Arc<dyn LocalCache>) -> Self {
        let restored = load_or_none::<CurrentUser>(cache.as_ref(), keys::AUTH_USER);
        if let Some(user) = &restored {
            info!(user_id = %user.user_id, "Restored session");
        }

        let (sender, _) = watch::channel(restored);
        Self { cache, sender }
    }

    #[must_use]
    pub fn current(&self) -> Option<CurrentUser> {
        self.sender.borrow().clone()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.sender.borrow().as_ref().map(|u| u.user_id)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// Receive the current user and every later change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<CurrentUser>> {
        self.sender.subscribe()
    }

    /// Make `user` the current user and persist it.
    pub fn set_user(&self, user: CurrentUser) {
        info!(user_id = %user.user_id, "Session established");
        store_or_warn(self.cache.as_ref(), keys::AUTH_USER, &user);
        self.sender.send_replace(Some(user));
    }

    /// End the session and forget the persisted user.
    pub fn logout(&self) {
        if let Err(e) = self.cache.remove(keys::AUTH_USER) {
            warn!(error = %e, "Failed to remove persisted session");
        }
        if self.sender.send_replace(None).is_some() {
            info!("Session ended");
        }
    }

    /// Authenticate against the store and establish the session.
    ///
    /// # Errors
    ///
    /// Returns the API error when the credentials are rejected or the store
    /// is unreachable. The current session is left as it was.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        api: &StoreApi,
        email: &str,
        password: &SecretString,
    ) -> Result<CurrentUser, ApiError> {
        let user = api.login(email, password).await?;
        self.set_user(user.clone());
        Ok(user)
    }

    /// Create an account and log in as the new user.
    ///
    /// # Errors
    ///
    /// Returns the API error when the backend refuses the details. The
    /// current session is left as it was.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        api: &StoreApi,
        account: &NewAccount,
    ) -> Result<CurrentUser, ApiError> {
        let user = api.register(account).await?;
        self.set_user(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::cache::MemoryCache;

    use super::*;

    fn user(id: i32) -> CurrentUser {
        let mut user = CurrentUser::new(UserId::new(id));
        user.email = Some("asha@example.com".to_string());
        user
    }

    #[test]
    fn test_starts_logged_out() {
        let session = SessionHolder::new(Arc::new(MemoryCache::new()));
        assert!(session.current().is_none());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_set_user_persists_and_restores() {
        let cache = Arc::new(MemoryCache::new());
        let session = SessionHolder::new(cache.clone());
        session.set_user(user(42));
        assert_eq!(session.user_id(), Some(UserId::new(42)));
        assert!(cache.get(keys::AUTH_USER).is_some());

        let restored = SessionHolder::new(cache);
        assert_eq!(
            restored.current().unwrap().email.as_deref(),
            Some("asha@example.com")
        );
    }

    #[test]
    fn test_logout_clears_persisted_user() {
        let cache = Arc::new(MemoryCache::new());
        let session = SessionHolder::new(cache.clone());
        session.set_user(user(1));
        session.logout();

        assert!(session.current().is_none());
        assert!(cache.get(keys::AUTH_USER).is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let session = SessionHolder::new(Arc::new(MemoryCache::new()));
        let mut rx = session.subscribe();
        assert!(rx.borrow_and_update().is_none());

        session.set_user(user(5));
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|u| u.user_id),
            Some(UserId::new(5))
        );

        session.logout();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }
}
