//! Command implementations.
//!
//! Every command runs against a [`Context`] that restores the persisted
//! session and hydrates the cart and wishlist before the command itself.

pub mod cart;
pub mod order;
pub mod session;
pub mod wishlist;

use std::sync::{Arc, Mutex, PoisonError};

use ecomall_client::{
    ApiError, ClientConfig, FileCache, LocalCache, Notice, SessionHolder, StoreApi, SyncError,
    Synchronizer,
};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Remote store request failed outside the synchronizer (login,
    /// registration, payment outcome reports).
    #[error("API client error: {0}")]
    Api(#[from] ApiError),

    /// Cart or wishlist operation did not take effect.
    #[error("{0}")]
    Sync(#[from] SyncError),

    /// Terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a command needs.
pub struct Context {
    pub api: Arc<StoreApi>,
    pub session: SessionHolder,
    pub sync: Arc<Synchronizer>,
    notices: Mutex<broadcast::Receiver<Notice>>,
}

impl Context {
    /// Build the client stack from configuration and hydrate the restored
    /// session, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub async fn open(config: &ClientConfig) -> Result<Self, CommandError> {
        let api = Arc::new(StoreApi::from_config(config)?);
        let cache: Arc<dyn LocalCache> = Arc::new(FileCache::new(config.cache_dir.clone()));

        let session = SessionHolder::new(Arc::clone(&cache));
        let sync = Arc::new(Synchronizer::new(api.clone(), cache));
        let notices = Mutex::new(sync.subscribe_notices());

        sync.handle_session_change(session.user_id()).await;

        Ok(Self {
            api,
            session,
            sync,
            notices,
        })
    }

    /// Print every notice published so far.
    #[allow(clippy::print_stdout)]
    pub fn print_notices(&self) {
        let mut rx = self.notices.lock().unwrap_or_else(PoisonError::into_inner);
        while let Ok(notice) = rx.try_recv() {
            println!("{notice}");
        }
    }
}
