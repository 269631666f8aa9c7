//! EcoMall cart and wishlist client.
//!
//! This crate keeps a shopper's cart and wishlist consistent between a local
//! cache and the EcoMall store backend:
//!
//! - [`api`]: JSON client for the backend's cart, wishlist, account and order
//!   endpoints
//! - [`session`]: the current user, persisted across restarts
//! - [`sync`]: the synchronizer that owns the in-memory collections and checks
//!   the cart out
//! - [`cache`]: the persisted key/value cache both of the above write to
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! let config = ClientConfig::from_env()?;
//! let api = Arc::new(StoreApi::from_config(&config)?);
//! let cache: Arc<dyn LocalCache> = Arc::new(FileCache::new(&config.cache_dir));
//!
//! let session = SessionHolder::new(cache.clone());
//! let sync = Arc::new(Synchronizer::new(api.clone(), cache));
//! sync.handle_session_change(session.user_id()).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod config;
pub mod notice;
pub mod session;
pub mod sync;

pub use api::{ApiError, NewAccount, RemoteStoreClient, StoreApi};
pub use cache::{FileCache, LocalCache, MemoryCache};
pub use config::ClientConfig;
pub use notice::{Notice, NoticeLevel};
pub use session::SessionHolder;
pub use sync::{CartBackend, CollectionKind, Phase, SyncError, Synchronizer};
