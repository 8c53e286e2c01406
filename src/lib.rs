#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]
//! # etirelay
//!
//! etirelay presents the threads and listings of a remote web forum as a
//! normalized messaging protocol: get a range of a thread, list topics,
//! read bookmarks.
//!
//! Threads are fetched once in full and cached; later requests only fetch the
//! messages past what is already held. Threads carrying restricted tags or
//! moderator notes are served but never cached.
//!
//! This library handles:
//! - Mapping message ranges and continuation tokens onto the site's 50-message pages.
//! - Incremental fetches merged into cached thread state.
//! - Archived threads, including ones archived since they were cached.
//! - Per-user bookmark caching, refreshed whenever a listing is fetched.
//!
//! ## Example: Reading the first page of a thread.
//!
//! ```no_run
//! # type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
//! use etirelay::{Client, Config, Gateway, GetRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default();
//!     let gateway = Gateway::new(Client::new(&config)?, &config)?;
//!
//!     let view = gateway.get(&GetRequest::new("123456").range(1, 50)).await?;
//!     for msg in &view.messages {
//!         println!("{}: {}", msg.author(), msg.body());
//!     }
//!
//!     // continue where the last response stopped
//!     let next = gateway.get(&GetRequest::new("123456").token(view.next_token)).await?;
//!     println!("{} more", next.messages.len());
//!     Ok(())
//! }
//! ```

/// Thread and bookmark caches, and the policy deciding what may be cached.
pub mod cache;

/// Client module contains [`Client`] for fetching pages from the remote.
pub mod client;

/// Relay configuration.
pub mod config;

/// Contains [`Error`]s that can be thrown by the libary.
///
/// [`Error`]: crate::error::Error
pub mod error;

/// HTML extraction of remote pages.
pub mod extract;

/// The [`Fetcher`](crate::fetcher::Fetcher) seam between the gateway and the remote.
pub mod fetcher;

/// The retrieval orchestrator.
pub mod gateway;

/// Data types shared across the crate.
pub mod models;

/// Ranges, tokens and page arithmetic.
pub mod range;

pub(crate) mod result;

/// Remote URL layout.
pub mod site;

pub use client::Client;
pub use config::Config;
pub use error::Error;
pub use gateway::{Gateway, GetRequest};
pub use models::*;
pub use range::{ContinuationToken, Range};
