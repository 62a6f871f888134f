//! Tollgate Client SDK.
//!
//! A typed async client for the public `/api/v1` surface of a tollgate
//! service: usage tracking, provider routing, analytics and webhooks.
//!
//! # Example
//!
//! ```no_run
//! use tollgate_client::{TokenUsage, TollgateClient, TrackEvent};
//!
//! # async fn example() -> Result<(), tollgate_client::ClientError> {
//! let client = TollgateClient::new("https://tollgate.example.com", "tg_your_api_key")?;
//!
//! let tracked = client
//!     .track(&TrackEvent {
//!         provider: "anthropic".to_string(),
//!         model: Some("claude-3-haiku-20240307".to_string()),
//!         tokens: Some(TokenUsage { input: 1200, output: 340 }),
//!         cost: None,
//!         metadata: None,
//!     })
//!     .await?;
//!
//! println!("Recorded usage {}", tracked.id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, TollgateClient};
pub use error::ClientError;
pub use types::*;
