//! # weights-rs
//!
//! Async Rust client for the Weights image-generation API.
//!
//! Provides a typed client for the REST endpoints (status, quota, Lora
//! search, generation) and a progressive-generation flow that submits a
//! job and polls its status until completion, reporting each state
//! transition through a caller-supplied callback. Every operation is
//! preceded by a health probe so callers fail fast when the service is
//! down instead of burning a generation slot.
//!
//! ## Quick Start
//!
//! ```no_run
//! use weights_rs::{PollOptions, WeightsClient};
//! use std::time::Duration;
//!
//! # async fn example() -> weights_rs::Result<()> {
//! // Reads WEIGHTS_UNOFFICIAL_ENDPOINT and WEIGHTS_API_KEY,
//! // defaulting to http://localhost:3000.
//! let client = WeightsClient::from_env();
//!
//! let loras = client.search_loras("watercolor").await?;
//! let lora = loras.first().map(|l| l.name.as_str());
//!
//! let options = PollOptions::default().with_deadline(Duration::from_secs(300));
//! let snapshot = client
//!     .generate_progressive_with("a sunset over mountains", lora, options, |update| {
//!         println!("{} is now {:?}", update.image_id, update.status);
//!     })
//!     .await?;
//!
//! println!("finished: {:?}", snapshot.status);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{PollOptions, WeightsClient, DEFAULT_ENDPOINT};
pub use error::{Result, WeightsError};
pub use types::{GenerationTicket, JobStatus, LoraSearchResult, StatusSnapshot, StatusUpdate};
