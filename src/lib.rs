//! # iobeam client library
//!
//! A client for the iobeam time-series ingestion API, for devices and services that collect
//! measurements locally and ship them in batches.
//!
//! At a high level, iobeam-rs provides a few major capabilities:
//!
//! * Device registration, including adopting an id that is already registered
//! * Buffering of measurements in column oriented data stores with a fixed batch limit
//! * Serialized, non-blocking network operations per client
//! * Transparent refresh of expired project tokens
//! * Optional persistence of the device id between runs
//! * Feature flags that let you choose functionality to suit your use case
//!
//! ## Not supported
//! The following will *not* be supported by this library
//!
//! * Retries or backoff; every operation is attempted exactly once
//! * Coordination between independently built clients
//! * Cancellation of queued operations
//!
//! # Integrating iobeam-rs
//!
//! The easiest way to get started is to include the following in Cargo.toml
//!
//! ```toml
//! iobeam-rs = { version = "0.1", features = ["http", "extras"] }
//! ```
//!
//! A client is configured with a [`Builder`] and must be built inside a tokio runtime:
//!
//! ```no_run
//! use iobeam_rs::{Builder, Device};
//!
//! # async fn run() -> Result<(), iobeam_rs::ClientError> {
//! let client = Builder::new(1, "project-token")?
//!     .set_save_path("/var/lib/iobeam")
//!     .register(
//!         Some(Device::new("sensor-1")?),
//!         |result| {
//!             if let Err(e) = result {
//!                 log::error!("Registration failed: {}", e);
//!             }
//!         },
//!         true,
//!     )
//!     .build()?;
//!
//! let store = client.create_data_store(["temperature", "humidity"])?;
//! store.add_now([("temperature", 21.5), ("humidity", 0.4)])?;
//!
//! client.send(|result, batch| match result {
//!     Ok(()) => log::info!("Sent {} values", batch.size()),
//!     Err(e) => log::warn!("Send failed, {} values kept aside: {}", batch.size(), e),
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! Input errors (a bad device id, an unknown column, a full store) are returned directly.
//! Network outcomes are only ever delivered to the operation's callback.
//!
//! # Under the hood
//!
//! ### Operation queue
//!
//! Each client owns a FIFO queue with a single in-flight slot. `register`, `send` and token
//! refreshes are queued and executed one at a time, so a registration started before a send is
//! guaranteed to finish, and its callback to have run, before the send's request goes out.
//! A failing or even panicking operation never stalls the queue.
//!
//! ### Token refresh
//!
//! Before an operation is queued the project token is checked for expiry (see [`JwtExpiry`]).
//! An expired token causes a refresh to be queued directly ahead of the operation. On success
//! the endpoints are re-bound to the new token; on failure the operation goes ahead with the
//! old one and the server decides.
//!
//! ### Requester
//!
//! All HTTP traffic goes through the [`Requester`] trait. The `http` feature provides
//! [`httpclient::HttpRequester`] on top of reqwest, configured by a shared
//! [`ConnectionSettings`]. Anything else (a proxy, a test double) can be plugged in with
//! [`Builder::set_requester`].
//!
//! ### Endpoints
//!
//! The REST resources (devices, imports, tokens, exports) are wrapped by small services in
//! [`endpoints`]; their results come back as an [`ApiResponse`] envelope.
//!
//! ## Feature flags
//!
//!  * `http` (default): the reqwest based requester
//!  * `config`: YAML client configuration in [`extras::config`]
//!  * `extras`: all optional helpers
//!

pub mod api;
pub mod builder;
pub mod client;
pub mod endpoints;
pub mod extras;
#[cfg(feature = "http")]
pub mod httpclient;
pub mod persist;
pub mod queue;
pub mod requester;
pub mod resources;
pub mod response;
pub mod token;
pub mod util;

pub use api::{ClientError, ConnectionSettings};
pub use builder::Builder;
pub use client::Client;
pub use requester::{Requester, RequestResult};
pub use resources::{DataStore, Device, Row};
pub use response::{ApiError, ApiResponse};
pub use token::{JwtExpiry, TokenValidator};
