//! HTTP layer for the scanner bootstrapper.
//!
//! One [`HttpClient`] is configured per bootstrap run from the resolved
//! properties (API base URL, bearer token, response timeout, proxy, TLS
//! trust material) and threaded explicitly through every call; there is no
//! process-wide client singleton.

mod client;
mod error;
pub mod proxy;
pub mod server;

pub use client::HttpClient;
pub use error::HttpError;
pub use server::{
    fetch_engine_metadata, fetch_jre_metadata, fetch_server_version, EngineMetadata, JreMetadata,
};
