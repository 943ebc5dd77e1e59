//! Ooyala v2 API client.
//!
//! This crate provides:
//! - Canonical SHA-256 request signing
//! - A signed request gateway over reqwest with response classification
//! - Chunked uploads with selective re-upload of missing or bad chunks
//! - Asset, label, thumbnail and closed caption routes

pub mod assets;
pub mod client;
pub mod config;
pub mod error;
pub mod labels;
pub mod media;
pub mod metrics;
pub mod signer;
pub mod upload;
pub mod uploads;


pub use assets::{FullAssetDetails, SyncError};
pub use client::{ApiResponse, OoyalaClient, PreparedRequest, RequestGateway};
pub use config::ClientConfig;
pub use error::{classify, ApiError, ApiResult, ErrorKind, ResponseError};
pub use signer::{sign, Signer};
pub use upload::{
    split_into_chunks, Chunk, ChunkTransport, ChunkUploader, RetryDecision, UploadAttempt,
};

pub use ooyala_models as models;
