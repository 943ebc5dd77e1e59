//! Shared data models for the Ooyala v2 API client.
//!
//! This crate provides:
//! - Request descriptors (method, route, query parameters, body)
//! - Asset, label and page models returned by the service
//! - Input models validated before any network call

pub mod asset;
pub mod label;
pub mod request;

// Re-export common types
pub use asset::{
    Asset, AssetPatch, AssetStatus, NewAsset, PreviewImageSelection, ReplacementRequest,
    UploadStatus,
};
pub use label::{ItemsPage, Label};
pub use request::{Method, ParamValue, QueryParams, RequestBody, RequestDescriptor};
