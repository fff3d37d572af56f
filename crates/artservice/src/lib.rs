//! Client side of the external line-art rendering service.
//!
//! The service does all synthesis and encoding; this crate only describes the
//! four operations it exposes, their wire shapes, and an HTTP/JSON binding.
//! Locators handed back by the service stay opaque except for
//! [`ResourceRef::decode_data_url`], which display code uses to save or decode
//! them.

mod remote;
mod resource;
mod types;

use std::future::Future;

pub use remote::{HttpRenderService, ServiceConfig};
pub use resource::{DataResource, ResourceError};
pub use types::{
    AnimationParameters, Artifact, ArtifactRequest, FrameRequest, ResourceRef, StateId,
    StillParameters, StillRequest, TargetShape, VideoRequest,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The service answered with an explicit error field.
    #[error("{0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected response from rendering service: {0}")]
    Protocol(String),
}

impl ServiceError {
    /// Text surfaced to the operator; service-provided messages pass through untouched.
    pub fn message(&self) -> String {
        match self {
            Self::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// The rendering service's RPC surface.
///
/// Futures are `Send` so callers can drive requests from spawned tasks.
pub trait RenderService: Send + Sync + 'static {
    fn generate_still(
        &self,
        request: &StillRequest,
    ) -> impl Future<Output = Result<ResourceRef, ServiceError>> + Send;

    fn generate_artifact(
        &self,
        request: &ArtifactRequest,
    ) -> impl Future<Output = Result<Artifact, ServiceError>> + Send;

    fn generate_video(
        &self,
        request: &VideoRequest,
    ) -> impl Future<Output = Result<ResourceRef, ServiceError>> + Send;

    fn generate_frame(
        &self,
        request: &FrameRequest,
    ) -> impl Future<Output = Result<ResourceRef, ServiceError>> + Send;
}
