use artservice::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no artifact selected; pick one from the gallery first")]
    NoSelection,
    #[error("gallery slot {0} does not exist")]
    UnknownSlot(usize),
    #[error("gallery slot {0} is display-only and cannot be selected")]
    NotSelectable(usize),
    #[error("the preview is already running")]
    PreviewRunning,
    #[error("a video render is already in progress")]
    VideoInFlight,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl SessionError {
    /// Validation errors reject an operator action without changing any state.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Service(_))
    }
}
