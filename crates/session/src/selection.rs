use artservice::{Artifact, ResourceRef, StateId};
use tokio::sync::watch;
use tracing::debug;

use crate::error::SessionError;

/// The artifact currently chosen for preview and video rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub slot: usize,
    pub id: StateId,
    pub image: ResourceRef,
}

/// At most one selection at a time, overwritten on every new pick.
///
/// The value is published through a watch channel so the preview loop sees a
/// new pick (or an invalidated gallery) on its next tick.
pub struct SelectionState {
    current: watch::Sender<Option<Selection>>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionState {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    /// Selects `artifact` found at gallery `slot`, returning the previous selection.
    pub fn select(
        &mut self,
        slot: usize,
        artifact: &Artifact,
    ) -> Result<Option<Selection>, SessionError> {
        let id = artifact
            .id
            .clone()
            .ok_or(SessionError::NotSelectable(slot))?;
        let next = Selection {
            slot,
            id,
            image: artifact.image.clone(),
        };
        debug!(slot, id = %next.id, "artifact selected");
        Ok(self.current.send_replace(Some(next)))
    }

    pub fn current(&self) -> Option<Selection> {
        self.current.borrow().clone()
    }

    pub fn selected_id(&self) -> Option<StateId> {
        self.current.borrow().as_ref().map(|s| s.id.clone())
    }

    pub fn require(&self) -> Result<Selection, SessionError> {
        self.current().ok_or(SessionError::NoSelection)
    }

    pub fn is_selected(&self, slot: usize) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|s| s.slot == slot)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Selection>> {
        self.current.subscribe()
    }

    /// Only a new gallery batch may drop the selection.
    pub(crate) fn invalidate(&mut self) -> Option<Selection> {
        self.current.send_replace(None)
    }
}
