use std::sync::Arc;

use artservice::{Artifact, ArtifactRequest, RenderService, ServiceError, StillParameters};
use rand::prelude::*;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::selection::SelectionState;

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryItem {
    /// Position in the gallery, i.e. arrival order.
    pub slot: usize,
    /// Position in the batch the request was issued at.
    pub request_index: usize,
    pub artifact: Artifact,
}

impl GalleryItem {
    pub fn is_selectable(&self) -> bool {
        self.artifact.is_selectable()
    }
}

#[derive(Debug, Default)]
pub struct Gallery {
    items: Vec<GalleryItem>,
    batch: u64,
}

impl Gallery {
    pub fn items(&self) -> &[GalleryItem] {
        &self.items
    }

    pub fn get(&self, slot: usize) -> Option<&GalleryItem> {
        self.items.get(slot)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of batches started so far.
    pub fn batch(&self) -> u64 {
        self.batch
    }

    fn clear(&mut self) -> u64 {
        self.items.clear();
        self.batch += 1;
        self.batch
    }

    fn append(&mut self, request_index: usize, artifact: Artifact) -> usize {
        let slot = self.items.len();
        self.items.push(GalleryItem {
            slot,
            request_index,
            artifact,
        });
        slot
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryReport {
    pub batch: u64,
    pub requested: usize,
    pub received: usize,
    pub failures: Vec<(usize, ServiceError)>,
    /// Requests whose task ended without an answer, e.g. by panicking.
    pub lost: usize,
}

impl GalleryReport {
    pub fn is_complete(&self) -> bool {
        self.received == self.requested
    }
}

/// Fires a batch of independent artifact requests and fills a gallery in
/// arrival order.
pub struct GalleryGenerator<S> {
    service: Arc<S>,
    batch_size: usize,
    seed: Option<u64>,
}

impl<S: RenderService> GalleryGenerator<S> {
    pub fn new(service: Arc<S>, batch_size: usize) -> Self {
        Self {
            service,
            batch_size,
            seed: None,
        }
    }

    /// Derives a reproducible per-request seed sequence from `seed`.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn requests(&self, params: &StillParameters) -> Vec<ArtifactRequest> {
        let mut rng = self.seed.map(StdRng::seed_from_u64);
        (0..self.batch_size)
            .map(|_| ArtifactRequest {
                params: *params,
                seed: rng.as_mut().map(|rng| rng.gen()),
            })
            .collect()
    }

    /// Clears `gallery` (dropping any selection) and runs one batch to completion.
    /// Individual failures are logged and reported; they never stop siblings.
    pub async fn generate(
        &self,
        params: &StillParameters,
        gallery: &mut Gallery,
        selection: &mut SelectionState,
    ) -> GalleryReport {
        let batch = gallery.clear();
        if let Some(previous) = selection.invalidate() {
            debug!(slot = previous.slot, id = %previous.id, "selection cleared by new gallery batch");
        }

        let requests = self.requests(params);
        let requested = requests.len();
        info!(batch, requested, "generating gallery");

        let mut tasks = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let service = Arc::clone(&self.service);
            tasks.spawn(async move { (index, service.generate_artifact(&request).await) });
        }

        let mut failures = Vec::new();
        let mut lost = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(artifact))) => {
                    let selectable = artifact.is_selectable();
                    let slot = gallery.append(index, artifact);
                    debug!(batch, slot, request = index, selectable, "gallery item arrived");
                }
                Ok((index, Err(err))) => {
                    warn!(batch, request = index, error = %err, "gallery request failed");
                    failures.push((index, err));
                }
                Err(err) => {
                    warn!(batch, error = %err, "gallery request task failed");
                    lost += 1;
                }
            }
        }

        let report = GalleryReport {
            batch,
            requested,
            received: gallery.len(),
            failures,
            lost,
        };
        if report.is_complete() {
            info!(batch, received = report.received, "gallery ready");
        } else {
            warn!(
                batch,
                received = report.received,
                requested,
                "gallery is partial"
            );
        }
        report
    }
}
