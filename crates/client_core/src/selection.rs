//! Selection controller: owns the one image chosen for analysis.

use std::sync::{Arc, Mutex};

use shared::{
    domain::{self, MAX_IMAGE_BYTES},
    error::OVERSIZE_IMAGE_MESSAGE,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::preview::{HandleId, PreviewHandle, PreviewRegistry};

/// One file as handed over by a drop or picker event.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub filename: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl CandidateFile {
    pub fn new(
        filename: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// The picker-level accept filter. The controller re-checks everything
    /// after selection; a candidate passing here can still be rejected.
    pub fn passes_accept_filter(&self) -> bool {
        domain::media_type_is_image(&self.media_type)
            && domain::extension_is_accepted(&self.filename)
            && self.bytes.len() <= MAX_IMAGE_BYTES
    }
}

/// Cloneable view of the selected image, detached from its preview handle.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub filename: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl ImagePayload {
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

/// The single live selection: payload plus its display handle.
pub struct SelectedImage {
    payload: ImagePayload,
    handle: PreviewHandle,
}

impl SelectedImage {
    pub fn payload(&self) -> &ImagePayload {
        &self.payload
    }

    pub fn preview_id(&self) -> HandleId {
        self.handle.id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionRejection {
    #[error("{OVERSIZE_IMAGE_MESSAGE}")]
    OversizeImage,
    #[error("Unsupported image type")]
    UnsupportedType,
    #[error("No file was provided")]
    EmptySelection,
}

#[derive(Default)]
struct SelectionState {
    selected: Option<SelectedImage>,
    last_rejection: Option<SelectionRejection>,
}

/// Accepts drop/picker events and maintains the one-live-selection
/// invariant. Replacing a selection releases its predecessor's display
/// handle; rejections leave the current selection untouched.
pub struct SelectionController {
    registry: PreviewRegistry,
    inner: Mutex<SelectionState>,
}

impl SelectionController {
    pub fn new(registry: PreviewRegistry) -> Self {
        Self {
            registry,
            inner: Mutex::new(SelectionState::default()),
        }
    }

    /// Considers only the first candidate; excess files are silently
    /// ignored. On acceptance the previous handle is released and any shown
    /// validation error cleared.
    pub fn select(&self, candidates: Vec<CandidateFile>) -> Result<ImagePayload, SelectionRejection> {
        let Some(candidate) = candidates.into_iter().next() else {
            return self.reject(SelectionRejection::EmptySelection);
        };

        if !domain::media_type_is_image(&candidate.media_type)
            || !domain::extension_is_accepted(&candidate.filename)
        {
            debug!(
                filename = %candidate.filename,
                media_type = %candidate.media_type,
                "selection: rejected unsupported type"
            );
            return self.reject(SelectionRejection::UnsupportedType);
        }

        // The accept filter already bounds the size; re-checked here so a
        // bypassed filter still cannot admit an oversize file.
        if candidate.bytes.len() > MAX_IMAGE_BYTES {
            debug!(
                filename = %candidate.filename,
                size = candidate.bytes.len(),
                "selection: rejected oversize image"
            );
            return self.reject(SelectionRejection::OversizeImage);
        }

        let payload = ImagePayload {
            filename: candidate.filename,
            media_type: candidate.media_type,
            bytes: candidate.bytes,
        };
        let handle = self.registry.acquire(payload.bytes.clone());

        let mut inner = self.inner.lock().unwrap();
        if let Some(mut previous) = inner.selected.take() {
            previous.handle.release();
        }
        inner.last_rejection = None;
        inner.selected = Some(SelectedImage {
            payload: payload.clone(),
            handle,
        });
        info!(
            filename = %payload.filename,
            size = payload.byte_size(),
            "selection: image accepted"
        );
        Ok(payload)
    }

    /// Detached copy of the current selection, if any.
    pub fn snapshot(&self) -> Option<ImagePayload> {
        self.inner
            .lock()
            .unwrap()
            .selected
            .as_ref()
            .map(|selected| selected.payload.clone())
    }

    pub fn preview_id(&self) -> Option<HandleId> {
        self.inner
            .lock()
            .unwrap()
            .selected
            .as_ref()
            .map(SelectedImage::preview_id)
    }

    /// Rejection from the most recent `select`, cleared by an acceptance.
    pub fn validation_error(&self) -> Option<SelectionRejection> {
        self.inner.lock().unwrap().last_rejection
    }

    /// Tears the selection down, releasing the display handle.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(mut selected) = inner.selected.take() {
            selected.handle.release();
        }
        inner.last_rejection = None;
    }

    fn reject(&self, rejection: SelectionRejection) -> Result<ImagePayload, SelectionRejection> {
        self.inner.lock().unwrap().last_rejection = Some(rejection);
        Err(rejection)
    }
}

impl Drop for SelectionController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::OVERSIZE_IMAGE_MESSAGE;

    fn png(name: &str, size: usize) -> CandidateFile {
        CandidateFile::new(name, "image/png", vec![7u8; size])
    }

    fn controller() -> (SelectionController, PreviewRegistry) {
        let registry = PreviewRegistry::new();
        (SelectionController::new(registry.clone()), registry)
    }

    #[test]
    fn accepts_first_candidate_and_ignores_the_rest() {
        let (controller, registry) = controller();
        let payload = controller
            .select(vec![png("first.png", 8), png("second.png", 16)])
            .expect("accept");
        assert_eq!(payload.filename, "first.png");
        assert_eq!(registry.live_handles(), 1);
    }

    #[test]
    fn oversize_rejection_keeps_current_selection_and_message() {
        let (controller, registry) = controller();
        controller.select(vec![png("small.png", 64)]).expect("accept");

        let rejection = controller
            .select(vec![png("huge.png", MAX_IMAGE_BYTES + 1)])
            .expect_err("reject");
        assert_eq!(rejection, SelectionRejection::OversizeImage);
        assert_eq!(rejection.to_string(), OVERSIZE_IMAGE_MESSAGE);
        assert_eq!(
            controller.snapshot().expect("still selected").filename,
            "small.png"
        );
        assert_eq!(controller.validation_error(), Some(rejection));
        assert_eq!(registry.live_handles(), 1);
    }

    #[test]
    fn oversize_check_fires_even_when_accept_filter_is_bypassed() {
        let oversized = png("huge.png", MAX_IMAGE_BYTES + 1);
        assert!(!oversized.passes_accept_filter());

        // Handed to the controller anyway, as if the filter never ran.
        let (controller, _registry) = controller();
        assert_eq!(
            controller.select(vec![oversized]),
            Err(SelectionRejection::OversizeImage)
        );
    }

    #[test]
    fn boundary_size_is_accepted() {
        let (controller, _registry) = controller();
        assert!(controller
            .select(vec![png("exact.png", MAX_IMAGE_BYTES)])
            .is_ok());
    }

    #[test]
    fn rejects_non_image_media_type_and_disallowed_extension() {
        let (controller, _registry) = controller();
        assert_eq!(
            controller.select(vec![CandidateFile::new(
                "notes.txt",
                "text/plain",
                vec![0u8; 4]
            )]),
            Err(SelectionRejection::UnsupportedType)
        );
        assert_eq!(
            controller.select(vec![CandidateFile::new(
                "scan.webp",
                "image/webp",
                vec![0u8; 4]
            )]),
            Err(SelectionRejection::UnsupportedType)
        );
    }

    #[test]
    fn empty_selection_is_rejected_without_touching_state() {
        let (controller, _registry) = controller();
        controller.select(vec![png("kept.png", 8)]).expect("accept");
        assert_eq!(
            controller.select(Vec::new()),
            Err(SelectionRejection::EmptySelection)
        );
        assert!(controller.snapshot().is_some());
    }

    #[test]
    fn acceptance_clears_previous_validation_error() {
        let (controller, _registry) = controller();
        let _ = controller.select(vec![png("huge.png", MAX_IMAGE_BYTES + 1)]);
        assert!(controller.validation_error().is_some());

        controller.select(vec![png("ok.png", 8)]).expect("accept");
        assert_eq!(controller.validation_error(), None);
    }

    #[test]
    fn reselecting_the_same_file_yields_identical_attributes_and_one_live_handle() {
        let (controller, registry) = controller();
        let first = controller.select(vec![png("cat.png", 32)]).expect("accept");
        let first_preview = controller.preview_id().expect("preview");

        let second = controller.select(vec![png("cat.png", 32)]).expect("accept");
        let second_preview = controller.preview_id().expect("preview");

        assert_eq!(first.filename, second.filename);
        assert_eq!(first.media_type, second.media_type);
        assert_eq!(first.bytes.as_ref(), second.bytes.as_ref());
        assert_eq!(registry.live_handles(), 1);
        assert_ne!(first_preview, second_preview);
        assert!(registry.resolve(first_preview).is_none());
        assert!(registry.resolve(second_preview).is_some());
    }

    #[test]
    fn dispose_releases_the_display_handle() {
        let (controller, registry) = controller();
        controller.select(vec![png("cat.png", 8)]).expect("accept");
        controller.dispose();
        assert_eq!(registry.live_handles(), 0);
        assert!(controller.snapshot().is_none());
    }

    #[test]
    fn dropping_the_controller_releases_the_display_handle() {
        let registry = PreviewRegistry::new();
        {
            let controller = SelectionController::new(registry.clone());
            controller.select(vec![png("cat.png", 8)]).expect("accept");
            assert_eq!(registry.live_handles(), 1);
        }
        assert_eq!(registry.live_handles(), 0);
    }
}
