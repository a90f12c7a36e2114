use featex_core::{Descriptor, Image, Keypoint};

#[derive(Debug, Clone)]
pub enum BackendError {
    NoImageLoaded,
    InvalidImageSize { width: usize, height: usize },
    InvalidImageData { expected_len: usize, actual_len: usize },
    InvalidThreshold(f32),
    InvalidPatchSize { patch_size: usize },
    ModelUnavailable(String),
    ModelOutputMismatch { points: usize, descriptors: usize },
    DescriptorLookup { x: f32, y: f32 },
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NoImageLoaded => {
                write!(f, "No image loaded: call detect() before querying keypoints")
            }
            BackendError::InvalidImageSize { width, height } => {
                write!(f, "Invalid image dimensions: {}x{} (must be > 0)", width, height)
            }
            BackendError::InvalidImageData { expected_len, actual_len } => {
                write!(f, "Image data length mismatch: expected {}, got {}", expected_len, actual_len)
            }
            BackendError::InvalidThreshold(t) => {
                write!(f, "Invalid threshold: {}", t)
            }
            BackendError::InvalidPatchSize { patch_size } => {
                write!(f, "Invalid patch size: {} (must be odd and >= 7)", patch_size)
            }
            BackendError::ModelUnavailable(reason) => {
                write!(f, "Score model unavailable: {}", reason)
            }
            BackendError::ModelOutputMismatch { points, descriptors } => {
                write!(f, "Model returned {} points but {} descriptors", points, descriptors)
            }
            BackendError::DescriptorLookup { x, y } => {
                write!(f, "No cached descriptor near keypoint ({:.1}, {:.1})", x, y)
            }
        }
    }
}

impl std::error::Error for BackendError {}

pub type BackendResult<T> = Result<T, BackendError>;

/// Capability interface every detector backend exposes to the extraction
/// pipeline. Backends differ in how they score candidates; the pipeline
/// only consumes the contract below.
pub trait DetectorBackend: Send + Sync {
    /// Load one level image and refresh any internal detection state.
    fn detect(&mut self, image: &Image, width: usize, height: usize) -> BackendResult<()>;

    /// Scored candidates inside `[x0, x1) x [y0, y1)` of the loaded image
    /// whose score reaches `threshold`. Returned coordinates are relative
    /// to the window origin `(x0, y0)`. When `suppress_neighbors` is set
    /// the backend additionally applies local non-max suppression with a
    /// backend-defined radius.
    fn keypoints(
        &self,
        threshold: f32,
        x0: usize,
        x1: usize,
        y0: usize,
        y1: usize,
        suppress_neighbors: bool,
    ) -> BackendResult<Vec<Keypoint>>;

    /// One fixed-width descriptor per keypoint, in input order. Keypoint
    /// coordinates are in the frame of the loaded level image.
    fn compute_descriptors(&self, keypoints: &[Keypoint]) -> BackendResult<Vec<Descriptor>>;

    fn name(&self) -> &'static str;
}

/// Greedy non-max suppression shared by the backends: highest score wins,
/// anything within `radius` of an accepted point is dropped.
pub(crate) fn suppress_neighbors(mut kps: Vec<Keypoint>, radius: f32) -> Vec<Keypoint> {
    if kps.is_empty() {
        return kps;
    }

    kps.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let radius_sq = radius * radius;
    let mut kept: Vec<Keypoint> = Vec::with_capacity(kps.len());

    for candidate in kps {
        let survives = kept.iter().all(|accepted| {
            let dx = candidate.x - accepted.x;
            let dy = candidate.y - accepted.y;
            dx * dx + dy * dy >= radius_sq
        });
        if survives {
            kept.push(candidate);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppression_keeps_strongest() {
        let kps = vec![
            Keypoint::at(10.0, 10.0, 1.0),
            Keypoint::at(11.0, 10.0, 5.0),
            Keypoint::at(30.0, 30.0, 2.0),
        ];
        let kept = suppress_neighbors(kps, 3.0);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 5.0);
        assert!(kept.iter().any(|k| k.score == 2.0));
    }

    #[test]
    fn test_suppression_empty_input() {
        assert!(suppress_neighbors(Vec::new(), 3.0).is_empty());
    }

    #[test]
    fn test_suppression_enforces_radius() {
        let kps: Vec<Keypoint> = (0..20)
            .map(|i| Keypoint::at(i as f32, 0.0, i as f32))
            .collect();
        let kept = suppress_neighbors(kps, 4.0);
        for i in 0..kept.len() {
            for j in (i + 1)..kept.len() {
                let dx = kept[i].x - kept[j].x;
                let dy = kept[i].y - kept[j].y;
                assert!(dx * dx + dy * dy >= 16.0);
            }
        }
    }
}
