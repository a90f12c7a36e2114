use crate::backend::{suppress_neighbors, BackendError, BackendResult, DetectorBackend};
use featex_core::{Descriptor, Image, Keypoint};

/// Raw per-image output of a learned scoring capability: one `[x, y, score]`
/// row per point and one descriptor per row, in matching order.
#[derive(Debug, Clone, Default)]
pub struct ModelOutput {
    pub points: Vec<[f32; 3]>,
    pub descriptors: Vec<Descriptor>,
}

/// External model capability consumed by [`LearnedBackend`]. Model loading
/// and forward evaluation live behind this trait and are not part of the
/// extraction core.
pub trait ScoreModel: Send + Sync {
    fn evaluate(&self, image: &Image, width: usize, height: usize) -> BackendResult<ModelOutput>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
struct CachedPoint {
    x: f32,
    y: f32,
    score: f32,
    descriptor: Descriptor,
}

/// Whole-image learned backend: `detect` runs the model once per level and
/// caches its output; window queries and descriptor requests are served
/// from the cache.
pub struct LearnedBackend {
    model: Box<dyn ScoreModel>,
    nms_radius: f32,
    cache: Vec<CachedPoint>,
    loaded: bool,
}

impl LearnedBackend {
    pub fn new(model: Box<dyn ScoreModel>, nms_radius: f32) -> Self {
        Self {
            model,
            nms_radius,
            cache: Vec::new(),
            loaded: false,
        }
    }
}

impl DetectorBackend for LearnedBackend {
    fn detect(&mut self, image: &Image, width: usize, height: usize) -> BackendResult<()> {
        if width == 0 || height == 0 {
            return Err(BackendError::InvalidImageSize { width, height });
        }
        if image.len() != width * height {
            return Err(BackendError::InvalidImageData {
                expected_len: width * height,
                actual_len: image.len(),
            });
        }

        let output = self.model.evaluate(image, width, height)?;
        if output.points.len() != output.descriptors.len() {
            return Err(BackendError::ModelOutputMismatch {
                points: output.points.len(),
                descriptors: output.descriptors.len(),
            });
        }

        let points = normalize_coordinates(output.points, width, height);

        self.cache = points
            .into_iter()
            .zip(output.descriptors)
            .map(|(p, descriptor)| CachedPoint {
                x: p[0],
                y: p[1],
                score: p[2],
                descriptor,
            })
            .collect();
        self.loaded = true;
        Ok(())
    }

    fn keypoints(
        &self,
        threshold: f32,
        x0: usize,
        x1: usize,
        y0: usize,
        y1: usize,
        suppress: bool,
    ) -> BackendResult<Vec<Keypoint>> {
        if !self.loaded {
            return Err(BackendError::NoImageLoaded);
        }

        let (fx0, fx1) = (x0 as f32, x1 as f32);
        let (fy0, fy1) = (y0 as f32, y1 as f32);

        let hits: Vec<Keypoint> = self
            .cache
            .iter()
            .filter(|p| {
                p.score >= threshold && p.x >= fx0 && p.x < fx1 && p.y >= fy0 && p.y < fy1
            })
            .map(|p| Keypoint::at(p.x - fx0, p.y - fy0, p.score))
            .collect();

        if suppress {
            Ok(suppress_neighbors(hits, self.nms_radius))
        } else {
            Ok(hits)
        }
    }

    fn compute_descriptors(&self, keypoints: &[Keypoint]) -> BackendResult<Vec<Descriptor>> {
        if !self.loaded {
            return Err(BackendError::NoImageLoaded);
        }

        // Keypoints come back from the pipeline in level-image coordinates,
        // which match the cached frame. Descriptors are looked up by the
        // nearest cached point; anything beyond one pixel means the point
        // never came from this cache and breaks the pairing invariant.
        keypoints
            .iter()
            .map(|kp| {
                self.cache
                    .iter()
                    .map(|p| {
                        let dx = p.x - kp.x;
                        let dy = p.y - kp.y;
                        (dx * dx + dy * dy, p)
                    })
                    .filter(|(d2, _)| *d2 <= 1.0)
                    .min_by(|(a, _), (b, _)| a.total_cmp(b))
                    .map(|(_, p)| p.descriptor)
                    .ok_or(BackendError::DescriptorLookup { x: kp.x, y: kp.y })
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        self.model.name()
    }
}

/// Best-effort guess of whether model coordinates are already pixel-scaled.
///
/// Outputs whose observed range fits [-1, 1] are treated as normalized:
/// when negatives are present the range is mapped affinely from [-1, 1],
/// otherwise scaled from [0, 1]. Anything wider is assumed to already be
/// in pixels. Degenerate score distributions can fool this; the original
/// system made the same guess.
fn normalize_coordinates(mut points: Vec<[f32; 3]>, width: usize, height: usize) -> Vec<[f32; 3]> {
    if points.is_empty() {
        return points;
    }

    let mut u_min = f32::INFINITY;
    let mut u_max = f32::NEG_INFINITY;
    let mut v_min = f32::INFINITY;
    let mut v_max = f32::NEG_INFINITY;
    for p in &points {
        u_min = u_min.min(p[0]);
        u_max = u_max.max(p[0]);
        v_min = v_min.min(p[1]);
        v_max = v_max.max(p[1]);
    }

    let looks_unit = u_min >= -1.01 && u_max <= 1.01 && v_min >= -1.01 && v_max <= 1.01;
    if !looks_unit {
        return points;
    }

    let signed = u_min < 0.0 || v_min < 0.0;
    let (w, h) = (width as f32, height as f32);
    for p in &mut points {
        if signed {
            p[0] = (p[0] * 0.5 + 0.5) * w;
            p[1] = (p[1] * 0.5 + 0.5) * h;
        } else {
            p[0] *= w;
            p[1] *= h;
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    struct GridModel {
        spacing: usize,
    }

    impl ScoreModel for GridModel {
        fn evaluate(&self, _image: &Image, width: usize, height: usize) -> BackendResult<ModelOutput> {
            let mut out = ModelOutput::default();
            let mut y = self.spacing;
            while y < height {
                let mut x = self.spacing;
                while x < width {
                    let score = ((x * 31 + y * 17) % 100) as f32 / 100.0 + 0.1;
                    out.points.push([x as f32, y as f32, score]);
                    out.descriptors.push([(x % 251) as u8; 32]);
                    x += self.spacing;
                }
                y += self.spacing;
            }
            Ok(out)
        }

        fn name(&self) -> &'static str {
            "grid-model"
        }
    }

    struct MismatchModel;

    impl ScoreModel for MismatchModel {
        fn evaluate(&self, _image: &Image, _w: usize, _h: usize) -> BackendResult<ModelOutput> {
            Ok(ModelOutput {
                points: vec![[1.0, 1.0, 1.0], [2.0, 2.0, 1.0]],
                descriptors: vec![[0u8; 32]],
            })
        }

        fn name(&self) -> &'static str {
            "mismatch-model"
        }
    }

    fn backend_with_grid(spacing: usize, w: usize, h: usize) -> LearnedBackend {
        let mut b = LearnedBackend::new(Box::new(GridModel { spacing }), 4.0);
        b.detect(&vec![0u8; w * h], w, h).unwrap();
        b
    }

    #[test]
    fn test_query_before_detect_fails() {
        let b = LearnedBackend::new(Box::new(GridModel { spacing: 8 }), 4.0);
        assert!(matches!(
            b.keypoints(0.1, 0, 10, 0, 10, false),
            Err(BackendError::NoImageLoaded)
        ));
    }

    #[test]
    fn test_model_output_mismatch_is_fatal() {
        let mut b = LearnedBackend::new(Box::new(MismatchModel), 4.0);
        let result = b.detect(&vec![0u8; 100], 10, 10);
        assert!(matches!(result, Err(BackendError::ModelOutputMismatch { .. })));
    }

    #[test]
    fn test_window_filter_and_local_coords() {
        let b = backend_with_grid(8, 64, 64);
        let kps = b.keypoints(0.0, 16, 32, 16, 32, false).unwrap();
        assert!(!kps.is_empty());
        for kp in &kps {
            assert!(kp.x >= 0.0 && kp.x < 16.0);
            assert!(kp.y >= 0.0 && kp.y < 16.0);
        }
    }

    #[test]
    fn test_threshold_filters_scores() {
        let b = backend_with_grid(8, 64, 64);
        let all = b.keypoints(0.0, 0, 64, 0, 64, false).unwrap();
        let strict = b.keypoints(0.9, 0, 64, 0, 64, false).unwrap();
        assert!(strict.len() < all.len());
        assert!(strict.iter().all(|kp| kp.score >= 0.9));
    }

    #[test]
    fn test_descriptor_lookup_round_trip() {
        let b = backend_with_grid(8, 64, 64);
        let kps = b.keypoints(0.0, 0, 64, 0, 64, false).unwrap();
        let descs = b.compute_descriptors(&kps).unwrap();
        assert_eq!(descs.len(), kps.len());
        for (kp, desc) in kps.iter().zip(&descs) {
            assert_eq!(desc[0], (kp.x as usize % 251) as u8);
        }
    }

    #[test]
    fn test_descriptor_lookup_miss_is_error() {
        let b = backend_with_grid(8, 64, 64);
        let stray = vec![Keypoint::at(3.0, 3.0, 1.0)];
        assert!(matches!(
            b.compute_descriptors(&stray),
            Err(BackendError::DescriptorLookup { .. })
        ));
    }

    #[test]
    fn test_unit_range_coordinates_are_rescaled() {
        let pts = vec![[0.25, 0.5, 1.0], [0.75, 0.25, 1.0]];
        let scaled = normalize_coordinates(pts, 100, 200);
        assert_eq!(scaled[0][0], 25.0);
        assert_eq!(scaled[0][1], 100.0);
        assert_eq!(scaled[1][0], 75.0);
    }

    #[test]
    fn test_signed_unit_range_is_mapped_affinely() {
        let pts = vec![[-1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [0.0, 0.0, 1.0]];
        let scaled = normalize_coordinates(pts, 100, 100);
        assert_eq!(scaled[0][0], 0.0);
        assert_eq!(scaled[1][0], 100.0);
        assert_eq!(scaled[2][0], 50.0);
    }

    #[test]
    fn test_pixel_coordinates_pass_through() {
        let pts = vec![[12.0, 40.0, 1.0], [90.0, 5.0, 1.0]];
        let scaled = normalize_coordinates(pts.clone(), 100, 100);
        assert_eq!(scaled, pts);
    }
}
