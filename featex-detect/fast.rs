use crate::backend::{suppress_neighbors, BackendError, BackendResult, DetectorBackend};
use featex_brief::BriefGenerator;
use featex_core::{Descriptor, Image, Keypoint};
use rayon::prelude::*;

/// Ring offsets for the 16-pixel Bresenham circle of radius 3.
const RING: [(i32, i32); 16] = [
    (0, -3), (1, -3), (2, -2), (3, -1),
    (3, 0), (3, 1), (2, 2), (1, 3),
    (0, 3), (-1, 3), (-2, 2), (-3, 1),
    (-3, 0), (-3, -1), (-2, -2), (-1, -3),
];

/// Minimum arc length of the segment test.
const ARC_LEN: usize = 12;

/// Ring radius; detection stays this far from the image edge.
const RING_MARGIN: usize = 3;

/// Grid-local classical corner backend: FAST-12 segment test with an
/// intensity-contrast score, greedy NMS and rotated BRIEF descriptors.
pub struct FastBackend {
    patch_size: usize,
    nms_radius: f32,
    image: Option<Image>,
    w: usize,
    h: usize,
    brief: Option<BriefGenerator>,
}

impl FastBackend {
    pub fn new(patch_size: usize, nms_radius: f32) -> BackendResult<Self> {
        if patch_size % 2 == 0 || patch_size < 7 {
            return Err(BackendError::InvalidPatchSize { patch_size });
        }
        Ok(Self {
            patch_size,
            nms_radius,
            image: None,
            w: 0,
            h: 0,
            brief: None,
        })
    }

    fn loaded(&self) -> BackendResult<&Image> {
        self.image.as_ref().ok_or(BackendError::NoImageLoaded)
    }

    /// Segment test at (x, y): score > 0 when at least `ARC_LEN`
    /// consecutive ring pixels are all brighter or all darker than the
    /// center by `threshold`. The score is the mean absolute contrast of
    /// the contributing pixels.
    fn corner_score(&self, img: &Image, x: usize, y: usize, threshold: u8) -> Option<f32> {
        let p = img[y * self.w + x];

        let mut bright = [false; 16];
        let mut dark = [false; 16];
        let mut bright_sum = 0i32;
        let mut dark_sum = 0i32;
        let mut bright_n = 0i32;
        let mut dark_n = 0i32;

        for (i, &(dx, dy)) in RING.iter().enumerate() {
            let xx = (x as i32 + dx) as usize;
            let yy = (y as i32 + dy) as usize;
            let q = img[yy * self.w + xx];
            if q >= p.saturating_add(threshold) {
                bright[i] = true;
                bright_sum += q as i32 - p as i32;
                bright_n += 1;
            } else if q.saturating_add(threshold) <= p {
                dark[i] = true;
                dark_sum += p as i32 - q as i32;
                dark_n += 1;
            }
        }

        if has_consecutive(&bright, ARC_LEN) {
            Some(bright_sum as f32 / bright_n as f32)
        } else if has_consecutive(&dark, ARC_LEN) {
            Some(dark_sum as f32 / dark_n as f32)
        } else {
            None
        }
    }

    /// Intensity-centroid orientation over the configured patch. Returns
    /// 0.0 for keypoints whose patch does not fit inside the image.
    fn orientation(&self, img: &Image, x: f32, y: f32) -> f32 {
        let half = (self.patch_size / 2) as i32;
        let (cx, cy) = (x.round() as i32, y.round() as i32);

        if cx - half < 0 || cy - half < 0 || cx + half >= self.w as i32 || cy + half >= self.h as i32 {
            return 0.0;
        }

        let mut m10 = 0i64;
        let mut m01 = 0i64;
        for dy in -half..=half {
            let yy = (cy + dy) as usize;
            for dx in -half..=half {
                let xx = (cx + dx) as usize;
                let val = img[yy * self.w + xx] as i64;
                m10 += dx as i64 * val;
                m01 += dy as i64 * val;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }
}

impl DetectorBackend for FastBackend {
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
        self.w = width;
        self.h = height;
        self.image = Some(image.clone());
        self.brief = Some(BriefGenerator::new(width, height));
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
        let img = self.loaded()?;
        if !(threshold >= 1.0 && threshold <= 255.0) {
            return Err(BackendError::InvalidThreshold(threshold));
        }
        let t = threshold.round() as u8;

        let y_start = y0.max(RING_MARGIN);
        let y_end = y1.min(self.h.saturating_sub(RING_MARGIN));
        let x_start = x0.max(RING_MARGIN);
        let x_end = x1.min(self.w.saturating_sub(RING_MARGIN));

        if x_start >= x_end || y_start >= y_end {
            return Ok(Vec::new());
        }

        let found: Vec<Keypoint> = (y_start..y_end)
            .into_par_iter()
            .flat_map_iter(|y| {
                let mut v = Vec::new();
                for x in x_start..x_end {
                    if let Some(score) = self.corner_score(img, x, y, t) {
                        // Window-local coordinates per the backend contract.
                        v.push(Keypoint::at((x - x0) as f32, (y - y0) as f32, score));
                    }
                }
                v
            })
            .collect();

        if suppress {
            Ok(suppress_neighbors(found, self.nms_radius))
        } else {
            Ok(found)
        }
    }

    fn compute_descriptors(&self, keypoints: &[Keypoint]) -> BackendResult<Vec<Descriptor>> {
        let img = self.loaded()?;
        let brief = self.brief.as_ref().ok_or(BackendError::NoImageLoaded)?;

        let oriented: Vec<Keypoint> = keypoints
            .iter()
            .map(|kp| Keypoint {
                angle: self.orientation(img, kp.x, kp.y),
                ..*kp
            })
            .collect();

        Ok(brief.generate_descriptors(img, &oriented))
    }

    fn name(&self) -> &'static str {
        "fast"
    }
}

/// Check for `min_count` consecutive set entries in a circular 16-slot
/// mask using shifted-AND, with wrap-around handled by rotation.
fn has_consecutive(flags: &[bool; 16], min_count: usize) -> bool {
    let mut mask: u16 = 0;
    for (i, &f) in flags.iter().enumerate() {
        if f {
            mask |= 1 << i;
        }
    }

    let mut test = mask;
    for i in 1..min_count {
        let rotated = (mask << i) | (mask >> (16 - i));
        test &= rotated;
        if test == 0 {
            return false;
        }
    }
    test != 0
}
