use featex_core::{Descriptor, Image, Keypoint, DESCRIPTOR_SIZE, PATCH_SIZE};
use rayon::prelude::*;

const NUM_PAIRS: usize = DESCRIPTOR_SIZE * 8;

/// Generates 256-bit rotated BRIEF descriptors.
///
/// The comparison pattern is drawn once per generator from a fixed-seed
/// generator so every instance produces identical descriptors for
/// identical inputs.
pub struct BriefGenerator {
    w: usize,
    h: usize,
    pairs: Vec<(i32, i32, i32, i32)>,
}

impl BriefGenerator {
    /// `width` and `height` describe the image later passed to
    /// [`generate_descriptors`](Self::generate_descriptors) and must be
    /// non-zero there; samples outside the image clamp to its border.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            w: width,
            h: height,
            pairs: sample_pattern(),
        }
    }

    /// One descriptor per keypoint, same order. The keypoint's `angle`
    /// rotates the comparison pattern so descriptors stay comparable
    /// under in-plane rotation.
    pub fn generate_descriptors(&self, img: &Image, kps: &[Keypoint]) -> Vec<Descriptor> {
        kps.par_iter()
            .map(|kp| {
                let (s, c) = kp.angle.sin_cos();
                let (cx, cy) = (kp.x, kp.y);
                let mut d = [0u8; DESCRIPTOR_SIZE];

                for (i, &(dx1, dy1, dx2, dy2)) in self.pairs.iter().enumerate() {
                    let (rx1, ry1) = (
                        cx + c * dx1 as f32 - s * dy1 as f32,
                        cy + s * dx1 as f32 + c * dy1 as f32,
                    );
                    let (rx2, ry2) = (
                        cx + c * dx2 as f32 - s * dy2 as f32,
                        cy + s * dx2 as f32 + c * dy2 as f32,
                    );

                    let val1 = self.bilinear_sample(img, rx1, ry1);
                    let val2 = self.bilinear_sample(img, rx2, ry2);

                    let bit = (val1 < val2) as u8;
                    d[i / 8] |= bit << (i % 8);
                }
                d
            })
            .collect()
    }

    /// Bilinear interpolation for subpixel sampling
    fn bilinear_sample(&self, img: &Image, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let x1 = x0 + 1.0;
        let y1 = y0 + 1.0;

        if x0 < 0.0 || y0 < 0.0 || x1 >= self.w as f32 || y1 >= self.h as f32 {
            // Clamp to image bounds for boundary samples
            let cx = x.round().clamp(0.0, (self.w - 1) as f32) as usize;
            let cy = y.round().clamp(0.0, (self.h - 1) as f32) as usize;
            return img[cy * self.w + cx] as f32;
        }

        let dx = x - x0;
        let dy = y - y0;

        let x0_idx = x0 as usize;
        let y0_idx = y0 as usize;
        let x1_idx = (x1 as usize).min(self.w - 1);
        let y1_idx = (y1 as usize).min(self.h - 1);

        let p00 = img[y0_idx * self.w + x0_idx] as f32;
        let p10 = img[y0_idx * self.w + x1_idx] as f32;
        let p01 = img[y1_idx * self.w + x0_idx] as f32;
        let p11 = img[y1_idx * self.w + x1_idx] as f32;

        let top = p00 * (1.0 - dx) + p10 * dx;
        let bottom = p01 * (1.0 - dx) + p11 * dx;

        top * (1.0 - dy) + bottom * dy
    }
}

/// 256 comparison pairs drawn uniformly from the descriptor patch with a
/// fixed-seed LCG, so the pattern is identical across builds and runs.
fn sample_pattern() -> Vec<(i32, i32, i32, i32)> {
    const SEED: u64 = 0x9E37_79B9_7F4A_7C15;
    let half = (PATCH_SIZE / 2) as i32;
    let span = (half * 2 + 1) as u64;

    let mut state = SEED;
    let mut next_offset = move || -> i32 {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 33) % span) as i32 - half
    };

    (0..NUM_PAIRS)
        .map(|_| {
            (
                next_offset(),
                next_offset(),
                next_offset(),
                next_offset(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: usize, height: usize) -> Image {
        let mut img = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                img[y * width + x] = ((x * 255) / width.max(1)) as u8;
            }
        }
        img
    }

    #[test]
    fn test_pattern_is_deterministic() {
        assert_eq!(sample_pattern(), sample_pattern());
        assert_eq!(sample_pattern().len(), NUM_PAIRS);
    }

    #[test]
    fn test_pattern_within_patch() {
        let half = (PATCH_SIZE / 2) as i32;
        for (dx1, dy1, dx2, dy2) in sample_pattern() {
            for v in [dx1, dy1, dx2, dy2] {
                assert!(v >= -half && v <= half, "offset {} outside patch", v);
            }
        }
    }

    #[test]
    fn test_descriptor_count_matches_keypoints() {
        let img = gradient_image(64, 64);
        let gen = BriefGenerator::new(64, 64);
        let kps: Vec<Keypoint> = (0..10)
            .map(|i| Keypoint::at(20.0 + i as f32, 30.0, 1.0))
            .collect();
        let descs = gen.generate_descriptors(&img, &kps);
        assert_eq!(descs.len(), kps.len());
    }

    #[test]
    fn test_descriptors_are_reproducible() {
        let img = gradient_image(64, 64);
        let gen = BriefGenerator::new(64, 64);
        let kps = vec![Keypoint::at(32.0, 32.0, 1.0)];
        let a = gen.generate_descriptors(&img, &kps);
        let b = gen.generate_descriptors(&img, &kps);
        assert_eq!(a, b);
    }

    #[test]
    fn test_gradient_descriptor_not_trivial() {
        // On a horizontal gradient at least some pairs must differ in
        // intensity, so the descriptor cannot be all ones or all zeros.
        let img = gradient_image(64, 64);
        let gen = BriefGenerator::new(64, 64);
        let d = gen.generate_descriptors(&img, &[Keypoint::at(32.0, 32.0, 1.0)]);
        let ones: u32 = d[0].iter().map(|b| b.count_ones()).sum();
        assert!(ones > 0 && ones < (NUM_PAIRS as u32));
    }

    #[test]
    fn test_single_pixel_image_clamps_samples() {
        let gen = BriefGenerator::new(1, 1);
        let descs = gen.generate_descriptors(&vec![200u8], &[Keypoint::at(0.0, 0.0, 1.0)]);
        assert_eq!(descs.len(), 1);
        // Every sample clamps to the one pixel, so no pair can differ.
        assert_eq!(descs[0], [0u8; DESCRIPTOR_SIZE]);
    }

    #[test]
    fn test_boundary_keypoint_does_not_panic() {
        let img = gradient_image(32, 32);
        let gen = BriefGenerator::new(32, 32);
        let kps = vec![Keypoint::at(0.0, 0.0, 1.0), Keypoint::at(31.0, 31.0, 1.0)];
        let descs = gen.generate_descriptors(&img, &kps);
        assert_eq!(descs.len(), 2);
    }
}
