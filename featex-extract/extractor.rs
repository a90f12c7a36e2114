use std::time::Instant;

use crate::config::ExtractorConfig;
use crate::distribute::distribute;
use crate::error::{ExtractError, ExtractResult};
use crate::grid::scan_level;
use crate::perf::{PerfCollector, Stage};
use crate::pyramid::{build_pyramid, feature_quotas};
use crate::rescale::{restore_borders, to_base_frame};
use featex_core::{Descriptor, Image, Keypoint, Region, EDGE_THRESHOLD};

/// Border excluded on every side of a level image; detection happens in
/// the remaining valid region.
const MIN_BORDER: usize = EDGE_THRESHOLD - 3;

/// Extraction facade: owns the per-level quota table and drives the
/// grid scan, quota distribution, scale reconciliation and descriptor
/// assembly over the pyramid in level order.
pub struct Extractor {
    config: ExtractorConfig,
    backend: Box<dyn featex_detect::DetectorBackend>,
    quotas: Vec<usize>,
}

impl Extractor {
    /// Validates the configuration and precomputes the quota table; a
    /// degenerate budget fails here, never mid-extraction.
    pub fn new(
        config: ExtractorConfig,
        backend: Box<dyn featex_detect::DetectorBackend>,
    ) -> ExtractResult<Self> {
        config.validate()?;
        let quotas = feature_quotas(config.n_features, config.n_levels, config.scale_factor)?;
        Ok(Self {
            config,
            backend,
            quotas,
        })
    }

    /// Extract keypoints and descriptors from a grayscale image. The two
    /// vectors correspond index for index; an empty image yields empty
    /// output.
    pub fn extract(
        &mut self,
        image: &Image,
        width: usize,
        height: usize,
    ) -> ExtractResult<(Vec<Keypoint>, Vec<Descriptor>)> {
        self.extract_inner(image, width, height, None)
    }

    /// Same as [`extract`](Self::extract), additionally accumulating
    /// per-stage timings into a caller-owned collector.
    pub fn extract_with_perf(
        &mut self,
        image: &Image,
        width: usize,
        height: usize,
        perf: &mut PerfCollector,
    ) -> ExtractResult<(Vec<Keypoint>, Vec<Descriptor>)> {
        self.extract_inner(image, width, height, Some(perf))
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Per-level feature budgets, summing to the configured total.
    pub fn quotas(&self) -> &[usize] {
        &self.quotas
    }

    fn extract_inner(
        &mut self,
        image: &Image,
        width: usize,
        height: usize,
        mut perf: Option<&mut PerfCollector>,
    ) -> ExtractResult<(Vec<Keypoint>, Vec<Descriptor>)> {
        if image.is_empty() || width == 0 || height == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        if image.len() != width * height {
            return Err(ExtractError::InvalidImageData {
                expected_len: width * height,
                actual_len: image.len(),
            });
        }

        let t = Instant::now();
        let pyramid = build_pyramid(
            image,
            width,
            height,
            self.config.n_levels,
            self.config.scale_factor,
        )?;
        if let Some(p) = perf.as_deref_mut() {
            p.record(Stage::Pyramid, t.elapsed());
        }

        let mut all_keypoints: Vec<Keypoint> = Vec::with_capacity(self.config.n_features);
        let mut all_descriptors: Vec<Descriptor> = Vec::with_capacity(self.config.n_features);

        for (level, entry) in pyramid.iter().enumerate() {
            let valid = valid_region(entry.width, entry.height);
            if valid.is_empty() {
                // Level too small to detect on; downstream tolerates the gap.
                continue;
            }

            let t = Instant::now();
            self.backend.detect(&entry.image, entry.width, entry.height)?;
            if let Some(p) = perf.as_deref_mut() {
                p.record(Stage::Detect, t.elapsed());
            }

            let t = Instant::now();
            let candidates = scan_level(
                self.backend.as_ref(),
                valid,
                self.config.ini_threshold,
                self.config.min_threshold,
            )?;
            if let Some(p) = perf.as_deref_mut() {
                p.record(Stage::Scan, t.elapsed());
            }

            let t = Instant::now();
            let local = Region::new(0, valid.width(), 0, valid.height());
            let mut keypoints = distribute(candidates, local, self.quotas[level])?;
            if let Some(p) = perf.as_deref_mut() {
                p.record(Stage::Distribute, t.elapsed());
            }

            restore_borders(&mut keypoints, valid, level, entry.scale);

            // Descriptors are sampled on the level image, so they are
            // requested before positions move to the base frame.
            let t = Instant::now();
            let descriptors = self.backend.compute_descriptors(&keypoints)?;
            if let Some(p) = perf.as_deref_mut() {
                p.record(Stage::Describe, t.elapsed());
            }

            if descriptors.len() != keypoints.len() {
                return Err(ExtractError::DescriptorCountMismatch {
                    level,
                    keypoints: keypoints.len(),
                    descriptors: descriptors.len(),
                });
            }

            to_base_frame(&mut keypoints, entry.scale);

            all_keypoints.extend(keypoints);
            all_descriptors.extend(descriptors);
        }

        Ok((all_keypoints, all_descriptors))
    }
}

/// Border-excluded detection region of one level image, empty when the
/// level is too small to hold any valid pixels.
fn valid_region(width: usize, height: usize) -> Region {
    Region::new(
        MIN_BORDER as i32,
        width as i32 - MIN_BORDER as i32,
        MIN_BORDER as i32,
        height as i32 - MIN_BORDER as i32,
    )
}
