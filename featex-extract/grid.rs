use crate::error::ExtractResult;
use featex_core::{Keypoint, Region};
use featex_detect::DetectorBackend;
use rayon::prelude::*;

/// Target cell side length for the detection grid.
const CELL_TARGET: usize = 30;

/// Overlap added to each cell's far edge so neighboring cells see each
/// other's boundary points. Near-duplicates this produces are thinned by
/// the quota distributor, not here.
const CELL_OVERLAP: usize = 6;

/// Scan one pyramid level's valid region cell by cell and merge all
/// candidates into one unordered list in region-local coordinates.
///
/// Each cell is queried with `ini_threshold` first and retried once with
/// `min_threshold` when empty; only one of the two responses is kept so
/// candidates are never double-counted.
pub fn scan_level(
    backend: &dyn DetectorBackend,
    region: Region,
    ini_threshold: f32,
    min_threshold: f32,
) -> ExtractResult<Vec<Keypoint>> {
    if region.is_empty() {
        return Ok(Vec::new());
    }

    let x0 = region.x0 as usize;
    let x1 = region.x1 as usize;
    let y0 = region.y0 as usize;
    let y1 = region.y1 as usize;
    let width = x1 - x0;
    let height = y1 - y0;

    let n_cols = (width / CELL_TARGET).max(1);
    let n_rows = (height / CELL_TARGET).max(1);
    let w_cell = width.div_ceil(n_cols).max(1);
    let h_cell = height.div_ceil(n_rows).max(1);

    let rows: Vec<Vec<Keypoint>> = (0..n_rows)
        .into_par_iter()
        .map(|i| -> ExtractResult<Vec<Keypoint>> {
            let mut row_kps = Vec::new();

            let ini_y = y0 + i * h_cell;
            // Rounding can push the last row past the valid region.
            if ini_y + 3 >= y1 {
                return Ok(row_kps);
            }
            let max_y = (ini_y + h_cell + CELL_OVERLAP).min(y1);

            for j in 0..n_cols {
                let ini_x = x0 + j * w_cell;
                if ini_x + CELL_OVERLAP >= x1 {
                    continue;
                }
                let max_x = (ini_x + w_cell + CELL_OVERLAP).min(x1);

                let mut cell = backend.keypoints(ini_threshold, ini_x, max_x, ini_y, max_y, true)?;
                if cell.is_empty() {
                    cell = backend.keypoints(min_threshold, ini_x, max_x, ini_y, max_y, true)?;
                }

                for mut kp in cell {
                    kp.x += (j * w_cell) as f32;
                    kp.y += (i * h_cell) as f32;
                    row_kps.push(kp);
                }
            }

            Ok(row_kps)
        })
        .collect::<ExtractResult<Vec<_>>>()?;

    Ok(rows.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use featex_core::{Descriptor, Image};
    use featex_detect::{BackendResult, DetectorBackend};

    /// Fixed dot lattice with position-dependent scores; coordinates are
    /// returned window-local per the backend contract.
    struct LatticeBackend {
        spacing: usize,
        extent: usize,
        low_score_left_of: usize,
    }

    impl LatticeBackend {
        fn dots(&self) -> Vec<(usize, usize, f32)> {
            let mut dots = Vec::new();
            let mut y = self.spacing;
            while y < self.extent {
                let mut x = self.spacing;
                while x < self.extent {
                    let score = if x < self.low_score_left_of { 1.0 } else { 5.0 };
                    dots.push((x, y, score));
                    x += self.spacing;
                }
                y += self.spacing;
            }
            dots
        }
    }

    impl DetectorBackend for LatticeBackend {
        fn detect(&mut self, _image: &Image, _w: usize, _h: usize) -> BackendResult<()> {
            Ok(())
        }

        fn keypoints(
            &self,
            threshold: f32,
            x0: usize,
            x1: usize,
            y0: usize,
            y1: usize,
            _suppress: bool,
        ) -> BackendResult<Vec<Keypoint>> {
            Ok(self
                .dots()
                .into_iter()
                .filter(|&(x, y, s)| {
                    s >= threshold && x >= x0 && x < x1 && y >= y0 && y < y1
                })
                .map(|(x, y, s)| Keypoint::at((x - x0) as f32, (y - y0) as f32, s))
                .collect())
        }

        fn compute_descriptors(&self, keypoints: &[Keypoint]) -> BackendResult<Vec<Descriptor>> {
            Ok(vec![[0u8; 32]; keypoints.len()])
        }

        fn name(&self) -> &'static str {
            "lattice"
        }
    }

    #[test]
    fn test_empty_region_yields_no_candidates() {
        let backend = LatticeBackend { spacing: 8, extent: 200, low_score_left_of: 0 };
        let found = scan_level(&backend, Region::new(16, 16, 16, 100), 3.0, 0.5).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_all_lattice_dots_are_found() {
        let backend = LatticeBackend { spacing: 8, extent: 200, low_score_left_of: 0 };
        let region = Region::new(16, 184, 16, 184);
        let found = scan_level(&backend, region, 3.0, 0.5).unwrap();

        // Every dot inside the region must appear at its region-local
        // position at least once; overlap may duplicate boundary dots.
        for (x, y, _) in backend.dots() {
            if region.contains(x as f32, y as f32) {
                let (lx, ly) = ((x - 16) as f32, (y - 16) as f32);
                assert!(
                    found.iter().any(|kp| kp.x == lx && kp.y == ly),
                    "dot ({}, {}) missing",
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn test_fallback_threshold_rescues_weak_cells() {
        // Dots left of x=100 only pass the fallback threshold.
        let backend = LatticeBackend { spacing: 8, extent: 200, low_score_left_of: 100 };
        let region = Region::new(16, 184, 16, 184);
        let found = scan_level(&backend, region, 3.0, 0.5).unwrap();

        assert!(found.iter().any(|kp| kp.score == 1.0), "weak cells were not rescued");
        assert!(found.iter().any(|kp| kp.score == 5.0));
    }

    #[test]
    fn test_candidates_stay_inside_region() {
        let backend = LatticeBackend { spacing: 5, extent: 300, low_score_left_of: 0 };
        let region = Region::new(16, 284, 16, 184);
        let found = scan_level(&backend, region, 3.0, 0.5).unwrap();
        assert!(!found.is_empty());
        for kp in &found {
            assert!(kp.x >= 0.0 && kp.x < region.width() as f32);
            assert!(kp.y >= 0.0 && kp.y < region.height() as f32);
        }
    }

    #[test]
    fn test_region_smaller_than_one_cell() {
        let backend = LatticeBackend { spacing: 4, extent: 40, low_score_left_of: 0 };
        let region = Region::new(10, 30, 10, 30);
        let found = scan_level(&backend, region, 3.0, 0.5).unwrap();
        assert!(!found.is_empty());
    }
}
