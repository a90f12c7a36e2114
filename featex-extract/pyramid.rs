use crate::error::{ExtractError, ExtractResult};
use featex_core::Image;

/// One entry of the multi-resolution pyramid: a resized grayscale image
/// and its cumulative scale relative to the base image.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub image: Image,
    pub width: usize,
    pub height: usize,
    /// Cumulative scale: multiplying level coordinates by this yields
    /// base-image pixels.
    pub scale: f32,
}

/// Build `n_levels` progressively downsampled copies of the base image.
pub fn build_pyramid(
    img: &Image,
    width: usize,
    height: usize,
    n_levels: usize,
    scale_factor: f32,
) -> ExtractResult<Vec<PyramidLevel>> {
    if img.len() != width * height {
        return Err(ExtractError::InvalidImageData {
            expected_len: width * height,
            actual_len: img.len(),
        });
    }

    let mut pyramid = Vec::with_capacity(n_levels);
    let mut scale = 1.0f32;

    for level in 0..n_levels {
        if level == 0 {
            pyramid.push(PyramidLevel {
                image: img.clone(),
                width,
                height,
                scale,
            });
        } else {
            let lw = ((width as f32) / scale).round().max(1.0) as usize;
            let lh = ((height as f32) / scale).round().max(1.0) as usize;
            pyramid.push(PyramidLevel {
                image: downsample(img, width, height, lw, lh),
                width: lw,
                height: lh,
                scale,
            });
        }
        scale *= scale_factor;
    }

    Ok(pyramid)
}

/// Per-level feature quotas with geometrically decreasing weight; the
/// entries sum exactly to `n_features`, with the remainder after rounding
/// assigned to the last level.
pub fn feature_quotas(
    n_features: usize,
    n_levels: usize,
    scale_factor: f32,
) -> ExtractResult<Vec<usize>> {
    if n_features == 0 {
        return Err(ExtractError::InvalidFeatureCount(n_features));
    }
    if n_levels == 0 {
        return Err(ExtractError::InvalidLevelCount(n_levels));
    }
    if !(scale_factor > 1.0) {
        return Err(ExtractError::InvalidScaleFactor(scale_factor));
    }

    let q = 1.0 / scale_factor;
    let mut per_scale = n_features as f32 * (1.0 - q) / (1.0 - q.powi(n_levels as i32));

    let mut quotas = Vec::with_capacity(n_levels);
    let mut assigned = 0usize;
    for _ in 0..n_levels.saturating_sub(1) {
        // Rounding must never hand out more than the remaining budget.
        let quota = (per_scale.round() as usize).min(n_features - assigned);
        quotas.push(quota);
        assigned += quota;
        per_scale *= q;
    }
    quotas.push(n_features - assigned);

    if quotas.iter().all(|&n| n == 0) {
        return Err(ExtractError::EmptyQuotaTable);
    }
    Ok(quotas)
}

/// Downsample image using bilinear interpolation
fn downsample(img: &Image, src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Image {
    let mut out = vec![0u8; dst_w * dst_h];

    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for y in 0..dst_h {
        for x in 0..dst_w {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;
            out[y * dst_w + x] = bilinear_sample(img, src_w, src_h, src_x, src_y) as u8;
        }
    }

    out
}

/// Sample image at fractional coordinates using bilinear interpolation
fn bilinear_sample(img: &Image, width: usize, height: usize, x: f32, y: f32) -> f32 {
    let x1 = x.floor() as usize;
    let y1 = y.floor() as usize;
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);

    let fx = x - x1 as f32;
    let fy = y - y1 as f32;

    let p11 = img[y1 * width + x1] as f32;
    let p12 = img[y1 * width + x2] as f32;
    let p21 = img[y2 * width + x1] as f32;
    let p22 = img[y2 * width + x2] as f32;

    let top = p11 * (1.0 - fx) + p12 * fx;
    let bottom = p21 * (1.0 - fx) + p22 * fx;

    top * (1.0 - fy) + bottom * fy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pyramid_level_sizes_shrink() {
        let img = vec![100u8; 240 * 180];
        let pyr = build_pyramid(&img, 240, 180, 4, 1.2).unwrap();
        assert_eq!(pyr.len(), 4);
        assert_eq!(pyr[0].width, 240);
        assert_eq!(pyr[0].scale, 1.0);
        for pair in pyr.windows(2) {
            assert!(pair[1].width < pair[0].width);
            assert!(pair[1].scale > pair[0].scale);
        }
    }

    #[test]
    fn test_pyramid_rejects_bad_buffer() {
        let img = vec![0u8; 10];
        assert!(matches!(
            build_pyramid(&img, 240, 180, 4, 1.2),
            Err(ExtractError::InvalidImageData { .. })
        ));
    }

    #[test]
    fn test_downsample_preserves_uniform_intensity() {
        let img = vec![77u8; 100 * 100];
        let pyr = build_pyramid(&img, 100, 100, 3, 1.5).unwrap();
        for level in &pyr {
            assert!(level.image.iter().all(|&p| (p as i32 - 77).abs() <= 1));
        }
    }

    #[test]
    fn test_quotas_sum_to_total() {
        let quotas = feature_quotas(1000, 8, 1.2).unwrap();
        assert_eq!(quotas.len(), 8);
        assert_eq!(quotas.iter().sum::<usize>(), 1000);
    }

    #[test]
    fn test_quotas_sum_exactly_for_small_budgets() {
        // Rounding on tight budgets must not over-allocate early levels.
        for n in 1..64 {
            for levels in 1..10 {
                for sf in [1.1, 1.2, 1.5, 2.0] {
                    let quotas = feature_quotas(n, levels, sf).unwrap();
                    assert_eq!(
                        quotas.iter().sum::<usize>(),
                        n,
                        "n={} levels={} sf={} -> {:?}",
                        n,
                        levels,
                        sf,
                        quotas
                    );
                }
            }
        }
    }

    #[test]
    fn test_quotas_decrease_geometrically() {
        let quotas = feature_quotas(1000, 8, 1.2).unwrap();
        for pair in quotas.windows(2).take(6) {
            assert!(pair[1] <= pair[0], "quotas must not grow with level: {:?}", quotas);
        }
        assert!(quotas[0] > quotas[7]);
    }

    #[test]
    fn test_quotas_single_level_gets_everything() {
        assert_eq!(feature_quotas(250, 1, 1.2).unwrap(), vec![250]);
    }

    #[test]
    fn test_quotas_reject_degenerate_config() {
        assert!(feature_quotas(0, 8, 1.2).is_err());
        assert!(feature_quotas(100, 0, 1.2).is_err());
        assert!(feature_quotas(100, 8, 1.0).is_err());
    }
}
