use featex_core::{Keypoint, Region, PATCH_SIZE};

/// Map keypoints from the border-excluded region frame back into the
/// level image frame and stamp their level metadata. Descriptors are
/// computed in this frame, so this runs before [`to_base_frame`].
pub fn restore_borders(keypoints: &mut [Keypoint], valid: Region, level: usize, scale: f32) {
    let patch = PATCH_SIZE as f32 * scale;
    for kp in keypoints.iter_mut() {
        kp.x += valid.x0 as f32;
        kp.y += valid.y0 as f32;
        kp.level = level;
        kp.size = patch;
        kp.angle = 0.0;
    }
}

/// Express level-local positions in base-image pixels. Level 0 passes
/// through unscaled.
pub fn to_base_frame(keypoints: &mut [Keypoint], scale: f32) {
    if scale == 1.0 {
        return;
    }
    for kp in keypoints.iter_mut() {
        kp.x *= scale;
        kp.y *= scale;
    }
}
