/// Row-major 8-bit grayscale image
pub type Image = Vec<u8>;

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

/// Width of a binary descriptor in bytes
pub const DESCRIPTOR_SIZE: usize = 32;

/// Margin near image edges where detection is considered unreliable.
/// The valid region of a pyramid level excludes `EDGE_THRESHOLD - 3`
/// pixels on every side.
pub const EDGE_THRESHOLD: usize = 19;

/// Diameter of the patch used for orientation and descriptor sampling,
/// in base-image pixels at level 0.
pub const PATCH_SIZE: usize = 31;

/// Scored point of interest, positioned in the coordinate frame of the
/// pyramid level it was detected on until rescaled to the base image.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Keypoint {
    /// Subpixel x coordinate
    pub x: f32,
    /// Subpixel y coordinate
    pub y: f32,
    /// Detector confidence, higher is better
    pub score: f32,
    /// Pyramid level the point was detected on
    pub level: usize,
    /// Effective patch diameter in base-image pixels
    pub size: f32,
    /// Orientation in radians, 0.0 when unset
    pub angle: f32,
}

impl Keypoint {
    /// Level-0 keypoint with default patch size and no orientation.
    pub fn at(x: f32, y: f32, score: f32) -> Self {
        Self {
            x,
            y,
            score,
            level: 0,
            size: PATCH_SIZE as f32,
            angle: 0.0,
        }
    }
}

/// Axis-aligned integer rectangle `[x0, x1) x [y0, y1)`, the unit of
/// spatial partitioning during keypoint thinning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    pub x0: i32,
    pub x1: i32,
    pub y0: i32,
    pub y1: i32,
}

impl Region {
    pub fn new(x0: i32, x1: i32, y0: i32, y1: i32) -> Self {
        Self { x0, x1, y0, y1 }
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x0 as f32 && x < self.x1 as f32 && y >= self.y0 as f32 && y < self.y1 as f32
    }
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
