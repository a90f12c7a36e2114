use featex_detect::BackendError;

#[derive(Debug)]
pub enum ExtractError {
    InvalidFeatureCount(usize),
    InvalidLevelCount(usize),
    InvalidScaleFactor(f32),
    InvalidThresholds { initial: f32, fallback: f32 },
    InvalidImageData { expected_len: usize, actual_len: usize },
    ZeroAreaRegion { width: i32, height: i32 },
    EmptyQuotaTable,
    Backend(BackendError),
    DescriptorCountMismatch { level: usize, keypoints: usize, descriptors: usize },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::InvalidFeatureCount(n) => {
                write!(f, "Invalid feature count: {} (must be > 0)", n)
            }
            ExtractError::InvalidLevelCount(n) => {
                write!(f, "Invalid pyramid level count: {} (must be > 0)", n)
            }
            ExtractError::InvalidScaleFactor(s) => {
                write!(f, "Invalid scale factor: {} (must be > 1.0)", s)
            }
            ExtractError::InvalidThresholds { initial, fallback } => {
                write!(f, "Invalid thresholds: initial {} fallback {}", initial, fallback)
            }
            ExtractError::InvalidImageData { expected_len, actual_len } => {
                write!(f, "Image data length mismatch: expected {}, got {}", expected_len, actual_len)
            }
            ExtractError::ZeroAreaRegion { width, height } => {
                write!(f, "Zero-area distribution region: {}x{}", width, height)
            }
            ExtractError::EmptyQuotaTable => {
                write!(f, "Per-level quota table is empty or all-zero")
            }
            ExtractError::Backend(e) => write!(f, "Backend error: {}", e),
            ExtractError::DescriptorCountMismatch { level, keypoints, descriptors } => {
                write!(
                    f,
                    "Level {}: backend returned {} descriptors for {} keypoints",
                    level, descriptors, keypoints
                )
            }
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for ExtractError {
    fn from(err: BackendError) -> Self {
        ExtractError::Backend(err)
    }
}

pub type ExtractResult<T> = Result<T, ExtractError>;
