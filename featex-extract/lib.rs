//! Quota-based, spatially distributed feature extraction.
//!
//! One extraction call walks a grayscale image pyramid level by level:
//! a grid scan with dual detection thresholds collects candidates, the
//! quad-tree distributor thins them to the level's feature quota, the
//! reconciler maps survivors back to base-image coordinates, and the
//! backend's descriptors are concatenated in level order.

pub mod config;
pub mod distribute;
pub mod error;
pub mod extractor;
pub mod grid;
pub mod perf;
pub mod pyramid;
pub mod rescale;

pub use config::ExtractorConfig;
pub use distribute::distribute;
pub use error::{ExtractError, ExtractResult};
pub use extractor::Extractor;
pub use grid::scan_level;
pub use perf::{PerfCollector, Stage};
pub use pyramid::{build_pyramid, feature_quotas, PyramidLevel};
