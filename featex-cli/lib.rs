use featex_core::{init_thread_pool, Descriptor, Image, Keypoint};
use featex_detect::{build_backend, BackendConfig};
use featex_extract::{ExtractError, Extractor, ExtractorConfig, PerfCollector};

pub use featex_core::{self, Descriptor as FeatexDescriptor, Image as FeatexImage, Keypoint as FeatexKeypoint};
pub use featex_extract::ExtractorConfig as Config;

#[derive(Debug)]
pub enum FeatexError {
    Extract(ExtractError),
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl std::fmt::Display for FeatexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatexError::Extract(e) => write!(f, "Extraction error: {}", e),
            FeatexError::ThreadPool(e) => write!(f, "Thread pool error: {}", e),
        }
    }
}

impl std::error::Error for FeatexError {}

impl From<ExtractError> for FeatexError {
    fn from(err: ExtractError) -> Self {
        FeatexError::Extract(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for FeatexError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        FeatexError::ThreadPool(err)
    }
}

pub type FeatexResult<T> = Result<T, FeatexError>;

/// High-level pipeline that pairs a detector backend with the pyramid
/// extractor behind a single call.
pub struct FeaturePipeline {
    extractor: Extractor,
}

impl FeaturePipeline {
    /// Create a pipeline with the given configuration and backend choice
    pub fn new(cfg: ExtractorConfig, backend: BackendConfig) -> FeatexResult<Self> {
        // Initialize thread pool
        init_thread_pool(cfg.n_threads)?;

        let backend = build_backend(backend).map_err(ExtractError::from)?;
        let extractor = Extractor::new(cfg, backend)?;

        Ok(Self { extractor })
    }

    /// Pipeline with the default FAST backend
    pub fn with_fast_backend(cfg: ExtractorConfig) -> FeatexResult<Self> {
        Self::new(cfg, BackendConfig::default_fast())
    }

    /// Extract keypoints and descriptors in one step
    pub fn extract(
        &mut self,
        img: &Image,
        width: usize,
        height: usize,
    ) -> FeatexResult<(Vec<Keypoint>, Vec<Descriptor>)> {
        Ok(self.extractor.extract(img, width, height)?)
    }

    /// Extract while accumulating per-stage timings
    pub fn extract_with_perf(
        &mut self,
        img: &Image,
        width: usize,
        height: usize,
        perf: &mut PerfCollector,
    ) -> FeatexResult<(Vec<Keypoint>, Vec<Descriptor>)> {
        Ok(self.extractor.extract_with_perf(img, width, height, perf)?)
    }

    /// Get extractor configuration
    pub fn config(&self) -> &ExtractorConfig {
        self.extractor.config()
    }

    /// Per-level feature budgets
    pub fn quotas(&self) -> &[usize] {
        self.extractor.quotas()
    }
}
