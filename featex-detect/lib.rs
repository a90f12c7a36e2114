mod backend;
mod factory;
pub mod fast;
pub mod learned;

pub use backend::{BackendError, BackendResult, DetectorBackend};
pub use factory::{build_backend, BackendConfig};
pub use fast::FastBackend;
pub use learned::{LearnedBackend, ModelOutput, ScoreModel};
