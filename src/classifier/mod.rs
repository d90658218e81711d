pub mod api;
pub mod prompt;
pub mod vision;

pub use api::{ClassifierError, SignalClassifier};
pub use vision::{parse_analysis, VisionClassifier};
