pub mod droid;
pub mod extractor;
pub mod navigator;
pub mod orchestrator;
pub mod paginator;

pub use droid::*;
pub use extractor::*;
pub use navigator::*;
pub use orchestrator::*;
pub use paginator::*;
