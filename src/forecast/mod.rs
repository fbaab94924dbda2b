//! Feature engineering, feature tables and accuracy metrics

pub mod features;
pub mod metrics;
pub mod table;

pub use features::*;
pub use metrics::*;
pub use table::*;
