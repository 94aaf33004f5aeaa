//! ScaleFlow Core - Production QA Toolkit
//!
//! # Tools
//! 1. Credit budgets (`budget`)
//! 2. Copy length limits (`copy`)
//! 3. Asset export specs (`specs`, `validation`, `pipeline`)
//! 4. Image technical QA (`qa`)
//!
//! Every tool follows the same shape: resolve each item against a table,
//! run independent checks, report, and turn the outcome into an exit code.

pub mod budget;
pub mod copy;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod print;
pub mod probe;
pub mod qa;
pub mod report;
pub mod specs;
pub mod validation;

pub use budget::{Budget, BudgetLine, CreditTable, Deliverable};
pub use copy::{CopyItem, CopyResult, CopyStatus, LimitTable};
pub use error::ToolError;
pub use pipeline::{AssetPipeline, PipelineOptions};
pub use print::ColorSpace;
pub use probe::{ColorMode, ImageProbe, ProbeError};
pub use qa::{QaResult, QaThresholds};
pub use report::{Report, RunStatus};
pub use specs::{AssetSpec, SpecMapping, SpecTable};
pub use validation::{AssetResult, AssetStatus, CheckResult};

pub const TOOLKIT_VERSION: &str = env!("CARGO_PKG_VERSION");
