//! Build tool execution for fanout jobs.

pub mod artifacts;
pub mod build;
pub mod process;
pub mod runner;
pub mod template;

pub use artifacts::discover_artifacts;
pub use build::BuildToolRunner;
pub use process::{Invocation, ProcessOutcome};
pub use runner::{CapturedLog, OutputLine, OutputStream};
pub use template::TemplateContext;
