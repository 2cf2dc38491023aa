//! External process invocation
//!
//! The transformation itself is opaque to the broker: it is an external
//! executable that receives the uploaded file's path, writes its outputs
//! next to it and prints a `key: value` summary on standard output.
//!
//! ## Architecture
//!
//! The seam is the [`Transformer`] trait. [`CliTransformer`] is the real
//! implementation; tests plug in in-process stubs instead.
//!
//! Outcomes are classified as:
//!
//! - success, with the raw output returned for [`parse_summary`]
//! - [`ProcessError::Failed`](crate::error::ProcessError::Failed) with
//!   bounded output tails
//! - [`ProcessError::TimedOut`](crate::error::ProcessError::TimedOut), after
//!   the process was killed

mod cli;
mod parser;
mod traits;

pub use cli::CliTransformer;
pub use parser::parse_summary;
pub use traits::{InvokeRequest, ProcessOutput, Transformer};
