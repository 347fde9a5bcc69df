//! Pipeline entry points.
//!
//! - `detect`: fingerprint fetched content and classify it against history
//! - `run_monitor`: one pass over every target

pub mod detect;
pub mod run;

pub use detect::{classify, fingerprint};
pub use run::{RunContext, RunOptions, run_monitor};
