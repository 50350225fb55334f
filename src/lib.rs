//! Run the `churny` code-churn tool against a batch of GitHub repositories.

extern crate crossbeam_channel;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate failure_derive;
extern crate git2;
#[macro_use]
extern crate log;
extern crate num_cpus;
extern crate reqwest;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
#[cfg(test)]
extern crate tempfile;
extern crate toml;

pub mod analyzer;
pub mod churn;
pub mod config;
pub mod driver;
pub mod github;
pub mod input;
pub mod vcs;

pub use analyzer::{AnalysisError, Analyzer};
pub use config::Config;
pub use driver::Driver;
pub use input::WorkItem;
