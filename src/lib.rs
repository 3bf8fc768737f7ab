//! Fold-wise preprocessing of signal datasets.
//!
//! A [`Dataset`] is a set of named folds. A [`Configuration`] says how each
//! fold is split into samples and how results are written back; a
//! [`SampleProcessor`] does the per-sample work. [`methods`] holds the
//! built-in baseline, filter and cropping processors.

pub mod config;
pub mod data;
pub mod error;
pub mod methods;
pub mod pipeline;

pub use config::{Configuration, ConfigurationBuilder, Domain, FieldKeys, FieldWhitelist, FormatTag};
pub use data::model::{Dataset, FieldValue, FoldRecord};
pub use data::params::{ArgumentSet, ParamSet, ParamValue};
pub use error::{PrepError, Result};
pub use pipeline::{apply_to_sample, run, run_default, FoldEngine, SampleProcessor};
