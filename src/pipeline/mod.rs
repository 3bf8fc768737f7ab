/// Fold pipeline: decompose, process each sample, reassemble.
///
/// ```text
///   FoldRecord ──► Decomposition ──► [ArgumentSet; n] ──► SampleProcessor
///                 (unpack_mode)                               │
///                                                              ▼
///   FoldRecord' ◄── Reassembly ◄──────────── [FieldValue; n] results
///                 (pack_mode)
/// ```
///
/// The strategy sets are closed enums resolved from the configuration's
/// format tags; a missing tag selects the default strategy on `data`.

pub mod dispatch;
pub mod engine;
pub mod pack;
pub mod processor;
pub mod unpack;

pub use dispatch::{Decomposition, Reassembly, DEFAULT_FIELD};
pub use engine::{apply_to_sample, run, run_default, CancelFlag, FoldEngine, PartialRun};
pub use processor::{FnProcessor, SampleProcessor};
