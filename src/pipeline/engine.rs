use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, trace, warn};
use rayon::prelude::*;

use crate::config::Configuration;
use crate::data::model::{Dataset, FieldValue, FoldRecord};
use crate::data::params::{ArgumentSet, ParamSet};
use crate::error::{PrepError, Result};

use super::dispatch::{Decomposition, Reassembly};
use super::processor::SampleProcessor;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag checked before each fold starts. Folds already running finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// FoldEngine
// ---------------------------------------------------------------------------

/// Outcome of [`FoldEngine::run_partial`].
#[derive(Debug)]
pub struct PartialRun {
    /// Folds that processed cleanly, in input order.
    pub dataset: Dataset,
    /// One error per failed fold, in input order.
    pub failures: Vec<PrepError>,
}

/// Runs a [`SampleProcessor`] over every fold of a dataset.
///
/// Each fold goes through decomposition, one call per sample, and
/// reassembly. Folds share nothing but the configuration and the merged
/// parameters, so they may run on the rayon pool.
#[derive(Debug, Clone, Default)]
pub struct FoldEngine {
    parallel: bool,
    cancel: Option<CancelFlag>,
}

impl FoldEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process folds concurrently. Errors are still reported for the first
    /// failing fold in input order.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Process every fold, aborting on the first failure.
    ///
    /// Overrides are checked against the processor's declared parameters
    /// before any sample is processed.
    pub fn run(
        &self,
        processor: &dyn SampleProcessor,
        configuration: &Configuration,
        dataset: &Dataset,
        overrides: &ParamSet,
    ) -> Result<Dataset> {
        let params = processor.defaults().merge_overrides(overrides, processor.name())?;
        info!(
            "running '{}' over {} folds ({configuration})",
            processor.name(),
            dataset.len()
        );

        let outcomes = self.process_folds(processor, configuration, dataset, &params, true);
        let mut processed = Dataset::with_capacity(dataset.len());
        for ((name, _), outcome) in dataset.folds().iter().zip(outcomes) {
            processed.insert(name.clone(), outcome?);
        }
        Ok(processed)
    }

    /// Process every fold, skipping the ones that fail.
    ///
    /// A failed fold is left out entirely; partial folds are never emitted.
    pub fn run_partial(
        &self,
        processor: &dyn SampleProcessor,
        configuration: &Configuration,
        dataset: &Dataset,
        overrides: &ParamSet,
    ) -> Result<PartialRun> {
        let params = processor.defaults().merge_overrides(overrides, processor.name())?;
        let outcomes = self.process_folds(processor, configuration, dataset, &params, false);

        let mut partial = PartialRun {
            dataset: Dataset::new(),
            failures: Vec::new(),
        };
        for ((name, _), outcome) in dataset.folds().iter().zip(outcomes) {
            match outcome {
                Ok(record) => partial.dataset.insert(name.clone(), record),
                Err(e) => {
                    warn!("skipping fold '{name}': {e}");
                    partial.failures.push(e);
                }
            }
        }
        Ok(partial)
    }

    /// One outcome per fold in input order. Sequential runs stop after the
    /// first error when `stop_on_error` is set, so the list may be shorter.
    fn process_folds(
        &self,
        processor: &dyn SampleProcessor,
        configuration: &Configuration,
        dataset: &Dataset,
        params: &ParamSet,
        stop_on_error: bool,
    ) -> Vec<Result<FoldRecord>> {
        let folds = dataset.folds();
        if self.parallel {
            return folds
                .par_iter()
                .map(|(name, record)| {
                    self.process_fold(processor, configuration, name, record, params)
                })
                .collect();
        }

        let mut outcomes = Vec::with_capacity(folds.len());
        for (name, record) in folds {
            let outcome = self.process_fold(processor, configuration, name, record, params);
            let failed = outcome.is_err();
            outcomes.push(outcome);
            if failed && stop_on_error {
                break;
            }
        }
        outcomes
    }

    fn process_fold(
        &self,
        processor: &dyn SampleProcessor,
        configuration: &Configuration,
        name: &str,
        record: &FoldRecord,
        params: &ParamSet,
    ) -> Result<FoldRecord> {
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            warn!("cancelled before fold '{name}'");
            return Err(PrepError::Cancelled(name.to_string()));
        }

        let decomposition = Decomposition::resolve(configuration.unpack_mode());
        let samples = decomposition
            .decompose(record, configuration.unpack_keys(), params)
            .map_err(|e| e.in_fold(name))?;
        debug!("fold '{name}': {} samples ({decomposition:?})", samples.len());

        let results = process_samples(processor, name, &samples)?;

        let reassembly = Reassembly::resolve(configuration.pack_mode());
        reassembly
            .reassemble(record, configuration.pack_keys(), results)
            .map_err(|e| e.in_fold(name))
    }
}

fn process_samples(
    processor: &dyn SampleProcessor,
    fold: &str,
    samples: &[ArgumentSet<'_>],
) -> Result<Vec<FieldValue>> {
    samples
        .iter()
        .enumerate()
        .map(|(index, args)| {
            trace!("fold '{fold}': sample {index} ({} points)", args.y.len());
            processor.process(args).map_err(|source| PrepError::Sample {
                fold: fold.to_string(),
                index,
                source: Box::new(source),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Convenience entry points
// ---------------------------------------------------------------------------

/// Sequential run with an explicit configuration.
pub fn run(
    processor: &dyn SampleProcessor,
    configuration: &Configuration,
    dataset: &Dataset,
    overrides: &ParamSet,
) -> Result<Dataset> {
    FoldEngine::new().run(processor, configuration, dataset, overrides)
}

/// Sequential run using the processor's preferred layout.
pub fn run_default(
    processor: &dyn SampleProcessor,
    dataset: &Dataset,
    overrides: &ParamSet,
) -> Result<Dataset> {
    let configuration = processor.default_configuration();
    FoldEngine::new().run(processor, &configuration, dataset, overrides)
}

/// Process one sample outside of any dataset, with the same override checks
/// as a full run.
pub fn apply_to_sample(
    processor: &dyn SampleProcessor,
    y: &[f64],
    x: Option<&[f64]>,
    overrides: &ParamSet,
) -> Result<FieldValue> {
    let params = processor.defaults().merge_overrides(overrides, processor.name())?;
    let mut args = ArgumentSet::new(y, &params);
    args.x = x;
    processor.process(&args)
}
