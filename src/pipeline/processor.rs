use crate::config::Configuration;
use crate::data::model::FieldValue;
use crate::data::params::{ArgumentSet, ParamSet};
use crate::error::Result;

/// A function that processes one sample.
///
/// Implementors declare their parameters through [`SampleProcessor::defaults`];
/// callers may only override those names.
pub trait SampleProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Declared parameters with their default values. Built fresh on each call.
    fn defaults(&self) -> ParamSet;

    /// Layout used when the caller does not pass a configuration.
    fn default_configuration(&self) -> Configuration {
        Configuration::default()
    }

    fn process(&self, args: &ArgumentSet<'_>) -> Result<FieldValue>;
}

/// Wraps a closure and its declared defaults as a [`SampleProcessor`].
pub struct FnProcessor<F> {
    name: String,
    defaults: ParamSet,
    configuration: Configuration,
    func: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&ArgumentSet<'_>) -> Result<FieldValue> + Send + Sync,
{
    pub fn new(name: &str, defaults: ParamSet, func: F) -> Self {
        Self {
            name: name.to_string(),
            defaults,
            configuration: Configuration::default(),
            func,
        }
    }

    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }
}

impl<F> SampleProcessor for FnProcessor<F>
where
    F: Fn(&ArgumentSet<'_>) -> Result<FieldValue> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn defaults(&self) -> ParamSet {
        self.defaults.clone()
    }

    fn default_configuration(&self) -> Configuration {
        self.configuration.clone()
    }

    fn process(&self, args: &ArgumentSet<'_>) -> Result<FieldValue> {
        (self.func)(args)
    }
}
