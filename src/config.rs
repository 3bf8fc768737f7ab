//! Immutable pipeline configuration.
//!
//! A [`Configuration`] says how a fold is decomposed into samples and how the
//! results are written back. It is built once, validated against a field
//! whitelist, and then shared read-only by every fold of a run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

// ---------------------------------------------------------------------------
// Format tags
// ---------------------------------------------------------------------------

/// Layout of the fields a processing function reads or writes.
///
/// The discriminants follow the numbering used by existing configuration files.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FormatTag {
    /// One value field; a matrix yields one sample per row.
    SingleField = 0,
    /// Several value fields processed one after another.
    MultiField = 1,
    /// A value field paired with its axis field.
    PairedField = 2,
}

impl TryFrom<u8> for FormatTag {
    type Error = PrepError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(FormatTag::SingleField),
            1 => Ok(FormatTag::MultiField),
            2 => Ok(FormatTag::PairedField),
            other => Err(PrepError::InvalidConfiguration(format!(
                "unknown format tag {other}"
            ))),
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatTag::SingleField => "single_field",
            FormatTag::MultiField => "multi_field",
            FormatTag::PairedField => "paired_field",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Field keys
// ---------------------------------------------------------------------------

/// Field label(s) playing the `y` role.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum FieldSelector {
    One(String),
    Many(Vec<String>),
}

impl FieldSelector {
    pub fn labels(&self) -> Vec<&str> {
        match self {
            FieldSelector::One(label) => vec![label.as_str()],
            FieldSelector::Many(labels) => labels.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for FieldSelector {
    fn from(label: &str) -> Self {
        FieldSelector::One(label.to_string())
    }
}

impl From<Vec<&str>> for FieldSelector {
    fn from(labels: Vec<&str>) -> Self {
        FieldSelector::Many(labels.into_iter().map(str::to_string).collect())
    }
}

/// Which fold fields hold the dependent values (`y`) and the axis (`x`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldKeys {
    pub y: FieldSelector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
}

impl FieldKeys {
    pub fn y(label: &str) -> Self {
        Self {
            y: label.into(),
            x: None,
        }
    }

    pub fn y_of_x(y: &str, x: &str) -> Self {
        Self {
            y: y.into(),
            x: Some(x.to_string()),
        }
    }

    pub fn many(labels: Vec<&str>) -> Self {
        Self {
            y: labels.into(),
            x: None,
        }
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.y.labels().into_iter().chain(self.x.as_deref())
    }

    /// The single `y` label, or an error naming the mode that needs it.
    pub fn single_y(&self, mode: FormatTag) -> Result<&str> {
        match &self.y {
            FieldSelector::One(label) => Ok(label.as_str()),
            FieldSelector::Many(_) => Err(PrepError::InvalidConfiguration(format!(
                "{mode} expects a single y field"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Field whitelists
// ---------------------------------------------------------------------------

/// Field names a domain accepts in configurations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldWhitelist {
    pub y: Vec<String>,
    pub x: Vec<String>,
}

impl FieldWhitelist {
    pub fn new(y: &[&str], x: &[&str]) -> Self {
        Self {
            y: y.iter().map(|s| s.to_string()).collect(),
            x: x.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Fail on any name outside the union of allowed y and x fields.
    pub fn check(&self, field: &str) -> Result<()> {
        if self.y.iter().chain(&self.x).any(|allowed| allowed == field) {
            Ok(())
        } else {
            Err(PrepError::UnrecognizedField {
                field: field.to_string(),
                allowed: self.y.iter().chain(&self.x).cloned().collect(),
            })
        }
    }
}

/// Measurement domains with a known field layout.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Fourier-transform infrared spectroscopy.
    Ftir,
    /// Nuclear magnetic resonance spectroscopy.
    Nmr,
    /// Isothermal calorimetry.
    Calorimetry,
}

impl Domain {
    pub fn y_field(self) -> &'static str {
        match self {
            Domain::Ftir | Domain::Nmr => "spectra",
            Domain::Calorimetry => "heat_flow",
        }
    }

    pub fn x_field(self) -> &'static str {
        match self {
            Domain::Ftir => "axis_wavenumber",
            Domain::Nmr => "axis_chem_shift",
            Domain::Calorimetry => "axis_timestamp",
        }
    }

    pub fn whitelist(self) -> FieldWhitelist {
        FieldWhitelist::new(&[self.y_field()], &[self.x_field()])
    }

    /// Process each row of the value field on its own.
    pub fn single(self) -> Configuration {
        Configuration::preset(
            self.whitelist(),
            FormatTag::SingleField,
            FieldKeys::y(self.y_field()),
            FormatTag::SingleField,
            FieldKeys::y(self.y_field()),
        )
    }

    /// Process the value field and then the axis field.
    pub fn multi(self) -> Configuration {
        let keys = FieldKeys::many(vec![self.y_field(), self.x_field()]);
        Configuration::preset(
            self.whitelist(),
            FormatTag::MultiField,
            keys.clone(),
            FormatTag::MultiField,
            keys,
        )
    }

    /// Process each value row together with its axis; only values are rewritten.
    pub fn paired(self) -> Configuration {
        Configuration::preset(
            self.whitelist(),
            FormatTag::PairedField,
            FieldKeys::y_of_x(self.y_field(), self.x_field()),
            FormatTag::SingleField,
            FieldKeys::y(self.y_field()),
        )
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How folds are decomposed and reassembled.
///
/// A missing mode selects the default strategy, which works on the fixed
/// `data` field. Values come from [`ConfigurationBuilder`], the [`Domain`]
/// presets or validated JSON, so any configuration that names fields carries
/// the whitelist those names were checked against.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawConfiguration", into = "RawConfiguration")]
pub struct Configuration {
    unpack_mode: Option<FormatTag>,
    pack_mode: Option<FormatTag>,
    unpack_keys: Option<FieldKeys>,
    pack_keys: Option<FieldKeys>,
    whitelist: Option<FieldWhitelist>,
}

impl Configuration {
    pub fn builder(whitelist: FieldWhitelist) -> ConfigurationBuilder {
        ConfigurationBuilder {
            whitelist,
            raw: RawConfiguration::default(),
        }
    }

    fn preset(
        whitelist: FieldWhitelist,
        unpack_mode: FormatTag,
        unpack_keys: FieldKeys,
        pack_mode: FormatTag,
        pack_keys: FieldKeys,
    ) -> Configuration {
        // Presets only use the domain's own fields in valid key shapes.
        Configuration {
            unpack_mode: Some(unpack_mode),
            pack_mode: Some(pack_mode),
            unpack_keys: Some(unpack_keys),
            pack_keys: Some(pack_keys),
            whitelist: Some(whitelist),
        }
    }

    pub fn unpack_mode(&self) -> Option<FormatTag> {
        self.unpack_mode
    }

    pub fn pack_mode(&self) -> Option<FormatTag> {
        self.pack_mode
    }

    pub fn unpack_keys(&self) -> Option<&FieldKeys> {
        self.unpack_keys.as_ref()
    }

    pub fn pack_keys(&self) -> Option<&FieldKeys> {
        self.pack_keys.as_ref()
    }

    pub fn whitelist(&self) -> Option<&FieldWhitelist> {
        self.whitelist.as_ref()
    }
}

/// No layout: decomposition and reassembly both use the `data` field.
impl Default for Configuration {
    fn default() -> Self {
        Self {
            unpack_mode: None,
            pack_mode: None,
            unpack_keys: None,
            pack_keys: None,
            whitelist: None,
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = |t: Option<FormatTag>| t.map_or_else(|| "default".to_string(), |t| t.to_string());
        write!(f, "unpack={} pack={}", tag(self.unpack_mode), tag(self.pack_mode))
    }
}

/// Step-by-step construction of a validated [`Configuration`].
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    whitelist: FieldWhitelist,
    raw: RawConfiguration,
}

impl ConfigurationBuilder {
    pub fn unpack(mut self, mode: FormatTag, keys: FieldKeys) -> Self {
        self.raw.unpack_mode = Some(mode);
        self.raw.unpack_keys = Some(keys);
        self
    }

    pub fn pack(mut self, mode: FormatTag, keys: FieldKeys) -> Self {
        self.raw.pack_mode = Some(mode);
        self.raw.pack_keys = Some(keys);
        self
    }

    pub fn build(self) -> Result<Configuration> {
        self.raw.validate(Some(&self.whitelist))
    }
}

// ---------------------------------------------------------------------------
// Serialized form
// ---------------------------------------------------------------------------

/// Wire form of a [`Configuration`]. Deserialization goes through
/// [`RawConfiguration::validate`]. Field keys are checked against the embedded
/// `whitelist`, or the one of the named `domain`; naming fields without either
/// is rejected.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct RawConfiguration {
    #[serde(default)]
    unpack_mode: Option<FormatTag>,
    #[serde(default)]
    pack_mode: Option<FormatTag>,
    #[serde(default)]
    unpack_keys: Option<FieldKeys>,
    #[serde(default)]
    pack_keys: Option<FieldKeys>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    whitelist: Option<FieldWhitelist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    domain: Option<Domain>,
}

impl RawConfiguration {
    fn validate(self, whitelist: Option<&FieldWhitelist>) -> Result<Configuration> {
        let whitelist = whitelist
            .cloned()
            .or(self.whitelist)
            .or_else(|| self.domain.map(Domain::whitelist));

        check_keys("unpack", self.unpack_mode, self.unpack_keys.as_ref())?;
        check_keys("pack", self.pack_mode, self.pack_keys.as_ref())?;

        if self.pack_mode == Some(FormatTag::PairedField) {
            return Err(PrepError::InvalidConfiguration(
                "paired_field is not a pack mode; axis fields are never rewritten".into(),
            ));
        }

        let named_keys: Vec<&FieldKeys> =
            [&self.unpack_keys, &self.pack_keys].into_iter().flatten().collect();
        if !named_keys.is_empty() {
            let Some(whitelist) = &whitelist else {
                return Err(PrepError::InvalidConfiguration(
                    "field keys need a `domain` or `whitelist` to be checked against".into(),
                ));
            };
            for name in named_keys.iter().flat_map(|keys| keys.names()) {
                whitelist.check(name)?;
            }
        }

        Ok(Configuration {
            unpack_mode: self.unpack_mode,
            pack_mode: self.pack_mode,
            unpack_keys: self.unpack_keys,
            pack_keys: self.pack_keys,
            whitelist,
        })
    }
}

fn check_keys(stage: &str, mode: Option<FormatTag>, keys: Option<&FieldKeys>) -> Result<()> {
    let Some(mode) = mode else {
        return Ok(());
    };
    let keys = keys.ok_or_else(|| {
        PrepError::InvalidConfiguration(format!("{stage} mode {mode} needs {stage}_keys"))
    })?;
    match mode {
        FormatTag::SingleField => {
            keys.single_y(mode)?;
        }
        FormatTag::PairedField => {
            keys.single_y(mode)?;
            if keys.x.is_none() {
                return Err(PrepError::InvalidConfiguration(format!(
                    "{stage} mode {mode} needs an x field"
                )));
            }
        }
        FormatTag::MultiField => {
            if keys.y.labels().is_empty() {
                return Err(PrepError::InvalidConfiguration(format!(
                    "{stage} mode {mode} needs at least one y field"
                )));
            }
        }
    }
    Ok(())
}

impl TryFrom<RawConfiguration> for Configuration {
    type Error = PrepError;

    fn try_from(raw: RawConfiguration) -> Result<Self> {
        raw.validate(None)
    }
}

impl From<Configuration> for RawConfiguration {
    fn from(config: Configuration) -> Self {
        RawConfiguration {
            unpack_mode: config.unpack_mode,
            pack_mode: config.pack_mode,
            unpack_keys: config.unpack_keys,
            pack_keys: config.pack_keys,
            whitelist: config.whitelist,
            domain: None,
        }
    }
}
