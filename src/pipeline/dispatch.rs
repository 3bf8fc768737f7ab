use crate::config::FormatTag;

// ---------------------------------------------------------------------------
// Strategy resolution
// ---------------------------------------------------------------------------

/// Fixed field used by the default strategies when a configuration names no
/// layout.
pub const DEFAULT_FIELD: &str = "data";

/// How a fold is turned into per-sample argument sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decomposition {
    /// Rows of the [`DEFAULT_FIELD`] field.
    Default,
    SingleField,
    PairedField,
    MultiField,
}

impl Decomposition {
    /// Pick the strategy for an unpack tag; no tag means [`Decomposition::Default`].
    pub fn resolve(tag: Option<FormatTag>) -> Self {
        match tag {
            None => Decomposition::Default,
            Some(FormatTag::SingleField) => Decomposition::SingleField,
            Some(FormatTag::PairedField) => Decomposition::PairedField,
            Some(FormatTag::MultiField) => Decomposition::MultiField,
        }
    }
}

/// How an ordered result sequence is written back into a fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reassembly {
    /// Store all results under [`DEFAULT_FIELD`].
    Default,
    SingleField,
    MultiField,
}

impl Reassembly {
    /// Pick the strategy for a pack tag. There is no paired reassembly, so that
    /// tag falls back to the default like a missing one.
    pub fn resolve(tag: Option<FormatTag>) -> Self {
        match tag {
            Some(FormatTag::SingleField) => Reassembly::SingleField,
            Some(FormatTag::MultiField) => Reassembly::MultiField,
            Some(FormatTag::PairedField) | None => Reassembly::Default,
        }
    }
}
