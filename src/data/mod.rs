/// Data layer: dataset types and per-sample arguments.
///
/// Architecture:
/// ```text
///   loader (external)
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset   │  fold name → FoldRecord (field name → FieldValue)
///   └──────────┘
///        │  decomposition
///        ▼
///   ┌─────────────┐
///   │ ArgumentSet │  y (+ x) borrowed from the fold, merged ParamSet
///   └─────────────┘
/// ```

pub mod model;
pub mod params;
