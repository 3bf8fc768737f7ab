/// Built-in sample processors.
///
/// ```text
///   baseline    als-baseline · median-baseline · modpoly-baseline
///   filter      savgol · running-median · fourier
///   dimensions  cut-range
/// ```
///
/// The numeric routines are plain functions over `&[f64]`; the processor
/// types wrap them with declared defaults and a preferred layout.

pub mod baseline;
pub mod dimensions;
pub mod filter;
mod linalg;

use crate::pipeline::SampleProcessor;

pub use baseline::{AlsBaseline, BaselineOutput, MedianBaseline, ModPolyBaseline};
pub use dimensions::CutRange;
pub use filter::{FourierFilter, RunningMedian, SavitzkyGolay};

/// Every built-in processor, in listing order.
pub fn catalog() -> Vec<Box<dyn SampleProcessor>> {
    vec![
        Box::new(AlsBaseline),
        Box::new(MedianBaseline),
        Box::new(ModPolyBaseline),
        Box::new(SavitzkyGolay),
        Box::new(RunningMedian),
        Box::new(FourierFilter),
        Box::new(CutRange),
    ]
}

pub fn by_name(name: &str) -> Option<Box<dyn SampleProcessor>> {
    catalog().into_iter().find(|p| p.name() == name)
}

pub fn names() -> Vec<String> {
    catalog().iter().map(|p| p.name().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        assert_eq!(by_name("savgol").map(|p| p.name().to_string()), Some("savgol".into()));
        assert!(by_name("wavelet").is_none());
    }

    #[test]
    fn names_are_unique() {
        let mut all = names();
        let count = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), count);
    }

    #[test]
    fn declared_defaults_are_readable() {
        for processor in catalog() {
            let defaults = processor.defaults();
            assert!(!defaults.is_empty(), "{} declares nothing", processor.name());
            assert!(!defaults.contains("y") && !defaults.contains("x"));
        }
    }
}
