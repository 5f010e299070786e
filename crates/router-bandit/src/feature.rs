//! Feature vector construction.
//!
//! A [`FeatureExtractor`] turns a request [`Context`] into a fixed-length
//! numeric vector. The router accepts any extractor with the right
//! signature; [`HashBucketExtractor`] is the deterministic default used
//! when the embedding application supplies nothing domain-specific.

use router_core::{Context, ContextValue};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Converts a request context into a fixed-length feature vector.
///
/// Implementations must be total: any context yields a finite vector of
/// exactly `dimension` components.
pub trait FeatureExtractor: Send + Sync {
    /// Extract a feature vector of length `dimension` from `context`
    fn extract(&self, context: &Context, dimension: usize) -> Vec<f64>;
}

impl<F> FeatureExtractor for F
where
    F: Fn(&Context, usize) -> Vec<f64> + Send + Sync,
{
    fn extract(&self, context: &Context, dimension: usize) -> Vec<f64> {
        self(context, dimension)
    }
}

/// Default extractor: hash each key into a bucket and accumulate a
/// numeric contribution per value type.
///
/// This is a deterministic placeholder, not a learned representation.
/// Numbers contribute their magnitude, text contributes a hashed
/// fraction in [0, 1), flags contribute 1.0. The accumulated vector is
/// L2-normalized; an all-zero vector gets a bias term at index 0
/// instead. Buckets are stable for the lifetime of the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashBucketExtractor;

impl HashBucketExtractor {
    /// Create the default extractor
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl FeatureExtractor for HashBucketExtractor {
    fn extract(&self, context: &Context, dimension: usize) -> Vec<f64> {
        if dimension == 0 {
            return Vec::new();
        }

        let mut features = vec![0.0; dimension];
        for (key, value) in context {
            let bucket = (stable_hash(key) % dimension as u64) as usize;
            let contribution = match value {
                ContextValue::Number(n) if n.is_finite() => *n,
                ContextValue::Number(_) => 0.0,
                ContextValue::Text(s) => (stable_hash(s) % 100) as f64 / 100.0,
                ContextValue::Flag(_) => 1.0,
            };
            features[bucket] += contribution;
        }

        // Pre-scale by the largest magnitude so the norm below cannot
        // overflow even for extreme numeric inputs
        let max_abs = features.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        if max_abs > 0.0 && max_abs.is_finite() {
            for component in &mut features {
                *component /= max_abs;
            }
        } else if max_abs != 0.0 {
            // Accumulation overflowed; drop to the bias fallback
            features.iter_mut().for_each(|component| *component = 0.0);
        }

        let norm = features.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for component in &mut features {
                *component /= norm;
            }
        } else {
            // Empty or degenerate context: bias term only
            features[0] = 1.0;
        }

        features
    }
}

/// Fit a feature vector to the configured dimension.
///
/// Shorter vectors are right-padded with zeros and longer ones are
/// truncated; non-finite components are replaced with zero so matrix
/// state can never be poisoned through this path.
pub(crate) fn fit_dimension(features: &[f64], dimension: usize) -> Vec<f64> {
    let mut fitted = vec![0.0; dimension];
    for (slot, &value) in fitted.iter_mut().zip(features.iter()) {
        *slot = if value.is_finite() { value } else { 0.0 };
    }
    fitted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_of(pairs: &[(&str, ContextValue)]) -> Context {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_extraction_has_exact_dimension() {
        let extractor = HashBucketExtractor::new();
        let ctx = context_of(&[
            ("task", "chat".into()),
            ("tokens", 512.0.into()),
            ("streaming", true.into()),
        ]);

        for dimension in [1, 4, 10, 32] {
            assert_eq!(extractor.extract(&ctx, dimension).len(), dimension);
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = HashBucketExtractor::new();
        let ctx = context_of(&[("task", "chat".into()), ("tokens", 512.0.into())]);

        let first = extractor.extract(&ctx, 8);
        let second = extractor.extract(&ctx, 8);
        assert_eq!(first, second);
    }

    #[test]
    fn test_extraction_is_normalized() {
        let extractor = HashBucketExtractor::new();
        let ctx = context_of(&[("a", 3.0.into()), ("b", 4.0.into()), ("c", "x".into())]);

        let features = extractor.extract(&ctx, 6);
        let norm = features.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_context_yields_bias_term() {
        let extractor = HashBucketExtractor::new();
        let features = extractor.extract(&Context::new(), 5);
        assert_eq!(features, vec![1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_non_finite_inputs_are_total() {
        let extractor = HashBucketExtractor::new();
        let ctx = context_of(&[
            ("bad", f64::NAN.into()),
            ("worse", f64::INFINITY.into()),
            ("fine", 1.0.into()),
        ]);

        let features = extractor.extract(&ctx, 4);
        assert_eq!(features.len(), 4);
        assert!(features.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_extreme_magnitudes_stay_finite() {
        let extractor = HashBucketExtractor::new();
        let ctx = context_of(&[("huge", 1e308.into()), ("tiny", 1e-300.into())]);

        let features = extractor.extract(&ctx, 3);
        assert!(features.iter().all(|x| x.is_finite()));
        let norm = features.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_closure_extractor() {
        let extractor = |_: &Context, dimension: usize| vec![0.5; dimension];
        let features = extractor.extract(&Context::new(), 4);
        assert_eq!(features, vec![0.5; 4]);
    }

    #[test]
    fn test_fit_dimension_pads_and_truncates() {
        assert_eq!(fit_dimension(&[1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(fit_dimension(&[1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
        assert_eq!(fit_dimension(&[], 2), vec![0.0, 0.0]);
    }

    #[test]
    fn test_fit_dimension_sanitizes_non_finite() {
        assert_eq!(
            fit_dimension(&[f64::NAN, 1.0, f64::NEG_INFINITY], 3),
            vec![0.0, 1.0, 0.0]
        );
    }
}
