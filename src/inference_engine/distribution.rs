use crate::error::PipelineError;
use crate::inference_engine::interface::{ClassificationResult, LabelProbability};
use std::time::Instant;

const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// True when `scores` already sum to one with every entry in `[0, 1]`.
pub fn is_distribution(scores: &[f32]) -> bool {
    !scores.is_empty()
        && scores.iter().all(|s| (0.0..=1.0).contains(s))
        && (scores.iter().sum::<f32>() - 1.0).abs() <= DISTRIBUTION_TOLERANCE
}

/// Models differ in whether they end with a softmax layer; normalise either way.
pub fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    if is_distribution(scores) {
        scores.to_vec()
    } else {
        softmax(scores)
    }
}

impl ClassificationResult {
    /// Rank `distribution` and promote its best entry to the top label.
    pub fn from_distribution(
        mut distribution: Vec<LabelProbability>,
        top_k: Option<usize>,
        source_timestamp: Instant,
    ) -> Result<Self, PipelineError> {
        if let Some(bad) = distribution.iter().find(|p| !p.probability.is_finite()) {
            return Err(PipelineError::InferenceFailure(format!(
                "non-finite probability for {:?}",
                bad.label
            )));
        }

        distribution.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        if let Some(k) = top_k {
            distribution.truncate(k);
        }

        let top = distribution.first().ok_or_else(|| {
            PipelineError::InferenceFailure("model produced an empty distribution".to_string())
        })?;

        Ok(Self {
            label: top.label.clone(),
            confidence: top.probability,
            source_timestamp,
            distribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, probability: f32) -> LabelProbability {
        LabelProbability {
            label: label.to_string(),
            probability,
        }
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probabilities = softmax(&[2.0, 1.0, 0.1]);
        let sum: f32 = probabilities.iter().sum();

        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probabilities[0] > probabilities[1] && probabilities[1] > probabilities[2]);
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let probabilities = softmax(&[1000.0, 1000.0]);
        assert!(probabilities.iter().all(|p| (p - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_existing_distribution_is_kept() {
        assert_eq!(to_probabilities(&[0.7, 0.2, 0.1]), vec![0.7, 0.2, 0.1]);
        assert!(!is_distribution(&[3.0, -1.0]));
        assert!(!is_distribution(&[]));
    }

    #[test]
    fn test_result_is_ranked_and_headed_by_top_entry() {
        let result = ClassificationResult::from_distribution(
            vec![entry("cat", 0.2), entry("dog", 0.7), entry("bird", 0.1)],
            None,
            Instant::now(),
        )
        .unwrap();

        assert_eq!(result.label, "dog");
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.label, result.distribution[0].label);
        for pair in result.distribution.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
    }

    #[test]
    fn test_top_k_truncates() {
        let result = ClassificationResult::from_distribution(
            vec![entry("a", 0.1), entry("b", 0.3), entry("c", 0.6)],
            Some(2),
            Instant::now(),
        )
        .unwrap();

        let labels: Vec<_> = result.distribution.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["c", "b"]);
    }

    #[test]
    fn test_empty_or_nan_distribution_fails() {
        assert!(matches!(
            ClassificationResult::from_distribution(vec![], None, Instant::now()),
            Err(PipelineError::InferenceFailure(_))
        ));
        assert!(matches!(
            ClassificationResult::from_distribution(
                vec![entry("a", f32::NAN)],
                None,
                Instant::now()
            ),
            Err(PipelineError::InferenceFailure(_))
        ));
    }
}
