use burn::data::dataset::Dataset;

use crate::domain::Sample;

/// In-memory dataset of samples, handed to Burn's DataLoader.
#[derive(Debug, Clone, Default)]
pub struct SampleDataset {
    samples: Vec<Sample>,
}

impl SampleDataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Width of the feature vectors (0 for an empty dataset).
    pub fn feature_size(&self) -> usize {
        self.samples.first().map(|s| s.x.len()).unwrap_or(0)
    }

    /// Number of batches one pass over the data takes.
    pub fn batch_count(&self, batch_size: usize) -> usize {
        self.samples.len().div_ceil(batch_size.max(1))
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl Dataset<Sample> for SampleDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_count_rounds_up() {
        let ds = SampleDataset::new((0..10).map(|i| Sample::labelled(vec![i as f32], 0)).collect());
        assert_eq!(ds.batch_count(4), 3);
        assert_eq!(ds.batch_count(10), 1);
        assert_eq!(ds.feature_size(), 1);
        assert_eq!(Dataset::len(&ds), 10);
        assert!(ds.get(10).is_none());
    }
}
