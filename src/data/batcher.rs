// ============================================================
// Data — Sample Batcher
// ============================================================
// Implements Burn's Batcher trait: a Vec<Sample> becomes one
// SampleBatch whose tensors all lead with the batch dimension.
//
//   x:        [batch, features]   (Float)
//   labels:   [batch]             (Int, y[0] as class index)
//   targets:  [batch, outputs]    (Float, the whole y vector)
//
// Both label views are built for every batch so the loss node
// can pick whichever it needs.

use burn::{data::dataloader::batcher::Batcher, prelude::*, tensor::TensorData};

use crate::domain::Sample;

#[derive(Debug, Clone)]
pub struct SampleBatch<B: Backend> {
    pub x: Tensor<B, 2>,
    pub labels: Tensor<B, 1, Int>,
    pub targets: Tensor<B, 2>,
}

impl<B: Backend> SampleBatch<B> {
    pub fn size(&self) -> usize {
        self.x.dims()[0]
    }
}

/// Holds the device so tensors land where the model lives.
#[derive(Clone, Debug)]
pub struct SampleBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SampleBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<Sample, SampleBatch<B>> for SampleBatcher<B> {
    fn batch(&self, items: Vec<Sample>) -> SampleBatch<B> {
        let batch_size = items.len();
        let features = items.first().map(|s| s.x.len()).unwrap_or(0);
        let outputs = items.first().map(|s| s.y.len()).unwrap_or(0);

        let x_flat: Vec<f32> = items.iter().flat_map(|s| s.x.iter().copied()).collect();
        let y_flat: Vec<f32> = items.iter().flat_map(|s| s.y.iter().copied()).collect();
        let labels: Vec<i32> = items.iter().map(|s| s.label() as i32).collect();

        let x = Tensor::<B, 2>::from_data(
            TensorData::new(x_flat, [batch_size, features]),
            &self.device,
        );
        let targets = Tensor::<B, 2>::from_data(
            TensorData::new(y_flat, [batch_size, outputs]),
            &self.device,
        );
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        SampleBatch { x, labels, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes() {
        let batcher = SampleBatcher::<NdArray>::new(Default::default());
        let batch = batcher.batch(vec![
            Sample::labelled(vec![1.0, 2.0, 3.0], 1),
            Sample::labelled(vec![4.0, 5.0, 6.0], 0),
        ]);

        assert_eq!(batch.x.dims(), [2, 3]);
        assert_eq!(batch.targets.dims(), [2, 1]);
        assert_eq!(batch.labels.dims(), [2]);
        assert_eq!(batch.size(), 2);

        let labels: Vec<i64> = batch
            .labels
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .unwrap();
        assert_eq!(labels, vec![1, 0]);
    }
}
