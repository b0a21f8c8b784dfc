// ============================================================
// Nodes — Loss
// ============================================================
// Picks which target view of the batch the model output is
// compared against, then hands the work to Burn's loss modules.
//
//   CrossEntropy : logits [batch, classes] vs labels  [batch]
//   Mse          : output [batch, n]       vs targets [batch, n]

use burn::{
    nn::loss::{CrossEntropyLossConfig, MseLoss, Reduction},
    prelude::*,
};

use crate::data::SampleBatch;
use crate::domain::{Node, NodeArgs, NodeKind};
use crate::error::{ExecError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum LossNode {
    CrossEntropy { smoothing: Option<f32> },
    Mse,
}

impl LossNode {
    pub fn from_node(node: &NodeArgs) -> Result<Self> {
        match node.name.as_str() {
            "CrossEntropy" | "CrossEntropyLoss" => Ok(Self::CrossEntropy {
                smoothing: node.args.get_or("smoothing", None)?,
            }),
            "Mse" | "MSELoss" | "MseLoss" => Ok(Self::Mse),
            other => Err(ExecError::UnknownNode {
                kind: "loss",
                name: other.to_string(),
            }),
        }
    }

    /// Whether targets are class labels (and accuracy is meaningful).
    pub fn is_classification(&self) -> bool {
        matches!(self, Self::CrossEntropy { .. })
    }

    /// Scalar loss (`[1]`) for one batch.
    pub fn forward<B: Backend>(&self, y_pred: Tensor<B, 2>, batch: &SampleBatch<B>) -> Tensor<B, 1> {
        match self {
            Self::CrossEntropy { smoothing } => {
                let mut config = CrossEntropyLossConfig::new();
                if let Some(alpha) = smoothing {
                    config = config.with_smoothing(Some(*alpha));
                }
                config
                    .init(&y_pred.device())
                    .forward(y_pred, batch.labels.clone())
            }
            Self::Mse => MseLoss::new().forward(y_pred, batch.targets.clone(), Reduction::Mean),
        }
    }
}

impl Node for LossNode {
    fn name(&self) -> &str {
        match self {
            Self::CrossEntropy { .. } => "CrossEntropy",
            Self::Mse => "Mse",
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleBatcher;
    use crate::domain::{Args, Sample};
    use burn::backend::{ndarray::NdArrayDevice, NdArray};
    use burn::data::dataloader::batcher::Batcher;

    fn node(name: &str) -> NodeArgs {
        NodeArgs {
            name: name.to_string(),
            args: Args::new(),
        }
    }

    #[test]
    fn test_from_node() {
        assert!(LossNode::from_node(&node("CrossEntropy")).unwrap().is_classification());
        assert!(!LossNode::from_node(&node("Mse")).unwrap().is_classification());
        assert!(matches!(
            LossNode::from_node(&node("Hinge")),
            Err(ExecError::UnknownNode { kind: "loss", .. })
        ));
    }

    #[test]
    fn test_mse_of_exact_prediction_is_zero() {
        let device = Default::default();
        let batch = SampleBatcher::<NdArray>::new(device).batch(vec![
            Sample::new(vec![0.0], vec![1.0, 2.0]),
            Sample::new(vec![0.0], vec![3.0, 4.0]),
        ]);
        let y_pred = batch.targets.clone();
        let loss: f64 = LossNode::Mse.forward(y_pred, &batch).into_scalar().elem();
        assert!(loss.abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_prefers_correct_logits() {
        let device = NdArrayDevice::default();
        let batch = SampleBatcher::<NdArray>::new(device.clone()).batch(vec![
            Sample::labelled(vec![0.0], 0),
            Sample::labelled(vec![0.0], 1),
        ]);
        let loss = LossNode::CrossEntropy { smoothing: None };

        let good = Tensor::<NdArray, 2>::from_floats([[5.0, -5.0], [-5.0, 5.0]], &device);
        let bad = Tensor::<NdArray, 2>::from_floats([[-5.0, 5.0], [5.0, -5.0]], &device);

        let good: f64 = loss.forward(good, &batch).into_scalar().elem();
        let bad: f64 = loss.forward(bad, &batch).into_scalar().elem();
        assert!(good < bad);
    }
}
