// ============================================================
// Nodes — Optimizer
// ============================================================
// The optimizer node only remembers its hyperparameters until
// the model has been placed on its device; `initialize` then
// builds the Burn optimizer for that model (Adam, AdamW, SGD).
//
// The training loop talks to the result through the classic
// three calls:
//
//   zero_grad()           forget accumulated gradients
//   backward(loss, model) Burn autodiff, accumulate the gradients
//   step(model)           Burn optimizer update with the current lr
//
// Gradients live in a Burn GradientsAccumulator between
// `backward` and `step`, so calling `backward` several times
// before one `step` accumulates them.

use burn::{
    module::AutodiffModule,
    optim::{
        decay::WeightDecayConfig, momentum::MomentumConfig, AdamConfig, AdamWConfig,
        GradientsAccumulator, GradientsParams, Optimizer, SgdConfig,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::domain::{Node, NodeArgs, NodeKind};
use crate::error::{ExecError, Result};

const DEFAULT_LEARNING_RATE: f64 = 1e-3;

/// Multiply the learning rate by `gamma` every `step_size` epochs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDecay {
    pub step_size: usize,
    pub gamma: f64,
}

impl StepDecay {
    pub fn learning_rate(&self, base: f64, epochs_done: usize) -> f64 {
        if self.step_size == 0 {
            return base;
        }
        base * self.gamma.powi((epochs_done / self.step_size) as i32)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptimKind {
    Adam {
        beta_1: f64,
        beta_2: f64,
        epsilon: f64,
        weight_decay: Option<f64>,
    },
    AdamW {
        beta_1: f64,
        beta_2: f64,
        epsilon: f64,
        weight_decay: f64,
    },
    Sgd {
        momentum: Option<f64>,
        weight_decay: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimNode {
    pub name: String,
    pub kind: OptimKind,
    pub learning_rate: f64,
    pub decay: Option<StepDecay>,
}

impl OptimNode {
    pub fn from_node(node: &NodeArgs) -> Result<Self> {
        let args = &node.args;
        let kind = match node.name.as_str() {
            "Adam" => OptimKind::Adam {
                beta_1: args.get_or("beta_1", 0.9)?,
                beta_2: args.get_or("beta_2", 0.999)?,
                epsilon: args.get_or("epsilon", 1e-8)?,
                weight_decay: args.get_or("weight_decay", None)?,
            },
            "AdamW" => OptimKind::AdamW {
                beta_1: args.get_or("beta_1", 0.9)?,
                beta_2: args.get_or("beta_2", 0.999)?,
                epsilon: args.get_or("epsilon", 1e-8)?,
                weight_decay: args.get_or("weight_decay", 1e-4)?,
            },
            "Sgd" | "SGD" => OptimKind::Sgd {
                momentum: args.get_or("momentum", None)?,
                weight_decay: args.get_or("weight_decay", None)?,
            },
            other => {
                return Err(ExecError::UnknownNode {
                    kind: "optimizer",
                    name: other.to_string(),
                })
            }
        };

        let learning_rate = args.get_or("learning_rate", DEFAULT_LEARNING_RATE)?;
        if !(learning_rate > 0.0) {
            return Err(ExecError::invalid("learning_rate", "must be positive"));
        }

        let decay = match args.get_or::<Option<usize>>("step_size", None)? {
            Some(step_size) => Some(StepDecay {
                step_size,
                gamma: args.get_or("gamma", 0.1)?,
            }),
            None => None,
        };

        Ok(Self {
            name: node.name.clone(),
            kind,
            learning_rate,
            decay,
        })
    }

    /// Build the Burn optimizer for a model that is already on its device.
    pub fn initialize<M, B>(&self) -> Optim<M, B>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + 'static,
    {
        let inner: Box<dyn StepOptimizer<M, B>> = match &self.kind {
            OptimKind::Adam {
                beta_1,
                beta_2,
                epsilon,
                weight_decay,
            } => boxed(
                AdamConfig::new()
                    .with_beta_1(*beta_1 as _)
                    .with_beta_2(*beta_2 as _)
                    .with_epsilon(*epsilon as _)
                    .with_weight_decay(weight_decay.map(|p| WeightDecayConfig::new(p as _)))
                    .init(),
            ),
            OptimKind::AdamW {
                beta_1,
                beta_2,
                epsilon,
                weight_decay,
            } => boxed(
                AdamWConfig::new()
                    .with_beta_1(*beta_1 as _)
                    .with_beta_2(*beta_2 as _)
                    .with_epsilon(*epsilon as _)
                    .with_weight_decay(*weight_decay as _)
                    .init(),
            ),
            OptimKind::Sgd {
                momentum,
                weight_decay,
            } => boxed(
                SgdConfig::new()
                    .with_momentum(momentum.map(|m| MomentumConfig::new().with_momentum(m as _)))
                    .with_weight_decay(weight_decay.map(|p| WeightDecayConfig::new(p as _)))
                    .init(),
            ),
        };

        tracing::debug!(
            "Initialized optimizer {} (lr={})",
            self.name,
            self.learning_rate
        );

        Optim {
            inner,
            accumulator: GradientsAccumulator::new(),
            pending: 0,
            base_learning_rate: self.learning_rate,
            learning_rate: self.learning_rate,
            decay: self.decay,
        }
    }
}

impl Node for OptimNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Optimizer
    }
}

/// Object-safe view of a Burn optimizer: every concrete optimizer
/// type (Adam, AdamW, Sgd, ...) can sit behind the same box.
pub trait StepOptimizer<M, B>: Send
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    fn step(&mut self, learning_rate: f64, module: M, grads: GradientsParams) -> M;
}

impl<M, B, O> StepOptimizer<M, B> for O
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
    O: Optimizer<M, B>,
{
    fn step(&mut self, learning_rate: f64, module: M, grads: GradientsParams) -> M {
        Optimizer::step(self, learning_rate, module, grads)
    }
}

fn boxed<M, B, O>(optimizer: O) -> Box<dyn StepOptimizer<M, B>>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
    O: Optimizer<M, B> + 'static,
{
    Box::new(optimizer)
}

/// A live optimizer bound to one model type.
pub struct Optim<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    inner: Box<dyn StepOptimizer<M, B>>,
    accumulator: GradientsAccumulator<M>,
    pending: usize,
    base_learning_rate: f64,
    learning_rate: f64,
    decay: Option<StepDecay>,
}

impl<M, B> Optim<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    pub fn zero_grad(&mut self) {
        self.accumulator = GradientsAccumulator::new();
        self.pending = 0;
    }

    pub fn backward(&mut self, loss: Tensor<B, 1>, model: &M) {
        let grads = GradientsParams::from_grads(loss.backward(), model);
        self.accumulator.accumulate(model, grads);
        self.pending += 1;
    }

    /// Apply the accumulated gradients. Without a preceding `backward`
    /// the model is returned untouched.
    pub fn step(&mut self, model: M) -> M {
        if self.pending == 0 {
            return model;
        }
        let grads = self.accumulator.grads();
        self.pending = 0;
        self.inner.step(self.learning_rate, model, grads)
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Advance the learning-rate schedule after `epochs_done` epochs.
    pub fn end_epoch(&mut self, epochs_done: usize) {
        if let Some(decay) = self.decay {
            self.learning_rate = decay.learning_rate(self.base_learning_rate, epochs_done);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Args;
    use crate::nodes::model::{Activation, Mlp, MlpConfig, ModelNode};
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
    use serde_json::json;

    type B = Autodiff<NdArray>;

    fn node(name: &str, args: serde_json::Value) -> NodeArgs {
        NodeArgs {
            name: name.to_string(),
            args: Args::from_value(args).unwrap(),
        }
    }

    #[test]
    fn test_from_node() {
        let adam = OptimNode::from_node(&node("Adam", json!({ "learning rate": 0.01 }))).unwrap();
        assert_eq!(adam.learning_rate, 0.01);
        assert!(matches!(adam.kind, OptimKind::Adam { weight_decay: None, .. }));

        let sgd = OptimNode::from_node(&node("SGD", json!({ "momentum": 0.9, "step_size": 2 }))).unwrap();
        assert_eq!(sgd.learning_rate, DEFAULT_LEARNING_RATE);
        assert_eq!(sgd.decay, Some(StepDecay { step_size: 2, gamma: 0.1 }));

        assert!(matches!(
            OptimNode::from_node(&node("Lion", json!({}))),
            Err(ExecError::UnknownNode { kind: "optimizer", .. })
        ));
        assert!(OptimNode::from_node(&node("Adam", json!({ "learning_rate": -1.0 }))).is_err());
    }

    #[test]
    fn test_step_decay() {
        let decay = StepDecay { step_size: 2, gamma: 0.5 };
        assert_eq!(decay.learning_rate(1.0, 0), 1.0);
        assert_eq!(decay.learning_rate(1.0, 1), 1.0);
        assert_eq!(decay.learning_rate(1.0, 2), 0.5);
        assert_eq!(decay.learning_rate(1.0, 5), 0.25);
    }

    #[test]
    fn test_step_updates_weights_only_after_backward() {
        let device = NdArrayDevice::default();
        let model: Mlp<B> = MlpConfig::new(2, vec![], 1, Activation::Relu).init(&device);
        let weights = |m: &Mlp<B>| -> Vec<f32> {
            m.layers[0].weight.val().into_data().convert::<f32>().to_vec().unwrap()
        };
        let before = weights(&model);

        let node = OptimNode::from_node(&node("Sgd", json!({ "learning_rate": 0.1 }))).unwrap();
        let mut optim = node.initialize::<Mlp<B>, B>();

        optim.zero_grad();
        let model = optim.step(model);
        assert_eq!(weights(&model), before);

        let x = Tensor::<B, 2>::ones([4, 2], &device);
        let loss = model.forward(x).powf_scalar(2.0).mean();
        optim.backward(loss, &model);
        let model = optim.step(model);
        assert_ne!(weights(&model), before);
    }
}
