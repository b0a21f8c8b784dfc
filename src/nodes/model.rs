// ============================================================
// Nodes — Model
// ============================================================
// The model node: a named feed-forward network built from the
// `model` section of the config.
//
//   "model": { "name": "IrisNet",
//              "args": { "input": 4, "hidden": [16, 16], "output": 3,
//                        "activation": "relu" } }
//
// `input` and `output` may be left out; the exec fills them in
// from the data node (feature width, number of classes).
//
// The network itself is a Burn module; forward/backward, device
// placement and records are Burn's business. What this module
// adds is the ModelNode trait the trainer drives, and the
// mapping from layers to an ONNX graph for publishing.

use burn::{
    module::Ignored,
    nn::{Linear, LinearConfig},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::domain::{Node, NodeArgs, NodeKind};
use crate::error::{ExecError, Result};
use crate::infra::onnx::{OnnxAttribute, OnnxModel, OnnxNode, OnnxTensor, INPUT_NAME, OUTPUT_NAME};

/// A Burn module the trainer can drive and publish.
pub trait ModelNode<B: Backend>: Module<B> {
    /// `[batch, input_size]` → `[batch, output_size]`
    fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2>;

    fn input_size(&self) -> usize;

    fn output_size(&self) -> usize;

    /// The ONNX graph of this model with its current weights.
    fn to_onnx(&self, graph_name: &str) -> Result<OnnxModel>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    pub fn apply<B: Backend>(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Self::Relu => burn::tensor::activation::relu(x),
            Self::Tanh => x.tanh(),
            Self::Sigmoid => burn::tensor::activation::sigmoid(x),
        }
    }

    fn onnx_op(&self) -> &'static str {
        match self {
            Self::Relu => "Relu",
            Self::Tanh => "Tanh",
            Self::Sigmoid => "Sigmoid",
        }
    }
}

#[derive(Config, Debug)]
pub struct MlpConfig {
    pub input: usize,
    pub hidden: Vec<usize>,
    pub output: usize,
    pub activation: Activation,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        let widths: Vec<usize> = std::iter::once(self.input)
            .chain(self.hidden.iter().copied())
            .chain(std::iter::once(self.output))
            .collect();

        let layers = widths
            .windows(2)
            .map(|w| LinearConfig::new(w[0], w[1]).init(device))
            .collect();

        Mlp {
            layers,
            activation: Ignored(self.activation),
        }
    }
}

/// Linear layers with an activation between each pair.
/// The last layer is left linear (logits / raw regression output).
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    pub layers: Vec<Linear<B>>,
    pub activation: Ignored<Activation>,
}

impl<B: Backend> ModelNode<B> for Mlp<B> {
    fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.layers.len().saturating_sub(1);
        let mut x = x;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            if i < last {
                x = self.activation.0.apply(x);
            }
        }
        x
    }

    fn input_size(&self) -> usize {
        self.layers.first().map(|l| l.weight.val().dims()[0]).unwrap_or(0)
    }

    fn output_size(&self) -> usize {
        self.layers.last().map(|l| l.weight.val().dims()[1]).unwrap_or(0)
    }

    // Burn stores Linear weights as [in, out], so each layer is
    // Gemm(h, W, b) with no transpose.
    fn to_onnx(&self, graph_name: &str) -> Result<OnnxModel> {
        let mut graph = OnnxModel::new(graph_name, self.input_size(), self.output_size());
        let last = self.layers.len().saturating_sub(1);
        let mut current = INPUT_NAME.to_string();

        for (i, layer) in self.layers.iter().enumerate() {
            let weight = layer.weight.val();
            let [d_in, d_out] = weight.dims();
            let weight_name = format!("layers.{i}.weight");
            graph.initializers.push(OnnxTensor::new(
                weight_name.clone(),
                vec![d_in as i64, d_out as i64],
                tensor_values(weight)?,
            ));

            let gemm_out = if i == last {
                OUTPUT_NAME.to_string()
            } else {
                format!("gemm_{i}")
            };
            let mut gemm = OnnxNode::new("Gemm", format!("gemm_{i}"))
                .input(current.clone())
                .input(weight_name)
                .output(gemm_out.clone())
                .attr("alpha", OnnxAttribute::Float(1.0))
                .attr("beta", OnnxAttribute::Float(1.0));

            if let Some(bias) = &layer.bias {
                let bias_name = format!("layers.{i}.bias");
                graph.initializers.push(OnnxTensor::new(
                    bias_name.clone(),
                    vec![d_out as i64],
                    tensor_values(bias.val())?,
                ));
                gemm = gemm.input(bias_name);
            }
            graph.nodes.push(gemm);
            current = gemm_out;

            if i < last {
                let op = self.activation.0.onnx_op();
                let act_out = format!("{}_{i}", op.to_lowercase());
                graph.nodes.push(
                    OnnxNode::new(op, act_out.clone())
                        .input(current)
                        .output(act_out.clone()),
                );
                current = act_out;
            }
        }
        Ok(graph)
    }
}

fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ExecError::Record(format!("{e:?}")))
}

/// The model section of an exec: its name and architecture.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub name: String,
    pub config: MlpConfig,
}

impl ModelSpec {
    /// Resolve the model node; `input_hint`/`output_hint` come from the
    /// data node and fill in widths the config leaves out.
    pub fn from_node(
        node: &NodeArgs,
        input_hint: Option<usize>,
        output_hint: Option<usize>,
    ) -> Result<Self> {
        let args = &node.args;
        let input = match args.get_or::<Option<usize>>("input", None)?.or(input_hint) {
            Some(v) => v,
            None => return Err(ExecError::missing("model.input")),
        };
        let output = match args.get_or::<Option<usize>>("output", None)?.or(output_hint) {
            Some(v) => v,
            None => return Err(ExecError::missing("model.output")),
        };
        let hidden = args.get_or("hidden", Vec::<usize>::new())?;
        let activation = args.get_or("activation", Activation::default())?;

        if input == 0 || output == 0 || hidden.contains(&0) {
            return Err(ExecError::invalid(
                format!("model '{}'", node.name),
                "layer widths must be positive",
            ));
        }

        Ok(Self {
            name: node.name.clone(),
            config: MlpConfig::new(input, hidden, output, activation),
        })
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        self.config.init(device)
    }
}

impl Node for ModelSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Args;
    use crate::infra::onnx::wire::*;
    use burn::backend::NdArray;
    use serde_json::json;

    type B = NdArray;

    fn node(args: serde_json::Value) -> NodeArgs {
        NodeArgs {
            name: "IrisNet".to_string(),
            args: Args::from_value(args).unwrap(),
        }
    }

    #[test]
    fn test_spec_uses_hints() {
        let spec = ModelSpec::from_node(&node(json!({ "hidden": [8] })), Some(4), Some(3)).unwrap();
        assert_eq!(spec.config.input, 4);
        assert_eq!(spec.config.output, 3);
        assert_eq!(spec.config.hidden, vec![8]);
        assert_eq!(spec.config.activation, Activation::Relu);

        let spec =
            ModelSpec::from_node(&node(json!({ "input": 2, "output": 1, "activation": "tanh" })), Some(4), Some(3))
                .unwrap();
        assert_eq!(spec.config.input, 2);
        assert_eq!(spec.config.output, 1);
        assert_eq!(spec.config.activation, Activation::Tanh);
    }

    #[test]
    fn test_spec_errors() {
        assert!(matches!(
            ModelSpec::from_node(&node(json!({})), None, Some(3)),
            Err(ExecError::MissingKey { .. })
        ));
        assert!(ModelSpec::from_node(&node(json!({ "hidden": [0] })), Some(4), Some(3)).is_err());
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let spec = ModelSpec::from_node(&node(json!({ "hidden": [5, 6] })), Some(4), Some(3)).unwrap();
        let model: Mlp<B> = spec.init(&device);

        assert_eq!(model.layers.len(), 3);
        assert_eq!(model.input_size(), 4);
        assert_eq!(model.output_size(), 3);

        let y = model.forward(Tensor::<B, 2>::zeros([7, 4], &device));
        assert_eq!(y.dims(), [7, 3]);
    }

    #[test]
    fn test_onnx_graph_layout() {
        let device = Default::default();
        let spec = ModelSpec::from_node(&node(json!({ "hidden": [5] })), Some(4), Some(3)).unwrap();
        let model: Mlp<B> = spec.init(&device);

        let onnx = model.to_onnx("iris_net").unwrap();
        let ops: Vec<&str> = onnx.nodes.iter().map(|n| n.op_type.as_str()).collect();
        assert_eq!(ops, vec!["Gemm", "Relu", "Gemm"]);
        assert_eq!(onnx.nodes[0].inputs[0], INPUT_NAME);
        assert_eq!(onnx.nodes[2].outputs[0], OUTPUT_NAME);
        assert_eq!(onnx.initializers.len(), 4);
        assert_eq!(onnx.initializers[0].dims, vec![4, 5]);
        assert_eq!(onnx.initializers[0].data.len(), 20);

        let bytes = onnx.to_bytes();
        let graph = bytes_of(&bytes, 7)[0];
        assert_eq!(value_infos(graph, 11)[0].1, vec!["batch_size", "4"]);
        assert_eq!(value_infos(graph, 12)[0].1, vec!["batch_size", "3"]);
    }
}
