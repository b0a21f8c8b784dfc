// ============================================================
// Nodes
// ============================================================
// One wrapper per slot of a training loop. Each is built from
// its section of the exec config (a NodeArgs) and holds only
// configuration until the exec asks it to do something; the
// actual numerics are delegated to Burn.
//
//   data.rs   — DataNode:  where samples come from, train/eval split
//   model.rs  — ModelSpec + Mlp, the ModelNode trait
//   loss.rs   — LossNode:  CrossEntropy / Mse
//   optim.rs  — OptimNode: Adam / AdamW / Sgd → Optim

pub mod data;
pub mod loss;
pub mod model;
pub mod optim;

use std::path::Path;

use crate::domain::{Args, Node};
use crate::error::{ExecError, Result};

pub use data::DataNode;
pub use loss::LossNode;
pub use model::{Mlp, ModelNode, ModelSpec};
pub use optim::{Optim, OptimNode};

/// The four nodes an exec is made of.
#[derive(Debug, Clone)]
pub struct NodeSet {
    pub data: DataNode,
    pub model: ModelSpec,
    pub loss: LossNode,
    pub optimizer: OptimNode,
}

impl NodeSet {
    /// Resolve every node section of `args`. Model widths missing from
    /// the config are taken from the full dataset, so a class that only
    /// appears in the eval split still gets an output. The loaded rows
    /// are then checked against the model before anything is trained.
    pub fn from_args(args: &Args, data_dir: &Path) -> Result<Self> {
        let data = DataNode::from_node(&args.node("data")?, data_dir)?;
        let loss = LossNode::from_node(&args.node("loss")?)?;
        let optimizer = OptimNode::from_node(&args.node("optimizer")?)?;

        let samples = data.load()?;
        let features = samples.first().map(|s| s.x.len()).unwrap_or(0);
        let outputs = if loss.is_classification() {
            DataNode::class_count(&samples)
        } else {
            samples.first().map(|s| s.y.len()).unwrap_or(0)
        };
        let model = ModelSpec::from_node(&args.node("model")?, Some(features), Some(outputs))?;

        if model.config.input != features {
            return Err(ExecError::invalid(
                "model.input",
                format!("{} rows have {features} features, the model expects {}", data.name, model.config.input),
            ));
        }
        if loss.is_classification() {
            data.check_labels(&samples, model.config.output)?;
        } else if outputs != model.config.output {
            return Err(ExecError::invalid(
                "model.output",
                format!("{} rows have {outputs} targets, the model produces {}", data.name, model.config.output),
            ));
        }
        data.split_samples(samples)?;

        Ok(Self {
            data,
            model,
            loss,
            optimizer,
        })
    }

    /// `(slot, name)` for every node, in a fixed order.
    pub fn names(&self) -> Vec<(&'static str, &str)> {
        let nodes: [&dyn Node; 4] = [&self.data, &self.model, &self.loss, &self.optimizer];
        nodes
            .into_iter()
            .map(|n| (n.kind().as_str(), n.name()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_set_fills_model_widths_from_data() {
        let args = Args::from_value(json!({
            "data": { "name": "Blobs", "args": { "classes": 4, "features": 5, "samples per class": 5 } },
            "model": { "name": "BlobNet", "args": { "hidden": [8] } },
            "loss": "CrossEntropy",
            "optimizer": "Adam",
        }))
        .unwrap();

        let nodes = NodeSet::from_args(&args, Path::new(".")).unwrap();
        assert_eq!(nodes.model.config.input, 5);
        assert_eq!(nodes.model.config.output, 4);
        assert_eq!(
            nodes.names(),
            vec![("data", "Blobs"), ("model", "BlobNet"), ("loss", "CrossEntropy"), ("optimizer", "Adam")]
        );
    }

    fn write_csv(dir: &Path, body: &str) {
        std::fs::write(dir.join("rows.csv"), body).unwrap();
    }

    fn csv_args(model: serde_json::Value, loss: &str) -> Args {
        Args::from_value(json!({
            "data": { "name": "Csv", "args": { "path": "rows.csv", "train fraction": 0.5 } },
            "model": { "name": "RowNet", "args": model },
            "loss": loss,
            "optimizer": "Adam",
        }))
        .unwrap()
    }

    #[test]
    fn test_classes_counted_over_full_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = String::from("a,y\n");
        for i in 0..9 {
            body.push_str(&format!("{i},0\n"));
        }
        body.push_str("9,1\n");
        write_csv(dir.path(), &body);

        // Whichever side the single class-1 row lands on, the model
        // has an output for it.
        for seed in 0..8 {
            let mut args = csv_args(json!({}), "CrossEntropy");
            args.set_override(&format!("data.args.seed={seed}")).unwrap();
            let nodes = NodeSet::from_args(&args, dir.path()).unwrap();
            assert_eq!(nodes.model.config.output, 2, "seed {seed}");
        }
    }

    #[test]
    fn test_labels_checked_against_model() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "a,y\n1,0\n2,1\n3,2\n4,0\n");

        let too_narrow = csv_args(json!({ "output": 2 }), "CrossEntropy");
        assert!(matches!(
            NodeSet::from_args(&too_narrow, dir.path()),
            Err(ExecError::InvalidValue { .. })
        ));

        let wrong_input = csv_args(json!({ "input": 3 }), "CrossEntropy");
        assert!(matches!(
            NodeSet::from_args(&wrong_input, dir.path()),
            Err(ExecError::InvalidValue { .. })
        ));

        write_csv(dir.path(), "a,y\n1,0\n2,-1\n3,1\n4,0\n");
        assert!(matches!(
            NodeSet::from_args(&csv_args(json!({}), "CrossEntropy"), dir.path()),
            Err(ExecError::InvalidValue { .. })
        ));

        write_csv(dir.path(), "a,y\n1,0.5\n2,1\n3,1\n4,0\n");
        assert!(matches!(
            NodeSet::from_args(&csv_args(json!({}), "CrossEntropy"), dir.path()),
            Err(ExecError::InvalidValue { .. })
        ));
        // Regression targets are not class indices.
        assert!(NodeSet::from_args(&csv_args(json!({}), "Mse"), dir.path()).is_ok());
    }

    #[test]
    fn test_empty_split_rejected_early() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "a,y\n1,0\n2,1\n");
        let mut args = csv_args(json!({}), "CrossEntropy");
        args.set_override("data.args.train fraction=1.0").unwrap();
        assert!(matches!(
            NodeSet::from_args(&args, dir.path()),
            Err(ExecError::EmptyDataset(_))
        ));
    }
}
