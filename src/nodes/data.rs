// ============================================================
// Nodes — Data
// ============================================================
// The data node knows where rows come from and how they are
// split. It produces plain SampleDatasets; batching and
// shuffling per epoch are Burn's DataLoader's job.
//
//   "data": { "name": "Blobs", "args": { "classes": 3, "features": 4 } }
//   "data": { "name": "Csv",   "args": { "path": "data/iris.csv",
//                                        "label": "species" } }
//
// Relative CSV paths are resolved against the exec root's
// data/ directory.

use std::path::{Path, PathBuf};

use crate::data::{
    loader::{read_csv, CsvOptions, LabelColumn},
    splitter::split_train_val,
    synthetic::{make_blobs, BlobOptions},
    SampleDataset,
};
use crate::domain::{Node, NodeArgs, NodeKind, Sample};
use crate::error::{ExecError, Result};

const DEFAULT_TRAIN_FRACTION: f64 = 0.8;
const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Blobs(BlobOptions),
    Csv { path: PathBuf, label: Option<LabelColumn>, has_header: bool, delimiter: char },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataNode {
    pub name: String,
    pub source: DataSource,
    pub train_fraction: f64,
    pub seed: u64,
}

impl DataNode {
    pub fn from_node(node: &NodeArgs, data_dir: &Path) -> Result<Self> {
        let args = &node.args;
        let seed = args.get_or("seed", DEFAULT_SEED)?;

        let source = match node.name.as_str() {
            "Blobs" => {
                let defaults = BlobOptions::default();
                DataSource::Blobs(BlobOptions {
                    classes: args.get_or("classes", defaults.classes)?,
                    features: args.get_or("features", defaults.features)?,
                    samples_per_class: args.get_or("samples_per_class", defaults.samples_per_class)?,
                    spread: args.get_or("spread", defaults.spread)?,
                    center_box: args.get_or("center_box", defaults.center_box)?,
                    seed,
                })
            }
            "Csv" => {
                let path: PathBuf = args.get("path")?;
                let delimiter: String = args.get_or("delimiter", ",".to_string())?;
                let mut chars = delimiter.chars();
                let delimiter = match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => return Err(ExecError::invalid("delimiter", "must be a single character")),
                };
                DataSource::Csv {
                    path: if path.is_relative() { data_dir.join(path) } else { path },
                    label: args.get_or("label", None)?,
                    has_header: args.get_or("has_header", true)?,
                    delimiter,
                }
            }
            other => {
                return Err(ExecError::UnknownNode {
                    kind: "data",
                    name: other.to_string(),
                })
            }
        };

        Ok(Self {
            name: node.name.clone(),
            source,
            train_fraction: args.get_or("train_fraction", DEFAULT_TRAIN_FRACTION)?,
            seed,
        })
    }

    /// Every row of the source, before splitting.
    pub fn load(&self) -> Result<Vec<Sample>> {
        match &self.source {
            DataSource::Blobs(options) => make_blobs(options),
            DataSource::Csv { path, label, has_header, delimiter } => {
                let mut options = CsvOptions::new(path);
                options.label = label.clone();
                options.has_header = *has_header;
                options.delimiter = *delimiter;
                read_csv(&options)
            }
        }
    }

    /// Load every row and split into (train, eval) with the node's seed.
    pub fn split(&self) -> Result<(SampleDataset, SampleDataset)> {
        self.split_samples(self.load()?)
    }

    /// Split rows already loaded with `load`. Both sides must be
    /// non-empty: an empty train split would train nothing and an
    /// empty eval split would score nothing.
    pub fn split_samples(&self, samples: Vec<Sample>) -> Result<(SampleDataset, SampleDataset)> {
        if samples.is_empty() {
            return Err(ExecError::EmptyDataset(self.name.clone()));
        }
        let total = samples.len();
        let (train, eval) = split_train_val(samples, self.train_fraction, self.seed);
        if train.is_empty() || eval.is_empty() {
            return Err(ExecError::EmptyDataset(format!(
                "{}: train fraction {} of {total} rows leaves {} train / {} eval samples",
                self.name,
                self.train_fraction,
                train.len(),
                eval.len()
            )));
        }
        tracing::info!(
            "Data node '{}': {} train / {} eval samples",
            self.name,
            train.len(),
            eval.len()
        );
        Ok((SampleDataset::new(train), SampleDataset::new(eval)))
    }

    pub fn train_dataset(&self) -> Result<SampleDataset> {
        self.split().map(|(train, _)| train)
    }

    pub fn eval_dataset(&self) -> Result<SampleDataset> {
        self.split().map(|(_, eval)| eval)
    }

    /// Number of classes when labels are class indices (max label + 1).
    /// Rows whose label is not a class index are not counted.
    pub fn class_count(samples: &[Sample]) -> usize {
        samples
            .iter()
            .filter_map(|s| s.class_index().map(|c| c + 1))
            .max()
            .unwrap_or(0)
    }

    /// Every label must be a class index below `classes`.
    pub fn check_labels(&self, samples: &[Sample], classes: usize) -> Result<()> {
        for (row, sample) in samples.iter().enumerate() {
            match sample.class_index() {
                Some(class) if class < classes => {}
                Some(class) => {
                    return Err(ExecError::invalid(
                        format!("{} row {row}", self.name),
                        format!("class {class} does not fit a model with {classes} outputs"),
                    ))
                }
                None => {
                    return Err(ExecError::invalid(
                        format!("{} row {row}", self.name),
                        format!("label {:?} is not a class index", sample.y.first()),
                    ))
                }
            }
        }
        Ok(())
    }
}

impl Node for DataNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Data
    }
}
