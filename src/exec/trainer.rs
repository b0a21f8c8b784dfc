// ============================================================
// Exec — Trainer
// ============================================================
// The train / eval / publish loops. The trainer owns no maths:
// every numeric step is a Burn call, sequenced here.
//
//   train:   for each epoch, for each batch
//              zero_grad → forward → loss → backward → step
//   eval:    model.valid() on the inner backend, no autodiff
//   publish: model.valid(), trial forward pass, ONNX export
//
// The loop is split into hooks (train_begin, train_epoch_begin,
// train_iter_begin, train_iter_end, train_epoch_end, train_end)
// so that each piece of bookkeeping sits in one place.
//
// Key Burn insight:
//   - Training uses B (an autodiff backend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - Eval/publish batchers therefore use B::InnerBackend
//   - argmax(1) returns [batch, 1], flattened before .equal()

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use burn::{
    data::dataloader::{batcher::Batcher, DataLoaderBuilder},
    module::AutodiffModule,
    prelude::*,
};

use crate::data::{SampleBatch, SampleBatcher};
use crate::domain::underscore;
use crate::error::{ExecError, Result};
use crate::exec::{machine::HostBackend, node::ExecNode};
use crate::infra::{
    checkpoint::CheckpointManager,
    onnx::export_path,
    writer::{EpochMetrics, ExecHandle, Phase},
};
use crate::nodes::{model::MlpConfig, Mlp, ModelNode, Optim};

type Metrics = BTreeMap<String, f64>;

pub struct Trainer<B: HostBackend, M> {
    exec: ExecNode,
    device: B::Device,
    model: M,
    checkpoints: CheckpointManager,
}

impl<B: HostBackend> Trainer<B, Mlp<B>> {
    /// A trainer for the MLP described by the exec's model node.
    pub fn from_exec(exec: ExecNode) -> Result<Self> {
        let model = exec.build_model::<B>()?;
        Self::new(exec, model)
    }
}

impl<B, M> Trainer<B, M>
where
    B: HostBackend,
    M: ModelNode<B> + AutodiffModule<B> + 'static,
    M::InnerModule: ModelNode<B::InnerBackend>,
{
    pub fn new(exec: ExecNode, model: M) -> Result<Self> {
        let device = exec.device::<B>()?;
        let checkpoints = CheckpointManager::new(exec.root().models_dir(), exec.model_name());
        Ok(Self {
            exec,
            device,
            model,
            checkpoints,
        })
    }

    pub fn exec(&self) -> &ExecNode {
        &self.exec
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    // ─── Train ────────────────────────────────────────────────────────────────

    /// Run every configured epoch, or until `handle` is stopped.
    /// Returns the flushed metrics of each epoch that ran.
    pub fn train(&mut self, handle: ExecHandle) -> Result<Vec<EpochMetrics>> {
        let mut optim = self.train_begin(handle)?;
        let mut model = self.model.clone();

        let train = self.exec.node_set().data.train_dataset()?;
        let batch_size = self.exec.batch_size();
        tracing::info!(
            "Training {} for {} epochs ({} batches of {} per epoch)",
            self.exec.model_name(),
            self.exec.epochs(),
            train.batch_count(batch_size),
            batch_size
        );
        let loader = DataLoaderBuilder::new(SampleBatcher::<B>::new(self.device.clone()))
            .batch_size(batch_size)
            .shuffle(self.exec.seed())
            .num_workers(1)
            .build(train);

        let mut history = Vec::new();
        for epoch in 1..=self.exec.epochs() {
            if !self.exec.writer().is_running() {
                tracing::info!("Stopped before epoch {}", epoch);
                break;
            }
            let (trained, metrics) = self.train_epoch(epoch, loader.iter(), model, &mut optim)?;
            model = trained;
            history.push(metrics);
            optim.end_epoch(epoch);
        }

        self.model = model;
        self.train_end();
        Ok(history)
    }

    /// One pass over `batches`. A stop request ends the pass after the
    /// current iteration; the partial epoch is still flushed and saved.
    fn train_epoch<I>(
        &self,
        epoch: usize,
        batches: I,
        mut model: M,
        optim: &mut Optim<M, B>,
    ) -> Result<(M, EpochMetrics)>
    where
        I: IntoIterator<Item = SampleBatch<B>>,
    {
        let mut metrics = self.train_epoch_begin(epoch);
        let mut seen = 0usize;

        for batch in batches {
            let batch = self.train_iter_begin(batch);
            optim.zero_grad();
            let y_pred = model.forward(batch.x.clone());
            let loss = self.exec.node_set().loss.forward(y_pred, &batch);
            optim.backward(loss.clone(), &model);
            model = optim.step(model);
            seen += 1;

            self.train_iter_end(&mut metrics, loss);
            if !self.exec.writer().is_running() {
                tracing::info!("Stopped during epoch {} after {} batches", epoch, seen);
                break;
            }
        }

        let flushed = self.train_epoch_end(epoch, seen, metrics, &model, optim)?;
        Ok((model, flushed))
    }

    fn train_begin(&mut self, handle: ExecHandle) -> Result<Optim<M, B>> {
        self.exec.writer_mut().attach_handle(handle);
        self.model = self.exec.to::<B, M>(self.model.clone())?;
        let optim = self.exec.node_set().optimizer.initialize::<M, B>();

        if self.exec.is_root() {
            self.exec.writer().write_args(self.exec.args())?;
            self.checkpoints.save_architecture(&self.exec.node_set().model.config)?;
        }
        Ok(optim)
    }

    fn train_epoch_begin(&self, epoch: usize) -> Metrics {
        tracing::debug!("Epoch {} / {}", epoch, self.exec.epochs());
        BTreeMap::from([("loss".to_string(), 0.0)])
    }

    fn train_iter_begin(&self, batch: SampleBatch<B>) -> SampleBatch<B> {
        tracing::trace!("Batch of {} samples", batch.size());
        batch
    }

    fn train_iter_end(&self, metrics: &mut Metrics, loss: Tensor<B, 1>) {
        if !self.exec.is_root() {
            return;
        }
        let loss: f64 = loss.into_scalar().elem::<f64>();
        *metrics.entry("loss".to_string()).or_default() += loss;
        self.exec.writer().update_handle(metrics);
    }

    fn train_epoch_end(
        &self,
        epoch: usize,
        num_batches: usize,
        metrics: Metrics,
        model: &M,
        optim: &Optim<M, B>,
    ) -> Result<EpochMetrics> {
        let mut writer = self.exec.writer().epoch(Phase::Train, epoch, num_batches);
        for (name, value) in &metrics {
            writer.write(name, *value, true);
        }
        writer.write("learning_rate", optim.learning_rate(), false);
        let flushed = writer.flush()?;

        if self.exec.is_root() {
            self.checkpoints.save_model(model, epoch)?;
        }
        Ok(flushed)
    }

    fn train_end(&mut self) {
        self.exec.close();
    }

    // ─── Eval ─────────────────────────────────────────────────────────────────

    /// Loss (and accuracy for classification) over the eval split.
    pub fn eval(&mut self, handle: ExecHandle) -> Result<EpochMetrics> {
        self.exec.writer_mut().attach_handle(handle);

        let eval = self.exec.node_set().data.eval_dataset()?;
        let loader = DataLoaderBuilder::new(SampleBatcher::<B::InnerBackend>::new(self.device.clone()))
            .batch_size(self.exec.batch_size())
            .num_workers(1)
            .build(eval);

        // dropout and friends switched off, no autodiff graph
        let model = self.model.valid();
        let loss_node = &self.exec.node_set().loss;
        let classification = loss_node.is_classification();

        let mut loss_sum = 0.0f64;
        let mut batches = 0usize;
        let mut correct = 0usize;
        let mut total = 0usize;

        for batch in loader.iter() {
            let y_pred = model.forward(batch.x.clone());
            if classification {
                let pred = y_pred.clone().argmax(1).flatten::<1>(0, 1);
                let hits: i64 = pred
                    .equal(batch.labels.clone())
                    .int()
                    .sum()
                    .into_scalar()
                    .elem::<i64>();
                correct += hits as usize;
            }
            total += batch.size();
            loss_sum += loss_node.forward(y_pred, &batch).into_scalar().elem::<f64>();
            batches += 1;

            if !self.exec.writer().is_running() {
                break;
            }
        }

        let epoch = self.checkpoints.latest_epoch()?.unwrap_or(0);
        let mut writer = self.exec.writer().epoch(Phase::Eval, epoch, batches);
        writer.write("loss", loss_sum, true);
        if classification {
            let accuracy = if total > 0 { correct as f64 / total as f64 } else { f64::NAN };
            writer.write("accuracy", accuracy, false);
        }
        let metrics = writer.flush()?;

        self.exec.writer().update_handle(&metrics.values);
        self.exec.close();
        Ok(metrics)
    }

    // ─── Publish ──────────────────────────────────────────────────────────────

    /// Export the model as `<output_dir>/<snake_case(model)>.onnx`.
    pub fn publish(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let model = self.model.valid();

        // Run real rows through first so a width mismatch surfaces here
        // rather than in whatever loads the exported file.
        let train = self.exec.node_set().data.train_dataset()?;
        let rows: Vec<_> = train
            .samples()
            .iter()
            .take(self.exec.batch_size())
            .cloned()
            .collect();
        if rows.is_empty() {
            return Err(ExecError::EmptyDataset(format!(
                "{}: no training rows to check the export with",
                self.exec.node_set().data.name
            )));
        }
        let batch = SampleBatcher::<B::InnerBackend>::new(self.device.clone()).batch(rows);
        let rows = batch.size();
        let [out_rows, out_width] = model.forward(batch.x).dims();
        if out_rows != rows || out_width != model.output_size() {
            return Err(ExecError::Shape(format!(
                "a batch of {rows} rows produced [{out_rows}, {out_width}], expected [{rows}, {}]",
                model.output_size()
            )));
        }

        let name = self.exec.model_name();
        let path = export_path(output_dir, name);
        model.to_onnx(&underscore(name))?.save(&path)?;
        Ok(path)
    }

    /// Restore the weights of the last epoch saved by `train`. The
    /// configured model must have the architecture they were saved with.
    pub fn load_latest_checkpoint(&mut self) -> Result<()> {
        let configured = &self.exec.node_set().model.config;
        match self.checkpoints.load_architecture::<MlpConfig>()? {
            Some(saved) if serde_json::to_value(&saved)? != serde_json::to_value(configured)? => {
                return Err(ExecError::invalid(
                    "model",
                    format!("configured as {configured}, but the checkpoint was trained as {saved}"),
                ));
            }
            Some(_) => {}
            None => tracing::warn!(
                "No saved architecture in '{}', loading weights unchecked",
                self.checkpoints.dir().display()
            ),
        }
        self.model = self
            .checkpoints
            .load_model(self.model.clone(), &self.device)?;
        Ok(())
    }
}
