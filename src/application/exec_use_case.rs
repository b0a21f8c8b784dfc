// ============================================================
// Application — ExecUseCase
// ============================================================
// Runs one command against one exec root, in order:
//
//   Step 1: Open (or create) the exec root       (infra)
//   Step 2: Load the configuration + overrides   (domain)
//   Step 3: Pick a Burn backend for env.machine  (exec)
//   Step 4: Build the ExecNode and its Trainer   (exec)
//   Step 5: train / eval / publish               (exec)
//
// eval and publish start from the weights of the last epoch
// saved by a previous `train` on the same root.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::domain::Args;
use crate::exec::{CpuBackend, ExecNode, HostBackend, Machine, Trainer};
use crate::infra::{
    root::ExecRoot,
    writer::{EpochMetrics, ExecHandle},
};
use crate::nodes::Mlp;

pub const DEFAULT_EXEC_NAME: &str = "Trainer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecCommand {
    Train,
    Eval,
    /// `output` defaults to the root's models/ directory.
    Publish { output: Option<PathBuf> },
}

#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub config: PathBuf,
    pub root: PathBuf,
    pub create_root: bool,
    /// `key=value` overrides applied on top of the configuration file.
    pub overrides: Vec<String>,
    /// Replaces `env.machine` when set.
    pub machine: Option<String>,
    pub exec_name: String,
}

impl ExecRequest {
    pub fn new(config: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            config: config.into(),
            root: root.into(),
            create_root: false,
            overrides: Vec::new(),
            machine: None,
            exec_name: DEFAULT_EXEC_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExecOutcome {
    Trained(Vec<EpochMetrics>),
    Evaluated(EpochMetrics),
    Published(PathBuf),
}

pub struct ExecUseCase {
    request: ExecRequest,
    handle: ExecHandle,
}

impl ExecUseCase {
    pub fn new(request: ExecRequest) -> Self {
        Self {
            request,
            handle: ExecHandle::new(),
        }
    }

    /// The progress/stop handle the running exec reports to.
    pub fn handle(&self) -> ExecHandle {
        self.handle.clone()
    }

    pub fn execute(&self, command: ExecCommand) -> Result<ExecOutcome> {
        let req = &self.request;

        // ── Step 1: exec root ─────────────────────────────────────────────────
        let root = ExecRoot::try_new(&req.root, req.create_root)
            .with_context(|| format!("Cannot open exec root '{}'", req.root.display()))?;

        // ── Step 2: configuration ─────────────────────────────────────────────
        let mut args = Args::load(&req.config)
            .with_context(|| format!("Cannot load configuration '{}'", req.config.display()))?;
        for expr in &req.overrides {
            args.set_override(expr)
                .with_context(|| format!("Bad override '{expr}'"))?;
        }
        if let Some(machine) = &req.machine {
            args.set_override(&format!("env.machine={machine}"))?;
        }

        // ── Step 3: backend ───────────────────────────────────────────────────
        let machine: Machine = args.env()?.machine.parse()?;
        if machine.is_gpu() {
            #[cfg(feature = "wgpu")]
            return self.run::<crate::exec::GpuBackend>(args, &root, command);
            #[cfg(not(feature = "wgpu"))]
            anyhow::bail!("machine '{machine}' needs n3-burn built with the `wgpu` feature");
        }
        self.run::<CpuBackend>(args, &root, command)
    }

    fn run<B: HostBackend>(&self, args: Args, root: &ExecRoot, command: ExecCommand) -> Result<ExecOutcome> {
        // ── Step 4: exec node + trainer ───────────────────────────────────────
        let exec = ExecNode::try_new(args, root, &self.request.exec_name)
            .context("Cannot build exec from configuration")?;
        tracing::info!("Running {:?} on the {} backend", command, B::NAME);
        let mut trainer = Trainer::<B, Mlp<B>>::from_exec(exec)?;

        // ── Step 5: command ───────────────────────────────────────────────────
        match command {
            ExecCommand::Train => Ok(ExecOutcome::Trained(trainer.train(self.handle())?)),
            ExecCommand::Eval => {
                trainer
                    .load_latest_checkpoint()
                    .context("Cannot evaluate without a trained checkpoint")?;
                Ok(ExecOutcome::Evaluated(trainer.eval(self.handle())?))
            }
            ExecCommand::Publish { output } => {
                trainer
                    .load_latest_checkpoint()
                    .context("Cannot publish without a trained checkpoint")?;
                let output = output.unwrap_or_else(|| root.models_dir());
                Ok(ExecOutcome::Published(trainer.publish(output)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CONFIG: &str = r#"
epoch: 3
batch size: 16
env:
  machine: cpu
data:
  name: Blobs
  args:
    classes: 3
    features: 2
    samples per class: 30
    spread: 0.3
model:
  name: LeNet5
  args:
    hidden: [8]
loss: CrossEntropy
optimizer:
  name: Adam
  args:
    learning rate: 0.01
"#;

    fn request(dir: &std::path::Path) -> ExecRequest {
        let config = dir.join("exec.yaml");
        fs::write(&config, CONFIG).unwrap();
        let mut req = ExecRequest::new(config, dir.join(".n3"));
        req.create_root = true;
        req
    }

    #[test]
    fn test_train_eval_publish() {
        let tmp = tempfile::tempdir().unwrap();
        let mut req = request(tmp.path());
        req.overrides.push("epoch=2".to_string());

        let trained = ExecUseCase::new(req.clone()).execute(ExecCommand::Train).unwrap();
        assert!(matches!(trained, ExecOutcome::Trained(ref h) if h.len() == 2));

        let evaluated = ExecUseCase::new(req.clone()).execute(ExecCommand::Eval).unwrap();
        let ExecOutcome::Evaluated(metrics) = evaluated else {
            panic!("expected eval metrics");
        };
        assert!(metrics.get("accuracy").is_some());

        let out = tmp.path().join("published");
        let published = ExecUseCase::new(req)
            .execute(ExecCommand::Publish { output: Some(out.clone()) })
            .unwrap();
        let ExecOutcome::Published(path) = published else {
            panic!("expected a published path");
        };
        assert_eq!(path, out.join("le_net5.onnx"));
        assert!(path.is_file());
    }

    #[test]
    fn test_eval_before_train_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let req = request(tmp.path());
        assert!(ExecUseCase::new(req).execute(ExecCommand::Eval).is_err());
    }

    #[test]
    fn test_eval_with_other_architecture_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut req = request(tmp.path());
        req.overrides.push("epoch=1".to_string());
        ExecUseCase::new(req.clone()).execute(ExecCommand::Train).unwrap();

        req.overrides.push("model.args.hidden=[32]".to_string());
        let err = ExecUseCase::new(req.clone()).execute(ExecCommand::Eval).unwrap_err();
        assert!(err.chain().any(|e| e.to_string().contains("checkpoint was trained as")));
        assert!(ExecUseCase::new(req)
            .execute(ExecCommand::Publish { output: None })
            .is_err());
    }

    #[test]
    fn test_missing_root_without_create_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut req = request(tmp.path());
        req.create_root = false;
        assert!(ExecUseCase::new(req).execute(ExecCommand::Train).is_err());
    }
}
