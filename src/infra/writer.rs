// ============================================================
// Infrastructure — Exec Writer
// ============================================================
// Records what an exec did: its configuration once, then one
// block of metric rows per epoch.
//
// Output directory: <logs>/<exec>/<snake_case(model)>/
//
//   args.json    — the full configuration of the run
//   metrics.csv  — long format, one metric per row:
//
//     epoch,phase,name,value
//     1,train,loss,0.912345
//     1,train,learning_rate,0.001000
//     1,eval,accuracy,0.966667
//
// Only the root process writes. A non-root writer accepts every
// call and drops the output, so the trainer never branches on it.
//
// The writer is also where the host's ExecHandle is attached:
// the trainer asks it whether to keep running and pushes the
// latest metrics through it.

use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

use crate::domain::{underscore, Args};
use crate::error::Result;

const METRICS_FILE: &str = "metrics.csv";
const ARGS_FILE: &str = "args.json";
const METRICS_HEADER: &str = "epoch,phase,name,value";

// ─── ExecHandle ───────────────────────────────────────────────────────────────

/// Shared progress channel between a running exec and its host.
/// Clones share state; any clone may stop the run.
#[derive(Debug, Clone)]
pub struct ExecHandle {
    running: Arc<AtomicBool>,
    metrics: Arc<RwLock<BTreeMap<String, f64>>>,
}

impl Default for ExecHandle {
    fn default() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl ExecHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the exec to stop after the current iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Latest snapshot pushed by the exec.
    pub fn metrics(&self) -> BTreeMap<String, f64> {
        match self.metrics.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, metrics: &BTreeMap<String, f64>) {
        let mut guard = match self.metrics.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.extend(metrics.iter().map(|(k, v)| (k.clone(), *v)));
    }
}

// ─── Phase / EpochMetrics ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Eval,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Eval => "eval",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The flushed metrics of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub phase: Phase,
    pub epoch: usize,
    pub values: BTreeMap<String, f64>,
}

impl EpochMetrics {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

// ─── ExecWriter ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ExecWriter {
    dir: PathBuf,
    is_root: bool,
    handle: Option<ExecHandle>,
}

impl ExecWriter {
    pub fn new(log_dir: impl AsRef<Path>, exec: &str, model: &str, is_root: bool) -> Result<Self> {
        let dir = log_dir.as_ref().join(exec).join(underscore(model));
        if is_root {
            fs::create_dir_all(&dir)?;
            tracing::debug!("Writing logs to '{}'", dir.display());
        }
        Ok(Self {
            dir,
            is_root,
            handle: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    pub fn write_args(&self, args: &Args) -> Result<()> {
        if !self.is_root {
            return Ok(());
        }
        let path = self.dir.join(ARGS_FILE);
        fs::write(&path, serde_json::to_string_pretty(args)?)?;
        tracing::debug!("Saved exec configuration to '{}'", path.display());
        Ok(())
    }

    /// Start collecting the metrics of one epoch. With `use_batch`,
    /// values are divided by `num_batches` when written; an epoch that
    /// saw no batch has no mean and records NaN.
    pub fn epoch(&self, phase: Phase, epoch: usize, num_batches: usize) -> EpochWriter {
        EpochWriter {
            path: self.is_root.then(|| self.metrics_path()),
            phase,
            epoch,
            num_batches,
            values: BTreeMap::new(),
        }
    }

    pub fn attach_handle(&mut self, handle: ExecHandle) {
        self.handle = Some(handle);
    }

    /// Push a metrics snapshot to the attached handle (root only).
    pub fn update_handle(&self, metrics: &BTreeMap<String, f64>) {
        if let (true, Some(handle)) = (self.is_root, &self.handle) {
            handle.update(metrics);
        }
    }

    /// False once the attached handle has been stopped.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(true, ExecHandle::is_running)
    }

    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            tracing::debug!("Detached exec handle");
        }
        if self.is_root {
            tracing::info!("Closed writer '{}'", self.dir.display());
        }
    }
}

// ─── EpochWriter ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct EpochWriter {
    path: Option<PathBuf>,
    phase: Phase,
    epoch: usize,
    num_batches: usize,
    values: BTreeMap<String, f64>,
}

impl EpochWriter {
    pub fn write(&mut self, name: &str, value: f64, use_batch: bool) -> &mut Self {
        let value = match (use_batch, self.num_batches) {
            (false, _) => value,
            (true, 0) => f64::NAN,
            (true, n) => value / n as f64,
        };
        self.values.insert(name.to_string(), value);
        self
    }

    /// Append this epoch's rows to metrics.csv and log them.
    pub fn flush(self) -> Result<EpochMetrics> {
        let summary = self
            .values
            .iter()
            .map(|(k, v)| format!("{k}={v:.4}"))
            .collect::<Vec<_>>()
            .join(" | ");
        tracing::info!("Epoch {:>3} [{}] {}", self.epoch, self.phase, summary);

        if let Some(path) = &self.path {
            let is_new = !path.exists();
            let mut f = OpenOptions::new().create(true).append(true).open(path)?;
            if is_new {
                writeln!(f, "{METRICS_HEADER}")?;
            }
            for (name, value) in &self.values {
                writeln!(f, "{},{},{},{:.6}", self.epoch, self.phase, name, value)?;
            }
        }

        Ok(EpochMetrics {
            phase: self.phase,
            epoch: self.epoch,
            values: self.values,
        })
    }
}
