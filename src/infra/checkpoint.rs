// ============================================================
// Infrastructure — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved per model:
//   1. Model weights (.mpk.gz file), one per epoch
//   2. latest_epoch.json, which epoch was last saved
//   3. model.json, the resolved architecture the weights fit
//
// A record only loads into a model of the same architecture, so
// eval / publish compare the model they were configured with
// against model.json before loading any weights.
//
// File layout:
//   <root>/models/<snake_case(model)>/
//     epoch_1.mpk.gz
//     epoch_2.mpk.gz
//     latest_epoch.json
//     model.json

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::domain::underscore;
use crate::error::{ExecError, Result};

const LATEST_FILE: &str = "latest_epoch.json";
const ARCHITECTURE_FILE: &str = "model.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Checkpoints of `model` under `models_dir`. The directory is
    /// created on the first save.
    pub fn new(models_dir: impl AsRef<Path>, model: &str) -> Self {
        Self {
            dir: models_dir.as_ref().join(underscore(model)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record the weights of `model` after `epoch` and move the
    /// latest-epoch pointer to it.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        // the recorder adds the extension
        let path = self.dir.join(format!("epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .map_err(|e| {
                ExecError::Record(format!("cannot save checkpoint '{}': {e:?}", path.display()))
            })?;

        fs::write(self.dir.join(LATEST_FILE), serde_json::to_string(&epoch)?)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the weights of the latest saved epoch into `model`.
    /// The model must have the architecture the record was saved with.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let Some(epoch) = self.latest_epoch()? else {
            return Err(ExecError::Record(format!(
                "no checkpoint in '{}', run `train` first",
                self.dir.display()
            )));
        };
        let path = self.dir.join(format!("epoch_{epoch}"));
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .map_err(|e| {
                ExecError::Record(format!("cannot load checkpoint '{}': {e:?}", path.display()))
            })?;
        Ok(model.load_record(record))
    }

    /// Record the architecture the following checkpoints are saved with.
    pub fn save_architecture<C: Serialize>(&self, config: &C) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(ARCHITECTURE_FILE);
        fs::write(&path, serde_json::to_string_pretty(config)?)?;
        tracing::debug!("Saved model architecture to '{}'", path.display());
        Ok(())
    }

    /// The architecture saved by `train`, or None if there is none.
    pub fn load_architecture<C: DeserializeOwned>(&self) -> Result<Option<C>> {
        let path = self.dir.join(ARCHITECTURE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&s)?))
    }

    /// The last epoch saved, or None before the first checkpoint.
    pub fn latest_epoch(&self) -> Result<Option<usize>> {
        let path = self.dir.join(LATEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str::<usize>(&s)?))
    }
}
