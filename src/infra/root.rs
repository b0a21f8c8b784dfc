// ============================================================
// Infrastructure — Exec Root
// ============================================================
// Every exec works inside one root directory:
//
//   <root>/
//     data/     datasets (relative CSV paths resolve here)
//     logs/     <exec>/<model>/{args.json, metrics.csv}
//     models/   <model>/ checkpoints, default ONNX output
//     nodes/    user node definitions

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{ExecError, Result};

pub const SUBDIRS: [&str; 4] = ["data", "logs", "models", "nodes"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRoot {
    dir: PathBuf,
}

impl ExecRoot {
    /// Open an existing root, or lay one out when `create` is set.
    /// Missing sub-directories are always created.
    pub fn try_new(dir: impl Into<PathBuf>, create: bool) -> Result<Self> {
        let dir = dir.into();
        if dir.exists() {
            if !dir.is_dir() {
                return Err(ExecError::NotDirectory { path: dir });
            }
        } else if create {
            fs::create_dir_all(&dir)?;
            tracing::info!("Created exec root '{}'", dir.display());
        } else {
            return Err(ExecError::NoSuchDirectory { path: dir });
        }

        for sub in SUBDIRS {
            let path = dir.join(sub);
            if path.exists() && !path.is_dir() {
                return Err(ExecError::NotDirectory { path });
            }
            fs::create_dir_all(&path)?;
        }
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.join("data")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir.join("logs")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.dir.join("models")
    }

    pub fn nodes_dir(&self) -> PathBuf {
        self.dir.join("nodes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let root = ExecRoot::try_new(tmp.path().join(".n3"), true).unwrap();
        for dir in [root.data_dir(), root.logs_dir(), root.models_dir(), root.nodes_dir()] {
            assert!(dir.is_dir(), "{} missing", dir.display());
        }
        // Re-opening an existing root needs no `create`.
        assert!(ExecRoot::try_new(root.path(), false).is_ok());
    }

    #[test]
    fn test_errors() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            ExecRoot::try_new(tmp.path().join("missing"), false),
            Err(ExecError::NoSuchDirectory { .. })
        ));

        let file = tmp.path().join("file");
        fs::write(&file, "").unwrap();
        assert!(matches!(
            ExecRoot::try_new(&file, true),
            Err(ExecError::NotDirectory { .. })
        ));
    }
}
