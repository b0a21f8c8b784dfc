// ============================================================
// Exec — ExecNode
// ============================================================
// The environment every trainer runs in: who this process is
// (id, root or not), where it runs (machine), which nodes it
// drives and where it writes.
//
// Built from the full exec configuration:
//
//   epoch: 10
//   batch size: 32
//   env: { id: 0, machine: cpu, is root: true, is distributed: false }
//   data / model / loss / optimizer: node sections

use burn::prelude::*;

use crate::domain::{Args, Env};
use crate::error::{ExecError, Result};
use crate::exec::machine::{HostBackend, Machine};
use crate::infra::{root::ExecRoot, writer::ExecWriter};
use crate::nodes::{Mlp, NodeSet};

const DEFAULT_SEED: u64 = 42;

#[derive(Debug)]
pub struct ExecNode {
    name: String,
    env: Env,
    machine: Machine,
    args: Args,
    nodes: NodeSet,
    root: ExecRoot,
    writer: ExecWriter,
    epochs: usize,
    batch_size: usize,
    seed: u64,
}

impl ExecNode {
    pub fn try_new(args: Args, root: &ExecRoot, exec_name: &str) -> Result<Self> {
        let env = args.env()?;
        // Burn exposes no process group to join here.
        if env.is_distributed {
            return Err(ExecError::Distributed);
        }
        let machine: Machine = env.machine.parse()?;

        let epochs: usize = args.get("epoch")?;
        let batch_size: usize = args.get("batch_size")?;
        if batch_size == 0 {
            return Err(ExecError::invalid("batch_size", "must be positive"));
        }
        let seed = args.get_or("seed", DEFAULT_SEED)?;

        let nodes = NodeSet::from_args(&args, &root.data_dir())?;
        let writer = ExecWriter::new(root.logs_dir(), exec_name, &nodes.model.name, env.is_root)?;

        tracing::info!(
            "Exec '{}' #{} on {} (root={}): {}",
            exec_name,
            env.id,
            machine,
            env.is_root,
            nodes
                .names()
                .iter()
                .map(|(slot, name)| format!("{slot}={name}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            name: exec_name.to_string(),
            env,
            machine,
            args,
            nodes,
            root: root.clone(),
            writer,
            epochs,
            batch_size,
            seed,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.env.id
    }

    pub fn machine(&self) -> Machine {
        self.machine
    }

    pub fn is_root(&self) -> bool {
        self.env.is_root
    }

    pub fn is_distributed(&self) -> bool {
        self.env.is_distributed
    }

    pub fn model_name(&self) -> &str {
        &self.nodes.model.name
    }

    /// `(slot, name)` of every node this exec drives.
    pub fn nodes(&self) -> Vec<(&'static str, &str)> {
        self.nodes.names()
    }

    pub fn node_set(&self) -> &NodeSet {
        &self.nodes
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn root(&self) -> &ExecRoot {
        &self.root
    }

    pub fn writer(&self) -> &ExecWriter {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut ExecWriter {
        &mut self.writer
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The device this exec's machine maps to on backend `B`.
    pub fn device<B: HostBackend>(&self) -> Result<B::Device> {
        B::device(&self.machine)
    }

    /// Move a module onto this exec's device.
    pub fn to<B: HostBackend, M: Module<B>>(&self, module: M) -> Result<M> {
        Ok(module.fork(&self.device::<B>()?))
    }

    /// A freshly initialised model on this exec's device.
    pub fn build_model<B: HostBackend>(&self) -> Result<Mlp<B>> {
        Ok(self.nodes.model.init(&self.device::<B>()?))
    }

    pub fn close(&mut self) {
        self.writer.close();
    }
}
