// ============================================================
// Exec Layer
// ============================================================
// Runs the nodes. Nothing here computes gradients or updates
// weights; it decides when Burn should.
//
//   machine.rs  — `env.machine` → Burn device (HostBackend)
//   node.rs     — ExecNode: env, nodes, writer of one exec
//   trainer.rs  — Trainer: train / eval / publish loops

pub mod machine;
pub mod node;
pub mod trainer;

pub use machine::{CpuBackend, HostBackend, Machine};
#[cfg(feature = "wgpu")]
pub use machine::GpuBackend;
pub use node::ExecNode;
pub use trainer::Trainer;
