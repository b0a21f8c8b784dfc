// ============================================================
// Domain Layer
// ============================================================
// Plain Rust types that every other layer speaks:
//
//   args.rs    — configuration bags (Args, NodeArgs, Env)
//   sample.rs  — one row of training data
//   traits.rs  — the Node abstraction and naming helpers
//
// No Burn types in here, no file I/O beyond reading a config file.

pub mod args;
pub mod sample;
pub mod traits;

pub use args::{Args, Env, NodeArgs};
pub use sample::Sample;
pub use traits::{underscore, Node, NodeKind};
