// ============================================================
// Application Layer / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one command
// (train, eval, publish).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing or printing (that's the CLI)
//   - Only workflow coordination: root → args → exec → trainer
//
// It is also where the machine named in the configuration is
// turned into a concrete Burn backend type.

pub mod exec_use_case;

pub use exec_use_case::{ExecCommand, ExecOutcome, ExecRequest, ExecUseCase};
