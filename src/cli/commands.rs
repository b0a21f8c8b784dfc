// ============================================================
// CLI — Commands and Arguments
// ============================================================
// Defines the three subcommands, `train`, `eval` and `publish`,
// and the flags they share.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → PathBuf, bool, ...)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use n3_burn::application::{ExecCommand, ExecRequest};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the model described by an exec configuration
    Train(ExecArgs),

    /// Evaluate the last trained checkpoint on the eval split
    Eval(ExecArgs),

    /// Export the last trained checkpoint as ONNX
    Publish(PublishArgs),
}

impl Commands {
    /// Split into the application-layer request and command.
    /// The application layer never sees clap types.
    pub fn into_parts(self) -> (ExecRequest, ExecCommand) {
        match self {
            Self::Train(a) => (a.into(), ExecCommand::Train),
            Self::Eval(a) => (a.into(), ExecCommand::Eval),
            Self::Publish(p) => (p.exec.into(), ExecCommand::Publish { output: p.output }),
        }
    }
}

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Exec configuration file (.json, .yaml or .yml)
    #[arg(long, short)]
    pub config: PathBuf,

    /// Exec root holding data/, logs/, models/ and nodes/
    #[arg(long, default_value = ".n3")]
    pub root: PathBuf,

    /// Override a configuration value, e.g. `--set "optimizer.args.learning rate=0.01"`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Machine to run on (cpu, gpu, gpu:N, cuda:N); replaces env.machine
    #[arg(long)]
    pub machine: Option<String>,

    /// Create the exec root if it does not exist
    #[arg(long)]
    pub create_root: bool,
}

impl From<ExecArgs> for ExecRequest {
    fn from(a: ExecArgs) -> Self {
        let mut req = ExecRequest::new(a.config, a.root);
        req.create_root = a.create_root;
        req.overrides = a.overrides;
        req.machine = a.machine;
        req
    }
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    #[command(flatten)]
    pub exec: ExecArgs,

    /// Output directory for the .onnx file [default: <root>/models]
    #[arg(long)]
    pub output: Option<PathBuf>,
}
