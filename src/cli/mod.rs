// ============================================================
// CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses the command line
// with clap and hands the work to the application layer.
//
//   n3-burn train   --config exec.yaml [--root .n3] [--set k=v]...
//   n3-burn eval    --config exec.yaml
//   n3-burn publish --config exec.yaml [--output dir]

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::Commands;

use n3_burn::application::{ExecOutcome, ExecUseCase};

#[derive(Parser, Debug)]
#[command(
    name = "n3-burn",
    version,
    about = "Train, evaluate and publish node-configured models with Burn."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand; the CLI only prints results.
    pub fn run(self) -> Result<()> {
        let (request, command) = self.command.into_parts();
        match ExecUseCase::new(request).execute(command)? {
            ExecOutcome::Trained(history) => match history.last() {
                Some(last) => println!(
                    "Training complete after {} epochs (loss={:.4}).",
                    history.len(),
                    last.get("loss").unwrap_or(f64::NAN)
                ),
                None => println!("Training stopped before the first epoch."),
            },
            ExecOutcome::Evaluated(metrics) => {
                for (name, value) in &metrics.values {
                    println!("{name}: {value:.4}");
                }
            }
            ExecOutcome::Published(path) => println!("Published '{}'", path.display()),
        }
        Ok(())
    }
}
