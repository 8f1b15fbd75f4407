// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses arguments with `clap` and hands off to Layer 2.
//
//   1. `preprocess` - rating table → encoded, split artifacts
//   2. `train`      - artifacts → trained model + weights
//   3. `run`        - both, with one configuration
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PreprocessArgs, RunArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "rating-embeddings",
    version,
    about = "Train user and item embeddings from a rating table and export them for similarity search."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the use case for the chosen subcommand.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Preprocess(args) => run_preprocess(args),
            Commands::Train(args)      => run_train(args),
            Commands::Run(args)        => run_all(args),
        }
    }
}

fn run_preprocess(args: PreprocessArgs) -> Result<()> {
    use crate::application::preprocess_use_case::PreprocessUseCase;

    let summary = PreprocessUseCase::new(args.into()).execute()?;
    println!(
        "Preprocessing complete: {} of {} rows kept, {} users, {} items, {} train / {} test.",
        summary.kept_rows,
        summary.loaded_rows,
        summary.num_users,
        summary.num_items,
        summary.train_rows,
        summary.test_rows,
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let summary = TrainUseCase::new(args.into()).execute()?;
    print_training(&summary);
    Ok(())
}

fn run_all(args: RunArgs) -> Result<()> {
    use crate::application::run_use_case::RunUseCase;

    let summary = RunUseCase::new(args.into()).execute()?;
    println!(
        "Preprocessing complete: {} users, {} items, {} train / {} test.",
        summary.preprocess.num_users,
        summary.preprocess.num_items,
        summary.preprocess.train_rows,
        summary.preprocess.test_rows,
    );
    print_training(&summary.train);
    Ok(())
}

fn print_training(summary: &crate::application::train_use_case::TrainSummary) {
    println!(
        "Training complete after {} epochs{}. Best epoch {} (val_loss={:.4}). Weights exported.",
        summary.epochs_run,
        if summary.stopped_early { " (early stop)" } else { "" },
        summary.best_epoch,
        summary.best_val_loss,
    );
}
