use clap::Parser;
use rust_uer::chid::{postprocess_chid_predictions, read_scored_examples};
use rust_uer::common::logging::init_logging;
use rust_uer::UerError;
use std::path::PathBuf;

/// Resolve ChID multiple choice scores into one answer per blank
#[derive(Parser, Debug)]
#[command(name = "chid-postprocess")]
struct Args {
    /// JSON array of `{"group", "tag", "scores"}` records produced by the scoring model
    #[arg(long)]
    scores_path: PathBuf,

    /// Destination of the `{tag: index}` predictions
    #[arg(long)]
    prediction_path: PathBuf,
}

pub fn main() -> Result<(), UerError> {
    init_logging(None);
    let args = Args::parse();

    let examples = read_scored_examples(&args.scores_path)?;
    tracing::info!(instances = examples.len(), "read scored examples");
    let predictions = postprocess_chid_predictions(examples)?;
    predictions.save(&args.prediction_path)?;
    tracing::info!(
        predictions = predictions.len(),
        path = %args.prediction_path.display(),
        "saved predictions"
    );

    Ok(())
}
