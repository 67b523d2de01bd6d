use ahash::AHashSet;
use anyhow::{ensure, Context, Result};
use blockfill::{evaluate_metrics, read_csv, BlockId, ImputationStrategy};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::EvaluateArgs) -> Result<()> {
    ensure!(args.holdout > 0.0 && args.holdout < 1.0, "--holdout must be in (0, 1), got {}", args.holdout);
    let config = super::load_config(&args.strategy)?;

    tracing::info!("[evaluate] loading blocks from {}", args.input.display());
    let dataset = read_csv(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let imputer = config.imputer(&dataset).context("failed to set up imputer")?;

    // Incomplete blocks are never fitted on; they sit in the unknown set alongside the holdout.
    let incomplete = dataset.ids_missing_any(&config.features)?;
    let skipped = incomplete.iter().copied().collect::<AHashSet<BlockId>>();
    let mut complete = dataset.ids().iter()
        .copied()
        .filter(|id| !skipped.contains(id))
        .collect::<Vec<BlockId>>();
    ensure!(complete.len() >= 2, "need at least 2 complete blocks, found {}", complete.len());

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    complete.shuffle(&mut rng);
    let size = ((complete.len() as f64 * args.holdout).ceil() as usize).clamp(1, complete.len() - 1);
    let holdout = complete[..size].to_vec();

    tracing::info!("[evaluate] hiding {size} of {} complete blocks, scoring {}", complete.len(), imputer.strategy().name());
    let unknown = holdout.iter().chain(incomplete.iter()).copied().collect::<Vec<_>>();
    let predicted = imputer.impute(&unknown)
        .with_context(|| format!("{} imputation failed", imputer.strategy().name()))?;

    let (_, predicted) = predicted.split(&holdout);
    let (_, truth) = dataset.table(&config.features)?.split(&holdout);
    let records = evaluate_metrics(&truth, &predicted)?;

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
