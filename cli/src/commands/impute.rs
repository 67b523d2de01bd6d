use std::path::PathBuf;

use anyhow::{Context, Result};
use blockfill::{read_csv, write_csv, ImputationStrategy};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::ImputeArgs) -> Result<()> {
    let out_path: PathBuf = args.output.clone().unwrap_or("./imputed.csv".into());
    let config = super::load_config(&args.strategy)?;

    tracing::info!("[impute] loading blocks from {}", args.input.display());
    let dataset = read_csv(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let imputer = config.imputer(&dataset).context("failed to set up imputer")?;
    let ids = match &args.ids {
        Some(ids) => ids.clone(),
        None => dataset.ids_missing_any(&config.features)?,
    };

    tracing::info!("[impute] imputing {} blocks with {}", ids.len(), imputer.strategy().name());
    let result = imputer.impute(&ids)
        .with_context(|| format!("{} imputation failed", imputer.strategy().name()))?;

    tracing::info!("[impute] writing {} rows to {}", result.len(), out_path.display());
    write_csv(&result, &out_path)
        .with_context(|| format!("failed to write {}", out_path.display()))?;

    Ok(())
}
