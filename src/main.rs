//! Batch entry point: compute q2/q4/q6/q8 for every SH volume under
//! `normed_mifs/`.

use anyhow::bail;
use env_logger::{Builder, Env};
use log::info;
use steinhardt::batch;

fn main() -> anyhow::Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    builder.init();

    let inputs = batch::discover_inputs()?;
    info!(
        "found {} SH volumes matching {}",
        inputs.len(),
        batch::INPUT_PATTERN
    );

    let failures = batch::run(&inputs);
    if failures > 0 {
        bail!("{} of {} files failed", failures, inputs.len());
    }

    info!("done: {} files processed", inputs.len());
    Ok(())
}
