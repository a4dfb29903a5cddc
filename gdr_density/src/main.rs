use polars::prelude::*;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;

mod analysis;
mod config;
mod data_handling;
mod helper_functions;
mod models;
mod pipeline;

fn main() -> PolarsResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting GDR density plots");

    let config = PipelineConfig::default();
    debug!("Configuration:\n{}", config.to_json()?);
    info!("Input  : {}", config.input_path.display());
    info!("Output : {}", config.output_dir.display());
    info!("Population map: {} sub-populations", config.population_map.len());

    let summary = match pipeline::run(&config) {
        Ok(summary) => summary,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return Err(e);
        }
    };

    let counts = &summary.reshape;
    info!(
        "{} genes x {} samples: dropped {} missing, {} non-numeric, {} non-positive and {} unmapped of {} cells",
        summary.genes,
        summary.samples,
        counts.missing,
        counts.non_numeric,
        counts.non_positive,
        summary.unmapped,
        counts.cells
    );
    if let Some((lo, hi)) = summary.gdr_range {
        info!("GDR range [{:.4}, {:.4}] over {} plotted values", lo, hi, summary.plotted);
    }
    info!("Rendered {} page(s): {}", summary.pages.len(), summary.pages.join(", "));

    Ok(())
}
