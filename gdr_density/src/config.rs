//! Run configuration. The defaults are the values the GDR analysis was
//! originally run with; tests build their own.

use std::path::PathBuf;

use polars::prelude::PolarsResult;
use serde::Serialize;

use crate::data_handling::population::PopulationMap;
use crate::models::polars_err;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub report_file_name: String,
    pub dataset_prefix: String,
    pub population_map: PopulationMap,
    pub plot: PlotSettings,
}

/// Figure and density-estimate parameters.
#[derive(Debug, Clone, Serialize)]
pub struct PlotSettings {
    /// Multiplier on the Scott bandwidth
    pub bw_adjust: f64,
    pub grid_size: usize,
    /// Grid extends this many bandwidths past the data on each side
    pub cut: f64,
    pub line_width: f64,
    pub dpi: u32,
    pub width_in: f64,
    pub height_in: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("/home/abera/2024/All_GDRs/updated_Sub_gdr.tsv"),
            output_dir: PathBuf::from("/home/abera/2024/Results/Sub_pops"),
            report_file_name: "All_18174_GDR_Superpops_DensityLines.pdf".to_string(),
            dataset_prefix: "18174".to_string(),
            population_map: PopulationMap::default(),
            plot: PlotSettings::default(),
        }
    }
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            bw_adjust: 1.2,
            grid_size: 200,
            cut: 3.0,
            line_width: 2.0,
            dpi: 600,
            width_in: 10.0,
            height_in: 6.0,
        }
    }
}

impl PipelineConfig {
    /// Effective settings as pretty JSON, for the run log.
    pub fn to_json(&self) -> PolarsResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| polars_err(Box::new(e)))
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_file_name)
    }

    pub fn image_path(&self, super_pop: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_GDR_DensityLine_{}.png", self.dataset_prefix, super_pop))
    }
}
