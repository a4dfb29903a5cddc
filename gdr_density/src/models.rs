use polars::error::PolarsError;
use polars::frame::DataFrame;
use polars::prelude::PolarsResult;

// Column names of the long-form table
pub const GENE_COL: &str = "GeneName";
pub const SUB_COL: &str = "Sub";
pub const GDR_COL: &str = "GDR";
pub const SUPER_POP_COL: &str = "SuperPop";

/// Anything the pipeline can read into a `DataFrame`.
pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

/// Wrap a foreign error so it can travel through `PolarsResult`.
pub fn polars_err(e: Box<dyn std::error::Error>) -> PolarsError {
    PolarsError::ComputeError(e.to_string().into())
}

/// How many long-form cells were dropped by the reshaper, and why.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReshapeCounts {
    pub cells: usize,
    pub missing: usize,
    pub non_numeric: usize,
    pub non_positive: usize,
    pub kept: usize,
}

/// End-of-run bookkeeping, logged by `main`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PipelineSummary {
    pub genes: usize,
    pub samples: usize,
    pub reshape: ReshapeCounts,
    pub unmapped: usize,
    pub plotted: usize,
    pub gdr_range: Option<(f64, f64)>,
    pub pages: Vec<String>,
}
