use polars::lazy::dsl::*;
use polars::prelude::*;
use tracing::{debug, info};

use crate::models::{ReshapeCounts, GDR_COL, GENE_COL, SUB_COL};

/// Wide → long: one row per (gene, sample), sample-major like pandas `melt`.
/// `GDR` is still the raw cell text at this point.
pub fn melt_samples(df: &DataFrame) -> PolarsResult<DataFrame> {
    let genes = df.column(GENE_COL)?.str()?;
    let sample_cols: Vec<&Column> = df
        .get_columns()
        .iter()
        .filter(|c| c.name().as_str() != GENE_COL)
        .collect();

    let n = genes.len() * sample_cols.len();
    let mut gene_out: Vec<Option<&str>> = Vec::with_capacity(n);
    let mut sub_out: Vec<&str> = Vec::with_capacity(n);
    let mut gdr_out: Vec<Option<&str>> = Vec::with_capacity(n);

    for column in &sample_cols {
        let sub = column.name().as_str();
        let values = column.str()?;
        for (gene, value) in genes.into_iter().zip(values.into_iter()) {
            gene_out.push(gene);
            sub_out.push(sub);
            gdr_out.push(value);
        }
    }

    DataFrame::new(vec![
        Column::from(Series::new(PlSmallStr::from(GENE_COL), gene_out)),
        Column::from(Series::new(PlSmallStr::from(SUB_COL), sub_out)),
        Column::from(Series::new(PlSmallStr::from(GDR_COL), gdr_out)),
    ])
}

/// Melt, then keep only cells holding a finite GDR strictly above zero.
/// Zero is dropped together with negatives: it means "no measurable ratio".
pub fn reshape(df: &DataFrame) -> PolarsResult<(DataFrame, ReshapeCounts)> {
    let long = melt_samples(df)?;
    let cells = long.height();

    let present = long.lazy().filter(col(GDR_COL).is_not_null()).collect()?;
    let missing = cells - present.height();

    // Non-strict cast: unparseable text becomes null, NaN/inf fail is_finite
    let numeric = present
        .lazy()
        .with_column(col(GDR_COL).cast(DataType::Float64))
        .filter(col(GDR_COL).is_finite())
        .collect()?;
    let non_numeric = cells - missing - numeric.height();

    let positive = numeric
        .lazy()
        .filter(col(GDR_COL).gt(lit(0.0)))
        .collect()?;
    let non_positive = cells - missing - non_numeric - positive.height();

    let counts = ReshapeCounts {
        cells,
        missing,
        non_numeric,
        non_positive,
        kept: positive.height(),
    };
    debug!("Reshape counts: {:?}", counts);
    info!(
        "Long table: {} of {} cells kept ({} missing, {} non-numeric, {} <= 0)",
        counts.kept, counts.cells, counts.missing, counts.non_numeric, counts.non_positive
    );

    Ok((positive, counts))
}
