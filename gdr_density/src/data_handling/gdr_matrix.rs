use std::borrow::Cow;
use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, error, info};

use crate::helper_functions::read_tsv_as_strings;
use crate::models::{polars_err, Dataset, GENE_COL};

const NAME_DELIMITER: &str = "___";

/// Gene-by-sample GDR matrix: first column gene label, one column per sample.
pub struct GdrMatrix {
    pub path: PathBuf,
}

/// Truncate `A___B___C___D...` labels to their first three segments.
/// Labels with fewer than two delimiters are returned untouched.
pub fn simplify_gene_name(name: &str) -> Cow<'_, str> {
    if name.matches(NAME_DELIMITER).count() < 2 {
        return Cow::Borrowed(name);
    }
    let parts: Vec<&str> = name.split(NAME_DELIMITER).take(3).collect();
    Cow::Owned(parts.join(NAME_DELIMITER))
}

pub fn normalize_gene_names(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let names: Vec<Option<String>> = df
        .column(GENE_COL)?
        .str()?
        .into_iter()
        .map(|opt| opt.map(|s| simplify_gene_name(s).into_owned()))
        .collect();

    df.with_column(Series::new(PlSmallStr::from(GENE_COL), names))?;
    Ok(df)
}

/// The row-label column is called whatever the header says (often nothing),
/// so it is renamed by position.
fn rename_label_column(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let mut names = df.get_column_names_owned();
    match names.first_mut() {
        Some(first) => *first = GENE_COL.into(),
        None => return Err(polars_err("GDR matrix has no columns".into())),
    }
    df.set_column_names(names)?;
    Ok(df)
}

impl Dataset for GdrMatrix {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading GDR matrix from {}", self.path.display());
        let df = match read_tsv_as_strings(&self.path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read GDR matrix: {}", e);
                return Err(e);
            }
        };
        debug!("Loaded {} rows x {} cols", df.height(), df.width());

        let df = rename_label_column(df)?;
        normalize_gene_names(df)
    }
}
