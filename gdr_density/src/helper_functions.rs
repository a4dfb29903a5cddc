use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use polars::prelude::*;
use tracing::debug;

use crate::models::polars_err;

/// Cell texts that count as missing rather than malformed.
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Number of tab-separated fields in the header line.
pub fn count_header_fields(path: &Path) -> PolarsResult<usize> {
    let file = File::open(path).map_err(|e| polars_err(Box::new(e)))?;
    let mut rdr = BufReader::new(file);
    let mut hdr = String::new();
    rdr.read_line(&mut hdr).map_err(|e| polars_err(Box::new(e)))?;
    let hdr = hdr.trim_end_matches(['\n', '\r']);
    if hdr.is_empty() {
        return Err(polars_err("input file has no header line".into()));
    }
    Ok(hdr.split('\t').count())
}

/// Read a TSV with every column as `String`, so numeric coercion stays
/// an explicit step for the caller.
pub fn read_tsv_as_strings(path: &Path) -> PolarsResult<DataFrame> {
    let header_fields = count_header_fields(path)?;
    debug!("{} header fields in {}", header_fields, path.display());
    let dtype_override: Arc<Vec<DataType>> = Arc::new(vec![DataType::String; header_fields]);
    let na_values: Vec<PlSmallStr> = NA_TOKENS.iter().map(|s| PlSmallStr::from(*s)).collect();

    CsvReadOptions::default()
        .with_has_header(true)
        .with_dtype_overwrite(Some(dtype_override))
        .map_parse_options(|mut o| {
            o.separator = b'\t';
            o.null_values = Some(NullValues::AllColumns(na_values.clone()));
            o
        })
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
}

pub fn create_output_dir(dir: &Path) -> PolarsResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| polars_err(Box::new(e)))
}
