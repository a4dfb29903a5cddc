use std::collections::{BTreeMap, HashSet};

use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::{SUB_COL, SUPER_POP_COL};

/// 1000 Genomes sub-population → super-population.
const DEFAULT_SUPER_POPS: &[(&str, &str)] = &[
    ("GWD", "AFR"), ("LWK", "AFR"), ("YRI", "AFR"), ("ESN", "AFR"), ("MSL", "AFR"), ("ASW", "AFR"), ("ACB", "AFR"),
    ("CEU", "EUR"), ("FIN", "EUR"), ("GBR", "EUR"), ("IBS", "EUR"), ("TSI", "EUR"),
    ("CHB", "EAS"), ("JPT", "EAS"), ("CHS", "EAS"), ("CDX", "EAS"), ("KHV", "EAS"),
    ("GIH", "SAS"), ("PJL", "SAS"), ("STU", "SAS"), ("ITU", "SAS"), ("BEB", "SAS"),
    ("MXL", "AMR"), ("PUR", "AMR"), ("CLM", "AMR"), ("PEL", "AMR"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PopulationMap(BTreeMap<String, String>);

impl Default for PopulationMap {
    fn default() -> Self {
        DEFAULT_SUPER_POPS
            .iter()
            .map(|&(sub, sup)| (sub.to_string(), sup.to_string()))
            .collect()
    }
}

impl FromIterator<(String, String)> for PopulationMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl PopulationMap {
    pub fn super_population(&self, sub: &str) -> Option<&str> {
        self.0.get(sub).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Add a nullable `SuperPop` column. Returns the frame and how many rows
/// could not be mapped; those rows stay in the frame with a null `SuperPop`.
pub fn annotate(mut df: DataFrame, map: &PopulationMap) -> PolarsResult<(DataFrame, usize)> {
    let mut unmapped_codes: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();

    let supers: Vec<Option<&str>> = df
        .column(SUB_COL)?
        .str()?
        .into_iter()
        .map(|sub| {
            let sup = sub.and_then(|s| map.super_population(s));
            if sup.is_none() {
                let code = sub.unwrap_or("<null>");
                if seen.insert(code) {
                    unmapped_codes.push(code);
                }
            }
            sup
        })
        .collect();
    let unmapped = supers.iter().filter(|s| s.is_none()).count();

    for code in &unmapped_codes {
        warn!("Sub-population '{}' has no super-population; its rows are not plotted", code);
    }
    let series = Series::new(PlSmallStr::from(SUPER_POP_COL), supers);
    df.with_column(series)?;

    info!("{} rows annotated, {} unmapped", df.height() - unmapped, unmapped);
    Ok((df, unmapped))
}

/// Distinct non-null super-populations in first-appearance order.
pub fn discovery_order(df: &DataFrame) -> PolarsResult<Vec<String>> {
    let mut seen = HashSet::new();
    let order = df
        .column(SUPER_POP_COL)?
        .str()?
        .into_iter()
        .flatten()
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect();
    Ok(order)
}
