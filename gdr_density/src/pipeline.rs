use polars::prelude::*;
use tracing::info;

use crate::analysis::report::{gdr_range, render_super_populations};
use crate::config::PipelineConfig;
use crate::data_handling::gdr_matrix::GdrMatrix;
use crate::data_handling::population::{annotate, discovery_order};
use crate::data_handling::reshape::reshape;
use crate::models::{Dataset, PipelineSummary};

/// Long table ready for plotting, plus what it took to get there.
pub struct PreparedData {
    pub long: DataFrame,
    pub super_pops: Vec<String>,
    pub summary: PipelineSummary,
}

/// Load → normalize → reshape → annotate.
pub fn prepare(config: &PipelineConfig) -> PolarsResult<PreparedData> {
    let wide = GdrMatrix {
        path: config.input_path.clone(),
    }
    .load()?;
    let genes = wide.height();
    let samples = wide.width().saturating_sub(1);
    info!("{} genes x {} samples", genes, samples);

    let (long, reshape_counts) = reshape(&wide)?;
    drop(wide);

    let (long, unmapped) = annotate(long, &config.population_map)?;
    let super_pops = discovery_order(&long)?;
    info!("Super-populations in discovery order: {:?}", super_pops);

    let summary = PipelineSummary {
        genes,
        samples,
        reshape: reshape_counts,
        unmapped,
        plotted: long.height() - unmapped,
        gdr_range: gdr_range(&long)?,
        pages: Vec::new(),
    };

    Ok(PreparedData {
        long,
        super_pops,
        summary,
    })
}

pub fn run(config: &PipelineConfig) -> PolarsResult<PipelineSummary> {
    let PreparedData {
        long,
        super_pops,
        mut summary,
    } = prepare(config)?;

    summary.pages = render_super_populations(&long, &super_pops, config)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::population::PopulationMap;
    use crate::models::{ReshapeCounts, GDR_COL, GENE_COL, SUB_COL, SUPER_POP_COL};
    use std::io::Write;

    fn config_for(input: &std::path::Path, out: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            input_path: input.to_path_buf(),
            output_dir: out.to_path_buf(),
            population_map: vec![
                ("s1".to_string(), "AFR".to_string()),
                ("s2".to_string(), "EUR".to_string()),
            ]
            .into_iter()
            .collect::<PopulationMap>(),
            ..PipelineConfig::default()
        }
    }

    fn write_tsv(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn worked_example_yields_one_afr_curve() {
        let input = write_tsv(&[
            "gene\ts1\ts2",
            "A___1___x___y\t0.5\t",
            "B\t0.0\t",
            "A___1___x___y\t\t-1",
        ]);
        let out = tempfile::tempdir().unwrap();
        let prepared = prepare(&config_for(input.path(), out.path())).unwrap();

        assert_eq!(prepared.super_pops, vec!["AFR"]);
        assert_eq!(prepared.long.height(), 1);
        let gene = prepared.long.column(GENE_COL).unwrap().str().unwrap().get(0);
        assert_eq!(gene, Some("A___1___x"));
        let sub = prepared.long.column(SUB_COL).unwrap().str().unwrap().get(0);
        assert_eq!(sub, Some("s1"));
        assert_eq!(
            prepared.summary.reshape,
            ReshapeCounts { cells: 6, missing: 3, non_numeric: 0, non_positive: 2, kept: 1 }
        );
        assert_eq!(prepared.summary.gdr_range, Some((0.5, 0.5)));
    }

    #[test]
    fn unmapped_samples_never_reach_a_group() {
        let input = write_tsv(&[
            "gene\ts3\ts2\ts1",
            "A\t1.0\t2.0\t3.0",
            "B\t1.5\t2.5\t3.5",
        ]);
        let out = tempfile::tempdir().unwrap();
        let prepared = prepare(&config_for(input.path(), out.path())).unwrap();

        // s3 comes first in the file but has no super-population
        assert_eq!(prepared.super_pops, vec!["EUR", "AFR"]);
        assert_eq!(prepared.summary.unmapped, 2);
        assert_eq!(prepared.summary.plotted, 4);
        // the shared range still covers the unmapped values
        assert_eq!(prepared.summary.gdr_range, Some((1.0, 3.5)));

        let long = &prepared.long;
        let subs = long.column(SUB_COL).unwrap().str().unwrap();
        let sups = long.column(SUPER_POP_COL).unwrap().str().unwrap();
        let map = config_for(input.path(), out.path()).population_map;
        for (sub, sup) in subs.into_iter().zip(sups.into_iter()) {
            assert_eq!(sup, sub.and_then(|s| map.super_population(s)));
        }
        let gdr = long.column(GDR_COL).unwrap().f64().unwrap();
        assert!(gdr.into_no_null_iter().all(|v| v > 0.0));
    }

    #[test]
    fn preparation_is_deterministic() {
        let input = write_tsv(&[
            "gene\ts2\ts1",
            "A___1___x___y\t0.4\t0.9",
            "B\t0.7\tnope",
            "C\t1.1\t0.2",
        ]);
        let out = tempfile::tempdir().unwrap();
        let cfg = config_for(input.path(), out.path());
        let first = prepare(&cfg).unwrap();
        let second = prepare(&cfg).unwrap();
        assert_eq!(first.super_pops, second.super_pops);
        assert!(first.long.equals_missing(&second.long));
        assert_eq!(first.summary, second.summary);
    }

    #[test]
    fn ragged_row_aborts_loading() {
        let input = write_tsv(&["gene\ts1\ts2", "A\t0.5\t0.6\t9.9\t8.8"]);
        let out = tempfile::tempdir().unwrap();
        assert!(prepare(&config_for(input.path(), out.path())).is_err());
    }

    #[test]
    fn run_writes_one_page_and_image_per_super_population() {
        let input = write_tsv(&[
            "gene\ts2\ts1\ts3",
            "A\t0.4\t0.9\t1.0",
            "B\t0.7\t0.3\t1.5",
            "C\t1.1\t0.2\t2.0",
            "D\t0.8\t0.6\t",
        ]);
        let out = tempfile::tempdir().unwrap();
        let mut cfg = config_for(input.path(), out.path());
        cfg.plot.dpi = 50;

        let summary = run(&cfg).unwrap();
        assert_eq!(summary.pages, vec!["EUR", "AFR"]);

        let mut files: Vec<String> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(
            files,
            vec![
                "18174_GDR_DensityLine_AFR.png",
                "18174_GDR_DensityLine_EUR.png",
                "All_18174_GDR_Superpops_DensityLines.pdf",
            ]
        );
        let pdf = std::fs::read(cfg.report_path()).unwrap();
        assert!(pdf.starts_with(b"%PDF"));

        let first: Vec<Vec<u8>> = summary
            .pages
            .iter()
            .map(|sp| std::fs::read(cfg.image_path(sp)).unwrap())
            .collect();
        let again = run(&cfg).unwrap();
        assert_eq!(again.pages, summary.pages);
        for (sp, bytes) in summary.pages.iter().zip(&first) {
            assert_eq!(&std::fs::read(cfg.image_path(sp)).unwrap(), bytes);
        }
    }

    #[test]
    fn missing_input_aborts() {
        let out = tempfile::tempdir().unwrap();
        let cfg = config_for(std::path::Path::new("/no/such/file.tsv"), out.path());
        assert!(run(&cfg).is_err());
    }
}
