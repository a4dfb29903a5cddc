//! Output side of the pipeline: the multi-page PDF report and the per
//! super-population PNG images.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{imageops, Rgb, RgbImage};
use plotters::prelude::*;
use polars::lazy::dsl::*;
use polars::prelude::*;
use printpdf::{BuiltinFont, IndirectFontRef, PdfDocument, PdfDocumentReference};
use tracing::{debug, error, info, warn};

use crate::analysis::density_plot::{draw_density_page, page_title, DensityPage};
use crate::analysis::kde::{gaussian_kde, KdeCurve};
use crate::analysis::pdf_backend::{mm_from_pt, PdfPageBackend};
use crate::config::{PipelineConfig, PlotSettings};
use crate::helper_functions::create_output_dir;
use crate::models::{polars_err, GDR_COL, SUB_COL, SUPER_POP_COL};

/// Virtual resolution of report pages; matches a 100-dpi figure.
pub const PDF_PX_PER_INCH: f64 = 100.0;
/// `bbox_inches='tight'` padding
const TIGHT_PAD_IN: f64 = 0.1;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

fn pdf_err<E: std::fmt::Debug>(e: E) -> PolarsError {
    polars_err(format!("PDF error: {:?}", e).into())
}

/// Multi-page PDF, one page per super-population.
///
/// The target file is opened up front so an unwritable location fails before
/// any drawing. Pages drawn before an error are still written when the
/// report is dropped without `finish`.
pub struct DensityReport {
    doc: Option<PdfDocumentReference>,
    writer: BufWriter<File>,
    font: IndirectFontRef,
    path: PathBuf,
    page_px: (u32, u32),
    pages: usize,
}

impl DensityReport {
    pub fn create(path: &Path, settings: &PlotSettings) -> PolarsResult<Self> {
        let file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
        let doc = PdfDocument::empty("GDR density by super-population");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
        let page_px = (
            (settings.width_in * PDF_PX_PER_INCH).round() as u32,
            (settings.height_in * PDF_PX_PER_INCH).round() as u32,
        );
        debug!("Opened report {} ({}x{} px pages)", path.display(), page_px.0, page_px.1);

        Ok(Self {
            doc: Some(doc),
            writer: BufWriter::new(file),
            font,
            path: path.to_path_buf(),
            page_px,
            pages: 0,
        })
    }

    /// Append a blank page and hand back a backend drawing onto it.
    pub fn add_page(&mut self, name: &str) -> PolarsResult<PdfPageBackend> {
        let doc = self
            .doc
            .as_ref()
            .ok_or_else(|| polars_err("report already saved".into()))?;
        let to_pt = 72.0 / PDF_PX_PER_INCH;
        let (page, layer) = doc.add_page(
            mm_from_pt(self.page_px.0 as f64 * to_pt),
            mm_from_pt(self.page_px.1 as f64 * to_pt),
            name,
        );
        let layer = doc.get_page(page).get_layer(layer);
        self.pages += 1;
        Ok(PdfPageBackend::new(layer, self.font.clone(), self.page_px, PDF_PX_PER_INCH))
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Write the document and close the file. Returns the page count.
    pub fn finish(mut self) -> PolarsResult<usize> {
        self.save()?;
        Ok(self.pages)
    }

    fn save(&mut self) -> PolarsResult<()> {
        let Some(doc) = self.doc.take() else {
            return Ok(());
        };
        if self.pages == 0 {
            // printpdf cannot write a page-less document
            warn!("No pages rendered; removing empty report {}", self.path.display());
            return std::fs::remove_file(&self.path).map_err(|e| polars_err(Box::new(e)));
        }
        doc.save(&mut self.writer).map_err(pdf_err)?;
        self.writer.flush().map_err(|e| polars_err(Box::new(e)))?;
        info!("Report with {} page(s) written to {}", self.pages, self.path.display());
        Ok(())
    }
}

impl Drop for DensityReport {
    fn drop(&mut self) {
        if self.doc.is_some() {
            warn!("Report {} closed early; saving {} page(s)", self.path.display(), self.pages);
            if let Err(e) = self.save() {
                error!("Failed to save report {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Bounding box of every pixel that differs from `background`, grown by
/// `pad` pixels and clamped to the image. `None` for a blank image.
pub fn content_bounds(img: &RgbImage, background: Rgb<u8>, pad: u32) -> Option<(u32, u32, u32, u32)> {
    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, pixel) in img.enumerate_pixels() {
        if *pixel != background {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
    }
    if x0 == u32::MAX {
        return None;
    }
    let left = x0.saturating_sub(pad);
    let top = y0.saturating_sub(pad);
    let right = (x1 + pad).min(img.width() - 1);
    let bottom = (y1 + pad).min(img.height() - 1);
    Some((left, top, right - left + 1, bottom - top + 1))
}

pub fn crop_to_content(img: &RgbImage, pad: u32) -> RgbImage {
    match content_bounds(img, BACKGROUND, pad) {
        Some((x, y, w, h)) => imageops::crop_imm(img, x, y, w, h).to_image(),
        None => img.clone(),
    }
}

/// Render `page` at the configured DPI into memory, crop it tightly and
/// write it as PNG. The pixel buffer lives only for this call.
pub fn export_png(path: &Path, page: &DensityPage, settings: &PlotSettings) -> PolarsResult<()> {
    let dpi = settings.dpi as f64;
    let (w, h) = (
        (settings.width_in * dpi).round() as u32,
        (settings.height_in * dpi).round() as u32,
    );
    let mut buf = vec![0u8; w as usize * h as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (w, h)).into_drawing_area();
        draw_density_page(root, page, dpi)?;
    }

    let img = RgbImage::from_raw(w, h, buf)
        .ok_or_else(|| polars_err("bitmap buffer has the wrong size".into()))?;
    let cropped = crop_to_content(&img, (TIGHT_PAD_IN * dpi).round() as u32);
    debug!("Cropped {}x{} to {}x{}", w, h, cropped.width(), cropped.height());
    cropped.save(path).map_err(|e| polars_err(Box::new(e)))?;
    info!("Image written to {}", path.display());
    Ok(())
}

/// Global `[min, max]` of GDR over the whole long table.
pub fn gdr_range(long: &DataFrame) -> PolarsResult<Option<(f64, f64)>> {
    let gdr = long.column(GDR_COL)?.f64()?;
    Ok(match (gdr.min(), gdr.max()) {
        (Some(lo), Some(hi)) => Some((lo, hi)),
        _ => None,
    })
}

/// GDR values of each sub-population, in first-appearance order.
pub fn values_by_sub(subset: &DataFrame) -> PolarsResult<Vec<(String, Vec<f64>)>> {
    let subs = subset.column(SUB_COL)?.str()?;
    let gdr = subset.column(GDR_COL)?.f64()?;

    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (sub, value) in subs.into_iter().zip(gdr.into_iter()) {
        let (Some(sub), Some(value)) = (sub, value) else {
            continue;
        };
        let idx = *index.entry(sub).or_insert_with(|| {
            groups.push((sub.to_string(), Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(value);
    }
    Ok(groups)
}

/// One KDE per sub-population; samples with no spread are skipped.
pub fn sub_curves(subset: &DataFrame, settings: &PlotSettings) -> PolarsResult<Vec<(String, KdeCurve)>> {
    let mut curves = Vec::new();
    for (sub, values) in values_by_sub(subset)? {
        match gaussian_kde(&values, settings) {
            Some(curve) => {
                debug!("{}: n={}, bandwidth={:.4}", sub, values.len(), curve.bandwidth);
                curves.push((sub, curve));
            }
            None => warn!(
                "{} has {} value(s) with zero variance; skipping density estimate",
                sub,
                values.len()
            ),
        }
    }
    Ok(curves)
}

/// Draw every super-population into the report and as a standalone PNG.
/// Returns the rendered super-populations in page order.
pub fn render_super_populations(
    long: &DataFrame,
    order: &[String],
    config: &PipelineConfig,
) -> PolarsResult<Vec<String>> {
    let Some(x_range) = gdr_range(long)? else {
        warn!("No GDR values left after filtering; nothing to plot");
        return Ok(Vec::new());
    };
    info!("Shared x-range: [{:.4}, {:.4}]", x_range.0, x_range.1);

    create_output_dir(&config.output_dir)?;
    let mut report = DensityReport::create(&config.report_path(), &config.plot)?;
    let mut rendered = Vec::with_capacity(order.len());

    for super_pop in order {
        let subset = long
            .clone()
            .lazy()
            .filter(col(SUPER_POP_COL).eq(lit(super_pop.as_str())))
            .collect()?;
        let curves = sub_curves(&subset, &config.plot)?;
        info!("{}: {} rows, {} curve(s)", super_pop, subset.height(), curves.len());

        let page = DensityPage {
            super_pop,
            curves: &curves,
            x_range,
            line_width: config.plot.line_width,
        };

        let backend = report.add_page(&page_title(super_pop))?;
        draw_density_page(backend.into_drawing_area(), &page, PDF_PX_PER_INCH)?;
        export_png(&config.image_path(super_pop), &page, &config.plot)?;

        rendered.push(super_pop.clone());
    }

    debug!("{} page(s) queued in {}", report.page_count(), config.report_path().display());
    report.finish()?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GENE_COL;

    fn curve_for(values: &[f64]) -> KdeCurve {
        gaussian_kde(values, &PlotSettings::default()).unwrap()
    }

    #[test]
    fn bounds_cover_content_plus_padding() {
        let mut img = RgbImage::from_pixel(100, 80, BACKGROUND);
        img.put_pixel(20, 30, Rgb([0, 0, 0]));
        img.put_pixel(60, 50, Rgb([10, 20, 30]));

        assert_eq!(content_bounds(&img, BACKGROUND, 5), Some((15, 25, 51, 31)));
        let cropped = crop_to_content(&img, 5);
        assert_eq!(cropped.dimensions(), (51, 31));
        assert_eq!(cropped.get_pixel(5, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn padding_is_clamped_to_the_image() {
        let mut img = RgbImage::from_pixel(10, 10, BACKGROUND);
        img.put_pixel(0, 9, Rgb([0, 0, 0]));
        assert_eq!(content_bounds(&img, BACKGROUND, 3), Some((0, 6, 4, 4)));
    }

    #[test]
    fn blank_image_is_left_alone() {
        let img = RgbImage::from_pixel(8, 4, BACKGROUND);
        assert_eq!(content_bounds(&img, BACKGROUND, 2), None);
        assert_eq!(crop_to_content(&img, 2).dimensions(), (8, 4));
    }

    #[test]
    fn groups_follow_first_appearance() {
        let df = df![
            SUB_COL => &["YRI", "CEU", "YRI", "GBR", "CEU"],
            GDR_COL => &[0.1, 0.2, 0.3, 0.4, 0.5],
        ]
        .unwrap();
        let groups = values_by_sub(&df).unwrap();
        let names: Vec<&str> = groups.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(names, vec!["YRI", "CEU", "GBR"]);
        assert_eq!(groups[0].1, vec![0.1, 0.3]);
        assert_eq!(groups[1].1, vec![0.2, 0.5]);
    }

    #[test]
    fn single_value_groups_get_no_curve() {
        let df = df![
            SUB_COL => &["YRI", "CEU", "YRI"],
            GDR_COL => &[0.1, 0.2, 0.3],
        ]
        .unwrap();
        let curves = sub_curves(&df, &PlotSettings::default()).unwrap();
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].0, "YRI");
    }

    #[test]
    fn range_spans_the_whole_table() {
        let df = df![
            GENE_COL => &["A", "B", "C"],
            SUB_COL => &["YRI", "CEU", "XXX"],
            GDR_COL => &[0.3, 0.2, 7.5],
            SUPER_POP_COL => &[Some("AFR"), Some("EUR"), None],
        ]
        .unwrap();
        assert_eq!(gdr_range(&df).unwrap(), Some((0.2, 7.5)));

        let empty = df.head(Some(0));
        assert_eq!(gdr_range(&empty).unwrap(), None);
    }

    #[test]
    fn report_writes_one_page_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let settings = PlotSettings::default();
        let curves = vec![
            ("YRI".to_string(), curve_for(&[0.1, 0.2, 0.25, 0.4])),
            ("LWK".to_string(), curve_for(&[0.3, 0.35, 0.5, 0.9])),
        ];

        let mut report = DensityReport::create(&path, &settings).unwrap();
        for super_pop in ["AFR", "EUR"] {
            let page = DensityPage {
                super_pop,
                curves: &curves,
                x_range: (0.1, 0.9),
                line_width: settings.line_width,
            };
            let backend = report.add_page(super_pop).unwrap();
            draw_density_page(backend.into_drawing_area(), &page, PDF_PX_PER_INCH).unwrap();
        }
        assert_eq!(report.page_count(), 2);
        assert_eq!(report.finish().unwrap(), 2);

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn dropped_report_still_saves_its_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.pdf");
        {
            let mut report = DensityReport::create(&path, &PlotSettings::default()).unwrap();
            let page = DensityPage { super_pop: "AFR", curves: &[], x_range: (0.0, 1.0), line_width: 2.0 };
            let backend = report.add_page("AFR").unwrap();
            draw_density_page(backend.into_drawing_area(), &page, PDF_PX_PER_INCH).unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_report_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        let report = DensityReport::create(&path, &PlotSettings::default()).unwrap();
        assert_eq!(report.finish().unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_report_location_fails_early() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.pdf");
        assert!(DensityReport::create(&path, &PlotSettings::default()).is_err());
    }

    #[test]
    fn png_export_is_cropped_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PlotSettings { dpi: 100, ..PlotSettings::default() };
        let curves = vec![("YRI".to_string(), curve_for(&[0.1, 0.2, 0.25, 0.4]))];
        let page = DensityPage { super_pop: "AFR", curves: &curves, x_range: (0.1, 0.4), line_width: 2.0 };

        let first = dir.path().join("a.png");
        let second = dir.path().join("b.png");
        export_png(&first, &page, &settings).unwrap();
        export_png(&second, &page, &settings).unwrap();

        let a = image::open(&first).unwrap().to_rgb8();
        let b = image::open(&second).unwrap().to_rgb8();
        assert!(a.width() <= 1000 && a.height() <= 600);
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
