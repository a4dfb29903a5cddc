//! plotters backend that draws vector primitives onto one printpdf page.
//!
//! Backend coordinates are "pixels" of a virtual canvas with `px_per_inch`
//! resolution, origin top-left; they are converted to PDF points (origin
//! bottom-left) on the way out. Alpha is ignored except that fully
//! transparent shapes are skipped.

use std::convert::Infallible;

use plotters_backend::text_anchor::{HPos, VPos};
use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
    FontTransform,
};
use printpdf::{Color, IndirectFontRef, Line, Mm, PdfLayerReference, Point, Pt, Rgb, TextMatrix};

const PT_PER_INCH: f64 = 72.0;
const MM_PER_PT: f64 = 25.4 / 72.0;
// Helvetica metrics, as a fraction of the font size
const AVG_GLYPH_WIDTH: f64 = 0.55;
const ASCENT: f64 = 0.78;
const CIRCLE_SEGMENTS: usize = 32;

pub struct PdfPageBackend {
    layer: PdfLayerReference,
    font: IndirectFontRef,
    size: (u32, u32),
    pt_per_px: f64,
}

pub(crate) fn mm_from_pt(pt: f64) -> Mm {
    Mm(((pt * MM_PER_PT) as f32).into())
}

fn pdf_color(color: BackendColor) -> Color {
    let (r, g, b) = color.rgb;
    Color::Rgb(Rgb::new(
        (r as f32 / 255.0).into(),
        (g as f32 / 255.0).into(),
        (b as f32 / 255.0).into(),
        None,
    ))
}

/// Width and height of `text` in backend pixels.
pub(crate) fn estimate_text_extent(text: &str, size: f64) -> (f64, f64) {
    (text.chars().count() as f64 * size * AVG_GLYPH_WIDTH, size)
}

impl PdfPageBackend {
    pub fn new(layer: PdfLayerReference, font: IndirectFontRef, size: (u32, u32), px_per_inch: f64) -> Self {
        Self {
            layer,
            font,
            size,
            pt_per_px: PT_PER_INCH / px_per_inch,
        }
    }

    fn point(&self, (x, y): (f64, f64)) -> Point {
        let page_h = self.size.1 as f64;
        Point::new(
            mm_from_pt(x * self.pt_per_px),
            mm_from_pt((page_h - y) * self.pt_per_px),
        )
    }

    fn set_stroke<S: BackendStyle>(&self, style: &S) {
        self.layer.set_outline_color(pdf_color(style.color()));
        let width = (style.stroke_width().max(1) as f64 * self.pt_per_px) as f32;
        self.layer.set_outline_thickness(width.into());
    }

    fn add_polyline(&self, points: Vec<(f64, f64)>, closed: bool, fill: bool) {
        if points.len() < 2 {
            return;
        }
        let line = Line {
            points: points.into_iter().map(|p| (self.point(p), false)).collect(),
            is_closed: closed,
            has_fill: fill,
            has_stroke: !fill,
            is_clipping_path: false,
        };
        self.layer.add_shape(line);
    }
}

fn as_f64((x, y): BackendCoord) -> (f64, f64) {
    (x as f64, y as f64)
}

impl DrawingBackend for PdfPageBackend {
    type ErrorType = Infallible;

    fn get_size(&self) -> (u32, u32) {
        self.size
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    // Nothing buffered; the owning document is saved as a whole
    fn present(&mut self) -> Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn draw_pixel(&mut self, point: BackendCoord, color: BackendColor) -> Result<(), DrawingErrorKind<Infallible>> {
        if color.alpha == 0.0 {
            return Ok(());
        }
        self.layer.set_fill_color(pdf_color(color));
        let (x, y) = as_f64(point);
        self.add_polyline(vec![(x, y), (x + 1.0, y), (x + 1.0, y + 1.0), (x, y + 1.0)], true, true);
        Ok(())
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if style.color().alpha == 0.0 {
            return Ok(());
        }
        self.set_stroke(style);
        self.add_polyline(vec![as_f64(from), as_f64(to)], false, false);
        Ok(())
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if style.color().alpha == 0.0 {
            return Ok(());
        }
        let (x0, y0) = as_f64(upper_left);
        let (x1, y1) = as_f64(bottom_right);
        if fill {
            self.layer.set_fill_color(pdf_color(style.color()));
        } else {
            self.set_stroke(style);
        }
        self.add_polyline(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)], true, fill);
        Ok(())
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if style.color().alpha == 0.0 {
            return Ok(());
        }
        self.set_stroke(style);
        self.add_polyline(path.into_iter().map(as_f64).collect(), false, false);
        Ok(())
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if style.color().alpha == 0.0 {
            return Ok(());
        }
        let (cx, cy) = as_f64(center);
        let r = radius as f64;
        let points = (0..CIRCLE_SEGMENTS)
            .map(|i| {
                let t = i as f64 / CIRCLE_SEGMENTS as f64 * std::f64::consts::TAU;
                (cx + r * t.cos(), cy + r * t.sin())
            })
            .collect();
        if fill {
            self.layer.set_fill_color(pdf_color(style.color()));
        } else {
            self.set_stroke(style);
        }
        self.add_polyline(points, true, fill);
        Ok(())
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if style.color().alpha == 0.0 {
            return Ok(());
        }
        self.layer.set_fill_color(pdf_color(style.color()));
        self.add_polyline(vert.into_iter().map(as_f64).collect(), true, true);
        Ok(())
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let color = style.color();
        if color.alpha == 0.0 || text.trim().is_empty() {
            return Ok(());
        }
        let size = style.size();
        let (w, h) = estimate_text_extent(text, size);
        let transform = style.transform();
        let (bw, bh) = match transform {
            FontTransform::Rotate90 | FontTransform::Rotate270 => (h, w),
            _ => (w, h),
        };

        let anchor = style.anchor();
        let left = pos.0 as f64
            - match anchor.h_pos {
                HPos::Left => 0.0,
                HPos::Center => bw / 2.0,
                HPos::Right => bw,
            };
        let top = pos.1 as f64
            - match anchor.v_pos {
                VPos::Top => 0.0,
                VPos::Center => bh / 2.0,
                VPos::Bottom => bh,
            };

        // Baseline origin in canvas pixels and counter-clockwise page rotation
        let ascent = size * ASCENT;
        let (ox, oy, angle) = match transform {
            FontTransform::Rotate270 => (left + ascent, top + bh, 90.0f32),
            FontTransform::Rotate90 => (left + bw - ascent, top, 270.0),
            FontTransform::Rotate180 => (left + bw, top + bh - ascent, 180.0),
            _ => (left, top + ascent, 0.0),
        };

        let x_pt = (ox * self.pt_per_px) as f32;
        let y_pt = ((self.size.1 as f64 - oy) * self.pt_per_px) as f32;
        let size_pt = (size * self.pt_per_px) as f32;

        self.layer.begin_text_section();
        self.layer.set_font(&self.font, size_pt.into());
        self.layer.set_fill_color(pdf_color(color));
        self.layer
            .set_text_matrix(TextMatrix::TranslateRotate(Pt(x_pt.into()), Pt(y_pt.into()), angle.into()));
        self.layer.write_text(text, &self.font);
        self.layer.end_text_section();
        Ok(())
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Infallible>> {
        let (w, h) = estimate_text_extent(text, style.size());
        let (w, h) = (w.ceil() as u32, h.ceil() as u32);
        Ok(match style.transform() {
            FontTransform::Rotate90 | FontTransform::Rotate270 => (h, w),
            _ => (w, h),
        })
    }
}
