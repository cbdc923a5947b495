//! Chart rendering for telemetry reports
//!
//! Charts are written as SVG. Two shapes cover every report: a labelled bar
//! chart and a grid of line panels (small multiples, side-by-side, or a
//! single panel with several series).

use crate::errors::{FlapError, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

const FONT: &str = "sans-serif";

/// One named line in a panel
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    pub fn new(name: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Series indexed by position: `(0, v0), (1, v1), ...`
    pub fn indexed(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(
            name,
            values.iter().enumerate().map(|(i, v)| (i as f64, *v)).collect(),
        )
    }
}

/// One chart within a grid
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl Panel {
    pub fn new(title: impl Into<String>, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            series: Vec::new(),
        }
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        let points = self.series.iter().flat_map(|s| s.points.iter());
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for &(x, y) in points {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
        (padded(x_min, x_max), padded(y_min.min(0.0), y_max))
    }
}

/// Widen a range so it is never empty and leaves headroom at the top
fn padded(min: f64, max: f64) -> (f64, f64) {
    if min > max {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    (min, max + (max - min) * 0.05)
}

/// Draw a bar chart with one labelled bar per entry
pub fn bar_chart(path: &Path, title: &str, x_label: &str, y_label: &str, bars: &[(String, f64)]) -> Result<()> {
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(FlapError::plot)?;

    let y_max = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let (_, y_max) = padded(0.0, y_max);
    let labels: Vec<String> = bars.iter().map(|(name, _)| name.clone()).collect();

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d((0..bars.len().max(1)).into_segmented(), 0f64..y_max)
        .map_err(FlapError::plot)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len().max(1))
        .x_label_formatter(&|value| match value {
            SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()
        .map_err(FlapError::plot)?;

    let fill = Palette99::pick(0).to_rgba().filled();
    chart
        .draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *value)],
                fill,
            );
            bar.set_margin(0, 0, 8, 8);
            bar
        }))
        .map_err(FlapError::plot)?;

    root.present().map_err(FlapError::plot)?;
    Ok(())
}

/// Render rows of text as a bordered table under a shaded header row
pub fn table(path: &Path, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    const CELL_W: i32 = 200;
    const CELL_H: i32 = 30;
    const MARGIN: i32 = 20;

    let cols = headers.len().max(1) as i32;
    let size = (
        (cols * CELL_W + 2 * MARGIN) as u32,
        ((rows.len() as i32 + 1) * CELL_H + 2 * MARGIN) as u32,
    );
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(FlapError::plot)?;

    let centered = TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    let header_cells = std::iter::once(headers.iter().map(|h| h.to_string()).collect::<Vec<_>>());
    for (r, cells) in header_cells.chain(rows.iter().cloned()).enumerate() {
        let top = MARGIN + r as i32 * CELL_H;
        for (c, text) in cells.iter().enumerate() {
            let left = MARGIN + c as i32 * CELL_W;
            let corners = [(left, top), (left + CELL_W, top + CELL_H)];
            if r == 0 {
                root.draw(&Rectangle::new(corners, RGBColor(230, 230, 230).filled()))
                    .map_err(FlapError::plot)?;
            }
            root.draw(&Rectangle::new(corners, BLACK.stroke_width(1)))
                .map_err(FlapError::plot)?;
            root.draw(&Text::new(text.clone(), (left + CELL_W / 2, top + CELL_H / 2), centered.clone()))
                .map_err(FlapError::plot)?;
        }
    }

    root.present().map_err(FlapError::plot)?;
    Ok(())
}

/// Draw panels on a grid with `cols` columns, under an optional overall title
///
/// Colors continue across panels so small multiples stay distinguishable.
pub fn line_panels(path: &Path, title: Option<&str>, panels: &[Panel], cols: usize) -> Result<()> {
    let cols = cols.max(1).min(panels.len().max(1));
    let rows = panels.len().div_ceil(cols).max(1);
    let size = ((cols * 560) as u32, (rows * 340 + 40) as u32);

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(FlapError::plot)?;
    let body = match title {
        Some(title) => root.titled(title, (FONT, 24)).map_err(FlapError::plot)?,
        None => root.clone(),
    };

    let mut color_index = 0;
    for (area, panel) in body.split_evenly((rows, cols)).iter().zip(panels) {
        draw_panel(area, panel, color_index)?;
        color_index += panel.series.len();
    }

    root.present().map_err(FlapError::plot)?;
    Ok(())
}

fn draw_panel(area: &DrawingArea<SVGBackend<'_>, Shift>, panel: &Panel, first_color: usize) -> Result<()> {
    let ((x_min, x_max), (y_min, y_max)) = panel.bounds();

    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, (FONT, 18))
        .margin(12)
        .x_label_area_size(36)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(FlapError::plot)?;

    chart
        .configure_mesh()
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .draw()
        .map_err(FlapError::plot)?;

    for (offset, series) in panel.series.iter().enumerate() {
        let color = Palette99::pick(first_color + offset).to_rgba();
        let style = color.stroke_width(2);

        chart
            .draw_series(LineSeries::new(series.points.iter().copied(), style))
            .map_err(FlapError::plot)?
            .label(series.name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        chart
            .draw_series(series.points.iter().map(|&p| Circle::new(p, 3, color.filled())))
            .map_err(FlapError::plot)?;
    }

    if panel.series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(FlapError::plot)?;
    }
    Ok(())
}
