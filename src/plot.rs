//! kaplan-meier overlay rendering via plotters

use std::path::Path;

use plotters::prelude::*;

use crate::error::{Result, StratError};
use crate::evaluate::RiskGroup;
use crate::km::KaplanMeier;

// low, mid, high
const GROUP_COLORS: [RGBColor; 3] = [BLUE, GREEN, RED];

// 6.4 x 4.8 inch figure at 200 dpi
const WIDTH: u32 = 1280;
const HEIGHT: u32 = 960;

fn draw_err<E: std::fmt::Display>(error: E) -> StratError {
    StratError::plot(error.to_string())
}

/// overlay one survival step curve per risk group on a single png
pub fn render_km_overlay(
    path: &Path,
    curves: &[(RiskGroup, KaplanMeier)],
    max_time: f64,
) -> Result<()> {
    let x_max = if max_time > 0.0 { max_time * 1.02 } else { 1.0 };

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("KM curves by predicted risk group", ("sans-serif", 36))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..x_max, 0f64..1.05f64)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .x_desc("Time")
        .y_desc("Survival probability")
        .axis_desc_style(("sans-serif", 22))
        .draw()
        .map_err(draw_err)?;

    for (i, (group, km)) in curves.iter().enumerate() {
        let color = GROUP_COLORS[i % GROUP_COLORS.len()];
        chart
            .draw_series(LineSeries::new(
                km.step_points(max_time),
                color.stroke_width(3),
            ))
            .map_err(draw_err)?
            .label(group.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3))
            });
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 22))
        .draw()
        .map_err(draw_err)?;

    root.present().map_err(draw_err)?;

    Ok(())
}
