#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use plotters::prelude::*;

use crate::stats::ChartSeries;

const ORANGE: RGBColor = RGBColor(255, 165, 0);

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "W / D / L %".to_string(),
            x_label: "Month".to_string(),
            y_label: "%".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Render monthly W/D/L percentages as an SVG line chart
///
/// W is drawn in blue, D in orange and L in red. The y axis always spans
/// 0 to 100 percent; months are evenly spaced along the x axis in the
/// order of `series.labels`.
///
/// # Arguments
/// * `series` - Monthly percentages from [`crate::stats::Stats::series`]
/// * `options` - Chart styling options
///
/// # Returns
/// * A Result containing the SVG document or an error
///
/// # Examples
/// ```
/// use fpm::chart::{ChartOptions, render_chart};
/// use fpm::stats::ChartSeries;
///
/// let svg = render_chart(&ChartSeries::default(), &ChartOptions::default()).unwrap();
/// assert!(svg.contains("<svg"));
/// ```
pub fn render_chart(
    series: &ChartSeries,
    options: &ChartOptions,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let points = series.labels.len().max(1);
        let labels = series.labels.clone();

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(0f64..(points as f64 - 0.5).max(0.5), 0f64..100f64)?;

        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .x_labels(points)
            .x_label_formatter(&|x| {
                let idx = x.round();
                if (x - idx).abs() > f64::EPSILON || idx < 0.0 {
                    return String::new();
                }
                labels.get(idx as usize).cloned().unwrap_or_default()
            })
            .y_label_formatter(&|y| format!("{:.0}%", y))
            .draw()?;

        let lines = [
            ("W %", &series.w, BLUE),
            ("D %", &series.d, ORANGE),
            ("L %", &series.l, RED),
        ];
        for (name, values, color) in lines {
            chart
                .draw_series(LineSeries::new(
                    values.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                    &color,
                ))?
                .label(name)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
    }

    Ok(svg)
}
