use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;

use crate::scope::error::ScopeError;

/// One channel's plottable data: the scaled samples as acquired, plus the
/// smoothed series when the operator asked for it.
#[derive(Clone, Debug)]
pub struct ChannelTrace {
    pub label: String,
    pub time: Vec<f64>,
    pub voltage: Vec<f64>,
    pub smoothed: Option<Vec<f64>>,
}

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            background: WHITE,
            palette: vec![BLUE, RED, GREEN, MAGENTA],
        }
    }
}

/// Renders every acquired trace into one PNG. Raw samples draw as a line, or
/// as dots under the smoothed line when a smoothed series is present.
pub fn render_acquisition_png(
    traces: &[ChannelTrace],
    style: PlotStyle,
) -> Result<Vec<u8>, ScopeError> {
    if traces.is_empty() || traces.iter().all(|t| t.time.is_empty()) {
        return Err(ScopeError::Plot("no traces to render".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let (x_bounds, y_bounds) = axis_bounds(traces);
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption("Acquired data", ("sans-serif", 24).into_font())
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(x_bounds.0..x_bounds.1, y_bounds.0..y_bounds.1)?;
        chart
            .configure_mesh()
            .light_line_style(&BLACK.mix(0.1))
            .draw()?;
        for (idx, trace) in traces.iter().enumerate() {
            let color = style.palette[idx % style.palette.len()];
            match &trace.smoothed {
                Some(smoothed) => {
                    chart.draw_series(
                        trace
                            .time
                            .iter()
                            .zip(&trace.voltage)
                            .map(|(&x, &y)| Circle::new((x, y), 1, color.mix(0.4).filled())),
                    )?;
                    chart
                        .draw_series(LineSeries::new(
                            trace.time.iter().copied().zip(smoothed.iter().copied()),
                            color.stroke_width(2),
                        ))?
                        .label(trace.label.clone())
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], color)
                        });
                }
                None => {
                    chart
                        .draw_series(LineSeries::new(
                            trace.time.iter().copied().zip(trace.voltage.iter().copied()),
                            &color,
                        ))?
                        .label(trace.label.clone())
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], color)
                        });
                }
            }
        }
        chart
            .configure_series_labels()
            .border_style(&BLACK.mix(0.2))
            .background_style(&style.background.mix(0.8))
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn axis_bounds(traces: &[ChannelTrace]) -> ((f64, f64), (f64, f64)) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for trace in traces {
        for &x in &trace.time {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
        }
        for &y in &trace.voltage {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }
    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 0.5;
        x_max += 0.5;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }
    ((x_min, x_max), (y_min, y_max))
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ScopeError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| ScopeError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> ChannelTrace {
        ChannelTrace {
            label: "CH1".to_string(),
            time: (0..n).map(|i| i as f64 * 1e-6).collect(),
            voltage: (0..n).map(|i| i as f64 * 0.04).collect(),
            smoothed: None,
        }
    }

    #[test]
    fn rendering_returns_png_bytes() {
        let png = render_acquisition_png(&[ramp(64)], PlotStyle::default()).unwrap();
        assert!(!png.is_empty());
        // PNG magic.
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn smoothed_traces_render_too() {
        let mut trace = ramp(64);
        trace.smoothed = Some(trace.voltage.clone());
        let png = render_acquisition_png(&[trace], PlotStyle::default()).unwrap();
        assert!(!png.is_empty());
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = render_acquisition_png(&[], PlotStyle::default()).unwrap_err();
        assert!(matches!(err, ScopeError::Plot(_)));
    }
}
