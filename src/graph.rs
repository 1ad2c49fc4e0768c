//! History graph rendering.
//!
//! Plots the gap in hours between consecutive records; the first record is
//! measured against a 48-hour baseline so a single entry still produces a
//! point. Drawn with plotters into an RGB buffer and PNG-encoded with
//! `image`. No text is drawn inside the bitmap (no bundled font); the
//! activity title travels as the photo caption instead.

use chrono::{Duration, NaiveDateTime};
use plotters::prelude::*;
use teledate_core::error::TeledateError;
use teledate_core::timefmt;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// Baseline gap assumed before the first record, in hours.
const FIRST_GAP_HOURS: i64 = 48;

/// Render the user's record history as a PNG line graph.
pub fn render_history_graph(records: &[NaiveDateTime]) -> Result<Vec<u8>, TeledateError> {
    let gaps = gap_series(records);
    if gaps.is_empty() {
        return Err(TeledateError::Render("no records to plot".into()));
    }

    let x_max = (gaps.len() - 1).max(1) as i32;
    let y_max = gaps.iter().copied().max().unwrap_or(0) + 1;

    let mut buf = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| TeledateError::Render(e.to_string()))?;

        let mut chart = ChartBuilder::on(&root)
            .margin(24)
            .build_cartesian_2d(0..x_max, 0..y_max)
            .map_err(|e| TeledateError::Render(e.to_string()))?;

        let points: Vec<(i32, i64)> = gaps
            .iter()
            .enumerate()
            .map(|(i, &gap)| (i as i32, gap))
            .collect();

        chart
            .draw_series(LineSeries::new(points.iter().copied(), &BLUE))
            .map_err(|e| TeledateError::Render(e.to_string()))?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&point| Circle::new(point, 4, BLUE.filled())),
            )
            .map_err(|e| TeledateError::Render(e.to_string()))?;

        root.present()
            .map_err(|e| TeledateError::Render(e.to_string()))?;
    }

    let img = image::RgbImage::from_raw(WIDTH, HEIGHT, buf)
        .ok_or_else(|| TeledateError::Render("bitmap buffer size mismatch".into()))?;

    let mut png = std::io::Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| TeledateError::Render(format!("PNG encoding failed: {e}")))?;

    Ok(png.into_inner())
}

/// Hours between consecutive records, in display time, whole hours.
fn gap_series(records: &[NaiveDateTime]) -> Vec<i64> {
    let mut gaps = Vec::with_capacity(records.len());
    let mut prev: Option<NaiveDateTime> = None;
    for &record in records {
        let shown = timefmt::to_display(record);
        let baseline = prev.unwrap_or(shown - Duration::hours(FIRST_GAP_HOURS));
        gaps.push((shown - baseline).num_seconds().div_euclid(3600));
        prev = Some(shown);
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_gap_series_first_uses_baseline() {
        assert_eq!(gap_series(&[dt(1, 12)]), vec![48]);
    }

    #[test]
    fn test_gap_series_consecutive() {
        let gaps = gap_series(&[dt(1, 0), dt(2, 0), dt(2, 12), dt(5, 12)]);
        assert_eq!(gaps, vec![48, 24, 12, 72]);
    }

    #[test]
    fn test_gap_series_floors_partial_hours() {
        let records = [
            dt(1, 0),
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(1, 59, 0)
                .unwrap(),
        ];
        assert_eq!(gap_series(&records), vec![48, 1]);
    }

    #[test]
    fn test_render_returns_png() {
        let png = render_history_graph(&[dt(1, 0), dt(2, 6), dt(3, 9)]).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[test]
    fn test_render_single_record() {
        let png = render_history_graph(&[dt(1, 0)]).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[test]
    fn test_render_empty_fails() {
        assert!(render_history_graph(&[]).is_err());
    }
}
