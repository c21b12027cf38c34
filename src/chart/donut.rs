//! Donut (ring) charts drawn two to a picture with one legend on the right.
use crate::chart::palette_color;
use crate::chart::svg_open;
use crate::helpers::string::escape_xml;
use std::f64::consts::FRAC_PI_2;
use std::f64::consts::PI;
use std::f64::consts::TAU;

const WIDTH: u32 = 930;
const HEIGHT: u32 = 233;
const CENTERS: [f64; 2] = [165.0, 470.0];
const CENTER_Y: f64 = 130.0;
const OUTER_RADIUS: f64 = 88.0;
/// Ring width is 40% of the radius
const INNER_RADIUS: f64 = OUTER_RADIUS * 0.6;
/// Percent labels sit at 75% of the radius
const LABEL_RADIUS: f64 = OUTER_RADIUS * 0.75;
/// Slices below this share get no percent label
const MIN_LABELLED_PERCENT: f64 = 4.0;
const LEGEND_X: f64 = 660.0;
const LEGEND_ROW: f64 = 22.0;

/// One ring: a title and labelled values
#[derive(Clone, Debug, PartialEq)]
pub struct DonutChart {
    pub title: String,
    pub slices: Vec<(String, f64)>,
}

impl DonutChart {
    pub fn new(title: &str, slices: Vec<(String, f64)>) -> DonutChart {
        DonutChart {
            title: title.to_owned(),
            slices,
        }
    }

    fn total(&self) -> f64 {
        self.slices.iter().map(|(_, value)| value.max(0.0)).sum()
    }

    /// Share of each slice in percent; all zero when the total is not positive
    pub(crate) fn percentages(&self) -> Vec<f64> {
        let total = self.total();
        self.slices
            .iter()
            .map(|(_, value)| if total > 0.0 { value.max(0.0) * 100.0 / total } else { 0.0 })
            .collect()
    }
}

fn point(cx: f64, cy: f64, radius: f64, angle: f64) -> (f64, f64) {
    (cx + radius * angle.cos(), cy - radius * angle.sin())
}

/// SVG path of a ring segment from `start` to `end` (radians, counter-clockwise from +x)
pub(crate) fn wedge_path(cx: f64, cy: f64, start: f64, end: f64) -> String {
    if end - start >= TAU - 1e-9 {
        return format!(
            "M {:.1} {cy:.1} A {OUTER_RADIUS:.1} {OUTER_RADIUS:.1} 0 1 0 {:.1} {cy:.1} A {OUTER_RADIUS:.1} {OUTER_RADIUS:.1} 0 1 0 {:.1} {cy:.1} Z \
             M {:.1} {cy:.1} A {INNER_RADIUS:.1} {INNER_RADIUS:.1} 0 1 0 {:.1} {cy:.1} A {INNER_RADIUS:.1} {INNER_RADIUS:.1} 0 1 0 {:.1} {cy:.1} Z",
            cx - OUTER_RADIUS,
            cx + OUTER_RADIUS,
            cx - OUTER_RADIUS,
            cx - INNER_RADIUS,
            cx + INNER_RADIUS,
            cx - INNER_RADIUS,
        );
    }
    let large = if end - start > PI { 1 } else { 0 };
    let (x0, y0) = point(cx, cy, OUTER_RADIUS, start);
    let (x1, y1) = point(cx, cy, OUTER_RADIUS, end);
    let (x2, y2) = point(cx, cy, INNER_RADIUS, end);
    let (x3, y3) = point(cx, cy, INNER_RADIUS, start);
    format!(
        "M {x0:.1} {y0:.1} A {OUTER_RADIUS:.1} {OUTER_RADIUS:.1} 0 {large} 0 {x1:.1} {y1:.1} L {x2:.1} {y2:.1} A {INNER_RADIUS:.1} {INNER_RADIUS:.1} 0 {large} 1 {x3:.1} {y3:.1} Z"
    )
}

fn ring_svg(chart: &DonutChart, cx: f64, palette: &[String]) -> String {
    let mut svg = format!(
        r##"<text x="{cx:.1}" y="24" font-size="12" font-weight="bold" text-anchor="middle" fill="#222222">{}</text>"##,
        escape_xml(&chart.title)
    );
    let percentages = chart.percentages();
    if percentages.iter().all(|percent| *percent == 0.0) {
        svg.push_str(&format!(
            r##"<path d="{}" fill="#DDDDDD" fill-rule="evenodd"/>"##,
            wedge_path(cx, CENTER_Y, 0.0, TAU)
        ));
        return svg;
    }
    // Slices run counter-clockwise starting from twelve o'clock
    let mut start = FRAC_PI_2;
    for (index, percent) in percentages.iter().enumerate() {
        if *percent <= 0.0 {
            continue;
        }
        let end = start + TAU * percent / 100.0;
        svg.push_str(&format!(
            r#"<path class="slice" d="{}" fill="{}" fill-rule="evenodd" stroke="white" stroke-width="0.5"/>"#,
            wedge_path(cx, CENTER_Y, start, end),
            escape_xml(palette_color(palette, index))
        ));
        if *percent >= MIN_LABELLED_PERCENT {
            let (x, y) = point(cx, CENTER_Y, LABEL_RADIUS, (start + end) / 2.0);
            svg.push_str(&format!(
                r##"<text x="{x:.1}" y="{:.1}" font-size="9" text-anchor="middle" fill="#222222">{percent:.1}%</text>"##,
                y + 3.0
            ));
        }
        start = end;
    }
    svg
}

/// Two rings side by side with the legend of the one that has more slices
pub(crate) fn double_donut_svg(left: &DonutChart, right: &DonutChart, palette: &[String], font_family: &str) -> String {
    let mut svg = svg_open(WIDTH, HEIGHT, font_family);
    svg.push_str(&ring_svg(left, CENTERS[0], palette));
    svg.push_str(&ring_svg(right, CENTERS[1], palette));

    let legend = if left.slices.len() >= right.slices.len() { left } else { right };
    let top = CENTER_Y - LEGEND_ROW * legend.slices.len() as f64 / 2.0;
    for (index, (label, _)) in legend.slices.iter().enumerate() {
        let y = top + LEGEND_ROW * index as f64;
        svg.push_str(&format!(
            r##"<rect class="legend" x="{LEGEND_X}" y="{:.1}" width="12" height="12" fill="{}"/><text x="{:.1}" y="{:.1}" font-size="10" fill="#222222">{}</text>"##,
            y,
            escape_xml(palette_color(palette, index)),
            LEGEND_X + 18.0,
            y + 10.0,
            escape_xml(label)
        ));
    }
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slices(values: &[(&str, f64)]) -> Vec<(String, f64)> {
        values.iter().map(|(label, value)| (label.to_string(), *value)).collect()
    }

    #[test]
    fn quarter_wedge_starts_at_twelve_o_clock() {
        let path = wedge_path(100.0, 100.0, FRAC_PI_2, PI);
        assert!(path.starts_with("M 100.0 12.0 A 88.0 88.0 0 0 0 12.0 100.0"), "{path}");
        let full = wedge_path(100.0, 100.0, 0.0, TAU);
        assert_eq!(full.matches('Z').count(), 2);
    }

    #[test]
    fn small_slices_get_no_percent_label() {
        let chart = DonutChart::new("発行総数", slices(&[("A", 97.0), ("B", 3.0), ("C", 0.0)]));
        assert_eq!(chart.percentages(), vec![97.0, 3.0, 0.0]);
        let svg = ring_svg(&chart, 100.0, &[]);
        assert_eq!(svg.matches(r#"class="slice""#).count(), 2);
        assert!(svg.contains(">97.0%<"));
        assert!(!svg.contains(">3.0%<"));
    }

    #[test]
    fn legend_follows_the_longer_ring() {
        let palette: Vec<String> = vec!["#111111".to_owned()];
        let left = DonutChart::new("発行総数", slices(&[("A", 1.0)]));
        let right = DonutChart::new("販売総額", slices(&[("A", 1.0), ("B & C", 2.0)]));
        let svg = double_donut_svg(&left, &right, &palette, "sans-serif");
        assert_eq!(svg.matches(r#"class="legend""#).count(), 2);
        assert!(svg.contains(">B &amp; C<"));

        let empty = DonutChart::new("販売総額", Vec::new());
        let svg = double_donut_svg(&empty, &empty, &palette, "sans-serif");
        assert!(svg.contains("#DDDDDD"));
    }
}
