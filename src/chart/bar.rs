//! Vertical bar chart for weekly series.
use crate::chart::svg_open;
use crate::helpers::string::escape_xml;
use crate::helpers::string::format_thousands;

const WIDTH: u32 = 866;
const HEIGHT: u32 = 218;
const LEFT: f64 = 58.0;
const RIGHT: f64 = 16.0;
const TOP: f64 = 30.0;
const BOTTOM: f64 = 26.0;
/// Share of a bar slot covered by the bar
const BAR_FILL: f64 = 0.7;

/// One bar per label, drawn in a single color
#[derive(Clone, Debug, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub y_caption: String,
    /// X tick labels, e.g. `2/9週`
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub color: String,
}

/// Tick step giving about four intervals up to `max` (1, 2 or 5 times a power of ten)
pub(crate) fn tick_step(max: f64) -> f64 {
    if max <= 0.0 {
        return 1.0;
    }
    let raw = max / 4.0;
    let magnitude = 10f64.powf(raw.log10().floor());
    let residual = raw / magnitude;
    let factor = if residual <= 1.0 {
        1.0
    } else if residual <= 2.0 {
        2.0
    } else if residual <= 5.0 {
        5.0
    } else {
        10.0
    };
    (factor * magnitude).max(1.0)
}

impl BarChart {
    pub(crate) fn to_svg(&self, font_family: &str) -> String {
        let plot_width = WIDTH as f64 - LEFT - RIGHT;
        let plot_height = HEIGHT as f64 - TOP - BOTTOM;
        let baseline = TOP + plot_height;
        let max = self.values.iter().copied().fold(0.0, f64::max);
        let step = tick_step(max);
        let top_value = ((max / step).ceil() * step).max(step);
        let scale = |value: f64| baseline - value.max(0.0) / top_value * plot_height;

        let mut svg = svg_open(WIDTH, HEIGHT, font_family);
        svg.push_str(&format!(
            r##"<text x="{}" y="18" font-size="13" font-weight="bold" text-anchor="middle" fill="#222222">{}</text>"##,
            WIDTH / 2,
            escape_xml(&self.title)
        ));
        svg.push_str(&format!(
            r##"<text x="14" y="{y}" font-size="10" text-anchor="middle" fill="#333333" transform="rotate(-90 14 {y})">{}</text>"##,
            escape_xml(&self.y_caption),
            y = TOP + plot_height / 2.0
        ));

        let mut tick = 0.0;
        while tick <= top_value + step / 2.0 {
            let y = scale(tick);
            svg.push_str(&format!(
                r##"<line x1="{LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#000000" stroke-opacity="0.15"/>"##,
                LEFT + plot_width
            ));
            svg.push_str(&format!(
                r##"<text x="{:.1}" y="{:.1}" font-size="9" text-anchor="end" fill="#333333">{}</text>"##,
                LEFT - 4.0,
                y + 3.0,
                format_thousands(tick as i64)
            ));
            tick += step;
        }

        let count = self.values.len().max(1) as f64;
        let slot = plot_width / count;
        for (index, value) in self.values.iter().enumerate() {
            let center = LEFT + slot * (index as f64 + 0.5);
            let width = slot * BAR_FILL;
            let y = scale(*value);
            svg.push_str(&format!(
                r#"<rect class="bar" x="{:.1}" y="{y:.1}" width="{width:.1}" height="{:.1}" fill="{}"/>"#,
                center - width / 2.0,
                baseline - y,
                escape_xml(&self.color)
            ));
            if *value > 0.0 {
                svg.push_str(&format!(
                    r##"<text x="{center:.1}" y="{:.1}" font-size="8" text-anchor="middle" fill="#333333">{}</text>"##,
                    y - 3.0,
                    format_thousands(value.trunc() as i64)
                ));
            }
            if let Some(label) = self.labels.get(index) {
                svg.push_str(&format!(
                    r##"<text x="{center:.1}" y="{:.1}" font-size="9" text-anchor="middle" fill="#333333">{}</text>"##,
                    baseline + 15.0,
                    escape_xml(label)
                ));
            }
        }
        svg.push_str(&format!(
            r##"<line x1="{LEFT}" y1="{TOP}" x2="{LEFT}" y2="{baseline}" stroke="#333333"/><line x1="{LEFT}" y1="{baseline}" x2="{:.1}" y2="{baseline}" stroke="#333333"/>"##,
            LEFT + plot_width
        ));
        svg.push_str("</svg>");
        svg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_steps_are_round_numbers() {
        assert_eq!(tick_step(0.0), 1.0);
        assert_eq!(tick_step(3.0), 1.0);
        assert_eq!(tick_step(40.0), 10.0);
        assert_eq!(tick_step(70.0), 20.0);
        assert_eq!(tick_step(1_234.0), 500.0);
    }

    #[test]
    fn one_bar_per_value_with_labels() {
        let chart = BarChart {
            title: "購入数 <週次>".to_owned(),
            y_caption: "件".to_owned(),
            labels: vec!["2/2週".to_owned(), "2/9週".to_owned(), "2/16週".to_owned()],
            values: vec![1_500.0, 0.0, 20.0],
            color: "#34A853".to_owned(),
        };
        let svg = chart.to_svg("sans-serif");
        assert_eq!(svg.matches(r#"class="bar""#).count(), 3);
        assert!(svg.contains(">1,500<"));
        assert!(svg.contains(">2/16週<"));
        assert!(svg.contains("購入数 &lt;週次&gt;"));
        assert!(svg.ends_with("</svg>"));
    }
}
