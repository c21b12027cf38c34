//! # Chart rendering
//!
//! Charts are composed as SVG markup and rasterized to PNG with `resvg`:
//!
//! - [`bar`] weekly series as labelled bars
//! - [`donut`] side-by-side proportion rings with a shared legend
use crate::config::ChartConfig;
use crate::error::ReportError;
use resvg::tiny_skia;
use resvg::usvg;
use resvg::usvg::fontdb;
use std::sync::Arc;
use thiserror::Error;

pub mod bar;
pub mod donut;

pub use bar::BarChart;
pub use donut::DonutChart;

/// Errors raised while rasterizing charts
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Cannot allocate a {0}x{1} canvas")]
    CanvasError(u32, u32),

    #[error("PNG encoding failed: {0}")]
    EncodeError(String),
}

/// Renders charts to PNG bytes with a shared font database
pub struct ChartRenderer {
    options: usvg::Options<'static>,
    font_family: String,
    palette: Vec<String>,
}

impl ChartRenderer {
    /// Loads the system fonts plus the configured font directories
    pub fn new(config: &ChartConfig) -> ChartRenderer {
        let mut database = fontdb::Database::new();
        database.load_system_fonts();
        for directory in &config.font_dirs {
            database.load_fonts_dir(directory);
        }
        log::debug!("Loaded {} font faces for charts", database.len());

        let mut options = usvg::Options::default();
        options.fontdb = Arc::new(database);
        if let Some(first) = config.font_family.split(',').next() {
            options.font_family = first.trim().to_owned();
        }
        ChartRenderer {
            options,
            font_family: config.font_family.to_owned(),
            palette: config.palette.to_owned(),
        }
    }

    /// Renders a bar chart to PNG
    pub fn render_bar(&self, chart: &BarChart) -> Result<Vec<u8>, ReportError> {
        self.rasterize(&chart.to_svg(&self.font_family))
    }

    /// Renders two donuts side by side to PNG
    pub fn render_double_donut(&self, left: &DonutChart, right: &DonutChart) -> Result<Vec<u8>, ReportError> {
        self.rasterize(&donut::double_donut_svg(left, right, &self.palette, &self.font_family))
    }

    fn rasterize(&self, svg: &str) -> Result<Vec<u8>, ReportError> {
        let tree = usvg::Tree::from_str(svg, &self.options)?;
        let size = tree.size().to_int_size();
        let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
            .ok_or(ChartError::CanvasError(size.width(), size.height()))?;
        pixmap.fill(tiny_skia::Color::WHITE);
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
        let png = pixmap
            .encode_png()
            .map_err(|error| ChartError::EncodeError(error.to_string()))?;
        Ok(png)
    }
}

/// Color of the `index`-th series, cycling through the palette
pub(crate) fn palette_color(palette: &[String], index: usize) -> &str {
    if palette.is_empty() {
        "#4285F4"
    } else {
        &palette[index % palette.len()]
    }
}

/// Opening `<svg>` tag with a white background
pub(crate) fn svg_open(width: u32, height: u32, font_family: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="{}"><rect width="{width}" height="{height}" fill="white"/>"#,
        crate::helpers::string::escape_xml(font_family)
    )
}
