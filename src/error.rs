use thiserror::Error;

/// Main error type for the report builder.
/// Aggregates errors from various sources including standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    GlobError(#[from] glob::GlobError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    #[error("{0}")]
    RegexError(#[from] regex::Error),

    #[error("{0}")]
    ConfigFormatError(#[from] serde_yaml::Error),

    #[error("{0}")]
    SvgError(#[from] resvg::usvg::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Domain module errors
    #[error("{0}")]
    TabularError(#[from] crate::tabular::TabularError),

    #[error("{0}")]
    MissingDatasetsError(#[from] crate::tabular::detect::MissingDatasetsError),

    #[error("{0}")]
    ChartError(#[from] crate::chart::ChartError),

    #[error("{0}")]
    PackageError(#[from] crate::package::PackageError),

    #[error("{0}")]
    DeckError(#[from] crate::deck::DeckError),

    #[error("{0}")]
    WorkbookError(#[from] crate::workbook::WorkbookError),

    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("{0}")]
    RunError(#[from] crate::report::RunError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, ReportError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| ReportError::WithContextError(format!("{}: {}", message, e)))
    }
}
