use std::fmt;

pub type Result<T> = std::result::Result<T, DashboardError>;

/// Express which part of the pipeline an error was noticed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLayer {
    /// The dashboard configuration itself is inconsistent, like a view order
    /// naming a repository that was never declared.
    ConfigLayer,
    /// Something went wrong while linking, permuting or walking the component
    /// graph.
    GraphLayer,
    /// Template data files, patches, or leaf directories on disk.
    DataLayer,
    /// The templating backend or the output directory.
    RenderLayer,
    /// A remote storage platform.
    RemoteLayer,
}

/// Details about what went wrong for investigation purposes.
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub layer: ErrorLayer,
    /// Stringified version of the lower level error.
    pub message: String,
}

impl ErrorDetails {
    pub fn new(layer: ErrorLayer, message: impl Into<String>) -> Self {
        ErrorDetails {
            layer,
            message: message.into(),
        }
    }
}

/// Every failure surfaced by the engine.  Structural problems that should not
/// abort a render are logged as warnings instead and never show up here.
#[derive(Debug, Clone)]
pub enum DashboardError {
    /// The configuration can not be turned into a dashboard.
    Config(ErrorDetails),
    /// A component, leaf or repository id was requested but does not exist.
    Lookup(ErrorDetails),
    /// Reading or writing data failed.
    Data(ErrorDetails),
    /// The caller supplied arguments that can't be reconciled, like a patch
    /// list that matches neither one nor every target.
    BadInput(ErrorDetails),
    /// An operation that has no implementation for this kind of node or
    /// platform.
    Unsupported(String),
}

impl DashboardError {
    pub fn config(message: impl Into<String>) -> Self {
        DashboardError::Config(ErrorDetails::new(ErrorLayer::ConfigLayer, message))
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        DashboardError::Lookup(ErrorDetails::new(ErrorLayer::GraphLayer, message))
    }

    pub fn data(message: impl Into<String>) -> Self {
        DashboardError::Data(ErrorDetails::new(ErrorLayer::DataLayer, message))
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        DashboardError::BadInput(ErrorDetails::new(ErrorLayer::ConfigLayer, message))
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            DashboardError::Config(d)
            | DashboardError::Lookup(d)
            | DashboardError::Data(d)
            | DashboardError::BadInput(d) => Some(d),
            DashboardError::Unsupported(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DashboardError::Unsupported(msg) => msg,
            _ => self.details().map(|d| d.message.as_str()).unwrap_or(""),
        }
    }
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            DashboardError::Config(_) => "configuration error",
            DashboardError::Lookup(_) => "lookup error",
            DashboardError::Data(_) => "data error",
            DashboardError::BadInput(_) => "bad input",
            DashboardError::Unsupported(msg) => return write!(f, "unsupported: {}", msg),
        };
        match self.details() {
            Some(d) => write!(f, "{} ({:?}): {}", kind, d.layer, d.message),
            None => write!(f, "{}", kind),
        }
    }
}

impl std::error::Error for DashboardError {}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> DashboardError {
        DashboardError::data(err.to_string())
    }
}

// JSON parse errors are data problems.
impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> DashboardError {
        DashboardError::data(err.to_string())
    }
}

impl From<toml::de::Error> for DashboardError {
    fn from(err: toml::de::Error) -> DashboardError {
        DashboardError::config(err.to_string())
    }
}

impl From<liquid::Error> for DashboardError {
    fn from(err: liquid::Error) -> DashboardError {
        DashboardError::Data(ErrorDetails::new(ErrorLayer::RenderLayer, err.to_string()))
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> DashboardError {
        DashboardError::Data(ErrorDetails::new(ErrorLayer::RemoteLayer, err.to_string()))
    }
}

impl From<std::path::StripPrefixError> for DashboardError {
    fn from(err: std::path::StripPrefixError) -> DashboardError {
        DashboardError::Data(ErrorDetails::new(ErrorLayer::RenderLayer, err.to_string()))
    }
}

impl From<walkdir::Error> for DashboardError {
    fn from(err: walkdir::Error) -> DashboardError {
        DashboardError::data(err.to_string())
    }
}
