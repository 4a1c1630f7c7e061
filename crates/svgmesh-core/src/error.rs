//! Error types for svgmesh
//!
//! Everything in here is fatal: the conversion stops and no mesh group is
//! returned. Recoverable problems are [`crate::diagnostics::Warning`]s instead.

use thiserror::Error;

/// Result type alias using svgmesh's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a conversion
#[derive(Error, Debug)]
pub enum Error {
    /// The input is not well-formed SVG markup
    #[error("SVG parse error: {0}")]
    Parse(String),

    /// An outline could not be triangulated or extruded
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Export failed
    #[error("Export failed: {0}")]
    Export(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding/decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
