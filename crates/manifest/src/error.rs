use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed manifest {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Malformed manifest {path}: {reason}")]
    Structure { path: PathBuf, reason: String },

    /// Text that has no Windows-1252 byte and cannot be written as a character
    /// reference (comments, processing instructions, doctype).
    #[error("Cannot encode {character:?} as Windows-1252")]
    Unencodable { character: char },

    /// No `*.{extension}` file exists between the start directory and a boundary root.
    #[error("No {extension} found for {start}")]
    NoManifestFound { extension: String, start: PathBuf },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}

impl ManifestError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NoManifestFound { .. })
    }
}
