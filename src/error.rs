//! Error types for reading, writing and fixture access.
use std::path::PathBuf;

use dicom::core::Tag;
use snafu::Snafu;

/// A failure reported by the DICOM library itself.
pub type LibraryError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) fn boxed<E>(err: E) -> LibraryError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Box::new(err)
}

/// The category of a [`ReadError`],
/// which is what read-path checks assert on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required argument is missing or has the wrong type.
    TypeMismatch,
    /// The file to read does not exist.
    FileNotFound,
    /// The file is not a valid DICOM file under the requested strictness.
    InvalidDicom,
    /// An option value could not be interpreted.
    InvalidValue,
    /// Some other I/O failure.
    Io,
    /// Any other failure inside the DICOM library.
    Library,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("missing required argument `{argument}`"))]
    MissingArgument { argument: &'static str },

    #[snafu(display("argument `{argument}` must be {expected}, found {found}"))]
    WrongType {
        argument: &'static str,
        expected: &'static str,
        found: String,
    },

    #[snafu(display("no such file: {}", filename.display()))]
    FileNotFound {
        filename: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("could not read {}", filename.display()))]
    ReadFile {
        filename: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display(
        "{}: file is missing the preamble, the 'DICM' prefix or the DICOM File Meta Information header; use force to read it anyway",
        filename.display()
    ))]
    MissingHeader { filename: PathBuf },

    #[snafu(display("{}: could not parse DICOM file", filename.display()))]
    ParseFile {
        filename: PathBuf,
        source: LibraryError,
    },

    #[snafu(display("{}: could not parse data set as {transfer_syntax}", filename.display()))]
    ParseDataSet {
        filename: PathBuf,
        transfer_syntax: &'static str,
        source: LibraryError,
    },

    #[snafu(display("unable to parse length with unit '{value}'"))]
    InvalidDeferSize { value: String },

    #[snafu(display("unknown tag or keyword `{value}`"))]
    UnknownTag { value: String },

    #[snafu(display("transfer syntax {uid} is not registered"))]
    UnsupportedTransferSyntax { uid: String },

    #[snafu(display("{}: element {tag} is gone on deferred read", filename.display()))]
    DeferredElementMissing { filename: PathBuf, tag: Tag },

    #[snafu(display("could not convert data set to DICOM JSON"))]
    ToJson { source: serde_json::Error },
}

impl ReadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReadError::MissingArgument { .. } | ReadError::WrongType { .. } => {
                ErrorKind::TypeMismatch
            }
            ReadError::FileNotFound { .. } => ErrorKind::FileNotFound,
            ReadError::MissingHeader { .. }
            | ReadError::ParseFile { .. }
            | ReadError::ParseDataSet { .. } => ErrorKind::InvalidDicom,
            ReadError::InvalidDeferSize { .. } | ReadError::UnknownTag { .. } => {
                ErrorKind::InvalidValue
            }
            ReadError::ReadFile { .. } => ErrorKind::Io,
            ReadError::UnsupportedTransferSyntax { .. }
            | ReadError::DeferredElementMissing { .. }
            | ReadError::ToJson { .. } => ErrorKind::Library,
        }
    }
}

/// Failure to serialize a synthetic record.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum SaveError {
    #[snafu(display("could not build file meta group"))]
    BuildMeta { source: LibraryError },

    #[snafu(display("transfer syntax {uid} is not registered"))]
    UnknownTransferSyntax { uid: String },

    #[snafu(display("could not create {}", filename.display()))]
    CreateFile {
        filename: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("could not write {}", filename.display()))]
    WriteFile {
        filename: PathBuf,
        source: LibraryError,
    },

    #[snafu(display("could not flush {}", filename.display()))]
    FlushFile {
        filename: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("could not remove {}", filename.display()))]
    RemoveFile {
        filename: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("could not create scratch directory"))]
    ScratchDir { source: std::io::Error },
}

/// Failure to load a fixture from the test files folder.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FixtureError {
    #[snafu(display("could not read fixture {}", path.display()))]
    ReadFixture {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("fixture {} is not valid JSON", path.display()))]
    ParseFixture {
        path: PathBuf,
        source: serde_json::Error,
    },
}
