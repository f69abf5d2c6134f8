use std::fmt;
use std::path::PathBuf;

/// Which configured column of a table was out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Index,
    Target,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColumnRole::Index => write!(f, "Index"),
            ColumnRole::Target => write!(f, "Target"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{}: No such file or directory", path.display())]
    MissingFile { path: PathBuf },

    #[error("Duplicate ID found: {id}")]
    DuplicateIdentifier { id: String },

    #[error("sequence data before the first header at line {line}")]
    SequenceBeforeHeader { line: usize },

    #[error("{role} Column: {column}, out of range (line {line} of {})", path.display())]
    ColumnIndexOutOfRange {
        role: ColumnRole,
        column: usize,
        path: PathBuf,
        line: usize,
    },

    #[error("The number of input files ({files}) and sample ids ({samples}) is not identical")]
    SampleIdMismatch { files: usize, samples: usize },

    #[error("{tools} not found in $PATH")]
    MissingExternalTool { tools: String },

    #[error("{tool} failed with {status}: {stderr}")]
    ExternalToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("no region in {} could be recognized", path.display())]
    NoRegions { path: PathBuf },

    #[error("{}: not a valid ABI trace file: {msg}", path.display())]
    InvalidAbif { path: PathBuf, msg: String },

    #[error("{}: not a valid SAV file: {msg}", path.display())]
    InvalidSav { path: PathBuf, msg: String },

    #[error("error reading bedGraph {}: {msg}", path.display())]
    Bedgraph { path: PathBuf, msg: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
