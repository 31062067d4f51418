use thiserror::Error;

/// Errors surfaced to engine callers. Each condition keeps its own kind so
/// callers can match on it.
#[derive(Debug, Error)]
pub enum Error {
    /// A key argument was empty.
    #[error("the key is empty")]
    KeyIsEmpty,

    /// The key has no live record.
    #[error("key not found in database")]
    KeyNotFound,

    /// The keydir rejected an update.
    #[error("failed to update the keydir index")]
    IndexUpdateFailed,

    /// A keydir entry referenced a file id that no longer resolves.
    #[error("data file not found")]
    DataFileNotFound,

    /// The data directory contains files the engine cannot make sense of.
    #[error("the database directory may be corrupted")]
    DataDirectoryCorrupted,

    /// A batch holds more pending records than its configured maximum.
    #[error("batch exceeds the maximum number of pending records")]
    ExceedMaxBatchNum,

    /// Another merge is already running.
    #[error("merge is already in progress")]
    MergeInProgress,

    /// The persistent-index variant needs a `seq-no` file that is missing.
    #[error("sequence number file does not exist")]
    SeqNoFileNotFound,

    /// Engine options failed validation.
    #[error("invalid engine options: {0}")]
    InvalidOptions(&'static str),

    /// A record failed its checksum.
    #[error("invalid record crc")]
    InvalidCrc,

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The keydir backend reported a failure.
    #[error(transparent)]
    Index(#[from] keydir::IndexError),
}

impl From<datafile::DataFileError> for Error {
    fn from(err: datafile::DataFileError) -> Self {
        match err {
            datafile::DataFileError::Io(e) => Error::Io(e),
            datafile::DataFileError::InvalidCrc => Error::InvalidCrc,
            datafile::DataFileError::UnknownRecordType(_) => Error::DataDirectoryCorrupted,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
