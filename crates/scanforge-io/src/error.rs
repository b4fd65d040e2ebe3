/// An error type for the io module.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Error when the file does not exist.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(std::path::PathBuf),

    /// Error to manipulate the file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// Error to decode the PNG image.
    #[error("Failed to decode the png image. {0}")]
    PngDecodeError(String),

    /// Error to encode the PNG image.
    #[error("Failed to encode the png image. {0}")]
    PngEncodingError(String),

    /// The PNG holds a different layout than the caller expected.
    #[error("Unexpected image format: expected {expected}, found {found}")]
    UnexpectedImageFormat {
        /// The layout the caller asked for.
        expected: String,
        /// The layout found in the file.
        found: String,
    },

    /// Error to parse the dataset metadata.
    #[error("Failed to parse dataset metadata. {0}")]
    MetadataError(#[from] serde_json::Error),
}
