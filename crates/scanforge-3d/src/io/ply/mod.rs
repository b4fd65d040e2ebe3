mod reader;
mod writer;

pub use reader::read_ply;
pub use writer::write_ply;

/// Error types for the PLY module.
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    /// Failed to read or write the PLY file.
    #[error("failed to read or write PLY file")]
    Io(#[from] std::io::Error),

    /// The header or a property is not one this codec understands.
    #[error("unsupported PLY header or property")]
    UnsupportedProperty,

    /// The file contains a face that is not a triangle.
    #[error("only triangular faces are supported")]
    NonTriangularFace,
}

// Vertex property scalar types the codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlyDataType {
    Float32,
    Float64,
    UInt8,
}

impl PlyDataType {
    pub(crate) fn size_of(&self) -> usize {
        match self {
            PlyDataType::Float32 => 4,
            PlyDataType::Float64 => 8,
            PlyDataType::UInt8 => 1,
        }
    }
}
