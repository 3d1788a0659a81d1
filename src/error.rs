use std::io;

/// Errors that can occur while parsing a TrueType font, subsetting it, or
/// assembling the resulting PDF. All are fatal at the document level: no
/// partial output is ever flushed.
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("unsupported font: {0}")]
    UnsupportedFont(String),

    #[error("bad table: {0}")]
    BadTable(String),

    #[error("offset or length out of range in table {table} (offset {offset}, len {len})")]
    CorruptOffset {
        table: String,
        offset: usize,
        len: usize,
    },

    #[error("image decode error: {0}")]
    ImageDecode(String),

    #[error("too many fonts registered: attempted {attempted}, limit {limit}")]
    TooManyFonts { attempted: usize, limit: usize },

    #[error("io error: {0}")]
    IoError(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PdfError>;
