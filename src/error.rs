use std::fmt;

/// Error type for the fallible edges of the painter: decoding, export,
/// persistence, settings and gesture scripts.
///
/// Gesture handling itself never returns one of these; see `PaintSession`.
#[derive(Debug)]
pub enum PaintError {
    Io(std::io::Error),
    Image(image::ImageError),
    Serialize(String),
    InvalidFormat(String),
    Script { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, PaintError>;

impl fmt::Display for PaintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaintError::Io(e) => write!(f, "I/O error: {}", e),
            PaintError::Image(e) => write!(f, "Image error: {}", e),
            PaintError::Serialize(e) => write!(f, "Serialization error: {}", e),
            PaintError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
            PaintError::Script { line, message } => {
                write!(f, "Script error on line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for PaintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PaintError::Io(e) => Some(e),
            PaintError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PaintError {
    fn from(e: std::io::Error) -> Self {
        PaintError::Io(e)
    }
}

impl From<image::ImageError> for PaintError {
    fn from(e: image::ImageError) -> Self {
        PaintError::Image(e)
    }
}

impl From<Box<bincode::ErrorKind>> for PaintError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        PaintError::Serialize(e.to_string())
    }
}

impl From<base64::DecodeError> for PaintError {
    fn from(e: base64::DecodeError) -> Self {
        PaintError::InvalidFormat(format!("base64: {}", e))
    }
}
