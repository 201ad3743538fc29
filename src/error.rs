//! # Errores del núcleo
//! src/error.rs
//!
//! Taxonomía de errores compartida por todos los módulos:
//!
//! - **Rutas**: un patrón mal formado falla al registrarlo (arranque).
//! - **Transporte**: fallas de escritura en el socket se propagan tal cual,
//!   sin reintentos.
//! - **Estado de la respuesta**: escribir después de `end()` o enviar headers
//!   en medio del body son errores del llamador.

use crate::http::request::ParseError;
use thiserror::Error;

/// Error general del crate
#[derive(Debug, Error)]
pub enum Error {
    /// Patrón de ruta inválido (ej: `/:id(\d+` sin cerrar)
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Falla de I/O del socket o de un archivo
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Se intentó enviar headers cuando ya se escribió body
    #[error("cannot send headers in the middle of the body")]
    HeadersAfterBody,

    /// La respuesta ya terminó; no se aceptan más bytes
    #[error("response has already ended")]
    Ended,

    /// La conexión no permite tomar el socket crudo
    #[error("request hijacking not supported")]
    HijackUnsupported,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("template error: {0}")]
    Template(String),

    /// Request HTTP mal formado
    #[error("invalid request: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Alias usado en todo el crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errores al abrir un archivo para enviarlo
#[derive(Debug, Error)]
pub enum FileError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("path is a directory: {0}")]
    IsDirectory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pattern_message() {
        let err = Error::InvalidPattern {
            pattern: "/:id(".to_string(),
            reason: "unterminated group".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid route pattern `/:id(`: unterminated group"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
