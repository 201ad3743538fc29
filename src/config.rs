//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor de ejemplo con soporte para argumentos CLI y
//! variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./express_core --port 8080 \
//!   --public-dir ./public \
//!   --chunk-size 65536 \
//!   --drain-timeout-ms 5000 \
//!   --log-requests
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 HTTP_HOST=0.0.0.0 LOG_REQUESTS=true ./express_core
//! ```

use crate::error::{Error, Result};
use crate::file::DEFAULT_CHUNK_SIZE;
use clap::Parser;
use std::time::Duration;

/// Configuración del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "express_core")]
#[command(about = "Servidor HTTP/1.1 con rutas estilo Express y respuestas chunked")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Directorio de archivos estáticos
    #[arg(long = "public-dir", default_value = "./public", env = "PUBLIC_DIR")]
    pub public_dir: String,

    /// Tamaño de bloque (bytes) al enviar archivos
    #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE, env = "CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Espera máxima por conexiones en curso al apagar, en milisegundos
    #[arg(long = "drain-timeout-ms", default_value = "10000", env = "DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: u64,

    /// Registrar una línea por request (`METHOD path status`)
    #[arg(long = "log-requests", env = "LOG_REQUESTS")]
    pub log_requests: bool,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use express_core::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk size must be >= 1".to_string()));
        }
        if self.drain_timeout_ms == 0 {
            return Err(Error::Config("drain timeout must be > 0".to_string()));
        }
        if self.public_dir.trim().is_empty() {
            return Err(Error::Config("public dir must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            public_dir: "./public".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            drain_timeout_ms: 10_000,
            log_requests: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.public_dir, "./public");
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.drain_timeout(), Duration::from_secs(10));
        assert!(!config.log_requests);
    }

    #[test]
    fn test_address_custom() {
        let mut config = Config::default();
        config.host = "0.0.0.0".to_string();
        config.port = 3000;
        assert_eq!(config.address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_chunk_size() {
        let mut config = Config::default();
        config.chunk_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk size"));
    }

    #[test]
    fn test_validate_invalid_drain_timeout() {
        let mut config = Config::default();
        config.drain_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("drain timeout"));
    }

    #[test]
    fn test_validate_empty_public_dir() {
        let mut config = Config::default();
        config.public_dir = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_from_args() {
        let config = Config::try_parse_from([
            "express_core",
            "--port",
            "9000",
            "--chunk-size",
            "4096",
            "--log-requests",
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.chunk_size, 4096);
        assert!(config.log_requests);
    }
}
