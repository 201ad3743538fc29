//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! - `app`: la aplicación `Express` (registro de rutas + entrada por conexión)
//! - `tcp`: listener TCP, un thread por conexión y apagado ordenado

pub mod app;
pub mod tcp;

// Re-exportar para facilitar el uso
pub use app::Express;
pub use tcp::{Server, ShutdownHandle};
