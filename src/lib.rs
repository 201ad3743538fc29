//! # Express Core
//! src/lib.rs
//!
//! Núcleo HTTP/1.1 embebible con rutas estilo Express. Escribe las
//! respuestas directamente sobre el socket del cliente usando chunked
//! transfer encoding.
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `http`: requests, respuestas chunked, headers, cookies, conexiones
//! - `router`: compilador de patrones y tabla de rutas por método
//! - `dispatch`: recorrido de la cadena de handlers con `Next`
//! - `file`: envío de archivos por bloques con productor/consumidor
//! - `template`: interfaz de motores de templates
//! - `props`: propiedades compartidas por toda la aplicación
//! - `server`: la aplicación `Express` y el listener TCP
//! - `config`: configuración por CLI y variables de entorno
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use express_core::server::Express;
//!
//! let mut app = Express::new();
//! app.get("/:name/:id", |req, res, _next| {
//!     let msg = format!(
//!         "Name: {}, ID: {}",
//!         req.params().get("name").unwrap_or(""),
//!         req.params().get("id").unwrap_or("")
//!     );
//!     res.write(msg)?;
//!     res.end()
//! })?;
//!
//! app.listen("127.0.0.1:8080")?;
//! # Ok::<(), express_core::Error>(())
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod file;
pub mod http;
pub mod props;
pub mod router;
pub mod server;
pub mod template;

pub use dispatch::Next;
pub use error::{Error, FileError, Result};
pub use server::Express;
