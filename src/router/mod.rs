//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Mapea (método, path) a una cadena ordenada de handlers.
//!
//! ## Arquitectura
//!
//! ```text
//! "/users/:id"  →  Pattern (regex anclada)  →  Route  →  Router[GET]
//! ```
//!
//! - `pattern`: compila patrones estilo Express a regex con grupos nombrados.
//! - `table`: listas de rutas por método y búsqueda desde un cursor.

pub mod pattern;
pub mod table;

pub use pattern::Pattern;
pub use table::{Found, Handler, Route, Router};
