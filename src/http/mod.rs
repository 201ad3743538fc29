//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Protocolo HTTP/1.1 del lado del servidor, escrito sobre el socket crudo:
//!
//! - Parsing de requests (request line, headers, body con Content-Length)
//! - Respuestas chunked con estado explícito
//! - Headers, cookies y status codes
//! - Conexiones tomadas (hijack) y su equivalente en memoria para tests
//!
//! ### Formato de Request
//!
//! ```text
//! GET /path?query=value HTTP/1.1\r\n
//! Host: localhost\r\n
//! Cookie: id=42\r\n
//! \r\n
//! ```
//!
//! ### Formato de Response
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Transfer-Encoding: chunked\r\n
//! Connection: keep-alive\r\n
//! Content-Type: application/json\r\n
//! \r\n
//! d\r\n
//! {"ok": true}\r\n
//! 0\r\n
//! \r\n
//! ```

pub mod body;
pub mod connection;
pub mod cookie;
pub mod header;
pub mod request;
pub mod response;
pub mod status;

// Re-exportamos los tipos principales para facilitar su uso
pub use body::{BodyDecoder, DecodedBody, FormDecoder, UploadedFile};
pub use connection::{Connection, Hijacker, MemoryConnection, MemoryHijacker, TcpHijacker};
pub use self::cookie::{
    Cookie, CookieBuilder, CookieJar, RequestCookies, ResponseCookies, SameSite,
};
pub use header::HeaderStore;
pub use request::{Method, Params, ParseError, Request};
pub use response::Response;
pub use status::StatusCode;
