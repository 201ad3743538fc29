//! # Response Writer
//! src/http/response.rs
//!
//! Máquina de estados sobre la conexión tomada. Garantiza framing HTTP/1.1
//! legal sin importar en qué orden el handler llame a la API:
//!
//! ```text
//! HTTP/1.1 200 OK\r\n                  ← status line (una sola vez)
//! Transfer-Encoding: chunked\r\n
//! Connection: keep-alive\r\n
//! Content-Type: text/html;charset=utf-8\r\n
//! Set-Cookie: id=42\r\n                ← un header por cookie
//! \r\n
//! 5\r\nHello\r\n                       ← un chunk por write()
//! 0\r\n\r\n                            ← terminador (una sola vez, en end())
//! ```
//!
//! ## Estados
//!
//! - `basic_sent`: status line + headers ya están en el wire. Transición
//!   monotónica false → true.
//! - `body_sent`: se escribió al menos un chunk. A partir de aquí los
//!   headers no se pueden volver a enviar.
//! - `ended`: se envió el terminador y se cerró la conexión. Cualquier
//!   escritura posterior retorna `Error::Ended`.
//!
//! El Header Store acepta cambios en cualquier momento, pero después del
//! flush ya no tienen efecto en el wire.

use super::connection::Connection;
use super::cookie::ResponseCookies;
use super::header::HeaderStore;
use super::request::{Method, Request};
use super::StatusCode;
use crate::error::{Error, FileError, Result};
use crate::file::{FileHandle, DEFAULT_CHUNK_SIZE};
use crate::props::SharedProps;
use crate::template::TemplateEngine;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Content-Type que se fuerza si el handler no puso ninguno
pub const DEFAULT_CONTENT_TYPE: &str = "text/html;charset=utf-8";

/// Headers que el writer emite por su cuenta en cada flush
const FRAMING_HEADERS: [&str; 2] = ["Transfer-Encoding", "Connection"];

/// Estado de envío de la respuesta
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseState {
    pub basic_sent: bool,
    pub body_sent: bool,
    pub ended: bool,
}

/// Respuesta HTTP escrita directamente sobre el socket
pub struct Response {
    writer: BufWriter<Box<dyn Connection>>,
    status: StatusCode,
    headers: HeaderStore,
    cookies: ResponseCookies,
    state: ResponseState,

    /// Valores locales al request, para pasar datos entre middlewares
    pub locals: HashMap<String, Value>,

    props: SharedProps,
    method: Method,
    url: String,
    if_none_match: Option<String>,
    chunk_size: usize,
    templates: Option<Arc<dyn TemplateEngine>>,
}

impl Response {
    /// Crea la respuesta para `request` sobre una conexión ya tomada
    pub fn new(connection: Box<dyn Connection>, request: &Request) -> Self {
        Self {
            writer: BufWriter::new(connection),
            status: StatusCode::Ok,
            headers: HeaderStore::new(),
            cookies: ResponseCookies::new(),
            state: ResponseState::default(),
            locals: HashMap::new(),
            props: request.props().clone(),
            method: request.method(),
            url: request.url().to_string(),
            if_none_match: request.header("if-none-match").map(|v| v.to_string()),
            chunk_size: DEFAULT_CHUNK_SIZE,
            templates: None,
        }
    }

    /// Tamaño de bloque para `send_file`
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_templates(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.templates = Some(engine);
        self
    }

    // === Estado ===

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn has_ended(&self) -> bool {
        self.state.ended
    }

    /// `true` si la status line y los headers ya están en el wire
    pub fn basic_sent(&self) -> bool {
        self.state.basic_sent
    }

    /// `true` mientras un cambio de headers todavía llegaría al wire
    pub fn can_send_header(&self) -> bool {
        !self.state.basic_sent && !self.state.ended
    }

    // === Status, headers y cookies ===

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Registra el status; sin efecto en el wire después del flush
    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        if self.state.basic_sent {
            debug!("status {} set after headers were flushed", status.as_u16());
        }
        self.status = status;
        self
    }

    pub fn headers(&self) -> &HeaderStore {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderStore {
        &mut self.headers
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        if self.state.basic_sent {
            debug!("header {} set after headers were flushed", name);
        }
        self.headers.set(name, value);
        self
    }

    pub fn delete_header(&mut self, name: &str) -> &mut Self {
        self.headers.del(name);
        self
    }

    pub fn cookies(&self) -> &ResponseCookies {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut ResponseCookies {
        &mut self.cookies
    }

    // === Wire ===

    /// Escribe status line, headers de framing, headers y cookies
    ///
    /// Solo la primera llamada escribe algo; las siguientes son no-op
    /// mientras no se haya enviado body. Falla con `HeadersAfterBody` si ya
    /// hubo un chunk.
    pub fn flush_headers(&mut self) -> Result<()> {
        if self.state.ended {
            return Err(Error::Ended);
        }
        if self.state.body_sent {
            return Err(Error::HeadersAfterBody);
        }
        if self.state.basic_sent {
            return Ok(());
        }

        self.cookies.finish(&mut self.headers);
        if !self.headers.contains("Content-Type") {
            self.headers.set("Content-Type", DEFAULT_CONTENT_TYPE);
        }

        let result = self.write_head();
        self.state.basic_sent = true;
        result.map_err(|e| self.abort(e))
    }

    fn write_head(&mut self) -> std::io::Result<()> {
        write!(
            self.writer,
            "HTTP/1.1 {} {}\r\nTransfer-Encoding: chunked\r\nConnection: keep-alive\r\n",
            self.status.as_u16(),
            self.status.reason_phrase()
        )?;
        self.headers.write_to(&mut self.writer, &FRAMING_HEADERS)?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()
    }

    /// Escribe un chunk con `content`, enviando headers antes si hace falta
    ///
    /// Un contenido vacío no genera chunk: `0\r\n\r\n` es el terminador y
    /// solo lo escribe `end()`.
    pub fn write(&mut self, content: impl AsRef<[u8]>) -> Result<&mut Self> {
        if self.state.ended {
            return Err(Error::Ended);
        }
        if !self.state.basic_sent {
            self.flush_headers()?;
        }

        let content = content.as_ref();
        if content.is_empty() {
            return Ok(self);
        }

        let result = self.write_chunk(content);
        self.state.body_sent = true;
        result.map_err(|e| self.abort(e))?;
        Ok(self)
    }

    fn write_chunk(&mut self, content: &[u8]) -> std::io::Result<()> {
        write!(self.writer, "{:x}\r\n", content.len())?;
        self.writer.write_all(content)?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()
    }

    /// Envía el chunk terminador y cierra la conexión
    ///
    /// Repetir la llamada no escribe nada.
    pub fn end(&mut self) -> Result<()> {
        if self.state.ended {
            return Ok(());
        }
        if !self.state.basic_sent {
            self.flush_headers()?;
        }

        let result = self
            .writer
            .write_all(b"0\r\n\r\n")
            .and_then(|_| self.writer.flush());
        self.state.ended = true;
        if let Err(e) = result {
            return Err(self.abort(e));
        }

        if let Err(e) = self.writer.get_mut().close() {
            debug!("couldn't close the connection, already lost? {}", e);
        }

        if self.props.is_true("log") {
            info!("{} {} {}", self.method, self.url, self.status.as_u16());
        }
        Ok(())
    }

    /// Marca la respuesta como terminada después de una falla del socket
    ///
    /// No escribe nada más: la conexión se da por perdida.
    fn abort(&mut self, err: std::io::Error) -> Error {
        warn!("{} {}: write failed: {}", self.method, self.url, err);
        self.abort_connection();
        Error::Io(err)
    }

    /// Cierra la conexión sin terminador y marca la respuesta como terminada
    pub(crate) fn abort_connection(&mut self) {
        self.state.ended = true;
        if let Err(e) = self.writer.get_mut().close() {
            debug!("couldn't close the connection: {}", e);
        }
    }

    // === Atajos ===

    /// Redirección temporal (302) a `location`
    ///
    /// Si los headers ya salieron no se puede redirigir: solo termina la
    /// respuesta.
    pub fn redirect(&mut self, location: &str) -> Result<()> {
        if !self.can_send_header() {
            warn!("cannot redirect to {} after headers were flushed", location);
            return self.end();
        }
        self.set_status(StatusCode::Found);
        self.set_header("Location", location);
        self.flush_headers()?;
        self.end()
    }

    /// Envía un body completo con status y content-type, y termina
    fn send_content(&mut self, status: StatusCode, content_type: &str, content: &[u8]) -> Result<()> {
        if self.state.ended {
            return Err(Error::Ended);
        }
        if !self.state.basic_sent {
            self.set_status(status);
            self.set_header("Content-Type", content_type);
            self.flush_headers()?;
        }
        let written = self.write(content).map(|_| ());
        let ended = self.end();
        written.and(ended)
    }

    /// Respuesta de error con un mensaje en texto/html
    pub fn error(&mut self, status: StatusCode, message: &str) -> Result<()> {
        warn!("{} {}: {} {}", self.method, self.url, status.as_u16(), message);
        self.send_content(status, "text/html", message.as_bytes())
    }

    /// Serializa `content` como JSON (200); si falla, 500 con body vacío
    pub fn json<T: Serialize + ?Sized>(&mut self, content: &T) -> Result<()> {
        match serde_json::to_vec(content) {
            Ok(body) => self.send_content(StatusCode::Ok, "application/json", &body),
            Err(e) => {
                warn!("failed to serialize JSON response: {}", e);
                self.send_content(StatusCode::InternalServerError, "application/json", b"")
            }
        }
    }

    /// Renderiza un template con el motor configurado
    ///
    /// Sin motor configurado: 500 y fin.
    pub fn render<T: Serialize + ?Sized>(&mut self, path: impl AsRef<Path>, data: &T) -> Result<()> {
        match self.templates.clone() {
            Some(engine) => self.render_with(engine.as_ref(), path, data),
            None => {
                warn!("no template engine configured for {}", path.as_ref().display());
                self.fail_render()
            }
        }
    }

    /// Renderiza un template con `engine` y escribe la salida como un chunk
    ///
    /// Si el render falla: 500 y fin.
    pub fn render_with<T: Serialize + ?Sized>(
        &mut self,
        engine: &dyn TemplateEngine,
        path: impl AsRef<Path>,
        data: &T,
    ) -> Result<()> {
        let path = path.as_ref();
        let rendered = serde_json::to_value(data)
            .map_err(Error::from)
            .and_then(|value| engine.render(path, &value));

        match rendered {
            Ok(bytes) => self.write(bytes).map(|_| ()),
            Err(e) => {
                warn!("template {} failed: {}", path.display(), e);
                self.fail_render()
            }
        }
    }

    fn fail_render(&mut self) -> Result<()> {
        if self.can_send_header() {
            self.set_status(StatusCode::InternalServerError);
        }
        self.end()
    }

    // === Archivos ===

    /// Envía un archivo con caché por ETag
    ///
    /// Retorna `Ok(false)` si el archivo no existe (responde 404), si es un
    /// directorio (no toca la respuesta) o si los headers ya se enviaron.
    pub fn send_file(&mut self, path: impl AsRef<Path>, no_cache: bool) -> Result<bool> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Ok(false);
        }

        let handle = match FileHandle::open(path, self.chunk_size) {
            Ok(handle) => handle,
            Err(FileError::IsDirectory(p)) => {
                debug!("refusing to send directory {}", p);
                return Ok(false);
            }
            Err(e) => {
                warn!("file not found {}: {}", path.display(), e);
                if self.can_send_header() {
                    self.set_status(StatusCode::NotFound);
                }
                self.end()?;
                return Ok(false);
            }
        };

        if !self.can_send_header() {
            warn!("cannot send file {} after headers were flushed", path.display());
            self.end()?;
            return Ok(false);
        }

        let content_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("none");
        self.set_header("Content-Type", content_type);
        self.set_header("Date", &httpdate::fmt_http_date(SystemTime::now()));

        if !no_cache {
            let etag = handle.etag();
            if self.etag_matches(&etag) {
                self.set_status(StatusCode::NotModified);
                self.set_header("Cache-Control", "max-age=300000");
                self.flush_headers()?;
                self.end()?;
                return Ok(true);
            }
            self.set_header("ETag", &etag);
        }

        self.flush_headers()?;
        handle.pipe(self)?;
        Ok(true)
    }

    /// `send_file` con `Content-Disposition: attachment`
    pub fn download(&mut self, path: impl AsRef<Path>, filename: &str) -> Result<bool> {
        if !self.can_send_header() {
            warn!("cannot start a download after headers were flushed");
            self.end()?;
            return Ok(false);
        }
        self.set_header(
            "Content-Disposition",
            &format!("attachment; filename=\"{}\"", filename),
        );
        self.send_file(path, false)
    }

    fn etag_matches(&self, etag: &str) -> bool {
        self.if_none_match
            .as_deref()
            .map(|value| value.trim().trim_matches('"') == etag)
            .unwrap_or(false)
    }
}
