//! # Requests HTTP/1.1
//! src/http/request.rs
//!
//! Lectura y parsing del request que llega por una conexión ya aceptada,
//! más el estado por-request que ven los handlers: parámetros capturados
//! por el router, query, headers, cookies (solo lectura), formulario y JSON.
//!
//! ## Formato de un Request
//!
//! ```text
//! POST /users/42?debug=1 HTTP/1.1\r\n
//! Host: localhost:8080\r\n
//! Content-Type: application/x-www-form-urlencoded\r\n
//! Content-Length: 10\r\n
//! \r\n
//! name=alice
//! ```
//!
//! Los nombres de headers se guardan en minúsculas; si un header se repite,
//! sus valores se unen con `,`.

use super::body::{parse_urlencoded, BodyDecoder, UploadedFile};
use super::cookie::RequestCookies;
use crate::props::SharedProps;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io::{BufRead, Read};
use thiserror::Error;

/// Tamaño máximo del body que se lee del socket (1 MiB)
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Tamaño máximo de la request line + headers
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    /// HEAD no tiene lista de rutas propia: siempre termina en 404
    HEAD,
    POST,
    PUT,
    PATCH,
    DELETE,
    OPTIONS,
}

impl Method {
    /// Métodos que tienen lista de rutas en el router
    pub const ROUTABLE: [Method; 6] = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    /// Parsea un método HTTP (sin distinguir mayúsculas)
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            "OPTIONS" => Ok(Method::OPTIONS),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Incomplete HTTP request")]
    IncompleteRequest,

    #[error("Invalid request line format")]
    InvalidRequestLine,

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Request head too large")]
    HeadTooLarge,

    #[error("Request body too large: {0} bytes")]
    BodyTooLarge(usize),

    #[error("Unsupported transfer encoding: {0}")]
    UnsupportedTransferEncoding(String),

    #[error("Empty request")]
    EmptyRequest,
}

/// Parámetros capturados por el router (`/:name` → `name`)
///
/// Cada match escribe sus capturas encima de las existentes, así un handler
/// posterior en la cadena puede sobrescribir lo que puso uno anterior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: HashMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Request HTTP parseado más su estado por-request
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,

    /// Target tal cual llegó (ej: "/users/42?debug=1")
    url: String,

    /// Path decodificado, sin query (ej: "/users/42")
    path: String,

    query: HashMap<String, Vec<String>>,

    /// Headers con nombre en minúsculas
    headers: HashMap<String, String>,

    version: String,

    body: Vec<u8>,

    params: Params,

    cookies: RequestCookies,

    form: HashMap<String, Vec<String>>,

    files: Vec<UploadedFile>,

    is_json: bool,

    props: SharedProps,
}

impl Request {
    /// Parsea un request completo desde bytes
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use express_core::http::Request;
    ///
    /// let raw = b"GET /users?name=ana HTTP/1.1\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.path(), "/users");
    /// assert_eq!(request.query("name"), Some("ana"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        if buffer.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ParseError::EmptyRequest);
        }
        Self::read_from(&mut &buffer[..])
    }

    /// Lee un request desde un stream: request line, headers y, si hay
    /// `Content-Length`, exactamente esa cantidad de bytes de body
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self, ParseError> {
        let mut head_size = 0usize;

        // 1. Request line (se saltan líneas vacías previas)
        let request_line = loop {
            let line = read_line(reader, &mut head_size)?.ok_or(ParseError::EmptyRequest)?;
            if !line.is_empty() {
                break line;
            }
        };
        let (method, url, version) = Self::parse_request_line(&request_line)?;

        // 2. Headers hasta la línea vacía
        let mut headers: HashMap<String, String> = HashMap::new();
        loop {
            let line = read_line(reader, &mut head_size)?.ok_or(ParseError::IncompleteRequest)?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::InvalidHeader(line.clone()))?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return Err(ParseError::InvalidHeader(line.clone()));
            }
            let value = value.trim();
            headers
                .entry(name)
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        // 3. Body
        if let Some(encoding) = headers.get("transfer-encoding") {
            if !encoding.eq_ignore_ascii_case("identity") {
                return Err(ParseError::UnsupportedTransferEncoding(encoding.clone()));
            }
        }
        let length = match headers.get("content-length") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidHeader(format!("content-length: {}", value)))?,
            None => 0,
        };
        if length > MAX_BODY_SIZE {
            return Err(ParseError::BodyTooLarge(length));
        }
        let mut body = vec![0u8; length];
        reader
            .read_exact(&mut body)
            .map_err(|_| ParseError::IncompleteRequest)?;

        let (path, query) = Self::parse_target(&url);
        let cookies = headers
            .get("cookie")
            .map(|value| RequestCookies::parse(value))
            .unwrap_or_default();

        Ok(Request {
            method,
            url,
            path,
            query,
            headers,
            version,
            body,
            params: Params::new(),
            cookies,
            form: HashMap::new(),
            files: Vec::new(),
            is_json: false,
            props: SharedProps::new(),
        })
    }

    /// Formato: `GET /path?query HTTP/1.1`
    fn parse_request_line(line: &str) -> Result<(Method, String, String), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = Method::parse(parts[0])?;

        let url = parts[1].to_string();
        if !url.starts_with('/') && url != "*" {
            return Err(ParseError::InvalidRequestLine);
        }

        let version = parts[2].to_string();
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version));
        }

        Ok((method, url, version))
    }

    /// "/users/a%20b?x=1" → ("/users/a b", {"x": ["1"]})
    fn parse_target(url: &str) -> (String, HashMap<String, Vec<String>>) {
        let (raw_path, raw_query) = match url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (url, ""),
        };
        let path = percent_encoding::percent_decode_str(raw_path)
            .decode_utf8_lossy()
            .into_owned();
        (path, parse_urlencoded(raw_query.as_bytes()))
    }

    /// Aplica el decoder de body (formularios, archivos, JSON)
    pub fn decode_body(&mut self, decoder: &dyn BodyDecoder) {
        let decoded = decoder.decode(self.header("content-type"), &self.body);
        for (key, values) in decoded.form {
            self.form.entry(key).or_default().extend(values);
        }
        self.files.extend(decoded.files);
        self.is_json = decoded.is_json;
    }

    pub(crate) fn set_props(&mut self, props: SharedProps) {
        self.props = props;
    }

    // === Métodos públicos para acceder a los campos ===

    pub fn method(&self) -> Method {
        self.method
    }

    /// Path decodificado, sin query string
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Target original (path + query)
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Primer valor de un query parameter
    ///
    /// # Ejemplo
    /// ```
    /// use express_core::http::Request;
    ///
    /// let raw = b"GET /test?num=42&num=7 HTTP/1.1\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.query("num"), Some("42"));
    /// assert_eq!(request.query_all("num"), &["42", "7"]);
    /// assert_eq!(request.query("missing"), None);
    /// ```
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .and_then(|values| values.first())
            .map(|s| s.as_str())
    }

    /// Todos los valores de un query parameter
    pub fn query_all(&self, name: &str) -> &[String] {
        self.query.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Header del request (el nombre no distingue mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Cookies recibidas (solo lectura)
    pub fn cookies(&self) -> &RequestCookies {
        &self.cookies
    }

    /// Primer valor de un campo del formulario
    pub fn body(&self, key: &str) -> Option<&str> {
        self.form
            .get(key)
            .and_then(|values| values.first())
            .map(|s| s.as_str())
    }

    /// Todos los valores de un campo del formulario
    pub fn body_all(&self, key: &str) -> &[String] {
        self.form.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Bytes crudos del body
    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    /// `true` si el body se declaró como JSON
    pub fn is_json(&self) -> bool {
        self.is_json
    }

    /// Decodifica el body JSON a `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Propiedades compartidas de la aplicación
    pub fn props(&self) -> &SharedProps {
        &self.props
    }
}

/// Lee una línea terminada en `\n` sin el `\r\n`; `None` en EOF limpio
fn read_line<R: BufRead>(reader: &mut R, head_size: &mut usize) -> Result<Option<String>, ParseError> {
    let mut raw = Vec::new();
    let limit = (MAX_HEAD_SIZE - *head_size + 1) as u64;
    let n = reader
        .by_ref()
        .take(limit)
        .read_until(b'\n', &mut raw)
        .map_err(|_| ParseError::IncompleteRequest)?;

    if n == 0 {
        return Ok(None);
    }
    *head_size += n;
    if *head_size > MAX_HEAD_SIZE {
        return Err(ParseError::HeadTooLarge);
    }
    if !raw.ends_with(b"\n") {
        return Err(ParseError::IncompleteRequest);
    }

    let line = String::from_utf8(raw).map_err(|_| ParseError::InvalidRequestLine)?;
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
