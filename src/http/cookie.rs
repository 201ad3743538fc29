//! # Cookie Store
//! src/http/cookie.rs
//!
//! Un mismo layout de datos con dos vistas:
//!
//! - [`RequestCookies`]: solo lectura, se llena una vez desde el header
//!   `Cookie` del request.
//! - [`ResponseCookies`]: lectura/escritura, sus cookies se serializan como
//!   un `Set-Cookie` por cookie cuando el `Response` hace flush de headers.
//!
//! Ambas implementan [`CookieJar`] para las operaciones de lectura. Los
//! registros son [`Cookie`] del crate `cookie`; nombre y valor viajan
//! percent-encoded en ambas direcciones.

use super::header::HeaderStore;
pub use ::cookie::{Cookie, CookieBuilder, SameSite};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Operaciones de lectura comunes a ambas vistas
pub trait CookieJar {
    fn cookies(&self) -> &BTreeMap<String, Cookie<'static>>;

    /// Valor de la cookie, o `None` si no existe
    fn get(&self, name: &str) -> Option<&str> {
        self.cookies()
            .get(name)
            .map(|c| c.value().trim_matches('"'))
    }

    fn get_all(&self) -> &BTreeMap<String, Cookie<'static>> {
        self.cookies()
    }
}

/// Cookies recibidas en el request (solo lectura)
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    cookies: BTreeMap<String, Cookie<'static>>,
}

impl RequestCookies {
    /// Parsea el valor del header `Cookie` (`a=1; b=2`)
    ///
    /// Los pares que no se pueden parsear (sin `=`, nombre vacío) se ignoran.
    pub fn parse(header: &str) -> Self {
        let cookies = Cookie::split_parse_encoded(header)
            .filter_map(|parsed| parsed.ok())
            .map(|cookie| (cookie.name().to_string(), cookie.into_owned()))
            .collect();

        Self { cookies }
    }
}

impl CookieJar for RequestCookies {
    fn cookies(&self) -> &BTreeMap<String, Cookie<'static>> {
        &self.cookies
    }
}

/// Cookies que se enviarán con la respuesta
#[derive(Debug, Clone, Default)]
pub struct ResponseCookies {
    cookies: BTreeMap<String, Cookie<'static>>,
    finished: bool,
}

impl ResponseCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega o reemplaza una cookie
    ///
    /// Acepta tanto una `Cookie` como un `CookieBuilder` o un par
    /// `(nombre, valor)`.
    pub fn add(&mut self, cookie: impl Into<Cookie<'static>>) -> &mut Self {
        let cookie = cookie.into();
        self.cookies.insert(cookie.name().to_string(), cookie);
        self
    }

    /// Marca la cookie para borrado en el cliente (expira en el epoch)
    pub fn del(&mut self, name: &str) -> &mut Self {
        let expired = Cookie::build((name.to_string(), ""))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build();
        self.cookies.insert(name.to_string(), expired);
        self
    }

    /// Vuelca cada cookie con nombre como un `Set-Cookie` en los headers
    ///
    /// Solo tiene efecto la primera vez; el `Response` lo llama justo antes
    /// de escribir el bloque de headers.
    pub(crate) fn finish(&mut self, headers: &mut HeaderStore) {
        if self.finished {
            return;
        }
        self.finished = true;

        for cookie in self.cookies.values().filter(|c| !c.name().is_empty()) {
            headers.append("Set-Cookie", &cookie.encoded().to_string());
        }
    }
}

impl CookieJar for ResponseCookies {
    fn cookies(&self) -> &BTreeMap<String, Cookie<'static>> {
        &self.cookies
    }
}
