//! # Header Store
//! src/http/header.rs
//!
//! Colección mutable de headers de una respuesta. Los nombres se comparan
//! sin distinguir mayúsculas, pero se escriben tal como los dio el usuario.
//! Se conserva el orden de inserción para que el bloque de headers sea
//! determinista en el wire.
//!
//! El store no sabe nada del socket: el `Response` decide cuándo se
//! serializa (una sola vez, al hacer flush).

use std::io::{self, Write};

/// Headers de una respuesta
#[derive(Debug, Clone, Default)]
pub struct HeaderStore {
    entries: Vec<(String, String)>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establece un header, reemplazando cualquier valor previo
    pub fn set(&mut self, name: &str, value: &str) -> &mut Self {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.entries.push((name.to_string(), value.to_string()));
        self
    }

    /// Agrega un valor más a un header (ej: un `Set-Cookie` por cookie)
    pub fn append(&mut self, name: &str, value: &str) -> &mut Self {
        self.entries.push((name.to_string(), value.to_string()));
        self
    }

    /// Primer valor del header, si existe
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Todos los valores del header, en orden de inserción
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Elimina todas las entradas del header
    pub fn del(&mut self, name: &str) -> &mut Self {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Serializa los headers como líneas `Name: Value\r\n`
    ///
    /// `skip` lista nombres que el writer ya emitió por su cuenta
    /// (ej: `Transfer-Encoding`).
    pub fn write_to<W: Write>(&self, writer: &mut W, skip: &[&str]) -> io::Result<()> {
        for (name, value) in &self.entries {
            if skip.iter().any(|s| s.eq_ignore_ascii_case(name)) {
                continue;
            }
            write!(writer, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}
