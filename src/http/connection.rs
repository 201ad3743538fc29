//! # Conexiones tomadas (hijack)
//! src/http/connection.rs
//!
//! El núcleo escribe bytes directamente sobre el socket del cliente. Para eso
//! necesita "tomar" (hijack) la conexión: separarla de cualquier maquinaria
//! que escriba respuestas por su cuenta.
//!
//! - [`Connection`]: el byte-stream crudo sobre el que escribe el `Response`.
//! - [`Hijacker`]: quien entrega esa conexión, o reporta que no puede.
//! - [`MemoryConnection`]: conexión en memoria, útil para probar handlers.

use crate::error::{Error, Result};
use crate::http::StatusCode;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};

/// Byte-stream crudo de un cliente
pub trait Connection: Write + Send {
    /// Cierra la conexión en ambas direcciones
    fn close(&mut self) -> io::Result<()>;

    /// Dirección del cliente, para logs
    fn peer(&self) -> String {
        "unknown".to_string()
    }
}

impl Connection for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }

    fn peer(&self) -> String {
        self.peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// Fuente de conexiones tomadas
pub trait Hijacker {
    /// Entrega el socket crudo; `Err(Error::HijackUnsupported)` si no se puede
    fn hijack(&mut self) -> Result<Box<dyn Connection>>;

    /// Responde un error por la vía normal cuando el hijack no es posible
    fn fallback_error(&mut self, status: StatusCode, message: &str) -> io::Result<()>;
}

/// Hijacker sobre un `TcpStream` ya aceptado: siempre puede entregarlo
pub struct TcpHijacker {
    stream: Option<TcpStream>,
}

impl TcpHijacker {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream: Some(stream) }
    }
}

impl Hijacker for TcpHijacker {
    fn hijack(&mut self) -> Result<Box<dyn Connection>> {
        match self.stream.take() {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(Error::HijackUnsupported),
        }
    }

    fn fallback_error(&mut self, status: StatusCode, message: &str) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            message.len(),
            message
        )?;
        stream.flush()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    written: Vec<u8>,
    closed: bool,
}

/// Conexión en memoria: guarda todo lo escrito y si se cerró
///
/// Los clones comparten el mismo buffer, así un test puede quedarse con uno
/// y entregar el otro al `Response`.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // un panic en otro thread no invalida los bytes ya escritos
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Bytes escritos hasta ahora
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Bytes escritos como texto (lossy)
    pub fn written_string(&self) -> String {
        String::from_utf8_lossy(&self.lock().written).into_owned()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl Write for MemoryConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection closed"));
        }
        state.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Connection for MemoryConnection {
    fn close(&mut self) -> io::Result<()> {
        self.lock().closed = true;
        Ok(())
    }

    fn peer(&self) -> String {
        "memory".to_string()
    }
}

/// Hijacker en memoria; `unsupported()` simula un transporte sin hijack
pub struct MemoryHijacker {
    connection: MemoryConnection,
    supported: bool,
    fallback: Option<(StatusCode, String)>,
}

impl MemoryHijacker {
    pub fn new(connection: MemoryConnection) -> Self {
        Self {
            connection,
            supported: true,
            fallback: None,
        }
    }

    pub fn unsupported(connection: MemoryConnection) -> Self {
        Self {
            connection,
            supported: false,
            fallback: None,
        }
    }

    /// Error respondido por la vía normal, si lo hubo
    pub fn fallback(&self) -> Option<&(StatusCode, String)> {
        self.fallback.as_ref()
    }
}

impl Hijacker for MemoryHijacker {
    fn hijack(&mut self) -> Result<Box<dyn Connection>> {
        if !self.supported {
            return Err(Error::HijackUnsupported);
        }
        Ok(Box::new(self.connection.clone()))
    }

    fn fallback_error(&mut self, status: StatusCode, message: &str) -> io::Result<()> {
        self.fallback = Some((status, message.to_string()));
        Ok(())
    }
}
