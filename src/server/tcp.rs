//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Bucle de accept con un thread por conexión. Cada thread lee un request,
//! le entrega el socket a la aplicación (`Express::serve`) y termina cuando
//! la respuesta cierra la conexión.
//!
//! ## Apagado ordenado
//!
//! ```text
//! Ctrl-C ──► flag de apagado ──► hook before_shutdown
//!                                 │
//!                                 ├─► deja de aceptar
//!                                 └─► espera conexiones activas
//!                                     (hasta drain timeout)
//! ```

use super::app::Express;
use crate::error::{Error, Result};
use crate::http::{Hijacker, ParseError, Request, StatusCode, TcpHijacker};
use log::{debug, error, info, warn};
use std::io::{self, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Cada cuánto se revisa el flag de apagado mientras no hay conexiones
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Tiempo máximo esperando el request de un cliente
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Permite pedir el apagado del servidor desde otro thread
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Decrementa el contador de conexiones activas al terminar el thread
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Servidor HTTP/1.1 concurrente
pub struct Server {
    app: Arc<Express>,
    shutdown: ShutdownHandle,
    active: Arc<AtomicUsize>,
}

impl Server {
    pub fn new(app: Express) -> Self {
        Self {
            app: Arc::new(app),
            shutdown: ShutdownHandle::default(),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Conexiones que se están atendiendo en este momento
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Escucha en `address` hasta que se pida el apagado
    pub fn run(&self, address: impl ToSocketAddrs) -> io::Result<()> {
        let listener = TcpListener::bind(address)?;
        self.run_on(listener)
    }

    /// Atiende conexiones sobre un listener ya abierto
    pub fn run_on(&self, listener: TcpListener) -> io::Result<()> {
        listener.set_nonblocking(true)?;
        info!("listening on {}", listener.local_addr()?);

        while !self.shutdown.is_shutdown() {
            match listener.accept() {
                Ok((stream, peer)) => self.spawn_connection(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => error!("error accepting connection: {}", e),
            }
        }

        info!("shutting down");
        self.app.run_before_shutdown();
        drop(listener);
        info!("no longer accepting connections");
        self.drain();
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        debug!("new connection from {}", peer);
        let app = Arc::clone(&self.app);
        let guard = ActiveGuard::new(&self.active);

        thread::spawn(move || {
            let _guard = guard;
            if let Err(e) = handle_connection(&app, stream) {
                debug!("connection {} finished with error: {}", peer, e);
            }
        });
    }

    /// Espera a que terminen las conexiones activas, hasta el drain timeout
    fn drain(&self) {
        let deadline = Instant::now() + self.app.drain_timeout();
        while self.active_connections() > 0 {
            if Instant::now() >= deadline {
                warn!(
                    "drain timeout reached with {} connection(s) still open",
                    self.active_connections()
                );
                return;
            }
            thread::sleep(ACCEPT_POLL_INTERVAL);
        }
        info!("all connections drained");
    }
}

/// Lee un request de `stream` y se lo pasa a la aplicación
///
/// Un request mal formado se responde con 400 sin llegar al router.
pub fn handle_connection(app: &Express, stream: TcpStream) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut hijacker = TcpHijacker::new(stream);

    match Request::read_from(&mut reader) {
        Ok(request) => app.serve(request, &mut hijacker),
        Err(ParseError::EmptyRequest) => {
            debug!("peer closed the connection without a request");
            Ok(())
        }
        Err(e) => {
            warn!("invalid request: {}", e);
            hijacker.fallback_error(StatusCode::BadRequest, &format!("Invalid request: {}", e))?;
            Err(Error::Parse(e))
        }
    }
}

impl Express {
    /// Escucha en `address` con un thread por conexión
    ///
    /// Ctrl-C corre el hook `before_shutdown`, detiene el accept y espera a
    /// las conexiones activas hasta el drain timeout.
    pub fn listen(self, address: impl ToSocketAddrs) -> Result<()> {
        let server = Server::new(self);
        let handle = server.shutdown_handle();
        if let Err(e) = ctrlc::set_handler(move || handle.shutdown()) {
            warn!("couldn't install the Ctrl-C handler: {}", e);
        }
        server.run(address).map_err(Error::from)
    }
}
