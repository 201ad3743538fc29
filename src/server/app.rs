//! # Aplicación
//! src/server/app.rs
//!
//! `Express` junta el router, las propiedades compartidas y los
//! colaboradores externos (decoder de body, motor de templates). Su punto de
//! entrada por conexión es [`Express::serve`]: toma el socket, arma el
//! `Response` y corre el dispatch.

use crate::dispatch::{dispatch, Next};
use crate::error::{Error, Result};
use crate::file::DEFAULT_CHUNK_SIZE;
use crate::http::{BodyDecoder, FormDecoder, Hijacker, Request, Response, StatusCode};
use crate::props::SharedProps;
use crate::router::Router;
use crate::template::TemplateEngine;
use log::{error, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Mensaje del 500 cuando la conexión no se puede tomar
pub const HIJACK_UNSUPPORTED_MESSAGE: &str = "Request Hijacking not supported for this request";

/// Tiempo de espera por defecto para drenar conexiones al apagar
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

type ShutdownHook = Box<dyn Fn(&Express) + Send + Sync>;

/// Aplicación HTTP
pub struct Express {
    router: Router,
    props: SharedProps,
    decoder: Arc<dyn BodyDecoder>,
    templates: Option<Arc<dyn TemplateEngine>>,
    chunk_size: usize,
    drain_timeout: Duration,
    before_shutdown: Option<ShutdownHook>,
}

impl Express {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            props: SharedProps::new(),
            decoder: Arc::new(FormDecoder),
            templates: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            before_shutdown: None,
        }
    }

    // === Registro de rutas ===

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.router.get(pattern, handler)?;
        Ok(self)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.router.post(pattern, handler)?;
        Ok(self)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.router.put(pattern, handler)?;
        Ok(self)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.router.patch(pattern, handler)?;
        Ok(self)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.router.delete(pattern, handler)?;
        Ok(self)
    }

    pub fn options<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.router.options(pattern, handler)?;
        Ok(self)
    }

    pub fn use_middleware<F>(&mut self, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.router.use_middleware(handler)?;
        Ok(self)
    }

    /// Monta las rutas de otro router después de las actuales
    pub fn use_router(&mut self, router: &Router) -> &mut Self {
        self.router.use_router(router);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    // === Propiedades ===

    /// Propiedad global, visible desde todos los requests
    pub fn set_prop(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.props.set(key, value);
        self
    }

    pub fn get_prop(&self, key: &str) -> Option<Value> {
        self.props.get(key)
    }

    pub fn props(&self) -> &SharedProps {
        &self.props
    }

    // === Colaboradores ===

    pub fn set_decoder(&mut self, decoder: Arc<dyn BodyDecoder>) -> &mut Self {
        self.decoder = decoder;
        self
    }

    pub fn set_templates(&mut self, engine: Arc<dyn TemplateEngine>) -> &mut Self {
        self.templates = Some(engine);
        self
    }

    /// Tamaño de bloque para el envío de archivos
    pub fn set_chunk_size(&mut self, chunk_size: usize) -> &mut Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    // === Apagado ===

    /// Cuánto esperar a las conexiones en curso antes de forzar el cierre
    pub fn shutdown_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Función a correr cuando llega la señal de apagado, antes de drenar
    pub fn before_shutdown<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Express) + Send + Sync + 'static,
    {
        self.before_shutdown = Some(Box::new(hook));
        self
    }

    pub(crate) fn run_before_shutdown(&self) {
        if let Some(hook) = &self.before_shutdown {
            hook(self);
        }
    }

    // === Entrada por conexión ===

    /// Atiende un request ya parseado sobre la conexión que entrega `hijacker`
    ///
    /// Si la conexión no se puede tomar responde 500 por la vía normal y no
    /// hace nada más.
    pub fn serve(&self, mut request: Request, hijacker: &mut dyn Hijacker) -> Result<()> {
        let connection = match hijacker.hijack() {
            Ok(connection) => connection,
            Err(e) => {
                warn!("{} {}: {}", request.method(), request.url(), e);
                if let Err(io) =
                    hijacker.fallback_error(StatusCode::InternalServerError, HIJACK_UNSUPPORTED_MESSAGE)
                {
                    error!("couldn't send the hijack fallback: {}", io);
                }
                return Err(Error::HijackUnsupported);
            }
        };

        request.set_props(self.props.clone());
        request.decode_body(self.decoder.as_ref());

        let mut response = Response::new(connection, &request).with_chunk_size(self.chunk_size);
        if let Some(engine) = &self.templates {
            response = response.with_templates(Arc::clone(engine));
        }

        dispatch(&self.router, &mut request, &mut response);
        Ok(())
    }
}

impl Default for Express {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{DecodedBody, MemoryConnection, MemoryHijacker, UploadedFile};
    use serde_json::json;

    fn serve(app: &Express, raw: &str) -> String {
        let conn = MemoryConnection::new();
        let mut hijacker = MemoryHijacker::new(conn.clone());
        let request = Request::parse(raw.as_bytes()).unwrap();
        app.serve(request, &mut hijacker).unwrap();
        conn.written_string()
    }

    #[test]
    fn test_serve_runs_routes() {
        let mut app = Express::new();
        app.get("/hello/:name", |req, res, _next| {
            let name = req.params().get("name").unwrap_or("").to_string();
            res.write(format!("Hello {}", name))?;
            res.end()
        })
        .unwrap();

        let wire = serve(&app, "GET /hello/ana HTTP/1.1\r\n\r\n");
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("9\r\nHello ana\r\n"));
    }

    #[test]
    fn test_hijack_unsupported_falls_back_to_500() {
        let app = Express::new();
        let conn = MemoryConnection::new();
        let mut hijacker = MemoryHijacker::unsupported(conn.clone());
        let request = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        let result = app.serve(request, &mut hijacker);
        assert!(matches!(result, Err(Error::HijackUnsupported)));
        let (status, message) = hijacker.fallback().unwrap();
        assert_eq!(*status, StatusCode::InternalServerError);
        assert_eq!(message, HIJACK_UNSUPPORTED_MESSAGE);
        assert!(conn.written().is_empty());
    }

    #[test]
    fn test_props_visible_from_handlers() {
        let mut app = Express::new();
        app.set_prop("site", "demo");
        app.get("/", |req, res, _next| {
            let site = req.props().get("site").unwrap_or(Value::Null);
            res.json(&site)
        })
        .unwrap();

        assert_eq!(app.get_prop("site"), Some(json!("demo")));
        let wire = serve(&app, "GET / HTTP/1.1\r\n\r\n");
        assert!(wire.contains("6\r\n\"demo\"\r\n"));
    }

    #[test]
    fn test_form_body_decoded_before_dispatch() {
        let mut app = Express::new();
        app.post("/login", |req, res, _next| {
            let user = req.body("user").unwrap_or("").to_string();
            res.write(user)?;
            res.end()
        })
        .unwrap();

        let wire = serve(
            &app,
            "POST /login HTTP/1.1\r\n\
             Content-Type: application/x-www-form-urlencoded\r\n\
             Content-Length: 8\r\n\r\nuser=bob",
        );
        assert!(wire.contains("3\r\nbob\r\n"));
    }

    struct UploadDecoder;

    impl BodyDecoder for UploadDecoder {
        fn decode(&self, _content_type: Option<&str>, body: &[u8]) -> DecodedBody {
            DecodedBody {
                files: vec![UploadedFile {
                    name: "a.txt".to_string(),
                    form_name: "file".to_string(),
                    data: body.to_vec(),
                    ..UploadedFile::default()
                }],
                ..DecodedBody::default()
            }
        }
    }

    #[test]
    fn test_custom_decoder() {
        let mut app = Express::new();
        app.set_decoder(Arc::new(UploadDecoder));
        app.post("/upload", |req, res, _next| {
            let summary = format!("{}:{}", req.files()[0].name, req.files()[0].data.len());
            res.write(summary)?;
            res.end()
        })
        .unwrap();

        let wire = serve(
            &app,
            "POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",
        );
        assert!(wire.contains("7\r\na.txt:5\r\n"));
    }

    #[test]
    fn test_use_router_mounts_routes() {
        let mut api = Router::new();
        api.get("/api/ping", |_req, res, _next| {
            res.write("pong")?;
            res.end()
        })
        .unwrap();

        let mut app = Express::new();
        app.use_router(&api);
        let wire = serve(&app, "GET /api/ping HTTP/1.1\r\n\r\n");
        assert!(wire.contains("4\r\npong\r\n"));
    }

    #[test]
    fn test_before_shutdown_hook_and_timeout() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let mut app = Express::new();
        app.shutdown_timeout(Duration::from_millis(250))
            .before_shutdown(move |_app| flag.store(true, Ordering::SeqCst));

        app.run_before_shutdown();
        assert!(called.load(Ordering::SeqCst));
        assert_eq!(app.drain_timeout(), Duration::from_millis(250));
    }
}
