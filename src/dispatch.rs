//! # Dispatcher
//! src/dispatch.rs
//!
//! Recorre las rutas que coinciden con el request usando una continuación
//! explícita ([`Next`]) en lugar de la pila de llamadas:
//!
//! ```text
//! loop:
//!   ¿respuesta terminada? ─── sí ──► fin
//!   buscar desde cursor ─── nada ──► 404 si no corrió ninguna ruta real,
//!        │                           si no, solo end()
//!        ▼
//!   cursor = índice + 1
//!   handler(req, res, next)   (puede llamar a next.call por su cuenta)
//! ```
//!
//! Si un handler retorna sin terminar la respuesta ni llamar a `next`, el
//! bucle avanza solo a la siguiente ruta. Un error o un panic en cualquier
//! handler se convierte en un 500 si la respuesta todavía no terminó.

use crate::error::Result;
use crate::http::{Method, Request, Response, StatusCode};
use crate::router::Router;
use log::{debug, error};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Continuación del dispatch de un request
///
/// Guarda el cursor sobre la lista de rutas del método y cuántas rutas
/// reales (no middlewares) corrieron.
pub struct Next<'r> {
    router: &'r Router,
    method: Method,
    cursor: usize,
    executed_routes: usize,
}

impl<'r> Next<'r> {
    pub fn new(router: &'r Router, method: Method) -> Self {
        Self {
            router,
            method,
            cursor: 0,
            executed_routes: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rutas reales que ya corrieron
    pub fn executed_routes(&self) -> usize {
        self.executed_routes
    }

    /// Corre el resto de la cadena hasta que la respuesta termine
    pub fn call(&mut self, req: &mut Request, res: &mut Response) -> Result<()> {
        let router: &'r Router = self.router;

        loop {
            if res.has_ended() {
                return Ok(());
            }

            let path = req.path().to_string();
            let Some(found) = router.find_from(self.cursor, self.method, &path, req.params_mut())
            else {
                return self.finish(res);
            };

            if !found.is_middleware {
                self.executed_routes += 1;
            }
            self.cursor = found.index + 1;
            debug!("{} {} → route #{}", self.method, path, found.index);

            (found.handler)(req, res, self)?;
        }
    }

    /// Cierra el request cuando no quedan rutas
    fn finish(&self, res: &mut Response) -> Result<()> {
        if self.executed_routes == 0 {
            if res.can_send_header() {
                res.set_status(StatusCode::NotFound);
            }
            res.write("Not Found")?;
        }
        res.end()
    }
}

/// Corre la cadena de handlers para un request
///
/// Nunca falla: los errores y panics de los handlers se registran y, si la
/// respuesta sigue abierta, se responden con un 500.
pub fn dispatch(router: &Router, req: &mut Request, res: &mut Response) {
    let method = req.method();
    let url = req.url().to_string();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut next = Next::new(router, method);
        next.call(req, res)
    }));

    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };

    error!("{} {}: {}", method, url, failure);
    if !res.has_ended() {
        if let Err(e) = res.error(StatusCode::InternalServerError, "Internal server error") {
            debug!("couldn't send the 500 response: {}", e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::http::MemoryConnection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn run(router: &Router, raw: &str) -> String {
        let conn = MemoryConnection::new();
        let mut req = Request::parse(raw.as_bytes()).unwrap();
        let mut res = Response::new(Box::new(conn.clone()), &req);
        dispatch(router, &mut req, &mut res);
        assert!(res.has_ended());
        conn.written_string()
    }

    fn get(path: &str) -> String {
        format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path)
    }

    #[test]
    fn test_no_routes_is_404() {
        let router = Router::new();
        let wire = run(&router, &get("/"));

        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(wire.ends_with("9\r\nNot Found\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_only_middleware_is_404() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        let counter = Arc::clone(&hits);
        router
            .use_middleware(move |_req, _res, _next| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let wire = run(&router, &get("/anything"));
        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_route_without_body_ends_without_404() {
        let mut router = Router::new();
        router.get("/quiet", |_req, _res, _next| Ok(())).unwrap();

        let wire = run(&router, &get("/quiet"));
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(!wire.contains("Not Found"));
        assert!(wire.ends_with("\r\n\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_params_reach_handler() {
        let mut router = Router::new();
        router
            .get("/:name/:id", |req, res, _next| {
                let body = format!(
                    "{}-{}",
                    req.params().get("name").unwrap_or(""),
                    req.params().get("id").unwrap_or("")
                );
                res.write(body)?;
                res.end()
            })
            .unwrap();

        let wire = run(&router, &get("/alice/42"));
        assert!(wire.contains("8\r\nalice-42\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_chain_runs_in_order_with_auto_advance() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut router = Router::new();

        let o = Arc::clone(&order);
        router
            .use_middleware(move |_req, res, _next| {
                o.lock().unwrap().push("mw");
                res.set_header("X-Powered-By", "express_core");
                Ok(())
            })
            .unwrap();
        let o = Arc::clone(&order);
        router
            .get("/", move |_req, res, _next| {
                o.lock().unwrap().push("first");
                res.write("a")?;
                Ok(())
            })
            .unwrap();
        let o = Arc::clone(&order);
        router
            .get("/", move |_req, res, _next| {
                o.lock().unwrap().push("second");
                res.write("b")?;
                res.end()
            })
            .unwrap();
        let o = Arc::clone(&order);
        router
            .get("/", move |_req, _res, _next| {
                o.lock().unwrap().push("never");
                Ok(())
            })
            .unwrap();

        let wire = run(&router, &get("/"));
        assert_eq!(*order.lock().unwrap(), vec!["mw", "first", "second"]);
        assert!(wire.contains("X-Powered-By: express_core\r\n"));
        assert!(wire.ends_with("1\r\na\r\n1\r\nb\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_explicit_next_runs_rest_before_returning() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut router = Router::new();

        let o = Arc::clone(&order);
        router
            .use_middleware(move |req, res, next| {
                o.lock().unwrap().push("before");
                next.call(req, res)?;
                o.lock().unwrap().push("after");
                assert!(res.has_ended());
                Ok(())
            })
            .unwrap();
        let o = Arc::clone(&order);
        router
            .get("/", move |_req, res, _next| {
                o.lock().unwrap().push("route");
                res.write("ok")?;
                res.end()
            })
            .unwrap();

        run(&router, &get("/"));
        assert_eq!(*order.lock().unwrap(), vec!["before", "route", "after"]);
    }

    #[test]
    fn test_each_handler_runs_at_most_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        let counter = Arc::clone(&hits);
        router
            .use_middleware(move |req, res, next| {
                counter.fetch_add(1, Ordering::SeqCst);
                next.call(req, res)?;
                next.call(req, res)
            })
            .unwrap();
        router.get("/", |_req, _res, _next| Ok(())).unwrap();

        run(&router, &get("/"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_method_lists_are_separate() {
        let mut router = Router::new();
        router.post("/items", |_req, res, _next| res.end()).unwrap();

        let wire = run(&router, &get("/items"));
        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));

        let wire = run(&router, "POST /items HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    fn test_head_has_no_route_list() {
        let mut router = Router::new();
        router.get("/", |_req, res, _next| res.end()).unwrap();
        router.use_middleware(|_req, _res, _next| Ok(())).unwrap();

        let wire = run(&router, "HEAD / HTTP/1.1\r\n\r\n");
        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn test_panic_becomes_500() {
        let mut router = Router::new();
        router
            .get("/boom", |_req, _res, _next| -> Result<()> { panic!("kaboom") })
            .unwrap();

        let wire = run(&router, &get("/boom"));
        assert!(wire.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(wire.contains("Internal server error"));
    }

    #[test]
    fn test_error_becomes_500() {
        let mut router = Router::new();
        router
            .get("/fail", |_req, _res, _next| {
                Err(Error::Template("missing".to_string()))
            })
            .unwrap();

        let wire = run(&router, &get("/fail"));
        assert!(wire.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[test]
    fn test_panic_after_end_only_logs() {
        let mut router = Router::new();
        router
            .get("/late", |_req, res, _next| {
                res.write("done")?;
                res.end()?;
                panic!("after end");
            })
            .unwrap();

        let wire = run(&router, &get("/late"));
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(!wire.contains("Internal server error"));
        assert_eq!(wire.matches("0\r\n\r\n").count(), 1);
    }

    #[test]
    fn test_panic_after_body_closes_with_terminator() {
        let mut router = Router::new();
        router
            .get("/partial", |_req, res, _next| -> Result<()> {
                res.write("half")?;
                panic!("midway");
            })
            .unwrap();

        let wire = run(&router, &get("/partial"));
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(wire.matches("HTTP/1.1").count(), 1);
        assert!(wire.ends_with("0\r\n\r\n"));
    }
}
