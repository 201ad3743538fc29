//! # Tabla de rutas
//! src/router/table.rs
//!
//! Una lista ordenada de rutas por método. El orden de registro es el orden
//! de ejecución: la búsqueda siempre avanza desde un cursor y nunca vuelve
//! atrás, así que cada handler corre a lo sumo una vez por request.
//!
//! ```text
//! GET    → [ mw(.*) , /users/:id , mw(.*) , /about ]
//! POST   → [ mw(.*) , /users ]
//!              ▲ cursor
//! ```

use super::pattern::Pattern;
use crate::dispatch::Next;
use crate::error::Result;
use crate::http::{Method, Params, Request, Response};
use std::collections::HashMap;
use std::sync::Arc;

/// Handler de una ruta o middleware
///
/// Recibe el request, la respuesta y la continuación. Llamar a
/// `next.call(req, res)` corre el resto de la cadena antes de volver.
pub type Handler =
    Arc<dyn Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync>;

/// Patrón + handler
#[derive(Clone)]
pub struct Route {
    pattern: Pattern,
    handler: Handler,
    is_middleware: bool,
}

impl Route {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn is_middleware(&self) -> bool {
        self.is_middleware
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.as_str())
            .field("is_middleware", &self.is_middleware)
            .finish()
    }
}

/// Resultado de una búsqueda
pub struct Found<'r> {
    pub handler: &'r Handler,
    /// Posición de la ruta en la lista del método
    pub index: usize,
    pub is_middleware: bool,
}

/// Router: rutas agrupadas por método
#[derive(Debug, Clone)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
}

impl Router {
    /// Crea un router con una lista vacía por cada método enrutable
    pub fn new() -> Self {
        let routes = Method::ROUTABLE
            .iter()
            .map(|method| (*method, Vec::new()))
            .collect();
        Self { routes }
    }

    fn add(&mut self, method: Method, pattern: Pattern, is_middleware: bool, handler: Handler) {
        self.routes.entry(method).or_default().push(Route {
            pattern,
            handler,
            is_middleware,
        });
    }

    /// Registra `handler` para `method` y el patrón dado
    ///
    /// Falla si el patrón no compila.
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use express_core::http::Method;
    /// use express_core::router::Router;
    ///
    /// let mut router = Router::new();
    /// router
    ///     .route(Method::GET, "/users/:id", |req, res, _next| {
    ///         let id = req.params().get("id").unwrap_or("").to_string();
    ///         res.write(id)?;
    ///         Ok(())
    ///     })
    ///     .unwrap();
    /// assert_eq!(router.routes(Method::GET).len(), 1);
    /// ```
    pub fn route<F>(&mut self, method: Method, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let pattern = Pattern::compile(pattern)?;
        self.add(method, pattern, false, Arc::new(handler));
        Ok(self)
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, pattern, handler)
    }

    pub fn options<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.route(Method::OPTIONS, pattern, handler)
    }

    /// Registra un middleware para todos los paths de todos los métodos
    ///
    /// Los middlewares no cuentan como rutas ejecutadas: si solo corren
    /// middlewares, el request termina en 404.
    pub fn use_middleware<F>(&mut self, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let pattern = Pattern::catch_all()?;
        let handler: Handler = Arc::new(handler);
        for method in Method::ROUTABLE {
            self.add(method, pattern.clone(), true, Arc::clone(&handler));
        }
        Ok(self)
    }

    /// Agrega al final las rutas de otro router, método por método
    pub fn use_router(&mut self, other: &Router) -> &mut Self {
        for (method, routes) in &other.routes {
            self.routes
                .entry(*method)
                .or_default()
                .extend(routes.iter().cloned());
        }
        self
    }

    /// Rutas registradas para `method`, en orden
    pub fn routes(&self, method: Method) -> &[Route] {
        self.routes.get(&method).map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// Total de rutas en todas las listas
    pub fn len(&self) -> usize {
        self.routes.values().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Busca la primera ruta de `method` en posición `>= cursor` que
    /// coincide con `path`
    ///
    /// Los parámetros capturados se escriben en `params`, sobrescribiendo
    /// claves previas.
    pub fn find_from(
        &self,
        cursor: usize,
        method: Method,
        path: &str,
        params: &mut Params,
    ) -> Option<Found<'_>> {
        let routes = self.routes.get(&method)?;

        routes
            .iter()
            .enumerate()
            .skip(cursor)
            .find_map(|(index, route)| {
                let captures = route.pattern.captures(path)?;
                for (name, value) in &captures {
                    params.set(name, value);
                }
                Some(Found {
                    handler: &route.handler,
                    index,
                    is_middleware: route.is_middleware,
                })
            })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
