//! # Express Core - Entry Point
//! src/main.rs
//!
//! Servidor de ejemplo: rutas con parámetros, middleware, formularios, JSON,
//! archivos estáticos, descargas y templates.

use express_core::config::Config;
use express_core::http::{Cookie, CookieJar, StatusCode};
use express_core::server::Express;
use express_core::template::JinjaEngine;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
struct User {
    email: String,
    name: String,
}

fn build_app(config: &Config) -> express_core::Result<Express> {
    let mut app = Express::new();
    app.set_prop("log", config.log_requests)
        .set_chunk_size(config.chunk_size)
        .shutdown_timeout(config.drain_timeout())
        .set_templates(Arc::new(JinjaEngine))
        .before_shutdown(|_app| info!("closing connections"));

    app.use_middleware(|req, res, _next| {
        res.set_header("X-Powered-By", "express_core");
        let visits = req
            .cookies()
            .get("visits")
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(0);
        res.cookies_mut()
            .add(Cookie::build(("visits", (visits + 1).to_string())).path("/"));
        Ok(())
    })?;

    // ?name=foobar
    app.get("/", |req, res, _next| {
        let name = req.query("name").unwrap_or("world").to_string();
        res.write(format!("Hello {}!", name))?;
        res.end()
    })?;

    app.get("/users/:name/:id(\\d+)", |req, res, _next| {
        let msg = format!(
            "Name: {}, ID: {}",
            req.params().get("name").unwrap_or(""),
            req.params().get("id").unwrap_or("")
        );
        res.write(msg)?;
        res.end()
    })?;

    app.post("/form", |req, res, _next| {
        if req.is_json() {
            return match req.json::<User>() {
                Ok(user) => res.json(&user),
                Err(_) => res.error(StatusCode::BadRequest, "Invalid input sent"),
            };
        }
        res.json(req.body_all("name"))
    })?;

    app.delete("/session", |_req, res, _next| {
        res.cookies_mut().del("visits");
        res.redirect("/")
    })?;

    app.get("/hello", |_req, res, _next| {
        let data = serde_json::json!({"Greeting": "Hello", "Subject": "world"});
        res.render("templates/hello.html", &data)
    })?;

    let public = PathBuf::from(&config.public_dir);
    let static_dir = public.clone();
    app.get("/static/:file", move |req, res, _next| {
        let file = req.params().get("file").unwrap_or("");
        res.send_file(static_dir.join(file), false)?;
        Ok(())
    })?;

    app.get("/download/:file", move |req, res, _next| {
        let file = req.params().get("file").unwrap_or("").to_string();
        res.download(public.join(Path::new(&file)), &file)?;
        Ok(())
    })?;

    Ok(app)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::new();
    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("address: {}", config.address());
    info!("public dir: {}", config.public_dir);
    info!("chunk size: {} bytes", config.chunk_size);

    let app = match build_app(&config) {
        Ok(app) => app,
        Err(e) => {
            error!("invalid route table: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.listen(config.address()) {
        error!("fatal error: {}", e);
        std::process::exit(1);
    }
}
