//! # Templates
//! src/template.rs
//!
//! El renderizado de templates es un colaborador externo: recibe la ruta de
//! un archivo y un valor de datos y devuelve bytes. El `Response` convierte
//! cualquier falla en un 500 y, si sale bien, escribe la salida con `write`.
//!
//! [`JinjaEngine`] es el motor por defecto, sobre `minijinja`. Los archivos
//! `.html`, `.htm` y `.xml` se renderizan con autoescape de HTML.

use crate::error::{Error, Result};
use minijinja::Environment;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Motor de templates
pub trait TemplateEngine: Send + Sync {
    fn render(&self, path: &Path, data: &Value) -> Result<Vec<u8>>;
}

/// Motor Jinja: `{{ clave }}`, `{% if %}`, `{% for %}`, filtros, etc.
///
/// Lee el template del disco en cada render. Claves que no existen en
/// `data` se renderizan vacías.
#[derive(Debug, Clone, Copy, Default)]
pub struct JinjaEngine;

impl TemplateEngine for JinjaEngine {
    fn render(&self, path: &Path, data: &Value) -> Result<Vec<u8>> {
        let source = fs::read_to_string(path)
            .map_err(|e| Error::Template(format!("{}: {}", path.display(), e)))?;
        // el autoescape se decide por la extensión del nombre
        let name = path.to_string_lossy();

        let mut env = Environment::new();
        env.add_template(&name, &source).map_err(template_error)?;
        let output = env
            .get_template(&name)
            .and_then(|template| template.render(data))
            .map_err(template_error)?;

        Ok(output.into_bytes())
    }
}

fn template_error(err: minijinja::Error) -> Error {
    Error::Template(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn template_file(suffix: &str, source: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(source.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_render_from_file() {
        let file = template_file(".txt", "{{ Greeting }}, {{Subject}}! x{{ Count }}{{ missing }}");

        let out = JinjaEngine
            .render(
                file.path(),
                &json!({"Greeting": "Hello", "Subject": "world", "Count": 3}),
            )
            .unwrap();
        assert_eq!(out, b"Hello, world! x3");
    }

    #[test]
    fn test_html_values_are_escaped() {
        let file = template_file(".html", "<p>{{ name }}</p>");

        let out = JinjaEngine
            .render(file.path(), &json!({"name": "<script>alert(1)</script>"}))
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("<p>&lt;script&gt;alert(1)"));
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn test_plain_text_is_not_escaped() {
        let file = template_file(".txt", "{{ name }}");

        let out = JinjaEngine
            .render(file.path(), &json!({"name": "a < b"}))
            .unwrap();
        assert_eq!(out, b"a < b");
    }

    #[test]
    fn test_syntax_error_fails() {
        let file = template_file(".html", "{{ oops");
        let result = JinjaEngine.render(file.path(), &json!({}));
        assert!(matches!(result, Err(Error::Template(_))));
    }

    #[test]
    fn test_render_missing_file_fails() {
        let result = JinjaEngine.render(Path::new("/no/such/template.html"), &json!({}));
        assert!(matches!(result, Err(Error::Template(_))));
    }
}
