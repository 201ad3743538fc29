//! # Patrones de rutas
//! src/router/pattern.rs
//!
//! Convierte un patrón estilo Express en una expresión regular anclada:
//!
//! ```text
//! /users/:id            →  ^/users/(?P<id>[A-Za-z0-9\-_$.+!*'(),]+)/?$
//! /files/:id(\d+)       →  ^/files/(?P<id>(\d+))/?$
//! (.*)                  →  ^/(.*)/?$
//! ```
//!
//! - `:nombre` captura un segmento con la clase por defecto.
//! - `:nombre(regex)` usa la regex dada; los paréntesis se balancean y `\(`
//!   no cuenta.
//! - El nombre es `[A-Za-z0-9_]+`; lo que sigue se toma como literal.
//! - El resto del patrón pasa tal cual a la regex, así que se pueden usar
//!   grupos y cuantificadores inline.
//! - Siempre se acepta un `/` final opcional.

use crate::error::{Error, Result};
use regex::Regex;

/// Clase de caracteres de un parámetro sin regex propia
pub const DEFAULT_CAPTURE: &str = r"[A-Za-z0-9\-_$.+!*'(),]+";

/// Patrón de ruta compilado
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compila un patrón de ruta
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use express_core::router::Pattern;
    ///
    /// let pattern = Pattern::compile("/:name/:id").unwrap();
    /// let params = pattern.captures("/alice/42").unwrap();
    /// assert_eq!(params, vec![
    ///     ("name".to_string(), "alice".to_string()),
    ///     ("id".to_string(), "42".to_string()),
    /// ]);
    ///
    /// assert!(Pattern::compile("/:id(\\d+").is_err());
    /// ```
    pub fn compile(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let chars: Vec<char> = pattern.chars().collect();
        let mut end = chars.len();
        if end > 1 && chars[end - 1] == '/' && chars[end - 2] != '\\' {
            end -= 1;
        }

        let mut source = String::from("^/");
        let mut names: Vec<String> = Vec::new();
        let mut i = usize::from(chars.first() == Some(&'/'));

        while i < end {
            match chars[i] {
                ':' => {
                    i += 1;
                    let start = i;
                    while i < end && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                    let name: String = chars[start..i].iter().collect();
                    if name.is_empty() {
                        return Err(invalid("empty parameter name"));
                    }
                    if names.contains(&name) {
                        return Err(invalid(&format!("duplicate parameter `{}`", name)));
                    }

                    source.push_str("(?P<");
                    source.push_str(&name);
                    source.push('>');
                    if i < end && chars[i] == '(' {
                        let close = group_end(&chars[..end], i)
                            .ok_or_else(|| invalid("unterminated group"))?;
                        source.extend(&chars[i..=close]);
                        i = close + 1;
                    } else {
                        source.push_str(DEFAULT_CAPTURE);
                    }
                    source.push(')');
                    names.push(name);
                }
                '\\' => {
                    source.push('\\');
                    if let Some(next) = chars.get(i + 1).filter(|_| i + 1 < end) {
                        source.push(*next);
                    }
                    i += 2;
                }
                c => {
                    source.push(c);
                    i += 1;
                }
            }
        }
        source.push_str("/?$");

        let regex = Regex::new(&source).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Patrón que coincide con cualquier path (usado por los middlewares)
    pub fn catch_all() -> Result<Self> {
        Self::compile("(.*)")
    }

    /// Patrón original, tal como se registró
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Parámetros con nombre que participaron en el match, en orden
    ///
    /// `None` si el path no coincide.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        let params = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Some(params)
    }
}

/// Índice del `)` que cierra el grupo abierto en `open`
fn group_end(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pattern: &str, path: &str) -> Option<Vec<(String, String)>> {
        Pattern::compile(pattern).unwrap().captures(path)
    }

    #[test]
    fn test_named_segments() {
        let got = params("/:name/:id", "/alice/42").unwrap();
        assert_eq!(
            got,
            vec![
                ("name".to_string(), "alice".to_string()),
                ("id".to_string(), "42".to_string())
            ]
        );
    }

    #[test]
    fn test_literal_route() {
        let pattern = Pattern::compile("/about").unwrap();
        assert!(pattern.is_match("/about"));
        assert!(pattern.is_match("/about/"));
        assert!(!pattern.is_match("/about/us"));
        assert!(!pattern.is_match("/aboutus"));
        assert_eq!(pattern.captures("/about").unwrap(), vec![]);
    }

    #[test]
    fn test_root_route() {
        let pattern = Pattern::compile("/").unwrap();
        assert!(pattern.is_match("/"));
        assert!(!pattern.is_match("/x"));
    }

    #[test]
    fn test_trailing_slash_in_pattern() {
        let pattern = Pattern::compile("/users/").unwrap();
        assert!(pattern.is_match("/users"));
        assert!(pattern.is_match("/users/"));
    }

    #[test]
    fn test_default_capture_rejects_slash() {
        assert!(params("/user/:id", "/user/a/b").is_none());
        assert_eq!(
            params("/user/:id", "/user/a.b-c_d$(1)").unwrap()[0].1,
            "a.b-c_d$(1)"
        );
    }

    #[test]
    fn test_custom_regex() {
        let pattern = Pattern::compile(r"/files/:id(\d+)").unwrap();
        assert_eq!(pattern.captures("/files/123").unwrap()[0].1, "123");
        assert!(pattern.captures("/files/abc").is_none());
    }

    #[test]
    fn test_custom_regex_with_nested_groups() {
        let pattern = Pattern::compile(r"/v/:ver((\d+)\.(\d+))/:rest").unwrap();
        let got = pattern.captures("/v/1.20/docs").unwrap();
        assert_eq!(
            got,
            vec![
                ("ver".to_string(), "1.20".to_string()),
                ("rest".to_string(), "docs".to_string())
            ]
        );
    }

    #[test]
    fn test_escaped_paren_does_not_close_group() {
        let pattern = Pattern::compile(r"/:v(a\)b)").unwrap();
        assert_eq!(pattern.captures("/a)b").unwrap()[0].1, "a)b");
    }

    #[test]
    fn test_name_followed_by_literal() {
        let pattern = Pattern::compile("/:file.json").unwrap();
        // el punto es literal de regex: cualquier caracter
        assert_eq!(pattern.captures("/data.json").unwrap()[0].1, "data");
    }

    #[test]
    fn test_unterminated_group_fails() {
        let err = Pattern::compile(r"/:id(\d+").unwrap_err();
        match err {
            Error::InvalidPattern { reason, .. } => assert_eq!(reason, "unterminated group"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_name_fails() {
        assert!(matches!(
            Pattern::compile("/:/x"),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_duplicate_name_fails() {
        assert!(matches!(
            Pattern::compile("/:id/:id"),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_invalid_inline_regex_fails() {
        assert!(matches!(
            Pattern::compile("/a[b"),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_catch_all_matches_everything() {
        let pattern = Pattern::catch_all().unwrap();
        assert!(pattern.is_match("/"));
        assert!(pattern.is_match("/a/b/c"));
        assert_eq!(pattern.captures("/a/b").unwrap(), vec![]);
        assert_eq!(pattern.as_str(), "(.*)");
    }
}
