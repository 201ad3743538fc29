//! # Decodificación del body
//! src/http/body.rs
//!
//! El núcleo no interpreta formularios multipart ni otros formatos de body:
//! delega en un [`BodyDecoder`] que corre antes del dispatch y deja el
//! resultado guardado en el `Request`.
//!
//! [`FormDecoder`] es el decoder por defecto:
//! - `application/x-www-form-urlencoded` → mapa de campos
//! - `application/json` → marca el request como JSON (se decodifica bajo
//!   demanda con `Request::json`)
//! - cualquier otro tipo → nada

use std::collections::HashMap;
use std::io::Cursor;

/// Archivo subido en un formulario
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    /// Nombre original del archivo
    pub name: String,
    /// Campo del formulario que lo contenía
    pub form_name: String,
    /// Headers MIME de la parte
    pub headers: HashMap<String, String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.as_str())
    }

    /// Lector sobre el contenido del archivo
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.data)
    }
}

/// Resultado de decodificar un body
#[derive(Debug, Clone, Default)]
pub struct DecodedBody {
    pub form: HashMap<String, Vec<String>>,
    pub files: Vec<UploadedFile>,
    pub is_json: bool,
}

/// Colaborador externo que interpreta el body de un request
pub trait BodyDecoder: Send + Sync {
    fn decode(&self, content_type: Option<&str>, body: &[u8]) -> DecodedBody;
}

/// Decoder por defecto: urlencoded y detección de JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct FormDecoder;

impl BodyDecoder for FormDecoder {
    fn decode(&self, content_type: Option<&str>, body: &[u8]) -> DecodedBody {
        let mut decoded = DecodedBody::default();

        let Some(content_type) = content_type else {
            return decoded;
        };
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "application/json" => decoded.is_json = true,
            "application/x-www-form-urlencoded" => {
                decoded.form = parse_urlencoded(body);
            }
            _ => {}
        }

        decoded
    }
}

/// Parsea `a=1&b=2&a=3` en un mapa multi-valor
pub fn parse_urlencoded(input: &[u8]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        map.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencoded_form() {
        let decoded = FormDecoder.decode(
            Some("application/x-www-form-urlencoded"),
            b"keys=a&keys=b&name=hello+world",
        );

        assert_eq!(decoded.form.get("keys"), Some(&vec!["a".to_string(), "b".to_string()]));
        assert_eq!(decoded.form.get("name"), Some(&vec!["hello world".to_string()]));
        assert!(!decoded.is_json);
    }

    #[test]
    fn test_json_is_detected_with_charset() {
        let decoded = FormDecoder.decode(Some("application/json; charset=utf-8"), b"{}");
        assert!(decoded.is_json);
        assert!(decoded.form.is_empty());
    }

    #[test]
    fn test_unknown_content_type_is_ignored() {
        let decoded = FormDecoder.decode(Some("text/plain"), b"a=1");
        assert!(decoded.form.is_empty());
        assert!(!decoded.is_json);

        let decoded = FormDecoder.decode(None, b"a=1");
        assert!(decoded.form.is_empty());
    }

    #[test]
    fn test_uploaded_file_accessors() {
        let mut file = UploadedFile {
            name: "a.txt".to_string(),
            form_name: "upload".to_string(),
            data: b"contenido".to_vec(),
            ..UploadedFile::default()
        };
        file.headers.insert("Content-Type".to_string(), "text/plain".to_string());

        assert_eq!(file.content_type(), Some("text/plain"));
        assert_eq!(file.reader().into_inner(), b"contenido");
    }
}
