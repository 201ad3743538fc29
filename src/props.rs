//! # Propiedades compartidas de la aplicación
//! src/props.rs
//!
//! Mapa clave → valor JSON que la aplicación puede leer y escribir desde
//! cualquier handler. Se inyecta en cada request y cada response.
//!
//! El lock solo protege cada operación individual: una secuencia
//! leer-modificar-escribir desde handlers concurrentes puede intercalarse.
//! Coordinar eso es responsabilidad de la aplicación.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Handle clonable al mapa de propiedades
#[derive(Debug, Clone, Default)]
pub struct SharedProps {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl SharedProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(key).cloned()
    }

    /// `true` solo si la propiedad existe y es el booleano `true`
    pub fn is_true(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_shared_between_clones() {
        let props = SharedProps::new();
        let other = props.clone();
        other.set("name", "express");

        assert_eq!(props.get("name"), Some(json!("express")));
        assert_eq!(props.get("missing"), None);
    }

    #[test]
    fn test_is_true() {
        let props = SharedProps::new();
        props.set("log", true);
        props.set("count", 3);

        assert!(props.is_true("log"));
        assert!(!props.is_true("count"));
        assert!(!props.is_true("missing"));
    }

    #[test]
    fn test_remove() {
        let props = SharedProps::new();
        props.set("k", "v");
        assert_eq!(props.remove("k"), Some(json!("v")));
        assert_eq!(props.get("k"), None);
    }
}
