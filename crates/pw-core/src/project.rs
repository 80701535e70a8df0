//! Project model and the persistence boundary.
//!
//! A project is written to its store wholesale; there are no partial updates.
//! MessagePack (`rmp-serde`) is the storage encoding, JSON is for export.

use crate::error::ProjectError;
use crate::scanner::LayerTree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A named design value (`primary` → `#3b82f6`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub value: String,
}

/// Ordered token catalogs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignTokens {
    pub colors: Vec<Token>,
    pub typography: Vec<Token>,
    pub spacing: Vec<Token>,
}

impl DesignTokens {
    /// Insert or replace a token, keeping catalog order.
    pub fn set(catalog: &mut Vec<Token>, name: &str, value: &str) {
        if let Some(token) = catalog.iter_mut().find(|t| t.name == name) {
            token.value = value.to_string();
        } else {
            catalog.push(Token {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    pub fn get<'a>(catalog: &'a [Token], name: &str) -> Option<&'a str> {
        catalog
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Source documents by path.
    pub documents: BTreeMap<String, String>,
    pub tokens: DesignTokens,
    /// Last settled layer tree per document, without live handles.
    pub layer_cache: BTreeMap<String, LayerTree>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn document(&self, path: &str) -> Option<&str> {
        self.documents.get(path).map(String::as_str)
    }

    pub fn set_document(&mut self, path: &str, text: String) {
        self.documents.insert(path.to_string(), text);
    }

    /// Cache a scan for `path`. Live handles are dropped.
    pub fn cache_layers(&mut self, path: &str, layers: &LayerTree) {
        self.layer_cache.insert(path.to_string(), layers.snapshot());
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, ProjectError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, ProjectError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ProjectError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Key-value persistence for whole projects.
pub trait ProjectStore {
    fn put(&mut self, key: &str, project: &Project) -> Result<(), ProjectError>;
    fn get(&self, key: &str) -> Result<Option<Project>, ProjectError>;
}

/// In-process store holding encoded bytes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProjectStore for MemoryStore {
    fn put(&mut self, key: &str, project: &Project) -> Result<(), ProjectError> {
        let bytes = project.to_msgpack()?;
        log::debug!("stored project {key:?} ({} bytes)", bytes.len());
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Project>, ProjectError> {
        self.entries
            .get(key)
            .map(|bytes| Project::from_msgpack(bytes))
            .transpose()
    }
}
