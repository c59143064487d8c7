//! Classification type → category label service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::Result;

/// Resolves a classification id to the label indexed for it.
pub trait CategoryNames {
    fn category_name(&self, type_id: u32) -> Option<&str>;
}

/// JSON-backed table stored in the `classif` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classificator {
    #[serde(default)]
    pub types: BTreeMap<u32, String>,
}

impl Classificator {
    pub fn load(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn insert(&mut self, type_id: u32, label: impl Into<String>) {
        self.types.insert(type_id, label.into());
    }
}

impl CategoryNames for Classificator {
    fn category_name(&self, type_id: u32) -> Option<&str> {
        self.types.get(&type_id).map(|s| s.as_str())
    }
}
