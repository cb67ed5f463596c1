//! Model files on disk.
//!
//! A model file holds a [`System`] plus named views. Files are looked up by
//! name in the models directory with a `.json`, `.yaml` or `.yml` extension,
//! in that order.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::index::ContainmentIndex;
use crate::policy::ViewPolicy;
use crate::System;

/// Recognized model file extensions, in lookup order.
pub const MODEL_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Resolve the models directory: `$ARCHVIEW_HOME`, else `~/.archview/`.
pub fn models_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("ARCHVIEW_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".archview")
}

/// A stored system and its named views.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelFile {
    #[serde(flatten)]
    pub system: System,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub views: BTreeMap<String, ViewPolicy>,
}

impl ModelFile {
    pub fn new(system: System) -> Self {
        Self {
            system,
            views: BTreeMap::new(),
        }
    }

    pub fn with_view(mut self, name: impl Into<String>, policy: ViewPolicy) -> Self {
        self.views.insert(name.into(), policy);
        self
    }

    pub fn view(&self, name: &str) -> Option<&ViewPolicy> {
        self.views.get(name)
    }

    /// Check that the system indexes cleanly and every relation connects two
    /// relation ends.
    pub fn validate(&self) -> Result<()> {
        let index = ContainmentIndex::build(&self.system)?;
        index.model_links(&self.system.relations)?;
        Ok(())
    }
}

/// Parse model text, choosing the format from the path's extension.
/// Anything that is not YAML is read as JSON.
pub fn parse_model(path: &Path, raw: &str) -> Result<ModelFile> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(raw)?),
        _ => Ok(serde_json::from_str(raw)?),
    }
}

fn check_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains("..");
    if bad {
        return Err(Error::InvalidModelName(name.to_string()));
    }
    Ok(())
}

/// Directory of model files.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(models_dir())
    }
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Model names without extension, sorted. A name stored in several
    /// formats is listed once.
    pub fn list_models(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }
        let mut names: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                let ext = path.extension()?.to_str()?;
                if !MODEL_EXTENSIONS.contains(&ext) {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?;
                (!stem.starts_with('.')).then(|| stem.to_string())
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Path of the file backing `name`, if one exists.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        MODEL_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", name, ext)))
            .find(|path| path.is_file())
    }

    pub fn read_model(&self, name: &str) -> Result<ModelFile> {
        check_name(name)?;
        let path = self
            .locate(name)
            .ok_or_else(|| Error::ModelNotFound(name.to_string()))?;
        let raw = fs::read_to_string(&path)?;
        let model = parse_model(&path, &raw)?;
        debug!(model = name, path = %path.display(), parts = model.system.parts.len(), "model read");
        Ok(model)
    }

    /// Look up a named view of a stored model.
    pub fn read_view(&self, name: &str, view: &str) -> Result<ViewPolicy> {
        let model = self.read_model(name)?;
        model.view(view).cloned().ok_or_else(|| Error::ViewNotFound {
            model: name.to_string(),
            view: view.to_string(),
        })
    }

    /// Write `model` as `<name>.json`. The file is written next to its final
    /// path and renamed into place, so readers never see a partial file.
    /// YAML files of the same name are removed so the JSON copy is the one read back.
    pub fn write_model(&self, name: &str, model: &ModelFile) -> Result<PathBuf> {
        check_name(name)?;
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(model)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", name));
        let path = self.dir.join(format!("{}.json", name));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        for ext in &MODEL_EXTENSIONS[1..] {
            let stale = self.dir.join(format!("{}.{}", name, ext));
            if stale.is_file() {
                fs::remove_file(&stale)?;
            }
        }
        debug!(model = name, path = %path.display(), "model written");
        Ok(path)
    }

    /// Remove every file stored under `name`. Returns whether anything was removed.
    pub fn delete_model(&self, name: &str) -> Result<bool> {
        check_name(name)?;
        let mut removed = false;
        for ext in MODEL_EXTENSIONS {
            let path = self.dir.join(format!("{}.{}", name, ext));
            if path.is_file() {
                fs::remove_file(&path)?;
                removed = true;
            }
        }
        Ok(removed)
    }
}
