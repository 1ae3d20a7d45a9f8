//! Macro storage - one JSON document per macro
//!
//! Files are written as `{"version":1,"actions":[...]}`. Bare action arrays
//! (files without a version) are still accepted on load.

use crate::error::{Error, Result};
use crate::events::{Action, Macro};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    actions: &'a [Action],
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    actions: Value,
}

pub fn save_to_path(macro_: &Macro, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let write = || -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut w = BufWriter::new(File::create(path)?);
        serde_json::to_writer(
            &mut w,
            &EnvelopeRef {
                version: FORMAT_VERSION,
                actions: &macro_.actions,
            },
        )?;
        w.flush()?;
        Ok(())
    };
    write().map_err(|e| Error::save_failed(path, e))?;
    debug!(path = %path.display(), actions = macro_.len(), "saved macro");
    Ok(())
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Macro> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::load_failed(path, e))?;
    let value: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::load_failed(path, e))?;

    let actions = match value {
        Value::Array(_) => value,
        Value::Object(_) => {
            let envelope: Envelope =
                serde_json::from_value(value).map_err(|e| Error::load_failed(path, e))?;
            if envelope.version != FORMAT_VERSION {
                return Err(Error::load_failed(
                    path,
                    format!("unsupported format version {}", envelope.version),
                ));
            }
            envelope.actions
        }
        other => {
            return Err(Error::load_failed(
                path,
                format!("expected an action list, found {}", json_kind(&other)),
            ))
        }
    };
    let actions: Vec<Action> =
        serde_json::from_value(actions).map_err(|e| Error::load_failed(path, e))?;

    if let Some((i, a)) = actions
        .iter()
        .enumerate()
        .find(|(_, a)| !(a.timestamp().is_finite() && a.timestamp() >= 0.0))
    {
        return Err(Error::load_failed(
            path,
            format!("action {} has invalid timestamp {}", i + 1, a.timestamp()),
        ));
    }

    debug!(path = %path.display(), actions = actions.len(), "loaded macro");
    Ok(Macro::from(actions))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Named macros kept in one directory
pub struct MacroStorage {
    dir: PathBuf,
}

impl MacroStorage {
    /// `$HOME/.macro-recorder`
    pub fn new() -> Result<Self> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| Error::new(crate::ErrorCode::Io, "HOME not set"))?;
        Self::with_dir(PathBuf::from(home).join(".macro-recorder"))
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Save under `<name>_<timestamp>.json` and return the full path
    pub fn save(&self, macro_: &Macro, name: &str) -> Result<PathBuf> {
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("{}_{}.json", sanitize(name), ts);
        let path = self.dir.join(filename);
        save_to_path(macro_, &path)?;
        Ok(path)
    }

    /// Load a macro by file name inside the storage dir, or by path
    pub fn load(&self, file: &str) -> Result<Macro> {
        load_from_path(self.resolve(file))
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(s) = entry.file_name().to_str() {
                if s.ends_with(".json") {
                    files.push(s.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, file: &str) -> Result<()> {
        fs::remove_file(self.resolve(file))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// A file name inside the storage dir when it exists there, otherwise `file` as a path
    pub fn resolve(&self, file: &str) -> PathBuf {
        let in_dir = self.dir.join(file);
        if in_dir.exists() {
            in_dir
        } else {
            PathBuf::from(file)
        }
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
