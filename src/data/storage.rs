use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use crate::error::{PipelineError, Result};

/// A durable, name-addressed location for whole tables.
pub trait Storage {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<()>;
    fn get(&self, name: &str) -> Result<Vec<u8>>;
    fn exists(&self, name: &str) -> bool;
    /// Human-readable address of `name`, used in logs and errors.
    fn locate(&self, name: &str) -> String;
}

/// Filesystem-backed storage rooted at one directory.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Storage for FsStorage {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let target = self.path_of(name);
        // Write next to the target and rename, so readers never see a half-written table.
        let tmp = self.root.join(format!(".{name}.tmp"));
        let written = std::fs::File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|_| std::fs::rename(&tmp, &target));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(PipelineError::Io(e));
        }
        tracing::debug!("Wrote {} bytes to {:?}", bytes.len(), target);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name);
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::NotFound {
                location: path.display().to_string(),
            },
            _ => PipelineError::Io(e),
        })
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    fn locate(&self, name: &str) -> String {
        self.path_of(name).display().to_string()
    }
}

/// In-memory storage. Values live as long as the store.
#[derive(Default)]
pub struct MemStorage {
    tables: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&self, name: &str) -> Option<Vec<u8>> {
        self.tables.lock().ok()?.remove(name)
    }
}

impl Storage for MemStorage {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        tables.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Vec<u8>> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        tables.get(name).cloned().ok_or_else(|| PipelineError::NotFound {
            location: self.locate(name),
        })
    }

    fn exists(&self, name: &str) -> bool {
        self.tables.lock().map(|t| t.contains_key(name)).unwrap_or(false)
    }

    fn locate(&self, name: &str) -> String {
        format!("mem://{name}")
    }
}

fn poisoned() -> PipelineError {
    PipelineError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "in-memory storage lock poisoned",
    ))
}
