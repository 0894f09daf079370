//! Where raw hosts file bytes come from.

use std::io;
use std::path::{Path, PathBuf};

/// Fetches the current raw hosts configuration.
///
/// `Ok(None)` means no configuration exists yet; it is not an error.
pub trait ConfigReader: Send + Sync + 'static {
    /// Read the full current configuration.
    fn read_config(&self) -> io::Result<Option<Vec<u8>>>;
}

impl<F> ConfigReader for F
where
    F: Fn() -> io::Result<Option<Vec<u8>>> + Send + Sync + 'static,
{
    fn read_config(&self) -> io::Result<Option<Vec<u8>>> {
        self()
    }
}

/// Reads the hosts file from a mounted volume.
#[derive(Debug, Clone)]
pub struct FileConfigReader {
    path: PathBuf,
}

impl FileConfigReader {
    /// Read from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigReader for FileConfigReader {
    fn read_config(&self) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
