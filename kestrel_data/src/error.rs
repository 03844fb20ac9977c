use std::{io, path::PathBuf};

/// A single manifest that couldn't be turned into a definition.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a valid manifest: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} does not declare a name")]
    MissingName { path: PathBuf },
    #[error("{path} refers to unknown handler `{handler}`")]
    UnknownHandler { path: PathBuf, handler: String },
    #[error("{path} subscribes to unknown gateway event `{event}`")]
    UnknownEvent { path: PathBuf, event: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error("another load or reload is already running")]
    Busy,
}

/// Outcome of a discovery pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl LoadReport {
    pub(crate) fn record(&mut self, result: Result<(), LoadError>, path: PathBuf) {
        match result {
            Ok(()) => self.loaded += 1,
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", path.display());
                self.failed.push((path, e.to_string()));
            }
        }
    }

    pub(crate) fn merge(&mut self, other: LoadReport) {
        self.loaded += other.loaded;
        self.failed.extend(other.failed);
    }
}
