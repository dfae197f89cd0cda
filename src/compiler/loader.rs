//! Data loaders: programs that generate a file on demand.
//!
//! A request for `/_file/data/cars.csv` with no such file on disk looks for
//! `data/cars.csv.{js,ts,py,R,sh,exe}` and runs the first one found. Its
//! stdout is cached under `.observablehq/cache/` and reused until the loader
//! source is modified.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::core::FilePath;
use crate::debug;
use crate::utils::exec::Cmd;

/// Extension → interpreter. `None` runs the loader itself.
const LOADERS: &[(&str, Option<&str>)] = &[
    (".js", Some("node")),
    (".ts", Some("tsx")),
    (".py", Some("python3")),
    (".R", Some("Rscript")),
    (".sh", Some("sh")),
    (".exe", None),
];

/// One lock per target so concurrent requests run a loader once.
static LOCKS: LazyLock<DashMap<FilePath, Arc<Mutex<()>>>> = LazyLock::new(DashMap::new);

/// A data loader for one target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loader {
    /// The file being generated (`/data/cars.csv`).
    target: FilePath,
    /// The program generating it (`/data/cars.csv.py`).
    source: FilePath,
    interpreter: Option<&'static str>,
}

impl Loader {
    /// Find the loader for `target`, if one exists under `root`.
    pub fn find(root: &Path, target: &FilePath) -> Option<Self> {
        LOADERS.iter().find_map(|(ext, interpreter)| {
            let source = target.with_suffix(ext);
            let file = source.resolve(root)?;
            file.is_file().then(|| Self {
                target: target.clone(),
                source,
                interpreter: *interpreter,
            })
        })
    }

    /// Root-relative path of the loader program.
    pub fn source_path(&self) -> &FilePath {
        &self.source
    }

    /// Absolute path of the cached output, fresh or not.
    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        let mut path = cache_dir.to_path_buf();
        path.extend(self.target.as_str().split('/').filter(|s| !s.is_empty()));
        path
    }

    /// Produce the target, running the loader unless the cache is fresh.
    ///
    /// Returns the absolute path of the generated file.
    pub fn load(&self, root: &Path, cache_dir: &Path) -> Result<PathBuf> {
        let source = self
            .source
            .resolve(root)
            .ok_or_else(|| anyhow!("Invalid path: {}", self.source))?;
        let output = self.cache_path(cache_dir);

        let lock = Arc::clone(LOCKS.entry(self.target.clone()).or_default().value());
        let _guard = lock.lock();

        let source_modified = fs::metadata(&source)?.modified()?;
        if is_fresh(&output, source_modified) {
            debug!("loader"; "cached {}", self.target);
            return Ok(output);
        }

        let cmd = match self.interpreter {
            Some(interpreter) => {
                which::which(interpreter)
                    .map_err(|_| anyhow!("`{interpreter}` not found, needed for {}", self.source))?;
                Cmd::new(interpreter).arg(&source)
            }
            None => Cmd::new(&source),
        };

        let start = std::time::Instant::now();
        let result = cmd.cwd(root).run()?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let temp = output.with_extension(format!("{}.tmp", std::process::id()));
        fs::write(&temp, &result.stdout)
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        fs::rename(&temp, &output)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        debug!(
            "loader"; "{} → {} bytes in {}ms",
            self.source,
            result.stdout.len(),
            start.elapsed().as_millis()
        );
        Ok(output)
    }
}

fn is_fresh(output: &Path, source_modified: SystemTime) -> bool {
    fs::metadata(output)
        .and_then(|m| m.modified())
        .is_ok_and(|modified| modified >= source_modified)
}
