//! File-backed resources loaded on a tokio runtime

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;

use super::manifest::ResourceDescriptor;
use super::resource::{Completion, LoadSignal, Resource};

/// A resource whose data is the raw bytes of a file.
///
/// The read runs on the given runtime; completion is reported from a worker
/// thread.
pub struct FileResource {
    name: String,
    source: String,
    path: PathBuf,
    auto_load: bool,
    signal: LoadSignal,
    runtime: Handle,
    /// Filled once the read succeeds
    data: Arc<OnceLock<Arc<[u8]>>>,
}

impl FileResource {
    /// Create a resource from a descriptor.
    ///
    /// Relative sources are resolved against `root`. Starts loading right
    /// away when the descriptor asks for auto-load.
    pub fn new(
        descriptor: &ResourceDescriptor,
        root: impl AsRef<Path>,
        runtime: Handle,
    ) -> Arc<Self> {
        let path = descriptor
            .source
            .strip_prefix("file://")
            .unwrap_or(&descriptor.source);
        let resource = Arc::new(Self {
            name: descriptor.name.clone(),
            source: descriptor.source.clone(),
            path: root.as_ref().join(path),
            auto_load: descriptor.auto_load,
            signal: LoadSignal::new(),
            runtime,
            data: Arc::new(OnceLock::new()),
        });

        if resource.auto_load {
            resource.load();
        }
        resource
    }

    /// Create a manually loaded resource for a single path
    pub fn from_path(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        runtime: Handle,
    ) -> Arc<Self> {
        let descriptor = ResourceDescriptor::new(name, path.as_ref().to_string_lossy());
        Self::new(&descriptor, "", runtime)
    }

    /// Resolved file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File contents, once loaded
    #[must_use]
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        self.data.get().cloned()
    }
}

impl Resource for FileResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn auto_load(&self) -> bool {
        self.auto_load
    }

    fn signal(&self) -> &LoadSignal {
        &self.signal
    }

    fn fetch(&self, completion: Completion) {
        let path = self.path.clone();
        let data = Arc::clone(&self.data);

        self.runtime.spawn(async move {
            match read_file(&path).await {
                Ok(contents) => {
                    log::debug!("Read {} bytes from {}", contents.len(), path.display());
                    let _ = data.set(contents.into());
                    completion.succeed();
                }
                Err(e) => completion.fail(format!("{}: {e}", path.display())),
            }
        });
    }
}

impl fmt::Debug for FileResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileResource")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("auto_load", &self.auto_load)
            .field("state", &self.state())
            .finish()
    }
}

async fn read_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).await?;
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::LoadState;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("pulse_assets_{}_{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reads_file_bytes() {
        let path = temp_file("bytes.bin", b"\x89PNG");
        let res = FileResource::from_path("logo", &path, Handle::current());
        assert_eq!(res.state(), LoadState::Unloaded);
        assert!(res.bytes().is_none());

        assert!(res.load());
        let settlement = res.signal().settled().await.unwrap();

        assert_eq!(settlement.state, LoadState::Loaded);
        assert_eq!(res.bytes().as_deref(), Some(&b"\x89PNG"[..]));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_file_fails() {
        let res = FileResource::from_path(
            "missing",
            std::env::temp_dir().join("pulse_assets_does_not_exist.png"),
            Handle::current(),
        );
        res.load();

        let settlement = res.signal().settled().await.unwrap();
        assert_eq!(settlement.state, LoadState::Failed);
        assert!(settlement.error.unwrap().reason().contains("does_not_exist"));
        assert!(res.bytes().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_auto_load_starts_on_construction() {
        let path = temp_file("auto.txt", b"hello");
        let descriptor =
            ResourceDescriptor::new("auto", path.to_string_lossy()).with_auto_load(true);
        let res = FileResource::new(&descriptor, "", Handle::current());

        assert_ne!(res.state(), LoadState::Unloaded);
        assert!(!res.load());
        assert_eq!(res.signal().settled().await.unwrap().state, LoadState::Loaded);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_file_scheme_and_root() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let descriptor = ResourceDescriptor::new("tex", "file://textures/a.png");
        let res = FileResource::new(&descriptor, "assets", runtime.handle().clone());
        assert_eq!(res.path(), Path::new("assets/textures/a.png"));
        assert_eq!(res.source(), "file://textures/a.png");
    }
}
