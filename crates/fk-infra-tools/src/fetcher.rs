//! Versioned tool binaries
//!
//! A tool binary lives at a fixed path under the cache directory. Its presence is the
//! cache hit: the first use downloads the release asset to a temp file, lets the tool
//! install it, and every later use runs the cached binary directly. There is no
//! locking; one process at a time.

use crate::error::{Result, ToolsError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Temp file the download is streamed to before installation.
pub const TEMP_BINARY_NAME: &str = "temp_binary";

const USER_AGENT: &str = concat!("fk-infra/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetch `url` into `destination`.
    async fn download(&self, url: &str, destination: &Path) -> Result<()>;
}

/// Unauthenticated HTTPS downloads.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        let download_error = |e: reqwest::Error| ToolsError::Download {
            url: url.to_string(),
            message: e.to_string(),
        };

        let mut response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(download_error)?;

        if !response.status().is_success() {
            return Err(ToolsError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await.map_err(download_error)? {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        debug!(url, bytes = written, "Downloaded");
        Ok(())
    }
}

/// Cache of tool binaries plus the directory the tools run in.
#[derive(Clone)]
pub struct BinaryCache {
    cache_dir: PathBuf,
    working_dir: PathBuf,
    downloader: Arc<dyn Downloader>,
}

impl BinaryCache {
    pub fn new(cache_dir: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self::with_downloader(cache_dir, working_dir, Arc::new(HttpDownloader::new()))
    }

    pub fn with_downloader(
        cache_dir: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            working_dir: working_dir.into(),
            downloader,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn temp_path(&self) -> PathBuf {
        self.cache_dir.join(TEMP_BINARY_NAME)
    }

    /// Make sure `local_path` exists, downloading and installing it if not.
    pub async fn ensure<U, I>(&self, local_path: &Path, resolve_url: U, install: I) -> Result<()>
    where
        U: FnOnce() -> Result<String>,
        I: FnOnce(&Path) -> Result<()>,
    {
        if local_path.exists() {
            debug!(path = %local_path.display(), "Using cached binary");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let url = resolve_url()?;
        info!(url = %url, "Downloading");

        let temp_path = self.temp_path();
        self.downloader.download(&url, &temp_path).await?;
        install(&temp_path)?;

        if !local_path.exists() {
            return Err(ToolsError::NotInstalled(local_path.to_path_buf()));
        }
        Ok(())
    }

    /// Ensure the binary, run it with `args` in the working directory and return what
    /// it wrote to stdout.
    pub async fn obtain<U, I>(
        &self,
        local_path: &Path,
        resolve_url: U,
        install: I,
        args: &[String],
    ) -> Result<Vec<u8>>
    where
        U: FnOnce() -> Result<String>,
        I: FnOnce(&Path) -> Result<()>,
    {
        self.ensure(local_path, resolve_url, install).await?;
        run(local_path, args, &self.working_dir).await
    }
}

/// Run `program`, passing stdout through while capturing it. Stderr is inherited.
pub async fn run(program: &Path, args: &[String], cwd: &Path) -> Result<Vec<u8>> {
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());

    debug!("Running: {} {}", name, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolsError::Spawn {
            program: name.clone(),
            source,
        })?;

    let captured = match tee_stdout(&mut child).await {
        Ok(captured) => captured,
        Err(e) => {
            // reap before reporting; kill_on_drop only signals
            let _ = child.kill().await;
            return Err(e.into());
        }
    };

    let status = child.wait().await?;
    if !status.success() {
        return Err(ToolsError::CommandFailed {
            program: name,
            code: status.code(),
        });
    }

    Ok(captured)
}

/// Copy the child's stdout to ours while keeping a copy.
async fn tee_stdout(child: &mut Child) -> std::io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let Some(mut stdout) = child.stdout.take() else {
        return Ok(captured);
    };

    let mut console = tokio::io::stdout();
    let mut buffer = [0u8; 8192];
    loop {
        let read = stdout.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        console.write_all(&buffer[..read]).await?;
        captured.extend_from_slice(&buffer[..read]);
    }
    console.flush().await?;
    Ok(captured)
}

/// Set unix permission bits.
#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(mode);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ECHO_SCRIPT: &str = "#!/bin/sh\necho \"$@\"\n";

    /// Serves a fixed payload and counts calls.
    struct FakeDownloader {
        payload: &'static str,
        urls: Mutex<Vec<String>>,
    }

    impl FakeDownloader {
        fn new(payload: &'static str) -> Arc<Self> {
            Arc::new(Self {
                payload,
                urls: Mutex::new(Vec::new()),
            })
        }

        fn downloads(&self) -> usize {
            self.urls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Downloader for FakeDownloader {
        async fn download(&self, url: &str, destination: &Path) -> Result<()> {
            self.urls.lock().unwrap().push(url.to_string());
            std::fs::write(destination, self.payload)?;
            Ok(())
        }
    }

    fn install_by_rename(
        target: PathBuf,
        installs: Arc<AtomicUsize>,
    ) -> impl FnOnce(&Path) -> Result<()> {
        move |temp: &Path| {
            installs.fetch_add(1, Ordering::SeqCst);
            std::fs::rename(temp, &target)?;
            set_mode(&target, 0o755)
        }
    }

    fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[tokio::test]
    #[serial]
    async fn test_cached_binary_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("tool");
        std::fs::write(&binary, ECHO_SCRIPT).unwrap();
        set_mode(&binary, 0o755).unwrap();

        let downloader = FakeDownloader::new(ECHO_SCRIPT);
        let cache = BinaryCache::with_downloader(dir.path(), dir.path(), downloader.clone());
        let installs = Mutex::new(0);

        let output = cache
            .obtain(
                &binary,
                || Ok("https://example.invalid/tool".to_string()),
                |_: &Path| {
                    *installs.lock().unwrap() += 1;
                    Ok(())
                },
                &args(&["plan"]),
            )
            .await
            .unwrap();

        assert_eq!(output, b"plan\n");
        assert_eq!(downloader.downloads(), 0);
        assert_eq!(*installs.lock().unwrap(), 0);
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_binary_downloads_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join(".fk-infra");
        let binary = cache_dir.join("tool");

        let downloader = FakeDownloader::new(ECHO_SCRIPT);
        let cache = BinaryCache::with_downloader(&cache_dir, dir.path(), downloader.clone());
        let installs = Arc::new(AtomicUsize::new(0));

        let output = cache
            .obtain(
                &binary,
                || Ok("https://example.invalid/tool".to_string()),
                install_by_rename(binary.clone(), installs.clone()),
                &args(&["output", "-json"]),
            )
            .await
            .unwrap();

        assert_eq!(output, b"output -json\n");
        assert_eq!(downloader.downloads(), 1);
        assert_eq!(installs.load(Ordering::SeqCst), 1);
        assert!(!cache.temp_path().exists());

        // second use hits the cache
        cache
            .obtain(
                &binary,
                || Ok("https://example.invalid/tool".to_string()),
                install_by_rename(binary.clone(), installs.clone()),
                &args(&["init"]),
            )
            .await
            .unwrap();
        assert_eq!(downloader.downloads(), 1);
        assert_eq!(installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_install_must_produce_binary() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("tool");
        let cache = BinaryCache::with_downloader(dir.path(), dir.path(), FakeDownloader::new(""));

        let err = cache
            .ensure(
                &binary,
                || Ok("https://example.invalid/tool".to_string()),
                |_: &Path| Ok(()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolsError::NotInstalled(_)));
    }

    #[tokio::test]
    #[serial]
    async fn test_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("failing");
        std::fs::write(&binary, "#!/bin/sh\necho partial\nexit 3\n").unwrap();
        set_mode(&binary, 0o755).unwrap();

        let err = run(&binary, &[], dir.path()).await.unwrap_err();
        match err {
            ToolsError::CommandFailed { program, code } => {
                assert_eq!(program, "failing");
                assert_eq!(code, Some(3));
            }
            other => panic!("Expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_stdin_is_closed() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("prompting");
        std::fs::write(&binary, "#!/bin/sh\nread answer\necho \"answer:$answer\"\n").unwrap();
        set_mode(&binary, 0o755).unwrap();

        // a prompt sees EOF instead of waiting on the terminal
        let output = run(&binary, &[], dir.path()).await.unwrap();
        assert_eq!(output, b"answer:\n");
    }

    #[tokio::test]
    #[serial]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("pwd-tool");
        std::fs::write(&binary, "#!/bin/sh\nls\n").unwrap();
        set_mode(&binary, 0o755).unwrap();
        std::fs::write(dir.path().join("network.tf"), "").unwrap();

        let output = run(&binary, &[], dir.path()).await.unwrap();
        assert!(String::from_utf8(output).unwrap().contains("network.tf"));
    }
}
