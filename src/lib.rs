pub mod agent_core;
pub mod config;
pub mod console;
pub mod inference;
pub mod search_client;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use agent_core::{ConversationSession, SessionConfig};
use config::AppConfig;
use inference::GeminiClient;
use search_client::TypesenseClient;

/// Return the platform-standard data directory for SearchDesk.
///
/// - macOS: `~/Library/Application Support/searchdesk/`
/// - Windows: `{FOLDERID_RoamingAppData}\searchdesk\`
/// - Linux: `$XDG_DATA_HOME/searchdesk/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.searchdesk/` only if none of the above can be resolved.
pub(crate) fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("searchdesk");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".searchdesk")
}

/// Initialize the tracing subscriber. Logs go to `searchdesk.log` in the data
/// directory so they never interleave with the console.
///
/// On each startup:
/// 1. Rotates existing logs (searchdesk.log → .1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh searchdesk.log with a line-flushing writer.
/// 3. Logs a startup banner with the data directory path.
///
/// The filter comes from `SEARCHDESK_LOG`, then `RUST_LOG`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let log_path = log_dir.join("searchdesk.log");
    rotate_log_file(&log_path, 3);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let filter = EnvFilter::try_from_env("SEARCHDESK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("searchdesk=info,warn"));

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(FlushingWriter::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== SearchDesk starting ==="
    );
    Ok(())
}

/// Rotate log files: `searchdesk.log` → `.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write, so
/// each log line is on disk even if the process dies mid-turn.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Wire the backends into a session and hand it to the console.
pub async fn run() -> anyhow::Result<()> {
    if let Err(e) = init_tracing() {
        eprintln!("logging disabled: {e:#}");
    }

    let config = AppConfig::load().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let search = TypesenseClient::new(&config.search).context("failed to build search client")?;
    let model = GeminiClient::new(config.model.clone()).context("failed to build model client")?;
    tracing::info!(
        search_url = %config.search.url,
        model = model.model_name(),
        "backends configured"
    );

    let session = Arc::new(ConversationSession::new(
        Arc::new(model),
        Arc::new(search),
        SessionConfig::from(&config.chat),
    ));

    console::run(session).await
}
