use chrono::{DateTime, Local};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Process infrastructure context.
///
/// Holds identity, version and the logging guard. Every binary in the
/// workspace creates exactly one of these at startup.
pub struct AppContext {
    app_id: &'static str,
    version: &'static str,
    log_dir: PathBuf,
    log_file: PathBuf,
    /// The log guard must be kept alive for the duration of the application
    /// to ensure log messages are properly flushed.
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

impl AppContext {
    pub fn app_id(&self) -> &str {
        self.app_id
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

/// Application metadata trait.
///
/// Define your application's identity by implementing this trait.
/// This is a pure marker trait - no logic, just constants.
pub trait Application: Sized + 'static {
    const APP_ID: &'static str;
    const STUDIO: &'static str = "chicken105";
    const PROJECT_ID: &'static str = "forge_of_stories";
}

/// Builder performing the common process initialization.
pub struct AppBuilder<A: Application> {
    version: &'static str,
    log_dir: Option<PathBuf>,
    level: Option<LevelFilter>,
    _marker: PhantomData<A>,
}

impl<A: Application> AppBuilder<A> {
    pub fn new(version: &'static str) -> Self {
        Self {
            version,
            log_dir: None,
            level: None,
            _marker: PhantomData,
        }
    }

    /// Overrides the platform log directory.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Overrides the build-dependent default level. `RUST_LOG` still wins.
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = Some(level);
        self
    }

    /// Creates the log directory and installs the global subscriber:
    /// - file layer (non-blocking, no ANSI)
    /// - console layer (stdout)
    ///
    /// Fails if a global subscriber is already installed.
    pub fn build(self) -> Result<AppContext, BoxError> {
        let log_dir = self
            .log_dir
            .unwrap_or_else(|| default_log_dir(A::STUDIO, A::PROJECT_ID, A::APP_ID));
        fs::create_dir_all(&log_dir)?;

        let file_name = log_file_name(A::APP_ID, Local::now());
        let log_file = log_dir.join(&file_name);

        let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let level = self.level.unwrap_or_else(default_level);
        let env_filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();

        let file_layer = fmt::Layer::default()
            .with_target(true)
            .with_ansi(false)
            .with_writer(non_blocking);

        let console_layer = fmt::Layer::default().with_target(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .try_init()?;

        tracing::debug!(
            app = A::APP_ID,
            version = self.version,
            log_file = %log_file.display(),
            "logging initialized"
        );

        Ok(AppContext {
            app_id: A::APP_ID,
            version: self.version,
            log_dir,
            log_file,
            _log_guard: guard,
        })
    }
}

#[cfg(debug_assertions)]
fn default_level() -> LevelFilter {
    LevelFilter::INFO
}

#[cfg(not(debug_assertions))]
fn default_level() -> LevelFilter {
    LevelFilter::WARN
}

/// Platform log directory: `<data_local>/<studio>/<project>/<app>/logs`.
///
/// Falls back to the system temp directory when no data directory exists
/// (headless CI containers).
pub fn default_log_dir(studio: &str, project_id: &str, app_id: &str) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(studio)
        .join(project_id)
        .join(app_id)
        .join("logs")
}

/// Log file name for one process run, e.g. `matchmaking_2025-03-01_14-05-09.log`.
pub fn log_file_name(app_id: &str, now: DateTime<Local>) -> String {
    format!("{app_id}_{}.log", now.format("%Y-%m-%d_%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name_contains_timestamp() {
        let now = Local.with_ymd_and_hms(2025, 3, 1, 14, 5, 9).unwrap();
        assert_eq!(
            log_file_name("matchmaking", now),
            "matchmaking_2025-03-01_14-05-09.log"
        );
    }

    #[test]
    fn test_default_log_dir_layout() {
        let dir = default_log_dir("studio", "project", "tool");
        let parts: Vec<_> = dir
            .components()
            .rev()
            .take(4)
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        assert_eq!(parts, vec!["logs", "tool", "project", "studio"]);
    }

    #[test]
    fn test_builder_overrides() {
        struct Tool;
        impl Application for Tool {
            const APP_ID: &'static str = "tool";
        }

        let tmp = tempfile::tempdir().unwrap();
        let builder = AppBuilder::<Tool>::new("0.0.1")
            .with_log_dir(tmp.path())
            .with_level(LevelFilter::DEBUG);
        assert_eq!(builder.log_dir.as_deref(), Some(tmp.path()));
        assert_eq!(builder.level, Some(LevelFilter::DEBUG));
        assert_eq!(builder.version, "0.0.1");
    }
}
