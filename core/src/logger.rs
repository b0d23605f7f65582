use chrono::Local;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Info,
    Debug,
    Trace,
}

impl Level {
    fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "info" | "warn" | "warning" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn | log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

/// Appends filtered lines to `debug.log`. Without a file path nothing is written.
pub struct DebugLogger {
    max_level: Level,
    file_path: Option<PathBuf>,
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::new()))
}

impl DebugLogger {
    pub fn new() -> Self {
        Self {
            max_level: Level::Info,
            file_path: None,
        }
    }

    pub fn set_file_path(&mut self, path: PathBuf) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        self.file_path = Some(path);
    }

    pub fn set_max_level(&mut self, level: Level) {
        self.max_level = level;
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    pub fn log(&mut self, level: Level, module: &str, message: &str) {
        if !self.enabled(level) {
            return;
        }
        let Some(path) = &self.file_path else {
            return;
        };
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(
                file,
                "[{}] [{}] [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                level.as_str(),
                module,
                message
            );
        }
    }
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Bridges the `log` facade into the same file.
struct LogFacade;

impl log::Log for LogFacade {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        get_logger().lock().enabled(metadata.level().into())
    }

    fn log(&self, record: &log::Record) {
        get_logger().lock().log(
            record.level().into(),
            record.module_path().unwrap_or_else(|| record.target()),
            &record.args().to_string(),
        );
    }

    fn flush(&self) {}
}

static FACADE: LogFacade = LogFacade;

/// Point the logger at `data_dir/debug.log` (or discard everything) and install the `log` backend.
pub fn init(data_dir: Option<PathBuf>, level: Level) {
    {
        let mut logger = get_logger().lock();
        logger.set_max_level(level);
        if let Some(dir) = data_dir {
            logger.set_file_path(dir.join("debug.log"));
        }
    }
    if log::set_logger(&FACADE).is_ok() {
        log::set_max_level(match level {
            Level::Error => log::LevelFilter::Error,
            Level::Info => log::LevelFilter::Info,
            Level::Debug => log::LevelFilter::Debug,
            Level::Trace => log::LevelFilter::Trace,
        });
    }
}

pub fn log(level: Level, module: &str, message: impl Into<String>) {
    get_logger().lock().log(level, module, &message.into());
}

#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Trace, module_path!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Debug, module_path!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Info, module_path!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Error, module_path!(), format!($($arg)*));
    };
}
