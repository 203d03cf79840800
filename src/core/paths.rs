//! Location of the configuration document and the diagnostics log.
//!
//! Both default to the directory holding the executable, so a copied
//! install directory is self-contained.

use std::env;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Environment override for the configuration path.
pub const CONFIG_ENV: &str = "CCLEAN_CONFIG";
/// Environment override for the log file path.
pub const LOG_FILE_ENV: &str = "CCLEAN_LOG_FILE";
/// Configuration file name next to the executable.
pub const CONFIG_FILE_NAME: &str = "config.json";
/// Log directory next to the executable.
pub const LOG_DIR_NAME: &str = "logs";
/// Log file name inside [`LOG_DIR_NAME`].
pub const LOG_FILE_NAME: &str = "collector-cleaner.jsonl";

/// Directory containing the running executable, or the CWD if unknown.
#[must_use]
pub fn exe_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `--config`, else `$CCLEAN_CONFIG`, else `config.json` next to the executable.
#[must_use]
pub fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    resolve_with(flag, env::var_os(CONFIG_ENV), || exe_dir().join(CONFIG_FILE_NAME))
}

/// `--log-file`, else `$CCLEAN_LOG_FILE`, else `logs/collector-cleaner.jsonl`
/// next to the executable.
#[must_use]
pub fn resolve_log_path(flag: Option<&Path>) -> PathBuf {
    resolve_with(flag, env::var_os(LOG_FILE_ENV), || {
        exe_dir().join(LOG_DIR_NAME).join(LOG_FILE_NAME)
    })
}

fn resolve_with(
    flag: Option<&Path>,
    env_value: Option<OsString>,
    default: impl FnOnce() -> PathBuf,
) -> PathBuf {
    let chosen = flag
        .map(Path::to_path_buf)
        .or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(default);
    resolve_absolute_path(&chosen)
}

/// Resolve a path to an absolute, normalized path.
///
/// Uses `fs::canonicalize` when the path exists; otherwise joins it to the
/// CWD and resolves `..`/`.` syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }
    normalize_syntactic(&absolute)
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}
