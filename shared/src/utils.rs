use directories::BaseDirs;
use std::io;
use std::path::{Path, PathBuf};

/// Expands a leading `~` to the home directory and makes the path absolute.
/// The path does not need to exist.
pub fn resolve_path(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = path.as_ref();

    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };

    std::path::absolute(expanded)
}
