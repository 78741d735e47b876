use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "fsic.conf";
pub const DATABASE_FILE_NAME: &str = "fsic.db";
pub const PASSWORD_FILE_NAME: &str = "fsic.pw";
pub const SELF_TEST_FILE_NAME: &str = "fsic.sc";
pub const LOG_FILE_NAME: &str = "fsic.log";

/// Resolve `path` against `base` unless it is already absolute.
pub fn absolutize(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_are_kept() {
        assert_eq!(absolutize(Path::new("/data"), "/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn relative_paths_are_joined() {
        assert_eq!(
            absolutize(Path::new("/data"), DATABASE_FILE_NAME),
            PathBuf::from("/data/fsic.db")
        );
    }
}
