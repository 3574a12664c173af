use std::{path::PathBuf, sync::LazyLock};

pub static DEFAULT_DATA_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    if let Some(dir) = std::env::var_os("STEAM_SEARCH_HOME") {
        return PathBuf::from(dir);
    }

    let mut path = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default();
    path.push("steam-search");
    path
});

/// Computes a path inside the per-user data directory.
///
/// Returns a `&Path` referencing the data directory itself if no arguments are passed in, or a
/// `PathBuf` created by joining all of the arguments to the data directory if at least one
/// argument is passed in.
///
/// # Examples
///
/// ```
/// use steam_search::data_path;
///
/// let logs = data_path!("logs");
/// assert_eq!(logs, data_path!().join("logs"));
/// assert_eq!(data_path!("a", "b"), data_path!().join("a").join("b"));
/// ```
#[macro_export]
macro_rules! data_path {
    () => {
        $crate::paths::DEFAULT_DATA_PATH.as_path()
    };

    ( $( $path:expr ),+ $(,)? ) => {
        [
            $crate::paths::DEFAULT_DATA_PATH.as_path(),
            $( std::path::Path::new(&$path) ),+
        ].into_iter().collect::<std::path::PathBuf>()
    };
}
