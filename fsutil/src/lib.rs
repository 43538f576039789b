use std::{
    fs::{self, ReadDir},
    path::{Path, PathBuf},
    time::SystemTime,
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("Failed to canonicalize path '{0}': {1}")]
        CanonicalizePath(PathBuf, #[source] io::Error),

        #[error("Invalid glob '{0}': {1}")]
        InvalidGlob(String, #[source] ::glob::PatternError),
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        if !dir.as_os_str().is_empty() {
            self::mkdir_all(dir)?;
        }
    }
    self::write(filepath, contents)
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

/// Reads the file if it exists. A missing file is `Ok(None)`, not an error.
#[must_use]
pub fn read_to_string_if_exists(filepath: impl AsRef<Path>) -> Result<Option<String>> {
    let filepath = filepath.as_ref();
    if !filepath.is_file() {
        return Ok(None);
    }
    self::read_to_string(filepath).map(Some)
}

#[must_use]
pub fn read_dir(dir: impl AsRef<Path>) -> Result<ReadDir> {
    fs::read_dir(&dir).map_err(|e| Error::SingleIO("Cannot read dir", dir.as_ref().to_owned(), e))
}

/// File names (not paths) of the regular files directly under `dir`, sorted.
pub fn sorted_file_names(dir: impl AsRef<Path>) -> Result<Vec<String>> {
    let mut names: Vec<_> = self::read_dir(&dir)?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

pub fn canonicalize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    path.canonicalize()
        .map_err(|e| Error::CanonicalizePath(path.to_owned(), e))
}

/// Normalize the path
/// ```
/// use fsutil::normalize_path;
/// use std::path::Path;
///
/// assert_eq!(normalize_path("./hoge/.config/././foo"), Path::new("hoge/.config/foo"));
/// assert_eq!(normalize_path("hoge/.config/../../bar/."), Path::new("bar"));
/// assert_eq!(normalize_path("../foo/../hello"), Path::new("../hello"));
/// assert_eq!(normalize_path("/"), Path::new("/"));
/// assert_eq!(normalize_path("/foo/"), Path::new("/foo"));
/// assert_eq!(normalize_path("./foo/"), Path::new("foo"));
/// assert_eq!(normalize_path("."), Path::new("."));
/// assert_eq!(normalize_path("./././."), Path::new("."));
/// ```
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    use ::std::path::Component;
    let components = path.as_ref().components();
    let mut stack = Vec::with_capacity(components.size_hint().1.unwrap_or(4));
    for c in components {
        match c {
            Component::CurDir => (),
            Component::ParentDir
                if matches!(stack.last(), Some(Component::Normal(_))) =>
            {
                stack.pop();
            }
            _ => {
                stack.push(c);
            }
        }
    }
    if stack.is_empty() {
        stack.push(Component::CurDir);
    }
    stack.iter().collect()
}

/// Whether `path` lies inside the directory tree rooted at `root`.
/// Both are compared lexically after normalization; nothing is read from disk.
/// ```
/// use fsutil::is_within;
///
/// assert!(is_within("/home/me/work", "/home/me/work/abc/a.py"));
/// assert!(is_within("/home/me/work", "/home/me/work"));
/// assert!(!is_within("/home/me/work", "/home/me/work/../secret"));
/// assert!(!is_within("/home/me/work", "/home/me/workshop/a.py"));
/// ```
pub fn is_within(root: impl AsRef<Path>, path: impl AsRef<Path>) -> bool {
    normalize_path(path).starts_with(normalize_path(root))
}

#[cfg(unix)]
pub fn is_executable(path: impl AsRef<Path>) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|info| info.is_file() && info.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    path.is_file() && path.extension().map_or(false, |ext| ext == "exe")
}

/// A file path together with its last modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl FileStamp {
    pub fn of(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let modified = fs::metadata(&path).and_then(|info| info.modified()).ok()?;
        Some(Self { path, modified })
    }
}

/// Regular files under `root` matching `pattern` (e.g. `**/*.cc`), with their mtime.
/// Unreadable entries are skipped.
pub fn glob_files(root: impl AsRef<Path>, pattern: &str) -> Result<Vec<FileStamp>> {
    let full = root.as_ref().join(pattern);
    let full = full.to_string_lossy();
    let paths = ::glob::glob(&full).map_err(|e| Error::InvalidGlob(full.to_string(), e))?;
    Ok(paths
        .filter_map(std::result::Result::ok)
        .filter(|path| path.is_file())
        .filter_map(|path| FileStamp::of(normalize_path(path)))
        .collect())
}

/// Picks the most recently modified file. Ties keep the earliest entry.
pub fn most_recently_modified(candidates: &[FileStamp]) -> Option<&FileStamp> {
    candidates.iter().fold(None, |best: Option<&FileStamp>, c| match best {
        Some(b) if b.modified >= c.modified => Some(b),
        _ => Some(c),
    })
}
