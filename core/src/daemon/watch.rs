//! Picks what to evaluate when the user asks for "the latest thing I built".

use std::path::{Path, PathBuf};

use fsutil::FileStamp;

use crate::serdable::GlobPattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePatterns {
    /// Sources whose extension-stripped sibling is the executable.
    pub compiled: Vec<GlobPattern>,
    /// Files that are themselves launchable.
    pub scripts: Vec<GlobPattern>,
}

/// Snapshot of every candidate under `root`.
/// A compiled source only counts once its executable exists, stamped with the executable's mtime.
pub fn scan_candidates(root: &Path, patterns: &CandidatePatterns) -> fsutil::Result<Vec<FileStamp>> {
    let mut res = Vec::new();
    for pat in &patterns.compiled {
        for source in fsutil::glob_files(root, pat.as_str())? {
            let exe = source.path.with_extension("");
            if !fsutil::is_executable(&exe) {
                continue;
            }
            if let Some(stamp) = FileStamp::of(exe) {
                res.push(stamp);
            }
        }
    }
    for pat in &patterns.scripts {
        res.extend(fsutil::glob_files(root, pat.as_str())?);
    }
    Ok(res)
}

pub fn latest_candidate(root: &Path, patterns: &CandidatePatterns) -> fsutil::Result<Option<PathBuf>> {
    let candidates = scan_candidates(root, patterns)?;
    Ok(fsutil::most_recently_modified(&candidates).map(|c| c.path.clone()))
}

#[cfg(all(test, unix))]
mod test {
    use super::*;
    use std::{os::unix::fs::PermissionsExt, time::Duration};

    fn patterns() -> CandidatePatterns {
        CandidatePatterns {
            compiled: vec![GlobPattern::parse("**/*.cc").unwrap()],
            scripts: vec![GlobPattern::parse("**/*.py").unwrap()],
        }
    }

    fn touch(path: &Path, executable: bool) {
        fsutil::write_with_mkdir(path, "").unwrap();
        if executable {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        // keep mtimes strictly ordered across filesystems with coarse timestamps
        std::thread::sleep(Duration::from_millis(20));
    }

    #[test]
    fn source_without_executable_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/main.cc"), false);
        assert!(scan_candidates(dir.path(), &patterns()).unwrap().is_empty());
        assert_eq!(latest_candidate(dir.path(), &patterns()).unwrap(), None);
    }

    #[test]
    fn most_recent_executable_or_script_wins() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        touch(&d.join("a/main.cc"), false);
        touch(&d.join("a/main"), true);
        touch(&d.join("b/sol.py"), false);
        touch(&d.join("c/main.cc"), false);
        touch(&d.join("c/main"), true);

        let got = latest_candidate(d, &patterns()).unwrap().unwrap();
        assert!(got.ends_with("c/main"), "{:?}", got);

        touch(&d.join("b/sol.py"), false);
        let got = latest_candidate(d, &patterns()).unwrap().unwrap();
        assert!(got.ends_with("b/sol.py"), "{:?}", got);
    }
}
