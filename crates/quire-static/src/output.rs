//! Writing build outputs.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::BuildError;

/// Write `contents` to `path`, creating parent directories.
///
/// The data goes to a sibling temporary file first and is renamed into place,
/// so a failed write never leaves a truncated output behind.
pub fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(BuildError::write(parent))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, contents).map_err(BuildError::write(&tmp))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        BuildError::Write {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// Copy one file, creating parent directories.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), BuildError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(BuildError::write(parent))?;
    }
    fs::copy(from, to).map_err(BuildError::write(to))?;
    Ok(())
}

/// Whether `dest` exists and is at least as new as `src`.
pub fn is_up_to_date(src: &Path, dest: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();

    match (modified(src), modified(dest)) {
        (Some(src_time), Some(dest_time)) => dest_time >= src_time,
        _ => false,
    }
}

/// All files under `dir` with one of `extensions`, relative to `dir`, sorted.
///
/// An empty extension list matches every file. An entry that cannot be read
/// fails the whole walk.
pub fn files_with_extensions(
    dir: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, BuildError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(BuildError::walk(dir))?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            files.push(relative.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_through_temporary_file() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("nested/dir/page.html");

        write_atomic(&target, "<p>hi</p>").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "<p>hi</p>");
        assert!(!temp.path().join("nested/dir/page.html.tmp").exists());
    }

    #[test]
    fn lists_files_by_extension() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("b.md"), "").unwrap();
        fs::write(temp.path().join("sub/a.MD"), "").unwrap();
        fs::write(temp.path().join("c.txt"), "").unwrap();

        let files = files_with_extensions(temp.path(), &["md"]).unwrap();

        assert_eq!(files, vec![PathBuf::from("b.md"), PathBuf::from("sub/a.MD")]);
    }

    #[cfg(unix)]
    #[test]
    fn walk_error_names_the_entry() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/a.md"), "").unwrap();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("sub/loop")).unwrap();

        let err = files_with_extensions(temp.path(), &["md"]).unwrap_err();

        assert!(matches!(err, BuildError::Read { ref path, .. } if path.ends_with("sub/loop")));
    }

    #[test]
    fn freshness_requires_destination() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src.png");
        let dest = temp.path().join("dest.png");
        fs::write(&src, [1u8]).unwrap();

        assert!(!is_up_to_date(&src, &dest));

        fs::copy(&src, &dest).unwrap();
        assert!(is_up_to_date(&src, &dest));
    }
}
