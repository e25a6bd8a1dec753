//! Filesystem helpers shared by the write, search and prune paths.

use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Apply the store's permission bits to a file it created.
#[cfg(unix)]
pub fn normalize_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)?;
    if metadata.permissions().mode() & 0o777 != mode & 0o777 {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn normalize_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Whether `file` is still the file found at `path`.
///
/// False once something else has been renamed over `path` (or it was
/// removed), which leaves `file` pointing at an orphaned inode.
#[cfg(unix)]
pub fn is_current(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(named)) => held.dev() == named.dev() && held.ino() == named.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
pub fn is_current(_file: &File, path: &Path) -> bool {
    path.exists()
}

/// Move `new_path` over `old_path`.
///
/// On the same filesystem the rename replaces the target atomically: readers
/// see either the old file or the new one, never a missing file.
pub fn atomic_replace(old_path: &Path, new_path: &Path) -> io::Result<()> {
    fs::rename(new_path, old_path)
}

/// Delete a file; a missing file is not an error.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
