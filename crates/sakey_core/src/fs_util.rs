use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Permission bits for files holding credentials (owner read/write).
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Permission bits for directories created to hold credentials.
pub const PRIVATE_DIR_MODE: u32 = 0o700;

/// Writes `content` to `path` atomically by writing to a temporary file
/// first, syncing to disk, then renaming into place.
pub fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)?;
    file.write_all(content.as_bytes())?;

    // Ensure data is persisted to disk before rename
    file.sync_all()?;

    // Drop file handle before rename (Windows compatibility)
    drop(file);

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Writes `content` to an owner-only file at `path`.
///
/// The content is staged in a temporary file in the destination directory
/// with mode `0600`, synced, then moved into place. With `replace == false`
/// the move fails with `AlreadyExists` if `path` exists at that moment.
pub fn write_private(path: &Path, content: &[u8], replace: bool) -> io::Result<()> {
    let dir = parent_dir(path);
    create_private_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    restrict_permissions(temp.path())?;

    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    let result = if replace {
        temp.persist(path)
    } else {
        temp.persist_noclobber(path)
    };

    result.map(drop).map_err(|e| e.error)
}

/// Returns the Unix permission bits of `path`, or `None` on other platforms.
#[cfg(unix)]
pub fn file_mode(path: &Path) -> io::Result<Option<u32>> {
    use std::os::unix::fs::PermissionsExt;

    Ok(Some(fs::metadata(path)?.permissions().mode() & 0o777))
}

/// Returns the Unix permission bits of `path`, or `None` on other platforms.
#[cfg(not(unix))]
pub fn file_mode(path: &Path) -> io::Result<Option<u32>> {
    fs::metadata(path).map(|_| None)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn create_private_dir_all(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(PRIVATE_DIR_MODE);
    }

    builder.create(dir)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(PRIVATE_FILE_MODE))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
