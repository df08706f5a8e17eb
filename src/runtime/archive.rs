//! Tar archives for uploads and build contexts.

use std::io;
use std::path::Path;

/// Archive holding one file at `path` (relative, no leading `/`).
pub(crate) fn single_file(path: &str, contents: &[u8]) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    );
    header.set_cksum();
    builder.append_data(&mut header, path.trim_start_matches('/'), contents)?;
    builder.into_inner()
}

/// Archive of `dir` with its contents placed under `prefix`.
///
/// An empty prefix puts the directory contents at the archive root, which
/// is what build contexts need. `keep` sees paths relative to `dir`; a
/// rejected directory is skipped with everything beneath it.
pub(crate) fn directory(
    prefix: &str,
    dir: &Path,
    keep: Option<&(dyn Fn(&Path) -> bool + Send + Sync)>,
) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    let prefix = prefix.trim_matches('/');
    let prefix = if prefix.is_empty() { "." } else { prefix };
    match keep {
        None => builder.append_dir_all(prefix, dir)?,
        Some(keep) => {
            builder.append_dir(prefix, dir)?;
            append_filtered(&mut builder, dir, Path::new(""), Path::new(prefix), keep)?;
        }
    }
    builder.into_inner()
}

fn append_filtered(
    builder: &mut tar::Builder<Vec<u8>>,
    root: &Path,
    rel: &Path,
    prefix: &Path,
    keep: &(dyn Fn(&Path) -> bool + Send + Sync),
) -> io::Result<()> {
    for entry in std::fs::read_dir(root.join(rel))? {
        let entry = entry?;
        let rel_path = rel.join(entry.file_name());
        if !keep(&rel_path) {
            continue;
        }
        let name = prefix.join(&rel_path);
        if entry.file_type()?.is_dir() {
            builder.append_dir(&name, entry.path())?;
            append_filtered(builder, root, &rel_path, prefix, keep)?;
        } else {
            builder.append_path_with_name(entry.path(), &name)?;
        }
    }
    Ok(())
}
