//! Small filesystem and process utilities shared by the lock, cache, and
//! storage modules.

use std::fs::File;
use std::io::Write;
use std::os::unix::io::FromRawFd;
use std::path::Path;

use anyhow::{bail, Error};
use nix::sys::stat;
use nix::unistd;

pub mod pid;
pub mod runtime;

/// Atomically replace `path`'s contents with `data`: write to a sibling
/// temp file, then `rename(2)` into place. Safe across concurrent
/// processes, threads, and tasks, since `rename` is atomic on the same
/// filesystem.
pub fn file_set_contents<P: AsRef<Path>>(
    path: P,
    data: &[u8],
    perm: Option<stat::Mode>,
) -> Result<(), Error> {
    let path = path.as_ref();

    let mut template = path.to_owned();
    template.set_extension("tmp_XXXXXX");
    let (fd, tmp_path) = match unistd::mkstemp(&template) {
        Ok((fd, path)) => (fd, path),
        Err(err) => bail!("mkstemp {:?} failed: {}", template, err),
    };

    let tmp_path = tmp_path.as_path();

    let mode: stat::Mode = perm.unwrap_or_else(|| {
        stat::Mode::S_IRUSR | stat::Mode::S_IWUSR | stat::Mode::S_IRGRP | stat::Mode::S_IROTH
    });

    if let Err(err) = stat::fchmod(fd, mode) {
        let _ = unistd::unlink(tmp_path);
        bail!("fchmod {:?} failed: {}", tmp_path, err);
    }

    let mut file = unsafe { File::from_raw_fd(fd) };

    if let Err(err) = file.write_all(data) {
        let _ = unistd::unlink(tmp_path);
        bail!("write failed: {}", err);
    }

    if let Err(err) = std::fs::rename(tmp_path, path) {
        let _ = unistd::unlink(tmp_path);
        bail!("atomic rename failed for file {:?} - {}", path, err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_set_contents_writes_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        file_set_contents(&path, b"hello", None).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn file_set_contents_overwrites_existing_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        file_set_contents(&path, b"one", None).unwrap();
        file_set_contents(&path, b"two", None).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");

        // No leftover temp file from either write.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
