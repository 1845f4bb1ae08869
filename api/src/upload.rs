//! Per-request upload files
//!
//! Uploaded clips are written under the upload directory with a random
//! prefix and removed again when the [`TempUpload`] guard is dropped.

use std::io;
use std::path::{Path, PathBuf};

/// Reduce a client-supplied filename to a safe basename: path separators
/// become spaces, anything outside `[A-Za-z0-9_.-]` is dropped, whitespace
/// runs collapse to `_`, and leading/trailing `.`/`_` are trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Collision-resistant on-disk name for an upload
fn unique_name(original: &str) -> String {
    let base = sanitize_filename(original);
    let base = if base.is_empty() { "upload".to_string() } else { base };
    format!("{:016x}_{}", rand::random::<u64>(), base)
}

/// An uploaded file on disk, deleted when dropped
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub fn create(dir: &Path, original_name: &str, data: &[u8]) -> io::Result<Self> {
        let upload = Self::create_with(dir, original_name, |path| std::fs::write(path, data))?;
        log::debug!("[upload] Saved {} bytes to {:?}", data.len(), upload.path);
        Ok(upload)
    }

    /// The guard exists before `write` runs, so a partial file is removed on failure.
    fn create_with(
        dir: &Path,
        original_name: &str,
        write: impl FnOnce(&Path) -> io::Result<()>,
    ) -> io::Result<Self> {
        let upload = Self {
            path: dir.join(unique_name(original_name)),
        };
        write(&upload.path)?;
        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("[upload] Removed {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("[upload] Failed to remove {:?}: {}", self.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_paths_and_unsafe_characters() {
        assert_eq!(sanitize_filename("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("my cool clip (1).MOV"), "my_cool_clip_1.MOV");
        assert_eq!(sanitize_filename("C:\\videos\\fight.avi"), "C_videos_fight.avi");
        assert_eq!(sanitize_filename("..."), "");
    }

    #[test]
    fn same_name_uploads_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let a = TempUpload::create(dir.path(), "clip.mp4", b"a").unwrap();
        let b = TempUpload::create(dir.path(), "clip.mp4", b"b").unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(dir.path()));
        assert!(a.path().to_string_lossy().ends_with("_clip.mp4"));
        assert_eq!(std::fs::read(b.path()).unwrap(), b"b");
    }

    #[test]
    fn drop_removes_file_and_tolerates_external_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let upload = TempUpload::create(dir.path(), "clip.mp4", b"data").unwrap();
        let path = upload.path().to_path_buf();
        assert!(path.exists());
        drop(upload);
        assert!(!path.exists());

        let upload = TempUpload::create(dir.path(), "clip.mp4", b"data").unwrap();
        std::fs::remove_file(upload.path()).unwrap();
        drop(upload);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = TempUpload::create_with(dir.path(), "clip.mp4", |path| {
            std::fs::write(path, b"half a vid")?;
            Err(io::Error::other("No space left on device"))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unnamed_upload_gets_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let upload = TempUpload::create(dir.path(), "../", b"x").unwrap();
        assert!(upload.path().to_string_lossy().ends_with("_upload"));
    }
}
