use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem store for downloaded cover images. Files are named from the
/// owning book's external id, so repeated writes for the same book land on
/// the same path and concurrent writers converge on one file.
pub struct CoverStore {
    dir: PathBuf,
}

impl CoverStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save(
        &self,
        external_id: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let extension = content_type.and_then(map_cover_extension).unwrap_or("jpg");
        let path = self.dir.join(format!("cover_{}.{}", external_id, extension));
        fs::write(&path, bytes)?;
        log::info!("cover saved: {}", path.display());
        Ok(path)
    }

    /// Removes the file behind a deleted book. Returns false when it was
    /// already absent.
    pub fn delete(&self, path: &Path) -> io::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => {
                log::info!("cover removed: {}", path.display());
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

fn map_cover_extension(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or("").trim();
    match essence {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
