//! Static file serving.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::warn;

/// Why a static path could not be served.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("not found")]
    NotFound,

    /// The path tried to leave the static directory.
    #[error("forbidden")]
    Forbidden,

    #[error("failed to read asset: {0}")]
    Io(#[from] io::Error),
}

/// A file read from the static directory.
#[derive(Debug)]
pub struct Asset {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Files under one root directory, addressed by URL path.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    /// Serves files below `root`.
    ///
    /// A missing root is not an error; every lookup then misses.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = match fs::canonicalize(&root) {
            Ok(canonical) => canonical,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "static directory is not readable");
                root
            }
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads the file for a URL path such as `/` or `/js/app.js`.
    ///
    /// Directories resolve to their `index.html`. Any `..`, absolute, or
    /// symlinked path that leads outside the root is refused.
    pub fn load(&self, url_path: &str) -> Result<Asset, AssetError> {
        let decoded = urlencoding::decode(url_path).map_err(|_| AssetError::NotFound)?;
        if decoded.contains('\0') || decoded.contains('\\') {
            return Err(AssetError::Forbidden);
        }

        let relative = decoded.trim_start_matches('/');
        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(AssetError::Forbidden);
                }
            }
        }

        if relative.is_empty() || relative.ends_with('/') || path.is_dir() {
            path.push("index.html");
        }

        let canonical = match fs::canonicalize(&path) {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(AssetError::NotFound),
            Err(e) => return Err(e.into()),
        };
        if !canonical.starts_with(&self.root) {
            return Err(AssetError::Forbidden);
        }
        if !canonical.is_file() {
            return Err(AssetError::NotFound);
        }

        let body = fs::read(&canonical)?;
        Ok(Asset {
            content_type: content_type(&canonical),
            body,
        })
    }
}

/// Content type for a file, by extension.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, StaticFiles) {
        let dir = TempDir::new().unwrap();
        let public = dir.path().join("public");
        fs::create_dir_all(public.join("js")).unwrap();
        fs::write(public.join("index.html"), "<h1>timer</h1>").unwrap();
        fs::write(public.join("js/script.js"), "console.log(1)").unwrap();
        fs::write(public.join("metronome_out.wav"), b"RIFF....WAVE").unwrap();
        fs::write(dir.path().join("secret.txt"), "do not serve").unwrap();
        let files = StaticFiles::new(&public);
        (dir, files)
    }

    #[test]
    fn root_serves_index() {
        let (_dir, files) = fixture();
        let asset = files.load("/").unwrap();
        assert_eq!(asset.body, b"<h1>timer</h1>");
        assert_eq!(asset.content_type, "text/html; charset=utf-8");
    }

    #[test]
    fn nested_and_binary_files() {
        let (_dir, files) = fixture();
        assert_eq!(
            files.load("/js/script.js").unwrap().content_type,
            "text/javascript; charset=utf-8"
        );
        let wav = files.load("/metronome_out.wav").unwrap();
        assert_eq!(wav.content_type, "audio/wav");
        assert!(wav.body.starts_with(b"RIFF"));
    }

    #[test]
    fn directory_serves_its_index() {
        let (dir, files) = fixture();
        fs::write(dir.path().join("public/js/index.html"), "js index").unwrap();
        assert_eq!(files.load("/js").unwrap().body, b"js index");
        assert_eq!(files.load("/js/").unwrap().body, b"js index");
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_dir, files) = fixture();
        assert!(matches!(files.load("/nope.html"), Err(AssetError::NotFound)));
    }

    #[test]
    fn traversal_is_forbidden() {
        let (_dir, files) = fixture();
        for path in [
            "/../secret.txt",
            "/js/../../secret.txt",
            "/%2e%2e/secret.txt",
            "/..%2fsecret.txt",
            "/js\\..\\..\\secret.txt",
        ] {
            assert!(
                matches!(files.load(path), Err(AssetError::Forbidden)),
                "{path} should be forbidden"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_root_is_forbidden() {
        let (dir, files) = fixture();
        std::os::unix::fs::symlink(
            dir.path().join("secret.txt"),
            dir.path().join("public/leak.txt"),
        )
        .unwrap();
        assert!(matches!(files.load("/leak.txt"), Err(AssetError::Forbidden)));
    }

    #[test]
    fn missing_root_misses_everything() {
        let files = StaticFiles::new("/definitely/not/here");
        assert!(matches!(files.load("/"), Err(AssetError::NotFound)));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("a.CSS")), "text/css; charset=utf-8");
        assert_eq!(content_type(Path::new("a.bin")), "application/octet-stream");
        assert_eq!(content_type(Path::new("noext")), "application/octet-stream");
    }
}
