use base64::{engine::general_purpose, Engine};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Base64 image ready for inline embedding
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub mime_type: &'static str,
    pub data: String,
}

impl EncodedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageError {
    NotFound(PathBuf),
    Unreadable { path: PathBuf, reason: String },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::NotFound(path) => write!(f, "{} does not exist", path.display()),
            ImageError::Unreadable { path, reason } => {
                write!(f, "{} could not be read: {}", path.display(), reason)
            }
        }
    }
}

/// Outcome of loading one reference picture
#[derive(Debug, Clone, PartialEq)]
pub enum PictureLoad {
    Loaded(EncodedImage),
    Skipped(ImageError),
}

/// Reads images from a fixed root directory; never writes
#[derive(Debug, Clone)]
pub struct ImageLoader {
    root: PathBuf,
}

impl ImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a client path (either separator style) onto the root
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ImageError> {
        let normalized = relative.replace('\\', "/");
        let relative_path = Path::new(normalized.trim_start_matches('/'));

        let mut resolved = self.root.clone();
        for component in relative_path.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                // Anything else would leave the root
                _ => return Err(ImageError::NotFound(self.root.join(relative_path))),
            }
        }
        Ok(resolved)
    }

    pub async fn load(&self, relative: &str) -> Result<EncodedImage, ImageError> {
        let path = self.resolve(relative)?;

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(ImageError::NotFound(path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ImageError::NotFound(path))
            }
            Err(e) => {
                return Err(ImageError::Unreadable {
                    path,
                    reason: e.to_string(),
                })
            }
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| ImageError::Unreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let data = general_purpose::STANDARD.encode(&bytes);
        log::debug!(
            "🖼️ Loaded {} ({} bytes, {} base64 chars)",
            path.display(),
            bytes.len(),
            data.len()
        );

        Ok(EncodedImage {
            mime_type: mime_type_for(&path),
            data,
        })
    }

    /// Best-effort load: a failure becomes `Skipped` instead of an error
    pub async fn load_picture(&self, relative: &str) -> PictureLoad {
        match self.load(relative).await {
            Ok(image) => PictureLoad::Loaded(image),
            Err(reason) => PictureLoad::Skipped(reason),
        }
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
