use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

pub const ACCEPTED_IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The file extension decides; the declared content type is only a
    /// fallback for names without one.
    pub fn mime_type(&self) -> Option<&'static str> {
        match extension_of(&self.file_name) {
            Some(extension) => mime_for_extension(&extension),
            None => self
                .content_type
                .as_deref()
                .and_then(mime_for_content_type),
        }
    }

    fn extension(&self) -> String {
        extension_of(&self.file_name)
            .filter(|extension| mime_for_extension(extension).is_some())
            .or_else(|| {
                self.mime_type()
                    .and_then(|mime| mime.strip_prefix("image/"))
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| "img".to_string())
    }
}

/// A scoped on-disk copy of an upload. The file is removed by [`discard`]
/// or, failing that, when the value is dropped.
///
/// [`discard`]: StagedUpload::discard
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    pub fn stage(upload: &ImageUpload, dir: Option<&Path>) -> io::Result<Self> {
        let suffix = format!(".{}", upload.extension());
        let mut builder = tempfile::Builder::new();
        builder.prefix("fitgenius-upload-").suffix(&suffix);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(&upload.bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }

    pub fn discard(self) -> io::Result<()> {
        self.file.close()
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
}

fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn mime_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some("image/jpeg"),
        "image/png" => Some("image/png"),
        "image/webp" => Some("image/webp"),
        _ => None,
    }
}
