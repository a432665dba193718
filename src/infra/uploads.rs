//! Filesystem storage for uploaded bit images.

use std::error::Error as StdError;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use futures::{StreamExt, pin_mut, stream};
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::domain::entities::ImageRef;

/// Bytes kept in memory for dimension sniffing.
const HEADER_SNIFF_BYTES: usize = 64 * 1024;
const IMAGE_DIRECTORY: &str = "pagebits/images";

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file exceeds configured body limit")]
    PayloadTooLarge {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file stream failed")]
    PayloadStream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file size exceeds supported range")]
    SizeOverflow,
    #[error("`{content_type}` is not an accepted image type")]
    UnsupportedType { content_type: String },
    #[error("uploaded file is not a readable image")]
    NotAnImage,
}

/// Filesystem-backed image storage rooted at the uploads directory.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stream an uploaded image to disk and describe it.
    ///
    /// Anything that is not a recognisable image is removed again.
    pub async fn store_image_stream<S>(
        &self,
        original_name: &str,
        stream: S,
    ) -> Result<ImageRef, UploadStorageError>
    where
        S: futures::Stream<Item = Result<Bytes, UploadStorageError>>,
    {
        let content_type = mime_guess::from_path(original_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(UploadStorageError::UnsupportedType { content_type });
        }

        let filename = sanitize_filename(original_name);
        let stored_path = build_stored_path(&filename);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        let received = copy_stream(&mut file, stream).await;
        drop(file);

        let described = received.and_then(|received| {
            describe_image(received, stored_path, original_name, content_type)
        });
        if described.is_err() {
            let _ = fs::remove_file(&absolute).await;
        }
        described
    }

    /// Store a fully-buffered image.
    pub async fn store_image(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<ImageRef, UploadStorageError> {
        let stream = stream::once(async move { Ok::<_, UploadStorageError>(data) });
        self.store_image_stream(original_name, stream).await
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

/// Public URLs for stored images.
#[derive(Debug, Clone)]
pub struct MediaUrls {
    prefix: String,
}

impl MediaUrls {
    /// `prefix` starts and ends with `/`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn url_for(&self, image: &ImageRef) -> String {
        format!("{}{}", self.prefix, image.stored_path)
    }
}

struct Received {
    header: Vec<u8>,
    total_bytes: u64,
    checksum: String,
}

async fn copy_stream<S>(file: &mut fs::File, stream: S) -> Result<Received, UploadStorageError>
where
    S: futures::Stream<Item = Result<Bytes, UploadStorageError>>,
{
    let mut hasher = Sha256::new();
    let mut header = Vec::new();
    let mut total_bytes: u64 = 0;

    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }

        total_bytes = total_bytes
            .checked_add(chunk.len() as u64)
            .ok_or(UploadStorageError::SizeOverflow)?;
        if header.len() < HEADER_SNIFF_BYTES {
            let take = (HEADER_SNIFF_BYTES - header.len()).min(chunk.len());
            header.extend_from_slice(&chunk[..take]);
        }
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
    }
    file.flush().await?;

    Ok(Received {
        header,
        total_bytes,
        checksum: hex::encode(hasher.finalize()),
    })
}

fn describe_image(
    received: Received,
    stored_path: String,
    original_name: &str,
    content_type: String,
) -> Result<ImageRef, UploadStorageError> {
    if received.total_bytes == 0 {
        return Err(UploadStorageError::EmptyPayload);
    }
    let dimensions =
        imagesize::blob_size(&received.header).map_err(|_| UploadStorageError::NotAnImage)?;
    let size_bytes =
        i64::try_from(received.total_bytes).map_err(|_| UploadStorageError::SizeOverflow)?;

    Ok(ImageRef {
        stored_path,
        filename: original_file_name(original_name),
        content_type,
        size_bytes,
        checksum: received.checksum,
        width: u32::try_from(dimensions.width).ok(),
        height: u32::try_from(dimensions.height).ok(),
    })
}

fn build_stored_path(filename: &str) -> String {
    let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
    let identifier = Uuid::new_v4();
    format!(
        "{IMAGE_DIRECTORY}/{year}/{:02}/{:02}/{identifier}-{filename}",
        month as u8, day
    )
}

fn original_file_name(original: &str) -> String {
    Path::new(original)
        .file_name()
        .and_then(|value| value.to_str())
        .filter(|value| !value.is_empty())
        .unwrap_or("upload")
        .to_string()
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}
