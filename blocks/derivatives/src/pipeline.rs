use std::io::Cursor;

use async_trait::async_trait;
use futures::future::join_all;
use image::imageops::FilterType;
use lumen_atoms::fields::model::ImageSize;
use lumen_atoms::storage::{DerivativeGenerator, FileStorage};

/// Rendition pipeline: decodes an uploaded image and writes one resized copy
/// per configured size through the same storage adapter. Runs only when asset
/// bytes are written; a metadata-only record update never reaches it.
///
/// Non-image payloads are skipped, and failures are logged without failing
/// the record operation.
#[derive(Debug, Clone)]
pub struct ImageDerivatives {
    sizes: Vec<ImageSize>,
}

impl ImageDerivatives {
    pub fn new(sizes: Vec<ImageSize>) -> Self {
        Self { sizes }
    }
}

#[async_trait]
impl DerivativeGenerator for ImageDerivatives {
    async fn on_asset_written(&self, storage: &dyn FileStorage, filename: &str, bytes: &[u8]) {
        if self.sizes.is_empty() {
            return;
        }

        let format = match image::guess_format(bytes) {
            Ok(format) => format,
            Err(_) => {
                tracing::debug!("{} is not an image, skipping renditions", filename);
                return;
            }
        };
        let decoded = match image::load_from_memory_with_format(bytes, format) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!("failed to decode {}: {}", filename, e);
                return;
            }
        };

        for size in &self.sizes {
            let name = rendition_name(filename, size.width, size.height);
            let resized = decoded.resize(size.width, size.height, FilterType::Lanczos3);
            let mut encoded = Cursor::new(Vec::new());
            if let Err(e) = resized.write_to(&mut encoded, format) {
                tracing::warn!(
                    "failed to encode {} rendition of {}: {}",
                    size.name,
                    filename,
                    e
                );
                continue;
            }
            if let Err(e) = storage.write(&name, encoded.get_ref()).await {
                tracing::warn!("failed to write rendition {}: {}", name, e);
            }
        }
        tracing::info!("generated {} renditions for {}", self.sizes.len(), filename);
    }

    async fn on_asset_removed(&self, storage: &dyn FileStorage, filename: &str) {
        let deletes = self.sizes.iter().map(|size| {
            let name = rendition_name(filename, size.width, size.height);
            async move {
                match storage.exists(&name).await {
                    Ok(true) => {
                        if let Err(e) = storage.delete(&name).await {
                            tracing::warn!("failed to delete rendition {}: {}", name, e);
                        }
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!("failed to probe rendition {}: {}", name, e),
                }
            }
        });
        join_all(deletes).await;
    }
}

/// Rendition naming: `photo.jpg` at 200x200 becomes `photo-200x200.jpg`.
pub fn rendition_name(filename: &str, width: u32, height: u32) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            format!("{}-{}x{}.{}", stem, width, height, ext)
        }
        _ => format!("{}-{}x{}", filename, width, height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use lumen_atoms::storage::MemoryStorage;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgb::<u8>([120, 40, 200]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn sizes() -> Vec<ImageSize> {
        vec![
            ImageSize {
                name: "thumbnail".to_string(),
                width: 200,
                height: 200,
            },
            ImageSize {
                name: "medium".to_string(),
                width: 800,
                height: 800,
            },
        ]
    }

    #[tokio::test]
    async fn writes_one_rendition_per_size() {
        let storage = MemoryStorage::new();
        let pipeline = ImageDerivatives::new(sizes());

        pipeline
            .on_asset_written(&storage, "photo.png", &png_bytes(64, 64))
            .await;

        assert!(storage.exists("photo-200x200.png").await.unwrap());
        assert!(storage.exists("photo-800x800.png").await.unwrap());
    }

    #[tokio::test]
    async fn non_image_payloads_are_skipped() {
        let storage = MemoryStorage::new();
        let pipeline = ImageDerivatives::new(sizes());

        pipeline
            .on_asset_written(&storage, "notes.txt", b"just some text")
            .await;

        assert_eq!(storage.mutation_count(), 0);
    }

    #[tokio::test]
    async fn removal_deletes_every_rendition() {
        let storage = MemoryStorage::new();
        let pipeline = ImageDerivatives::new(sizes());

        pipeline
            .on_asset_written(&storage, "photo.png", &png_bytes(64, 64))
            .await;
        pipeline.on_asset_removed(&storage, "photo.png").await;

        assert!(!storage.exists("photo-200x200.png").await.unwrap());
        assert!(!storage.exists("photo-800x800.png").await.unwrap());
    }

    #[test]
    fn rendition_names_follow_the_stem() {
        assert_eq!(rendition_name("a.jpg", 200, 200), "a-200x200.jpg");
        assert_eq!(rendition_name("noext", 200, 200), "noext-200x200");
    }
}
