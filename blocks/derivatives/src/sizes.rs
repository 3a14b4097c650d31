use lumen_atoms::fields::model::ImageSize;

/// Rendition sizes the media collection ships with.
pub fn default_image_sizes() -> Vec<ImageSize> {
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
        ImageSize {
            name: "large".to_string(),
            width: 1200,
            height: 1200,
        },
    ]
}
