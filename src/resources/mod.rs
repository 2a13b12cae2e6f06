//! Asset loading.
//!
//! [`load_scene`] fetches a `.gltf`/`.glb` file together with its external
//! buffers and images and produces CPU-side [`SceneData`]. Natively files are
//! read from the configured asset root with tokio, on the web they are fetched
//! relative to the page origin with reqwest. GPU upload happens later on the
//! thread that owns the device.

use anyhow::Context as _;
use futures::future::try_join_all;

pub mod mesh;
pub mod scene;
pub mod texture;

pub use scene::{MaterialData, NodeData, PrimitiveData, SceneData};

/// Load the glTF file at `path` (relative to `asset_root` natively, to the page
/// origin on the web). External buffer and image URIs are resolved relative to
/// the glTF file's directory. Embedded `data:` URIs are not supported.
pub async fn load_scene(path: &str, asset_root: &str) -> anyhow::Result<SceneData> {
    let bytes = load_binary(path, asset_root).await?;
    let gltf::Gltf { document, blob } =
        gltf::Gltf::from_slice(&bytes).with_context(|| format!("{path} is not a valid glTF file"))?;
    let base = parent_dir(path);

    let buffers = try_join_all(
        document
            .buffers()
            .map(|buffer| load_buffer(buffer, blob.as_deref(), base, asset_root)),
    )
    .await?;
    let images = try_join_all(
        document
            .images()
            .map(|image| load_image(image, &buffers, base, asset_root)),
    )
    .await?;

    let scene = scene::parse_document(&document, &buffers, images, path)?;
    log::info!(
        "Loaded {path}: {} primitives, {} materials, {} images",
        scene.primitive_count(),
        scene.materials.len(),
        scene.images.len()
    );
    Ok(scene)
}

async fn load_buffer(
    buffer: gltf::Buffer<'_>,
    blob: Option<&[u8]>,
    base: &str,
    asset_root: &str,
) -> anyhow::Result<Vec<u8>> {
    let data = match buffer.source() {
        gltf::buffer::Source::Bin => blob
            .with_context(|| format!("Buffer {} refers to a missing GLB binary chunk", buffer.index()))?
            .to_vec(),
        gltf::buffer::Source::Uri(uri) => {
            reject_data_uri(uri)?;
            load_binary(&resolve_uri(base, uri), asset_root).await?
        }
    };
    if data.len() < buffer.length() {
        anyhow::bail!(
            "Buffer {} is {} bytes long, expected at least {}",
            buffer.index(),
            data.len(),
            buffer.length()
        );
    }
    Ok(data)
}

async fn load_image(
    image: gltf::Image<'_>,
    buffers: &[Vec<u8>],
    base: &str,
    asset_root: &str,
) -> anyhow::Result<image::DynamicImage> {
    match image.source() {
        gltf::image::Source::View { view, mime_type } => {
            let start = view.offset();
            let bytes = buffers
                .get(view.buffer().index())
                .and_then(|buffer| buffer.get(start..start + view.length()))
                .with_context(|| format!("Image {} points outside of its buffer", image.index()))?;
            decode_image(bytes, Some(mime_type))
                .with_context(|| format!("Couldn't decode image {}", image.index()))
        }
        gltf::image::Source::Uri { uri, mime_type } => {
            reject_data_uri(uri)?;
            let bytes = load_binary(&resolve_uri(base, uri), asset_root).await?;
            decode_image(&bytes, mime_type).with_context(|| format!("Couldn't decode image {uri}"))
        }
    }
}

fn decode_image(bytes: &[u8], mime_type: Option<&str>) -> anyhow::Result<image::DynamicImage> {
    let image = match mime_type.and_then(image::ImageFormat::from_mime_type) {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(image)
}

fn reject_data_uri(uri: &str) -> anyhow::Result<()> {
    if uri.starts_with("data:") {
        anyhow::bail!("Embedded data URIs are not supported, export the model as .glb or with external files");
    }
    Ok(())
}

/// Directory part of `path` including the trailing slash, or "" for bare file names.
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..=i])
}

/// Join a relative URI from a glTF file onto that file's directory, folding
/// `.` and `..` segments. Leading `..` that would leave the asset root are kept.
pub fn resolve_uri(base: &str, uri: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(uri.split('/')) {
        match segment {
            "" | "." => {}
            ".." if segments.last().is_some_and(|last| *last != "..") => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("No window available")?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("Couldn't read the page origin"))?;
    let base = reqwest::Url::parse(&format!("{origin}/"))?;
    Ok(base.join(file_name)?)
}

pub async fn load_binary(file_name: &str, asset_root: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        // Served next to index.html, the asset root only exists natively
        let _ = asset_root;
        let url = format_url(file_name)?;
        reqwest::get(url.clone())
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("Couldn't fetch {url}"))?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new(asset_root).join(file_name);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Couldn't read {}", path.display()))?
    };

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_keeps_trailing_slash() {
        assert_eq!(parent_dir("3d_model/scene.gltf"), "3d_model/");
        assert_eq!(parent_dir("scene.glb"), "");
    }

    #[test]
    fn uris_resolve_against_the_gltf_directory() {
        assert_eq!(resolve_uri("3d_model/", "scene.bin"), "3d_model/scene.bin");
        assert_eq!(resolve_uri("3d_model/", "textures/a.png"), "3d_model/textures/a.png");
        assert_eq!(resolve_uri("3d_model/", "./b.png"), "3d_model/b.png");
        assert_eq!(resolve_uri("a/b/", "../c.png"), "a/c.png");
        assert_eq!(resolve_uri("", "../c.png"), "../c.png");
    }

    #[test]
    fn data_uris_are_rejected() {
        assert!(reject_data_uri("data:application/octet-stream;base64,AAAA").is_err());
        assert!(reject_data_uri("scene.bin").is_ok());
    }

    #[test]
    fn undecodable_images_are_errors() {
        assert!(decode_image(b"not an image", Some("image/png")).is_err());
        assert!(decode_image(b"not an image", None).is_err());
    }

    #[tokio::test]
    async fn missing_file_reports_the_path() {
        let error = load_scene("does/not/exist.gltf", "assets").await.unwrap_err();
        assert!(format!("{error:#}").contains("exist.gltf"));
    }
}
