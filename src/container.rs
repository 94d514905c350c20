use std::fs;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::error::PrepError;

/// Name of the image collection inside a slide container.
pub const IMAGE_COLLECTION: &str = "imgs";

const DEFAULT_IMAGE_EXT: &str = "png";

#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Position within the container's image collection, starting at 0.
    pub index: usize,
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Reads the image collection embedded in a slide container file.
pub trait ContainerReader: Send + Sync {
    /// Feeds every image of the collection to `visit`, in collection order,
    /// and returns how many were visited. Stops at the first error.
    fn visit_images(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(EmbeddedImage) -> Result<(), PrepError>,
    ) -> Result<usize, PrepError>;
}

/// Picks the reader from the file extension: `.h5`/`.hdf5` go to
/// [`Hdf5ContainerReader`], `.zip` to [`ZipContainerReader`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SlideContainerReader;

impl ContainerReader for SlideContainerReader {
    fn visit_images(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(EmbeddedImage) -> Result<(), PrepError>,
    ) -> Result<usize, PrepError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("h5" | "hdf5") => Hdf5ContainerReader.visit_images(path, visit),
            Some("zip") => ZipContainerReader.visit_images(path, visit),
            _ => Err(PrepError::Container(format!(
                "{}: unsupported container type",
                path.display()
            ))),
        }
    }
}

/// HDF5 files holding an `imgs` dataset of `u8` pixels shaped
/// `(n, height, width)` or `(n, height, width, channels)` with 1, 3 or 4
/// channels. Each slice along the first axis is encoded as PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5ContainerReader;

impl ContainerReader for Hdf5ContainerReader {
    fn visit_images(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(EmbeddedImage) -> Result<(), PrepError>,
    ) -> Result<usize, PrepError> {
        let container_err = |err: hdf5::Error| PrepError::Container(format!("{}: {err}", path.display()));
        let file = hdf5::File::open(path).map_err(container_err)?;
        let dataset = file.dataset(IMAGE_COLLECTION).map_err(container_err)?;
        let pixels = dataset.read_dyn::<u8>().map_err(container_err)?;
        if pixels.ndim() < 3 {
            return Err(PrepError::Container(format!(
                "{}: {IMAGE_COLLECTION} has shape {:?}, expected (n, height, width[, channels])",
                path.display(),
                pixels.shape()
            )));
        }

        let mut count = 0usize;
        for (index, slice) in pixels.outer_iter().enumerate() {
            let data: Vec<u8> = slice.iter().copied().collect();
            let bytes = encode_png(slice.shape(), &data)
                .map_err(|message| PrepError::Container(format!("{}[{index}]: {message}", path.display())))?;
            visit(EmbeddedImage {
                index,
                extension: DEFAULT_IMAGE_EXT.to_string(),
                bytes,
            })?;
            count += 1;
        }
        Ok(count)
    }
}

/// Encodes row-major `data` of the given `(height, width[, channels])` shape.
pub fn encode_png(shape: &[usize], data: &[u8]) -> Result<Vec<u8>, String> {
    let (height, width, color) = match shape {
        [height, width] => (*height, *width, png::ColorType::Grayscale),
        [height, width, 1] => (*height, *width, png::ColorType::Grayscale),
        [height, width, 3] => (*height, *width, png::ColorType::Rgb),
        [height, width, 4] => (*height, *width, png::ColorType::Rgba),
        other => return Err(format!("unsupported image shape {other:?}")),
    };
    let height = u32::try_from(height).map_err(|_| "image too tall".to_string())?;
    let width = u32::try_from(width).map_err(|_| "image too wide".to_string())?;

    let mut bytes = Vec::new();
    let mut encoder = png::Encoder::new(&mut bytes, width, height);
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(|err| err.to_string())?;
    writer.write_image_data(data).map_err(|err| err.to_string())?;
    writer.finish().map_err(|err| err.to_string())?;
    Ok(bytes)
}

/// Zip archives whose `imgs/` entries hold encoded images (`imgs/0.png`,
/// `imgs/1.png`, ...). Entries are ordered naturally by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipContainerReader;

impl ContainerReader for ZipContainerReader {
    fn visit_images(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(EmbeddedImage) -> Result<(), PrepError>,
    ) -> Result<usize, PrepError> {
        let file = fs::File::open(path)
            .map_err(|err| PrepError::Container(format!("open {}: {err}", path.display())))?;
        let mut archive = ZipArchive::new(file)
            .map_err(|err| PrepError::Container(format!("{}: {err}", path.display())))?;

        let mut members = Vec::new();
        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|err| PrepError::Container(err.to_string()))?;
            if entry.is_dir() {
                continue;
            }
            let Some(entry_path) = entry.enclosed_name() else {
                return Err(PrepError::Container(
                    "zip entry path traversal detected".to_string(),
                ));
            };
            if entry_path.parent() == Some(Path::new(IMAGE_COLLECTION)) {
                members.push((i, entry.name().to_string()));
            }
        }
        members.sort_by(|a, b| natord::compare(&a.1, &b.1));

        for (index, (entry_index, name)) in members.iter().enumerate() {
            let mut entry = archive
                .by_index(*entry_index)
                .map_err(|err| PrepError::Container(err.to_string()))?;
            // header sizes are not trusted for allocation
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(|err| PrepError::Container(format!("{name}: {err}")))?;
            visit(EmbeddedImage {
                index,
                extension: image_extension(name),
                bytes,
            })?;
        }
        Ok(members.len())
    }
}

fn image_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_IMAGE_EXT.to_string())
}
