use std::path::{Path, PathBuf};

use align_core::Image;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, RgbImage};

use crate::error::{AlignError, AlignResult};

/// Decode an image file to RGB8
pub fn load_image<P: AsRef<Path>>(path: P) -> AlignResult<Image> {
    let path = path.as_ref();
    let reader = ImageReader::open(path).map_err(|source| AlignError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = reader.decode().map_err(|source| AlignError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Image::new(width as usize, height as usize, 3, rgb.into_raw())?)
}

/// Encode `img` with the format implied by the file extension, creating
/// parent directories as needed
pub fn save_image<P: AsRef<Path>>(path: P, img: &Image) -> AlignResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| AlignError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let (w, h) = (img.width() as u32, img.height() as u32);
    let buffer = img.as_slice().to_vec();
    let dynamic = match img.channels() {
        1 => GrayImage::from_raw(w, h, buffer).map(DynamicImage::ImageLuma8),
        _ => RgbImage::from_raw(w, h, buffer).map(DynamicImage::ImageRgb8),
    }
    .ok_or_else(|| AlignError::Input(format!("cannot encode {}x{} image", w, h)))?;

    dynamic.save(path).map_err(|source| AlignError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

/// Regular files of `dir` with a known image extension, in lexical order
pub fn list_images<P: AsRef<Path>>(dir: P) -> AlignResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let io_err = |source| AlignError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_image_path(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension)
        .is_some()
}
