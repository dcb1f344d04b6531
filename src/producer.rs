//! Image production: QR rendering, logo compositing and JPEG output

use crate::error::GenError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageReader, Luma, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use std::path::Path;

/// Light modules around the symbol, in module units.
const QUIET_ZONE: u32 = 4;

/// Pixel layout of a rendered symbol: (image side, pixels per module, offset
/// of the first data module).
fn layout(modules: u32, size: u32) -> (u32, u32, u32) {
    let span = modules + 2 * QUIET_ZONE;
    let scale = (size / span).max(1);
    let side = size.max(span * scale);
    let offset = (side - span * scale) / 2 + QUIET_ZONE * scale;
    (side, scale, offset)
}

/// Encode `text` at error-correction level H and rasterize it onto a
/// `size` x `size` white canvas.
///
/// When `size` is too small for one pixel per module the canvas grows to fit
/// the symbol.
pub fn render_qr(text: &str, size: u32) -> Result<GrayImage, GenError> {
    let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::H)
        .map_err(|e| GenError::EncodeError(e.to_string()))?;

    let modules = code.width() as u32;
    let (side, scale, offset) = layout(modules, size);
    let mut img = GrayImage::from_pixel(side, side, Luma([255u8]));

    for (i, color) in code.to_colors().iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let px = offset + (i as u32 % modules) * scale;
        let py = offset + (i as u32 / modules) * scale;
        for dy in 0..scale {
            for dx in 0..scale {
                img.put_pixel(px + dx, py + dy, Luma([0u8]));
            }
        }
    }

    Ok(img)
}

/// Side of a logo covering `percent`% of a `canvas` pixel square.
pub fn logo_side(canvas: u32, percent: u8) -> u32 {
    let side = u64::from(canvas) * u64::from(percent) / 100;
    side.max(1) as u32
}

/// A logo decoded and resized once, shared by every worker.
#[derive(Debug, Clone)]
pub struct Logo {
    source: DynamicImage,
    percent: u8,
    image: RgbaImage,
}

impl Logo {
    /// Decode the logo at `path` and resize it with a Lanczos3 filter to a
    /// square covering `percent`% of a `canvas` pixel image.
    pub fn load(path: &Path, canvas: u32, percent: u8) -> Result<Self, GenError> {
        let logo_error = |reason: String| GenError::LogoError {
            path: path.to_path_buf(),
            reason,
        };

        let source = ImageReader::open(path)
            .map_err(|e| logo_error(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| logo_error(e.to_string()))?
            .decode()
            .map_err(|e| logo_error(e.to_string()))?;

        let side = logo_side(canvas, percent);
        let image = source
            .resize_exact(side, side, FilterType::Lanczos3)
            .to_rgba8();

        Ok(Self {
            source,
            percent,
            image,
        })
    }

    #[cfg(test)]
    pub fn from_image(image: RgbaImage, percent: u8) -> Self {
        Self {
            source: DynamicImage::ImageRgba8(image.clone()),
            percent,
            image,
        }
    }

    pub fn size(&self) -> u32 {
        self.image.width()
    }
}

/// Paint `logo` centered over `base`, alpha-blended.
///
/// A canvas that grew past the requested size gets a logo resized to the
/// same percentage of the actual canvas.
pub fn overlay_logo(base: &GrayImage, logo: &Logo) -> DynamicImage {
    let mut canvas = DynamicImage::ImageLuma8(base.clone()).to_rgba8();

    let side = logo_side(canvas.width(), logo.percent);
    let resized;
    let top = if side == logo.image.width() {
        &logo.image
    } else {
        resized = logo
            .source
            .resize_exact(side, side, FilterType::Lanczos3)
            .to_rgba8();
        &resized
    };

    let x = (i64::from(canvas.width()) - i64::from(top.width())) / 2;
    let y = (i64::from(canvas.height()) - i64::from(top.height())) / 2;
    imageops::overlay(&mut canvas, top, x, y);

    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
}

/// Encode `image` as JPEG and write it to `path`, creating parent
/// directories as needed.
pub fn save_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), GenError> {
    let mut jpeg_data = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg_data, quality);
    let image = if image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image.clone()
    };
    image
        .write_with_encoder(encoder)
        .map_err(|e| GenError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if let Some(parent) = path.parent() {
        // create_dir_all tolerates another worker creating the same shard
        std::fs::create_dir_all(parent).map_err(|source| GenError::IoError {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, &jpeg_data).map_err(|source| GenError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

/// Production options
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    pub size: u32,
    pub quality: u8,
    pub logo: Option<Logo>,
}

/// Produce one QR image for `text` at `path`.
///
/// # Arguments
/// * `text` - Rendered payload
/// * `path` - Output JPEG path
/// * `options` - Size, quality and optional logo
pub fn produce(text: &str, path: &Path, options: &ProducerOptions) -> Result<(), GenError> {
    let qr = render_qr(text, options.size)?;

    let image = match &options.logo {
        Some(logo) => overlay_logo(&qr, logo),
        None => DynamicImage::ImageLuma8(qr),
    };

    save_jpeg(&image, path, options.quality)
}

/// Decode every QR symbol found in the image at `path`.
#[cfg(test)]
pub fn decode_qr_file(path: &Path) -> Vec<String> {
    let gray = image::open(path).unwrap().to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        gray.width() as usize,
        gray.height() as usize,
        |x, y| gray.get_pixel(x as u32, y as u32)[0],
    );
    prepared
        .detect_grids()
        .iter()
        .map(|grid| grid.decode().unwrap().1)
        .collect()
}
