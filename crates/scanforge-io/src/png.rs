use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use png::{BitDepth, ColorType, Decoder, Encoder};

use crate::error::IoError;

/// A decoded raster with its dimensions.
#[derive(Debug, Clone)]
pub struct ImageBuffer<T> {
    /// Pixel samples in row-major order.
    pub data: Vec<T>,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
}

/// Read an 8-bit RGB PNG image.
pub fn read_image_rgb8(file_path: impl AsRef<Path>) -> Result<ImageBuffer<u8>, IoError> {
    let (buf, width, height) = read_png_impl(file_path, ColorType::Rgb, BitDepth::Eight)?;
    Ok(ImageBuffer {
        data: buf,
        width,
        height,
    })
}

/// Read a 16-bit grayscale PNG image, as used for raw depth maps.
pub fn read_image_mono16(file_path: impl AsRef<Path>) -> Result<ImageBuffer<u16>, IoError> {
    let (buf, width, height) = read_png_impl(file_path, ColorType::Grayscale, BitDepth::Sixteen)?;
    Ok(ImageBuffer {
        data: convert_buf_u8_u16(buf),
        width,
        height,
    })
}

/// Write an 8-bit RGB PNG image.
pub fn write_image_rgb8(
    file_path: impl AsRef<Path>,
    image: &ImageBuffer<u8>,
) -> Result<(), IoError> {
    write_png_impl(
        file_path,
        &image.data,
        image.width,
        image.height,
        ColorType::Rgb,
        BitDepth::Eight,
    )
}

/// Write a 16-bit grayscale PNG image.
pub fn write_image_mono16(
    file_path: impl AsRef<Path>,
    image: &ImageBuffer<u16>,
) -> Result<(), IoError> {
    write_png_impl(
        file_path,
        &convert_buf_u16_u8(&image.data),
        image.width,
        image.height,
        ColorType::Grayscale,
        BitDepth::Sixteen,
    )
}

// utility function to read the png file
fn read_png_impl(
    file_path: impl AsRef<Path>,
    expected_color: ColorType,
    expected_depth: BitDepth,
) -> Result<(Vec<u8>, usize, usize), IoError> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let decoder = Decoder::new(File::open(file_path)?);
    let mut reader = decoder
        .read_info()
        .map_err(|e| IoError::PngDecodeError(e.to_string()))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| IoError::PngDecodeError(e.to_string()))?;

    if info.color_type != expected_color || info.bit_depth != expected_depth {
        return Err(IoError::UnexpectedImageFormat {
            expected: format!("{expected_color:?}/{expected_depth:?}"),
            found: format!("{:?}/{:?}", info.color_type, info.bit_depth),
        });
    }

    buf.truncate(info.buffer_size());
    Ok((buf, info.width as usize, info.height as usize))
}

// utility function to write the png file
fn write_png_impl(
    file_path: impl AsRef<Path>,
    data: &[u8],
    width: usize,
    height: usize,
    color: ColorType,
    depth: BitDepth,
) -> Result<(), IoError> {
    let file = File::create(file_path)?;
    let writer = BufWriter::new(file);

    let mut encoder = Encoder::new(writer, width as u32, height as u32);
    encoder.set_color(color);
    encoder.set_depth(depth);
    let mut writer = encoder
        .write_header()
        .map_err(|e| IoError::PngEncodingError(e.to_string()))?;
    writer
        .write_image_data(data)
        .map_err(|e| IoError::PngEncodingError(e.to_string()))?;
    Ok(())
}

// PNG stores 16-bit samples big-endian.
fn convert_buf_u8_u16(buf: Vec<u8>) -> Vec<u16> {
    let mut buf_u16 = Vec::with_capacity(buf.len() / 2);
    for chunk in buf.chunks_exact(2) {
        buf_u16.push(u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    buf_u16
}

fn convert_buf_u16_u8(buf: &[u16]) -> Vec<u8> {
    let mut buf_u8 = Vec::with_capacity(buf.len() * 2);
    for sample in buf {
        buf_u8.extend_from_slice(&sample.to_be_bytes());
    }
    buf_u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb8_roundtrip() -> Result<(), IoError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("color.png");

        let image = ImageBuffer {
            data: (0..4 * 3 * 3).map(|i| (i * 7 % 256) as u8).collect(),
            width: 4,
            height: 3,
        };
        write_image_rgb8(&path, &image)?;
        let read = read_image_rgb8(&path)?;

        assert_eq!(read.width, 4);
        assert_eq!(read.height, 3);
        assert_eq!(read.data, image.data);
        Ok(())
    }

    #[test]
    fn test_mono16_roundtrip() -> Result<(), IoError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("depth.png");

        let image = ImageBuffer {
            data: vec![0u16, 500, 1000, 65535, 1234, 42],
            width: 3,
            height: 2,
        };
        write_image_mono16(&path, &image)?;
        let read = read_image_mono16(&path)?;

        assert_eq!(read.width, 3);
        assert_eq!(read.height, 2);
        assert_eq!(read.data, image.data);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_reported() {
        let result = read_image_rgb8("/nonexistent/color.png");
        assert!(matches!(result, Err(IoError::FileDoesNotExist(_))));
    }

    #[test]
    fn test_wrong_layout_is_rejected() -> Result<(), IoError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("depth.png");
        let image = ImageBuffer {
            data: vec![1u16, 2, 3, 4],
            width: 2,
            height: 2,
        };
        write_image_mono16(&path, &image)?;

        let result = read_image_rgb8(&path);
        assert!(matches!(
            result,
            Err(IoError::UnexpectedImageFormat { .. })
        ));
        Ok(())
    }
}
