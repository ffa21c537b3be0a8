//! In-memory image fixtures for tests.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// A gradient so that different sizes produce different bytes.
pub fn sample_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    DynamicImage::ImageRgb8(img)
}

pub fn plain_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&sample_image(width, height), ImageFormat::Jpeg)
}

pub fn plain_png(width: u32, height: u32) -> Vec<u8> {
    encode(&sample_image(width, height), ImageFormat::Png)
}

/// JPEG carrying an EXIF APP1 segment with the given tags.
pub fn jpeg_with_exif(
    width: u32,
    height: u32,
    orientation: Option<u16>,
    date_time_original: Option<&str>,
    date_time: Option<&str>,
) -> Vec<u8> {
    let jpeg = plain_jpeg(width, height);
    let segment = exif_segment(orientation, date_time_original, date_time);
    // Splice right after SOI.
    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&jpeg[2..]);
    out
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Little-endian TIFF block: IFD0 (Orientation, DateTime, Exif pointer)
/// and an Exif IFD holding DateTimeOriginal.
fn exif_segment(
    orientation: Option<u16>,
    date_time_original: Option<&str>,
    date_time: Option<&str>,
) -> Vec<u8> {
    let n0 = orientation.is_some() as usize
        + date_time.is_some() as usize
        + date_time_original.is_some() as usize;
    let ifd0_data_start = 8 + 2 + 12 * n0 + 4;
    let exif_ifd_start = ifd0_data_start + if date_time.is_some() { 20 } else { 0 };
    let exif_data_start = exif_ifd_start + 2 + 12 + 4;

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II*\0");
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&(n0 as u16).to_le_bytes());
    if let Some(o) = orientation {
        let mut value = [0u8; 4];
        value[..2].copy_from_slice(&o.to_le_bytes());
        ifd_entry(&mut tiff, 0x0112, 3, 1, value);
    }
    if date_time.is_some() {
        ifd_entry(&mut tiff, 0x0132, 2, 20, (ifd0_data_start as u32).to_le_bytes());
    }
    if date_time_original.is_some() {
        ifd_entry(&mut tiff, 0x8769, 4, 1, (exif_ifd_start as u32).to_le_bytes());
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());
    if let Some(dt) = date_time {
        tiff.extend_from_slice(&ascii_time(dt));
    }
    if let Some(dt) = date_time_original {
        tiff.extend_from_slice(&1u16.to_le_bytes());
        ifd_entry(&mut tiff, 0x9003, 2, 20, (exif_data_start as u32).to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        tiff.extend_from_slice(&ascii_time(dt));
    }

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(&tiff);
    segment
}

fn ifd_entry(out: &mut Vec<u8>, tag: u16, typ: u16, count: u32, value: [u8; 4]) {
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&typ.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&value);
}

fn ascii_time(s: &str) -> [u8; 20] {
    assert_eq!(s.len(), 19, "EXIF times are YYYY:MM:DD HH:MM:SS");
    let mut out = [0u8; 20];
    out[..19].copy_from_slice(s.as_bytes());
    out
}
