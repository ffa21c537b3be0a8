//! Image decoding with an explicit outcome instead of an error for
//! formats the decoder does not handle.

use image::{DynamicImage, ImageError, ImageReader};
use std::io::{self, BufRead, Seek};

/// Outcome of decoding a byte stream.
pub enum Decoded {
    Image(DynamicImage),
    /// Not a format the decoder understands (documents, videos, ...).
    Unsupported(String),
    /// Recognized format but the data is damaged or truncated.
    Corrupt(String),
}

impl Decoded {
    pub fn into_image(self) -> Option<DynamicImage> {
        match self {
            Decoded::Image(img) => Some(img),
            _ => None,
        }
    }
}

/// Sniff the format from content and decode. Only I/O failures unrelated to
/// the data itself are returned as errors.
pub fn decode<R: BufRead + Seek>(reader: R) -> io::Result<Decoded> {
    let reader = ImageReader::new(reader).with_guessed_format()?;
    if reader.format().is_none() {
        return Ok(Decoded::Unsupported("unrecognized image format".to_string()));
    }

    match reader.decode() {
        Ok(img) => Ok(Decoded::Image(img)),
        Err(ImageError::Unsupported(e)) => Ok(Decoded::Unsupported(e.to_string())),
        Err(ImageError::IoError(e)) if e.kind() != io::ErrorKind::UnexpectedEof => Err(e),
        Err(e) => Ok(Decoded::Corrupt(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{plain_jpeg, plain_png};
    use image::GenericImageView;
    use std::io::Cursor;

    #[test]
    fn test_decodes_png_and_jpeg() {
        let img = decode(Cursor::new(plain_png(12, 7))).unwrap().into_image().unwrap();
        assert_eq!(img.dimensions(), (12, 7));

        let img = decode(Cursor::new(plain_jpeg(9, 5))).unwrap().into_image().unwrap();
        assert_eq!(img.dimensions(), (9, 5));
    }

    #[test]
    fn test_text_is_unsupported() {
        let outcome = decode(Cursor::new(b"just some notes, not a picture".to_vec())).unwrap();
        assert!(matches!(outcome, Decoded::Unsupported(_)));
    }

    #[test]
    fn test_truncated_png_is_corrupt() {
        let mut data = plain_png(64, 64);
        data.truncate(40);
        let outcome = decode(Cursor::new(data)).unwrap();
        assert!(matches!(outcome, Decoded::Corrupt(_)));
    }
}
