//! Helpers shared between the test modules.

use bytes::Bytes;

/// A tiny but valid PNG payload.
pub(crate) fn png_tile() -> Bytes {
    let mut buffer = std::io::Cursor::new(Vec::new());

    #[allow(clippy::unwrap_used)]
    image::RgbaImage::new(1, 1)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();

    Bytes::from(buffer.into_inner())
}
