//! Login QR rendering.
//!
//! Encodes the sidecar-issued QR payload as a PNG data URL. Pure and
//! side-effect-free; callers decide when issuance is allowed.

use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    image::{ImageBuffer, Luma},
    qrcode::{Color, QrCode},
};

use charla_common::{Error, Result};

/// Pixels per QR module.
const MODULE_SCALE: u32 = 8;
/// Quiet-zone border, in modules, on each side.
const QUIET_ZONE: u32 = 4;

/// Render a QR payload as a `data:image/png;base64,...` URL.
pub fn png_data_url(payload: &str) -> Result<String> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| Error::UpstreamError(format!("QR payload not encodable: {e}")))?;

    let modules = code.width() as u32;
    let colors = code.to_colors();
    let size = (modules + 2 * QUIET_ZONE) * MODULE_SCALE;

    let img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_fn(size, size, |x, y| {
        let mx = x / MODULE_SCALE;
        let my = y / MODULE_SCALE;
        let dark = mx >= QUIET_ZONE
            && my >= QUIET_ZONE
            && mx < QUIET_ZONE + modules
            && my < QUIET_ZONE + modules
            && colors[((my - QUIET_ZONE) * modules + (mx - QUIET_ZONE)) as usize] == Color::Dark;
        Luma([if dark { 0u8 } else { 255u8 }])
    });

    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .map_err(|e| Error::UpstreamError(format!("PNG encoding failed: {e}")))?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&bytes)))
}
