//! Pairing-code rendering: turns the code string the remote side issues
//! into a scannable PNG. Glue around the hub/rendezvous core.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Luma};
use qrcode::{EcLevel, QrCode};

use wabridge_core::errors::BridgeError;

/// Rendered image is at least this many pixels square.
const QR_SIZE: u32 = 1024;

/// Render `code` as a QR PNG.
pub fn render_png(code: &str) -> Result<Vec<u8>, BridgeError> {
    let matrix = encode(code)?;
    let img = matrix
        .render::<Luma<u8>>()
        .min_dimensions(QR_SIZE, QR_SIZE)
        .build();

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&img, img.width(), img.height(), ExtendedColorType::L8)
        .map_err(|e| BridgeError::Internal(format!("png encoding failed: {e}")))?;
    Ok(png)
}

/// Encode at the highest error-correction level the payload fits in.
fn encode(data: &str) -> Result<QrCode, BridgeError> {
    for ec in [EcLevel::H, EcLevel::Q, EcLevel::M, EcLevel::L] {
        if let Ok(code) = QrCode::with_error_correction_level(data, ec) {
            return Ok(code);
        }
    }
    Err(BridgeError::Internal(
        "pairing code too long to encode".into(),
    ))
}
