//! Open tracking: random pixel tokens and the pixel itself.

use rand::RngCore;

/// 1x1 transparent GIF served for every tracking request.
pub const TRACKING_PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

/// 16 random bytes as lowercase hex.
#[must_use]
pub fn generate_tracking_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hidden image pointing at the tracking endpoint.
#[must_use]
pub fn tracking_pixel_html(backend_url: &str, tracking_id: &str) -> String {
    format!(
        r#"<img src="{}/api/email-marketing/track/{tracking_id}" width="1" height="1" style="display:none;" />"#,
        backend_url.trim_end_matches('/')
    )
}
