//! 验证令牌编码
//!
//! 把证书编号拼成公开验证 URL，再渲染成可扫描的二维码。
//! 纠错级别取最高档 H，容忍打印件的中度磨损；
//! 输出尺寸不低于 [`MIN_IMAGE_SIZE`]，适配打印排版。
//! 无副作用：不落库、不发起网络调用，失败即 [`MedError::Encoding`]。

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::Luma;
use medevents_common::MedError;
use qrcode::{EcLevel, QrCode};

/// 渲染输出的最小边长（像素）
pub const MIN_IMAGE_SIZE: u32 = 512;

/// 编码结果：验证 URL 与其二维码 PNG 字节
#[derive(Debug, Clone)]
pub struct EncodedToken {
    pub url: String,
    pub png: Vec<u8>,
}

impl EncodedToken {
    /// 账本存储使用的 `data:image/png;base64,` 形式
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

/// 公开验证 URL，与路由路径保持字面一致
pub fn verification_url(base_url: &str, certificate_number: &str) -> String {
    format!(
        "{}/certificates/verify/{}",
        base_url.trim_end_matches('/'),
        certificate_number
    )
}

/// 编码验证令牌
pub fn encode(certificate_number: &str, base_url: &str) -> Result<EncodedToken, MedError> {
    let url = verification_url(base_url, certificate_number);

    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::H)
        .map_err(|err| MedError::encoding(format!("qr generation failed: {err}")))?;

    let rendered = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_IMAGE_SIZE, MIN_IMAGE_SIZE)
        .build();

    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(rendered)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|err| MedError::encoding(format!("png encoding failed: {err}")))?;

    Ok(EncodedToken { url, png })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_url_is_wire_exact() {
        assert_eq!(
            verification_url("https://events.example.org", "MED-2608-ABC234"),
            "https://events.example.org/certificates/verify/MED-2608-ABC234"
        );
        // 尾部斜杠不应产生双斜杠
        assert_eq!(
            verification_url("https://events.example.org/", "MED-2608-ABC234"),
            "https://events.example.org/certificates/verify/MED-2608-ABC234"
        );
    }

    #[test]
    fn test_encode_produces_png_of_required_size() {
        let token = encode("MED-2608-ABC234", "https://events.example.org").unwrap();
        assert_eq!(
            token.url,
            "https://events.example.org/certificates/verify/MED-2608-ABC234"
        );
        assert_eq!(&token.png[..8], b"\x89PNG\r\n\x1a\n", "应为 PNG 魔数");

        let decoded = image::load_from_memory(&token.png).unwrap();
        assert!(decoded.width() >= MIN_IMAGE_SIZE);
        assert!(decoded.height() >= MIN_IMAGE_SIZE);
    }

    #[test]
    fn test_data_uri_prefix() {
        let token = encode("MED-2608-ABC234", "https://events.example.org").unwrap();
        let uri = token.data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert!(uri.len() > "data:image/png;base64,".len());
    }

    #[test]
    fn test_oversized_payload_fails_with_encoding_error() {
        // H 级纠错下 QR 容量有限，超长 URL 必须以 Encoding 失败而非 panic
        let base = format!("https://{}.example.org", "a".repeat(4096));
        let err = encode("MED-2608-ABC234", &base).unwrap_err();
        assert!(matches!(err, MedError::Encoding(_)));
    }
}
