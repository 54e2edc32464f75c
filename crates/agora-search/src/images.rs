//! Image-proxy URLs for stored image paths.
//!
//! URLs follow the imgproxy layout
//! `{proxy}/{signature}/rs:fill:{w}:{h}/g:sm[/bl:10]/plain/{source}`.
//! With a key and salt configured the signature is the URL-safe base64
//! HMAC-SHA256 of `salt || path`; otherwise the literal `insecure` is used.

use agora_core::{Error, ImageProxyConfig, ImageUrls, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Divisor applied to both dimensions of the blurred placeholder.
const BLUR_SCALE: u32 = 16;

/// Blur radius of the placeholder variant.
const BLUR_SIGMA: u32 = 10;

/// Keyed MAC plus the salt prepended to every signed path.
#[derive(Clone)]
struct Signer {
    mac: HmacSha256,
    salt: Vec<u8>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

/// Builds image-proxy URLs from storage paths.
#[derive(Debug, Clone)]
pub struct ImageUrlBuilder {
    proxy_url: String,
    storage_url: String,
    signer: Option<Signer>,
}

impl ImageUrlBuilder {
    /// Build from configuration. Key and salt are hex-encoded.
    pub fn new(config: &ImageProxyConfig) -> Result<Self> {
        let signer = match (&config.key, &config.salt) {
            (Some(key), Some(salt)) => {
                let key = hex::decode(key)
                    .map_err(|e| Error::Config(format!("Invalid IMAGE_PROXY_KEY: {}", e)))?;
                let salt = hex::decode(salt)
                    .map_err(|e| Error::Config(format!("Invalid IMAGE_PROXY_SALT: {}", e)))?;
                let mac = HmacSha256::new_from_slice(&key)
                    .map_err(|e| Error::Config(format!("Invalid IMAGE_PROXY_KEY: {}", e)))?;
                Some(Signer { mac, salt })
            }
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "IMAGE_PROXY_KEY and IMAGE_PROXY_SALT must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            proxy_url: config.proxy_url.trim_end_matches('/').to_string(),
            storage_url: config.storage_url.trim_end_matches('/').to_string(),
            signer,
        })
    }

    /// Full-size and blurred URLs for one stored image.
    pub fn urls(&self, path: &str, width: u32, height: u32) -> ImageUrls {
        ImageUrls {
            url: self.url(path, width, height, None),
            blurred_url: self.url(
                path,
                (width / BLUR_SCALE).max(1),
                (height / BLUR_SCALE).max(1),
                Some(BLUR_SIGMA),
            ),
        }
    }

    /// URL of `path` resized to fill `width`×`height`, optionally blurred.
    pub fn url(&self, path: &str, width: u32, height: u32, blur: Option<u32>) -> String {
        let source = format!("{}/{}", self.storage_url, path.trim_start_matches('/'));
        let mut processing = format!("/rs:fill:{}:{}/g:sm", width, height);
        if let Some(sigma) = blur {
            processing.push_str(&format!("/bl:{}", sigma));
        }
        let path = format!("{}/plain/{}", processing, urlencoding::encode(&source));
        format!("{}/{}{}", self.proxy_url, self.signature(&path), path)
    }

    fn signature(&self, path: &str) -> String {
        let Some(signer) = &self.signer else {
            return "insecure".to_string();
        };
        let mut mac = signer.mac.clone();
        mac.update(&signer.salt);
        mac.update(path.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<&str>, salt: Option<&str>) -> ImageProxyConfig {
        ImageProxyConfig {
            proxy_url: "http://img.local/".to_string(),
            storage_url: "http://s3.local/images".to_string(),
            key: key.map(str::to_string),
            salt: salt.map(str::to_string),
        }
    }

    #[test]
    fn test_insecure_url() {
        let builder = ImageUrlBuilder::new(&config(None, None)).unwrap();
        let url = builder.url("avatars/ada.png", 144, 144, None);
        assert_eq!(
            url,
            "http://img.local/insecure/rs:fill:144:144/g:sm/plain/\
             http%3A%2F%2Fs3.local%2Fimages%2Favatars%2Fada.png"
        );
    }

    #[test]
    fn test_blurred_variant_is_smaller() {
        let builder = ImageUrlBuilder::new(&config(None, None)).unwrap();
        let urls = builder.urls("/bg.jpg", 1488, 480);
        assert!(urls.url.contains("/rs:fill:1488:480/g:sm/plain/"));
        assert!(urls.blurred_url.contains("/rs:fill:93:30/g:sm/bl:10/plain/"));
    }

    #[test]
    fn test_signed_url_is_deterministic() {
        let builder = ImageUrlBuilder::new(&config(Some("deadbeef"), Some("cafe"))).unwrap();
        let a = builder.url("logo.png", 144, 144, None);
        let b = builder.url("logo.png", 144, 144, None);
        assert_eq!(a, b);
        assert!(!a.contains("insecure"));
        let signature = a
            .trim_start_matches("http://img.local/")
            .split('/')
            .next()
            .unwrap();
        // 32-byte HMAC in unpadded base64
        assert_eq!(signature.len(), 43);
        assert!(!signature.contains('='));
    }

    #[test]
    fn test_signature_matches_fresh_mac() {
        let builder = ImageUrlBuilder::new(&config(Some("deadbeef"), Some("cafe"))).unwrap();
        let first = builder.url("logo.png", 144, 144, None);
        let second = builder.url("banner.png", 1488, 480, Some(BLUR_SIGMA));
        assert_ne!(first, second);

        let path = "/rs:fill:144:144/g:sm/plain/http%3A%2F%2Fs3.local%2Fimages%2Flogo.png";
        let mut mac = HmacSha256::new_from_slice(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
        mac.update(&[0xca, 0xfe]);
        mac.update(path.as_bytes());
        let expected = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        assert_eq!(first, format!("http://img.local/{}{}", expected, path));
    }

    #[test]
    fn test_debug_output_omits_key() {
        let builder = ImageUrlBuilder::new(&config(Some("deadbeef"), Some("cafe"))).unwrap();
        let debug = format!("{:?}", builder);
        assert!(debug.contains("Some(Signer { .. })"));
    }

    #[test]
    fn test_invalid_key_is_config_error() {
        let err = ImageUrlBuilder::new(&config(Some("xyz"), Some("00"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = ImageUrlBuilder::new(&config(Some("00"), None)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
