use base64::Engine as _;

use crate::types::ResourceRef;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("resource is not a data URL")]
    NotDataUrl,
    #[error("data URL is not base64 encoded (media type '{0}')")]
    NotBase64(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Decoded payload of a `data:` locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataResource {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataResource {
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            _ => "bin",
        }
    }
}

impl ResourceRef {
    pub fn is_data_url(&self) -> bool {
        self.as_str().trim_start().starts_with("data:")
    }

    /// Decodes `data:<mime>;base64,<payload>`. The service emits a space after
    /// the comma, so surrounding whitespace in the payload is ignored.
    pub fn decode_data_url(&self) -> Result<DataResource, ResourceError> {
        let rest = self
            .as_str()
            .trim_start()
            .strip_prefix("data:")
            .ok_or(ResourceError::NotDataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(ResourceError::NotDataUrl)?;

        let mut parts = header.split(';');
        let mime = parts
            .next()
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "text/plain".to_string());
        if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(ResourceError::NotBase64(mime));
        }

        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
        Ok(DataResource { mime, bytes })
    }
}
