//! Upload sniffing: raw binary, data-URL, or bare base64.
//!
//! Best-effort only. Anything that cannot be decoded passes through as-is.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{debug, info};

const PDF_MAGIC: &[u8] = b"%PDF";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

/// Upload bytes tagged with how they were recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Passed through untouched.
    Raw(Vec<u8>),
    /// Decoded from the payload of a `data:` URL.
    DataUrl(Vec<u8>),
    /// Decoded from bare base64 text.
    Base64(Vec<u8>),
}

impl Normalized {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Raw(b) | Self::DataUrl(b) | Self::Base64(b) => b,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Raw(b) | Self::DataUrl(b) | Self::Base64(b) => b,
        }
    }

    pub fn encoding(&self) -> &'static str {
        match self {
            Self::Raw(_) => "raw",
            Self::DataUrl(_) => "data-url",
            Self::Base64(_) => "base64",
        }
    }
}

/// Decode an upload to the bytes of the document it carries.
pub fn normalize_upload(content: Vec<u8>) -> Normalized {
    if content.is_empty() {
        return Normalized::Raw(content);
    }

    if content.starts_with(b"data:") {
        let Some(comma) = content.iter().position(|&b| b == b',') else {
            return Normalized::Raw(content);
        };
        return match decode_lenient(&content[comma + 1..]) {
            Some(decoded) => {
                info!("Decoded base64 data URL ({} bytes)", decoded.len());
                Normalized::DataUrl(decoded)
            }
            None => {
                debug!("Data URL payload is not valid base64, using content as-is");
                Normalized::Raw(content)
            }
        };
    }

    if content.starts_with(PDF_MAGIC) || content.starts_with(JPEG_MAGIC) {
        return Normalized::Raw(content);
    }

    match decode_lenient(&content) {
        Some(decoded) if has_document_magic(&decoded) => {
            info!("Decoded base64 content ({} bytes)", decoded.len());
            Normalized::Base64(decoded)
        }
        _ => Normalized::Raw(content),
    }
}

/// True when `bytes` start with a PDF, JPEG, or PNG signature.
pub fn has_document_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC) || bytes.starts_with(JPEG_MAGIC) || bytes.starts_with(PNG_MAGIC)
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Base64-decode, discarding bytes outside the alphabet (line breaks etc.).
fn decode_lenient(encoded: &[u8]) -> Option<Vec<u8>> {
    let filtered: Vec<u8> = encoded
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        .collect();
    if filtered.is_empty() {
        return None;
    }
    BASE64.decode(&filtered).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_PAYLOAD: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];

    #[test]
    fn test_data_url_decodes_payload_after_first_comma() {
        let payload = b"%PDF-1.4 tiny, with a comma";
        let upload = format!("data:application/pdf;base64,{}", BASE64.encode(payload));

        let normalized = normalize_upload(upload.into_bytes());
        assert_eq!(normalized, Normalized::DataUrl(payload.to_vec()));
        assert_eq!(normalized.encoding(), "data-url");
    }

    #[test]
    fn test_data_url_with_line_breaks() {
        let encoded = BASE64.encode(PNG_PAYLOAD);
        let (head, tail) = encoded.split_at(6);
        let upload = format!("data:image/png;base64,{}\r\n{}\n", head, tail);

        assert_eq!(
            normalize_upload(upload.into_bytes()).into_bytes(),
            PNG_PAYLOAD.to_vec()
        );
    }

    #[test]
    fn test_data_url_without_comma_passes_through() {
        let upload = b"data:image/png;base64".to_vec();
        assert_eq!(normalize_upload(upload.clone()), Normalized::Raw(upload));
    }

    #[test]
    fn test_data_url_with_invalid_payload_passes_through() {
        let upload = b"data:image/png;base64,@@@".to_vec();
        assert_eq!(normalize_upload(upload.clone()), Normalized::Raw(upload));
    }

    #[test]
    fn test_bare_base64_of_known_formats() {
        for payload in [PNG_PAYLOAD.to_vec(), b"%PDF-1.7".to_vec(), vec![0xFF, 0xD8, 0xFF, 0xE0]] {
            let upload = BASE64.encode(&payload).into_bytes();
            assert_eq!(normalize_upload(upload), Normalized::Base64(payload));
        }
    }

    #[test]
    fn test_bare_base64_of_unknown_payload_passes_through() {
        let upload = BASE64.encode(b"just some text").into_bytes();
        assert_eq!(normalize_upload(upload.clone()), Normalized::Raw(upload));
    }

    #[test]
    fn test_binary_documents_pass_through() {
        let pdf = b"%PDF-1.4\n...".to_vec();
        assert_eq!(normalize_upload(pdf.clone()), Normalized::Raw(pdf));

        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00];
        assert_eq!(normalize_upload(jpeg.clone()), Normalized::Raw(jpeg));

        // Raw PNG is not base64 either; it comes back unchanged.
        assert_eq!(
            normalize_upload(PNG_PAYLOAD.to_vec()),
            Normalized::Raw(PNG_PAYLOAD.to_vec())
        );
    }

    #[test]
    fn test_empty_and_garbage_pass_through() {
        assert_eq!(normalize_upload(Vec::new()), Normalized::Raw(Vec::new()));
        let garbage = vec![0u8, 1, 2, 3, 250];
        assert_eq!(normalize_upload(garbage.clone()), Normalized::Raw(garbage));
    }

    #[test]
    fn test_magic_detection() {
        assert!(has_document_magic(b"%PDF-1.4"));
        assert!(has_document_magic(PNG_PAYLOAD));
        assert!(!has_document_magic(b"GIF89a"));
        assert!(is_pdf(b"%PDF"));
        assert!(!is_pdf(b"%PD"));
    }
}
