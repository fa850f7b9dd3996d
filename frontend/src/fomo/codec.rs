//! Reversible obfuscation for values the engine keeps in browser storage.
//!
//! This is NOT a security boundary. The key is derived from a pepper that
//! ships inside the bundle plus the page origin, so anyone with DevTools can
//! rebuild it. It only keeps seen-lists from being readable at a glance.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
    Nonce,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use once_cell::unsync::OnceCell;
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;

use crate::error::{FomoError, Result};

pub const ENC_PREFIX: &str = "enc:v1:";
const SALT: &[u8] = b"eds_fomo_salt_v1";
pub const DEFAULT_ITERATIONS: u32 = 120_000;
const NONCE_LEN: usize = 12;

pub struct ObfuscationCodec {
    secret: String,
    iterations: u32,
    key: OnceCell<[u8; 32]>,
}

impl ObfuscationCodec {
    /// Key material is `"<pepper>|<origin>"`, same as blobs written by the
    /// earlier Web Crypto version of the site.
    pub fn new(pepper: &str, origin: &str) -> Self {
        Self::with_iterations(pepper, origin, DEFAULT_ITERATIONS)
    }

    pub fn with_iterations(pepper: &str, origin: &str, iterations: u32) -> Self {
        Self {
            secret: format!("{}|{}", pepper, origin),
            iterations: iterations.max(1),
            key: OnceCell::new(),
        }
    }

    pub fn is_tagged(raw: &str) -> bool {
        raw.starts_with(ENC_PREFIX)
    }

    // PBKDF2 is the expensive part, so it runs once per codec.
    fn key(&self) -> &[u8; 32] {
        self.key.get_or_init(|| {
            let mut key = [0u8; 32];
            pbkdf2::pbkdf2_hmac::<Sha256>(self.secret.as_bytes(), SALT, self.iterations, &mut key);
            key
        })
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key())
            .map_err(|e| FomoError::Cipher(e.to_string()))
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let plaintext = serde_json::to_vec(value)?;
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| FomoError::Encrypt)?;

        Ok(format!(
            "{}{}:{}",
            ENC_PREFIX,
            BASE64.encode(nonce_bytes),
            BASE64.encode(ciphertext)
        ))
    }

    pub fn decode<T: DeserializeOwned>(&self, blob: &str) -> Result<T> {
        let body = blob.strip_prefix(ENC_PREFIX).ok_or(FomoError::Untagged)?;
        let (iv_b64, ct_b64) = body
            .split_once(':')
            .ok_or_else(|| FomoError::MalformedBlob("missing separator".to_string()))?;

        let nonce_bytes = BASE64.decode(iv_b64)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(FomoError::MalformedBlob(format!(
                "nonce is {} bytes",
                nonce_bytes.len()
            )));
        }
        let ciphertext = BASE64.decode(ct_b64)?;

        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| FomoError::Decrypt)?;

        let text = String::from_utf8(plaintext)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// `decode` for callers that treat any failure as "nothing stored".
    pub fn decode_soft<T: DeserializeOwned>(&self, blob: &str) -> Option<T> {
        match self.decode(blob) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("Discarding undecodable blob: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn codec() -> ObfuscationCodec {
        ObfuscationCodec::with_iterations("pepper", "https://example.test", 2)
    }

    #[test]
    fn round_trips_empty_object() {
        let codec = codec();
        let blob = codec.encode(&json!({})).unwrap();
        assert!(ObfuscationCodec::is_tagged(&blob));
        let back: Value = codec.decode(&blob).unwrap();
        assert_eq!(back, json!({}));
    }

    #[test]
    fn round_trips_strings_that_look_like_blobs() {
        let codec = codec();
        let tricky = json!({ "enc:v1:abc:def": 1, "note": "enc:v1:" });
        let blob = codec.encode(&tricky).unwrap();
        let back: Value = codec.decode(&blob).unwrap();
        assert_eq!(back, tricky);

        let bare = "enc:v1:not-really";
        let blob = codec.encode(bare).unwrap();
        let back: String = codec.decode(&blob).unwrap();
        assert_eq!(back, bare);
    }

    #[test]
    fn plaintext_is_not_visible_in_blob() {
        let codec = codec();
        let blob = codec.encode(&json!({ "olivia smith": 1 })).unwrap();
        assert!(!blob.contains("olivia"));
    }

    #[test]
    fn fresh_nonce_per_encode() {
        let codec = codec();
        let a = codec.encode(&json!([1, 2, 3])).unwrap();
        let b = codec.encode(&json!([1, 2, 3])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_soft() {
        let blob = codec().encode(&json!({ "k": 1 })).unwrap();
        let other = ObfuscationCodec::with_iterations("pepper", "https://elsewhere.test", 2);
        assert!(matches!(other.decode::<Value>(&blob), Err(FomoError::Decrypt)));
        assert!(other.decode_soft::<Value>(&blob).is_none());
    }

    #[test]
    fn malformed_blobs_fail_soft() {
        let codec = codec();
        for raw in ["", "plain", "enc:v1:", "enc:v1:@@@:@@@", "enc:v1:AAAA:AAAA", "enc:v1:nocolon"] {
            assert!(codec.decode_soft::<Value>(raw).is_none(), "{raw}");
        }
        assert!(matches!(codec.decode::<Value>("plain"), Err(FomoError::Untagged)));
    }

    #[quickcheck]
    fn round_trips_arbitrary_maps(map: BTreeMap<String, i64>) -> bool {
        let codec = codec();
        let blob = codec.encode(&map).unwrap();
        codec.decode::<BTreeMap<String, i64>>(&blob).unwrap() == map
    }

    #[quickcheck]
    fn round_trips_arbitrary_strings(text: String) -> bool {
        let codec = codec();
        let blob = codec.encode(&text).unwrap();
        codec.decode::<String>(&blob).unwrap() == text
    }
}
