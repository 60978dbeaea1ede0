//! Time-limited object URLs.
//!
//! A signed URL looks like `<base>/media/<bucket>/<key>?method=GET&expires=<unix>&signature=<hex>`.
//! The signature is an HMAC-SHA256, keyed with the signing secret, over the method, bucket, key
//! and expiry, each field prefixed by a NUL byte.

use std::time::Duration;

use hmac::{Hmac, KeyInit, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

use super::ObjectStoreError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignedMethod {
    Get,
    Put,
}

impl SignedMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SignedMethod::Get => "GET",
            SignedMethod::Put => "PUT",
        }
    }
}

/// Query parameters carried by a signed URL.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedRequest {
    pub method: SignedMethod,
    pub expires: i64,
    pub signature: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signed url has expired")]
    Expired,
    #[error("signed url does not grant {0}")]
    MethodMismatch(&'static str),
    #[error("signature mismatch")]
    Invalid,
}

#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    base: Url,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>, base: Url) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            base,
        }
    }

    pub fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        method: SignedMethod,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError> {
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| ObjectStoreError::Signing("ttl out of range".to_string()))?;
        let expires = OffsetDateTime::now_utc()
            .unix_timestamp()
            .saturating_add(ttl_secs);
        self.signed_url_until(bucket, key, method, expires)
    }

    pub fn signed_url_until(
        &self,
        bucket: &str,
        key: &str,
        method: SignedMethod,
        expires: i64,
    ) -> Result<String, ObjectStoreError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ObjectStoreError::Signing(format!("base url `{}` cannot carry a path", self.base))
            })?;
            segments.pop_if_empty().push("media").push(bucket);
            segments.extend(key.split('/'));
        }

        let signature = self
            .signature(bucket, key, method, expires)
            .map_err(|err| ObjectStoreError::Signing(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("method", method.as_str())
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);

        Ok(url.into())
    }

    /// Check a signed request against the object it targets.
    pub fn verify(
        &self,
        bucket: &str,
        key: &str,
        method: SignedMethod,
        request: &SignedRequest,
        now: OffsetDateTime,
    ) -> Result<(), SignatureError> {
        if request.method != method {
            return Err(SignatureError::MethodMismatch(method.as_str()));
        }

        let expected = self
            .signature(bucket, key, request.method, request.expires)
            .map_err(|_| SignatureError::Invalid)?;
        if expected
            .as_bytes()
            .ct_eq(request.signature.to_ascii_lowercase().as_bytes())
            .unwrap_u8()
            == 0
        {
            return Err(SignatureError::Invalid);
        }

        if now.unix_timestamp() >= request.expires {
            return Err(SignatureError::Expired);
        }

        Ok(())
    }

    fn signature(
        &self,
        bucket: &str,
        key: &str,
        method: SignedMethod,
        expires: i64,
    ) -> Result<String, hmac::digest::InvalidLength> {
        let expires = expires.to_string();
        let mut mac = HmacSha256::new_from_slice(&self.secret)?;
        for field in [method.as_str(), bucket, key, expires.as_str()] {
            mac.update(&[0u8]);
            mac.update(field.as_bytes());
        }
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
