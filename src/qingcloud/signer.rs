//! HmacSHA256 request signing, signature version 1.
//!
//! The string to sign is `GET\n<uri path>\n<canonical query>`, where the
//! canonical query is every parameter sorted by name and percent-encoded
//! with only unreserved characters left bare. The base64 digest is appended
//! as the `signature` parameter.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::Sha256;

use super::wire::Params;

const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const SIGNATURE_METHOD: &str = "HmacSHA256";
const SIGNATURE_VERSION: &str = "1";
const API_VERSION: &str = "1";

/// `time_stamp` layout, always UTC.
pub(crate) const TIME_STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Clone)]
pub(crate) struct Signer {
    access_key_id: String,
    secret_access_key: String,
}

impl fmt::Debug for Signer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Signer")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub(crate) const fn new(access_key_id: String, secret_access_key: String) -> Self {
        Self {
            access_key_id,
            secret_access_key,
        }
    }

    /// Adds the credential and signature parameters to `params` and returns
    /// the encoded query string, `signature` last.
    pub(crate) fn signed_query(
        &self,
        uri_path: &str,
        params: Params,
        time_stamp: &str,
    ) -> Result<String, InvalidLength> {
        let mut pairs = params;
        pairs.extend([
            (String::from("access_key_id"), self.access_key_id.clone()),
            (String::from("signature_method"), SIGNATURE_METHOD.to_owned()),
            (String::from("signature_version"), SIGNATURE_VERSION.to_owned()),
            (String::from("time_stamp"), time_stamp.to_owned()),
            (String::from("version"), API_VERSION.to_owned()),
        ]);
        let canonical = canonical_query(pairs);
        let signature = self.signature(&string_to_sign(uri_path, &canonical))?;
        Ok(format!("{canonical}&signature={}", encode(&signature)))
    }

    fn signature(&self, payload: &str) -> Result<String, InvalidLength> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_access_key.as_bytes())?;
        mac.update(payload.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

fn canonical_query(mut pairs: Params) -> String {
    pairs.sort();
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn string_to_sign(uri_path: &str, canonical: &str) -> String {
    format!("GET\n{uri_path}\n{canonical}")
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}
