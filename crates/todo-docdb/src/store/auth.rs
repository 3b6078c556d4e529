//! # Master-Key Request Signing
//!
//! Every REST request carries an `Authorization` header signed with the
//! account master key.
//!
//! ## Signature
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  payload = verb.lower          + "\n"                                   │
//! │          + resource_type.lower + "\n"   ("dbs", "colls", "docs")        │
//! │          + resource_link       + "\n"   ("dbs/ToDoList/colls/Items")    │
//! │          + x-ms-date.lower     + "\n"                                   │
//! │          + ""                  + "\n"                                   │
//! │                                                                         │
//! │  sig    = base64( HMAC-SHA256( base64decode(master_key), payload ) )    │
//! │  header = urlencode( "type=master&ver=1.0&sig=" + sig )                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use ring::hmac;
use url::form_urlencoded;

use crate::error::{DocDbError, DocDbResult};

/// Decoded master key, ready to sign requests.
pub struct MasterKey {
    key: hmac::Key,
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

impl MasterKey {
    /// Decodes a base64 master key.
    pub fn from_base64(encoded: &str) -> DocDbResult<Self> {
        let bytes = general_purpose::STANDARD.decode(encoded.trim())?;
        if bytes.is_empty() {
            return Err(DocDbError::Connection("Auth key is empty".to_string()));
        }
        Ok(MasterKey {
            key: hmac::Key::new(hmac::HMAC_SHA256, &bytes),
        })
    }

    /// Builds the `Authorization` header value for one request.
    pub fn authorization(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );

        let tag = hmac::sign(&self.key, payload.as_bytes());
        let signature = general_purpose::STANDARD.encode(tag.as_ref());
        let token = format!("type=master&ver=1.0&sig={}", signature);

        form_urlencoded::byte_serialize(token.as_bytes()).collect()
    }
}

/// Formats a timestamp the way `x-ms-date` expects (RFC 1123).
pub fn rfc1123_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
