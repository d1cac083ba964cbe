//! `sqrl://` URL construction and canonicalization.
//!
//! The login invitation is a URL of the form
//! `sqrl://host[:port][/path]?nut=<base64url>[&x=<n>]`. The optional `x`
//! hint tells the client how many leading characters of the path belong to
//! the per-site key derivation, so sub-sites of one domain can carry
//! distinct identities.

use url::Url;

use crate::base64url;
use crate::error::WireError;

/// A freshly built login URL together with the nut embedded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlAndNut {
    /// The full `sqrl://` URL.
    pub url: String,
    /// The nut in its wire (base64url) form.
    pub nut: String,
    /// The raw nut bytes, when the caller supplied bytes rather than a
    /// pre-encoded value.
    pub nut_bytes: Option<Vec<u8>>,
}

/// Builds canonical `sqrl://` URLs for one configured site.
#[derive(Debug, Clone)]
pub struct SqrlUrlFactory {
    domain: String,
    port: Option<u16>,
    path: String,
    domain_extension: Option<usize>,
}

impl SqrlUrlFactory {
    /// Create a factory for the given site.
    ///
    /// The path is normalized to start with `/`; a trailing `?` (a caller
    /// convenience marker) is stripped. An empty or absent path yields
    /// URLs without a path component, and the extension hint is then
    /// never emitted.
    pub fn new(
        domain: &str,
        port: Option<u16>,
        path: Option<&str>,
        domain_extension: Option<usize>,
    ) -> Self {
        let path = match path {
            None | Some("") => String::new(),
            Some(p) => {
                let p = p.strip_suffix('?').unwrap_or(p);
                if p.starts_with('/') {
                    p.to_string()
                } else {
                    format!("/{p}")
                }
            }
        };
        Self {
            domain: domain.to_string(),
            port,
            path,
            domain_extension,
        }
    }

    /// Build a URL embedding raw nut bytes, rendered as unpadded base64url.
    pub fn url_for_bytes(&self, nut_bytes: &[u8]) -> UrlAndNut {
        let nut = base64url::encode(nut_bytes);
        UrlAndNut {
            url: self.build(&nut),
            nut,
            nut_bytes: Some(nut_bytes.to_vec()),
        }
    }

    /// Build a URL embedding a caller-supplied, already-encoded nut.
    pub fn url_for_encoded(&self, nut: &str) -> UrlAndNut {
        UrlAndNut {
            url: self.build(nut),
            nut: nut.to_string(),
            nut_bytes: None,
        }
    }

    fn build(&self, nut: &str) -> String {
        let mut url = format!("sqrl://{}", self.domain);
        if let Some(port) = self.port {
            url.push_str(&format!(":{port}"));
        }
        url.push_str(&self.path);
        url.push_str("?nut=");
        url.push_str(nut);
        if let Some(x) = self.domain_extension {
            if !self.path.is_empty() {
                url.push_str(&format!("&x={}", x.min(self.path.len())));
            }
        }
        url
    }
}

/// Canonicalize a `sqrl://` URL for signing comparisons.
///
/// Scheme and host are lowercased, userinfo and any explicit port are
/// stripped, path and query are preserved verbatim.
pub fn canonicalize(raw: &str) -> Result<String, WireError> {
    let parsed = Url::parse(raw).map_err(|e| WireError::Url(e.to_string()))?;
    if parsed.scheme() != "sqrl" {
        return Err(WireError::Url(format!(
            "expected sqrl scheme, got {}",
            parsed.scheme()
        )));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| WireError::Url("missing host".to_string()))?
        .to_lowercase();

    let mut canonical = format!("sqrl://{host}{}", parsed.path());
    if let Some(query) = parsed.query() {
        canonical.push('?');
        canonical.push_str(query);
    }
    Ok(canonical)
}

/// Pull the `nut` query parameter out of a `sqrl://` URL.
pub fn nut_from_url(raw: &str) -> Result<String, WireError> {
    let parsed = Url::parse(raw).map_err(|e| WireError::Url(e.to_string()))?;
    parsed
        .query_pairs()
        .find(|(name, _)| name == "nut")
        .map(|(_, value)| value.into_owned())
        .ok_or(WireError::MalformedServerField)
}
