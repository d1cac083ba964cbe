//! The server reply block.
//!
//! Replies are a CRLF name=value block, base64url-encoded as the POST
//! response body. The client echoes the encoded form back verbatim in its
//! next message's `server` field, so the emission order here is part of
//! the signed material of the following round trip.

use crate::base64url;
use crate::envelope;
use crate::error::WireError;
use crate::tif::Tif;

/// A structured server reply, one per engine invocation.
#[derive(Debug, Clone)]
pub struct ServerReply {
    /// Protocol versions this server speaks.
    pub versions: Vec<u32>,
    /// The freshly minted nut the client must present next.
    pub nut: String,
    /// Transaction flags.
    pub tif: Tif,
    /// Relative URL the client must POST its next message to.
    pub qry: String,
    /// Success redirect, included for client-provided-session logins.
    pub url: Option<String>,
    /// Cancel redirect, when configured.
    pub can: Option<String>,
    /// Stored session unlock key, when the client asked for it.
    pub suk: Option<String>,
    /// Secret index response.
    pub sin: Option<String>,
    /// A human-readable message for the client to show.
    pub ask: Option<String>,
}

impl ServerReply {
    pub fn new(nut: impl Into<String>, tif: Tif, qry: impl Into<String>) -> Self {
        Self {
            versions: vec![1],
            nut: nut.into(),
            tif,
            qry: qry.into(),
            url: None,
            can: None,
            suk: None,
            sin: None,
            ask: None,
        }
    }

    /// Render the CRLF block in canonical emission order.
    pub fn to_block(&self) -> String {
        let versions = self
            .versions
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let tif = self.tif.hex();

        let mut pairs: Vec<(&str, &str)> = vec![
            ("ver", versions.as_str()),
            ("nut", self.nut.as_str()),
            ("tif", tif.as_str()),
            ("qry", self.qry.as_str()),
        ];
        if let Some(url) = &self.url {
            pairs.push(("url", url));
        }
        if let Some(can) = &self.can {
            pairs.push(("can", can));
        }
        if let Some(suk) = &self.suk {
            pairs.push(("suk", suk));
        }
        if let Some(sin) = &self.sin {
            pairs.push(("sin", sin));
        }
        if let Some(ask) = &self.ask {
            pairs.push(("ask", ask));
        }
        envelope::encode_block(pairs)
    }

    /// The base64url response body.
    pub fn encode(&self) -> String {
        base64url::encode(self.to_block())
    }

    /// Decode a response body back into a structured reply.
    ///
    /// Used by clients (and the test suite) to continue a conversation.
    pub fn decode(body: &str) -> Result<Self, WireError> {
        let block = base64url::decode_str(body, "server")?;
        let fields = envelope::parse_block(&block)?;

        let versions = fields
            .get("ver")
            .ok_or(WireError::MissingField("ver"))?
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<u32>()
                    .map_err(|_| WireError::MalformedEnvelope("ver is not an integer"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            versions,
            nut: fields
                .get("nut")
                .cloned()
                .ok_or(WireError::MissingField("nut"))?,
            tif: Tif::from_hex(fields.get("tif").ok_or(WireError::MissingField("tif"))?)?,
            qry: fields
                .get("qry")
                .cloned()
                .ok_or(WireError::MissingField("qry"))?,
            url: fields.get("url").cloned(),
            can: fields.get("can").cloned(),
            suk: fields.get("suk").cloned(),
            sin: fields.get("sin").cloned(),
            ask: fields.get("ask").cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_has_canonical_order_and_trailing_crlf() {
        let mut reply = ServerReply::new("NUT", Tif::CURRENT_ID_MATCH, "/sqrl?nut=NUT");
        reply.suk = Some("SUK".to_string());
        let block = reply.to_block();
        assert_eq!(block, "ver=1\r\nnut=NUT\r\ntif=1\r\nqry=/sqrl?nut=NUT\r\nsuk=SUK\r\n");
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut reply = ServerReply::new("NUT", Tif::COMMAND_FAILED | Tif::CLIENT_FAILURE, "/q");
        reply.url = Some("https://example.com/in".to_string());
        reply.can = Some("https://example.com/out".to_string());
        reply.ask = Some("unknown nut: NUT".to_string());

        let decoded = ServerReply::decode(&reply.encode()).unwrap();
        assert_eq!(decoded.versions, vec![1]);
        assert_eq!(decoded.nut, "NUT");
        assert_eq!(decoded.tif, Tif::COMMAND_FAILED | Tif::CLIENT_FAILURE);
        assert_eq!(decoded.qry, "/q");
        assert_eq!(decoded.url.as_deref(), Some("https://example.com/in"));
        assert_eq!(decoded.can.as_deref(), Some("https://example.com/out"));
        assert_eq!(decoded.ask.as_deref(), Some("unknown nut: NUT"));
    }

    #[test]
    fn optional_fields_absent_by_default() {
        let reply = ServerReply::new("N", Tif::EMPTY, "/q");
        let block = reply.to_block();
        assert!(!block.contains("url="));
        assert!(!block.contains("can="));
        assert!(!block.contains("suk="));
        assert!(!block.contains("ask="));
    }
}
