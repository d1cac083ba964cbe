//! The verified client request record.
//!
//! `cmd=` values and `opt=` flags are closed vocabularies; anything outside
//! them is rejected at the parse boundary rather than carried along as
//! strings.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::WireError;

/// The five SQRL commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Read-only identity probe.
    Query,
    /// Create, update, or rotate an identity; completes a login.
    Ident,
    /// Disable SQRL authentication for the identity.
    Disable,
    /// Re-enable a disabled identity.
    Enable,
    /// Remove the identity entirely.
    Remove,
}

impl Command {
    pub const fn as_str(self) -> &'static str {
        match self {
            Command::Query => "query",
            Command::Ident => "ident",
            Command::Disable => "disable",
            Command::Enable => "enable",
            Command::Remove => "remove",
        }
    }
}

impl FromStr for Command {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Command::Query),
            "ident" => Ok(Command::Ident),
            "disable" => Ok(Command::Disable),
            "enable" => Ok(Command::Enable),
            "remove" => Ok(Command::Remove),
            other => Err(WireError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `opt=` flags (`~`-separated on the wire).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptFlags {
    /// Client asks the site to refuse non-SQRL authentication.
    pub sqrl_only: bool,
    /// Client asks the site to refuse out-of-band identity recovery.
    pub hard_lock: bool,
    /// Client-provided session: a same-device client that will redirect
    /// the browser itself on success.
    pub client_provided_session: bool,
    /// Client wants the stored session unlock key returned.
    pub return_session_unlock_key: bool,
}

impl OptFlags {
    /// Parse a `~`-separated flag list. Unknown flags are fatal.
    pub fn parse(raw: &str) -> Result<Self, WireError> {
        let mut flags = OptFlags::default();
        for flag in raw.split('~').filter(|f| !f.is_empty()) {
            match flag {
                "sqrlonly" => flags.sqrl_only = true,
                "hardlock" => flags.hard_lock = true,
                "cps" => flags.client_provided_session = true,
                "suk" => flags.return_session_unlock_key = true,
                other => return Err(WireError::UnknownOption(other.to_string())),
            }
        }
        Ok(flags)
    }
}

/// A decoded, signature-verified client message.
///
/// Key material stays in its base64url wire form here; the verification
/// step has already proven the `idk` (and `pidk`, when present) decode to
/// valid Ed25519 keys.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub protocol_version: u32,
    pub command: Command,
    /// The nut this message replies against, extracted from the echoed
    /// server field.
    pub nut: String,
    /// Primary identity public key (base64url, 32 bytes decoded).
    pub primary_identity_key: String,
    /// Previous identity public key, present during key rotation.
    pub previous_identity_key: Option<String>,
    /// Server unlock key; opaque to the engine, stored verbatim.
    pub server_unlock_key: Option<String>,
    /// Server verify-unlock key; opaque to the engine, stored verbatim.
    pub verify_unlock_key: Option<String>,
    pub index_secret: Option<String>,
    pub previous_index_secret: Option<String>,
    pub opt: OptFlags,
    /// The client's answer to a server `ask` dialog, when present (1..=3).
    pub ask_response: Option<u8>,
}

impl ClientRequest {
    /// Assemble the typed record from the decoded client block plus the
    /// nut recovered from the server field. Signature verification is the
    /// caller's job and must already have happened.
    pub fn from_fields(fields: &HashMap<String, String>, nut: String) -> Result<Self, WireError> {
        let ver = fields.get("ver").ok_or(WireError::MissingField("ver"))?;
        let protocol_version = ver
            .split(',')
            .next()
            .unwrap_or(ver)
            .trim()
            .parse::<u32>()
            .map_err(|_| WireError::MalformedEnvelope("ver is not an integer"))?;

        let command = fields
            .get("cmd")
            .ok_or(WireError::MissingField("cmd"))?
            .parse::<Command>()?;

        let primary_identity_key = fields
            .get("idk")
            .cloned()
            .ok_or(WireError::MissingIdentityKey)?;

        let opt = match fields.get("opt") {
            Some(raw) => OptFlags::parse(raw)?,
            None => OptFlags::default(),
        };

        let ask_response = fields
            .get("btn")
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|n| (1..=3).contains(n));

        Ok(Self {
            protocol_version,
            command,
            nut,
            primary_identity_key,
            previous_identity_key: fields.get("pidk").cloned(),
            server_unlock_key: fields.get("suk").cloned(),
            verify_unlock_key: fields.get("vuk").cloned(),
            index_secret: fields.get("ins").cloned(),
            previous_index_secret: fields.get("pins").cloned(),
            opt,
            ask_response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_full_request() {
        let f = fields(&[
            ("ver", "1"),
            ("cmd", "ident"),
            ("idk", "KEY"),
            ("pidk", "OLDKEY"),
            ("suk", "SUK"),
            ("vuk", "VUK"),
            ("opt", "cps~suk"),
            ("btn", "2"),
        ]);
        let req = ClientRequest::from_fields(&f, "NUT".to_string()).unwrap();
        assert_eq!(req.protocol_version, 1);
        assert_eq!(req.command, Command::Ident);
        assert_eq!(req.nut, "NUT");
        assert_eq!(req.primary_identity_key, "KEY");
        assert_eq!(req.previous_identity_key.as_deref(), Some("OLDKEY"));
        assert!(req.opt.client_provided_session);
        assert!(req.opt.return_session_unlock_key);
        assert!(!req.opt.sqrl_only);
        assert_eq!(req.ask_response, Some(2));
    }

    #[test]
    fn version_list_takes_first() {
        let f = fields(&[("ver", "1,2"), ("cmd", "query"), ("idk", "KEY")]);
        let req = ClientRequest::from_fields(&f, "N".into()).unwrap();
        assert_eq!(req.protocol_version, 1);
    }

    #[test]
    fn missing_idk_is_distinct() {
        let f = fields(&[("ver", "1"), ("cmd", "query")]);
        assert!(matches!(
            ClientRequest::from_fields(&f, "N".into()),
            Err(WireError::MissingIdentityKey)
        ));
    }

    #[test]
    fn missing_ver_and_cmd_are_distinct() {
        let f = fields(&[("cmd", "query"), ("idk", "KEY")]);
        assert!(matches!(
            ClientRequest::from_fields(&f, "N".into()),
            Err(WireError::MissingField("ver"))
        ));

        let f = fields(&[("ver", "1"), ("idk", "KEY")]);
        assert!(matches!(
            ClientRequest::from_fields(&f, "N".into()),
            Err(WireError::MissingField("cmd"))
        ));
    }

    #[test]
    fn unknown_command_rejected() {
        let f = fields(&[("ver", "1"), ("cmd", "hack"), ("idk", "KEY")]);
        assert!(matches!(
            ClientRequest::from_fields(&f, "N".into()),
            Err(WireError::UnknownCommand(_))
        ));
    }

    #[test]
    fn unknown_opt_flag_rejected() {
        assert!(matches!(
            OptFlags::parse("cps~nosuchflag"),
            Err(WireError::UnknownOption(_))
        ));
    }

    #[test]
    fn out_of_range_btn_ignored() {
        let f = fields(&[("ver", "1"), ("cmd", "query"), ("idk", "K"), ("btn", "7")]);
        let req = ClientRequest::from_fields(&f, "N".into()).unwrap();
        assert_eq!(req.ask_response, None);
    }
}
