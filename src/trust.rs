//! Editing of the exported trust settings database.
//!
//! The exported document looks like
//!
//! ```text
//! trustVersion  = 1
//! trustList     = { <opaque id> = { issuerName = <DER>, trustSettings = [...], ... }, ... }
//! ```
//!
//! Entries without `issuerName` are system anchors and are never touched.

use crate::error::{Error, Result};
use crate::property::{Dictionary, PropertyTree};

/// The only `trustVersion` this module knows how to edit.
pub const TRUST_VERSION: i64 = 1;

const KEY_VERSION: &str = "trustVersion";
const KEY_LIST: &str = "trustList";
const KEY_ISSUER: &str = "issuerName";
const KEY_SETTINGS: &str = "trustSettings";

const KEY_POLICY: &str = "kSecTrustSettingsPolicy";
const KEY_POLICY_NAME: &str = "kSecTrustSettingsPolicyName";
const KEY_RESULT: &str = "kSecTrustSettingsResult";

/// Apple SSL policy, OID 1.2.840.113635.100.1.3.
const OID_SSL_SERVER: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x63, 0x64, 0x01, 0x03];
/// Apple X.509 basic policy, OID 1.2.840.113635.100.1.2.
const OID_BASIC_X509: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x63, 0x64, 0x01, 0x02];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustResult {
    TrustRoot = 1,
    TrustAsRoot = 2,
    Deny = 3,
    Unspecified = 4,
}

impl TryFrom<i64> for TrustResult {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(TrustResult::TrustRoot),
            2 => Ok(TrustResult::TrustAsRoot),
            3 => Ok(TrustResult::Deny),
            4 => Ok(TrustResult::Unspecified),
            other => Err(Error::Parse(format!("unknown trust result {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPolicy {
    pub policy: Vec<u8>,
    pub name: String,
    pub result: TrustResult,
}

impl TrustPolicy {
    pub fn ssl_server() -> Self {
        Self {
            policy: OID_SSL_SERVER.to_vec(),
            name: "sslServer".to_string(),
            result: TrustResult::TrustRoot,
        }
    }

    pub fn basic_x509() -> Self {
        Self {
            policy: OID_BASIC_X509.to_vec(),
            name: "basicX509".to_string(),
            result: TrustResult::TrustRoot,
        }
    }

    pub fn to_property(&self) -> PropertyTree {
        let dict: Dictionary = vec![
            (KEY_POLICY, PropertyTree::Data(self.policy.clone())),
            (KEY_POLICY_NAME, PropertyTree::String(self.name.clone())),
            (KEY_RESULT, PropertyTree::Integer(self.result as i64)),
        ]
        .into_iter()
        .collect();

        PropertyTree::Dictionary(dict)
    }
}

impl TryFrom<&PropertyTree> for TrustPolicy {
    type Error = Error;

    fn try_from(value: &PropertyTree) -> Result<Self> {
        let dict = value
            .as_dictionary()
            .ok_or_else(|| Error::Parse(format!("trust policy is a {}", value.kind())))?;

        let policy = dict
            .get(KEY_POLICY)
            .and_then(PropertyTree::as_data)
            .ok_or_else(|| Error::Parse(format!("trust policy lacks {}", KEY_POLICY)))?;
        let name = dict
            .get(KEY_POLICY_NAME)
            .and_then(PropertyTree::as_string)
            .unwrap_or_default();
        let result = match dict.get(KEY_RESULT) {
            Some(v) => v
                .as_integer()
                .ok_or_else(|| Error::Parse(format!("{} is a {}", KEY_RESULT, v.kind())))?
                .try_into()?,
            // absent result means "trust as root" to the OS
            None => TrustResult::TrustRoot,
        };

        Ok(Self {
            policy: policy.to_vec(),
            name: name.to_string(),
            result,
        })
    }
}

/// Explicit settings written for the installed CA: trusted for TLS servers
/// and for basic X.509 validation.
pub fn default_policies() -> Vec<TrustPolicy> {
    vec![TrustPolicy::ssl_server(), TrustPolicy::basic_x509()]
}

/// Overwrites the `trustSettings` of the first entry whose `issuerName`
/// equals `issuer_key` and returns that entry's identifier.
///
/// The version is checked before any entry is looked at. When nothing
/// matches the tree is left untouched and [`Error::EntryNotFound`] is
/// returned. A subject is assumed to appear in at most one entry, so
/// scanning stops at the first match.
pub fn inject_explicit_trust(
    tree: &mut PropertyTree,
    issuer_key: &[u8],
    policies: &[TrustPolicy],
) -> Result<String> {
    let root = tree
        .as_dictionary_mut()
        .ok_or_else(|| Error::Parse("trust settings root is not a dictionary".to_string()))?;

    check_version(root)?;

    let list = root
        .get_mut(KEY_LIST)
        .ok_or_else(|| Error::Parse(format!("missing {}", KEY_LIST)))?;
    let list_kind = list.kind();
    let list = list
        .as_dictionary_mut()
        .ok_or_else(|| Error::Parse(format!("{} is a {}", KEY_LIST, list_kind)))?;

    for (id, entry) in list.iter_mut() {
        let entry_kind = entry.kind();
        let entry = entry.as_dictionary_mut().ok_or_else(|| {
            Error::Parse(format!("{}.{} is a {}", KEY_LIST, id, entry_kind))
        })?;

        let issuer = match entry.get(KEY_ISSUER) {
            Some(issuer) => issuer.as_data().ok_or_else(|| {
                Error::Parse(format!(
                    "{}.{}.{} is a {}",
                    KEY_LIST,
                    id,
                    KEY_ISSUER,
                    issuer.kind()
                ))
            })?,
            None => continue,
        };

        if issuer != issuer_key {
            continue;
        }

        let settings = PropertyTree::Array(policies.iter().map(TrustPolicy::to_property).collect());
        match entry.insert(KEY_SETTINGS, settings) {
            Some(previous) => log::debug!(
                "replacing trust settings of entry {} ({} previous policies)",
                id,
                previous.as_array().map(|a| a.len()).unwrap_or(0)
            ),
            None => log::debug!("adding trust settings to entry {}", id),
        }

        return Ok(id.to_string());
    }

    Err(Error::EntryNotFound)
}

fn check_version(root: &Dictionary) -> Result<()> {
    match root.get(KEY_VERSION) {
        Some(PropertyTree::Integer(TRUST_VERSION)) => Ok(()),
        Some(PropertyTree::Integer(other)) => Err(Error::SchemaVersion {
            found: other.to_string(),
        }),
        Some(other) => Err(Error::SchemaVersion {
            found: format!("<{}>", other.kind()),
        }),
        None => Err(Error::SchemaVersion {
            found: "<missing>".to_string(),
        }),
    }
}
