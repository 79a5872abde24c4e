//! Ledger connection profile.
//!
//! A JSON document describing the network's organizations, peers and
//! certificate authorities. Loaded once at startup; a missing or
//! unresolvable profile is fatal before the service starts serving.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tagtrack_error::ledger::LedgerError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    #[serde(default)]
    pub name: String,
    pub organizations: HashMap<String, Organization>,
    pub peers: HashMap<String, Peer>,
    pub certificate_authorities: HashMap<String, CertificateAuthority>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub mspid: String,
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default, rename = "certificateAuthorities")]
    pub certificate_authorities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    /// Gateway endpoint of the peer, the target of submit/evaluate calls.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAuthority {
    pub url: String,
    #[serde(default)]
    pub ca_name: String,
}

impl ConnectionProfile {
    /// Load and parse the profile document.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| LedgerError::ProfileMissing {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        serde_json::from_slice(&raw).map_err(|e| LedgerError::ProfileInvalid(e.to_string()))
    }

    fn organization(&self, msp_id: &str) -> Result<&Organization, LedgerError> {
        self.organizations
            .values()
            .find(|org| org.mspid == msp_id)
            .ok_or_else(|| {
                LedgerError::ProfileInvalid(format!("no organization with mspid `{msp_id}`"))
            })
    }

    /// Gateway endpoint of the organization's first listed peer.
    pub fn gateway_endpoint(&self, msp_id: &str) -> Result<&str, LedgerError> {
        let org = self.organization(msp_id)?;
        let peer_name = org.peers.first().ok_or_else(|| {
            LedgerError::ProfileInvalid(format!("organization `{msp_id}` lists no peers"))
        })?;
        self.peers
            .get(peer_name)
            .map(|p| p.url.as_str())
            .ok_or_else(|| {
                LedgerError::ProfileInvalid(format!("peer `{peer_name}` is not described"))
            })
    }

    /// Certificate authority of the organization.
    pub fn certificate_authority(
        &self,
        msp_id: &str,
    ) -> Result<&CertificateAuthority, LedgerError> {
        let org = self.organization(msp_id)?;
        let ca_name = org.certificate_authorities.first().ok_or_else(|| {
            LedgerError::ProfileInvalid(format!(
                "organization `{msp_id}` lists no certificate authority"
            ))
        })?;
        self.certificate_authorities.get(ca_name).ok_or_else(|| {
            LedgerError::ProfileInvalid(format!("certificate authority `{ca_name}` is not described"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "tagtrack-network",
        "organizations": {
            "AssetOrg": {
                "mspid": "AssetOrgMSP",
                "peers": ["peer0.assetorg.example.com"],
                "certificateAuthorities": ["ca.assetorg.example.com"]
            }
        },
        "peers": {
            "peer0.assetorg.example.com": {
                "url": "https://peer0.assetorg.example.com:7051"
            }
        },
        "certificateAuthorities": {
            "ca.assetorg.example.com": {
                "url": "https://ca.assetorg.example.com:7054",
                "caName": "ca-assetorg"
            }
        }
    }"#;

    #[test]
    fn resolves_peer_and_ca_by_msp() {
        let profile: ConnectionProfile = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(
            profile.gateway_endpoint("AssetOrgMSP").unwrap(),
            "https://peer0.assetorg.example.com:7051"
        );
        let ca = profile.certificate_authority("AssetOrgMSP").unwrap();
        assert_eq!(ca.ca_name, "ca-assetorg");
    }

    #[test]
    fn unknown_msp_is_a_profile_error() {
        let profile: ConnectionProfile = serde_json::from_str(SAMPLE).unwrap();
        let err = profile.gateway_endpoint("OtherMSP").unwrap_err();
        assert!(matches!(err, LedgerError::ProfileInvalid(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn missing_profile_file_is_fatal_not_retryable() {
        let err = ConnectionProfile::load("/nonexistent/profile.json")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ProfileMissing { .. }));
        assert!(!err.is_retryable());
    }
}
