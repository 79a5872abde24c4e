//! Ledger transaction gateway.
//!
//! Submit and evaluate calls against an external permissioned ledger
//! network, each scoped to its own connection; plus the startup identity
//! provisioner that enrolls the administrative and application
//! credentials against the network's certificate authority before any
//! gateway call is permitted.

pub mod connector;
pub mod enrollment;
pub mod gateway;
pub mod profile;
pub mod wallet;

pub use connector::{HttpConnector, LedgerConnector, LedgerSession};
pub use enrollment::{CaApi, HttpCaClient, IdentityProvisioner};
pub use gateway::LedgerGateway;
pub use profile::ConnectionProfile;
pub use wallet::{FileWallet, LedgerIdentity};
