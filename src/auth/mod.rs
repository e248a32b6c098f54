// Authentication module
// Credential data model, persistence contract, and token refresh

mod refresh;
mod store;
mod types;

pub use refresh::RefreshClient;
pub use store::{CredentialStore, MemoryStore, SqliteStore};
pub use types::{
    BodyKind, CredentialPair, CredentialRecord, RefreshOutcome, RefreshedSession, TokenResponse,
};
