/// Feedback Crypto Library
///
/// Password hashing for user credentials (Argon2id, PHC string format).
/// The crate holds no state beyond the configured work factor.
pub mod password;

pub use password::{CredentialError, Credentials, HashCost};
