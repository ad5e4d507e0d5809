//! Threshold ECDSA signing over secp256k1: Shamir-shared keys and a
//! two-round (commit, then partially sign) session protocol for producing
//! a single valid signature from a quorum of parties, with no party ever
//! holding the full private key.

mod keygen;
mod scalar;
mod session;

pub use keygen::{generate_key, lagrange_coefficient, weighted_key_share, KeyGenResult, KeyShare, PartyId};
pub use scalar::Scalar;
pub use session::{SigningSession, TssError};
