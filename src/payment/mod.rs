//! Payment-challenge handling — turns a 402 response into a signed proof.

pub mod challenge;
pub mod header;
pub mod signer;

pub use challenge::{AcceptedPayment, PaymentChallenge};
pub use header::build_payment_header;
pub use signer::{KeySigner, PaymentSigner};
