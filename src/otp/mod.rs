//! One-time passcode verification for guest contacts.
//!
//! Two flows share the same state machine
//! (`NO_CHALLENGE → CHALLENGE_ACTIVE → VERIFIED | EXPIRED | LOCKED`):
//!
//! - **Existing contact**: the challenge lives on the contact record and is
//!   requested by document number.
//! - **Registration**: the challenge plus the full registration form are
//!   staged in the expiring cache, keyed by phone number, until the code is
//!   verified and the contact record is created.
//!
//! Codes are fixed-length decimal strings from a CSPRNG, stored only as
//! SHA-256 hashes, and consumed with compare-and-clear semantics so a code
//! verifies at most once. Delivery happens before persistence: a code that
//! was never handed to the provider is never accepted.

pub mod code;
pub mod config;
pub mod engine;
pub mod error;
pub mod pending;
pub mod phone;
pub mod sender;
pub mod validate;

pub use config::OtpConfig;
pub use engine::{OtpEngine, OtpIssued, Verified};
pub use error::OtpError;
pub use pending::{PendingRegistration, PendingRegistrationStore, RegistrationForm};
pub use sender::{Channel, LogOtpSender, OtpMessage, OtpSender, TwilioSender, TwilioSenderConfig};
