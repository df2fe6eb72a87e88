//! # ShareView Protocol
//!
//! Wire-level types shared between the ShareView daemon and whatever
//! transport fronts it (the daemon itself is transport-agnostic; an HTTP
//! layer is the expected consumer).
//!
//! The crate covers two concerns:
//!
//! - **Identity**: [`Credentials`], [`Identity`] and the tagged
//!   [`AuthOutcome`] produced by the authentication service.
//! - **Messages**: the JSON shapes for directory listings
//!   ([`ListingResponse`], [`FileEntry`]) and the deliberately collapsed
//!   external error surface ([`PublicError`], [`ErrorResponse`]).
//!
//! A design rule runs through both halves: internal distinctions (which
//! backend failed, whether a path was missing or outside the root) never
//! appear in these types' external serializations. Callers that need the
//! distinction for logging get it from the daemon's own error enums, not
//! from the wire.

pub mod identity;
pub mod messages;

pub use identity::{AuthOutcome, Credentials, Identity, RejectReason};
pub use messages::{ErrorResponse, FileEntry, ListingResponse, PublicError};
