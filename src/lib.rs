//! # tripbid - trip bidding on a shared ledger
//!
//! Buyers list an itinerary as an open bid, sellers quote against it, and the
//! buyer accepts or declines while sellers may withdraw. Every action moves the
//! quotation and, where it cascades, the itinerary through a guarded state
//! machine.
//!
//! ## Architecture
//!
//! - **Signature**: SHA-256 authorization tokens binding a caller identity to a PIN
//! - **Itinerary / Quotation**: validated entities with derived DEAD / EXPIRED states
//! - **Validator**: pure transition rules returning a proof of verification
//! - **Contract**: load, delegate, commit transaction entry points
//! - **Ledger**: the keyed world-state boundary (in-memory and SQLite backends)

pub mod config;
pub mod contract;
pub mod database;
pub mod error;
pub mod itinerary;
pub mod ledger;
pub mod model;
pub mod quotation;
pub mod signature;
pub mod validator;

pub use config::AppConfig;
pub use contract::{CallerInfo, QuotationUpdate, TripContract};
pub use database::SqliteLedger;
pub use error::{ErrorKind, Result, TripError};
pub use itinerary::{Itinerary, ItineraryPayload, ItineraryRecord};
pub use ledger::{Ledger, MemoryLedger, StateWrite};
pub use model::{BidState, CallerIdentity, Currency, ItineraryId, NegotiationStatus, Pin, QuotationId, QuotationStatus};
pub use quotation::{Quotation, QuotationPayload, QuotationRecord};
pub use validator::TransitionError;
