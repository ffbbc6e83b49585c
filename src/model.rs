use crate::{Result, TripError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const ITINERARY_PREFIX: &str = "IT-";
pub const QUOTATION_PREFIX: &str = "QT-";

// Node id for v1 identifiers, fixed for the lifetime of the process.
static NODE_ID: Lazy<[u8; 6]> = Lazy::new(rand::random);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidState {
    Open,
    Dead,
    Closed,
    Sold,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    Quoted,
    Accepted,
    Declined,
    Withdrawn,
    Expired,
}

/// Bilateral bargaining stage. Reserved: nothing moves it past `Proposed` yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationStatus {
    Proposed,
    Adjusted,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Inr,
}

impl BidState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidState::Open => "OPEN",
            BidState::Dead => "DEAD",
            BidState::Closed => "CLOSED",
            BidState::Sold => "SOLD",
        }
    }
}

impl fmt::Display for BidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Quoted => "QUOTED",
            QuotationStatus::Accepted => "ACCEPTED",
            QuotationStatus::Declined => "DECLINED",
            QuotationStatus::Withdrawn => "WITHDRAWN",
            QuotationStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotationStatus {
    type Err = TripError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "QUOTED" => Ok(QuotationStatus::Quoted),
            "ACCEPTED" => Ok(QuotationStatus::Accepted),
            "DECLINED" => Ok(QuotationStatus::Declined),
            "WITHDRAWN" => Ok(QuotationStatus::Withdrawn),
            "EXPIRED" => Ok(QuotationStatus::Expired),
            other => Err(TripError::BadRequest(format!("Unknown quotation status: {}", other))),
        }
    }
}

fn parse_prefixed(prefix: &str, raw: &str) -> Result<()> {
    let suffix = raw
        .strip_prefix(prefix)
        .ok_or_else(|| TripError::BadRequest(format!("Identifier {} must start with {}", raw, prefix)))?;
    Uuid::parse_str(suffix)
        .map_err(|e| TripError::BadRequest(format!("Identifier {} is not a valid UUID: {}", raw, e)))?;
    Ok(())
}

fn mint(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::now_v1(&NODE_ID))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItineraryId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuotationId(String);

impl ItineraryId {
    pub fn generate() -> Self {
        Self(mint(ITINERARY_PREFIX))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        parse_prefixed(ITINERARY_PREFIX, raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl QuotationId {
    pub fn generate() -> Self {
        Self(mint(QUOTATION_PREFIX))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        parse_prefixed(QUOTATION_PREFIX, raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ItineraryId {
    type Error = TripError;

    fn try_from(raw: String) -> Result<Self> {
        parse_prefixed(ITINERARY_PREFIX, &raw)?;
        Ok(Self(raw))
    }
}

impl TryFrom<String> for QuotationId {
    type Error = TripError;

    fn try_from(raw: String) -> Result<Self> {
        parse_prefixed(QUOTATION_PREFIX, &raw)?;
        Ok(Self(raw))
    }
}

impl From<ItineraryId> for String {
    fn from(id: ItineraryId) -> Self {
        id.0
    }
}

impl From<QuotationId> for String {
    fn from(id: QuotationId) -> Self {
        id.0
    }
}

impl fmt::Display for ItineraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QuotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric PIN presented by a caller. Accepted from JSON as a number or a string.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPin")]
pub struct Pin(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPin {
    Number(u64),
    Text(String),
}

impl Pin {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TripError::BadRequest("mpin must be a non-empty string of digits".to_string()));
        }
        Ok(Self(raw))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl TryFrom<RawPin> for Pin {
    type Error = TripError;

    fn try_from(raw: RawPin) -> Result<Self> {
        match raw {
            RawPin::Number(n) => Pin::new(n.to_string()),
            RawPin::Text(s) => Pin::new(s),
        }
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}

/// Identity of the transaction submitter as supplied by the certificate subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub id: String,
    pub attributes: HashMap<String, String>,
}

impl CallerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}
