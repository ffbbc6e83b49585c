use crate::{
    error::{Result, TripError},
    model::{BidState, Currency, ItineraryId, Pin},
    signature::{self, AuthToken, Verified},
    validator,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted form of an itinerary. Decoding keeps only these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryRecord {
    pub identifier: ItineraryId,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub distance: f64,
    pub pax: u32,
    pub bid_window_start: DateTime<Utc>,
    pub bid_window_end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_identifier: Option<String>,
    #[serde(default)]
    pub buyer_identifier: String,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub authorization_token: AuthToken,
    pub bid_state: BidState,
}

/// Fields a buyer supplies when listing a trip.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryPayload {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub distance: f64,
    pub pax: u32,
    pub bid_window_start: DateTime<Utc>,
    pub bid_window_end: DateTime<Utc>,
    pub currency: Currency,
    pub mpin: Pin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Itinerary {
    record: ItineraryRecord,
}

fn is_airport_code(code: &str) -> bool {
    code.len() == 4 && code.bytes().all(|b| b.is_ascii_uppercase())
}

fn bad_request(message: impl Into<String>) -> TripError {
    TripError::BadRequest(message.into())
}

/// Structural invariants. Times that must lie in the future are measured
/// against `created_at`, so the same record passes or fails on every load.
pub fn validate(record: &ItineraryRecord) -> Result<()> {
    let created = record.created_at;

    if record.origin.is_empty() {
        return Err(bad_request("origin can not be null"));
    }
    if record.destination.is_empty() {
        return Err(bad_request("destination can not be null"));
    }
    if record.departure <= created {
        return Err(bad_request("departure can not be a past date"));
    }
    if record.arrival <= created {
        return Err(bad_request("arrival can not be a past date"));
    }
    if !(record.distance.is_finite() && record.distance > 0.0) {
        return Err(bad_request("distance must be greater than 0"));
    }
    if record.pax < 1 {
        return Err(bad_request("pax can not be less than 1"));
    }
    if record.bid_window_start <= created {
        return Err(bad_request(format!(
            "invalid bidWindowStart for creation time {}",
            created.to_rfc3339()
        )));
    }
    if record.bid_window_end <= created {
        return Err(bad_request(format!(
            "invalid bidWindowEnd for creation time {}",
            created.to_rfc3339()
        )));
    }
    if record.buyer_identifier.trim().is_empty() {
        return Err(bad_request("buyerIdentifier can not be empty"));
    }
    match (&record.seller_identifier, record.bid_state) {
        (Some(seller), _) if seller.trim().is_empty() => {
            return Err(bad_request("sellerIdentifier invalid"));
        }
        (None, BidState::Sold) => {
            return Err(bad_request("sold itinerary must record a sellerIdentifier"));
        }
        (Some(_), state) if state != BidState::Sold => {
            return Err(bad_request("sellerIdentifier is only set once the itinerary is sold"));
        }
        _ => {}
    }
    if record.departure > record.arrival {
        return Err(bad_request("arrival date and departure date must be chronological"));
    }
    if record.bid_window_start > record.bid_window_end {
        return Err(bad_request("bid start and bid end time must be chronological"));
    }
    if record.bid_window_end > record.departure {
        return Err(bad_request("bid must end before departure date"));
    }
    if !is_airport_code(&record.origin) {
        return Err(bad_request("invalid origin airport code"));
    }
    if !is_airport_code(&record.destination) {
        return Err(bad_request("invalid destination airport code"));
    }
    if record.authorization_token.is_empty() {
        return Err(bad_request(
            "itinerary creation forbidden without an authorization token",
        ));
    }

    Ok(())
}

/// An open bid whose window has elapsed is dead.
pub fn derive_bid_state(record: &ItineraryRecord, now: DateTime<Utc>) -> BidState {
    if record.bid_state == BidState::Open && now > record.bid_window_end {
        BidState::Dead
    } else {
        record.bid_state
    }
}

impl Itinerary {
    /// Mints a new open itinerary owned by `buyer_identifier`.
    pub fn create(
        payload: ItineraryPayload,
        caller_identity: &str,
        buyer_identifier: String,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let authorization_token = signature::derive(caller_identity, &payload.mpin);
        let record = ItineraryRecord {
            identifier: ItineraryId::generate(),
            origin: payload.origin,
            destination: payload.destination,
            departure: payload.departure,
            arrival: payload.arrival,
            distance: payload.distance,
            pax: payload.pax,
            bid_window_start: payload.bid_window_start,
            bid_window_end: payload.bid_window_end,
            seller_identifier: None,
            buyer_identifier,
            currency: payload.currency,
            created_at: now,
            authorization_token,
            bid_state: BidState::Open,
        };
        Self::from_record(record, now)
    }

    pub fn from_record(mut record: ItineraryRecord, now: DateTime<Utc>) -> Result<Self> {
        validate(&record)?;
        record.bid_state = derive_bid_state(&record, now);
        Ok(Self { record })
    }

    pub fn from_bytes(bytes: &[u8], now: DateTime<Utc>) -> Result<Self> {
        let record: ItineraryRecord = serde_json::from_slice(bytes)
            .map_err(|e| bad_request(format!("Malformed itinerary record: {}", e)))?;
        Self::from_record(record, now)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.record)?)
    }

    pub fn record(&self) -> &ItineraryRecord {
        &self.record
    }

    pub fn into_record(self) -> ItineraryRecord {
        self.record
    }

    pub fn id(&self) -> &ItineraryId {
        &self.record.identifier
    }

    pub fn bid_state(&self) -> BidState {
        self.record.bid_state
    }

    pub fn buyer_identifier(&self) -> &str {
        &self.record.buyer_identifier
    }

    pub fn seller_identifier(&self) -> Option<&str> {
        self.record.seller_identifier.as_deref()
    }

    pub fn currency(&self) -> Currency {
        self.record.currency
    }

    pub fn is_biddable(&self, now: DateTime<Utc>) -> bool {
        self.record.bid_state == BidState::Open && now < self.record.bid_window_end
    }

    pub fn verify(&self, caller_identity: &str, pin: &Pin) -> Option<Verified> {
        signature::verify(&self.record.authorization_token, caller_identity, pin)
    }

    /// Reopens the bid, e.g. after the buyer declined a quotation.
    pub fn open_bid(&mut self, caller_identity: &str, pin: &Pin) -> Result<()> {
        let proof = validator::validate_bid_state_change(
            self.bid_state(),
            BidState::Open,
            self.verify(caller_identity, pin),
        )?;
        self.apply_bid_state(BidState::Open, None, &proof);
        Ok(())
    }

    pub fn close_bid(&mut self, caller_identity: &str, pin: &Pin) -> Result<()> {
        let proof = validator::validate_bid_state_change(
            self.bid_state(),
            BidState::Closed,
            self.verify(caller_identity, pin),
        )?;
        self.apply_bid_state(BidState::Closed, None, &proof);
        Ok(())
    }

    pub fn sell_bid(&mut self, caller_identity: &str, pin: &Pin, seller_identifier: &str) -> Result<()> {
        let proof = validator::validate_bid_state_change(
            self.bid_state(),
            BidState::Sold,
            self.verify(caller_identity, pin),
        )?;
        self.apply_bid_state(BidState::Sold, Some(seller_identifier), &proof);
        Ok(())
    }

    /// Writes an already validated bid state. Callers must have run
    /// [`validator::validate_bid_state_change`] for `state` to obtain `_proof`.
    pub(crate) fn apply_bid_state(&mut self, state: BidState, seller: Option<&str>, _proof: &Verified) {
        self.record.bid_state = state;
        self.record.seller_identifier = match state {
            BidState::Sold => seller.map(str::to_string),
            _ => None,
        };
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::Duration;

    pub(crate) const BUYER: &str = "x509::CN=broker";

    pub(crate) fn pin() -> Pin {
        Pin::new("1234").unwrap()
    }

    pub(crate) fn sample_record(now: DateTime<Utc>) -> ItineraryRecord {
        ItineraryRecord {
            identifier: ItineraryId::generate(),
            origin: "KBOS".to_string(),
            destination: "KEFT".to_string(),
            departure: now + Duration::hours(24),
            arrival: now + Duration::hours(24),
            distance: 999.0,
            pax: 2,
            bid_window_start: now + Duration::hours(1),
            bid_window_end: now + Duration::hours(20),
            seller_identifier: None,
            buyer_identifier: "acme-travel".to_string(),
            currency: Currency::Usd,
            created_at: now,
            authorization_token: signature::derive(BUYER, &pin()),
            bid_state: BidState::Open,
        }
    }

    fn assert_bad_request(record: ItineraryRecord, now: DateTime<Utc>) {
        let err = Itinerary::from_record(record, now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest, "unexpected error: {}", err);
    }

    #[test]
    fn test_valid_record_loads_open() {
        let now = Utc::now();
        let itinerary = Itinerary::from_record(sample_record(now), now).unwrap();
        assert_eq!(itinerary.bid_state(), BidState::Open);
        assert!(itinerary.is_biddable(now));
    }

    #[test]
    fn test_each_invariant_violation_is_bad_request() {
        let now = Utc::now();

        let mut record = sample_record(now);
        record.departure = now - Duration::hours(1);
        assert_bad_request(record, now);

        let mut record = sample_record(now);
        record.arrival = now + Duration::hours(23);
        assert_bad_request(record, now);

        let mut record = sample_record(now);
        record.bid_window_end = now + Duration::minutes(30);
        assert_bad_request(record, now);

        let mut record = sample_record(now);
        record.bid_window_end = now + Duration::hours(25);
        assert_bad_request(record, now);

        let mut record = sample_record(now);
        record.origin = "BOS".to_string();
        assert_bad_request(record, now);

        let mut record = sample_record(now);
        record.destination = "xKEFT".to_string();
        assert_bad_request(record, now);

        let mut record = sample_record(now);
        record.buyer_identifier = String::new();
        assert_bad_request(record, now);

        let mut record = sample_record(now);
        record.authorization_token = AuthToken::default();
        assert_bad_request(record, now);

        let mut record = sample_record(now);
        record.distance = 0.0;
        assert_bad_request(record, now);

        let mut record = sample_record(now);
        record.pax = 0;
        assert_bad_request(record, now);
    }

    #[test]
    fn test_seller_only_on_sold() {
        let now = Utc::now();
        let mut record = sample_record(now);
        record.seller_identifier = Some("skyline".to_string());
        assert_bad_request(record, now);

        let mut record = sample_record(now);
        record.bid_state = BidState::Sold;
        assert_bad_request(record, now);
    }

    #[test]
    fn test_elapsed_window_derives_dead_idempotently() {
        let created = Utc::now() - Duration::hours(30);
        let now = Utc::now();
        let record = sample_record(created);

        let first = Itinerary::from_record(record, now).unwrap();
        assert_eq!(first.bid_state(), BidState::Dead);
        assert!(!first.is_biddable(now));

        let bytes = first.to_bytes().unwrap();
        let second = Itinerary::from_bytes(&bytes, now).unwrap();
        assert_eq!(second.bid_state(), BidState::Dead);
        assert_eq!(first, second);
    }

    #[test]
    fn test_dead_only_derived_from_open() {
        let created = Utc::now() - Duration::hours(30);
        let mut record = sample_record(created);
        record.bid_state = BidState::Closed;
        let itinerary = Itinerary::from_record(record, Utc::now()).unwrap();
        assert_eq!(itinerary.bid_state(), BidState::Closed);
    }

    #[test]
    fn test_unknown_fields_are_dropped() {
        let now = Utc::now();
        let mut value = serde_json::to_value(sample_record(now)).unwrap();
        value["isVerified"] = serde_json::json!(true);
        value["validate"] = serde_json::json!("function");
        let bytes = serde_json::to_vec(&value).unwrap();

        let itinerary = Itinerary::from_bytes(&bytes, now).unwrap();
        let round_trip = serde_json::to_value(itinerary.record()).unwrap();
        assert!(round_trip.get("isVerified").is_none());
        assert!(round_trip.get("validate").is_none());
    }

    #[test]
    fn test_sell_requires_signature_and_open() {
        let now = Utc::now();
        let mut itinerary = Itinerary::from_record(sample_record(now), now).unwrap();

        let wrong = Pin::new("4321").unwrap();
        let err = itinerary.sell_bid(BUYER, &wrong, "skyline").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(itinerary.bid_state(), BidState::Open);
        assert_eq!(itinerary.seller_identifier(), None);

        itinerary.sell_bid(BUYER, &pin(), "skyline").unwrap();
        assert_eq!(itinerary.bid_state(), BidState::Sold);
        assert_eq!(itinerary.seller_identifier(), Some("skyline"));

        assert!(itinerary.sell_bid(BUYER, &pin(), "other").is_err());
        assert_eq!(itinerary.seller_identifier(), Some("skyline"));
    }

    #[test]
    fn test_close_and_reopen() {
        let now = Utc::now();
        let mut itinerary = Itinerary::from_record(sample_record(now), now).unwrap();

        assert!(itinerary.open_bid(BUYER, &pin()).is_err());

        itinerary.close_bid(BUYER, &pin()).unwrap();
        assert_eq!(itinerary.bid_state(), BidState::Closed);
        assert!(itinerary.close_bid(BUYER, &pin()).is_err());

        itinerary.open_bid(BUYER, &pin()).unwrap();
        assert_eq!(itinerary.bid_state(), BidState::Open);
    }

    #[test]
    fn test_create_mints_identifier_and_token() {
        let now = Utc::now();
        let payload: ItineraryPayload = serde_json::from_value(serde_json::json!({
            "origin": "KBOS",
            "destination": "KEFT",
            "departure": (now + Duration::days(1)).to_rfc3339(),
            "arrival": (now + Duration::days(1)).to_rfc3339(),
            "distance": 999,
            "pax": 2,
            "bidWindowStart": (now + Duration::hours(1)).to_rfc3339(),
            "bidWindowEnd": (now + Duration::hours(20)).to_rfc3339(),
            "currency": "USD",
            "mpin": 1234,
            "bidState": "SOLD"
        }))
        .unwrap();

        let itinerary = Itinerary::create(payload, BUYER, "acme-travel".to_string(), now).unwrap();
        assert!(itinerary.id().as_str().starts_with("IT-"));
        assert_eq!(itinerary.bid_state(), BidState::Open);
        assert!(itinerary.verify(BUYER, &pin()).is_some());
    }
}
