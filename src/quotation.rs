use crate::{
    error::{Result, TripError},
    itinerary::Itinerary,
    model::{BidState, Currency, ItineraryId, NegotiationStatus, Pin, QuotationId, QuotationStatus},
    signature::{self, AuthToken, Verified},
    validator::{self, TransitionError},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted form of a quotation. Decoding keeps only these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationRecord {
    pub identifier: QuotationId,
    pub itinerary_identifier: ItineraryId,
    #[serde(default)]
    pub seller_identifier: String,
    #[serde(default)]
    pub buyer_identifier: String,
    pub estimated_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negotiated_cost: Option<f64>,
    pub currency: Currency,
    pub status: QuotationStatus,
    pub negotiation_status: NegotiationStatus,
    pub created_at: DateTime<Utc>,
    pub valid_till: DateTime<Utc>,
    #[serde(default)]
    pub authorization_token: AuthToken,
}

/// Fields a seller supplies when quoting against an itinerary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationPayload {
    pub itinerary_identifier: String,
    pub estimated_cost: f64,
    #[serde(default)]
    pub negotiated_cost: Option<f64>,
    pub currency: Currency,
    pub valid_till: DateTime<Utc>,
    pub mpin: Pin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quotation {
    record: QuotationRecord,
}

fn bad_request(message: impl Into<String>) -> TripError {
    TripError::BadRequest(message.into())
}

pub fn validate(record: &QuotationRecord) -> Result<()> {
    if record.seller_identifier.trim().is_empty() {
        return Err(bad_request("sellerIdentifier invalid"));
    }
    if record.buyer_identifier.trim().is_empty() {
        return Err(bad_request("buyerIdentifier invalid"));
    }
    if !(record.estimated_cost.is_finite() && record.estimated_cost > 0.0) {
        return Err(bad_request("Invalid estimated cost"));
    }
    if let Some(cost) = record.negotiated_cost {
        if !(cost.is_finite() && cost > 0.0) {
            return Err(bad_request("Invalid negotiated cost"));
        }
    }
    if record.valid_till <= record.created_at {
        return Err(bad_request("validTill must be after the creation time"));
    }
    if record.authorization_token.is_empty() {
        return Err(bad_request(
            "Cannot create a quotation without an authorization token",
        ));
    }

    Ok(())
}

/// A quotation past its deadline is expired unless it was already accepted.
pub fn derive_status(record: &QuotationRecord, now: DateTime<Utc>) -> QuotationStatus {
    if now > record.valid_till && record.status != QuotationStatus::Accepted {
        QuotationStatus::Expired
    } else {
        record.status
    }
}

impl Quotation {
    pub fn create(
        payload: QuotationPayload,
        itinerary: &Itinerary,
        caller_identity: &str,
        seller_identifier: String,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let authorization_token = signature::derive(caller_identity, &payload.mpin);
        let record = QuotationRecord {
            identifier: QuotationId::generate(),
            itinerary_identifier: itinerary.id().clone(),
            seller_identifier,
            buyer_identifier: itinerary.buyer_identifier().to_string(),
            estimated_cost: payload.estimated_cost,
            negotiated_cost: payload.negotiated_cost,
            currency: payload.currency,
            status: QuotationStatus::Quoted,
            negotiation_status: NegotiationStatus::Proposed,
            created_at: now,
            valid_till: payload.valid_till,
            authorization_token,
        };
        Self::from_record(record, now)
    }

    pub fn from_record(mut record: QuotationRecord, now: DateTime<Utc>) -> Result<Self> {
        validate(&record)?;
        record.status = derive_status(&record, now);
        Ok(Self { record })
    }

    pub fn from_bytes(bytes: &[u8], now: DateTime<Utc>) -> Result<Self> {
        let record: QuotationRecord = serde_json::from_slice(bytes)
            .map_err(|e| bad_request(format!("Malformed quotation record: {}", e)))?;
        Self::from_record(record, now)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.record)?)
    }

    pub fn record(&self) -> &QuotationRecord {
        &self.record
    }

    pub fn into_record(self) -> QuotationRecord {
        self.record
    }

    pub fn id(&self) -> &QuotationId {
        &self.record.identifier
    }

    pub fn itinerary_id(&self) -> &ItineraryId {
        &self.record.itinerary_identifier
    }

    pub fn status(&self) -> QuotationStatus {
        self.record.status
    }

    pub fn negotiation_status(&self) -> NegotiationStatus {
        self.record.negotiation_status
    }

    pub fn seller_identifier(&self) -> &str {
        &self.record.seller_identifier
    }

    pub fn verify(&self, caller_identity: &str, pin: &Pin) -> Option<Verified> {
        signature::verify(&self.record.authorization_token, caller_identity, pin)
    }

    /// Dispatches a requested status change to the matching operation.
    pub fn change_state(
        &mut self,
        itinerary: &mut Itinerary,
        target: QuotationStatus,
        caller_identity: &str,
        pin: &Pin,
    ) -> Result<()> {
        match target {
            QuotationStatus::Accepted => self.accept_by_buyer(itinerary, caller_identity, pin),
            QuotationStatus::Declined => self.decline_by_buyer(itinerary, caller_identity, pin),
            QuotationStatus::Withdrawn => self.withdraw_by_seller(itinerary, caller_identity, pin),
            other => Err(TransitionError::UnsupportedTarget(other).into()),
        }
    }

    /// Buyer accepts: the quotation becomes ACCEPTED and the itinerary is sold
    /// to this quotation's seller. Both checks pass before either entity changes.
    pub fn accept_by_buyer(&mut self, itinerary: &mut Itinerary, caller_identity: &str, pin: &Pin) -> Result<()> {
        self.ensure_belongs_to(itinerary)?;
        let proof = validator::validate_quotation_state_change(
            self.status(),
            itinerary.bid_state(),
            QuotationStatus::Accepted,
            itinerary.verify(caller_identity, pin),
        )?;
        let proof = validator::validate_bid_state_change(itinerary.bid_state(), BidState::Sold, Some(proof))?;

        self.apply_status(QuotationStatus::Accepted, &proof);
        itinerary.apply_bid_state(BidState::Sold, Some(self.record.seller_identifier.as_str()), &proof);
        Ok(())
    }

    /// Buyer declines: the quotation becomes DECLINED and the itinerary is
    /// reopened for further quotes.
    pub fn decline_by_buyer(&mut self, itinerary: &mut Itinerary, caller_identity: &str, pin: &Pin) -> Result<()> {
        self.ensure_belongs_to(itinerary)?;
        let proof = validator::validate_quotation_state_change(
            self.status(),
            itinerary.bid_state(),
            QuotationStatus::Declined,
            itinerary.verify(caller_identity, pin),
        )?;
        let reopen = itinerary.bid_state() != BidState::Open;
        let proof = if reopen {
            validator::validate_bid_state_change(itinerary.bid_state(), BidState::Open, Some(proof))?
        } else {
            proof
        };

        self.apply_status(QuotationStatus::Declined, &proof);
        if reopen {
            itinerary.apply_bid_state(BidState::Open, None, &proof);
        }
        Ok(())
    }

    /// Seller withdraws the offer. The itinerary is left untouched.
    pub fn withdraw_by_seller(&mut self, itinerary: &Itinerary, caller_identity: &str, pin: &Pin) -> Result<()> {
        self.ensure_belongs_to(itinerary)?;
        let proof = validator::validate_quotation_state_change(
            self.status(),
            itinerary.bid_state(),
            QuotationStatus::Withdrawn,
            self.verify(caller_identity, pin),
        )?;

        self.apply_status(QuotationStatus::Withdrawn, &proof);
        Ok(())
    }

    fn ensure_belongs_to(&self, itinerary: &Itinerary) -> Result<()> {
        if self.itinerary_id() != itinerary.id() {
            return Err(bad_request(format!(
                "Quotation {} does not reference itinerary {}",
                self.id(),
                itinerary.id()
            )));
        }
        Ok(())
    }

    fn apply_status(&mut self, status: QuotationStatus, _proof: &Verified) {
        self.record.status = status;
    }
}
