//! Transaction entry points.
//!
//! Each operation loads the entities it needs, rebuilds them (which re-runs
//! validation and derived states), delegates to the entity logic and then
//! commits every changed record in one batch. Nothing is written when any
//! step fails.

use crate::{
    config::AppConfig,
    error::{Result, TripError},
    itinerary::{Itinerary, ItineraryPayload, ItineraryRecord},
    ledger::{Ledger, StateWrite},
    model::{CallerIdentity, ItineraryId, Pin, QuotationId, QuotationStatus},
    quotation::{Quotation, QuotationPayload, QuotationRecord},
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationUpdate {
    pub quotation: QuotationRecord,
    pub itinerary: ItineraryRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerInfo {
    pub id: String,
    pub company_id: Option<String>,
}

pub struct TripContract<L> {
    ledger: L,
    company_attribute: String,
}

fn parse_payload<T: DeserializeOwned>(payload: &str) -> Result<T> {
    serde_json::from_str(payload).map_err(|e| TripError::BadRequest(format!("Invalid payload: {}", e)))
}

impl<L: Ledger> TripContract<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            company_attribute: "companyID".to_string(),
        }
    }

    pub fn from_config(ledger: L, config: &AppConfig) -> Self {
        Self::new(ledger).with_company_attribute(config.identity.company_attribute.clone())
    }

    pub fn with_company_attribute(mut self, name: impl Into<String>) -> Self {
        self.company_attribute = name.into();
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Echoes who the ledger sees as the caller.
    pub fn instantiate(&self, caller: &CallerIdentity) -> CallerInfo {
        CallerInfo {
            id: caller.id.clone(),
            company_id: caller.attribute(&self.company_attribute).map(str::to_string),
        }
    }

    pub async fn create_itinerary(&self, caller: &CallerIdentity, payload: &str) -> Result<ItineraryRecord> {
        let payload: ItineraryPayload = parse_payload(payload)?;
        let buyer = self.company_of(caller, "CompanyID not found in certificate")?;
        let now = Utc::now();

        let itinerary = Itinerary::create(payload, &caller.id, buyer, now)?;
        self.ledger
            .commit(vec![StateWrite::new(itinerary.id().as_str(), itinerary.to_bytes()?)])
            .await?;

        tracing::info!(
            "Created itinerary {} for buyer {} ({} -> {})",
            itinerary.id(),
            itinerary.buyer_identifier(),
            itinerary.record().origin,
            itinerary.record().destination
        );
        Ok(itinerary.into_record())
    }

    pub async fn create_quotation(&self, caller: &CallerIdentity, payload: &str) -> Result<QuotationRecord> {
        let payload: QuotationPayload = parse_payload(payload)?;
        let seller = self.company_of(caller, "Only a seller type identity can create a quote.")?;
        let now = Utc::now();

        let itinerary = self.load_itinerary(&payload.itinerary_identifier, now).await?;
        if !itinerary.is_biddable(now) {
            tracing::warn!(
                "Refused quotation on itinerary {} in {} bid state",
                itinerary.id(),
                itinerary.bid_state()
            );
            return Err(TripError::Forbidden("Itinerary not in biddable state.".to_string()));
        }

        let quotation = Quotation::create(payload, &itinerary, &caller.id, seller, now)?;
        self.ledger
            .commit(vec![StateWrite::new(quotation.id().as_str(), quotation.to_bytes()?)])
            .await?;

        tracing::info!(
            "Created quotation {} on itinerary {} by seller {}",
            quotation.id(),
            itinerary.id(),
            quotation.seller_identifier()
        );
        Ok(quotation.into_record())
    }

    pub async fn change_quotation_state(
        &self,
        caller: &CallerIdentity,
        quotation_id: &str,
        target: QuotationStatus,
        pin: &Pin,
    ) -> Result<QuotationUpdate> {
        self.company_of(caller, "CompanyID not found in certificate")?;
        let now = Utc::now();

        let mut quotation = self.load_quotation(quotation_id, now).await?;
        let mut itinerary = self.load_itinerary(quotation.itinerary_id().as_str(), now).await?;
        let loaded_itinerary = itinerary.clone();

        if let Err(e) = quotation.change_state(&mut itinerary, target, &caller.id, pin) {
            tracing::warn!("Refused {} on quotation {}: {}", target, quotation.id(), e);
            return Err(e);
        }

        let mut writes = vec![StateWrite::new(quotation.id().as_str(), quotation.to_bytes()?)];
        if itinerary != loaded_itinerary {
            writes.push(StateWrite::new(itinerary.id().as_str(), itinerary.to_bytes()?));
        }
        self.ledger.commit(writes).await?;

        tracing::info!(
            "Quotation {} is now {}; itinerary {} is {}",
            quotation.id(),
            quotation.status(),
            itinerary.id(),
            itinerary.bid_state()
        );
        Ok(QuotationUpdate {
            quotation: quotation.into_record(),
            itinerary: itinerary.into_record(),
        })
    }

    /// Buyer takes the listing off the market.
    pub async fn close_itinerary(&self, caller: &CallerIdentity, itinerary_id: &str, pin: &Pin) -> Result<ItineraryRecord> {
        self.company_of(caller, "CompanyID not found in certificate")?;
        let now = Utc::now();

        let mut itinerary = self.load_itinerary(itinerary_id, now).await?;
        if let Err(e) = itinerary.close_bid(&caller.id, pin) {
            tracing::warn!("Refused close of itinerary {}: {}", itinerary.id(), e);
            return Err(e);
        }

        self.ledger
            .commit(vec![StateWrite::new(itinerary.id().as_str(), itinerary.to_bytes()?)])
            .await?;

        tracing::info!("Closed itinerary {}", itinerary.id());
        Ok(itinerary.into_record())
    }

    pub async fn get_itinerary(&self, itinerary_id: &str) -> Result<ItineraryRecord> {
        Ok(self.load_itinerary(itinerary_id, Utc::now()).await?.into_record())
    }

    pub async fn get_quotation(&self, quotation_id: &str) -> Result<QuotationRecord> {
        Ok(self.load_quotation(quotation_id, Utc::now()).await?.into_record())
    }

    fn company_of(&self, caller: &CallerIdentity, message: &str) -> Result<String> {
        match caller.attribute(&self.company_attribute) {
            Some(company) => Ok(company.to_string()),
            None => {
                tracing::warn!("Caller {} has no {} attribute", caller.id, self.company_attribute);
                Err(TripError::Forbidden(message.to_string()))
            }
        }
    }

    async fn read(&self, key: &str, what: &str) -> Result<Vec<u8>> {
        match self.ledger.get_state(key).await? {
            Some(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(TripError::NotFound(format!("{} not found", what))),
        }
    }

    async fn load_itinerary(&self, itinerary_id: &str, now: DateTime<Utc>) -> Result<Itinerary> {
        let id = ItineraryId::parse(itinerary_id)
            .map_err(|_| TripError::NotFound("Itinerary not found".to_string()))?;
        let bytes = self.read(id.as_str(), "Itinerary").await?;
        Itinerary::from_bytes(&bytes, now)
    }

    async fn load_quotation(&self, quotation_id: &str, now: DateTime<Utc>) -> Result<Quotation> {
        let id = QuotationId::parse(quotation_id)
            .map_err(|_| TripError::NotFound("Quotation not found".to_string()))?;
        let bytes = self.read(id.as_str(), "Quotation").await?;
        Quotation::from_bytes(&bytes, now)
    }
}
