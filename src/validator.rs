//! Transition rules for itineraries and quotations.
//!
//! Every function here is pure: it looks at the current states, the requested
//! target and the outcome of a signature check, and either hands the
//! [`Verified`] proof back (the change may be applied) or names the first rule
//! that failed. Assertions run in a fixed order so the reported reason is stable.

use crate::model::{BidState, QuotationStatus};
use crate::signature::Verified;
use std::fmt;
use thiserror::Error;

/// Whose token a transition must be signed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signer {
    ItineraryAuthor,
    QuotationAuthor,
}

impl fmt::Display for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signer::ItineraryAuthor => f.write_str("author of the itinerary"),
            Signer::QuotationAuthor => f.write_str("proposer of the quotation"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Quotation has expired. No further action can be taken on it.")]
    QuotationExpired,

    #[error("Invalid state transfer from [{from}] to [{to}]")]
    InvalidQuotationTransition {
        from: QuotationStatus,
        to: QuotationStatus,
    },

    #[error("Invalid itinerary bid state. Can't move a quote to {target} in {state} bid status")]
    ItineraryBidState {
        state: BidState,
        target: QuotationStatus,
    },

    #[error("Invalid state change from {from} to {to}")]
    InvalidBidTransition { from: BidState, to: BidState },

    #[error("Signature invalid. Only the {0} can sign this.")]
    SignatureInvalid(Signer),

    #[error("Invalid state change: {0} cannot be requested")]
    UnsupportedTarget(QuotationStatus),
}

fn ensure(condition: bool, err: TransitionError) -> Result<(), TransitionError> {
    if condition {
        Ok(())
    } else {
        Err(err)
    }
}

fn signed(authorization: Option<Verified>, signer: Signer) -> Result<Verified, TransitionError> {
    authorization.ok_or(TransitionError::SignatureInvalid(signer))
}

/// The party that must sign a request to move a quotation to `target`.
pub fn required_signer(target: QuotationStatus) -> Signer {
    match target {
        QuotationStatus::Withdrawn => Signer::QuotationAuthor,
        _ => Signer::ItineraryAuthor,
    }
}

pub fn validate_bid_state_change(
    current: BidState,
    target: BidState,
    authorization: Option<Verified>,
) -> Result<Verified, TransitionError> {
    let invalid = TransitionError::InvalidBidTransition {
        from: current,
        to: target,
    };

    match target {
        BidState::Open => {
            ensure(current != BidState::Open, invalid)?;
        }
        BidState::Closed => {
            ensure(current != BidState::Sold, invalid.clone())?;
            ensure(current != BidState::Closed, invalid)?;
        }
        BidState::Sold => {
            ensure(current == BidState::Open, invalid)?;
        }
        // DEAD is only ever derived from the bid window.
        BidState::Dead => return Err(invalid),
    }

    signed(authorization, Signer::ItineraryAuthor)
}

/// `authorization` must be the outcome of checking the token of
/// [`required_signer`]`(target)`.
pub fn validate_quotation_state_change(
    quotation: QuotationStatus,
    itinerary: BidState,
    target: QuotationStatus,
    authorization: Option<Verified>,
) -> Result<Verified, TransitionError> {
    let invalid = TransitionError::InvalidQuotationTransition {
        from: quotation,
        to: target,
    };
    let bid_state = TransitionError::ItineraryBidState {
        state: itinerary,
        target,
    };

    match target {
        QuotationStatus::Accepted => {
            ensure(quotation != QuotationStatus::Expired, TransitionError::QuotationExpired)?;
            ensure(quotation == QuotationStatus::Quoted, invalid)?;
            ensure(itinerary == BidState::Open, bid_state)?;
        }
        QuotationStatus::Declined => {
            ensure(quotation != QuotationStatus::Expired, TransitionError::QuotationExpired)?;
            ensure(quotation != QuotationStatus::Declined, invalid.clone())?;
            ensure(quotation != QuotationStatus::Withdrawn, invalid)?;
            ensure(itinerary != BidState::Sold, bid_state)?;
        }
        QuotationStatus::Withdrawn => {
            ensure(itinerary != BidState::Sold, bid_state)?;
            ensure(quotation != QuotationStatus::Expired, TransitionError::QuotationExpired)?;
        }
        QuotationStatus::Quoted | QuotationStatus::Expired => {
            return Err(TransitionError::UnsupportedTarget(target));
        }
    }

    signed(authorization, required_signer(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pin;
    use crate::signature;

    fn proof() -> Option<Verified> {
        let pin = Pin::new("1234").unwrap();
        let token = signature::derive("buyer", &pin);
        signature::verify(&token, "buyer", &pin)
    }

    #[test]
    fn test_bid_open_rules() {
        assert!(validate_bid_state_change(BidState::Closed, BidState::Open, proof()).is_ok());
        assert!(validate_bid_state_change(BidState::Sold, BidState::Open, proof()).is_ok());
        assert_eq!(
            validate_bid_state_change(BidState::Open, BidState::Open, proof()).unwrap_err(),
            TransitionError::InvalidBidTransition {
                from: BidState::Open,
                to: BidState::Open
            }
        );
    }

    #[test]
    fn test_bid_close_rules() {
        assert!(validate_bid_state_change(BidState::Open, BidState::Closed, proof()).is_ok());
        assert!(validate_bid_state_change(BidState::Dead, BidState::Closed, proof()).is_ok());
        assert!(validate_bid_state_change(BidState::Sold, BidState::Closed, proof()).is_err());
        assert!(validate_bid_state_change(BidState::Closed, BidState::Closed, proof()).is_err());
    }

    #[test]
    fn test_bid_sold_requires_open() {
        assert!(validate_bid_state_change(BidState::Open, BidState::Sold, proof()).is_ok());
        for state in [BidState::Dead, BidState::Closed, BidState::Sold] {
            assert!(validate_bid_state_change(state, BidState::Sold, proof()).is_err());
        }
    }

    #[test]
    fn test_dead_is_never_requestable() {
        assert!(validate_bid_state_change(BidState::Open, BidState::Dead, proof()).is_err());
    }

    #[test]
    fn test_state_rule_reported_before_signature() {
        let err = validate_bid_state_change(BidState::Sold, BidState::Sold, None).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidBidTransition { .. }));

        let err = validate_bid_state_change(BidState::Open, BidState::Sold, None).unwrap_err();
        assert_eq!(err, TransitionError::SignatureInvalid(Signer::ItineraryAuthor));
    }

    #[test]
    fn test_accept_rules() {
        assert!(validate_quotation_state_change(
            QuotationStatus::Quoted,
            BidState::Open,
            QuotationStatus::Accepted,
            proof()
        )
        .is_ok());

        assert_eq!(
            validate_quotation_state_change(
                QuotationStatus::Expired,
                BidState::Open,
                QuotationStatus::Accepted,
                proof()
            )
            .unwrap_err(),
            TransitionError::QuotationExpired
        );

        assert!(matches!(
            validate_quotation_state_change(
                QuotationStatus::Declined,
                BidState::Open,
                QuotationStatus::Accepted,
                proof()
            ),
            Err(TransitionError::InvalidQuotationTransition { .. })
        ));

        assert!(matches!(
            validate_quotation_state_change(
                QuotationStatus::Quoted,
                BidState::Sold,
                QuotationStatus::Accepted,
                proof()
            ),
            Err(TransitionError::ItineraryBidState { .. })
        ));
    }

    #[test]
    fn test_decline_rules() {
        for status in [QuotationStatus::Quoted, QuotationStatus::Accepted] {
            assert!(validate_quotation_state_change(
                status,
                BidState::Closed,
                QuotationStatus::Declined,
                proof()
            )
            .is_ok());
        }
        for status in [
            QuotationStatus::Expired,
            QuotationStatus::Declined,
            QuotationStatus::Withdrawn,
        ] {
            assert!(validate_quotation_state_change(
                status,
                BidState::Open,
                QuotationStatus::Declined,
                proof()
            )
            .is_err());
        }
        assert!(validate_quotation_state_change(
            QuotationStatus::Quoted,
            BidState::Sold,
            QuotationStatus::Declined,
            proof()
        )
        .is_err());
    }

    #[test]
    fn test_withdraw_rules() {
        assert!(validate_quotation_state_change(
            QuotationStatus::Quoted,
            BidState::Open,
            QuotationStatus::Withdrawn,
            proof()
        )
        .is_ok());

        // Sold wins over a valid signature and over expiry.
        assert!(matches!(
            validate_quotation_state_change(
                QuotationStatus::Expired,
                BidState::Sold,
                QuotationStatus::Withdrawn,
                proof()
            ),
            Err(TransitionError::ItineraryBidState { .. })
        ));

        assert_eq!(
            validate_quotation_state_change(
                QuotationStatus::Quoted,
                BidState::Open,
                QuotationStatus::Withdrawn,
                None
            )
            .unwrap_err(),
            TransitionError::SignatureInvalid(Signer::QuotationAuthor)
        );
    }

    #[test]
    fn test_unsupported_targets() {
        for target in [QuotationStatus::Quoted, QuotationStatus::Expired] {
            assert_eq!(
                validate_quotation_state_change(QuotationStatus::Quoted, BidState::Open, target, proof())
                    .unwrap_err(),
                TransitionError::UnsupportedTarget(target)
            );
        }
    }
}
