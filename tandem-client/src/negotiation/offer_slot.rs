use tandem_core::{Exchange, SessionDescription};

/// Identity of one locally generated offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferToken(u64);

#[derive(Debug, Clone)]
pub struct InFlightOffer {
    pub token: OfferToken,
    pub exchange: Exchange,
    pub description: SessionDescription,
}

/// Tracks the local offer awaiting an answer.
///
/// A token is reserved before the offer is generated and only becomes the
/// in-flight offer through [`OfferSlot::commit`]. Cancelling (a polite
/// rollback) or reserving again invalidates it, so a description that was
/// preempted can never be published or answered later.
#[derive(Debug, Default)]
pub struct OfferSlot {
    issued: u64,
    reserved: Option<OfferToken>,
    current: Option<InFlightOffer>,
}

impl OfferSlot {
    pub fn begin(&mut self) -> OfferToken {
        self.issued += 1;
        let token = OfferToken(self.issued);
        self.reserved = Some(token);
        self.current = None;
        token
    }

    /// Returns false when `token` was cancelled or superseded meanwhile.
    pub fn commit(
        &mut self,
        token: OfferToken,
        exchange: Exchange,
        description: SessionDescription,
    ) -> bool {
        if self.reserved != Some(token) {
            return false;
        }
        self.reserved = None;
        self.current = Some(InFlightOffer {
            token,
            exchange,
            description,
        });
        true
    }

    pub fn cancel(&mut self) -> Option<InFlightOffer> {
        self.reserved = None;
        self.current.take()
    }

    pub fn settle(&mut self) -> Option<InFlightOffer> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&InFlightOffer> {
        self.current.as_ref()
    }
}
