//! Ticket tokens.
//!
//! A token is the QR payload printed on a ticket:
//!
//! ```text
//! tkt1.<base64url(ticket_id[16] || event_id[16] || tag[16])>
//! ```
//!
//! The tag is the first 16 bytes of
//! `SHA-256("campus-ticket-v1" || secret || ticket_id || event_id)`, so a
//! scanner can reject forged or corrupted tokens before touching storage.
//! Whether the ticket is still unused is a separate state lookup.

use crate::error::{LifecycleError, Result};
use crate::types::{EventId, TicketId};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

const PREFIX: &str = "tkt1.";
const DOMAIN: &[u8] = b"campus-ticket-v1";
const ID_LEN: usize = 16;
const TAG_LEN: usize = 16;
const PAYLOAD_LEN: usize = ID_LEN * 2 + TAG_LEN;

/// Identifiers carried by a verified token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TicketClaims {
    /// Ticket the token was issued for
    pub ticket_id: TicketId,
    /// Event the ticket admits to
    pub event_id: EventId,
}

/// A freshly issued ticket id with its token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedTicket {
    /// New random ticket id
    pub ticket_id: TicketId,
    /// Signed token for the QR code
    pub token: String,
}

/// Issues and verifies ticket tokens with a process-wide secret.
#[derive(Clone)]
pub struct TicketCodec {
    secret: Arc<[u8]>,
}

impl TicketCodec {
    /// Codec keyed with `secret`.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
        }
    }

    /// Codec keyed with 32 random bytes. Tokens do not survive a restart.
    #[must_use]
    pub fn with_random_secret() -> Self {
        let secret: [u8; 32] = rand::random();
        Self::new(secret)
    }

    /// Draw a new ticket id for `event_id` and sign it.
    #[must_use]
    pub fn issue(&self, event_id: EventId) -> IssuedTicket {
        let ticket_id = TicketId::new();
        IssuedTicket {
            ticket_id,
            token: self.encode(ticket_id, event_id),
        }
    }

    /// Token for an existing ticket id.
    #[must_use]
    pub fn encode(&self, ticket_id: TicketId, event_id: EventId) -> String {
        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        payload.extend_from_slice(ticket_id.as_uuid().as_bytes());
        payload.extend_from_slice(event_id.as_uuid().as_bytes());
        let tag = self.tag(
            ticket_id.as_uuid().as_bytes(),
            event_id.as_uuid().as_bytes(),
        );
        payload.extend_from_slice(&tag);

        format!("{PREFIX}{}", URL_SAFE_NO_PAD.encode(payload))
    }

    /// Verify a token and return the identifiers it carries.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::MalformedToken`] for a wrong prefix, bad base64,
    /// wrong length or a tag that does not match.
    pub fn decode(&self, token: &str) -> Result<TicketClaims> {
        let encoded = token
            .strip_prefix(PREFIX)
            .ok_or(LifecycleError::MalformedToken)?;
        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| LifecycleError::MalformedToken)?;
        if payload.len() != PAYLOAD_LEN {
            return Err(LifecycleError::MalformedToken);
        }

        let (ids, tag) = payload.split_at(ID_LEN * 2);
        let (ticket, event) = ids.split_at(ID_LEN);
        if !constant_time_eq::constant_time_eq(tag, &self.tag(ticket, event)) {
            return Err(LifecycleError::MalformedToken);
        }

        let ticket = Uuid::from_slice(ticket).map_err(|_| LifecycleError::MalformedToken)?;
        let event = Uuid::from_slice(event).map_err(|_| LifecycleError::MalformedToken)?;

        Ok(TicketClaims {
            ticket_id: TicketId::from_uuid(ticket),
            event_id: EventId::from_uuid(event),
        })
    }

    fn tag(&self, ticket: &[u8], event: &[u8]) -> [u8; TAG_LEN] {
        let digest = Sha256::new()
            .chain_update(DOMAIN)
            .chain_update(self.secret.as_ref())
            .chain_update(ticket)
            .chain_update(event)
            .finalize();

        let mut tag = [0_u8; TAG_LEN];
        tag.copy_from_slice(&digest[..TAG_LEN]);
        tag
    }
}

// Never print the secret.
impl fmt::Debug for TicketCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketCodec")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec() -> TicketCodec {
        TicketCodec::new(b"test-secret-for-ticket-tokens")
    }

    #[test]
    fn issued_token_decodes_to_its_ids() {
        let codec = codec();
        let event_id = EventId::new();
        let issued = codec.issue(event_id);

        assert!(issued.token.starts_with(PREFIX));
        assert_eq!(
            codec.decode(&issued.token),
            Ok(TicketClaims {
                ticket_id: issued.ticket_id,
                event_id,
            })
        );
    }

    #[test]
    fn issued_ids_are_distinct() {
        let codec = codec();
        let event_id = EventId::new();
        let first = codec.issue(event_id);
        let second = codec.issue(event_id);
        assert_ne!(first.ticket_id, second.ticket_id);
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let forged = TicketCodec::new(b"attacker").encode(TicketId::new(), EventId::new());
        assert_eq!(codec().decode(&forged), Err(LifecycleError::MalformedToken));
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = codec();
        for token in ["", "tkt1.", "tkt2.AAAA", "tkt1.!!!!", "tkt1.AAAA", "hello"] {
            assert_eq!(
                codec.decode(token),
                Err(LifecycleError::MalformedToken),
                "{token}"
            );
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains("test-secret"));
    }

    proptest! {
        #[test]
        fn round_trips(ticket in any::<u128>(), event in any::<u128>()) {
            let codec = codec();
            let ticket_id = TicketId::from_uuid(Uuid::from_u128(ticket));
            let event_id = EventId::from_uuid(Uuid::from_u128(event));

            let token = codec.encode(ticket_id, event_id);
            prop_assert_eq!(
                codec.decode(&token),
                Ok(TicketClaims { ticket_id, event_id })
            );
        }

        #[test]
        fn any_single_bit_flip_is_malformed(
            ticket in any::<u128>(),
            event in any::<u128>(),
            position in any::<prop::sample::Index>(),
            bit in 0_u8..8,
        ) {
            let codec = codec();
            let token = codec.encode(
                TicketId::from_uuid(Uuid::from_u128(ticket)),
                EventId::from_uuid(Uuid::from_u128(event)),
            );

            let mut bytes = token.into_bytes();
            let index = position.index(bytes.len());
            bytes[index] ^= 1 << bit;

            if let Ok(corrupted) = String::from_utf8(bytes) {
                prop_assert_eq!(
                    codec.decode(&corrupted),
                    Err(LifecycleError::MalformedToken)
                );
            }
        }
    }
}
