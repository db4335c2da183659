//! Payment gate operations.

use super::LifecycleEngine;
use super::registrations::record_confirmation;
use crate::aggregates::{PaymentAction, PaymentState, RegistrationAction, RegistrationState};
use crate::error::{Entity, LifecycleError, Result};
use crate::metrics;
use crate::persistence::RegistrationWrite;
use crate::types::{Actor, ArtifactId, PaymentProof, ProofId, Registration, RegistrationId, Ticket};
use campus_core::reducer::Reducer;
use campus_core::version::Version;

/// Split a loaded registration into the gate's view and the ticket.
fn gate_view(state: RegistrationState) -> (PaymentState, Option<Ticket>) {
    let RegistrationState {
        event,
        registration,
        ticket,
        proof,
        ..
    } = state;
    (
        PaymentState {
            event,
            registration,
            proof,
            replaced: None,
            last_error: None,
        },
        ticket,
    )
}

/// `proof_id` must still be the registration's current proof.
fn ensure_current(state: &RegistrationState, proof_id: ProofId) -> Result<()> {
    let current = state
        .registration
        .as_ref()
        .and_then(|registration| registration.proof_id);
    if current == Some(proof_id) {
        Ok(())
    } else {
        Err(LifecycleError::not_found(Entity::PaymentProof, proof_id))
    }
}

impl LifecycleEngine {
    /// Submit proof of payment for a pending registration.
    ///
    /// A second proof is accepted only after the first was rejected; it
    /// replaces the rejected one.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for anyone but the registered participant
    /// - `Validation` when the registration owes nothing
    /// - `InvalidStateTransition` while a proof is pending or approved, or
    ///   once the registration is no longer pending
    pub async fn submit_proof(
        &self,
        actor: Actor,
        registration_id: RegistrationId,
        artifact: ArtifactId,
    ) -> Result<PaymentProof> {
        let _guard = self.registration_locks.lock(registration_id).await;

        let (proof, replaced) = self
            .retrying(|| async {
                let (state, version) = self.load_registration_state(registration_id).await?;
                let (mut payment, _) = gate_view(state);
                self.payment_reducer.reduce(
                    &mut payment,
                    PaymentAction::SubmitProof {
                        proof_id: ProofId::new(),
                        actor,
                        artifact,
                    },
                    &self.payment_env,
                );
                let proof = payment.outcome()?.clone();
                self.write_gate(&payment, version).await?;
                Ok((proof, payment.replaced))
            })
            .await?;

        metrics::record_payment_proof("submitted");
        tracing::info!(
            %registration_id,
            proof_id = %proof.id,
            replaced = ?replaced,
            "Payment proof submitted"
        );
        Ok(proof)
    }

    /// Approve a pending proof and confirm its registration.
    ///
    /// Approval, confirmation and the new ticket are stored in one write; the
    /// ticket notification goes out afterwards.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for anyone but the event's organizer or an admin,
    /// `InvalidStateTransition` unless the proof is pending, `NotFound` for a
    /// replaced proof.
    pub async fn approve_proof(&self, actor: Actor, proof_id: ProofId) -> Result<Registration> {
        let registration_id = self.persistence.load_proof(proof_id).await?.registration_id;
        let _guard = self.registration_locks.lock(registration_id).await;

        let registration = self
            .retrying(|| async {
                let (state, version) = self.load_registration_state(registration_id).await?;
                ensure_current(&state, proof_id)?;
                let (mut payment, ticket) = gate_view(state);
                self.payment_reducer.reduce(
                    &mut payment,
                    PaymentAction::ApproveProof { actor },
                    &self.payment_env,
                );
                payment.outcome()?;

                let PaymentState {
                    event,
                    registration,
                    proof,
                    ..
                } = payment;
                let mut confirming = RegistrationState {
                    event,
                    registration,
                    ticket,
                    proof,
                    last_error: None,
                };
                let effects = self.registration_reducer.reduce(
                    &mut confirming,
                    RegistrationAction::Confirm { actor: None },
                    &self.registration_env,
                );
                let registration = self.commit_registration_state(&confirming, version).await?;
                self.dispatch(effects);
                Ok(registration)
            })
            .await?;

        metrics::record_payment_proof("approved");
        record_confirmation(&registration);
        tracing::info!(
            %registration_id,
            %proof_id,
            reviewer = %actor.user_id,
            "Payment proof approved"
        );
        Ok(registration)
    }

    /// Reject a pending proof. The registration stays pending and the
    /// participant may submit again.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty reason, `Unauthorized` for anyone but the
    /// event's organizer or an admin, `InvalidStateTransition` unless the
    /// proof is pending.
    pub async fn reject_proof(
        &self,
        actor: Actor,
        proof_id: ProofId,
        reason: impl Into<String>,
    ) -> Result<PaymentProof> {
        let reason = reason.into();
        let registration_id = self.persistence.load_proof(proof_id).await?.registration_id;
        let _guard = self.registration_locks.lock(registration_id).await;

        let proof = self
            .retrying(|| async {
                let (state, version) = self.load_registration_state(registration_id).await?;
                ensure_current(&state, proof_id)?;
                let (mut payment, _) = gate_view(state);
                self.payment_reducer.reduce(
                    &mut payment,
                    PaymentAction::RejectProof {
                        actor,
                        reason: reason.clone(),
                    },
                    &self.payment_env,
                );
                let proof = payment.outcome()?.clone();
                self.write_gate(&payment, version).await?;
                Ok(proof)
            })
            .await?;

        metrics::record_payment_proof("rejected");
        tracing::info!(%registration_id, %proof_id, %reason, "Payment proof rejected");
        Ok(proof)
    }

    /// Store the gate's result: the registration, its current proof, and the
    /// removal of a replaced proof.
    async fn write_gate(&self, payment: &PaymentState, expected: Version) -> Result<()> {
        let registration = payment
            .registration
            .clone()
            .ok_or_else(|| LifecycleError::not_found(Entity::Registration, "<not loaded>"))?;
        self.persistence
            .commit_registration(
                RegistrationWrite::new(registration, expected)
                    .with_proof(payment.proof.clone())
                    .discarding(payment.replaced),
            )
            .await?;
        Ok(())
    }
}
