//! Domain types for campus events.
//!
//! Each record with a lifecycle (event, registration, payment proof, ticket)
//! carries its state as an explicit enum, and each enum owns an exhaustive
//! transition table. Anything not in the table is rejected.

use crate::error::{Entity, LifecycleError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4)
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an event
    EventId
}

uuid_id! {
    /// Unique identifier for a registration
    RegistrationId
}

uuid_id! {
    /// Unique identifier for a ticket.
    ///
    /// Drawn from the OS random source, so ticket ids cannot be enumerated.
    TicketId
}

uuid_id! {
    /// Unique identifier for a payment proof
    ProofId
}

uuid_id! {
    /// Identity of a participant, organizer or admin, as supplied by authentication
    UserId
}

uuid_id! {
    /// Opaque reference to a stored blob (payment proof image, QR image)
    ArtifactId
}

// ============================================================================
// Value objects
// ============================================================================

/// Money in cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Addition with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Multiplication by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Maximum number of registrations an event accepts. Zero means unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capacity(u32);

impl Capacity {
    /// No limit
    pub const UNLIMITED: Self = Self(0);

    /// Creates a new `Capacity`
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw value (0 = unlimited)
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// `true` when the event has no limit
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.0 == 0
    }

    /// Whether one more slot fits next to `reserved` existing ones.
    #[must_use]
    pub const fn admits(&self, reserved: u32) -> bool {
        self.is_unlimited() || reserved < self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unlimited() {
            f.write_str("unlimited")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Half-open interval `[opens_at, closes_at)` during which registrations are accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationWindow {
    opens_at: DateTime<Utc>,
    closes_at: DateTime<Utc>,
}

impl RegistrationWindow {
    /// Build a window.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] unless `closes_at` is after `opens_at`.
    pub fn new(opens_at: DateTime<Utc>, closes_at: DateTime<Utc>) -> Result<Self> {
        if closes_at <= opens_at {
            return Err(LifecycleError::Validation(
                "registration window must close after it opens".to_string(),
            ));
        }
        Ok(Self {
            opens_at,
            closes_at,
        })
    }

    /// Opening time
    #[must_use]
    pub const fn opens_at(&self) -> DateTime<Utc> {
        self.opens_at
    }

    /// Closing time
    #[must_use]
    pub const fn closes_at(&self) -> DateTime<Utc> {
        self.closes_at
    }

    /// `true` while registrations are accepted
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.opens_at <= now && now < self.closes_at
    }

    /// `true` once the window has passed
    #[must_use]
    pub fn has_closed_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.closes_at
    }
}

/// Merchandise offered with an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchOption {
    /// Item name, unique within the event
    pub name: String,
    /// Unit price
    pub price: Money,
    /// Units available at creation
    pub stock: u32,
}

impl MerchOption {
    /// Creates a new `MerchOption`
    #[must_use]
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            name: name.into(),
            price,
            stock,
        }
    }
}

/// Merchandise picked by a participant at registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchSelection {
    /// Item name
    pub name: String,
    /// Units
    pub quantity: u32,
}

impl MerchSelection {
    /// Creates a new `MerchSelection`
    #[must_use]
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

// ============================================================================
// Actors
// ============================================================================

/// Role supplied by authentication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Registers for events
    Participant,
    /// Creates and runs events
    Organizer,
    /// Passes every ownership check
    Admin,
}

/// The caller of an engine operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Who
    pub user_id: UserId,
    /// In which role
    pub role: Role,
}

impl Actor {
    /// A participant
    #[must_use]
    pub const fn participant(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Participant,
        }
    }

    /// An organizer
    #[must_use]
    pub const fn organizer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Organizer,
        }
    }

    /// An admin
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    /// `true` for admins
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ============================================================================
// Event
// ============================================================================

/// Event lifecycle.
///
/// ```text
/// draft -> published -> closed -> completed
///   \          \
///    `----------`--> cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// Being configured, not visible
    Draft,
    /// Visible and registrable
    Published,
    /// No new registrations; check-in still allowed
    Closed,
    /// Finished; registrations and tickets are frozen, feedback is open
    Completed,
    /// Called off; every registration was cancelled
    Cancelled,
}

/// Moves in the event lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventTransition {
    /// Draft to published
    Publish,
    /// Published to closed
    Close,
    /// Closed to completed
    Complete,
    /// Draft or published to cancelled
    Cancel,
}

impl EventTransition {
    const fn verb(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Close => "close",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }
}

impl EventStatus {
    /// The event transition table.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidStateTransition`] for any pair not listed.
    pub fn apply(self, transition: EventTransition) -> Result<Self> {
        use EventStatus::{Cancelled, Closed, Completed, Draft, Published};
        use EventTransition::{Cancel, Close, Complete, Publish};

        match (self, transition) {
            (Draft, Publish) => Ok(Published),
            (Published, Close) => Ok(Closed),
            (Closed, Complete) => Ok(Completed),
            (Draft | Published, Cancel) => Ok(Cancelled),
            (Draft | Published | Closed | Completed | Cancelled, _) => Err(
                LifecycleError::invalid_transition(Entity::Event, self, transition.verb()),
            ),
        }
    }

    /// `true` once nothing about the event's registrations may change.
    #[must_use]
    pub const fn is_frozen(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Capacity, window and price may still be edited.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Published)
    }

    /// Tickets may be scanned at the venue.
    #[must_use]
    pub const fn allows_check_in(self) -> bool {
        matches!(self, Self::Published | Self::Closed)
    }

    /// Metric label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Closed => "closed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Organizer input for a new event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Display name
    pub name: String,
    /// When the event takes place
    pub starts_at: DateTime<Utc>,
    /// Slot limit; required before publishing
    pub capacity: Option<Capacity>,
    /// Registration window; required before publishing
    pub window: Option<RegistrationWindow>,
    /// Entry price; zero for free events
    pub price: Money,
    /// Merchandise on offer
    pub merchandise: Vec<MerchOption>,
}

impl EventDraft {
    /// A free event with no capacity, window or merchandise yet.
    #[must_use]
    pub fn new(name: impl Into<String>, starts_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            starts_at,
            capacity: None,
            window: None,
            price: Money::ZERO,
            merchandise: Vec::new(),
        }
    }

    /// Set the capacity
    #[must_use]
    pub const fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set the registration window
    #[must_use]
    pub const fn with_window(mut self, window: RegistrationWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Set the entry price
    #[must_use]
    pub const fn with_price(mut self, price: Money) -> Self {
        self.price = price;
        self
    }

    /// Add a merchandise item
    #[must_use]
    pub fn with_merch(mut self, option: MerchOption) -> Self {
        self.merchandise.push(option);
        self
    }

    /// Reject empty names and duplicate merchandise.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "event name must not be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for option in &self.merchandise {
            if option.name.trim().is_empty() {
                return Err(LifecycleError::Validation(
                    "merchandise name must not be empty".to_string(),
                ));
            }
            if !seen.insert(option.name.as_str()) {
                return Err(LifecycleError::Validation(format!(
                    "duplicate merchandise item {}",
                    option.name
                )));
            }
        }
        Ok(())
    }
}

/// An event owned by one organizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier
    pub id: EventId,
    /// Owning organizer
    pub organizer_id: UserId,
    /// Display name
    pub name: String,
    /// When the event takes place
    pub starts_at: DateTime<Utc>,
    /// Slot limit
    pub capacity: Option<Capacity>,
    /// Registration window
    pub window: Option<RegistrationWindow>,
    /// Entry price
    pub price: Money,
    /// Merchandise as offered at creation (live stock is tracked by the ledger)
    pub merchandise: Vec<MerchOption>,
    /// Lifecycle state
    pub status: EventStatus,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last changed
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Materialize a validated draft.
    #[must_use]
    pub fn from_draft(
        id: EventId,
        organizer_id: UserId,
        draft: EventDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            organizer_id,
            name: draft.name,
            starts_at: draft.starts_at,
            capacity: draft.capacity,
            window: draft.window,
            price: draft.price,
            merchandise: draft.merchandise,
            status: EventStatus::Draft,
            created_at,
            updated_at: created_at,
        }
    }

    /// Capacity in force (unlimited while unset).
    #[must_use]
    pub fn effective_capacity(&self) -> Capacity {
        self.capacity.unwrap_or(Capacity::UNLIMITED)
    }

    /// The organizer who owns the event, or an admin.
    #[must_use]
    pub fn is_managed_by(&self, actor: &Actor) -> bool {
        actor.is_admin() || (actor.role == Role::Organizer && actor.user_id == self.organizer_id)
    }

    /// Whether a registration may be created at `now`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::WindowClosed`] unless the event is published and
    /// `now` falls inside its window.
    pub fn check_accepting(&self, now: DateTime<Utc>) -> Result<()> {
        let open = self.status == EventStatus::Published
            && self.window.is_some_and(|window| window.is_open_at(now));
        if open {
            Ok(())
        } else {
            Err(LifecycleError::WindowClosed { event_id: self.id })
        }
    }

    /// Price of entry plus the selected merchandise.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Validation`] for unknown items, zero quantities,
    /// repeated items or arithmetic overflow.
    pub fn amount_due(&self, selection: &[MerchSelection]) -> Result<Money> {
        let mut total = self.price;
        let mut seen = std::collections::HashSet::new();

        for item in selection {
            if item.quantity == 0 {
                return Err(LifecycleError::Validation(format!(
                    "quantity for {} must be positive",
                    item.name
                )));
            }
            if !seen.insert(item.name.as_str()) {
                return Err(LifecycleError::Validation(format!(
                    "merchandise item {} selected twice",
                    item.name
                )));
            }
            let option = self
                .merchandise
                .iter()
                .find(|option| option.name == item.name)
                .ok_or_else(|| {
                    LifecycleError::Validation(format!("unknown merchandise item {}", item.name))
                })?;
            total = option
                .price
                .checked_multiply(item.quantity)
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| LifecycleError::Validation("amount overflow".to_string()))?;
        }

        Ok(total)
    }

    /// Initial stock per merchandise item.
    #[must_use]
    pub fn initial_stock(&self) -> BTreeMap<String, u32> {
        self.merchandise
            .iter()
            .map(|option| (option.name.clone(), option.stock))
            .collect()
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Registration lifecycle.
///
/// ```text
/// pending -> confirmed -> checked-in
///    \          \
///     `----------`--> cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// Holds a slot; waiting on the payment gate
    Pending,
    /// Ticket issued
    Confirmed,
    /// Ticket scanned at the venue
    CheckedIn,
    /// Slot released, ticket void
    Cancelled,
}

/// Moves in the registration lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationTransition {
    /// Pending to confirmed
    Confirm,
    /// Confirmed to checked-in
    CheckIn,
    /// Pending or confirmed to cancelled
    Cancel,
}

impl RegistrationTransition {
    const fn verb(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::CheckIn => "check in",
            Self::Cancel => "cancel",
        }
    }
}

impl RegistrationStatus {
    /// The registration transition table.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidStateTransition`] for any pair not listed.
    pub fn apply(self, transition: RegistrationTransition) -> Result<Self> {
        use RegistrationStatus::{Cancelled, CheckedIn, Confirmed, Pending};
        use RegistrationTransition::{Cancel, CheckIn, Confirm};

        match (self, transition) {
            (Pending, Confirm) => Ok(Confirmed),
            (Confirmed, CheckIn) => Ok(CheckedIn),
            (Pending | Confirmed, Cancel) => Ok(Cancelled),
            (Pending | Confirmed | CheckedIn | Cancelled, _) => Err(
                LifecycleError::invalid_transition(Entity::Registration, self, transition.verb()),
            ),
        }
    }

    /// Anything but cancelled holds a slot.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Metric label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::CheckedIn => "checked_in",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::CheckedIn => "checked-in",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Whether a registration must clear the payment gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentRequirement {
    /// Free: confirmed as soon as the slot is reserved
    NotRequired,
    /// Paid: confirmed once a proof is approved
    Required {
        /// Amount the proof must cover
        amount: Money,
    },
}

impl PaymentRequirement {
    /// Derive from the amount due.
    #[must_use]
    pub const fn for_amount(amount: Money) -> Self {
        if amount.is_zero() {
            Self::NotRequired
        } else {
            Self::Required { amount }
        }
    }

    /// `true` for paid registrations
    #[must_use]
    pub const fn is_required(&self) -> bool {
        matches!(self, Self::Required { .. })
    }
}

/// Why and when a registration was cancelled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// Free-text reason
    pub reason: String,
    /// When
    pub cancelled_at: DateTime<Utc>,
}

/// A participant's claim on an event slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Unique registration identifier
    pub id: RegistrationId,
    /// Event registered for
    pub event_id: EventId,
    /// Participant
    pub participant_id: UserId,
    /// Lifecycle state
    pub status: RegistrationStatus,
    /// Payment gate requirement
    pub payment: PaymentRequirement,
    /// Current payment proof, if any
    pub proof_id: Option<ProofId>,
    /// Selected merchandise
    pub merchandise: Vec<MerchSelection>,
    /// Issued on confirmation
    pub ticket_id: Option<TicketId>,
    /// When registered
    pub created_at: DateTime<Utc>,
    /// When last changed
    pub updated_at: DateTime<Utc>,
    /// Set on check-in
    pub checked_in_at: Option<DateTime<Utc>>,
    /// Set on cancellation
    pub cancellation: Option<Cancellation>,
}

impl Registration {
    /// A new pending registration.
    #[must_use]
    pub fn new(
        id: RegistrationId,
        event_id: EventId,
        participant_id: UserId,
        payment: PaymentRequirement,
        merchandise: Vec<MerchSelection>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_id,
            participant_id,
            status: RegistrationStatus::Pending,
            payment,
            proof_id: None,
            merchandise,
            ticket_id: None,
            created_at,
            updated_at: created_at,
            checked_in_at: None,
            cancellation: None,
        }
    }

    /// `true` unless cancelled
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// ============================================================================
// Payment proof
// ============================================================================

/// Review state of a payment proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofStatus {
    /// Awaiting organizer review
    Pending,
    /// Accepted
    Approved {
        /// Reviewing organizer
        reviewer: UserId,
        /// When
        reviewed_at: DateTime<Utc>,
    },
    /// Refused; the participant may resubmit
    Rejected {
        /// Reviewing organizer
        reviewer: UserId,
        /// Why
        reason: String,
        /// When
        reviewed_at: DateTime<Utc>,
    },
    /// The registration was cancelled while the proof was under review
    Withdrawn {
        /// When
        withdrawn_at: DateTime<Utc>,
    },
}

/// Moves in the payment proof lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProofTransition {
    /// Pending to approved
    Approve {
        /// Reviewing organizer
        reviewer: UserId,
        /// When
        at: DateTime<Utc>,
    },
    /// Pending to rejected
    Reject {
        /// Reviewing organizer
        reviewer: UserId,
        /// Why
        reason: String,
        /// When
        at: DateTime<Utc>,
    },
    /// Pending to withdrawn
    Withdraw {
        /// When
        at: DateTime<Utc>,
    },
}

impl ProofTransition {
    const fn verb(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::Withdraw { .. } => "withdraw",
        }
    }
}

impl ProofStatus {
    /// The payment proof transition table: every move starts from pending.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidStateTransition`] when the proof was already decided.
    pub fn apply(self, transition: ProofTransition) -> Result<Self> {
        match (self, transition) {
            (Self::Pending, ProofTransition::Approve { reviewer, at }) => Ok(Self::Approved {
                reviewer,
                reviewed_at: at,
            }),
            (
                Self::Pending,
                ProofTransition::Reject {
                    reviewer,
                    reason,
                    at,
                },
            ) => Ok(Self::Rejected {
                reviewer,
                reason,
                reviewed_at: at,
            }),
            (Self::Pending, ProofTransition::Withdraw { at }) => {
                Ok(Self::Withdrawn { withdrawn_at: at })
            },
            (
                from @ (Self::Approved { .. } | Self::Rejected { .. } | Self::Withdrawn { .. }),
                transition,
            ) => Err(LifecycleError::invalid_transition(
                Entity::PaymentProof,
                from,
                transition.verb(),
            )),
        }
    }

    /// `true` while under review
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// `true` once approved
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

impl fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Approved { .. } => "approved",
            Self::Rejected { .. } => "rejected",
            Self::Withdrawn { .. } => "withdrawn",
        };
        f.write_str(name)
    }
}

/// Evidence of payment for one registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    /// Unique proof identifier
    pub id: ProofId,
    /// Registration being paid for
    pub registration_id: RegistrationId,
    /// Event of that registration
    pub event_id: EventId,
    /// Participant who submitted it
    pub participant_id: UserId,
    /// Stored artifact (receipt image)
    pub artifact: ArtifactId,
    /// Review state
    pub status: ProofStatus,
    /// When submitted
    pub submitted_at: DateTime<Utc>,
}

// ============================================================================
// Ticket
// ============================================================================

/// Usage state of a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Not yet scanned
    Valid,
    /// Scanned at the venue; never valid again
    Used {
        /// When
        checked_in_at: DateTime<Utc>,
    },
    /// Invalidated by cancellation
    Void {
        /// When
        voided_at: DateTime<Utc>,
    },
}

/// Moves in the ticket lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketTransition {
    /// Valid to used
    Use {
        /// When
        at: DateTime<Utc>,
    },
    /// Valid to void
    Void {
        /// When
        at: DateTime<Utc>,
    },
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Valid => "valid",
            Self::Used { .. } => "used",
            Self::Void { .. } => "void",
        };
        f.write_str(name)
    }
}

/// Single-use credential issued when a registration is confirmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique ticket identifier
    pub id: TicketId,
    /// Owning registration
    pub registration_id: RegistrationId,
    /// Event
    pub event_id: EventId,
    /// Holder
    pub participant_id: UserId,
    /// Signed token (QR payload)
    pub token: String,
    /// Usage state
    pub status: TicketStatus,
    /// When issued
    pub issued_at: DateTime<Utc>,
}

impl Ticket {
    /// The ticket transition table.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::TicketAlreadyUsed`] when scanning a used ticket
    /// - [`LifecycleError::TicketInvalid`] when scanning a void ticket
    /// - [`LifecycleError::InvalidStateTransition`] when voiding a ticket that is not valid
    pub fn apply(&mut self, transition: TicketTransition) -> Result<()> {
        self.status = match (self.status, transition) {
            (TicketStatus::Valid, TicketTransition::Use { at }) => TicketStatus::Used {
                checked_in_at: at,
            },
            (TicketStatus::Valid, TicketTransition::Void { at }) => {
                TicketStatus::Void { voided_at: at }
            },
            (TicketStatus::Used { .. }, TicketTransition::Use { .. }) => {
                return Err(LifecycleError::TicketAlreadyUsed { ticket_id: self.id });
            },
            (TicketStatus::Void { .. }, TicketTransition::Use { .. }) => {
                return Err(LifecycleError::TicketInvalid(format!(
                    "ticket {} was voided",
                    self.id
                )));
            },
            (
                status @ (TicketStatus::Used { .. } | TicketStatus::Void { .. }),
                TicketTransition::Void { .. },
            ) => {
                return Err(LifecycleError::invalid_transition(
                    Entity::Ticket,
                    status,
                    "void",
                ));
            },
        };
        Ok(())
    }

    /// `true` until used or voided
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.status, TicketStatus::Valid)
    }
}

// ============================================================================
// Feedback and summaries
// ============================================================================

/// Post-event feedback from an attendee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Event
    pub event_id: EventId,
    /// Attendee
    pub participant_id: UserId,
    /// 1 (poor) to 5 (excellent)
    pub rating: u8,
    /// Optional free text
    pub comment: Option<String>,
    /// When submitted
    pub submitted_at: DateTime<Utc>,
}

impl Feedback {
    /// Lowest accepted rating
    pub const MIN_RATING: u8 = 1;
    /// Highest accepted rating
    pub const MAX_RATING: u8 = 5;
}

/// Registration counts for one event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Capacity in force
    pub capacity: Capacity,
    /// Slots held by the ledger
    pub reserved: u32,
    /// Free slots, `None` when unlimited
    pub remaining: Option<u32>,
    /// Registrations awaiting payment
    pub pending: u32,
    /// Registrations with a valid ticket
    pub confirmed: u32,
    /// Registrations checked in
    pub checked_in: u32,
    /// Registrations cancelled
    pub cancelled: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, hour, 0, 0)
            .single()
            .unwrap_or_default()
    }

    #[test]
    fn event_transition_table() {
        use EventStatus::{Cancelled, Closed, Completed, Draft, Published};
        use EventTransition::{Cancel, Close, Complete, Publish};

        assert_eq!(Draft.apply(Publish), Ok(Published));
        assert_eq!(Published.apply(Close), Ok(Closed));
        assert_eq!(Closed.apply(Complete), Ok(Completed));
        assert_eq!(Draft.apply(Cancel), Ok(Cancelled));
        assert_eq!(Published.apply(Cancel), Ok(Cancelled));

        for (from, transition) in [
            (Draft, Close),
            (Draft, Complete),
            (Published, Publish),
            (Published, Complete),
            (Closed, Cancel),
            (Completed, Cancel),
            (Cancelled, Publish),
        ] {
            assert!(matches!(
                from.apply(transition),
                Err(LifecycleError::InvalidStateTransition {
                    entity: Entity::Event,
                    ..
                })
            ));
        }
    }

    #[test]
    fn registration_transition_table() {
        use RegistrationStatus::{Cancelled, CheckedIn, Confirmed, Pending};
        use RegistrationTransition::{Cancel, CheckIn, Confirm};

        assert_eq!(Pending.apply(Confirm), Ok(Confirmed));
        assert_eq!(Confirmed.apply(CheckIn), Ok(CheckedIn));
        assert_eq!(Pending.apply(Cancel), Ok(Cancelled));
        assert_eq!(Confirmed.apply(Cancel), Ok(Cancelled));
        assert!(Pending.apply(CheckIn).is_err());
        assert!(CheckedIn.apply(Cancel).is_err());
        assert!(Cancelled.apply(Confirm).is_err());
    }

    #[test]
    fn proof_moves_only_from_pending() {
        let reviewer = UserId::new();
        let approved = ProofStatus::Pending
            .apply(ProofTransition::Approve { reviewer, at: at(10) })
            .unwrap_or(ProofStatus::Pending);
        assert!(approved.is_approved());

        let again = approved.apply(ProofTransition::Reject {
            reviewer,
            reason: "late".to_string(),
            at: at(11),
        });
        assert!(matches!(
            again,
            Err(LifecycleError::InvalidStateTransition {
                entity: Entity::PaymentProof,
                ..
            })
        ));
    }

    #[test]
    fn ticket_is_single_use() {
        let mut ticket = Ticket {
            id: TicketId::new(),
            registration_id: RegistrationId::new(),
            event_id: EventId::new(),
            participant_id: UserId::new(),
            token: String::new(),
            status: TicketStatus::Valid,
            issued_at: at(9),
        };

        assert_eq!(ticket.apply(TicketTransition::Use { at: at(10) }), Ok(()));
        assert_eq!(
            ticket.apply(TicketTransition::Use { at: at(11) }),
            Err(LifecycleError::TicketAlreadyUsed { ticket_id: ticket.id })
        );
        assert!(ticket.apply(TicketTransition::Void { at: at(12) }).is_err());
    }

    #[test]
    fn window_is_half_open() {
        let window = RegistrationWindow::new(at(9), at(12)).unwrap_or_else(|_| unreachable!());
        assert!(window.is_open_at(at(9)));
        assert!(window.is_open_at(at(12) - Duration::seconds(1)));
        assert!(!window.is_open_at(at(12)));
        assert!(window.has_closed_at(at(12)));
        assert!(RegistrationWindow::new(at(12), at(9)).is_err());
    }

    #[test]
    fn amount_due_adds_merchandise() {
        let draft = EventDraft::new("Hack Night", at(18))
            .with_price(Money::from_cents(500))
            .with_merch(MerchOption::new("t-shirt", Money::from_cents(1500), 10));
        let event = Event::from_draft(EventId::new(), UserId::new(), draft, at(9));

        assert_eq!(event.amount_due(&[]), Ok(Money::from_cents(500)));
        assert_eq!(
            event.amount_due(&[MerchSelection::new("t-shirt", 2)]),
            Ok(Money::from_cents(3500))
        );
        assert!(event.amount_due(&[MerchSelection::new("mug", 1)]).is_err());
        assert!(
            event
                .amount_due(&[MerchSelection::new("t-shirt", 0)])
                .is_err()
        );
    }

    #[test]
    fn capacity_zero_is_unlimited() {
        assert!(Capacity::UNLIMITED.admits(u32::MAX - 1));
        assert!(Capacity::new(2).admits(1));
        assert!(!Capacity::new(2).admits(2));
        assert_eq!(Capacity::UNLIMITED.to_string(), "unlimited");
    }

    #[test]
    fn draft_validation() {
        assert!(EventDraft::new("  ", at(18)).validate().is_err());
        let duplicate = EventDraft::new("Fair", at(18))
            .with_merch(MerchOption::new("cap", Money::ZERO, 1))
            .with_merch(MerchOption::new("cap", Money::ZERO, 1));
        assert!(duplicate.validate().is_err());
    }
}
