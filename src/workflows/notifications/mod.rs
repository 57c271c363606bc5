//! Notification fan-out: denormalized records with
//! snapshot-at-creation display data, idempotent read receipts, and the
//! per-user feed.

pub mod domain;
pub mod router;
pub mod service;

pub use domain::{
    AccountType, CompanyRef, JobRef, Notification, NotificationDraft, NotificationId,
    NotificationKind, PartyRef,
};
pub use router::notification_router;
pub use service::{NotificationError, Notifier};
