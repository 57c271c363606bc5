use std::cmp::Reverse;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::domain::{
    AccountType, CompanyRef, JobRef, Notification, NotificationDraft, NotificationId,
    NotificationKind, PartyRef,
};
use crate::store::{decode, encode, CollectionPath, ConvertError, DocumentStore, Patch, Stamp, StoreError};
use crate::workflows::users::domain::UserId;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification {0} not found")]
    NotFound(NotificationId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationDoc {
    #[serde(rename = "type")]
    kind: NotificationKind,
    account_type: AccountType,
    recipient: PartyRef,
    sender: PartyRef,
    #[serde(default)]
    job: Option<JobRef>,
    #[serde(default)]
    company: Option<CompanyRef>,
    date: Stamp,
    read: bool,
    is_system: bool,
}

impl NotificationDoc {
    fn into_notification(self, id: NotificationId) -> Notification {
        Notification {
            id,
            kind: self.kind,
            account_type: self.account_type,
            recipient: self.recipient,
            sender: self.sender,
            job: self.job,
            company: self.company,
            date: self.date.into(),
            read: self.read,
            is_system: self.is_system,
        }
    }
}

/// Writes and reads notification records. One notifier is shared by every
/// workflow that fans out.
pub struct Notifier<S> {
    store: Arc<S>,
    platform: PartyRef,
}

impl<S: DocumentStore> Notifier<S> {
    /// `platform_name` becomes the sender identity of system
    /// notifications.
    pub fn new(store: Arc<S>, platform_name: &str) -> Self {
        Self {
            store,
            platform: PartyRef::new("system", platform_name, ""),
        }
    }

    fn collection() -> CollectionPath {
        CollectionPath::new("notifications")
    }

    pub async fn notify(&self, draft: NotificationDraft) -> Result<Notification, NotificationError> {
        let is_system = draft.sender.is_none();
        let doc = NotificationDoc {
            kind: draft.kind,
            account_type: draft.kind.account_type(),
            recipient: draft.recipient,
            sender: draft.sender.unwrap_or_else(|| self.platform.clone()),
            job: draft.job,
            company: draft.company,
            date: Stamp::now(),
            read: false,
            is_system,
        };
        let path = self.store.create(&Self::collection(), encode(&doc)?).await?;
        Ok(doc.into_notification(NotificationId(path.id().to_string())))
    }

    /// Idempotent: marking an already-read notification changes nothing
    /// and never un-reads.
    pub async fn mark_as_read(&self, id: &NotificationId) -> Result<(), NotificationError> {
        let path = Self::collection().doc(id.0.clone());
        match self.store.update(&path, Patch::new().set("read", json!(true))).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(NotificationError::NotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Every notification addressed to the user, newest first. Records
    /// that fail to decode are logged and skipped so one bad document
    /// cannot empty the feed.
    pub async fn user_notifications(&self, user: &UserId) -> Result<Vec<Notification>, NotificationError> {
        let docs = self.store.list(&Self::collection()).await?;
        let mut notifications = Vec::new();
        for doc in docs {
            let id = NotificationId(doc.path.id().to_string());
            match decode::<NotificationDoc>(&doc) {
                Ok(record) if record.recipient.id == user.0 => {
                    notifications.push(record.into_notification(id));
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "skipping undecodable notification"),
            }
        }
        notifications.sort_by_key(|notification| Reverse(notification.date));
        Ok(notifications)
    }
}
