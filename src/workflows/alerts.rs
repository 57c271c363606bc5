//! Outbound email/SMS alerts.
//!
//! Message bodies live as per-locale template documents in the `emails`
//! collection; delivery goes through the [`AlertMessenger`] seam. A
//! delivery that fails is data, not an error: fan-out paths collect
//! receipts instead of aborting.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::{decode, encode, CollectionPath, ConvertError, DocumentStore, Stamp, StoreError};

/// Message templates the platform sends. Doc ids in the `emails`
/// collection use the camelCase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateKind {
    JobApproved,
    JobDenied,
    ChooseFreelancers,
    DeniedOffer,
    JobCancelled,
    JobPostponed,
    ContactInfoRequested,
    ContactInfoApproved,
    ContactInfoDenied,
    EmployerSignature,
    FreelancerSignature,
    CompanyInvite,
    ReviewRequested,
    NewFreelancerContract,
}

impl TemplateKind {
    pub const fn doc_id(self) -> &'static str {
        match self {
            TemplateKind::JobApproved => "jobApproved",
            TemplateKind::JobDenied => "jobDenied",
            TemplateKind::ChooseFreelancers => "chooseFreelancers",
            TemplateKind::DeniedOffer => "deniedOffer",
            TemplateKind::JobCancelled => "jobCancelled",
            TemplateKind::JobPostponed => "jobPostponed",
            TemplateKind::ContactInfoRequested => "contactInfoRequested",
            TemplateKind::ContactInfoApproved => "contactInfoApproved",
            TemplateKind::ContactInfoDenied => "contactInfoDenied",
            TemplateKind::EmployerSignature => "employerSignature",
            TemplateKind::FreelancerSignature => "freelancerSignature",
            TemplateKind::CompanyInvite => "companyInvite",
            TemplateKind::ReviewRequested => "reviewRequested",
            TemplateKind::NewFreelancerContract => "newFreelancerContract",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Is,
    En,
}

impl Default for Locale {
    fn default() -> Self {
        Locale::Is
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateButton {
    pub label: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateContent {
    pub title: String,
    pub paragraphs: Vec<String>,
    #[serde(default)]
    pub buttons: Vec<TemplateButton>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedContent {
    pub is: TemplateContent,
    pub en: TemplateContent,
}

impl LocalizedContent {
    pub fn for_locale(&self, locale: Locale) -> &TemplateContent {
        match locale {
            Locale::Is => &self.is,
            Locale::En => &self.en,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    pub name: String,
    pub description: String,
    pub content: LocalizedContent,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailTemplateDoc {
    name: String,
    description: String,
    content: LocalizedContent,
    updated_at: Stamp,
}

/// Values substituted into template placeholders.
#[derive(Debug, Clone, Default)]
pub struct DynamicData {
    pub user_name: Option<String>,
    pub company_name: Option<String>,
    pub job_name: Option<String>,
}

impl DynamicData {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            user_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Substitutes `{userName}`, `{companyName}` and `{jobName}`; placeholders
/// without a value are left in place so a missing substitution is visible
/// in the delivered text rather than silently blanked.
pub fn render(text: &str, data: &DynamicData) -> String {
    let mut out = text.to_string();
    if let Some(name) = &data.user_name {
        out = out.replace("{userName}", name);
    }
    if let Some(name) = &data.company_name {
        out = out.replace("{companyName}", name);
    }
    if let Some(name) = &data.job_name {
        out = out.replace("{jobName}", name);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReceipt {
    pub channel: Channel,
    pub recipient: String,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryReceipt {
    pub fn delivered(channel: Channel, recipient: impl Into<String>) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
            delivered: true,
            error: None,
        }
    }

    pub fn failed(channel: Channel, recipient: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
            delivered: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregated fan-out outcome; failures ride along instead of aborting.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub receipts: Vec<DeliveryReceipt>,
}

impl BatchReport {
    pub fn push(&mut self, receipt: DeliveryReceipt) {
        if receipt.delivered {
            self.delivered += 1;
        } else {
            self.failed += 1;
        }
        self.receipts.push(receipt);
    }
}

/// Delivery seam for the hosted email/SMS provider.
#[async_trait]
pub trait AlertMessenger: Send + Sync {
    async fn send(
        &self,
        kind: TemplateKind,
        locale: Locale,
        recipient: &str,
        data: &DynamicData,
    ) -> DeliveryReceipt;
}

/// Default messenger for the dev server: logs the delivery and reports it
/// as sent.
#[derive(Debug, Default)]
pub struct TracingMessenger;

#[async_trait]
impl AlertMessenger for TracingMessenger {
    async fn send(
        &self,
        kind: TemplateKind,
        locale: Locale,
        recipient: &str,
        data: &DynamicData,
    ) -> DeliveryReceipt {
        info!(
            template = kind.doc_id(),
            locale = ?locale,
            recipient,
            user = data.user_name.as_deref().unwrap_or(""),
            "alert delivered"
        );
        DeliveryReceipt::delivered(Channel::Email, recipient)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("no template stored for {0}")]
    Missing(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Template documents under `emails/{kind}`.
pub struct TemplateLibrary<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> TemplateLibrary<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn collection() -> CollectionPath {
        CollectionPath::new("emails")
    }

    pub async fn upsert(&self, kind: TemplateKind, template: &EmailTemplate) -> Result<(), TemplateError> {
        let doc = EmailTemplateDoc {
            name: template.name.clone(),
            description: template.description.clone(),
            content: template.content.clone(),
            updated_at: Stamp::from(template.updated_at),
        };
        let path = Self::collection().doc(kind.doc_id());
        self.store.set(&path, encode(&doc)?).await?;
        Ok(())
    }

    pub async fn get(&self, kind: TemplateKind) -> Result<EmailTemplate, TemplateError> {
        let path = Self::collection().doc(kind.doc_id());
        let doc = self
            .store
            .get(&path)
            .await?
            .ok_or(TemplateError::Missing(kind.doc_id()))?;
        let doc = decode::<EmailTemplateDoc>(&doc)?;
        Ok(EmailTemplate {
            name: doc.name,
            description: doc.description,
            content: doc.content,
            updated_at: doc.updated_at.into(),
        })
    }

    /// Localized content with placeholders substituted.
    pub async fn render_for(
        &self,
        kind: TemplateKind,
        locale: Locale,
        data: &DynamicData,
    ) -> Result<TemplateContent, TemplateError> {
        let template = self.get(kind).await?;
        let content = template.content.for_locale(locale);
        Ok(TemplateContent {
            title: render(&content.title, data),
            paragraphs: content.paragraphs.iter().map(|p| render(p, data)).collect(),
            buttons: content.buttons.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn invite_template() -> EmailTemplate {
        EmailTemplate {
            name: "Company invite".to_string(),
            description: "Sent when an employer invites a colleague".to_string(),
            content: LocalizedContent {
                is: TemplateContent {
                    title: "{companyName} býður þér aðgang".to_string(),
                    paragraphs: vec!["{userName}, þér hefur verið boðið.".to_string()],
                    buttons: Vec::new(),
                },
                en: TemplateContent {
                    title: "{companyName} invited you".to_string(),
                    paragraphs: vec!["{userName}, you have been invited to join.".to_string()],
                    buttons: Vec::new(),
                },
            },
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn render_substitutes_known_placeholders() {
        let data = DynamicData {
            user_name: Some("Nina".to_string()),
            company_name: Some("Byggir ehf".to_string()),
            job_name: None,
        };
        let text = render("{userName} @ {companyName} on {jobName}", &data);
        assert_eq!(text, "Nina @ Byggir ehf on {jobName}");
    }

    #[tokio::test]
    async fn render_for_picks_locale_and_substitutes() {
        let library = TemplateLibrary::new(Arc::new(MemoryStore::new()));
        library
            .upsert(TemplateKind::CompanyInvite, &invite_template())
            .await
            .expect("upsert");

        let data = DynamicData {
            user_name: Some("Nina".to_string()),
            company_name: Some("Byggir ehf".to_string()),
            job_name: None,
        };
        let content = library
            .render_for(TemplateKind::CompanyInvite, Locale::En, &data)
            .await
            .expect("render");
        assert_eq!(content.title, "Byggir ehf invited you");
        assert_eq!(content.paragraphs[0], "Nina, you have been invited to join.");
    }

    #[tokio::test]
    async fn missing_template_is_an_error() {
        let library: TemplateLibrary<MemoryStore> = TemplateLibrary::new(Arc::new(MemoryStore::new()));
        let err = library.get(TemplateKind::JobDenied).await.expect_err("absent");
        assert!(matches!(err, TemplateError::Missing("jobDenied")));
    }

    #[tokio::test]
    async fn batch_report_counts_both_outcomes() {
        let mut report = BatchReport::default();
        report.push(DeliveryReceipt::delivered(Channel::Sms, "+354 555 0101"));
        report.push(DeliveryReceipt::failed(Channel::Sms, "+354 555 0102", "number rejected"));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.receipts.len(), 2);
    }
}
