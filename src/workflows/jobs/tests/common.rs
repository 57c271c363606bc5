use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::store::{encode, CollectionPath, DocumentStore, MemoryStore};
use crate::workflows::alerts::{
    AlertMessenger, Channel, DeliveryReceipt, DynamicData, Locale, TemplateKind,
};
use crate::workflows::companies::docs::{CompanyDoc, CompanyEmployeeDoc};
use crate::workflows::companies::domain::{Company, CompanyId, CompanyRole, Logo};
use crate::workflows::error_reports::ErrorReporter;
use crate::workflows::jobs::domain::{JobId, JobStatus, JobType, Offer};
use crate::workflows::jobs::lifecycle::{JobForm, JobInfoForm, JobLifecycle};
use crate::workflows::jobs::relations::RelationResolver;
use crate::workflows::jobs::repository::JobRepository;
use crate::workflows::jobs::router::{jobs_router, JobsApi};
use crate::workflows::jobs::selection::SelectionManager;
use crate::workflows::jobs::signatures::SignatureCoordinator;
use crate::workflows::notifications::Notifier;
use crate::workflows::tags::TagId;
use crate::workflows::users::docs::UserDoc;
use crate::workflows::users::domain::{
    Employer, Freelancer, FreelancerStatus, Gender, General, Phone, Photo, Settings, User, UserId,
};

pub(super) const COMPANY: &str = "byggir-ehf";
pub(super) const CREATOR: &str = "inga";
pub(super) const FREELANCERS: [&str; 3] = ["nina", "oskar", "petra"];

pub(super) struct Fixture {
    pub store: Arc<MemoryStore>,
    pub lifecycle: Arc<JobLifecycle<MemoryStore, RecordingMessenger>>,
    pub signatures: Arc<SignatureCoordinator<MemoryStore, RecordingMessenger>>,
    pub selection: Arc<SelectionManager<MemoryStore, RecordingMessenger>>,
    pub relations: Arc<RelationResolver<MemoryStore>>,
    pub notifier: Arc<Notifier<MemoryStore>>,
    pub messenger: Arc<RecordingMessenger>,
}

pub(super) async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    seed(&store).await;

    let messenger = Arc::new(RecordingMessenger::default());
    let notifier = Arc::new(Notifier::new(Arc::clone(&store), "Gigboard"));
    let repo = JobRepository::new(Arc::clone(&store));
    let lifecycle = Arc::new(JobLifecycle::new(
        repo.clone(),
        Arc::clone(&notifier),
        Arc::clone(&messenger),
    ));
    let signatures = Arc::new(SignatureCoordinator::new(
        repo.clone(),
        Arc::clone(&notifier),
        Arc::clone(&messenger),
    ));
    let selection = Arc::new(SelectionManager::new(
        repo.clone(),
        Arc::clone(&notifier),
        Arc::clone(&messenger),
        Arc::clone(&lifecycle),
    ));
    let relations = Arc::new(RelationResolver::new(repo));
    Fixture {
        store,
        lifecycle,
        signatures,
        selection,
        relations,
        notifier,
        messenger,
    }
}

pub(super) fn router(fixture: &Fixture) -> axum::Router {
    jobs_router(JobsApi {
        lifecycle: Arc::clone(&fixture.lifecycle),
        signatures: Arc::clone(&fixture.signatures),
        selection: Arc::clone(&fixture.selection),
        relations: Arc::clone(&fixture.relations),
        reporter: ErrorReporter::new(Arc::clone(&fixture.store)),
    })
}

async fn seed(store: &Arc<MemoryStore>) {
    let company = Company {
        id: CompanyId(COMPANY.to_string()),
        name: "Byggir ehf".to_string(),
        ssn: "5501011230".to_string(),
        phone: Phone {
            number: "5551234".to_string(),
            country_code: "+354".to_string(),
        },
        address: Default::default(),
        website: "https://byggir.is".to_string(),
        size: 12,
        logo: Logo {
            url: "https://cdn.dæmi.is/byggir.png".to_string(),
        },
        invites: Vec::new(),
        jobs: Vec::new(),
        creator: UserId(CREATOR.to_string()),
        created_at: Utc::now(),
    };
    store
        .set(
            &CollectionPath::new("companies").doc(COMPANY),
            encode(&CompanyDoc::from_company(&company)).expect("encode company"),
        )
        .await
        .expect("seed company");
    store
        .set(
            &CollectionPath::new(format!("companies/{COMPANY}/employees")).doc(CREATOR),
            encode(&CompanyEmployeeDoc {
                position: "Framkvæmdastjóri".to_string(),
                role: CompanyRole::Admin,
            })
            .expect("encode employee"),
        )
        .await
        .expect("seed membership");

    seed_user(store, &employer_user(CREATOR, "Inga Dögg")).await;
    for (id, name) in FREELANCERS.iter().zip(["Nína Rós", "Óskar Már", "Petra Líf"]) {
        seed_user(store, &freelancer_user(id, name)).await;
    }
}

pub(super) async fn seed_user(store: &Arc<MemoryStore>, user: &User) {
    store
        .set(
            &CollectionPath::new("users").doc(user.id.0.clone()),
            encode(&UserDoc::from_user(user)).expect("encode user"),
        )
        .await
        .expect("seed user");
}

pub(super) fn employer_user(id: &str, name: &str) -> User {
    User {
        id: UserId(id.to_string()),
        general: general(id, name),
        settings: Some(Settings::default()),
        freelancer: None,
        employer: Some(Employer {
            position: "Framkvæmdastjóri".to_string(),
            active_company: Some(CompanyId(COMPANY.to_string())),
            companies: vec![CompanyId(COMPANY.to_string())],
        }),
    }
}

pub(super) fn freelancer_user(id: &str, name: &str) -> User {
    User {
        id: UserId(id.to_string()),
        general: general(id, name),
        settings: Some(Settings::default()),
        freelancer: Some(Freelancer {
            status: FreelancerStatus::Approved,
            gender: Gender::Other,
            photo: Photo::default(),
            job_titles: vec![TagId("web-developer".to_string())],
            skills: Vec::new(),
            languages: Vec::new(),
            unapproved_tags: None,
            experience: Vec::new(),
            education: Vec::new(),
            jobs: Vec::new(),
            contract: None,
            selected_reviews: Vec::new(),
            address: None,
            own_business: None,
            social: None,
        }),
        employer: None,
    }
}

fn general(id: &str, name: &str) -> General {
    General {
        name: name.to_string(),
        email: format!("{id}@dæmi.is"),
        ssn: "0101902120".to_string(),
        phone: Phone {
            number: "5559876".to_string(),
            country_code: "+354".to_string(),
        },
        photo: None,
        locale: Locale::Is,
        created_at: Utc::now(),
        updated_at: None,
    }
}

pub(super) fn job_form() -> JobForm {
    JobForm {
        name: "Vefsíðugerð".to_string(),
        description: "Ný vefsíða fyrir ferðaþjónustu".to_string(),
        kind: JobType::Timeframe,
        job_titles: vec![TagId("web-developer".to_string())],
        skills: vec![TagId("design".to_string())],
        languages: Vec::new(),
        unapproved_tags: None,
        info: JobInfoForm {
            start: Some("01-09-2025".to_string()),
            end: Some("30-09-2025".to_string()),
            percentage: None,
            num_of_hours: Some(120),
            deadline_days: Some(2),
        },
    }
}

pub(super) fn offer(hourly: &str) -> Offer {
    Offer {
        hourly_rate: hourly.to_string(),
        fixed_rate: String::new(),
        message: "Get hafið strax".to_string(),
        date: None,
        accepted_rate: None,
    }
}

/// A freshly created job, still in review.
pub(super) async fn created_job(fixture: &Fixture) -> JobId {
    fixture
        .lifecycle
        .create(
            job_form(),
            &CompanyId(COMPANY.to_string()),
            &UserId(CREATOR.to_string()),
        )
        .await
        .expect("create job")
        .id
}

/// Approved job with all three seeded freelancers applied.
pub(super) async fn job_with_applicants(fixture: &Fixture) -> JobId {
    let id = created_job(fixture).await;
    fixture
        .lifecycle
        .transition(&id, JobStatus::Approved, None)
        .await
        .expect("approve");
    for user in FREELANCERS {
        fixture
            .selection
            .apply(&id, &UserId(user.to_string()), offer("4.500 kr"))
            .await
            .expect("apply");
    }
    id
}

/// Job advanced to `requiresSignature` with the first freelancer chosen.
pub(super) async fn job_awaiting_signatures(fixture: &Fixture) -> JobId {
    let id = job_with_applicants(fixture).await;
    let shortlist = FREELANCERS
        .iter()
        .map(|user| UserId(user.to_string()))
        .collect();
    fixture
        .selection
        .update_selected_applicants(&id, shortlist)
        .await
        .expect("shortlist");
    fixture
        .selection
        .submit_shortlist(&id)
        .await
        .expect("submit shortlist");
    fixture
        .selection
        .select_freelancer(
            &id,
            &UserId(FREELANCERS[0].to_string()),
            crate::workflows::jobs::selection::SelectionOutcome {
                status: Some(JobStatus::RequiresSignature),
                document_id: Some("doc-1".to_string()),
                document_storage_url: Some("https://docs.dæmi.is/doc-1.pdf".to_string()),
                not_selected_reason: None,
            },
        )
        .await
        .expect("select freelancer");
    id
}

#[derive(Default)]
pub(super) struct RecordingMessenger {
    sent: Mutex<Vec<(TemplateKind, String)>>,
}

impl RecordingMessenger {
    pub(super) fn sent(&self) -> Vec<(TemplateKind, String)> {
        self.sent.lock().expect("messenger mutex poisoned").clone()
    }

    pub(super) fn sent_to(&self, recipient: &str) -> Vec<TemplateKind> {
        self.sent()
            .into_iter()
            .filter(|(_, email)| email == recipient)
            .map(|(kind, _)| kind)
            .collect()
    }
}

#[async_trait]
impl AlertMessenger for RecordingMessenger {
    async fn send(
        &self,
        kind: TemplateKind,
        _locale: Locale,
        recipient: &str,
        _data: &DynamicData,
    ) -> DeliveryReceipt {
        self.sent
            .lock()
            .expect("messenger mutex poisoned")
            .push((kind, recipient.to_string()));
        DeliveryReceipt::delivered(Channel::Email, recipient)
    }
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
