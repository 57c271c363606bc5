//! Company registration, the invite flow and the employee roster,
//! exercised through the service facade.
//!
//! The interesting properties here are the cross-document ones: admin
//! membership appearing with the company, invites admitting exactly once,
//! and employee removal sweeping job rosters and the employer profile in
//! the same batch.

mod common {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use gigboard::storage::MemoryObjectStorage;
    use gigboard::store::MemoryStore;
    use gigboard::workflows::alerts::{
        AlertMessenger, Channel, DeliveryReceipt, DynamicData, Locale, TemplateKind,
    };
    use gigboard::workflows::companies::{
        CompanyForm, CompanyId, CompanyRole, CompanyService, RegistrationForm,
    };
    use gigboard::workflows::jobs::{
        JobForm, JobInfoForm, JobLifecycle, JobRepository, JobType,
    };
    use gigboard::workflows::notifications::Notifier;
    use gigboard::workflows::tags::TagId;
    use gigboard::workflows::users::{Address, Phone, UserId, UserService};

    pub(super) struct Fixture {
        pub(super) store: Arc<MemoryStore>,
        pub(super) storage: Arc<MemoryObjectStorage>,
        pub(super) messenger: Arc<RecordingMessenger>,
        pub(super) companies: CompanyService<MemoryStore, MemoryObjectStorage, RecordingMessenger>,
        pub(super) users: Arc<UserService<MemoryStore, MemoryObjectStorage>>,
        pub(super) lifecycle: Arc<JobLifecycle<MemoryStore, RecordingMessenger>>,
        pub(super) repo: JobRepository<MemoryStore>,
    }

    pub(super) fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(MemoryObjectStorage::new());
        let messenger = Arc::new(RecordingMessenger::default());
        let notifier = Arc::new(Notifier::new(Arc::clone(&store), "Gigboard"));
        let companies = CompanyService::new(
            Arc::clone(&store),
            Arc::clone(&storage),
            Arc::clone(&messenger),
        );
        let users = Arc::new(UserService::new(
            Arc::clone(&store),
            Arc::clone(&storage),
            Arc::clone(&notifier),
        ));
        let repo = JobRepository::new(Arc::clone(&store));
        let lifecycle = Arc::new(JobLifecycle::new(
            repo.clone(),
            notifier,
            Arc::clone(&messenger),
        ));
        Fixture {
            store,
            storage,
            messenger,
            companies,
            users,
            lifecycle,
            repo,
        }
    }

    pub(super) fn admin() -> UserId {
        UserId("inga".to_string())
    }

    pub(super) fn company_form(name: &str, ssn: &str) -> CompanyForm {
        CompanyForm {
            name: name.to_string(),
            ssn: ssn.to_string(),
            phone: Phone {
                number: "5551234".to_string(),
                country_code: "+354".to_string(),
            },
            address: Address {
                street: "Borgartún 20".to_string(),
                postal_code: "105".to_string(),
                city: "Reykjavík".to_string(),
            },
            website: "https://byggir.is".to_string(),
            size: 12,
            logo: None,
        }
    }

    /// Creator account plus a freshly registered company with them as
    /// admin.
    pub(super) async fn registered_company(fixture: &Fixture) -> CompanyId {
        fixture
            .users
            .create(admin(), "inga@dæmi.is")
            .await
            .expect("creator account");
        fixture
            .companies
            .create(company_form("Byggir ehf", "5501011230"), &admin(), "Framkvæmdastjóri")
            .await
            .expect("company")
            .id
    }

    /// Invites `nina` and registers her through the token; returns her id.
    pub(super) async fn invited_employee(fixture: &Fixture, company: &CompanyId) -> UserId {
        let nina = UserId("nina".to_string());
        let invite = fixture
            .companies
            .add_invite(company, "nina@dæmi.is", CompanyRole::Employee, &admin())
            .await
            .expect("invite");
        fixture
            .users
            .create(nina.clone(), "nina@dæmi.is")
            .await
            .expect("invited account");
        fixture
            .companies
            .register_via_invite(
                company,
                &invite.token,
                &nina,
                RegistrationForm {
                    name: "Nína Rós".to_string(),
                    phone: Phone {
                        number: "5559876".to_string(),
                        country_code: "+354".to_string(),
                    },
                    position: "Hönnuður".to_string(),
                },
            )
            .await
            .expect("registration");
        nina
    }

    pub(super) fn job_form() -> JobForm {
        JobForm {
            name: "Vefsíðugerð".to_string(),
            description: "Ný vefsíða fyrir ferðaþjónustu".to_string(),
            kind: JobType::Timeframe,
            job_titles: vec![TagId("web-developer".to_string())],
            skills: Vec::new(),
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

    #[derive(Default)]
    pub(super) struct RecordingMessenger {
        sent: Mutex<Vec<(TemplateKind, String)>>,
    }

    impl RecordingMessenger {
        pub(super) fn sent_to(&self, recipient: &str) -> Vec<TemplateKind> {
            self.sent
                .lock()
                .expect("messenger mutex poisoned")
                .iter()
                .filter(|(_, email)| email == recipient)
                .map(|(kind, _)| *kind)
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
}

mod registration {
    use gigboard::workflows::companies::{CompanyError, CompanyRole, LogoUpload};
    use gigboard::workflows::users::UserId;

    use super::common::*;

    #[tokio::test]
    async fn registering_writes_the_membership_and_the_employer_profile() {
        let fixture = fixture();
        fixture
            .users
            .create(admin(), "inga@dæmi.is")
            .await
            .expect("creator account");

        let mut form = company_form("Byggir ehf", "5501011230");
        form.logo = Some(LogoUpload {
            file_name: "byggir.png".to_string(),
            bytes: vec![1, 2, 3],
        });
        let company = fixture
            .companies
            .create(form, &admin(), "Framkvæmdastjóri")
            .await
            .expect("company");

        assert_eq!(company.name, "Byggir ehf");
        assert_eq!(company.creator, admin());
        assert!(fixture.storage.contains(&company.logo.url));

        let role = fixture
            .companies
            .member_role(&company.id, &admin())
            .await
            .expect("membership");
        assert_eq!(role, CompanyRole::Admin);

        let employer = fixture.users.employer(&admin()).await.expect("employer view");
        assert_eq!(employer.position, "Framkvæmdastjóri");
        assert_eq!(
            employer.company.as_ref().map(|company| company.name.as_str()),
            Some("Byggir ehf")
        );
        assert_eq!(employer.companies.len(), 1);
    }

    #[tokio::test]
    async fn a_national_id_registers_only_one_company() {
        let fixture = fixture();
        registered_company(&fixture).await;

        let err = fixture
            .companies
            .create(company_form("Byggir aftur ehf", "5501011230"), &admin(), "Eigandi")
            .await
            .expect_err("duplicate ssn");
        match err {
            CompanyError::DuplicateSsn(ssn) => assert_eq!(ssn, "5501011230"),
            other => panic!("expected duplicate ssn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn the_creator_must_hold_an_account() {
        let fixture = fixture();
        let err = fixture
            .companies
            .create(
                company_form("Byggir ehf", "5501011230"),
                &UserId("ghost".to_string()),
                "Framkvæmdastjóri",
            )
            .await
            .expect_err("missing creator");
        assert!(matches!(err, CompanyError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn updates_are_admin_only_and_replace_the_logo() {
        let fixture = fixture();
        let company_id = registered_company(&fixture).await;

        let mut form = company_form("Byggir ehf", "5501011230");
        form.logo = Some(LogoUpload {
            file_name: "byggir.png".to_string(),
            bytes: vec![1, 2, 3],
        });
        let company = fixture
            .companies
            .update(&company_id, form, &admin())
            .await
            .expect("first logo");
        let old_logo = company.logo.url.clone();
        assert!(fixture.storage.contains(&old_logo));

        let mut form = company_form("Byggir og synir ehf", "5501011230");
        form.logo = Some(LogoUpload {
            file_name: "byggir-2.png".to_string(),
            bytes: vec![4, 5, 6],
        });
        let company = fixture
            .companies
            .update(&company_id, form, &admin())
            .await
            .expect("replacement logo");
        assert_eq!(company.name, "Byggir og synir ehf");
        assert!(fixture.storage.contains(&company.logo.url));
        assert!(!fixture.storage.contains(&old_logo));

        let outsider = UserId("oskar".to_string());
        fixture
            .users
            .create(outsider.clone(), "oskar@dæmi.is")
            .await
            .expect("outsider account");
        let err = fixture
            .companies
            .update(&company_id, company_form("Byggir ehf", "5501011230"), &outsider)
            .await
            .expect_err("outsider update");
        assert!(matches!(err, CompanyError::NotAMember { .. }));
    }
}

mod invites {
    use gigboard::workflows::companies::{CompanyError, CompanyRole, RegistrationForm};
    use gigboard::workflows::alerts::TemplateKind;
    use gigboard::workflows::users::{Phone, UserId};

    use super::common::*;

    #[tokio::test]
    async fn an_invite_admits_exactly_once() {
        let fixture = fixture();
        let company_id = registered_company(&fixture).await;

        let invite = fixture
            .companies
            .add_invite(&company_id, "nina@dæmi.is", CompanyRole::Employee, &admin())
            .await
            .expect("invite");
        assert_eq!(invite.token.len(), 24);
        assert_eq!(invite.role, CompanyRole::Employee);
        assert!(fixture
            .messenger
            .sent_to("nina@dæmi.is")
            .contains(&TemplateKind::CompanyInvite));

        let nina = UserId("nina".to_string());
        fixture
            .users
            .create(nina.clone(), "nina@dæmi.is")
            .await
            .expect("invited account");
        let form = RegistrationForm {
            name: "Nína Rós".to_string(),
            phone: Phone {
                number: "5559876".to_string(),
                country_code: "+354".to_string(),
            },
            position: "Hönnuður".to_string(),
        };
        let employee = fixture
            .companies
            .register_via_invite(&company_id, &invite.token, &nina, form.clone())
            .await
            .expect("registration");
        assert_eq!(employee.role, CompanyRole::Employee);
        assert_eq!(employee.position, "Hönnuður");

        // the token was consumed with the registration
        let company = fixture.companies.company(&company_id).await.expect("company");
        assert!(company.invites.is_empty());
        let err = fixture
            .companies
            .register_via_invite(&company_id, &invite.token, &nina, form)
            .await
            .expect_err("reused token");
        assert!(matches!(err, CompanyError::InviteNotFound { .. }));

        // the registration form landed on the account
        let account = fixture.users.user(&nina).await.expect("account");
        assert_eq!(account.general.name, "Nína Rós");
        let employer = fixture.users.employer(&nina).await.expect("employer view");
        assert_eq!(employer.position, "Hönnuður");
        assert_eq!(
            employer.company.as_ref().map(|company| company.name.as_str()),
            Some("Byggir ehf")
        );
    }

    #[tokio::test]
    async fn only_admins_manage_invites() {
        let fixture = fixture();
        let company_id = registered_company(&fixture).await;
        let nina = invited_employee(&fixture, &company_id).await;

        let err = fixture
            .companies
            .add_invite(&company_id, "petra@dæmi.is", CompanyRole::Employee, &nina)
            .await
            .expect_err("employee invites");
        assert!(matches!(err, CompanyError::AdminRequired { .. }));

        let outsider = UserId("oskar".to_string());
        fixture
            .users
            .create(outsider.clone(), "oskar@dæmi.is")
            .await
            .expect("outsider account");
        let err = fixture
            .companies
            .add_invite(&company_id, "petra@dæmi.is", CompanyRole::Employee, &outsider)
            .await
            .expect_err("outsider invites");
        assert!(matches!(err, CompanyError::NotAMember { .. }));

        let err = fixture
            .companies
            .remove_invite(&company_id, "no-such-token", &admin())
            .await
            .expect_err("unknown token");
        assert!(matches!(err, CompanyError::InviteNotFound { .. }));
    }
}

mod roster {
    use gigboard::workflows::companies::CompanyError;

    use super::common::*;

    #[tokio::test]
    async fn removing_an_employee_cleans_every_trace() {
        let fixture = fixture();
        let company_id = registered_company(&fixture).await;
        let nina = invited_employee(&fixture, &company_id).await;

        let job = fixture
            .lifecycle
            .create(job_form(), &company_id, &admin())
            .await
            .expect("job");
        fixture
            .lifecycle
            .set_employees(&job.id, vec![admin(), nina.clone()], &admin())
            .await
            .expect("roster");
        assert_eq!(fixture.repo.employees(&job.id).await.expect("roster").len(), 2);

        fixture
            .companies
            .remove_employee(&company_id, &nina, &admin())
            .await
            .expect("removal");

        let err = fixture
            .companies
            .member_role(&company_id, &nina)
            .await
            .expect_err("membership gone");
        assert!(matches!(err, CompanyError::NotAMember { .. }));

        let roster = fixture.repo.employees(&job.id).await.expect("roster");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, admin());

        let employer = fixture.users.employer(&nina).await.expect("employer view");
        assert!(employer.company.is_none());
        assert!(employer.companies.is_empty());
    }

    #[tokio::test]
    async fn removal_is_admin_only() {
        let fixture = fixture();
        let company_id = registered_company(&fixture).await;
        let nina = invited_employee(&fixture, &company_id).await;

        let err = fixture
            .companies
            .remove_employee(&company_id, &nina, &nina)
            .await
            .expect_err("employee removes");
        assert!(matches!(err, CompanyError::AdminRequired { .. }));
    }
}

mod joins {
    use gigboard::store::{CollectionPath, DocumentStore};
    use gigboard::workflows::users::UserId;

    use super::common::*;

    #[tokio::test]
    async fn the_employee_join_tolerates_missing_accounts() {
        let fixture = fixture();
        let company_id = registered_company(&fixture).await;
        let nina = invited_employee(&fixture, &company_id).await;

        fixture
            .store
            .delete(&CollectionPath::new("users").doc(nina.0.clone()))
            .await
            .expect("drop account");

        let joined = fixture
            .companies
            .company_with_employees(&company_id)
            .await
            .expect("join");
        assert_eq!(joined.employees.len(), 2);

        let present = joined
            .employees
            .iter()
            .find(|employee| employee.user == admin())
            .expect("admin row");
        assert_eq!(present.email, "inga@dæmi.is");

        let orphaned = joined
            .employees
            .iter()
            .find(|employee| employee.user == nina)
            .expect("orphaned row");
        assert_eq!(orphaned.name, "");
        assert_eq!(orphaned.email, "");
        assert_eq!(orphaned.position, "Hönnuður");
    }

    #[tokio::test]
    async fn the_creator_overview_isolates_failures() {
        let fixture = fixture();
        let first = registered_company(&fixture).await;

        let oskar = UserId("oskar".to_string());
        fixture
            .users
            .create(oskar.clone(), "oskar@dæmi.is")
            .await
            .expect("second creator");
        let second = fixture
            .companies
            .create(company_form("Verk og vit ehf", "6802012340"), &oskar, "Eigandi")
            .await
            .expect("second company")
            .id;
        fixture
            .store
            .delete(&CollectionPath::new("users").doc(oskar.0.clone()))
            .await
            .expect("drop creator");

        let batch = fixture
            .companies
            .companies_with_creators()
            .await
            .expect("overview");
        assert_eq!(batch.companies.len(), 1);
        assert_eq!(batch.companies[0].company.id, first);
        assert_eq!(batch.companies[0].creator_email, "inga@dæmi.is");
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].company, second);
        assert!(batch.failed[0].reason.contains("not found"));
    }
}
