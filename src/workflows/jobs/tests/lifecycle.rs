use super::common::*;
use crate::store::DocumentStore;
use crate::workflows::alerts::TemplateKind;
use crate::workflows::companies::domain::CompanyId;
use crate::workflows::jobs::domain::{JobStatus, JobType};
use crate::workflows::jobs::lifecycle::{InfoUpdate, LogDraft};
use crate::workflows::jobs::repository::{JobError, JobRepository};
use crate::workflows::jobs::selection::SelectionOutcome;
use crate::workflows::notifications::NotificationKind;
use crate::workflows::users::domain::UserId;

#[test]
fn forward_chain_is_the_only_way_up() {
    let chain = [
        JobStatus::InReview,
        JobStatus::Approved,
        JobStatus::ChooseFreelancers,
        JobStatus::RequiresSignature,
        JobStatus::InProgress,
        JobStatus::ReadyForReview,
        JobStatus::Completed,
    ];
    for pair in chain.windows(2) {
        assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
    }
    // skipping a step is never legal
    assert!(!JobStatus::InReview.can_advance_to(JobStatus::ChooseFreelancers));
    assert!(!JobStatus::Approved.can_advance_to(JobStatus::InProgress));
    assert!(!JobStatus::InProgress.can_advance_to(JobStatus::Completed));
    // nor is going backwards
    assert!(!JobStatus::Approved.can_advance_to(JobStatus::InReview));
    assert!(!JobStatus::InProgress.can_advance_to(JobStatus::RequiresSignature));
}

#[test]
fn denial_only_leaves_review() {
    assert!(JobStatus::InReview.can_advance_to(JobStatus::Denied));
    for status in [
        JobStatus::Approved,
        JobStatus::ChooseFreelancers,
        JobStatus::RequiresSignature,
        JobStatus::InProgress,
        JobStatus::ReadyForReview,
    ] {
        assert!(!status.can_advance_to(JobStatus::Denied), "{status}");
    }
}

#[test]
fn cancel_and_postpone_leave_any_live_state() {
    let live = [
        JobStatus::InReview,
        JobStatus::Approved,
        JobStatus::ChooseFreelancers,
        JobStatus::RequiresSignature,
        JobStatus::InProgress,
        JobStatus::ReadyForReview,
    ];
    for status in live {
        assert!(status.can_advance_to(JobStatus::Cancelled), "{status}");
        assert!(status.can_advance_to(JobStatus::Postponed), "{status}");
    }
}

#[test]
fn terminal_states_absorb() {
    for status in [
        JobStatus::Completed,
        JobStatus::Denied,
        JobStatus::Cancelled,
        JobStatus::Postponed,
    ] {
        assert!(status.is_terminal());
        for target in [
            JobStatus::Approved,
            JobStatus::InProgress,
            JobStatus::Cancelled,
            JobStatus::Postponed,
        ] {
            assert!(!status.can_advance_to(target), "{status} -> {target}");
        }
    }
}

#[tokio::test]
async fn new_job_opens_in_review_with_its_creation_entry() {
    let fx = fixture().await;
    let job = fx
        .lifecycle
        .create(
            job_form(),
            &CompanyId(COMPANY.to_string()),
            &UserId(CREATOR.to_string()),
        )
        .await
        .expect("create");

    assert_eq!(job.status, JobStatus::InReview);
    assert_eq!(job.logs.len(), 1);
    assert_eq!(job.logs[0].status, JobStatus::InReview);
    assert_eq!(job.logs[0].title, "Verkefni stofnað");
    assert!(job.job_info.deadline.is_some());

    // the company document points back at the new job
    let company = fx
        .store
        .get(&crate::store::CollectionPath::new("companies").doc(COMPANY))
        .await
        .expect("get company")
        .expect("company present");
    let refs = company.data["jobs"].as_array().expect("jobs array");
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0], serde_json::json!(format!("jobs/{}", job.id)));
}

#[tokio::test]
async fn timeframe_jobs_keep_hours_and_drop_percentage() {
    let fx = fixture().await;
    let mut form = job_form();
    form.info.percentage = Some(50);
    let job = fx
        .lifecycle
        .create(
            form,
            &CompanyId(COMPANY.to_string()),
            &UserId(CREATOR.to_string()),
        )
        .await
        .expect("create");
    assert_eq!(job.kind, JobType::Timeframe);
    assert_eq!(job.job_info.percentage, None);
    assert_eq!(job.job_info.num_of_hours, Some(120));
}

#[tokio::test]
async fn create_requires_an_existing_company() {
    let fx = fixture().await;
    let missing = CompanyId("horfin-ehf".to_string());
    match fx
        .lifecycle
        .create(job_form(), &missing, &UserId(CREATOR.to_string()))
        .await
    {
        Err(JobError::CompanyNotFound(company)) => assert_eq!(company, missing),
        other => panic!("expected missing company, got {other:?}"),
    }
}

#[tokio::test]
async fn create_requires_company_membership() {
    let fx = fixture().await;
    match fx
        .lifecycle
        .create(
            job_form(),
            &CompanyId(COMPANY.to_string()),
            &UserId(FREELANCERS[0].to_string()),
        )
        .await
    {
        Err(JobError::NotCompanyMember { user, .. }) => {
            assert_eq!(user, UserId(FREELANCERS[0].to_string()));
        }
        other => panic!("expected membership error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_rejects_malformed_dates() {
    let fx = fixture().await;
    let mut form = job_form();
    form.info.start = Some("2025-09-01".to_string());
    match fx
        .lifecycle
        .create(
            form,
            &CompanyId(COMPANY.to_string()),
            &UserId(CREATOR.to_string()),
        )
        .await
    {
        Err(JobError::InvalidSchedule { field: "start", .. }) => {}
        other => panic!("expected schedule error, got {other:?}"),
    }
}

#[tokio::test]
async fn illegal_transition_leaves_the_job_untouched() {
    let fx = fixture().await;
    let id = created_job(&fx).await;

    match fx
        .lifecycle
        .transition(&id, JobStatus::InProgress, None)
        .await
    {
        Err(JobError::IllegalTransition { from, to, .. }) => {
            assert_eq!(from, JobStatus::InReview);
            assert_eq!(to, JobStatus::InProgress);
        }
        other => panic!("expected illegal transition, got {other:?}"),
    }

    // neither the status nor the history moved
    let repo = JobRepository::new(std::sync::Arc::clone(&fx.store));
    let (job, _) = repo.job(&id).await.expect("job");
    assert_eq!(job.status, JobStatus::InReview);
    assert_eq!(job.logs.len(), 1);
}

#[tokio::test]
async fn shortlist_submission_requires_a_shortlist() {
    let fx = fixture().await;
    let id = created_job(&fx).await;
    fx.lifecycle
        .transition(&id, JobStatus::Approved, None)
        .await
        .expect("approve");

    match fx.selection.submit_shortlist(&id).await {
        Err(JobError::EmptyShortlist(job)) => assert_eq!(job, id),
        other => panic!("expected empty shortlist, got {other:?}"),
    }
}

#[tokio::test]
async fn hiring_funnel_appends_one_entry_per_milestone() {
    let fx = fixture().await;
    let repo = JobRepository::new(std::sync::Arc::clone(&fx.store));

    let id = created_job(&fx).await;
    let (job, _) = repo.job(&id).await.expect("job");
    assert_eq!((job.status, job.logs.len()), (JobStatus::InReview, 1));

    let job = fx
        .lifecycle
        .transition(&id, JobStatus::Approved, None)
        .await
        .expect("approve");
    assert_eq!((job.status, job.logs.len()), (JobStatus::Approved, 2));
    assert_eq!(job.last_log().expect("log").status, JobStatus::Approved);

    for user in FREELANCERS {
        fx.selection
            .apply(&id, &UserId(user.to_string()), offer("5.000"))
            .await
            .expect("apply");
    }
    fx.selection
        .update_selected_applicants(
            &id,
            FREELANCERS.iter().map(|user| UserId(user.to_string())).collect(),
        )
        .await
        .expect("shortlist");
    let job = fx.selection.submit_shortlist(&id).await.expect("submit");
    assert_eq!(
        (job.status, job.logs.len()),
        (JobStatus::ChooseFreelancers, 3)
    );
    assert_eq!(job.last_log().expect("log").title, "Giggarar valdir");

    let job = fx
        .selection
        .select_freelancer(
            &id,
            &UserId(FREELANCERS[0].to_string()),
            SelectionOutcome {
                status: Some(JobStatus::RequiresSignature),
                ..SelectionOutcome::default()
            },
        )
        .await
        .expect("select");
    assert_eq!(
        (job.status, job.logs.len()),
        (JobStatus::RequiresSignature, 4)
    );

    let job = fx
        .signatures
        .add_signature(
            &id,
            crate::workflows::jobs::domain::SignatureParty::Employer,
            &UserId(CREATOR.to_string()),
        )
        .await
        .expect("employer signs");
    assert_eq!(
        (job.status, job.logs.len()),
        (JobStatus::RequiresSignature, 5)
    );

    let job = fx
        .signatures
        .add_signature(
            &id,
            crate::workflows::jobs::domain::SignatureParty::Freelancer,
            &UserId(FREELANCERS[0].to_string()),
        )
        .await
        .expect("freelancer signs");
    assert_eq!((job.status, job.logs.len()), (JobStatus::InProgress, 6));

    let job = fx
        .lifecycle
        .transition(&id, JobStatus::ReadyForReview, None)
        .await
        .expect("ready");
    assert_eq!((job.status, job.logs.len()), (JobStatus::ReadyForReview, 7));

    let job = fx.lifecycle.finish(&id).await.expect("finish");
    assert_eq!((job.status, job.logs.len()), (JobStatus::Completed, 8));
    assert_eq!(job.last_log().expect("log").title, "Verkefni lokið");
    for (entry, expected) in job.logs.iter().zip([
        JobStatus::InReview,
        JobStatus::Approved,
        JobStatus::ChooseFreelancers,
        JobStatus::RequiresSignature,
        JobStatus::RequiresSignature,
        JobStatus::InProgress,
        JobStatus::ReadyForReview,
        JobStatus::Completed,
    ]) {
        assert_eq!(entry.status, expected);
    }
}

#[tokio::test]
async fn caller_log_overrides_the_canned_entry() {
    let fx = fixture().await;
    let id = created_job(&fx).await;
    let job = fx
        .lifecycle
        .transition(
            &id,
            JobStatus::Approved,
            Some(LogDraft {
                title: "Flýtimeðferð".to_string(),
                description: "Samþykkt handvirkt".to_string(),
            }),
        )
        .await
        .expect("approve");
    let last = job.last_log().expect("log");
    assert_eq!(last.title, "Flýtimeðferð");
    assert_eq!(last.status, JobStatus::Approved);
}

#[tokio::test]
async fn approval_and_denial_mail_the_creator() {
    let fx = fixture().await;
    let id = created_job(&fx).await;
    fx.lifecycle
        .transition(&id, JobStatus::Approved, None)
        .await
        .expect("approve");
    assert_eq!(
        fx.messenger.sent_to("inga@dæmi.is"),
        vec![TemplateKind::JobApproved]
    );

    let denied = created_job(&fx).await;
    fx.lifecycle
        .transition(&denied, JobStatus::Denied, None)
        .await
        .expect("deny");
    assert_eq!(
        fx.messenger.sent_to("inga@dæmi.is"),
        vec![TemplateKind::JobApproved, TemplateKind::JobDenied]
    );
}

#[tokio::test]
async fn shortlist_submission_fans_out_to_everyone_involved() {
    let fx = fixture().await;
    let id = job_with_applicants(&fx).await;
    fx.selection
        .update_selected_applicants(
            &id,
            FREELANCERS.iter().map(|user| UserId(user.to_string())).collect(),
        )
        .await
        .expect("shortlist");
    fx.selection.submit_shortlist(&id).await.expect("submit");

    // the creator gets an in-app notification from the platform itself
    let feed = fx
        .notifier
        .user_notifications(&UserId(CREATOR.to_string()))
        .await
        .expect("feed");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].kind, NotificationKind::ApplicantsSelected);
    assert!(feed[0].is_system);

    // every shortlisted freelancer gets the call-to-action mail
    for user in FREELANCERS {
        assert_eq!(
            fx.messenger.sent_to(&format!("{user}@dæmi.is")),
            vec![TemplateKind::ChooseFreelancers],
            "{user}"
        );
    }
}

#[tokio::test]
async fn cancellation_respects_the_mail_opt_out_postponement_does_not() {
    let fx = fixture().await;
    let id = job_with_applicants(&fx).await;

    let mut quiet = freelancer_user(FREELANCERS[1], "Óskar Már");
    quiet.settings.as_mut().expect("settings").cancelled_job_mail = false;
    seed_user(&fx.store, &quiet).await;

    fx.lifecycle
        .transition(&id, JobStatus::Cancelled, None)
        .await
        .expect("cancel");
    assert_eq!(
        fx.messenger.sent_to("nina@dæmi.is"),
        vec![TemplateKind::JobCancelled]
    );
    assert!(fx.messenger.sent_to("oskar@dæmi.is").is_empty());

    let second = job_with_applicants(&fx).await;
    fx.lifecycle
        .transition(&second, JobStatus::Postponed, None)
        .await
        .expect("postpone");
    // the postponement template ignores the cancelled-job setting
    assert_eq!(
        fx.messenger.sent_to("oskar@dæmi.is"),
        vec![TemplateKind::JobPostponed]
    );
}

#[tokio::test]
async fn terms_agreement_logs_at_the_current_status() {
    let fx = fixture().await;
    let id = created_job(&fx).await;
    fx.lifecycle
        .transition(&id, JobStatus::Approved, None)
        .await
        .expect("approve");

    let job = fx.lifecycle.agree_terms(&id).await.expect("terms");
    assert!(job.terms.is_some());
    assert_eq!(job.status, JobStatus::Approved);
    let last = job.last_log().expect("log");
    assert_eq!(last.title, "Skilmálar samþykktir");
    assert_eq!(last.status, JobStatus::Approved);
}

#[tokio::test]
async fn info_update_follows_the_effective_type() {
    let fx = fixture().await;
    let id = created_job(&fx).await;

    // switching a timeframe job to part-time clears hours and takes the
    // percentage
    let job = fx
        .lifecycle
        .update_info(
            &id,
            InfoUpdate {
                kind: Some(JobType::PartTime),
                percentage: Some(60),
                ..InfoUpdate::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(job.kind, JobType::PartTime);
    assert_eq!(job.job_info.percentage, Some(60));
    assert_eq!(job.job_info.num_of_hours, None);

    match fx
        .lifecycle
        .update_info(
            &id,
            InfoUpdate {
                end: Some("31/12/2025".to_string()),
                ..InfoUpdate::default()
            },
        )
        .await
    {
        Err(JobError::InvalidSchedule { field: "end", .. }) => {}
        other => panic!("expected schedule error, got {other:?}"),
    }
}

#[tokio::test]
async fn roster_replacement_keeps_signer_flags() {
    let fx = fixture().await;
    let id = created_job(&fx).await;
    let caller = UserId(CREATOR.to_string());
    let repo = JobRepository::new(std::sync::Arc::clone(&fx.store));

    fx.lifecycle
        .set_employees(&id, vec![caller.clone()], &caller)
        .await
        .expect("roster");
    fx.lifecycle
        .set_signer(&id, &caller, &caller)
        .await
        .expect("signer");

    // re-submitting the roster must not drop the designation
    fx.lifecycle
        .set_employees(&id, vec![caller.clone()], &caller)
        .await
        .expect("roster again");
    let roster = repo.employees(&id).await.expect("employees");
    assert_eq!(roster.len(), 1);
    assert!(roster[0].signer);

    match fx
        .lifecycle
        .set_signer(&id, &UserId(FREELANCERS[0].to_string()), &caller)
        .await
    {
        Err(JobError::NotAnEmployee { user, .. }) => {
            assert_eq!(user, UserId(FREELANCERS[0].to_string()));
        }
        other => panic!("expected roster error, got {other:?}"),
    }
}

#[tokio::test]
async fn removal_cascades_to_subcollections_and_the_owner() {
    let fx = fixture().await;
    let id = job_with_applicants(&fx).await;
    let caller = UserId(CREATOR.to_string());
    fx.lifecycle
        .set_employees(&id, vec![caller.clone()], &caller)
        .await
        .expect("roster");

    fx.lifecycle.remove(&id).await.expect("remove");

    let repo = JobRepository::new(std::sync::Arc::clone(&fx.store));
    match repo.job(&id).await {
        Err(JobError::NotFound(_)) => {}
        other => panic!("expected the job gone, got {other:?}"),
    }
    assert!(repo.applicants(&id).await.expect("applicants").is_empty());
    assert!(repo.employees(&id).await.expect("employees").is_empty());

    let company = fx
        .store
        .get(&crate::store::CollectionPath::new("companies").doc(COMPANY))
        .await
        .expect("get company")
        .expect("company present");
    let refs = company.data["jobs"].as_array().expect("jobs array");
    assert!(refs.iter().all(|entry| entry != &serde_json::json!(format!("jobs/{id}"))));
}
