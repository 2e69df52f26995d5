mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{drain, healthy_orchestrator, ids, idle_orchestrator, Call, ARCHIVE_BYTES, IMAGE_BYTES};
use flux_core::generation::{GenerationParams, GenerationRequest, ModelVariant};
use flux_core::status::HealthState;
use flux_sync::mutation::{Confirmation, MutationError, ARCHIVE_FILE_NAME};
use flux_sync::notify::NotificationLevel;
use flux_sync::session::{ErrorCategory, Severity};
use flux_sync::submit::{SubmitError, GENERIC_REJECTION};

fn single(model: ModelVariant) -> GenerationRequest {
    GenerationRequest::Single {
        model,
        params: GenerationParams::for_model(model, "a lighthouse at dusk"),
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_is_accepted_without_waiting_for_output() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    let mut rx = orchestrator.subscribe();

    let accepted = orchestrator
        .submitter()
        .submit(single(ModelVariant::Schnell))
        .await
        .unwrap();

    assert_eq!(accepted.model, ModelVariant::Schnell);
    assert_eq!(accepted.records, 1);
    assert_eq!(gateway.count(|c| *c == Call::Generate(ModelVariant::Schnell)), 1);
    assert_eq!(gateway.count(|c| *c == Call::ListImages), 0);

    let notifications = drain(&mut rx);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Success);
}

#[tokio::test]
async fn second_submit_while_outstanding_is_rejected() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    let submitter = Arc::clone(orchestrator.submitter());
    let gate = gateway.gate("generate");

    assert!(!orchestrator.session().is_generating());

    let first = tokio::spawn({
        let submitter = Arc::clone(&submitter);
        async move { submitter.submit(single(ModelVariant::Dev)).await }
    });
    gateway.wait_for("generate", 1).await;
    assert!(orchestrator.session().is_generating());

    let second = submitter.submit(single(ModelVariant::Dev)).await;
    assert_matches!(second, Err(SubmitError::AlreadySubmitting));

    gate.notify_one();
    assert!(first.await.unwrap().is_ok());

    assert!(!orchestrator.session().is_generating());
    assert_eq!(gateway.count(|c| matches!(c, Call::Generate(_))), 1);
}

#[tokio::test]
async fn flag_is_lowered_after_rejection() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    gateway.fail("generate");
    gateway.reject_with(r#"{"detail":"Model flux1-dev is not installed"}"#);

    let result = orchestrator.submitter().submit(single(ModelVariant::Dev)).await;

    assert_matches!(result, Err(SubmitError::Rejected { ref message, .. }) => {
        assert_eq!(message, "Model flux1-dev is not installed");
    });
    assert!(!orchestrator.session().is_generating());

    let record = orchestrator.session().error(ErrorCategory::Generation).unwrap();
    assert_eq!(record.severity, Severity::Persistent);
    assert_eq!(record.message, "Model flux1-dev is not installed");
}

#[tokio::test]
async fn rejection_without_detail_uses_generic_message() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    gateway.time_out("generate");

    let result = orchestrator.submitter().submit(single(ModelVariant::Dev)).await;

    assert_matches!(result, Err(SubmitError::Rejected { ref message, .. }) => {
        assert_eq!(message, GENERIC_REJECTION);
    });
}

#[tokio::test]
async fn later_success_clears_generation_error() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    gateway.fail("generate");
    let _ = orchestrator.submitter().submit(single(ModelVariant::Dev)).await;
    assert!(orchestrator.session().error(ErrorCategory::Generation).is_some());

    gateway.succeed("generate");
    orchestrator.submitter().submit(single(ModelVariant::Dev)).await.unwrap();
    assert!(orchestrator.session().error(ErrorCategory::Generation).is_none());
}

#[tokio::test]
async fn malformed_bulk_payload_never_reaches_gateway() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;

    let result = orchestrator
        .submitter()
        .submit(GenerationRequest::Bulk {
            model: ModelVariant::Dev,
            payload: "{not json".to_string(),
        })
        .await;

    assert_matches!(result, Err(SubmitError::Validation(_)));
    assert_eq!(gateway.count(|c| matches!(c, Call::GenerateBulk(..))), 0);
    assert!(!orchestrator.session().is_generating());
}

#[tokio::test]
async fn out_of_range_single_request_never_reaches_gateway() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    let mut params = GenerationParams::for_model(ModelVariant::Dev, "tiny");
    params.width = 16;

    let result = orchestrator
        .submitter()
        .submit(GenerationRequest::Single {
            model: ModelVariant::Dev,
            params,
        })
        .await;

    assert_matches!(result, Err(SubmitError::Validation(_)));
    assert_eq!(gateway.count(|c| matches!(c, Call::Generate(_))), 0);
}

#[tokio::test]
async fn bulk_submission_reports_record_count() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;

    let accepted = orchestrator
        .submitter()
        .submit(GenerationRequest::Bulk {
            model: ModelVariant::Schnell,
            payload: r#"[{"prompt":"one"},{"prompt":"two","steps":4}]"#.to_string(),
        })
        .await
        .unwrap();

    assert_eq!(accepted.records, 2);
    assert_eq!(gateway.count(|c| *c == Call::GenerateBulk(ModelVariant::Schnell, 2)), 1);
}

// ---------------------------------------------------------------------------
// Health gating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_or_unhealthy_service_blocks_every_gated_action() {
    let (orchestrator, gateway, _) = idle_orchestrator();
    gateway.set_images(&["a"]);
    orchestrator.roster().reconcile().await.unwrap();

    for expected in [HealthState::Unknown, HealthState::Unhealthy] {
        if expected == HealthState::Unhealthy {
            gateway.fail("health");
            orchestrator.health().probe().await;
        }
        assert_eq!(orchestrator.session().health(), expected);

        let mutations = orchestrator.mutations();
        assert_matches!(
            orchestrator.submitter().submit(single(ModelVariant::Dev)).await,
            Err(SubmitError::ServiceUnavailable)
        );
        assert_matches!(mutations.delete_one("a").await, Err(MutationError::ServiceUnavailable));
        assert_matches!(
            mutations.delete_all(Confirmation::Confirmed).await,
            Err(MutationError::ServiceUnavailable)
        );
        assert_matches!(mutations.download_one("a").await, Err(MutationError::ServiceUnavailable));
        assert_matches!(mutations.download_all().await, Err(MutationError::ServiceUnavailable));
    }

    let mutating = gateway.count(|c| {
        !matches!(c, Call::Health | Call::ListImages | Call::Queue | Call::ListModels)
    });
    assert_eq!(mutating, 0);
    assert!(!orchestrator.session().is_generating());
    assert!(!orchestrator.session().is_downloading_all());
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_delete_leaves_roster_unchanged() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    gateway.set_images(&["a", "b", "c"]);
    orchestrator.roster().reconcile().await.unwrap();
    let mut rx = orchestrator.subscribe();

    gateway.fail("delete");
    let result = orchestrator.mutations().delete_one("b").await;

    assert_matches!(result, Err(MutationError::Gateway(_)));
    assert_eq!(orchestrator.session().roster(), ids(&["a", "b", "c"]));
    assert!(orchestrator.session().error(ErrorCategory::Delete).is_some());

    let notifications = drain(&mut rx);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Error);
    assert_eq!(notifications[0].title, "Deletion failed");
}

#[tokio::test]
async fn confirmed_delete_removes_only_that_image() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    gateway.set_images(&["a", "b", "c"]);
    orchestrator.roster().reconcile().await.unwrap();
    let mut rx = orchestrator.subscribe();

    orchestrator.mutations().delete_one("b").await.unwrap();

    assert_eq!(orchestrator.session().roster(), ids(&["a", "c"]));
    assert_eq!(drain(&mut rx)[0].message, "b has been deleted.");

    // The next reconciliation agrees and stays silent.
    orchestrator.roster().reconcile().await.unwrap();
    assert_eq!(orchestrator.session().roster(), ids(&["a", "c"]));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn delete_all_requires_confirmation_and_images() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    let mutations = orchestrator.mutations();

    assert_matches!(
        mutations.delete_all(Confirmation::Declined).await,
        Err(MutationError::NotConfirmed)
    );
    assert_matches!(
        mutations.delete_all(Confirmation::Confirmed).await,
        Err(MutationError::EmptyRoster)
    );
    assert_eq!(gateway.count(|c| *c == Call::DeleteAll), 0);

    gateway.set_images(&["a", "b"]);
    orchestrator.roster().reconcile().await.unwrap();
    mutations.delete_all(Confirmation::Confirmed).await.unwrap();

    assert!(orchestrator.session().roster().is_empty());
    assert_eq!(gateway.count(|c| *c == Call::DeleteAll), 1);
}

#[tokio::test]
async fn failed_delete_all_keeps_every_image() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    gateway.set_images(&["a", "b", "c"]);
    orchestrator.roster().reconcile().await.unwrap();
    let mut rx = orchestrator.subscribe();

    gateway.fail("delete_all");
    let result = orchestrator.mutations().delete_all(Confirmation::Confirmed).await;

    assert_matches!(result, Err(MutationError::Gateway(_)));
    assert_eq!(gateway.count(|c| *c == Call::DeleteAll), 1);
    assert_eq!(orchestrator.session().roster(), ids(&["a", "b", "c"]));
    assert_eq!(
        orchestrator.session().error(ErrorCategory::Delete).unwrap().severity,
        Severity::Transient
    );

    let notifications = drain(&mut rx);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Error);
    assert_eq!(notifications[0].title, "Deletion failed");
}

#[tokio::test]
async fn unlisted_ids_are_refused_before_any_request() {
    let (orchestrator, gateway, save_target) = healthy_orchestrator().await;
    gateway.set_images(&["a.png", "b.png"]);
    orchestrator.roster().reconcile().await.unwrap();
    let mut rx = orchestrator.subscribe();
    let mutations = orchestrator.mutations();

    for id in ["all", "x/../all", "a.png#b", "download_all", ""] {
        assert_matches!(
            mutations.delete_one(id).await,
            Err(MutationError::UnknownImage(ref refused)) if refused == id
        );
        assert_matches!(mutations.download_one(id).await, Err(MutationError::UnknownImage(_)));
    }

    let sent = gateway.count(|c| {
        matches!(
            c,
            Call::DeleteImage(_) | Call::DeleteAll | Call::Download(_) | Call::DownloadAll
        )
    });
    assert_eq!(sent, 0);
    assert_eq!(orchestrator.session().roster(), ids(&["a.png", "b.png"]));
    assert!(orchestrator.session().error(ErrorCategory::Delete).is_none());
    assert!(save_target.saved().is_empty());
    assert!(drain(&mut rx).is_empty());
}

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_one_saves_under_image_name() {
    let (orchestrator, gateway, save_target) = healthy_orchestrator().await;
    gateway.set_images(&["cat.png"]);
    orchestrator.roster().reconcile().await.unwrap();

    orchestrator.mutations().download_one("cat.png").await.unwrap();

    assert_eq!(save_target.saved(), vec![("cat.png".to_string(), IMAGE_BYTES.to_vec())]);
}

#[tokio::test]
async fn save_failure_is_reported_as_download_failure() {
    let (orchestrator, gateway, save_target) = healthy_orchestrator().await;
    gateway.set_images(&["cat.png"]);
    orchestrator.roster().reconcile().await.unwrap();
    save_target.fail();
    let mut rx = orchestrator.subscribe();

    let result = orchestrator.mutations().download_one("cat.png").await;

    assert_matches!(result, Err(MutationError::Save(_)));
    assert!(orchestrator.session().error(ErrorCategory::Download).is_some());
    assert_eq!(drain(&mut rx)[0].title, "Download failed");
}

#[tokio::test]
async fn download_all_is_guarded_by_its_own_flag() {
    let (orchestrator, gateway, save_target) = healthy_orchestrator().await;
    gateway.set_images(&["a", "b"]);
    orchestrator.roster().reconcile().await.unwrap();
    let gate = gateway.gate("download_all");
    let mutations = Arc::clone(orchestrator.mutations());

    let first = tokio::spawn({
        let mutations = Arc::clone(&mutations);
        async move { mutations.download_all().await }
    });
    gateway.wait_for("download_all", 1).await;
    assert!(orchestrator.session().is_downloading_all());

    assert_matches!(mutations.download_all().await, Err(MutationError::AlreadyDownloading));
    // Single downloads and generation are not held back by it.
    mutations.download_one("a").await.unwrap();
    orchestrator.submitter().submit(single(ModelVariant::Dev)).await.unwrap();

    gate.notify_one();
    first.await.unwrap().unwrap();

    assert!(!orchestrator.session().is_downloading_all());
    assert_eq!(gateway.count(|c| *c == Call::DownloadAll), 1);
    assert!(save_target
        .saved()
        .contains(&(ARCHIVE_FILE_NAME.to_string(), ARCHIVE_BYTES.to_vec())));
}

#[tokio::test]
async fn download_all_on_empty_roster_is_refused() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;

    assert_matches!(
        orchestrator.mutations().download_all().await,
        Err(MutationError::EmptyRoster)
    );
    assert_eq!(gateway.count(|c| *c == Call::DownloadAll), 0);
    assert!(!orchestrator.session().is_downloading_all());
}

#[tokio::test]
async fn failed_download_all_lowers_flag() {
    let (orchestrator, gateway, _) = healthy_orchestrator().await;
    gateway.set_images(&["a"]);
    orchestrator.roster().reconcile().await.unwrap();
    gateway.fail("download_all");

    assert_matches!(
        orchestrator.mutations().download_all().await,
        Err(MutationError::Gateway(_))
    );
    assert!(!orchestrator.session().is_downloading_all());
    assert_eq!(
        orchestrator.session().error(ErrorCategory::Download).unwrap().severity,
        Severity::Transient
    );
}
