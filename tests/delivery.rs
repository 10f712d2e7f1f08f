use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::json;

use editqueue::{
    edit::{Attributes, Edit, EditResponse, EditResponseError, Feature, PhotoReference},
    engine::{
        coordinator::{ApplyEdits, ApplyEditsState, Deliverer, DeliveryFailure, Submission},
        messages::{ErrorMessageCatalog, classify_rejection, render_template},
        photo::{decode_embedded, resolve_photo},
        traits::{EditPayload, SubmissionTransport, TransportError},
    },
    op::Transition,
    types::{EntryId, FeatureLayer, REQUEST_ALREADY_PROCESSED},
};

struct ScriptedTransport {
    reply: Box<dyn Fn() -> Result<Vec<EditResponse>, TransportError> + Send + Sync>,
    seen: Arc<Mutex<Vec<EditPayload>>>,
}

#[async_trait]
impl SubmissionTransport for ScriptedTransport {
    async fn apply_edits(&self, payload: EditPayload) -> Result<Vec<EditResponse>, TransportError> {
        self.seen.lock().expect("lock").push(payload);
        (self.reply)()
    }
}

fn catalog() -> ErrorMessageCatalog {
    ErrorMessageCatalog::from_json_str(
        r#"{"options":[
            {"id":5001,"description":{"lv":"Atlikuši {count} no {total}","en":"{count} of {total} left"},"isUserFriendly":true},
            {"id":5002,"description":{"lv":"Iekšēja kļūda"},"isUserFriendly":false}
        ]}"#,
    )
    .expect("catalog")
}

fn deliverer(
    reply: impl Fn() -> Result<Vec<EditResponse>, TransportError> + Send + Sync + 'static,
) -> (Deliverer, Arc<Mutex<Vec<EditPayload>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let transport = ScriptedTransport {
        reply: Box::new(reply),
        seen: Arc::clone(&seen),
    };
    (Deliverer::new(Arc::new(transport), catalog(), "en"), seen)
}

fn rejection(code: i64, description: serde_json::Value) -> Vec<EditResponse> {
    vec![EditResponse {
        id: 5,
        error: Some(EditResponseError {
            code,
            description: description.to_string(),
        }),
    }]
}

fn submission(photo: Option<PhotoReference>) -> Submission {
    Submission {
        entry_id: EntryId::generate(),
        edits: vec![Edit::adds(
            FeatureLayer::ForestDamage,
            vec![Feature {
                geometry: None,
                attributes: Attributes::new("2024-05-01T10:00:00Z").with("damagedArea", 3),
            }],
        )],
        photo,
    }
}

#[tokio::test]
async fn clean_response_is_success_and_edits_are_sent_as_json() {
    let (deliverer, seen) = deliverer(|| Ok(vec![EditResponse { id: 5, error: None }]));
    let sub = submission(None);

    assert_eq!(deliverer.deliver(&sub).await, Ok(()));

    let seen = seen.lock().expect("lock");
    assert_eq!(seen.len(), 1);
    let sent: Vec<Edit> = serde_json::from_str(&seen[0].edits_json).expect("edits json");
    assert_eq!(sent, sub.edits);
    assert!(seen[0].photo.is_none());
}

#[tokio::test]
async fn friendly_template_is_filled_from_description() {
    let (deliverer, _) = deliverer(|| {
        Ok(rejection(
            5001,
            json!({ "count": 2, "total": 5, "placeholder": "fallback" }),
        ))
    });

    let failure = deliverer.deliver(&submission(None)).await.expect_err("rejected");
    assert_eq!(
        failure,
        DeliveryFailure::rejected(5001, Some("2 of 5 left".to_string()))
    );
}

#[tokio::test]
async fn non_friendly_code_uses_placeholder() {
    let (deliverer, _) =
        deliverer(|| Ok(rejection(5002, json!({ "placeholder": "Server said no" }))));

    let failure = deliverer.deliver(&submission(None)).await.expect_err("rejected");
    assert_eq!(failure.code, Some(5002));
    assert_eq!(failure.message.as_deref(), Some("Server said no"));
}

#[tokio::test]
async fn already_processed_code_is_reported_with_its_code() {
    let (deliverer, _) =
        deliverer(|| Ok(rejection(REQUEST_ALREADY_PROCESSED, json!({ "placeholder": "dup" }))));

    let failure = deliverer.deliver(&submission(None)).await.expect_err("rejected");
    assert!(failure.is_already_processed());
}

#[tokio::test]
async fn already_processed_with_unreadable_description_is_a_failure() {
    let (deliverer, _) = deliverer(|| {
        Ok(vec![EditResponse {
            id: 5,
            error: Some(EditResponseError {
                code: REQUEST_ALREADY_PROCESSED,
                description: "<html>".to_string(),
            }),
        }])
    });

    let failure = deliverer.deliver(&submission(None)).await.expect_err("failed");
    assert_eq!(failure, DeliveryFailure::transport());
    assert!(!failure.is_already_processed());
}

#[tokio::test]
async fn first_rejection_in_response_wins() {
    let (deliverer, _) = deliverer(|| {
        let mut responses = vec![EditResponse { id: 1, error: None }];
        responses.extend(rejection(5002, json!({ "placeholder": "first" })));
        responses.extend(rejection(5001, json!({ "count": 1, "total": 1 })));
        Ok(responses)
    });

    let failure = deliverer.deliver(&submission(None)).await.expect_err("rejected");
    assert_eq!(failure.message.as_deref(), Some("first"));
}

#[tokio::test]
async fn transport_errors_carry_no_code_or_message() {
    let (deliverer, _) = deliverer(|| {
        Err(TransportError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        })
    });

    let failure = deliverer.deliver(&submission(None)).await.expect_err("failed");
    assert_eq!(failure, DeliveryFailure::transport());
    assert!(!failure.is_already_processed());
}

#[tokio::test]
async fn unreadable_photo_fails_without_calling_transport() {
    let (deliverer, seen) = deliverer(|| Ok(Vec::new()));
    let sub = submission(Some(PhotoReference::File {
        path: "/definitely/not/here.jpg".to_string(),
        web_path: "x".to_string(),
    }));

    assert_eq!(
        deliverer.deliver(&sub).await,
        Err(DeliveryFailure::transport())
    );
    assert!(seen.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn embedded_and_file_photos_are_attached() {
    let bytes = vec![0xff_u8, 0xd8, 0xff, 0xe0, 1, 2, 3];
    let data_url = format!("data:image/png;base64,{}", STANDARD.encode(&bytes));
    let (deliverer, seen) = deliverer(|| Ok(Vec::new()));

    deliverer
        .deliver(&submission(Some(PhotoReference::Embedded(data_url))))
        .await
        .expect("embedded");

    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = dir.path().join("p1.jpg");
    std::fs::write(&path, &bytes).expect("write photo");
    deliverer
        .deliver(&submission(Some(PhotoReference::File {
            path: path.to_string_lossy().into_owned(),
            web_path: "web/p1.jpg".to_string(),
        })))
        .await
        .expect("file");

    let seen = seen.lock().expect("lock");
    let embedded = seen[0].photo.as_ref().expect("embedded photo");
    assert_eq!(embedded.bytes, bytes);
    assert_eq!(embedded.mime, "image/png");
    let file = seen[1].photo.as_ref().expect("file photo");
    assert_eq!(file.bytes, bytes);
    assert_eq!(file.file_name, "p1.jpg");
}

#[tokio::test]
async fn plain_base64_photo_defaults_to_jpeg() {
    let photo = resolve_photo(&PhotoReference::Embedded(STANDARD.encode(b"abc")))
        .await
        .expect("decode");
    assert_eq!(photo.bytes, b"abc");
    assert_eq!(photo.mime, "image/jpg");
    assert!(decode_embedded("data:image/png;base64").is_err());
    assert!(decode_embedded("data:image/png;base64,%%%").is_err());
}

#[test]
fn coordinator_transitions() {
    let mut coordinator = ApplyEdits::new();
    let first = submission(None);
    let second = submission(None);

    assert_eq!(coordinator.submit(first.clone()), Transition::Applied);
    assert_eq!(coordinator.submit(second.clone()), Transition::Ignored);
    assert_eq!(coordinator.loading_entry(), Some(first.entry_id));

    // Outcomes for other entries and retries while loading are ignored.
    assert_eq!(
        coordinator.complete(second.entry_id, Ok(())),
        Transition::Ignored
    );
    assert_eq!(coordinator.retry(second.clone()), Transition::Ignored);

    let failure = DeliveryFailure::rejected(5002, None);
    assert_eq!(
        coordinator.complete(first.entry_id, Err(failure.clone())),
        Transition::Applied
    );
    assert_eq!(
        coordinator.state(),
        &ApplyEditsState::Failure {
            error: Some(failure)
        }
    );

    assert_eq!(coordinator.retry(first.clone()), Transition::Applied);
    assert!(coordinator.is_loading());
    assert_eq!(coordinator.complete(first.entry_id, Ok(())), Transition::Applied);
    assert_eq!(coordinator.state(), &ApplyEditsState::Success);
    assert_eq!(coordinator.submit(second.clone()), Transition::Ignored);

    coordinator.reset();
    assert_eq!(coordinator.state(), &ApplyEditsState::Idle);
    assert_eq!(coordinator.submit(second), Transition::Applied);
}

#[test]
fn template_rendering_skips_falsy_values() {
    let vars = json!({ "count": 0, "name": "", "flag": false, "species": "alnis" });
    assert_eq!(
        render_template("{count} {name} {flag} {species} {missing}", &vars),
        "{count} {name} {flag} alnis {missing}"
    );
    assert_eq!(render_template("{n}/{n} {", &json!({ "n": 3 })), "3/3 {");
    assert_eq!(render_template("{} {n}", &json!({ "n": 3 })), "{} 3");
}

#[test]
fn catalog_keeps_only_user_friendly_templates() {
    let catalog = catalog();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.template(5002, "lv"), None);
    assert_eq!(catalog.template(5001, "lv"), Some("Atlikuši {count} no {total}"));
    assert_eq!(catalog.template(5001, "ru"), None);
}

#[test]
fn unparseable_description_is_a_plain_failure() {
    let error = EditResponseError {
        code: 5001,
        description: "not json".to_string(),
    };
    assert_eq!(
        classify_rejection(&error, &catalog(), "en"),
        DeliveryFailure::transport()
    );

    let missing_language = EditResponseError {
        code: 5001,
        description: json!({ "count": 1, "placeholder": "fallback" }).to_string(),
    };
    assert_eq!(
        classify_rejection(&missing_language, &catalog(), "ru"),
        DeliveryFailure::rejected(5001, Some("fallback".to_string()))
    );
}
