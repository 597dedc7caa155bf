use pagetree_core::db::{open_db_in_memory, share};
use pagetree_core::{
    Anonymous, DocumentPatch, DocumentService, DocumentServiceError, DocumentView, Identity,
};
use std::time::Duration;

fn setup() -> DocumentService {
    DocumentService::new(share(open_db_in_memory().unwrap())).unwrap()
}

fn owner() -> Identity {
    Identity::new("owner")
}

fn stranger() -> Identity {
    Identity::new("stranger")
}

fn publish(service: &DocumentService, id: uuid::Uuid, published: bool) {
    service
        .update(
            &owner(),
            id,
            DocumentPatch {
                is_published: Some(published),
                ..DocumentPatch::default()
            },
        )
        .unwrap();
}

#[test]
fn non_owner_cannot_touch_private_document() {
    let service = setup();
    let id = service.create(&owner(), "Private", None).unwrap();

    let unauthorized = |result: Result<_, DocumentServiceError>| {
        matches!(result, Err(DocumentServiceError::Unauthorized))
    };
    assert!(unauthorized(service.get_by_id(&stranger(), id).map(|_| ())));
    assert!(unauthorized(
        service
            .update(&stranger(), id, DocumentPatch::default())
            .map(|_| ())
    ));
    assert!(unauthorized(service.archive(&stranger(), id).map(|_| ())));
    assert!(unauthorized(service.restore(&stranger(), id).map(|_| ())));
    assert!(unauthorized(service.remove(&stranger(), id).map(|_| ())));
    assert!(unauthorized(service.remove_icon(&stranger(), id).map(|_| ())));
    assert!(unauthorized(
        service.remove_cover_image(&stranger(), id).map(|_| ())
    ));

    assert!(matches!(
        service.get_by_id(&owner(), id).unwrap(),
        DocumentView::Owner(doc) if doc.id == id
    ));
}

#[test]
fn published_document_is_readable_anonymously_as_public_view() {
    let service = setup();
    let id = service.create(&owner(), "Launch notes", None).unwrap();
    publish(&service, id, true);

    match service.get_by_id(&Anonymous, id).unwrap() {
        DocumentView::Public(public) => {
            assert_eq!(public.id, id);
            assert_eq!(public.title, "Launch notes");
            assert!(public.is_published);
        }
        other => panic!("expected public view, got {other:?}"),
    }
    assert!(matches!(
        service.get_by_id(&stranger(), id).unwrap(),
        DocumentView::Public(_)
    ));
    assert!(matches!(
        service.get_by_id(&owner(), id).unwrap(),
        DocumentView::Owner(_)
    ));
}

#[test]
fn unpublishing_closes_public_read() {
    let service = setup();
    let id = service.create(&owner(), "Doc", None).unwrap();
    publish(&service, id, true);
    publish(&service, id, false);

    assert!(matches!(
        service.get_by_id(&stranger(), id).unwrap_err(),
        DocumentServiceError::Unauthorized
    ));
    assert!(matches!(
        service.get_by_id(&Anonymous, id).unwrap_err(),
        DocumentServiceError::Unauthorized
    ));
}

#[test]
fn archived_published_document_is_not_public() {
    let service = setup();
    let id = service.create(&owner(), "Doc", None).unwrap();
    publish(&service, id, true);
    service.archive(&owner(), id).unwrap();

    assert!(matches!(
        service.get_by_id(&Anonymous, id).unwrap_err(),
        DocumentServiceError::Unauthorized
    ));
    assert!(service.wait_idle(Duration::from_secs(10)));
}

#[test]
fn public_reader_cannot_mutate_published_document() {
    let service = setup();
    let id = service.create(&owner(), "Doc", None).unwrap();
    publish(&service, id, true);

    let err = service
        .update(
            &stranger(),
            id,
            DocumentPatch {
                title: Some("Defaced".to_string()),
                ..DocumentPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, DocumentServiceError::Unauthorized));
    assert!(matches!(
        service.update(&Anonymous, id, DocumentPatch::default()).unwrap_err(),
        DocumentServiceError::Unauthorized
    ));
}

#[test]
fn missing_document_is_not_found_even_for_anonymous_reader() {
    let service = setup();
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        service.get_by_id(&Anonymous, missing).unwrap_err(),
        DocumentServiceError::NotFound(id) if id == missing
    ));
    assert!(matches!(
        service.archive(&stranger(), missing).unwrap_err(),
        DocumentServiceError::NotFound(id) if id == missing
    ));
}

#[test]
fn listings_require_identity() {
    let service = setup();
    assert!(matches!(
        service.get_sidebar(&Anonymous, None).unwrap_err(),
        DocumentServiceError::Unauthorized
    ));
    assert!(matches!(
        service.get_trash(&Anonymous).unwrap_err(),
        DocumentServiceError::Unauthorized
    ));
    assert!(matches!(
        service.get_search(&None::<Identity>).unwrap_err(),
        DocumentServiceError::Unauthorized
    ));
}
