mod common;

use catalog_stream::{UploadError, Uploader};
use common::{legacy_catalog, Call, FakePlatform, FIRST_ORDERING_ID};
use payload::{normalize, CatalogPayload, PayloadChunker};
use serde_json::{json, Value};
use stream::{StreamError, UpdateMode};

fn catalog(count: usize) -> CatalogPayload {
    normalize(CatalogPayload::from_value(legacy_catalog(count)).unwrap()).unwrap()
}

#[test]
fn small_payload_goes_out_in_one_container() {
    let platform = FakePlatform::new();
    let uploader = Uploader::new(&platform);
    let payload = catalog(3);
    let expected = payload.clone().into_value();

    let before = chrono::Utc::now();
    let result = uploader.upload(payload, UpdateMode::Update).unwrap();

    assert!(result.success);
    assert_eq!(result.mode, UpdateMode::Update);
    assert_eq!(result.chunks, 1);
    assert_eq!(result.ordering_ids(), [FIRST_ORDERING_ID]);
    assert_eq!(result.request_ids(), ["req-0"]);
    assert_eq!(result.file_ids, ["file-0"]);
    assert!(result.start_time >= before);

    let calls = platform.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], Call::Create);
    assert!(matches!(&calls[1], Call::Upload { file_id, .. } if file_id == "file-0"));
    assert_eq!(
        calls[2],
        Call::Notify {
            file_id: "file-0".into(),
            mode: UpdateMode::Update
        }
    );
    assert_eq!(platform.uploaded(), [expected]);
}

#[test]
fn oversized_payload_is_sent_chunk_by_chunk() {
    let mut value = catalog(40).into_value();
    value["delete"] = json!(["product://retired"]);
    let payload = CatalogPayload::from_value(value).unwrap();
    let total = payload.serialized_len().unwrap();

    let platform = FakePlatform::new();
    let uploader = Uploader::new(&platform).with_chunker(PayloadChunker::new(total / 3));
    let result = uploader.upload(payload, UpdateMode::Merge).unwrap();

    assert!(result.chunks >= 3);
    assert_eq!(result.receipts.len(), result.chunks);
    assert_eq!(result.file_ids.len(), result.chunks);
    let ids = result.ordering_ids();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

    // one create/upload/notify triple per chunk, in order
    let calls = platform.calls();
    for (i, triple) in calls.chunks(3).enumerate() {
        let file_id = format!("file-{i}");
        assert_eq!(triple[0], Call::Create);
        assert!(matches!(&triple[1], Call::Upload { file_id: f, .. } if *f == file_id));
        assert_eq!(
            triple[2],
            Call::Notify {
                file_id,
                mode: UpdateMode::Merge
            }
        );
    }

    let uploaded = platform.uploaded();
    let mut documents = Vec::new();
    for chunk in &uploaded {
        assert_eq!(chunk["delete"], json!(["product://retired"]));
        for item in chunk["addOrUpdate"].as_array().unwrap() {
            documents.push(item["documentId"].as_str().unwrap().to_string());
        }
    }
    let expected: Vec<String> = (0..40).map(|i| format!("product://{i:04}")).collect();
    assert_eq!(documents, expected);
}

#[test]
fn failing_chunk_reports_what_already_landed() {
    let payload = catalog(30);
    let total = payload.serialized_len().unwrap();
    let platform = FakePlatform {
        fail_upload: Some(1),
        ..FakePlatform::new()
    };
    let uploader = Uploader::new(&platform).with_chunker(PayloadChunker::new(total / 3));

    let err = uploader.upload(payload, UpdateMode::Update).unwrap_err();
    match &err {
        UploadError::ChunkFailed {
            chunk,
            total,
            completed,
            source,
        } => {
            assert_eq!(*chunk, 1);
            assert!(*total >= 3);
            assert_eq!(completed.len(), 1);
            assert_eq!(completed[0].ordering_id, FIRST_ORDERING_ID);
            assert_eq!(source.status(), Some(500));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.committed().len(), 1);
    assert!(err.to_string().starts_with("chunk 2 of"));

    // nothing after the failing upload was attempted
    let notifies = platform
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Notify { .. }))
        .count();
    assert_eq!(notifies, 1);
}

#[test]
fn payload_without_items_is_uploaded_whole() {
    let platform = FakePlatform::new();
    let uploader = Uploader::new(&platform).with_chunker(PayloadChunker::new(8));
    let payload = CatalogPayload::from_value(json!({"delete": ["product://1", "product://2"]})).unwrap();

    let result = uploader.upload(payload, UpdateMode::Update).unwrap();
    assert_eq!(result.chunks, 1);
    assert_eq!(
        platform.uploaded(),
        [json!({"delete": ["product://1", "product://2"]})]
    );
}

#[test]
fn upload_file_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(&path, legacy_catalog(2).to_string()).unwrap();

    let platform = FakePlatform::new();
    let result = Uploader::new(&platform)
        .upload_file(&path, UpdateMode::Update)
        .unwrap();
    assert_eq!(result.chunks, 1);

    // sent as read: normalization is the workflow's job
    let uploaded: Vec<Value> = platform.uploaded();
    assert!(uploaded[0].get("AddOrUpdate").is_some());

    let missing = Uploader::new(&platform).upload_file(dir.path().join("nope.json"), UpdateMode::Update);
    assert!(matches!(missing, Err(UploadError::Payload(_))));
}

#[test]
fn errors_surface_their_cause() {
    let err = UploadError::ChunkFailed {
        chunk: 0,
        total: 2,
        completed: Vec::new(),
        source: StreamError::RateLimited { waits: 10 },
    };
    assert!(std::error::Error::source(&err).is_some());
    assert!(err.committed().is_empty());
}
