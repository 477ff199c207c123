use filehub_common::storage::Fingerprint;
use serde_json::json;

use crate::common::{TestApp, routes};

mod upload {
    use super::*;

    #[tokio::test]
    async fn returns_created_record() {
        let app = TestApp::spawn().await;
        let data = b"hello dedup";

        let res = app.upload("hello.txt", data).await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["original_filename"], "hello.txt");
        assert_eq!(res.body["file_type"], "text/plain");
        assert_eq!(res.body["size"], data.len());
        assert_eq!(res.body["file_hash"], Fingerprint::of(data).to_hex());
        let id = res.id();
        assert_eq!(res.body["file"], routes::download(&id));
        assert!(res.body["uploaded_at"].is_string());
        assert_eq!(app.blob_files(), 1);
    }

    #[tokio::test]
    async fn duplicate_content_is_stored_once() {
        let app = TestApp::spawn().await;

        let first = app.upload_ok("a.txt", b"same bytes").await;
        let second = app.upload_ok("b.txt", b"same bytes").await;

        assert_ne!(first["id"], second["id"]);
        assert_eq!(first["file_hash"], second["file_hash"]);
        assert_eq!(second["original_filename"], "b.txt");
        assert_eq!(app.blob_files(), 1);

        let stats = app.get(routes::STATS).await;
        assert_eq!(stats.body["record_count"], 2);
        assert_eq!(stats.body["unique_blobs"], 1);
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let app = TestApp::spawn().await;
        let form = reqwest::multipart::Form::new().text("size", "12");

        let res = app.post_form(routes::FILES, form).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.get(routes::FILES).await.body, json!([]));
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.upload("empty.txt", b"").await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.blob_files(), 0);
    }

    #[tokio::test]
    async fn declared_size_is_recorded_verbatim() {
        let app = TestApp::spawn().await;
        let part = reqwest::multipart::Part::bytes(b"twelve bytes".to_vec())
            .file_name("sized.bin")
            .mime_str("application/octet-stream")
            .unwrap();
        // The size field may follow the file.
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("size", "4096");

        let res = app.post_form(routes::FILES, form).await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["size"], 4096);
    }

    #[tokio::test]
    async fn malformed_declared_size_is_rejected() {
        let app = TestApp::spawn().await;
        let part = reqwest::multipart::Part::bytes(b"data".to_vec()).file_name("x.bin");
        let form = reqwest::multipart::Form::new()
            .text("size", "a lot")
            .part("file", part);

        let res = app.post_form(routes::FILES, form).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn declared_size_beyond_storable_range_is_rejected() {
        let app = TestApp::spawn().await;
        let part = reqwest::multipart::Part::bytes(b"tiny".to_vec()).file_name("huge.bin");
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("size", u64::MAX.to_string());

        let res = app.post_form(routes::FILES, form).await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.get(routes::FILES).await.body, json!([]));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let app = TestApp::spawn_with(|cfg| cfg.storage.max_blob_size = 16).await;

        let res = app.upload("big.bin", &[0u8; 100]).await;

        assert_eq!(res.status, 413);
        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(app.blob_files(), 0);
    }

    #[tokio::test]
    async fn truncated_body_leaves_nothing_behind() {
        let app = TestApp::spawn().await;
        // No closing boundary: the stream ends mid-field.
        let body = b"--BOUNDARY\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"cut.bin\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n\
            partial content that never finishes"
            .to_vec();

        let res = app
            .post_raw(routes::FILES, "multipart/form-data; boundary=BOUNDARY", body)
            .await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "UPLOAD_INTERRUPTED");
        assert_eq!(app.blob_files(), 0);
        assert_eq!(app.get(routes::FILES).await.body, json!([]));
        assert_eq!(app.get(routes::STATS).await.body["record_count"], 0);
    }

    #[tokio::test]
    async fn concurrent_identical_uploads_share_one_blob() {
        let app = std::sync::Arc::new(TestApp::spawn().await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let app = app.clone();
            handles.push(tokio::spawn(async move {
                app.upload(&format!("copy-{i}.txt"), b"racing content").await
            }));
        }
        for handle in handles {
            let res = handle.await.unwrap();
            assert_eq!(res.status, 201, "{}", res.text);
        }

        assert_eq!(app.blob_files(), 1);
        let stats = app.get(routes::STATS).await;
        assert_eq!(stats.body["record_count"], 8);
        assert_eq!(stats.body["unique_blobs"], 1);
    }
}

mod list {
    use super::*;

    async fn seeded() -> TestApp {
        let app = TestApp::spawn().await;
        app.upload_ok("Report.txt", &[b'r'; 100]).await;
        app.upload_ok("notes.txt", &[b'n'; 10]).await;
        app.upload_ok("report-final.txt", &[b'f'; 500]).await;
        app
    }

    fn names(body: &serde_json::Value) -> Vec<&str> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|r| r["original_filename"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn newest_first_without_filters() {
        let app = seeded().await;

        let res = app.get(routes::FILES).await;

        assert_eq!(res.status, 200);
        assert_eq!(
            names(&res.body),
            vec!["report-final.txt", "notes.txt", "Report.txt"]
        );
    }

    #[tokio::test]
    async fn filters_combine_with_and() {
        let app = seeded().await;

        let res = app
            .get(&format!("{}?search=REPORT&min_size=200", routes::FILES))
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(names(&res.body), vec!["report-final.txt"]);
    }

    #[tokio::test]
    async fn size_bounds_are_inclusive() {
        let app = seeded().await;

        let res = app
            .get(&format!("{}?min_size=10&max_size=100", routes::FILES))
            .await;

        assert_eq!(names(&res.body), vec!["notes.txt", "Report.txt"]);
    }

    #[tokio::test]
    async fn file_type_filter() {
        let app = seeded().await;

        let hit = app.get(&format!("{}?file_type=text", routes::FILES)).await;
        let miss = app.get(&format!("{}?file_type=image", routes::FILES)).await;

        assert_eq!(hit.body.as_array().unwrap().len(), 3);
        assert_eq!(miss.body, json!([]));
    }

    #[tokio::test]
    async fn date_range_outside_uploads_is_empty() {
        let app = seeded().await;

        let res = app
            .get(&format!("{}?end_date=2000-01-01T00:00:00Z", routes::FILES))
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body, json!([]));
    }

    #[tokio::test]
    async fn malformed_filter_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get(&format!("{}?min_size=big", routes::FILES)).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod detail {
    use super::*;

    #[tokio::test]
    async fn get_returns_record() {
        let app = TestApp::spawn().await;
        let created = app.upload_ok("one.txt", b"one").await;
        let id = created["id"].as_str().unwrap();

        let res = app.get(&routes::file(id)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body, created);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .get(&routes::file("01936f0e-1234-7abc-8000-000000000001"))
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_id_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::file("not-a-uuid")).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod download {
    use super::*;

    #[tokio::test]
    async fn streams_stored_bytes() {
        let app = TestApp::spawn().await;
        let data = b"download me";
        let created = app.upload_ok("dl.txt", data).await;
        let id = created["id"].as_str().unwrap();

        let res = app.get(&routes::download(id)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.text.as_bytes(), data);
        assert_eq!(res.header("content-type"), Some("text/plain"));
        assert_eq!(res.header("content-length"), Some("11"));
        let etag = format!("\"{}\"", Fingerprint::of(data).to_hex());
        assert_eq!(res.header("etag"), Some(etag.as_str()));
        assert!(
            res.header("content-disposition")
                .unwrap()
                .contains("filename=\"dl.txt\"")
        );
    }

    #[tokio::test]
    async fn matching_etag_is_not_modified() {
        let app = TestApp::spawn().await;
        let data = b"cached";
        let created = app.upload_ok("c.txt", data).await;
        let id = created["id"].as_str().unwrap();
        let etag = format!("\"{}\"", Fingerprint::of(data).to_hex());

        let res = app
            .get_with_headers(&routes::download(id), &[("If-None-Match", etag.as_str())])
            .await;

        assert_eq!(res.status, 304);
        assert!(res.text.is_empty());
    }

    #[tokio::test]
    async fn unknown_record_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .get(&routes::download("01936f0e-1234-7abc-8000-000000000002"))
            .await;

        assert_eq!(res.status, 404);
    }
}

mod stats {
    use super::*;

    #[tokio::test]
    async fn empty_store_reports_zeroes() {
        let app = TestApp::spawn().await;

        let res = app.get(routes::STATS).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total_size"], 0);
        assert_eq!(res.body["unique_size"], 0);
        assert_eq!(res.body["saved_size"], 0);
        assert_eq!(res.body["savings_percentage"], 0.0);
        assert_eq!(res.body["record_count"], 0);
        assert_eq!(res.body["unique_blobs"], 0);
    }

    #[tokio::test]
    async fn duplicate_halves_storage() {
        let app = TestApp::spawn().await;
        app.upload_ok("a.txt", b"12345678").await;
        app.upload_ok("b.txt", b"12345678").await;

        let res = app.get(routes::STATS).await;

        assert_eq!(res.body["total_size"], 16);
        assert_eq!(res.body["unique_size"], 8);
        assert_eq!(res.body["saved_size"], 8);
        assert_eq!(res.body["savings_percentage"], 50.0);
    }
}

mod dedup_check {
    use super::*;

    #[tokio::test]
    async fn unknown_hash_creates_nothing() {
        let app = TestApp::spawn().await;

        let res = app
            .post_json(
                routes::DEDUP_CHECK,
                &json!({
                    "file_hash": Fingerprint::of(b"never uploaded").to_hex(),
                    "filename": "ghost.txt",
                    "file_type": "text/plain",
                    "size": 14,
                }),
            )
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body, json!({ "exists": false }));
        assert_eq!(app.get(routes::FILES).await.body, json!([]));
    }

    #[tokio::test]
    async fn known_hash_creates_record_without_upload() {
        let app = TestApp::spawn().await;
        let data = b"already here";
        app.upload_ok("a.txt", data).await;

        let res = app
            .post_json(
                routes::DEDUP_CHECK,
                &json!({
                    "file_hash": Fingerprint::of(data).to_hex(),
                    "filename": "b.txt",
                    "file_type": "text/markdown",
                    "size": data.len(),
                }),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["exists"], true);
        assert_eq!(res.body["file"]["original_filename"], "b.txt");
        assert_eq!(res.body["file"]["file_type"], "text/markdown");
        assert_eq!(res.body["file"]["file_hash"], Fingerprint::of(data).to_hex());
        assert_eq!(app.blob_files(), 1);
        assert_eq!(app.get(routes::STATS).await.body["record_count"], 2);
    }

    #[tokio::test]
    async fn unusable_content_type_still_downloads() {
        let app = TestApp::spawn().await;
        let data = b"abc";
        app.upload_ok("a.txt", data).await;

        let res = app
            .post_json(
                routes::DEDUP_CHECK,
                &json!({
                    "file_hash": Fingerprint::of(data).to_hex(),
                    "filename": "b.txt",
                    "file_type": "text/plain\nx",
                    "size": 3,
                }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["file"]["file_type"], "text/plain");
        let id = res.body["file"]["id"].as_str().unwrap().to_string();

        let download = app.get(&routes::download(&id)).await;

        assert_eq!(download.status, 200, "{}", download.text);
        assert_eq!(download.text.as_bytes(), data);
        assert_eq!(download.header("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn size_beyond_storable_range_is_rejected() {
        let app = TestApp::spawn().await;
        let data = b"abc";
        app.upload_ok("a.txt", data).await;

        let res = app
            .post_json(
                routes::DEDUP_CHECK,
                &json!({
                    "file_hash": Fingerprint::of(data).to_hex(),
                    "filename": "b.txt",
                    "size": u64::MAX,
                }),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.get(routes::STATS).await.body["record_count"], 1);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_json(routes::DEDUP_CHECK, &json!({ "filename": "x.txt", "size": 3 }))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn malformed_hash_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_json(
                routes::DEDUP_CHECK,
                &json!({ "file_hash": "xyz", "filename": "x.txt", "size": 3 }),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_raw(routes::DEDUP_CHECK, "application/json", b"{not json".to_vec())
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}
