//! Integration tests for image upload, listing, serving and deletion.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{body_bytes, body_json, body_string, location, multipart_body, set_cookies, TestHarness, TEST_HOST};
use imagebed::server::flash::FLASH_COOKIE_NAME;
use md5::{Digest, Md5};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

#[tokio::test]
async fn upload_returns_embed_links() {
    let h = TestHarness::new();

    let (status, json) = h.upload_ajax("holiday.PNG", PNG_BYTES).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Upload successful");

    let filename = json["filename"].as_str().unwrap();
    assert!(filename.ends_with(".png"), "extension is lowercased: {filename}");
    assert_eq!(json["url"], format!("/images/{filename}"));

    let full_url = format!("http://{TEST_HOST}/images/{filename}");
    assert_eq!(json["full_url"], full_url);
    assert_eq!(json["markdown_url"], format!("![{filename}]({full_url})"));
    assert_eq!(
        json["html_url"],
        format!("<img src=\"{full_url}\" alt=\"{filename}\">")
    );
    assert_eq!(json["bbcode_url"], format!("[img]{full_url}[/img]"));
    assert_eq!(json["hash"], hex::encode(Md5::digest(PNG_BYTES)));
}

#[tokio::test]
async fn upload_uses_configured_public_url() {
    let h = TestHarness::with_config(|c| {
        c.server.public_url = Some("https://img.example.com/".into());
    });

    let (status, json) = h.upload_ajax("a.jpg", b"jpeg").await;
    assert_eq!(status, StatusCode::OK);
    let filename = json["filename"].as_str().unwrap();
    assert_eq!(
        json["full_url"],
        format!("https://img.example.com/images/{filename}")
    );
}

#[tokio::test]
async fn uploaded_image_is_listed() {
    let h = TestHarness::new();
    assert!(h.listed_filenames().await.is_empty());

    let (_, json) = h.upload_ajax("cat.webp", b"webp").await;
    let filename = json["filename"].as_str().unwrap().to_string();

    assert_eq!(h.listed_filenames().await, vec![filename]);
}

#[tokio::test]
async fn identical_uploads_get_distinct_names() {
    let h = TestHarness::new();

    let (_, first) = h.upload_ajax("same.png", PNG_BYTES).await;
    let (_, second) = h.upload_ajax("same.png", PNG_BYTES).await;

    assert_ne!(first["filename"], second["filename"]);
    assert_eq!(first["hash"], second["hash"]);
    assert_eq!(h.listed_filenames().await.len(), 2);
}

#[tokio::test]
async fn upload_rejects_disallowed_extension() {
    let h = TestHarness::new();

    let (status, json) = h.upload_ajax("script.exe", b"MZ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json.get("filename").is_none());
    assert_eq!(h.files_on_disk(), 0);
}

#[tokio::test]
async fn upload_rejects_empty_file() {
    let h = TestHarness::new();

    let (status, json) = h.upload_ajax("empty.png", b"").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "No file provided");
    assert_eq!(h.files_on_disk(), 0);
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let h = TestHarness::new();
    let (content_type, body) = multipart_body("attachment", "a.png", PNG_BYTES);

    let response = h
        .send(
            Request::post("/upload")
                .header(header::CONTENT_TYPE, content_type)
                .header(header::COOKIE, h.session_cookie())
                .header("X-Requested-With", "XMLHttpRequest")
                .body(Body::from(body))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["message"], "No file provided");
}

#[tokio::test]
async fn upload_rejects_oversized_file() {
    let h = TestHarness::with_config(|c| c.storage.max_file_size = 16);

    let (status, json) = h.upload_ajax("big.png", &[0u8; 64]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["success"], false);
    assert_eq!(h.files_on_disk(), 0);
}

#[tokio::test]
async fn upload_write_failure_is_reported() {
    let h = TestHarness::new();
    let root = h.ctx.store.root().to_path_buf();
    std::fs::remove_dir(&root).unwrap();
    std::fs::write(&root, b"not a directory").unwrap();

    let (status, json) = h.upload_ajax("photo.png", PNG_BYTES).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("Upload failed for"));
    assert!(json.get("filename").is_none());
    assert!(root.is_file());
}

#[tokio::test]
async fn browser_upload_redirects_with_flash() {
    let h = TestHarness::new();
    let (content_type, body) = multipart_body("file", "photo.jpg", b"jpeg bytes");

    let response = h
        .send(
            Request::post("/upload")
                .header(header::CONTENT_TYPE, content_type)
                .header(header::COOKIE, h.session_cookie())
                .body(Body::from(body))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let flash = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with(FLASH_COOKIE_NAME))
        .expect("flash cookie set");

    // The next page render shows the flashed message.
    let page = h
        .send(
            Request::get("/")
                .header(header::COOKIE, format!("{}; {}", h.session_cookie(), flash))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(page.status(), StatusCode::OK);
    let html = body_string(page).await;
    assert!(html.contains("Upload successful"));
    assert!(html.contains(".jpg"));
}

#[tokio::test]
async fn browser_upload_failure_is_flashed() {
    let h = TestHarness::new();
    let (content_type, body) = multipart_body("file", "notes.txt", b"hello");

    let response = h
        .send(
            Request::post("/upload")
                .header(header::CONTENT_TYPE, content_type)
                .header(header::COOKIE, h.session_cookie())
                .body(Body::from(body))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with(FLASH_COOKIE_NAME)));
    assert_eq!(h.files_on_disk(), 0);
}

#[tokio::test]
async fn index_renders_image_table() {
    let h = TestHarness::new();
    let (_, json) = h.upload_ajax("tree.gif", b"GIF89a").await;
    let filename = json["filename"].as_str().unwrap();

    let response = h
        .send(
            Request::get("/")
                .header(header::COOKIE, h.session_cookie())
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains(&format!("/images/{filename}")));
    assert!(html.contains(&format!("/download/{filename}")));
    assert!(html.contains(&format!("/delete/{filename}")));
}

#[tokio::test]
async fn index_links_escape_reserved_characters() {
    let h = TestHarness::new();
    std::fs::write(h.ctx.store.root().join("a#b c.png"), b"foreign").unwrap();

    let response = h
        .send(
            Request::get("/")
                .header(header::COOKIE, h.session_cookie())
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    let html = body_string(response).await;
    assert!(html.contains("href=\"/images/a%23b%20c.png\""));
    assert!(html.contains("href=\"/download/a%23b%20c.png\""));
    assert!(html.contains("action=\"/delete/a%23b%20c.png\""));
    assert!(!html.contains("href=\"/images/a#b"));

    // The encoded link resolves to the stored file.
    let image = h
        .send(
            Request::get("/images/a%23b%20c.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(body_bytes(image).await, b"foreign");
}

#[tokio::test]
async fn serve_image_returns_bytes_inline() {
    let h = TestHarness::new();
    let (_, json) = h.upload_ajax("pic.png", PNG_BYTES).await;
    let url = json["url"].as_str().unwrap();

    // Serving does not require a session.
    let response = h
        .send(Request::get(url).body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "inline");
    assert_eq!(body_bytes(response).await, PNG_BYTES);
}

#[tokio::test]
async fn download_sets_attachment_disposition() {
    let h = TestHarness::new();
    let (_, json) = h.upload_ajax("pic.jpeg", b"jpeg").await;
    let filename = json["filename"].as_str().unwrap();

    let response = h
        .send(
            Request::get(format!("/download/{filename}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{filename}\"").as_str()
    );
    assert_eq!(body_bytes(response).await, b"jpeg");
}

#[tokio::test]
async fn serve_missing_image_is_404() {
    let h = TestHarness::new();

    let response = h
        .send(
            Request::get("/images/20240101_000000_deadbeef.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn serve_rejects_path_traversal() {
    let h = TestHarness::new();
    std::fs::write(h.dir.path().join("secret.png"), b"outside").unwrap();

    let response = h
        .send(
            Request::get("/images/..%2Fsecret.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_removes_image() {
    let h = TestHarness::new();
    let (_, json) = h.upload_ajax("gone.png", PNG_BYTES).await;
    let filename = json["filename"].as_str().unwrap();

    let response = h
        .send(
            Request::post(format!("/delete/{filename}"))
                .header(header::COOKIE, h.session_cookie())
                .header("X-Requested-With", "XMLHttpRequest")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Deleted successfully");
    assert!(h.listed_filenames().await.is_empty());
    assert_eq!(h.files_on_disk(), 0);
}

#[tokio::test]
async fn delete_missing_image_is_404() {
    let h = TestHarness::new();

    let response = h
        .send(
            Request::post("/delete/20240101_000000_deadbeef.png")
                .header(header::COOKIE, h.session_cookie())
                .header("X-Requested-With", "XMLHttpRequest")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn delete_rejects_path_traversal() {
    let h = TestHarness::new();
    let outside = h.dir.path().join("keep.png");
    std::fs::write(&outside, b"outside").unwrap();

    let response = h
        .send(
            Request::post("/delete/..%2Fkeep.png")
                .header(header::COOKIE, h.session_cookie())
                .header("X-Requested-With", "XMLHttpRequest")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(outside.exists());
}

#[tokio::test]
async fn browser_delete_redirects_home() {
    let h = TestHarness::new();
    let (_, json) = h.upload_ajax("x.png", PNG_BYTES).await;
    let filename = json["filename"].as_str().unwrap();

    let response = h
        .send(
            Request::post(format!("/delete/{filename}"))
                .header(header::COOKIE, h.session_cookie())
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert_eq!(h.files_on_disk(), 0);
}

#[tokio::test]
async fn health_check_is_public() {
    let h = TestHarness::new();

    let response = h
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}
