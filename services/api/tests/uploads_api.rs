mod common;

use api_lib::web::images::MAX_UPLOAD_BYTES;
use axum::http::{Method, StatusCode};
use common::TestApp;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really pixels";

fn file_name(url: &serde_json::Value) -> String {
    url.as_str().unwrap().rsplit('/').next().unwrap().to_string()
}

#[tokio::test]
async fn cover_upload_replaces_the_previous_file() {
    let app = TestApp::new();
    let (_, token) = app.register("Ann", "ann@example.com").await;
    let book_id = app.create_book(&token, "Harbor Lights", "private").await;
    let uri = format!("/api/books/{book_id}/cover");

    let (status, body) = app.upload(&uri, &token, "cover", "image/png", PNG, &[]).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let first = file_name(&body["data"]["cover_image"]);
    assert!(first.starts_with("cover-"));
    assert_eq!(app.files.names(), [first.clone()]);

    let (status, body) = app.upload(&uri, &token, "cover", "image/webp", PNG, &[]).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let second = file_name(&body["data"]["cover_image"]);
    assert_ne!(first, second);
    assert_eq!(app.files.names(), [second]);
}

#[tokio::test]
async fn illustrations_keep_their_caption() {
    let app = TestApp::new();
    let (_, token) = app.register("Ann", "ann@example.com").await;
    let book_id = app.create_book(&token, "Harbor Lights", "private").await;

    let (status, body) = app
        .upload(
            &format!("/api/books/{book_id}/images"),
            &token,
            "image",
            "image/jpeg",
            PNG,
            &[("caption", "  The lighthouse ")],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["caption"], "The lighthouse");
    let filename = body["data"]["filename"].as_str().unwrap().to_string();
    assert!(filename.starts_with("image-"));
    assert_eq!(app.files.names(), [filename]);

    let image_id = body["data"]["id"].as_str().unwrap();
    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/books/{book_id}/images/{image_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.files.names().is_empty());
    assert!(app.db.book(book_id).images.is_empty());
}

#[tokio::test]
async fn avatar_upload_replaces_the_previous_file() {
    let app = TestApp::new();
    let (id, token) = app.register("Ann", "ann@example.com").await;

    let (status, body) = app
        .upload("/api/users/me/avatar", &token, "avatar", "image/gif", PNG, &[])
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let first = file_name(&body["data"]["avatar"]);
    assert!(first.starts_with("avatar-"));

    let (status, body) = app
        .upload("/api/users/me/avatar", &token, "avatar", "image/png", PNG, &[])
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let second = file_name(&body["data"]["avatar"]);
    assert_eq!(app.files.names(), [second.clone()]);
    assert_eq!(app.db.user(id).avatar, Some(format!("/uploads/{second}")));
}

#[tokio::test]
async fn only_images_within_the_limit_are_accepted() {
    let app = TestApp::new();
    let (_, token) = app.register("Ann", "ann@example.com").await;
    let book_id = app.create_book(&token, "Harbor Lights", "private").await;
    let uri = format!("/api/books/{book_id}/cover");

    let (status, body) = app
        .upload(&uri, &token, "cover", "text/plain", b"hello", &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Only image files are allowed (jpeg, png, webp, gif)");

    let oversized = vec![0u8; MAX_UPLOAD_BYTES + 1];
    let (status, body) = app
        .upload(&uri, &token, "cover", "image/png", &oversized, &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File too large, the limit is 5 MB");

    let (status, body) = app.upload(&uri, &token, "photo", "image/png", PNG, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Multipart form must include a 'cover' file");

    assert!(app.files.names().is_empty());
    assert_eq!(app.db.book(book_id).cover_image, None);
}

#[tokio::test]
async fn failed_save_discards_the_new_file() {
    let app = TestApp::new();
    let (id, token) = app.register("Ann", "ann@example.com").await;
    let book_id = app.create_book(&token, "Harbor Lights", "private").await;
    let uri = format!("/api/books/{book_id}/cover");

    let (status, body) = app.upload(&uri, &token, "cover", "image/png", PNG, &[]).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let kept = app.files.names();

    app.db.fail_writes();
    let (status, body) = app.upload(&uri, &token, "cover", "image/png", PNG, &[]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert_eq!(app.files.names(), kept);

    let (status, _) = app
        .upload("/api/users/me/avatar", &token, "avatar", "image/png", PNG, &[])
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.files.names(), kept);
    assert_eq!(app.db.user(id).avatar, None);
}

#[tokio::test]
async fn deleting_a_book_removes_its_files() {
    let app = TestApp::new();
    let (_, token) = app.register("Ann", "ann@example.com").await;
    let book_id = app.create_book(&token, "Harbor Lights", "private").await;
    let other_id = app.create_book(&token, "Second Book", "private").await;

    app.upload(&format!("/api/books/{book_id}/cover"), &token, "cover", "image/png", PNG, &[])
        .await;
    for _ in 0..2 {
        app.upload(&format!("/api/books/{book_id}/images"), &token, "image", "image/png", PNG, &[])
            .await;
    }
    let (_, body) = app
        .upload(&format!("/api/books/{other_id}/cover"), &token, "cover", "image/png", PNG, &[])
        .await;
    let survivor = file_name(&body["data"]["cover_image"]);
    assert_eq!(app.files.names().len(), 4);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/books/{book_id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.files.names(), [survivor]);
}

#[tokio::test]
async fn readers_cannot_upload_to_public_books() {
    let app = TestApp::new();
    let (_, author) = app.register("Ann", "ann@example.com").await;
    let (_, reader) = app.register("Bob", "bob@example.com").await;
    let book_id = app.create_book(&author, "Harbor Lights", "public").await;

    let (status, body) = app
        .upload(&format!("/api/books/{book_id}/cover"), &reader, "cover", "image/png", PNG, &[])
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert!(app.files.names().is_empty());
}
