mod support;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use pagebits::application::pages::{PageCommand, TemplateCommand};
use pagebits::config::ViewSettings;
use pagebits::domain::types::BitType;
use pagebits::infra::{
    http::{HttpState, build_router},
    templates::TemplateEngine,
    uploads::{MediaUrls, UploadStorage},
};

use support::{Harness, write_templates};

/// 1x1 transparent PNG.
const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

struct Site {
    harness: Harness,
    storage: Arc<UploadStorage>,
    router: Router,
    _templates: TempDir,
    _uploads: TempDir,
}

async fn site(views: Vec<ViewSettings>) -> Site {
    let harness = Harness::new();

    let group = harness.group("Test group", "testgroup").await;
    let header = harness
        .bit(&group, "Header", "header", BitType::PlainText, 1)
        .await;
    let block = harness
        .bit(&group, "Page block", "page_block", BitType::Html, 2)
        .await;
    harness.set_text(&header, "Test Page Header").await;
    harness.set_text(&block, "<p>Block</p>").await;

    let footer = harness.group("Footer", "footer").await;
    let copyright = harness
        .bit(&footer, "Copyright", "copyright", BitType::PlainText, 1)
        .await;
    harness.set_text(&copyright, "Tom & Jerry").await;

    let templates = tempfile::tempdir().expect("templates dir");
    write_templates(
        templates.path(),
        &[
            ("about.html", "<h1>{{ header }}</h1>{{ page_block }}"),
            (
                "home.html",
                "{{ header }}|{% set footer = pagebits(slug=\"footer\") %}{{ footer.copyright }}",
            ),
            ("broken.html", "{{ missing_variable }}"),
        ],
    );
    let uploads = tempfile::tempdir().expect("uploads dir");

    let media = MediaUrls::new("/media/");
    let engine = TemplateEngine::load(templates.path(), harness.assembler.clone(), media.clone())
        .expect("templates load");
    let storage =
        Arc::new(UploadStorage::new(uploads.path().to_path_buf()).expect("upload storage"));

    let state = HttpState {
        pages: harness.pages.clone(),
        assembler: harness.assembler.clone(),
        templates: Arc::new(engine),
        upload_storage: storage.clone(),
        media,
        db: None,
        views: Arc::new(views),
    };

    Site {
        router: build_router(state),
        harness,
        storage,
        _templates: templates,
        _uploads: uploads,
    }
}

async fn bind_page(harness: &Harness, url: &str, template_path: &str, slugs: &[&str]) {
    let template = harness
        .pages
        .create_template(TemplateCommand {
            name: template_path.to_string(),
            path: template_path.to_string(),
        })
        .await
        .expect("template registered");

    let mut group_ids = Vec::new();
    for slug in slugs {
        let group = harness
            .content
            .list_groups()
            .await
            .expect("groups")
            .into_iter()
            .find(|group| group.slug == *slug)
            .expect("group exists");
        group_ids.push(group.id);
    }

    harness
        .pages
        .create_page(PageCommand {
            url: url.to_string(),
            title: None,
            template_id: template.id,
            group_ids,
        })
        .await
        .expect("page created");
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Bytes) {
    let response = router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    (status, body)
}

#[tokio::test(flavor = "multi_thread")]
async fn bound_page_renders_and_unbound_path_is_404() {
    let site = site(Vec::new()).await;
    bind_page(&site.harness, "/about/", "about.html", &["testgroup"]).await;

    let (status, body) = get(&site.router, "/about/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_ref(), b"<h1>Test Page Header</h1><p>Block</p>");

    let (status, body) = get(&site.router, "/nowhere/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(String::from_utf8_lossy(&body).contains("Page Not Found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_view_renders_groups_and_template_function() {
    let site = site(vec![ViewSettings {
        path: "/".to_string(),
        template: "home.html".to_string(),
        groups: vec!["testgroup".to_string()],
    }])
    .await;

    let (status, body) = get(&site.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_ref(), b"Test Page Header|Tom &amp; Jerry");
}

#[tokio::test(flavor = "multi_thread")]
async fn plain_text_is_escaped_on_output() {
    let site = site(Vec::new()).await;
    let group = site.harness.group("Hostile", "hostile").await;
    let bit = site
        .harness
        .bit(&group, "Header", "header", BitType::PlainText, 1)
        .await;
    site.harness
        .set_text(&bit, "<script>alert(1)</script>")
        .await;
    let block = site
        .harness
        .bit(&group, "Page block", "page_block", BitType::Html, 2)
        .await;
    site.harness.set_text(&block, "<em>ok</em>").await;
    bind_page(&site.harness, "hostile/", "about.html", &["hostile"]).await;

    let (status, body) = get(&site.router, "/hostile/").await;
    assert_eq!(status, StatusCode::OK);
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains("&lt;script&gt;"));
    assert!(!body.contains("<script>"));
    assert!(body.contains("<em>ok</em>"));
}

#[tokio::test(flavor = "multi_thread")]
async fn page_that_fails_to_render_keeps_the_404() {
    let site = site(Vec::new()).await;
    bind_page(&site.harness, "broken/", "broken.html", &["testgroup"]).await;

    let (status, _) = get(&site.router, "/broken/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn page_content_changes_show_up_without_manual_cache_clearing() {
    let site = site(Vec::new()).await;
    bind_page(&site.harness, "about/", "about.html", &["testgroup"]).await;
    get(&site.router, "/about/").await;

    let group = site
        .harness
        .groups
        .get_group("testgroup")
        .await
        .expect("cached group");
    let header = group
        .bit_by_context_name("header")
        .expect("header bit")
        .clone();
    site.harness.set_text(&header, "Updated").await;

    let (_, body) = get(&site.router, "/about/").await;
    assert!(String::from_utf8_lossy(&body).starts_with("<h1>Updated</h1>"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stored_images_are_served_under_the_media_prefix() {
    let site = site(Vec::new()).await;
    let image = site
        .storage
        .store_image("logo.png", Bytes::from_static(PNG_1X1))
        .await
        .expect("stored");

    let response = site
        .router
        .clone()
        .oneshot(
            Request::get(format!("/media/{}", image.stored_path))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).expect("content type"),
        "image/png"
    );

    let (status, _) = get(&site.router, "/media/pagebits/images/missing.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_without_database_is_unavailable() {
    let site = site(Vec::new()).await;
    let (status, _) = get(&site.router, "/_health/db").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
