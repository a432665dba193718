mod support;

use pagebits::application::{assemble::AssembleError, repos::UpdateBitDataParams};
use pagebits::domain::{entities::ImageRef, error::DomainError, resolve::BitValue, types::BitType};

use support::Harness;

fn logo() -> ImageRef {
    ImageRef {
        stored_path: "pagebits/images/2026/10/16/abc-logo.png".to_string(),
        filename: "logo.png".to_string(),
        content_type: "image/png".to_string(),
        size_bytes: 68,
        checksum: "00".to_string(),
        width: Some(1),
        height: Some(1),
    }
}

#[tokio::test]
async fn testgroup_assembles_every_bit_with_its_resolved_value() {
    let harness = Harness::new();
    let group = harness.group("Test group", "testgroup").await;
    let header = harness
        .bit(&group, "Header", "header", BitType::PlainText, 1)
        .await;
    let block = harness
        .bit(&group, "Page block", "page_block", BitType::Html, 2)
        .await;
    let image = harness
        .bit(&group, "Logo", "logo_image", BitType::Image, 3)
        .await;

    harness.set_text(&header, "Test Page Header").await;
    harness.set_text(&block, "<p>Block</p>").await;
    harness
        .content
        .update_bit_data(UpdateBitDataParams {
            bit_id: image.bit.id,
            text: String::new(),
            image: Some(logo()),
        })
        .await
        .expect("image stored");

    let context = harness
        .assembler
        .assemble(&["testgroup"])
        .await
        .expect("assembled");

    assert_eq!(context.len(), 3);
    assert_eq!(
        context.get("header"),
        Some(&BitValue::Text("Test Page Header".to_string()))
    );
    assert_eq!(
        context.get("page_block"),
        Some(&BitValue::SafeHtml("<p>Block</p>".to_string()))
    );
    assert_eq!(context.get("logo_image"), Some(&BitValue::Image(Some(logo()))));
    assert_eq!(context.source_group("header"), Some("testgroup"));

    assert!(!context.get("header").is_some_and(BitValue::is_pre_escaped));
    assert!(context.get("page_block").is_some_and(BitValue::is_pre_escaped));
    assert!(!context.get("logo_image").is_some_and(BitValue::is_pre_escaped));
}

#[tokio::test]
async fn groups_merge_in_order() {
    let harness = Harness::new();
    let home = harness.group("Home", "home").await;
    let footer = harness.group("Footer", "footer").await;
    let header = harness
        .bit(&home, "Header", "header", BitType::PlainText, 1)
        .await;
    let copyright = harness
        .bit(&footer, "Copyright", "copyright", BitType::PlainText, 1)
        .await;
    harness.set_text(&header, "Welcome").await;
    harness.set_text(&copyright, "(c) 2026").await;

    let context = harness
        .assembler
        .assemble(&["home", "footer"])
        .await
        .expect("assembled");

    assert_eq!(context.source_group("header"), Some("home"));
    assert_eq!(context.source_group("copyright"), Some("footer"));
}

#[tokio::test]
async fn shared_context_name_fails_fast() {
    let harness = Harness::new();
    let home = harness.group("Home", "home").await;
    let footer = harness.group("Footer", "footer").await;
    harness
        .bit(&home, "Header", "header", BitType::PlainText, 1)
        .await;
    harness
        .bit(&footer, "Header", "header", BitType::PlainText, 1)
        .await;

    let err = harness
        .assembler
        .assemble(&["home", "footer"])
        .await
        .expect_err("name clash");

    let AssembleError::NameClash(clash) = err else {
        panic!("expected a name clash, got {err:?}");
    };
    assert_eq!(
        clash,
        DomainError::name_clash("header", "home", "footer")
    );
}

#[tokio::test]
async fn missing_group_and_empty_list_fail() {
    let harness = Harness::new();

    let err = harness
        .assembler
        .assemble(&["ghost"])
        .await
        .expect_err("unknown group");
    assert!(matches!(err, AssembleError::Group(_)));

    let empty: [&str; 0] = [];
    let err = harness
        .assembler
        .assemble(&empty)
        .await
        .expect_err("no groups");
    assert!(matches!(err, AssembleError::NoGroups));
}

#[tokio::test]
async fn pagebits_for_unknown_group_is_empty() {
    let harness = Harness::new();
    let context = harness
        .assembler
        .pagebits("ghost")
        .await
        .expect("empty mapping");
    assert!(context.is_empty());
}
