mod support;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use pagebits::application::{
    content::{
        ContentError, ContentService, CreateBitCommand, CreateGroupCommand, UpdateGroupCommand,
    },
    events::ContentNotifier,
    forms::{Submission, field_key},
    repos::{
        CreateBitParams, CreateGroupParams, GroupsWriteRepo, RepoError, UpdateBitDataParams,
        UpdateBitParams, UpdateGroupParams,
    },
};
use pagebits::domain::{
    entities::{BitDataRecord, BitRecord, GroupRecord, LoadedBit},
    types::{BitType, TextWidget},
};

use support::{Harness, MemoryRepos};

#[tokio::test]
async fn context_names_are_unique_within_a_group() {
    let harness = Harness::new();
    let home = harness.group("Home", "home").await;
    let footer = harness.group("Footer", "footer").await;

    harness
        .bit(&home, "Header", "header", BitType::PlainText, 1)
        .await;
    let err = harness
        .content
        .create_bit(CreateBitCommand {
            group_id: home.id,
            name: "Another header".to_string(),
            context_name: Some("header".to_string()),
            bit_type: BitType::Html,
            sort_order: None,
            required: false,
            help_text: String::new(),
            text_widget: TextWidget::CharField,
        })
        .await
        .expect_err("duplicate context name");
    assert!(matches!(err, ContentError::Validation(message) if message.contains("header")));

    // The same name in another group is fine.
    harness
        .bit(&footer, "Header", "header", BitType::PlainText, 1)
        .await;
}

#[tokio::test]
async fn creating_a_bit_creates_exactly_one_data_row() {
    let harness = Harness::new();
    let group = harness.group("Home", "home").await;

    let created = harness
        .bit(&group, "Logo", "logo_image", BitType::Image, 1)
        .await;

    assert_eq!(harness.repos.bit_data_count().await, 1);
    let data = harness
        .repos
        .bit_data_for(created.bit.id)
        .await
        .expect("data row");
    assert_eq!(data.text, "");
    assert_eq!(data.image, None);
}

#[tokio::test]
async fn deleting_a_bit_removes_its_data() {
    let harness = Harness::new();
    let group = harness.group("Home", "home").await;
    let bit = harness
        .bit(&group, "Header", "header", BitType::PlainText, 1)
        .await;

    harness
        .content
        .delete_bit(bit.bit.id)
        .await
        .expect("bit deleted");

    assert_eq!(harness.repos.bit_data_count().await, 0);
}

#[tokio::test]
async fn slugs_are_derived_once_and_kept() {
    let harness = Harness::new();
    let group = harness
        .content
        .create_group(CreateGroupCommand {
            name: "Site Header".to_string(),
            slug: None,
            description: None,
            instructions: None,
        })
        .await
        .expect("group created");
    assert_eq!(group.slug, "site-header");

    let renamed = harness
        .content
        .update_group(UpdateGroupCommand {
            id: group.id,
            name: "Masthead".to_string(),
            slug: group.slug.clone(),
            description: None,
            instructions: None,
        })
        .await
        .expect("group renamed");
    assert_eq!(renamed.slug, "site-header");
    assert_eq!(renamed.name, "Masthead");

    let bit = harness
        .content
        .create_bit(CreateBitCommand {
            group_id: group.id,
            name: "Page Header".to_string(),
            context_name: None,
            bit_type: BitType::PlainText,
            sort_order: None,
            required: false,
            help_text: String::new(),
            text_widget: TextWidget::CharField,
        })
        .await
        .expect("bit created");
    assert_eq!(bit.bit.context_name, "page_header");
}

#[tokio::test]
async fn image_bits_reject_text_payloads() {
    let harness = Harness::new();
    let group = harness.group("Home", "home").await;
    let bit = harness
        .bit(&group, "Logo", "logo_image", BitType::Image, 1)
        .await;

    let err = harness
        .content
        .update_bit_data(UpdateBitDataParams {
            bit_id: bit.bit.id,
            text: "not an image".to_string(),
            image: None,
        })
        .await
        .expect_err("text on image bit");
    assert!(matches!(err, ContentError::Validation(_)));
}

#[tokio::test]
async fn content_form_rejects_blank_required_fields() {
    let harness = Harness::new();
    let group = harness.group("Home", "home").await;
    let bit = harness
        .content
        .create_bit(CreateBitCommand {
            group_id: group.id,
            name: "Header".to_string(),
            context_name: Some("header".to_string()),
            bit_type: BitType::PlainText,
            sort_order: None,
            required: true,
            help_text: String::new(),
            text_widget: TextWidget::CharField,
        })
        .await
        .expect("bit created");

    let key = field_key(bit.bit.id);
    let err = harness
        .content
        .save_content(group.id, &Submission::new().with_text(&key, "   "))
        .await
        .expect_err("blank required field");
    let ContentError::Form(errors) = err else {
        panic!("expected form errors, got {err:?}");
    };
    assert!(errors.get(&key).is_some());

    let saved = harness
        .content
        .save_content(group.id, &Submission::new().with_text(&key, "Welcome"))
        .await
        .expect("content saved");
    assert_eq!(saved.bits[0].data.text, "Welcome");
}

/// Delegates to `MemoryRepos` but times out on batched content writes.
struct TimeoutOnBatch(Arc<MemoryRepos>);

#[async_trait]
impl GroupsWriteRepo for TimeoutOnBatch {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        self.0.create_group(params).await
    }

    async fn update_group(&self, params: UpdateGroupParams) -> Result<GroupRecord, RepoError> {
        self.0.update_group(params).await
    }

    async fn delete_group(&self, id: Uuid) -> Result<(), RepoError> {
        self.0.delete_group(id).await
    }

    async fn create_bit(&self, params: CreateBitParams) -> Result<LoadedBit, RepoError> {
        self.0.create_bit(params).await
    }

    async fn update_bit(&self, params: UpdateBitParams) -> Result<BitRecord, RepoError> {
        self.0.update_bit(params).await
    }

    async fn delete_bit(&self, id: Uuid) -> Result<(), RepoError> {
        self.0.delete_bit(id).await
    }

    async fn update_bit_data(
        &self,
        params: UpdateBitDataParams,
    ) -> Result<BitDataRecord, RepoError> {
        self.0.update_bit_data(params).await
    }

    async fn update_bit_data_many(
        &self,
        _updates: Vec<UpdateBitDataParams>,
    ) -> Result<Vec<BitDataRecord>, RepoError> {
        Err(RepoError::Timeout)
    }
}

#[tokio::test]
async fn failed_content_save_leaves_every_bit_unchanged() {
    let harness = Harness::new();
    let group = harness.group("Home", "home").await;
    let first = harness
        .bit(&group, "First", "first", BitType::PlainText, 1)
        .await;
    let second = harness
        .bit(&group, "Second", "second", BitType::PlainText, 2)
        .await;

    let content = ContentService::new(
        harness.repos.clone(),
        Arc::new(TimeoutOnBatch(harness.repos.clone())),
        ContentNotifier::new(),
    );
    let submission = Submission::new()
        .with_text(field_key(first.bit.id), "new first")
        .with_text(field_key(second.bit.id), "new second");

    let err = content
        .save_content(group.id, &submission)
        .await
        .expect_err("write times out");
    assert!(matches!(err, ContentError::Repo(RepoError::Timeout)));

    for bit in [&first, &second] {
        let data = harness.repos.bit_data_for(bit.bit.id).await.expect("data row");
        assert_eq!(data.text, "");
    }
}

#[tokio::test]
async fn content_save_writes_all_fields_together() {
    let harness = Harness::new();
    let group = harness.group("Home", "home").await;
    let first = harness
        .bit(&group, "First", "first", BitType::PlainText, 1)
        .await;
    let second = harness
        .bit(&group, "Second", "second", BitType::Html, 2)
        .await;
    harness.groups.get_group("home").await.expect("cached");

    let submission = Submission::new()
        .with_text(field_key(first.bit.id), "one")
        .with_text(field_key(second.bit.id), "<b>two</b>");
    harness
        .content
        .save_content(group.id, &submission)
        .await
        .expect("content saved");

    let reloaded = harness.groups.get_group("home").await.expect("reloaded");
    assert_eq!(reloaded.bits[0].data.text, "one");
    assert_eq!(reloaded.bits[1].data.text, "<b>two</b>");
}
