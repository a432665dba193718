//! Write side of the content model: groups, bits and bit data.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        events::{ContentChange, ContentNotifier},
        forms::{self, FormErrors, Submission},
        repos::{
            CreateBitParams, CreateGroupParams, GroupsRepo, GroupsWriteRepo, RepoError,
            UpdateBitDataParams, UpdateBitParams, UpdateGroupParams,
        },
    },
    domain::{
        entities::{BitDataRecord, BitRecord, GroupRecord, LoadedBit, LoadedGroup},
        slug::{
            SlugError, derive_context_name, derive_slug, validate_context_name, validate_slug,
        },
        types::{BitType, TextWidget},
    },
};

const SOURCE: &str = "pagebits::application::content";

pub const DEFAULT_SORT_ORDER: i32 = 1;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0}")]
    Validation(String),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("submitted content is invalid")]
    Form(FormErrors),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl ContentError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateGroupCommand {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateBitCommand {
    pub group_id: Uuid,
    pub name: String,
    /// Derived from `name` when absent.
    pub context_name: Option<String>,
    pub bit_type: BitType,
    pub sort_order: Option<i32>,
    pub required: bool,
    pub help_text: String,
    pub text_widget: TextWidget,
}

#[derive(Debug, Clone)]
pub struct UpdateBitCommand {
    pub id: Uuid,
    pub name: String,
    pub context_name: String,
    pub bit_type: BitType,
    pub sort_order: i32,
    pub required: bool,
    pub help_text: String,
    pub text_widget: TextWidget,
}

#[derive(Clone)]
pub struct ContentService {
    reader: Arc<dyn GroupsRepo>,
    writer: Arc<dyn GroupsWriteRepo>,
    notifier: ContentNotifier,
}

impl ContentService {
    pub fn new(
        reader: Arc<dyn GroupsRepo>,
        writer: Arc<dyn GroupsWriteRepo>,
        notifier: ContentNotifier,
    ) -> Self {
        Self {
            reader,
            writer,
            notifier,
        }
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, ContentError> {
        Ok(self.reader.list_groups().await?)
    }

    /// Load a group straight from persistence, bypassing the cache.
    pub async fn load_group(&self, id: Uuid) -> Result<LoadedGroup, ContentError> {
        let group = self.require_group(id).await?;
        self.reader
            .load_group(&group.slug)
            .await?
            .ok_or(ContentError::NotFound { entity: "group" })
    }

    pub async fn create_group(
        &self,
        command: CreateGroupCommand,
    ) -> Result<GroupRecord, ContentError> {
        let name = require_name(&command.name)?;
        let slug = match non_blank(command.slug) {
            Some(slug) => slug,
            None => derive_slug(&name)?,
        };
        validate_slug(&slug)?;
        self.ensure_slug_available(&slug, None).await?;

        let group = self
            .writer
            .create_group(CreateGroupParams {
                slug,
                name,
                description: non_blank(command.description),
                instructions: non_blank(command.instructions),
            })
            .await
            .map_err(|err| duplicate_as_validation(err, "A group with this slug already exists"))?;

        info!(target = SOURCE, group = %group.slug, "group created");
        self.notifier
            .notify(ContentChange::GroupCreated {
                group_id: group.id,
                slug: group.slug.clone(),
            })
            .await;
        Ok(group)
    }

    pub async fn update_group(
        &self,
        command: UpdateGroupCommand,
    ) -> Result<GroupRecord, ContentError> {
        let existing = self.require_group(command.id).await?;
        let name = require_name(&command.name)?;
        let slug = command.slug.trim().to_string();
        validate_slug(&slug)?;
        if slug != existing.slug {
            self.ensure_slug_available(&slug, Some(existing.id)).await?;
        }

        let group = self
            .writer
            .update_group(UpdateGroupParams {
                id: existing.id,
                slug,
                name,
                description: non_blank(command.description),
                instructions: non_blank(command.instructions),
            })
            .await
            .map_err(|err| duplicate_as_validation(err, "A group with this slug already exists"))?;

        let previous_slug = (existing.slug != group.slug).then_some(existing.slug);
        self.notifier
            .notify(ContentChange::GroupUpdated {
                group_id: group.id,
                slug: group.slug.clone(),
                previous_slug,
            })
            .await;
        Ok(group)
    }

    pub async fn delete_group(&self, id: Uuid) -> Result<(), ContentError> {
        let group = self.require_group(id).await?;
        self.writer.delete_group(id).await?;
        info!(target = SOURCE, group = %group.slug, "group deleted");
        self.notifier
            .notify(ContentChange::GroupDeleted {
                group_id: group.id,
                slug: group.slug,
            })
            .await;
        Ok(())
    }

    /// Create a bit together with its single empty data row.
    pub async fn create_bit(&self, command: CreateBitCommand) -> Result<LoadedBit, ContentError> {
        let group = self.require_group(command.group_id).await?;
        let name = require_name(&command.name)?;
        let context_name = match non_blank(command.context_name) {
            Some(context_name) => context_name,
            None => derive_context_name(&name)?,
        };
        validate_context_name(&context_name)?;
        self.ensure_context_name_available(&group, &context_name, None)
            .await?;

        let created = self
            .writer
            .create_bit(CreateBitParams {
                group_id: group.id,
                name,
                context_name: context_name.clone(),
                bit_type: command.bit_type,
                sort_order: command.sort_order.unwrap_or(DEFAULT_SORT_ORDER),
                required: command.required,
                help_text: command.help_text.trim().to_string(),
                text_widget: command.text_widget,
            })
            .await
            .map_err(|err| duplicate_as_validation(err, &context_name_taken(&context_name, &group)))?;

        info!(
            target = SOURCE,
            group = %group.slug,
            context_name = %created.bit.context_name,
            bit_type = %created.bit.bit_type,
            "bit created"
        );
        self.notifier
            .notify(ContentChange::BitCreated {
                bit_id: created.bit.id,
                group_slug: group.slug,
            })
            .await;
        Ok(created)
    }

    pub async fn update_bit(&self, command: UpdateBitCommand) -> Result<BitRecord, ContentError> {
        let existing = self.require_bit(command.id).await?;
        let group = self.require_group(existing.group_id).await?;
        let name = require_name(&command.name)?;
        let context_name = command.context_name.trim().to_string();
        validate_context_name(&context_name)?;
        self.ensure_context_name_available(&group, &context_name, Some(existing.id))
            .await?;

        let bit = self
            .writer
            .update_bit(UpdateBitParams {
                id: existing.id,
                name,
                context_name: context_name.clone(),
                bit_type: command.bit_type,
                sort_order: command.sort_order,
                required: command.required,
                help_text: command.help_text.trim().to_string(),
                text_widget: command.text_widget,
            })
            .await
            .map_err(|err| duplicate_as_validation(err, &context_name_taken(&context_name, &group)))?;

        self.notifier
            .notify(ContentChange::BitUpdated {
                bit_id: bit.id,
                group_slug: group.slug,
            })
            .await;
        Ok(bit)
    }

    pub async fn delete_bit(&self, id: Uuid) -> Result<(), ContentError> {
        let bit = self.require_bit(id).await?;
        let group = self.require_group(bit.group_id).await?;
        self.writer.delete_bit(id).await?;
        self.notifier
            .notify(ContentChange::BitDeleted {
                bit_id: id,
                group_slug: group.slug,
            })
            .await;
        Ok(())
    }

    /// Replace a bit's stored payload, checked against its declared type.
    pub async fn update_bit_data(
        &self,
        params: UpdateBitDataParams,
    ) -> Result<BitDataRecord, ContentError> {
        let bit = self.require_bit(params.bit_id).await?;
        let group = self.require_group(bit.group_id).await?;
        check_payload(&bit, &params)?;

        let data = self.writer.update_bit_data(params).await?;
        self.notifier
            .notify(ContentChange::BitDataUpdated {
                bit_id: bit.id,
                group_slug: group.slug,
            })
            .await;
        Ok(data)
    }

    /// Apply a content-edit form submission to every bit of the group.
    pub async fn save_content(
        &self,
        group_id: Uuid,
        submission: &Submission,
    ) -> Result<LoadedGroup, ContentError> {
        let loaded = self.load_group(group_id).await?;
        let updates = forms::apply_submission(&loaded, submission).map_err(ContentError::Form)?;
        if updates.is_empty() {
            return Ok(loaded);
        }
        for update in &updates {
            let entry = loaded
                .bits
                .iter()
                .find(|entry| entry.bit.id == update.bit_id)
                .ok_or(ContentError::NotFound { entity: "bit" })?;
            check_payload(&entry.bit, update)?;
        }

        let written = self.writer.update_bit_data_many(updates).await?;
        self.notifier
            .notify(ContentChange::ContentSaved {
                group_id,
                group_slug: loaded.group.slug.clone(),
            })
            .await;

        info!(
            target = SOURCE,
            group = %loaded.group.slug,
            bits = written.len(),
            "group content saved"
        );
        self.load_group(group_id).await
    }

    async fn require_group(&self, id: Uuid) -> Result<GroupRecord, ContentError> {
        self.reader
            .find_group_by_id(id)
            .await?
            .ok_or(ContentError::NotFound { entity: "group" })
    }

    async fn require_bit(&self, id: Uuid) -> Result<BitRecord, ContentError> {
        self.reader
            .find_bit(id)
            .await?
            .ok_or(ContentError::NotFound { entity: "bit" })
    }

    async fn ensure_slug_available(
        &self,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), ContentError> {
        match self.reader.find_group_by_slug(slug).await? {
            Some(other) if Some(other.id) != exclude => Err(ContentError::validation(format!(
                "The slug '{slug}' is already used by group '{}'",
                other.name
            ))),
            _ => Ok(()),
        }
    }

    async fn ensure_context_name_available(
        &self,
        group: &GroupRecord,
        context_name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), ContentError> {
        match self
            .reader
            .find_bit_by_context_name(group.id, context_name)
            .await?
        {
            Some(other) if Some(other.id) != exclude => Err(ContentError::validation(
                context_name_taken(context_name, group),
            )),
            _ => Ok(()),
        }
    }
}

/// Type and required-ness rules for a bit's payload.
pub fn check_payload(bit: &BitRecord, params: &UpdateBitDataParams) -> Result<(), ContentError> {
    if bit.bit_type.stores_text() {
        if params.image.is_some() {
            return Err(ContentError::validation(format!(
                "'{}' stores text; an image was supplied",
                bit.name
            )));
        }
        if bit.required && params.text.trim().is_empty() {
            return Err(ContentError::validation(format!("'{}' is required", bit.name)));
        }
    } else {
        if !params.text.is_empty() {
            return Err(ContentError::validation(format!(
                "'{}' stores an image; text was supplied",
                bit.name
            )));
        }
        if bit.required && params.image.is_none() {
            return Err(ContentError::validation(format!("'{}' is required", bit.name)));
        }
    }
    Ok(())
}

fn context_name_taken(context_name: &str, group: &GroupRecord) -> String {
    format!(
        "The context name '{context_name}' is already used in group '{}'",
        group.name
    )
}

fn duplicate_as_validation(err: RepoError, message: &str) -> ContentError {
    match err {
        RepoError::Duplicate { .. } => ContentError::validation(message),
        other => ContentError::Repo(other),
    }
}

fn require_name(name: &str) -> Result<String, ContentError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ContentError::validation("name must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
