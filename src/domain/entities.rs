//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{BitType, TextWidget};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    /// HTML shown to content editors above the edit form.
    pub instructions: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitRecord {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub context_name: String,
    pub bit_type: BitType,
    pub sort_order: i32,
    pub required: bool,
    pub help_text: String,
    pub text_widget: TextWidget,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Reference to an image stored under the upload root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub stored_path: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitDataRecord {
    pub bit_id: Uuid,
    pub text: String,
    pub image: Option<ImageRef>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BitDataRecord {
    /// The empty payload created alongside every new bit.
    pub fn empty(bit_id: Uuid, at: OffsetDateTime) -> Self {
        Self {
            bit_id,
            text: String::new(),
            image: None,
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedBit {
    pub bit: BitRecord,
    pub data: BitDataRecord,
}

/// A group with its bits and their data, in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedGroup {
    pub group: GroupRecord,
    pub bits: Vec<LoadedBit>,
}

impl LoadedGroup {
    pub fn slug(&self) -> &str {
        &self.group.slug
    }

    pub fn bit(&self, id: Uuid) -> Option<&LoadedBit> {
        self.bits.iter().find(|entry| entry.bit.id == id)
    }

    pub fn bit_by_context_name(&self, context_name: &str) -> Option<&LoadedBit> {
        self.bits
            .iter()
            .find(|entry| entry.bit.context_name == context_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageTemplateRecord {
    pub id: Uuid,
    pub name: String,
    /// Path relative to the configured templates directory.
    pub path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRecord {
    pub id: Uuid,
    /// Stored without a leading slash, e.g. `about/`.
    pub url: String,
    pub title: Option<String>,
    pub template_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A page together with its template and its groups in assembly order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageBinding {
    pub page: PageRecord,
    pub template: PageTemplateRecord,
    pub groups: Vec<GroupRecord>,
}

impl PageBinding {
    pub fn group_slugs(&self) -> Vec<String> {
        self.groups.iter().map(|group| group.slug.clone()).collect()
    }
}
