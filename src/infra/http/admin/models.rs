//! Request bodies accepted by the admin JSON endpoints.

use serde::Deserialize;
use uuid::Uuid;

use crate::{
    application::{
        content::{CreateBitCommand, CreateGroupCommand, UpdateBitCommand, UpdateGroupCommand},
        pages::{PageCommand, TemplateCommand},
    },
    domain::types::{BitType, TextWidget},
};

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl From<CreateGroupRequest> for CreateGroupCommand {
    fn from(request: CreateGroupRequest) -> Self {
        Self {
            name: request.name,
            slug: request.slug,
            description: request.description,
            instructions: request.instructions,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl UpdateGroupRequest {
    pub fn into_command(self, id: Uuid) -> UpdateGroupCommand {
        UpdateGroupCommand {
            id,
            name: self.name,
            slug: self.slug,
            description: self.description,
            instructions: self.instructions,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBitRequest {
    pub name: String,
    #[serde(default)]
    pub context_name: Option<String>,
    pub bit_type: BitType,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub help_text: String,
    #[serde(default)]
    pub text_widget: TextWidget,
}

impl CreateBitRequest {
    pub fn into_command(self, group_id: Uuid) -> CreateBitCommand {
        CreateBitCommand {
            group_id,
            name: self.name,
            context_name: self.context_name,
            bit_type: self.bit_type,
            sort_order: self.sort_order,
            required: self.required,
            help_text: self.help_text,
            text_widget: self.text_widget,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateBitRequest {
    pub name: String,
    pub context_name: String,
    pub bit_type: BitType,
    pub sort_order: i32,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub help_text: String,
    #[serde(default)]
    pub text_widget: TextWidget,
}

impl UpdateBitRequest {
    pub fn into_command(self, id: Uuid) -> UpdateBitCommand {
        UpdateBitCommand {
            id,
            name: self.name,
            context_name: self.context_name,
            bit_type: self.bit_type,
            sort_order: self.sort_order,
            required: self.required,
            help_text: self.help_text,
            text_widget: self.text_widget,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub name: String,
    pub path: String,
}

impl From<TemplateRequest> for TemplateCommand {
    fn from(request: TemplateRequest) -> Self {
        Self {
            name: request.name,
            path: request.path,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub template_id: Uuid,
    pub group_ids: Vec<Uuid>,
}

impl From<PageRequest> for PageCommand {
    fn from(request: PageRequest) -> Self {
        Self {
            url: request.url,
            title: request.title,
            template_id: request.template_id,
            group_ids: request.group_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    /// Group slugs in assembly order.
    pub groups: Vec<String>,
}
