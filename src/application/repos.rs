use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    entities::{
        BitDataRecord, BitRecord, GroupRecord, ImageRef, LoadedBit, LoadedGroup, PageBinding,
        PageRecord, PageTemplateRecord,
    },
    types::{BitType, TextWidget},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroupParams {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateGroupParams {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateBitParams {
    pub group_id: Uuid,
    pub name: String,
    pub context_name: String,
    pub bit_type: BitType,
    pub sort_order: i32,
    pub required: bool,
    pub help_text: String,
    pub text_widget: TextWidget,
}

#[derive(Debug, Clone)]
pub struct UpdateBitParams {
    pub id: Uuid,
    pub name: String,
    pub context_name: String,
    pub bit_type: BitType,
    pub sort_order: i32,
    pub required: bool,
    pub help_text: String,
    pub text_widget: TextWidget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateBitDataParams {
    pub bit_id: Uuid,
    pub text: String,
    pub image: Option<ImageRef>,
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;

    async fn find_group_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError>;

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    /// Load a group with every bit and its data, bits ordered by (order, created).
    async fn load_group(&self, slug: &str) -> Result<Option<LoadedGroup>, RepoError>;

    async fn find_bit(&self, id: Uuid) -> Result<Option<BitRecord>, RepoError>;

    async fn find_bit_by_context_name(
        &self,
        group_id: Uuid,
        context_name: &str,
    ) -> Result<Option<BitRecord>, RepoError>;

    async fn find_bit_data(&self, bit_id: Uuid) -> Result<Option<BitDataRecord>, RepoError>;
}

#[async_trait]
pub trait GroupsWriteRepo: Send + Sync {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError>;

    async fn update_group(&self, params: UpdateGroupParams) -> Result<GroupRecord, RepoError>;

    async fn delete_group(&self, id: Uuid) -> Result<(), RepoError>;

    /// Insert the bit and its empty data row atomically.
    async fn create_bit(&self, params: CreateBitParams) -> Result<LoadedBit, RepoError>;

    async fn update_bit(&self, params: UpdateBitParams) -> Result<BitRecord, RepoError>;

    /// Remove the bit; its data row goes with it.
    async fn delete_bit(&self, id: Uuid) -> Result<(), RepoError>;

    async fn update_bit_data(
        &self,
        params: UpdateBitDataParams,
    ) -> Result<BitDataRecord, RepoError>;

    /// Write every payload or none of them.
    async fn update_bit_data_many(
        &self,
        updates: Vec<UpdateBitDataParams>,
    ) -> Result<Vec<BitDataRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreatePageParams {
    pub url: String,
    pub title: Option<String>,
    pub template_id: Uuid,
    pub group_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdatePageParams {
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub template_id: Uuid,
    pub group_ids: Vec<Uuid>,
}

#[async_trait]
pub trait PagesRepo: Send + Sync {
    async fn list_pages(&self) -> Result<Vec<PageRecord>, RepoError>;

    async fn find_binding_by_id(&self, id: Uuid) -> Result<Option<PageBinding>, RepoError>;

    /// Exact match on the stored url.
    async fn find_binding_by_url(&self, url: &str) -> Result<Option<PageBinding>, RepoError>;
}

#[async_trait]
pub trait PagesWriteRepo: Send + Sync {
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError>;

    async fn update_page(&self, params: UpdatePageParams) -> Result<PageRecord, RepoError>;

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TemplatesRepo: Send + Sync {
    async fn list_templates(&self) -> Result<Vec<PageTemplateRecord>, RepoError>;

    async fn find_template(&self, id: Uuid) -> Result<Option<PageTemplateRecord>, RepoError>;

    async fn create_template(
        &self,
        name: &str,
        path: &str,
    ) -> Result<PageTemplateRecord, RepoError>;

    async fn delete_template(&self, id: Uuid) -> Result<(), RepoError>;
}
