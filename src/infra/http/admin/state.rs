use std::sync::Arc;

use crate::application::{assemble::ContextAssembler, content::ContentService, pages::PageService};
use crate::infra::{
    db::PostgresRepositories,
    uploads::{MediaUrls, UploadStorage},
};

#[derive(Clone)]
pub struct AdminState {
    pub content: Arc<ContentService>,
    pub pages: Arc<PageService>,
    pub assembler: ContextAssembler,
    pub upload_storage: Arc<UploadStorage>,
    pub media: MediaUrls,
    pub db: Option<Arc<PostgresRepositories>>,
}
