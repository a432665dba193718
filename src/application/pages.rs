//! Page and template binding: which groups and template serve a URL.

use std::{collections::HashSet, path::Component, path::Path, sync::Arc};

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreatePageParams, GroupsRepo, PagesRepo, PagesWriteRepo, RepoError, TemplatesRepo,
        UpdatePageParams,
    },
    domain::entities::{PageBinding, PageRecord, PageTemplateRecord},
};

const SOURCE: &str = "pagebits::application::pages";

#[derive(Debug, Error)]
pub enum PageError {
    #[error("{0}")]
    Validation(String),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Everything the public surface needs to render a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPage {
    pub page: PageRecord,
    pub template_path: String,
    pub groups: Vec<String>,
}

impl From<PageBinding> for ResolvedPage {
    fn from(binding: PageBinding) -> Self {
        let groups = binding.group_slugs();
        Self {
            page: binding.page,
            template_path: binding.template.path,
            groups,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageCommand {
    pub url: String,
    pub title: Option<String>,
    pub template_id: Uuid,
    /// Assembly order of the page's groups.
    pub group_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct TemplateCommand {
    pub name: String,
    pub path: String,
}

/// Stored page URLs carry no leading slash: `/about/` is stored as `about/`.
pub fn normalize_page_url(path: &str) -> &str {
    path.trim_start_matches('/')
}

#[derive(Clone)]
pub struct PageService {
    pages: Arc<dyn PagesRepo>,
    writer: Arc<dyn PagesWriteRepo>,
    templates: Arc<dyn TemplatesRepo>,
    groups: Arc<dyn GroupsRepo>,
}

impl PageService {
    pub fn new(
        pages: Arc<dyn PagesRepo>,
        writer: Arc<dyn PagesWriteRepo>,
        templates: Arc<dyn TemplatesRepo>,
        groups: Arc<dyn GroupsRepo>,
    ) -> Self {
        Self {
            pages,
            writer,
            templates,
            groups,
        }
    }

    /// Look up the page bound to a request path. `None` means no page.
    pub async fn resolve_page(&self, path: &str) -> Result<Option<ResolvedPage>, PageError> {
        let url = normalize_page_url(path);
        let binding = self.pages.find_binding_by_url(url).await?;
        Ok(binding.map(ResolvedPage::from))
    }

    pub async fn list_pages(&self) -> Result<Vec<PageRecord>, PageError> {
        Ok(self.pages.list_pages().await?)
    }

    pub async fn load_page(&self, id: Uuid) -> Result<PageBinding, PageError> {
        self.pages
            .find_binding_by_id(id)
            .await?
            .ok_or(PageError::NotFound { entity: "page" })
    }

    pub async fn create_page(&self, command: PageCommand) -> Result<PageBinding, PageError> {
        let url = normalize_url_input(&command.url)?;
        self.check_bindings(command.template_id, &command.group_ids)
            .await?;

        let page = self
            .writer
            .create_page(CreatePageParams {
                url,
                title: non_blank(command.title),
                template_id: command.template_id,
                group_ids: command.group_ids,
            })
            .await
            .map_err(duplicate_url)?;

        info!(target = SOURCE, url = %page.url, "page created");
        self.load_page(page.id).await
    }

    pub async fn update_page(
        &self,
        id: Uuid,
        command: PageCommand,
    ) -> Result<PageBinding, PageError> {
        self.load_page(id).await?;
        let url = normalize_url_input(&command.url)?;
        self.check_bindings(command.template_id, &command.group_ids)
            .await?;

        let page = self
            .writer
            .update_page(UpdatePageParams {
                id,
                url,
                title: non_blank(command.title),
                template_id: command.template_id,
                group_ids: command.group_ids,
            })
            .await
            .map_err(duplicate_url)?;

        self.load_page(page.id).await
    }

    pub async fn delete_page(&self, id: Uuid) -> Result<(), PageError> {
        self.load_page(id).await?;
        self.writer.delete_page(id).await?;
        info!(target = SOURCE, page = %id, "page deleted");
        Ok(())
    }

    pub async fn list_templates(&self) -> Result<Vec<PageTemplateRecord>, PageError> {
        Ok(self.templates.list_templates().await?)
    }

    pub async fn create_template(
        &self,
        command: TemplateCommand,
    ) -> Result<PageTemplateRecord, PageError> {
        let name = command.name.trim();
        if name.is_empty() {
            return Err(PageError::Validation(
                "template name must not be empty".to_string(),
            ));
        }
        let path = validate_template_path(&command.path)?;

        self.templates
            .create_template(name, &path)
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => PageError::Validation(format!(
                    "A template named '{name}' already exists"
                )),
                other => PageError::Repo(other),
            })
    }

    /// Templates still used by a page cannot be removed.
    pub async fn delete_template(&self, id: Uuid) -> Result<(), PageError> {
        self.templates
            .find_template(id)
            .await?
            .ok_or(PageError::NotFound { entity: "template" })?;

        self.templates
            .delete_template(id)
            .await
            .map_err(|err| match err {
                RepoError::Integrity { .. } | RepoError::InvalidInput { .. } => {
                    PageError::Validation("template is still used by a page".to_string())
                }
                other => PageError::Repo(other),
            })
    }

    async fn check_bindings(&self, template_id: Uuid, group_ids: &[Uuid]) -> Result<(), PageError> {
        self.templates
            .find_template(template_id)
            .await?
            .ok_or(PageError::NotFound { entity: "template" })?;

        if group_ids.is_empty() {
            return Err(PageError::Validation(
                "a page needs at least one group".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for id in group_ids {
            if !seen.insert(*id) {
                return Err(PageError::Validation(format!(
                    "group {id} is listed more than once"
                )));
            }
            self.groups
                .find_group_by_id(*id)
                .await?
                .ok_or(PageError::NotFound { entity: "group" })?;
        }
        Ok(())
    }
}

fn normalize_url_input(raw: &str) -> Result<String, PageError> {
    let url = normalize_page_url(raw.trim());
    if url.chars().any(char::is_whitespace) {
        return Err(PageError::Validation(
            "page url must not contain whitespace".to_string(),
        ));
    }
    if url.contains(['?', '#']) {
        return Err(PageError::Validation(
            "page url must not contain a query or fragment".to_string(),
        ));
    }
    if url.split('/').any(|segment| segment == "..") {
        return Err(PageError::Validation(
            "page url must not contain `..` segments".to_string(),
        ));
    }
    Ok(url.to_string())
}

fn validate_template_path(raw: &str) -> Result<String, PageError> {
    let path = raw.trim();
    if path.is_empty() {
        return Err(PageError::Validation(
            "template path must not be empty".to_string(),
        ));
    }
    let escapes = Path::new(path)
        .components()
        .any(|component| !matches!(component, Component::Normal(_)));
    if escapes {
        return Err(PageError::Validation(format!(
            "template path `{path}` must be relative to the templates directory"
        )));
    }
    Ok(path.to_string())
}

fn duplicate_url(err: RepoError) -> PageError {
    match err {
        RepoError::Duplicate { .. } => {
            PageError::Validation("A page with this url already exists".to_string())
        }
        other => PageError::Repo(other),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_slashes_are_stripped() {
        assert_eq!(normalize_page_url("/about/"), "about/");
        assert_eq!(normalize_page_url("about/"), "about/");
        assert_eq!(normalize_page_url("/"), "");
    }

    #[test]
    fn url_input_rejects_traversal_and_queries() {
        assert_eq!(normalize_url_input(" /team/ ").expect("valid"), "team/");
        assert!(normalize_url_input("a/../b").is_err());
        assert!(normalize_url_input("about/?x=1").is_err());
        assert!(normalize_url_input("about us/").is_err());
    }

    #[test]
    fn template_paths_stay_inside_the_directory() {
        assert_eq!(
            validate_template_path("pages/about.html").expect("valid"),
            "pages/about.html"
        );
        assert!(validate_template_path("/etc/passwd").is_err());
        assert!(validate_template_path("../secret.html").is_err());
        assert!(validate_template_path("./about.html").is_err());
    }

    #[test]
    fn resolved_page_keeps_group_order() {
        let now = time::OffsetDateTime::now_utc();
        let group = |slug: &str| crate::domain::entities::GroupRecord {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: slug.to_string(),
            description: None,
            instructions: None,
            created_at: now,
            updated_at: now,
        };
        let page = PageRecord {
            id: Uuid::new_v4(),
            url: "about/".to_string(),
            title: None,
            template_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        let binding = PageBinding {
            page: page.clone(),
            template: PageTemplateRecord {
                id: page.template_id,
                name: "About".to_string(),
                path: "about.html".to_string(),
                created_at: now,
            },
            groups: vec![group("testgroup"), group("footer")],
        };

        let resolved = ResolvedPage::from(binding);
        assert_eq!(
            resolved,
            ResolvedPage {
                page,
                template_path: "about.html".to_string(),
                groups: vec!["testgroup".to_string(), "footer".to_string()],
            }
        );
    }
}
