//! In-memory repositories and wiring shared by the integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use pagebits::application::{
    assemble::ContextAssembler,
    content::{ContentService, CreateBitCommand, CreateGroupCommand},
    events::ContentNotifier,
    groups::{GroupCacheConfig, GroupRepository},
    pages::PageService,
    repos::{
        CreateBitParams, CreateGroupParams, CreatePageParams, GroupsRepo, GroupsWriteRepo,
        PagesRepo, PagesWriteRepo, RepoError, TemplatesRepo, UpdateBitDataParams,
        UpdateBitParams, UpdateGroupParams, UpdatePageParams,
    },
};
use pagebits::cache::{CacheStore, MokaStore};
use pagebits::domain::{
    entities::{
        BitDataRecord, BitRecord, GroupRecord, LoadedBit, LoadedGroup, PageBinding, PageRecord,
        PageTemplateRecord,
    },
    types::{BitType, TextWidget},
};

#[derive(Default)]
struct Tables {
    groups: Vec<GroupRecord>,
    bits: Vec<BitRecord>,
    data: HashMap<Uuid, BitDataRecord>,
    templates: Vec<PageTemplateRecord>,
    pages: Vec<PageRecord>,
    page_groups: HashMap<Uuid, Vec<Uuid>>,
}

/// Behaves like the Postgres schema: unique keys, cascades and the
/// template delete restriction.
#[derive(Default)]
pub struct MemoryRepos {
    tables: Mutex<Tables>,
    group_loads: AtomicUsize,
}

impl MemoryRepos {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of times a full group has been loaded from "persistence".
    pub fn group_loads(&self) -> usize {
        self.group_loads.load(Ordering::SeqCst)
    }

    pub async fn bit_data_count(&self) -> usize {
        self.tables.lock().await.data.len()
    }

    pub async fn bit_data_for(&self, bit_id: Uuid) -> Option<BitDataRecord> {
        self.tables.lock().await.data.get(&bit_id).cloned()
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

fn duplicate(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

impl Tables {
    fn load_group(&self, group: &GroupRecord) -> LoadedGroup {
        let mut bits: Vec<&BitRecord> = self
            .bits
            .iter()
            .filter(|bit| bit.group_id == group.id)
            .collect();
        bits.sort_by_key(|bit| (bit.sort_order, bit.created_at));

        LoadedGroup {
            group: group.clone(),
            bits: bits
                .into_iter()
                .map(|bit| LoadedBit {
                    bit: bit.clone(),
                    data: self
                        .data
                        .get(&bit.id)
                        .cloned()
                        .unwrap_or_else(|| BitDataRecord::empty(bit.id, bit.created_at)),
                })
                .collect(),
        }
    }

    fn binding(&self, page: &PageRecord) -> Option<PageBinding> {
        let template = self
            .templates
            .iter()
            .find(|template| template.id == page.template_id)?
            .clone();
        let groups = self
            .page_groups
            .get(&page.id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.groups.iter().find(|group| group.id == *id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Some(PageBinding {
            page: page.clone(),
            template,
            groups,
        })
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepos {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.tables.lock().await.groups.clone();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn find_group_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.id == id).cloned())
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn load_group(&self, slug: &str) -> Result<Option<LoadedGroup>, RepoError> {
        self.group_loads.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().await;
        Ok(tables
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .map(|group| tables.load_group(group)))
    }

    async fn find_bit(&self, id: Uuid) -> Result<Option<BitRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.bits.iter().find(|bit| bit.id == id).cloned())
    }

    async fn find_bit_by_context_name(
        &self,
        group_id: Uuid,
        context_name: &str,
    ) -> Result<Option<BitRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bits
            .iter()
            .find(|bit| bit.group_id == group_id && bit.context_name == context_name)
            .cloned())
    }

    async fn find_bit_data(&self, bit_id: Uuid) -> Result<Option<BitDataRecord>, RepoError> {
        Ok(self.tables.lock().await.data.get(&bit_id).cloned())
    }
}

#[async_trait]
impl GroupsWriteRepo for MemoryRepos {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(duplicate("bit_groups_slug_key"));
        }
        let at = now();
        let group = GroupRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            name: params.name,
            description: params.description,
            instructions: params.instructions,
            created_at: at,
            updated_at: at,
        };
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn update_group(&self, params: UpdateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables
            .groups
            .iter()
            .any(|group| group.slug == params.slug && group.id != params.id)
        {
            return Err(duplicate("bit_groups_slug_key"));
        }
        let group = tables
            .groups
            .iter_mut()
            .find(|group| group.id == params.id)
            .ok_or(RepoError::NotFound)?;
        group.slug = params.slug;
        group.name = params.name;
        group.description = params.description;
        group.instructions = params.instructions;
        group.updated_at = now();
        Ok(group.clone())
    }

    async fn delete_group(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.groups.len();
        tables.groups.retain(|group| group.id != id);
        if tables.groups.len() == before {
            return Err(RepoError::NotFound);
        }
        let removed: Vec<Uuid> = tables
            .bits
            .iter()
            .filter(|bit| bit.group_id == id)
            .map(|bit| bit.id)
            .collect();
        tables.bits.retain(|bit| bit.group_id != id);
        for bit_id in removed {
            tables.data.remove(&bit_id);
        }
        for groups in tables.page_groups.values_mut() {
            groups.retain(|group_id| *group_id != id);
        }
        Ok(())
    }

    async fn create_bit(&self, params: CreateBitParams) -> Result<LoadedBit, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables
            .bits
            .iter()
            .any(|bit| bit.group_id == params.group_id && bit.context_name == params.context_name)
        {
            return Err(duplicate("bits_group_context_name_key"));
        }
        let at = now();
        let bit = BitRecord {
            id: Uuid::new_v4(),
            group_id: params.group_id,
            name: params.name,
            context_name: params.context_name,
            bit_type: params.bit_type,
            sort_order: params.sort_order,
            required: params.required,
            help_text: params.help_text,
            text_widget: params.text_widget,
            created_at: at,
            updated_at: at,
        };
        let data = BitDataRecord::empty(bit.id, at);
        tables.bits.push(bit.clone());
        tables.data.insert(bit.id, data.clone());
        Ok(LoadedBit { bit, data })
    }

    async fn update_bit(&self, params: UpdateBitParams) -> Result<BitRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let group_id = tables
            .bits
            .iter()
            .find(|bit| bit.id == params.id)
            .map(|bit| bit.group_id)
            .ok_or(RepoError::NotFound)?;
        if tables.bits.iter().any(|bit| {
            bit.group_id == group_id && bit.context_name == params.context_name && bit.id != params.id
        }) {
            return Err(duplicate("bits_group_context_name_key"));
        }
        let bit = tables
            .bits
            .iter_mut()
            .find(|bit| bit.id == params.id)
            .ok_or(RepoError::NotFound)?;
        bit.name = params.name;
        bit.context_name = params.context_name;
        bit.bit_type = params.bit_type;
        bit.sort_order = params.sort_order;
        bit.required = params.required;
        bit.help_text = params.help_text;
        bit.text_widget = params.text_widget;
        bit.updated_at = now();
        Ok(bit.clone())
    }

    async fn delete_bit(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.bits.len();
        tables.bits.retain(|bit| bit.id != id);
        if tables.bits.len() == before {
            return Err(RepoError::NotFound);
        }
        tables.data.remove(&id);
        Ok(())
    }

    async fn update_bit_data(
        &self,
        params: UpdateBitDataParams,
    ) -> Result<BitDataRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let data = tables
            .data
            .get_mut(&params.bit_id)
            .ok_or(RepoError::NotFound)?;
        data.text = params.text;
        data.image = params.image;
        data.updated_at = now();
        Ok(data.clone())
    }

    async fn update_bit_data_many(
        &self,
        updates: Vec<UpdateBitDataParams>,
    ) -> Result<Vec<BitDataRecord>, RepoError> {
        let mut tables = self.tables.lock().await;
        if updates
            .iter()
            .any(|params| !tables.data.contains_key(&params.bit_id))
        {
            return Err(RepoError::NotFound);
        }
        let at = now();
        let mut written = Vec::with_capacity(updates.len());
        for params in updates {
            if let Some(data) = tables.data.get_mut(&params.bit_id) {
                data.text = params.text;
                data.image = params.image;
                data.updated_at = at;
                written.push(data.clone());
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl PagesRepo for MemoryRepos {
    async fn list_pages(&self) -> Result<Vec<PageRecord>, RepoError> {
        let mut pages = self.tables.lock().await.pages.clone();
        pages.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(pages)
    }

    async fn find_binding_by_id(&self, id: Uuid) -> Result<Option<PageBinding>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .pages
            .iter()
            .find(|page| page.id == id)
            .and_then(|page| tables.binding(page)))
    }

    async fn find_binding_by_url(&self, url: &str) -> Result<Option<PageBinding>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .pages
            .iter()
            .find(|page| page.url == url)
            .and_then(|page| tables.binding(page)))
    }
}

#[async_trait]
impl PagesWriteRepo for MemoryRepos {
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.pages.iter().any(|page| page.url == params.url) {
            return Err(duplicate("pages_url_key"));
        }
        let at = now();
        let page = PageRecord {
            id: Uuid::new_v4(),
            url: params.url,
            title: params.title,
            template_id: params.template_id,
            created_at: at,
            updated_at: at,
        };
        tables.page_groups.insert(page.id, params.group_ids);
        tables.pages.push(page.clone());
        Ok(page)
    }

    async fn update_page(&self, params: UpdatePageParams) -> Result<PageRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables
            .pages
            .iter()
            .any(|page| page.url == params.url && page.id != params.id)
        {
            return Err(duplicate("pages_url_key"));
        }
        let page = tables
            .pages
            .iter_mut()
            .find(|page| page.id == params.id)
            .ok_or(RepoError::NotFound)?;
        page.url = params.url;
        page.title = params.title;
        page.template_id = params.template_id;
        page.updated_at = now();
        let page = page.clone();
        tables.page_groups.insert(page.id, params.group_ids);
        Ok(page)
    }

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.pages.len();
        tables.pages.retain(|page| page.id != id);
        if tables.pages.len() == before {
            return Err(RepoError::NotFound);
        }
        tables.page_groups.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TemplatesRepo for MemoryRepos {
    async fn list_templates(&self) -> Result<Vec<PageTemplateRecord>, RepoError> {
        Ok(self.tables.lock().await.templates.clone())
    }

    async fn find_template(&self, id: Uuid) -> Result<Option<PageTemplateRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .templates
            .iter()
            .find(|template| template.id == id)
            .cloned())
    }

    async fn create_template(
        &self,
        name: &str,
        path: &str,
    ) -> Result<PageTemplateRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.templates.iter().any(|template| template.name == name) {
            return Err(duplicate("page_templates_name_key"));
        }
        let template = PageTemplateRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            path: path.to_string(),
            created_at: now(),
        };
        tables.templates.push(template.clone());
        Ok(template)
    }

    async fn delete_template(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.pages.iter().any(|page| page.template_id == id) {
            return Err(RepoError::InvalidInput {
                message: "template is referenced by a page".to_string(),
            });
        }
        let before = tables.templates.len();
        tables.templates.retain(|template| template.id != id);
        if tables.templates.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

/// Services wired over one `MemoryRepos`, as `main` wires them over Postgres.
pub struct Harness {
    pub repos: Arc<MemoryRepos>,
    pub groups: Arc<GroupRepository>,
    pub content: Arc<ContentService>,
    pub assembler: ContextAssembler,
    pub pages: Arc<PageService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(3600))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let repos = MemoryRepos::new();
        let cache: Arc<dyn CacheStore<Arc<LoadedGroup>>> =
            Arc::new(MokaStore::<Arc<LoadedGroup>>::new(1_000));
        let groups = Arc::new(GroupRepository::new(
            repos.clone(),
            cache,
            GroupCacheConfig {
                key_prefix: "pagebits".to_string(),
                ttl,
            },
        ));

        let notifier = ContentNotifier::new();
        notifier.subscribe(groups.clone());

        let content = Arc::new(ContentService::new(repos.clone(), repos.clone(), notifier));
        let assembler = ContextAssembler::new(groups.clone());
        let pages = Arc::new(PageService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
        ));

        Self {
            repos,
            groups,
            content,
            assembler,
            pages,
        }
    }

    pub async fn group(&self, name: &str, slug: &str) -> GroupRecord {
        self.content
            .create_group(CreateGroupCommand {
                name: name.to_string(),
                slug: Some(slug.to_string()),
                description: None,
                instructions: None,
            })
            .await
            .expect("group created")
    }

    pub async fn bit(
        &self,
        group: &GroupRecord,
        name: &str,
        context_name: &str,
        bit_type: BitType,
        sort_order: i32,
    ) -> LoadedBit {
        self.content
            .create_bit(CreateBitCommand {
                group_id: group.id,
                name: name.to_string(),
                context_name: Some(context_name.to_string()),
                bit_type,
                sort_order: Some(sort_order),
                required: false,
                help_text: String::new(),
                text_widget: TextWidget::CharField,
            })
            .await
            .expect("bit created")
    }

    pub async fn set_text(&self, bit: &LoadedBit, text: &str) {
        self.content
            .update_bit_data(UpdateBitDataParams {
                bit_id: bit.bit.id,
                text: text.to_string(),
                image: None,
            })
            .await
            .expect("bit data updated");
    }
}

/// Write `files` (relative path, contents) below `root`.
pub fn write_templates(root: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("template dir");
        }
        std::fs::write(path, contents).expect("template written");
    }
}
