use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreatePageParams, PagesRepo, PagesWriteRepo, RepoError, TemplatesRepo, UpdatePageParams,
    },
    domain::entities::{GroupRecord, PageBinding, PageRecord, PageTemplateRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const PAGE_COLUMNS: &str = "id, url, title, template_id, created_at, updated_at";
const TEMPLATE_COLUMNS: &str = "id, name, path, created_at";

#[derive(sqlx::FromRow)]
struct PageRow {
    id: Uuid,
    url: String,
    title: Option<String>,
    template_id: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PageRow> for PageRecord {
    fn from(row: PageRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            title: row.title,
            template_id: row.template_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    name: String,
    path: String,
    created_at: OffsetDateTime,
}

impl From<TemplateRow> for PageTemplateRecord {
    fn from(row: TemplateRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            path: row.path,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PageGroupRow {
    id: Uuid,
    slug: String,
    name: String,
    description: Option<String>,
    instructions: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PageGroupRow> for GroupRecord {
    fn from(row: PageGroupRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            instructions: row.instructions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    async fn load_binding(&self, page: PageRow) -> Result<PageBinding, RepoError> {
        let template = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM page_templates WHERE id = $1"
        ))
        .bind(page.template_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let groups = sqlx::query_as::<_, PageGroupRow>(
            r#"
            SELECT g.id, g.slug, g.name, g.description, g.instructions,
                   g.created_at, g.updated_at
            FROM page_groups pg
            JOIN bit_groups g ON g.id = pg.group_id
            WHERE pg.page_id = $1
            ORDER BY pg.position
            "#,
        )
        .bind(page.id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PageBinding {
            page: PageRecord::from(page),
            template: PageTemplateRecord::from(template),
            groups: groups.into_iter().map(GroupRecord::from).collect(),
        })
    }

    async fn replace_page_groups(
        tx: &mut Transaction<'_, Postgres>,
        page_id: Uuid,
        group_ids: &[Uuid],
    ) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM page_groups WHERE page_id = $1")
            .bind(page_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        for (position, group_id) in group_ids.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| RepoError::InvalidInput {
                message: "too many groups bound to one page".to_string(),
            })?;
            sqlx::query("INSERT INTO page_groups (page_id, group_id, position) VALUES ($1, $2, $3)")
                .bind(page_id)
                .bind(group_id)
                .bind(position)
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }
}

#[async_trait]
impl PagesRepo for PostgresRepositories {
    async fn list_pages(&self) -> Result<Vec<PageRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages ORDER BY url"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PageRecord::from).collect())
    }

    async fn find_binding_by_id(&self, id: Uuid) -> Result<Option<PageBinding>, RepoError> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(page) => self.load_binding(page).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_binding_by_url(&self, url: &str) -> Result<Option<PageBinding>, RepoError> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE url = $1"
        ))
        .bind(url)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(page) => self.load_binding(page).await.map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PagesWriteRepo for PostgresRepositories {
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, PageRow>(&format!(
            "INSERT INTO pages (id, url, title, template_id) VALUES ($1, $2, $3, $4) \
             RETURNING {PAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&params.url)
        .bind(params.title.as_deref())
        .bind(params.template_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::replace_page_groups(&mut tx, row.id, &params.group_ids).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(PageRecord::from(row))
    }

    async fn update_page(&self, params: UpdatePageParams) -> Result<PageRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, PageRow>(&format!(
            "UPDATE pages SET url = $2, title = $3, template_id = $4, updated_at = now() \
             WHERE id = $1 RETURNING {PAGE_COLUMNS}"
        ))
        .bind(params.id)
        .bind(&params.url)
        .bind(params.title.as_deref())
        .bind(params.template_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Self::replace_page_groups(&mut tx, row.id, &params.group_ids).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(PageRecord::from(row))
    }

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl TemplatesRepo for PostgresRepositories {
    async fn list_templates(&self) -> Result<Vec<PageTemplateRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM page_templates ORDER BY name"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PageTemplateRecord::from).collect())
    }

    async fn find_template(&self, id: Uuid) -> Result<Option<PageTemplateRecord>, RepoError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM page_templates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PageTemplateRecord::from))
    }

    async fn create_template(
        &self,
        name: &str,
        path: &str,
    ) -> Result<PageTemplateRecord, RepoError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "INSERT INTO page_templates (id, name, path) VALUES ($1, $2, $3) \
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PageTemplateRecord::from(row))
    }

    async fn delete_template(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM page_templates WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
