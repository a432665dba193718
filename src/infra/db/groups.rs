use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateBitParams, CreateGroupParams, GroupsRepo, GroupsWriteRepo, RepoError,
        UpdateBitDataParams, UpdateBitParams, UpdateGroupParams,
    },
    domain::{
        entities::{BitDataRecord, BitRecord, GroupRecord, ImageRef, LoadedBit, LoadedGroup},
        types::{BitType, TextWidget},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const GROUP_COLUMNS: &str = "id, slug, name, description, instructions, created_at, updated_at";
const BIT_COLUMNS: &str = "id, group_id, name, context_name, bit_type, sort_order, required, \
     help_text, text_widget, created_at, updated_at";
const BIT_DATA_COLUMNS: &str = "bit_id, text, image_path, image_filename, image_content_type, \
     image_size_bytes, image_checksum, image_width, image_height, updated_at";

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: Uuid,
    slug: String,
    name: String,
    description: Option<String>,
    instructions: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<GroupRow> for GroupRecord {
    fn from(row: GroupRow) -> Self {
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

#[derive(sqlx::FromRow)]
struct BitRow {
    id: Uuid,
    group_id: Uuid,
    name: String,
    context_name: String,
    bit_type: BitType,
    sort_order: i32,
    required: bool,
    help_text: String,
    text_widget: TextWidget,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<BitRow> for BitRecord {
    fn from(row: BitRow) -> Self {
        Self {
            id: row.id,
            group_id: row.group_id,
            name: row.name,
            context_name: row.context_name,
            bit_type: row.bit_type,
            sort_order: row.sort_order,
            required: row.required,
            help_text: row.help_text,
            text_widget: row.text_widget,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BitDataRow {
    bit_id: Uuid,
    text: String,
    image_path: Option<String>,
    image_filename: Option<String>,
    image_content_type: Option<String>,
    image_size_bytes: Option<i64>,
    image_checksum: Option<String>,
    image_width: Option<i32>,
    image_height: Option<i32>,
    updated_at: OffsetDateTime,
}

impl From<BitDataRow> for BitDataRecord {
    fn from(row: BitDataRow) -> Self {
        let image = match (
            row.image_path,
            row.image_filename,
            row.image_content_type,
            row.image_size_bytes,
            row.image_checksum,
        ) {
            (Some(stored_path), Some(filename), Some(content_type), Some(size_bytes), Some(checksum)) => {
                Some(ImageRef {
                    stored_path,
                    filename,
                    content_type,
                    size_bytes,
                    checksum,
                    width: row.image_width.and_then(|value| u32::try_from(value).ok()),
                    height: row.image_height.and_then(|value| u32::try_from(value).ok()),
                })
            }
            _ => None,
        };

        Self {
            bit_id: row.bit_id,
            text: row.text,
            image,
            updated_at: row.updated_at,
        }
    }
}

/// One row of the bits-with-data join used to load a whole group.
#[derive(sqlx::FromRow)]
struct LoadedBitRow {
    #[sqlx(flatten)]
    bit: BitRow,
    data_text: Option<String>,
    image_path: Option<String>,
    image_filename: Option<String>,
    image_content_type: Option<String>,
    image_size_bytes: Option<i64>,
    image_checksum: Option<String>,
    image_width: Option<i32>,
    image_height: Option<i32>,
    data_updated_at: Option<OffsetDateTime>,
}

impl From<LoadedBitRow> for LoadedBit {
    fn from(row: LoadedBitRow) -> Self {
        let data = BitDataRecord::from(BitDataRow {
            bit_id: row.bit.id,
            text: row.data_text.unwrap_or_default(),
            image_path: row.image_path,
            image_filename: row.image_filename,
            image_content_type: row.image_content_type,
            image_size_bytes: row.image_size_bytes,
            image_checksum: row.image_checksum,
            image_width: row.image_width,
            image_height: row.image_height,
            updated_at: row.data_updated_at.unwrap_or(row.bit.updated_at),
        });
        Self {
            bit: BitRecord::from(row.bit),
            data,
        }
    }
}

fn image_dimension(value: Option<u32>) -> Option<i32> {
    value.and_then(|value| i32::try_from(value).ok())
}

#[async_trait]
impl GroupsRepo for PostgresRepositories {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM bit_groups ORDER BY name, slug"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(GroupRecord::from).collect())
    }

    async fn find_group_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM bit_groups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(GroupRecord::from))
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM bit_groups WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(GroupRecord::from))
    }

    async fn load_group(&self, slug: &str) -> Result<Option<LoadedGroup>, RepoError> {
        let Some(group) = self.find_group_by_slug(slug).await? else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, LoadedBitRow>(
            r#"
            SELECT b.id, b.group_id, b.name, b.context_name, b.bit_type, b.sort_order,
                   b.required, b.help_text, b.text_widget, b.created_at, b.updated_at,
                   d.text AS data_text, d.image_path, d.image_filename, d.image_content_type,
                   d.image_size_bytes, d.image_checksum, d.image_width, d.image_height,
                   d.updated_at AS data_updated_at
            FROM bits b
            LEFT JOIN bit_data d ON d.bit_id = b.id
            WHERE b.group_id = $1
            ORDER BY b.sort_order, b.created_at, b.id
            "#,
        )
        .bind(group.id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Some(LoadedGroup {
            group,
            bits: rows.into_iter().map(LoadedBit::from).collect(),
        }))
    }

    async fn find_bit(&self, id: Uuid) -> Result<Option<BitRecord>, RepoError> {
        let row = sqlx::query_as::<_, BitRow>(&format!("SELECT {BIT_COLUMNS} FROM bits WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(BitRecord::from))
    }

    async fn find_bit_by_context_name(
        &self,
        group_id: Uuid,
        context_name: &str,
    ) -> Result<Option<BitRecord>, RepoError> {
        let row = sqlx::query_as::<_, BitRow>(&format!(
            "SELECT {BIT_COLUMNS} FROM bits WHERE group_id = $1 AND context_name = $2"
        ))
        .bind(group_id)
        .bind(context_name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(BitRecord::from))
    }

    async fn find_bit_data(&self, bit_id: Uuid) -> Result<Option<BitDataRecord>, RepoError> {
        let row = sqlx::query_as::<_, BitDataRow>(&format!(
            "SELECT {BIT_DATA_COLUMNS} FROM bit_data WHERE bit_id = $1"
        ))
        .bind(bit_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(BitDataRecord::from))
    }
}

#[async_trait]
impl GroupsWriteRepo for PostgresRepositories {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "INSERT INTO bit_groups (id, slug, name, description, instructions) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {GROUP_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&params.slug)
        .bind(&params.name)
        .bind(params.description.as_deref())
        .bind(params.instructions.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(GroupRecord::from(row))
    }

    async fn update_group(&self, params: UpdateGroupParams) -> Result<GroupRecord, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "UPDATE bit_groups \
             SET slug = $2, name = $3, description = $4, instructions = $5, updated_at = now() \
             WHERE id = $1 \
             RETURNING {GROUP_COLUMNS}"
        ))
        .bind(params.id)
        .bind(&params.slug)
        .bind(&params.name)
        .bind(params.description.as_deref())
        .bind(params.instructions.as_deref())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(GroupRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_group(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM bit_groups WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn create_bit(&self, params: CreateBitParams) -> Result<LoadedBit, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let bit = sqlx::query_as::<_, BitRow>(&format!(
            "INSERT INTO bits (id, group_id, name, context_name, bit_type, sort_order, required, \
                               help_text, text_widget) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {BIT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.group_id)
        .bind(&params.name)
        .bind(&params.context_name)
        .bind(params.bit_type)
        .bind(params.sort_order)
        .bind(params.required)
        .bind(&params.help_text)
        .bind(params.text_widget)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let data = sqlx::query_as::<_, BitDataRow>(&format!(
            "INSERT INTO bit_data (bit_id) VALUES ($1) RETURNING {BIT_DATA_COLUMNS}"
        ))
        .bind(bit.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(LoadedBit {
            bit: BitRecord::from(bit),
            data: BitDataRecord::from(data),
        })
    }

    async fn update_bit(&self, params: UpdateBitParams) -> Result<BitRecord, RepoError> {
        let row = sqlx::query_as::<_, BitRow>(&format!(
            "UPDATE bits \
             SET name = $2, context_name = $3, bit_type = $4, sort_order = $5, required = $6, \
                 help_text = $7, text_widget = $8, updated_at = now() \
             WHERE id = $1 \
             RETURNING {BIT_COLUMNS}"
        ))
        .bind(params.id)
        .bind(&params.name)
        .bind(&params.context_name)
        .bind(params.bit_type)
        .bind(params.sort_order)
        .bind(params.required)
        .bind(&params.help_text)
        .bind(params.text_widget)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(BitRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_bit(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM bits WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn update_bit_data(
        &self,
        params: UpdateBitDataParams,
    ) -> Result<BitDataRecord, RepoError> {
        write_bit_data(self.pool(), &params).await
    }

    async fn update_bit_data_many(
        &self,
        updates: Vec<UpdateBitDataParams>,
    ) -> Result<Vec<BitDataRecord>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let mut written = Vec::with_capacity(updates.len());
        for params in &updates {
            written.push(write_bit_data(&mut *tx, params).await?);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(written)
    }
}

async fn write_bit_data<'e, E>(
    executor: E,
    params: &UpdateBitDataParams,
) -> Result<BitDataRecord, RepoError>
where
    E: sqlx::PgExecutor<'e>,
{
    let image = params.image.as_ref();
    let row = sqlx::query_as::<_, BitDataRow>(&format!(
        "UPDATE bit_data \
         SET text = $2, image_path = $3, image_filename = $4, image_content_type = $5, \
             image_size_bytes = $6, image_checksum = $7, image_width = $8, \
             image_height = $9, updated_at = now() \
         WHERE bit_id = $1 \
         RETURNING {BIT_DATA_COLUMNS}"
    ))
    .bind(params.bit_id)
    .bind(&params.text)
    .bind(image.map(|image| image.stored_path.as_str()))
    .bind(image.map(|image| image.filename.as_str()))
    .bind(image.map(|image| image.content_type.as_str()))
    .bind(image.map(|image| image.size_bytes))
    .bind(image.map(|image| image.checksum.as_str()))
    .bind(image.and_then(|image| image_dimension(image.width)))
    .bind(image.and_then(|image| image_dimension(image.height)))
    .fetch_optional(executor)
    .await
    .map_err(map_sqlx_error)?;

    row.map(BitDataRecord::from).ok_or(RepoError::NotFound)
}
