use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_record")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Filename as supplied by the uploader.
    pub original_filename: String,

    /// Content type as declared by the uploader.
    pub content_type: String,

    /// Declared size in bytes.
    pub size: i64,

    #[sea_orm(indexed)]
    pub content_hash: String,

    #[sea_orm(belongs_to, from = "content_hash", to = "content_hash")]
    pub blob_object: HasOne<super::blob_object::Entity>,

    #[sea_orm(indexed)]
    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
