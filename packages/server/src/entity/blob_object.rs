use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blob_object")]
pub struct Model {
    /// SHA-256 fingerprint, lowercase hex. The primary key is the uniqueness
    /// guarantee that keeps one physical blob per fingerprint.
    #[sea_orm(primary_key, auto_increment = false)]
    pub content_hash: String,

    /// Bytes actually written to the blob store.
    pub byte_length: i64,

    /// Opaque location understood by the blob store.
    pub storage_location: String,

    pub created_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub file_records: HasMany<super::file_record::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
