use async_trait::async_trait;
use filehub_common::storage::Fingerprint;
use futures::TryStreamExt;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, IntoCondition, LikeExpr};
use sea_orm::*;
use tracing::debug;
use uuid::Uuid;

use super::{RecordRegistry, RegistryError};
use crate::dedup::clock::RecordStamper;
use crate::dedup::model::{LogicalRecord, NewBlob, NewRecord, PhysicalBlob, RecordFilter};
use crate::dedup::stats::{FingerprintUsage, StatsAccumulator, StatsSnapshot};
use crate::entity::{blob_object, file_record};

/// Registry backed by the `blob_object` and `file_record` tables.
///
/// The primary key on `blob_object.content_hash` is what makes a blob
/// registration race-safe across processes.
#[derive(Clone)]
pub struct SeaOrmRegistry {
    db: DatabaseConnection,
    stamper: RecordStamper,
}

impl SeaOrmRegistry {
    pub fn new(db: DatabaseConnection, stamper: RecordStamper) -> Self {
        Self { db, stamper }
    }
}

/// Sizes are stored as BIGINT. Anything larger is refused, never truncated.
fn to_db_size(size: u64) -> Result<i64, RegistryError> {
    i64::try_from(size)
        .map_err(|_| DbErr::Custom(format!("size {size} does not fit in a BIGINT column")).into())
}

/// Bound for a range filter. Nothing stored exceeds `i64::MAX`.
fn size_bound(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn from_db_size(size: i64) -> u64 {
    u64::try_from(size).unwrap_or(0)
}

fn parse_fingerprint(hex: &str) -> Result<Fingerprint, RegistryError> {
    Fingerprint::from_hex(hex)
        .map_err(|e| DbErr::Custom(format!("corrupt content_hash {hex:?}: {e}")).into())
}

fn blob_from_model(model: blob_object::Model) -> Result<PhysicalBlob, RegistryError> {
    Ok(PhysicalBlob {
        fingerprint: parse_fingerprint(&model.content_hash)?,
        byte_length: from_db_size(model.byte_length),
        storage_location: model.storage_location,
        created_at: model.created_at,
    })
}

fn record_from_model(model: file_record::Model) -> Result<LogicalRecord, RegistryError> {
    Ok(LogicalRecord {
        id: model.id,
        original_filename: model.original_filename,
        declared_content_type: model.content_type,
        size: from_db_size(model.size),
        fingerprint: parse_fingerprint(&model.content_hash)?,
        created_at: model.created_at,
    })
}

/// Escape LIKE wildcard characters in a search string.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn contains_ci(column: file_record::Column, term: &str) -> impl IntoCondition {
    Expr::expr(Func::lower(Expr::col(column))).like(
        LikeExpr::new(format!("%{}%", escape_like(&term.to_lowercase()))).escape('\\'),
    )
}

#[async_trait]
impl RecordRegistry for SeaOrmRegistry {
    async fn find_blob(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<PhysicalBlob>, RegistryError> {
        blob_object::Entity::find_by_id(fingerprint.to_hex())
            .one(&self.db)
            .await?
            .map(blob_from_model)
            .transpose()
    }

    async fn commit(
        &self,
        new_blob: Option<NewBlob>,
        record: NewRecord,
    ) -> Result<LogicalRecord, RegistryError> {
        let size = to_db_size(record.size)?;
        let txn = self.db.begin().await?;

        if let Some(blob) = new_blob {
            let fingerprint = blob.fingerprint;
            let blob_model = blob_object::ActiveModel {
                content_hash: Set(fingerprint.to_hex()),
                byte_length: Set(to_db_size(blob.byte_length)?),
                storage_location: Set(blob.storage_location),
                created_at: Set(self.stamper.now()),
            };

            match blob_object::Entity::insert(blob_model)
                .exec_without_returning(&txn)
                .await
            {
                Ok(_) => {}
                Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    debug!(fingerprint = %fingerprint, "Blob registration lost the race");
                    txn.rollback().await?;
                    return Err(RegistryError::FingerprintConflict(fingerprint));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let (id, created_at) = self.stamper.stamp();
        let fingerprint = record.fingerprint;
        let record_model = file_record::ActiveModel {
            id: Set(id),
            original_filename: Set(record.original_filename),
            content_type: Set(record.declared_content_type),
            size: Set(size),
            content_hash: Set(fingerprint.to_hex()),
            created_at: Set(created_at),
        };

        let inserted = match record_model.insert(&txn).await {
            Ok(model) => model,
            Err(e) if matches!(e.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) => {
                txn.rollback().await?;
                return Err(RegistryError::MissingBlob(fingerprint));
            }
            Err(e) => return Err(e.into()),
        };

        txn.commit().await?;

        record_from_model(inserted)
    }

    async fn get(&self, id: Uuid) -> Result<Option<LogicalRecord>, RegistryError> {
        file_record::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(record_from_model)
            .transpose()
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<LogicalRecord>, RegistryError> {
        let mut select = file_record::Entity::find();

        if let Some(term) = filter.search.as_deref() {
            select = select.filter(contains_ci(file_record::Column::OriginalFilename, term));
        }
        if let Some(term) = filter.content_type.as_deref() {
            select = select.filter(contains_ci(file_record::Column::ContentType, term));
        }
        if let Some(min) = filter.min_size {
            select = select.filter(file_record::Column::Size.gte(size_bound(min)));
        }
        if let Some(max) = filter.max_size {
            select = select.filter(file_record::Column::Size.lte(size_bound(max)));
        }
        if let Some(start) = filter.start_date {
            select = select.filter(file_record::Column::CreatedAt.gte(start));
        }
        if let Some(end) = filter.end_date {
            select = select.filter(file_record::Column::CreatedAt.lte(end));
        }

        select
            .order_by_desc(file_record::Column::CreatedAt)
            .order_by_desc(file_record::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(record_from_model)
            .collect()
    }

    async fn stats(&self) -> Result<StatsSnapshot, RegistryError> {
        // One row per fingerprint, folded as it streams in. SUM over BIGINT is
        // NUMERIC on Postgres, hence the cast.
        let groups = file_record::Entity::find()
            .select_only()
            .column_as(file_record::Column::Size.max(), "largest")
            .column_as(Expr::cust("CAST(SUM(\"size\") AS BIGINT)"), "total")
            .column_as(file_record::Column::Id.count(), "records")
            .group_by(file_record::Column::ContentHash)
            .into_tuple::<(i64, i64, i64)>()
            .stream(&self.db)
            .await?;
        let mut groups = std::pin::pin!(groups);

        let mut acc = StatsAccumulator::default();
        while let Some((largest, total, records)) = groups.try_next().await? {
            acc.add(FingerprintUsage {
                largest: from_db_size(largest),
                total: from_db_size(total),
                records: from_db_size(records),
            });
        }
        Ok(acc.finish())
    }
}
