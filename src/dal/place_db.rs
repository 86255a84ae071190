use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgQueryResult, PgPool};

use crate::domain::place::NormalizedRecord;

/// Durable record store. The crawler only ever seeds its ledger from it and
/// appends to it.
#[async_trait]
pub trait PlaceStore: Send + Sync {
    async fn known_ids(&self, region: &str) -> anyhow::Result<HashSet<String>>;

    async fn upsert(&self, record: &NormalizedRecord) -> anyhow::Result<()>;

    async fn browse(&self, query: &PlaceQuery) -> anyhow::Result<Vec<PlaceRow>>;
}

/// Used when no database is configured: nothing is remembered across runs.
pub struct NoopPlaceStore;

#[async_trait]
impl PlaceStore for NoopPlaceStore {
    async fn known_ids(&self, _region: &str) -> anyhow::Result<HashSet<String>> {
        Ok(HashSet::new())
    }

    async fn upsert(&self, _record: &NormalizedRecord) -> anyhow::Result<()> {
        Ok(())
    }

    async fn browse(&self, _query: &PlaceQuery) -> anyhow::Result<Vec<PlaceRow>> {
        Ok(vec![])
    }
}

pub struct PgPlaceStore {
    pool: PgPool,
}

impl PgPlaceStore {
    pub fn new(pool: PgPool) -> Self {
        PgPlaceStore { pool }
    }
}

#[async_trait]
impl PlaceStore for PgPlaceStore {
    async fn known_ids(&self, region: &str) -> anyhow::Result<HashSet<String>> {
        let ids = get_place_ids_for_region(&self.pool, region).await?;
        Ok(HashSet::from_iter(ids))
    }

    async fn upsert(&self, record: &NormalizedRecord) -> anyhow::Result<()> {
        upsert_place(&self.pool, record).await?;
        Ok(())
    }

    async fn browse(&self, query: &PlaceQuery) -> anyhow::Result<Vec<PlaceRow>> {
        Ok(list_places(&self.pool, query).await?)
    }
}

pub async fn get_place_ids_for_region(
    pool: &PgPool,
    region: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r"
        select
            place_id
        from
            place
        where
            region = $1
        ",
    )
    .bind(region)
    .fetch_all(pool)
    .await
}

pub async fn upsert_place(
    pool: &PgPool,
    record: &NormalizedRecord,
) -> Result<PgQueryResult, sqlx::Error> {
    sqlx::query(
        r"
        insert into place
            (region, place_id, search_term, location_label, sub_region, name, address,
             phone, website, rating, review_count, category, opening_hours, price_level,
             description, latitude, longitude)
        values
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        on conflict(region, place_id) do update set
            search_term = excluded.search_term,
            location_label = excluded.location_label,
            sub_region = excluded.sub_region,
            name = excluded.name,
            address = excluded.address,
            phone = excluded.phone,
            website = excluded.website,
            rating = excluded.rating,
            review_count = excluded.review_count,
            category = excluded.category,
            opening_hours = excluded.opening_hours,
            price_level = excluded.price_level,
            description = excluded.description,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            updated_at = now()
        ",
    )
    .bind(&record.region)
    .bind(&record.place_id)
    .bind(&record.search_term)
    .bind(&record.location_label)
    .bind(&record.sub_region)
    .bind(&record.name)
    .bind(&record.address)
    .bind(&record.phone)
    .bind(&record.website)
    .bind(record.rating)
    .bind(record.review_count.map(|c| i64::try_from(c).unwrap_or(i64::MAX)))
    .bind(&record.category)
    .bind(&record.opening_hours)
    .bind(&record.price_level)
    .bind(&record.description)
    .bind(record.latitude)
    .bind(record.longitude)
    .execute(pool)
    .await
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceQuery {
    pub region: String,
    #[serde(default)]
    pub require_phone: bool,
    #[serde(default)]
    pub require_website: bool,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

const MAX_PER_PAGE: u32 = 200;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    50
}

impl PlaceQuery {
    fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, MAX_PER_PAGE))
    }

    fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PlaceRow {
    pub place_id: String,
    pub search_term: String,
    pub location_label: String,
    pub sub_region: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub category: Option<String>,
}

pub async fn list_places(pool: &PgPool, query: &PlaceQuery) -> Result<Vec<PlaceRow>, sqlx::Error> {
    sqlx::query_as::<_, PlaceRow>(
        r"
        select
            place_id,
            search_term,
            location_label,
            sub_region,
            name,
            address,
            phone,
            website,
            rating,
            review_count,
            category
        from
            place
        where
            region = $1 and
            (not $2 or phone is not null) and
            (not $3 or website is not null)
        order by created_at desc
        limit $4
        offset $5
        ",
    )
    .bind(query.region.trim().to_lowercase())
    .bind(query.require_phone)
    .bind(query.require_website)
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(pool)
    .await
}
