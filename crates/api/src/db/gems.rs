//! Gem listing repository.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgConnection, PgPool, Postgres};

use gemvault_core::{GemId, GemImageId, GemStatus, Price, UserId};

use super::{Pagination, RepositoryError};
use crate::models::gem::MAX_GEM_IMAGES;
use crate::models::{Gem, GemDetail, GemImage, GemSummary, GemTypeCount};

const GEM_COLUMNS: &str = "id, seller_id, name, gem_type, description, price, carat, color, \
     clarity, cut, shape, origin, treatment, certificate_number, certificate_lab, \
     certificate_file, stock_quantity, status, rejection_reason, created_at, updated_at";

const SUMMARY_SELECT: &str = r"
    SELECT g.id, g.seller_id, s.business_name AS seller_name, g.name, g.gem_type, g.price,
           g.carat, g.color, g.shape, g.origin, g.stock_quantity, g.status,
           (SELECT i.image_url FROM gem_images i
             WHERE i.gem_id = g.id
             ORDER BY i.is_primary DESC, i.sort_order, i.id
             LIMIT 1) AS primary_image,
           g.created_at
    FROM gems g
    JOIN sellers s ON s.user_id = g.seller_id
";

const SEARCH_FILTER: &str = r"
    WHERE g.status = 'approved'
      AND ($1::text IS NULL OR g.name ILIKE $1 OR g.gem_type ILIKE $1 OR g.description ILIKE $1)
      AND ($2::text IS NULL OR LOWER(g.gem_type) = LOWER($2))
      AND ($3::text IS NULL OR LOWER(g.color) = LOWER($3))
      AND ($4::text IS NULL OR LOWER(g.shape) = LOWER($4))
      AND ($5::text IS NULL OR LOWER(g.origin) = LOWER($5))
      AND ($6::numeric IS NULL OR g.price >= $6)
      AND ($7::numeric IS NULL OR g.price <= $7)
      AND ($8::numeric IS NULL OR g.carat >= $8)
      AND ($9::numeric IS NULL OR g.carat <= $9)
      AND ($10::int IS NULL OR g.seller_id = $10)
";

const DUPLICATE_CERTIFICATE: &str = "A gem with this certificate number already exists";

/// Reject an append that would take a listing past [`MAX_GEM_IMAGES`].
fn check_image_capacity(existing: i64, adding: usize) -> Result<(), RepositoryError> {
    let existing = usize::try_from(existing).unwrap_or(usize::MAX);
    if existing.saturating_add(adding) > MAX_GEM_IMAGES {
        let room = MAX_GEM_IMAGES.saturating_sub(existing);
        return Err(RepositoryError::Invalid(format!(
            "A gem can have at most {MAX_GEM_IMAGES} images; {room} more can be added"
        )));
    }
    Ok(())
}

/// Catalog sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GemSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    CaratDesc,
}

impl GemSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "g.created_at DESC, g.id DESC",
            Self::PriceAsc => "g.price ASC, g.id DESC",
            Self::PriceDesc => "g.price DESC, g.id DESC",
            Self::CaratDesc => "g.carat DESC, g.id DESC",
        }
    }
}

/// Catalog search filters. Text filters match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct GemSearch {
    pub q: Option<String>,
    pub gem_type: Option<String>,
    pub color: Option<String>,
    pub shape: Option<String>,
    pub origin: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_carat: Option<Decimal>,
    pub max_carat: Option<Decimal>,
    pub seller_id: Option<UserId>,
    pub sort: GemSort,
}

impl GemSearch {
    fn bind<'q, O>(
        &'q self,
        query: QueryAs<'q, Postgres, O, PgArguments>,
        pattern: &'q Option<String>,
    ) -> QueryAs<'q, Postgres, O, PgArguments> {
        query
            .bind(pattern)
            .bind(&self.gem_type)
            .bind(&self.color)
            .bind(&self.shape)
            .bind(&self.origin)
            .bind(self.min_price)
            .bind(self.max_price)
            .bind(self.min_carat)
            .bind(self.max_carat)
            .bind(self.seller_id)
    }
}

/// Fields of a new listing.
#[derive(Debug, Clone)]
pub struct NewGem {
    pub name: String,
    pub gem_type: String,
    pub description: Option<String>,
    pub price: Price,
    pub carat: Decimal,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub cut: Option<String>,
    pub shape: Option<String>,
    pub origin: Option<String>,
    pub treatment: Option<String>,
    pub certificate_number: String,
    pub certificate_lab: Option<String>,
    pub certificate_file: Option<String>,
    pub stock_quantity: i32,
}

/// Partial update of a listing; `None` keeps the current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GemUpdate {
    pub name: Option<String>,
    pub gem_type: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub carat: Option<Decimal>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub cut: Option<String>,
    pub shape: Option<String>,
    pub origin: Option<String>,
    pub treatment: Option<String>,
    pub certificate_number: Option<String>,
    pub certificate_lab: Option<String>,
    pub stock_quantity: Option<i32>,
}

impl GemUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.gem_type.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.carat.is_none()
            && self.color.is_none()
            && self.clarity.is_none()
            && self.cut.is_none()
            && self.shape.is_none()
            && self.origin.is_none()
            && self.treatment.is_none()
            && self.certificate_number.is_none()
            && self.certificate_lab.is_none()
            && self.stock_quantity.is_none()
    }
}

/// Files that belonged to a deleted gem.
#[derive(Debug, Clone, Default)]
pub struct DeletedGemFiles {
    pub image_urls: Vec<String>,
    pub certificate_file: Option<String>,
}

async fn images_on(conn: &mut PgConnection, gem_id: GemId) -> Result<Vec<GemImage>, sqlx::Error> {
    sqlx::query_as::<_, GemImage>(
        "SELECT id, gem_id, image_url, is_primary, sort_order FROM gem_images \
         WHERE gem_id = $1 ORDER BY sort_order, id",
    )
    .bind(gem_id)
    .fetch_all(conn)
    .await
}

async fn certificate_taken(
    conn: &mut PgConnection,
    certificate_number: &str,
    exclude: Option<GemId>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM gems WHERE certificate_number = $1 \
         AND ($2::int IS NULL OR id <> $2))",
    )
    .bind(certificate_number)
    .bind(exclude)
    .fetch_one(conn)
    .await
}

/// Repository for gem listings and their images.
pub struct GemRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GemRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Search approved gems.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        search: &GemSearch,
        pagination: Pagination,
    ) -> Result<(Vec<GemSummary>, i64), RepositoryError> {
        let pattern = search.q.as_deref().map(|q| format!("%{}%", q.trim()));

        let list_sql = format!(
            "{SUMMARY_SELECT} {SEARCH_FILTER} ORDER BY {} LIMIT $11 OFFSET $12",
            search.sort.order_by()
        );
        let items = search
            .bind(sqlx::query_as::<_, GemSummary>(&list_sql), &pattern)
            .bind(pagination.per_page)
            .bind(pagination.offset())
            .fetch_all(self.pool)
            .await?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM gems g JOIN sellers s ON s.user_id = g.seller_id {SEARCH_FILTER}"
        );
        let (total,) = search
            .bind(sqlx::query_as::<_, (i64,)>(&count_sql), &pattern)
            .fetch_one(self.pool)
            .await?;

        Ok((items, total))
    }

    /// Distinct gem types among approved listings, with counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn types(&self) -> Result<Vec<GemTypeCount>, RepositoryError> {
        let types = sqlx::query_as::<_, GemTypeCount>(
            r"
            SELECT gem_type, COUNT(*) AS count
            FROM gems
            WHERE status = 'approved'
            GROUP BY gem_type
            ORDER BY count DESC, gem_type
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(types)
    }

    /// Get a gem row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: GemId) -> Result<Option<Gem>, RepositoryError> {
        let gem = sqlx::query_as::<_, Gem>(&format!("SELECT {GEM_COLUMNS} FROM gems WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(gem)
    }

    /// Get a gem with its images and seller name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detail(&self, id: GemId) -> Result<Option<GemDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let Some(gem) =
            sqlx::query_as::<_, Gem>(&format!("SELECT {GEM_COLUMNS} FROM gems WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
        else {
            return Ok(None);
        };
        Ok(Some(Self::detail_on(&mut *conn, gem).await?))
    }

    async fn detail_on(conn: &mut PgConnection, gem: Gem) -> Result<GemDetail, RepositoryError> {
        let seller_name: String =
            sqlx::query_scalar("SELECT business_name FROM sellers WHERE user_id = $1")
                .bind(gem.seller_id)
                .fetch_one(&mut *conn)
                .await?;
        let images = images_on(conn, gem.id).await?;
        Ok(GemDetail {
            gem,
            seller_name,
            images,
        })
    }

    /// Create a pending listing with its images in one transaction.
    /// The first image is the primary one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the certificate number is taken.
    pub async fn create(
        &self,
        seller_id: UserId,
        new_gem: &NewGem,
        image_urls: &[String],
    ) -> Result<GemDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if certificate_taken(&mut *tx, &new_gem.certificate_number, None).await? {
            return Err(RepositoryError::Conflict(DUPLICATE_CERTIFICATE.to_string()));
        }

        let gem = sqlx::query_as::<_, Gem>(&format!(
            r"
            INSERT INTO gems (seller_id, name, gem_type, description, price, carat, color,
                              clarity, cut, shape, origin, treatment, certificate_number,
                              certificate_lab, certificate_file, stock_quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {GEM_COLUMNS}
            "
        ))
        .bind(seller_id)
        .bind(&new_gem.name)
        .bind(&new_gem.gem_type)
        .bind(&new_gem.description)
        .bind(new_gem.price)
        .bind(new_gem.carat)
        .bind(&new_gem.color)
        .bind(&new_gem.clarity)
        .bind(&new_gem.cut)
        .bind(&new_gem.shape)
        .bind(&new_gem.origin)
        .bind(&new_gem.treatment)
        .bind(&new_gem.certificate_number)
        .bind(&new_gem.certificate_lab)
        .bind(&new_gem.certificate_file)
        .bind(new_gem.stock_quantity)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, DUPLICATE_CERTIFICATE))?;

        for (position, url) in (0_i32..).zip(image_urls) {
            sqlx::query(
                "INSERT INTO gem_images (gem_id, image_url, is_primary, sort_order) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(gem.id)
            .bind(url)
            .bind(position == 0)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        let detail = Self::detail_on(&mut *tx, gem).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Apply a partial update. Any change to an approved, rejected or sold-out
    /// listing sends it back to review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the gem does not exist.
    /// Returns `RepositoryError::Conflict` if the new certificate number is taken.
    pub async fn update(&self, id: GemId, update: &GemUpdate) -> Result<Gem, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(number) = &update.certificate_number
            && certificate_taken(&mut *tx, number, Some(id)).await?
        {
            return Err(RepositoryError::Conflict(DUPLICATE_CERTIFICATE.to_string()));
        }

        let gem = sqlx::query_as::<_, Gem>(&format!(
            r"
            UPDATE gems
            SET name = COALESCE($2, name),
                gem_type = COALESCE($3, gem_type),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                carat = COALESCE($6, carat),
                color = COALESCE($7, color),
                clarity = COALESCE($8, clarity),
                cut = COALESCE($9, cut),
                shape = COALESCE($10, shape),
                origin = COALESCE($11, origin),
                treatment = COALESCE($12, treatment),
                certificate_number = COALESCE($13, certificate_number),
                certificate_lab = COALESCE($14, certificate_lab),
                stock_quantity = COALESCE($15, stock_quantity),
                status = CASE
                    WHEN status IN ('approved', 'rejected', 'sold_out') THEN 'pending'::gem_status
                    ELSE status
                END,
                rejection_reason = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {GEM_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.gem_type)
        .bind(&update.description)
        .bind(update.price)
        .bind(update.carat)
        .bind(&update.color)
        .bind(&update.clarity)
        .bind(&update.cut)
        .bind(&update.shape)
        .bind(&update.origin)
        .bind(&update.treatment)
        .bind(&update.certificate_number)
        .bind(&update.certificate_lab)
        .bind(update.stock_quantity)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, DUPLICATE_CERTIFICATE))?
        .ok_or(RepositoryError::NotFound("gem"))?;

        tx.commit().await?;
        Ok(gem)
    }

    /// Delete a gem that has never been ordered, returning its files for cleanup.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the gem does not exist.
    /// Returns `RepositoryError::Conflict` if an order references the gem.
    pub async fn delete(&self, id: GemId) -> Result<DeletedGemFiles, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let ordered: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM order_items WHERE gem_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if ordered {
            return Err(RepositoryError::Conflict(
                "This gem has been ordered and cannot be deleted".to_string(),
            ));
        }

        let image_urls: Vec<String> =
            sqlx::query_scalar("SELECT image_url FROM gem_images WHERE gem_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let certificate_file: Option<String> =
            sqlx::query_scalar("DELETE FROM gems WHERE id = $1 RETURNING certificate_file")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound("gem"))?;

        tx.commit().await?;
        Ok(DeletedGemFiles {
            image_urls,
            certificate_file,
        })
    }

    /// Images of a gem in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn images(&self, gem_id: GemId) -> Result<Vec<GemImage>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(images_on(&mut *conn, gem_id).await?)
    }

    /// Append images after the existing ones. If the gem has no primary image
    /// the first new one becomes primary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown gem,
    /// `RepositoryError::Invalid` if the listing would exceed
    /// [`MAX_GEM_IMAGES`].
    pub async fn add_images(
        &self,
        gem_id: GemId,
        urls: &[String],
    ) -> Result<Vec<GemImage>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent appends to the same gem.
        sqlx::query_scalar::<_, GemId>("SELECT id FROM gems WHERE id = $1 FOR UPDATE")
            .bind(gem_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound("gem"))?;

        let (existing, next_order, has_primary): (i64, i32, bool) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(MAX(sort_order) + 1, 0), COALESCE(BOOL_OR(is_primary), FALSE) \
             FROM gem_images WHERE gem_id = $1",
        )
        .bind(gem_id)
        .fetch_one(&mut *tx)
        .await?;
        check_image_capacity(existing, urls.len())?;

        for (offset, url) in (0_i32..).zip(urls) {
            sqlx::query(
                "INSERT INTO gem_images (gem_id, image_url, is_primary, sort_order) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(gem_id)
            .bind(url)
            .bind(!has_primary && offset == 0)
            .bind(next_order + offset)
            .execute(&mut *tx)
            .await?;
        }

        let images = images_on(&mut *tx, gem_id).await?;
        tx.commit().await?;
        Ok(images)
    }

    /// Remove one image, promoting the lowest sort order image if the primary
    /// was removed. Returns the removed image URL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the gem has no such image.
    pub async fn delete_image(
        &self,
        gem_id: GemId,
        image_id: GemImageId,
    ) -> Result<String, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (url, was_primary): (String, bool) = sqlx::query_as(
            "DELETE FROM gem_images WHERE id = $1 AND gem_id = $2 RETURNING image_url, is_primary",
        )
        .bind(image_id)
        .bind(gem_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("image"))?;

        if was_primary {
            sqlx::query(
                r"
                UPDATE gem_images SET is_primary = TRUE
                WHERE id = (
                    SELECT id FROM gem_images WHERE gem_id = $1
                    ORDER BY sort_order, id
                    LIMIT 1
                )
                ",
            )
            .bind(gem_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(url)
    }

    /// All of a seller's listings, any status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_seller(&self, seller_id: UserId) -> Result<Vec<GemSummary>, RepositoryError> {
        let gems = sqlx::query_as::<_, GemSummary>(&format!(
            "{SUMMARY_SELECT} WHERE g.seller_id = $1 ORDER BY g.created_at DESC"
        ))
        .bind(seller_id)
        .fetch_all(self.pool)
        .await?;
        Ok(gems)
    }

    /// Listings in a moderation status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_status(&self, status: GemStatus) -> Result<Vec<GemSummary>, RepositoryError> {
        let gems = sqlx::query_as::<_, GemSummary>(&format!(
            "{SUMMARY_SELECT} WHERE g.status = $1 ORDER BY g.created_at ASC"
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(gems)
    }

    /// Record a moderation decision. Approving an out-of-stock gem marks it sold out.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the gem does not exist.
    pub async fn review(
        &self,
        id: GemId,
        status: GemStatus,
        reason: Option<&str>,
    ) -> Result<Gem, RepositoryError> {
        let gem = sqlx::query_as::<_, Gem>(&format!(
            r"
            UPDATE gems
            SET status = CASE
                    WHEN $2 = 'approved'::gem_status AND stock_quantity = 0 THEN 'sold_out'::gem_status
                    ELSE $2
                END,
                rejection_reason = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {GEM_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .bind(reason)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("gem"))?;
        Ok(gem)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Query {
            sort: GemSort,
        }
        let q: Query = serde_json::from_str(r#"{"sort":"price_desc"}"#).unwrap();
        assert_eq!(q.sort, GemSort::PriceDesc);
    }

    #[test]
    fn test_sort_order_by_is_deterministic() {
        for sort in [
            GemSort::Newest,
            GemSort::PriceAsc,
            GemSort::PriceDesc,
            GemSort::CaratDesc,
        ] {
            assert!(sort.order_by().ends_with("g.id DESC"));
        }
    }

    #[test]
    fn test_image_capacity() {
        assert!(check_image_capacity(0, 8).is_ok());
        assert!(check_image_capacity(5, 3).is_ok());
        assert!(matches!(
            check_image_capacity(8, 1),
            Err(RepositoryError::Invalid(msg)) if msg.contains("0 more")
        ));
        assert!(matches!(
            check_image_capacity(6, 3),
            Err(RepositoryError::Invalid(msg)) if msg.contains("2 more")
        ));
    }

    #[test]
    fn test_gem_update_is_empty() {
        assert!(GemUpdate::default().is_empty());
        let update = GemUpdate {
            stock_quantity: Some(3),
            ..GemUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
