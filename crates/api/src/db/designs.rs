//! Jewelry design repository.

use sqlx::PgPool;
use sqlx::types::Json;

use gemvault_core::{DesignId, GemId, UserId};

use super::RepositoryError;
use crate::models::design::MAX_REFINEMENTS;
use crate::models::{Design, MaterialLine, Refinement};

const DESIGN_COLUMNS: &str = "id, user_id, gem_id, jewelry_type, metal, style, description, \
     prompt, generated_images, refinements, materials, estimated_cost, used_placeholder, \
     created_at, updated_at";

/// Fields of a freshly generated design.
#[derive(Debug, Clone)]
pub struct NewDesign {
    pub gem_id: Option<GemId>,
    pub jewelry_type: String,
    pub metal: String,
    pub style: Option<String>,
    pub description: String,
    pub prompt: String,
    pub generated_images: Vec<String>,
    pub used_placeholder: bool,
}

/// Repository for jewelry designs. Every lookup is scoped to the owner.
pub struct DesignRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DesignRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist a design with an empty refinement history.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, user_id: UserId, design: &NewDesign) -> Result<Design, RepositoryError> {
        let created = sqlx::query_as::<_, Design>(&format!(
            r"
            INSERT INTO jewelry_designs
                (user_id, gem_id, jewelry_type, metal, style, description, prompt,
                 generated_images, used_placeholder)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {DESIGN_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(design.gem_id)
        .bind(&design.jewelry_type)
        .bind(&design.metal)
        .bind(&design.style)
        .bind(&design.description)
        .bind(&design.prompt)
        .bind(Json(&design.generated_images))
        .bind(design.used_placeholder)
        .fetch_one(self.pool)
        .await?;
        Ok(created)
    }

    /// The user's designs, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Design>, RepositoryError> {
        let designs = sqlx::query_as::<_, Design>(&format!(
            "SELECT {DESIGN_COLUMNS} FROM jewelry_designs WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(designs)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId, id: DesignId) -> Result<Option<Design>, RepositoryError> {
        let design = sqlx::query_as::<_, Design>(&format!(
            "SELECT {DESIGN_COLUMNS} FROM jewelry_designs WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(design)
    }

    /// Delete a design, returning its image URLs (including refinements) for cleanup.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the design is not the user's.
    pub async fn delete(&self, user_id: UserId, id: DesignId) -> Result<Vec<String>, RepositoryError> {
        let deleted = sqlx::query_as::<_, Design>(&format!(
            "DELETE FROM jewelry_designs WHERE id = $1 AND user_id = $2 RETURNING {DESIGN_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("design"))?;

        let Json(mut images) = deleted.generated_images;
        images.extend(deleted.refinements.0.into_iter().flat_map(|r| r.images));
        Ok(images)
    }

    /// Append a refinement round.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the design is not the user's.
    /// Returns `RepositoryError::Conflict` once the refinement limit is reached.
    pub async fn append_refinement(
        &self,
        user_id: UserId,
        id: DesignId,
        refinement: &Refinement,
    ) -> Result<Design, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Json(existing): Json<Vec<Refinement>> = sqlx::query_scalar(
            "SELECT refinements FROM jewelry_designs WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("design"))?;

        if existing.len() >= MAX_REFINEMENTS {
            return Err(RepositoryError::Conflict(format!(
                "A design can be refined at most {MAX_REFINEMENTS} times"
            )));
        }

        let design = sqlx::query_as::<_, Design>(&format!(
            r"
            UPDATE jewelry_designs
            SET refinements = refinements || jsonb_build_array($2::jsonb),
                used_placeholder = used_placeholder OR $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {DESIGN_COLUMNS}
            "
        ))
        .bind(id)
        .bind(Json(refinement))
        .bind(refinement.used_placeholder)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(design)
    }

    /// Replace the bill of materials and its estimated cost.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the estimate overflows or exceeds
    /// the largest storable price, `RepositoryError::NotFound` if the design
    /// is not the user's.
    pub async fn set_materials(
        &self,
        user_id: UserId,
        id: DesignId,
        materials: &[MaterialLine],
    ) -> Result<Design, RepositoryError> {
        let estimated_cost = MaterialLine::estimate(materials).map_err(RepositoryError::Invalid)?;

        let design = sqlx::query_as::<_, Design>(&format!(
            r"
            UPDATE jewelry_designs
            SET materials = $3, estimated_cost = $4, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {DESIGN_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(Json(materials))
        .bind(estimated_cost)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("design"))?;
        Ok(design)
    }
}
