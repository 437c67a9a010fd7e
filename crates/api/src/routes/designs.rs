//! AI-assisted jewelry design handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::{DesignId, GemId, JewelryType};

use crate::db::designs::NewDesign;
use crate::db::{DesignRepository, GemRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::design::MAX_REFINEMENTS;
use crate::models::{CurrentUser, Design, MaterialLine, Refinement};
use crate::services::design::{DesignPrompt, StoneAttributes, prompt};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDesignRequest {
    pub jewelry_type: JewelryType,
    pub metal: String,
    pub gem_id: Option<i32>,
    pub style: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    pub instructions: String,
    pub base_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MaterialsRequest {
    pub materials: Vec<MaterialLine>,
}

fn placeholder_label(jewelry_type: &str, metal: &str) -> String {
    format!("{} {jewelry_type}", metal.trim())
}

/// Whether `url` is one of the design's images, original or refined.
fn has_image(design: &Design, url: &str) -> bool {
    design.generated_images.iter().any(|u| u == url)
        || design
            .refinements
            .iter()
            .any(|r| r.images.iter().any(|u| u == url))
}

fn validate_materials(materials: &[MaterialLine]) -> Result<()> {
    for line in materials {
        if line.name.trim().is_empty() || line.unit.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Each material needs a name and a unit".to_string(),
            ));
        }
        if line.quantity.is_sign_negative() {
            return Err(AppError::BadRequest(format!(
                "Quantity for {} cannot be negative",
                line.name
            )));
        }
    }
    Ok(())
}

async fn owned_design(state: &AppState, user: &CurrentUser, id: DesignId) -> Result<Design> {
    DesignRepository::new(state.pool())
        .get(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Design not found".to_string()))
}

/// Generate a new design.
///
/// Falls back to placeholder images when generation is unavailable.
///
/// # Errors
///
/// 400 for a blank metal, 404 for an unknown gem.
#[instrument(skip(state, body), fields(user_id = %user.id, jewelry_type = %body.jewelry_type))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<CreateDesignRequest>,
) -> Result<(StatusCode, Json<Design>)> {
    let metal = body.metal.trim();
    if metal.is_empty() {
        return Err(AppError::BadRequest("metal is required".to_string()));
    }

    let gem = match body.gem_id {
        Some(id) => Some(
            GemRepository::new(state.pool())
                .get(GemId::new(id))
                .await?
                .ok_or_else(|| AppError::NotFound("Gem not found".to_string()))?,
        ),
        None => None,
    };
    let stone = gem
        .as_ref()
        .filter(|g| g.status.is_public())
        .map(StoneAttributes::from);

    let style = body.style.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let prompt = DesignPrompt {
        jewelry_type: body.jewelry_type,
        metal,
        style,
        stone,
        description: &body.description,
    }
    .compose();

    let studio = state.designs();
    let outcome = studio
        .generate(
            &prompt,
            studio.image_count(),
            &placeholder_label(body.jewelry_type.as_str(), metal),
        )
        .await;

    let new_design = NewDesign {
        gem_id: gem.map(|g| g.id),
        jewelry_type: body.jewelry_type.as_str().to_owned(),
        metal: metal.to_owned(),
        style: style.map(str::to_owned),
        description: body.description.trim().to_owned(),
        prompt,
        generated_images: outcome.images,
        used_placeholder: outcome.used_placeholder,
    };

    match DesignRepository::new(state.pool())
        .create(user.id, &new_design)
        .await
    {
        Ok(design) => {
            tracing::info!(
                design_id = %design.id,
                used_placeholder = design.used_placeholder,
                "Design created"
            );
            Ok((StatusCode::CREATED, Json(design)))
        }
        Err(e) => {
            studio.storage().remove(&new_design.generated_images).await;
            Err(e.into())
        }
    }
}

/// The caller's designs, newest first.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Design>>> {
    Ok(Json(DesignRepository::new(state.pool()).list(user.id).await?))
}

/// One of the caller's designs.
///
/// # Errors
///
/// 404 for someone else's design.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Design>> {
    Ok(Json(owned_design(&state, &user, DesignId::new(id)).await?))
}

/// Delete a design and its stored images.
///
/// # Errors
///
/// 404 for someone else's design.
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    let urls = DesignRepository::new(state.pool())
        .delete(user.id, DesignId::new(id))
        .await?;
    state.designs().storage().remove(&urls).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Generate one refined image and record the round.
///
/// # Errors
///
/// 400 for blank instructions or a foreign base image, 404 for someone
/// else's design, 409 once the refinement limit is reached.
#[instrument(skip(state, body), fields(user_id = %user.id, design_id = id))]
pub async fn refine(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<RefineRequest>,
) -> Result<Json<Design>> {
    let instructions = body.instructions.trim();
    if instructions.is_empty() {
        return Err(AppError::BadRequest("instructions are required".to_string()));
    }

    let id = DesignId::new(id);
    let design = owned_design(&state, &user, id).await?;
    if design.refinements.len() >= MAX_REFINEMENTS {
        return Err(AppError::Conflict(format!(
            "A design can be refined at most {MAX_REFINEMENTS} times"
        )));
    }
    let base_image = body.base_image.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if base_image.is_some_and(|url| !has_image(&design, url)) {
        return Err(AppError::BadRequest(
            "base_image must be one of this design's images".to_string(),
        ));
    }

    let refined_prompt = prompt::refine(&design.prompt, instructions, base_image);
    let studio = state.designs();
    let outcome = studio
        .generate(
            &refined_prompt,
            1,
            &format!("Refined {}", design.jewelry_type),
        )
        .await;

    let refinement = Refinement {
        instructions: instructions.to_owned(),
        prompt: refined_prompt,
        images: outcome.images,
        used_placeholder: outcome.used_placeholder,
        created_at: Utc::now(),
    };

    match DesignRepository::new(state.pool())
        .append_refinement(user.id, id, &refinement)
        .await
    {
        Ok(updated) => Ok(Json(updated)),
        Err(e) => {
            studio.storage().remove(&refinement.images).await;
            Err(e.into())
        }
    }
}

/// Replace the design's bill of materials.
///
/// # Errors
///
/// 400 for incomplete lines, 404 for someone else's design.
pub async fn set_materials(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<MaterialsRequest>,
) -> Result<Json<Design>> {
    validate_materials(&body.materials)?;
    let design = DesignRepository::new(state.pool())
        .set_materials(user.id, DesignId::new(id), &body.materials)
        .await?;
    Ok(Json(design))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use gemvault_core::Price;

    use super::*;

    #[test]
    fn test_create_request_rejects_unknown_type() {
        let ok: CreateDesignRequest = serde_json::from_value(json!({
            "jewelry_type": "earrings",
            "metal": "rose gold"
        }))
        .unwrap();
        assert_eq!(ok.jewelry_type, JewelryType::Earrings);
        assert!(ok.description.is_empty());

        assert!(
            serde_json::from_value::<CreateDesignRequest>(json!({
                "jewelry_type": "tiara",
                "metal": "silver"
            }))
            .is_err()
        );
    }

    #[test]
    fn test_placeholder_label() {
        assert_eq!(placeholder_label("ring", " platinum "), "platinum ring");
    }

    #[test]
    fn test_validate_materials() {
        let line = |name: &str, quantity: Decimal| MaterialLine {
            name: name.to_string(),
            quantity,
            unit: "g".to_string(),
            unit_cost: Price::parse("10").unwrap(),
        };
        assert!(validate_materials(&[line("gold", Decimal::ONE)]).is_ok());
        assert!(validate_materials(&[line(" ", Decimal::ONE)]).is_err());
        assert!(validate_materials(&[line("gold", Decimal::NEGATIVE_ONE)]).is_err());
        assert!(validate_materials(&[]).is_ok());
    }
}
