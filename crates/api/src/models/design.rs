//! Jewelry design models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use gemvault_core::{DesignId, GemId, Price, UserId};

/// Maximum number of refinements kept per design.
pub const MAX_REFINEMENTS: usize = 10;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Design {
    pub id: DesignId,
    pub user_id: UserId,
    pub gem_id: Option<GemId>,
    pub jewelry_type: String,
    pub metal: String,
    pub style: Option<String>,
    pub description: String,
    pub prompt: String,
    pub generated_images: Json<Vec<String>>,
    pub refinements: Json<Vec<Refinement>>,
    pub materials: Json<Vec<MaterialLine>>,
    pub estimated_cost: Option<Decimal>,
    pub used_placeholder: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One refinement round appended to a design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refinement {
    pub instructions: String,
    pub prompt: String,
    pub images: Vec<String>,
    pub used_placeholder: bool,
    pub created_at: DateTime<Utc>,
}

/// A bill-of-materials line for a design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost: Price,
}

impl MaterialLine {
    /// `quantity * unit_cost`, or `None` on decimal overflow.
    #[must_use]
    pub fn cost(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_cost.amount())
    }

    /// Total cost of all lines, rounded to cents.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending line when a line cost overflows,
    /// or when the total does not fit a stored price.
    pub fn estimate(lines: &[Self]) -> Result<Decimal, String> {
        let mut total = Decimal::ZERO;
        for line in lines {
            total = line
                .cost()
                .and_then(|cost| total.checked_add(cost))
                .ok_or_else(|| format!("Cost of {} is too large", line.name))?;
        }
        let total = total.round_dp(2);
        if total > Price::max() {
            return Err(format!("Estimated cost must be at most {}", Price::max()));
        }
        Ok(total)
    }
}

/// Result of one image generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub images: Vec<String>,
    pub used_placeholder: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn material(name: &str, quantity: &str, unit_cost: &str) -> MaterialLine {
        MaterialLine {
            name: name.to_string(),
            quantity: quantity.parse().unwrap(),
            unit: "g".to_string(),
            unit_cost: Price::parse(unit_cost).unwrap(),
        }
    }

    #[test]
    fn test_estimate_sums_lines() {
        let lines = vec![material("18k gold", "4.5", "62.10"), material("setting", "1", "35")];
        // 4.5 * 62.10 = 279.45, + 35 = 314.45
        assert_eq!(MaterialLine::estimate(&lines).unwrap(), Decimal::new(31445, 2));
    }

    #[test]
    fn test_estimate_rounds_to_cents() {
        let lines = vec![material("platinum wire", "0.333", "10.00")];
        assert_eq!(MaterialLine::estimate(&lines).unwrap(), Decimal::new(333, 2));
    }

    #[test]
    fn test_estimate_empty() {
        assert_eq!(MaterialLine::estimate(&[]).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_estimate_overflow_is_an_error() {
        let line = material("gold", "79228162514264337593543950335", "10.00");
        assert_eq!(line.cost(), None);
        let err = MaterialLine::estimate(&[line]).unwrap_err();
        assert!(err.contains("gold"), "{err}");

        let huge = material("silver", "79228162514264337593543950335", "1.00");
        assert!(MaterialLine::estimate(&[huge.clone(), huge]).is_err());
    }

    #[test]
    fn test_estimate_rejects_totals_above_max_price() {
        let lines = vec![material("platinum", "1000000000", "10000.00")];
        let err = MaterialLine::estimate(&lines).unwrap_err();
        assert!(err.contains("at most"), "{err}");

        let at_max = vec![material("platinum", "1", "9999999999.99")];
        assert_eq!(MaterialLine::estimate(&at_max).unwrap(), Price::max());
    }

    #[test]
    fn test_material_line_deserializes() {
        let line: MaterialLine = serde_json::from_str(
            r#"{"name":"silver","quantity":"12","unit":"g","unit_cost":"0.95"}"#,
        )
        .unwrap();
        assert_eq!(line.cost(), Some(Decimal::new(1140, 2)));
    }
}
