//! Seed the catalogue with approved demo gems.
//!
//! ```yaml
//! - name: Cornflower Sapphire
//!   gem_type: sapphire
//!   price: "4200.00"
//!   carat: "2.10"
//!   color: blue
//!   origin: Sri Lanka
//!   certificate_number: GIA-2210045
//!   certificate_lab: GIA
//!   images:
//!     - https://images.example.com/sapphire-1.jpg
//! ```
//!
//! Gems whose certificate number already exists are skipped.

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use gemvault_api::db::gems::NewGem;
use gemvault_api::db::{GemRepository, RepositoryError, SellerRepository, UserRepository};
use gemvault_core::{Email, GemStatus, Price};

use super::connect;

/// One gem entry in the seed file. Money and weight are strings so YAML never
/// rounds them through a float.
#[derive(Debug, Deserialize)]
pub struct SeedGem {
    pub name: String,
    pub gem_type: String,
    pub description: Option<String>,
    pub price: String,
    pub carat: String,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub cut: Option<String>,
    pub shape: Option<String>,
    pub origin: Option<String>,
    pub treatment: Option<String>,
    pub certificate_number: String,
    pub certificate_lab: Option<String>,
    #[serde(default = "default_stock")]
    pub stock_quantity: i32,
    #[serde(default)]
    pub images: Vec<String>,
}

const fn default_stock() -> i32 {
    1
}

impl SeedGem {
    fn into_new_gem(self) -> Result<(NewGem, Vec<String>), String> {
        let price = Price::parse(&self.price).map_err(|e| format!("{}: {e}", self.name))?;
        let carat = Decimal::from_str(&self.carat)
            .ok()
            .filter(|c| c.is_sign_positive() && !c.is_zero())
            .ok_or_else(|| format!("{}: invalid carat {}", self.name, self.carat))?;
        if self.stock_quantity < 0 {
            return Err(format!("{}: stock_quantity cannot be negative", self.name));
        }

        let gem = NewGem {
            name: self.name,
            gem_type: self.gem_type.to_lowercase(),
            description: self.description,
            price,
            carat,
            color: self.color,
            clarity: self.clarity,
            cut: self.cut,
            shape: self.shape,
            origin: self.origin,
            treatment: self.treatment,
            certificate_number: self.certificate_number,
            certificate_lab: self.certificate_lab,
            certificate_file: None,
            stock_quantity: self.stock_quantity,
        };
        Ok((gem, self.images))
    }
}

/// Parse and validate a seed file without touching the database.
fn parse_seed(content: &str) -> Result<Vec<(NewGem, Vec<String>)>, Box<dyn std::error::Error>> {
    let entries: Vec<SeedGem> = serde_yaml::from_str(content)?;
    let mut gems = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();
    for entry in entries {
        match entry.into_new_gem() {
            Ok(gem) => gems.push(gem),
            Err(e) => errors.push(e),
        }
    }
    if errors.is_empty() {
        Ok(gems)
    } else {
        for err in &errors {
            tracing::error!("  - {err}");
        }
        Err(format!("{} validation errors found", errors.len()).into())
    }
}

/// Insert approved gems from `file_path` for the seller with `seller_email`.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, the seller is
/// unknown or unverified, or a database operation fails.
pub async fn gems(file_path: &str, seller_email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading gems from file");
    let content = tokio::fs::read_to_string(path).await?;
    let entries = parse_seed(&content)?;
    info!(gems = entries.len(), "Parsed seed file");

    let pool = connect().await?;

    let email = Email::parse(seller_email)?;
    let seller = UserRepository::new(&pool)
        .get_by_email(&email)
        .await?
        .ok_or_else(|| format!("No user with email {seller_email}"))?;
    let profile = SellerRepository::new(&pool)
        .get(seller.id)
        .await?
        .ok_or_else(|| format!("{seller_email} has no seller profile"))?;
    if !profile.verification_status.can_sell() {
        return Err(format!(
            "{seller_email} is not verified (status: {})",
            profile.verification_status
        )
        .into());
    }

    let gems = GemRepository::new(&pool);
    let mut inserted = 0_usize;
    let mut skipped = 0_usize;
    for (new_gem, images) in entries {
        let detail = match gems.create(seller.id, &new_gem, &images).await {
            Ok(detail) => detail,
            Err(RepositoryError::Conflict(_)) => {
                warn!(certificate = %new_gem.certificate_number, "Certificate exists, skipping");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        gems.review(detail.gem.id, GemStatus::Approved, None).await?;
        inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Gems inserted: {inserted}");
    info!("  Gems skipped (certificate exists): {skipped}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEED: &str = r#"
- name: Cornflower Sapphire
  gem_type: Sapphire
  price: "4200.00"
  carat: "2.10"
  certificate_number: GIA-2210045
  images:
    - https://images.example.com/sapphire-1.jpg
- name: Pigeon Blood Ruby
  gem_type: ruby
  price: "9800"
  carat: "1.02"
  certificate_number: GRS-88120
  stock_quantity: 2
"#;

    #[test]
    fn test_parse_seed() {
        let gems = parse_seed(SEED).unwrap();
        assert_eq!(gems.len(), 2);

        let (sapphire, images) = &gems[0];
        assert_eq!(sapphire.gem_type, "sapphire");
        assert_eq!(sapphire.stock_quantity, 1);
        assert_eq!(images.len(), 1);

        let (ruby, images) = &gems[1];
        assert_eq!(ruby.stock_quantity, 2);
        assert!(images.is_empty());
    }

    #[test]
    fn test_parse_seed_rejects_bad_values() {
        let bad_carat = r#"
- name: Dust
  gem_type: quartz
  price: "10"
  carat: "0"
  certificate_number: X-1
"#;
        assert!(parse_seed(bad_carat).is_err());

        let bad_price = r#"
- name: Free
  gem_type: quartz
  price: "abc"
  carat: "1"
  certificate_number: X-2
"#;
        assert!(parse_seed(bad_price).is_err());
    }
}
