//! Prompt composition for jewelry image generation.

use rust_decimal::Decimal;

use gemvault_core::JewelryType;

use crate::models::Gem;

const PHOTO_STYLE: &str =
    "Professional jewelry product photography, studio lighting, plain white background, highly detailed.";

/// Attributes of the centre stone woven into a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoneAttributes {
    pub gem_type: String,
    pub carat: Decimal,
    pub color: Option<String>,
    pub shape: Option<String>,
    pub origin: Option<String>,
}

impl From<&Gem> for StoneAttributes {
    fn from(gem: &Gem) -> Self {
        Self {
            gem_type: gem.gem_type.clone(),
            carat: gem.carat,
            color: gem.color.clone(),
            shape: gem.shape.clone(),
            origin: gem.origin.clone(),
        }
    }
}

impl StoneAttributes {
    fn describe(&self) -> String {
        let mut words = vec![format!("{} carat", self.carat.normalize())];
        words.extend(self.color.iter().cloned());
        words.extend(self.shape.iter().map(|s| format!("{s}-cut")));
        words.push(self.gem_type.to_lowercase());
        let mut phrase = words.join(" ");
        if let Some(origin) = &self.origin {
            phrase.push_str(" from ");
            phrase.push_str(origin);
        }
        phrase
    }
}

/// Inputs of a new design prompt.
#[derive(Debug, Clone)]
pub struct DesignPrompt<'a> {
    pub jewelry_type: JewelryType,
    pub metal: &'a str,
    pub style: Option<&'a str>,
    pub stone: Option<StoneAttributes>,
    pub description: &'a str,
}

impl DesignPrompt<'_> {
    /// Compose the generation prompt.
    #[must_use]
    pub fn compose(&self) -> String {
        let mut prompt = String::from("A ");
        if let Some(style) = self.style.map(str::trim).filter(|s| !s.is_empty()) {
            prompt.push_str(style);
            prompt.push(' ');
        }
        prompt.push_str(self.jewelry_type.as_str());
        prompt.push_str(" crafted in ");
        prompt.push_str(self.metal.trim());
        if let Some(stone) = &self.stone {
            prompt.push_str(", featuring a ");
            prompt.push_str(&stone.describe());
        }
        prompt.push('.');

        let description = self.description.trim().trim_end_matches('.');
        if !description.is_empty() {
            prompt.push(' ');
            prompt.push_str(description);
            prompt.push('.');
        }

        prompt.push(' ');
        prompt.push_str(PHOTO_STYLE);
        prompt
    }
}

/// Extend a design's prompt with refinement instructions.
#[must_use]
pub fn refine(original: &str, instructions: &str, base_image: Option<&str>) -> String {
    let mut prompt = format!("{original}\n\nRefinement: {}", instructions.trim());
    if let Some(base) = base_image.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\nKeep the overall composition of the reference design at ");
        prompt.push_str(base);
        prompt.push_str(" and apply only the requested changes.");
    }
    prompt
}
