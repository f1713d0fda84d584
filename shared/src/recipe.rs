//! Recipe resolution: products expanded into material requirements

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::RecipeLine;
use crate::types::Quantity;

/// Recipe lines keyed by product, in insertion order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeBook {
    lines: HashMap<Uuid, Vec<RecipeLine>>,
}

impl RecipeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ingredient line; per-unit quantity must be positive
    pub fn add_line(&mut self, line: RecipeLine) -> DomainResult<()> {
        if line.quantity_per_unit <= Decimal::ZERO {
            return Err(DomainError::invalid(format!(
                "Recipe quantity for material {} must be positive",
                line.material_id
            )));
        }
        self.lines.entry(line.product_id).or_default().push(line);
        Ok(())
    }

    /// Ingredient lines of a product; empty when it has no recipe
    pub fn recipe_lines(&self, product_id: Uuid) -> &[RecipeLine] {
        self.lines
            .get(&product_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_recipe(&self, product_id: Uuid) -> bool {
        !self.recipe_lines(product_id).is_empty()
    }

    /// Material quantities needed for `quantity` units of a product.
    /// Lines naming the same material are summed.
    pub fn required_ingredients(&self, product_id: Uuid, quantity: u32) -> BTreeMap<Uuid, Quantity> {
        let multiplier = Decimal::from(quantity);
        let mut required = BTreeMap::new();
        for line in self.recipe_lines(product_id) {
            *required.entry(line.material_id).or_insert(Decimal::ZERO) +=
                line.quantity_per_unit * multiplier;
        }
        required
    }

    pub fn lines(&self) -> impl Iterator<Item = &RecipeLine> {
        self.lines.values().flatten()
    }
}
