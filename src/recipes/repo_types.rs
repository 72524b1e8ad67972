use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use super::nutrition::{MacroSource, Totals};

/// Row of the `recipes` table.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub servings: i32,
    pub prep_time: i32,
    pub cook_time: i32,
    pub total_calories: Decimal,
    pub total_carbs: Decimal,
    pub total_fat: Decimal,
    pub total_protein: Decimal,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl RecipeRow {
    pub fn with_children(self, ingredients: Vec<Ingredient>, steps: Vec<Step>) -> Recipe {
        Recipe {
            id: self.id,
            name: self.name,
            description: self.description,
            servings: self.servings,
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            total_calories: self.total_calories,
            total_carbs: self.total_carbs,
            total_fat: self.total_fat,
            total_protein: self.total_protein,
            created_at: self.created_at,
            updated_at: self.updated_at,
            ingredients,
            steps,
        }
    }
}

/// A recipe with its ingredients and steps loaded.
#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub servings: i32,
    pub prep_time: i32,
    pub cook_time: i32,
    pub total_calories: Decimal,
    pub total_carbs: Decimal,
    pub total_fat: Decimal,
    pub total_protein: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<Step>,
}

impl Recipe {
    pub fn totals(&self) -> Totals {
        Totals {
            calories: self.total_calories,
            carbs: self.total_carbs,
            fat: self.total_fat,
            protein: self.total_protein,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Ingredient {
    pub id: i64,
    pub recipe_id: i64,
    pub name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub carbs_per_100g: Option<Decimal>,
    pub fat_per_100g: Option<Decimal>,
    pub protein_per_100g: Option<Decimal>,
    pub calories_per_100g: Option<Decimal>,
}

impl MacroSource for Ingredient {
    fn quantity(&self) -> Decimal {
        self.quantity
    }
    fn carbs_per_100g(&self) -> Option<Decimal> {
        self.carbs_per_100g
    }
    fn fat_per_100g(&self) -> Option<Decimal> {
        self.fat_per_100g
    }
    fn protein_per_100g(&self) -> Option<Decimal> {
        self.protein_per_100g
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Step {
    pub id: i64,
    pub recipe_id: i64,
    pub step_number: i32,
    pub instruction: String,
}

/// Validated ingredient, decimals already normalized to two places.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIngredient {
    pub name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub carbs_per_100g: Option<Decimal>,
    pub fat_per_100g: Option<Decimal>,
    pub protein_per_100g: Option<Decimal>,
    pub calories_per_100g: Option<Decimal>,
}

impl MacroSource for NewIngredient {
    fn quantity(&self) -> Decimal {
        self.quantity
    }
    fn carbs_per_100g(&self) -> Option<Decimal> {
        self.carbs_per_100g
    }
    fn fat_per_100g(&self) -> Option<Decimal> {
        self.fat_per_100g
    }
    fn protein_per_100g(&self) -> Option<Decimal> {
        self.protein_per_100g
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStep {
    pub step_number: i32,
    pub instruction: String,
}

/// Everything needed to insert a recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub name: String,
    pub description: Option<String>,
    pub servings: i32,
    pub prep_time: i32,
    pub cook_time: i32,
    pub ingredients: Vec<NewIngredient>,
    pub steps: Vec<NewStep>,
}

/// Partial update. `Some(list)` replaces the whole child collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipePatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub servings: Option<i32>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub ingredients: Option<Vec<NewIngredient>>,
    pub steps: Option<Vec<NewStep>>,
}
