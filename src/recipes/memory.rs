use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::nutrition::{aggregate, Totals};
use super::repo::RecipeRepo;
use super::repo_types::{Ingredient, NewIngredient, NewStep, Recipe, RecipeDraft, RecipePatch, Step};

/// In-process store, selected with `RECIPE_STORE=memory`.
#[derive(Default)]
pub struct MemoryRecipeRepo {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    last_recipe_id: i64,
    last_ingredient_id: i64,
    last_step_id: i64,
    recipes: BTreeMap<i64, Recipe>,
}

impl Inner {
    fn ingredient_rows(&mut self, recipe_id: i64, list: &[NewIngredient]) -> Vec<Ingredient> {
        list.iter()
            .map(|i| {
                self.last_ingredient_id += 1;
                Ingredient {
                    id: self.last_ingredient_id,
                    recipe_id,
                    name: i.name.clone(),
                    quantity: i.quantity,
                    unit: i.unit.clone(),
                    carbs_per_100g: i.carbs_per_100g,
                    fat_per_100g: i.fat_per_100g,
                    protein_per_100g: i.protein_per_100g,
                    calories_per_100g: i.calories_per_100g,
                }
            })
            .collect()
    }

    fn step_rows(&mut self, recipe_id: i64, list: &[NewStep]) -> Vec<Step> {
        let mut steps: Vec<Step> = list
            .iter()
            .map(|s| {
                self.last_step_id += 1;
                Step {
                    id: self.last_step_id,
                    recipe_id,
                    step_number: s.step_number,
                    instruction: s.instruction.clone(),
                }
            })
            .collect();
        steps.sort_by_key(|s| (s.step_number, s.id));
        steps
    }
}

#[async_trait]
impl RecipeRepo for MemoryRecipeRepo {
    async fn create(&self, draft: &RecipeDraft) -> anyhow::Result<i64> {
        let mut inner = self.inner.write().await;
        inner.last_recipe_id += 1;
        let id = inner.last_recipe_id;
        let now = OffsetDateTime::now_utc();

        let totals = aggregate(&draft.ingredients);
        let ingredients = inner.ingredient_rows(id, &draft.ingredients);
        let steps = inner.step_rows(id, &draft.steps);
        inner.recipes.insert(
            id,
            Recipe {
                id,
                name: draft.name.clone(),
                description: draft.description.clone(),
                servings: draft.servings,
                prep_time: draft.prep_time,
                cook_time: draft.cook_time,
                total_calories: totals.calories,
                total_carbs: totals.carbs,
                total_fat: totals.fat,
                total_protein: totals.protein,
                created_at: now,
                updated_at: now,
                ingredients,
                steps,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: i64) -> anyhow::Result<Option<Recipe>> {
        Ok(self.inner.read().await.recipes.get(&id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<Recipe>> {
        Ok(self.inner.read().await.recipes.values().cloned().collect())
    }

    async fn update(&self, id: i64, patch: &RecipePatch) -> anyhow::Result<bool> {
        let mut inner = self.inner.write().await;
        if !inner.recipes.contains_key(&id) {
            return Ok(false);
        }

        let ingredients = patch
            .ingredients
            .as_deref()
            .map(|list| inner.ingredient_rows(id, list));
        let steps = patch.steps.as_deref().map(|list| inner.step_rows(id, list));

        let Some(recipe) = inner.recipes.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(name) = &patch.name {
            recipe.name = name.clone();
        }
        if let Some(description) = &patch.description {
            recipe.description = description.clone();
        }
        if let Some(servings) = patch.servings {
            recipe.servings = servings;
        }
        if let Some(prep_time) = patch.prep_time {
            recipe.prep_time = prep_time;
        }
        if let Some(cook_time) = patch.cook_time {
            recipe.cook_time = cook_time;
        }
        if let Some(ingredients) = ingredients {
            let totals = aggregate(&ingredients);
            recipe.total_calories = totals.calories;
            recipe.total_carbs = totals.carbs;
            recipe.total_fat = totals.fat;
            recipe.total_protein = totals.protein;
            recipe.ingredients = ingredients;
        }
        if let Some(steps) = steps {
            recipe.steps = steps;
        }
        recipe.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.inner.write().await.recipes.remove(&id).is_some())
    }

    async fn ids(&self) -> anyhow::Result<Vec<i64>> {
        Ok(self.inner.read().await.recipes.keys().copied().collect())
    }

    async fn ingredients(&self, id: i64) -> anyhow::Result<Option<Vec<Ingredient>>> {
        Ok(self
            .inner
            .read()
            .await
            .recipes
            .get(&id)
            .map(|r| r.ingredients.clone()))
    }

    async fn save_totals(&self, id: i64, totals: &Totals) -> anyhow::Result<Option<Totals>> {
        let mut inner = self.inner.write().await;
        let Some(recipe) = inner.recipes.get_mut(&id) else {
            return Ok(None);
        };
        let previous = recipe.totals();
        recipe.total_calories = totals.calories;
        recipe.total_carbs = totals.carbs;
        recipe.total_fat = totals.fat;
        recipe.total_protein = totals.protein;
        recipe.updated_at = OffsetDateTime::now_utc();
        Ok(Some(previous))
    }
}
