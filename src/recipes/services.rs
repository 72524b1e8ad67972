use serde::Serialize;
use tracing::{debug, info, warn};

use super::nutrition::{aggregate, Totals};
use super::repo::RecipeRepo;
use super::repo_types::{Recipe, RecipeDraft, RecipePatch};
use crate::error::AppError;

/// Totals before and after a recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recalculation {
    pub previous: Totals,
    pub current: Totals,
}

impl Recalculation {
    pub fn changed(&self) -> bool {
        self.previous.calories != self.current.calories
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchRecalculation {
    pub total_recipes: usize,
    pub updated_recipes: usize,
    pub errors: Vec<String>,
}

/// Inserts the recipe; the store writes its totals along with the ingredients.
pub async fn create_recipe(repo: &dyn RecipeRepo, draft: &RecipeDraft) -> Result<Recipe, AppError> {
    let id = repo.create(draft).await?;
    let recipe = load(repo, id).await?;
    debug!(recipe_id = id, calories = %recipe.total_calories, "recipe created");
    Ok(recipe)
}

/// Applies the patch. Totals change only when the ingredients are replaced.
/// `None` when the recipe does not exist.
pub async fn update_recipe(
    repo: &dyn RecipeRepo,
    id: i64,
    patch: &RecipePatch,
) -> Result<Option<Recipe>, AppError> {
    if !repo.update(id, patch).await? {
        return Ok(None);
    }
    let recipe = load(repo, id).await?;
    debug!(
        recipe_id = id,
        ingredients_replaced = patch.ingredients.is_some(),
        calories = %recipe.total_calories,
        "recipe updated"
    );
    Ok(Some(recipe))
}

/// Recomputes and stores the totals of one recipe from its current ingredients.
pub async fn recalculate_recipe(repo: &dyn RecipeRepo, id: i64) -> anyhow::Result<Option<Recalculation>> {
    let Some(ingredients) = repo.ingredients(id).await? else {
        return Ok(None);
    };
    let current = aggregate(&ingredients);
    let Some(previous) = repo.save_totals(id, &current).await? else {
        return Ok(None);
    };

    debug!(
        recipe_id = id,
        ingredients = ingredients.len(),
        old_calories = %previous.calories,
        new_calories = %current.calories,
        "recipe totals recalculated"
    );
    Ok(Some(Recalculation { previous, current }))
}

/// Recomputes every recipe. A failing recipe is reported and skipped.
pub async fn recalculate_all(repo: &dyn RecipeRepo) -> anyhow::Result<BatchRecalculation> {
    let ids = repo.ids().await?;
    let mut report = BatchRecalculation {
        total_recipes: ids.len(),
        ..BatchRecalculation::default()
    };

    for id in ids {
        match recalculate_recipe(repo, id).await {
            Ok(Some(recalculation)) => {
                if recalculation.changed() {
                    report.updated_recipes += 1;
                }
            }
            // removed between listing and recomputing
            Ok(None) => {}
            Err(e) => {
                warn!(recipe_id = id, error = ?e, "recalculation failed");
                report.errors.push(format!("Recipe ID {id}: {e:#}"));
            }
        }
    }

    info!(
        total = report.total_recipes,
        updated = report.updated_recipes,
        failed = report.errors.len(),
        "batch recalculation finished"
    );
    Ok(report)
}

async fn load(repo: &dyn RecipeRepo, id: i64) -> Result<Recipe, AppError> {
    repo.get(id).await?.ok_or(AppError::NotFound("Recipe"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::memory::MemoryRecipeRepo;
    use crate::recipes::repo_types::{Ingredient, NewIngredient, NewStep};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn ingredient(name: &str, quantity: Decimal, carbs: Decimal, fat: Decimal, protein: Decimal) -> NewIngredient {
        NewIngredient {
            name: name.into(),
            quantity,
            unit: "g".into(),
            carbs_per_100g: Some(carbs),
            fat_per_100g: Some(fat),
            protein_per_100g: Some(protein),
            calories_per_100g: Some(dec!(999)),
        }
    }

    fn draft(ingredients: Vec<NewIngredient>) -> RecipeDraft {
        RecipeDraft {
            name: "Bowl".into(),
            description: None,
            servings: 2,
            prep_time: 0,
            cook_time: 0,
            ingredients,
            steps: vec![NewStep {
                step_number: 1,
                instruction: "Mix".into(),
            }],
        }
    }

    #[tokio::test]
    async fn create_computes_totals() {
        let repo = MemoryRecipeRepo::default();
        let recipe = create_recipe(&repo, &draft(vec![ingredient("Rice", dec!(150), dec!(10), dec!(5), dec!(2))]))
            .await
            .unwrap();

        assert_eq!(recipe.total_carbs, dec!(15.00));
        assert_eq!(recipe.total_fat, dec!(7.50));
        assert_eq!(recipe.total_protein, dec!(3.00));
        assert_eq!(recipe.total_calories.to_string(), "139.50");
    }

    #[tokio::test]
    async fn ingredient_replacement_forgets_old_set() {
        let repo = MemoryRecipeRepo::default();
        let recipe = create_recipe(&repo, &draft(vec![ingredient("Oil", dec!(100), dec!(0), dec!(100), dec!(0))]))
            .await
            .unwrap();
        assert_eq!(recipe.total_calories, dec!(900));

        let patch = RecipePatch {
            ingredients: Some(vec![ingredient("Broccoli", dec!(200), dec!(6.6), dec!(0.4), dec!(2.8))]),
            ..RecipePatch::default()
        };
        let updated = update_recipe(&repo, recipe.id, &patch).await.unwrap().unwrap();

        assert_eq!(updated.ingredients.len(), 1);
        assert_eq!(updated.ingredients[0].name, "Broccoli");
        assert_eq!(updated.total_carbs, dec!(13.20));
        assert_eq!(updated.total_fat, dec!(0.80));
        assert_eq!(updated.total_protein, dec!(5.60));
        // (6.6*4 + 2.8*4 + 0.4*9) * 2
        assert_eq!(updated.total_calories, dec!(82.40));
    }

    #[tokio::test]
    async fn update_of_missing_recipe_is_none() {
        let repo = MemoryRecipeRepo::default();
        let result = update_recipe(&repo, 42, &RecipePatch::default()).await.unwrap();
        assert!(result.is_none());
        assert!(recalculate_recipe(&repo, 42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recalculate_repairs_stale_totals() {
        let repo = MemoryRecipeRepo::default();
        let id = repo
            .create(&draft(vec![ingredient("Rice", dec!(100), dec!(76), dec!(1.8), dec!(7.5))]))
            .await
            .unwrap();
        repo.save_totals(id, &Totals::default()).await.unwrap();

        let first = recalculate_recipe(&repo, id).await.unwrap().unwrap();
        assert!(first.changed());
        assert_eq!(first.previous, Totals::default());

        let second = recalculate_recipe(&repo, id).await.unwrap().unwrap();
        assert!(!second.changed());
        assert_eq!(second.current, first.current);
    }

    /// Delegates to the memory store but cannot read or store totals for one recipe.
    struct FlakyRepo {
        inner: MemoryRecipeRepo,
        broken: i64,
    }

    #[async_trait]
    impl RecipeRepo for FlakyRepo {
        async fn create(&self, draft: &RecipeDraft) -> anyhow::Result<i64> {
            self.inner.create(draft).await
        }
        async fn get(&self, id: i64) -> anyhow::Result<Option<Recipe>> {
            self.inner.get(id).await
        }
        async fn list(&self) -> anyhow::Result<Vec<Recipe>> {
            self.inner.list().await
        }
        async fn update(&self, id: i64, patch: &RecipePatch) -> anyhow::Result<bool> {
            self.inner.update(id, patch).await
        }
        async fn delete(&self, id: i64) -> anyhow::Result<bool> {
            self.inner.delete(id).await
        }
        async fn ids(&self) -> anyhow::Result<Vec<i64>> {
            self.inner.ids().await
        }
        async fn ingredients(&self, id: i64) -> anyhow::Result<Option<Vec<Ingredient>>> {
            if id == self.broken {
                anyhow::bail!("connection reset");
            }
            self.inner.ingredients(id).await
        }
        async fn save_totals(&self, id: i64, totals: &Totals) -> anyhow::Result<Option<Totals>> {
            if id == self.broken {
                anyhow::bail!("numeric field overflow");
            }
            self.inner.save_totals(id, totals).await
        }
    }

    #[tokio::test]
    async fn mutations_store_totals_without_a_separate_write() {
        let repo = FlakyRepo {
            inner: MemoryRecipeRepo::default(),
            broken: 1,
        };
        let ingredients = vec![ingredient("Rice", dec!(150), dec!(10), dec!(5), dec!(2))];
        let created = create_recipe(&repo, &draft(ingredients.clone())).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.totals(), aggregate(&ingredients));
        assert_eq!(created.total_calories, dec!(139.50));

        let replacement = vec![ingredient("Oil", dec!(10), dec!(0), dec!(100), dec!(0))];
        let patch = RecipePatch {
            ingredients: Some(replacement.clone()),
            ..RecipePatch::default()
        };
        let updated = update_recipe(&repo, 1, &patch).await.unwrap().unwrap();
        assert_eq!(updated.totals(), aggregate(&replacement));

        let stored = repo.get(1).await.unwrap().unwrap();
        assert_eq!(stored.total_calories, dec!(90.00));
        assert_eq!(stored.totals(), aggregate(&stored.ingredients));
    }

    #[tokio::test]
    async fn update_without_ingredients_keeps_totals() {
        let repo = MemoryRecipeRepo::default();
        let created = create_recipe(&repo, &draft(vec![ingredient("Rice", dec!(150), dec!(10), dec!(5), dec!(2))]))
            .await
            .unwrap();

        let patch = RecipePatch {
            servings: Some(6),
            ..RecipePatch::default()
        };
        let updated = update_recipe(&repo, created.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.servings, 6);
        assert_eq!(updated.totals(), created.totals());
    }

    #[tokio::test]
    async fn batch_isolates_failures() {
        let repo = FlakyRepo {
            inner: MemoryRecipeRepo::default(),
            broken: 2,
        };
        for _ in 0..3 {
            let id = repo
                .create(&draft(vec![ingredient("Quinoa", dec!(50), dec!(64.2), dec!(6.1), dec!(14.1))]))
                .await
                .unwrap();
            // stale totals, as left by an older writer
            repo.inner.save_totals(id, &Totals::default()).await.unwrap();
        }

        let report = recalculate_all(&repo).await.unwrap();
        assert_eq!(report.total_recipes, 3);
        assert_eq!(report.updated_recipes, 2);
        assert_eq!(report.errors, vec!["Recipe ID 2: connection reset".to_string()]);

        assert_eq!(repo.get(1).await.unwrap().unwrap().total_carbs, dec!(32.10));
        assert_eq!(repo.get(2).await.unwrap().unwrap().total_carbs, Decimal::ZERO);
        assert_eq!(repo.get(3).await.unwrap().unwrap().total_carbs, dec!(32.10));
    }

    #[tokio::test]
    async fn batch_on_fresh_totals_reports_no_changes() {
        let repo = MemoryRecipeRepo::default();
        create_recipe(&repo, &draft(vec![ingredient("Yogurt", dec!(100), dec!(4), dec!(10), dec!(10))]))
            .await
            .unwrap();

        let report = recalculate_all(&repo).await.unwrap();
        assert_eq!(report.total_recipes, 1);
        assert_eq!(report.updated_recipes, 0);
        assert!(report.errors.is_empty());
    }
}
