use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use super::nutrition::{aggregate, Totals};
use super::repo_types::{Ingredient, NewIngredient, NewStep, Recipe, RecipeDraft, RecipePatch, RecipeRow, Step};

/// Persistence for recipes and the ingredients/steps they own.
///
/// `create` and `update` store totals derived from the ingredients they write,
/// in the same transaction. [`RecipeRepo::save_totals`] repairs stored totals.
#[async_trait]
pub trait RecipeRepo: Send + Sync {
    /// Inserts the recipe and all of its children, returning the new id.
    async fn create(&self, draft: &RecipeDraft) -> anyhow::Result<i64>;
    async fn get(&self, id: i64) -> anyhow::Result<Option<Recipe>>;
    async fn list(&self) -> anyhow::Result<Vec<Recipe>>;
    /// Applies the patch; `false` when the recipe does not exist.
    async fn update(&self, id: i64, patch: &RecipePatch) -> anyhow::Result<bool>;
    /// Removes the recipe with its ingredients and steps; `false` when absent.
    async fn delete(&self, id: i64) -> anyhow::Result<bool>;
    async fn ids(&self) -> anyhow::Result<Vec<i64>>;
    /// `None` when the recipe does not exist.
    async fn ingredients(&self, id: i64) -> anyhow::Result<Option<Vec<Ingredient>>>;
    /// Stores new totals and returns the ones they replaced.
    async fn save_totals(&self, id: i64, totals: &Totals) -> anyhow::Result<Option<Totals>>;
}

#[derive(Clone)]
pub struct PgRecipeRepo {
    db: PgPool,
}

impl PgRecipeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const RECIPE_COLUMNS: &str = r#"
    id, name, description, servings, prep_time, cook_time,
    total_calories, total_carbs, total_fat, total_protein,
    created_at, updated_at
"#;

const INGREDIENT_COLUMNS: &str = r#"
    id, recipe_id, name, quantity, unit,
    carbs_per_100g, fat_per_100g, protein_per_100g, calories_per_100g
"#;

async fn insert_ingredients_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    ingredients: &[NewIngredient],
) -> anyhow::Result<()> {
    for ingredient in ingredients {
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients
                (recipe_id, name, quantity, unit,
                 carbs_per_100g, fat_per_100g, protein_per_100g, calories_per_100g)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(recipe_id)
        .bind(&ingredient.name)
        .bind(ingredient.quantity)
        .bind(&ingredient.unit)
        .bind(ingredient.carbs_per_100g)
        .bind(ingredient.fat_per_100g)
        .bind(ingredient.protein_per_100g)
        .bind(ingredient.calories_per_100g)
        .execute(&mut **tx)
        .await
        .context("insert ingredient")?;
    }
    Ok(())
}

async fn insert_steps_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    steps: &[NewStep],
) -> anyhow::Result<()> {
    for step in steps {
        sqlx::query(
            r#"
            INSERT INTO recipe_steps (recipe_id, step_number, instruction)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(recipe_id)
        .bind(step.step_number)
        .bind(&step.instruction)
        .execute(&mut **tx)
        .await
        .context("insert step")?;
    }
    Ok(())
}

impl PgRecipeRepo {
    async fn exists(&self, id: i64) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM recipes WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await
            .context("check recipe exists")?;
        Ok(found)
    }

    /// Loads children for many recipes in two queries.
    async fn attach_children(&self, rows: Vec<RecipeRow>) -> anyhow::Result<Vec<Recipe>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

        let ingredients = sqlx::query_as::<_, Ingredient>(&format!(
            "SELECT {INGREDIENT_COLUMNS} FROM recipe_ingredients WHERE recipe_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(&self.db)
        .await
        .context("list ingredients")?;

        let steps = sqlx::query_as::<_, Step>(
            r#"
            SELECT id, recipe_id, step_number, instruction
              FROM recipe_steps
             WHERE recipe_id = ANY($1)
             ORDER BY step_number, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await
        .context("list steps")?;

        let mut ingredients_by_recipe: HashMap<i64, Vec<Ingredient>> = HashMap::new();
        for ingredient in ingredients {
            ingredients_by_recipe
                .entry(ingredient.recipe_id)
                .or_default()
                .push(ingredient);
        }
        let mut steps_by_recipe: HashMap<i64, Vec<Step>> = HashMap::new();
        for step in steps {
            steps_by_recipe.entry(step.recipe_id).or_default().push(step);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                row.with_children(
                    ingredients_by_recipe.remove(&id).unwrap_or_default(),
                    steps_by_recipe.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }
}

#[async_trait]
impl RecipeRepo for PgRecipeRepo {
    async fn create(&self, draft: &RecipeDraft) -> anyhow::Result<i64> {
        let totals = aggregate(&draft.ingredients);
        let mut tx = self.db.begin().await.context("begin tx")?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO recipes
                (name, description, servings, prep_time, cook_time,
                 total_calories, total_carbs, total_fat, total_protein)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.servings)
        .bind(draft.prep_time)
        .bind(draft.cook_time)
        .bind(totals.calories)
        .bind(totals.carbs)
        .bind(totals.fat)
        .bind(totals.protein)
        .fetch_one(&mut *tx)
        .await
        .context("insert recipe")?;

        insert_ingredients_tx(&mut tx, id, &draft.ingredients).await?;
        insert_steps_tx(&mut tx, id, &draft.steps).await?;

        tx.commit().await.context("commit tx")?;
        Ok(id)
    }

    async fn get(&self, id: i64) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get recipe")?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.attach_children(vec![row]).await?.pop())
    }

    async fn list(&self) -> anyhow::Result<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await
        .context("list recipes")?;

        self.attach_children(rows).await
    }

    async fn update(&self, id: i64, patch: &RecipePatch) -> anyhow::Result<bool> {
        // totals only move when the ingredient set is replaced
        let totals = patch.ingredients.as_deref().map(aggregate);
        let mut tx = self.db.begin().await.context("begin tx")?;

        let updated = sqlx::query(
            r#"
            UPDATE recipes
               SET name           = COALESCE($2, name),
                   description    = CASE WHEN $3 THEN $4 ELSE description END,
                   servings       = COALESCE($5, servings),
                   prep_time      = COALESCE($6, prep_time),
                   cook_time      = COALESCE($7, cook_time),
                   total_calories = COALESCE($8, total_calories),
                   total_carbs    = COALESCE($9, total_carbs),
                   total_fat      = COALESCE($10, total_fat),
                   total_protein  = COALESCE($11, total_protein),
                   updated_at     = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(patch.description.is_some())
        .bind(patch.description.clone().flatten())
        .bind(patch.servings)
        .bind(patch.prep_time)
        .bind(patch.cook_time)
        .bind(totals.map(|t| t.calories))
        .bind(totals.map(|t| t.carbs))
        .bind(totals.map(|t| t.fat))
        .bind(totals.map(|t| t.protein))
        .execute(&mut *tx)
        .await
        .context("update recipe")?
        .rows_affected();

        if updated == 0 {
            return Ok(false);
        }

        if let Some(ingredients) = &patch.ingredients {
            sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("delete ingredients")?;
            insert_ingredients_tx(&mut tx, id, ingredients).await?;
        }

        if let Some(steps) = &patch.steps {
            sqlx::query("DELETE FROM recipe_steps WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("delete steps")?;
            insert_steps_tx(&mut tx, id, steps).await?;
        }

        tx.commit().await.context("commit tx")?;
        Ok(true)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        // children go through ON DELETE CASCADE
        let deleted = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete recipe")?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn ids(&self) -> anyhow::Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM recipes ORDER BY id")
            .fetch_all(&self.db)
            .await
            .context("list recipe ids")?;
        Ok(ids)
    }

    async fn ingredients(&self, id: i64) -> anyhow::Result<Option<Vec<Ingredient>>> {
        if !self.exists(id).await? {
            return Ok(None);
        }
        let rows = sqlx::query_as::<_, Ingredient>(&format!(
            "SELECT {INGREDIENT_COLUMNS} FROM recipe_ingredients WHERE recipe_id = $1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("load ingredients of recipe {id}"))?;
        Ok(Some(rows))
    }

    async fn save_totals(&self, id: i64, totals: &Totals) -> anyhow::Result<Option<Totals>> {
        let previous = sqlx::query_as::<_, (Decimal, Decimal, Decimal, Decimal)>(
            r#"
            WITH old AS (
                SELECT id, total_calories, total_carbs, total_fat, total_protein
                  FROM recipes
                 WHERE id = $1
                   FOR UPDATE
            )
            UPDATE recipes r
               SET total_calories = $2,
                   total_carbs    = $3,
                   total_fat      = $4,
                   total_protein  = $5,
                   updated_at     = now()
              FROM old
             WHERE r.id = old.id
            RETURNING old.total_calories, old.total_carbs, old.total_fat, old.total_protein
            "#,
        )
        .bind(id)
        .bind(totals.calories)
        .bind(totals.carbs)
        .bind(totals.fat)
        .bind(totals.protein)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("save totals of recipe {id}"))?;

        Ok(previous.map(|(calories, carbs, fat, protein)| Totals {
            calories,
            carbs,
            fat,
            protein,
        }))
    }
}
