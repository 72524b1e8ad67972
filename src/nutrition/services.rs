use rust_decimal::Decimal;
use tracing::{info, warn};

use super::client::NutritionClient;
use super::dto::{NewNutritionFact, SubmissionResult};

/// Ingredients every deployment registers upstream: (name, carbs, fat, protein)
/// per 100 g, in tenths of a gram.
const REQUIRED: [(&str, i64, i64, i64); 2] = [
    ("Organic Quinoa", 642, 61, 141),
    ("Greek Yogurt", 40, 100, 100),
];

pub fn required_ingredients() -> Vec<NewNutritionFact> {
    REQUIRED
        .iter()
        .map(|&(name, carbs, fat, protein)| NewNutritionFact {
            name: name.to_string(),
            carbs: Decimal::new(carbs, 1),
            fat: Decimal::new(fat, 1),
            protein: Decimal::new(protein, 1),
        })
        .collect()
}

/// Adds each required ingredient in turn; a failed add does not stop the next.
pub async fn submit_required(client: &NutritionClient) -> Vec<SubmissionResult> {
    let mut results = Vec::with_capacity(REQUIRED.len());
    for ingredient in required_ingredients() {
        let result = match client.add(&ingredient).await {
            Ok(lookup) => {
                info!(name = %ingredient.name, degraded = lookup.degraded, "required ingredient added");
                SubmissionResult {
                    ingredient: ingredient.name,
                    success: true,
                    response: Some(lookup.data),
                    message: "Added successfully".into(),
                }
            }
            Err(e) => {
                warn!(name = %ingredient.name, error = %e, "required ingredient rejected");
                SubmissionResult {
                    ingredient: ingredient.name,
                    success: false,
                    response: None,
                    message: e.to_string(),
                }
            }
        };
        results.push(result);
    }
    results
}
