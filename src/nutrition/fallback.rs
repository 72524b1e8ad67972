//! Offline nutrition data served while the upstream service is unusable.

use rand::Rng;
use rust_decimal::Decimal;

use super::dto::{best_match, NewNutritionFact, NutritionFact};
use crate::recipes::nutrition::{energy, round_cents};

/// (name, carbs, fat, protein) in tenths of a gram, then kcal; all per 100 g.
const DATASET: [(&str, i64, i64, i64, i64); 6] = [
    ("Chicken Breast", 0, 36, 310, 165),
    ("Brown Rice", 760, 18, 75, 362),
    ("Broccoli", 66, 4, 28, 34),
    ("Olive Oil", 0, 1000, 0, 884),
    ("Organic Quinoa", 642, 61, 141, 368),
    ("Greek Yogurt", 40, 100, 100, 146),
];

pub fn ingredients() -> Vec<NutritionFact> {
    DATASET
        .iter()
        .zip(1u32..)
        .map(|(&(name, carbs, fat, protein, calories), id)| NutritionFact {
            id: Some(id.into()),
            name: name.to_string(),
            carbs_per_100g: Some(Decimal::new(carbs, 1)),
            fat_per_100g: Some(Decimal::new(fat, 1)),
            protein_per_100g: Some(Decimal::new(protein, 1)),
            calories_per_100g: Some(Decimal::from(calories)),
        })
        .collect()
}

pub fn find(name: &str) -> Option<NutritionFact> {
    best_match(&ingredients(), name).cloned()
}

/// What an add looks like when nothing was stored: the input echoed back
/// under a throwaway id, calories derived from the macros.
pub fn echo_added(new: &NewNutritionFact) -> NutritionFact {
    let id: u32 = rand::thread_rng().gen_range(100..=999);
    NutritionFact {
        id: Some(id.into()),
        name: new.name.clone(),
        carbs_per_100g: Some(new.carbs),
        fat_per_100g: Some(new.fat),
        protein_per_100g: Some(new.protein),
        calories_per_100g: Some(round_cents(energy(new.carbs, new.fat, new.protein))),
    }
}
