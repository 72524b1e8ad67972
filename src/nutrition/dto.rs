use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;

const NAME_MAX_CHARS: usize = 255;

/// One ingredient as reported by the nutrition service, values per 100 g.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionFact {
    /// Upstream ids are not guaranteed to be numeric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub name: String,
    #[serde(default, alias = "carbs")]
    pub carbs_per_100g: Option<Decimal>,
    #[serde(default, alias = "fat")]
    pub fat_per_100g: Option<Decimal>,
    #[serde(default, alias = "protein")]
    pub protein_per_100g: Option<Decimal>,
    #[serde(default, alias = "calories")]
    pub calories_per_100g: Option<Decimal>,
}

/// Shapes the upstream has been seen to answer with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum Listing {
    Many(Vec<NutritionFact>),
    Wrapped { data: Vec<NutritionFact> },
    One(NutritionFact),
}

impl Listing {
    pub(super) fn into_facts(self) -> Vec<NutritionFact> {
        match self {
            Listing::Many(facts) | Listing::Wrapped { data: facts } => facts,
            Listing::One(fact) => vec![fact],
        }
    }
}

/// Form body posted upstream when adding an ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewNutritionFact {
    pub name: String,
    pub carbs: Decimal,
    pub fat: Decimal,
    pub protein: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddIngredientRequest {
    pub name: Option<String>,
    pub carbs: Option<Decimal>,
    pub fat: Option<Decimal>,
    pub protein: Option<Decimal>,
}

impl AddIngredientRequest {
    pub fn validate(self) -> Result<NewNutritionFact, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = match self.name.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("name", "The name field is required.");
                None
            }
            Some(name) if name.chars().count() > NAME_MAX_CHARS => {
                errors.add(
                    "name",
                    format!("The name may not be greater than {NAME_MAX_CHARS} characters."),
                );
                None
            }
            Some(name) => Some(name.to_string()),
        };
        let carbs = macro_value(&mut errors, "carbs", self.carbs);
        let fat = macro_value(&mut errors, "fat", self.fat);
        let protein = macro_value(&mut errors, "protein", self.protein);

        match (name, carbs, fat, protein) {
            (Some(name), Some(carbs), Some(fat), Some(protein)) if errors.is_empty() => {
                Ok(NewNutritionFact {
                    name,
                    carbs,
                    fat,
                    protein,
                })
            }
            _ => Err(errors),
        }
    }
}

fn macro_value(errors: &mut ValidationErrors, field: &str, value: Option<Decimal>) -> Option<Decimal> {
    match value {
        None => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
        Some(v) if v.is_sign_negative() && !v.is_zero() => {
            errors.add(field, format!("The {field} must be at least 0."));
            None
        }
        Some(v) => Some(v),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub ingredient: Option<String>,
}

impl SearchQuery {
    pub fn validate(self) -> Result<String, ValidationErrors> {
        match self.ingredient.map(|s| s.trim().to_string()) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(ValidationErrors::single(
                "ingredient",
                "The ingredient field is required.",
            )),
        }
    }
}

/// Outcome of one seeded ingredient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub ingredient: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<NutritionFact>,
    pub message: String,
}

/// Case-insensitive exact name first, then the first name containing `query`.
pub fn best_match<'a>(facts: &'a [NutritionFact], query: &str) -> Option<&'a NutritionFact> {
    let needle = query.to_lowercase();
    facts
        .iter()
        .find(|f| f.name.to_lowercase() == needle)
        .or_else(|| facts.iter().find(|f| f.name.to_lowercase().contains(&needle)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn fact(name: &str) -> NutritionFact {
        NutritionFact {
            id: None,
            name: name.into(),
            carbs_per_100g: None,
            fat_per_100g: None,
            protein_per_100g: None,
            calories_per_100g: None,
        }
    }

    #[test]
    fn short_upstream_keys_are_accepted() {
        let parsed: NutritionFact = serde_json::from_value(json!({
            "id": "abc", "name": "Lentils", "carbs": 60.1, "fat": "1.1", "protein": 25
        }))
        .unwrap();
        assert_eq!(parsed.id, Some(json!("abc")));
        assert_eq!(parsed.carbs_per_100g, Some(dec!(60.1)));
        assert_eq!(parsed.fat_per_100g, Some(dec!(1.1)));
        assert_eq!(parsed.protein_per_100g, Some(dec!(25)));
        assert_eq!(parsed.calories_per_100g, None);
    }

    #[test]
    fn listing_accepts_list_wrapper_and_single() {
        let many: Listing = serde_json::from_value(json!([{"name": "A"}, {"name": "B"}])).unwrap();
        assert_eq!(many.into_facts().len(), 2);

        let wrapped: Listing = serde_json::from_value(json!({"data": [{"name": "A"}]})).unwrap();
        assert_eq!(wrapped.into_facts()[0].name, "A");

        let one: Listing = serde_json::from_value(json!({"id": 3, "name": "C"})).unwrap();
        assert_eq!(one.into_facts(), vec![NutritionFact { id: Some(json!(3)), ..fact("C") }]);
    }

    #[test]
    fn best_match_prefers_exact_name() {
        let facts = vec![fact("Greek Yogurt"), fact("Yogurt")];
        assert_eq!(best_match(&facts, "YOGURT").unwrap().name, "Yogurt");
        assert_eq!(best_match(&facts, "greek").unwrap().name, "Greek Yogurt");
        assert!(best_match(&facts, "tofu").is_none());
    }

    #[test]
    fn add_request_requires_all_fields() {
        let errors = AddIngredientRequest::default().validate().unwrap_err();
        for field in ["name", "carbs", "fat", "protein"] {
            assert!(errors.contains(field), "missing {field}");
        }

        let errors = AddIngredientRequest {
            name: Some("Tofu".into()),
            carbs: Some(dec!(1.9)),
            fat: Some(dec!(-4.8)),
            protein: Some(dec!(8)),
        }
        .validate()
        .unwrap_err();
        assert!(errors.contains("fat"));
        assert!(!errors.contains("name"));
    }

    #[test]
    fn add_request_trims_name() {
        let new = AddIngredientRequest {
            name: Some("  Tofu ".into()),
            carbs: Some(dec!(1.9)),
            fat: Some(dec!(4.8)),
            protein: Some(dec!(8)),
        }
        .validate()
        .unwrap();
        assert_eq!(new.name, "Tofu");
    }

    #[test]
    fn search_query_must_not_be_blank() {
        assert!(SearchQuery { ingredient: Some("  ".into()) }.validate().is_err());
        assert_eq!(
            SearchQuery { ingredient: Some("rice".into()) }.validate().unwrap(),
            "rice"
        );
    }
}
