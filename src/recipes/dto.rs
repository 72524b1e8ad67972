use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::nutrition::{aggregate, round_cents, Totals};
use super::repo_types::{NewIngredient, NewStep, RecipeDraft, RecipePatch};
use crate::error::ValidationErrors;

const NAME_MAX_CHARS: usize = 255;
/// Largest value a `NUMERIC(8,2)` ingredient column holds.
const MAX_AMOUNT: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);
/// Largest value a `NUMERIC(12,2)` recipe total column holds.
const MAX_TOTAL: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Body of `POST /recipes` and `PUT /recipes/{id}`.
///
/// Every field is kept as raw JSON so that a wrongly typed value is reported
/// under its own key instead of failing the whole body. An absent field is
/// `None`, an explicit `null` is `Some(Value::Null)`.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeRequest {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub servings: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub prep_time: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub cook_time: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub ingredients: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub steps: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngredientRequest {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub quantity: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub unit: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub carbs_per_100g: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub fat_per_100g: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub protein_per_100g: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub calories_per_100g: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StepRequest {
    #[serde(default, deserialize_with = "present")]
    pub step_number: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub instruction: Option<Value>,
}

/// Keeps an explicit `null` instead of folding it into "absent".
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn given(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

impl RecipeRequest {
    pub fn into_draft(self) -> Result<RecipeDraft, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = check_name(&mut errors, "name", self.name);
        let description = given(self.description).and_then(|v| string(&mut errors, "description", v));
        let servings = match given(self.servings) {
            Some(v) => check_servings(&mut errors, &v),
            None => {
                errors.add("servings", "The servings field is required.");
                None
            }
        };
        let prep_time = check_minutes(&mut errors, "prep_time", given(self.prep_time));
        let cook_time = check_minutes(&mut errors, "cook_time", given(self.cook_time));
        let ingredients = check_ingredients(&mut errors, self.ingredients);
        let steps = check_steps(&mut errors, self.steps);

        match (name, servings, ingredients, steps) {
            (Some(name), Some(servings), Some(ingredients), Some(steps)) if errors.is_empty() => {
                Ok(RecipeDraft {
                    name,
                    description,
                    servings,
                    prep_time,
                    cook_time,
                    ingredients,
                    steps,
                })
            }
            _ => Err(errors),
        }
    }

    /// Only fields present in the body are validated and applied. Required
    /// fields may be left out but not sent as `null`.
    pub fn into_patch(self) -> Result<RecipePatch, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = self
            .name
            .and_then(|v| check_name(&mut errors, "name", Some(v)));
        let description = self.description.map(|v| match v {
            Value::Null => None,
            v => string(&mut errors, "description", v),
        });
        let servings = self.servings.and_then(|v| match v {
            Value::Null => {
                errors.add("servings", "The servings field is required.");
                None
            }
            v => check_servings(&mut errors, &v),
        });
        let prep_time = self
            .prep_time
            .map(|v| check_minutes(&mut errors, "prep_time", given(Some(v))));
        let cook_time = self
            .cook_time
            .map(|v| check_minutes(&mut errors, "cook_time", given(Some(v))));
        let ingredients = self
            .ingredients
            .and_then(|v| check_ingredients(&mut errors, Some(v)));
        let steps = self.steps.and_then(|v| check_steps(&mut errors, Some(v)));

        errors.into_result(RecipePatch {
            name,
            description,
            servings,
            prep_time,
            cook_time,
            ingredients,
            steps,
        })
    }
}

fn string(errors: &mut ValidationErrors, field: &str, value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        _ => {
            errors.add(field, format!("The {field} must be a string."));
            None
        }
    }
}

/// Integers, or strings holding one.
fn integer(errors: &mut ValidationErrors, field: &str, value: &Value) -> Option<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    if parsed.is_none() {
        errors.add(field, format!("The {field} must be an integer."));
    }
    parsed
}

/// Numbers, or strings holding one, read exactly as written.
fn number(errors: &mut ValidationErrors, field: &str, value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    };
    let parsed = text.and_then(|t| {
        Decimal::from_str(&t)
            .or_else(|_| Decimal::from_scientific(&t))
            .ok()
    });
    if parsed.is_none() {
        errors.add(field, format!("The {field} must be a number."));
    }
    parsed
}

fn required_text(errors: &mut ValidationErrors, field: &str, value: Option<Value>) -> Option<String> {
    let Some(value) = given(value) else {
        errors.add(field, format!("The {field} field is required."));
        return None;
    };
    let text = string(errors, field, value)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        errors.add(field, format!("The {field} field is required."));
        return None;
    }
    Some(trimmed.to_string())
}

fn check_name(errors: &mut ValidationErrors, field: &str, value: Option<Value>) -> Option<String> {
    let name = required_text(errors, field, value)?;
    if name.chars().count() > NAME_MAX_CHARS {
        errors.add(
            field,
            format!("The {field} may not be greater than {NAME_MAX_CHARS} characters."),
        );
        return None;
    }
    Some(name)
}

fn check_servings(errors: &mut ValidationErrors, value: &Value) -> Option<i32> {
    let servings = integer(errors, "servings", value)?;
    match i32::try_from(servings) {
        Ok(servings) if servings >= 1 => Some(servings),
        _ => {
            errors.add("servings", "The servings must be at least 1.");
            None
        }
    }
}

/// Absent or null minutes default to zero.
fn check_minutes(errors: &mut ValidationErrors, field: &str, value: Option<Value>) -> i32 {
    let Some(value) = value else {
        return 0;
    };
    let Some(minutes) = integer(errors, field, &value) else {
        return 0;
    };
    match i32::try_from(minutes) {
        Ok(minutes) if minutes >= 0 => minutes,
        _ => {
            errors.add(field, format!("The {field} must be at least 0."));
            0
        }
    }
}

fn check_amount(errors: &mut ValidationErrors, field: &str, value: &Value) -> Option<Decimal> {
    let value = number(errors, field, value)?;
    if value.is_sign_negative() && !value.is_zero() {
        errors.add(field, format!("The {field} must be at least 0."));
        return None;
    }
    let normalized = round_cents(value);
    if normalized > MAX_AMOUNT {
        errors.add(field, format!("The {field} may not be greater than {MAX_AMOUNT}."));
        return None;
    }
    Some(normalized)
}

fn check_optional_amount(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<Value>,
) -> Option<Decimal> {
    given(value).and_then(|v| check_amount(errors, field, &v))
}

/// Unwraps a required, non-empty array field.
fn check_list(errors: &mut ValidationErrors, field: &str, value: Option<Value>) -> Option<Vec<Value>> {
    match given(value) {
        None => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
        Some(Value::Array(list)) if list.is_empty() => {
            errors.add(field, format!("The {field} must have at least 1 items."));
            None
        }
        Some(Value::Array(list)) => Some(list),
        Some(_) => {
            errors.add(field, format!("The {field} must be an array."));
            None
        }
    }
}

/// Parses one list element, which has to be a JSON object.
fn element<T: for<'de> Deserialize<'de>>(errors: &mut ValidationErrors, field: &str, value: Value) -> Option<T> {
    if !value.is_object() {
        errors.add(field, format!("The {field} must be an object."));
        return None;
    }
    match serde_json::from_value(value) {
        Ok(item) => Some(item),
        Err(_) => {
            errors.add(field, format!("The {field} must be an object."));
            None
        }
    }
}

fn exceeds_total_columns(totals: &Totals) -> bool {
    [totals.calories, totals.carbs, totals.fat, totals.protein]
        .iter()
        .any(|v| *v > MAX_TOTAL)
}

fn check_ingredients(errors: &mut ValidationErrors, value: Option<Value>) -> Option<Vec<NewIngredient>> {
    let list = check_list(errors, "ingredients", value)?;

    let before = errors.clone();
    let mut out = Vec::with_capacity(list.len());
    for (i, item) in list.into_iter().enumerate() {
        let prefix = format!("ingredients.{i}");
        let Some(item) = element::<IngredientRequest>(errors, &prefix, item) else {
            continue;
        };
        let name = required_text(errors, &format!("{prefix}.name"), item.name);
        let unit = required_text(errors, &format!("{prefix}.unit"), item.unit);
        let field = format!("{prefix}.quantity");
        let quantity = match given(item.quantity) {
            Some(q) => check_amount(errors, &field, &q),
            None => {
                errors.add(&field, format!("The {field} field is required."));
                None
            }
        };
        let carbs = check_optional_amount(errors, &format!("{prefix}.carbs_per_100g"), item.carbs_per_100g);
        let fat = check_optional_amount(errors, &format!("{prefix}.fat_per_100g"), item.fat_per_100g);
        let protein =
            check_optional_amount(errors, &format!("{prefix}.protein_per_100g"), item.protein_per_100g);
        let calories =
            check_optional_amount(errors, &format!("{prefix}.calories_per_100g"), item.calories_per_100g);

        if let (Some(name), Some(unit), Some(quantity)) = (name, unit, quantity) {
            out.push(NewIngredient {
                name,
                quantity,
                unit,
                carbs_per_100g: carbs,
                fat_per_100g: fat,
                protein_per_100g: protein,
                calories_per_100g: calories,
            });
        }
    }

    if *errors != before {
        return None;
    }
    if exceeds_total_columns(&aggregate(&out)) {
        errors.add(
            "ingredients",
            format!("The ingredients add up to more than {MAX_TOTAL} in a recipe total."),
        );
        return None;
    }
    Some(out)
}

fn check_steps(errors: &mut ValidationErrors, value: Option<Value>) -> Option<Vec<NewStep>> {
    let list = check_list(errors, "steps", value)?;

    let before = errors.clone();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(list.len());
    for (i, item) in list.into_iter().enumerate() {
        let prefix = format!("steps.{i}");
        let Some(item) = element::<StepRequest>(errors, &prefix, item) else {
            continue;
        };
        let field = format!("{prefix}.step_number");
        let step_number = match given(item.step_number) {
            None => {
                errors.add(&field, format!("The {field} field is required."));
                None
            }
            Some(v) => match integer(errors, &field, &v).map(i32::try_from) {
                None => None,
                Some(Ok(n)) if n >= 1 => {
                    if seen.insert(n) {
                        Some(n)
                    } else {
                        errors.add(&field, format!("The {field} field has a duplicate value."));
                        None
                    }
                }
                Some(_) => {
                    errors.add(&field, format!("The {field} must be at least 1."));
                    None
                }
            },
        };
        let instruction = required_text(errors, &format!("{prefix}.instruction"), item.instruction);

        if let (Some(step_number), Some(instruction)) = (step_number, instruction) {
            out.push(NewStep {
                step_number,
                instruction,
            });
        }
    }

    (*errors == before).then_some(out)
}
