//! Recipe nutrition totals.
//!
//! Totals are derived from the ingredient list alone: every per-100 macro is
//! projected onto the quantity actually used and summed. Calories come from
//! the macros via 4/4/9 kcal per gram, never from an ingredient's own
//! `calories_per_100g`, so the four totals always agree with each other.

use std::iter::Sum;
use std::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

const KCAL_PER_GRAM_CARBS: Decimal = Decimal::from_parts(4, 0, 0, false, 0);
const KCAL_PER_GRAM_PROTEIN: Decimal = Decimal::from_parts(4, 0, 0, false, 0);
const KCAL_PER_GRAM_FAT: Decimal = Decimal::from_parts(9, 0, 0, false, 0);

/// Anything that carries a quantity and per-100-unit macros.
pub trait MacroSource {
    fn quantity(&self) -> Decimal;
    fn carbs_per_100g(&self) -> Option<Decimal>;
    fn fat_per_100g(&self) -> Option<Decimal>;
    fn protein_per_100g(&self) -> Option<Decimal>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub calories: Decimal,
    pub carbs: Decimal,
    pub fat: Decimal,
    pub protein: Decimal,
}

impl Totals {
    fn rounded(self) -> Self {
        Self {
            calories: round_cents(self.calories),
            carbs: round_cents(self.carbs),
            fat: round_cents(self.fat),
            protein: round_cents(self.protein),
        }
    }
}

impl Add for Totals {
    type Output = Totals;

    fn add(self, other: Totals) -> Totals {
        Totals {
            calories: self.calories + other.calories,
            carbs: self.carbs + other.carbs,
            fat: self.fat + other.fat,
            protein: self.protein + other.protein,
        }
    }
}

impl Sum for Totals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Totals::default(), |acc, t| acc + t)
    }
}

/// Rounds half-up to exactly two fractional digits (`139.5` becomes `139.50`).
pub fn round_cents(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Sums the contribution of every ingredient, rounding once at the end.
pub fn aggregate<I: MacroSource>(ingredients: &[I]) -> Totals {
    ingredients.iter().map(contribution).sum::<Totals>().rounded()
}

/// Kilocalories of the given grams of macros (4/4/9), unrounded.
pub fn energy(carbs: Decimal, fat: Decimal, protein: Decimal) -> Decimal {
    carbs * KCAL_PER_GRAM_CARBS + protein * KCAL_PER_GRAM_PROTEIN + fat * KCAL_PER_GRAM_FAT
}

fn contribution<I: MacroSource>(ingredient: &I) -> Totals {
    let scale = ingredient.quantity() / Decimal::ONE_HUNDRED;
    let carbs = ingredient.carbs_per_100g().unwrap_or_default();
    let fat = ingredient.fat_per_100g().unwrap_or_default();
    let protein = ingredient.protein_per_100g().unwrap_or_default();

    Totals {
        calories: energy(carbs, fat, protein) * scale,
        carbs: carbs * scale,
        fat: fat * scale,
        protein: protein * scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[derive(Clone)]
    struct Item {
        quantity: Decimal,
        carbs: Option<Decimal>,
        fat: Option<Decimal>,
        protein: Option<Decimal>,
    }

    impl MacroSource for Item {
        fn quantity(&self) -> Decimal {
            self.quantity
        }
        fn carbs_per_100g(&self) -> Option<Decimal> {
            self.carbs
        }
        fn fat_per_100g(&self) -> Option<Decimal> {
            self.fat
        }
        fn protein_per_100g(&self) -> Option<Decimal> {
            self.protein
        }
    }

    fn item(quantity: Decimal, carbs: Decimal, fat: Decimal, protein: Decimal) -> Item {
        Item {
            quantity,
            carbs: Some(carbs),
            fat: Some(fat),
            protein: Some(protein),
        }
    }

    #[test]
    fn empty_list_is_all_zero() {
        let totals = aggregate::<Item>(&[]);
        assert_eq!(totals, Totals::default());
        assert_eq!(totals.calories.to_string(), "0.00");
    }

    #[test]
    fn single_ingredient_scales_by_quantity() {
        let totals = aggregate(&[item(dec!(150), dec!(10), dec!(5), dec!(2))]);
        assert_eq!(totals.carbs, dec!(15.00));
        assert_eq!(totals.fat, dec!(7.50));
        assert_eq!(totals.protein, dec!(3.00));
        assert_eq!(totals.calories, dec!(139.50));
        assert_eq!(serde_json::to_value(totals.calories).unwrap(), "139.50");
    }

    #[test]
    fn missing_macros_count_as_zero() {
        let partial = Item {
            quantity: dec!(200),
            carbs: None,
            fat: Some(dec!(1)),
            protein: None,
        };
        let totals = aggregate(&[partial]);
        assert_eq!(totals.carbs, dec!(0));
        assert_eq!(totals.protein, dec!(0));
        assert_eq!(totals.fat, dec!(2));
        assert_eq!(totals.calories, dec!(18));
    }

    #[test]
    fn order_does_not_matter() {
        let a = item(dec!(33.33), dec!(12.7), dec!(0.4), dec!(8.1));
        let b = item(dec!(250), dec!(0), dec!(100), dec!(0));
        let c = item(dec!(7.5), dec!(64.2), dec!(6.1), dec!(14.1));

        let forward = aggregate(&[a.clone(), b.clone(), c.clone()]);
        assert_eq!(forward, aggregate(&[c.clone(), a.clone(), b.clone()]));
        assert_eq!(forward, aggregate(&[b, c, a]));
    }

    #[test]
    fn rounds_once_after_summation() {
        // each contributes 0.005 g of carbs; rounding per item would give 0.03
        let tiny = item(dec!(0.5), dec!(1), dec!(0), dec!(0));
        let totals = aggregate(&[tiny.clone(), tiny.clone(), tiny]);
        assert_eq!(totals.carbs, dec!(0.02));
    }

    #[test]
    fn rounds_midpoints_up() {
        let totals = aggregate(&[item(dec!(12.5), dec!(1), dec!(0), dec!(0))]);
        assert_eq!(totals.carbs, dec!(0.13));
        assert_eq!(round_cents(dec!(2.345)), dec!(2.35));
        assert_eq!(round_cents(dec!(2.344)).to_string(), "2.34");
    }

    #[test]
    fn is_idempotent() {
        let items = [
            item(dec!(120), dec!(76), dec!(1.8), dec!(7.5)),
            item(dec!(15), dec!(0), dec!(100), dec!(0)),
        ];
        let first = aggregate(&items);
        let second = aggregate(&items);
        assert_eq!(first, second);
        assert_eq!(first.calories.serialize(), second.calories.serialize());
    }
}
