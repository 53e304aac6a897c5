//! The fixed seven-day anti-inflammatory meal plan
//!
//! Feeds "today's plan" and the shopping-list generator.

use chrono::Weekday;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealSlot {
    pub name: &'static str,
    pub recipe: &'static str,
    pub details: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub day: &'static str,
    pub meal_slots: Vec<MealSlot>,
    pub ingredients: Vec<&'static str>,
}

/// Monday-first list of day plans
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeeklyPlan {
    pub days: Vec<DayPlan>,
}

impl WeeklyPlan {
    /// Plan for a given weekday
    pub fn day(&self, weekday: Weekday) -> Option<&DayPlan> {
        self.days.get(weekday.num_days_from_monday() as usize)
    }
}

const fn slot(name: &'static str, recipe: &'static str, details: &'static str) -> MealSlot {
    MealSlot { name, recipe, details }
}

fn day(day: &'static str, slots: [MealSlot; 3], ingredients: &[&'static str]) -> DayPlan {
    DayPlan {
        day,
        meal_slots: slots.to_vec(),
        ingredients: ingredients.to_vec(),
    }
}

/// The plan every user follows
pub fn standard_plan() -> WeeklyPlan {
    let eggs_avocado = slot("Breakfast", "Eggs & Avocado", "Scrambled eggs with sliced avocado.");
    let chicken_salad = slot("Lunch", "Chicken Salad", "Grilled chicken, spinach, cucumber, olive oil.");
    let salmon_dinner = slot("Dinner", "Salmon & Sweet Potato", "Baked salmon with roasted sweet potato.");
    let salmon_day_ingredients = [
        "Eggs",
        "Avocado",
        "Chicken Breast",
        "Spinach",
        "Cucumber",
        "Olive Oil",
        "Salmon Fillet",
        "Sweet Potato",
    ];

    WeeklyPlan {
        days: vec![
            day(
                "Monday",
                [eggs_avocado.clone(), chicken_salad.clone(), salmon_dinner.clone()],
                &salmon_day_ingredients,
            ),
            day(
                "Tuesday",
                [
                    slot("Breakfast", "Leftover Salmon", "Flaked salmon from last night."),
                    slot("Lunch", "Beef Stir-Fry (No Soy)", "Beef strips, broccoli, mushrooms, coconut aminos."),
                    slot("Dinner", "Pork Loin & Quinoa", "Roasted pork loin with a side of quinoa."),
                ],
                &["Salmon Fillet", "Beef Strips", "Broccoli", "Mushrooms", "Coconut Aminos", "Pork Loin", "Quinoa"],
            ),
            day(
                "Wednesday",
                [eggs_avocado.clone(), chicken_salad.clone(), salmon_dinner.clone()],
                &salmon_day_ingredients,
            ),
            day(
                "Thursday",
                [
                    slot("Breakfast", "Leftover Pork", "Sliced pork loin."),
                    slot("Lunch", "Beef Stir-Fry (No Soy)", "Leftover beef stir-fry."),
                    slot("Dinner", "Chicken & Quinoa", "Grilled chicken with quinoa and zucchini."),
                ],
                &["Pork Loin", "Beef Strips", "Broccoli", "Mushrooms", "Chicken Breast", "Quinoa", "Zucchini"],
            ),
            day(
                "Friday",
                [eggs_avocado.clone(), chicken_salad, salmon_dinner],
                &salmon_day_ingredients,
            ),
            day(
                "Saturday",
                [
                    slot("Breakfast", "Leftover Chicken", "Cold chicken and avocado."),
                    slot("Lunch", "Beef & Broccoli", "Simple stir-fry with coconut aminos."),
                    slot("Dinner", "Pork Mince & Veg", "Pork mince cooked with mushrooms and spinach."),
                ],
                &[
                    "Chicken Breast",
                    "Avocado",
                    "Beef Strips",
                    "Broccoli",
                    "Coconut Aminos",
                    "Pork Mince",
                    "Mushrooms",
                    "Spinach",
                ],
            ),
            day(
                "Sunday",
                [
                    eggs_avocado,
                    slot("Lunch", "Leftover Pork Mince", "Reheated pork mince from last night."),
                    slot("Dinner", "Chicken & Quinoa", "Meal prep for the week ahead."),
                ],
                &[
                    "Lean Pork Mince",
                    "Broccoli",
                    "Quinoa",
                    "Coconut Aminos",
                    "Ground Chicken",
                    "Zucchini",
                    "Mushrooms",
                    "Eggs",
                    "Avocado",
                    "Salmon Fillet",
                    "Sweet Potato",
                ],
            ),
        ],
    }
}
