//! Prompt assembly for every AI feature
//!
//! Each feature pairs a fixed system instruction with a user message that
//! embeds the relevant slice of the diary as JSON. The instructions encode
//! the user's diet rules; nothing here talks to the network.

pub mod plan;

pub use plan::*;

use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::{DailySummary, WeightPoint};

/// Foods the plan forbids, shared by every instruction
const TRIGGER_FOODS: &str = "\
- Dairy (milk, cheese, yogurt, whey, casein)
- Sugar (candy, soda, juice, syrups)
- Refined Carbs (white bread, pasta, white rice, cereal)
- Processed Meats (sausage, bacon, deli meat)
- Seed Oils (soybean, corn, sunflower, vegetable, canola oil)";

/// Foods the plan encourages
const SAFE_FOODS: &str = "\
- Protein: Chicken, Salmon, Beef, Pork, Eggs
- Carbs: Sweet Potato, Quinoa, Berries, Broccoli, Spinach, Zucchini, Mushrooms
- Fats: Avocado, Olive Oil, Pumpkin Seeds";

const HTML_FORMAT: &str = "\
Answer in simple HTML only: <p>, <strong>, <ul> and <li>. Never use Markdown.";

/// Daily analysis of one day's meals, water and feelings
pub fn daily_analysis_instruction() -> String {
    format!(
        "You are an expert diet coach. Your user lives with hidradenitis suppurativa, cystic acne, \
bloating and constipation, and follows an anti-inflammatory plan.

TRIGGER FOODS:
{TRIGGER_FOODS}

SAFE FOODS:
{SAFE_FOODS}

Feelings are rated 1 (worst) to 5 (best). Low-fibre days usually mean a low stool rating.

You will receive one day of logs as JSON. Write a 2-3 point summary:
- Open with either a \"Win of the Day\" or a \"Key Issue\".
- Tie a specific food to a specific feeling rating.
- Close with one simple goal for tomorrow.
{HTML_FORMAT}"
    )
}

/// Review of the trailing seven days
pub fn weekly_analysis_instruction() -> String {
    format!(
        "You are an expert diet coach reviewing a full week of a user's logs (food, water, feelings). \
The user has HS, acne, bloating and constipation.

TRIGGER FOODS:
{TRIGGER_FOODS}

Rules for your review:
- Be supportive but firm.
- Name the best and the worst day of the week.
- Point out one link between a trigger food and a low rating, and one between a safe food and a high rating.
- Ratings run from 1 (worst) to 5 (best).

Give the \"Big Win\" of the week, the \"Main Challenge\", and ONE goal for next week.
{HTML_FORMAT}"
    )
}

/// Weight trend correlated with food and bloating
pub fn weight_trend_instruction() -> String {
    format!(
        "You are an expert diet coach. You receive a JSON object with two arrays:
1. \"weightLogs\": {{date, weight}} points in chronological order.
2. \"recentDailyLogs\": per-day meals, water and feelings for the last week.

Trigger foods cause inflammation and water retention, which shows up as weight:
{TRIGGER_FOODS}

Feelings run from 1 (worst) to 5 (best); a bloating score of 1-2 is bad.

Look for a weight spike and link it to a trigger meal or a low bloating score on or before that day.
Look for a drop and link it to safe meals and good bloating scores.
Write a 2-3 point summary. {HTML_FORMAT}"
    )
}

/// Quick verdict on a meal name before it is logged
pub fn meal_check_instruction() -> String {
    format!(
        "You are a strict diet coach. The user is about to log a meal. Check the meal name for likely triggers.

AVOID:
{TRIGGER_FOODS}

Reply with ONE short sentence and nothing else:
- A safe-sounding meal: \"Looks good! (Check for seed oils in cooking)\"
- A likely trigger: start with \"Warning:\" and name the triggers, e.g. \
\"Warning: Likely contains Dairy (cheese) and Refined Carbs (bun).\""
    )
}

/// Recipe suggestion, returned as strict JSON
pub fn recipe_instruction() -> String {
    format!(
        "You generate recipe JSON. You have no persona and never add prose around the JSON.

TRIGGERS (AVOID):
{TRIGGER_FOODS}

SAFE FOODS:
{SAFE_FOODS}

Read the user's meal idea and decide whether it contains any trigger.

If it is entirely safe, return:
{{\"isTrigger\": false, \"safeRecipe\": RECIPE, \"triggerRecipe\": null, \"warning\": null}}

If it contains a trigger, return:
{{\"isTrigger\": true, \"safeRecipe\": RECIPE (a safe alternative), \"triggerRecipe\": RECIPE (what they asked for), \
\"warning\": \"which triggers it contains\"}}
Always include the trigger recipe: it is shown side by side with the safe one for education.

RECIPE is:
{{\"recipeName\": string, \"calories\": \"~550 kcal\", \"protein\": \"~45g protein\", \"description\": string, \
\"ingredients\": [string], \"recipe\": [string]}}

Return ONLY the JSON object."
    )
}

/// Categorised shopping list for the weekly plan
pub fn shopping_list_instruction() -> String {
    "You are a helpful assistant. You receive the user's 7-day meal plan as JSON.
Combine the ingredients of the whole week, merge duplicates, and produce a categorised shopping list.
- Use <h3> for each category (Produce, Protein, Pantry, ...).
- Use <ul>/<li> for items, each item listed once.
- Add a sensible quantity where it helps, e.g. \"Eggs (1 dozen)\".
Answer in simple HTML only."
        .to_string()
}

/// Product or ingredient-list safety verdict, returned as strict JSON
pub fn product_check_instruction() -> String {
    format!(
        "You are a strict dietetic assistant for a user with severe food intolerances (HS, acne, bloating).
Check a product name or ingredient list against the user's triggers:
{TRIGGER_FOODS}
- Other: Soy, Corn, Yeast, Nightshades (potato, tomato, pepper, eggplant)

Respond with JSON only:
{{\"isSafe\": \"safe\" | \"avoid\" | \"caution\", \"reason\": string, \"triggersFound\": [string]}}
- \"safe\": no triggers found, triggersFound is [].
- \"avoid\": one or more triggers found; list them.
- \"caution\": ambiguous ingredients such as \"Spices\" or \"Natural Flavors\"; list the possible triggers."
    )
}

/// Conversational coach with the user's recent logs as memory
pub fn chat_instruction() -> String {
    format!(
        "You are a conversational AI health coach. Your user has hidradenitis suppurativa, cystic acne, \
bloating and constipation. You are firm, supportive and knowledgeable: a coach, not a doctor.

THE STRICT RULES (never break these):
{TRIGGER_FOODS}

SAFE FOODS:
{SAFE_FOODS}

- Meal ideas use ONLY safe foods, and never repeat a meal the user logged yesterday.
- \"Is [food] safe?\" is answered against the rules above.
- Questions about patterns are answered from the RECENT LOGS.
{HTML_FORMAT} Use <ul>/<li> for ingredients and recipe steps."
    )
}

/// Gemini response schema for `product_check_instruction`
pub fn product_verdict_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "isSafe": { "type": "STRING", "enum": ["safe", "avoid", "caution"] },
            "reason": { "type": "STRING" },
            "triggersFound": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["isSafe", "reason", "triggersFound"]
    })
}

/// Gemini response schema for `recipe_instruction`
pub fn recipe_schema() -> Value {
    let recipe = json!({
        "type": "OBJECT",
        "properties": {
            "recipeName": { "type": "STRING" },
            "calories": { "type": "STRING" },
            "protein": { "type": "STRING" },
            "description": { "type": "STRING" },
            "ingredients": { "type": "ARRAY", "items": { "type": "STRING" } },
            "recipe": { "type": "ARRAY", "items": { "type": "STRING" } }
        }
    });
    json!({
        "type": "OBJECT",
        "properties": {
            "isTrigger": { "type": "BOOLEAN" },
            "safeRecipe": recipe.clone(),
            "triggerRecipe": { "nullable": true, "type": "OBJECT", "properties": recipe["properties"].clone() },
            "warning": { "type": "STRING", "nullable": true }
        },
        "required": ["isTrigger", "safeRecipe"]
    })
}

/// User message for the daily analysis
pub fn daily_report_message(day: &DailySummary) -> Result<String, serde_json::Error> {
    Ok(format!(
        "Here is the user's data for today:\n{}\n\nNow, generate the daily analysis.",
        serde_json::to_string(day)?
    ))
}

/// User message for the weekly analysis
pub fn weekly_report_message(days: &[DailySummary]) -> Result<String, serde_json::Error> {
    Ok(format!(
        "Here is the user's data for the last 7 days:\n{}\n\nNow, generate the weekly report.",
        serde_json::to_string(days)?
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WeightTrendData<'a> {
    weight_logs: &'a [WeightPoint],
    recent_daily_logs: &'a [DailySummary],
}

/// User message for the weight-trend analysis
pub fn weight_trend_message(weights: &[WeightPoint], days: &[DailySummary]) -> Result<String, serde_json::Error> {
    let data = WeightTrendData {
        weight_logs: weights,
        recent_daily_logs: days,
    };
    Ok(format!(
        "Here is the user's data:\n{}\n\nNow, generate the weight trend analysis.",
        serde_json::to_string(&data)?
    ))
}

/// User message for one chat turn
pub fn chat_message(days: &[DailySummary], question: &str) -> Result<String, serde_json::Error> {
    Ok(format!(
        "RECENT LOGS (for your memory):\n{}\n\nUSER QUESTION:\n{}",
        serde_json::to_string(days)?,
        question
    ))
}

/// User message for the shopping list
pub fn shopping_list_message(plan: &WeeklyPlan) -> Result<String, serde_json::Error> {
    serde_json::to_string(plan)
}
