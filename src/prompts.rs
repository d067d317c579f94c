use crate::models::{GenerativeParameters, PastMeal, RecipeDetail};

/// Recipes and past meals beyond these limits are left out of the prompt
const MAX_PROMPT_RECIPES: usize = 40;
const MAX_PROMPT_PAST_MEALS: usize = 10;

pub fn title_prompt(question: &str) -> String {
    format!(
        "Create a short title (at most six words) for a cooking conversation that starts with \
         the message below. Reply with the title only, no quotes or punctuation at the end.\n\n\
         Message: {}",
        question.trim()
    )
}

/// Strip the quoting and trailing periods models like to add around titles
pub fn clean_title(raw: &str) -> String {
    raw.lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '*')
        .trim_end_matches('.')
        .trim()
        .to_string()
}

pub fn suggestion_prompt(
    recipes: &[RecipeDetail],
    past_meals: &[PastMeal],
    params: &GenerativeParameters,
) -> String {
    let mut prompt = String::from(
        "You are a friendly home-cooking assistant. Suggest one meal that fits the preferences \
         below. Give the dish name, a one-paragraph reason it fits, the ingredients and short \
         numbered steps.\n\n",
    );

    prompt.push_str("Preferences:\n");
    prompt.push_str(&format!("- Meal: {}\n", params.meal_type));
    prompt.push_str(&format!("- Cuisine: {}\n", params.cuisine));
    prompt.push_str(&format!("- Mood: {}\n", params.mood));
    if !params.dietary.is_empty() {
        prompt.push_str(&format!("- Dietary requirement: {}\n", params.dietary));
    }
    if params.is_quick {
        prompt.push_str("- It must be quick: 30 minutes or less\n");
    }

    if !past_meals.is_empty() {
        prompt.push_str("\nRecently eaten (avoid repeating these):\n");
        for meal in past_meals.iter().rev().take(MAX_PROMPT_PAST_MEALS) {
            prompt.push_str(&format!(
                "- {} on {}: {}\n",
                meal.meal_type,
                meal.eaten_on.format("%Y-%m-%d"),
                meal.description
            ));
        }
    }

    // Prefer the requested cuisine, then whatever else is cached
    let mut known: Vec<&RecipeDetail> = recipes
        .iter()
        .filter(|r| r.area.eq_ignore_ascii_case(&params.cuisine))
        .collect();
    known.extend(
        recipes
            .iter()
            .filter(|r| !r.area.eq_ignore_ascii_case(&params.cuisine)),
    );
    if !known.is_empty() {
        prompt.push_str("\nRecipes the user already has in the app (you may pick one of these):\n");
        for recipe in known.into_iter().take(MAX_PROMPT_RECIPES) {
            prompt.push_str(&format!(
                "- {} ({}, {})\n",
                recipe.title, recipe.area, recipe.category
            ));
        }
    }

    prompt
}
