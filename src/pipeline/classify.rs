//! Classification heuristics: dish text → category, English label → Amharic.
//!
//! Pure functions with no state. Rule order matters: the first rule whose
//! keyword appears anywhere in the lowercased text wins, so "egg firfir"
//! lands in `Eggs` and "beef soup" in `Soup`.

/// Category used when no keyword rule matches.
pub const GENERAL: &str = "General";

/// `(category, keywords)` in priority order.
const CATEGORY_RULES: &[(&str, &[&str])] = &[
    ("Soup", &["soup", "broth"]),
    ("Stew", &["stew", "wot"]),
    ("Eggs", &["egg"]),
    ("Meat", &["kitfo", "tibs", "beef", "meat"]),
    (
        "Vegetable",
        &["gomen", "greens", "vegetable", "veggie", "salad", "cabbage", "spinach"],
    ),
    ("Combination", &["firfir", "combination"]),
    ("Vegetarian", &["genfo", "porridge"]),
];

/// Fixed English → Amharic labels for tabs and categories.
const AMHARIC_LABELS: &[(&str, &str)] = &[
    ("breakfast", "ቁርስ"),
    ("lunch", "ምሳ"),
    ("dinner", "እራት"),
    ("drinks", "መጠጦች"),
    ("meat", "ስጋ"),
    ("stew", "ወጥ"),
    ("soup", "ሾርባ"),
    ("eggs", "እንቁላል"),
    ("combination", "ድብልቅ"),
    ("vegetable", "አትክልት"),
    ("vegetarian", "የጾም"),
    ("general", "አጠቃላይ"),
];

/// Category for a dish from its name and description.
pub fn classify_category(name: &str, description: &str) -> &'static str {
    let haystack = format!("{} {}", name, description).to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(GENERAL)
}

/// Amharic label for a known tab or category name (case-insensitive).
pub fn amharic_label(english: &str) -> Option<&'static str> {
    let key = english.trim().to_lowercase();
    AMHARIC_LABELS
        .iter()
        .find(|(en, _)| *en == key)
        .map(|(_, am)| *am)
}
