//! Response parsing: deterministic repair of LLM output into `menuItems`.
//!
//! ## Why is repair necessary?
//!
//! Even when told to emit "ONLY a JSON object", models regularly:
//!
//! - wrap the object in ` ```json ... ``` ` fences
//! - prefix it with a sentence like "Here is the structured menu:"
//! - quote the whole answer, or use Windows line endings
//! - fall back to snake_case keys (`name_am`, `how_to_eat`) from their
//!   training data instead of the camelCase schema they were given
//!
//! Each step below is a pure `&str → String` function so the order can be
//! reasoned about and every rule tested on its own.
//!
//! ## Rule Order
//!
//! Fences are stripped before the brace search so the search does not trip
//! over a fence's backticks; key aliases are rewritten last so they also
//! apply to text recovered by the brace search.

use crate::error::ParseError;
use crate::output::{FlatParsedItem, MenuItemsEnvelope};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Token that must appear in any text we attempt to decode.
const MENU_ITEMS_KEY: &str = "menuItems";

/// snake_case keys models fall back to, and the camelCase key we decode.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("menu_items", "menuItems"),
    ("name_am", "nameAmharic"),
    ("description_am", "descriptionAmharic"),
    ("nutritional_info", "nutritionalInfo"),
    ("how_to_eat", "eatingInstructions"),
    ("how_to_eat_am", "eatingInstructionsAm"),
    ("eating_instructions", "eatingInstructions"),
    ("eating_instructions_am", "eatingInstructionsAm"),
    ("preparation_time", "preparationTime"),
    ("ingredients_am", "ingredientsAm"),
    ("allergy_am", "allergyAm"),
    ("tab_am", "tabAm"),
];

/// Decode a raw LLM response into flat menu items.
///
/// Steps (applied in order):
/// 1. Trim, and drop anything before a ```` ```json ```` marker
/// 2. Strip the leading/trailing code fence
/// 3. Strip surrounding backticks/quotes and normalise line endings
/// 4. Narrow to the outermost `{…}` when the text is wrapped in prose
/// 5. Rewrite snake_case key aliases to the camelCase schema
/// 6. Decode; on failure retry on the outermost `{…}` of the normalised text
pub fn parse_menu_items(raw: &str) -> Result<Vec<FlatParsedItem>, ParseError> {
    let s = drop_preamble(raw);
    let s = strip_code_fences(&s);
    let s = strip_wrapping_quotes(&s);
    let s = isolate_json_object(&s);
    let s = rewrite_key_aliases(&s);

    match serde_json::from_str::<MenuItemsEnvelope>(&s) {
        Ok(envelope) => Ok(envelope.menu_items),
        Err(first) => {
            debug!("menuItems decode failed ({}), retrying on outermost braces", first);
            let Some(inner) = outermost_braces(&s) else {
                return Err(ParseError::new(first.to_string(), &s));
            };
            serde_json::from_str::<MenuItemsEnvelope>(inner)
                .map(|envelope| envelope.menu_items)
                .map_err(|e| ParseError::new(e.to_string(), &s))
        }
    }
}

// ── Rule 1: Drop narrative before a ```json marker ──────────────────────────

fn drop_preamble(input: &str) -> String {
    let trimmed = input.trim();
    match trimmed.find("```json") {
        Some(pos) => trimmed[pos..].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Rule 2: Strip code fences ────────────────────────────────────────────────

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```(?:json)?[ \t]*\r?\n?").unwrap());
static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let s = RE_LEADING_FENCE.replace(input, "");
    let s = RE_TRAILING_FENCE.replace(&s, "");
    s.trim().to_string()
}

// ── Rule 3: Strip wrapping quotes and normalise line endings ────────────────

fn strip_wrapping_quotes(input: &str) -> String {
    input
        .trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim()
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

// ── Rule 4: Isolate the JSON object inside prose ────────────────────────────

fn outermost_braces(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    (end > start).then(|| &input[start..=end])
}

fn isolate_json_object(input: &str) -> String {
    if input.starts_with('{') && input.contains(MENU_ITEMS_KEY) {
        return input.to_string();
    }
    match outermost_braces(input) {
        Some(inner) if inner.contains(MENU_ITEMS_KEY) => inner.to_string(),
        _ => input.to_string(),
    }
}

// ── Rule 5: Rewrite key aliases ──────────────────────────────────────────────

static RE_SNAKE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([a-z]+(?:_[a-z]+)+)"(\s*):"#).unwrap());

fn rewrite_key_aliases(input: &str) -> String {
    RE_SNAKE_KEY
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match KEY_ALIASES.iter().find(|(alias, _)| *alias == key) {
                Some((_, canonical)) => format!("\"{}\"{}:", canonical, &caps[2]),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
