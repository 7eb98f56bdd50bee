//! Output types: the structured menu and the flat items it is built from.
//!
//! [`FlatParsedItem`] is what the LLM hands back, one record per dish with
//! loosely typed fields. [`Menu`] is the two-level Tab → Category hierarchy
//! the pipeline assembles from those records and persists as a
//! [`MenuRecord`].

use crate::job::MenuId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Structured menu ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub tabs: Vec<Tab>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub name: String,
    pub name_am: String,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub name_am: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub name: String,
    pub name_am: String,
    pub description: String,
    pub description_am: String,
    pub price: f64,
    pub currency: String,
    pub tags: Vec<String>,
    pub allergies: Option<Allergy>,
    pub ingredients: Vec<String>,
    pub ingredients_am: Vec<String>,
    pub nutrition: Option<Nutrition>,
    /// Minutes, always within `1..=60`.
    pub preparation_time: u32,
    pub eating_instructions: String,
    pub eating_instructions_am: String,
    pub photos: Vec<String>,
}

impl MenuItem {
    pub fn has_photo(&self) -> bool {
        self.photos.iter().any(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allergy {
    /// Allergy sentence in English.
    pub text: String,
    /// Allergy sentence in Amharic.
    pub text_am: String,
    pub allergens: Vec<String>,
}

/// Per-serving estimate. Each field is absent when the model gave nothing usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nutrition {
    pub calories: Option<u32>,
    pub protein: Option<u32>,
    pub carbs: Option<u32>,
    pub fat: Option<u32>,
}

impl Nutrition {
    pub fn is_empty(&self) -> bool {
        self.calories.is_none() && self.protein.is_none() && self.carbs.is_none() && self.fat.is_none()
    }
}

impl Menu {
    /// Iterate `(tab, category, item)` in menu order.
    pub fn items(&self) -> impl Iterator<Item = (&Tab, &Category, &MenuItem)> {
        self.tabs.iter().flat_map(|tab| {
            tab.categories
                .iter()
                .flat_map(move |cat| cat.items.iter().map(move |item| (tab, cat, item)))
        })
    }

    pub fn item_count(&self) -> usize {
        self.tabs
            .iter()
            .flat_map(|t| t.categories.iter())
            .map(|c| c.items.len())
            .sum()
    }
}

/// A menu as handed to the database collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuRecord {
    pub id: MenuId,
    pub restaurant_id: String,
    pub menu: Menu,
    pub created_at: DateTime<Utc>,
}

impl MenuRecord {
    pub fn new(restaurant_id: impl Into<String>, menu: Menu) -> Self {
        Self {
            id: MenuId::new(),
            restaurant_id: restaurant_id.into(),
            menu,
            created_at: Utc::now(),
        }
    }
}

// ── Flat items decoded from the LLM ──────────────────────────────────────

/// The `{"menuItems": [...]}` envelope the structuring prompt asks for.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemsEnvelope {
    pub menu_items: Vec<FlatParsedItem>,
}

/// One dish exactly as the model described it, before tab/category assembly.
///
/// Every field is optional and leniently typed: models mix numbers and
/// numeric strings, lists and sentences, and drop fields at random.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlatParsedItem {
    pub name: Option<String>,
    pub name_amharic: Option<String>,
    pub description: Option<String>,
    pub description_amharic: Option<String>,
    pub price: Option<LooseNumber>,
    pub currency: Option<String>,
    pub tab: Option<String>,
    pub tab_am: Option<String>,
    pub tags: Option<TextOrList>,
    pub allergies: Option<TextOrList>,
    /// Legacy free-form allergy sentence.
    pub allergy: Option<String>,
    pub allergy_am: Option<String>,
    pub ingredients: Option<TextOrList>,
    pub ingredients_am: Option<TextOrList>,
    pub nutritional_info: Option<RawNutrition>,
    pub preparation_time: Option<LooseNumber>,
    pub eating_instructions: Option<String>,
    pub eating_instructions_am: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawNutrition {
    pub calories: Option<LooseNumber>,
    pub protein: Option<LooseNumber>,
    pub carbs: Option<LooseNumber>,
    pub fat: Option<LooseNumber>,
}

impl RawNutrition {
    /// Coerce every field; negative or non-numeric values become absent.
    pub fn coerce(&self) -> Option<Nutrition> {
        let field = |v: &Option<LooseNumber>| {
            v.as_ref()
                .and_then(LooseNumber::as_i64)
                .and_then(|n| u32::try_from(n).ok())
        };
        let n = Nutrition {
            calories: field(&self.calories),
            protein: field(&self.protein),
            carbs: field(&self.carbs),
            fat: field(&self.fat),
        };
        (!n.is_empty()).then_some(n)
    }
}

/// A JSON value that should be a number but may arrive as anything.
///
/// Decoding never fails: values that are not numbers land in `Other` and
/// coerce to `None`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl LooseNumber {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LooseNumber::Int(i) => Some(*i as f64),
            LooseNumber::Float(f) if f.is_finite() => Some(*f),
            LooseNumber::Float(_) => None,
            LooseNumber::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            LooseNumber::Other(_) => None,
        }
    }

    /// Round to the nearest integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LooseNumber::Int(i) => Some(*i),
            other => other.as_f64().map(|f| f.round() as i64),
        }
    }
}

/// A field models emit either as a list of strings or as one sentence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    List(Vec<String>),
    Text(String),
}

impl TextOrList {
    /// Non-empty trimmed entries. A sentence is split on commas.
    pub fn entries(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            TextOrList::List(v) => v.iter().map(String::as_str).collect(),
            TextOrList::Text(s) => s.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
