//! Assembly: flat parsed items → Tab → Category → Item hierarchy.
//!
//! Pure and total: every [`FlatParsedItem`] either becomes a [`MenuItem`]
//! or is skipped (no name), and no field value can make assembly fail.
//! Running it twice on the same input yields equal menus.

use crate::output::{Allergy, Category, FlatParsedItem, LooseNumber, Menu, MenuItem, Tab, TextOrList};
use crate::pipeline::classify::{amharic_label, classify_category, GENERAL};

/// Bounds on a dish's preparation time, in minutes.
pub const MIN_PREPARATION_MINUTES: u32 = 1;
pub const MAX_PREPARATION_MINUTES: u32 = 60;

/// Values used when the model leaves a field out.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyDefaults {
    pub currency: String,
    pub preparation_time: u32,
}

impl Default for AssemblyDefaults {
    fn default() -> Self {
        Self {
            currency: "ETB".to_string(),
            preparation_time: 15,
        }
    }
}

impl From<&crate::config::DigitizerConfig> for AssemblyDefaults {
    fn from(config: &crate::config::DigitizerConfig) -> Self {
        Self {
            currency: config.default_currency.clone(),
            preparation_time: config
                .default_preparation_time
                .clamp(MIN_PREPARATION_MINUTES, MAX_PREPARATION_MINUTES),
        }
    }
}

pub fn assemble_menu(items: &[FlatParsedItem], defaults: &AssemblyDefaults) -> Menu {
    let mut menu = Menu::default();

    for flat in items {
        let name = text(&flat.name);
        if name.is_empty() {
            continue;
        }
        let description = text(&flat.description);
        let tags = flat.tags.as_ref().map(TextOrList::entries).unwrap_or_default();

        let tab_name = Some(text(&flat.tab))
            .filter(|t| !t.is_empty())
            .or_else(|| tags.first().cloned())
            .unwrap_or_else(|| GENERAL.to_string());
        let tab_am = amharic_label(&tab_name)
            .map(str::to_string)
            .unwrap_or_else(|| text(&flat.tab_am));

        let category_name = classify_category(&name, &description);
        let category_am = amharic_label(category_name).unwrap_or_default();

        let item = MenuItem {
            name_am: text(&flat.name_amharic),
            description_am: text(&flat.description_amharic),
            price: flat.price.as_ref().and_then(LooseNumber::as_f64).unwrap_or(0.0),
            currency: Some(text(&flat.currency))
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| defaults.currency.clone()),
            tags,
            allergies: merge_allergy(flat),
            ingredients: entries(&flat.ingredients),
            ingredients_am: entries(&flat.ingredients_am),
            nutrition: flat.nutritional_info.as_ref().and_then(|n| n.coerce()),
            preparation_time: preparation_minutes(flat.preparation_time.as_ref(), defaults),
            eating_instructions: text(&flat.eating_instructions),
            eating_instructions_am: text(&flat.eating_instructions_am),
            photos: Vec::new(),
            name,
            description,
        };

        let tab = find_or_create_tab(&mut menu, &tab_name, &tab_am);
        let category = find_or_create_category(tab, category_name, category_am);
        category.items.push(item);
    }

    menu
}

/// Absent or non-positive → default; otherwise clamped into range.
pub fn preparation_minutes(raw: Option<&LooseNumber>, defaults: &AssemblyDefaults) -> u32 {
    match raw.and_then(LooseNumber::as_i64) {
        Some(m) if m > 0 => {
            m.clamp(MIN_PREPARATION_MINUTES as i64, MAX_PREPARATION_MINUTES as i64) as u32
        }
        _ => defaults.preparation_time,
    }
}

fn merge_allergy(flat: &FlatParsedItem) -> Option<Allergy> {
    let (list_allergens, list_text) = match &flat.allergies {
        Some(TextOrList::List(_)) => (entries(&flat.allergies), String::new()),
        Some(TextOrList::Text(s)) => (Vec::new(), s.trim().to_string()),
        None => (Vec::new(), String::new()),
    };

    let mut text_en = Some(list_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| text(&flat.allergy));
    if text_en.is_empty() && !list_allergens.is_empty() {
        text_en = list_allergens.join(", ");
    }
    let text_am = text(&flat.allergy_am);

    if text_en.is_empty() && text_am.is_empty() && list_allergens.is_empty() {
        return None;
    }
    Some(Allergy {
        text: text_en,
        text_am,
        allergens: list_allergens,
    })
}

fn find_or_create_tab<'a>(menu: &'a mut Menu, name: &str, name_am: &str) -> &'a mut Tab {
    let pos = match menu.tabs.iter().position(|t| t.name.eq_ignore_ascii_case(name)) {
        Some(pos) => pos,
        None => {
            menu.tabs.push(Tab {
                name: name.to_string(),
                name_am: name_am.to_string(),
                categories: Vec::new(),
            });
            menu.tabs.len() - 1
        }
    };
    let tab = &mut menu.tabs[pos];
    if tab.name_am.is_empty() && !name_am.is_empty() {
        tab.name_am = name_am.to_string();
    }
    tab
}

fn find_or_create_category<'a>(tab: &'a mut Tab, name: &str, name_am: &str) -> &'a mut Category {
    let pos = match tab.categories.iter().position(|c| c.name == name) {
        Some(pos) => pos,
        None => {
            tab.categories.push(Category {
                name: name.to_string(),
                name_am: name_am.to_string(),
                items: Vec::new(),
            });
            tab.categories.len() - 1
        }
    };
    &mut tab.categories[pos]
}

fn text(field: &Option<String>) -> String {
    field.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn entries(field: &Option<TextOrList>) -> Vec<String> {
    field.as_ref().map(TextOrList::entries).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse::parse_menu_items;

    fn assemble(json: &str) -> Menu {
        assemble_menu(&parse_menu_items(json).unwrap(), &AssemblyDefaults::default())
    }

    #[test]
    fn doro_wot_and_shiro_land_in_general_tab() {
        let menu = assemble(
            r#"{"menuItems":[{"name":"Doro Wot","price":150},{"name":"Shiro","price":90}]}"#,
        );
        assert_eq!(menu.tabs.len(), 1);
        let tab = &menu.tabs[0];
        assert_eq!(tab.name, "General");
        assert_eq!(tab.name_am, "አጠቃላይ");
        let cats: Vec<&str> = tab.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(cats, vec!["Stew", "General"]);
        assert_eq!(tab.categories[0].name_am, "ወጥ");
        let doro = &tab.categories[0].items[0];
        assert_eq!(doro.price, 150.0);
        assert_eq!(doro.currency, "ETB");
        assert_eq!(doro.preparation_time, 15);
        assert!(doro.allergies.is_none());
    }

    #[test]
    fn preparation_time_bounds() {
        let d = AssemblyDefaults::default();
        let n = |v: i64| LooseNumber::Int(v);
        assert_eq!(preparation_minutes(Some(&n(-5)), &d), 15);
        assert_eq!(preparation_minutes(Some(&n(0)), &d), 15);
        assert_eq!(preparation_minutes(Some(&n(999)), &d), 60);
        assert_eq!(preparation_minutes(Some(&n(20)), &d), 20);
        assert_eq!(preparation_minutes(Some(&LooseNumber::Text("abc".into())), &d), 15);
        assert_eq!(preparation_minutes(None, &d), 15);
    }

    #[test]
    fn prep_time_always_in_range_after_assembly() {
        let menu = assemble(
            r#"{"menuItems":[{"name":"A","preparationTime":-5},{"name":"B","preparationTime":999},
            {"name":"C","preparationTime":"0.4"},{"name":"D","preparationTime":[1]}]}"#,
        );
        let times: Vec<u32> = menu.items().map(|(_, _, i)| i.preparation_time).collect();
        assert_eq!(times, vec![15, 60, 15, 15]);
    }

    #[test]
    fn assembly_is_idempotent() {
        let items = parse_menu_items(
            r#"{"menuItems":[{"name":"Kitfo","tab":"Lunch","tags":["Spicy"]},{"name":"Genfo","tags":["Breakfast"]},{"name":"Tibs","tab":"lunch"}]}"#,
        )
        .unwrap();
        let d = AssemblyDefaults::default();
        assert_eq!(assemble_menu(&items, &d), assemble_menu(&items, &d));
    }

    #[test]
    fn tabs_from_field_then_first_tag_preserve_first_appearance() {
        let menu = assemble(
            r#"{"menuItems":[{"name":"Genfo","tags":["Breakfast","Hot"]},{"name":"Kitfo","tab":"Lunch"},
            {"name":"Quanta Firfir","tab":"Breakfast"},{"name":"Derek Tibs","tab":"lunch"}]}"#,
        );
        let tabs: Vec<(&str, &str)> = menu.tabs.iter().map(|t| (t.name.as_str(), t.name_am.as_str())).collect();
        assert_eq!(tabs, vec![("Breakfast", "ቁርስ"), ("Lunch", "ምሳ")]);
        let breakfast_cats: Vec<&str> = menu.tabs[0].categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(breakfast_cats, vec!["Vegetarian", "Combination"]);
        assert_eq!(menu.tabs[1].categories[0].items.len(), 2, "both meat dishes share a category");
    }

    #[test]
    fn unknown_tab_uses_model_label() {
        let menu = assemble(r#"{"menuItems":[{"name":"Chef Plate","tab":"Specials","tabAm":"ልዩ"}]}"#);
        assert_eq!(menu.tabs[0].name_am, "ልዩ");
        let menu = assemble(r#"{"menuItems":[{"name":"Chef Plate","tab":"Specials"}]}"#);
        assert_eq!(menu.tabs[0].name_am, "");
    }

    #[test]
    fn nameless_items_are_skipped() {
        let menu = assemble(r#"{"menuItems":[{"name":"  "},{"description":"mystery"},{"name":"Shiro"}]}"#);
        assert_eq!(menu.item_count(), 1);
    }

    #[test]
    fn allergy_merge() {
        let menu = assemble(
            r#"{"menuItems":[
                {"name":"A","allergies":["gluten","dairy"]},
                {"name":"B","allergies":"Contains gluten.","allergyAm":"ግሉተን ይዟል።"},
                {"name":"C","allergy":"Contains nuts.","allergies":["nuts"]},
                {"name":"D"}
            ]}"#,
        );
        let allergies: Vec<Option<Allergy>> = menu.items().map(|(_, _, i)| i.allergies.clone()).collect();

        let a = allergies[0].as_ref().unwrap();
        assert_eq!(a.text, "gluten, dairy");
        assert_eq!(a.allergens, vec!["gluten", "dairy"]);

        let b = allergies[1].as_ref().unwrap();
        assert_eq!(b.text, "Contains gluten.");
        assert_eq!(b.text_am, "ግሉተን ይዟል።");
        assert!(b.allergens.is_empty());

        let c = allergies[2].as_ref().unwrap();
        assert_eq!(c.text, "Contains nuts.");
        assert_eq!(c.allergens, vec!["nuts"]);

        assert!(allergies[3].is_none(), "no synthetic allergy value");
    }

    #[test]
    fn prices_currency_and_nutrition() {
        let menu = assemble(
            r#"{"menuItems":[{"name":"Tea","price":"25.5","currency":"USD",
            "nutritionalInfo":{"calories":"40.4","protein":-1}},{"name":"Water","price":"free"}]}"#,
        );
        let items: Vec<&MenuItem> = menu.items().map(|(_, _, i)| i).collect();
        assert_eq!(items[0].price, 25.5);
        assert_eq!(items[0].currency, "USD");
        let n = items[0].nutrition.unwrap();
        assert_eq!(n.calories, Some(40));
        assert_eq!(n.protein, None);
        assert_eq!(items[1].price, 0.0);
        assert_eq!(items[1].currency, "ETB");
        assert!(items[1].nutrition.is_none());
    }

    #[test]
    fn defaults_follow_config() {
        let config = crate::config::DigitizerConfig::builder()
            .default_currency("USD")
            .default_preparation_time(25)
            .build()
            .unwrap();
        let d = AssemblyDefaults::from(&config);
        assert_eq!(d.currency, "USD");
        assert_eq!(preparation_minutes(None, &d), 25);
    }
}
