//! Route segment naming: a record type's short name, lower-cased and pluralized.

/// Last path segment of `std::any::type_name`, without generic arguments.
/// e.g. "my_app::models::Article" -> "Article", "crate::Page<u8>" -> "Page"
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Default route segment for a record type.
pub fn resource_segment<T>() -> String {
    let name = short_type_name(std::any::type_name::<T>());
    pluralize(&name.to_lowercase())
}

const UNCOUNTABLE: &[&str] = &[
    "data", "equipment", "information", "metadata", "money", "news", "rice", "series", "sheep",
    "species", "fish", "feedback",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("woman", "women"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("ox", "oxen"),
    ("quiz", "quizzes"),
    ("index", "indices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
];

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Pluralize a lower-case English noun.
/// e.g. "article" -> "articles", "category" -> "categories", "box" -> "boxes"
pub fn pluralize(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(is_vowel) {
            return format!("{}ies", stem);
        }
    }
    if let Some(stem) = word.strip_suffix("ife") {
        return format!("{}ives", stem);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}
