//! English inflection and identifier casing used for default names.
//!
//! Pluralization covers regular suffix rules plus a short table of irregular
//! and uncountable nouns. Only the trailing word of a camel-cased name is
//! inflected, so `UserProfile` becomes `UserProfiles`.

use heck::{ToLowerCamelCase, ToSnakeCase};

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "moose",
    "deer",
    "news",
    "metadata",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("ox", "oxen"),
];

/// (singular suffix, plural suffix), most specific first.
const PLURAL_RULES: &[(&str, &str)] = &[
    ("quiz", "quizzes"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
    ("index", "indices"),
    ("octopus", "octopi"),
    ("virus", "viri"),
    ("alias", "aliases"),
    ("status", "statuses"),
    ("bus", "buses"),
    ("buffalo", "buffaloes"),
    ("tomato", "tomatoes"),
    ("potato", "potatoes"),
    ("axis", "axes"),
    ("testis", "testes"),
    ("crisis", "crises"),
    ("analysis", "analyses"),
    ("hive", "hives"),
    ("datum", "data"),
    ("medium", "media"),
    ("ss", "sses"),
    ("sis", "ses"),
    ("ife", "ives"),
    ("lf", "lves"),
    ("rf", "rves"),
    ("x", "xes"),
    ("ch", "ches"),
    ("sh", "shes"),
];

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Split `UserProfile` into (`User`, `Profile`) so only the last word is inflected.
fn split_last_word(word: &str) -> (&str, &str) {
    let idx = word
        .char_indices()
        .skip(1)
        .filter(|(_, c)| c.is_uppercase() || *c == '_' || *c == '-' || *c == ' ')
        .map(|(i, c)| if c.is_uppercase() { i } else { i + c.len_utf8() })
        .last()
        .unwrap_or(0);
    word.split_at(idx)
}

/// Replace `from_len` trailing bytes of `word` by `to`, keeping the case of
/// the first replaced letter when the whole word is replaced.
fn replace_tail(word: &str, from_len: usize, to: &str) -> String {
    let keep = &word[..word.len() - from_len];
    let replaced = &word[word.len() - from_len..];
    let starts_upper = replaced.chars().next().is_some_and(char::is_uppercase);
    let is_all_upper = replaced.len() > 1 && replaced.chars().all(|c| !c.is_lowercase());
    let mut out = String::with_capacity(keep.len() + to.len());
    out.push_str(keep);
    if is_all_upper {
        out.push_str(&to.to_uppercase());
    } else if starts_upper {
        out.push_str(&upper_first(to));
    } else {
        out.push_str(to);
    }
    out
}

fn ends_with_ignore_case(word: &str, suffix: &str) -> bool {
    word.len() >= suffix.len()
        && word.is_char_boundary(word.len() - suffix.len())
        && word[word.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

fn inflect_word(word: &str, to_plural: bool) -> String {
    let lower = word.to_ascii_lowercase();
    if word.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }

    for (singular, plural) in IRREGULAR {
        let (from, to) = if to_plural {
            (singular, plural)
        } else {
            (plural, singular)
        };
        if lower == *from {
            return replace_tail(word, word.len(), to);
        }
        // already in the requested number
        if lower == *to {
            return word.to_string();
        }
    }

    if to_plural {
        pluralize_regular(word)
    } else {
        singularize_regular(word)
    }
}

fn pluralize_regular(word: &str) -> String {
    for (singular, plural) in PLURAL_RULES {
        if ends_with_ignore_case(word, singular) {
            let plural_tail = &plural[common_prefix(singular, plural)..];
            let keep_len = singular.len() - common_prefix(singular, plural);
            return replace_tail(word, keep_len, plural_tail);
        }
        if ends_with_ignore_case(word, plural) {
            return word.to_string();
        }
    }

    let mut chars = word.chars().rev();
    let last = chars.next().unwrap_or_default();
    let before = chars.next();
    match last.to_ascii_lowercase() {
        'y' if before.is_some_and(|c| !is_vowel(c)) => replace_tail(word, 1, "ies"),
        's' => word.to_string(),
        _ => format!("{word}s"),
    }
}

fn singularize_regular(word: &str) -> String {
    for (singular, plural) in PLURAL_RULES {
        if ends_with_ignore_case(word, plural) {
            let prefix = common_prefix(singular, plural);
            return replace_tail(word, plural.len() - prefix, &singular[prefix..]);
        }
    }

    if ends_with_ignore_case(word, "ies") && word.len() > 3 {
        return replace_tail(word, 3, "y");
    }
    if ends_with_ignore_case(word, "ss") || ends_with_ignore_case(word, "us") {
        return word.to_string();
    }
    if ends_with_ignore_case(word, "s") && word.len() > 1 {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

fn common_prefix(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

/// Plural form of a (possibly camel-cased) name: `User` -> `Users`.
pub fn pluralize(word: &str) -> String {
    let (head, last) = split_last_word(word);
    format!("{head}{}", inflect_word(last, true))
}

/// Singular form of a (possibly camel-cased) name: `Categories` -> `Category`.
pub fn singularize(word: &str) -> String {
    let (head, last) = split_last_word(word);
    format!("{head}{}", inflect_word(last, false))
}

/// `user_id` -> `userId`, `UserProject_id` -> `userProjectId`.
pub fn camelize(s: &str) -> String {
    s.to_lower_camel_case()
}

/// `User_username_isAdmin` -> `user_username_is_admin`.
pub fn underscore(s: &str) -> String {
    s.to_snake_case()
}

pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Pluralize Tests ====================

    #[test]
    fn test_pluralize_regular() {
        assert_eq!(pluralize("User"), "Users");
        assert_eq!(pluralize("task"), "tasks");
        assert_eq!(pluralize("Category"), "Categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("church"), "churches");
        assert_eq!(pluralize("address"), "addresses");
    }

    #[test]
    fn test_pluralize_irregular_and_uncountable() {
        assert_eq!(pluralize("Person"), "People");
        assert_eq!(pluralize("child"), "children");
        assert_eq!(pluralize("sheep"), "sheep");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("wife"), "wives");
    }

    #[test]
    fn test_pluralize_last_word_only() {
        assert_eq!(pluralize("UserProfile"), "UserProfiles");
        assert_eq!(pluralize("ProjectCategory"), "ProjectCategories");
        assert_eq!(pluralize("task_person"), "task_people");
    }

    #[test]
    fn test_pluralize_already_plural() {
        assert_eq!(pluralize("Users"), "Users");
        assert_eq!(pluralize("people"), "people");
    }

    // ==================== Singularize Tests ====================

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("Users"), "User");
        assert_eq!(singularize("Categories"), "Category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("People"), "Person");
        assert_eq!(singularize("statuses"), "status");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("User"), "User");
        assert_eq!(singularize("UserTasks"), "UserTask");
        assert_eq!(singularize("wives"), "wife");
        assert_eq!(singularize("addresses"), "address");
    }

    // ==================== Casing Tests ====================

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("user_id"), "userId");
        assert_eq!(camelize("User_id"), "userId");
        assert_eq!(camelize("parent_id"), "parentId");
    }

    #[test]
    fn test_underscore() {
        assert_eq!(underscore("User_username_isAdmin"), "user_username_is_admin");
    }

    #[test]
    fn test_first_letter_case() {
        assert_eq!(upper_first("tasks"), "Tasks");
        assert_eq!(lower_first("Tasks"), "tasks");
        assert_eq!(upper_first(""), "");
    }
}
