//! Label -> identifier derivation
//!
//! Labels are `UPPER_SNAKE`; the generated script names things in the host
//! language's usual styles: `MY_LABEL` becomes `MyLabel` for functions and
//! `myLabelButton` for suggested UI variables.

use std::collections::HashMap;

/// `MY_LABEL` -> `MyLabel`; `Unnamed` when nothing is left after splitting
pub fn pascal_case(label: &str) -> String {
    let pascal: String = label
        .to_lowercase()
        .split('_')
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect();

    if pascal.is_empty() {
        "Unnamed".to_string()
    } else {
        pascal
    }
}

/// `MY_LABEL` -> `myLabel`
///
/// A leading digit (from labels such as `_1`) gets an underscore prefix so
/// the result stays a valid identifier.
pub fn camel_case(label: &str) -> String {
    let pascal = pascal_case(label);
    let mut chars = pascal.chars();
    let camel = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
        None => String::new(),
    };

    if camel.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", camel)
    } else {
        camel
    }
}

/// `MY_LABEL` -> `myLabelButton`
pub fn button_var(label: &str) -> String {
    format!("{}Button", camel_case(label))
}

/// Derive one PascalCase name per label, suffixing repeats in order
///
/// `AB` and `AB_` both become `Ab`; the second and later occurrences of a
/// name get `2`, `3`, ... appended.
pub fn unique_pascal_names<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::new();

    for label in labels {
        let base = pascal_case(label);
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        let mut name = if *count == 1 {
            base.clone()
        } else {
            format!("{}{}", base, count)
        };
        // A suffixed name may itself clash with a later plain name
        while names.contains(&name) {
            *count += 1;
            name = format!("{}{}", base, count);
        }
        names.push(name);
    }

    names
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
