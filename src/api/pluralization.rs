//! Object-type to URL-segment naming rules for the XML resource endpoints

/// Convert CamelCase to hyphenated lowercase: `SalesReceipt` -> `sales-receipt`
pub fn hyphenate(object_type: &str) -> String {
    let mut out = String::with_capacity(object_type.len() + 4);
    let mut previous_lower = false;

    for ch in object_type.chars() {
        if ch.is_uppercase() {
            if previous_lower {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
            previous_lower = false;
        } else {
            out.push(ch);
            previous_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }

    out
}

/// Pluralize a URL segment for list operations.
///
/// `s` endings get `es`, `y` endings become `ies`, everything else gets `s`.
pub fn pluralize(name: &str) -> String {
    if name.is_empty() {
        return name.to_string();
    }

    if name.ends_with('s') {
        return format!("{}es", name);
    }

    if let Some(stem) = name.strip_suffix('y') {
        return format!("{}ies", stem);
    }

    format!("{}s", name)
}
