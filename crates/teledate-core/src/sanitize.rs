//! Input validation and normalization for user-supplied labels.

/// Check a name/activity label: 1-50 chars, letters, digits and spaces only.
pub fn valid_label(label: &str) -> bool {
    let len = label.chars().count();
    (1..=50).contains(&len) && label.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ')
}

/// Capitalize a label: first character uppercased, the rest lowercased.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
