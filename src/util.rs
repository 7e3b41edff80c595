//! Small stateless helpers used by the chat layer and by UI consumers.

use uuid::Uuid;

/// Generate a random identifier for locally created messages.
#[must_use]
pub fn random_id() -> String {
    Uuid::new_v4().to_string()
}

/// Deterministic color for a display name, as a CSS `hsl(...)` string.
///
/// The same name always hashes to the same color; hue spans the full wheel
/// while saturation and lightness stay in ranges that keep text legible.
#[must_use]
pub fn unique_color(name: &str) -> String {
    let hash = string_hash(name);
    let h = normalize_hash(hash, 0, 360);
    let s = normalize_hash(hash, 50, 75);
    let l = normalize_hash(hash, 25, 60);
    format!("hsl({h}, {s}%, {l}%)")
}

/// First character of `s`, uppercased; empty input yields an empty string.
#[must_use]
pub fn uppercased_first_letter(s: &str) -> String {
    match s.chars().next() {
        Some(c) => c.to_uppercase().collect(),
        None => String::new(),
    }
}

/// 32-bit string hash (`hash * 31 + byte`, wrapping).
fn string_hash(s: &str) -> i32 {
    let mut hash = 0_i32;
    for c in s.chars() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(c as i32);
    }
    hash
}

fn normalize_hash(hash: i32, min: i32, max: i32) -> i32 {
    hash.rem_euclid(max - min) + min
}
