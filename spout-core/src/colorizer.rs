use std::collections::HashMap;

/// Assigns each distinct key a terminal color in first-seen order.
///
/// Seven base colors in bright then normal intensity give 14 combinations
/// before the assignment repeats. Scoped to one consumer; not shared.
#[derive(Debug, Default, Clone)]
pub struct Colorizer {
    indices: HashMap<String, usize>,
}

impl Colorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ANSI escape sequence for `key`.
    pub fn get(&mut self, key: &str) -> String {
        let next = self.indices.len();
        let i = *self.indices.entry(key.to_string()).or_insert(next);
        let bright = if i % 14 <= 6 { "1;" } else { "" };
        format!("\x1b[{}3{}m", bright, 7 - (i % 7))
    }
}
