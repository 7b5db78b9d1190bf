use serde::Serialize;

/// Glyphs that start a bulleted item on their own
const BULLET_GLYPHS: [char; 12] = ['•', '●', '○', '◦', '■', '□', '▪', '▫', '‣', '⁃', '∙', '➢'];
/// Dash-like glyphs only count as bullets when followed by whitespace
const DASH_GLYPHS: [char; 3] = ['–', '—', '-'];

const MAX_LIST_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ListLevel {
    #[default]
    NoLevel,
    Level0,
    Level1,
    Level2,
    Level3,
}

impl ListLevel {
    fn from_depth(depth: usize) -> Self {
        match depth.min(MAX_LIST_DEPTH) {
            0 => ListLevel::Level0,
            1 => ListLevel::Level1,
            2 => ListLevel::Level2,
            _ => ListLevel::Level3,
        }
    }

    pub fn depth(&self) -> Option<usize> {
        match self {
            ListLevel::NoLevel => None,
            ListLevel::Level0 => Some(0),
            ListLevel::Level1 => Some(1),
            ListLevel::Level2 => Some(2),
            ListLevel::Level3 => Some(3),
        }
    }
}

fn leading_bullet(text: &str) -> Option<char> {
    let mut chars = text.trim_start().chars();
    let first = chars.next()?;
    if BULLET_GLYPHS.contains(&first) {
        return Some(first);
    }
    if DASH_GLYPHS.contains(&first) && chars.next().is_some_and(char::is_whitespace) {
        return Some(first);
    }
    None
}

/// Removes the leading bullet glyph and the whitespace after it.
pub fn strip_bullet(text: &str) -> &str {
    let trimmed = text.trim_start();
    // A dash token on its own
    if trimmed.chars().count() == 1 && trimmed.starts_with(DASH_GLYPHS) {
        return "";
    }
    match leading_bullet(trimmed) {
        Some(glyph) => trimmed[glyph.len_utf8()..].trim_start(),
        None => text,
    }
}

/// Assigns nesting levels to the segments of one page, in order.
///
/// The first distinct bullet glyph is level 0, each new glyph goes one level
/// deeper and a glyph seen before gets its level back.
pub fn assign_list_levels<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<ListLevel> {
    let mut seen: Vec<char> = Vec::new();
    texts
        .into_iter()
        .map(|text| match leading_bullet(text) {
            Some(glyph) => {
                let depth = match seen.iter().position(|g| *g == glyph) {
                    Some(depth) => depth,
                    None => {
                        seen.push(glyph);
                        seen.len() - 1
                    }
                };
                ListLevel::from_depth(depth)
            }
            None => ListLevel::NoLevel,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_follow_glyph_order() {
        let levels = assign_list_levels([
            "Intro paragraph",
            "• first",
            "◦ nested",
            "• second",
            "▪ deeper",
            "- dash item",
            "➢ capped",
        ]);
        assert_eq!(
            levels,
            vec![
                ListLevel::NoLevel,
                ListLevel::Level0,
                ListLevel::Level1,
                ListLevel::Level0,
                ListLevel::Level2,
                ListLevel::Level3,
                ListLevel::Level3,
            ]
        );
    }

    #[test]
    fn test_dash_needs_whitespace() {
        assert_eq!(assign_list_levels(["-5 degrees"]), vec![ListLevel::NoLevel]);
        assert_eq!(assign_list_levels(["– item"]), vec![ListLevel::Level0]);
    }

    #[test]
    fn test_strip_bullet() {
        assert_eq!(strip_bullet("  •  item"), "item");
        assert_eq!(strip_bullet("plain"), "plain");
        assert_eq!(strip_bullet("-5"), "-5");
        assert_eq!(strip_bullet(" -"), "");
        assert_eq!(strip_bullet("•"), "");
    }
}
