//! Signal checks shared by the monitor strategies.

use formfill_core_types::SelectorEntry;

/// `url_change` check against the baseline captured at start.
///
/// Returns the success reason when the location changed and, if a pattern is
/// set, contains it. A change that misses the pattern does not move the
/// baseline.
pub fn url_condition(baseline: &str, current: &str, pattern: Option<&str>) -> Option<String> {
    if current == baseline {
        return None;
    }
    match pattern.filter(|p| !p.trim().is_empty()) {
        None => Some(format!("url changed to {}", current)),
        Some(pattern) if current.contains(pattern) => {
            Some(format!("url {} contains '{}'", current, pattern))
        }
        Some(_) => None,
    }
}

/// `text_appears` check on the page's visible text.
pub fn text_condition(visible_text: &str, needle: &str) -> bool {
    visible_text.contains(needle)
}

/// Locator for `element_disappears`: XPath when it starts like one, CSS otherwise.
pub fn disappear_locator(raw: &str) -> SelectorEntry {
    let trimmed = raw.trim();
    if trimmed.starts_with('/') || trimmed.starts_with("(/") {
        SelectorEntry::xpath(trimmed)
    } else {
        SelectorEntry::css(trimmed)
    }
}
