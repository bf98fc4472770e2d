//! Device name matching.
//!
//! # Policy
//! - Case-sensitive substring match of the definition's match key against
//!   live device names
//! - First match in enumeration order wins; the backend's enumeration order
//!   is therefore part of the contract
//! - No regex, no fuzzy matching

/// Decides whether a live device name satisfies a definition.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    fn matches(&self, device_name: &str) -> bool;

    /// Index of the first matching name.
    fn first_match(&self, names: &[String]) -> Option<usize> {
        names.iter().position(|name| self.matches(name))
    }
}

/// Matches any device whose name contains the key.
#[derive(Debug, Clone)]
pub struct SubstringMatcher {
    key: String,
}

impl SubstringMatcher {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Matcher for SubstringMatcher {
    fn matches(&self, device_name: &str) -> bool {
        device_name.contains(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_substring_match() {
        let matcher = SubstringMatcher::new("Launchkey");
        assert!(matcher.matches("Launchkey MK3:Launchkey MK3 MIDI 1 24:0"));
        assert!(!matcher.matches("Midi Through:Midi Through Port-0 14:0"));
    }

    #[test]
    fn test_case_sensitive() {
        let matcher = SubstringMatcher::new("launchkey");
        assert!(!matcher.matches("Launchkey MK3"));
    }

    #[test]
    fn test_first_match_in_enumeration_order() {
        let matcher = SubstringMatcher::new("MIDI");
        let list = names(&["Through", "Keys MIDI 2", "Keys MIDI 1"]);
        assert_eq!(matcher.first_match(&list), Some(1));
    }

    #[test]
    fn test_no_match() {
        let matcher = SubstringMatcher::new("Synth");
        assert_eq!(matcher.first_match(&names(&["Keys", "Drums"])), None);
        assert_eq!(matcher.first_match(&[]), None);
    }
}
