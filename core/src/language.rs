// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! BCP-47 language tag comparison.
//!
//! Tags are compared by their primary language subtag only, ignoring case and any
//! region, script or variant subtags. "en-US", "EN" and "en_gb" all match "en".

/// Returns the primary language subtag of a tag, e.g. "pt" for "pt-BR".
pub fn primary_subtag(tag: &str) -> &str {
    tag.trim().split(['-', '_']).next().unwrap_or_default()
}

/// True when both tags name the same language. Empty tags never match.
pub fn languages_match(a: &str, b: &str) -> bool {
    let a = primary_subtag(a);
    let b = primary_subtag(b);
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

/// Position of the first preferred language matching `tag`.
pub fn preference_rank(tag: &str, preferred: &[String]) -> Option<usize> {
    preferred.iter().position(|p| languages_match(tag, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_and_case_are_ignored() {
        assert!(languages_match("en-US", "en"));
        assert!(languages_match("EN", "en-gb"));
        assert!(languages_match("pt_BR", "pt-PT"));
        assert!(!languages_match("de", "en"));
    }

    #[test]
    fn empty_tags_never_match() {
        assert!(!languages_match("", ""));
        assert!(!languages_match("-US", "en"));
    }

    #[test]
    fn rank_follows_preference_order() {
        let preferred = vec!["fr".to_string(), "en".to_string()];
        assert_eq!(preference_rank("en-US", &preferred), Some(1));
        assert_eq!(preference_rank("fr", &preferred), Some(0));
        assert_eq!(preference_rank("de", &preferred), None);
    }
}
