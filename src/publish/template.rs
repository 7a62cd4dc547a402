use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::{Captures, Regex};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([A-Z][A-Z0-9_]*)\]").expect("token pattern is valid"));

/// Whether `name` can appear between brackets as a placeholder:
/// an uppercase letter followed by uppercase letters, digits or `_`.
#[must_use]
pub fn is_token_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Names of the `[TOKEN]` placeholders in `text`, sorted and unique.
#[must_use]
pub fn referenced_tokens(text: &str) -> Vec<String> {
    TOKEN
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Replace every placeholder in a single pass. Placeholders without a
/// value are left as they are; replaced text is never rescanned.
#[must_use]
pub fn substitute(text: &str, values: &BTreeMap<String, String>) -> String {
    TOKEN
        .replace_all(text, |c: &Captures<'_>| {
            values
                .get(&c[1])
                .cloned()
                .unwrap_or_else(|| c[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn finds_tokens_once() {
        let tokens = referenced_tokens("a=[APP_ID] b=[CLIENT_ID] c=[APP_ID] d=[lower] e=[1X]");

        assert_eq!(tokens, vec!["APP_ID", "CLIENT_ID"]);
    }

    #[test]
    fn token_name_grammar() {
        for name in ["API_URL", "A", "X1_2"] {
            assert!(is_token_name(name), "{name}");
        }
        for name in ["apiUrl", "", "1X", "_A", "API-URL", "API URL", "ÄPI"] {
            assert!(!is_token_name(name), "{name}");
        }
    }

    #[test]
    fn replaces_every_occurrence() {
        let out = substitute(
            "url=[API_URL];tenant=[TENANT_ID];again=[API_URL]",
            &values(&[("API_URL", "https://host/api/"), ("TENANT_ID", "tenant-123")]),
        );

        assert_eq!(
            out,
            "url=https://host/api/;tenant=tenant-123;again=https://host/api/"
        );
    }

    #[test]
    fn inserted_values_are_not_rescanned() {
        let out = substitute("[A]", &values(&[("A", "[B]"), ("B", "nope")]));

        assert_eq!(out, "[B]");
    }

    #[test]
    fn unknown_tokens_untouched() {
        let out = substitute("[KEEP] [X]", &values(&[("X", "1")]));

        assert_eq!(out, "[KEEP] 1");
    }
}
