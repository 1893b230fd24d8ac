//! Tag pattern matching.
//!
//! A pattern takes one of three forms:
//!
//! - `refs/tags/v*` is matched against the fully-qualified ref
//!   (`refs/tags/<name>`), so nested tags such as `sdk/go/v1.0.0` are
//!   excluded.
//! - `sdk/go/v*` (contains `/`, no `refs/` prefix) is matched against the
//!   tag name itself and selects exactly that namespace.
//! - `v*` (no `/`) is matched against the last segment of the tag name,
//!   so it selects both `v1.0.0` and `sdk/go/v1.0.0`.
//!
//! Globs are shell style. `*` and `?` never cross a `/`, and the pattern
//! must account for every segment of the name. Matching is case
//! sensitive.

const REFS_PREFIX: &str = "refs/";
const TAG_PREFIX: &str = "refs/tags/";

/// Whether the tag `name` (without `refs/tags/`) matches `pattern`.
pub fn matches(name: &str, pattern: &str) -> bool {
    if pattern.starts_with(REFS_PREFIX) {
        let full = format!("{}{}", TAG_PREFIX, name);
        glob_path(pattern, &full)
    } else if pattern.contains('/') {
        glob_path(pattern, name)
    } else {
        let basename = name.rsplit('/').next().unwrap_or(name);
        glob_segment(pattern, basename)
    }
}

/// Keep the tags matched by at least one pattern. No patterns keeps all.
pub fn filter_tags<'a, I, P>(names: I, patterns: &[P]) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
    P: AsRef<str>,
{
    names
        .into_iter()
        .filter(|name| {
            patterns.is_empty() || patterns.iter().any(|p| matches(name, p.as_ref()))
        })
        .map(str::to_string)
        .collect()
}

fn glob_path(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    pattern_segments.len() == path_segments.len()
        && pattern_segments
            .iter()
            .zip(&path_segments)
            .all(|(p, s)| glob_segment(p, s))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(char),
    AnyChar,
    Star,
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Token {
    fn accepts(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyChar => true,
            Token::Star => false,
            Token::Class { negated, ranges } => {
                ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&c)) != *negated
            }
        }
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                // Consecutive stars behave as one.
                if tokens.last() != Some(&Token::Star) {
                    tokens.push(Token::Star);
                }
                i += 1;
            }
            '?' => {
                tokens.push(Token::AnyChar);
                i += 1;
            }
            '\\' if i + 1 < chars.len() => {
                tokens.push(Token::Literal(chars[i + 1]));
                i += 2;
            }
            '[' => match parse_class(&chars, i) {
                Some((token, next)) => {
                    tokens.push(token);
                    i = next;
                }
                None => {
                    tokens.push(Token::Literal('['));
                    i += 1;
                }
            },
            c => {
                tokens.push(Token::Literal(c));
                i += 1;
            }
        }
    }
    tokens
}

/// Parse a bracket expression starting at `chars[start] == '['`.
/// Returns `None` when it is unterminated, in which case `[` is literal.
fn parse_class(chars: &[char], start: usize) -> Option<(Token, usize)> {
    let mut i = start + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut ranges = Vec::new();
    let mut first = true;
    loop {
        let c = *chars.get(i)?;
        if c == ']' && !first {
            return Some((Token::Class { negated, ranges }, i + 1));
        }
        first = false;

        let lo = if c == '\\' {
            i += 1;
            *chars.get(i)?
        } else {
            c
        };
        i += 1;

        if chars.get(i) == Some(&'-') && chars.get(i + 1).is_some_and(|n| *n != ']') {
            let hi = chars[i + 1];
            ranges.push((lo, hi));
            i += 2;
        } else {
            ranges.push((lo, lo));
        }
    }
}

/// Match one path segment. Neither side contains `/`.
fn glob_segment(pattern: &str, text: &str) -> bool {
    let tokens = tokenize(pattern);
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Star) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(token) if token.accepts(text[t]) => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    // Let the last star swallow one more character.
                    backtrack = Some((star_p, star_t + 1));
                    p = star_p + 1;
                    t = star_t + 1;
                }
                None => return false,
            },
        }
    }

    tokens[p..].iter().all(|token| *token == Token::Star)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_pattern_matches_basename() {
        assert!(matches("v0.9.3", "v*"));
        assert!(matches("sdk/go/v0.9.3", "v*"));
        assert!(!matches("sdk/go/v0.9.3", "sdk*"));
    }

    #[test]
    fn ref_qualified_pattern_is_anchored() {
        assert!(matches("v0.9.3", "refs/tags/v*"));
        assert!(!matches("sdk/go/v0.9.3", "refs/tags/v*"));
        assert!(matches("sdk/go/v0.9.3", "refs/tags/sdk/*/v*"));
        assert!(!matches("v0.9.3", "refs/heads/v*"));
    }

    #[test]
    fn prefix_qualified_pattern_selects_namespace() {
        assert!(matches("sdk/go/v0.9.3", "sdk/go/v*"));
        assert!(!matches("v0.9.3", "sdk/go/v*"));
        assert!(!matches("sdk/python/v0.9.3", "sdk/go/v*"));
        assert!(!matches("sdk/go/nested/v0.9.3", "sdk/go/v*"));
        assert!(matches("sdk/python/v0.9.3", "sdk/*/v0.9.?"));
    }

    #[test]
    fn glob_features() {
        assert!(glob_segment("v[0-9].*", "v1.2"));
        assert!(!glob_segment("v[!0-9]*", "v1.2"));
        assert!(glob_segment("v[^0-9]*", "vx"));
        assert!(glob_segment("release-?", "release-a"));
        assert!(!glob_segment("release-?", "release-ab"));
        assert!(glob_segment("a\\*b", "a*b"));
        assert!(!glob_segment("a\\*b", "axb"));
        assert!(glob_segment("[]]x", "]x"));
        assert!(glob_segment("[x", "[x"));
        assert!(glob_segment("*a*b*", "xxaxxbxx"));
        assert!(glob_segment("**", ""));
        assert!(!glob_segment("*c", "ab"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!matches("V1.0.0", "v*"));
    }

    #[test]
    fn filter_uses_or_semantics() {
        let tags = ["v1.0.0", "sdk/go/v1.0.0", "sdk/python/v1.0.0", "nightly"];

        let all = filter_tags(tags, &[] as &[&str]);
        assert_eq!(all.len(), 4);

        let some = filter_tags(tags, &["refs/tags/v*", "sdk/python/*"]);
        assert_eq!(some, vec!["v1.0.0", "sdk/python/v1.0.0"]);
    }
}
