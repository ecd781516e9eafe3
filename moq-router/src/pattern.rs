use regex::Regex;

use crate::RouteError;

/// A parameter segment matches any run of these characters. The class is
/// kept as-is, caret included, so existing route documents keep matching the
/// same paths.
const PARAMETER_CLASS: &str = "([A-Za-z0-9^/]+)";

/// A value captured from the request path for a `:name` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The segment text including the leading `:`, e.g. `:id`.
    pub token: String,
    pub value: String,
}

/// A compiled url pattern such as `/users/:id/posts`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segment_count: usize,
    tokens: Vec<String>,
    matcher: Option<Regex>,
}

impl PathPattern {
    pub fn new(raw: &str) -> Result<Self, RouteError> {
        let mut tokens = Vec::new();
        let mut parts = Vec::new();
        for segment in raw.split('/') {
            if segment.starts_with(':') {
                tokens.push(segment.to_owned());
                parts.push(PARAMETER_CLASS.to_owned());
            } else {
                parts.push(regex::escape(segment));
            }
        }

        let matcher = if tokens.is_empty() {
            None
        } else {
            Some(Regex::new(&parts.join("/"))?)
        };

        Ok(Self {
            raw: raw.to_owned(),
            segment_count: parts.len(),
            tokens,
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Tests `path` against the pattern. On a match returns the bindings in
    /// the order the parameters appear in the pattern.
    pub fn captures(&self, path: &str) -> Option<Vec<Binding>> {
        if self.raw == path {
            return Some(Vec::new());
        }

        if path.split('/').count() != self.segment_count {
            return None;
        }

        let captures = self.matcher.as_ref()?.captures(path)?;
        if captures.len() <= 1 {
            return None;
        }

        let bindings = self
            .tokens
            .iter()
            .zip(captures.iter().skip(1))
            .filter_map(|(token, group)| {
                group.map(|group| Binding {
                    token: token.clone(),
                    value: group.as_str().to_owned(),
                })
            })
            .collect();

        Some(bindings)
    }
}

#[cfg(test)]
fn binding(token: &str, value: &str) -> Binding {
    Binding {
        token: token.to_owned(),
        value: value.to_owned(),
    }
}

#[test]
fn test_literal_pattern() {
    let pattern = PathPattern::new("/users/all").unwrap();
    assert_eq!(Some(vec![]), pattern.captures("/users/all"));
    assert_eq!(None, pattern.captures("/users/none"));
    assert_eq!(None, pattern.captures("/users/allx"));
    assert_eq!(None, pattern.captures("/users/all/"));
    assert_eq!(None, pattern.captures("/x/users/all"));
}

#[test]
fn test_literal_pattern_escapes_regex() {
    let pattern = PathPattern::new("/files/:name/a.b").unwrap();
    assert_eq!(
        Some(vec![binding(":name", "report")]),
        pattern.captures("/files/report/a.b")
    );
    assert_eq!(None, pattern.captures("/files/report/axb"));
}

#[test]
fn test_parameter_pattern() {
    let pattern = PathPattern::new("/users/:id/posts/:post").unwrap();
    assert_eq!(
        Some(vec![binding(":id", "42"), binding(":post", "abc")]),
        pattern.captures("/users/42/posts/abc")
    );
    assert_eq!(None, pattern.captures("/users/42/comments/abc"));
    assert_eq!(None, pattern.captures("/users/42/posts"));
    assert_eq!(None, pattern.captures("/users/42/posts/abc/extra"));
}

#[test]
fn test_segment_count_must_match() {
    let pattern = PathPattern::new("/users/:id").unwrap();
    assert_eq!(Some(vec![binding(":id", "42")]), pattern.captures("/users/42"));
    assert_eq!(None, pattern.captures("/users/42/extra"));
    assert_eq!(None, pattern.captures("/users"));
    assert_eq!(None, pattern.captures("/users/"));
}

#[test]
fn test_parameter_character_class() {
    let pattern = PathPattern::new("/tags/:tag").unwrap();
    assert_eq!(Some(vec![binding(":tag", "a^b")]), pattern.captures("/tags/a^b"));
    assert_eq!(None, pattern.captures("/tags/-"));

    // The expression is searched, not anchored, so the class decides where
    // the value stops.
    assert_eq!(Some(vec![binding(":tag", "v1")]), pattern.captures("/tags/v1.json"));
}

#[test]
fn test_repeated_parameter_name() {
    let pattern = PathPattern::new("/:id/:id").unwrap();
    assert_eq!(
        Some(vec![binding(":id", "a"), binding(":id", "b")]),
        pattern.captures("/a/b")
    );
}

#[test]
fn test_raw_pattern_text_matches_itself() {
    let pattern = PathPattern::new("/users/:id").unwrap();
    assert_eq!(Some(vec![]), pattern.captures("/users/:id"));
    assert_eq!("/users/:id", pattern.as_str());
}
