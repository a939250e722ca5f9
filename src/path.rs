//! Path templates.
//!
//! A template is literal text with `{name}` placeholders:
//!
//! ```text
//! /items/{id}              matches /items/42        id = "42"
//! /files/{name}.json       matches /files/a.json    name = "a"
//! /users/{uid}/posts/{pid} matches /users/1/posts/9
//! ```
//!
//! A placeholder matches one or more characters other than `/`, unless the
//! route gives it a constraint pattern, which then replaces the default.
//! Literal text must match byte-for-byte against the raw request path. One
//! trailing slash is ignored on both the template and the request path, so
//! `/items/` matches `/items` but `/items//` does not.
//!
//! Matching runs on the percent-encoded path; each captured value is decoded
//! afterwards, so an encoded `%2F` never adds a segment. A value whose escapes
//! do not decode to UTF-8 is kept as sent.
//!
//! The template compiles to one anchored [`Regex`] at registration time, so
//! matching is a single regex evaluation per route.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::RegistrationError;

const DEFAULT_SEGMENT: &str = "[^/]+";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}/]*)\}").expect("placeholder pattern is valid"));

/// A compiled path template.
#[derive(Clone, Debug)]
pub struct PathPattern {
    template: String,
    regex: Regex,
    names: Vec<String>,
}

impl PathPattern {
    /// Compiles `template`, using `constraints[name]` instead of the default
    /// segment pattern for the placeholders it names.
    ///
    /// Fails on malformed or repeated placeholder names and on constraints
    /// that are not valid regular expressions.
    pub fn compile(template: &str, constraints: &HashMap<String, String>) -> Result<Self, RegistrationError> {
        let template = normalize(template);

        let mut pattern = String::with_capacity(template.len() + 8);
        pattern.push('^');

        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let whole = caps.get(0).expect("group 0 always participates");
            let name = caps.get(1).map_or("", |m| m.as_str());

            if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
                return Err(RegistrationError::InvalidPlaceholder(whole.as_str().to_owned()));
            }
            if !seen.insert(name) {
                return Err(RegistrationError::DuplicatePlaceholder(name.to_owned()));
            }

            let segment = match constraints.get(name) {
                Some(custom) => {
                    Regex::new(custom).map_err(|e| RegistrationError::InvalidPattern {
                        name: name.to_owned(),
                        reason: e.to_string(),
                    })?;
                    custom.as_str()
                }
                None => DEFAULT_SEGMENT,
            };

            pattern.push_str(&regex::escape(&template[last..whole.start()]));
            // Generated group names: placeholder names may start with a digit,
            // which the regex crate does not accept as a group name.
            pattern.push_str(&format!("(?P<p{}>(?:{segment}))", names.len()));
            names.push(name.to_owned());
            last = whole.end();
        }

        pattern.push_str(&regex::escape(&template[last..]));
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| RegistrationError::InvalidPattern {
            name: template.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self { template: template.to_owned(), regex, names })
    }

    /// Returns the placeholder values when `path` matches, `None` otherwise.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(normalize(path))?;
        let params = self.names.iter()
            .enumerate()
            .filter_map(|(i, name)| {
                caps.name(&format!("p{i}")).map(|m| (name.clone(), decode(m.as_str())))
            })
            .collect();
        Some(params)
    }

    /// The normalized template text.
    pub fn template(&self) -> &str { &self.template }

    /// Placeholder names in template order.
    pub fn names(&self) -> &[String] { &self.names }
}

/// Strips one trailing slash, so `/a/b/` and `/a/b` compare equal and `/`
/// becomes the empty path.
pub(crate) fn normalize(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .unwrap_or_else(|_| raw.into())
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(template: &str) -> PathPattern {
        PathPattern::compile(template, &HashMap::new()).unwrap()
    }

    #[test]
    fn literal_paths() {
        let p = compile("/items");
        assert_eq!(p.matches("/items"), Some(HashMap::new()));
        assert_eq!(p.matches("/items/"), Some(HashMap::new()));
        assert_eq!(p.matches("/Items"), None);
        assert_eq!(p.matches("/items/5"), None);
    }

    #[test]
    fn root_path() {
        let p = compile("/");
        assert!(p.matches("/").is_some());
        assert!(p.matches("").is_some());
        assert!(p.matches("/a").is_none());
    }

    #[test]
    fn only_one_trailing_slash_is_ignored() {
        let p = compile("/items/{id}");
        assert!(p.matches("/items/5/").is_some());
        assert!(p.matches("/items/5//").is_none());
        assert!(compile("/").matches("//").is_none());
    }

    #[test]
    fn captured_values_are_percent_decoded() {
        let p = compile("/names/{n}");
        assert_eq!(p.matches("/names/caf%C3%A9%20x").unwrap()["n"], "café x");
        assert_eq!(p.matches("/names/a%2Fb").unwrap()["n"], "a/b");
        assert_eq!(p.matches("/names/a+b").unwrap()["n"], "a+b");
        assert_eq!(p.matches("/names/%FF").unwrap()["n"], "%FF");
    }

    #[test]
    fn trailing_slash_on_template() {
        let p = compile("/items/");
        assert_eq!(p.template(), "/items");
        assert!(p.matches("/items").is_some());
    }

    #[test]
    fn extracts_placeholders() {
        let p = compile("/users/{uid}/posts/{pid}");
        let params = p.matches("/users/7/posts/abc").unwrap();
        assert_eq!(params["uid"], "7");
        assert_eq!(params["pid"], "abc");
        assert_eq!(p.names(), ["uid", "pid"]);
    }

    #[test]
    fn segment_counts_must_agree() {
        let p = compile("/items/{id}");
        assert!(p.matches("/items").is_none());
        assert!(p.matches("/items/").is_none());
        assert!(p.matches("/items/1/2").is_none());
    }

    #[test]
    fn placeholder_inside_segment() {
        let p = compile("/files/{name}.json");
        assert_eq!(p.matches("/files/report.json").unwrap()["name"], "report");
        assert!(p.matches("/files/report.xml").is_none());
    }

    #[test]
    fn literal_text_is_not_a_pattern() {
        let p = compile("/a.b/{id}");
        assert!(p.matches("/a.b/1").is_some());
        assert!(p.matches("/axb/1").is_none());
    }

    #[test]
    fn constraint_replaces_default_pattern() {
        let constraints = HashMap::from([("id".to_owned(), r"\d+".to_owned())]);
        let p = PathPattern::compile("/items/{id}", &constraints).unwrap();
        assert!(p.matches("/items/12").is_some());
        assert!(p.matches("/items/ab").is_none());
    }

    #[test]
    fn constraint_may_span_segments() {
        let constraints = HashMap::from([("rest".to_owned(), ".+".to_owned())]);
        let p = PathPattern::compile("/static/{rest}", &constraints).unwrap();
        assert_eq!(p.matches("/static/css/site.css").unwrap()["rest"], "css/site.css");
    }

    #[test]
    fn constraint_alternation_stays_anchored() {
        let constraints = HashMap::from([("kind".to_owned(), "a|b".to_owned())]);
        let p = PathPattern::compile("/{kind}/x", &constraints).unwrap();
        assert!(p.matches("/a/x").is_some());
        assert!(p.matches("/b/x").is_some());
        assert!(p.matches("/a").is_none());
    }

    #[test]
    fn numeric_placeholder_name() {
        let p = compile("/v/{1st}");
        assert_eq!(p.matches("/v/x").unwrap()["1st"], "x");
    }

    #[test]
    fn rejects_duplicate_names() {
        assert_eq!(
            PathPattern::compile("/{id}/{id}", &HashMap::new()).unwrap_err(),
            RegistrationError::DuplicatePlaceholder("id".into())
        );
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(
            PathPattern::compile("/{}", &HashMap::new()).unwrap_err(),
            RegistrationError::InvalidPlaceholder("{}".into())
        );
        assert!(PathPattern::compile("/{a-b}", &HashMap::new()).is_err());
    }

    #[test]
    fn rejects_bad_constraint() {
        let constraints = HashMap::from([("id".to_owned(), "(".to_owned())]);
        assert!(matches!(
            PathPattern::compile("/{id}", &constraints),
            Err(RegistrationError::InvalidPattern { name, .. }) if name == "id"
        ));
    }
}
