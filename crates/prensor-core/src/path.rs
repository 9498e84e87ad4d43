//! Paths into a prensor or an expression tree.
//!
//! A `Path` is an immutable sequence of `Step`s. Named steps come in three
//! token forms:
//! - simple fields: `foo_bar-1`
//! - extensions: `(package.Message.ext)`
//! - map indexing: `my_map[some key]`
//!
//! Steps are validated on construction unless the path was created with
//! [`Path::lenient`]; lenient mode carries over to every path derived from it.
//! Anonymous steps sort after all named steps.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::AnonymousId;

const EXTENSION_RE: &str = r"\((?:[A-Za-z0-9_/\-]+\.)*[A-Za-z0-9_/\-]+\)";
const SIMPLE_STEP_RE: &str = r"[A-Za-z0-9_\-]+";
const MAP_INDEXING_STEP_RE: &str = r"[A-Za-z0-9_\-]+\[[^\]]*\]";

static VALID_STEP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "^(?:{EXTENSION_RE}|{SIMPLE_STEP_RE}|{MAP_INDEXING_STEP_RE})$"
    ))
    .expect("valid step regex")
});

static MAP_INDEXING_STEP: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{MAP_INDEXING_STEP_RE}$")).expect("map step regex"));

// A step followed by either a separator or the end of input.
static STEP_AND_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^({EXTENSION_RE}|{SIMPLE_STEP_RE}|{MAP_INDEXING_STEP_RE})(\.|$)"
    ))
    .expect("path separator regex")
});

/// One step of a path.
///
/// The derived ordering puts every `Field` before every `Anonymous` step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    Field(String),
    Anonymous(AnonymousId),
}

impl Step {
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Step::Field(s) => Some(s.as_str()),
            Step::Anonymous(_) => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Step::Anonymous(_))
    }
}

impl From<&str> for Step {
    fn from(s: &str) -> Self {
        Step::Field(s.to_string())
    }
}

impl From<String> for Step {
    fn from(s: String) -> Self {
        Step::Field(s)
    }
}

impl From<&String> for Step {
    fn from(s: &String) -> Self {
        Step::Field(s.clone())
    }
}

impl From<&Step> for Step {
    fn from(s: &Step) -> Self {
        s.clone()
    }
}

impl From<AnonymousId> for Step {
    fn from(id: AnonymousId) -> Self {
        Step::Anonymous(id)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Field(s) => f.write_str(s),
            Step::Anonymous(id) => write!(f, "{}", id),
        }
    }
}

/// Returns a step that no other call in this process will ever return.
pub fn anonymous_step() -> Step {
    Step::Anonymous(AnonymousId::next())
}

pub fn is_valid_step(step: &str) -> bool {
    VALID_STEP.is_match(step)
}

/// True if `step` is a parenthesized extension step.
pub fn is_extension(step: &str) -> Result<bool> {
    if !is_valid_step(step) {
        return Err(Error::PathFormat(format!(
            "not a valid step in a path: \"{step}\""
        )));
    }
    Ok(step.starts_with('('))
}

/// The extension name without its parentheses.
pub fn raw_extension_name(step: &str) -> Result<&str> {
    if !is_extension(step)? {
        return Err(Error::PathFormat(format!("not an extension: \"{step}\"")));
    }
    Ok(&step[1..step.len() - 1])
}

pub fn is_map_indexing_step(step: &str) -> bool {
    MAP_INDEXING_STEP.is_match(step)
}

/// Splits `name[key]` into `(name, key)`.
pub fn parse_map_indexing_step(step: &str) -> Result<(&str, &str)> {
    if !is_map_indexing_step(step) {
        return Err(Error::PathFormat(format!(
            "not a map indexing step: \"{step}\""
        )));
    }
    step.strip_suffix(']')
        .and_then(|s| s.split_once('['))
        .ok_or_else(|| Error::PathFormat(format!("malformed map indexing step: \"{step}\"")))
}

fn check_step(step: &Step, validate: bool) -> Result<()> {
    match step {
        Step::Field(s) if validate && !is_valid_step(s) => Err(Error::PathFormat(format!(
            "field \"{s}\" is invalid"
        ))),
        _ => Ok(()),
    }
}

/// An immutable sequence of steps from one node to another.
///
/// Equality, ordering and hashing look at the steps only; the validation
/// mode is carried along but never compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    steps: Vec<Step>,
    validate_step_format: bool,
}

impl Path {
    /// The empty path.
    pub fn root() -> Self {
        Self {
            steps: Vec::new(),
            validate_step_format: true,
        }
    }

    /// Build a validated path from steps.
    pub fn new<I, S>(steps: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Step>,
    {
        let steps: Vec<Step> = steps.into_iter().map(Into::into).collect();
        for s in &steps {
            check_step(s, true)?;
        }
        Ok(Self {
            steps,
            validate_step_format: true,
        })
    }

    /// Build a path without step validation. Derived paths stay lenient.
    pub fn lenient<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Step>,
    {
        Self {
            steps: steps.into_iter().map(Into::into).collect(),
            validate_step_format: false,
        }
    }

    fn derived(&self, steps: Vec<Step>) -> Self {
        Self {
            steps,
            validate_step_format: self.validate_step_format,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn validate_step_format(&self) -> bool {
        self.validate_step_format
    }

    pub fn first_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn parent(&self) -> Result<Path> {
        if self.steps.is_empty() {
            return Err(Error::InvalidArgument(
                "tried to find parent of root".to_string(),
            ));
        }
        Ok(self.derived(self.steps[..self.steps.len() - 1].to_vec()))
    }

    pub fn child(&self, step: impl Into<Step>) -> Result<Path> {
        let step = step.into();
        check_step(&step, self.validate_step_format)?;
        let mut steps = self.steps.clone();
        steps.push(step);
        Ok(self.derived(steps))
    }

    /// Appends a step that is already part of some tree.
    ///
    /// The result keeps this path's mode unless `step` fails validation, in
    /// which case it is lenient.
    pub fn join_step(&self, step: &Step) -> Path {
        let validate = self.validate_step_format && check_step(step, true).is_ok();
        let mut steps = self.steps.clone();
        steps.push(step.clone());
        Path {
            steps,
            validate_step_format: validate,
        }
    }

    /// Appends `other`. The result is lenient if either side is.
    pub fn concat(&self, other: &Path) -> Path {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        Path {
            steps,
            validate_step_format: self.validate_step_format && other.validate_step_format,
        }
    }

    /// The first `end` steps.
    pub fn prefix(&self, end: usize) -> Path {
        let end = end.min(self.steps.len());
        self.derived(self.steps[..end].to_vec())
    }

    /// Everything from step `start` on.
    pub fn suffix(&self, start: usize) -> Path {
        let start = start.min(self.steps.len());
        self.derived(self.steps[start..].to_vec())
    }

    fn least_common_ancestor_len(&self, other: &Path) -> usize {
        self.steps
            .iter()
            .zip(other.steps.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    pub fn least_common_ancestor(&self, other: &Path) -> Path {
        self.prefix(self.least_common_ancestor_len(other))
    }

    /// True if `self` is `other` or a prefix of it.
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.steps.len() <= other.steps.len() && other.steps[..self.steps.len()] == self.steps[..]
    }
}

impl Default for Path {
    fn default() -> Self {
        Path::root()
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.steps.hash(state);
    }
}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> Ordering {
        self.steps.cmp(&other.steps)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", s)?;
        }
        Ok(())
    }
}

/// Parse a dotted path such as `doc.(pkg.ext).tags[en]`.
///
/// The empty string is the root. A trailing `.` is rejected, otherwise
/// `foo.bar.` would silently mean `foo.bar`.
pub fn create_path(source: &str) -> Result<Path> {
    if source.ends_with('.') {
        return Err(Error::PathFormat("path cannot end with .".to_string()));
    }
    let mut steps = Vec::new();
    let mut remaining = source;
    while !remaining.is_empty() {
        let caps = STEP_AND_SEPARATOR
            .captures(remaining)
            .ok_or_else(|| Error::PathFormat(format!("malformed path: {source}")))?;
        let (whole, step) = match (caps.get(0), caps.get(1)) {
            (Some(w), Some(s)) => (w, s),
            _ => return Err(Error::PathFormat(format!("malformed path: {source}"))),
        };
        steps.push(Step::Field(step.as_str().to_string()));
        remaining = &remaining[whole.end()..];
    }
    Ok(Path {
        steps,
        validate_step_format: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_paths() {
        let p = create_path("foo.(bar.baz).m[k.1]").unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.steps()[1], Step::from("(bar.baz)"));
        assert_eq!(p.steps()[2], Step::from("m[k.1]"));
        assert_eq!(p.to_string(), "foo.(bar.baz).m[k.1]");
        assert!(create_path("").unwrap().is_root());
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(matches!(create_path("foo."), Err(Error::PathFormat(_))));
        assert!(matches!(create_path("foo..bar"), Err(Error::PathFormat(_))));
        assert!(matches!(create_path("foo.b@r"), Err(Error::PathFormat(_))));
    }

    #[test]
    fn parent_child_round_trip() {
        let p = create_path("a.b.c").unwrap();
        let last = p.last_step().cloned().unwrap();
        assert_eq!(p.parent().unwrap().child(last).unwrap(), p);
        assert!(Path::root().parent().is_err());
    }

    #[test]
    fn anonymous_steps_sort_last() {
        let anon = anonymous_step();
        let named = Step::from("zzz");
        assert!(named < anon);
        let a = Path::root().child("zzz").unwrap();
        let b = Path::root().child(anon).unwrap();
        assert!(a < b);
        assert_ne!(anonymous_step(), anonymous_step());
    }

    #[test]
    fn prefix_suffix_and_ancestors() {
        let p = create_path("a.b.c").unwrap();
        let q = create_path("a.b.d.e").unwrap();
        assert_eq!(p.prefix(2), create_path("a.b").unwrap());
        assert_eq!(p.suffix(1), create_path("b.c").unwrap());
        assert_eq!(p.least_common_ancestor(&q), create_path("a.b").unwrap());
        assert!(create_path("a.b").unwrap().is_ancestor_of(&p));
        assert!(p.is_ancestor_of(&p));
        assert!(!q.is_ancestor_of(&p));
        assert_eq!(
            create_path("a").unwrap().concat(&create_path("b.c").unwrap()),
            p
        );
    }

    #[test]
    fn lenient_paths_accept_raw_steps() {
        assert!(Path::new(["a.b"]).is_err());
        let p = Path::lenient(["a.b"]);
        assert_eq!(p.len(), 1);
        let child = p.child("c/d.e").unwrap();
        assert!(!child.validate_step_format());
        assert!(Path::root().child("c/d.e").is_err());
    }

    #[test]
    fn join_step_inherits_mode() {
        let strict = create_path("a").unwrap();
        assert!(strict.join_step(&Step::from("b")).validate_step_format());
        assert!(!strict.join_step(&Step::from("c/d.e")).validate_step_format());
        let lenient = Path::lenient(["a"]);
        assert!(!lenient.join_step(&Step::from("b")).validate_step_format());
    }

    #[test]
    fn extension_and_map_steps() {
        assert!(is_extension("(foo.bar)").unwrap());
        assert!(!is_extension("foo").unwrap());
        assert!(is_extension("foo bar").is_err());
        assert_eq!(raw_extension_name("(foo.bar)").unwrap(), "foo.bar");
        assert!(raw_extension_name("foo").is_err());
        assert!(is_map_indexing_step("m[key]"));
        assert_eq!(parse_map_indexing_step("m[a b]").unwrap(), ("m", "a b"));
        assert!(parse_map_indexing_step("m").is_err());
    }

    #[test]
    fn trailing_text_after_map_key_is_rejected() {
        assert!(!is_map_indexing_step("m[a]x"));
        assert!(matches!(
            parse_map_indexing_step("m[a]\u{e9}"),
            Err(Error::PathFormat(_))
        ));
        assert!(create_path("m[a]\u{e9}").is_err());
    }
}
