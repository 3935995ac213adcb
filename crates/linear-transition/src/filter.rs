//! Filter trees for Linear's label and issue queries.
//!
//! Linear has no notion of a label "path". A nested label such as
//! `test/fest/v0.0.1` has to be located by name and by the chain of its
//! parents, so every path is turned into a nested filter:
//!
//! ```json
//! {
//!   "name": { "eq": "v0.0.1" },
//!   "parent": {
//!     "name": { "eq": "fest" },
//!     "parent": { "name": { "eq": "test" }, "parent": {} }
//!   }
//! }
//! ```
//!
//! The innermost `parent: {}` is an empty filter and puts no constraint on the
//! root segment, so a root segment may itself be nested somewhere else.

use serde::Serialize;
use serde_json::{json, Value};

/// Path separator for nested label names.
pub const PATH_SEPARATOR: char = '/';

/// Wildcard marker inside a path segment.
pub const WILDCARD: char = '*';

/// String comparator as understood by Linear's filter input types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StringComparator {
    Eq(String),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
}

impl StringComparator {
    /// Comparator for a single pattern segment.
    ///
    /// `prefix*` becomes `startsWith`, `*suffix` becomes `endsWith`, anything
    /// else (including a `*` in the middle) is matched literally.
    #[must_use]
    pub fn for_pattern(segment: &str) -> Self {
        if let Some(prefix) = segment.strip_suffix(WILDCARD) {
            Self::StartsWith(prefix.to_string())
        } else if let Some(suffix) = segment.strip_prefix(WILDCARD) {
            Self::EndsWith(suffix.to_string())
        } else {
            Self::Eq(segment.to_string())
        }
    }
}

/// Linear `IssueLabelFilter`, restricted to id, name, parent and `or`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<StringComparator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<StringComparator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<LabelFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<LabelFilter>>,
}

impl LabelFilter {
    /// Filter matching any of the given clauses.
    #[must_use]
    pub fn any_of(clauses: Vec<Self>) -> Self {
        Self {
            or: Some(clauses),
            ..Self::default()
        }
    }

    /// Filter for a single label segment by exact name, optionally under a
    /// specific parent. Without a parent no constraint is placed on nesting.
    #[must_use]
    pub fn segment(name: &str, parent_id: Option<&str>) -> Self {
        Self {
            name: Some(StringComparator::Eq(name.to_string())),
            parent: parent_id.map(|id| {
                Box::new(Self {
                    id: Some(StringComparator::Eq(id.to_string())),
                    ..Self::default()
                })
            }),
            ..Self::default()
        }
    }

    fn nested<'a, I, F>(segments: I, matcher: F) -> Self
    where
        I: IntoIterator<Item = &'a String>,
        F: Fn(&str) -> StringComparator,
    {
        segments
            .into_iter()
            .fold(Self::default(), |parent, segment| Self {
                name: Some(matcher(segment.as_str())),
                parent: Some(Box::new(parent)),
                ..Self::default()
            })
    }
}

/// A `/`-delimited label name, root first (e.g. `version/v2.0.0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPath {
    raw: String,
    segments: Vec<String>,
}

impl LabelPath {
    /// Empty segments (`version/`, `a//b`) are dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: raw
                .split(PATH_SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// True when the path names no label at all (`""`, `/`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path as written by the user.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, i.e. the name of the label the path points at.
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Filter matching this exact path.
    #[must_use]
    pub fn exact_filter(&self) -> LabelFilter {
        LabelFilter::nested(&self.segments, |s| StringComparator::Eq(s.to_string()))
    }

    /// Filter matching this path with `prefix*` / `*suffix` segments expanded.
    #[must_use]
    pub fn pattern_filter(&self) -> LabelFilter {
        LabelFilter::nested(&self.segments, StringComparator::for_pattern)
    }
}

impl std::fmt::Display for LabelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Selection of issues within a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueFilter {
    pub team_id: String,
    /// Issue numbers (the `123` of `ENG-123`); empty means no number constraint
    pub numbers: Vec<u32>,
    /// Only issues carrying a label whose name contains this substring
    pub label_contains: Option<String>,
}

impl IssueFilter {
    /// Render as a Linear `IssueFilter` input object.
    #[must_use]
    pub fn to_graphql(&self) -> Value {
        let mut filter = json!({ "team": { "id": { "eq": self.team_id } } });

        if !self.numbers.is_empty() {
            filter["number"] = json!({ "in": self.numbers });
        }
        if let Some(substring) = &self.label_contains {
            filter["labels"] = json!({ "name": StringComparator::Contains(substring.clone()) });
        }

        filter
    }
}
