//! Dot-delimited field path addressing over the structured record.
//!
//! `get` is a plain descent; `set` is copy-on-write: every object on the
//! path is shallow-cloned, siblings stay shared with the input record.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PathError;
use crate::value::Value;

/// Stable identifier of one leaf in the record,
/// e.g. `riskAssessment.borrowerRating.proposedBrr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(String);

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        if raw.split('.').any(str::is_empty) {
            return Err(PathError::EmptySegment(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// True when one of the segments equals `name` exactly.
    pub fn contains_segment(&self, name: &str) -> bool {
        self.segments().any(|s| s == name)
    }

    /// Segment-wise prefix test: `a.b` is a prefix of `a.b` and `a.b.c`, not of `a.bc`.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'.'))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.0
    }
}

impl Borrow<str> for FieldPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Read the value at `path`. `None` when any segment is missing or
/// descends through a scalar. Numeric segments index into sequences.
pub fn get<'a>(record: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments().try_fold(record, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Return a new record with the leaf at `path` replaced by `value`.
///
/// Missing (or null) intermediates become empty objects. Descending through
/// a scalar is a checked error and the input record is left untouched.
pub fn set(record: &Value, path: &FieldPath, value: Value) -> Result<Value, PathError> {
    let mut root = record.clone();
    let segments: Vec<&str> = path.segments().collect();
    set_in(&mut root, &segments, value, path)?;
    Ok(root)
}

fn set_in(node: &mut Value, segments: &[&str], value: Value, path: &FieldPath) -> Result<(), PathError> {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return Ok(());
    };

    if node.is_null() {
        *node = Value::empty_object();
    }

    match node {
        Value::Object(map) => {
            let slot = Arc::make_mut(map).entry((*head).to_string()).or_default();
            set_in(slot, rest, value, path)
        }
        Value::Sequence(items) => {
            let len = items.len();
            let index = head
                .parse::<usize>()
                .ok()
                .filter(|i| *i < len)
                .ok_or_else(|| PathError::IndexOutOfRange {
                    path: path.to_string(),
                    segment: (*head).to_string(),
                    len,
                })?;
            set_in(&mut Arc::make_mut(items)[index], rest, value, path)
        }
        _ => Err(PathError::NotAContainer {
            path: path.to_string(),
            segment: (*head).to_string(),
        }),
    }
}

/// Whether the field already carries a meaningful value.
///
/// Absent, null, empty text, numeric zero and an empty sequence count as unfilled.
pub fn is_filled(record: &Value, path: &FieldPath) -> bool {
    match get(record, path) {
        None | Some(Value::Null) => false,
        Some(Value::Text(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::Sequence(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> FieldPath {
        FieldPath::parse(s).unwrap()
    }

    fn record() -> Value {
        Value::from(json!({
            "riskAssessment": {
                "borrowerRating": { "proposedBrr": "3B" },
                "publicRatings": [{ "agency": "Moody's", "rating": "Ba1" }]
            },
            "borrower": { "name": "Acme Corp" }
        }))
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert_eq!(FieldPath::parse(""), Err(PathError::Empty));
        assert!(matches!(FieldPath::parse("a..b"), Err(PathError::EmptySegment(_))));
        assert!(matches!(FieldPath::parse(".a"), Err(PathError::EmptySegment(_))));
        assert_eq!(p("a.b").segments().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn prefix_is_segment_wise() {
        assert!(p("a.b.c").starts_with(&p("a.b")));
        assert!(p("a.b").starts_with(&p("a.b")));
        assert!(!p("a.bc").starts_with(&p("a.b")));
        assert!(p("x.publicRatings.sp").contains_segment("publicRatings"));
        assert!(!p("x.publicRatingsOld").contains_segment("publicRatings"));
    }

    #[test]
    fn get_descends_objects_and_sequences() {
        let r = record();
        assert_eq!(
            get(&r, &p("riskAssessment.borrowerRating.proposedBrr")),
            Some(&Value::text("3B"))
        );
        assert_eq!(
            get(&r, &p("riskAssessment.publicRatings.0.rating")),
            Some(&Value::text("Ba1"))
        );
        assert_eq!(get(&r, &p("riskAssessment.missing.leaf")), None);
        assert_eq!(get(&r, &p("borrower.name.first")), None);
    }

    #[test]
    fn set_creates_missing_intermediates() {
        let updated = set(&Value::Null, &p("a.b.c"), Value::from(1)).unwrap();
        assert_eq!(serde_json::Value::from(updated), json!({ "a": { "b": { "c": 1 } } }));
    }

    #[test]
    fn set_shares_untouched_siblings() {
        let r = record();
        let updated = set(&r, &p("riskAssessment.borrowerRating.proposedBrr"), Value::text("4A")).unwrap();

        let before = get(&r, &p("borrower")).unwrap();
        let after = get(&updated, &p("borrower")).unwrap();
        assert!(before.shares_storage(after));

        let ratings_before = get(&r, &p("riskAssessment.publicRatings")).unwrap();
        let ratings_after = get(&updated, &p("riskAssessment.publicRatings")).unwrap();
        assert!(ratings_before.shares_storage(ratings_after));

        // Objects along the path were copied, the input is unchanged.
        assert_eq!(
            get(&r, &p("riskAssessment.borrowerRating.proposedBrr")),
            Some(&Value::text("3B"))
        );
        assert!(!get(&r, &p("riskAssessment"))
            .unwrap()
            .shares_storage(get(&updated, &p("riskAssessment")).unwrap()));
    }

    #[test]
    fn set_through_scalar_is_an_error() {
        let err = set(&record(), &p("borrower.name.first"), Value::text("x")).unwrap_err();
        assert_eq!(
            err,
            PathError::NotAContainer {
                path: "borrower.name.first".into(),
                segment: "first".into()
            }
        );
    }

    #[test]
    fn set_into_sequence_requires_valid_index() {
        let r = record();
        let updated = set(&r, &p("riskAssessment.publicRatings.0.rating"), Value::text("Baa3")).unwrap();
        assert_eq!(
            get(&updated, &p("riskAssessment.publicRatings.0.rating")),
            Some(&Value::text("Baa3"))
        );
        assert!(matches!(
            set(&r, &p("riskAssessment.publicRatings.5.rating"), Value::Null),
            Err(PathError::IndexOutOfRange { len: 1, .. })
        ));
    }

    #[test]
    fn is_filled_rules() {
        let r = Value::from(json!({
            "empty": "", "zero": 0, "zerof": 0.0, "none": null, "list": [],
            "text": "x", "num": 7, "flag": false, "obj": {}, "items": [1]
        }));
        for path in ["empty", "zero", "zerof", "none", "list", "absent"] {
            assert!(!is_filled(&r, &p(path)), "{path} should be unfilled");
        }
        for path in ["text", "num", "flag", "obj", "items"] {
            assert!(is_filled(&r, &p(path)), "{path} should be filled");
        }
    }
}
