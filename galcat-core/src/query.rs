// src/query.rs
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

use crate::document::{Document, FieldValue};
use crate::error::{GalcatError, Result};

/// Comparison operators accepted inside a match mapping
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Value),     // literal or $eq
    Gt(Value),     // $gt
    Gte(Value),    // $gte
    Lt(Value),     // $lt
    Lte(Value),    // $lte
    Exists(bool),  // $exists, backend-defined
}

impl Predicate {
    pub fn operator(&self) -> &'static str {
        match self {
            Predicate::Eq(_) => "$eq",
            Predicate::Gt(_) => "$gt",
            Predicate::Gte(_) => "$gte",
            Predicate::Lt(_) => "$lt",
            Predicate::Lte(_) => "$lte",
            Predicate::Exists(_) => "$exists",
        }
    }

    fn parse(op: &str, value: &Value) -> Result<Self> {
        match op {
            "$eq" => Ok(Predicate::Eq(value.clone())),
            "$gt" => Ok(Predicate::Gt(value.clone())),
            "$gte" => Ok(Predicate::Gte(value.clone())),
            "$lt" => Ok(Predicate::Lt(value.clone())),
            "$lte" => Ok(Predicate::Lte(value.clone())),
            "$exists" => match value {
                Value::Bool(b) => Ok(Predicate::Exists(*b)),
                _ => Err(GalcatError::MalformedQuery("$exists requires bool".into())),
            },
            _ => Err(GalcatError::unsupported(op, "not part of the catalog query language")),
        }
    }

    /// Array values (distributions) match when any element does
    pub fn matches(&self, value: &Value) -> bool {
        if let Value::Array(items) = value {
            if items.iter().any(|item| self.matches_single(item)) {
                return true;
            }
        }
        self.matches_single(value)
    }

    fn matches_single(&self, value: &Value) -> bool {
        match self {
            Predicate::Eq(target) => values_equal(value, target),
            Predicate::Gt(target) => compare_values(value, target) == Some(Ordering::Greater),
            Predicate::Gte(target) => {
                matches!(compare_values(value, target), Some(Ordering::Greater | Ordering::Equal))
            }
            Predicate::Lt(target) => compare_values(value, target) == Some(Ordering::Less),
            Predicate::Lte(target) => {
                matches!(compare_values(value, target), Some(Ordering::Less | Ordering::Equal))
            }
            // Reaching here means the value is present
            Predicate::Exists(should_exist) => *should_exist,
        }
    }
}

/// `field` or `field.sub_field`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub field: String,
    pub sub_field: Option<String>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(GalcatError::MalformedQuery(format!("empty segment in field path '{}'", path)));
        }
        match segments.as_slice() {
            [field] => Ok(FieldPath {
                field: field.to_string(),
                sub_field: None,
            }),
            [field, sub] => Ok(FieldPath {
                field: field.to_string(),
                sub_field: Some(sub.to_string()),
            }),
            _ => Err(GalcatError::MalformedQuery(format!(
                "field path '{}' is nested deeper than field.sub_field",
                path
            ))),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_field {
            Some(sub) => write!(f, "{}.{}", self.field, sub),
            None => write!(f, "{}", self.field),
        }
    }
}

/// One top-level key of a query mapping
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Field { path: FieldPath, predicates: Vec<Predicate> },
    Or(Vec<Query>),
}

impl Clause {
    fn key(&self) -> String {
        match self {
            Clause::Field { path, .. } => path.to_string(),
            Clause::Or(_) => "$or".to_string(),
        }
    }
}

/// Parsed query. Clauses keep the order of the source mapping and are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    pub fn new() -> Self {
        Query { clauses: Vec::new() }
    }

    /// Parse a query mapping
    pub fn from_json(json: &Value) -> Result<Self> {
        let map = json
            .as_object()
            .ok_or_else(|| GalcatError::MalformedQuery("query must be a JSON object".into()))?;

        let mut query = Query::new();
        for (key, condition) in map {
            let clause = if key.starts_with('$') {
                Self::parse_logical_operator(key, condition)?
            } else {
                Clause::Field {
                    path: FieldPath::parse(key)?,
                    predicates: Self::parse_predicates(condition)?,
                }
            };
            query.clauses.push(clause);
        }

        Ok(query)
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Clause> {
        match op {
            "$or" => match value {
                Value::Array(arr) if !arr.is_empty() => {
                    let mut branches = Vec::with_capacity(arr.len());
                    for item in arr {
                        branches.push(Self::from_json(item)?);
                    }
                    Ok(Clause::Or(branches))
                }
                _ => Err(GalcatError::MalformedQuery("$or requires a non-empty array".into())),
            },
            _ => Err(GalcatError::unsupported(op, "only $or may appear at the top level")),
        }
    }

    fn parse_predicates(condition: &Value) -> Result<Vec<Predicate>> {
        match condition {
            Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => {
                if !map.keys().all(|k| k.starts_with('$')) {
                    return Err(GalcatError::MalformedQuery(
                        "operator mapping mixes operators and plain keys".into(),
                    ));
                }
                map.iter().map(|(op, val)| Predicate::parse(op, val)).collect()
            }
            _ => Ok(vec![Predicate::Eq(condition.clone())]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// First field path carrying `$exists`, searching `$or` branches too
    pub fn exists_path(&self) -> Option<&FieldPath> {
        self.clauses.iter().find_map(|clause| match clause {
            Clause::Field { path, predicates } => predicates
                .iter()
                .any(|p| matches!(p, Predicate::Exists(_)))
                .then_some(path),
            Clause::Or(branches) => branches.iter().find_map(Query::exists_path),
        })
    }

    /// Reject what the in-memory evaluator cannot answer correctly
    pub fn ensure_in_memory(&self) -> Result<()> {
        match self.exists_path() {
            Some(path) => Err(GalcatError::unsupported(
                "$exists",
                format!(
                    "'{}' needs a remote document store; the in-memory evaluator does not support $exists",
                    path
                ),
            )),
            None => Ok(()),
        }
    }

    /// Does a single document match
    pub fn matches(&self, document: &Document) -> Result<bool> {
        self.ensure_in_memory()?;
        self.matches_unchecked(document)
    }

    fn matches_unchecked(&self, document: &Document) -> Result<bool> {
        for clause in &self.clauses {
            let matched = match clause {
                Clause::Field { path, predicates } => {
                    document.contains(&path.field) && matches_field(document, path, predicates)?
                }
                Clause::Or(branches) => matches_any(document, branches)?,
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Filter `documents` by `query`, keeping collection order.
///
/// Clauses narrow the candidate set one by one. A field clause first drops
/// documents without the field, then applies the value check to every
/// remaining candidate, however few.
pub fn evaluate<'a>(documents: &'a [Document], query: &Query) -> Result<Vec<&'a Document>> {
    query.ensure_in_memory()?;

    let mut candidates: Vec<&Document> = documents.iter().collect();
    for clause in &query.clauses {
        if candidates.is_empty() {
            break;
        }

        candidates = match clause {
            Clause::Field { path, predicates } => {
                let present = candidates.into_iter().filter(|doc| doc.contains(&path.field));
                let mut kept = Vec::new();
                for doc in present {
                    if matches_field(doc, path, predicates)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            Clause::Or(branches) => {
                let mut kept = Vec::new();
                for doc in candidates {
                    if matches_any(doc, branches)? {
                        kept.push(doc);
                    }
                }
                kept
            }
        };

        debug!(clause = %clause.key(), remaining = candidates.len(), "applied query clause");
    }

    Ok(candidates)
}

/// Parse and evaluate in one step
pub fn evaluate_json<'a>(documents: &'a [Document], query: &Value) -> Result<Vec<&'a Document>> {
    evaluate(documents, &Query::from_json(query)?)
}

fn matches_any(document: &Document, branches: &[Query]) -> Result<bool> {
    for branch in branches {
        if branch.matches_unchecked(document)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn matches_field(document: &Document, path: &FieldPath, predicates: &[Predicate]) -> Result<bool> {
    let Some(field) = document.get(&path.field) else {
        return Ok(false);
    };

    match (field, &path.sub_field) {
        (FieldValue::Scalar(value), None) => Ok(predicates.iter().all(|p| p.matches(value))),

        (FieldValue::Entries(entries), Some(sub)) => Ok(predicates.iter().all(|p| {
            entries
                .iter()
                .any(|entry| entry.field(sub).map_or(false, |v| p.matches(&v)))
        })),

        // Plain embedded objects are addressable like entries
        (FieldValue::Scalar(Value::Object(map)), Some(sub)) => {
            Ok(predicates.iter().all(|p| map.get(sub).map_or(false, |v| p.matches(v))))
        }

        (FieldValue::Scalar(_), Some(_)) => Err(GalcatError::MalformedQuery(format!(
            "'{}' treats scalar field '{}' as multi-valued",
            path, path.field
        ))),

        (FieldValue::Entries(_), None) => Err(GalcatError::MalformedQuery(format!(
            "field '{}' is multi-valued; address a sub-field such as '{}.value'",
            path.field, path.field
        ))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => match (n1.as_f64(), n2.as_f64()) {
            (Some(f1), Some(f2)) => f1 == f2,
            _ => n1 == n2,
        },
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            let f1 = n1.as_f64()?;
            let f2 = n2.as_f64()?;
            f1.partial_cmp(&f2)
        }
        (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
        (Value::Bool(b1), Value::Bool(b2)) => Some(b1.cmp(b2)),
        _ => None,
    }
}
