//! Terms and solutions returned by the reasoner.
//!
//! The reasoner answers a query with zero or more solutions. Each solution
//! binds query variables to terms, encoded as JSON on the wire: atoms and
//! strings as JSON strings, numbers as numbers, lists as arrays, and
//! compound terms as `{"term": [functor, arg1, ...]}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KbError, ReasonerError};

/// A Prolog term as bound in a solution.
///
/// # Examples
///
/// ```
/// use shelfkb::Term;
///
/// let t = Term::from_json(serde_json::json!("'dmshop:ShelfLayer_1'"));
/// assert_eq!(t.as_atom(), Some("dmshop:ShelfLayer_1".to_string()));
///
/// let n = Term::from_json(serde_json::json!(0.25));
/// assert_eq!(n.as_f64(), Some(0.25));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Term {
    /// Atom or string, as sent (quotes included).
    Atom(String),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// List of terms.
    List(Vec<Term>),
    /// Compound term `functor(args...)`.
    Compound {
        /// Name of the compound.
        functor: String,
        /// Arguments, in order.
        args: Vec<Term>,
    },
    /// Unbound or JSON `null`.
    Null,
}

impl Term {
    /// Decodes a term from its JSON wire form.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Atom(b.to_string()),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Atom(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(mut map) => match map.remove("term") {
                Some(serde_json::Value::Array(parts)) if !parts.is_empty() => {
                    let mut parts = parts.into_iter();
                    let functor = match parts.next() {
                        Some(serde_json::Value::String(s)) => s,
                        Some(other) => other.to_string(),
                        None => String::new(),
                    };
                    Self::Compound {
                        functor,
                        args: parts.map(Self::from_json).collect(),
                    }
                }
                _ => Self::Atom(serde_json::Value::Object(map).to_string()),
            },
        }
    }

    /// Whether the term is an atom.
    pub const fn is_atom(&self) -> bool {
        matches!(self, Self::Atom(_))
    }

    /// Whether the term is an integer or a float.
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Whether the term is a list.
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Returns the raw atom text, quotes included.
    pub fn as_raw_atom(&self) -> Option<&str> {
        match self {
            Self::Atom(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the atom with all single quotes removed.
    ///
    /// Identifiers come back from the reasoner as `'ns:Name'`; callers
    /// want them bare.
    pub fn as_atom(&self) -> Option<String> {
        self.as_raw_atom().map(strip_quotes)
    }

    /// Returns the term as a float. Integers widen and numeric atoms parse.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            Self::Atom(s) => strip_quotes(s).trim().parse().ok(),
            _ => None,
        }
    }

    /// Items of a list term.
    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether the term is `[]`.
    pub fn is_empty_list(&self) -> bool {
        matches!(self, Self::List(items) if items.is_empty())
    }

    /// Short name of the term kind, for error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Atom(_) => "atom",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::List(_) => "list",
            Self::Compound { .. } => "compound",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Compound { functor, args } => {
                write!(f, "{functor}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Self::Null => write!(f, "null"),
        }
    }
}

/// Removes every single quote from an identifier.
#[must_use]
pub fn strip_quotes(s: &str) -> String {
    s.replace('\'', "")
}

/// One solution of a query: variable name to bound term.
///
/// A solution with no bindings means the query was simply true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Solution(BTreeMap<String, Term>);

impl Solution {
    /// Creates an empty solution ("true").
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding, builder style.
    #[must_use]
    pub fn with(mut self, variable: impl Into<String>, term: Term) -> Self {
        self.0.insert(variable.into(), term);
        self
    }

    /// Decodes a solution from the JSON object the reasoner sends.
    pub fn from_json_str(json: &str) -> Result<Self, ReasonerError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ReasonerError::Decode {
                message: format!("invalid solution JSON: {e}"),
            })?;
        match value {
            serde_json::Value::Object(map) => Ok(Self(
                map.into_iter()
                    .map(|(k, v)| (k, Term::from_json(v)))
                    .collect(),
            )),
            other => Err(ReasonerError::Decode {
                message: format!("solution must be a JSON object, got {other}"),
            }),
        }
    }

    /// Whether the solution binds nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Binding of `variable`, if any.
    pub fn get(&self, variable: &str) -> Option<&Term> {
        self.0.get(variable)
    }

    /// Bound variable names, sorted.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the binding of `variable` or a `MissingBinding` error.
    pub fn require(&self, query: &str, variable: &str) -> Result<&Term, KbError> {
        self.get(variable).ok_or_else(|| KbError::MissingBinding {
            query: query.to_string(),
            variable: variable.to_string(),
        })
    }

    /// Returns the binding of `variable` as an unquoted atom.
    pub fn atom(&self, query: &str, variable: &str) -> Result<String, KbError> {
        let term = self.require(query, variable)?;
        term.as_atom().ok_or_else(|| unexpected(variable, "atom", term))
    }

    /// Returns the binding of `variable` as a float.
    pub fn number(&self, query: &str, variable: &str) -> Result<f64, KbError> {
        let term = self.require(query, variable)?;
        term.as_f64().ok_or_else(|| unexpected(variable, "number", term))
    }

    /// Returns the binding of `variable` as a list.
    pub fn list(&self, query: &str, variable: &str) -> Result<&[Term], KbError> {
        let term = self.require(query, variable)?;
        term.as_list().ok_or_else(|| unexpected(variable, "list", term))
    }
}

pub(crate) fn unexpected(variable: &str, expected: &'static str, found: &Term) -> KbError {
    KbError::UnexpectedTerm {
        variable: variable.to_string(),
        expected,
        found: format!("{} {found}", found.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_atom_quotes_stripped() {
        let t = Term::from_json(json!("'http://knowrob.org/kb/shop.owl#ShelfLayer_abc'"));
        assert!(t.is_atom());
        assert_eq!(
            t.as_atom().as_deref(),
            Some("http://knowrob.org/kb/shop.owl#ShelfLayer_abc")
        );
        assert_eq!(
            t.as_raw_atom(),
            Some("'http://knowrob.org/kb/shop.owl#ShelfLayer_abc'")
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(Term::from_json(json!(3)), Term::Int(3));
        assert_eq!(Term::from_json(json!(3)).as_f64(), Some(3.0));
        assert_eq!(Term::from_json(json!(0.5)).as_f64(), Some(0.5));
        assert_eq!(Term::Atom("'0.42'".to_string()).as_f64(), Some(0.42));
        assert_eq!(Term::Atom("shelf".to_string()).as_f64(), None);
    }

    #[test]
    fn test_nested_list() {
        let t = Term::from_json(json!(["map", null, [1.0, 2.0, 0.5], [0, 0, 0, 1]]));
        let items = t.as_list().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[1], Term::Null);
        assert_eq!(items[2].as_list().unwrap()[2].as_f64(), Some(0.5));
        assert!(!t.is_empty_list());
        assert!(Term::List(vec![]).is_empty_list());
    }

    #[test]
    fn test_compound_term() {
        let t = Term::from_json(json!({"term": ["dan", "'4011'"]}));
        assert_eq!(
            t,
            Term::Compound {
                functor: "dan".to_string(),
                args: vec![Term::Atom("'4011'".to_string())],
            }
        );
        assert_eq!(t.to_string(), "dan('4011')");
    }

    #[test]
    fn test_solution_from_json() {
        let s = Solution::from_json_str(r#"{"Floor": "'layer_1'", "Z": 0.3}"#).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.atom("q", "Floor").unwrap(), "layer_1");
        assert!((s.number("q", "Z").unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(s.variables().collect::<Vec<_>>(), vec!["Floor", "Z"]);
    }

    #[test]
    fn test_empty_solution_is_true() {
        let s = Solution::from_json_str("{}").unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn test_solution_rejects_non_object() {
        let err = Solution::from_json_str("[1,2]").unwrap_err();
        assert!(matches!(err, ReasonerError::Decode { .. }));
        let err = Solution::from_json_str("{not json").unwrap_err();
        assert!(format!("{err}").contains("invalid solution JSON"));
    }

    #[test]
    fn test_missing_and_mistyped_bindings() {
        let s = Solution::new().with("W", Term::Atom("wide".to_string()));
        let err = s.number("object_dimensions(x, D, W, H).", "W").unwrap_err();
        assert!(matches!(err, KbError::UnexpectedTerm { expected: "number", .. }));
        let err = s.atom("q", "H").unwrap_err();
        assert!(matches!(err, KbError::MissingBinding { .. }));
    }
}
