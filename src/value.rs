//! Structured values compared by the substructure matcher.
//!
//! Documents are parsed with `serde_yaml` and then lowered into [`Value`], a
//! closed sum type over scalars, mappings, sequences, sets and the explicit
//! absence marker [`Value::Any`]. The lowering depends on the document's
//! [`Role`]: in an expected document a YAML null means "present, content
//! unconstrained", in an actual document it is just a null scalar.

use im::{HashMap, HashSet};
use serde_yaml::value::{Tag, TaggedValue};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

// =============================================================================
// SCALARS
// =============================================================================

/// A leaf value. Also the key type of mappings and the member type of sets.
///
/// Numbers compare by value: an integral float equals the matching integer
/// and hashes the same way. NaN equals NaN so that a scalar is always equal
/// to itself.
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Builds a numeric scalar, storing integral floats as integers.
    pub fn float(f: f64) -> Self {
        match integral(f) {
            Some(i) => Scalar::Int(i),
            None => Scalar::Float(f),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::String(_) => "string",
        }
    }
}

/// Returns the integer an integral, in-range float stands for.
fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Scalar::Int(i), Scalar::Float(f)) | (Scalar::Float(f), Scalar::Int(i)) => {
                integral(*f) == Some(*i)
            }
            (Scalar::String(a), Scalar::String(b)) => a == b,
            // Booleans never equal numbers: `true != 1`.
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Scalar::Null => 0u8.hash(state),
            Scalar::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Scalar::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Scalar::Float(f) => match integral(*f) {
                Some(i) => {
                    2u8.hash(state);
                    i.hash(state);
                }
                None => {
                    3u8.hash(state);
                    let bits = if f.is_nan() { f64::NAN.to_bits() } else { f.to_bits() };
                    bits.hash(state);
                }
            },
            Scalar::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// A node of a structured document.
///
/// # Examples
///
/// ```rust
/// use pmdcheck::value::{Role, Value};
/// let expected = Value::parse_yaml("{a: ~}", Role::Expected).unwrap();
/// let actual = Value::parse_yaml("{a: ~}", Role::Actual).unwrap();
/// assert_eq!(expected.type_name(), "mapping");
/// assert_ne!(expected, actual);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Absence marker: required to exist, content unconstrained.
    Any,
    Scalar(Scalar),
    Map(HashMap<Scalar, Value>),
    List(Vec<Value>),
    Set(HashSet<Scalar>),
}

/// Which side of a comparison a document is parsed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Expected,
    Actual,
}

/// Reasons a document cannot be turned into a [`Value`].
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Syntax(#[from] serde_yaml::Error),
    #[error("mapping keys must be scalars, found a {0}")]
    NonScalarKey(&'static str),
    #[error("set members must be scalars, found a {0}")]
    NonScalarMember(&'static str),
    #[error("`!set` applies to a mapping or a sequence, found a {0}")]
    MisplacedSetTag(&'static str),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Any => "absence marker",
            Value::Scalar(s) => s.type_name(),
            Value::Map(_) => "mapping",
            Value::List(_) => "sequence",
            Value::Set(_) => "set",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Parses YAML text and lowers it for the given role.
    ///
    /// Empty text is a null document. The core `!!set` tag is honored.
    pub fn parse_yaml(text: &str, role: Role) -> Result<Value, DocumentError> {
        let text = localize_set_tags(text);
        let yaml: serde_yaml::Value = serde_yaml::from_str(&text)?;
        Value::from_yaml(&yaml, role)
    }

    /// Lowers an already parsed YAML tree.
    pub fn from_yaml(yaml: &serde_yaml::Value, role: Role) -> Result<Value, DocumentError> {
        use serde_yaml::Value as Yaml;
        match yaml {
            Yaml::Null => Ok(match role {
                Role::Expected => Value::Any,
                Role::Actual => Value::Scalar(Scalar::Null),
            }),
            Yaml::Bool(_) | Yaml::Number(_) | Yaml::String(_) => {
                Ok(Value::Scalar(scalar_from_yaml(yaml)?))
            }
            Yaml::Sequence(items) => items
                .iter()
                .map(|item| Value::from_yaml(item, role))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Yaml::Mapping(mapping) => {
                let mut map = HashMap::new();
                for (key, value) in mapping {
                    map.insert(scalar_from_yaml(key)?, Value::from_yaml(value, role)?);
                }
                Ok(Value::Map(map))
            }
            Yaml::Tagged(tagged) => from_tagged(tagged, role),
        }
    }
}

fn from_tagged(tagged: &TaggedValue, role: Role) -> Result<Value, DocumentError> {
    use serde_yaml::Value as Yaml;
    match tag_name(&tagged.tag).as_str() {
        "any" if role == Role::Expected => Ok(Value::Any),
        "set" => {
            let members = match &tagged.value {
                Yaml::Mapping(mapping) => mapping
                    .keys()
                    .map(scalar_from_yaml)
                    .collect::<Result<HashSet<_>, _>>()?,
                Yaml::Sequence(items) => items
                    .iter()
                    .map(|item| {
                        scalar_from_yaml(item)
                            .map_err(|_| DocumentError::NonScalarMember(yaml_type_name(item)))
                    })
                    .collect::<Result<HashSet<_>, _>>()?,
                other => return Err(DocumentError::MisplacedSetTag(yaml_type_name(other))),
            };
            Ok(Value::Set(members))
        }
        _ => Value::from_yaml(&tagged.value, role),
    }
}

const CORE_SET_TAGS: [&str; 2] = ["!!set", "!<tag:yaml.org,2002:set>"];

/// Rewrites the core set tag to the local `!set` tag.
///
/// serde_yaml resolves core tags itself and drops `!!set`, leaving a plain
/// mapping; a local tag reaches [`from_tagged`] intact. Quoted scalars and
/// comments are left alone.
fn localize_set_tags(text: &str) -> Cow<'_, str> {
    if !CORE_SET_TAGS.iter().any(|tag| text.contains(tag)) {
        return Cow::Borrowed(text);
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut quote: Option<u8> = None;
    let mut comment = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let at_token_start = i == 0 || is_boundary(bytes[i - 1]);
        match (quote, comment) {
            (_, true) if b == b'\n' => comment = false,
            (_, true) => {}
            (Some(b'"'), _) if b == b'\\' => i += 1,
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, _) if !at_token_start => {}
            (None, _) if b == b'#' => comment = true,
            (None, _) if b == b'"' || b == b'\'' => quote = Some(b),
            (None, _) if b == b'!' => {
                let rest = &text[i..];
                if let Some(tag) = CORE_SET_TAGS.iter().find(|tag| rest.starts_with(**tag)) {
                    let end = i + tag.len();
                    if end == bytes.len() || is_tag_end(bytes[end]) {
                        out.push_str(&text[copied..i]);
                        out.push_str("!set");
                        copied = end;
                        i = end;
                        continue;
                    }
                }
            }
            (None, _) => {}
        }
        i += 1;
    }
    out.push_str(&text[copied..]);
    Cow::Owned(out)
}

fn is_boundary(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'[' | b'{' | b',' | b':' | b'-' | b'?')
}

fn is_tag_end(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'[' | b'{' | b',' | b']' | b'}')
}

/// Normalizes `!set`, `!!set` and `tag:yaml.org,2002:set` to `set`.
fn tag_name(tag: &Tag) -> String {
    let rendered = tag.to_string();
    let name = rendered.trim_start_matches('!');
    name.strip_prefix("tag:yaml.org,2002:")
        .unwrap_or(name)
        .to_string()
}

fn scalar_from_yaml(yaml: &serde_yaml::Value) -> Result<Scalar, DocumentError> {
    use serde_yaml::Value as Yaml;
    match yaml {
        Yaml::Null => Ok(Scalar::Null),
        Yaml::Bool(b) => Ok(Scalar::Bool(*b)),
        Yaml::Number(n) => Ok(match n.as_i64() {
            Some(i) => Scalar::Int(i),
            None => Scalar::float(n.as_f64().unwrap_or(f64::NAN)),
        }),
        Yaml::String(s) => Ok(Scalar::String(s.clone())),
        Yaml::Tagged(tagged) => scalar_from_yaml(&tagged.value),
        other => Err(DocumentError::NonScalarKey(yaml_type_name(other))),
    }
}

fn yaml_type_name(yaml: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value as Yaml;
    match yaml {
        Yaml::Null => "null",
        Yaml::Bool(_) => "bool",
        Yaml::Number(_) => "number",
        Yaml::String(_) => "string",
        Yaml::Sequence(_) => "sequence",
        Yaml::Mapping(_) => "mapping",
        Yaml::Tagged(_) => "tagged value",
    }
}

// ------------------------------------------------------------------------
// Display formatting helpers
// ------------------------------------------------------------------------

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Any => write!(f, "~"),
            Value::Scalar(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                let mut entries: Vec<_> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                entries.sort();
                write!(f, "{{{}}}", entries.join(", "))
            }
            Value::Set(set) => {
                let mut members: Vec<_> = set.iter().map(|m| m.to_string()).collect();
                members.sort();
                write!(f, "!set {{{}}}", members.join(", "))
            }
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}
