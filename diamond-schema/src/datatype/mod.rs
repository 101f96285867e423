mod primitive;

pub use primitive::Primitive;

use std::fmt;

/// Length constraint on a `<list>` datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListLength {
    Exactly(usize),
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl ListLength {
    fn accepts(self, n: usize) -> bool {
        match self {
            ListLength::Exactly(len) => n == len,
            ListLength::Optional => n <= 1,
            ListLength::ZeroOrMore => true,
            ListLength::OneOrMore => n >= 1,
        }
    }
}

impl fmt::Display for ListLength {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ListLength::Exactly(n) => write!(f, "{}", n),
            ListLength::Optional => f.write_str("?"),
            ListLength::ZeroOrMore => f.write_str("*"),
            ListLength::OneOrMore => f.write_str("+"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datatype {
    /// No text content is allowed
    None,
    /// Exactly one literal value is allowed; it is preset and can't be edited
    Fixed(String),
    Primitive(Primitive),
    Enumeration(Vec<String>),
    /// One of the literal `values`, or anything `fallback` accepts
    Mixed {
        values: Vec<String>,
        fallback: Box<Datatype>,
    },
    List {
        item: Primitive,
        length: ListLength,
    },
}

impl Datatype {
    /// True for datatypes whose value can be set by the user
    pub fn is_settable(&self) -> bool {
        !matches!(self, Datatype::None | Datatype::Fixed(_))
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Datatype::None => f.write_str("none"),
            Datatype::Fixed(v) => write!(f, "fixed {:?}", v),
            Datatype::Primitive(p) => write!(f, "{}", p),
            Datatype::Enumeration(values) => write!(f, "one of {:?}", values),
            Datatype::Mixed { values, fallback } => {
                write!(f, "one of {:?} or {}", values, fallback)
            }
            Datatype::List { item, length } => write!(f, "list of {} ({})", item, length),
        }
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum DatatypeError {
    #[error("values of datatype {0} can't be set")]
    NotSettable(Datatype),
}

/// Checks `value` against `datatype`, returning whether it is acceptable together with its
/// canonical form.  A rejected value is returned unchanged.
pub fn valid_data(datatype: &Datatype, value: &str) -> Result<(bool, String), DatatypeError> {
    let canonical = match datatype {
        Datatype::None | Datatype::Fixed(_) => {
            return Err(DatatypeError::NotSettable(datatype.clone()))
        }
        Datatype::Enumeration(values) => values.iter().find(|v| *v == value).cloned(),
        Datatype::Mixed { values, fallback } => {
            if values.iter().any(|v| v == value) {
                Some(value.to_string())
            } else {
                return valid_data(fallback, value);
            }
        }
        Datatype::Primitive(p) => p.coerce(value),
        Datatype::List { item, length } => {
            let items = value
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>();
            if length.accepts(items.len()) {
                items
                    .iter()
                    .map(|i| item.coerce(i))
                    .collect::<Option<Vec<_>>>()
                    .map(|items| items.join(" "))
            } else {
                None
            }
        }
    };
    Ok(match canonical {
        Some(c) => (true, c),
        None => (false, value.to_string()),
    })
}
