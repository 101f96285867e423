//! The primitive value kinds that `<data>` datatypes map onto

use num_bigint::BigInt;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Float,
    String,
}

const INTEGER_TYPES: &[&str] = &[
    "integer",
    "int",
    "long",
    "short",
    "byte",
    "nonNegativeInteger",
    "nonPositiveInteger",
    "positiveInteger",
    "negativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
];

const FLOAT_TYPES: &[&str] = &["float", "double", "decimal"];

const STRING_TYPES: &[&str] = &[
    "string",
    "token",
    "normalizedString",
    "anyURI",
    "boolean",
    "language",
    "Name",
    "NCName",
    "QName",
    "ID",
    "IDREF",
    "IDREFS",
    "NMTOKEN",
    "NMTOKENS",
    "ENTITY",
    "ENTITIES",
    "date",
    "dateTime",
    "time",
    "duration",
    "gYear",
    "gYearMonth",
    "gMonth",
    "gMonthDay",
    "gDay",
    "hexBinary",
    "base64Binary",
];

impl Primitive {
    /// Maps a `<data type="...">` name onto a primitive kind.  `None` for names outside the
    /// built-in and XML Schema libraries.
    pub fn from_type_name(name: &str) -> Option<Primitive> {
        let name = name.trim();
        if INTEGER_TYPES.contains(&name) {
            Some(Primitive::Int)
        } else if FLOAT_TYPES.contains(&name) {
            Some(Primitive::Float)
        } else if STRING_TYPES.contains(&name) {
            Some(Primitive::String)
        } else {
            None
        }
    }

    /// The canonical form of `value` if it is acceptable for this kind
    pub fn coerce(self, value: &str) -> Option<String> {
        match self {
            Primitive::Int => {
                let v = value.trim();
                BigInt::from_str(v).ok().map(|_| v.to_string())
            }
            Primitive::Float => {
                let v = value.trim();
                v.parse::<f64>().ok().map(|_| v.to_string())
            }
            Primitive::String => Some(value.to_string()),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Primitive::Int => "integer",
            Primitive::Float => "float",
            Primitive::String => "string",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(Primitive::from_type_name("integer"), Some(Primitive::Int));
        assert_eq!(
            Primitive::from_type_name("nonNegativeInteger"),
            Some(Primitive::Int)
        );
        assert_eq!(Primitive::from_type_name("decimal"), Some(Primitive::Float));
        assert_eq!(Primitive::from_type_name("double"), Some(Primitive::Float));
        assert_eq!(Primitive::from_type_name("token"), Some(Primitive::String));
        assert_eq!(Primitive::from_type_name("frobnicate"), None);
    }

    #[test]
    fn coercion() {
        assert_eq!(Primitive::Int.coerce(" 42 "), Some("42".to_string()));
        assert_eq!(
            Primitive::Int.coerce("123456789012345678901234567890"),
            Some("123456789012345678901234567890".to_string())
        );
        assert_eq!(Primitive::Int.coerce("4.2"), None);
        assert_eq!(Primitive::Float.coerce("1e-3"), Some("1e-3".to_string()));
        assert_eq!(Primitive::Float.coerce("abc"), None);
        assert_eq!(Primitive::String.coerce(" x "), Some(" x ".to_string()));
    }
}
