//! Immutable typed value trees.
//!
//! Variants are shared by reference count (`Arc<Variant>`) on both sides of
//! the bridge, so converting one never copies the tree.

use std::fmt;

use crate::ConversionError;

/// An immutable typed value.
///
/// Each variant has a type signature string: `b`, `i`, `x`, `u`, `t`, `d`,
/// `s` for the scalars, `a<elem>` for homogeneous arrays and `(...)` for
/// tuples.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Double(f64),
    Str(String),
    /// Homogeneous array with an explicit element signature, so that empty
    /// arrays still carry their type.
    Array {
        element: String,
        items: Vec<Variant>,
    },
    Tuple(Vec<Variant>),
}

impl Variant {
    /// Build an array, checking every item against the element signature.
    pub fn array(element: impl Into<String>, items: Vec<Variant>) -> Result<Self, ConversionError> {
        let element = element.into();
        if let Some(bad) = items.iter().find(|item| item.type_string() != element) {
            return Err(ConversionError::mismatch(
                format!("variant '{element}'"),
                format!("variant '{}'", bad.type_string()),
            ));
        }
        Ok(Variant::Array { element, items })
    }

    /// The type signature of this value.
    pub fn type_string(&self) -> String {
        match self {
            Variant::Bool(_) => "b".to_string(),
            Variant::Int32(_) => "i".to_string(),
            Variant::Int64(_) => "x".to_string(),
            Variant::UInt32(_) => "u".to_string(),
            Variant::UInt64(_) => "t".to_string(),
            Variant::Double(_) => "d".to_string(),
            Variant::Str(_) => "s".to_string(),
            Variant::Array { element, .. } => format!("a{element}"),
            Variant::Tuple(items) => {
                let inner: String = items.iter().map(Variant::type_string).collect();
                format!("({inner})")
            }
        }
    }

    /// Whether this is a container (array or tuple).
    pub fn is_container(&self) -> bool {
        matches!(self, Variant::Array { .. } | Variant::Tuple(_))
    }

    /// Number of children of a container, zero for scalars.
    pub fn n_children(&self) -> usize {
        match self {
            Variant::Array { items, .. } | Variant::Tuple(items) => items.len(),
            _ => 0,
        }
    }

    /// Child of a container by index.
    pub fn child(&self, index: usize) -> Option<&Variant> {
        match self {
            Variant::Array { items, .. } | Variant::Tuple(items) => items.get(index),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Bool(v) => write!(f, "{v}"),
            Variant::Int32(v) => write!(f, "{v}"),
            Variant::Int64(v) => write!(f, "int64 {v}"),
            Variant::UInt32(v) => write!(f, "uint32 {v}"),
            Variant::UInt64(v) => write!(f, "uint64 {v}"),
            Variant::Double(v) => write!(f, "{v:?}"),
            Variant::Str(v) => write!(f, "'{v}'"),
            Variant::Array { element, items } => {
                if items.is_empty() {
                    return write!(f, "@a{element} []");
                }
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Variant::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_signatures() {
        assert_eq!(Variant::Bool(true).type_string(), "b");
        assert_eq!(Variant::Int64(1).type_string(), "x");
        assert_eq!(Variant::Str("a".into()).type_string(), "s");
    }

    #[test]
    fn container_signatures() {
        let tuple = Variant::Tuple(vec![Variant::Int32(1), Variant::Str("x".into())]);
        assert_eq!(tuple.type_string(), "(is)");

        let array = Variant::array("(is)", vec![tuple.clone(), tuple]).unwrap();
        assert_eq!(array.type_string(), "a(is)");
        assert_eq!(array.n_children(), 2);
        assert!(array.is_container());
    }

    #[test]
    fn array_rejects_mixed_items() {
        let err = Variant::array("i", vec![Variant::Int32(1), Variant::Bool(false)]).unwrap_err();
        assert!(matches!(err, ConversionError::TypeMismatch { .. }));
    }

    #[test]
    fn display_text_form() {
        let tuple = Variant::Tuple(vec![Variant::Int32(5)]);
        assert_eq!(tuple.to_string(), "(5,)");
        let empty = Variant::array("s", vec![]).unwrap();
        assert_eq!(empty.to_string(), "@as []");
        assert_eq!(Variant::Int64(3).to_string(), "int64 3");
    }

    #[test]
    fn child_access() {
        let tuple = Variant::Tuple(vec![Variant::Bool(true), Variant::Double(1.5)]);
        assert_eq!(tuple.child(1), Some(&Variant::Double(1.5)));
        assert_eq!(tuple.child(2), None);
        assert_eq!(Variant::Bool(true).child(0), None);
    }
}
