//! Resolved type descriptors.
//!
//! The backend consumes types only as already-resolved descriptors: a basic
//! type tag plus just enough structure to compute binary-layout signatures
//! for fields and call descriptors. The subtype lattice that produced these
//! descriptors is opaque here.

use std::fmt;

/// Basic type tag of a resolved descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// The nil type.
    Nil,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Immutable string.
    Str,
    /// Homogeneous list.
    List,
    /// String-keyed map.
    Map,
    /// Named record or object type.
    Named,
    /// The top type.
    Any,
}

/// A resolved type descriptor.
///
/// Carries the structure needed for layout signatures and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    /// The nil type.
    Nil,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Immutable string.
    Str,
    /// Homogeneous list of the element type.
    List(Box<TypeDesc>),
    /// String-keyed map of the value type.
    Map(Box<TypeDesc>),
    /// Named record or object type, referenced by its local name.
    Named(String),
    /// The top type.
    Any,
}

impl TypeDesc {
    /// The basic type tag of this descriptor.
    pub fn tag(&self) -> TypeTag {
        match self {
            TypeDesc::Nil => TypeTag::Nil,
            TypeDesc::Bool => TypeTag::Bool,
            TypeDesc::Int => TypeTag::Int,
            TypeDesc::Float => TypeTag::Float,
            TypeDesc::Str => TypeTag::Str,
            TypeDesc::List(_) => TypeTag::List,
            TypeDesc::Map(_) => TypeTag::Map,
            TypeDesc::Named(_) => TypeTag::Named,
            TypeDesc::Any => TypeTag::Any,
        }
    }

    /// The binary-layout signature of this type.
    ///
    /// One character per basic type; lists prefix their element with `[`,
    /// maps and named types are delimited so signatures never collide.
    pub fn signature(&self) -> String {
        match self {
            TypeDesc::Nil => "N".to_string(),
            TypeDesc::Bool => "B".to_string(),
            TypeDesc::Int => "I".to_string(),
            TypeDesc::Float => "F".to_string(),
            TypeDesc::Str => "S".to_string(),
            TypeDesc::List(elem) => format!("[{}", elem.signature()),
            TypeDesc::Map(val) => format!("M{};", val.signature()),
            TypeDesc::Named(name) => format!("L{name};"),
            TypeDesc::Any => "A".to_string(),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Compute the call descriptor for a function signature.
///
/// An optional receiver type is prepended to the parameter list, so a
/// type-attached function and a module-level function with the same
/// parameters get distinct descriptors.
pub fn method_descriptor(
    params: &[TypeDesc],
    ret: &TypeDesc,
    receiver: Option<&TypeDesc>,
) -> String {
    let mut desc = String::from("(");
    if let Some(recv) = receiver {
        desc.push_str(&recv.signature());
    }
    for param in params {
        desc.push_str(&param.signature());
    }
    desc.push(')');
    desc.push_str(&ret.signature());
    desc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures() {
        assert_eq!(TypeDesc::Int.signature(), "I");
        assert_eq!(TypeDesc::List(Box::new(TypeDesc::Str)).signature(), "[S");
        assert_eq!(TypeDesc::Map(Box::new(TypeDesc::Int)).signature(), "MI;");
        assert_eq!(TypeDesc::Named("Order".into()).signature(), "LOrder;");
    }

    #[test]
    fn descriptor_without_receiver() {
        let desc = method_descriptor(&[TypeDesc::Int, TypeDesc::Str], &TypeDesc::Bool, None);
        assert_eq!(desc, "(IS)B");
    }

    #[test]
    fn descriptor_with_receiver() {
        let recv = TypeDesc::Named("Counter".into());
        let desc = method_descriptor(&[TypeDesc::Int], &TypeDesc::Nil, Some(&recv));
        assert_eq!(desc, "(LCounter;I)N");
    }

    #[test]
    fn nested_signatures_do_not_collide() {
        let a = TypeDesc::List(Box::new(TypeDesc::Map(Box::new(TypeDesc::Int))));
        let b = TypeDesc::Map(Box::new(TypeDesc::List(Box::new(TypeDesc::Int))));
        assert_ne!(a.signature(), b.signature());
    }
}
