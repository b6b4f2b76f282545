use std::fmt;

/// Errors that can occur when configuring or invoking a mapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// Failed to acquire an internal lock
    LockError,
    /// A selector did not name a member of the given type
    UnknownMember { type_name: &'static str, member: String },
    /// A source member was used as a value but has no getter
    NotReadable { type_name: &'static str, member: String },
    /// A destination member was targeted but has no setter
    NotWritable { type_name: &'static str, member: String },
    /// The mapping service cannot turn a value of `from` into `to`
    Unbridgeable {
        member: String,
        from: &'static str,
        to: &'static str,
    },
    /// An erased value did not hold the expected type
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// No mapper is registered for the requested type pair
    NoMapper {
        source: &'static str,
        destination: &'static str,
    },
    /// A nested mapper referenced by a conversion has been dropped
    MapperDropped {
        source: &'static str,
        destination: &'static str,
    },
}

impl MapError {
    /// Returns true for errors raised while registering a mapping, as opposed
    /// to errors raised while invoking one.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            MapError::UnknownMember { .. }
                | MapError::NotReadable { .. }
                | MapError::NotWritable { .. }
                | MapError::Unbridgeable { .. }
        )
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MapError::LockError => write!(f, "Failed to acquire lock"),
            MapError::UnknownMember { type_name, member } => {
                write!(f, "`{}` has no member named `{}`", type_name, member)
            }
            MapError::NotReadable { type_name, member } => {
                write!(f, "Member `{}::{}` is not readable", type_name, member)
            }
            MapError::NotWritable { type_name, member } => {
                write!(f, "Member `{}::{}` is not writable", type_name, member)
            }
            MapError::Unbridgeable { member, from, to } => write!(
                f,
                "Cannot map `{}` into member `{}` of type `{}`",
                from, member, to
            ),
            MapError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected `{}`, found `{}`", expected, found)
            }
            MapError::NoMapper {
                source,
                destination,
            } => write!(f, "No mapper registered for `{}` -> `{}`", source, destination),
            MapError::MapperDropped {
                source,
                destination,
            } => write!(f, "Mapper for `{}` -> `{}` was dropped", source, destination),
        }
    }
}

impl std::error::Error for MapError {}
