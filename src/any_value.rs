use crate::MapError;
use std::any::{Any, TypeId};
use std::fmt;

/// Identity of a type at runtime: its `TypeId` plus a printable name
#[derive(Clone, Copy, Debug)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Describe `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A type-erased value that remembers what it was
///
/// This is the untyped representation passed across the erased mapping
/// boundary and through [`Converter`](crate::Converter)s.
///
/// ```
/// use sovran_mapper::AnyValue;
///
/// let value = AnyValue::new(42u32);
/// assert!(value.is_type::<u32>());
/// assert_eq!(value.downcast_ref::<u32>(), Some(&42));
/// assert!(value.downcast::<String>().is_err());
/// ```
pub struct AnyValue {
    type_info: TypeInfo,
    value: Box<dyn Any + Send + Sync>,
}

impl AnyValue {
    /// Create a new AnyValue from a value of any type that implements Any, Send, and Sync
    pub fn new<T: 'static + Any + Send + Sync>(value: T) -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            value: Box::new(value),
        }
    }

    /// The type of the contained value
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// Check if the contained value is of type T
    pub fn is_type<T: 'static>(&self) -> bool {
        self.type_info.id() == TypeId::of::<T>()
    }

    /// Get a reference to the contained value if it is of type T
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Get a mutable reference to the contained value if it is of type T
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut::<T>()
    }

    /// Take the contained value out as a `T`
    ///
    /// # Errors
    ///
    /// Returns `MapError::TypeMismatch` if the value is not a `T`.
    pub fn downcast<T: 'static>(self) -> Result<T, MapError> {
        let found = self.type_info.name();
        self.value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| MapError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found,
            })
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AnyValue")
            .field("type", &self.type_info.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_checks() {
        let mut value = AnyValue::new("hello".to_string());
        assert!(value.is_type::<String>());
        assert!(!value.is_type::<&str>());
        assert_eq!(value.type_info(), TypeInfo::of::<String>());

        if let Some(text) = value.downcast_mut::<String>() {
            text.push_str(", world");
        }
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello, world"));
        assert!(value.downcast_ref::<i32>().is_none());
    }

    #[test]
    fn test_downcast_mismatch() {
        let value = AnyValue::new(7i64);
        match value.downcast::<i32>() {
            Err(MapError::TypeMismatch { expected, found }) => {
                assert_eq!(expected, "i32");
                assert_eq!(found, "i64");
            }
            other => panic!("expected a type mismatch, got {:?}", other),
        }
    }
}
