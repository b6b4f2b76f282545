use crate::any_value::{AnyValue, TypeInfo};
use crate::mapper::TypeMapper;
use crate::member::{MemberInfo, Reflect};
use crate::MapError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Turns a source value into a value the destination member accepts
pub type Converter = Arc<dyn Fn(AnyValue) -> Result<AnyValue, MapError> + Send + Sync>;

/// Resolves how individual member assignments are carried out
///
/// A [`TypeMapper`] consults its service while registering custom mappings
/// and while compiling auto-mapped members. The returned [`Converter`] is
/// folded into the assignment operation, so a service is only ever asked
/// about a member once per compile.
///
/// Compilation calls the service while the mapper's state lock is held.
/// Implementations must not call back into the mapper that is consulting
/// them (`compile`, `is_compiled`, `plan`, any registration method); doing so
/// deadlocks.
pub trait MappingService: Send + Sync {
    /// Resolve assigning `source` into the destination member `dest`.
    ///
    /// Used for auto-mapped members and for `map_member`. Same-type members
    /// and nested/complex conversions both come through here.
    fn resolve_member(&self, dest: &MemberInfo, source: &MemberInfo) -> Result<Converter, MapError>;

    /// Resolve assigning a computed value whose type differs from `dest`.
    fn resolve_different_type_member(
        &self,
        computed: &MemberInfo,
        dest: &MemberInfo,
    ) -> Result<Converter, MapError>;
}

/// A [`MappingService`] backed by registered conversions
///
/// Same-type members pass through unchanged. Other type pairs need a
/// conversion registered with [`register`](Self::register) or a nested
/// mapper registered with [`register_mapper`](Self::register_mapper).
///
/// ```
/// use sovran_mapper::{ConversionTable, MapError};
///
/// let table = ConversionTable::new();
/// table.register(|cents: &i64| *cents as f64 / 100.0)?;
/// assert!(table.contains::<i64, f64>()?);
/// assert!(!table.contains::<f64, i64>()?);
/// # Ok::<(), MapError>(())
/// ```
#[derive(Clone, Default)]
pub struct ConversionTable {
    converters: Arc<Mutex<HashMap<(TypeId, TypeId), Converter>>>,
}

impl ConversionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversion from `S` to `D`, replacing any earlier one
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn register<S, D, F>(&self, convert: F) -> Result<(), MapError>
    where
        S: Any + Send + Sync,
        D: Any + Send + Sync,
        F: Fn(&S) -> D + Send + Sync + 'static,
    {
        let converter: Converter = Arc::new(move |value: AnyValue| -> Result<AnyValue, MapError> {
            let source = value
                .downcast_ref::<S>()
                .ok_or_else(|| MapError::TypeMismatch {
                    expected: std::any::type_name::<S>(),
                    found: value.type_info().name(),
                })?;
            Ok(AnyValue::new(convert(source)))
        });
        self.insert(TypeInfo::of::<S>(), TypeInfo::of::<D>(), converter)
    }

    /// Bridge `S` to `D` members through another mapper
    ///
    /// The table holds the mapper weakly; once every handle to it is dropped,
    /// conversions through it fail with `MapError::MapperDropped`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn register_mapper<S, D>(&self, mapper: &TypeMapper<S, D>) -> Result<(), MapError>
    where
        S: Reflect,
        D: Reflect + Default,
    {
        let erased = mapper.weak_erased();
        let converter: Converter = Arc::new(move |value: AnyValue| erased(&value));
        self.insert(TypeInfo::of::<S>(), TypeInfo::of::<D>(), converter)
    }

    /// Returns true if a conversion from `S` to `D` is available
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn contains<S: 'static, D: 'static>(&self) -> Result<bool, MapError> {
        if TypeId::of::<S>() == TypeId::of::<D>() {
            return Ok(true);
        }
        let converters = self.converters.lock().map_err(|_| MapError::LockError)?;
        Ok(converters.contains_key(&(TypeId::of::<S>(), TypeId::of::<D>())))
    }

    fn insert(&self, from: TypeInfo, to: TypeInfo, converter: Converter) -> Result<(), MapError> {
        let mut converters = self.converters.lock().map_err(|_| MapError::LockError)?;
        converters.insert((from.id(), to.id()), converter);
        tracing::debug!(from = from.name(), to = to.name(), "conversion table: registered");
        Ok(())
    }

    fn bridge(&self, member: &str, from: TypeInfo, to: TypeInfo) -> Result<Converter, MapError> {
        if from == to {
            return Ok(Arc::new(Ok));
        }
        let converters = self.converters.lock().map_err(|_| MapError::LockError)?;
        converters
            .get(&(from.id(), to.id()))
            .cloned()
            .ok_or_else(|| MapError::Unbridgeable {
                member: member.to_string(),
                from: from.name(),
                to: to.name(),
            })
    }
}

impl MappingService for ConversionTable {
    fn resolve_member(&self, dest: &MemberInfo, source: &MemberInfo) -> Result<Converter, MapError> {
        self.bridge(&dest.name, source.value_type, dest.value_type)
    }

    fn resolve_different_type_member(
        &self,
        computed: &MemberInfo,
        dest: &MemberInfo,
    ) -> Result<Converter, MapError> {
        self.bridge(&dest.name, computed.value_type, dest.value_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info<T: 'static>(name: &str) -> MemberInfo {
        MemberInfo {
            name: name.to_string(),
            value_type: TypeInfo::of::<T>(),
        }
    }

    #[test]
    fn test_same_type_is_identity() -> Result<(), MapError> {
        let table = ConversionTable::new();
        let convert = table.resolve_member(&info::<String>("name"), &info::<String>("Name"))?;
        let value = convert(AnyValue::new("ada".to_string()))?;
        assert_eq!(value.downcast::<String>()?, "ada");
        Ok(())
    }

    #[test]
    fn test_registered_conversion() -> Result<(), MapError> {
        let table = ConversionTable::new();
        table.register(|age: &u32| age.to_string())?;

        let convert = table.resolve_different_type_member(&info::<u32>("age"), &info::<String>("label"))?;
        let value = convert(AnyValue::new(42u32))?;
        assert_eq!(value.downcast::<String>()?, "42");

        // A converter handed the wrong input reports it instead of panicking.
        let wrong = convert(AnyValue::new(42u64));
        assert!(matches!(wrong, Err(MapError::TypeMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_unbridgeable() {
        let table = ConversionTable::new();
        let result = table.resolve_member(&info::<u32>("age"), &info::<String>("age"));
        match result {
            Err(MapError::Unbridgeable { member, from, to }) => {
                assert_eq!(member, "age");
                assert_eq!(from, "alloc::string::String");
                assert_eq!(to, "u32");
            }
            _ => panic!("expected an unbridgeable error"),
        }
    }

    #[test]
    fn test_clones_share_conversions() -> Result<(), MapError> {
        let table = ConversionTable::new();
        let shared = table.clone();
        shared.register(|flag: &bool| u8::from(*flag))?;
        assert!(table.contains::<bool, u8>()?);
        Ok(())
    }
}
