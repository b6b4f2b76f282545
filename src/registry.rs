use crate::any_value::{AnyValue, TypeInfo};
use crate::mapper::ErasedMapper;
use crate::MapError;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// An ordered (source, destination) type combination
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypePair {
    pub source: TypeId,
    pub destination: TypeId,
}

impl TypePair {
    pub fn of<S: 'static, D: 'static>() -> Self {
        Self {
            source: TypeId::of::<S>(),
            destination: TypeId::of::<D>(),
        }
    }

    fn between(source: TypeInfo, destination: TypeInfo) -> Self {
        Self {
            source: source.id(),
            destination: destination.id(),
        }
    }
}

/// A thread-safe collection of mappers for many type pairs
///
/// `MapperRegistry` stores each mapper behind the [`ErasedMapper`] trait so
/// mappers for unrelated type pairs live in one map, and picks the right one
/// for a call from the runtime types involved.
///
/// # Examples
///
/// ```
/// use sovran_mapper::{AnyValue, MapError, MapperRegistry, Property, Reflect, TypeInfo, TypeMapper};
///
/// #[derive(Default)]
/// struct Point { x: i32, y: i32 }
///
/// #[derive(Default)]
/// struct PointDto { x: i32, y: i32 }
///
/// impl Reflect for Point {
///     fn properties() -> Vec<Property<Self>> {
///         vec![
///             Property::new("x", |p: &Point| p.x, |p: &mut Point, v| p.x = v),
///             Property::new("y", |p: &Point| p.y, |p: &mut Point, v| p.y = v),
///         ]
///     }
/// }
///
/// impl Reflect for PointDto {
///     fn properties() -> Vec<Property<Self>> {
///         vec![
///             Property::new("x", |p: &PointDto| p.x, |p: &mut PointDto, v| p.x = v),
///             Property::new("y", |p: &PointDto| p.y, |p: &mut PointDto, v| p.y = v),
///         ]
///     }
/// }
///
/// let registry = MapperRegistry::new();
/// registry.register(TypeMapper::<Point, PointDto>::default())?;
///
/// // Typed dispatch
/// let dto: PointDto = registry.map(Point { x: 1, y: 2 })?;
/// assert_eq!((dto.x, dto.y), (1, 2));
///
/// // Erased dispatch, e.g. from a value whose type is only known at runtime
/// let out = registry.map_erased(&AnyValue::new(Point { x: 3, y: 4 }), TypeInfo::of::<PointDto>())?;
/// assert_eq!(out.downcast_ref::<PointDto>().map(|p| p.y), Some(4));
/// # Ok::<(), MapError>(())
/// ```
#[derive(Clone, Default)]
pub struct MapperRegistry {
    mappers: Arc<Mutex<HashMap<TypePair, Arc<dyn ErasedMapper>>>>,
}

impl MapperRegistry {
    /// Creates a new, empty MapperRegistry
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a mapper under its type pair, replacing any earlier one
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn register<M>(&self, mapper: M) -> Result<(), MapError>
    where
        M: ErasedMapper + 'static,
    {
        let source = mapper.source_type();
        let destination = mapper.destination_type();
        let mut store = self.mappers.lock().map_err(|_| MapError::LockError)?;
        store.insert(TypePair::between(source, destination), Arc::new(mapper));
        tracing::debug!(
            source = source.name(),
            destination = destination.name(),
            "mapper registry: registered"
        );
        Ok(())
    }

    /// Map an erased value to the requested destination type
    ///
    /// The mapper is chosen from the runtime type held by `source`. It runs
    /// outside the registry lock, so mappers may call back into the registry.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::LockError` if the internal lock cannot be acquired
    /// - Returns `MapError::NoMapper` if no mapper handles the type pair
    /// - Returns any error raised by the mapper itself
    pub fn map_erased(&self, source: &AnyValue, destination: TypeInfo) -> Result<AnyValue, MapError> {
        let mapper = self.lookup(source.type_info(), destination)?;
        mapper.map_erased(source)
    }

    /// Map `source` to a `D` through the registered `S -> D` mapper
    ///
    /// # Errors
    ///
    /// Same as [`map_erased`](Self::map_erased).
    pub fn map<S, D>(&self, source: S) -> Result<D, MapError>
    where
        S: Send + Sync + 'static,
        D: 'static,
    {
        self.map_erased(&AnyValue::new(source), TypeInfo::of::<D>())?
            .downcast::<D>()
    }

    /// Removes the mapper for `S -> D`
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` if a mapper was present and removed, `Ok(false)` if not present.
    pub fn remove<S: 'static, D: 'static>(&self) -> Result<bool, MapError> {
        let mut store = self.mappers.lock().map_err(|_| MapError::LockError)?;
        Ok(store.remove(&TypePair::of::<S, D>()).is_some())
    }

    /// Returns true if a mapper for `S -> D` is registered
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn contains<S: 'static, D: 'static>(&self) -> Result<bool, MapError> {
        let store = self.mappers.lock().map_err(|_| MapError::LockError)?;
        Ok(store.contains_key(&TypePair::of::<S, D>()))
    }

    /// Returns the number of registered mappers
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn len(&self) -> Result<usize, MapError> {
        let store = self.mappers.lock().map_err(|_| MapError::LockError)?;
        Ok(store.len())
    }

    /// Returns true if no mappers are registered
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn is_empty(&self) -> Result<bool, MapError> {
        let store = self.mappers.lock().map_err(|_| MapError::LockError)?;
        Ok(store.is_empty())
    }

    /// Returns the (source, destination) types of every registered mapper
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn pairs(&self) -> Result<Vec<(TypeInfo, TypeInfo)>, MapError> {
        let store = self.mappers.lock().map_err(|_| MapError::LockError)?;
        Ok(store
            .values()
            .map(|mapper| (mapper.source_type(), mapper.destination_type()))
            .collect())
    }

    fn lookup(&self, source: TypeInfo, destination: TypeInfo) -> Result<Arc<dyn ErasedMapper>, MapError> {
        let store = self.mappers.lock().map_err(|_| MapError::LockError)?;
        store
            .get(&TypePair::between(source, destination))
            .cloned()
            .ok_or_else(|| MapError::NoMapper {
                source: source.name(),
                destination: destination.name(),
            })
    }
}

impl fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut list = f.debug_list();
        if let Ok(store) = self.mappers.lock() {
            for mapper in store.values() {
                list.entry(&format_args!(
                    "{} -> {}",
                    mapper.source_type(),
                    mapper.destination_type()
                ));
            }
        }
        list.finish()
    }
}
