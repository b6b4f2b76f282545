use crate::any_value::{AnyValue, TypeInfo};
use crate::member::{fold_name, same_name, Property, Reflect, Setter, SourceExpr};
use crate::plan::{assign_op, build_plan, AssignFn, CustomMember, MapConfig, MapPlan};
use crate::resolve::{IgnoreReason, MemberBinding};
use crate::service::{ConversionTable, MappingService};
use crate::MapError;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

/// A mapping callable that works on erased values
///
/// The input must hold the mapper's source type; the output holds its
/// destination type.
pub type ErasedMapFn = Arc<dyn Fn(&AnyValue) -> Result<AnyValue, MapError> + Send + Sync>;

/// A mapper that can be invoked without knowing its type pair
///
/// Lets a registry keep mappers for unrelated type pairs in one collection.
pub trait ErasedMapper: Send + Sync {
    fn source_type(&self) -> TypeInfo;
    fn destination_type(&self) -> TypeInfo;

    /// Map an erased source value into a freshly built destination
    ///
    /// # Errors
    ///
    /// Returns `MapError::TypeMismatch` if `source` is not the mapper's
    /// source type.
    fn map_erased(&self, source: &AnyValue) -> Result<AnyValue, MapError>;
}

enum CompileState<T, TN> {
    Unconfigured,
    Compiled(Arc<MapPlan<T, TN>>),
}

struct MapperState<T, TN> {
    config: MapConfig<T, TN>,
    compiled: CompileState<T, TN>,
}

struct Shared<T, TN> {
    service: Arc<dyn MappingService>,
    state: Mutex<MapperState<T, TN>>,
    compilations: AtomicUsize,
}

impl<T: Reflect, TN: Reflect + Default> Shared<T, TN> {
    fn lock(&self) -> Result<MutexGuard<'_, MapperState<T, TN>>, MapError> {
        self.state.lock().map_err(|_| MapError::LockError)
    }

    fn compile(&self) -> Result<Arc<MapPlan<T, TN>>, MapError> {
        let mut state = self.lock()?;
        if let CompileState::Compiled(plan) = &state.compiled {
            return Ok(Arc::clone(plan));
        }
        Ok(self.rebuild(&mut state))
    }

    fn rebuild(&self, state: &mut MapperState<T, TN>) -> Arc<MapPlan<T, TN>> {
        let plan = Arc::new(build_plan(&mut state.config, self.service.as_ref()));
        let count = self.compilations.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            source = std::any::type_name::<T>(),
            destination = std::any::type_name::<TN>(),
            assignments = plan.assignment_count(),
            compilations = count,
            "type mapper: compiled plan"
        );
        state.compiled = CompileState::Compiled(Arc::clone(&plan));
        plan
    }

    fn map_erased(&self, source: &AnyValue) -> Result<AnyValue, MapError> {
        let typed = source
            .downcast_ref::<T>()
            .ok_or_else(|| MapError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: source.type_info().name(),
            })?;
        let plan = self.compile()?;
        Ok(AnyValue::new(plan.map_to(typed, None)?))
    }
}

/// Maps values of `T` onto values of `TN`
///
/// A `TypeMapper` collects configuration for one ordered type pair and
/// compiles it into a single [`MapPlan`] the first time it is used. Members
/// are matched by case-insensitive name unless they are ignored or claimed
/// by a custom mapping; custom mappings always win.
///
/// Handles are cheap to clone and share configuration, compile state and the
/// erased adapter. The plan is built at most once per mapper no matter how
/// many threads race on first use; [`force_recompile`](Self::force_recompile)
/// is the only way to rebuild it, so configuration changes made after the
/// first compile have no effect until then.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use sovran_mapper::{ConversionTable, MapError, Property, Reflect, TypeMapper};
///
/// #[derive(Default)]
/// struct User { name: String, age: u32 }
///
/// #[derive(Default, Debug)]
/// struct UserDto { name: String, age: u32, nickname: String }
///
/// impl Reflect for User {
///     fn properties() -> Vec<Property<Self>> {
///         vec![
///             Property::new("name", |u: &User| u.name.clone(), |u: &mut User, v| u.name = v),
///             Property::new("age", |u: &User| u.age, |u: &mut User, v| u.age = v),
///         ]
///     }
/// }
///
/// impl Reflect for UserDto {
///     fn properties() -> Vec<Property<Self>> {
///         vec![
///             Property::new("name", |d: &UserDto| d.name.clone(), |d: &mut UserDto, v| d.name = v),
///             Property::new("age", |d: &UserDto| d.age, |d: &mut UserDto, v| d.age = v),
///             Property::new("nickname", |d: &UserDto| d.nickname.clone(), |d: &mut UserDto, v| d.nickname = v),
///         ]
///     }
/// }
///
/// let mapper = TypeMapper::<User, UserDto>::new(Arc::new(ConversionTable::new()));
/// mapper.map_member("nickname", "name")?;
/// mapper.ignore("age")?;
///
/// let dto = mapper.map(&User { name: "Ada".to_string(), age: 36 })?;
/// assert_eq!(dto.name, "Ada");
/// assert_eq!(dto.nickname, "Ada");
/// assert_eq!(dto.age, 0);
/// # Ok::<(), MapError>(())
/// ```
pub struct TypeMapper<T, TN> {
    shared: Arc<Shared<T, TN>>,
    erased: Arc<OnceLock<ErasedMapFn>>,
}

impl<T, TN> Clone for TypeMapper<T, TN> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            erased: Arc::clone(&self.erased),
        }
    }
}

impl<T: Reflect, TN: Reflect + Default> TypeMapper<T, TN> {
    /// Creates an unconfigured mapper that resolves member assignments
    /// through `service`
    pub fn new(service: Arc<dyn MappingService>) -> Self {
        Self {
            shared: Arc::new(Shared {
                service,
                state: Mutex::new(MapperState {
                    config: MapConfig::default(),
                    compiled: CompileState::Unconfigured,
                }),
                compilations: AtomicUsize::new(0),
            }),
            erased: Arc::new(OnceLock::new()),
        }
    }

    /// The mapping service this mapper consults
    pub fn service(&self) -> Arc<dyn MappingService> {
        Arc::clone(&self.shared.service)
    }

    /// Never assign the destination member `dest`, automatically or through
    /// a custom mapping
    ///
    /// # Errors
    ///
    /// - Returns `MapError::UnknownMember` if `TN` has no member named `dest`
    /// - Returns `MapError::LockError` if the internal lock cannot be acquired
    pub fn ignore(&self, dest: &str) -> Result<(), MapError> {
        let member = dest_member::<TN>(dest)?;
        self.configure("ignore", |config| {
            config
                .ignored
                .insert(fold_name(member.name()), IgnoreReason::Explicit);
        })
    }

    /// Assign the source member `source` to the destination member `dest`
    ///
    /// The mapping service decides how the value crosses over, so members of
    /// different types work whenever the service can bridge them.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::UnknownMember` if either member does not exist
    /// - Returns `MapError::NotReadable` if the source member has no getter
    /// - Returns `MapError::NotWritable` if the destination member has no setter
    /// - Returns the service's error (usually `MapError::Unbridgeable`) if it
    ///   cannot resolve the assignment
    pub fn map_member(&self, dest: &str, source: &str) -> Result<(), MapError> {
        self.map_member_expr(dest, SourceExpr::member(source)?)
    }

    /// Assign an arbitrary source expression to the destination member `dest`
    ///
    /// # Errors
    ///
    /// Same as [`map_member`](Self::map_member), minus the source lookup.
    pub fn map_member_expr(&self, dest: &str, source: SourceExpr<T>) -> Result<(), MapError> {
        let (member, set) = writable_dest_member::<TN>(dest)?;
        let convert = self.shared.service.resolve_member(&member.info(), &source.info())?;
        self.insert_custom(member.name(), source.label().to_string(), assign_op(source, Some(convert), set))
    }

    /// Assign the value computed by `compute` to the destination member `dest`
    ///
    /// A value of the member's own type is stored directly; any other type is
    /// handed to the mapping service to bridge.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::UnknownMember` if `TN` has no member named `dest`
    /// - Returns `MapError::NotWritable` if the member has no setter
    /// - Returns the service's error if the value type differs from the
    ///   member type and the service cannot bridge it
    pub fn map_function<V, F>(&self, dest: &str, compute: F) -> Result<(), MapError>
    where
        V: Any + Send + Sync,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let (member, set) = writable_dest_member::<TN>(dest)?;
        let source = SourceExpr::from_fn(format!("fn -> {}", std::any::type_name::<V>()), compute);
        let convert = if source.value_type() == member.value_type() {
            None
        } else {
            Some(
                self.shared
                    .service
                    .resolve_different_type_member(&source.info(), &member.info())?,
            )
        };
        self.insert_custom(member.name(), source.label().to_string(), assign_op(source, convert, set))
    }

    /// Run `hook` on the new destination before any member is assigned
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn before_map<F>(&self, hook: F) -> Result<(), MapError>
    where
        F: Fn(&T, &mut TN) + Send + Sync + 'static,
    {
        self.configure("before_map", |config| config.before = Some(Arc::new(hook)))
    }

    /// Run `hook` after the last member assignment
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn after_map<F>(&self, hook: F) -> Result<(), MapError>
    where
        F: Fn(&T, &mut TN) + Send + Sync + 'static,
    {
        self.configure("after_map", |config| config.after = Some(Arc::new(hook)))
    }

    /// Build destinations with `constructor` instead of `TN::default()`
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn instantiate<F>(&self, constructor: F) -> Result<(), MapError>
    where
        F: Fn(&T) -> TN + Send + Sync + 'static,
    {
        self.configure("instantiate", |config| config.constructor = Some(Arc::new(constructor)))
    }

    /// Returns the compiled plan, building it if this is the first use
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn compile(&self) -> Result<Arc<MapPlan<T, TN>>, MapError> {
        self.shared.compile()
    }

    /// Rebuild the plan from the current configuration and replace the cached
    /// one
    ///
    /// Callers holding a plan from an earlier compile keep using it.
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn force_recompile(&self) -> Result<Arc<MapPlan<T, TN>>, MapError> {
        let mut state = self.shared.lock()?;
        tracing::debug!(
            source = std::any::type_name::<T>(),
            destination = std::any::type_name::<TN>(),
            "type mapper: forced recompile"
        );
        Ok(self.shared.rebuild(&mut state))
    }

    /// Returns true once a plan has been compiled
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn is_compiled(&self) -> Result<bool, MapError> {
        let state = self.shared.lock()?;
        Ok(matches!(state.compiled, CompileState::Compiled(_)))
    }

    /// How many times a plan has been built for this mapper
    pub fn compile_count(&self) -> usize {
        self.shared.compilations.load(Ordering::SeqCst)
    }

    /// The member bindings of the active plan, compiling it if needed
    ///
    /// # Errors
    ///
    /// Returns `MapError::LockError` if the internal lock cannot be acquired.
    pub fn plan(&self) -> Result<Vec<MemberBinding>, MapError> {
        Ok(self.compile()?.bindings().to_vec())
    }

    /// Map `source` onto `dest`, or onto a new destination when `dest` is
    /// `None`
    ///
    /// Compiles the plan on first use. A supplied destination takes
    /// precedence over the configured constructor.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::LockError` if the internal lock cannot be acquired
    /// - Returns any error raised by a member assignment
    pub fn map_to(&self, source: &T, dest: Option<TN>) -> Result<TN, MapError> {
        self.compile()?.map_to(source, dest)
    }

    /// Map `source` onto a new destination
    ///
    /// # Errors
    ///
    /// Same as [`map_to`](Self::map_to).
    pub fn map(&self, source: &T) -> Result<TN, MapError> {
        self.map_to(source, None)
    }

    /// The type-erased entry point for this mapper
    ///
    /// The callable is created once and shared by every clone of this
    /// mapper. Calling it compiles the plan if that has not happened yet.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use sovran_mapper::{AnyValue, MapError, Property, Reflect, TypeMapper};
    /// # #[derive(Default)]
    /// # struct Celsius { degrees: f64 }
    /// # #[derive(Default)]
    /// # struct Reading { degrees: f64 }
    /// # impl Reflect for Celsius {
    /// #     fn properties() -> Vec<Property<Self>> {
    /// #         vec![Property::new("degrees", |c: &Celsius| c.degrees, |c: &mut Celsius, v| c.degrees = v)]
    /// #     }
    /// # }
    /// # impl Reflect for Reading {
    /// #     fn properties() -> Vec<Property<Self>> {
    /// #         vec![Property::new("degrees", |r: &Reading| r.degrees, |r: &mut Reading, v| r.degrees = v)]
    /// #     }
    /// # }
    /// let mapper = TypeMapper::<Celsius, Reading>::default();
    /// let erased = mapper.as_erased();
    ///
    /// let out = erased(&AnyValue::new(Celsius { degrees: 21.5 }))?;
    /// assert_eq!(out.downcast_ref::<Reading>().map(|r| r.degrees), Some(21.5));
    ///
    /// let wrong = erased(&AnyValue::new(21.5f64));
    /// assert!(matches!(wrong, Err(MapError::TypeMismatch { .. })));
    /// # Ok::<(), MapError>(())
    /// ```
    pub fn as_erased(&self) -> ErasedMapFn {
        let erased = self.erased.get_or_init(|| {
            let shared = Arc::clone(&self.shared);
            let erased: ErasedMapFn = Arc::new(move |source: &AnyValue| shared.map_erased(source));
            erased
        });
        Arc::clone(erased)
    }

    /// An erased callable that does not keep this mapper alive
    pub(crate) fn weak_erased(&self) -> ErasedMapFn {
        let shared = Arc::downgrade(&self.shared);
        Arc::new(move |source: &AnyValue| -> Result<AnyValue, MapError> {
            Weak::upgrade(&shared)
                .ok_or_else(|| MapError::MapperDropped {
                    source: std::any::type_name::<T>(),
                    destination: std::any::type_name::<TN>(),
                })?
                .map_erased(source)
        })
    }

    fn configure<F>(&self, operation: &'static str, apply: F) -> Result<(), MapError>
    where
        F: FnOnce(&mut MapConfig<T, TN>),
    {
        let mut state = self.shared.lock()?;
        if matches!(state.compiled, CompileState::Compiled(_)) {
            tracing::warn!(
                operation,
                source = std::any::type_name::<T>(),
                destination = std::any::type_name::<TN>(),
                "type mapper: configured after compile; change applies on force_recompile"
            );
        }
        apply(&mut state.config);
        Ok(())
    }

    fn insert_custom(
        &self,
        dest: &'static str,
        source: String,
        op: AssignFn<T, TN>,
    ) -> Result<(), MapError> {
        tracing::debug!(dest, source = source.as_str(), "type mapper: custom member registered");
        self.configure("map_member", |config| {
            config
                .custom
                .insert(fold_name(dest), CustomMember { dest, source, op });
        })
    }
}

impl<T: Reflect, TN: Reflect + Default> Default for TypeMapper<T, TN> {
    /// A mapper backed by an empty [`ConversionTable`]
    fn default() -> Self {
        Self::new(Arc::new(ConversionTable::new()))
    }
}

impl<T: Reflect, TN: Reflect + Default> ErasedMapper for TypeMapper<T, TN> {
    fn source_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn destination_type(&self) -> TypeInfo {
        TypeInfo::of::<TN>()
    }

    fn map_erased(&self, source: &AnyValue) -> Result<AnyValue, MapError> {
        (self.as_erased())(source)
    }
}

impl<T, TN> fmt::Debug for TypeMapper<T, TN> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TypeMapper")
            .field("source", &std::any::type_name::<T>())
            .field("destination", &std::any::type_name::<TN>())
            .field("compilations", &self.shared.compilations.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn dest_member<TN: Reflect>(name: &str) -> Result<Property<TN>, MapError> {
    TN::properties()
        .into_iter()
        .find(|prop| same_name(prop.name(), name))
        .ok_or_else(|| MapError::UnknownMember {
            type_name: std::any::type_name::<TN>(),
            member: name.to_string(),
        })
}

fn writable_dest_member<TN: Reflect>(name: &str) -> Result<(Property<TN>, Setter<TN>), MapError> {
    let member = dest_member::<TN>(name)?;
    let set = member.setter().cloned().ok_or_else(|| MapError::NotWritable {
        type_name: std::any::type_name::<TN>(),
        member: member.name().to_string(),
    })?;
    Ok((member, set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BindingKind;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Invoice {
        number: u32,
        customer: String,
        amount_cents: i64,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct InvoiceRow {
        number: u32,
        customer: String,
        amount: f64,
    }

    impl Reflect for Invoice {
        fn properties() -> Vec<Property<Self>> {
            vec![
                Property::new("number", |i: &Invoice| i.number, |i: &mut Invoice, v| i.number = v),
                Property::new("customer", |i: &Invoice| i.customer.clone(), |i: &mut Invoice, v| {
                    i.customer = v
                }),
                Property::new("amount_cents", |i: &Invoice| i.amount_cents, |i: &mut Invoice, v| {
                    i.amount_cents = v
                }),
            ]
        }
    }

    impl Reflect for InvoiceRow {
        fn properties() -> Vec<Property<Self>> {
            vec![
                Property::new("number", |r: &InvoiceRow| r.number, |r: &mut InvoiceRow, v| r.number = v),
                Property::new("customer", |r: &InvoiceRow| r.customer.clone(), |r: &mut InvoiceRow, v| {
                    r.customer = v
                }),
                Property::new("amount", |r: &InvoiceRow| r.amount, |r: &mut InvoiceRow, v| r.amount = v),
            ]
        }
    }

    fn invoice() -> Invoice {
        Invoice {
            number: 17,
            customer: "Globex".to_string(),
            amount_cents: 4599,
        }
    }

    #[test]
    fn test_lazy_compile() -> Result<(), MapError> {
        let mapper = TypeMapper::<Invoice, InvoiceRow>::default();
        assert!(!mapper.is_compiled()?);
        assert_eq!(mapper.compile_count(), 0);

        mapper.map(&invoice())?;
        mapper.map(&invoice())?;
        assert!(mapper.is_compiled()?);
        assert_eq!(mapper.compile_count(), 1);

        let first = mapper.compile()?;
        let second = mapper.compile()?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(mapper.compile_count(), 1);
        Ok(())
    }

    #[test]
    fn test_map_function_same_type() -> Result<(), MapError> {
        let mapper = TypeMapper::<Invoice, InvoiceRow>::default();
        mapper.map_function("amount", |i: &Invoice| i.amount_cents as f64 / 100.0)?;

        let row = mapper.map(&invoice())?;
        assert_eq!(row.amount, 45.99);
        assert_eq!(row.customer, "Globex");
        Ok(())
    }

    #[test]
    fn test_map_function_bridged_through_service() -> Result<(), MapError> {
        let table = ConversionTable::new();
        table.register(|cents: &i64| *cents as f64 / 100.0)?;
        let mapper = TypeMapper::<Invoice, InvoiceRow>::new(Arc::new(table));

        mapper.map_function("amount", |i: &Invoice| i.amount_cents * 2)?;
        assert_eq!(mapper.map(&invoice())?.amount, 91.98);
        Ok(())
    }

    #[test]
    fn test_map_function_unbridgeable_is_rejected() {
        let mapper = TypeMapper::<Invoice, InvoiceRow>::default();
        let result = mapper.map_function("amount", |i: &Invoice| i.customer.clone());
        match result {
            Err(err) => assert!(err.is_configuration_error()),
            Ok(()) => panic!("a String cannot be stored in an f64 member"),
        }
    }

    #[test]
    fn test_selector_must_name_a_member() {
        let mapper = TypeMapper::<Invoice, InvoiceRow>::default();
        assert!(matches!(
            mapper.map_member("total", "amount_cents"),
            Err(MapError::UnknownMember { .. })
        ));
        assert!(matches!(mapper.ignore("total"), Err(MapError::UnknownMember { .. })));
        assert!(matches!(
            mapper.map_member("customer", "missing"),
            Err(MapError::UnknownMember { .. })
        ));
    }

    #[test]
    fn test_configuration_after_compile_needs_force() -> Result<(), MapError> {
        let mapper = TypeMapper::<Invoice, InvoiceRow>::default();
        let before = mapper.map(&invoice())?;
        assert_eq!(before.customer, "Globex");

        mapper.ignore("customer")?;
        assert_eq!(mapper.map(&invoice())?.customer, "Globex");

        mapper.force_recompile()?;
        assert_eq!(mapper.map(&invoice())?.customer, "");
        assert_eq!(mapper.compile_count(), 2);
        Ok(())
    }

    #[test]
    fn test_ignore_suppresses_custom_mapping() -> Result<(), MapError> {
        let mapper = TypeMapper::<Invoice, InvoiceRow>::default();
        mapper.map_function("customer", |i: &Invoice| i.customer.to_uppercase())?;
        mapper.ignore("customer")?;

        let plan = mapper.plan()?;
        let customer = plan
            .iter()
            .find(|binding| binding.name == "customer")
            .map(|binding| binding.kind);
        assert_eq!(customer, Some(BindingKind::Ignored));
        assert_eq!(mapper.map(&invoice())?.customer, "");
        Ok(())
    }

    #[test]
    fn test_erased_adapter_is_cached_and_lazy() -> Result<(), MapError> {
        let mapper = TypeMapper::<Invoice, InvoiceRow>::default();
        let first = mapper.as_erased();
        let second = mapper.clone().as_erased();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!mapper.is_compiled()?);

        let out = first(&AnyValue::new(invoice()))?;
        assert!(mapper.is_compiled()?);
        assert_eq!(out.downcast::<InvoiceRow>()?.number, 17);
        Ok(())
    }

    #[test]
    fn test_erased_mismatch_keeps_plan() -> Result<(), MapError> {
        let mapper = TypeMapper::<Invoice, InvoiceRow>::default();
        mapper.compile()?;

        let result = mapper.map_erased(&AnyValue::new("not an invoice".to_string()));
        match result {
            Err(MapError::TypeMismatch { expected, found }) => {
                assert!(expected.ends_with("Invoice"));
                assert_eq!(found, "alloc::string::String");
            }
            other => panic!("expected a type mismatch, got {:?}", other),
        }

        assert_eq!(mapper.map_erased(&AnyValue::new(invoice()))?.downcast::<InvoiceRow>()?.number, 17);
        assert_eq!(mapper.compile_count(), 1);
        Ok(())
    }

    #[test]
    fn test_weak_erased_reports_dropped_mapper() {
        let mapper = TypeMapper::<Invoice, InvoiceRow>::default();
        let weak = mapper.weak_erased();
        drop(mapper);
        assert!(matches!(
            weak(&AnyValue::new(invoice())),
            Err(MapError::MapperDropped { .. })
        ));
    }
}
