use crate::member::{fold_name, Reflect, Setter, SourceExpr};
use crate::resolve::{resolve_members, BindingKind, IgnoreReason, MemberBinding};
use crate::service::{Converter, MappingService};
use crate::MapError;
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::sync::Arc;

pub(crate) type AssignFn<T, TN> = Arc<dyn Fn(&T, &mut TN) -> Result<(), MapError> + Send + Sync>;
pub(crate) type Hook<T, TN> = Arc<dyn Fn(&T, &mut TN) + Send + Sync>;
pub(crate) type Constructor<T, TN> = Arc<dyn Fn(&T) -> TN + Send + Sync>;

/// A registered override for one destination member
pub(crate) struct CustomMember<T, TN> {
    pub(crate) dest: &'static str,
    pub(crate) source: String,
    pub(crate) op: AssignFn<T, TN>,
}

/// Everything a mapper has been told, keyed by folded destination name
pub(crate) struct MapConfig<T, TN> {
    pub(crate) ignored: IndexMap<String, IgnoreReason>,
    pub(crate) custom: IndexMap<String, CustomMember<T, TN>>,
    pub(crate) before: Option<Hook<T, TN>>,
    pub(crate) after: Option<Hook<T, TN>>,
    pub(crate) constructor: Option<Constructor<T, TN>>,
}

impl<T, TN> Default for MapConfig<T, TN> {
    fn default() -> Self {
        Self {
            ignored: IndexMap::new(),
            custom: IndexMap::new(),
            before: None,
            after: None,
            constructor: None,
        }
    }
}

/// Build the operation that reads `source`, converts it, and stores it
pub(crate) fn assign_op<T, TN>(
    source: SourceExpr<T>,
    convert: Option<Converter>,
    set: Setter<TN>,
) -> AssignFn<T, TN>
where
    T: 'static,
    TN: 'static,
{
    Arc::new(move |src: &T, dest: &mut TN| -> Result<(), MapError> {
        let value = source.evaluate(src);
        let value = match &convert {
            Some(convert) => convert(value)?,
            None => value,
        };
        set(dest, value)
    })
}

/// A compiled mapping from `T` to `TN`
///
/// Holds destination construction, the before hook, the ordered member
/// assignments, and the after hook. Obtained from
/// [`TypeMapper::compile`](crate::TypeMapper::compile).
pub struct MapPlan<T, TN> {
    constructor: Option<Constructor<T, TN>>,
    before: Option<Hook<T, TN>>,
    assignments: Vec<AssignFn<T, TN>>,
    after: Option<Hook<T, TN>>,
    bindings: Vec<MemberBinding>,
}

impl<T, TN: Default> MapPlan<T, TN> {
    /// Run the plan
    ///
    /// A supplied destination is updated in place; otherwise one is built
    /// with the configured constructor, or `TN::default()`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a member assignment.
    pub fn map_to(&self, source: &T, dest: Option<TN>) -> Result<TN, MapError> {
        let mut dest = match dest {
            Some(dest) => dest,
            None => match &self.constructor {
                Some(construct) => construct(source),
                None => TN::default(),
            },
        };

        if let Some(before) = &self.before {
            before(source, &mut dest);
        }
        for assign in &self.assignments {
            assign(source, &mut dest)?;
        }
        if let Some(after) = &self.after {
            after(source, &mut dest);
        }

        Ok(dest)
    }
}

impl<T, TN> MapPlan<T, TN> {
    /// Members in the order the plan handles them
    ///
    /// Auto bindings come first in source declaration order, then custom
    /// bindings in registration order. Ignored members are listed without
    /// an assignment.
    pub fn bindings(&self) -> &[MemberBinding] {
        &self.bindings
    }

    /// Number of member assignments the plan performs
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}

impl<T, TN> fmt::Debug for MapPlan<T, TN> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MapPlan")
            .field("source", &std::any::type_name::<T>())
            .field("destination", &std::any::type_name::<TN>())
            .field("custom_constructor", &self.constructor.is_some())
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// Assemble a plan from the current configuration
///
/// Auto members the service cannot bridge are dropped and remembered in
/// `config.ignored`, the same way unmatched members are.
pub(crate) fn build_plan<T, TN>(config: &mut MapConfig<T, TN>, service: &dyn MappingService) -> MapPlan<T, TN>
where
    T: Reflect,
    TN: Reflect,
{
    let source_props = T::properties();
    let dest_props = TN::properties();
    let custom_keys: IndexSet<String> = config.custom.keys().cloned().collect();

    let resolved = resolve_members(&source_props, &dest_props, &mut config.ignored, &custom_keys);

    let mut assignments = Vec::with_capacity(resolved.len() + config.custom.len());
    let mut bindings = Vec::with_capacity(resolved.len() + config.custom.len());

    for binding in resolved {
        let (source, dest) = match (binding.kind, binding.source, binding.dest) {
            (BindingKind::Auto, Some(source), Some(dest)) => (source, dest),
            _ => {
                bindings.push(MemberBinding {
                    name: binding.name.to_string(),
                    kind: BindingKind::Ignored,
                    source: None,
                });
                continue;
            }
        };
        let (Some(expr), Some(set)) = (SourceExpr::from_property(source), dest.setter()) else {
            continue;
        };

        match service.resolve_member(&dest.info(), &source.info()) {
            Ok(convert) => {
                assignments.push(assign_op(expr, Some(convert), Arc::clone(set)));
                bindings.push(MemberBinding {
                    name: dest.name().to_string(),
                    kind: BindingKind::Auto,
                    source: Some(source.name().to_string()),
                });
            }
            Err(err) => {
                tracing::trace!(member = dest.name(), error = %err, "plan: auto member not bridged, ignoring");
                config
                    .ignored
                    .insert(fold_name(source.name()), IgnoreReason::Unbridgeable);
                bindings.push(MemberBinding {
                    name: source.name().to_string(),
                    kind: BindingKind::Ignored,
                    source: None,
                });
            }
        }
    }

    for (key, custom) in &config.custom {
        if config.ignored.get(key) == Some(&IgnoreReason::Explicit) {
            bindings.push(MemberBinding {
                name: custom.dest.to_string(),
                kind: BindingKind::Ignored,
                source: None,
            });
            continue;
        }
        assignments.push(Arc::clone(&custom.op));
        bindings.push(MemberBinding {
            name: custom.dest.to_string(),
            kind: BindingKind::Custom,
            source: Some(custom.source.clone()),
        });
    }

    MapPlan {
        constructor: config.constructor.clone(),
        before: config.before.clone(),
        assignments,
        after: config.after.clone(),
        bindings,
    }
}
