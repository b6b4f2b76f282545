use crate::member::{find_property, fold_name, Property};
use indexmap::{IndexMap, IndexSet};

/// How a destination member is populated by a compiled plan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Matched by name against a source member
    Auto,
    /// Populated by an explicit `map_member`/`map_function` registration
    Custom,
    /// Never assigned
    Ignored,
}

/// Describes one member of a compiled plan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberBinding {
    /// Destination member name (source member name for ignored entries)
    pub name: String,
    pub kind: BindingKind,
    /// Source member name or computed-value label, when one is bound
    pub source: Option<String>,
}

/// Why a member name is in the ignored set
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IgnoreReason {
    /// Registered through `ignore`; also suppresses custom mappings
    Explicit,
    /// No writable destination member matched the source member
    NoWritableMatch,
    /// The mapping service could not bridge the member types
    Unbridgeable,
}

/// A binding produced while resolving members, holding borrowed accessors
pub(crate) struct Binding<'a, T, TN> {
    pub(crate) name: &'a str,
    pub(crate) kind: BindingKind,
    pub(crate) source: Option<&'a Property<T>>,
    pub(crate) dest: Option<&'a Property<TN>>,
}

impl<'a, T, TN> Binding<'a, T, TN> {
    fn ignored(name: &'a str) -> Self {
        Binding {
            name,
            kind: BindingKind::Ignored,
            source: None,
            dest: None,
        }
    }
}

/// Pair each readable source member with a writable destination member of
/// the same name.
///
/// Members already in `ignored` or claimed in `custom` are passed over.
/// Members without a writable match are added to `ignored` so later compiles
/// skip them without another lookup. `ignored` and `custom` hold folded names.
pub(crate) fn resolve_members<'a, T, TN>(
    source: &'a [Property<T>],
    dest: &'a [Property<TN>],
    ignored: &mut IndexMap<String, IgnoreReason>,
    custom: &IndexSet<String>,
) -> Vec<Binding<'a, T, TN>> {
    let mut bindings = Vec::with_capacity(source.len());

    for prop in source.iter().filter(|prop| prop.is_readable()) {
        let key = fold_name(prop.name());
        if custom.contains(&key) {
            continue;
        }
        if ignored.contains_key(&key) {
            bindings.push(Binding::ignored(prop.name()));
            continue;
        }

        match find_property(dest, prop.name()) {
            Some(target) if target.is_writable() => bindings.push(Binding {
                name: target.name(),
                kind: BindingKind::Auto,
                source: Some(prop),
                dest: Some(target),
            }),
            target => {
                tracing::trace!(
                    member = prop.name(),
                    read_only = target.is_some(),
                    "resolver: no writable destination member, ignoring"
                );
                ignored.insert(key, IgnoreReason::NoWritableMatch);
                bindings.push(Binding::ignored(prop.name()));
            }
        }
    }

    bindings
}
