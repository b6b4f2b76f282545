use crate::any_value::{AnyValue, TypeInfo};
use crate::MapError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub(crate) type Getter<T> = Arc<dyn Fn(&T) -> AnyValue + Send + Sync>;
pub(crate) type Setter<T> = Arc<dyn Fn(&mut T, AnyValue) -> Result<(), MapError> + Send + Sync>;

/// A type that can describe its public members at runtime
///
/// Implementations list members in declaration order; that order is the
/// order in which auto-mapped members are assigned. Members of embedded
/// structs can be lifted onto the outer type with [`Property::through`].
///
/// ```
/// use sovran_mapper::{Property, Reflect};
///
/// #[derive(Default)]
/// struct Person {
///     name: String,
///     age: u32,
/// }
///
/// impl Reflect for Person {
///     fn properties() -> Vec<Property<Self>> {
///         vec![
///             Property::new("name", |p: &Person| p.name.clone(), |p: &mut Person, v| p.name = v),
///             Property::new("age", |p: &Person| p.age, |p: &mut Person, v| p.age = v),
///         ]
///     }
/// }
///
/// assert_eq!(Person::properties().len(), 2);
/// ```
pub trait Reflect: Sized + Send + Sync + 'static {
    fn properties() -> Vec<Property<Self>>;
}

/// Name and value type of one side of an assignment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: String,
    pub value_type: TypeInfo,
}

/// Runtime descriptor for one public member of `T`
///
/// A property is readable when it has a getter and writable when it has a
/// setter.
pub struct Property<T> {
    name: &'static str,
    value_type: TypeInfo,
    getter: Option<Getter<T>>,
    setter: Option<Setter<T>>,
}

impl<T: 'static> Property<T> {
    /// A readable and writable member
    pub fn new<V, G, S>(name: &'static str, get: G, set: S) -> Self
    where
        V: Any + Send + Sync,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self {
            name,
            value_type: TypeInfo::of::<V>(),
            getter: Some(erase_getter(get)),
            setter: Some(erase_setter(set)),
        }
    }

    /// A member with a getter only
    pub fn read_only<V, G>(name: &'static str, get: G) -> Self
    where
        V: Any + Send + Sync,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        Self {
            name,
            value_type: TypeInfo::of::<V>(),
            getter: Some(erase_getter(get)),
            setter: None,
        }
    }

    /// A member with a setter only
    pub fn write_only<V, S>(name: &'static str, set: S) -> Self
    where
        V: Any + Send + Sync,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self {
            name,
            value_type: TypeInfo::of::<V>(),
            getter: None,
            setter: Some(erase_setter(set)),
        }
    }

    /// Lift this member of an embedded `T` onto the containing type `U`
    ///
    /// ```
    /// use sovran_mapper::{Property, Reflect};
    ///
    /// #[derive(Default)]
    /// struct Entity { id: u64 }
    ///
    /// #[derive(Default)]
    /// struct User { base: Entity, login: String }
    ///
    /// impl Reflect for Entity {
    ///     fn properties() -> Vec<Property<Self>> {
    ///         vec![Property::new("id", |e: &Entity| e.id, |e: &mut Entity, v| e.id = v)]
    ///     }
    /// }
    ///
    /// impl Reflect for User {
    ///     fn properties() -> Vec<Property<Self>> {
    ///         let mut props: Vec<Property<Self>> = Entity::properties()
    ///             .into_iter()
    ///             .map(|p| p.through(|u: &User| &u.base, |u: &mut User| &mut u.base))
    ///             .collect();
    ///         props.push(Property::new("login", |u: &User| u.login.clone(), |u: &mut User, v| u.login = v));
    ///         props
    ///     }
    /// }
    ///
    /// assert_eq!(User::properties()[0].name(), "id");
    /// ```
    pub fn through<U, R, W>(self, outer: R, outer_mut: W) -> Property<U>
    where
        U: 'static,
        R: Fn(&U) -> &T + Send + Sync + 'static,
        W: Fn(&mut U) -> &mut T + Send + Sync + 'static,
    {
        let getter = self.getter.map(|get| -> Getter<U> {
            Arc::new(move |owner: &U| get(outer(owner)))
        });
        let setter = self.setter.map(|set| -> Setter<U> {
            Arc::new(move |owner: &mut U, value| set(outer_mut(owner), value))
        });
        Property {
            name: self.name,
            value_type: self.value_type,
            getter,
            setter,
        }
    }
}

impl<T> Property<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value_type(&self) -> TypeInfo {
        self.value_type
    }

    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn info(&self) -> MemberInfo {
        MemberInfo {
            name: self.name.to_string(),
            value_type: self.value_type,
        }
    }

    pub(crate) fn getter(&self) -> Option<&Getter<T>> {
        self.getter.as_ref()
    }

    pub(crate) fn setter(&self) -> Option<&Setter<T>> {
        self.setter.as_ref()
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            value_type: self.value_type,
            getter: self.getter.clone(),
            setter: self.setter.clone(),
        }
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value_type", &self.value_type.name())
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

fn erase_getter<T, V, G>(get: G) -> Getter<T>
where
    T: 'static,
    V: Any + Send + Sync,
    G: Fn(&T) -> V + Send + Sync + 'static,
{
    Arc::new(move |owner: &T| AnyValue::new(get(owner)))
}

fn erase_setter<T, V, S>(set: S) -> Setter<T>
where
    T: 'static,
    V: Any + Send + Sync,
    S: Fn(&mut T, V) + Send + Sync + 'static,
{
    Arc::new(move |owner: &mut T, value: AnyValue| -> Result<(), MapError> {
        set(owner, value.downcast::<V>()?);
        Ok(())
    })
}

/// The right-hand side of a custom member mapping
///
/// Either a readable member of the source type or a labelled closure over
/// the source value.
pub struct SourceExpr<T> {
    label: String,
    value_type: TypeInfo,
    eval: Getter<T>,
}

impl<T: Reflect> SourceExpr<T> {
    /// Read the source member called `name`
    ///
    /// # Errors
    ///
    /// - Returns `MapError::UnknownMember` if `T` has no such member
    /// - Returns `MapError::NotReadable` if the member has no getter
    pub fn member(name: &str) -> Result<Self, MapError> {
        let props = T::properties();
        let prop = find_property(&props, name).ok_or_else(|| MapError::UnknownMember {
            type_name: std::any::type_name::<T>(),
            member: name.to_string(),
        })?;
        Self::from_property(prop).ok_or_else(|| MapError::NotReadable {
            type_name: std::any::type_name::<T>(),
            member: prop.name().to_string(),
        })
    }
}

impl<T: 'static> SourceExpr<T> {
    /// Compute the value with a closure; `label` names it in plans and errors
    pub fn from_fn<V, F>(label: impl Into<String>, f: F) -> Self
    where
        V: Any + Send + Sync,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            value_type: TypeInfo::of::<V>(),
            eval: erase_getter(f),
        }
    }

    pub(crate) fn from_property(prop: &Property<T>) -> Option<Self> {
        prop.getter().map(|get| Self {
            label: prop.name().to_string(),
            value_type: prop.value_type(),
            eval: Arc::clone(get),
        })
    }
}

impl<T> SourceExpr<T> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value_type(&self) -> TypeInfo {
        self.value_type
    }

    pub fn info(&self) -> MemberInfo {
        MemberInfo {
            name: self.label.clone(),
            value_type: self.value_type,
        }
    }

    pub(crate) fn evaluate(&self, source: &T) -> AnyValue {
        (self.eval)(source)
    }
}

impl<T> Clone for SourceExpr<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            value_type: self.value_type,
            eval: Arc::clone(&self.eval),
        }
    }
}

impl<T> fmt::Debug for SourceExpr<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SourceExpr")
            .field("label", &self.label)
            .field("value_type", &self.value_type.name())
            .finish_non_exhaustive()
    }
}

/// Key used for case-insensitive member name comparison
///
/// Folds one character at a time, so a name folds the same way wherever it
/// appears. Matching and the ignored/custom keys must both go through here.
pub(crate) fn fold_name(name: &str) -> String {
    name.chars().flat_map(char::to_lowercase).collect()
}

pub(crate) fn same_name(a: &str, b: &str) -> bool {
    fold_name(a) == fold_name(b)
}

pub(crate) fn find_property<'a, T>(props: &'a [Property<T>], name: &str) -> Option<&'a Property<T>> {
    props.iter().find(|prop| same_name(prop.name(), name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Account {
        owner: String,
        balance: i64,
        id: u32,
    }

    impl Reflect for Account {
        fn properties() -> Vec<Property<Self>> {
            vec![
                Property::new("Owner", |a: &Account| a.owner.clone(), |a: &mut Account, v| {
                    a.owner = v
                }),
                Property::new("balance", |a: &Account| a.balance, |a: &mut Account, v| {
                    a.balance = v
                }),
                Property::read_only("id", |a: &Account| a.id),
            ]
        }
    }

    #[test]
    fn test_property_access() -> Result<(), MapError> {
        let props = Account::properties();
        let mut account = Account {
            owner: "ada".to_string(),
            balance: 10,
            id: 3,
        };

        let balance = find_property(&props, "BALANCE").expect("balance member");
        assert!(balance.is_readable() && balance.is_writable());
        assert_eq!(balance.value_type(), TypeInfo::of::<i64>());

        let read = balance.getter().expect("getter")(&account);
        assert_eq!(read.downcast_ref::<i64>(), Some(&10));

        balance.setter().expect("setter")(&mut account, AnyValue::new(25i64))?;
        assert_eq!(account.balance, 25);

        let id = find_property(&props, "id").expect("id member");
        assert!(id.is_readable());
        assert!(!id.is_writable());
        Ok(())
    }

    #[test]
    fn test_setter_rejects_wrong_type() {
        let props = Account::properties();
        let mut account = Account::default();
        let set = props[1].setter().expect("setter");
        let result = set(&mut account, AnyValue::new("ten".to_string()));
        assert!(matches!(result, Err(MapError::TypeMismatch { .. })));
        assert_eq!(account.balance, 0);
    }

    #[test]
    fn test_source_expr_member() -> Result<(), MapError> {
        let expr = SourceExpr::<Account>::member("owner")?;
        assert_eq!(expr.label(), "Owner");
        assert_eq!(expr.value_type(), TypeInfo::of::<String>());

        let account = Account {
            owner: "grace".to_string(),
            ..Default::default()
        };
        let value = expr.evaluate(&account).downcast::<String>()?;
        assert_eq!(value, "grace");

        let missing = SourceExpr::<Account>::member("nickname");
        assert!(matches!(missing, Err(MapError::UnknownMember { .. })));
        Ok(())
    }

    #[test]
    fn test_name_folding() {
        assert!(same_name("FirstName", "firstname"));
        assert!(!same_name("first_name", "firstname"));
        assert_eq!(fold_name("Owner"), "owner");

        // final sigma folds like any other sigma
        assert!(same_name("ΑΣ", "ασ"));
        assert_eq!(fold_name("ΑΣ"), fold_name("ασ"));
    }
}
