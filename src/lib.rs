//! # sovran-mapper
//!
//! A per-type-pair object mapper with cached, type-erasable mapping plans.
//!
//! `sovran-mapper` copies and derives field values from a source type `T` into
//! a destination type `TN`. Members are matched by name automatically, and
//! explicit configuration (remapping, computed values, ignored members,
//! custom construction, before/after hooks) layers on top. The first call
//! compiles everything into a single [`MapPlan`] that every later call reuses,
//! so member lookup happens once per mapper instead of once per value.
//!
//! ## Key Features
//!
//! - **Name-based auto mapping**: readable source members flow into writable
//!   destination members with the same (case-insensitive) name
//! - **Explicit overrides win**: `map_member`/`map_function` always replace
//!   auto mapping for a member; `ignore` switches a member off entirely
//! - **Compiled once**: the plan is built at most once per mapper, even when
//!   threads race on first use
//! - **Type erasure**: every mapper also works behind [`AnyValue`] so a
//!   [`MapperRegistry`] can dispatch across unrelated type pairs
//! - **Pluggable conversions**: a [`MappingService`] decides how values cross
//!   between differing member types; [`ConversionTable`] is the stock one
//!
//! ## Usage Examples
//!
//! ### Describing Types
//!
//! Types take part in mapping by implementing [`Reflect`], listing their
//! public members in declaration order.
//!
//! ```rust
//! use sovran_mapper::{Property, Reflect};
//!
//! #[derive(Clone, Default)]
//! pub struct Person {
//!     pub name: String,
//!     pub age: u32,
//! }
//!
//! #[derive(Debug, Default)]
//! pub struct PersonDto {
//!     pub name: String,
//!     pub age: u32,
//!     pub nickname: String,
//!     pub id: u64,
//! }
//!
//! impl Reflect for Person {
//!     fn properties() -> Vec<Property<Self>> {
//!         vec![
//!             Property::new("Name", |p: &Person| p.name.clone(), |p: &mut Person, v| p.name = v),
//!             Property::new("Age", |p: &Person| p.age, |p: &mut Person, v| p.age = v),
//!         ]
//!     }
//! }
//!
//! impl Reflect for PersonDto {
//!     fn properties() -> Vec<Property<Self>> {
//!         vec![
//!             Property::new("name", |d: &PersonDto| d.name.clone(), |d: &mut PersonDto, v| d.name = v),
//!             Property::new("age", |d: &PersonDto| d.age, |d: &mut PersonDto, v| d.age = v),
//!             Property::new("nickname", |d: &PersonDto| d.nickname.clone(), |d: &mut PersonDto, v| d.nickname = v),
//!             Property::read_only("id", |d: &PersonDto| d.id),
//!         ]
//!     }
//! }
//! ```
//!
//! ### Basic Usage
//!
//! ```rust
//! # use sovran_mapper::{Property, Reflect};
//! # #[derive(Clone, Default)]
//! # pub struct Person { pub name: String, pub age: u32 }
//! # #[derive(Debug, Default)]
//! # pub struct PersonDto { pub name: String, pub age: u32, pub nickname: String }
//! # impl Reflect for Person {
//! #     fn properties() -> Vec<Property<Self>> {
//! #         vec![
//! #             Property::new("Name", |p: &Person| p.name.clone(), |p: &mut Person, v| p.name = v),
//! #             Property::new("Age", |p: &Person| p.age, |p: &mut Person, v| p.age = v),
//! #         ]
//! #     }
//! # }
//! # impl Reflect for PersonDto {
//! #     fn properties() -> Vec<Property<Self>> {
//! #         vec![
//! #             Property::new("name", |d: &PersonDto| d.name.clone(), |d: &mut PersonDto, v| d.name = v),
//! #             Property::new("age", |d: &PersonDto| d.age, |d: &mut PersonDto, v| d.age = v),
//! #             Property::new("nickname", |d: &PersonDto| d.nickname.clone(), |d: &mut PersonDto, v| d.nickname = v),
//! #         ]
//! #     }
//! # }
//! use sovran_mapper::{MapError, TypeMapper};
//!
//! fn main() -> Result<(), MapError> {
//!     let mapper = TypeMapper::<Person, PersonDto>::default();
//!
//!     // Nickname has no counterpart on Person, so give it one
//!     mapper.map_member("nickname", "name")?;
//!
//!     // Computed values work too
//!     mapper.map_function("age", |p: &Person| p.age + 1)?;
//!
//!     let person = Person { name: "Ada".to_string(), age: 36 };
//!     let dto = mapper.map(&person)?;
//!
//!     assert_eq!(dto.name, "Ada");
//!     assert_eq!(dto.nickname, "Ada");
//!     assert_eq!(dto.age, 37);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Hooks, Construction and Updating in Place
//!
//! ```rust
//! # use sovran_mapper::{Property, Reflect};
//! # #[derive(Clone, Default)]
//! # pub struct Person { pub name: String, pub age: u32 }
//! # #[derive(Debug, Default)]
//! # pub struct PersonDto { pub name: String, pub age: u32, pub nickname: String }
//! # impl Reflect for Person {
//! #     fn properties() -> Vec<Property<Self>> {
//! #         vec![
//! #             Property::new("Name", |p: &Person| p.name.clone(), |p: &mut Person, v| p.name = v),
//! #             Property::new("Age", |p: &Person| p.age, |p: &mut Person, v| p.age = v),
//! #         ]
//! #     }
//! # }
//! # impl Reflect for PersonDto {
//! #     fn properties() -> Vec<Property<Self>> {
//! #         vec![
//! #             Property::new("name", |d: &PersonDto| d.name.clone(), |d: &mut PersonDto, v| d.name = v),
//! #             Property::new("age", |d: &PersonDto| d.age, |d: &mut PersonDto, v| d.age = v),
//! #             Property::new("nickname", |d: &PersonDto| d.nickname.clone(), |d: &mut PersonDto, v| d.nickname = v),
//! #         ]
//! #     }
//! # }
//! use sovran_mapper::{MapError, TypeMapper};
//!
//! let mapper = TypeMapper::<Person, PersonDto>::default();
//! mapper.instantiate(|p: &Person| PersonDto {
//!     nickname: format!("{}-san", p.name),
//!     ..Default::default()
//! })?;
//! mapper.after_map(|_src: &Person, dest: &mut PersonDto| dest.name.make_ascii_uppercase())?;
//!
//! let person = Person { name: "Ada".to_string(), age: 36 };
//!
//! // Fresh destination: the constructor runs
//! let fresh = mapper.map(&person)?;
//! assert_eq!(fresh.nickname, "Ada-san");
//! assert_eq!(fresh.name, "ADA");
//!
//! // Supplied destination: updated in place, the constructor is skipped
//! let existing = PersonDto { nickname: "kept".to_string(), ..Default::default() };
//! let updated = mapper.map_to(&person, Some(existing))?;
//! assert_eq!(updated.nickname, "kept");
//! assert_eq!(updated.age, 36);
//! # Ok::<(), MapError>(())
//! ```
//!
//! ### Error Handling
//!
//! Registration errors surface immediately; erased calls report a type
//! mismatch without disturbing the compiled plan.
//!
//! ```rust
//! # use sovran_mapper::{Property, Reflect};
//! # #[derive(Clone, Default)]
//! # pub struct Person { pub name: String, pub age: u32 }
//! # #[derive(Debug, Default)]
//! # pub struct PersonDto { pub name: String, pub id: u64 }
//! # impl Reflect for Person {
//! #     fn properties() -> Vec<Property<Self>> {
//! #         vec![
//! #             Property::new("Name", |p: &Person| p.name.clone(), |p: &mut Person, v| p.name = v),
//! #             Property::new("Age", |p: &Person| p.age, |p: &mut Person, v| p.age = v),
//! #         ]
//! #     }
//! # }
//! # impl Reflect for PersonDto {
//! #     fn properties() -> Vec<Property<Self>> {
//! #         vec![
//! #             Property::new("name", |d: &PersonDto| d.name.clone(), |d: &mut PersonDto, v| d.name = v),
//! #             Property::read_only("id", |d: &PersonDto| d.id),
//! #         ]
//! #     }
//! # }
//! use sovran_mapper::{AnyValue, MapError, TypeMapper};
//!
//! let mapper = TypeMapper::<Person, PersonDto>::default();
//!
//! match mapper.map_member("id", "age") {
//!     Err(MapError::NotWritable { member, .. }) => println!("{} is read-only", member),
//!     Err(e) => println!("Other error: {}", e),
//!     Ok(()) => println!("Mapped"),
//! }
//!
//! let erased = mapper.as_erased();
//! match erased(&AnyValue::new(42i32)) {
//!     Ok(_) => println!("Mapped"),
//!     Err(MapError::TypeMismatch { expected, found }) => {
//!         println!("Wanted {}, got {}", expected, found)
//!     }
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```

mod any_value;
mod error;
mod mapper;
mod member;
mod plan;
mod registry;
mod resolve;
mod service;

pub use any_value::{AnyValue, TypeInfo};
pub use error::MapError;
pub use mapper::{ErasedMapFn, ErasedMapper, TypeMapper};
pub use member::{MemberInfo, Property, Reflect, SourceExpr};
pub use plan::MapPlan;
pub use registry::{MapperRegistry, TypePair};
pub use resolve::{BindingKind, MemberBinding};
pub use service::{ConversionTable, Converter, MappingService};
