use sovran_mapper::{
    AnyValue, ConversionTable, MapError, MapperRegistry, Property, Reflect, TypeInfo, TypeMapper,
};
use std::sync::Arc;

// Domain model
#[derive(Debug, Clone, Default)]
struct Profile {
    handle: String,
    display_name: String,
    followers: u64,
    joined_year: u16,
}

// What the API hands out
#[derive(Debug, Default)]
struct ProfileCard {
    handle: String,
    display_name: String,
    followers: String,
    tenure: String,
    rendered_by: String,
}

impl Reflect for Profile {
    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::new("handle", |p: &Profile| p.handle.clone(), |p: &mut Profile, v| p.handle = v),
            Property::new("DisplayName", |p: &Profile| p.display_name.clone(), |p: &mut Profile, v| {
                p.display_name = v
            }),
            Property::new("followers", |p: &Profile| p.followers, |p: &mut Profile, v| p.followers = v),
            Property::new("joined_year", |p: &Profile| p.joined_year, |p: &mut Profile, v| {
                p.joined_year = v
            }),
        ]
    }
}

impl Reflect for ProfileCard {
    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::new("handle", |c: &ProfileCard| c.handle.clone(), |c: &mut ProfileCard, v| c.handle = v),
            Property::new("displayname", |c: &ProfileCard| c.display_name.clone(), |c: &mut ProfileCard, v| {
                c.display_name = v
            }),
            Property::new("followers", |c: &ProfileCard| c.followers.clone(), |c: &mut ProfileCard, v| {
                c.followers = v
            }),
            Property::new("tenure", |c: &ProfileCard| c.tenure.clone(), |c: &mut ProfileCard, v| c.tenure = v),
            Property::read_only("rendered_by", |c: &ProfileCard| c.rendered_by.clone()),
        ]
    }
}

fn main() -> Result<(), MapError> {
    // u64 follower counts become display strings wherever they appear
    let table = Arc::new(ConversionTable::new());
    table.register(|count: &u64| match *count {
        n if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        n if n >= 1_000 => format!("{:.1}k", n as f64 / 1_000.0),
        n => n.to_string(),
    })?;

    let mapper = TypeMapper::<Profile, ProfileCard>::new(table);
    mapper.map_function("tenure", |p: &Profile| format!("since {}", p.joined_year))?;
    mapper.instantiate(|_| ProfileCard {
        rendered_by: "profile-demo".to_string(),
        ..Default::default()
    })?;
    mapper.after_map(|src: &Profile, card: &mut ProfileCard| {
        if card.display_name.is_empty() {
            card.display_name = src.handle.clone();
        }
    })?;

    println!("Plan:");
    for binding in mapper.plan()? {
        println!("  {:<12} {:?} <- {:?}", binding.name, binding.kind, binding.source);
    }

    let profile = Profile {
        handle: "@ferris".to_string(),
        display_name: String::new(),
        followers: 48_200,
        joined_year: 2015,
    };
    let card = mapper.map(&profile)?;
    println!("Typed: {:?}", card);

    // The same mapper, reached through a registry without naming its types
    let registry = MapperRegistry::new();
    registry.register(mapper.clone())?;

    let erased = registry.map_erased(&AnyValue::new(profile), TypeInfo::of::<ProfileCard>())?;
    match erased.downcast::<ProfileCard>() {
        Ok(card) => println!("Erased: {:?}", card),
        Err(e) => println!("Unexpected output: {}", e),
    }

    match registry.map_erased(&AnyValue::new(42u8), TypeInfo::of::<ProfileCard>()) {
        Ok(_) => println!("This shouldn't happen"),
        Err(MapError::NoMapper { source, .. }) => println!("No mapper for {}", source),
        Err(e) => println!("Unexpected error: {}", e),
    }

    println!("Compiled {} time(s)", mapper.compile_count());
    Ok(())
}
