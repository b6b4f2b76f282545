use sovran_mapper::{AnyValue, ErasedMapper, MapError, MapperRegistry, Property, Reflect, TypeInfo, TypeMapper};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Default, PartialEq)]
struct Celsius {
    degrees: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Fahrenheit {
    degrees: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Label {
    text: String,
}

impl Reflect for Celsius {
    fn properties() -> Vec<Property<Self>> {
        vec![Property::new("degrees", |c: &Celsius| c.degrees, |c: &mut Celsius, v| c.degrees = v)]
    }
}

impl Reflect for Fahrenheit {
    fn properties() -> Vec<Property<Self>> {
        vec![Property::new("degrees", |f: &Fahrenheit| f.degrees, |f: &mut Fahrenheit, v| {
            f.degrees = v
        })]
    }
}

impl Reflect for Label {
    fn properties() -> Vec<Property<Self>> {
        vec![Property::new("text", |l: &Label| l.text.clone(), |l: &mut Label, v| l.text = v)]
    }
}

fn registry() -> Result<MapperRegistry, MapError> {
    let registry = MapperRegistry::new();

    let to_fahrenheit = TypeMapper::<Celsius, Fahrenheit>::default();
    to_fahrenheit.map_function("degrees", |c: &Celsius| c.degrees * 9.0 / 5.0 + 32.0)?;
    registry.register(to_fahrenheit)?;

    let to_label = TypeMapper::<Celsius, Label>::default();
    to_label.map_function("text", |c: &Celsius| format!("{:.1}°C", c.degrees))?;
    registry.register(to_label)?;

    Ok(registry)
}

#[test]
fn test_dispatch_by_type_pair() -> Result<(), MapError> {
    let registry = registry()?;
    assert_eq!(registry.len()?, 2);
    assert!(registry.contains::<Celsius, Fahrenheit>()?);
    assert!(!registry.contains::<Fahrenheit, Celsius>()?);

    let hot: Fahrenheit = registry.map(Celsius { degrees: 100.0 })?;
    assert_eq!(hot.degrees, 212.0);

    let label: Label = registry.map(Celsius { degrees: 21.5 })?;
    assert_eq!(label.text, "21.5°C");
    Ok(())
}

#[test]
fn test_erased_dispatch() -> Result<(), MapError> {
    let registry = registry()?;

    let inputs: Vec<(AnyValue, TypeInfo)> = vec![
        (AnyValue::new(Celsius { degrees: 0.0 }), TypeInfo::of::<Fahrenheit>()),
        (AnyValue::new(Celsius { degrees: -40.0 }), TypeInfo::of::<Label>()),
    ];
    let outputs = inputs
        .iter()
        .map(|(value, target)| registry.map_erased(value, *target))
        .collect::<Result<Vec<_>, _>>()?;

    assert_eq!(outputs[0].downcast_ref::<Fahrenheit>().map(|f| f.degrees), Some(32.0));
    assert_eq!(outputs[1].downcast_ref::<Label>().map(|l| l.text.as_str()), Some("-40.0°C"));
    Ok(())
}

#[test]
fn test_missing_pair() -> Result<(), MapError> {
    let registry = registry()?;

    let result = registry.map::<Fahrenheit, Celsius>(Fahrenheit { degrees: 50.0 });
    match result {
        Err(MapError::NoMapper { source, destination }) => {
            assert!(source.ends_with("Fahrenheit"));
            assert!(destination.ends_with("Celsius"));
        }
        _ => panic!("expected no mapper for Fahrenheit -> Celsius"),
    }

    assert!(registry.remove::<Celsius, Label>()?);
    assert!(!registry.remove::<Celsius, Label>()?);
    assert!(matches!(
        registry.map::<Celsius, Label>(Celsius::default()),
        Err(MapError::NoMapper { .. })
    ));
    Ok(())
}

#[test]
fn test_pairs_and_erased_mapper_trait() -> Result<(), MapError> {
    let registry = registry()?;
    let mut pairs: Vec<String> = registry
        .pairs()?
        .into_iter()
        .map(|(source, destination)| format!("{} -> {}", source, destination))
        .collect();
    pairs.sort();
    assert_eq!(pairs.len(), 2);
    assert!(pairs.iter().all(|pair| pair.contains("Celsius ->")));

    let boxed: Box<dyn ErasedMapper> = Box::new(TypeMapper::<Celsius, Fahrenheit>::default());
    assert_eq!(boxed.source_type(), TypeInfo::of::<Celsius>());
    assert_eq!(boxed.destination_type(), TypeInfo::of::<Fahrenheit>());
    let out = boxed.map_erased(&AnyValue::new(Celsius { degrees: 5.0 }))?;
    assert_eq!(out.downcast::<Fahrenheit>()?.degrees, 5.0);
    Ok(())
}

#[test]
fn test_shared_registry_across_threads() -> Result<(), MapError> {
    let registry = Arc::new(registry()?);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || -> Result<f64, MapError> {
                let out: Fahrenheit = registry.map(Celsius {
                    degrees: f64::from(i) * 10.0,
                })?;
                Ok(out.degrees)
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.join().expect("registry thread panicked")?);
    }
    assert_eq!(results, vec![32.0, 50.0, 68.0, 86.0]);
    Ok(())
}
