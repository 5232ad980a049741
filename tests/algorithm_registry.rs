use serde_json::{json, Value};
use windrow::{standard_registry, AlgorithmError, TriggerPrimitive};

fn tp(time_start: u64, channel: u32, adc: u32) -> TriggerPrimitive {
    TriggerPrimitive {
        time_start,
        time_over_threshold: 4,
        channel,
        adc_integral: adc,
        ..Default::default()
    }
}

#[test]
fn prescale_emits_every_nth_input() {
    let registry = standard_registry();
    let mut algorithm = registry
        .build("prescale", &json!({"prescale": 2}))
        .expect("stock algorithm");

    let mut out = Vec::new();
    for i in 0..4u64 {
        algorithm.apply(&tp(i * 10, 1, 100), &mut out).unwrap();
    }
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].time_start, 10);
    assert_eq!(out[1].time_start, 30);
    assert_eq!(out[0].inputs.len(), 1);
}

#[test]
fn prescale_defaults_to_pass_through() {
    let registry = standard_registry();
    let mut algorithm = registry.build("prescale", &Value::Null).unwrap();

    let mut out = Vec::new();
    algorithm.apply(&tp(7, 3, 250), &mut out).unwrap();
    assert_eq!(out.len(), 1);
    let activity = &out[0];
    assert_eq!(activity.time_start, 7);
    assert_eq!(activity.time_end, 11);
    assert_eq!(activity.channel_start, 3);
    assert_eq!(activity.channel_end, 3);
    assert_eq!(activity.adc_integral, 250);
}

#[test]
fn zero_prescale_is_rejected() {
    let registry = standard_registry();
    let err = registry
        .build("prescale", &json!({"prescale": 0}))
        .unwrap_err();
    assert!(matches!(err, AlgorithmError::InvalidConfig(_)));
}

#[test]
fn unknown_names_are_reported() {
    let registry = standard_registry();
    let err = registry.build("does_not_exist", &Value::Null).unwrap_err();
    assert!(matches!(err, AlgorithmError::Unknown(name) if name == "does_not_exist"));
}

#[test]
fn registered_names_are_listed() {
    let registry = standard_registry();
    let names: Vec<&str> = registry.names().collect();
    assert!(names.contains(&"prescale"));
}
