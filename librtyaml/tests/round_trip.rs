//! Literal round-trip corpus: ordered maps, sets, block scalar chomping next
//! to blank lines, comment placement under mutation and merge precedence.

use librtyaml::{
    dump, load, round_trip_dump, round_trip_load, safe_dump, safe_load, DumperOptions, OrderedMap, Profile, Schema,
    Set, Value,
};
use rstest::rstest;

fn assert_round_trip(input: &str) {
    let value = round_trip_load(input).unwrap();
    assert_eq!(round_trip_dump(&value).unwrap(), input);
}

#[test]
fn test_ordered_map_dump() {
    let omap: OrderedMap = [("a", 1), ("b", 2)].into_iter().collect();
    let text = dump(
        &Value::from(omap),
        &Schema::for_profile(Profile::Safe),
        &DumperOptions::default().with_default_flow_style(Some(false)),
    )
    .unwrap();
    assert_eq!(text, "!!omap\n- a: 1\n- b: 2\n");
}

#[test]
fn test_ordered_map_keeps_order_on_load() {
    let value = safe_load("!!omap\n- b: 2\n- a: 1\n").unwrap();
    let keys: Vec<&Value> = value.as_ordered_map().unwrap().keys().collect();
    assert_eq!(keys, [&Value::from("b"), &Value::from("a")]);
}

#[test]
fn test_set_dump_uses_null_values() {
    let set: Set = ["a", "b", "c"].into_iter().collect();
    assert_eq!(safe_dump(&Value::from(set)).unwrap(), "!!set\na: null\nb: null\nc: null\n");
}

#[test]
fn test_set_forms_load_equal() {
    let compact = safe_load("!!set\n? a\n? b\n? c\n").unwrap();
    let explicit = safe_load("!!set\na: null\nb: null\nc: null\n").unwrap();
    assert_eq!(compact, explicit);
    assert_eq!(compact.as_set().unwrap().len(), 3);
}

#[test]
fn test_set_compact_form_round_trips() {
    assert_round_trip("!!set\n? a\n? b\n? c\n");
}

#[test]
fn test_set_mutation() {
    let mut value = round_trip_load("!!set\n? a\n? b\n? c\n").unwrap();
    let set = value.as_set_mut().unwrap();
    assert!(set.insert("d"));
    assert!(set.remove(&Value::from("a")));
    assert!(set.insert("e"));
    assert!(set.insert("f"));
    assert!(set.remove(&Value::from("e")));

    let expected: Set = ["b", "c", "d", "f"].into_iter().collect();
    assert_eq!(value, Value::from(expected.clone()));

    let reloaded = round_trip_load(&round_trip_dump(&value).unwrap()).unwrap();
    assert_eq!(reloaded, Value::from(expected));
}

#[rstest]
#[case("- |-\n  text\n\n- next\n", "text")]
#[case("- |\n  text\n\n- next\n", "text\n")]
#[case("- |+\n  text\n\n- next\n", "text\n\n")]
#[case("- |-\n  text\n\n\n- next\n", "text")]
#[case("- |\n  text\n\n\n- next\n", "text\n")]
#[case("- |+\n  text\n\n\n- next\n", "text\n\n\n")]
fn test_literal_chomping_before_blank_lines(#[case] input: &str, #[case] expected: &str) {
    let value = round_trip_load(input).unwrap();
    assert_eq!(value[0], Value::from(expected));
    assert_eq!(value[1], Value::from("next"));
    assert_eq!(round_trip_dump(&value).unwrap(), input);
}

#[rstest]
#[case("# comment\n\na: 1\n")]
#[case("a: 1\n# comment\n\nb: 2\n")]
#[case("- a\n\n- b\n")]
#[case("- a\n\n\n- b\n")]
#[case("key:\n- a  # first\n\n- b  # second\n")]
fn test_blank_lines_and_comments(#[case] input: &str) {
    assert_round_trip(input);
}

#[test]
fn test_removing_an_entry_keeps_neighbour_comments() {
    let mut value = round_trip_load("a: 1  # one\nb: 2  # two\nc: 3  # three\n").unwrap();
    value.as_mapping_mut().unwrap().remove(&Value::from("b"));
    assert_eq!(round_trip_dump(&value).unwrap(), "a: 1  # one\nc: 3  # three\n");
}

#[test]
fn test_changed_value_drops_only_its_presentation() {
    let mut value = round_trip_load("a: 'quoted'  # note\nb: plain\n").unwrap();
    value.as_mapping_mut().unwrap().insert("b", "changed");
    assert_eq!(round_trip_dump(&value).unwrap(), "a: 'quoted'  # note\nb: changed\n");
}

#[test]
fn test_merge_key_precedence() {
    let input = "base: &base\n  x: 1\n  y: 2\nderived:\n  <<: *base\n  x: 9\n";
    let value = safe_load(input).unwrap();
    assert_eq!(value["derived"]["x"], Value::from(9));
    assert_eq!(value["derived"]["y"], Value::from(2));
}

#[test]
fn test_merge_round_trips() {
    assert_round_trip("base: &base\n  x: 1\n  y: 2\nderived:\n  <<: *base\n  x: 9\n");
}

#[test]
fn test_backslash_scalar() {
    let input = "path: applications/\\1/static/\\2\n";
    assert_eq!(safe_load(input).unwrap()["path"], Value::from("applications/\\1/static/\\2"));
    assert_round_trip(input);
}

#[rstest]
#[case("a: [1, 2]\nb:\n  c: d\n")]
#[case("- !!binary aGVsbG8=\n- 2001-12-14t21:59:43.10-05:00\n")]
#[case("text: \"line one\\nline two\"\n")]
#[case("? [a, b]\n: c\n")]
fn test_dump_is_idempotent(#[case] input: &str) {
    let schema = Schema::for_profile(Profile::Unrestricted);
    let options = DumperOptions::default();
    let once = dump(&load(input, &schema).unwrap(), &schema, &options).unwrap();
    let twice = dump(&load(&once, &schema).unwrap(), &schema, &options).unwrap();
    assert_eq!(once, twice);
}
