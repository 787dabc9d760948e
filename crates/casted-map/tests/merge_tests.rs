use casted_map::{CastedMap, MapOptions, Transform};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

fn plus(delta: i64) -> Transform<i64> {
    Transform::from_value_fn(move |x: &i64| x + delta)
}

fn counting_plus(delta: i64) -> (Transform<i64>, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let transform = Transform::from_value_fn(move |x: &i64| {
        counter.set(counter.get() + 1);
        x + delta
    });
    (transform, calls)
}

#[test]
fn merge_carries_incoming_status_and_keeps_the_receiver_transform() {
    let a = CastedMap::from_pairs([("a", 1), ("b", 2)], plus(10));
    assert_eq!(a.read("a").unwrap(), Some(11));
    assert_eq!(a.read("b").unwrap(), Some(12));

    let b = CastedMap::from_pairs([("a", 2), ("c", 3), ("d", 4)], plus(100));
    assert_eq!(b.read("d").unwrap(), Some(104));

    let c = a.merge(&b);

    assert_eq!(c.keys().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
    assert!(!c.is_cast("a"));
    assert!(c.is_cast("b"));
    assert!(!c.is_cast("c"));
    assert!(c.is_cast("d"));

    // Uncast entries are cast with the receiver's transform; carried results are kept as-is.
    assert_eq!(c.read("a").unwrap(), Some(12));
    assert_eq!(c.read("b").unwrap(), Some(12));
    assert_eq!(c.read("c").unwrap(), Some(13));
    assert_eq!(c.read("d").unwrap(), Some(104));
    assert!(c.transform().same_as(a.transform()));
}

#[test]
fn merge_leaves_both_inputs_untouched() {
    let a = CastedMap::from_pairs([("a", 1), ("b", 2)], plus(10));
    a.read("a").unwrap();
    let b = CastedMap::from_pairs([("a", 5), ("c", 3)], plus(100));

    let merged = a.merge(&b);
    merged.read("c").unwrap();

    assert_eq!(a.len(), 2);
    assert!(a.is_cast("a"));
    assert_eq!(a.read("a").unwrap(), Some(11));
    assert!(!b.is_cast("c"));
    assert!(!b.is_cast("a"));
    assert_eq!(b.read("c").unwrap(), Some(103));
}

#[test]
fn merged_cells_are_owned_by_the_destination() {
    let mut a = CastedMap::from_pairs([("a", 1)], plus(10));
    let b = CastedMap::from_pairs([("b", 2), ("c", 3)], plus(100));

    a.merge_into(&b);

    for key in ["a", "b", "c"] {
        let cell = a.cell(key).unwrap();
        assert_eq!(cell.owner(), a.id(), "{key}");
    }
    assert_eq!(b.cell("b").unwrap().owner(), b.id());
    assert_eq!(a.read("b").unwrap(), Some(12));
}

#[test]
fn merge_with_itself_keeps_status() {
    let (transform, calls) = counting_plus(10);
    let a = CastedMap::from_pairs([("a", 1), ("b", 2)], transform);
    a.read("a").unwrap();

    let merged = a.merge(&a);
    assert!(merged.is_cast("a"));
    assert!(!merged.is_cast("b"));
    assert_eq!(merged, a);

    let mut a = a;
    let same = a.clone();
    a.merge_into(&same);
    assert!(a.is_cast("a"));
    assert!(!a.is_cast("b"));

    assert_eq!(a.read("a").unwrap(), Some(11));
    assert_eq!(calls.get(), 1);
}

#[test]
fn merging_an_already_incorporated_entry_does_not_regress_it() {
    let mut a = CastedMap::from_pairs([("a", 1)], plus(10));
    let b = CastedMap::from_pairs([("b", 2)], plus(100));

    a.merge_into(&b);
    assert_eq!(a.read("b").unwrap(), Some(12));

    // `b` is still uncast in its source, but `a` already holds that very cell.
    a.merge_into(&b);
    assert!(a.is_cast("b"));
    assert_eq!(a.read("b").unwrap(), Some(12));
}

#[test]
fn rewritten_key_in_the_source_replaces_the_destination_cell() {
    let mut a = CastedMap::from_pairs([("a", 1)], plus(10));
    let mut b = CastedMap::from_pairs([("b", 2)], plus(100));

    a.merge_into(&b);
    a.read("b").unwrap();

    b.write("b", 3);
    a.merge_into(&b);
    assert!(!a.is_cast("b"));
    assert_eq!(a.read("b").unwrap(), Some(13));
}

#[test]
fn merging_an_empty_map_is_a_no_op() {
    let a = CastedMap::from_pairs([("a", 1), ("b", 2)], plus(10));
    a.read("b").unwrap();
    let empty = CastedMap::new(plus(100));

    let merged = a.merge(&empty);
    assert_eq!(merged, a);

    let mut in_place = a.clone();
    in_place.merge_into(&empty);
    assert_eq!(in_place, a);

    in_place.update_from_pairs(Vec::<(&str, i64)>::new());
    assert_eq!(in_place, a);
}

#[test]
fn merging_plain_pairs_writes_uncast_values() {
    let (transform, calls) = counting_plus(10);
    let map = CastedMap::from_pairs([("a", 1), ("b", 2)], transform);
    assert_eq!(map.read("a").unwrap(), Some(11));
    assert_eq!(map.read("b").unwrap(), Some(12));

    let mut map = map.clone();
    map.update_from_pairs([("a", 3)]);

    assert_eq!(map.read("a").unwrap(), Some(13));
    assert_eq!(map.read("b").unwrap(), Some(12));
    assert_eq!(calls.get(), 3);
}

#[test]
fn merging_uncast_maps_casts_nothing() {
    let a = CastedMap::from_pairs([("a", 1), ("b", 2)], plus(10));
    let mut merged = a.merge(&CastedMap::from_pairs([("c", 3)], plus(10)));
    assert!(merged.casted_only().is_empty());

    let other = CastedMap::from_pairs([("c", 1), ("d", 2)], plus(10));
    merged.merge_into(&other);

    assert!(merged.casted_only().is_empty());
    assert!(other.casted_only().is_empty());
    assert_eq!(
        merged.casted_snapshot().unwrap(),
        HashMap::from([
            ("a".to_string(), 11),
            ("b".to_string(), 12),
            ("c".to_string(), 11),
            ("d".to_string(), 12),
        ])
    );
}

#[test]
fn absorb_moves_cells_and_their_results() {
    let (source_transform, source_calls) = counting_plus(100);
    let mut a = CastedMap::from_pairs([("a", 1)], plus(10));
    let b = CastedMap::from_pairs([("a", 2), ("b", 3)], source_transform);
    b.read("b").unwrap();
    let b_cell = b.cell("b").unwrap().id();

    a.absorb(b);

    assert_eq!(a.cell("b").unwrap().id(), b_cell);
    assert_eq!(a.cell("b").unwrap().owner(), a.id());
    assert!(a.is_cast("b"));
    assert!(!a.is_cast("a"));
    assert_eq!(a.read("a").unwrap(), Some(12));
    assert_eq!(a.read("b").unwrap(), Some(103));
    assert_eq!(source_calls.get(), 1);
}

#[test]
fn merge_normalizes_incoming_keys_with_destination_rules() {
    let mut a = CastedMap::from_pairs_with_options(
        [("Total", 1)],
        plus(10),
        MapOptions::case_insensitive(),
    );
    a.read("total").unwrap();

    let b = CastedMap::from_pairs([("TOTAL", 5), ("Other", 6)], plus(100));
    a.merge_into(&b);

    assert_eq!(a.len(), 2);
    assert_eq!(a.keys().collect::<Vec<_>>(), vec!["Total", "Other"]);
    assert!(!a.is_cast("total"));
    assert_eq!(a.read("TOTAL").unwrap(), Some(15));
}

#[test]
fn maps_are_equal_only_with_the_same_transform() {
    let transform = plus(10);
    let first = CastedMap::from_pairs([("a", 1), ("b", 2)], transform.clone());
    let second = CastedMap::from_pairs([("a", 1), ("b", 2)], transform);
    let third = CastedMap::from_pairs([("a", 1), ("b", 2)], plus(11));

    assert_eq!(first, second);
    assert_ne!(first, third);

    first.read("a").unwrap();
    assert_ne!(first, second);
    second.read("a").unwrap();
    assert_eq!(first, second);
}

#[test]
fn clone_copies_status_without_sharing_it() {
    let (transform, calls) = counting_plus(10);
    let original = CastedMap::from_pairs([("a", 1), ("b", 2)], transform);
    original.read("a").unwrap();

    let copy = original.clone();
    assert_ne!(copy.id(), original.id());
    assert_eq!(copy.cell("a").unwrap().owner(), copy.id());
    assert!(copy.is_cast("a"));

    copy.read("b").unwrap();
    assert!(!original.is_cast("b"));
    assert_eq!(calls.get(), 2);
}
