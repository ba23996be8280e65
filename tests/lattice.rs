use csv_loader::schema::{FieldType, TypePolicy, join, promote};
use proptest::prelude::*;

fn any_classification() -> impl Strategy<Value = Option<FieldType>> {
    prop_oneof![
        Just(None),
        Just(Some(FieldType::Integer)),
        Just(Some(FieldType::Date)),
        Just(Some(FieldType::DateTime)),
        Just(Some(FieldType::ShortString)),
        Just(Some(FieldType::Text)),
    ]
}

fn permissive_policy() -> TypePolicy {
    TypePolicy {
        infer_dates: true,
        ..TypePolicy::default()
    }
}

proptest! {
    #[test]
    fn join_is_commutative(a in any_classification(), b in any_classification()) {
        prop_assert_eq!(join(a, b), join(b, a));
    }

    #[test]
    fn join_is_associative(
        a in any_classification(),
        b in any_classification(),
        c in any_classification(),
    ) {
        prop_assert_eq!(join(a, join(b, c)), join(join(a, b), c));
    }

    #[test]
    fn join_treats_absence_as_identity(a in any_classification()) {
        prop_assert_eq!(join(None, a), a);
        prop_assert_eq!(join(a, None), a);
    }

    #[test]
    fn promote_is_order_insensitive(mut types in proptest::collection::vec(any_classification(), 0..8)) {
        let policy = permissive_policy();
        let forward = promote(types.clone(), &policy).unwrap();
        types.reverse();
        prop_assert_eq!(promote(types, &policy).unwrap(), forward);
    }
}

#[test]
fn promote_of_nothing_is_unknown() {
    let policy = permissive_policy();
    assert_eq!(promote([], &policy).unwrap(), None);
    assert_eq!(promote([None, None], &policy).unwrap(), None);
}

#[test]
fn promote_matches_the_specified_joins() {
    let policy = permissive_policy();
    assert_eq!(
        promote([Some(FieldType::Integer), Some(FieldType::Text)], &policy).unwrap(),
        Some(FieldType::Text)
    );
    assert_eq!(
        promote([Some(FieldType::Integer), Some(FieldType::DateTime)], &policy).unwrap(),
        Some(FieldType::ShortString)
    );
    assert_eq!(
        promote([Some(FieldType::ShortString)], &policy).unwrap(),
        Some(FieldType::ShortString)
    );
}
