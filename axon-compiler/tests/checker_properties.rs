//! Property-based tests for the type algebra: assignability, common-type
//! computation, and generic substitution.

use std::collections::HashMap;

use proptest::prelude::*;

use axon_compiler::{common_type, is_assignable, substitute, Type};

fn concrete_leaf_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::Void),
        Just(Type::Bool),
        Just(Type::I8),
        Just(Type::I16),
        Just(Type::I32),
        Just(Type::I64),
        Just(Type::U8),
        Just(Type::U16),
        Just(Type::U32),
        Just(Type::U64),
        Just(Type::F32),
        Just(Type::F64),
        Just(Type::Char),
        Just(Type::Str),
        Just(Type::Never),
    ]
}

fn leaf_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        concrete_leaf_type(),
        "[A-Z]".prop_map(Type::Generic),
        "[A-Z][a-z]{1,6}".prop_map(Type::Struct),
        "[A-Z][a-z]{1,6}".prop_map(Type::Enum),
    ]
}

fn arb_type() -> impl Strategy<Value = Type> {
    leaf_type().prop_recursive(3, 48, 6, |inner| {
        prop_oneof![
            inner.clone().prop_map(|ty| Type::List(Box::new(ty))),
            inner
                .clone()
                .prop_map(|ty| Type::Optional(Box::new(ty))),
            (inner.clone(), inner.clone()).prop_map(|(key, value)| Type::Dict {
                key: Box::new(key),
                value: Box::new(value),
            }),
            prop::collection::vec(inner.clone(), 0..3).prop_map(Type::Tuple),
            (prop::collection::vec(inner.clone(), 0..3), inner.clone()).prop_map(
                |(params, ret)| Type::Function {
                    params,
                    ret: Box::new(ret),
                    is_async: false,
                }
            ),
        ]
    })
}

fn numeric_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::I8),
        Just(Type::I16),
        Just(Type::I32),
        Just(Type::I64),
        Just(Type::U8),
        Just(Type::U16),
        Just(Type::U32),
        Just(Type::U64),
        Just(Type::F32),
        Just(Type::F64),
    ]
}

fn arb_substitution() -> impl Strategy<Value = HashMap<String, Type>> {
    prop::collection::hash_map("[A-Z]", concrete_leaf_type(), 0..4)
}

proptest! {
    #[test]
    fn assignability_is_reflexive(ty in arb_type()) {
        prop_assert!(is_assignable(&ty, &ty), "{ty} should be assignable to itself");
    }

    #[test]
    fn never_is_assignable_to_everything(ty in arb_type()) {
        prop_assert!(is_assignable(&Type::Never, &ty));
    }

    #[test]
    fn integers_widen_freely(a in numeric_type(), b in numeric_type()) {
        if a.is_integer() && b.is_integer() {
            prop_assert!(is_assignable(&a, &b));
        }
    }

    #[test]
    fn anything_assignable_to_inner_fits_the_optional(ty in arb_type(), inner in arb_type()) {
        if is_assignable(&ty, &inner) {
            prop_assert!(is_assignable(&ty, &Type::Optional(Box::new(inner))));
        }
    }

    #[test]
    fn common_type_is_commutative(a in arb_type(), b in arb_type()) {
        prop_assert_eq!(common_type(&a, &b), common_type(&b, &a));
    }

    #[test]
    fn common_type_of_numerics_is_numeric(a in numeric_type(), b in numeric_type()) {
        let joined = common_type(&a, &b);
        prop_assert!(joined.is_numeric(), "common_type({a}, {b}) = {joined}");
    }

    #[test]
    fn f64_dominates_common_type(other in numeric_type()) {
        prop_assert_eq!(common_type(&Type::F64, &other), Type::F64);
    }

    #[test]
    fn substitution_with_empty_mapping_is_identity(ty in arb_type()) {
        let empty = HashMap::new();
        prop_assert_eq!(substitute(&ty, &empty), ty);
    }

    #[test]
    fn substitution_is_idempotent_for_concrete_mappings(
        ty in arb_type(),
        mapping in arb_substitution(),
    ) {
        let once = substitute(&ty, &mapping);
        let twice = substitute(&once, &mapping);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn substitution_replaces_a_bound_generic(name in "[A-Z]", target in concrete_leaf_type()) {
        let mut mapping = HashMap::new();
        mapping.insert(name.clone(), target.clone());
        let generic = Type::Generic(name);
        prop_assert_eq!(substitute(&generic, &mapping), target.clone());

        let nested = Type::List(Box::new(generic));
        prop_assert_eq!(
            substitute(&nested, &mapping),
            Type::List(Box::new(target))
        );
    }
}

#[test]
fn common_type_examples() {
    assert_eq!(common_type(&Type::I32, &Type::I64), Type::I64);
    assert_eq!(common_type(&Type::I64, &Type::F32), Type::F32);
    assert_eq!(common_type(&Type::F32, &Type::F64), Type::F64);
    assert_eq!(common_type(&Type::I64, &Type::Str), Type::Unknown);
}

#[test]
fn nominal_types_compare_by_name() {
    assert_eq!(Type::Struct("Point".into()), Type::Struct("Point".into()));
    assert_ne!(Type::Struct("Point".into()), Type::Struct("Size".into()));
    assert_ne!(Type::Struct("Point".into()), Type::Class("Point".into()));
}

#[test]
fn mutable_references_require_exact_match() {
    let to = Type::Reference {
        inner: Box::new(Type::I64),
        mutable: true,
    };
    assert!(is_assignable(&Type::I64, &to));
    assert!(
        !is_assignable(&Type::I32, &to),
        "mutable references must not widen"
    );

    let shared = Type::Reference {
        inner: Box::new(Type::I64),
        mutable: false,
    };
    assert!(is_assignable(&Type::I32, &shared));
}
