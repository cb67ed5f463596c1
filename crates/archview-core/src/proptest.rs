//! Property-based tests for pruning over randomly shaped systems.
//!
//! Systems are generated valid by construction: domains (some with a nested
//! domain) holding modules and components, plus a few external peers, with
//! relations drawn between arbitrary relation ends. Policies pick uids from
//! the generated tree.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;
    use proptest::sample::Index;

    use crate::{prune, Follow, Level, Part, Relation, RelationType, System, ViewPolicy};

    // Per domain: modules, each with a component count.
    type Shape = Vec<Vec<usize>>;
    type Edge = (Index, Index, u8, Option<String>);

    fn build_system(shape: &Shape, externals: usize, edges: &[Edge]) -> System {
        let mut parts = Vec::new();
        let mut ends = Vec::new();

        for (d, modules) in shape.iter().enumerate() {
            let mut direct = Vec::new();
            let mut nested = Vec::new();
            for (m, components) in modules.iter().enumerate() {
                let uid = format!("m{}.{}", d, m);
                ends.push(uid.clone());
                let children = (0..*components)
                    .map(|c| {
                        let cuid = format!("c{}.{}.{}", d, m, c);
                        ends.push(cuid.clone());
                        Part::component(cuid.clone(), cuid)
                    })
                    .collect();
                let module = Part::module(uid.clone(), uid).with_children(children);
                // odd modules live one domain deeper
                if m % 2 == 1 {
                    nested.push(module);
                } else {
                    direct.push(module);
                }
            }
            if !nested.is_empty() {
                let inner = format!("d{}.inner", d);
                direct.push(Part::domain(inner.clone(), inner).with_children(nested));
            }
            let uid = format!("d{}", d);
            parts.push(Part::domain(uid.clone(), uid).with_children(direct));
        }
        for x in 0..externals {
            let uid = format!("x{}", x);
            ends.push(uid.clone());
            parts.push(Part::external(uid.clone(), uid));
        }

        let relations = if ends.is_empty() {
            vec![]
        } else {
            edges
                .iter()
                .map(|(s, t, kind, description)| {
                    let kind = match kind {
                        0 => RelationType::Ask,
                        1 => RelationType::Tell,
                        _ => RelationType::Listen,
                    };
                    let mut relation =
                        Relation::new(s.get(&ends).clone(), t.get(&ends).clone(), kind);
                    relation.description = description.clone();
                    relation
                })
                .collect()
        };

        System {
            version: "generated".to_string(),
            parts,
            relations,
        }
    }

    fn system() -> impl Strategy<Value = System> {
        let shape = prop::collection::vec(prop::collection::vec(0usize..4, 0..4), 1..4);
        let edge = (
            any::<Index>(),
            any::<Index>(),
            0u8..3,
            prop::option::of("[a-c]"),
        );
        (shape, 0usize..3, prop::collection::vec(edge, 0..12))
            .prop_map(|(shape, externals, edges)| build_system(&shape, externals, &edges))
    }

    fn level() -> impl Strategy<Value = Level> {
        prop_oneof![
            Just(Level::Nothing),
            Just(Level::Zone),
            Just(Level::Domain),
            Just(Level::Module),
            Just(Level::Component),
        ]
    }

    fn follow() -> impl Strategy<Value = Follow> {
        prop_oneof![Just(Follow::Off), (1u32..3).prop_map(Follow::Hops), Just(Follow::All)]
    }

    fn picks() -> impl Strategy<Value = Vec<Index>> {
        prop::collection::vec(any::<Index>(), 0..3)
    }

    /// A system together with a policy that names some of its uids.
    fn system_and_policy() -> impl Strategy<Value = (System, ViewPolicy)> {
        let knobs = (
            (picks(), picks(), picks(), picks()),
            level(),
            prop::option::of(level()),
            follow(),
            follow(),
            any::<bool>(),
        );
        (system(), knobs).prop_map(
            |(system, ((include, open, exclude, deep), level, relation_level, fwd, inv, reverse))| {
                let uids: Vec<String> = system.uids().into_iter().map(str::to_string).collect();
                let pick = |picks: Vec<Index>| -> Vec<String> {
                    picks.iter().map(|i| i.get(&uids).clone()).collect()
                };
                let mut policy = ViewPolicy::default()
                    .include(pick(include))
                    .open(pick(open))
                    .exclude(pick(exclude))
                    .exclude_deep(pick(deep))
                    .level(level)
                    .follow_relations(fwd)
                    .follow_inverse_relations(inv);
                policy.relation_level = relation_level;
                if reverse {
                    policy = policy.reverse_relation_types([RelationType::Listen]);
                }
                (system, policy)
            },
        )
    }

    fn subtree_uids(part: &Part, out: &mut HashSet<String>) {
        out.insert(part.uid.clone());
        for child in &part.children {
            subtree_uids(child, out);
        }
    }

    proptest! {
        /// The same input always yields the same view.
        #[test]
        fn pruning_is_deterministic((system, policy) in system_and_policy()) {
            let first = prune(&system, &policy).unwrap();
            let second = prune(&system, &policy).unwrap();
            prop_assert_eq!(first, second);
        }

        /// Every routed relation lands on parts present in the pruned tree.
        #[test]
        fn routed_endpoints_are_in_the_tree((system, policy) in system_and_policy()) {
            let view = prune(&system, &policy).unwrap();
            let uids: HashSet<&str> = view.system.uids().into_iter().collect();
            for relation in &view.system.relations {
                prop_assert!(uids.contains(relation.source.as_str()), "missing source of {}", relation);
                prop_assert!(uids.contains(relation.target.as_str()), "missing target of {}", relation);
            }
            for uid in &view.selected {
                prop_assert!(uids.contains(uid.as_str()));
            }
        }

        /// Routing never produces a self-loop or two relations with the same ends and type.
        #[test]
        fn routed_relations_are_distinct((system, policy) in system_and_policy()) {
            let view = prune(&system, &policy).unwrap();
            let mut keys = HashSet::new();
            for relation in &view.system.relations {
                prop_assert_ne!(&relation.source, &relation.target);
                prop_assert!(keys.insert((relation.source.clone(), relation.kind, relation.target.clone())));
            }
        }

        /// The pruned tree keeps source order and nothing under a deep exclusion.
        #[test]
        fn pruned_tree_is_an_ordered_subset((system, policy) in system_and_policy()) {
            let view = prune(&system, &policy).unwrap();

            let original = system.uids();
            let mut cursor = original.iter();
            for uid in view.system.uids() {
                prop_assert!(cursor.any(|o| *o == uid), "{} out of order", uid);
            }

            let mut hidden = HashSet::new();
            for uid in &policy.exclude_deep {
                if let Some(part) = system.find(uid) {
                    subtree_uids(part, &mut hidden);
                }
            }
            for uid in view.system.uids() {
                prop_assert!(!hidden.contains(uid), "{} is deep-excluded", uid);
            }
        }

        /// Showing everything of a pruned view gives the same view back.
        #[test]
        fn full_view_of_a_pruned_view_is_stable((system, policy) in system_and_policy()) {
            let view = prune(&system, &policy).unwrap();
            let again = prune(&view.system, &ViewPolicy::default().level(Level::Component)).unwrap();
            prop_assert_eq!(again.system, view.system);
        }
    }
}
