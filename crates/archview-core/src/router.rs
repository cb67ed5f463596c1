//! Re-targets relations onto the parts a view displays.
//!
//! The source end walks up to the nearest displayed part. The target end walks
//! up until it reaches a displayed part, a part the relation level accepts, or
//! the child of a displayed ancestor shared with the source. That last stop
//! keeps relations between siblings of a shown container from collapsing onto
//! the container itself.
//!
//! A route is dropped when a walk finds nothing, when both ends collapse onto
//! the same part, or when the source ends up containing the original target.
//! Relation types the policy marks reversible get a second attempt with the
//! ends swapped before being dropped.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::index::{ContainmentIndex, Link, PartId};
use crate::policy::ViewPolicy;
use crate::visibility::Visibility;
use crate::{Relation, RelationType};

/// Output of a routing pass.
#[derive(Debug, Clone, Default)]
pub struct RoutedRelations {
    /// Deduplicated relations, in first-seen order of the source list.
    pub relations: Vec<Relation>,
    /// Every routed endpoint. These must be displayed in the final view.
    pub forced: Vec<PartId>,
    pub dropped: usize,
    pub merged: usize,
    pub reversed: usize,
    /// Merges that folded a reversed route into a forward one, or the other
    /// way round. The merged relation keeps the first route's direction.
    pub direction_conflicts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    Unroutable,
    SelfLoop,
    Containment,
}

#[derive(Debug, Clone, Copy)]
struct Route {
    source: PartId,
    target: PartId,
    reversed: bool,
}

pub struct Router<'i, 'a> {
    index: &'i ContainmentIndex<'a>,
    visibility: &'i Visibility,
    policy: &'i ViewPolicy,
}

impl<'i, 'a> Router<'i, 'a> {
    pub fn new(
        index: &'i ContainmentIndex<'a>,
        visibility: &'i Visibility,
        policy: &'i ViewPolicy,
    ) -> Self {
        Self {
            index,
            visibility,
            policy,
        }
    }

    /// Route every relation. `links` are the resolved endpoints of
    /// `relations`, position for position.
    pub fn route(&self, relations: &[Relation], links: &[Link]) -> RoutedRelations {
        debug_assert_eq!(relations.len(), links.len());

        let mut out = RoutedRelations::default();
        let mut seen: HashMap<(PartId, RelationType, PartId), usize> = HashMap::new();

        for (relation, link) in relations.iter().zip(links) {
            let route = match self.route_one(relation.kind, *link) {
                Ok(route) => route,
                Err(reason) => {
                    trace!(%relation, ?reason, "relation dropped");
                    out.dropped += 1;
                    continue;
                }
            };
            if route.reversed {
                out.reversed += 1;
            }

            let key = (route.source, relation.kind, route.target);
            if let Some(&slot) = seen.get(&key) {
                let kept = &mut out.relations[slot];
                if kept.reversed != relation.reversed ^ route.reversed {
                    trace!(%relation, kept = %kept, "merged relations disagree on direction");
                    out.direction_conflicts += 1;
                }
                merge_into(kept, relation);
                out.merged += 1;
                continue;
            }

            seen.insert(key, out.relations.len());
            out.forced.push(route.source);
            out.forced.push(route.target);
            out.relations.push(Relation {
                source: self.index.uid(route.source).to_string(),
                target: self.index.uid(route.target).to_string(),
                kind: relation.kind,
                description: relation.description.clone(),
                resources: relation.resources.clone(),
                tags: relation.tags.clone(),
                reversed: relation.reversed ^ route.reversed,
            });
        }

        debug!(
            routed = out.relations.len(),
            dropped = out.dropped,
            merged = out.merged,
            reversed = out.reversed,
            direction_conflicts = out.direction_conflicts,
            "relations routed"
        );
        out
    }

    fn route_one(&self, kind: RelationType, link: Link) -> Result<Route, DropReason> {
        let forward = self.attempt(link.source, link.target, false);
        match forward {
            Err(_) if self.policy.reverses(kind) => {
                self.attempt(link.target, link.source, true).or(forward)
            }
            other => other,
        }
    }

    /// Route from `from` to `to`, where `from` becomes the effective source.
    fn attempt(&self, from: PartId, to: PartId, reversed: bool) -> Result<Route, DropReason> {
        let source = self.source_walk(from).ok_or(DropReason::Unroutable)?;
        let target = self.target_walk(to, from).ok_or(DropReason::Unroutable)?;
        if source == target {
            return Err(DropReason::SelfLoop);
        }
        if self.index.is_ancestor(source, to) {
            return Err(DropReason::Containment);
        }
        Ok(Route {
            source,
            target,
            reversed,
        })
    }

    /// Nearest displayed part, starting at `id` itself.
    fn source_walk(&self, id: PartId) -> Option<PartId> {
        self.index
            .self_and_ancestors(id)
            .find(|p| self.visibility.is_displayed(*p))
    }

    fn target_walk(&self, id: PartId, other: PartId) -> Option<PartId> {
        let shared: Vec<PartId> = self
            .index
            .common_ancestors(id, other)
            .iter()
            .copied()
            .filter(|a| self.visibility.is_displayed(*a))
            .collect();

        self.index.self_and_ancestors(id).find(|&p| {
            if self.visibility.is_suppressed(p) {
                return false;
            }
            self.accepts_target(p)
                || self
                    .index
                    .parent(p)
                    .is_some_and(|parent| shared.contains(&parent))
        })
    }

    fn accepts_target(&self, id: PartId) -> bool {
        self.visibility.is_displayed(id)
            || self
                .policy
                .relation_level
                .is_some_and(|level| self.index.rank(id) <= level)
    }
}

/// Fold `other` into an already routed relation with the same ends and type.
fn merge_into(existing: &mut Relation, other: &Relation) {
    existing.description = match (existing.description.take(), &other.description) {
        (Some(a), Some(b)) if a.lines().any(|line| line == b) => Some(a),
        (Some(a), Some(b)) => Some(format!("{}\n{}", a, b)),
        (None, Some(b)) => Some(b.clone()),
        (a, None) => a,
    };
    union_into(&mut existing.resources, &other.resources);
    union_into(&mut existing.tags, &other.tags);
}

fn union_into(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}
