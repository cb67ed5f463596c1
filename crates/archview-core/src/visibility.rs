//! Decides which parts a view selects and which it displays.
//!
//! Per part, the first matching rule wins: deep exclusion (the part or any
//! ancestor), shallow exclusion, include / child of an opened part, the level
//! threshold, and finally relation reachability. A part is displayed when it
//! is selected, opened, or has a selected descendant.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::index::{ContainmentIndex, Link, PartId};
use crate::policy::{Follow, Level, ViewPolicy};

/// Why a part was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Selection {
    Included,
    Opened,
    Level,
    Related,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PartVisibility {
    selected: bool,
    displayed: bool,
    /// Inside an `excludeDeep` subtree; never shown.
    suppressed: bool,
    /// Named in `exclude`; never selected itself.
    excluded: bool,
    reason: Option<Selection>,
}

/// Per-part visibility, indexed by [`PartId`].
#[derive(Debug, Clone)]
pub struct Visibility {
    states: Vec<PartVisibility>,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Inverse,
}

impl Direction {
    fn orient(self, link: &Link) -> (PartId, PartId) {
        match self {
            Direction::Forward => (link.source, link.target),
            Direction::Inverse => (link.target, link.source),
        }
    }
}

fn resolve_uids(index: &ContainmentIndex<'_>, field: &str, uids: &[String]) -> HashSet<PartId> {
    uids.iter()
        .filter_map(|uid| {
            let id = index.get(uid);
            if id.is_none() {
                warn!(field, uid = uid.as_str(), "policy names an unknown part; ignoring");
            }
            id
        })
        .collect()
}

impl Visibility {
    pub fn resolve(index: &ContainmentIndex<'_>, policy: &ViewPolicy, links: &[Link]) -> Self {
        let include = resolve_uids(index, "include", &policy.include);
        let open = resolve_uids(index, "open", &policy.open);
        let exclude = resolve_uids(index, "exclude", &policy.exclude);
        let exclude_deep = resolve_uids(index, "excludeDeep", &policy.exclude_deep);

        let mut states = vec![PartVisibility::default(); index.len()];
        for id in index.ids() {
            let state = &mut states[id.index()];
            state.suppressed = index.self_and_ancestors(id).any(|a| exclude_deep.contains(&a));
            state.excluded = exclude.contains(&id);
            if state.suppressed || state.excluded {
                continue;
            }
            state.reason = if include.contains(&id) {
                Some(Selection::Included)
            } else if index.parent(id).is_some_and(|p| open.contains(&p)) {
                Some(Selection::Opened)
            } else if policy.level > Level::Nothing && index.rank(id) <= policy.level {
                Some(Selection::Level)
            } else {
                None
            };
            state.selected = state.reason.is_some();
        }

        let mut visibility = Self { states };
        visibility.follow(index, links, policy.follow_relations, policy.follow_inverse_relations);

        let mut shown: Vec<PartId> = index
            .ids()
            .filter(|id| visibility.is_selected(*id))
            .collect();
        shown.extend(open.iter().copied().filter(|id| !visibility.is_suppressed(*id)));
        visibility.display(index, &shown);

        debug!(
            selected = visibility.selected_count(),
            displayed = visibility.displayed_count(),
            "visibility resolved"
        );
        visibility
    }

    /// Expand the rule-selected seed set along relations. Forward and inverse
    /// hops are independent closures from the same seeds.
    fn follow(&mut self, index: &ContainmentIndex<'_>, links: &[Link], forward: Follow, inverse: Follow) {
        let seeds: Vec<bool> = self.states.iter().map(|s| s.selected).collect();
        let mut reached = Vec::new();
        for (direction, limit) in [(Direction::Forward, forward), (Direction::Inverse, inverse)] {
            reached.extend(self.closure(index, links, &seeds, direction, limit));
        }
        for id in reached {
            let state = &mut self.states[id.index()];
            if !state.selected {
                state.selected = true;
                state.reason = Some(Selection::Related);
            }
        }
    }

    fn closure(
        &self,
        index: &ContainmentIndex<'_>,
        links: &[Link],
        seeds: &[bool],
        direction: Direction,
        limit: Follow,
    ) -> Vec<PartId> {
        let mut in_set = seeds.to_vec();
        let mut reached = Vec::new();
        let mut hops = 0;
        while limit.allows(hops) {
            let mut added: Vec<PartId> = links
                .iter()
                .map(|link| direction.orient(link))
                .filter(|(from, to)| {
                    !in_set[to.index()] && self.reachable(*to) && in_view(index, &in_set, *from)
                })
                .map(|(_, to)| to)
                .collect();
            added.sort();
            added.dedup();
            if added.is_empty() {
                break;
            }
            for id in &added {
                in_set[id.index()] = true;
            }
            reached.extend(added);
            hops += 1;
        }
        debug!(?direction, hops, reached = reached.len(), "relation closure");
        reached
    }

    fn reachable(&self, id: PartId) -> bool {
        let state = &self.states[id.index()];
        !state.suppressed && !state.excluded
    }

    /// Mark parts and all their ancestors displayed.
    fn display(&mut self, index: &ContainmentIndex<'_>, ids: &[PartId]) {
        for &id in ids {
            for part in index.self_and_ancestors(id) {
                let state = &mut self.states[part.index()];
                if state.displayed {
                    break;
                }
                state.displayed = true;
            }
        }
    }

    /// Display parts that routed relations point at, plus their ancestors.
    pub fn with_forced(mut self, index: &ContainmentIndex<'_>, forced: &[PartId]) -> Self {
        self.display(index, forced);
        self
    }

    pub fn is_selected(&self, id: PartId) -> bool {
        self.states[id.index()].selected
    }

    pub fn is_displayed(&self, id: PartId) -> bool {
        self.states[id.index()].displayed
    }

    pub fn is_suppressed(&self, id: PartId) -> bool {
        self.states[id.index()].suppressed
    }

    pub fn reason(&self, id: PartId) -> Option<Selection> {
        self.states[id.index()].reason
    }

    pub fn selected_count(&self) -> usize {
        self.states.iter().filter(|s| s.selected).count()
    }

    pub fn displayed_count(&self) -> usize {
        self.states.iter().filter(|s| s.displayed).count()
    }
}

/// A relation end is in view when it, or the relation end enclosing it, is in
/// the set. Enclosing domains do not count.
fn in_view(index: &ContainmentIndex<'_>, in_set: &[bool], id: PartId) -> bool {
    in_set[id.index()]
        || index
            .ancestors(id)
            .iter()
            .any(|a| in_set[a.index()] && index.kind(*a).is_relation_end())
}
