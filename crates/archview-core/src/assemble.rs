//! Rebuilds the containment tree from displayed parts only.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::index::{ContainmentIndex, PartId};
use crate::visibility::Visibility;
use crate::{Part, Relation, System};

/// A pruned system plus the uids the policy explicitly selected.
///
/// `selected` is for emphasis when rendering only; inclusion is already
/// decided by the shape of `system`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrunedView {
    #[serde(flatten)]
    pub system: System,
    pub selected: BTreeSet<String>,
}

impl PrunedView {
    pub fn is_selected(&self, uid: &str) -> bool {
        self.selected.contains(uid)
    }
}

/// Build the pruned tree and attach routed relations to it. A relation whose
/// endpoint is missing from the rebuilt tree means routing broke an invariant.
pub fn assemble(
    index: &ContainmentIndex<'_>,
    visibility: &Visibility,
    relations: Vec<Relation>,
) -> Result<PrunedView> {
    let mut kept = HashSet::new();
    let parts = index
        .roots()
        .iter()
        .filter_map(|&root| rebuild(index, visibility, root, &mut kept))
        .collect();

    for relation in &relations {
        for uid in [&relation.source, &relation.target] {
            if !kept.contains(uid.as_str()) {
                return Err(Error::missing_routed_endpoint(uid.as_str()));
            }
        }
    }

    let selected = index
        .ids()
        .filter(|id| visibility.is_selected(*id))
        .map(|id| index.uid(id))
        .filter(|uid| kept.contains(uid))
        .map(str::to_string)
        .collect();

    Ok(PrunedView {
        system: System {
            version: index.version().to_string(),
            parts,
            relations,
        },
        selected,
    })
}

fn rebuild<'a>(
    index: &ContainmentIndex<'a>,
    visibility: &Visibility,
    id: PartId,
    kept: &mut HashSet<&'a str>,
) -> Option<Part> {
    let children: Vec<Part> = index
        .children(id)
        .filter_map(|child| rebuild(index, visibility, child, kept))
        .collect();
    if !visibility.is_displayed(id) && children.is_empty() {
        return None;
    }

    let source = index.part(id);
    kept.insert(source.uid.as_str());
    Some(Part {
        uid: source.uid.clone(),
        label: source.label.clone(),
        kind: source.kind,
        description: source.description.clone(),
        children,
    })
}
