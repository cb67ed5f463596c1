//! Containment index over an immutable system tree.
//!
//! The tree is flattened into an arena in pre-order. A part's descendants are
//! therefore the contiguous id range right after it, and ancestry checks are
//! range comparisons. Parents are stored as ids, never as references.

use std::collections::HashMap;
use std::ops::Range;

use tracing::debug;

use crate::error::{Error, Result};
use crate::policy::Level;
use crate::{Part, PartKind, Relation, System};

/// Position of a part in the index arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(usize);

impl PartId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A relation resolved to arena ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub source: PartId,
    pub target: PartId,
}

#[derive(Debug)]
struct Entry<'a> {
    part: &'a Part,
    parent: Option<PartId>,
    /// Root-first, excluding the part itself.
    ancestors: Vec<PartId>,
    /// One past the last descendant.
    end: usize,
}

/// Read-only derived data for one prune call.
#[derive(Debug)]
pub struct ContainmentIndex<'a> {
    version: &'a str,
    entries: Vec<Entry<'a>>,
    by_uid: HashMap<&'a str, PartId>,
    roots: Vec<PartId>,
}

impl<'a> ContainmentIndex<'a> {
    /// Index every part of `system`. Fails on duplicate uids and on parts
    /// nested where their kind is not allowed.
    pub fn build(system: &'a System) -> Result<Self> {
        let mut index = Self {
            version: system.version.as_str(),
            entries: Vec::new(),
            by_uid: HashMap::new(),
            roots: Vec::with_capacity(system.parts.len()),
        };
        let mut chain = Vec::new();
        for part in &system.parts {
            let id = index.visit(part, &mut chain)?;
            index.roots.push(id);
        }
        debug!(parts = index.entries.len(), roots = index.roots.len(), "containment index built");
        Ok(index)
    }

    fn visit(&mut self, part: &'a Part, chain: &mut Vec<PartId>) -> Result<PartId> {
        let parent = chain.last().copied();
        check_placement(part, parent.map(|p| self.entries[p.0].part.kind))?;

        let id = PartId(self.entries.len());
        if self.by_uid.insert(part.uid.as_str(), id).is_some() {
            return Err(Error::duplicate_uid(&part.uid));
        }
        self.entries.push(Entry {
            part,
            parent,
            ancestors: chain.clone(),
            end: id.0 + 1,
        });

        chain.push(id);
        for child in &part.children {
            self.visit(child, chain)?;
        }
        chain.pop();

        self.entries[id.0].end = self.entries.len();
        Ok(id)
    }

    /// Version marker of the indexed system.
    pub fn version(&self) -> &'a str {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All ids in pre-order.
    pub fn ids(&self) -> impl Iterator<Item = PartId> + '_ {
        (0..self.entries.len()).map(PartId)
    }

    /// Top-level parts in model order.
    pub fn roots(&self) -> &[PartId] {
        &self.roots
    }

    pub fn get(&self, uid: &str) -> Option<PartId> {
        self.by_uid.get(uid).copied()
    }

    pub fn part(&self, id: PartId) -> &'a Part {
        self.entries[id.0].part
    }

    pub fn uid(&self, id: PartId) -> &'a str {
        self.entries[id.0].part.uid.as_str()
    }

    pub fn kind(&self, id: PartId) -> PartKind {
        self.entries[id.0].part.kind
    }

    pub fn parent(&self, id: PartId) -> Option<PartId> {
        self.entries[id.0].parent
    }

    /// Ancestors from the root down to, but excluding, `id`.
    pub fn ancestors(&self, id: PartId) -> &[PartId] {
        &self.entries[id.0].ancestors
    }

    /// `id` followed by its ancestors, nearest first.
    pub fn self_and_ancestors(&self, id: PartId) -> impl Iterator<Item = PartId> + '_ {
        std::iter::once(id).chain(self.ancestors(id).iter().rev().copied())
    }

    fn descendant_range(&self, id: PartId) -> Range<usize> {
        id.0 + 1..self.entries[id.0].end
    }

    /// Every part transitively contained in `id`, in pre-order.
    pub fn descendants(&self, id: PartId) -> impl Iterator<Item = PartId> {
        self.descendant_range(id).map(PartId)
    }

    pub fn children(&self, id: PartId) -> impl Iterator<Item = PartId> + '_ {
        self.descendants(id)
            .filter(move |d| self.entries[d.0].parent == Some(id))
    }

    /// Whether `ancestor` strictly contains `id`.
    pub fn is_ancestor(&self, ancestor: PartId, id: PartId) -> bool {
        self.descendant_range(ancestor).contains(&id.0)
    }

    /// Ancestors shared by both parts, root-first.
    pub fn common_ancestors(&self, a: PartId, b: PartId) -> &[PartId] {
        let left = self.ancestors(a);
        let right = self.ancestors(b);
        let shared = left
            .iter()
            .zip(right)
            .take_while(|(l, r)| l == r)
            .count();
        &left[..shared]
    }

    /// Rank of a part on the [`Level`] scale.
    pub fn rank(&self, id: PartId) -> Level {
        match self.kind(id) {
            PartKind::Domain if self.parent(id).is_none() => Level::Zone,
            PartKind::Domain => Level::Domain,
            PartKind::Module | PartKind::External => Level::Module,
            PartKind::Component => Level::Component,
        }
    }

    /// Resolve a relation's endpoints. An unknown uid is a construction error.
    pub fn link(&self, relation: &Relation) -> Result<Link> {
        let resolve = |uid: &str| {
            self.get(uid)
                .ok_or_else(|| Error::unknown_endpoint(uid, relation.to_string()))
        };
        Ok(Link {
            source: resolve(&relation.source)?,
            target: resolve(&relation.target)?,
        })
    }

    pub fn links(&self, relations: &[Relation]) -> Result<Vec<Link>> {
        relations.iter().map(|r| self.link(r)).collect()
    }

    /// Resolve the relations of a model file. Both ends must also be relation
    /// ends, which [`Self::links`] does not demand since routed relations may
    /// end on a domain.
    pub fn model_links(&self, relations: &[Relation]) -> Result<Vec<Link>> {
        relations
            .iter()
            .map(|relation| {
                let link = self.link(relation)?;
                for id in [link.source, link.target] {
                    let kind = self.kind(id);
                    if !kind.is_relation_end() {
                        return Err(Error::invalid_endpoint(
                            self.uid(id),
                            kind.as_str(),
                            relation.to_string(),
                        ));
                    }
                }
                Ok(link)
            })
            .collect()
    }
}

fn check_placement(part: &Part, parent: Option<PartKind>) -> Result<()> {
    let allowed = match (part.kind, parent) {
        (PartKind::Domain, None | Some(PartKind::Domain)) => true,
        (PartKind::Module, Some(PartKind::Domain)) => true,
        (PartKind::Component, Some(PartKind::Module)) => true,
        (PartKind::External, None) => true,
        _ => false,
    };
    if !allowed {
        let placement = match parent {
            Some(kind) => format!("inside a {}", kind.as_str()),
            None => "at the top level".to_string(),
        };
        return Err(Error::invalid_containment(
            &part.uid,
            format!("{} ({})", placement, part.kind.as_str()),
        ));
    }
    if !part.kind.is_container() && !part.children.is_empty() {
        return Err(Error::invalid_containment(
            &part.children[0].uid,
            format!("inside a {}", part.kind.as_str()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{nested_system, sample_system};
    use pretty_assertions::assert_eq;

    fn uids<'a>(index: &ContainmentIndex<'a>, ids: impl IntoIterator<Item = PartId>) -> Vec<&'a str> {
        ids.into_iter().map(|id| index.uid(id)).collect()
    }

    #[test]
    fn test_ancestors_are_root_first() {
        let system = nested_system();
        let index = ContainmentIndex::build(&system).unwrap();
        let login = index.get("login").unwrap();
        assert_eq!(
            uids(&index, index.ancestors(login).iter().copied()),
            vec!["core", "identity", "auth"]
        );
        assert_eq!(
            uids(&index, index.self_and_ancestors(login)),
            vec!["login", "auth", "identity", "core"]
        );
        assert!(index.ancestors(index.get("edge").unwrap()).is_empty());
    }

    #[test]
    fn test_descendants_and_children() {
        let system = nested_system();
        let index = ContainmentIndex::build(&system).unwrap();
        let core = index.get("core").unwrap();
        assert_eq!(
            uids(&index, index.descendants(core)),
            vec!["identity", "auth", "login", "tokens", "ledger", "posting"]
        );
        assert_eq!(uids(&index, index.children(core)), vec!["identity", "ledger"]);
        let login = index.get("login").unwrap();
        assert_eq!(index.descendants(login).count(), 0);
    }

    #[test]
    fn test_is_ancestor() {
        let system = nested_system();
        let index = ContainmentIndex::build(&system).unwrap();
        let core = index.get("core").unwrap();
        let tokens = index.get("tokens").unwrap();
        let router = index.get("router").unwrap();
        assert!(index.is_ancestor(core, tokens));
        assert!(!index.is_ancestor(tokens, core));
        assert!(!index.is_ancestor(core, core));
        assert!(!index.is_ancestor(core, router));
    }

    #[test]
    fn test_common_ancestors() {
        let system = nested_system();
        let index = ContainmentIndex::build(&system).unwrap();
        let login = index.get("login").unwrap();
        let tokens = index.get("tokens").unwrap();
        let posting = index.get("posting").unwrap();
        let router = index.get("router").unwrap();
        assert_eq!(
            uids(&index, index.common_ancestors(login, tokens).iter().copied()),
            vec!["core", "identity", "auth"]
        );
        assert_eq!(
            uids(&index, index.common_ancestors(login, posting).iter().copied()),
            vec!["core"]
        );
        assert!(index.common_ancestors(login, router).is_empty());
    }

    #[test]
    fn test_rank() {
        let system = nested_system();
        let index = ContainmentIndex::build(&system).unwrap();
        let rank = |uid| index.rank(index.get(uid).unwrap());
        assert_eq!(rank("core"), Level::Zone);
        assert_eq!(rank("identity"), Level::Domain);
        assert_eq!(rank("auth"), Level::Module);
        assert_eq!(rank("login"), Level::Component);

        let system = sample_system();
        let index = ContainmentIndex::build(&system).unwrap();
        assert_eq!(index.rank(index.get("stripe").unwrap()), Level::Module);
    }

    #[test]
    fn test_duplicate_uid_fails() {
        let system = System {
            version: String::new(),
            parts: vec![Part::domain("d", "D").with_children(vec![
                Part::module("m", "M"),
                Part::module("m", "M again"),
            ])],
            relations: vec![],
        };
        let err = ContainmentIndex::build(&system).unwrap_err();
        assert!(matches!(err, Error::DuplicateUid { ref uid } if uid == "m"));
    }

    #[test]
    fn test_invalid_containment_fails() {
        let component_at_top = System {
            parts: vec![Part::component("c", "C")],
            ..Default::default()
        };
        assert!(matches!(
            ContainmentIndex::build(&component_at_top),
            Err(Error::InvalidContainment { .. })
        ));

        let nested_external = System {
            parts: vec![Part::domain("d", "D").with_children(vec![Part::external("x", "X")])],
            ..Default::default()
        };
        assert!(matches!(
            ContainmentIndex::build(&nested_external),
            Err(Error::InvalidContainment { ref uid, .. }) if uid == "x"
        ));

        let component_with_children = System {
            parts: vec![Part::domain("d", "D").with_children(vec![Part::module("m", "M")
                .with_children(vec![Part::component("c", "C")
                    .with_children(vec![Part::component("cc", "CC")])])])],
            ..Default::default()
        };
        assert!(ContainmentIndex::build(&component_with_children).is_err());
    }

    #[test]
    fn test_links_resolve_or_fail() {
        let system = sample_system();
        let index = ContainmentIndex::build(&system).unwrap();
        let links = index.links(&system.relations).unwrap();
        assert_eq!(links.len(), system.relations.len());
        assert_eq!(index.uid(links[0].source), "orders-api");
        assert_eq!(index.uid(links[0].target), "catalog-api");

        let err = index.link(&Relation::ask("orders-api", "nowhere")).unwrap_err();
        match err {
            Error::UnknownEndpoint { uid, relation } => {
                assert_eq!(uid, "nowhere");
                assert_eq!(relation, "orders-api --ask--> nowhere");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_model_links_reject_domain_endpoints() {
        let mut system = sample_system();
        let index = ContainmentIndex::build(&system).unwrap();
        assert_eq!(index.model_links(&system.relations).unwrap().len(), 5);

        system.relations.push(Relation::ask("shop", "stripe"));
        let index = ContainmentIndex::build(&system).unwrap();
        let err = index.model_links(&system.relations).unwrap_err();
        assert!(err.is_construction_error());
        match err {
            Error::InvalidEndpoint { uid, kind, relation } => {
                assert_eq!(uid, "shop");
                assert_eq!(kind, "domain");
                assert_eq!(relation, "shop --ask--> stripe");
            }
            other => panic!("unexpected error: {other}"),
        }
        // routed views may end on domains
        assert_eq!(index.links(&system.relations).unwrap().len(), 6);
    }
}
