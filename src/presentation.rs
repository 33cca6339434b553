//! Presentation trees built from effective parent-child relationships.

use crate::error::{Diagnostics, Error, ErrorKind, Result};
use crate::linkbase::Relationship;
use crate::model::*;
use crate::taxonomy::Taxonomy;
use ahash::{AHashMap, AHashSet};
use rust_decimal::Decimal;
use serde::Serialize;

/// One presentation role as an arena of nodes in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationTree {
    pub role: String,
    /// `link:definition` of the role type, when declared.
    pub definition: Option<String>,
    /// Depth-first preorder; siblings follow arc `order`.
    pub nodes: Vec<PresentationNode>,
    pub roots: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationNode {
    pub concept: QName,
    pub preferred_label: Option<String>,
    pub order: Decimal,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub is_abstract: bool,
}

struct Edge<'r> {
    child: &'r QName,
    order: Decimal,
    sequence: usize,
    preferred_label: Option<&'r str>,
}

impl PresentationTree {
    pub(crate) fn build(
        role: &str,
        relationships: &[Relationship],
        taxonomy: &Taxonomy,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let arcs: Vec<&Relationship> = relationships
            .iter()
            .filter(|r| r.arcrole == arcroles::PARENT_CHILD)
            .collect();
        check_cycles(role, &arcs)?;

        // First parent in document order wins.
        let mut parent_of: AHashMap<&QName, &QName> = AHashMap::new();
        let mut edges: AHashMap<&QName, Vec<Edge<'_>>> = AHashMap::new();
        let mut first_seen: Vec<(&QName, usize)> = Vec::new();
        let mut seen: AHashSet<&QName> = AHashSet::new();

        for arc in &arcs {
            if seen.insert(&arc.from) {
                first_seen.push((&arc.from, arc.sequence));
            }
            match parent_of.get(&arc.to) {
                // A concept repeats under its parent only with another label role.
                Some(&parent) if parent == &arc.from => {
                    let repeated = edges.get(&arc.from).is_some_and(|children| {
                        children
                            .iter()
                            .any(|e| e.child == &arc.to && e.preferred_label == arc.preferred_label.as_deref())
                    });
                    if repeated {
                        continue;
                    }
                }
                Some(&parent) => {
                    diagnostics.warn(Error::at(
                        ErrorKind::InvalidXml,
                        arc.location.clone(),
                        format!(
                            "{} has parents {} and {} in role {role}; keeping {}",
                            arc.to, parent, arc.from, parent
                        ),
                    ));
                    continue;
                }
                None => {
                    parent_of.insert(&arc.to, &arc.from);
                }
            }
            edges.entry(&arc.from).or_default().push(Edge {
                child: &arc.to,
                order: arc.order,
                sequence: arc.sequence,
                preferred_label: arc.preferred_label.as_deref(),
            });
        }
        for children in edges.values_mut() {
            children.sort_by(|a, b| a.order.cmp(&b.order).then(a.sequence.cmp(&b.sequence)));
        }

        let mut tree = PresentationTree {
            role: role.to_string(),
            definition: taxonomy.role_type(role).and_then(|r| r.definition.clone()),
            nodes: Vec::new(),
            roots: Vec::new(),
        };

        first_seen.sort_by_key(|(_, sequence)| *sequence);
        for (root, _) in first_seen {
            if parent_of.contains_key(root) {
                continue;
            }
            let index = tree.push(root, None, Decimal::ONE, None, 0, taxonomy);
            tree.roots.push(index);
            tree.descend(index, &edges, taxonomy);
        }
        Ok(tree)
    }

    fn push(
        &mut self,
        concept: &QName,
        preferred_label: Option<&str>,
        order: Decimal,
        parent: Option<usize>,
        depth: usize,
        taxonomy: &Taxonomy,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(PresentationNode {
            concept: concept.clone(),
            preferred_label: preferred_label.map(str::to_string),
            order,
            depth,
            parent,
            children: Vec::new(),
            is_abstract: taxonomy.concept(concept).is_some_and(|c| c.is_abstract),
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(index);
        }
        index
    }

    fn descend(&mut self, index: usize, edges: &AHashMap<&QName, Vec<Edge<'_>>>, taxonomy: &Taxonomy) {
        let concept = self.nodes[index].concept.clone();
        let depth = self.nodes[index].depth;
        let Some(children) = edges.get(&concept) else {
            return;
        };
        for edge in children {
            let child = self.push(edge.child, edge.preferred_label, edge.order, Some(index), depth + 1, taxonomy);
            self.descend(child, edges, taxonomy);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Concepts in display order.
    pub fn concepts(&self) -> impl Iterator<Item = &QName> {
        self.nodes.iter().map(|n| &n.concept)
    }

    /// Other children of the node's parent; roots are siblings of each other.
    pub fn siblings(&self, index: usize) -> impl Iterator<Item = &PresentationNode> {
        let peers = match self.nodes[index].parent {
            Some(parent) => &self.nodes[parent].children,
            None => &self.roots,
        };
        peers
            .iter()
            .filter(move |&&i| i != index)
            .map(|&i| &self.nodes[i])
    }
}

fn check_cycles(role: &str, arcs: &[&Relationship]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        Grey,
        Black,
    }

    let mut adjacency: AHashMap<&QName, Vec<&Relationship>> = AHashMap::new();
    for &arc in arcs {
        adjacency.entry(&arc.from).or_default().push(arc);
    }

    let mut colors: AHashMap<&QName, Color> = AHashMap::new();
    for arc in arcs {
        if colors.contains_key(&arc.from) {
            continue;
        }
        // Iterative DFS; the stack holds (node, next child index).
        let mut stack: Vec<(&QName, usize)> = vec![(&arc.from, 0)];
        colors.insert(&arc.from, Color::Grey);
        while let Some((node, next)) = stack.last_mut() {
            let children = adjacency.get(*node).map(Vec::as_slice).unwrap_or_default();
            let Some(&edge) = children.get(*next) else {
                colors.insert(*node, Color::Black);
                stack.pop();
                continue;
            };
            *next += 1;
            let child = &edge.to;
            match colors.get(child) {
                Some(Color::Grey) => {
                    let start = stack.iter().position(|(n, _)| *n == child).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..].iter().map(|(n, _)| n.to_string()).collect();
                    path.push(child.to_string());
                    return Err(Error::at(
                        ErrorKind::PresentationCycle,
                        edge.location.clone(),
                        format!("cycle in presentation role {role}: {}", path.join(" -> ")),
                    ));
                }
                Some(Color::Black) => {}
                None => {
                    colors.insert(child, Color::Grey);
                    stack.push((child, 0));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;
    use crate::linkbase::ArcKind;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn rel(from: &str, to: &str, order: i64, sequence: usize) -> Relationship {
        Relationship {
            kind: ArcKind::Presentation,
            role: "urn:role".into(),
            arcrole: arcroles::PARENT_CHILD.into(),
            from: QName::new("urn:fin", from),
            to: QName::new("urn:fin", to),
            order: Decimal::from(order),
            priority: 0,
            prohibited: false,
            preferred_label: None,
            weight: None,
            sequence,
            location: Location::at(Path::new("entity_pre.xml"), sequence + 10),
        }
    }

    fn build(arcs: &[Relationship]) -> (Result<PresentationTree>, Vec<crate::error::Warning>) {
        let mut diagnostics = Diagnostics::default();
        let tree = PresentationTree::build("urn:role", arcs, &Taxonomy::default(), &mut diagnostics);
        (tree, diagnostics.into_warnings())
    }

    fn outline(tree: &PresentationTree) -> Vec<(String, usize)> {
        tree.nodes
            .iter()
            .map(|n| (n.concept.local_name.to_string(), n.depth))
            .collect()
    }

    #[test]
    fn test_preorder_follows_arc_order() {
        let arcs = vec![
            rel("Statement", "Liabilities", 2, 0),
            rel("Statement", "Assets", 1, 1),
            rel("Assets", "Inventories", 2, 2),
            rel("Assets", "Cash", 1, 3),
        ];
        let (tree, warnings) = build(&arcs);
        let tree = tree.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(
            outline(&tree),
            vec![
                ("Statement".to_string(), 0),
                ("Assets".to_string(), 1),
                ("Cash".to_string(), 2),
                ("Inventories".to_string(), 2),
                ("Liabilities".to_string(), 1),
            ]
        );
        assert_eq!(tree.roots, vec![0]);
        assert_eq!(tree.nodes[2].parent, Some(1));
        assert_eq!(tree.siblings(2).count(), 1);
    }

    #[test]
    fn test_equal_order_keeps_document_order() {
        let arcs = vec![rel("Root", "B", 1, 0), rel("Root", "A", 1, 1)];
        let (tree, _) = build(&arcs);
        let names: Vec<_> = outline(&tree.unwrap()).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Root", "B", "A"]);
    }

    #[test]
    fn test_second_parent_is_dropped() {
        let arcs = vec![
            rel("Root", "Assets", 1, 0),
            rel("Root", "Equity", 2, 1),
            rel("Assets", "Cash", 1, 2),
            rel("Equity", "Cash", 1, 3),
        ];
        let (tree, warnings) = build(&arcs);
        let tree = tree.unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.nodes[2].concept.local_name, "Cash");
        assert_eq!(tree.nodes[2].parent, Some(1));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("entity_pre.xml:13"), "{}", warnings[0]);
    }

    #[test]
    fn test_concept_repeats_under_parent_with_other_label_role() {
        let mut opening = rel("CashFlows", "Cash", 1, 0);
        opening.preferred_label = Some(roles::PERIOD_START.to_string());
        let mut closing = rel("CashFlows", "Cash", 3, 2);
        closing.preferred_label = Some(roles::PERIOD_END.to_string());
        let mut again = rel("CashFlows", "Cash", 4, 3);
        again.preferred_label = Some(roles::PERIOD_END.to_string());
        let arcs = vec![opening, rel("CashFlows", "Increase", 2, 1), closing, again];

        let (tree, warnings) = build(&arcs);
        let tree = tree.unwrap();
        assert!(warnings.is_empty());
        let labels: Vec<_> = tree
            .nodes
            .iter()
            .map(|n| (n.concept.local_name.to_string(), n.preferred_label.clone()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("CashFlows".to_string(), None),
                ("Cash".to_string(), Some(roles::PERIOD_START.to_string())),
                ("Increase".to_string(), None),
                ("Cash".to_string(), Some(roles::PERIOD_END.to_string())),
            ]
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let arcs = vec![rel("A", "B", 1, 0), rel("B", "C", 1, 1), rel("C", "A", 1, 2)];
        let (tree, _) = build(&arcs);
        let err = tree.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PresentationCycle);
        assert!(err.message().contains("{urn:fin}C -> {urn:fin}A"), "{}", err.message());
        assert!(err.message().ends_with("(entity_pre.xml:12)"), "{}", err.message());
        assert_eq!(err.location().and_then(|l| l.line), Some(12));
    }

    #[test]
    fn test_multiple_roots_in_first_seen_order() {
        let arcs = vec![rel("Second", "X", 1, 0), rel("First", "Y", 1, 1)];
        let (tree, _) = build(&arcs);
        let tree = tree.unwrap();
        let roots: Vec<_> = tree.roots.iter().map(|&i| tree.nodes[i].concept.local_name.to_string()).collect();
        assert_eq!(roots, vec!["Second", "First"]);
    }
}
