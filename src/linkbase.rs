// Linkbase processing for XBRL
use crate::config::ParseOptions;
use crate::error::{Diagnostics, Error, ErrorKind, Location, Result};
use crate::model::*;
use crate::presentation::PresentationTree;
use crate::taxonomy::Taxonomy;
use crate::xml::{parse_tree, Element, XmlSource, NS_LINK, NS_XLINK, NS_XML};
use ahash::{AHashMap, AHashSet};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcKind {
    Presentation,
    Calculation,
    Definition,
}

/// Relationship between two concepts inside one extended link role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    pub kind: ArcKind,
    /// Extended link role (for presentation, the statement role URI).
    pub role: String,
    pub arcrole: String,
    pub from: QName,
    pub to: QName,
    pub order: Decimal,
    pub priority: i32,
    pub prohibited: bool,
    pub preferred_label: Option<String>,
    pub weight: Option<Decimal>,
    /// Position across every linkbase loaded, for document-order tie breaks.
    pub sequence: usize,
    /// Arc element the relationship was read from.
    pub location: Location,
}

/// `role → lang → text` for one concept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelSet {
    by_role: BTreeMap<String, BTreeMap<String, String>>,
}

impl LabelSet {
    pub fn insert(&mut self, role: &str, lang: &str, text: String) {
        self.by_role
            .entry(role.to_string())
            .or_default()
            .entry(lang.to_string())
            .or_insert(text);
    }

    pub fn get(&self, role: &str, lang: &str) -> Option<&str> {
        self.by_role
            .get(role)
            .and_then(|langs| langs.get(lang))
            .map(String::as_str)
    }

    /// First label of `role` in `languages`, where a tag also matches its
    /// subtags (`ko` matches `ko-KR`).
    pub fn find(&self, role: &str, languages: &[&str]) -> Option<&str> {
        let langs = self.by_role.get(role)?;
        languages.iter().find_map(|wanted| {
            langs
                .iter()
                .find(|(lang, _)| language_matches(lang, wanted))
                .map(|(_, text)| text.as_str())
        })
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.by_role.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_role.is_empty()
    }
}

fn language_matches(lang: &str, wanted: &str) -> bool {
    lang.eq_ignore_ascii_case(wanted)
        || (lang.len() > wanted.len()
            && lang.as_bytes()[wanted.len()] == b'-'
            && lang[..wanted.len()].eq_ignore_ascii_case(wanted))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub role: String,
    pub parts: BTreeMap<String, String>,
}

/// Everything resolved from the filing's linkbases.
#[derive(Debug, Clone, Default)]
pub struct Linkbases {
    pub labels: AHashMap<QName, LabelSet>,
    pub references: AHashMap<QName, Vec<Reference>>,
    pub presentation: BTreeMap<String, PresentationTree>,
    pub calculation: Vec<Relationship>,
    pub definition: Vec<Relationship>,
    summations: AHashMap<QName, AHashSet<QName>>,
    dimension_defaults: AHashMap<QName, QName>,
}

impl Linkbases {
    pub fn labels_for(&self, concept: &QName) -> Option<&LabelSet> {
        self.labels.get(concept)
    }

    /// Label for `concept`: `preferred_role` first, then the standard role,
    /// each tried in `languages` order.
    pub fn label(&self, concept: &QName, preferred_role: Option<&str>, languages: &[&str]) -> Option<&str> {
        let set = self.labels.get(concept)?;
        preferred_role
            .and_then(|role| set.find(role, languages))
            .or_else(|| set.find(roles::STANDARD, languages))
    }

    /// Children of `parent` across every calculation network.
    pub fn summation_children(&self, parent: &QName) -> Option<&AHashSet<QName>> {
        self.summations.get(parent)
    }

    pub fn dimension_default(&self, dimension: &QName) -> Option<&QName> {
        self.dimension_defaults.get(dimension)
    }

    pub fn presentation_tree(&self, role: &str) -> Option<&PresentationTree> {
        self.presentation.get(role)
    }
}

enum Endpoint {
    Concepts(Vec<QName>),
    Labels(Vec<(String, String, String)>),
    References(Vec<Reference>),
    Dropped,
}

pub struct LinkbaseProcessor<'a> {
    taxonomy: &'a Taxonomy,
    options: &'a ParseOptions,
    filing_dir: PathBuf,
    visited: AHashSet<PathBuf>,
    labels: AHashMap<QName, LabelSet>,
    references: AHashMap<QName, Vec<Reference>>,
    relationships: Vec<Relationship>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> LinkbaseProcessor<'a> {
    pub(crate) fn new(
        taxonomy: &'a Taxonomy,
        options: &'a ParseOptions,
        filing_dir: &Path,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            taxonomy,
            options,
            filing_dir: filing_dir.to_path_buf(),
            visited: AHashSet::new(),
            labels: AHashMap::new(),
            references: AHashMap::new(),
            relationships: Vec::new(),
            diagnostics,
        }
    }

    /// Loads a linkbase file once; repeated paths are ignored.
    pub fn load_linkbase(&mut self, path: &Path) -> Result<()> {
        let path = crate::schema::canonical(path);
        if !self.visited.insert(path.clone()) {
            return Ok(());
        }
        let source = XmlSource::open(&path)?;
        self.parse_linkbase(source.bytes(), &path)
    }

    pub fn parse_linkbase(&mut self, data: &[u8], path: &Path) -> Result<()> {
        let root = parse_tree(data, path)?;
        if !root.is(NS_LINK, "linkbase") {
            return Err(Error::at(
                ErrorKind::InvalidXml,
                root.location(path),
                format!("root element {} is not link:linkbase", root.name),
            ));
        }
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let before = self.relationships.len();

        for link in &root.children {
            if link.namespace() != NS_LINK {
                continue;
            }
            let kind = match link.local_name() {
                "presentationLink" => Some(ArcKind::Presentation),
                "calculationLink" => Some(ArcKind::Calculation),
                "definitionLink" => Some(ArcKind::Definition),
                "labelLink" | "referenceLink" => None,
                _ => continue,
            };
            self.extended_link(link, kind, path, &base_dir)?;
        }

        debug!(
            path = %path.display(),
            relationships = self.relationships.len() - before,
            "loaded linkbase"
        );
        Ok(())
    }

    fn extended_link(
        &mut self,
        link: &Element,
        kind: Option<ArcKind>,
        path: &Path,
        base_dir: &Path,
    ) -> Result<()> {
        let role = link.attr_ns(NS_XLINK, "role").unwrap_or(roles::LINK).to_string();
        let mut endpoints: AHashMap<&str, Endpoint> = AHashMap::new();
        let mut arcs = Vec::new();

        for child in &link.children {
            let Some(label) = child.attr_ns(NS_XLINK, "label") else {
                if child.attr_ns(NS_XLINK, "type") == Some("arc") {
                    arcs.push(child);
                }
                continue;
            };
            match child.attr_ns(NS_XLINK, "type") {
                Some("locator") => {
                    let href = child.attr_ns(NS_XLINK, "href").unwrap_or_default();
                    let resolved = self
                        .taxonomy
                        .resolve_locator(href, base_dir, &self.filing_dir)
                        .map(|c| c.qname.clone());
                    match resolved {
                        Some(qname) => push_concept(&mut endpoints, label, qname),
                        None => {
                            self.diagnostics.escalate(
                                !self.options.lenient_locators,
                                Error::at(
                                    ErrorKind::UnresolvedLocator,
                                    child.location(path),
                                    format!("locator '{label}' points at unknown concept '{href}'"),
                                ),
                            )?;
                            endpoints.entry(label).or_insert(Endpoint::Dropped);
                        }
                    }
                }
                Some("resource") => {
                    if child.is(NS_LINK, "label") {
                        let lang = child.attr_ns(NS_XML, "lang").unwrap_or_default().to_string();
                        let label_role = child.attr_ns(NS_XLINK, "role").unwrap_or(roles::STANDARD).to_string();
                        let text = if child.children.is_empty() {
                            child.trimmed_text().to_string()
                        } else {
                            child.inner_xml()
                        };
                        if let Endpoint::Labels(labels) = endpoints
                            .entry(label)
                            .or_insert_with(|| Endpoint::Labels(Vec::new()))
                        {
                            labels.push((label_role, lang, text));
                        }
                    } else if child.is(NS_LINK, "reference") {
                        let reference = Reference {
                            role: child.attr_ns(NS_XLINK, "role").unwrap_or(roles::REFERENCE).to_string(),
                            parts: child
                                .children
                                .iter()
                                .map(|p| (p.local_name().to_string(), p.trimmed_text().to_string()))
                                .collect(),
                        };
                        if let Endpoint::References(refs) = endpoints
                            .entry(label)
                            .or_insert_with(|| Endpoint::References(Vec::new()))
                        {
                            refs.push(reference);
                        }
                    }
                }
                _ => {}
            }
        }

        for arc in arcs {
            let from = arc.attr_ns(NS_XLINK, "from").unwrap_or_default();
            let to = arc.attr_ns(NS_XLINK, "to").unwrap_or_default();
            let (Some(source), Some(target)) = (endpoints.get(from), endpoints.get(to)) else {
                let err = Error::at(
                    ErrorKind::InvalidXml,
                    arc.location(path),
                    format!("arc {from} -> {to} references an undefined label"),
                );
                self.diagnostics.warn(err);
                continue;
            };
            let Endpoint::Concepts(sources) = source else {
                continue;
            };

            match (target, kind) {
                (Endpoint::Labels(labels), _) => {
                    for concept in sources {
                        let set = self.labels.entry(concept.clone()).or_default();
                        for (role, lang, text) in labels {
                            set.insert(role, lang, text.clone());
                        }
                    }
                }
                (Endpoint::References(refs), _) => {
                    for concept in sources {
                        self.references
                            .entry(concept.clone())
                            .or_default()
                            .extend(refs.iter().cloned());
                    }
                }
                (Endpoint::Concepts(targets), Some(kind)) => {
                    let order = match arc.attr("order") {
                        None => Decimal::ONE,
                        Some(raw) => parse_decimal(raw).ok_or_else(|| {
                            Error::at(
                                ErrorKind::InvalidDecimal,
                                arc.location(path),
                                format!("arc order '{raw}' is not a decimal"),
                            )
                        })?,
                    };
                    let weight = match arc.attr("weight") {
                        None => None,
                        Some(raw) => Some(parse_decimal(raw).ok_or_else(|| {
                            Error::at(
                                ErrorKind::InvalidDecimal,
                                arc.location(path),
                                format!("arc weight '{raw}' is not a decimal"),
                            )
                        })?),
                    };
                    for from in sources {
                        for to in targets {
                            let sequence = self.relationships.len();
                            self.relationships.push(Relationship {
                                kind,
                                role: role.clone(),
                                arcrole: arc.attr_ns(NS_XLINK, "arcrole").unwrap_or_default().to_string(),
                                from: from.clone(),
                                to: to.clone(),
                                order,
                                priority: arc.attr("priority").and_then(|p| p.trim().parse().ok()).unwrap_or(0),
                                prohibited: arc.attr("use").map(str::trim) == Some("prohibited"),
                                preferred_label: arc.attr("preferredLabel").map(str::to_string),
                                weight,
                                sequence,
                                location: arc.location(path),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Applies arc overriding and builds the presentation trees.
    pub fn finish(self) -> Result<Linkbases> {
        let effective = effective_relationships(self.relationships);

        let mut presentation_arcs: BTreeMap<String, Vec<Relationship>> = BTreeMap::new();
        let mut calculation = Vec::new();
        let mut definition = Vec::new();
        for rel in effective {
            match rel.kind {
                ArcKind::Presentation => presentation_arcs.entry(rel.role.clone()).or_default().push(rel),
                ArcKind::Calculation => calculation.push(rel),
                ArcKind::Definition => definition.push(rel),
            }
        }

        let mut presentation = BTreeMap::new();
        for (role, arcs) in presentation_arcs {
            let tree = PresentationTree::build(&role, &arcs, self.taxonomy, self.diagnostics)?;
            presentation.insert(role, tree);
        }

        let mut summations: AHashMap<QName, AHashSet<QName>> = AHashMap::new();
        for rel in calculation.iter().filter(|r| r.arcrole == arcroles::SUMMATION_ITEM) {
            summations.entry(rel.from.clone()).or_default().insert(rel.to.clone());
        }
        let dimension_defaults = definition
            .iter()
            .filter(|r| r.arcrole == arcroles::DIMENSION_DEFAULT)
            .map(|r| (r.from.clone(), r.to.clone()))
            .collect();

        Ok(Linkbases {
            labels: self.labels,
            references: self.references,
            presentation,
            calculation,
            definition,
            summations,
            dimension_defaults,
        })
    }
}

fn push_concept<'e>(endpoints: &mut AHashMap<&'e str, Endpoint>, label: &'e str, qname: QName) {
    let slot = endpoints
        .entry(label)
        .or_insert_with(|| Endpoint::Concepts(Vec::new()));
    if matches!(slot, Endpoint::Dropped) {
        *slot = Endpoint::Concepts(Vec::new());
    }
    if let Endpoint::Concepts(concepts) = slot {
        concepts.push(qname);
    }
}

/// XBRL 2.1 relationship overriding: among equivalent arcs the highest
/// priority wins, and a winning prohibition removes the relationship.
/// Arcs are equivalent when they share link role, arcrole, endpoints and
/// order. Survivors keep document order.
fn effective_relationships(relationships: Vec<Relationship>) -> Vec<Relationship> {
    type Key<'r> = (ArcKind, &'r str, &'r str, &'r QName, &'r QName, Decimal);
    let mut winners: AHashMap<Key<'_>, usize> = AHashMap::new();
    for (i, rel) in relationships.iter().enumerate() {
        let key = (
            rel.kind,
            rel.role.as_str(),
            rel.arcrole.as_str(),
            &rel.from,
            &rel.to,
            rel.order.normalize(),
        );
        winners
            .entry(key)
            .and_modify(|best| {
                let current = &relationships[*best];
                let beats = rel.priority > current.priority
                    || (rel.priority == current.priority && rel.prohibited && !current.prohibited);
                if beats {
                    *best = i;
                }
            })
            .or_insert(i);
    }

    let keep: AHashSet<usize> = winners
        .values()
        .copied()
        .filter(|&i| !relationships[i].prohibited)
        .collect();
    relationships
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, rel)| rel)
        .collect()
}

/// Location of a linkbase referenced by href, or `None` when it is not part
/// of the filing.
pub(crate) fn linkbase_path(href: &str, base_dir: &Path, filing_dir: &Path) -> Option<PathBuf> {
    let location = href.split('#').next().unwrap_or(href);
    match crate::schema::resolve_location(location, base_dir, filing_dir) {
        crate::schema::Resolved::Local(path) => Some(path),
        crate::schema::Resolved::Missing(_) => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::{canonical, SchemaDocument};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    pub(crate) const FIN_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:xbrldt="http://xbrl.org/2005/xbrldt"
    xmlns:fin="urn:fin" targetNamespace="urn:fin">
  <xs:element name="StatementAbstract" id="fin_StatementAbstract" type="xbrli:stringItemType"
      substitutionGroup="xbrli:item" xbrli:periodType="duration" abstract="true"/>
  <xs:element name="Assets" id="fin_Assets" type="xbrli:monetaryItemType"
      substitutionGroup="xbrli:item" xbrli:periodType="instant" xbrli:balance="debit"/>
  <xs:element name="CurrentAssets" id="fin_CurrentAssets" type="xbrli:monetaryItemType"
      substitutionGroup="xbrli:item" xbrli:periodType="instant" xbrli:balance="debit"/>
  <xs:element name="Cash" id="fin_Cash" type="xbrli:monetaryItemType"
      substitutionGroup="xbrli:item" xbrli:periodType="instant" xbrli:balance="debit"/>
  <xs:element name="Inventories" id="fin_Inventories" type="xbrli:monetaryItemType"
      substitutionGroup="xbrli:item" xbrli:periodType="instant" xbrli:balance="debit"/>
  <xs:element name="Revenue" id="fin_Revenue" type="xbrli:monetaryItemType"
      substitutionGroup="xbrli:item" xbrli:periodType="duration" xbrli:balance="credit"/>
  <xs:element name="ScopeAxis" id="fin_ScopeAxis" type="xbrli:stringItemType"
      substitutionGroup="xbrldt:dimensionItem" xbrli:periodType="duration" abstract="true"/>
  <xs:element name="ConsolidatedMember" id="fin_ConsolidatedMember" type="xbrli:stringItemType"
      substitutionGroup="xbrli:item" xbrli:periodType="duration" abstract="true"/>
</xs:schema>"#;

    pub(crate) fn linkbase(links: &str) -> String {
        format!(
            r#"<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"
    xmlns:xlink="http://www.w3.org/1999/xlink"
    xmlns:xml="http://www.w3.org/XML/1998/namespace">
{links}
</link:linkbase>"#
        )
    }

    pub(crate) fn loc(label: &str, id: &str) -> String {
        format!(r#"<link:loc xlink:type="locator" xlink:href="fin.xsd#{id}" xlink:label="{label}"/>"#)
    }

    /// A filing directory holding `fin.xsd`, and the taxonomy built from it.
    pub(crate) fn fin_taxonomy() -> (TempDir, Taxonomy) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fin.xsd");
        std::fs::write(&path, FIN_XSD).unwrap();
        let schema = SchemaDocument::parse(FIN_XSD.as_bytes(), &canonical(&path)).unwrap();
        let taxonomy = Taxonomy::build(&[schema]).unwrap();
        (dir, taxonomy)
    }

    fn process(dir: &Path, taxonomy: &Taxonomy, options: &ParseOptions, files: &[&str]) -> (Result<Linkbases>, Vec<crate::error::Warning>) {
        let mut diagnostics = Diagnostics::default();
        let result = (|| {
            let mut processor = LinkbaseProcessor::new(taxonomy, options, dir, &mut diagnostics);
            for (i, content) in files.iter().enumerate() {
                let path = dir.join(format!("lb{i}.xml"));
                std::fs::write(&path, content).unwrap();
                processor.load_linkbase(&path)?;
            }
            processor.finish()
        })();
        (result, diagnostics.into_warnings())
    }

    fn fin(local: &str) -> QName {
        QName::new("urn:fin", local)
    }

    #[test]
    fn test_labels_by_role_and_language() {
        let (dir, taxonomy) = fin_taxonomy();
        let labels = linkbase(&format!(
            r#"<link:labelLink xlink:type="extended" xlink:role="http://www.xbrl.org/2003/role/link">
  {}
  <link:label xlink:type="resource" xlink:label="lab_Assets" xml:lang="ko">자산총계</link:label>
  <link:label xlink:type="resource" xlink:label="lab_Assets" xml:lang="en-US">Total assets</link:label>
  <link:label xlink:type="resource" xlink:label="lab_Assets" xml:lang="en"
      xlink:role="http://www.xbrl.org/2003/role/terseLabel">Assets</link:label>
  <link:labelArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/concept-label"
      xlink:from="Assets" xlink:to="lab_Assets"/>
</link:labelLink>"#,
            loc("Assets", "fin_Assets")
        ));
        let (result, warnings) = process(dir.path(), &taxonomy, &ParseOptions::default(), &[&labels]);
        let linkbases = result.unwrap();
        assert!(warnings.is_empty());

        let assets = fin("Assets");
        assert_eq!(linkbases.label(&assets, None, &["ko", "en"]), Some("자산총계"));
        assert_eq!(linkbases.label(&assets, None, &["en"]), Some("Total assets"));
        assert_eq!(linkbases.label(&assets, Some(roles::TERSE), &["en"]), Some("Assets"));
        // Terse only exists in English; Korean falls back to the standard role.
        assert_eq!(linkbases.label(&assets, Some(roles::TERSE), &["ko"]), Some("자산총계"));
        assert_eq!(linkbases.label(&fin("Cash"), None, &["ko"]), None);
    }

    fn presentation_link(arcs: &str, locs: &[(&str, &str)]) -> String {
        let locs: String = locs.iter().map(|(l, id)| loc(l, id)).collect();
        format!(
            r#"<link:presentationLink xlink:type="extended" xlink:role="urn:role:bs">
{locs}
{arcs}
</link:presentationLink>"#
        )
    }

    fn arc(from: &str, to: &str, extra: &str) -> String {
        format!(
            r#"<link:presentationArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/parent-child"
    xlink:from="{from}" xlink:to="{to}" {extra}/>"#
        )
    }

    #[test]
    fn test_prohibition_removes_relationship() {
        let (dir, taxonomy) = fin_taxonomy();
        let base = linkbase(&presentation_link(
            &(arc("Assets", "Cash", r#"order="1""#) + &arc("Assets", "Inventories", r#"order="2""#)),
            &[("Assets", "fin_Assets"), ("Cash", "fin_Cash"), ("Inventories", "fin_Inventories")],
        ));
        let extension = linkbase(&presentation_link(
            &arc("Assets", "Inventories", r#"order="2" use="prohibited" priority="1""#),
            &[("Assets", "fin_Assets"), ("Inventories", "fin_Inventories")],
        ));
        let (result, _) = process(dir.path(), &taxonomy, &ParseOptions::default(), &[&base, &extension]);
        let linkbases = result.unwrap();

        let tree = linkbases.presentation_tree("urn:role:bs").unwrap();
        let concepts: Vec<String> = tree.nodes.iter().map(|n| n.concept.local_name.to_string()).collect();
        assert_eq!(concepts, vec!["Assets", "Cash"]);
    }

    #[test]
    fn test_prohibition_must_match_order() {
        let (dir, taxonomy) = fin_taxonomy();
        let base = linkbase(&presentation_link(
            &(arc("Assets", "Cash", r#"order="1""#) + &arc("Assets", "Inventories", r#"order="2""#)),
            &[("Assets", "fin_Assets"), ("Cash", "fin_Cash"), ("Inventories", "fin_Inventories")],
        ));
        let prohibit = |order: &str| {
            linkbase(&presentation_link(
                &arc("Assets", "Inventories", &format!(r#"order="{order}" use="prohibited" priority="1""#)),
                &[("Assets", "fin_Assets"), ("Inventories", "fin_Inventories")],
            ))
        };
        let concepts = |extension: &str| {
            let (result, _) = process(dir.path(), &taxonomy, &ParseOptions::default(), &[base.as_str(), extension]);
            let linkbases = result.unwrap();
            let tree = linkbases.presentation_tree("urn:role:bs").unwrap();
            tree.nodes
                .iter()
                .map(|n| n.concept.local_name.to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(concepts(&prohibit("3")), vec!["Assets", "Cash", "Inventories"]);
        assert_eq!(concepts(&prohibit("2.0")), vec!["Assets", "Cash"]);
    }

    #[test]
    fn test_unresolved_locator_strict_and_lenient() {
        let (dir, taxonomy) = fin_taxonomy();
        let content = linkbase(&presentation_link(
            &(arc("Assets", "Cash", "") + &arc("Assets", "Ghost", "")),
            &[("Assets", "fin_Assets"), ("Cash", "fin_Cash"), ("Ghost", "fin_Ghost")],
        ));

        let (result, _) = process(dir.path(), &taxonomy, &ParseOptions::default(), &[&content]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedLocator);
        assert!(err.message().contains("lb0.xml:"));

        let lenient = ParseOptions::default().with_lenient_locators(true);
        let (result, warnings) = process(dir.path(), &taxonomy, &lenient, &[&content]);
        let linkbases = result.unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, ErrorKind::UnresolvedLocator);
        assert_eq!(linkbases.presentation_tree("urn:role:bs").unwrap().nodes.len(), 2);
    }

    #[test]
    fn test_bad_arc_order() {
        let (dir, taxonomy) = fin_taxonomy();
        let content = linkbase(&presentation_link(
            &arc("Assets", "Cash", r#"order="first""#),
            &[("Assets", "fin_Assets"), ("Cash", "fin_Cash")],
        ));
        let (result, _) = process(dir.path(), &taxonomy, &ParseOptions::default(), &[&content]);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidDecimal);
    }

    #[test]
    fn test_calculation_and_dimension_defaults() {
        let (dir, taxonomy) = fin_taxonomy();
        let content = linkbase(&format!(
            r#"<link:calculationLink xlink:type="extended" xlink:role="urn:role:bs">
  {}{}{}
  <link:calculationArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/summation-item"
      xlink:from="CurrentAssets" xlink:to="Cash" weight="1.0" order="1"/>
  <link:calculationArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/summation-item"
      xlink:from="CurrentAssets" xlink:to="Inventories" weight="1.0" order="2"/>
</link:calculationLink>
<link:definitionLink xlink:type="extended" xlink:role="urn:role:bs">
  {}{}
  <link:definitionArc xlink:type="arc" xlink:arcrole="http://xbrl.org/int/dim/arcrole/dimension-default"
      xlink:from="Axis" xlink:to="Member"/>
</link:definitionLink>"#,
            loc("CurrentAssets", "fin_CurrentAssets"),
            loc("Cash", "fin_Cash"),
            loc("Inventories", "fin_Inventories"),
            loc("Axis", "fin_ScopeAxis"),
            loc("Member", "fin_ConsolidatedMember"),
        ));
        let (result, _) = process(dir.path(), &taxonomy, &ParseOptions::default(), &[&content]);
        let linkbases = result.unwrap();

        let children = linkbases.summation_children(&fin("CurrentAssets")).unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.contains(&fin("Inventories")));
        assert_eq!(linkbases.calculation[0].weight, Some(Decimal::ONE));
        assert_eq!(
            linkbases.dimension_default(&fin("ScopeAxis")),
            Some(&fin("ConsolidatedMember"))
        );
    }

    #[test]
    fn test_language_subtag_matching() {
        assert!(language_matches("ko-KR", "ko"));
        assert!(language_matches("EN", "en"));
        assert!(!language_matches("kok", "ko"));
    }
}
