use crate::error::{Error, ErrorKind, Location, Result};
use crate::model::*;
use crate::schema::{canonical, resolve_location, ElementDeclaration, Resolved, RoleType, SchemaDocument, NS_XBRLDT};
use crate::xml::NS_XBRLI;
use ahash::AHashMap;
use compact_str::CompactString;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Longest derivation chain followed for types and substitution groups.
const MAX_DERIVATION_DEPTH: usize = 16;

/// Concept dictionary assembled from every loaded schema.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    concepts: Vec<Concept>,
    index: AHashMap<QName, usize>,
    /// (canonical schema path, element id) → concept
    by_location: AHashMap<(PathBuf, CompactString), usize>,
    /// element id → concept, `None` when the id is ambiguous
    by_id: AHashMap<CompactString, Option<usize>>,
    role_types: BTreeMap<String, RoleType>,
    schema_paths: Vec<PathBuf>,
    linkbase_refs: Vec<(PathBuf, String)>,
}

impl Taxonomy {
    pub fn build(schemas: &[SchemaDocument]) -> Result<Self> {
        let declarations: AHashMap<&QName, &ElementDeclaration> = schemas
            .iter()
            .flat_map(|s| s.elements.iter())
            .map(|d| (&d.qname, d))
            .collect();
        let type_bases: AHashMap<&QName, &QName> = schemas
            .iter()
            .flat_map(|s| s.type_bases.iter())
            .map(|(name, base)| (name, base))
            .collect();

        let mut taxonomy = Taxonomy::default();
        for schema in schemas {
            taxonomy.schema_paths.push(schema.path.clone());
            let dir = schema.path.parent().map(Path::to_path_buf).unwrap_or_default();
            for href in &schema.linkbase_refs {
                taxonomy.linkbase_refs.push((dir.clone(), href.clone()));
            }
            for role in &schema.role_types {
                taxonomy.role_types.entry(role.uri.clone()).or_insert_with(|| role.clone());
            }

            for decl in &schema.elements {
                let Some(group) = substitution_group(decl, &declarations) else {
                    continue;
                };
                let concept = Concept {
                    qname: decl.qname.clone(),
                    id: decl.id.clone(),
                    data_type: data_type(decl.type_name.as_ref(), &type_bases),
                    type_name: decl.type_name.clone(),
                    period_type: decl.period_type,
                    balance: decl.balance,
                    is_abstract: decl.is_abstract,
                    nillable: decl.nillable,
                    substitution_group: group,
                };
                taxonomy.insert(concept, &schema.path, decl.line)?;
            }
        }
        Ok(taxonomy)
    }

    fn insert(&mut self, concept: Concept, schema_path: &Path, line: usize) -> Result<()> {
        let index = match self.index.get(&concept.qname) {
            Some(&existing) => {
                if !self.concepts[existing].same_definition(&concept) {
                    return Err(Error::at(
                        ErrorKind::ConflictingConceptDefinition,
                        Location::at(schema_path, line),
                        format!("{} is declared twice with different definitions", concept.qname),
                    ));
                }
                existing
            }
            None => {
                let index = self.concepts.len();
                self.index.insert(concept.qname.clone(), index);
                self.concepts.push(concept);
                index
            }
        };

        if let Some(id) = self.concepts[index].id.clone() {
            self.by_location
                .insert((schema_path.to_path_buf(), id.clone()), index);
            self.by_id
                .entry(id)
                .and_modify(|slot| {
                    if *slot != Some(index) {
                        *slot = None;
                    }
                })
                .or_insert(Some(index));
        }
        Ok(())
    }

    pub fn concept(&self, qname: &QName) -> Option<&Concept> {
        self.index.get(qname).map(|&i| &self.concepts[i])
    }

    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn role_type(&self, uri: &str) -> Option<&RoleType> {
        self.role_types.get(uri)
    }

    pub fn schema_paths(&self) -> &[PathBuf] {
        &self.schema_paths
    }

    /// `linkbaseRef` hrefs found in schemas, with the directory they are
    /// relative to.
    pub fn linkbase_refs(&self) -> &[(PathBuf, String)] {
        &self.linkbase_refs
    }

    /// Resolves a locator `href` (`schema.xsd#element_id`) written in a file
    /// located in `base_dir`.
    pub fn resolve_locator(&self, href: &str, base_dir: &Path, filing_dir: &Path) -> Option<&Concept> {
        let (location, fragment) = href.trim().split_once('#')?;
        if fragment.is_empty() {
            return None;
        }
        let fragment = CompactString::from(fragment);

        let schema_path = if location.is_empty() {
            None
        } else {
            match resolve_location(location, base_dir, filing_dir) {
                Resolved::Local(path) => Some(path),
                Resolved::Missing(_) => None,
            }
        };
        if let Some(path) = schema_path {
            if let Some(&i) = self.by_location.get(&(canonical(&path), fragment.clone())) {
                return Some(&self.concepts[i]);
            }
        }
        match self.by_id.get(&fragment) {
            Some(Some(i)) => Some(&self.concepts[*i]),
            _ => None,
        }
    }
}

fn substitution_group(
    decl: &ElementDeclaration,
    declarations: &AHashMap<&QName, &ElementDeclaration>,
) -> Option<SubstitutionGroup> {
    let mut current = decl.substitution_group.as_ref()?;
    for _ in 0..MAX_DERIVATION_DEPTH {
        let group = match (current.namespace.as_str(), current.local_name.as_str()) {
            (NS_XBRLI, "item") => Some(SubstitutionGroup::Item),
            (NS_XBRLI, "tuple") => Some(SubstitutionGroup::Tuple),
            (NS_XBRLDT, "hypercubeItem") => Some(SubstitutionGroup::Hypercube),
            (NS_XBRLDT, "dimensionItem") => Some(SubstitutionGroup::Dimension),
            _ => None,
        };
        if group.is_some() {
            return group;
        }
        current = declarations.get(current)?.substitution_group.as_ref()?;
    }
    None
}

fn data_type(type_name: Option<&QName>, type_bases: &AHashMap<&QName, &QName>) -> DataType {
    let Some(mut current) = type_name else {
        return DataType::String;
    };
    for _ in 0..MAX_DERIVATION_DEPTH {
        if let Some(base) = type_bases.get(current) {
            current = base;
            continue;
        }
        return DataType::from_type_name(&current.local_name).unwrap_or(DataType::String);
    }
    DataType::String
}

/// Summary of the taxonomy a filing uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonomyInfo {
    pub entity_id: Option<EntityIdentifier>,
    pub reporting_period: Option<Period>,
    pub concepts: Vec<ConceptInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptInfo {
    pub qname: QName,
    pub label: Option<String>,
    pub data_type: DataType,
    pub period_type: Option<PeriodType>,
    pub balance: Option<Balance>,
    pub is_abstract: bool,
    pub substitution_group: SubstitutionGroup,
}
