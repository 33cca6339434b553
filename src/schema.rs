// Schema loading for XBRL taxonomies
use crate::error::{Diagnostics, Error, ErrorKind, Location, Result};
use crate::model::*;
use crate::xml::{parse_tree, Element, XmlSource, NS_LINK, NS_XBRLI, NS_XLINK, NS_XS};
use ahash::AHashSet;
use compact_str::CompactString;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const NS_XBRLDT: &str = "http://xbrl.org/2005/xbrldt";

/// Infrastructure namespaces whose schemas declare no reportable concepts.
/// Item types from them are classified by name, so they are never fetched.
const INFRASTRUCTURE_NAMESPACES: &[&str] = &[
    NS_XBRLI,
    NS_LINK,
    NS_XLINK,
    NS_XBRLDT,
    "http://www.xbrl.org/2003/XLink",
    "http://xbrl.org/2006/xbrldi",
    "http://www.xbrl.org/2004/ref",
    "http://www.xbrl.org/2006/ref",
];

/// Top-level `xs:element` as declared, before substitution groups and types
/// are resolved across schemas.
#[derive(Debug, Clone)]
pub struct ElementDeclaration {
    pub qname: QName,
    pub id: Option<CompactString>,
    pub type_name: Option<QName>,
    pub substitution_group: Option<QName>,
    pub period_type: Option<PeriodType>,
    pub balance: Option<Balance>,
    pub is_abstract: bool,
    pub nillable: bool,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaImport {
    pub namespace: CompactString,
    pub location: String,
}

/// `link:roleType` declaration; DART titles statements through these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleType {
    pub uri: String,
    pub definition: Option<String>,
    pub used_on: Vec<QName>,
}

#[derive(Debug, Clone)]
pub struct SchemaDocument {
    /// Canonical path of the schema file.
    pub path: PathBuf,
    pub target_namespace: CompactString,
    pub prefix: Option<CompactString>,
    pub elements: Vec<ElementDeclaration>,
    /// Named type → base type of its restriction or extension.
    pub type_bases: Vec<(QName, QName)>,
    pub imports: Vec<SchemaImport>,
    pub linkbase_refs: Vec<String>,
    pub role_types: Vec<RoleType>,
}

impl SchemaDocument {
    pub fn parse(data: &[u8], path: &Path) -> Result<Self> {
        let root = parse_tree(data, path)?;
        if !root.is(NS_XS, "schema") {
            return Err(Error::at(
                ErrorKind::InvalidXml,
                root.location(path),
                format!("root element {} is not xs:schema", root.name),
            ));
        }

        let target_namespace = CompactString::from(root.attr("targetNamespace").unwrap_or_default());
        let prefix = root.prefix_for_namespace(&target_namespace).map(CompactString::from);
        let mut schema = SchemaDocument {
            path: path.to_path_buf(),
            target_namespace,
            prefix,
            elements: Vec::new(),
            type_bases: Vec::new(),
            imports: Vec::new(),
            linkbase_refs: Vec::new(),
            role_types: Vec::new(),
        };

        for child in &root.children {
            match (child.namespace(), child.local_name()) {
                (NS_XS, "element") => {
                    if let Some(decl) = schema.declaration(child, path)? {
                        schema.elements.push(decl);
                    }
                }
                (NS_XS, "complexType" | "simpleType") => {
                    if let Some(name) = child.attr("name") {
                        let base = child
                            .descendants()
                            .filter(|d| d.is(NS_XS, "restriction") || d.is(NS_XS, "extension"))
                            .find_map(|d| d.attr("base").and_then(|b| d.resolve_qname(b)));
                        if let Some(base) = base {
                            let name = schema.own_qname(name);
                            schema.type_bases.push((name, base));
                        }
                    }
                }
                (NS_XS, "import") => {
                    if let Some(location) = child.attr("schemaLocation") {
                        schema.imports.push(SchemaImport {
                            namespace: child.attr("namespace").unwrap_or_default().into(),
                            location: location.to_string(),
                        });
                    }
                }
                (NS_XS, "include") => {
                    if let Some(location) = child.attr("schemaLocation") {
                        schema.imports.push(SchemaImport {
                            namespace: schema.target_namespace.clone(),
                            location: location.to_string(),
                        });
                    }
                }
                (NS_XS, "annotation") => schema.annotation(child),
                _ => {}
            }
        }
        Ok(schema)
    }

    fn own_qname(&self, local: &str) -> QName {
        QName::with_prefix(&self.target_namespace, local, self.prefix.as_deref())
    }

    fn declaration(&self, element: &Element, path: &Path) -> Result<Option<ElementDeclaration>> {
        let Some(name) = element.attr("name") else {
            return Ok(None);
        };
        let qname_attr = |attr: &str| -> Result<Option<QName>> {
            match element.attr(attr) {
                None => Ok(None),
                Some(raw) => element.resolve_qname(raw).map(Some).ok_or_else(|| {
                    Error::at(
                        ErrorKind::InvalidXml,
                        element.location(path),
                        format!("element {name}: unresolvable {attr} '{raw}'"),
                    )
                }),
            }
        };

        Ok(Some(ElementDeclaration {
            qname: self.own_qname(name),
            id: element.attr("id").map(CompactString::from),
            type_name: qname_attr("type")?,
            substitution_group: qname_attr("substitutionGroup")?,
            period_type: element
                .attr_ns(NS_XBRLI, "periodType")
                .and_then(|p| p.parse().ok()),
            balance: element.attr_ns(NS_XBRLI, "balance").and_then(|b| b.parse().ok()),
            is_abstract: matches!(element.attr("abstract").map(str::trim), Some("true" | "1")),
            nillable: matches!(element.attr("nillable").map(str::trim), Some("true" | "1")),
            line: element.line,
        }))
    }

    fn annotation(&mut self, annotation: &Element) {
        for node in annotation.descendants() {
            if node.is(NS_LINK, "linkbaseRef") {
                if let Some(href) = node.attr_ns(NS_XLINK, "href") {
                    self.linkbase_refs.push(href.to_string());
                }
            } else if node.is(NS_LINK, "roleType") {
                if let Some(uri) = node.attr("roleURI") {
                    self.role_types.push(RoleType {
                        uri: uri.to_string(),
                        definition: node
                            .child(NS_LINK, "definition")
                            .map(|d| d.trimmed_text().to_string()),
                        used_on: node
                            .children_named(NS_LINK, "usedOn")
                            .filter_map(|u| u.resolve_qname(u.trimmed_text()))
                            .collect(),
                    });
                }
            }
        }
    }
}

/// Where an `href`/`schemaLocation` points once resolved against the filing.
pub(crate) enum Resolved {
    Local(PathBuf),
    Missing(String),
}

/// Resolves `location` relative to `base_dir`. Remote locations and relative
/// paths that do not exist are looked up by file name in `filing_dir`.
pub(crate) fn resolve_location(location: &str, base_dir: &Path, filing_dir: &Path) -> Resolved {
    let location = location.trim();
    let is_remote = location.starts_with("http://") || location.starts_with("https://");
    if !is_remote {
        let candidate = base_dir.join(location);
        if candidate.is_file() {
            return Resolved::Local(canonical(&candidate));
        }
    }
    let file_name = location.rsplit('/').next().unwrap_or(location);
    if !file_name.is_empty() {
        let candidate = filing_dir.join(file_name);
        if candidate.is_file() {
            return Resolved::Local(canonical(&candidate));
        }
    }
    Resolved::Missing(location.to_string())
}

pub(crate) fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Loads schemas and everything they import, each file once.
pub struct SchemaLoader<'a> {
    filing_dir: PathBuf,
    strict: bool,
    visited: AHashSet<PathBuf>,
    schemas: Vec<SchemaDocument>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> SchemaLoader<'a> {
    pub(crate) fn new(filing_dir: &Path, strict: bool, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            filing_dir: filing_dir.to_path_buf(),
            strict,
            visited: AHashSet::new(),
            schemas: Vec::new(),
            diagnostics,
        }
    }

    /// Loads `location` as referenced from a file in `base_dir`.
    pub fn load(&mut self, location: &str, namespace: Option<&str>, base_dir: &Path) -> Result<()> {
        let mut pending = vec![(location.to_string(), namespace.map(str::to_string), base_dir.to_path_buf())];

        while let Some((location, namespace, base_dir)) = pending.pop() {
            if namespace
                .as_deref()
                .is_some_and(|ns| INFRASTRUCTURE_NAMESPACES.contains(&ns) || ns.starts_with("http://www.xbrl.org/dtr/type/"))
            {
                continue;
            }

            let path = match resolve_location(&location, &base_dir, &self.filing_dir) {
                Resolved::Local(path) => path,
                Resolved::Missing(location) => {
                    self.diagnostics.escalate(
                        self.strict,
                        Error::at(
                            ErrorKind::MissingTaxonomySchema,
                            Location::file(&base_dir),
                            format!("schema '{location}' is not part of the filing"),
                        ),
                    )?;
                    continue;
                }
            };
            // Revisiting a schema (import cycles, shared imports) is a no-op.
            if !self.visited.insert(path.clone()) {
                continue;
            }

            let source = XmlSource::open(&path)?;
            let schema = SchemaDocument::parse(source.bytes(), &path)?;
            debug!(
                path = %path.display(),
                namespace = %schema.target_namespace,
                elements = schema.elements.len(),
                "loaded schema"
            );

            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            for import in schema.imports.iter().rev() {
                pending.push((import.location.clone(), Some(import.namespace.to_string()), dir.clone()));
            }
            self.schemas.push(schema);
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<SchemaDocument> {
        self.schemas
    }
}
