//! Instance document parsing: contexts, units, and facts.

use crate::config::ParseOptions;
use crate::error::{Diagnostics, Error, ErrorKind, Location, Result};
use crate::model::*;
use crate::taxonomy::Taxonomy;
use crate::xml::{
    Element, ElementReader, XmlSource, NS_LINK, NS_XBRLDI, NS_XBRLI, NS_XLINK, NS_XML, NS_XS,
    NS_XSI,
};
use ahash::{AHashMap, AHashSet};
use chrono::NaiveDate;
use compact_str::CompactString;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Namespaces whose elements are never facts.
const STRUCTURAL_NAMESPACES: &[&str] = &[NS_XBRLI, NS_LINK, NS_XLINK, NS_XBRLDI, NS_XSI, NS_XS];

#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub path: PathBuf,
    pub contexts: Vec<Context>,
    pub units: Vec<Unit>,
    pub facts: Vec<Fact>,
    /// `link:schemaRef` hrefs, as written.
    pub schema_refs: Vec<String>,
    /// `link:linkbaseRef` hrefs, as written.
    pub linkbase_refs: Vec<String>,
    #[serde(skip)]
    context_index: AHashMap<CompactString, usize>,
    #[serde(skip)]
    unit_index: AHashMap<CompactString, usize>,
}

impl Instance {
    pub fn context(&self, id: &str) -> Option<&Context> {
        self.context_index.get(id).map(|&i| &self.contexts[i])
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.unit_index.get(id).map(|&i| &self.units[i])
    }

    /// Most frequent entity identifier across contexts; ties go to the first seen.
    pub fn entity(&self) -> Option<&EntityIdentifier> {
        let mut counts: Vec<(&EntityIdentifier, usize)> = Vec::new();
        for context in &self.contexts {
            match counts.iter_mut().find(|(e, _)| *e == &context.entity) {
                Some((_, n)) => *n += 1,
                None => counts.push((&context.entity, 1)),
            }
        }
        let best = counts.iter().map(|(_, n)| *n).max()?;
        counts.into_iter().find(|(_, n)| *n == best).map(|(e, _)| e)
    }

    /// Resolves fact data types against the concept dictionary and parses
    /// typed values. Raw text is left untouched.
    pub(crate) fn apply_taxonomy(
        &mut self,
        taxonomy: &Taxonomy,
        options: &ParseOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let mut reported = AHashSet::new();
        for fact in &mut self.facts {
            let location = Location::at(&self.path, fact.line);
            let data_type = match taxonomy.concept(&fact.concept) {
                Some(concept) => concept.data_type,
                None => {
                    if reported.insert(fact.concept.clone()) {
                        diagnostics.escalate(
                            options.strict_schemas,
                            Error::at(
                                ErrorKind::UnknownConcept,
                                location.clone(),
                                format!("concept {} is not declared in the taxonomy", fact.concept),
                            ),
                        )?;
                    }
                    if fact.unit_ref.is_some() {
                        DataType::Numeric
                    } else {
                        DataType::String
                    }
                }
            };
            fact.value = typed_value(fact, data_type, location)?;
        }
        Ok(())
    }
}

fn typed_value(fact: &Fact, data_type: DataType, location: Location) -> Result<FactValue> {
    if fact.nil {
        return Ok(FactValue::Nil);
    }
    let raw = fact.raw_value.trim();
    let value = match data_type {
        DataType::Monetary | DataType::Numeric => match parse_decimal(raw) {
            Some(value) => FactValue::Numeric(value),
            None => {
                return Err(Error::at(
                    ErrorKind::InvalidDecimal,
                    location,
                    format!("fact {} has non-numeric value '{raw}'", fact.concept),
                ))
            }
        },
        DataType::Boolean => match raw {
            "true" | "1" => FactValue::Boolean(true),
            "false" | "0" => FactValue::Boolean(false),
            _ => FactValue::Text,
        },
        DataType::Date => parse_iso_date(raw).map(FactValue::Date).unwrap_or(FactValue::Text),
        DataType::String | DataType::TextBlock => FactValue::Text,
    };
    Ok(value)
}

/// Strict `YYYY-MM-DD`.
pub(crate) fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let bytes = raw.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

#[derive(PartialEq, Eq, Hash)]
struct FactKey {
    concept: QName,
    context_ref: CompactString,
    unit_ref: Option<CompactString>,
    language: Option<CompactString>,
    /// Enclosing tuple; facts only duplicate each other under the same parent.
    tuple: Option<usize>,
}

pub struct InstanceParser<'a> {
    path: &'a Path,
    instance: Instance,
    fact_index: AHashMap<FactKey, usize>,
    tuples: usize,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> InstanceParser<'a> {
    pub(crate) fn new(path: &'a Path, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            path,
            instance: Instance {
                path: path.to_path_buf(),
                contexts: Vec::with_capacity(64),
                units: Vec::with_capacity(8),
                facts: Vec::with_capacity(1024),
                schema_refs: Vec::new(),
                linkbase_refs: Vec::new(),
                context_index: AHashMap::new(),
                unit_index: AHashMap::new(),
            },
            fact_index: AHashMap::new(),
            tuples: 0,
            diagnostics,
        }
    }

    pub fn parse(mut self, source: &XmlSource) -> Result<Instance> {
        let mut reader = ElementReader::new(source.bytes(), self.path);
        let root = reader.read_root()?;
        if !root.is(NS_XBRLI, "xbrl") {
            return Err(Error::at(
                ErrorKind::InvalidXml,
                root.location(self.path),
                format!("root element {} is not xbrli:xbrl", root.name),
            ));
        }

        while let Some(element) = reader.next_child()? {
            self.top_level(element)?;
        }

        debug!(
            path = %self.path.display(),
            contexts = self.instance.contexts.len(),
            units = self.instance.units.len(),
            facts = self.instance.facts.len(),
            "parsed instance"
        );
        Ok(self.instance)
    }

    fn top_level(&mut self, element: Element) -> Result<()> {
        match (element.namespace(), element.local_name()) {
            (NS_XBRLI, "context") => {
                let context = self.parse_context(&element)?;
                self.add_context(context, &element)
            }
            (NS_XBRLI, "unit") => {
                let unit = self.parse_unit(&element)?;
                self.add_unit(unit, &element)
            }
            (NS_LINK, "schemaRef") => {
                if let Some(href) = element.attr_ns(NS_XLINK, "href") {
                    self.instance.schema_refs.push(href.to_string());
                }
                Ok(())
            }
            (NS_LINK, "linkbaseRef") => {
                if let Some(href) = element.attr_ns(NS_XLINK, "href") {
                    self.instance.linkbase_refs.push(href.to_string());
                }
                Ok(())
            }
            (ns, _) if STRUCTURAL_NAMESPACES.contains(&ns) => Ok(()),
            _ => self.fact_or_tuple(&element, None),
        }
    }

    fn add_context(&mut self, context: Context, element: &Element) -> Result<()> {
        if self.instance.context_index.contains_key(&context.id) {
            return Err(self.error(
                ErrorKind::InvalidXml,
                element,
                format!("duplicate context id '{}'", context.id),
            ));
        }
        self.instance
            .context_index
            .insert(context.id.clone(), self.instance.contexts.len());
        self.instance.contexts.push(context);
        Ok(())
    }

    fn add_unit(&mut self, unit: Unit, element: &Element) -> Result<()> {
        if self.instance.unit_index.contains_key(&unit.id) {
            return Err(self.error(
                ErrorKind::InvalidUnit,
                element,
                format!("duplicate unit id '{}'", unit.id),
            ));
        }
        self.instance
            .unit_index
            .insert(unit.id.clone(), self.instance.units.len());
        self.instance.units.push(unit);
        Ok(())
    }

    fn parse_context(&self, element: &Element) -> Result<Context> {
        let id = self.required_attr(element, "id", ErrorKind::InvalidXml)?;

        let entity_el = element.child(NS_XBRLI, "entity").ok_or_else(|| {
            self.error(ErrorKind::InvalidXml, element, format!("context '{id}' has no entity"))
        })?;
        let identifier_el = entity_el.child(NS_XBRLI, "identifier").ok_or_else(|| {
            self.error(ErrorKind::InvalidXml, entity_el, format!("context '{id}' has no identifier"))
        })?;
        let entity = EntityIdentifier {
            scheme: identifier_el.attr("scheme").unwrap_or_default().into(),
            value: identifier_el.trimmed_text().into(),
        };

        let period_el = element.child(NS_XBRLI, "period").ok_or_else(|| {
            self.error(ErrorKind::InvalidPeriod, element, format!("context '{id}' has no period"))
        })?;
        let period = self.parse_period(period_el, &id)?;

        let mut dimensions = BTreeMap::new();
        let containers = entity_el
            .children_named(NS_XBRLI, "segment")
            .chain(element.children_named(NS_XBRLI, "scenario"));
        for container in containers {
            self.parse_dimensions(container, &id, &mut dimensions)?;
        }

        Ok(Context {
            id: id.into(),
            entity,
            period,
            dimensions,
        })
    }

    fn parse_period(&self, element: &Element, context_id: &str) -> Result<Period> {
        let date = |name: &str| -> Result<Option<NaiveDate>> {
            match element.child(NS_XBRLI, name) {
                None => Ok(None),
                Some(child) => parse_iso_date(child.trimmed_text()).map(Some).ok_or_else(|| {
                    self.error(
                        ErrorKind::InvalidPeriod,
                        child,
                        format!(
                            "context '{context_id}': {name} '{}' is not YYYY-MM-DD",
                            child.trimmed_text()
                        ),
                    )
                }),
            }
        };

        if element.child(NS_XBRLI, "forever").is_some() {
            return Ok(Period::Forever);
        }
        if let Some(date) = date("instant")? {
            return Ok(Period::Instant { date });
        }
        match (date("startDate")?, date("endDate")?) {
            (Some(start), Some(end)) => Period::duration(start, end).ok_or_else(|| {
                self.error(
                    ErrorKind::InvalidPeriod,
                    element,
                    format!("context '{context_id}': start {start} is after end {end}"),
                )
            }),
            _ => Err(self.error(
                ErrorKind::InvalidPeriod,
                element,
                format!("context '{context_id}' has an incomplete period"),
            )),
        }
    }

    fn parse_dimensions(
        &self,
        container: &Element,
        context_id: &str,
        dimensions: &mut BTreeMap<QName, MemberValue>,
    ) -> Result<()> {
        for member in &container.children {
            let value = match (member.namespace(), member.local_name()) {
                (NS_XBRLDI, "explicitMember") => {
                    let qname = member.resolve_qname(member.trimmed_text()).ok_or_else(|| {
                        self.error(
                            ErrorKind::InvalidXml,
                            member,
                            format!("unresolvable member '{}'", member.trimmed_text()),
                        )
                    })?;
                    MemberValue::Explicit(qname)
                }
                (NS_XBRLDI, "typedMember") => MemberValue::Typed(member.inner_xml()),
                // Non-dimensional segment content carries no dimension.
                _ => continue,
            };
            let raw_dimension = self.required_attr(member, "dimension", ErrorKind::InvalidXml)?;
            let dimension = member.resolve_qname(&raw_dimension).ok_or_else(|| {
                self.error(
                    ErrorKind::InvalidXml,
                    member,
                    format!("unresolvable dimension '{raw_dimension}'"),
                )
            })?;
            if dimensions.contains_key(&dimension) {
                return Err(self.error(
                    ErrorKind::DuplicateDimension,
                    member,
                    format!("context '{context_id}' repeats dimension {dimension}"),
                ));
            }
            dimensions.insert(dimension, value);
        }
        Ok(())
    }

    fn parse_unit(&self, element: &Element) -> Result<Unit> {
        let id = self.required_attr(element, "id", ErrorKind::InvalidUnit)?;
        let measures = self.measures(element)?;
        let divide = element.child(NS_XBRLI, "divide");

        let measure = match (measures.is_empty(), divide) {
            (false, None) => UnitMeasure::Simple(measures),
            (true, Some(divide)) => {
                let part = |name: &str| -> Result<Vec<QName>> {
                    let part = divide.child(NS_XBRLI, name).ok_or_else(|| {
                        self.error(ErrorKind::InvalidUnit, divide, format!("unit '{id}' has no {name}"))
                    })?;
                    let measures = self.measures(part)?;
                    if measures.is_empty() {
                        return Err(self.error(
                            ErrorKind::InvalidUnit,
                            part,
                            format!("unit '{id}': {name} has no measure"),
                        ));
                    }
                    Ok(measures)
                };
                UnitMeasure::Divide {
                    numerator: part("unitNumerator")?,
                    denominator: part("unitDenominator")?,
                }
            }
            (true, None) => {
                return Err(self.error(ErrorKind::InvalidUnit, element, format!("unit '{id}' has no measure")))
            }
            (false, Some(_)) => {
                return Err(self.error(
                    ErrorKind::InvalidUnit,
                    element,
                    format!("unit '{id}' mixes measure and divide"),
                ))
            }
        };

        Ok(Unit {
            id: id.into(),
            measure,
        })
    }

    fn measures(&self, element: &Element) -> Result<Vec<QName>> {
        element
            .children_named(NS_XBRLI, "measure")
            .map(|m| {
                m.resolve_qname(m.trimmed_text()).ok_or_else(|| {
                    self.error(
                        ErrorKind::InvalidUnit,
                        m,
                        format!("unresolvable measure '{}'", m.trimmed_text()),
                    )
                })
            })
            .collect()
    }

    fn fact_or_tuple(&mut self, element: &Element, tuple: Option<usize>) -> Result<()> {
        let Some(context_ref) = element.attr("contextRef") else {
            if element.children.is_empty() {
                let err = self.error(
                    ErrorKind::InvalidXml,
                    element,
                    format!("{} has no contextRef and is ignored", element.name),
                );
                self.diagnostics.warn(err);
                return Ok(());
            }
            // Tuple: its children are facts (or nested tuples).
            let id = self.tuples;
            self.tuples += 1;
            for child in &element.children {
                if !STRUCTURAL_NAMESPACES.contains(&child.namespace()) {
                    self.fact_or_tuple(child, Some(id))?;
                }
            }
            return Ok(());
        };

        let nil = matches!(element.attr_ns(NS_XSI, "nil").map(str::trim), Some("true" | "1"));
        let raw_value = if element.children.is_empty() {
            element.trimmed_text().to_string()
        } else {
            element.inner_xml()
        };

        let fact = Fact {
            id: element.attr("id").map(CompactString::from),
            concept: element.name.clone(),
            context_ref: context_ref.trim().into(),
            unit_ref: element.attr("unitRef").map(|u| CompactString::from(u.trim())),
            raw_value,
            value: if nil { FactValue::Nil } else { FactValue::Text },
            decimals: element.attr("decimals").map(CompactString::from),
            precision: element.attr("precision").map(CompactString::from),
            nil,
            language: element.attr_ns(NS_XML, "lang").map(CompactString::from),
            line: element.line,
        };
        self.add_fact(fact, tuple, element)
    }

    /// Duplicates are tolerated only when they agree; the later one is kept.
    fn add_fact(&mut self, fact: Fact, tuple: Option<usize>, element: &Element) -> Result<()> {
        let key = FactKey {
            concept: fact.concept.clone(),
            context_ref: fact.context_ref.clone(),
            unit_ref: fact.unit_ref.clone(),
            language: fact.language.clone(),
            tuple,
        };
        if let Some(&index) = self.fact_index.get(&key) {
            let existing = &self.instance.facts[index];
            if existing.raw_value != fact.raw_value || existing.nil != fact.nil {
                return Err(self.error(
                    ErrorKind::DuplicateFact,
                    element,
                    format!(
                        "{} in context '{}' reported as '{}' and '{}' (first at line {})",
                        fact.concept, fact.context_ref, existing.raw_value, fact.raw_value, existing.line
                    ),
                ));
            }
            self.instance.facts[index] = fact;
            return Ok(());
        }
        self.fact_index.insert(key, self.instance.facts.len());
        self.instance.facts.push(fact);
        Ok(())
    }

    fn required_attr(&self, element: &Element, name: &str, kind: ErrorKind) -> Result<String> {
        element.attr(name).map(|v| v.trim().to_string()).ok_or_else(|| {
            self.error(kind, element, format!("{} is missing '{name}'", element.name))
        })
    }

    fn error(&self, kind: ErrorKind, element: &Element, message: impl std::fmt::Display) -> Error {
        Error::at(kind, element.location(self.path), message)
    }
}

/// Parses the instance at `path`.
pub(crate) fn parse_instance(path: &Path, diagnostics: &mut Diagnostics) -> Result<Instance> {
    let source = XmlSource::open(path)?;
    InstanceParser::new(source.path(), diagnostics).parse(&source)
}
