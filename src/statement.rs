//! Projection of a parsed filing into financial statements.
//!
//! Every recognised presentation role becomes one [`FinancialStatement`]
//! whose rows follow the presentation tree in preorder. Cells are filled from
//! facts that are not further qualified by dimensions other than the
//! consolidation axis (and dimension defaults). When no role is recognised,
//! a balance sheet and an income statement are synthesised from the facts.

use crate::config::{ReportScope, StatementType};
use crate::instance::Instance;
use crate::linkbase::Linkbases;
use crate::model::*;
use crate::parser::ParsedDocument;
use crate::presentation::PresentationTree;
use ahash::{AHashMap, AHashSet};
use chrono::Duration;
use compact_str::CompactString;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Durations within this many days of each other are comparable.
const COMPARABLE_DAYS: i64 = 7;
const MAX_COLUMNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodColumn {
    Current,
    #[serde(rename = "comparative_1")]
    Comparative1,
    #[serde(rename = "comparative_2")]
    Comparative2,
}

impl PeriodColumn {
    const ALL: [PeriodColumn; MAX_COLUMNS] = [
        PeriodColumn::Current,
        PeriodColumn::Comparative1,
        PeriodColumn::Comparative2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PeriodColumn::Current => "current",
            PeriodColumn::Comparative1 => "comparative_1",
            PeriodColumn::Comparative2 => "comparative_2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodValue {
    pub column: PeriodColumn,
    /// Period of the fact this cell reads, which differs from the column
    /// period for instant rows in duration statements.
    pub period: Period,
    /// `None` when no fact was reported, or the fact is nil or non-numeric.
    pub value: Option<Decimal>,
    pub decimals: Option<CompactString>,
}

/// Values of one concept under one combination of dimension members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionalValues {
    pub members: BTreeMap<QName, MemberValue>,
    pub values: Vec<PeriodValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementRow {
    pub concept: QName,
    pub depth: usize,
    pub label: String,
    pub preferred_label: Option<String>,
    /// One entry per statement column, in column order.
    pub values: Vec<PeriodValue>,
    pub unit: Option<String>,
    pub is_abstract: bool,
    pub is_total: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dimensional: Vec<DimensionalValues>,
}

impl StatementRow {
    pub fn value(&self, column: PeriodColumn) -> Option<Decimal> {
        self.values
            .iter()
            .find(|v| v.column == column)
            .and_then(|v| v.value)
    }

    pub fn current_value(&self) -> Option<Decimal> {
        self.value(PeriodColumn::Current)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialStatement {
    pub statement_type: StatementType,
    pub scope: ReportScope,
    /// Presentation role; `None` for statements synthesised from facts.
    pub role: Option<String>,
    pub title: Option<String>,
    pub entity_id: Option<EntityIdentifier>,
    pub reporting_period: Option<Period>,
    pub comparative_periods: Vec<Period>,
    pub rows: Vec<StatementRow>,
}

impl FinancialStatement {
    /// Column periods, current first.
    pub fn periods(&self) -> impl Iterator<Item = (PeriodColumn, &Period)> {
        PeriodColumn::ALL
            .into_iter()
            .zip(self.reporting_period.iter().chain(self.comparative_periods.iter()))
    }

    pub fn row(&self, concept: &QName) -> Option<&StatementRow> {
        self.rows.iter().find(|r| &r.concept == concept)
    }
}

/// Statements of a filing keyed by type and scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedFinancialStatements {
    pub entity_id: Option<EntityIdentifier>,
    #[serde(serialize_with = "serialize_statements")]
    statements: BTreeMap<(StatementType, ReportScope), FinancialStatement>,
}

fn serialize_statements<S: Serializer>(
    statements: &BTreeMap<(StatementType, ReportScope), FinancialStatement>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(statements.values())
}

impl ParsedFinancialStatements {
    /// Consolidated variant when present, the separate one otherwise.
    pub fn get(&self, statement_type: StatementType) -> Option<&FinancialStatement> {
        self.get_scoped(statement_type, ReportScope::Consolidated)
            .or_else(|| self.get_scoped(statement_type, ReportScope::Separate))
    }

    pub fn get_scoped(&self, statement_type: StatementType, scope: ReportScope) -> Option<&FinancialStatement> {
        self.statements.get(&(statement_type, scope))
    }

    pub fn balance_sheet(&self) -> Option<&FinancialStatement> {
        self.get(StatementType::BalanceSheet)
    }

    pub fn income_statement(&self) -> Option<&FinancialStatement> {
        self.get(StatementType::IncomeStatement)
    }

    pub fn comprehensive_income(&self) -> Option<&FinancialStatement> {
        self.get(StatementType::ComprehensiveIncome)
    }

    pub fn cash_flow(&self) -> Option<&FinancialStatement> {
        self.get(StatementType::CashFlow)
    }

    pub fn equity_changes(&self) -> Option<&FinancialStatement> {
        self.get(StatementType::EquityChanges)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FinancialStatement> {
        self.statements.values()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

// ============================================================================
// Projection
// ============================================================================

pub(crate) struct StatementProjector<'a> {
    instance: &'a Instance,
    linkbases: &'a Linkbases,
    document: &'a ParsedDocument,
    facts_by_concept: AHashMap<&'a QName, Vec<&'a Fact>>,
    languages: Vec<&'a str>,
}

/// Facts of one concept that belong to a statement, split by their
/// remaining dimensions.
#[derive(Default)]
struct ConceptFacts<'a> {
    plain: BTreeMap<Period, &'a Fact>,
    dimensional: BTreeMap<BTreeMap<QName, MemberValue>, BTreeMap<Period, &'a Fact>>,
}

impl<'a> StatementProjector<'a> {
    pub(crate) fn new(document: &'a ParsedDocument) -> Self {
        let mut facts_by_concept: AHashMap<&QName, Vec<&Fact>> = AHashMap::new();
        for fact in &document.instance.facts {
            facts_by_concept.entry(&fact.concept).or_default().push(fact);
        }
        Self {
            instance: &document.instance,
            linkbases: &document.linkbases,
            document,
            facts_by_concept,
            languages: document.options.label_languages(),
        }
    }

    pub(crate) fn project(&self) -> ParsedFinancialStatements {
        let mut result = ParsedFinancialStatements {
            entity_id: self.instance.entity().cloned(),
            statements: BTreeMap::new(),
        };

        for (role, tree) in &self.linkbases.presentation {
            let (statement_type, scope) = self.document.options.statement_role_map.classify(role);
            if statement_type == StatementType::Other {
                continue;
            }
            if result.statements.contains_key(&(statement_type, scope)) {
                debug!(%role, %statement_type, "statement already projected from another role");
                continue;
            }
            let statement = self.from_tree(tree, statement_type, scope);
            result.statements.insert((statement_type, scope), statement);
        }

        if result.statements.is_empty() {
            debug!("no statement roles recognised; synthesising statements from facts");
            for scope in [ReportScope::Consolidated, ReportScope::Separate] {
                for (statement_type, period_type) in [
                    (StatementType::BalanceSheet, PeriodType::Instant),
                    (StatementType::IncomeStatement, PeriodType::Duration),
                ] {
                    if let Some(statement) = self.fallback(statement_type, period_type, scope) {
                        result.statements.insert((statement_type, scope), statement);
                    }
                }
            }
        }
        result
    }

    fn from_tree(&self, tree: &PresentationTree, statement_type: StatementType, scope: ReportScope) -> FinancialStatement {
        let facts: Vec<ConceptFacts<'a>> = tree
            .nodes
            .iter()
            .map(|node| self.concept_facts(&node.concept, scope))
            .collect();
        let primary = primary_period_type(statement_type, &facts);
        let columns = select_columns(&facts, primary);

        let rows = tree
            .nodes
            .iter()
            .zip(&facts)
            .enumerate()
            .map(|(index, (node, facts))| {
                let preferred = node.preferred_label.as_deref();
                let mut row = self.row(&node.concept, node.depth, preferred, facts, &columns);
                row.is_abstract |= node.is_abstract;
                row.is_total = is_total(&node.concept, preferred)
                    || self.sums_siblings(tree, index);
                row
            })
            .collect();

        self.statement(statement_type, scope, Some(tree), columns, rows)
    }

    fn fallback(&self, statement_type: StatementType, period_type: PeriodType, scope: ReportScope) -> Option<FinancialStatement> {
        let mut seen: AHashSet<&QName> = AHashSet::new();
        let mut concepts = Vec::new();
        for fact in &self.instance.facts {
            if !self.is_numeric(fact) || seen.contains(&fact.concept) {
                continue;
            }
            let Some(context) = self.instance.context(&fact.context_ref) else {
                continue;
            };
            let fact_period_type = self
                .document
                .taxonomy
                .concept(&fact.concept)
                .and_then(|c| c.period_type)
                .or_else(|| context.period.period_type());
            if fact_period_type != Some(period_type) {
                continue;
            }
            if residual_dimensions(context, scope, self.document, self.linkbases).is_some_and(|d| d.is_empty()) {
                seen.insert(&fact.concept);
                concepts.push(&fact.concept);
            }
        }
        if concepts.is_empty() {
            return None;
        }

        let facts: Vec<ConceptFacts<'a>> = concepts.iter().map(|c| self.concept_facts(c, scope)).collect();
        let columns = select_columns(&facts, period_type);
        let rows = concepts
            .iter()
            .zip(&facts)
            .map(|(concept, facts)| {
                let mut row = self.row(concept, 0, None, facts, &columns);
                row.is_total = is_total(concept, None);
                row
            })
            .collect();
        Some(self.statement(statement_type, scope, None, columns, rows))
    }

    fn statement(
        &self,
        statement_type: StatementType,
        scope: ReportScope,
        tree: Option<&PresentationTree>,
        columns: Vec<Period>,
        rows: Vec<StatementRow>,
    ) -> FinancialStatement {
        let mut columns = columns.into_iter();
        FinancialStatement {
            statement_type,
            scope,
            role: tree.map(|t| t.role.clone()),
            title: tree.and_then(|t| t.definition.clone()),
            entity_id: self.instance.entity().cloned(),
            reporting_period: columns.next(),
            comparative_periods: columns.collect(),
            rows,
        }
    }

    fn is_numeric(&self, fact: &Fact) -> bool {
        match self.document.taxonomy.concept(&fact.concept) {
            Some(concept) => concept.data_type.is_numeric(),
            None => fact.unit_ref.is_some(),
        }
    }

    fn concept_facts(&self, concept: &QName, scope: ReportScope) -> ConceptFacts<'a> {
        let mut result = ConceptFacts::default();
        let Some(facts) = self.facts_by_concept.get(concept) else {
            return result;
        };
        let matching = self.document.options.typed_member_matching;
        for &fact in facts {
            let Some(context) = self.instance.context(&fact.context_ref) else {
                continue;
            };
            let Some(residual) = residual_dimensions(context, scope, self.document, self.linkbases) else {
                continue;
            };
            if residual.is_empty() {
                result.plain.entry(context.period).or_insert(fact);
            } else if self.document.options.dimensional_rows {
                let members = residual
                    .into_iter()
                    .map(|(dimension, member)| match member {
                        MemberValue::Typed(xml) => (dimension, MemberValue::Typed(matching.normalize(&xml))),
                        explicit => (dimension, explicit),
                    })
                    .collect();
                result
                    .dimensional
                    .entry(members)
                    .or_default()
                    .entry(context.period)
                    .or_insert(fact);
            }
        }
        result
    }

    fn row(
        &self,
        concept: &QName,
        depth: usize,
        preferred_label: Option<&str>,
        facts: &ConceptFacts<'_>,
        columns: &[Period],
    ) -> StatementRow {
        let declared = self.document.taxonomy.concept(concept);
        let period_type = declared
            .and_then(|c| c.period_type)
            .or_else(|| facts.plain.keys().next().and_then(Period::period_type));

        let values = cells(&facts.plain, columns, period_type, preferred_label);
        let unit = values
            .iter()
            .filter_map(|v| facts.plain.get(&v.period))
            .find_map(|fact| fact.unit_ref.as_deref())
            .map(|unit_ref| match self.instance.unit(unit_ref) {
                Some(unit) => unit.symbol(),
                None => unit_ref.to_string(),
            });

        let dimensional = facts
            .dimensional
            .iter()
            .map(|(members, by_period)| DimensionalValues {
                members: members.clone(),
                values: cells(by_period, columns, period_type, preferred_label),
            })
            .filter(|d| d.values.iter().any(|v| v.value.is_some()))
            .collect();

        StatementRow {
            concept: concept.clone(),
            depth,
            label: self
                .linkbases
                .label(concept, preferred_label, &self.languages)
                .map(str::to_string)
                .unwrap_or_else(|| concept.local_name.to_string()),
            preferred_label: preferred_label.map(str::to_string),
            values,
            unit,
            is_abstract: declared.is_some_and(|c| c.is_abstract),
            is_total: false,
            dimensional,
        }
    }

    /// Whether calculation arcs make the node the sum of all its siblings.
    fn sums_siblings(&self, tree: &PresentationTree, index: usize) -> bool {
        let node = &tree.nodes[index];
        let Some(children) = self.linkbases.summation_children(&node.concept) else {
            return false;
        };
        let mut siblings = tree.siblings(index).filter(|s| !s.is_abstract).peekable();
        siblings.peek().is_some() && siblings.all(|s| children.contains(&s.concept))
    }
}

/// Dimensions left once dimension defaults and the consolidation axis are
/// accounted for, or `None` when the context belongs to the other scope.
fn residual_dimensions(
    context: &Context,
    scope: ReportScope,
    document: &ParsedDocument,
    linkbases: &Linkbases,
) -> Option<BTreeMap<QName, MemberValue>> {
    let mut residual: BTreeMap<QName, MemberValue> = context
        .dimensions
        .iter()
        .filter(|(dimension, member)| match member {
            MemberValue::Explicit(member) => linkbases.dimension_default(dimension) != Some(member),
            MemberValue::Typed(_) => true,
        })
        .map(|(d, m)| (d.clone(), m.clone()))
        .collect();

    let Some(axis) = &document.options.consolidation_axis else {
        return Some(residual);
    };
    let on_axis = residual
        .keys()
        .find(|d| d.local_name == axis.axis)
        .cloned();
    let member = on_axis.as_ref().and_then(|d| match residual.get(d) {
        Some(MemberValue::Explicit(member)) => Some(member.local_name.clone()),
        _ => None,
    });

    match (scope, member.as_deref()) {
        (ReportScope::Separate, Some(m)) if m == axis.separate_member.as_str() => {}
        (ReportScope::Separate, _) => return None,
        (ReportScope::Consolidated, Some(m)) if m == axis.separate_member.as_str() => return None,
        (ReportScope::Consolidated, Some(m)) if m == axis.consolidated_member.as_str() => {}
        (ReportScope::Consolidated, _) => return Some(residual),
    }
    if let Some(dimension) = on_axis {
        residual.remove(&dimension);
    }
    Some(residual)
}

fn primary_period_type(statement_type: StatementType, facts: &[ConceptFacts<'_>]) -> PeriodType {
    match statement_type {
        StatementType::BalanceSheet => PeriodType::Instant,
        StatementType::Other => {
            let any_duration = facts
                .iter()
                .flat_map(|f| f.plain.keys())
                .any(|p| p.period_type() == Some(PeriodType::Duration));
            if any_duration {
                PeriodType::Duration
            } else {
                PeriodType::Instant
            }
        }
        _ => PeriodType::Duration,
    }
}

/// Current period and up to two comparatives among the periods the
/// statement's facts use.
fn select_columns(facts: &[ConceptFacts<'_>], primary: PeriodType) -> Vec<Period> {
    let periods: BTreeSet<Period> = facts
        .iter()
        .flat_map(|f| f.plain.keys().copied())
        .filter(|p| p.period_type() == Some(primary))
        .collect();
    choose_periods(periods, primary)
}

pub(crate) fn choose_periods(periods: BTreeSet<Period>, primary: PeriodType) -> Vec<Period> {
    match primary {
        PeriodType::Instant => periods.into_iter().rev().take(MAX_COLUMNS).collect(),
        PeriodType::Duration => {
            let mut durations: Vec<Period> = periods.into_iter().collect();
            // Latest end first; longer first among equal ends.
            durations.sort_by(|a, b| {
                b.end_date()
                    .cmp(&a.end_date())
                    .then(b.days().cmp(&a.days()))
            });
            let Some(current) = durations.first().copied() else {
                return Vec::new();
            };
            let length = current.days().unwrap_or_default();
            let mut columns = vec![current];
            for candidate in durations.into_iter().skip(1) {
                if columns.len() == MAX_COLUMNS {
                    break;
                }
                let comparable = (candidate.days().unwrap_or_default() - length).abs() <= COMPARABLE_DAYS;
                let earlier = columns
                    .last()
                    .is_some_and(|last| candidate.end_date() < last.end_date());
                if comparable && earlier {
                    columns.push(candidate);
                }
            }
            columns
        }
    }
}

/// Period a row of `period_type` reads in `column`.
fn row_period(
    column: &Period,
    period_type: Option<PeriodType>,
    preferred_label: Option<&str>,
    facts: &BTreeMap<Period, &Fact>,
) -> Period {
    match (column, period_type) {
        (Period::Duration { start, end }, Some(PeriodType::Instant)) => {
            let date = if preferred_label == Some(roles::PERIOD_START) {
                *start - Duration::days(1)
            } else {
                *end
            };
            Period::Instant { date }
        }
        (Period::Instant { date }, Some(PeriodType::Duration)) => facts
            .keys()
            .filter(|p| p.end_date() == Some(*date) && p.period_type() == Some(PeriodType::Duration))
            .max_by_key(|p| p.days())
            .copied()
            .unwrap_or(*column),
        _ => *column,
    }
}

fn cells(
    facts: &BTreeMap<Period, &Fact>,
    columns: &[Period],
    period_type: Option<PeriodType>,
    preferred_label: Option<&str>,
) -> Vec<PeriodValue> {
    PeriodColumn::ALL
        .into_iter()
        .zip(columns)
        .map(|(column, column_period)| {
            let period = row_period(column_period, period_type, preferred_label, facts);
            let fact = facts.get(&period);
            PeriodValue {
                column,
                period,
                value: fact.and_then(|f| f.numeric_value()),
                decimals: fact.and_then(|f| f.decimals.clone()),
            }
        })
        .collect()
}

fn is_total(concept: &QName, preferred_label: Option<&str>) -> bool {
    matches!(preferred_label, Some(roles::TOTAL) | Some(roles::NEGATED_TOTAL))
        || concept.local_name.starts_with("Total")
}

// ============================================================================
// Tabular output
// ============================================================================

/// How `statement_to_dicts_with` presents values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueScaling {
    /// Values exactly as reported.
    #[default]
    None,
    /// Values rounded to their `decimals` accuracy.
    Decimals,
}

/// Rounds `value` to `decimals` places; negative `decimals` round to tens,
/// hundreds, and so on.
pub fn round_to_accuracy(value: Decimal, accuracy: Accuracy) -> Decimal {
    let Accuracy::Digits(decimals) = accuracy else {
        return value;
    };
    if decimals >= 0 {
        return value.round_dp_with_strategy(decimals as u32, RoundingStrategy::MidpointAwayFromZero);
    }
    let mut factor = Decimal::ONE;
    for _ in 0..decimals.unsigned_abs() {
        match factor.checked_mul(Decimal::TEN) {
            Some(next) => factor = next,
            None => return Decimal::ZERO,
        }
    }
    let scaled = (value / factor).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    (scaled * factor).normalize()
}

/// One flat map per row: concept, label, depth, unit, flags, and one entry
/// per column holding the value as a decimal string (or null).
pub fn statement_to_dicts(statement: &FinancialStatement) -> Vec<Map<String, Value>> {
    statement_to_dicts_with(statement, ValueScaling::None)
}

pub fn statement_to_dicts_with(statement: &FinancialStatement, scaling: ValueScaling) -> Vec<Map<String, Value>> {
    statement
        .rows
        .iter()
        .map(|row| {
            let mut map = Map::new();
            map.insert("concept".into(), Value::String(row.concept.to_string()));
            map.insert("label".into(), Value::String(row.label.clone()));
            map.insert("depth".into(), Value::from(row.depth));
            map.insert(
                "unit".into(),
                row.unit.clone().map(Value::String).unwrap_or(Value::Null),
            );
            map.insert("is_abstract".into(), Value::Bool(row.is_abstract));
            map.insert("is_total".into(), Value::Bool(row.is_total));
            for cell in &row.values {
                let value = cell.value.map(|value| match (scaling, cell.decimals.as_deref()) {
                    (ValueScaling::Decimals, Some(raw)) => match raw.parse::<Accuracy>() {
                        Ok(accuracy) => round_to_accuracy(value, accuracy),
                        Err(()) => value,
                    },
                    _ => value,
                });
                map.insert(
                    cell.column.as_str().into(),
                    value.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null),
                );
            }
            map
        })
        .collect()
}
