use chrono::NaiveDate;
use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

// ============================================================================
// Qualified names
// ============================================================================

/// Namespace-qualified name. Identity is `(namespace, local_name)`; the prefix
/// is carried only for display.
#[derive(Debug, Clone)]
pub struct QName {
    pub namespace: CompactString,
    pub local_name: CompactString,
    pub prefix: Option<CompactString>,
}

impl QName {
    pub fn new(namespace: &str, local_name: &str) -> Self {
        Self::with_prefix(namespace, local_name, None)
    }

    pub fn with_prefix(namespace: &str, local_name: &str, prefix: Option<&str>) -> Self {
        Self {
            namespace: CompactString::from(namespace),
            local_name: CompactString::from(local_name),
            prefix: prefix.map(CompactString::from),
        }
    }

    pub fn prefixed(mut self, prefix: Option<&str>) -> Self {
        if let Some(prefix) = prefix {
            self.prefix = Some(CompactString::from(prefix));
        }
        self
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.local_name == other.local_name && self.namespace == other.namespace
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local_name.hash(state);
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.namespace, &self.local_name).cmp(&(&other.namespace, &other.local_name))
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local_name),
            None if self.namespace.is_empty() => write!(f, "{}", self.local_name),
            None => write!(f, "{{{}}}{}", self.namespace, self.local_name),
        }
    }
}

impl Serialize for QName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Contexts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Period {
    Instant { date: NaiveDate },
    Duration { start: NaiveDate, end: NaiveDate },
    Forever,
}

impl Period {
    /// `None` when `start` is after `end`.
    pub fn duration(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Period::Duration { start, end })
    }

    pub fn period_type(&self) -> Option<PeriodType> {
        match self {
            Period::Instant { .. } => Some(PeriodType::Instant),
            Period::Duration { .. } => Some(PeriodType::Duration),
            Period::Forever => None,
        }
    }

    /// Instant date, or the end of a duration.
    pub fn end_date(&self) -> Option<NaiveDate> {
        match self {
            Period::Instant { date } => Some(*date),
            Period::Duration { end, .. } => Some(*end),
            Period::Forever => None,
        }
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        match self {
            Period::Duration { start, .. } => Some(*start),
            _ => None,
        }
    }

    pub fn days(&self) -> Option<i64> {
        match self {
            Period::Duration { start, end } => Some((*end - *start).num_days()),
            _ => None,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        match self {
            Period::Duration { start, end } => start <= end,
            _ => true,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Instant { date } => write!(f, "{date}"),
            Period::Duration { start, end } => write!(f, "{start}--{end}"),
            Period::Forever => write!(f, "forever"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityIdentifier {
    pub scheme: CompactString,
    pub value: CompactString,
}

/// Member of one dimension in a context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MemberValue {
    Explicit(QName),
    /// Serialized XML content of a typed member.
    Typed(String),
}

impl fmt::Display for MemberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberValue::Explicit(qname) => write!(f, "{qname}"),
            MemberValue::Typed(xml) => write!(f, "{xml}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    pub id: CompactString,
    pub entity: EntityIdentifier,
    pub period: Period,
    /// Dimension → member, from both `segment` and `scenario`.
    pub dimensions: BTreeMap<QName, MemberValue>,
}

impl Context {
    pub fn is_dimensional(&self) -> bool {
        !self.dimensions.is_empty()
    }
}

// ============================================================================
// Units
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitMeasure {
    /// One measure, or the product of several.
    Simple(Vec<QName>),
    Divide {
        numerator: Vec<QName>,
        denominator: Vec<QName>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    pub id: CompactString,
    pub measure: UnitMeasure,
}

impl Unit {
    /// Short display form built from measure local names, e.g. `KRW` or
    /// `KRW/shares`.
    pub fn symbol(&self) -> String {
        fn join(measures: &[QName]) -> String {
            measures
                .iter()
                .map(|m| m.local_name.as_str())
                .collect::<Vec<_>>()
                .join("*")
        }
        match &self.measure {
            UnitMeasure::Simple(measures) => join(measures),
            UnitMeasure::Divide {
                numerator,
                denominator,
            } => format!("{}/{}", join(numerator), join(denominator)),
        }
    }
}

// ============================================================================
// Facts
// ============================================================================

/// Parsed `decimals` or `precision` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    Infinite,
    Digits(i32),
}

impl FromStr for Accuracy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "INF" {
            Ok(Accuracy::Infinite)
        } else {
            s.parse::<i32>().map(Accuracy::Digits).map_err(|_| ())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FactValue {
    Nil,
    Numeric(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    /// Textual content; see [`Fact::raw_value`].
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fact {
    pub id: Option<CompactString>,
    pub concept: QName,
    pub context_ref: CompactString,
    pub unit_ref: Option<CompactString>,
    pub raw_value: String,
    pub value: FactValue,
    /// `decimals` as written in the instance.
    pub decimals: Option<CompactString>,
    /// `precision` as written in the instance.
    pub precision: Option<CompactString>,
    pub nil: bool,
    pub language: Option<CompactString>,
    #[serde(skip)]
    pub line: usize,
}

impl Fact {
    pub fn numeric_value(&self) -> Option<Decimal> {
        match self.value {
            FactValue::Numeric(value) => Some(value),
            _ => None,
        }
    }

    pub fn decimals_hint(&self) -> Option<Accuracy> {
        self.decimals.as_deref().and_then(|d| d.parse().ok())
    }

    pub fn precision_hint(&self) -> Option<Accuracy> {
        self.precision.as_deref().and_then(|p| p.parse().ok())
    }
}

/// Parses an XBRL numeric lexical value (`xs:decimal`, optionally with an
/// exponent for `xs:double`/`xs:float` items).
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    let unsigned = raw.strip_prefix('+').unwrap_or(raw);
    if unsigned.is_empty() {
        return None;
    }
    if unsigned.contains(['e', 'E']) {
        return Decimal::from_scientific(unsigned).ok();
    }
    Decimal::from_str(unsigned).ok()
}

// ============================================================================
// Concepts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Monetary,
    Numeric,
    String,
    Boolean,
    Date,
    TextBlock,
}

impl DataType {
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Monetary | DataType::Numeric)
    }

    /// Classifies an item type by its local name. Covers the XBRL 2.1 item
    /// types and the data type registry types used by the IFRS and DART
    /// taxonomies.
    pub fn from_type_name(local: &str) -> Option<Self> {
        let name = local.strip_suffix("ItemType").unwrap_or(local);
        let data_type = match name {
            "monetary" => DataType::Monetary,
            "decimal" | "float" | "double" | "integer" | "nonPositiveInteger"
            | "negativeInteger" | "long" | "int" | "short" | "byte" | "nonNegativeInteger"
            | "unsignedLong" | "unsignedInt" | "unsignedShort" | "unsignedByte"
            | "positiveInteger" | "shares" | "pure" | "fraction" | "percent" | "perShare"
            | "perUnit" | "area" | "volume" | "mass" | "energy" | "power" | "length"
            | "flow" | "ratio" | "memory" | "electricCurrent" | "voltage" | "temperature"
            | "monetaryPerArea" | "monetaryPerEnergy" | "monetaryPerLength"
            | "monetaryPerVolume" | "monetaryPerMass" | "perCent" => DataType::Numeric,
            "boolean" => DataType::Boolean,
            "date" | "dateTime" | "time" | "gYear" | "gYearMonth" | "gMonthDay" | "gDay"
            | "gMonth" | "dateUnion" => DataType::Date,
            "textBlock" | "escapedTextBlock" => DataType::TextBlock,
            "string" | "normalizedString" | "token" | "language" | "Name" | "NCName" | "ID"
            | "IDREF" | "IDREFS" | "ENTITY" | "ENTITIES" | "NMTOKEN" | "NMTOKENS" | "QName"
            | "anyURI" | "base64Binary" | "hexBinary" | "duration" | "domain"
            | "enumeration" | "enumerationSet" | "noLangToken" | "noLangString" => {
                DataType::String
            }
            _ => return None,
        };
        Some(data_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Instant,
    Duration,
}

impl FromStr for PeriodType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "instant" => Ok(PeriodType::Instant),
            "duration" => Ok(PeriodType::Duration),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Balance {
    Debit,
    Credit,
}

impl FromStr for Balance {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "debit" => Ok(Balance::Debit),
            "credit" => Ok(Balance::Credit),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionGroup {
    Item,
    Tuple,
    /// `xbrldt:hypercubeItem`; tables appear in presentation trees.
    Hypercube,
    /// `xbrldt:dimensionItem`; axes appear in presentation trees.
    Dimension,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Concept {
    pub qname: QName,
    /// Schema `id`, the fragment linkbase locators point at.
    pub id: Option<CompactString>,
    pub data_type: DataType,
    pub type_name: Option<QName>,
    /// Absent only on tuples.
    pub period_type: Option<PeriodType>,
    pub balance: Option<Balance>,
    pub is_abstract: bool,
    pub nillable: bool,
    pub substitution_group: SubstitutionGroup,
}

impl Concept {
    /// Same declaration modulo the schema `id`, which may differ between
    /// copies of a schema.
    pub fn same_definition(&self, other: &Concept) -> bool {
        self.qname == other.qname
            && self.data_type == other.data_type
            && self.type_name == other.type_name
            && self.period_type == other.period_type
            && self.balance == other.balance
            && self.is_abstract == other.is_abstract
            && self.substitution_group == other.substitution_group
    }
}

// ============================================================================
// Label roles
// ============================================================================

pub mod roles {
    pub const STANDARD: &str = "http://www.xbrl.org/2003/role/label";
    pub const TERSE: &str = "http://www.xbrl.org/2003/role/terseLabel";
    pub const VERBOSE: &str = "http://www.xbrl.org/2003/role/verboseLabel";
    pub const DOCUMENTATION: &str = "http://www.xbrl.org/2003/role/documentation";
    pub const PERIOD_START: &str = "http://www.xbrl.org/2003/role/periodStartLabel";
    pub const PERIOD_END: &str = "http://www.xbrl.org/2003/role/periodEndLabel";
    pub const TOTAL: &str = "http://www.xbrl.org/2003/role/totalLabel";
    pub const NEGATED: &str = "http://www.xbrl.org/2009/role/negatedLabel";
    pub const NEGATED_TOTAL: &str = "http://www.xbrl.org/2009/role/negatedTotalLabel";
    pub const LINK: &str = "http://www.xbrl.org/2003/role/link";
    pub const REFERENCE: &str = "http://www.xbrl.org/2003/role/reference";
}

pub mod arcroles {
    pub const PARENT_CHILD: &str = "http://www.xbrl.org/2003/arcrole/parent-child";
    pub const SUMMATION_ITEM: &str = "http://www.xbrl.org/2003/arcrole/summation-item";
    pub const CONCEPT_LABEL: &str = "http://www.xbrl.org/2003/arcrole/concept-label";
    pub const CONCEPT_REFERENCE: &str = "http://www.xbrl.org/2003/arcrole/concept-reference";
    pub const DIMENSION_DEFAULT: &str = "http://xbrl.org/int/dim/arcrole/dimension-default";
}
