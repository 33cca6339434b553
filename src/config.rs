//! Parse options. Every switch the parser honours is a field here.

use compact_str::CompactString;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    BalanceSheet,
    IncomeStatement,
    ComprehensiveIncome,
    CashFlow,
    EquityChanges,
    Other,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementType::BalanceSheet => "balance_sheet",
            StatementType::IncomeStatement => "income_statement",
            StatementType::ComprehensiveIncome => "comprehensive_income",
            StatementType::CashFlow => "cash_flow",
            StatementType::EquityChanges => "equity_changes",
            StatementType::Other => "other",
        };
        f.write_str(name)
    }
}

/// Consolidated (연결) or separate (별도) financial statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportScope {
    Consolidated,
    Separate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolePattern {
    /// Matched as a substring of the role URI.
    pub pattern: CompactString,
    pub statement_type: StatementType,
    /// `None` infers the scope from the role URI.
    pub scope: Option<ReportScope>,
}

/// Ordered role-URI pattern table; the first matching pattern wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementRoleMap {
    patterns: Vec<RolePattern>,
}

impl StatementRoleMap {
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// IFRS role names plus the DART statement role codes.
    pub fn dart() -> Self {
        use ReportScope::*;
        use StatementType::*;

        let mut map = Self::empty();
        for (code, ty) in [
            ("D210000", BalanceSheet),
            ("D220000", BalanceSheet),
            ("D310000", IncomeStatement),
            ("D320000", IncomeStatement),
            ("D410000", ComprehensiveIncome),
            ("D420000", ComprehensiveIncome),
            ("D431410", ComprehensiveIncome),
            ("D432410", ComprehensiveIncome),
            ("D510000", CashFlow),
            ("D520000", CashFlow),
            ("D610000", EquityChanges),
        ] {
            map = map.with_pattern(code, ty, Some(Consolidated));
            let separate = format!("{}5", &code[..code.len() - 1]);
            map = map.with_pattern(&separate, ty, Some(Separate));
        }

        for (name, ty) in [
            ("StatementOfFinancialPosition", BalanceSheet),
            ("BalanceSheet", BalanceSheet),
            ("StatementOfComprehensiveIncome", ComprehensiveIncome),
            ("ComprehensiveIncome", ComprehensiveIncome),
            ("IncomeStatement", IncomeStatement),
            ("StatementOfProfitOrLoss", IncomeStatement),
            ("StatementOfCashFlows", CashFlow),
            ("CashFlowStatement", CashFlow),
            ("StatementOfChangesInEquity", EquityChanges),
            ("ChangesInEquity", EquityChanges),
        ] {
            map = map.with_pattern(name, ty, None);
        }
        map
    }

    pub fn with_pattern(
        mut self,
        pattern: &str,
        statement_type: StatementType,
        scope: Option<ReportScope>,
    ) -> Self {
        self.patterns.push(RolePattern {
            pattern: CompactString::from(pattern),
            statement_type,
            scope,
        });
        self
    }

    pub fn patterns(&self) -> &[RolePattern] {
        &self.patterns
    }

    /// Unknown roles map to `Other`.
    pub fn classify(&self, role_uri: &str) -> (StatementType, ReportScope) {
        match self.patterns.iter().find(|p| role_uri.contains(p.pattern.as_str())) {
            Some(p) => (
                p.statement_type,
                p.scope.unwrap_or_else(|| infer_scope(role_uri)),
            ),
            None => (StatementType::Other, infer_scope(role_uri)),
        }
    }
}

impl Default for StatementRoleMap {
    fn default() -> Self {
        Self::dart()
    }
}

fn infer_scope(role_uri: &str) -> ReportScope {
    if role_uri.contains("Separate") {
        ReportScope::Separate
    } else {
        ReportScope::Consolidated
    }
}

/// Equality used for typed dimension members when grouping facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypedMemberMatching {
    #[default]
    Exact,
    WhitespaceNormalized,
}

impl TypedMemberMatching {
    pub fn normalize(self, xml: &str) -> String {
        match self {
            TypedMemberMatching::Exact => xml.to_string(),
            TypedMemberMatching::WhitespaceNormalized => {
                xml.split_whitespace().collect::<Vec<_>>().join(" ")
            }
        }
    }
}

/// Dimension distinguishing consolidated from separate facts, matched on
/// local names so it survives taxonomy version changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidationAxis {
    pub axis: CompactString,
    pub consolidated_member: CompactString,
    pub separate_member: CompactString,
}

impl Default for ConsolidationAxis {
    fn default() -> Self {
        Self {
            axis: "ConsolidatedAndSeparateFinancialStatementsAxis".into(),
            consolidated_member: "ConsolidatedMember".into(),
            separate_member: "SeparateMember".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOptions {
    /// Fail on missing schema imports and unknown concepts instead of warning.
    pub strict_schemas: bool,
    /// Drop unresolvable linkbase locators with a warning instead of failing.
    pub lenient_locators: bool,
    /// BCP-47 tags in preference order for label selection.
    pub preferred_languages: Vec<CompactString>,
    pub statement_role_map: StatementRoleMap,
    /// Descend into subdirectories during package discovery.
    pub recursive: bool,
    /// Attach dimension-qualified values to statement rows.
    pub dimensional_rows: bool,
    pub typed_member_matching: TypedMemberMatching,
    /// `None` treats every dimension as disqualifying.
    pub consolidation_axis: Option<ConsolidationAxis>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict_schemas: false,
            lenient_locators: false,
            preferred_languages: vec!["ko".into(), "en".into()],
            statement_role_map: StatementRoleMap::default(),
            recursive: false,
            dimensional_rows: false,
            typed_member_matching: TypedMemberMatching::default(),
            consolidation_axis: Some(ConsolidationAxis::default()),
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_schemas(mut self, strict: bool) -> Self {
        self.strict_schemas = strict;
        self
    }

    pub fn with_lenient_locators(mut self, lenient: bool) -> Self {
        self.lenient_locators = lenient;
        self
    }

    pub fn with_preferred_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.preferred_languages = languages
            .into_iter()
            .map(|l| CompactString::from(l.as_ref()))
            .collect();
        self
    }

    pub fn with_statement_role_map(mut self, map: StatementRoleMap) -> Self {
        self.statement_role_map = map;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_dimensional_rows(mut self, enabled: bool) -> Self {
        self.dimensional_rows = enabled;
        self
    }

    pub fn with_typed_member_matching(mut self, matching: TypedMemberMatching) -> Self {
        self.typed_member_matching = matching;
        self
    }

    pub fn with_consolidation_axis(mut self, axis: Option<ConsolidationAxis>) -> Self {
        self.consolidation_axis = axis;
        self
    }

    /// Languages tried for labels: the preferred list, then English.
    pub fn label_languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.preferred_languages.iter().map(|l| l.as_str()).collect();
        if !languages.iter().any(|l| l.eq_ignore_ascii_case("en")) {
            languages.push("en");
        }
        languages
    }
}
