//! Builds small DART-style filings on disk for end-to-end tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const IFRS_NS: &str = "http://xbrl.ifrs.org/taxonomy/2023-03-23/ifrs-full";

pub const BS_ROLE: &str = "http://dart.fss.or.kr/role/ifrs/dart_2023-06-30_role-D210000";
pub const BS_SEPARATE_ROLE: &str = "http://dart.fss.or.kr/role/ifrs/dart_2023-06-30_role-D210005";
pub const IS_ROLE: &str = "http://dart.fss.or.kr/role/ifrs/dart_2023-06-30_role-D310000";
pub const CF_ROLE: &str = "http://dart.fss.or.kr/role/ifrs/dart_2023-06-30_role-D520000";

const CONCEPTS: &[(&str, &str, &str, Option<&str>, bool)] = &[
    // (name, type, period type, balance, abstract)
    ("StatementOfFinancialPositionAbstract", "xbrli:stringItemType", "duration", None, true),
    ("IncomeStatementAbstract", "xbrli:stringItemType", "duration", None, true),
    ("StatementOfCashFlowsAbstract", "xbrli:stringItemType", "duration", None, true),
    ("Assets", "xbrli:monetaryItemType", "instant", Some("debit"), false),
    ("CurrentAssets", "xbrli:monetaryItemType", "instant", Some("debit"), false),
    ("NoncurrentAssets", "xbrli:monetaryItemType", "instant", Some("debit"), false),
    ("CashAndCashEquivalents", "xbrli:monetaryItemType", "instant", Some("debit"), false),
    ("Inventories", "xbrli:monetaryItemType", "instant", Some("debit"), false),
    ("Liabilities", "xbrli:monetaryItemType", "instant", Some("credit"), false),
    ("Equity", "xbrli:monetaryItemType", "instant", Some("credit"), false),
    ("Revenue", "xbrli:monetaryItemType", "duration", Some("credit"), false),
    ("CostOfSales", "xbrli:monetaryItemType", "duration", Some("debit"), false),
    ("GrossProfit", "xbrli:monetaryItemType", "duration", Some("credit"), false),
    ("ProfitLoss", "xbrli:monetaryItemType", "duration", Some("credit"), false),
    ("IncreaseDecreaseInCashAndCashEquivalents", "xbrli:monetaryItemType", "duration", Some("debit"), false),
    ("BasicEarningsLossPerShare", "num:perShareItemType", "duration", None, false),
    ("NameOfReportingEntity", "xbrli:stringItemType", "duration", None, false),
    ("SegmentsAxis", "xbrli:stringItemType", "duration", None, true),
    ("ConsolidatedAndSeparateFinancialStatementsAxis", "xbrli:stringItemType", "duration", None, true),
    ("BranchAxis", "xbrli:stringItemType", "duration", None, true),
    ("ConsolidatedMember", "dtr-types:domainItemType", "duration", None, true),
    ("SeparateMember", "dtr-types:domainItemType", "duration", None, true),
    ("ReportableSegmentsMember", "dtr-types:domainItemType", "duration", None, true),
];

fn schema() -> String {
    let mut elements = String::new();
    for (name, ty, period, balance, is_abstract) in CONCEPTS {
        let group = if name.ends_with("Axis") {
            "xbrldt:dimensionItem"
        } else {
            "xbrli:item"
        };
        let balance = balance.map(|b| format!(r#" xbrli:balance="{b}""#)).unwrap_or_default();
        elements.push_str(&format!(
            r#"  <xs:element name="{name}" id="ifrs-full_{name}" type="{ty}" substitutionGroup="{group}"
      xbrli:periodType="{period}"{balance} abstract="{is_abstract}" nillable="true"/>
"#
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:xbrldt="http://xbrl.org/2005/xbrldt"
    xmlns:num="http://www.xbrl.org/dtr/type/numeric"
    xmlns:dtr-types="http://www.xbrl.org/dtr/type/2020-01-21"
    xmlns:link="http://www.xbrl.org/2003/linkbase"
    xmlns:ifrs-full="{IFRS_NS}"
    targetNamespace="{IFRS_NS}" elementFormDefault="qualified">
  <xs:annotation>
    <xs:appinfo>
      <link:roleType roleURI="{BS_ROLE}" id="D210000">
        <link:definition>[D210000] 재무상태표, 유동/비유동법 - 연결</link:definition>
        <link:usedOn>link:presentationLink</link:usedOn>
      </link:roleType>
    </xs:appinfo>
  </xs:annotation>
  <xs:import namespace="http://www.xbrl.org/2003/instance" schemaLocation="http://www.xbrl.org/2003/xbrl-instance-2003-12-31.xsd"/>
  <xs:import namespace="http://xbrl.org/2005/xbrldt" schemaLocation="http://www.xbrl.org/2005/xbrldt-2005.xsd"/>
  <xs:import namespace="http://www.xbrl.org/dtr/type/numeric" schemaLocation="http://www.xbrl.org/dtr/type/numeric-2009-12-16.xsd"/>
  <xs:import namespace="http://www.xbrl.org/dtr/type/2020-01-21" schemaLocation="http://www.xbrl.org/dtr/type/2020-01-21/types.xsd"/>
{elements}</xs:schema>
"#
    )
}

/// Writes an instance (`filing.xbrl`), the schema (`ifrs-full.xsd`), and any
/// linkbases added, all in one temporary directory.
#[derive(Default)]
pub struct FilingBuilder {
    contexts: Vec<String>,
    units: Vec<String>,
    facts: Vec<String>,
    linkbases: Vec<(String, String)>,
    reference_linkbases: bool,
}

impl FilingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instant(mut self, id: &str, date: &str) -> Self {
        self.contexts.push(context(id, &format!("<xbrli:instant>{date}</xbrli:instant>"), ""));
        self
    }

    pub fn duration(mut self, id: &str, start: &str, end: &str) -> Self {
        self.contexts.push(context(
            id,
            &format!("<xbrli:startDate>{start}</xbrli:startDate><xbrli:endDate>{end}</xbrli:endDate>"),
            "",
        ));
        self
    }

    /// Instant context qualified by explicit `ifrs-full` members.
    pub fn dimensional_instant(mut self, id: &str, date: &str, members: &[(&str, &str)]) -> Self {
        let segment: String = members
            .iter()
            .map(|(axis, member)| {
                format!(r#"<xbrldi:explicitMember dimension="ifrs-full:{axis}">ifrs-full:{member}</xbrldi:explicitMember>"#)
            })
            .collect();
        self.contexts.push(context(
            id,
            &format!("<xbrli:instant>{date}</xbrli:instant>"),
            &format!("<xbrli:segment>{segment}</xbrli:segment>"),
        ));
        self
    }

    /// Instant context qualified by one typed member; `member_xml` is the
    /// member's content, copied verbatim.
    pub fn typed_instant(mut self, id: &str, date: &str, axis: &str, member_xml: &str) -> Self {
        self.contexts.push(context(
            id,
            &format!("<xbrli:instant>{date}</xbrli:instant>"),
            &format!(
                r#"<xbrli:segment><xbrldi:typedMember dimension="ifrs-full:{axis}">{member_xml}</xbrldi:typedMember></xbrli:segment>"#
            ),
        ));
        self
    }

    pub fn unit(mut self, id: &str, measure: &str) -> Self {
        self.units.push(format!(
            r#"<xbrli:unit id="{id}"><xbrli:measure>{measure}</xbrli:measure></xbrli:unit>"#
        ));
        self
    }

    pub fn krw(self) -> Self {
        self.unit("KRW", "iso4217:KRW")
    }

    /// Monetary fact in KRW with `decimals="-6"`.
    pub fn money(self, concept: &str, context: &str, value: &str) -> Self {
        self.raw_fact(&format!(
            r#"<ifrs-full:{concept} contextRef="{context}" unitRef="KRW" decimals="-6">{value}</ifrs-full:{concept}>"#
        ))
    }

    pub fn raw_fact(mut self, xml: &str) -> Self {
        self.facts.push(xml.to_string());
        self
    }

    pub fn linkbase(mut self, file: &str, content: String) -> Self {
        self.linkbases.push((file.to_string(), content));
        self
    }

    /// Reference the linkbases from the instance instead of relying on
    /// directory discovery.
    pub fn referenced_linkbases(mut self) -> Self {
        self.reference_linkbases = true;
        self
    }

    pub fn instance_xml(&self) -> String {
        let linkbase_refs: String = if self.reference_linkbases {
            self.linkbases
                .iter()
                .map(|(file, _)| {
                    format!(r#"  <link:linkbaseRef xlink:type="simple" xlink:href="{file}" xlink:arcrole="http://www.w3.org/1999/xlink/properties/linkbase"/>
"#)
                })
                .collect()
        } else {
            String::new()
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:link="http://www.xbrl.org/2003/linkbase"
    xmlns:xlink="http://www.w3.org/1999/xlink"
    xmlns:xbrldi="http://xbrl.org/2006/xbrldi"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:iso4217="http://www.xbrl.org/2003/iso4217"
    xmlns:ifrs-full="{IFRS_NS}">
  <link:schemaRef xlink:type="simple" xlink:href="ifrs-full.xsd"/>
{linkbase_refs}{}
{}
{}
</xbrli:xbrl>
"#,
            self.contexts.join("\n"),
            self.units.join("\n"),
            self.facts.join("\n"),
        )
    }

    pub fn write(self) -> Filing {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ifrs-full.xsd"), schema()).unwrap();
        std::fs::write(dir.path().join("filing.xbrl"), self.instance_xml()).unwrap();
        for (file, content) in &self.linkbases {
            std::fs::write(dir.path().join(file), content).unwrap();
        }
        Filing { dir }
    }
}

fn context(id: &str, period: &str, segment: &str) -> String {
    format!(
        r#"<xbrli:context id="{id}">
  <xbrli:entity>
    <xbrli:identifier scheme="http://dart.fss.or.kr">00126380</xbrli:identifier>
    {segment}
  </xbrli:entity>
  <xbrli:period>{period}</xbrli:period>
</xbrli:context>"#
    )
}

pub struct Filing {
    dir: TempDir,
}

impl Filing {
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn instance(&self) -> PathBuf {
        self.dir.path().join("filing.xbrl")
    }
}

fn linkbase(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"
    xmlns:xlink="http://www.w3.org/1999/xlink">
{body}
</link:linkbase>
"#
    )
}

fn loc(name: &str) -> String {
    format!(
        r#"  <link:loc xlink:type="locator" xlink:href="ifrs-full.xsd#ifrs-full_{name}" xlink:label="{name}"/>
"#
    )
}

/// `(concept, lang, text)` standard labels.
pub fn label_linkbase(labels: &[(&str, &str, &str)]) -> String {
    role_label_linkbase(
        &labels
            .iter()
            .map(|(c, l, t)| (*c, "http://www.xbrl.org/2003/role/label", *l, *t))
            .collect::<Vec<_>>(),
    )
}

/// `(concept, role, lang, text)` labels.
pub fn role_label_linkbase(labels: &[(&str, &str, &str, &str)]) -> String {
    let mut body = String::from(
        r#"<link:labelLink xlink:type="extended" xlink:role="http://www.xbrl.org/2003/role/link">
"#,
    );
    let mut located = Vec::new();
    for (i, (concept, role, lang, text)) in labels.iter().enumerate() {
        if !located.contains(concept) {
            body.push_str(&loc(concept));
            located.push(*concept);
        }
        body.push_str(&format!(
            r#"  <link:label xlink:type="resource" xlink:label="label_{concept}_{i}" xlink:role="{role}" xml:lang="{lang}">{text}</link:label>
  <link:labelArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/concept-label" xlink:from="{concept}" xlink:to="label_{concept}_{i}"/>
"#
        ));
    }
    body.push_str("</link:labelLink>");
    linkbase(&body)
}

/// One presentation link per `(role, arcs)`; arcs are
/// `(parent, child, order, preferredLabel)`.
pub fn presentation_linkbase(links: &[(&str, &[(&str, &str, &str, Option<&str>)])]) -> String {
    let mut body = String::new();
    for (role, arcs) in links {
        body.push_str(&format!(
            r#"<link:presentationLink xlink:type="extended" xlink:role="{role}">
"#
        ));
        let mut located: Vec<&str> = Vec::new();
        for (from, to, _, _) in arcs.iter() {
            for name in [*from, *to] {
                if !located.contains(&name) {
                    body.push_str(&loc(name));
                    located.push(name);
                }
            }
        }
        for (from, to, order, preferred) in arcs.iter() {
            let preferred = preferred
                .map(|p| format!(r#" preferredLabel="{p}""#))
                .unwrap_or_default();
            body.push_str(&format!(
                r#"  <link:presentationArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/parent-child" xlink:from="{from}" xlink:to="{to}" order="{order}"{preferred}/>
"#
            ));
        }
        body.push_str("</link:presentationLink>\n");
    }
    linkbase(&body)
}

/// Summation arcs `(total, item)` in one calculation link.
pub fn calculation_linkbase(role: &str, arcs: &[(&str, &str)]) -> String {
    let mut body = format!(
        r#"<link:calculationLink xlink:type="extended" xlink:role="{role}">
"#
    );
    let mut located: Vec<&str> = Vec::new();
    for (from, to) in arcs {
        for name in [*from, *to] {
            if !located.contains(&name) {
                body.push_str(&loc(name));
                located.push(name);
            }
        }
    }
    for (i, (from, to)) in arcs.iter().enumerate() {
        body.push_str(&format!(
            r#"  <link:calculationArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/summation-item" xlink:from="{from}" xlink:to="{to}" order="{}" weight="1"/>
"#,
            i + 1
        ));
    }
    body.push_str("</link:calculationLink>");
    linkbase(&body)
}

/// A three-year DART filing with consolidated and separate balance sheets,
/// an income statement, labels, and calculations.
/// Cash flow statement whose cash line appears twice, as the opening and
/// the closing balance. Cash is 700, 800 and 950 at the ends of 2021, 2022
/// and 2023.
pub fn cash_flow_report() -> FilingBuilder {
    let cf: &[(&str, &str, &str, Option<&str>)] = &[
        (
            "StatementOfCashFlowsAbstract",
            "CashAndCashEquivalents",
            "1",
            Some("http://www.xbrl.org/2003/role/periodStartLabel"),
        ),
        ("StatementOfCashFlowsAbstract", "IncreaseDecreaseInCashAndCashEquivalents", "2", None),
        (
            "StatementOfCashFlowsAbstract",
            "CashAndCashEquivalents",
            "3",
            Some("http://www.xbrl.org/2003/role/periodEndLabel"),
        ),
    ];
    FilingBuilder::new()
        .krw()
        .duration("CFY2023dFY", "2023-01-01", "2023-12-31")
        .duration("PFY2022dFY", "2022-01-01", "2022-12-31")
        .instant("CFY2023eFY", "2023-12-31")
        .instant("PFY2022eFY", "2022-12-31")
        .instant("BPFY2021eFY", "2021-12-31")
        .money("IncreaseDecreaseInCashAndCashEquivalents", "CFY2023dFY", "150")
        .money("IncreaseDecreaseInCashAndCashEquivalents", "PFY2022dFY", "100")
        .money("CashAndCashEquivalents", "CFY2023eFY", "950")
        .money("CashAndCashEquivalents", "PFY2022eFY", "800")
        .money("CashAndCashEquivalents", "BPFY2021eFY", "700")
        .linkbase("entity_pre.xml", presentation_linkbase(&[(CF_ROLE, cf)]))
        .linkbase(
            "entity_lab-ko.xml",
            role_label_linkbase(&[
                ("CashAndCashEquivalents", "http://www.xbrl.org/2003/role/label", "ko", "현금및현금성자산"),
                ("CashAndCashEquivalents", "http://www.xbrl.org/2003/role/periodStartLabel", "ko", "기초현금및현금성자산"),
                ("CashAndCashEquivalents", "http://www.xbrl.org/2003/role/periodEndLabel", "ko", "기말현금및현금성자산"),
            ]),
        )
}

pub fn annual_report() -> FilingBuilder {
    let bs: &[(&str, &str, &str, Option<&str>)] = &[
        ("StatementOfFinancialPositionAbstract", "CurrentAssets", "1", None),
        ("CurrentAssets", "CashAndCashEquivalents", "1", None),
        ("CurrentAssets", "Inventories", "2", None),
        ("StatementOfFinancialPositionAbstract", "NoncurrentAssets", "2", None),
        ("StatementOfFinancialPositionAbstract", "Assets", "3", Some("http://www.xbrl.org/2003/role/totalLabel")),
        ("StatementOfFinancialPositionAbstract", "Liabilities", "4", None),
        ("StatementOfFinancialPositionAbstract", "Equity", "5", None),
    ];
    let is: &[(&str, &str, &str, Option<&str>)] = &[
        ("IncomeStatementAbstract", "Revenue", "1", None),
        ("IncomeStatementAbstract", "CostOfSales", "2", None),
        ("IncomeStatementAbstract", "GrossProfit", "3", None),
        ("IncomeStatementAbstract", "ProfitLoss", "4", None),
        ("IncomeStatementAbstract", "BasicEarningsLossPerShare", "5", None),
    ];

    let mut builder = FilingBuilder::new()
        .krw()
        .unit("KRWPerShare", "iso4217:KRW")
        .duration("CFY2023dFY", "2023-01-01", "2023-12-31")
        .duration("PFY2022dFY", "2022-01-01", "2022-12-31")
        .duration("BPFY2021dFY", "2021-01-01", "2021-12-31")
        .instant("CFY2023eFY", "2023-12-31")
        .instant("PFY2022eFY", "2022-12-31")
        .instant("BPFY2021eFY", "2021-12-31")
        .dimensional_instant(
            "CFY2023eFY_SeparateMember",
            "2023-12-31",
            &[("ConsolidatedAndSeparateFinancialStatementsAxis", "SeparateMember")],
        )
        .dimensional_instant(
            "CFY2023eFY_ConsolidatedMember",
            "2023-12-31",
            &[("ConsolidatedAndSeparateFinancialStatementsAxis", "ConsolidatedMember")],
        )
        .dimensional_instant(
            "CFY2023eFY_Segment",
            "2023-12-31",
            &[("SegmentsAxis", "ReportableSegmentsMember")],
        );

    for (context, scale) in [("CFY2023eFY", 3), ("PFY2022eFY", 2), ("BPFY2021eFY", 1)] {
        builder = builder
            .money("CashAndCashEquivalents", context, &(100 * scale).to_string())
            .money("Inventories", context, &(200 * scale).to_string())
            .money("CurrentAssets", context, &(300 * scale).to_string())
            .money("NoncurrentAssets", context, &(700 * scale).to_string())
            .money("Assets", context, &(1000 * scale).to_string())
            .money("Liabilities", context, &(400 * scale).to_string())
            .money("Equity", context, &(600 * scale).to_string());
    }
    for (context, scale) in [("CFY2023dFY", 3), ("PFY2022dFY", 2), ("BPFY2021dFY", 1)] {
        builder = builder
            .money("Revenue", context, &(5000 * scale).to_string())
            .money("CostOfSales", context, &(3000 * scale).to_string())
            .money("GrossProfit", context, &(2000 * scale).to_string())
            .money("ProfitLoss", context, &(800 * scale).to_string())
            .raw_fact(&format!(
                r#"<ifrs-full:BasicEarningsLossPerShare contextRef="{context}" unitRef="KRWPerShare" decimals="0">{}</ifrs-full:BasicEarningsLossPerShare>"#,
                1200 * scale
            ));
    }

    builder
        .money("Assets", "CFY2023eFY_SeparateMember", "2500")
        .money("Liabilities", "CFY2023eFY_SeparateMember", "900")
        .money("Assets", "CFY2023eFY_Segment", "1800")
        .raw_fact(
            r#"<ifrs-full:NameOfReportingEntity contextRef="CFY2023dFY" xml:lang="ko">삼성전자</ifrs-full:NameOfReportingEntity>"#,
        )
        .linkbase(
            "entity_pre.xml",
            presentation_linkbase(&[(BS_ROLE, bs), (BS_SEPARATE_ROLE, bs), (IS_ROLE, is)]),
        )
        .linkbase(
            "entity_cal.xml",
            calculation_linkbase(
                BS_ROLE,
                &[
                    ("CurrentAssets", "CashAndCashEquivalents"),
                    ("CurrentAssets", "Inventories"),
                    ("Assets", "CurrentAssets"),
                    ("Assets", "NoncurrentAssets"),
                ],
            ),
        )
        .linkbase(
            "entity_lab-ko.xml",
            role_label_linkbase(&[
                ("Assets", "http://www.xbrl.org/2003/role/label", "ko", "자산"),
                ("Assets", "http://www.xbrl.org/2003/role/totalLabel", "ko", "자산총계"),
                ("Assets", "http://www.xbrl.org/2003/role/label", "en", "Assets"),
                ("Assets", "http://www.xbrl.org/2003/role/totalLabel", "en", "Total assets"),
                ("CurrentAssets", "http://www.xbrl.org/2003/role/label", "ko", "유동자산"),
                ("CurrentAssets", "http://www.xbrl.org/2003/role/label", "en", "Current assets"),
                ("Revenue", "http://www.xbrl.org/2003/role/label", "ko", "수익(매출액)"),
                ("Revenue", "http://www.xbrl.org/2003/role/label", "en", "Revenue"),
                ("Inventories", "http://www.xbrl.org/2003/role/label", "en", "Inventories"),
            ]),
        )
}
