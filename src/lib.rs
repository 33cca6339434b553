//! cluefin-xbrl - XBRL parser and financial statement projector for DART filings
//!
//! Licensed under AGPL-3.0

pub mod config;
pub mod error;
pub mod instance;
pub mod linkbase;
pub mod model;
pub mod package;
pub mod parser;
pub mod presentation;
pub mod schema;
pub mod statement;
pub mod taxonomy;
pub mod validator;
pub mod xml;

pub use config::{
    ConsolidationAxis, ParseOptions, ReportScope, StatementRoleMap, StatementType, TypedMemberMatching,
};
pub use error::{Error, ErrorKind, Location, Result, Warning};
pub use model::{Concept, Context, Fact, FactValue, Period, QName, Unit};
pub use parser::{ParsedDocument, Parser};
pub use statement::{
    statement_to_dicts, statement_to_dicts_with, FinancialStatement, ParsedFinancialStatements, PeriodColumn,
    StatementRow, ValueScaling,
};
pub use taxonomy::TaxonomyInfo;

use std::path::Path;

/// Parses an instance and the schemas and linkbases it references.
pub fn parse_xbrl_file<P: AsRef<Path>>(path: P) -> Result<ParsedDocument> {
    Parser::new().parse_file(path)
}

pub fn parse_xbrl_file_with<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<ParsedDocument> {
    Parser::new().with_options(options.clone()).parse_file(path)
}

/// Discovers the filing in a directory and parses it.
pub fn parse_xbrl_directory<P: AsRef<Path>>(dir: P) -> Result<ParsedDocument> {
    Parser::new().parse_directory(dir)
}

pub fn parse_xbrl_directory_with<P: AsRef<Path>>(dir: P, options: &ParseOptions) -> Result<ParsedDocument> {
    Parser::new().with_options(options.clone()).parse_directory(dir)
}

pub fn extract_taxonomy(document: &ParsedDocument) -> TaxonomyInfo {
    document.taxonomy_info()
}

pub fn extract_financial_statements(document: &ParsedDocument) -> ParsedFinancialStatements {
    document.financial_statements()
}

/// Parses several filing directories on the rayon pool; one result per
/// directory, in input order.
#[cfg(feature = "parallel")]
pub fn parse_directories<P>(dirs: &[P], options: &ParseOptions) -> Vec<Result<ParsedDocument>>
where
    P: AsRef<Path> + Sync,
{
    use rayon::prelude::*;

    dirs.par_iter()
        .map(|dir| parse_xbrl_directory_with(dir, options))
        .collect()
}
