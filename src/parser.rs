// Filing pipeline: instance, schemas, linkbases, then statements on demand
use crate::config::ParseOptions;
use crate::error::{Diagnostics, Error, ErrorKind, Location, Result, Warning};
use crate::instance::{parse_instance, Instance};
use crate::linkbase::{linkbase_path, LinkbaseProcessor, Linkbases};
use crate::model::*;
use crate::package::{discover, Manifest};
use crate::presentation::PresentationTree;
use crate::schema::{canonical, SchemaLoader};
use crate::statement::{ParsedFinancialStatements, StatementProjector};
use crate::taxonomy::{ConceptInfo, Taxonomy, TaxonomyInfo};
use crate::validator::XbrlValidator;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// A fully resolved filing. Owns everything parsed from it.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub instance: Instance,
    pub taxonomy: Taxonomy,
    pub linkbases: Linkbases,
    /// Present when the filing was discovered from a directory.
    pub manifest: Option<Manifest>,
    pub options: ParseOptions,
    /// Failures downgraded by lenient options, in the order they occurred.
    pub warnings: Vec<Warning>,
}

impl ParsedDocument {
    pub fn facts(&self) -> &[Fact] {
        &self.instance.facts
    }

    pub fn presentation_trees(&self) -> impl Iterator<Item = &PresentationTree> {
        self.linkbases.presentation.values()
    }

    pub fn financial_statements(&self) -> ParsedFinancialStatements {
        StatementProjector::new(self).project()
    }

    pub fn taxonomy_info(&self) -> TaxonomyInfo {
        let languages = self.options.label_languages();
        TaxonomyInfo {
            entity_id: self.instance.entity().cloned(),
            reporting_period: self.reporting_period(),
            concepts: self
                .taxonomy
                .concepts()
                .iter()
                .map(|concept| ConceptInfo {
                    qname: concept.qname.clone(),
                    label: self
                        .linkbases
                        .label(&concept.qname, None, &languages)
                        .map(str::to_string),
                    data_type: concept.data_type,
                    period_type: concept.period_type,
                    balance: concept.balance,
                    is_abstract: concept.is_abstract,
                    substitution_group: concept.substitution_group,
                })
                .collect(),
        }
    }

    /// Latest period among non-dimensional contexts; durations win over
    /// instants ending on the same day.
    fn reporting_period(&self) -> Option<Period> {
        let contexts = &self.instance.contexts;
        let plain: Vec<&Context> = contexts.iter().filter(|c| !c.is_dimensional()).collect();
        let candidates = if plain.is_empty() {
            contexts.iter().collect()
        } else {
            plain
        };
        candidates
            .into_iter()
            .map(|c| c.period)
            .filter(|p| p.end_date().is_some())
            .max_by_key(|p| (p.end_date(), p.days().unwrap_or(-1)))
    }
}

pub struct Parser {
    options: ParseOptions,
    validate: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            options: ParseOptions::default(),
            validate: true,
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs the fact and context invariant checks after typing.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parses one instance plus the schemas and linkbases it references.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ParsedDocument> {
        let path = path.as_ref();
        let filing_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.parse_filing(path, &filing_dir, None)
    }

    /// Discovers the filing in `dir` and parses it. Every schema and linkbase
    /// in the directory is loaded, referenced or not.
    pub fn parse_directory<P: AsRef<Path>>(&self, dir: P) -> Result<ParsedDocument> {
        let dir = dir.as_ref();
        let manifest = discover(dir, self.options.recursive)?;
        let instance = manifest.instance.clone();
        self.parse_filing(&instance, dir, Some(manifest))
    }

    fn parse_filing(&self, instance_path: &Path, filing_dir: &Path, manifest: Option<Manifest>) -> Result<ParsedDocument> {
        let start = Instant::now();
        let options = &self.options;
        let mut diagnostics = Diagnostics::default();
        let instance_dir = instance_path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut instance = parse_instance(instance_path, &mut diagnostics)?;

        let schemas = {
            let mut loader = SchemaLoader::new(filing_dir, options.strict_schemas, &mut diagnostics);
            for href in &instance.schema_refs {
                loader.load(href, None, &instance_dir)?;
            }
            if let Some(manifest) = &manifest {
                for schema in &manifest.schemas {
                    loader.load(&schema.to_string_lossy(), None, filing_dir)?;
                }
            }
            loader.finish()
        };
        if schemas.is_empty() {
            diagnostics.escalate(
                options.strict_schemas,
                Error::at(
                    ErrorKind::MissingTaxonomySchema,
                    Location::file(instance_path),
                    "instance references no schema in the filing",
                ),
            )?;
        }

        let taxonomy = Taxonomy::build(&schemas)?;
        debug!(schemas = schemas.len(), concepts = taxonomy.len(), "built taxonomy");

        instance.apply_taxonomy(&taxonomy, options, &mut diagnostics)?;
        if self.validate {
            XbrlValidator::new().validate(&instance, &taxonomy)?;
        }

        let linkbase_files = self.linkbase_files(&instance, &instance_dir, filing_dir, &taxonomy, manifest.as_ref(), &mut diagnostics)?;
        let linkbases = {
            let mut processor = LinkbaseProcessor::new(&taxonomy, options, filing_dir, &mut diagnostics);
            for path in &linkbase_files {
                processor.load_linkbase(path)?;
            }
            processor.finish()?
        };

        let warnings = diagnostics.into_warnings();
        debug!(
            path = %instance_path.display(),
            facts = instance.facts.len(),
            linkbases = linkbase_files.len(),
            presentation_roles = linkbases.presentation.len(),
            warnings = warnings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "parsed filing"
        );

        Ok(ParsedDocument {
            instance,
            taxonomy,
            linkbases,
            manifest,
            options: options.clone(),
            warnings,
        })
    }

    /// Linkbases referenced from the instance and schemas, then any others
    /// the manifest lists. Each file appears once.
    fn linkbase_files(
        &self,
        instance: &Instance,
        instance_dir: &Path,
        filing_dir: &Path,
        taxonomy: &Taxonomy,
        manifest: Option<&Manifest>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<PathBuf>> {
        let references = instance
            .linkbase_refs
            .iter()
            .map(|href| (instance_dir, href.as_str()))
            .chain(taxonomy.linkbase_refs().iter().map(|(dir, href)| (dir.as_path(), href.as_str())));

        let mut files: Vec<PathBuf> = Vec::new();
        for (base_dir, href) in references {
            match linkbase_path(href, base_dir, filing_dir) {
                Some(path) => files.push(path),
                None => diagnostics.escalate(
                    self.options.strict_schemas,
                    Error::at(
                        ErrorKind::MissingTaxonomySchema,
                        Location::file(base_dir),
                        format!("linkbase '{href}' is not part of the filing"),
                    ),
                )?,
            }
        }
        if let Some(manifest) = manifest {
            files.extend(manifest.linkbases.iter().map(|l| canonical(&l.path)));
        }

        let mut seen = ahash::AHashSet::new();
        files.retain(|path| seen.insert(path.clone()));
        Ok(files)
    }
}
