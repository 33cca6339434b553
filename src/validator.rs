// Fact and context invariant checks, run after fact typing
use crate::error::{Error, ErrorKind, Location, Result};
use crate::instance::Instance;
use crate::model::*;
use crate::taxonomy::Taxonomy;
use compact_str::CompactString;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    UnknownContextRef { concept: QName, context_ref: CompactString, line: usize },
    UnknownUnitRef { concept: QName, unit_ref: CompactString, line: usize },
    MissingUnit { concept: QName, line: usize },
    UnexpectedUnit { concept: QName, unit_ref: CompactString, line: usize },
    NilWithValue { concept: QName, line: usize },
    InvalidAccuracy { concept: QName, detail: String, line: usize },
    InvalidPeriod { context_id: CompactString },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::UnknownContextRef { .. } => ErrorKind::UnknownContext,
            ValidationError::UnknownUnitRef { .. }
            | ValidationError::MissingUnit { .. }
            | ValidationError::UnexpectedUnit { .. } => ErrorKind::InvalidUnit,
            ValidationError::NilWithValue { .. } => ErrorKind::InvalidXml,
            ValidationError::InvalidAccuracy { .. } => ErrorKind::InvalidDecimal,
            ValidationError::InvalidPeriod { .. } => ErrorKind::InvalidPeriod,
        }
    }

    fn into_error(self, instance: &Instance) -> Error {
        let kind = self.kind();
        let (line, message) = match self {
            ValidationError::UnknownContextRef { concept, context_ref, line } => {
                (Some(line), format!("{concept} refers to undefined context '{context_ref}'"))
            }
            ValidationError::UnknownUnitRef { concept, unit_ref, line } => {
                (Some(line), format!("{concept} refers to undefined unit '{unit_ref}'"))
            }
            ValidationError::MissingUnit { concept, line } => {
                (Some(line), format!("numeric fact {concept} has no unitRef"))
            }
            ValidationError::UnexpectedUnit { concept, unit_ref, line } => {
                (Some(line), format!("non-numeric fact {concept} carries unit '{unit_ref}'"))
            }
            ValidationError::NilWithValue { concept, line } => {
                (Some(line), format!("nil fact {concept} has content"))
            }
            ValidationError::InvalidAccuracy { concept, detail, line } => {
                (Some(line), format!("fact {concept}: {detail}"))
            }
            ValidationError::InvalidPeriod { context_id } => {
                (None, format!("context '{context_id}' ends before it starts"))
            }
        };
        let location = match line {
            Some(line) => Location::at(&instance.path, line),
            None => Location::file(&instance.path),
        };
        Error::at(kind, location, message)
    }
}

/// Instance invariants that hold regardless of parse options: every
/// reference resolves, units agree with concept types, accuracy attributes
/// are well formed and periods do not run backwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct XbrlValidator;

impl XbrlValidator {
    pub fn new() -> Self {
        Self
    }

    /// Fails on the first violation.
    pub(crate) fn validate(&self, instance: &Instance, taxonomy: &Taxonomy) -> Result<()> {
        match self.violations(instance, taxonomy).into_iter().next() {
            Some(violation) => Err(violation.into_error(instance)),
            None => Ok(()),
        }
    }

    /// Every violation, in document order within each check.
    pub fn violations(&self, instance: &Instance, taxonomy: &Taxonomy) -> Vec<ValidationError> {
        let mut errors = self.validate_contexts(instance);
        errors.extend(self.validate_facts(instance, taxonomy));
        errors
    }

    fn validate_contexts(&self, instance: &Instance) -> Vec<ValidationError> {
        instance
            .contexts
            .iter()
            .filter(|ctx| !ctx.period.is_well_formed())
            .map(|ctx| ValidationError::InvalidPeriod {
                context_id: ctx.id.clone(),
            })
            .collect()
    }

    fn validate_facts(&self, instance: &Instance, taxonomy: &Taxonomy) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for fact in &instance.facts {
            let concept = || fact.concept.clone();

            if instance.context(&fact.context_ref).is_none() {
                errors.push(ValidationError::UnknownContextRef {
                    concept: concept(),
                    context_ref: fact.context_ref.clone(),
                    line: fact.line,
                });
            }

            if fact.nil && !fact.raw_value.trim().is_empty() {
                errors.push(ValidationError::NilWithValue {
                    concept: concept(),
                    line: fact.line,
                });
            }

            // Unknown concepts were typed from their unit, so only declared
            // concepts can disagree with it.
            let numeric = taxonomy
                .concept(&fact.concept)
                .map(|c| c.data_type.is_numeric());
            match (&fact.unit_ref, numeric) {
                (Some(unit_ref), _) if instance.unit(unit_ref).is_none() => {
                    errors.push(ValidationError::UnknownUnitRef {
                        concept: concept(),
                        unit_ref: unit_ref.clone(),
                        line: fact.line,
                    });
                }
                (Some(unit_ref), Some(false)) => errors.push(ValidationError::UnexpectedUnit {
                    concept: concept(),
                    unit_ref: unit_ref.clone(),
                    line: fact.line,
                }),
                (None, Some(true)) if !fact.nil => errors.push(ValidationError::MissingUnit {
                    concept: concept(),
                    line: fact.line,
                }),
                _ => {}
            }

            if let Some(detail) = accuracy_problem(fact) {
                errors.push(ValidationError::InvalidAccuracy {
                    concept: concept(),
                    detail,
                    line: fact.line,
                });
            }
        }

        errors
    }
}

fn accuracy_problem(fact: &Fact) -> Option<String> {
    if let Some(raw) = &fact.decimals {
        if fact.decimals_hint().is_none() {
            return Some(format!("decimals '{raw}' is neither an integer nor INF"));
        }
    }
    if let Some(raw) = &fact.precision {
        match fact.precision_hint() {
            None => return Some(format!("precision '{raw}' is neither an integer nor INF")),
            Some(Accuracy::Digits(digits)) if digits < 0 => {
                return Some(format!("precision '{raw}' is negative"))
            }
            _ => {}
        }
    }
    if fact.decimals.is_some() && fact.precision.is_some() {
        return Some("both decimals and precision are given".to_string());
    }
    None
}
