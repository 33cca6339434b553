//! Filing discovery: finds the instance, schemas, and linkbases in a directory.

use crate::error::{Error, ErrorKind, Location, Result};
use crate::xml::{ElementReader, XmlSource, NS_LINK, NS_XBRLI};
use bitflags::bitflags;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

bitflags! {
    /// Extended link kinds present in one linkbase file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct LinkbaseKinds: u8 {
        const LABEL = 1 << 0;
        const PRESENTATION = 1 << 1;
        const DEFINITION = 1 << 2;
        const CALCULATION = 1 << 3;
        const REFERENCE = 1 << 4;
    }
}

impl LinkbaseKinds {
    fn from_link_element(local: &str) -> Self {
        match local {
            "labelLink" => Self::LABEL,
            "presentationLink" => Self::PRESENTATION,
            "definitionLink" => Self::DEFINITION,
            "calculationLink" => Self::CALCULATION,
            "referenceLink" => Self::REFERENCE,
            _ => Self::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkbaseFile {
    pub path: PathBuf,
    pub kinds: LinkbaseKinds,
}

/// Files making up one filing. Paths only; contents are read on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub root: PathBuf,
    pub instance: PathBuf,
    pub schemas: Vec<PathBuf>,
    pub linkbases: Vec<LinkbaseFile>,
}

impl Manifest {
    pub fn linkbases_of(&self, kind: LinkbaseKinds) -> impl Iterator<Item = &Path> {
        self.linkbases
            .iter()
            .filter(move |l| l.kinds.intersects(kind))
            .map(|l| l.path.as_path())
    }
}

enum FileRole {
    Instance,
    Linkbase(LinkbaseKinds),
    Other,
}

/// Scans `dir` (recursively when asked) and classifies every file.
pub fn discover(dir: &Path, recursive: bool) -> Result<Manifest> {
    let mut files = Vec::new();
    collect_files(dir, recursive, &mut files)?;
    files.sort();

    let mut instances = Vec::new();
    let mut schemas = Vec::new();
    let mut linkbases = Vec::new();

    for path in files {
        if has_extension(&path, "xsd") {
            schemas.push(path);
            continue;
        }
        if !(has_extension(&path, "xml") || has_extension(&path, "xbrl")) {
            continue;
        }
        match classify(&path)? {
            FileRole::Instance => instances.push(path),
            FileRole::Linkbase(kinds) => linkbases.push(LinkbaseFile { path, kinds }),
            FileRole::Other => debug!(path = %path.display(), "ignoring non-XBRL file"),
        }
    }

    let instance = match instances.len() {
        0 => {
            return Err(Error::at(
                ErrorKind::NoInstanceDocument,
                Location::file(dir),
                "no XBRL instance document found",
            ))
        }
        1 => instances.remove(0),
        _ => {
            let names: Vec<String> = instances.iter().map(|p| p.display().to_string()).collect();
            return Err(Error::at(
                ErrorKind::MultipleInstanceDocuments,
                Location::file(dir),
                format!("found {} instance documents: {}", names.len(), names.join(", ")),
            ));
        }
    };

    debug!(
        instance = %instance.display(),
        schemas = schemas.len(),
        linkbases = linkbases.len(),
        "discovered filing"
    );

    Ok(Manifest {
        root: dir.to_path_buf(),
        instance,
        schemas,
        linkbases,
    })
}

fn collect_files(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
        if file_type.is_dir() {
            if recursive {
                collect_files(&path, recursive, out)?;
            }
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Decides by root element; linkbases are further split by their link children.
fn classify(path: &Path) -> Result<FileRole> {
    let source = XmlSource::open(path)?;
    let mut reader = ElementReader::new(source.bytes(), path);
    let root = match reader.read_root() {
        Ok(root) => root,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "skipping unreadable XML file");
            return Ok(FileRole::Other);
        }
    };

    if root.is(NS_XBRLI, "xbrl") {
        return Ok(FileRole::Instance);
    }
    if !root.is(NS_LINK, "linkbase") {
        return Ok(FileRole::Other);
    }

    let mut kinds = LinkbaseKinds::empty();
    while let Some(child) = reader.next_child()? {
        if child.namespace() == NS_LINK {
            kinds |= LinkbaseKinds::from_link_element(child.local_name());
        }
    }
    Ok(FileRole::Linkbase(kinds))
}
