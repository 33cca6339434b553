//! Namespace-aware element reading on top of `quick_xml`.
//!
//! XBRL puts QNames inside attribute values and text (`dimension="dart:Axis"`,
//! `<measure>iso4217:KRW</measure>`), so every element keeps a handle on the
//! prefix bindings in scope where it appeared. Instances are consumed one
//! top-level child at a time through [`ElementReader::next_child`]; schemas and
//! linkbases are small and go through [`parse_tree`].

use crate::error::{Error, ErrorKind, Location, Result};
use crate::model::QName;
use compact_str::CompactString;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const NS_XBRLI: &str = "http://www.xbrl.org/2003/instance";
pub const NS_LINK: &str = "http://www.xbrl.org/2003/linkbase";
pub const NS_XLINK: &str = "http://www.w3.org/1999/xlink";
pub const NS_XBRLDI: &str = "http://xbrl.org/2006/xbrldi";
pub const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const NS_XS: &str = "http://www.w3.org/2001/XMLSchema";
pub const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Raw bytes of one file of the filing. Released when dropped.
pub struct XmlSource {
    path: PathBuf,
    #[cfg(feature = "mmap")]
    data: memmap2::Mmap,
    #[cfg(not(feature = "mmap"))]
    data: Vec<u8>,
}

impl XmlSource {
    #[cfg(not(feature = "mmap"))]
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    #[cfg(feature = "mmap")]
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        // SAFETY: the map is read-only and dropped before the parse call returns.
        let data = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Document bytes with any UTF-8 byte order mark removed.
    pub fn bytes(&self) -> &[u8] {
        strip_bom(&self.data)
    }
}

pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(BOM).unwrap_or(data)
}

/// Prefix bindings visible at one point of a document.
#[derive(Debug)]
pub struct Scope {
    parent: Option<Arc<Scope>>,
    bindings: Vec<(CompactString, CompactString)>,
}

impl Scope {
    fn root() -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            bindings: vec![("xml".into(), NS_XML.into())],
        })
    }

    /// `""` looks up the default namespace.
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some((_, ns)) = s.bindings.iter().rev().find(|(p, _)| p.as_str() == prefix) {
                return Some(ns.as_str());
            }
            scope = s.parent.as_deref();
        }
        None
    }

    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            let found = s
                .bindings
                .iter()
                .rev()
                .find(|(p, ns)| !p.is_empty() && ns.as_str() == namespace);
            if let Some((prefix, _)) = found {
                // A closer rebinding of the same prefix shadows this one.
                if self.lookup(prefix) == Some(namespace) {
                    return Some(prefix.as_str());
                }
            }
            scope = s.parent.as_deref();
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub namespace: Option<CompactString>,
    pub prefix: Option<CompactString>,
    pub local: CompactString,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
    pub text: String,
    pub line: usize,
    scope: Arc<Scope>,
}

impl Element {
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.name.local_name == local && self.name.namespace == namespace
    }

    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    pub fn namespace(&self) -> &str {
        &self.name.namespace
    }

    /// Attribute without a namespace.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local == local)
            .map(|a| a.value.as_str())
    }

    pub fn attr_ns(&self, namespace: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.local == local && a.namespace.as_deref() == Some(namespace))
            .map(|a| a.value.as_str())
    }

    pub fn child(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(namespace, local))
    }

    pub fn children_named<'s>(
        &'s self,
        namespace: &'s str,
        local: &'s str,
    ) -> impl Iterator<Item = &'s Element> + 's {
        self.children.iter().filter(move |c| c.is(namespace, local))
    }

    /// Depth-first iteration over this element and all descendants.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// Resolves a `prefix:local` value against the bindings in scope here.
    /// Unprefixed values take the default namespace.
    pub fn resolve_qname(&self, raw: &str) -> Option<QName> {
        let raw = raw.trim();
        let (prefix, local) = match raw.split_once(':') {
            Some((p, l)) => (p, l),
            None => ("", raw),
        };
        if local.is_empty() {
            return None;
        }
        let namespace = match self.scope.lookup(prefix) {
            Some(ns) => ns,
            None if prefix.is_empty() => "",
            None => return None,
        };
        Some(QName::with_prefix(
            namespace,
            local,
            (!prefix.is_empty()).then_some(prefix),
        ))
    }

    /// Namespace bound to `prefix` where this element appeared.
    pub fn namespace_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.scope.lookup(prefix)
    }

    /// A non-default prefix bound to `namespace` where this element appeared.
    pub fn prefix_for_namespace(&self, namespace: &str) -> Option<&str> {
        self.scope.prefix_for(namespace)
    }

    pub fn location(&self, path: &Path) -> Location {
        Location::at(path, self.line)
    }

    /// Re-serialises the element's content (children and text), used for typed
    /// dimension members.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        if !self.text.trim().is_empty() {
            out.push_str(&quick_xml::escape::escape(self.text.trim()));
        }
        for child in &self.children {
            child.write_xml(&mut out);
        }
        out
    }

    fn write_xml(&self, out: &mut String) {
        let tag = match &self.name.prefix {
            Some(prefix) => format!("{prefix}:{}", self.name.local_name),
            None => self.name.local_name.to_string(),
        };
        let _ = write!(out, "<{tag}");
        for attr in &self.attributes {
            let name = match &attr.prefix {
                Some(p) => format!("{p}:{}", attr.local),
                None => attr.local.to_string(),
            };
            let _ = write!(out, " {name}=\"{}\"", quick_xml::escape::escape(&attr.value));
        }
        let text = self.text.trim();
        if text.is_empty() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&quick_xml::escape::escape(text));
        for child in &self.children {
            child.write_xml(out);
        }
        let _ = write!(out, "</{tag}>");
    }
}

pub struct Descendants<'e> {
    stack: Vec<&'e Element>,
}

impl<'e> Iterator for Descendants<'e> {
    type Item = &'e Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// Counts newlines incrementally so byte offsets can be reported as lines.
struct LineCounter {
    offset: usize,
    line: usize,
}

impl LineCounter {
    fn line_at(&mut self, data: &[u8], pos: usize) -> usize {
        let pos = pos.min(data.len());
        if pos >= self.offset {
            self.line += data[self.offset..pos].iter().filter(|&&b| b == b'\n').count();
        } else {
            self.line = 1 + data[..pos].iter().filter(|&&b| b == b'\n').count();
        }
        self.offset = pos;
        self.line
    }
}

/// Pull reader yielding whole elements.
pub struct ElementReader<'a> {
    reader: Reader<&'a [u8]>,
    data: &'a [u8],
    path: &'a Path,
    lines: LineCounter,
    scopes: Vec<Arc<Scope>>,
    root_open: bool,
}

impl<'a> ElementReader<'a> {
    pub fn new(data: &'a [u8], path: &'a Path) -> Self {
        let data = strip_bom(data);
        let mut reader = Reader::from_reader(data);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            data,
            path,
            lines: LineCounter { offset: 0, line: 1 },
            scopes: vec![Scope::root()],
            root_open: false,
        }
    }

    /// Reads up to the document element and returns it without children.
    pub fn read_root(&mut self) -> Result<Element> {
        loop {
            let pos = self.position();
            match self.reader.read_event().map_err(|e| self.xml_error(pos, e))? {
                Event::Start(start) => {
                    let root = self.open(&start, pos)?;
                    self.root_open = true;
                    return Ok(root);
                }
                Event::Empty(start) => {
                    let root = self.open(&start, pos)?;
                    self.scopes.pop();
                    return Ok(root);
                }
                Event::Eof => {
                    return Err(self.error_at(pos, "document has no root element"));
                }
                Event::Text(_) | Event::Decl(_) | Event::PI(_) | Event::Comment(_)
                | Event::DocType(_) | Event::CData(_) | Event::End(_) => {}
            }
        }
    }

    /// Next complete child of the document element, or `None` once the
    /// document element closes.
    pub fn next_child(&mut self) -> Result<Option<Element>> {
        if !self.root_open {
            return Ok(None);
        }
        loop {
            let pos = self.position();
            match self.reader.read_event().map_err(|e| self.xml_error(pos, e))? {
                Event::Start(start) => return self.build(start, pos).map(Some),
                Event::Empty(start) => {
                    let element = self.open(&start, pos)?;
                    self.scopes.pop();
                    return Ok(Some(element));
                }
                Event::End(_) => {
                    self.root_open = false;
                    self.scopes.pop();
                    return Ok(None);
                }
                Event::Eof => {
                    return Err(self.error_at(pos, "unexpected end of document"));
                }
                _ => {}
            }
        }
    }

    fn build(&mut self, start: BytesStart<'a>, pos: usize) -> Result<Element> {
        let first = self.open(&start, pos)?;
        let mut stack = vec![first];
        loop {
            let pos = self.position();
            match self.reader.read_event().map_err(|e| self.xml_error(pos, e))? {
                Event::Start(start) => {
                    let element = self.open(&start, pos)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = self.open(&start, pos)?;
                    self.scopes.pop();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    }
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| self.xml_error(pos, e))?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::End(_) => {
                    self.scopes.pop();
                    let Some(done) = stack.pop() else {
                        return Err(self.error_at(pos, "unbalanced end tag"));
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(done),
                        None => return Ok(done),
                    }
                }
                Event::Eof => return Err(self.error_at(pos, "unexpected end of document")),
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
            }
        }
    }

    /// Pushes the element's scope and resolves its name and attributes.
    fn open(&mut self, start: &BytesStart<'_>, pos: usize) -> Result<Element> {
        let line = self.lines.line_at(self.data, pos);
        let parent = self.scopes.last().cloned().unwrap_or_else(Scope::root);

        let mut bindings = Vec::new();
        let mut raw_attrs: Vec<(String, String)> = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.error_at(pos, format!("malformed attribute: {e}")))?;
            let key = decode(attr.key.as_ref());
            let value = attr
                .unescape_value()
                .map_err(|e| self.xml_error(pos, e))?
                .into_owned();
            if key == "xmlns" {
                bindings.push((CompactString::new(""), CompactString::from(value)));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                bindings.push((CompactString::from(prefix), CompactString::from(value)));
            } else {
                raw_attrs.push((key.into_owned(), value));
            }
        }
        let scope = if bindings.is_empty() {
            parent
        } else {
            Arc::new(Scope {
                parent: Some(parent),
                bindings,
            })
        };

        let start_name = start.name();
        let raw_name = decode(start_name.as_ref());
        let name = self.resolve_name(&scope, &raw_name, true, pos)?;

        let mut attributes = Vec::with_capacity(raw_attrs.len());
        for (key, value) in raw_attrs {
            let (namespace, prefix, local) = if key.contains(':') {
                let qname = self.resolve_name(&scope, &key, false, pos)?;
                (Some(qname.namespace), qname.prefix, qname.local_name)
            } else {
                (None, None, CompactString::from(key))
            };
            attributes.push(Attribute {
                namespace,
                prefix,
                local,
                value,
            });
        }

        self.scopes.push(scope.clone());
        Ok(Element {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
            line,
            scope,
        })
    }

    fn resolve_name(&mut self, scope: &Scope, raw: &str, use_default: bool, pos: usize) -> Result<QName> {
        match raw.split_once(':') {
            Some((prefix, local)) => match scope.lookup(prefix) {
                Some(ns) => Ok(QName::with_prefix(ns, local, Some(prefix))),
                None => Err(self.error_at(pos, format!("unbound namespace prefix '{prefix}'"))),
            },
            None => {
                let ns = if use_default { scope.lookup("").unwrap_or("") } else { "" };
                Ok(QName::with_prefix(ns, raw, None))
            }
        }
    }

    fn position(&self) -> usize {
        self.reader.buffer_position() as usize
    }

    fn error_at(&mut self, pos: usize, message: impl std::fmt::Display) -> Error {
        let line = self.lines.line_at(self.data, pos);
        Error::at(ErrorKind::InvalidXml, Location::at(self.path, line), message)
    }

    fn xml_error(&mut self, pos: usize, err: impl std::fmt::Display) -> Error {
        self.error_at(pos, err)
    }
}

fn decode(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Reads a whole document into a tree.
pub fn parse_tree(data: &[u8], path: &Path) -> Result<Element> {
    let mut reader = ElementReader::new(data, path);
    let mut root = reader.read_root()?;
    while let Some(child) = reader.next_child()? {
        root.children.push(child);
    }
    Ok(root)
}
