//! Flattening of `<include>` directives.
//!
//! Each `<include href="...">` is replaced, in place, by the top-level children of the
//! included file's `<grammar>`.  Comments are dropped and the result is re-serialised, so a
//! grammar without includes comes back structurally unchanged.

use crate::files::{Files, FsFiles};
use crate::types::Span;
use crate::xml::{self, is_el, is_rng_node, rebase_path, Error};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Node;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("problem loading {0:?}: {1}")]
    Io(PathBuf, #[source] io::Error),
    #[error("{file:?}: {source}")]
    Parse { file: PathBuf, source: Error },
    #[error("could not find {href:?} included from {file:?} (tried {tried:?})")]
    NotFound {
        file: PathBuf,
        span: Span,
        href: String,
        tried: Vec<PathBuf>,
    },
    #[error("{file:?}: <include> without an href attribute")]
    MissingHref { file: PathBuf, span: Span },
    #[error("{0:?} includes itself")]
    Recursive(PathBuf),
    #[error("{0:?} does not have a <grammar> root element")]
    NotGrammar(PathBuf),
    #[error("failed writing grammar: {0}")]
    Write(String),
}

type Result<T> = std::result::Result<T, IncludeError>;

/// Preprocess a grammar file from the filesystem
pub fn preprocess(path: &Path) -> Result<String> {
    Preprocessor::new(FsFiles).preprocess(path)
}

pub struct Preprocessor<F: Files> {
    fs: F,
}

impl<F: Files> Preprocessor<F> {
    pub fn new(fs: F) -> Preprocessor<F> {
        Preprocessor { fs }
    }

    pub fn preprocess(&self, path: &Path) -> Result<String> {
        let text = self
            .fs
            .load(path)
            .map_err(|e| IncludeError::Io(path.to_path_buf(), e))?;
        self.preprocess_text(path, &text)
    }

    /// Like `preprocess()`, for grammar text that has already been loaded.  `path` is used to
    /// resolve relative includes.
    pub fn preprocess_text(&self, path: &Path, text: &str) -> Result<String> {
        let doc = parse(path, text)?;
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
        emit(
            &mut w,
            Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
        )?;
        let mut stack = vec![path.to_path_buf()];
        self.node(&mut w, doc.root_element(), &mut stack, None)?;
        String::from_utf8(w.into_inner()).map_err(|e| IncludeError::Write(e.to_string()))
    }

    fn node(
        &self,
        w: &mut Writer<Vec<u8>>,
        node: Node,
        stack: &mut Vec<PathBuf>,
        default_ns: Option<&str>,
    ) -> Result<()> {
        if is_el(node, "include") {
            return self.include(w, node, stack, default_ns);
        }
        if is_rng_node(node) && node.attribute("combine").is_some() {
            warn!(
                "{:?}: combine={:?} on <{}> is not supported; definitions are not merged",
                stack.last(),
                node.attribute("combine").unwrap_or_default(),
                node.tag_name().name()
            );
        }

        let name = node.tag_name().name();
        let mut start = BytesStart::new(name);
        let ns = node.tag_name().namespace();
        if ns != default_ns {
            start.push_attribute(("xmlns", ns.unwrap_or("")));
        }
        let mut prefixes: Vec<(String, String)> = vec![];
        let mut attrs: Vec<(String, &str)> = vec![];
        for a in node.attributes() {
            match a.namespace() {
                None => attrs.push((a.name().to_string(), a.value())),
                Some(XML_NS) => attrs.push((format!("xml:{}", a.name()), a.value())),
                Some(uri) => {
                    let prefix = node
                        .namespaces()
                        .find(|n| n.uri() == uri && n.name().is_some())
                        .and_then(|n| n.name())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("ns{}", prefixes.len() + 1));
                    if !prefixes.iter().any(|(p, _)| *p == prefix) {
                        prefixes.push((prefix.clone(), uri.to_string()));
                    }
                    attrs.push((format!("{}:{}", prefix, a.name()), a.value()));
                }
            }
        }
        for (prefix, uri) in &prefixes {
            start.push_attribute((format!("xmlns:{}", prefix).as_str(), uri.as_str()));
        }
        for (k, v) in &attrs {
            start.push_attribute((k.as_str(), *v));
        }

        let has_elements = node.children().any(|c| c.is_element());
        let content: Vec<Node> = node
            .children()
            .filter(|c| {
                c.is_element()
                    || (c.is_text()
                        && (!has_elements || !c.text().unwrap_or_default().trim().is_empty()))
            })
            .collect();
        if content.is_empty() {
            return emit(w, Event::Empty(start));
        }
        emit(w, Event::Start(start))?;
        for child in content {
            if child.is_element() {
                self.node(w, child, stack, ns)?;
            } else if let Some(text) = child.text() {
                emit(w, Event::Text(BytesText::new(text)))?;
            }
        }
        emit(w, Event::End(BytesEnd::new(name)))
    }

    fn include(
        &self,
        w: &mut Writer<Vec<u8>>,
        node: Node,
        stack: &mut Vec<PathBuf>,
        default_ns: Option<&str>,
    ) -> Result<()> {
        let current = stack.last().cloned().unwrap_or_default();
        let href = node
            .attribute("href")
            .ok_or_else(|| IncludeError::MissingHref {
                file: current.clone(),
                span: node.range(),
            })?;
        if node.children().any(|c| c.is_element()) {
            warn!(
                "{:?}: overriding definitions inside <include href={:?}> is not supported",
                current, href
            );
        }
        let rebased = rebase_path(node, href);
        let mut tried = vec![];
        if let Some(dir) = current.parent() {
            tried.push(dir.join(&rebased));
        }
        if !tried.contains(&rebased) {
            tried.push(rebased);
        }
        let (path, text) = tried
            .iter()
            .find_map(|p| self.fs.load(p).ok().map(|t| (p.clone(), t)))
            .ok_or_else(|| IncludeError::NotFound {
                file: current.clone(),
                span: node.range(),
                href: href.to_string(),
                tried: tried.clone(),
            })?;
        if stack.contains(&path) {
            return Err(IncludeError::Recursive(path));
        }

        let doc = parse(&path, &text)?;
        let root = doc.root_element();
        if !is_el(root, "grammar") {
            return Err(IncludeError::NotGrammar(path));
        }
        stack.push(path);
        for child in root.children().filter(|c| c.is_element()) {
            self.node(w, child, stack, default_ns)?;
        }
        stack.pop();
        Ok(())
    }
}

fn parse<'input>(path: &Path, text: &'input str) -> Result<roxmltree::Document<'input>> {
    roxmltree::Document::parse(text).map_err(|e| IncludeError::Parse {
        file: path.to_path_buf(),
        source: xml::xml_error(text, &e),
    })
}

fn emit(w: &mut Writer<Vec<u8>>, event: Event) -> Result<()> {
    w.write_event(event)
        .map_err(|e| IncludeError::Write(e.to_string()))
}
