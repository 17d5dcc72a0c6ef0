use super::{ParseResult, Parser, SyntaxError};
use crate::vocabulary::*;
use log::{trace, warn};
use quick_xml::events::{BytesStart, Event};
use scxmlio_core::{lookup_binding, ForeignNode, Markup, NsBinding};

/// Whether the character data is only whitespace.
pub(super) fn is_blank(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

impl<'a> Parser<'a> {
    /// The source text from `start` to the current position.
    fn raw(&self, start: u64) -> ParseResult<String> {
        let end = self.reader.buffer_position();
        let raw = self
            .source
            .get(start as usize..end as usize)
            .unwrap_or_default();
        Ok(std::str::from_utf8(raw)?.to_owned())
    }

    /// Captures verbatim every child node of the element just opened, consuming its end tag.
    /// Whitespace-only text is dropped.
    pub(super) fn capture(&mut self) -> ParseResult<Vec<ForeignNode>> {
        let mut nodes = Vec::new();
        loop {
            let start = self.reader.buffer_position();
            let node = match self.reader.read_event()? {
                Event::Start(tag) => {
                    self.reader.read_to_end(tag.name())?;
                    ForeignNode::Element(self.raw(start)?)
                }
                Event::Empty(_) => ForeignNode::Element(self.raw(start)?),
                Event::Text(text) if is_blank(&text) => continue,
                Event::Text(_) => ForeignNode::Text(self.raw(start)?),
                Event::CData(_) => ForeignNode::CData(self.raw(start)?),
                Event::Comment(_) => ForeignNode::Comment(self.raw(start)?),
                Event::PI(_) => ForeignNode::ProcessingInstruction(self.raw(start)?),
                Event::End(_) => return Ok(nodes),
                Event::Decl(_) | Event::DocType(_) => {
                    self.position = start;
                    return Err(self.invalid(TAG_DOCUMENT));
                }
                Event::Eof => return Err(SyntaxError::UnclosedTags.into()),
            };
            trace!(target: "parser", "captured {} bytes of foreign content", node.raw().len());
            nodes.push(node);
        }
    }

    /// Captures the foreign content of a `<data>`, `<content>` or `<assign>` element.
    pub(super) fn markup(&mut self) -> ParseResult<Option<Markup>> {
        let nodes = self.capture()?;
        if nodes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Markup {
                namespaces: self.extra_bindings(),
                nodes,
            }))
        }
    }

    /// Reads the (unescaped) text content of the element just opened, consuming its end tag.
    pub(super) fn text(&mut self, element: &str) -> ParseResult<String> {
        let mut body = String::new();
        loop {
            self.position = self.reader.buffer_position();
            match self.reader.read_event()? {
                Event::Text(text) => body.push_str(&text.unescape()?),
                Event::CData(cdata) => body.push_str(std::str::from_utf8(&cdata)?),
                Event::Comment(_) | Event::PI(_) => continue,
                Event::End(_) => return Ok(body),
                Event::Start(tag) | Event::Empty(tag) => {
                    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                    return Err(self.invalid_in(&name, element));
                }
                Event::Decl(_) | Event::DocType(_) => {
                    return Err(self.invalid_in(TAG_DOCUMENT, element));
                }
                Event::Eof => return Err(SyntaxError::UnclosedTags.into()),
            }
        }
    }

    /// Consumes the content of an element that admits none, up to its end tag.
    pub(super) fn expect_end(&mut self, element: &str) -> ParseResult<()> {
        loop {
            self.position = self.reader.buffer_position();
            match self.reader.read_event()? {
                Event::Text(text) if is_blank(&text) => continue,
                Event::Comment(_) => continue,
                Event::End(_) => return Ok(()),
                Event::Start(tag) | Event::Empty(tag) => {
                    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                    return Err(self.invalid_in(&name, element));
                }
                Event::Text(_) => return Err(self.invalid_in(TAG_TEXT, element)),
                Event::CData(_) => return Err(self.invalid_in(TAG_CDATA, element)),
                Event::PI(_) | Event::Decl(_) | Event::DocType(_) => {
                    return Err(self.invalid_in(TAG_DOCUMENT, element));
                }
                Event::Eof => return Err(SyntaxError::UnclosedTags.into()),
            }
        }
    }

    /// Skips the content of the element just opened, consuming its end tag.
    pub(super) fn skip(&mut self, tag: &BytesStart<'a>, element: &str) -> ParseResult<()> {
        let span = self.reader.read_to_end(tag.name())?;
        let inner = self
            .source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default();
        if !is_blank(inner) {
            warn!(target: "parser", "skipping content of custom action '{element}'");
        }
        Ok(())
    }

    /// Namespace bindings in scope at the innermost open element
    /// that are not already in scope at the root element.
    pub(super) fn extra_bindings(&self) -> Vec<NsBinding> {
        let Some((root, nested)) = self.scopes.split_first() else {
            return Vec::new();
        };
        let mut extra: Vec<NsBinding> = Vec::new();
        for binding in nested.iter().flatten() {
            match extra.iter_mut().find(|known| known.prefix == binding.prefix) {
                Some(known) => known.uri.clone_from(&binding.uri),
                None => extra.push(binding.clone()),
            }
        }
        extra.retain(|binding| {
            lookup_binding(root, binding.prefix.as_deref()) != Some(binding.uri.as_str())
        });
        extra
    }
}
