//! Parser for the pipeline description DSL.
//!
//! Grammar accepted here (a practical subset of the launch syntax):
//!
//! ```text
//! videotestsrc name=v pattern=snow ! queue ! fakesink name=s  audiotestsrc ! autoaudiosink
//! ```
//!
//! - a bare word starts a new element of that factory
//! - `key=value` sets a property on the element that precedes it
//! - `!` links the previous element to the next one
//! - a caps string (`video/x-raw,width=640`) becomes a `capsfilter`
//! - `name.` refers to an element declared elsewhere
//! - chains not joined by `!` are independent branches

use crate::engine::error::{EngineError, EngineResult};

/// One element declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedElement {
    pub factory: String,
    pub properties: Vec<(String, String)>,
}

impl ParsedElement {
    fn new(factory: impl Into<String>) -> Self {
        Self {
            factory: factory.into(),
            properties: Vec::new(),
        }
    }

    /// Explicit `name=` property, if any
    pub fn explicit_name(&self) -> Option<&str> {
        self.properties
            .iter()
            .rev()
            .find(|(key, _)| key == "name")
            .map(|(_, value)| value.as_str())
    }
}

/// Elements plus links between them (indices into `elements`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedGraph {
    pub elements: Vec<ParsedElement>,
    pub links: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Link,
    Word(String),
}

fn tokenize(text: &str) -> EngineResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    let flush = |current: &mut String, tokens: &mut Vec<Token>| {
        if !current.is_empty() {
            tokens.push(Token::Word(std::mem::take(current)));
        }
    };

    for c in text.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '!' if !in_quotes => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::Link);
            }
            c if c.is_whitespace() && !in_quotes => flush(&mut current, &mut tokens),
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err(EngineError::Build("unterminated quote".to_string()));
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

/// `video/x-raw(memory:GLMemory),width=1920` style tokens
fn is_caps(word: &str) -> bool {
    let head = word.split([',', '(']).next().unwrap_or_default();
    head.contains('/') && !head.contains('=')
}

/// Parse a description into elements and links
pub fn parse_description(text: &str) -> EngineResult<ParsedGraph> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(EngineError::Build("empty pipeline".to_string()));
    }

    let mut graph = ParsedGraph::default();
    // Unresolved `name.` references: (position in links, is_source_side, name)
    let mut references: Vec<(usize, bool, String)> = Vec::new();

    #[derive(Clone)]
    enum Cursor {
        Element(usize),
        Reference(String),
    }

    let mut previous: Option<Cursor> = None;
    let mut pending_link = false;

    for token in tokens {
        match token {
            Token::Link => {
                if previous.is_none() || pending_link {
                    return Err(EngineError::Build(
                        "link without a source element".to_string(),
                    ));
                }
                pending_link = true;
            }
            Token::Word(word) => {
                let next = if word.ends_with('.') && !word.contains('=') && word.len() > 1 {
                    Cursor::Reference(word.trim_end_matches('.').to_string())
                } else if is_caps(&word) {
                    let mut element = ParsedElement::new("capsfilter");
                    element.properties.push(("caps".to_string(), word));
                    graph.elements.push(element);
                    Cursor::Element(graph.elements.len() - 1)
                } else if let Some((key, value)) = word.split_once('=') {
                    if pending_link {
                        return Err(EngineError::Build(format!(
                            "expected element after '!', found property '{}'",
                            key
                        )));
                    }
                    match &previous {
                        Some(Cursor::Element(index)) => {
                            graph.elements[*index]
                                .properties
                                .push((key.to_string(), value.to_string()));
                        }
                        _ => {
                            return Err(EngineError::Build(format!(
                                "property '{}' has no element to apply to",
                                key
                            )))
                        }
                    }
                    continue;
                } else {
                    graph.elements.push(ParsedElement::new(word));
                    Cursor::Element(graph.elements.len() - 1)
                };

                if pending_link {
                    let link_index = graph.links.len();
                    let from = match previous.clone() {
                        Some(Cursor::Element(i)) => i,
                        Some(Cursor::Reference(name)) => {
                            references.push((link_index, true, name));
                            usize::MAX
                        }
                        None => unreachable!("pending link always has a source"),
                    };
                    let to = match &next {
                        Cursor::Element(i) => *i,
                        Cursor::Reference(name) => {
                            references.push((link_index, false, name.clone()));
                            usize::MAX
                        }
                    };
                    graph.links.push((from, to));
                    pending_link = false;
                }
                previous = Some(next);
            }
        }
    }

    if pending_link {
        return Err(EngineError::Build(
            "link without a sink element".to_string(),
        ));
    }

    for (link_index, source_side, name) in references {
        let target = graph
            .elements
            .iter()
            .position(|e| e.explicit_name() == Some(name.as_str()))
            .ok_or_else(|| EngineError::Build(format!("no element named \"{}\"", name)))?;
        let link = &mut graph.links[link_index];
        if source_side {
            link.0 = target;
        } else {
            link.1 = target;
        }
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_chain() {
        let graph = parse_description("videotestsrc name=v ! fakesink name=s").unwrap();
        assert_eq!(graph.elements.len(), 2);
        assert_eq!(graph.elements[0].factory, "videotestsrc");
        assert_eq!(graph.elements[0].explicit_name(), Some("v"));
        assert_eq!(graph.elements[1].explicit_name(), Some("s"));
        assert_eq!(graph.links, vec![(0, 1)]);
    }

    #[test]
    fn test_quoted_values_and_caps() {
        let graph = parse_description(
            "gltestsrc name=\"videoSrc\" ! queue ! video/x-raw(memory:GLMemory),width=1920,framerate=30/1 ! fakesink",
        )
        .unwrap();
        assert_eq!(graph.elements.len(), 4);
        assert_eq!(graph.elements[0].explicit_name(), Some("videoSrc"));
        assert_eq!(graph.elements[2].factory, "capsfilter");
        assert_eq!(
            graph.elements[2].properties[0].1,
            "video/x-raw(memory:GLMemory),width=1920,framerate=30/1"
        );
        assert_eq!(graph.links, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_independent_branches() {
        let graph =
            parse_description("videotestsrc ! fakesink  audiotestsrc ! volume name=vol ! fakesink")
                .unwrap();
        assert_eq!(graph.elements.len(), 5);
        assert_eq!(graph.links, vec![(0, 1), (2, 3), (3, 4)]);
    }

    #[test]
    fn test_named_reference() {
        let graph = parse_description("tee name=t ! fakesink t. ! fakesink").unwrap();
        assert_eq!(graph.links, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_errors() {
        assert!(parse_description("   ").is_err());
        assert!(parse_description("! fakesink").is_err());
        assert!(parse_description("videotestsrc !").is_err());
        assert!(parse_description("videotestsrc ! ! fakesink").is_err());
        assert!(parse_description("name=x").is_err());
        assert!(parse_description("videotestsrc name=\"v").is_err());
        assert!(parse_description("missing. ! fakesink").is_err());
    }
}
