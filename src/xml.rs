//! Streaming XML tokeniser (C9, §4.9) driving the metadata parser's tag/attribute/
//! content dispatch, with a fast path for large base64 payloads.
//!
//! This is not a general-purpose XML parser: the envelope this format emits is
//! machine-generated and regular (no self-closing tags, comments, CDATA, or
//! processing instructions), so the tokeniser only implements the subset it needs —
//! `<Name attr="value" ...>content</Name>` — and reports [`crate::error::FormatError::MalformedXml`]
//! on anything else.

use crate::error::{bail, FormatError, Result};

/// One token emitted by the tokeniser. Content and attribute values are returned as
/// owned byte buffers since a single value may be split across `feed` calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `<Name`: the start of an element, before its attributes are known.
    ElementStart {
        /// Element name.
        name: String,
    },
    /// The name of one attribute, just after its opening quote was found.
    AttrStart {
        /// Attribute name.
        name: String,
    },
    /// An attribute's value, terminated by its closing quote.
    AttrVal {
        /// Raw attribute value bytes (always ASCII/UTF-8 in practice).
        value: Vec<u8>,
    },
    /// The end of one attribute (after its value).
    AttrEnd,
    /// `</Name>`: the end of an element.
    ElementEnd,
    /// Text content between an element's `>` and its next `<`.
    Content {
        /// Raw content bytes.
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Accumulating element/attribute content, looking for `<`.
    Text,
    /// Just saw `<`; deciding between an opening and a closing tag.
    AfterLt,
    /// Accumulating an element name.
    TagName { closing: bool },
    /// Past the name, skipping whitespace/looking for an attribute, `/`, or `>`.
    InTag,
    /// Accumulating an attribute name up to `=`.
    AttrName,
    /// Waiting for the opening quote of an attribute value.
    AwaitQuote,
    /// Accumulating an attribute value up to the matching quote byte.
    AttrValue { quote: u8 },
    /// Saw `/` inside a tag; expecting `>` to close a self-closing element.
    SelfClose,
    /// Inside a closing tag, past the name, waiting for `>`.
    ClosingTail,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b':' || b == b'.' || b == b'-'
}

/// Streaming tokeniser state. Feed it successive byte chunks (as read from the file in
/// 1 MiB pieces per §4.5); it emits [`Event`]s as soon as they're recognised, and
/// carries partial state (a name or value split across a chunk boundary) forward.
pub struct Tokenizer {
    state: State,
    buf: Vec<u8>,
    /// When set, [`Tokenizer::feed`] bypasses character-by-character content
    /// accumulation and instead scans for the next `<`, copying everything before it
    /// in one slice — the large base64 payload fast path (§4.5).
    pub raw_content: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Creates a tokeniser positioned at the start of a document.
    pub fn new() -> Self {
        Self {
            state: State::Text,
            buf: Vec::new(),
            raw_content: false,
        }
    }

    /// Feeds one chunk of input, appending emitted events to `events`.
    pub fn feed(&mut self, chunk: &[u8], events: &mut Vec<Event>) -> Result<()> {
        let mut i = 0;
        while i < chunk.len() {
            match self.state {
                State::Text => {
                    if self.raw_content {
                        match chunk[i..].iter().position(|&b| b == b'<') {
                            Some(rel) => {
                                if rel > 0 {
                                    events.push(Event::Content {
                                        bytes: chunk[i..i + rel].to_vec(),
                                    });
                                }
                                i += rel;
                                self.state = State::AfterLt;
                                i += 1; // consume the '<'
                            }
                            None => {
                                events.push(Event::Content {
                                    bytes: chunk[i..].to_vec(),
                                });
                                i = chunk.len();
                            }
                        }
                        continue;
                    }
                    let b = chunk[i];
                    if b == b'<' {
                        if !self.buf.is_empty() {
                            events.push(Event::Content {
                                bytes: std::mem::take(&mut self.buf),
                            });
                        }
                        self.state = State::AfterLt;
                    } else {
                        self.buf.push(b);
                    }
                    i += 1;
                }
                State::AfterLt => {
                    let b = chunk[i];
                    if b == b'/' {
                        self.state = State::TagName { closing: true };
                        i += 1;
                    } else {
                        self.state = State::TagName { closing: false };
                        // Re-process this byte as the first name character.
                    }
                }
                State::TagName { closing } => {
                    let b = chunk[i];
                    if is_name_byte(b) {
                        self.buf.push(b);
                        i += 1;
                        continue;
                    }
                    let name = String::from_utf8(std::mem::take(&mut self.buf))
                        .map_err(|_| FormatError::MalformedXml)?;
                    if closing {
                        events.push(Event::ElementEnd);
                        self.state = State::ClosingTail;
                    } else {
                        events.push(Event::ElementStart { name });
                        self.state = State::InTag;
                    }
                    // Do not consume `b`; let the next state decide what to do with
                    // whitespace/`>`/`/`.
                }
                State::InTag => {
                    let b = chunk[i];
                    if b.is_ascii_whitespace() {
                        i += 1;
                    } else if b == b'>' {
                        self.state = State::Text;
                        i += 1;
                    } else if b == b'/' {
                        self.state = State::SelfClose;
                        i += 1;
                    } else if is_name_byte(b) {
                        self.state = State::AttrName;
                    } else {
                        bail!(FormatError::MalformedXml);
                    }
                }
                State::AttrName => {
                    let b = chunk[i];
                    if is_name_byte(b) {
                        self.buf.push(b);
                        i += 1;
                        continue;
                    }
                    if b == b'=' {
                        let name = String::from_utf8(std::mem::take(&mut self.buf))
                            .map_err(|_| FormatError::MalformedXml)?;
                        events.push(Event::AttrStart { name });
                        self.state = State::AwaitQuote;
                        i += 1;
                    } else if b.is_ascii_whitespace() {
                        i += 1;
                    } else {
                        bail!(FormatError::MalformedXml);
                    }
                }
                State::AwaitQuote => {
                    let b = chunk[i];
                    if b == b'"' || b == b'\'' {
                        self.state = State::AttrValue { quote: b };
                        i += 1;
                    } else if b.is_ascii_whitespace() {
                        i += 1;
                    } else {
                        bail!(FormatError::MalformedXml);
                    }
                }
                State::AttrValue { quote } => {
                    if self.raw_content {
                        match chunk[i..].iter().position(|&b| b == quote) {
                            Some(rel) => {
                                self.buf.extend_from_slice(&chunk[i..i + rel]);
                                events.push(Event::AttrVal {
                                    value: std::mem::take(&mut self.buf),
                                });
                                events.push(Event::AttrEnd);
                                self.state = State::InTag;
                                i += rel + 1;
                            }
                            None => {
                                self.buf.extend_from_slice(&chunk[i..]);
                                i = chunk.len();
                            }
                        }
                        continue;
                    }
                    let b = chunk[i];
                    if b == quote {
                        events.push(Event::AttrVal {
                            value: std::mem::take(&mut self.buf),
                        });
                        events.push(Event::AttrEnd);
                        self.state = State::InTag;
                    } else {
                        self.buf.push(b);
                    }
                    i += 1;
                }
                State::SelfClose => {
                    let b = chunk[i];
                    if b != b'>' {
                        bail!(FormatError::MalformedXml);
                    }
                    events.push(Event::ElementEnd);
                    self.state = State::Text;
                    i += 1;
                }
                State::ClosingTail => {
                    let b = chunk[i];
                    if b == b'>' {
                        self.state = State::Text;
                        i += 1;
                    } else if b.is_ascii_whitespace() {
                        i += 1;
                    } else {
                        bail!(FormatError::MalformedXml);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parses a `"0x…"`-style hex attribute value into a `u16`, as used for `Group` and
/// `Element` attributes.
pub fn parse_hex_u16(value: &[u8]) -> Option<u16> {
    let s = std::str::from_utf8(value).ok()?;
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u16::from_str_radix(s, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> Vec<Event> {
        let mut tok = Tokenizer::new();
        let mut events = Vec::new();
        tok.feed(input.as_bytes(), &mut events).unwrap();
        events
    }

    #[test]
    fn parses_element_with_attribute_and_content() {
        let events = run(r#"<Attribute Name="Foo">bar</Attribute>"#);
        assert_eq!(
            events,
            vec![
                Event::ElementStart {
                    name: "Attribute".into()
                },
                Event::AttrStart { name: "Name".into() },
                Event::AttrVal {
                    value: b"Foo".to_vec()
                },
                Event::AttrEnd,
                Event::Content {
                    bytes: b"bar".to_vec()
                },
                Event::ElementEnd,
            ]
        );
    }

    #[test]
    fn parses_nested_elements_without_content() {
        let events = run(r#"<DataObject ObjectType="DPScannedImage"><Attribute Name="X"></Attribute></DataObject>"#);
        assert!(matches!(events[0], Event::ElementStart { .. }));
        assert!(events.iter().filter(|e| **e == Event::ElementEnd).count() == 2);
    }

    #[test]
    fn splitting_input_across_feed_calls_still_parses() {
        let mut tok = Tokenizer::new();
        let mut events = Vec::new();
        let input = r#"<Attribute Name="Foo">bar</Attribute>"#;
        let (a, b) = input.split_at(12);
        tok.feed(a.as_bytes(), &mut events).unwrap();
        tok.feed(b.as_bytes(), &mut events).unwrap();
        assert_eq!(events.last(), Some(&Event::ElementEnd));
    }

    #[test]
    fn hex_parsing_accepts_0x_prefix() {
        assert_eq!(parse_hex_u16(b"0x301D"), Some(0x301D));
        assert_eq!(parse_hex_u16(b"301D"), Some(0x301D));
    }
}
