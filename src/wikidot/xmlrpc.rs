//! XML-RPC request encoding and response decoding
//!
//! Only the shapes the Wikidot API uses are supported: struct parameters holding
//! strings and string arrays, and responses made of scalars, arrays and structs.
//! Scalars of every XML-RPC type are kept as their text.

use crate::{MirrorError, Result};
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// A struct member value in a request
#[derive(Debug, Clone)]
pub enum Param<'a> {
    Str(&'a str),
    StrArray(&'a [&'a str]),
}

/// Encodes a method call with a single struct parameter
pub fn encode_call(method: &str, members: &[(&str, Param<'_>)]) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;

    writer.create_element("methodCall").write_inner_content(|w| {
        w.create_element("methodName")
            .write_text_content(BytesText::new(method))?;
        w.create_element("params").write_inner_content(|w| {
            w.create_element("param").write_inner_content(|w| {
                w.create_element("value").write_inner_content(|w| {
                    w.create_element("struct").write_inner_content(|w| {
                        for (name, value) in members {
                            write_member(w, name, value)?;
                        }
                        Ok::<(), quick_xml::Error>(())
                    })?;
                    Ok::<(), quick_xml::Error>(())
                })?;
                Ok::<(), quick_xml::Error>(())
            })?;
            Ok::<(), quick_xml::Error>(())
        })?;
        Ok::<(), quick_xml::Error>(())
    })?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| MirrorError::Api(format!("request for {} is not UTF-8: {}", method, e)))
}

fn write_member(
    w: &mut Writer<Vec<u8>>,
    name: &str,
    value: &Param<'_>,
) -> quick_xml::Result<()> {
    w.create_element("member").write_inner_content(|w| {
        w.create_element("name").write_text_content(BytesText::new(name))?;
        w.create_element("value").write_inner_content(|w| {
            match value {
                Param::Str(s) => {
                    w.create_element("string").write_text_content(BytesText::new(s))?;
                }
                Param::StrArray(items) => {
                    w.create_element("array").write_inner_content(|w| {
                        w.create_element("data").write_inner_content(|w| {
                            for item in items.iter() {
                                w.create_element("value").write_inner_content(|w| {
                                    w.create_element("string")
                                        .write_text_content(BytesText::new(item))?;
                                    Ok::<(), quick_xml::Error>(())
                                })?;
                            }
                            Ok::<(), quick_xml::Error>(())
                        })?;
                        Ok::<(), quick_xml::Error>(())
                    })?;
                }
            }
            Ok::<(), quick_xml::Error>(())
        })?;
        Ok::<(), quick_xml::Error>(())
    })?;
    Ok::<(), quick_xml::Error>(())
}

/// A decoded response value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Looks up a direct member of a struct value
    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Pull parser over one `methodResponse` document
struct ResponseReader<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> ResponseReader<'a> {
    fn new(body: &'a str) -> Self {
        let mut reader = Reader::from_str(body);
        reader.trim_text(true);
        Self { reader }
    }

    fn next(&mut self) -> Result<Event<'a>> {
        loop {
            match self.reader.read_event().map_err(|e| {
                MirrorError::Api(format!(
                    "malformed XML-RPC response at byte {}: {}",
                    self.reader.buffer_position(),
                    e
                ))
            })? {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
                event => return Ok(event),
            }
        }
    }

    /// Reads the envelope; a fault becomes `MirrorError::Api` with its message
    fn response(&mut self) -> Result<Value> {
        self.expect_start("methodResponse")?;
        match self.next()? {
            Event::Start(e) if e.name().as_ref() == b"params" => {
                self.expect_start("param")?;
                self.expect_start("value")?;
                self.value_body()
            }
            Event::Start(e) if e.name().as_ref() == b"fault" => {
                self.expect_start("value")?;
                let fault = self.value_body()?;
                Err(MirrorError::Api(fault_message(&fault)))
            }
            other => Err(unexpected("params or fault", &other)),
        }
    }

    fn expect_start(&mut self, name: &str) -> Result<()> {
        match self.next()? {
            Event::Start(e) if e.name().as_ref() == name.as_bytes() => Ok(()),
            other => Err(unexpected(name, &other)),
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.next()? {
            Event::End(_) => Ok(()),
            other => Err(unexpected("end tag", &other)),
        }
    }

    /// Reads the content of a `<value>` element through its end tag
    fn value_body(&mut self) -> Result<Value> {
        match self.next()? {
            Event::End(_) => Ok(Value::Scalar(String::new())),
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| MirrorError::Api(format!("bad XML-RPC text: {}", e)))?
                    .into_owned();
                self.expect_end()?;
                Ok(Value::Scalar(text))
            }
            Event::Empty(e) => {
                let value = match e.name().as_ref() {
                    b"array" => Value::Array(Vec::new()),
                    b"struct" => Value::Struct(Vec::new()),
                    _ => Value::Scalar(String::new()),
                };
                self.expect_end()?;
                Ok(value)
            }
            Event::Start(e) => {
                let value = match e.name().as_ref() {
                    b"array" => self.array_body()?,
                    b"struct" => self.struct_body()?,
                    _ => Value::Scalar(self.text_until_end()?),
                };
                self.expect_end()?;
                Ok(value)
            }
            other => Err(unexpected("value content", &other)),
        }
    }

    fn text_until_end(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next()? {
                Event::Text(t) => text.push_str(
                    &t.unescape()
                        .map_err(|e| MirrorError::Api(format!("bad XML-RPC text: {}", e)))?,
                ),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
                Event::End(_) => return Ok(text),
                other => return Err(unexpected("text", &other)),
            }
        }
    }

    fn array_body(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        match self.next()? {
            Event::Empty(e) if e.name().as_ref() == b"data" => {}
            Event::Start(e) if e.name().as_ref() == b"data" => loop {
                match self.next()? {
                    Event::Start(e) if e.name().as_ref() == b"value" => {
                        items.push(self.value_body()?)
                    }
                    Event::Empty(e) if e.name().as_ref() == b"value" => {
                        items.push(Value::Scalar(String::new()))
                    }
                    Event::End(_) => break,
                    other => return Err(unexpected("array value", &other)),
                }
            },
            other => return Err(unexpected("data", &other)),
        }
        self.expect_end()?;
        Ok(Value::Array(items))
    }

    fn struct_body(&mut self) -> Result<Value> {
        let mut members = Vec::new();
        loop {
            match self.next()? {
                Event::Start(e) if e.name().as_ref() == b"member" => {
                    self.expect_start("name")?;
                    let name = self.text_until_end()?;
                    let value = match self.next()? {
                        Event::Start(e) if e.name().as_ref() == b"value" => self.value_body()?,
                        Event::Empty(e) if e.name().as_ref() == b"value" => {
                            Value::Scalar(String::new())
                        }
                        other => return Err(unexpected("member value", &other)),
                    };
                    self.expect_end()?;
                    members.push((name, value));
                }
                Event::End(_) => return Ok(Value::Struct(members)),
                other => return Err(unexpected("member", &other)),
            }
        }
    }
}

fn unexpected(wanted: &str, found: &Event<'_>) -> MirrorError {
    MirrorError::Api(format!(
        "malformed XML-RPC response: expected {} but found {:?}",
        wanted, found
    ))
}

fn fault_message(fault: &Value) -> String {
    match fault.member("faultString") {
        Some(Value::Scalar(message)) => message.clone(),
        _ => "XML-RPC fault without a message".to_string(),
    }
}

/// Decodes a complete response into its result value
///
/// # Returns
///
/// * `Ok(Value)` - The single result parameter
/// * `Err(MirrorError::Api)` - The response is a fault or is not well-formed
pub fn decode_response(body: &str) -> Result<Value> {
    ResponseReader::new(body).response()
}

/// Decodes a response whose result is an array of strings
///
/// # Returns
///
/// * `Ok(Vec<String>)` - The non-empty strings in document order
/// * `Err(MirrorError::Api)` - The response is a fault or not an array
pub fn decode_string_array(body: &str) -> Result<Vec<String>> {
    match decode_response(body)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Scalar(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .collect()),
        other => Err(MirrorError::Api(format!("expected an array result, got {:?}", other))),
    }
}

/// Decodes a `pages.get_meta` response and extracts one field of one page
///
/// The result is a struct keyed by page name whose values are structs of page
/// fields. Only direct members are considered at each level.
///
/// # Returns
///
/// * `Ok(Some(value))` - The page and field are present
/// * `Ok(None)` - The page is absent from the response
/// * `Err(MirrorError::Api)` - The response is a fault, or the page lacks the field
pub fn decode_page_field(body: &str, page: &str, field: &str) -> Result<Option<String>> {
    let result = decode_response(body)?;
    if !matches!(result, Value::Struct(_)) {
        return Err(MirrorError::Api(format!("expected a struct result, got {:?}", result)));
    }

    let Some(page_fields) = result.member(page) else {
        return Ok(None);
    };

    match page_fields.member(field) {
        Some(Value::Scalar(value)) => Ok(Some(value.clone())),
        Some(other) => Err(MirrorError::Api(format!(
            "field {} of page {} is not a scalar: {:?}",
            field, page, other
        ))),
        None => Err(MirrorError::Api(format!(
            "page {} has no {} field in the response",
            page, field
        ))),
    }
}
