//! Field extraction from the storage service's XML answers.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// First text value seen for each element name, plus the `resultCode`
/// attribute of the `result` element when there is one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct XmlFields {
    values: HashMap<String, String>,
    pub result_code: Option<String>,
}

impl XmlFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }
}

pub fn scan(xml: &str) -> Result<XmlFields, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut open: Vec<String> = Vec::new();
    let mut fields = XmlFields::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "result" {
                    fields.result_code = result_code(&e);
                }
                open.push(name);
            }
            Event::Empty(e) => {
                if local_name(&e) == "result" {
                    fields.result_code = result_code(&e);
                }
            }
            Event::End(_) => {
                open.pop();
            }
            Event::Text(t) => {
                if let Some(name) = open.last() {
                    let text = t.unescape()?.into_owned();
                    fields.values.entry(name.clone()).or_insert(text);
                }
            }
            Event::CData(c) => {
                if let Some(name) = open.last() {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    fields.values.entry(name.clone()).or_insert(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(fields)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn result_code(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"resultCode")
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}
