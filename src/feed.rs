use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

/// One `<item>` from a Torznab search feed, exactly as the indexer sent it.
///
/// Everything is optional at this stage; the normalizer decides what is
/// usable. `attrs` holds the vendor extension pairs
/// (`<torznab:attr name=".." value=".."/>`) keyed by name.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
    pub title: Option<String>,
    pub guid: Option<String>,
    pub indexer_name: Option<String>,
    pub size: Option<String>,
    pub pub_date: Option<String>,
    pub enclosure_url: Option<String>,
    pub enclosure_length: Option<u64>,
    pub attrs: HashMap<String, String>,
}

impl RawItem {
    /// Looks up a vendor extension attribute by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to parse feed XML")]
    Xml(#[from] quick_xml::Error),
    #[error("feed document has no <channel> element")]
    MissingChannel,
}

/// Parses a Torznab-style RSS response body into raw item records.
///
/// The reader is event-driven: items accumulate into a list one element at a
/// time and extension attributes into a map one pair at a time, so a feed
/// carrying one item or one attribute parses the same way as a feed carrying
/// many. A document that is not XML, or that lacks the RSS channel structure,
/// is a [`FeedError`]; callers treat that as zero results rather than a hard
/// failure.
pub fn parse(xml: &str) -> Result<Vec<RawItem>, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut saw_channel = false;
    let mut current_item: Option<RawItem> = None;
    let mut current_element: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = element_name(element.name());
                match name.as_str() {
                    "channel" => saw_channel = true,
                    "item" => current_item = Some(RawItem::default()),
                    _ => {
                        if let Some(item) = current_item.as_mut() {
                            record_attributed_element(item, &name, &element);
                        }
                        current_element = Some(name);
                    }
                }
            }
            Event::Empty(element) => {
                let name = element_name(element.name());
                if let Some(item) = current_item.as_mut() {
                    record_attributed_element(item, &name, &element);
                }
            }
            Event::Text(text) => {
                let value = text.xml_content().unwrap_or_default();
                record_text(current_item.as_mut(), current_element.as_deref(), &value);
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                record_text(current_item.as_mut(), current_element.as_deref(), &value);
            }
            Event::End(element) => {
                if element_name(element.name()) == "item"
                    && let Some(item) = current_item.take()
                {
                    items.push(item);
                }
                current_element = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_channel {
        return Err(FeedError::MissingChannel);
    }

    Ok(items)
}

fn element_name(name: quick_xml::name::QName<'_>) -> String {
    String::from_utf8_lossy(name.as_ref()).into_owned()
}

/// Captures elements whose payload lives in XML attributes rather than text:
/// the enclosure and the vendor extension pairs.
fn record_attributed_element(item: &mut RawItem, name: &str, element: &BytesStart<'_>) {
    match name {
        "enclosure" => {
            for attribute in element.attributes().flatten() {
                let Ok(value) = attribute.unescape_value() else {
                    continue;
                };
                match attribute.key.as_ref() {
                    b"url" => item.enclosure_url = Some(value.into_owned()),
                    b"length" => item.enclosure_length = value.parse().ok(),
                    _ => {}
                }
            }
        }
        "torznab:attr" => {
            let mut attr_name = None;
            let mut attr_value = None;
            for attribute in element.attributes().flatten() {
                let Ok(value) = attribute.unescape_value() else {
                    continue;
                };
                match attribute.key.as_ref() {
                    b"name" => attr_name = Some(value.into_owned()),
                    b"value" => attr_value = Some(value.into_owned()),
                    _ => {}
                }
            }
            if let (Some(name), Some(value)) = (attr_name, attr_value) {
                // Repeated names (e.g. several category pairs) keep the
                // first value; the lookups we serve are single-valued.
                item.attrs.entry(name).or_insert(value);
            }
        }
        _ => {}
    }
}

fn record_text(item: Option<&mut RawItem>, element: Option<&str>, value: &str) {
    let (Some(item), Some(element)) = (item, element) else {
        return;
    };
    if value.is_empty() {
        return;
    }

    match element {
        "title" => item.title = Some(value.to_string()),
        // A guid may arrive bare or wrapped with attributes such as
        // isPermaLink; the text content is the identifier either way.
        "guid" => item.guid = Some(value.to_string()),
        "jackettindexer" => item.indexer_name = Some(value.to_string()),
        "size" => item.size = Some(value.to_string()),
        "pubDate" => item.pub_date = Some(value.to_string()),
        _ => {}
    }
}
