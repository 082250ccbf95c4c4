//! Manifest text codec.
//!
//! Reading honors a UTF-8 byte-order mark, then the encoding named in the XML
//! declaration, and otherwise tries UTF-8 before falling back to Windows-1252.
//! Writing always declares Windows-1252 and never writes a BOM. Text and
//! attribute values outside ASCII become numeric character references; comments,
//! processing instructions and the doctype are written as Windows-1252 bytes.

use crate::document::{
    Attribute, GroupEntry, Item, ItemGroup, ManifestDocument, ProjectNode, XmlElement, XmlNode,
    ITEM_GROUP,
};
use crate::{ManifestError, Result};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::Path;

pub const DECLARED_ENCODING: &str = "Windows-1252";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Labels decoded through the Windows-1252 table.
const SINGLE_BYTE_LABELS: [&str; 7] = [
    "windows-1252",
    "cp1252",
    "x-cp1252",
    "iso-8859-1",
    "iso8859-1",
    "latin1",
    "l1",
];

const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{81}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{8D}', '\u{017D}', '\u{8F}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{9D}', '\u{017E}', '\u{0178}',
];

/// Output formatting for [`to_xml_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub indent: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

/// Decode manifest bytes: BOM first, then the declared encoding, then UTF-8
/// with a Windows-1252 fallback.
#[must_use]
pub fn decode_manifest_bytes(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    let single_byte = declared_encoding(bytes)
        .is_some_and(|label| SINGLE_BYTE_LABELS.contains(&label.as_str()));
    if single_byte {
        return decode_windows_1252(bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => decode_windows_1252(bytes),
    }
}

/// Lower-cased `encoding` pseudo-attribute of a leading XML declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    match reader.read_event_into(&mut buf) {
        Ok(Event::Decl(decl)) => decl
            .encoding()?
            .ok()
            .map(|label| String::from_utf8_lossy(&label).trim().to_ascii_lowercase()),
        _ => None,
    }
}

fn decode_windows_1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&byte| match byte {
            0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(byte - 0x80)],
            _ => char::from(byte),
        })
        .collect()
}

/// Encode `text` as Windows-1252, failing on the first character without a byte.
pub fn encode_windows_1252(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|character| {
            let code = u32::from(character);
            let byte = match code {
                0..=0x7F | 0xA0..=0xFF => u8::try_from(code).ok(),
                _ => WINDOWS_1252_HIGH
                    .iter()
                    .position(|&high| high == character)
                    .and_then(|index| u8::try_from(0x80 + index).ok()),
            };
            byte.ok_or(ManifestError::Unencodable { character })
        })
        .collect()
}

pub fn parse_manifest(path: &Path, text: &str) -> Result<ManifestDocument> {
    let xml_error = |source: quick_xml::Error| ManifestError::Xml {
        path: path.to_path_buf(),
        source,
    };
    let structure = |reason: String| ManifestError::Structure {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = Reader::from_str(text);
    let mut open: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut prolog = Vec::new();
    let mut epilog = Vec::new();

    loop {
        let node = match reader.read_event().map_err(xml_error)? {
            Event::Eof => break,
            Event::Decl(_) => continue,
            Event::Start(start) => {
                open.push(element_from(&reader, &start).map_err(xml_error)?);
                continue;
            }
            Event::End(end) => match open.pop() {
                Some(element) => XmlNode::Element(element),
                None => {
                    let end_name = end.name();
                    let name = reader.decoder().decode(end_name.as_ref()).map_err(xml_error)?;
                    return Err(structure(format!("unexpected </{name}>")));
                }
            },
            Event::Empty(start) => {
                XmlNode::Element(element_from(&reader, &start).map_err(xml_error)?)
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(xml_error)?;
                if value.trim().is_empty() {
                    continue;
                }
                XmlNode::Text(value.into_owned())
            }
            Event::CData(data) => {
                XmlNode::CData(decode(&reader, &data.into_inner()).map_err(xml_error)?)
            }
            Event::Comment(text) => XmlNode::Comment(decode(&reader, &text).map_err(xml_error)?),
            Event::PI(text) => {
                let raw = decode(&reader, &text).map_err(xml_error)?;
                match raw.split_once(char::is_whitespace) {
                    Some((target, value)) => XmlNode::ProcessingInstruction {
                        target: target.to_string(),
                        value: Some(value.trim_start().to_string()),
                    },
                    None => XmlNode::ProcessingInstruction {
                        target: raw,
                        value: None,
                    },
                }
            }
            Event::DocType(text) => {
                XmlNode::DocType(decode(&reader, &text).map_err(xml_error)?.trim().to_string())
            }
        };

        if let Some(parent) = open.last_mut() {
            parent.children.push(node);
            continue;
        }
        match node {
            XmlNode::Element(element) if root.is_none() => root = Some(element),
            XmlNode::Element(element) => {
                return Err(structure(format!("second root element <{}>", element.name)));
            }
            XmlNode::Text(_) | XmlNode::CData(_) => {
                return Err(structure("text outside the root element".to_string()));
            }
            other if root.is_none() => prolog.push(other),
            other => epilog.push(other),
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(structure(format!("unclosed <{}>", unclosed.name)));
    }
    let root = root.ok_or_else(|| structure("no root element".to_string()))?;

    let children = root
        .children
        .into_iter()
        .map(|child| match child {
            XmlNode::Element(element) if element.name == ITEM_GROUP => {
                ProjectNode::Group(group_from(element))
            }
            other => ProjectNode::Other(other),
        })
        .collect();

    Ok(ManifestDocument {
        prolog,
        root_name: root.name,
        root_attributes: root.attributes,
        children,
        epilog,
    })
}

fn decode(reader: &Reader<&[u8]>, bytes: &[u8]) -> quick_xml::Result<String> {
    reader.decoder().decode(bytes).map(Cow::into_owned)
}

/// Names are kept qualified and attributes (namespace declarations included)
/// stay in source order.
fn element_from(
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
) -> quick_xml::Result<XmlElement> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        attributes.push(Attribute::new(
            decode(reader, attr.key.as_ref())?,
            attr.unescape_value()?.into_owned(),
        ));
    }
    Ok(XmlElement {
        name: decode(reader, start.name().as_ref())?,
        attributes,
        children: Vec::new(),
    })
}

fn group_from(element: XmlElement) -> ItemGroup {
    let entries = element
        .children
        .into_iter()
        .map(|child| match child {
            XmlNode::Element(item) => GroupEntry::Item(Item {
                category: item.name,
                attributes: item.attributes,
                children: item.children,
            }),
            other => GroupEntry::Other(other),
        })
        .collect();
    ItemGroup {
        attributes: element.attributes,
        entries,
    }
}

/// Serialize with a fixed declaration and indentation, without a trailing newline.
pub fn to_xml_string(
    path: &Path,
    doc: &ManifestDocument,
    options: FormatOptions,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', options.indent);
    write_document(&mut writer, doc).map_err(|source| ManifestError::Xml {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(writer.into_inner()).map_err(|err| ManifestError::Other(err.to_string()))
}

/// [`to_xml_string`] encoded as the declared Windows-1252.
pub fn to_xml_bytes(
    path: &Path,
    doc: &ManifestDocument,
    options: FormatOptions,
) -> Result<Vec<u8>> {
    encode_windows_1252(&to_xml_string(path, doc, options)?)
}

fn write_document(
    writer: &mut Writer<Vec<u8>>,
    doc: &ManifestDocument,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new(
        "1.0",
        Some(DECLARED_ENCODING),
        None,
    )))?;
    for node in &doc.prolog {
        write_node(writer, node)?;
    }

    if doc.children.is_empty() {
        writer.write_event(Event::Empty(start_tag(&doc.root_name, &doc.root_attributes, true)))?;
    } else {
        writer.write_event(Event::Start(start_tag(&doc.root_name, &doc.root_attributes, false)))?;
        for child in &doc.children {
            match child {
                ProjectNode::Group(group) => write_group(writer, group)?,
                ProjectNode::Other(node) => write_node(writer, node)?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(doc.root_name.as_str())))?;
    }

    for node in &doc.epilog {
        write_node(writer, node)?;
    }
    Ok(())
}

fn write_group(writer: &mut Writer<Vec<u8>>, group: &ItemGroup) -> quick_xml::Result<()> {
    if group.entries.is_empty() {
        return writer.write_event(Event::Empty(start_tag(ITEM_GROUP, &group.attributes, true)));
    }
    writer.write_event(Event::Start(start_tag(ITEM_GROUP, &group.attributes, false)))?;
    for entry in &group.entries {
        match entry {
            GroupEntry::Item(item) => {
                write_element(writer, &item.category, &item.attributes, &item.children)?;
            }
            GroupEntry::Other(node) => write_node(writer, node)?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(ITEM_GROUP)))
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    attributes: &[Attribute],
    children: &[XmlNode],
) -> quick_xml::Result<()> {
    if children.is_empty() {
        return writer.write_event(Event::Empty(start_tag(name, attributes, true)));
    }
    writer.write_event(Event::Start(start_tag(name, attributes, false)))?;
    for child in children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> quick_xml::Result<()> {
    match node {
        XmlNode::Element(el) => write_element(writer, &el.name, &el.attributes, &el.children),
        XmlNode::Text(text) => {
            writer.write_event(Event::Text(BytesText::from_escaped(escape_text(text))))
        }
        XmlNode::CData(data) => writer.write_event(Event::CData(BytesCData::new(data.as_str()))),
        XmlNode::Comment(text) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
        }
        XmlNode::ProcessingInstruction { target, value } => {
            let content = match value {
                Some(value) => format!("{target} {value}"),
                None => target.clone(),
            };
            writer.write_event(Event::PI(BytesText::from_escaped(content)))
        }
        XmlNode::DocType(text) => {
            writer.write_event(Event::DocType(BytesText::from_escaped(text.as_str())))
        }
    }
}

/// Opening tag content. Empty tags keep a space before `/>`.
fn start_tag(name: &str, attributes: &[Attribute], empty: bool) -> BytesStart<'static> {
    let mut content = name.to_string();
    for attr in attributes {
        let _ = write!(content, " {}=\"{}\"", attr.name, escape_attribute(&attr.value));
    }
    if empty {
        content.push(' ');
    }
    BytesStart::from_content(content, name.len())
}

fn escape_text(text: &str) -> String {
    ascii_markup(&partial_escape(text), false)
}

fn escape_attribute(value: &str) -> String {
    ascii_markup(&partial_escape(value), true)
}

fn ascii_markup(escaped: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(escaped.len());
    for c in escaped.chars() {
        match c {
            '"' if attribute => out.push_str("&quot;"),
            '\n' | '\r' | '\t' if attribute => {
                let _ = write!(out, "&#{};", u32::from(c));
            }
            c if c.is_ascii() => out.push(c),
            c => {
                let _ = write!(out, "&#{};", u32::from(c));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        decode_manifest_bytes, encode_windows_1252, parse_manifest, to_xml_bytes, to_xml_string,
        FormatOptions,
    };
    use crate::document::{ProjectNode, XmlNode};
    use crate::ManifestError;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="4.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
    <PropertyGroup>
        <Name>app</Name>
    </PropertyGroup>
    <!-- sources -->
    <ItemGroup>
        <Compile Include="app.js" />
        <Content Include="views\index.html">
            <SubType>Code</SubType>
        </Content>
    </ItemGroup>
</Project>
"#;

    fn path() -> &'static Path {
        Path::new("app.njsproj")
    }

    #[test]
    fn round_trip_preserves_unmodelled_content() {
        let doc = parse_manifest(path(), SAMPLE).expect("parse");
        let written = to_xml_string(path(), &doc, FormatOptions::default()).expect("write");
        assert_eq!(
            written,
            "<?xml version=\"1.0\" encoding=\"Windows-1252\"?>\n\
<Project ToolsVersion=\"4.0\" xmlns=\"http://schemas.microsoft.com/developer/msbuild/2003\">\n  \
<PropertyGroup>\n    <Name>app</Name>\n  </PropertyGroup>\n  <!-- sources -->\n  \
<ItemGroup>\n    <Compile Include=\"app.js\" />\n    <Content Include=\"views\\index.html\">\n      \
<SubType>Code</SubType>\n    </Content>\n  </ItemGroup>\n</Project>"
        );
        let reparsed = parse_manifest(path(), &written).expect("reparse");
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn text_comments_and_doctype_survive_a_rewrite() {
        let source = "<?xml version=\"1.0\"?>\n<!DOCTYPE Project>\n\
<Project Sdk=\"Microsoft.NET.Sdk\" xmlns=\"http://schemas.microsoft.com/developer/msbuild/2003\">\n\
  <PropertyGroup>\n    <ScriptArguments> --port 80 </ScriptArguments>\n  </PropertyGroup>\n\
  <!-- caf\u{e9} -->\n  <ItemGroup>\n    <Content Include=\"a.txt\" />\n  </ItemGroup>\n</Project>\n\
<!-- trailer -->";
        let doc = parse_manifest(path(), source).expect("parse");
        assert_eq!(doc.prolog, vec![XmlNode::DocType("Project".to_string())]);
        assert_eq!(doc.epilog, vec![XmlNode::Comment(" trailer ".to_string())]);
        let attribute_names: Vec<_> = doc.root_attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(attribute_names, vec!["Sdk", "xmlns"]);
        let ProjectNode::Other(XmlNode::Element(properties)) = &doc.children[0] else {
            panic!("property group expected");
        };
        let XmlNode::Element(arguments) = &properties.children[0] else {
            panic!("argument element expected");
        };
        assert_eq!(arguments.children, vec![XmlNode::Text(" --port 80 ".to_string())]);

        let bytes = to_xml_bytes(path(), &doc, FormatOptions::default()).expect("write");
        assert!(bytes.windows(8).any(|w| w == b"<!-- caf"));
        assert!(bytes.contains(&0xE9));
        let reparsed = parse_manifest(path(), &decode_manifest_bytes(&bytes)).expect("reparse");
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn non_ascii_is_escaped() {
        let doc = parse_manifest(
            Path::new("p.njsproj"),
            "<Project><ItemGroup><Content Include=\"caf\u{e9} &amp; co.txt\" /></ItemGroup></Project>",
        )
        .expect("parse");
        let written =
            to_xml_string(Path::new("p.njsproj"), &doc, FormatOptions::default()).expect("write");
        assert!(written.is_ascii());
        assert!(written.contains("Include=\"caf&#233; &amp; co.txt\""));
        assert!(!written.ends_with('\n'));
    }

    #[test]
    fn comment_outside_windows_1252_cannot_be_written() {
        let doc = parse_manifest(path(), "<Project><!-- \u{2713} --></Project>").expect("parse");
        let err = to_xml_bytes(path(), &doc, FormatOptions::default()).expect_err("must fail");
        assert!(matches!(err, ManifestError::Unencodable { character: '\u{2713}' }));
        assert_eq!(encode_windows_1252("\u{20ac}\u{e9}").expect("encode"), vec![0x80, 0xE9]);
    }

    #[test]
    fn decode_strips_bom_and_falls_back_to_windows_1252() {
        assert_eq!(decode_manifest_bytes(b"\xEF\xBB\xBF<a/>"), "<a/>");
        assert_eq!(decode_manifest_bytes(b"caf\xE9 \x80"), "caf\u{e9} \u{20ac}");
    }

    #[test]
    fn declared_windows_1252_wins_over_valid_utf8() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"Windows-1252\"?><a>\xC3\xA9</a>";
        assert_eq!(
            decode_manifest_bytes(bytes),
            "<?xml version=\"1.0\" encoding=\"Windows-1252\"?><a>\u{c3}\u{a9}</a>"
        );
        let utf8 = "<?xml version=\"1.0\" encoding=\"utf-8\"?><a>\u{e9}</a>";
        assert_eq!(decode_manifest_bytes(utf8.as_bytes()), utf8);
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        for text in ["<Project><ItemGroup>", "<Project></Project></Extra>", "<!-- only -->"] {
            let err = parse_manifest(Path::new("bad.njsproj"), text).expect_err("must fail");
            assert!(err.to_string().contains("bad.njsproj"), "{text}: {err}");
        }
    }
}
