//! Parses and emits the `QvdTableHeader` XML document that precedes the binary payload.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::{QvdError, Result};
use crate::header::{FieldHeader, LineageInfo, TableHeader};
use crate::value::{FieldTag, FieldType, NumberFormat};

/// A bare XML element tree; read is order-tolerant so we build the whole document
/// before pulling required children out by name.
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn required_text(&self, name: &'static str) -> Result<&str> {
        Ok(self.child(name).ok_or(QvdError::MissingRequiredElement(name))?.text.as_str())
    }

    fn required_int(&self, name: &'static str) -> Result<i64> {
        let text = self.required_text(name)?;
        text.trim()
            .parse()
            .map_err(|_| QvdError::InvalidXml(format!("<{name}> is not an integer: {text:?}")))
    }
}

fn parse_tree(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| QvdError::InvalidXml(e.to_string()))?;
        match event {
            Event::Start(e) => {
                let name = tag_name(&e);
                stack.push(Element {
                    name,
                    text: String::new(),
                    children: Vec::new(),
                });
            }
            Event::Empty(e) => {
                let elem = Element {
                    name: tag_name(&e),
                    text: String::new(),
                    children: Vec::new(),
                };
                attach(&mut stack, &mut root, elem);
            }
            Event::Text(t) => {
                let text = t
                    .decode()
                    .map_err(|e| QvdError::InvalidXml(e.to_string()))?
                    .into_owned();
                if let Some(cur) = stack.last_mut() {
                    cur.text.push_str(&text);
                }
            }
            Event::CData(t) => {
                let text = t
                    .decode()
                    .map_err(|e| QvdError::InvalidXml(e.to_string()))?
                    .into_owned();
                if let Some(cur) = stack.last_mut() {
                    cur.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let elem = stack
                    .pop()
                    .ok_or_else(|| QvdError::InvalidXml("unbalanced closing tag".into()))?;
                attach(&mut stack, &mut root, elem);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| QvdError::InvalidXml("empty document".into()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, elem: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(elem);
    } else {
        *root = Some(elem);
    }
}

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Parses a `QvdTableHeader` XML document into a [`TableHeader`].
pub fn parse_header(bytes: &[u8]) -> Result<TableHeader> {
    let xml =
        std::str::from_utf8(bytes).map_err(|e| QvdError::InvalidXml(format!("header is not utf-8: {e}")))?;
    let root = parse_tree(xml)?;
    if root.name != "QvdTableHeader" {
        return Err(QvdError::InvalidXml(format!(
            "expected root element <QvdTableHeader>, found <{}>",
            root.name
        )));
    }

    let mut header = TableHeader::new(root.required_text("TableName")?);
    header.set_qv_build_no(root.required_text("QvBuildNo")?.to_string());
    header.set_creator_doc(root.required_text("CreatorDoc")?.to_string());
    header.set_create_utc_time(root.required_text("CreateUtcTime")?.to_string());
    header.set_source_create_utc_time(root.required_text("SourceCreateUtcTime")?.to_string());
    header.set_source_file_utc_time(root.required_text("SourceFileUtcTime")?.to_string());
    header.set_source_file_size(root.required_int("SourceFileSize")?);
    header.set_stale_utc_time(root.required_text("StaleUtcTime")?.to_string());
    header.set_compression(root.required_text("Compression")?.to_string());
    header.set_record_byte_size(root.required_int("RecordByteSize")? as u64);
    header.set_no_of_records(root.required_int("NoOfRecords")? as u64);
    header.set_offset(root.required_int("Offset")? as u64);
    header.set_length(root.required_int("Length")? as u64);
    header.set_comment(root.required_text("Comment")?.to_string());

    if let Some(lineage) = root.child("Lineage") {
        if let Some(info) = lineage.child("LineageInfo") {
            let mut lineage_info = LineageInfo::default();
            lineage_info.set_discriminator(
                info.child("Discriminator").map(|e| e.text.clone()).unwrap_or_default(),
            );
            lineage_info.set_statement(
                info.child("Statement").map(|e| e.text.clone()).unwrap_or_default(),
            );
            *header.lineage_mut() = lineage_info;
        }
    }

    let fields_elem = root
        .child("Fields")
        .ok_or(QvdError::MissingRequiredElement("Fields"))?;
    let mut fields = Vec::new();
    for f in fields_elem.children_named("QvdFieldHeader") {
        fields.push(parse_field(f)?);
    }
    *header.fields_mut() = fields;

    Ok(header)
}

fn parse_field(e: &Element) -> Result<FieldHeader> {
    let mut field = FieldHeader::new(e.required_text("FieldName")?);
    field.set_bit_offset(e.required_int("BitOffset")? as u32);

    let bit_width = e.required_int("BitWidth")?;
    if !(0..=64).contains(&bit_width) {
        return Err(QvdError::Overflow(format!(
            "field {:?} has BitWidth {bit_width}, outside the valid 0..=64 range",
            field.field_name()
        )));
    }
    field.set_bit_width(bit_width as u32);

    field.set_bias(e.required_int("Bias")? as i32);
    field.set_no_of_symbols(e.required_int("NoOfSymbols")? as usize);
    field.set_offset(e.required_int("Offset")? as u64);
    field.set_length(e.required_int("Length")? as u64);
    field.set_comment(e.required_text("Comment")?.to_string());

    let nf = e
        .child("NumberFormat")
        .ok_or(QvdError::MissingRequiredElement("NumberFormat"))?;
    let mut number_format = NumberFormat::with_type(
        FieldType::parse(nf.required_text("Type")?)
            .ok_or_else(|| QvdError::InvalidXml(format!("unknown NumberFormat/Type {:?}", nf.required_text("Type"))))?,
    );
    number_format.set_n_dec(nf.required_int("nDec")? as i32);
    number_format.set_use_thou(nf.required_int("UseThou")? as i32);
    number_format.set_fmt(non_empty(nf.required_text("Fmt")?));
    number_format.set_dec(non_empty(nf.required_text("Dec")?));
    number_format.set_thou(non_empty(nf.required_text("Thou")?));
    field.set_number_format(number_format);

    let tags_elem = e.child("Tags").ok_or(QvdError::MissingRequiredElement("Tags"))?;
    let mut tags = Vec::new();
    for s in tags_elem.children_named("String") {
        if let Some(tag) = FieldTag::parse(&s.text) {
            tags.push(tag);
        }
    }
    *field.tags_mut() = tags;

    Ok(field)
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Emits a [`TableHeader`] as a `QvdTableHeader` XML document, UTF-8 with an XML
/// declaration and no self-closing elements.
pub fn emit_header(header: &TableHeader) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut writer = Writer::new(&mut out);

    writer
        .write_event(Event::Decl(quick_xml::events::BytesDecl::new(
            "1.0",
            Some("utf-8"),
            None,
        )))
        .map_err(xml_write_err)?;

    write_elem(&mut writer, "QvdTableHeader", |w| {
        write_text(w, "QvBuildNo", header.qv_build_no())?;
        write_text(w, "CreatorDoc", header.creator_doc())?;
        write_text(w, "CreateUtcTime", header.create_utc_time())?;
        write_text(w, "SourceCreateUtcTime", header.source_create_utc_time())?;
        write_text(w, "SourceFileUtcTime", header.source_file_utc_time())?;
        write_text(w, "SourceFileSize", &header.source_file_size().to_string())?;
        write_text(w, "StaleUtcTime", header.stale_utc_time())?;
        write_text(w, "TableName", header.table_name())?;

        write_elem(w, "Fields", |w| {
            for field in header.fields() {
                write_field(w, field)?;
            }
            Ok(())
        })?;

        write_text(w, "Compression", header.compression())?;
        write_text(w, "RecordByteSize", &header.record_byte_size().to_string())?;
        write_text(w, "NoOfRecords", &header.no_of_records().to_string())?;
        write_text(w, "Offset", &header.offset().to_string())?;
        write_text(w, "Length", &header.length().to_string())?;

        write_elem(w, "Lineage", |w| {
            write_elem(w, "LineageInfo", |w| {
                write_text(w, "Discriminator", header.lineage().discriminator())?;
                write_text(w, "Statement", header.lineage().statement())
            })
        })?;

        write_text(w, "Comment", header.comment())
    })?;

    Ok(out)
}

fn write_field(w: &mut Writer<&mut Vec<u8>>, field: &FieldHeader) -> Result<()> {
    write_elem(w, "QvdFieldHeader", |w| {
        write_text(w, "FieldName", field.field_name())?;
        write_text(w, "BitOffset", &field.bit_offset().to_string())?;
        write_text(w, "BitWidth", &field.bit_width().to_string())?;
        write_text(w, "Bias", &field.bias().to_string())?;

        write_elem(w, "NumberFormat", |w| {
            write_text(w, "Type", field.number_format().r#type().as_str())?;
            write_text(w, "nDec", &field.number_format().n_dec().to_string())?;
            write_text(w, "UseThou", &field.number_format().use_thou().to_string())?;
            write_text(w, "Fmt", field.number_format().fmt().as_deref().unwrap_or(""))?;
            write_text(w, "Dec", field.number_format().dec().as_deref().unwrap_or(""))?;
            write_text(w, "Thou", field.number_format().thou().as_deref().unwrap_or(""))
        })?;

        write_text(w, "NoOfSymbols", &field.no_of_symbols().to_string())?;
        write_text(w, "Offset", &field.offset().to_string())?;
        write_text(w, "Length", &field.length().to_string())?;
        write_text(w, "Comment", field.comment())?;

        write_elem(w, "Tags", |w| {
            for tag in field.tags() {
                write_text(w, "String", tag.as_str())?;
            }
            Ok(())
        })
    })
}

fn write_elem(
    w: &mut Writer<&mut Vec<u8>>,
    name: &str,
    body: impl FnOnce(&mut Writer<&mut Vec<u8>>) -> Result<()>,
) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_write_err)?;
    body(w)?;
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_write_err)?;
    Ok(())
}

/// Writes a leaf element, always emitting a (possibly empty) text node so the
/// element round-trips as `<X></X>` rather than a self-closing `<X/>`.
fn write_text(w: &mut Writer<&mut Vec<u8>>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_write_err)?;
    w.write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_write_err)?;
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_write_err)?;
    Ok(())
}

fn xml_write_err(e: std::io::Error) -> QvdError {
    QvdError::InvalidXml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> TableHeader {
        let mut h = TableHeader::new("T");
        h.set_qv_build_no("50668".into());
        h.set_creator_doc("doc".into());
        h.set_create_utc_time("2024-01-01 00:00:00".into());
        h.set_source_create_utc_time("".into());
        h.set_source_file_utc_time("".into());
        h.set_source_file_size(-1);
        h.set_stale_utc_time("".into());
        h.set_compression("".into());
        h.set_record_byte_size(1);
        h.set_no_of_records(0);
        h.set_offset(0);
        h.set_length(0);
        h.set_comment("".into());
        h
    }

    #[test]
    fn emits_empty_elements_with_explicit_close_tags() {
        let bytes = emit_header(&sample_header()).unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("<SourceCreateUtcTime></SourceCreateUtcTime>"));
        assert!(!xml.contains("<SourceCreateUtcTime/>"));
    }

    #[test]
    fn round_trips_a_header_with_one_field() {
        let mut h = sample_header();
        let mut f = FieldHeader::new("X");
        f.set_no_of_symbols(2);
        f.set_bit_width(1);
        f.set_number_format(NumberFormat::with_type(FieldType::Integer));
        f.tags_mut().push(FieldTag::Integer);
        f.tags_mut().push(FieldTag::Numeric);
        h.fields_mut().push(f);

        let bytes = emit_header(&h).unwrap();
        let parsed = parse_header(&bytes).unwrap();
        assert_eq!(parsed.table_name(), "T");
        assert_eq!(parsed.fields().len(), 1);
        assert_eq!(parsed.fields()[0].field_name(), "X");
        assert_eq!(parsed.fields()[0].no_of_symbols(), 2);
        assert_eq!(parsed.fields()[0].tags().len(), 2);
    }

    #[test]
    fn tolerates_a_missing_lineage_element() {
        let h = sample_header();
        let bytes = emit_header(&h).unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        let without_lineage = xml.replace(
            "<Lineage><LineageInfo><Discriminator></Discriminator><Statement></Statement></LineageInfo></Lineage>",
            "",
        );
        let parsed = parse_header(without_lineage.as_bytes()).unwrap();
        assert_eq!(parsed.lineage().discriminator(), "");
        assert_eq!(parsed.lineage().statement(), "");
    }

    #[test]
    fn rejects_missing_required_element() {
        let xml = "<?xml version=\"1.0\"?><QvdTableHeader><TableName>T</TableName></QvdTableHeader>";
        let err = parse_header(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, QvdError::MissingRequiredElement("QvBuildNo")));
    }

    #[test]
    fn rejects_a_bit_width_outside_the_64_bit_range() {
        let field = "<QvdFieldHeader><FieldName>X</FieldName><BitOffset>0</BitOffset>\
            <BitWidth>65</BitWidth><Bias>0</Bias><NoOfSymbols>2</NoOfSymbols>\
            <Offset>0</Offset><Length>0</Length><Comment></Comment></QvdFieldHeader>";
        let xml = format!(
            "<?xml version=\"1.0\"?><QvdTableHeader><TableName>T</TableName>\
            <QvBuildNo>1</QvBuildNo><CreatorDoc></CreatorDoc><CreateUtcTime></CreateUtcTime>\
            <SourceCreateUtcTime></SourceCreateUtcTime><SourceFileUtcTime></SourceFileUtcTime>\
            <SourceFileSize>-1</SourceFileSize><StaleUtcTime></StaleUtcTime><Compression></Compression>\
            <RecordByteSize>1</RecordByteSize><NoOfRecords>0</NoOfRecords><Offset>0</Offset>\
            <Length>0</Length><Comment></Comment><Fields>{field}</Fields></QvdTableHeader>"
        );
        let err = parse_header(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, QvdError::Overflow(_)));
    }
}
