//! `metadata.xml` serialization
//!
//! One element per field under a `<revision>` root. Current-state snapshots carry
//! four extra elements describing the page as it was when the snapshot was taken.

use crate::crawler::RevisionRecord;
use crate::storage::text::transliterate;
use crate::{MirrorError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

/// Page state captured alongside a current-version snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentPageState {
    pub title: String,
    pub tags: Vec<String>,
    /// Names of attached files at snapshot time
    pub file_list: Vec<String>,
    /// Names of files removed from the archive by this snapshot
    pub files_deleted: Vec<String>,
}

/// Renders the metadata document for one version
pub fn render_metadata(
    record: &RevisionRecord,
    current: Option<&CurrentPageState>,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("revision")))?;

    write_field(&mut writer, "number", &record.sequence_number.to_string())?;
    write_field(&mut writer, "ID", &record.row_id)?;
    write_field(&mut writer, "type", &record.change_type.to_string())?;
    write_field(&mut writer, "name", &record.editor_name)?;
    write_field(&mut writer, "date", &record.date_string())?;
    write_field(&mut writer, "comment", record.comment.as_deref().unwrap_or(""))?;

    if let Some(current) = current {
        write_field(&mut writer, "title", &current.title)?;
        write_field(&mut writer, "tags", &current.tags.join(","))?;
        write_field(&mut writer, "files_deleted", &current.files_deleted.join(","))?;
        write_field(&mut writer, "file_list", &current.file_list.join(","))?;
    }

    writer.write_event(Event::End(BytesEnd::new("revision")))?;

    let mut xml = String::from_utf8(writer.into_inner()).map_err(|e| {
        MirrorError::Archive(format!(
            "metadata for version {} is not UTF-8: {}",
            record.sequence_number, e
        ))
    })?;
    xml.push('\n');
    Ok(xml)
}

fn write_field(writer: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<()> {
    let value = transliterate(value);
    writer
        .create_element(name)
        .write_text_content(BytesText::new(&value))?;
    Ok(())
}
