//! Parser for the `List Blobs` XML enumeration returned by Azure Blob Storage.

use quick_xml::events::Event;

use super::types::StorageError;

/// One page of a blob enumeration.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BlobListPage {
    /// Blob names in service order.
    pub names: Vec<String>,
    /// Continuation marker for the next page, if any.
    pub next_marker: Option<String>,
}

/// Element whose text content is being captured.
#[derive(Clone, Copy)]
enum Capture {
    Name,
    Marker,
}

/// Parse an `EnumerationResults` document into names and the continuation marker.
pub fn parse_blob_list(xml: &[u8]) -> Result<BlobListPage, StorageError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut page = BlobListPage::default();
    let mut in_blob = false;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                capture = match e.local_name().as_ref() {
                    b"Blob" => {
                        in_blob = true;
                        None
                    }
                    b"Name" if in_blob => Some(Capture::Name),
                    b"NextMarker" => Some(Capture::Marker),
                    _ => None,
                };
            }
            Ok(Event::Text(te)) => {
                if let Some(target) = capture.take() {
                    let value = te
                        .unescape()
                        .map_err(|err| StorageError::InvalidResponse(err.to_string()))?
                        .into_owned();
                    match target {
                        Capture::Name => page.names.push(value),
                        Capture::Marker if !value.is_empty() => page.next_marker = Some(value),
                        Capture::Marker => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                capture = None;
                if e.local_name().as_ref() == b"Blob" {
                    in_blob = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(StorageError::InvalidResponse(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(page)
}
