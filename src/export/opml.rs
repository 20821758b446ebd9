//! Render the story list as an OPML 2.0 subscription document.
//!
//! The whole document is rebuilt from the store on every call and swapped in
//! with a rename, so feed readers never see a half-written file.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{Result, Rr2OpmlError};
use crate::fsutil::atomic_write;
use crate::model::story::Story;

const OPML_VERSION: &str = "2.0";
const DOCUMENT_TITLE: &str = "rr2opml subscriptions";
const FEED_TYPE: &str = "rss";

#[derive(Debug, Serialize)]
#[serde(rename = "opml")]
struct Opml<'a> {
    #[serde(rename = "@version")]
    version: &'a str,
    head: Head<'a>,
    body: Body<'a>,
}

#[derive(Debug, Serialize)]
struct Head<'a> {
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct Body<'a> {
    outline: Vec<Outline<'a>>,
}

#[derive(Debug, Serialize)]
struct Outline<'a> {
    #[serde(rename = "@text")]
    text: &'a str,
    #[serde(rename = "@title")]
    title: &'a str,
    #[serde(rename = "@type")]
    kind: &'a str,
    #[serde(rename = "@xmlUrl")]
    xml_url: &'a str,
}

/// Render the subscription document for `stories`, one outline per story.
///
/// Output depends only on the input sequence, so equal inputs give
/// byte-identical documents.
pub fn render_opml(stories: &[Story]) -> Result<String> {
    let document = Opml {
        version: OPML_VERSION,
        head: Head {
            title: DOCUMENT_TITLE,
        },
        body: Body {
            outline: stories
                .iter()
                .map(|story| Outline {
                    text: &story.title,
                    title: &story.title,
                    kind: FEED_TYPE,
                    xml_url: &story.feed_url,
                })
                .collect(),
        },
    };

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let mut serializer = quick_xml::se::Serializer::new(&mut xml);
    serializer.indent(' ', 2);
    document
        .serialize(serializer)
        .map_err(|e| Rr2OpmlError::Outline(e.to_string()))?;
    xml.push('\n');
    Ok(xml)
}

/// Rewrite the subscription document at `path` from `stories`.
pub fn write_opml(stories: &[Story], path: &Path) -> Result<()> {
    let xml = render_opml(stories)?;
    atomic_write(path, xml.as_bytes())?;
    info!(path = %path.display(), count = stories.len(), "Wrote subscription list");
    Ok(())
}
