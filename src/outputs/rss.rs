//! RSS 2.0 feed emission.
//!
//! The document is rendered in memory first, then written to a sibling
//! `.tmp` file and renamed over the target. A run that fails anywhere before
//! the rename leaves the previous feed exactly as it was.

use crate::config::FeedMeta;
use crate::error::{Error, Result};
use crate::models::Article;
use crate::utils::{ensure_parent_dir, format_rfc822};
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::ffi::OsString;
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

const GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

fn xml_err<E: Display>(e: E) -> Error {
    Error::Xml(e.to_string())
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    w.write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn write_item<W: Write>(w: &mut Writer<W>, article: &Article) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new("item")))
        .map_err(xml_err)?;
    write_text_element(w, "title", &article.title)?;
    write_text_element(w, "link", &article.link)?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "true"));
    w.write_event(Event::Start(guid)).map_err(xml_err)?;
    w.write_event(Event::Text(BytesText::new(article.guid())))
        .map_err(xml_err)?;
    w.write_event(Event::End(BytesEnd::new("guid")))
        .map_err(xml_err)?;

    write_text_element(w, "pubDate", &format_rfc822(&article.published))?;

    if let Some(thumbnail) = &article.thumbnail {
        let mut enclosure = BytesStart::new("enclosure");
        enclosure.push_attribute(("url", thumbnail.url.as_str()));
        enclosure.push_attribute(("length", "0"));
        enclosure.push_attribute(("type", thumbnail.mime_type()));
        w.write_event(Event::Empty(enclosure)).map_err(xml_err)?;
    }

    w.write_event(Event::End(BytesEnd::new("item")))
        .map_err(xml_err)?;
    Ok(())
}

/// Render the feed document. Items appear in the order given.
pub fn render_feed(meta: &FeedMeta, articles: &[Article], built_at: DateTime<Utc>) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss)).map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .map_err(xml_err)?;

    write_text_element(&mut writer, "title", &meta.title)?;
    write_text_element(&mut writer, "link", &meta.link)?;
    write_text_element(&mut writer, "description", &meta.description)?;
    write_text_element(&mut writer, "language", &meta.language)?;
    write_text_element(&mut writer, "lastBuildDate", &format_rfc822(&built_at))?;
    write_text_element(&mut writer, "generator", GENERATOR)?;

    for article in articles {
        write_item(&mut writer, article)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .map_err(xml_err)?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    Ok(out)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Replace `path` with `document` via write-then-rename.
#[instrument(level = "info", skip_all, fields(path = %path.display(), bytes = document.len()))]
pub async fn write_feed(path: &Path, document: &[u8]) -> Result<()> {
    ensure_parent_dir(path).await?;
    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, document).await {
        warn!(tmp = %tmp.display(), error = %e, "Write failed; removing temporary file");
        discard_temp(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        warn!(tmp = %tmp.display(), error = %e, "Rename failed; removing temporary file");
        discard_temp(&tmp).await;
        return Err(e.into());
    }
    info!("Wrote feed file");
    Ok(())
}

/// Best-effort removal of a half-written temporary file.
async fn discard_temp(tmp: &Path) {
    if fs::metadata(tmp).await.is_ok_and(|meta| meta.is_file()) {
        let _ = fs::remove_file(tmp).await;
    }
}

/// Render and write the feed. An empty article list is refused so the
/// previous feed stays in place.
pub async fn emit(
    path: &Path,
    meta: &FeedMeta,
    articles: &[Article],
    built_at: DateTime<Utc>,
) -> Result<()> {
    if articles.is_empty() {
        return Err(Error::EmptyFeed);
    }
    let document = render_feed(meta, articles, built_at)?;
    write_feed(path, &document).await
}
