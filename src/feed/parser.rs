//! Feed parsing.
//!
//! NHK regional feeds are not RSS: the document is a flat list of `<record>`
//! elements with `title`/`link`/`description`/`pubDate` children. Those are
//! read with quick-xml. A document with no `<record>` elements is retried as
//! standard RSS/Atom through feed-rs, so ordinary feeds work too.
//!
//! This is the parse boundary: entries missing a title or link are dropped
//! here and never reach the classifier.

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Result;
use crate::models::IncomingArticle;

/// Parses one fetched feed document into article records.
pub fn parse_articles(content: &str) -> Result<Vec<IncomingArticle>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    match parse_records(content) {
        Ok(articles) if !articles.is_empty() => {
            tracing::debug!(count = articles.len(), "parsed NHK record feed");
            Ok(articles)
        }
        _ => {
            let articles = parse_standard_feed(content)?;
            tracing::debug!(count = articles.len(), "parsed standard feed");
            Ok(articles)
        }
    }
}

#[derive(Default)]
struct RecordBuilder {
    title: String,
    link: String,
    description: String,
    pub_date: String,
}

impl RecordBuilder {
    fn field_mut(&mut self, name: &str) -> &mut String {
        match name {
            "title" => &mut self.title,
            "link" => &mut self.link,
            "description" => &mut self.description,
            _ => &mut self.pub_date,
        }
    }

    /// Records without both identity fields are filtered out here.
    fn finish(self) -> Option<IncomingArticle> {
        let title = self.title.trim().to_string();
        let link = self.link.trim().to_string();
        if title.is_empty() || link.is_empty() {
            return None;
        }
        Some(IncomingArticle {
            title,
            link,
            description: self.description.trim().to_string(),
            pub_date: self.pub_date.trim().to_string(),
        })
    }
}

fn parse_records(content: &str) -> Result<Vec<IncomingArticle>> {
    let mut reader = Reader::from_str(content);

    let mut articles = Vec::new();
    let mut record: Option<RecordBuilder> = None;
    let mut field: Option<&'static str> = None;

    // Text inside an element arrives fragmented: character and entity
    // references come as separate GeneralRef events, CDATA as CData events.
    // Fragments accumulate into the builder field and get trimmed at finish.
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"record" => record = Some(RecordBuilder::default()),
                b"title" if record.is_some() => field = Some("title"),
                b"link" if record.is_some() => field = Some("link"),
                b"description" if record.is_some() => field = Some("description"),
                b"pubDate" if record.is_some() => field = Some("pubDate"),
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(builder), Some(name)) = (record.as_mut(), field) {
                    let text = t.decode().map_err(quick_xml::Error::from)?;
                    builder.field_mut(name).push_str(&text);
                }
            }
            Event::CData(t) => {
                if let (Some(builder), Some(name)) = (record.as_mut(), field) {
                    let text = t.decode().map_err(quick_xml::Error::from)?;
                    builder.field_mut(name).push_str(&text);
                }
            }
            Event::GeneralRef(r) => {
                if let (Some(builder), Some(name)) = (record.as_mut(), field) {
                    let target = builder.field_mut(name);
                    if let Some(ch) = r.resolve_char_ref().map_err(quick_xml::Error::from)? {
                        target.push(ch);
                    } else {
                        let entity = r.decode().map_err(quick_xml::Error::from)?;
                        if let Some(resolved) = resolve_predefined_entity(&entity) {
                            target.push_str(resolved);
                        }
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"record" => {
                    if let Some(article) = record.take().and_then(RecordBuilder::finish) {
                        articles.push(article);
                    }
                }
                b"title" | b"link" | b"description" | b"pubDate" => field = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(articles)
}

fn parse_standard_feed(content: &str) -> Result<Vec<IncomingArticle>> {
    let feed = feed_rs::parser::parse(content.as_bytes())?;

    let articles = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let pub_date = entry
                .published
                .or(entry.updated)
                .map(|d| d.to_rfc3339())
                .unwrap_or_default();
            Some(IncomingArticle {
                title,
                link,
                description,
                pub_date,
            })
        })
        .collect();

    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NHK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<recordset>
  <record>
    <title>一つ目の記事</title>
    <link>20250101/1000001.html</link>
    <pubDate>2025-01-01T09:00:00+09:00</pubDate>
    <description>本文です。</description>
  </record>
  <record>
    <title>二つ目の記事</title>
    <link>20250101/1000002.html</link>
    <pubDate>2025-01-01T10:00:00+09:00</pubDate>
    <description></description>
  </record>
</recordset>"#;

    #[test]
    fn parses_nhk_record_feed() {
        let articles = parse_articles(NHK_XML).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "一つ目の記事");
        assert_eq!(articles[0].link, "20250101/1000001.html");
        assert_eq!(articles[0].description, "本文です。");
        assert_eq!(articles[1].description, "");
    }

    #[test]
    fn bom_is_tolerated() {
        let with_bom = format!("\u{feff}{NHK_XML}");
        let articles = parse_articles(&with_bom).unwrap();
        assert_eq!(articles.len(), 2);
    }

    #[test]
    fn records_missing_identity_fields_are_dropped() {
        let xml = r#"<recordset>
  <record>
    <title>リンクなし</title>
    <description>x</description>
  </record>
  <record>
    <link>20250101/1000003.html</link>
    <description>タイトルなし</description>
  </record>
  <record>
    <title>完全な記事</title>
    <link>20250101/1000004.html</link>
    <description>y</description>
  </record>
</recordset>"#;
        let articles = parse_articles(xml).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "完全な記事");
    }

    #[test]
    fn entities_are_unescaped() {
        let xml = r#"<recordset>
  <record>
    <title>A &amp; B</title>
    <link>1.html</link>
  </record>
</recordset>"#;
        let articles = parse_articles(xml).unwrap();
        assert_eq!(articles[0].title, "A & B");
    }

    #[test]
    fn cdata_description_is_preserved() {
        let xml = r#"<recordset>
  <record>
    <title>訂正記事</title>
    <link>2.html</link>
    <description><![CDATA[本文を誤って掲載しました。※失礼しました。]]></description>
  </record>
</recordset>"#;
        let articles = parse_articles(xml).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(
            articles[0].description,
            "本文を誤って掲載しました。※失礼しました。"
        );
    }

    #[test]
    fn cdata_title_record_is_kept() {
        let xml = r#"<recordset>
  <record>
    <title><![CDATA[速報 & 続報]]></title>
    <link>3.html</link>
  </record>
</recordset>"#;
        let articles = parse_articles(xml).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "速報 & 続報");
    }

    #[test]
    fn numeric_character_references_are_resolved() {
        let xml = r#"<recordset>
  <record>
    <title>A &#38; B</title>
    <link>4.html</link>
  </record>
</recordset>"#;
        let articles = parse_articles(xml).unwrap();
        assert_eq!(articles[0].title, "A & B");
    }

    #[test]
    fn standard_rss_falls_back_to_feed_rs() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>テストフィード</title>
    <link>https://example.com/</link>
    <description>desc</description>
    <item>
      <title>RSS記事</title>
      <link>https://example.com/1</link>
      <description>RSS本文</description>
    </item>
  </channel>
</rss>"#;
        let articles = parse_articles(rss).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "RSS記事");
        assert_eq!(articles[0].link, "https://example.com/1");
        assert_eq!(articles[0].description, "RSS本文");
    }

    #[test]
    fn garbage_input_is_an_error() {
        assert!(parse_articles("not xml at all").is_err());
    }
}
