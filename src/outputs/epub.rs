//! EPUB 3 container output.
//!
//! Container layout:
//!
//! ```text
//! mimetype                  (stored first, uncompressed)
//! META-INF/container.xml
//! OEBPS/content.opf         (package document, written with quick-xml)
//! OEBPS/nav.xhtml           (EPUB 3 navigation document)
//! OEBPS/divider-N.xhtml     (one per category boundary)
//! OEBPS/chapter-NNN.xhtml   (one per article)
//! OEBPS/images/*            (downloaded images; readers cannot fetch remote ones)
//! ```
//!
//! Metadata is fixed/templated; `dcterms:modified` is derived from the run
//! date rather than the wall clock so assembling the same batch twice yields
//! byte-identical output.

use crate::models::{ExtractedArticle, FetchedImage};
use crate::utils::{escape_text, upcase};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::error::Error;
use std::io::{Cursor, Write};
use tracing::{info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// One spine entry: file name under `OEBPS/` plus its display title.
struct Chapter {
    file_name: String,
    title: String,
    xhtml: String,
}

/// Build the EPUB byte buffer for a prepared batch.
///
/// # Arguments
///
/// * `articles` - Prepared (deduped, ordered) batch; bodies already reference
///   `images/...` paths
/// * `images` - Downloaded images to bundle into the container
/// * `date` - Run date label, `YYYY-MM-DD`
#[instrument(level = "info", skip(articles, images), fields(articles = articles.len(), images = images.len()))]
pub fn build_epub(
    articles: &[ExtractedArticle],
    images: &[FetchedImage],
    date: &str,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let chapters = plan_chapters(articles);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // The mimetype entry must be first and uncompressed per OCF.
    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    zip.start_file("OEBPS/content.opf", deflated)?;
    zip.write_all(&package_document(&chapters, images, date)?)?;

    zip.start_file("OEBPS/nav.xhtml", deflated)?;
    zip.write_all(nav_document(&chapters, date).as_bytes())?;

    for chapter in &chapters {
        zip.start_file(format!("OEBPS/{}", chapter.file_name), deflated)?;
        zip.write_all(chapter.xhtml.as_bytes())?;
    }

    for image in images {
        zip.start_file(format!("OEBPS/{}", image.local_name), deflated)?;
        zip.write_all(&image.bytes)?;
    }

    let cursor = zip.finish()?;
    let bytes = cursor.into_inner();
    info!(bytes = bytes.len(), chapters = chapters.len(), "Built EPUB container");
    Ok(bytes)
}

/// Interleave divider chapters at category boundaries with article chapters.
fn plan_chapters(articles: &[ExtractedArticle]) -> Vec<Chapter> {
    let mut chapters = Vec::new();
    let mut current_category: Option<&str> = None;
    let mut divider_count = 0;

    for (i, article) in articles.iter().enumerate() {
        if current_category != Some(article.category.as_str()) {
            divider_count += 1;
            let heading = upcase(&article.category);
            chapters.push(Chapter {
                file_name: format!("divider-{}.xhtml", divider_count),
                title: heading.clone(),
                xhtml: chapter_xhtml(&heading, &format!("<h1>{}</h1>", escape_text(&heading))),
            });
            current_category = Some(article.category.as_str());
        }
        let body = format!(
            "<h2>{}</h2>\n<p><a href=\"{}\">{}</a></p>\n{}",
            escape_text(&article.title),
            crate::utils::escape_attr(&article.source_url),
            escape_text(&article.source_url),
            article.body
        );
        chapters.push(Chapter {
            file_name: format!("chapter-{:03}.xhtml", i + 1),
            title: article.title.clone(),
            xhtml: chapter_xhtml(&article.title, &body),
        });
    }
    chapters
}

fn chapter_xhtml(title: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head><title>{}</title></head>\n\
         <body>\n{}\n</body>\n</html>\n",
        escape_text(title),
        body
    )
}

fn nav_document(chapters: &[Chapter], date: &str) -> String {
    let mut entries = String::new();
    for chapter in chapters {
        entries.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            chapter.file_name,
            escape_text(&chapter.title)
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\n\
         <head><title>Web Digest {date}</title></head>\n<body>\n\
         <nav epub:type=\"toc\">\n    <h1>Contents</h1>\n    <ol>\n{entries}    </ol>\n</nav>\n\
         </body>\n</html>\n"
    )
}

/// Write the OPF package document: metadata, manifest, and spine.
fn package_document(
    chapters: &[Chapter],
    images: &[FetchedImage],
    date: &str,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut package = BytesStart::new("package");
    package.push_attribute(("xmlns", "http://www.idpf.org/2007/opf"));
    package.push_attribute(("version", "3.0"));
    package.push_attribute(("unique-identifier", "pub-id"));
    writer.write_event(Event::Start(package))?;

    let mut metadata = BytesStart::new("metadata");
    metadata.push_attribute(("xmlns:dc", "http://purl.org/dc/elements/1.1/"));
    writer.write_event(Event::Start(metadata))?;

    let mut identifier = BytesStart::new("dc:identifier");
    identifier.push_attribute(("id", "pub-id"));
    writer.write_event(Event::Start(identifier))?;
    writer.write_event(Event::Text(BytesText::new(&format!(
        "urn:kindle-digest:{}",
        date
    ))))?;
    writer.write_event(Event::End(BytesEnd::new("dc:identifier")))?;

    write_text_element(&mut writer, "dc:title", &format!("Web Digest {}", date))?;
    write_text_element(&mut writer, "dc:language", "en")?;
    write_text_element(&mut writer, "dc:creator", "kindle_digest")?;

    let mut modified = BytesStart::new("meta");
    modified.push_attribute(("property", "dcterms:modified"));
    writer.write_event(Event::Start(modified))?;
    writer.write_event(Event::Text(BytesText::new(&format!("{}T00:00:00Z", date))))?;
    writer.write_event(Event::End(BytesEnd::new("meta")))?;

    writer.write_event(Event::End(BytesEnd::new("metadata")))?;

    writer.write_event(Event::Start(BytesStart::new("manifest")))?;
    let mut nav_item = BytesStart::new("item");
    nav_item.push_attribute(("id", "nav"));
    nav_item.push_attribute(("href", "nav.xhtml"));
    nav_item.push_attribute(("media-type", "application/xhtml+xml"));
    nav_item.push_attribute(("properties", "nav"));
    writer.write_event(Event::Empty(nav_item))?;

    for (i, chapter) in chapters.iter().enumerate() {
        let mut item = BytesStart::new("item");
        let id = format!("c{}", i + 1);
        item.push_attribute(("id", id.as_str()));
        item.push_attribute(("href", chapter.file_name.as_str()));
        item.push_attribute(("media-type", "application/xhtml+xml"));
        writer.write_event(Event::Empty(item))?;
    }
    for (i, image) in images.iter().enumerate() {
        let mut item = BytesStart::new("item");
        let id = format!("i{}", i + 1);
        item.push_attribute(("id", id.as_str()));
        item.push_attribute(("href", image.local_name.as_str()));
        item.push_attribute(("media-type", image.media_type.as_str()));
        writer.write_event(Event::Empty(item))?;
    }
    writer.write_event(Event::End(BytesEnd::new("manifest")))?;

    writer.write_event(Event::Start(BytesStart::new("spine")))?;
    for i in 0..chapters.len() {
        let mut itemref = BytesStart::new("itemref");
        let idref = format!("c{}", i + 1);
        itemref.push_attribute(("idref", idref.as_str()));
        writer.write_event(Event::Empty(itemref))?;
    }
    writer.write_event(Event::End(BytesEnd::new("spine")))?;

    writer.write_event(Event::End(BytesEnd::new("package")))?;
    Ok(writer.into_inner())
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), Box<dyn Error>> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn article(title: &str, category: &str) -> ExtractedArticle {
        ExtractedArticle {
            title: title.to_string(),
            body: format!("<p>Body of {}</p>", title),
            source_url: format!("https://example.com/{}/x", category),
            category: category.to_string(),
            date: None,
            images: Vec::new(),
        }
    }

    fn image() -> FetchedImage {
        FetchedImage {
            original_url: "https://cdn.example.com/a.png".to_string(),
            local_name: "images/img-0001.png".to_string(),
            media_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        }
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_mimetype_is_first_and_stored() {
        let bytes = build_epub(&[article("A", "news")], &[], "2026-08-29").unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn test_container_layout() {
        let bytes =
            build_epub(&[article("A", "news"), article("B", "news")], &[image()], "2026-08-29")
                .unwrap();
        let names = entry_names(&bytes);
        assert!(names.contains(&"META-INF/container.xml".to_string()));
        assert!(names.contains(&"OEBPS/content.opf".to_string()));
        assert!(names.contains(&"OEBPS/nav.xhtml".to_string()));
        assert!(names.contains(&"OEBPS/divider-1.xhtml".to_string()));
        assert!(names.contains(&"OEBPS/chapter-001.xhtml".to_string()));
        assert!(names.contains(&"OEBPS/chapter-002.xhtml".to_string()));
        assert!(names.contains(&"OEBPS/images/img-0001.png".to_string()));
    }

    #[test]
    fn test_divider_per_category_boundary() {
        let bytes = build_epub(
            &[
                article("A", "news"),
                article("B", "news"),
                article("C", "engineering"),
            ],
            &[],
            "2026-08-29",
        )
        .unwrap();
        let names = entry_names(&bytes);
        assert!(names.contains(&"OEBPS/divider-1.xhtml".to_string()));
        assert!(names.contains(&"OEBPS/divider-2.xhtml".to_string()));
        assert!(!names.contains(&"OEBPS/divider-3.xhtml".to_string()));
    }

    #[test]
    fn test_opf_lists_chapters_and_images() {
        let bytes = build_epub(&[article("A", "news")], &[image()], "2026-08-29").unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut opf = String::new();
        archive
            .by_name("OEBPS/content.opf")
            .unwrap()
            .read_to_string(&mut opf)
            .unwrap();
        assert!(opf.contains("chapter-001.xhtml"));
        assert!(opf.contains("images/img-0001.png"));
        assert!(opf.contains("image/png"));
        assert!(opf.contains("dcterms:modified"));
        assert!(opf.contains("Web Digest 2026-08-29"));
    }

    #[test]
    fn test_idempotent_bytes() {
        let articles = vec![article("A", "news"), article("B", "engineering")];
        let first = build_epub(&articles, &[], "2026-08-29").unwrap();
        let second = build_epub(&articles, &[], "2026-08-29").unwrap();
        assert_eq!(first, second);
    }
}
