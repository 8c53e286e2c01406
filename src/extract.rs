//! Turns remote HTML into typed page records.
//!
//! Only what the relay needs is read: login/permission markers, the thread
//! header, message containers, listing rows and the bookmark sidebar. Markup
//! that does not match yields empty or default fields rather than errors,
//! except where the page cannot be interpreted at all.

use scraper::{ElementRef, Html, Selector};

use crate::{
    error::Error,
    models::{
        bookmark::Bookmark,
        listing::{ListingPage, ThreadListing},
        thread::{Message, MessageBatch, ThreadMeta, ThreadPage, ANONYMOUS_ID, ANONYMOUS_NAME},
    },
    result::Result,
    site::Site,
};

const ACCESS_DENIED: &str = "You are not authorized to view messages on this board.";
const ARCHIVED: &str = "This topic has been archived. No additional messages may be posted.";
const CLOSED: &str = "This topic has been closed. No additional messages may be posted.";

/// Separator between a message and its signature, as serialized by the parser.
const SIG_SPLIT: &str = "<br>\n---<br>";

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css)
        .map_err(|e| log::error!("bad selector {css}: {e:?}"))
        .ok()
}

fn find_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    selector(css)
        .map(|s| root.select(&s).collect())
        .unwrap_or_default()
}

fn find<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    selector(css).and_then(|s| root.select(&s).next())
}

fn text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

fn find_text(root: ElementRef<'_>, css: &str) -> String {
    find_all(root, css).into_iter().map(text).collect()
}

fn is_login_page(site: &Site, root: ElementRef<'_>) -> bool {
    find_text(root, "title").trim() == site.login_title()
}

/// Plain text content of an html fragment.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(&html.replace("<br>", "\n").replace("<br/>", "\n"));
    text(fragment.root_element()).trim().to_string()
}

/// Parses one `showmessages` page.
///
/// With `strip_mod_notes`, moderator notes are blanked from message bodies
/// (archive pages expose them to everyone).
///
/// # Errors
///
/// [`Error::SessionExpired`] on the login page, [`Error::AccessDenied`] when the
/// board is off limits, [`Error::ServerDown`] when the page is empty or has no
/// page count.
pub fn thread_page(site: &Site, url: &str, html: &str, strip_mod_notes: bool) -> Result<ThreadPage> {
    if html.trim().is_empty() {
        return Err(Error::ServerDown(format!("empty response from {url}")));
    }
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    if is_login_page(site, root) {
        return Err(Error::SessionExpired);
    }
    if find_text(root, ".body > em").trim() == ACCESS_DENIED {
        return Err(Error::AccessDenied);
    }

    let mut meta = ThreadMeta {
        title: find(root, ".body > h1").map(text).unwrap_or_default(),
        tags: find_all(root, ".body > h2 > div > a")
            .into_iter()
            .map(text)
            .collect(),
        ..ThreadMeta::default()
    };
    match find_text(root, ".body > h2 > em").trim() {
        ARCHIVED => {
            meta.archived = true;
            meta.closed = true;
        }
        CLOSED => meta.closed = true,
        _ => {}
    }
    meta.pages = find(root, "#u0_2 > span:first-child")
        .and_then(|el| text(el).trim().parse().ok())
        .ok_or_else(|| Error::ServerDown(format!("no page count in {url}")))?;

    let messages = messages(root, strip_mod_notes);
    Ok(ThreadPage { meta, messages })
}

/// Parses the batch endpoint, which answers `}` followed by a JSON string of html.
///
/// # Errors
///
/// [`Error::ServerDown`] for a short or undecodable body, [`Error::Archived`] when the
/// live board redirects to the archive notice, [`Error::SessionExpired`] for anything
/// else that is not a batch.
pub fn batch(site: &Site, thread_id: &str, raw: &str) -> Result<MessageBatch> {
    if raw.len() < 3 {
        return Err(Error::ServerDown(String::from("bad response")));
    }
    let Some(payload) = raw.strip_prefix('}') else {
        let doc = Html::parse_document(raw);
        let root = doc.root_element();
        if !is_login_page(site, root) && find_text(root, "h2 > em").trim() == ARCHIVED {
            return Err(Error::Archived(thread_id.to_string()));
        }
        return Err(Error::SessionExpired);
    };

    let html: String = serde_json::from_str(payload)?;
    let doc = Html::parse_fragment(&html);
    if is_login_page(site, doc.root_element()) {
        return Err(Error::SessionExpired);
    }
    Ok(MessageBatch {
        messages: messages(doc.root_element(), false),
    })
}

fn messages(root: ElementRef<'_>, strip_mod_notes: bool) -> Vec<Message> {
    find_all(root, ".message-container")
        .into_iter()
        .map(|el| message(el, strip_mod_notes))
        .collect()
}

fn message(container: ElementRef<'_>, strip_mod_notes: bool) -> Message {
    let id = container
        .value()
        .id()
        .map(ToString::to_string)
        .or_else(|| {
            find(container, ".message")
                .and_then(|m| m.value().attr("msgid"))
                .map(ToString::to_string)
        })
        .unwrap_or_default();

    let header = find(container, ".message-top").map(text).unwrap_or_default();
    let (author, author_id) = author(container, &header);
    let date = header_field(&header, "Posted:").unwrap_or_default();

    let notes = find_all(container, ".secret");
    let mut html = find(container, ".message")
        .map(|e| e.inner_html())
        .unwrap_or_default();
    if strip_mod_notes {
        for note in &notes {
            let inner = note.inner_html();
            if !inner.is_empty() {
                html = html.replace(&inner, "");
            }
        }
    }

    let (body, signature) = split_signature(&html);
    let mut msg = Message::new(id, author, author_id, date.trim(), body);
    if let Some(sig) = signature {
        msg = msg.with_signature(sig);
    }
    let title = find(container, ".userpic center").map(|el| text(el).trim().to_string());
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        msg = msg.with_author_title(title);
    }
    if let Some(src) = find(container, ".userpic-holder img").and_then(|el| el.value().attr("src")) {
        msg = msg.with_avatar(src);
    }
    if !notes.is_empty() {
        msg = msg.with_mod_note();
    }
    msg
}

fn author(container: ElementRef<'_>, header: &str) -> (String, String) {
    let profile = find_all(container, ".message-top a")
        .into_iter()
        .find_map(|a| {
            let href = a.value().attr("href")?;
            let (_, id) = href.split_once("?user=")?;
            Some((text(a).trim().to_string(), id.to_string()))
        });
    if let Some(found) = profile {
        return found;
    }

    // anonymous topics show "From: Human #12" with no profile link
    match header_field(header, "From:") {
        Some(name) if !name.is_empty() => {
            let id = name
                .rsplit_once('#')
                .map(|(_, n)| n.trim())
                .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                .map_or_else(|| ANONYMOUS_ID.to_string(), |n| format!("-{n}"));
            (name, id)
        }
        _ => (ANONYMOUS_NAME.to_string(), ANONYMOUS_ID.to_string()),
    }
}

/// Value following `label` in a `|` separated header line.
fn header_field(header: &str, label: &str) -> Option<String> {
    let (_, rest) = header.split_once(label)?;
    let value = rest.split('|').next().unwrap_or_default();
    Some(value.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn split_signature(html: &str) -> (String, Option<String>) {
    match html.rsplit_once(SIG_SPLIT) {
        Some((body, sig)) => (body.to_string(), Some(sig.to_string())),
        None => (html.to_string(), None),
    }
}

/// Parses a topic listing page along with its bookmark sidebar.
///
/// # Errors
///
/// [`Error::SessionExpired`] on the login page.
pub fn listing(site: &Site, html: &str) -> Result<ListingPage> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();
    if is_login_page(site, root) {
        return Err(Error::SessionExpired);
    }

    Ok(ListingPage {
        threads: find_all(root, "tr").into_iter().filter_map(listing_row).collect(),
        bookmarks: bookmarks(root),
    })
}

fn listing_row(row: ElementRef<'_>) -> Option<ThreadListing> {
    let oh = find(row, ".oh")?;
    let link = find(oh, ".fl a")?;
    let id = link.value().attr("href")?.split_once("?topic=")?.1.to_string();
    let closed = link
        .parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|p| p.value().classes().any(|c| c == "closed"));
    let tags: Vec<String> = find_all(oh, ".fr a").into_iter().map(text).collect();
    let sticky = tags.iter().any(|t| t == "Pinned");

    let user = find(row, "td:nth-child(2) a");
    let (author, author_id) = match user.and_then(|u| {
        let (_, id) = u.value().attr("href")?.split_once("?user=")?;
        Some((text(u), id.to_string()))
    }) {
        Some(found) => found,
        None => (ANONYMOUS_NAME.to_string(), ANONYMOUS_ID.to_string()),
    };

    let counts = find(row, "td:nth-child(3)").map(text).unwrap_or_default();
    let post_count = counts
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or_default();
    let unread_posts = find(row, "td:nth-child(3) span a")
        .and_then(|a| text(a).trim_matches(|c| c == 'x' || c == '+').parse().ok())
        .unwrap_or_default();

    Some(ThreadListing {
        id,
        title: text(link),
        author,
        author_id,
        date: find(row, "td:nth-child(4)")
            .map(|el| text(el).trim().to_string())
            .unwrap_or_default(),
        post_count,
        unread_posts,
        tags,
        sticky,
        closed,
    })
}

fn bookmarks(root: ElementRef<'_>) -> Vec<Bookmark> {
    find_all(root, "#bookmarks span")
        .into_iter()
        .filter_map(|span| {
            let a = find(span, "a")?;
            let href = a.value().attr("href")?;
            if href == "#" {
                return None;
            }
            let name = text(a);
            if name == "[edit]" {
                return None;
            }
            let query = href.rsplit('/').next().unwrap_or(href);
            Some(Bookmark::new(name, query))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREAD: &str = r#"<html><head><title>End of the Internet - Hello</title></head><body>
<div class="body">
<h1>Hello world</h1>
<h2><div><a href="/topics/LUE">LUE</a><a href="/topics/Games">Games</a></div></h2>
<div id="u0_2"><span>3</span> pages</div>
<div class="message-container" id="m100">
<div class="message-top"><b>From:</b> <a href="//endoftheinter.net/profile.php?user=123">Some Body</a> | <b>Posted:</b> 1/2/2014 10:11:12 PM | <a href="/message.php?id=100">Message Detail</a></div>
<div class="message">first post<br/>
---<br/>my sig</div>
<div class="userpic"><center>Regular</center></div>
</div>
<div class="message-container" id="m101">
<div class="message-top"><b>From:</b> <a href="//endoftheinter.net/profile.php?user=9">Other</a> | <b>Posted:</b> 1/2/2014 10:12:00 PM</div>
<div class="message">second <span class="secret">mod only</span></div>
</div>
</div></body></html>"#;

    fn site() -> Site {
        Site::default()
    }

    #[test]
    fn thread_page_meta_and_messages() {
        let page = thread_page(&site(), "u", THREAD, false).unwrap();
        assert_eq!(page.meta.title, "Hello world");
        assert_eq!(page.meta.tags, vec!["LUE", "Games"]);
        assert_eq!(page.meta.pages, 3);
        assert!(!page.meta.closed && !page.meta.archived);

        assert_eq!(page.messages.len(), 2);
        let first = &page.messages[0];
        assert_eq!(first.id(), "m100");
        assert_eq!(first.author(), "Some Body");
        assert_eq!(first.author_id(), "123");
        assert_eq!(first.date(), "1/2/2014 10:11:12 PM");
        assert_eq!(first.body(), "first post");
        assert_eq!(first.signature(), Some("my sig"));
        assert_eq!(first.author_title(), Some("Regular"));
        assert!(!first.mod_note());

        let second = &page.messages[1];
        assert!(second.mod_note());
        assert!(second.body().contains("mod only"));
    }

    #[test]
    fn archive_pages_blank_mod_notes() {
        let page = thread_page(&site(), "u", THREAD, true).unwrap();
        let second = &page.messages[1];
        assert!(second.mod_note());
        assert!(!second.body().contains("mod only"));
    }

    #[test]
    fn archived_and_closed_banners() {
        let archived = THREAD.replace("<h2><div>", &format!("<h2><em>{ARCHIVED}</em><div>"));
        let page = thread_page(&site(), "u", &archived, false).unwrap();
        assert!(page.meta.archived && page.meta.closed);

        let closed = THREAD.replace("<h2><div>", &format!("<h2><em>{CLOSED}</em><div>"));
        let page = thread_page(&site(), "u", &closed, false).unwrap();
        assert!(page.meta.closed && !page.meta.archived);
    }

    #[test]
    fn markers() {
        let login = "<html><head><title>Das Ende des Internets</title></head><body></body></html>";
        assert!(matches!(thread_page(&site(), "u", login, false), Err(Error::SessionExpired)));

        let denied = format!("<html><body><div class=\"body\"><em>{ACCESS_DENIED}</em></div></body></html>");
        assert!(matches!(thread_page(&site(), "u", &denied, false), Err(Error::AccessDenied)));

        assert!(matches!(thread_page(&site(), "u", "  ", false), Err(Error::ServerDown(_))));
        assert!(matches!(
            thread_page(&site(), "u", "<html><body><div class=\"body\"></div></body></html>", false),
            Err(Error::ServerDown(_))
        ));
    }

    #[test]
    fn anonymous_header() {
        let anon = r#"<div class="message-container" id="m5"><div class="message-top"><b>From:</b> Human #12 | <b>Posted:</b> 3/4/2014 1:00:00 AM | <a href="/showmessages.php?topic=1&u=-12">Filter</a></div><div class="message">hi</div></div>"#;
        let raw = format!("}}{}", serde_json::to_string(anon).unwrap());
        let batch = batch(&site(), "1", &raw).unwrap();
        let msg = &batch.messages[0];
        assert_eq!(msg.author(), "Human #12");
        assert_eq!(msg.author_id(), "-12");
        assert_eq!(msg.date(), "3/4/2014 1:00:00 AM");
        assert!(msg.is_anonymous());
    }

    #[test]
    fn batch_failures() {
        assert!(matches!(batch(&site(), "1", "}"), Err(Error::ServerDown(_))));
        assert!(matches!(
            batch(&site(), "1", "<html><title>Das Ende des Internets</title></html>"),
            Err(Error::SessionExpired)
        ));
        let moved = format!("<html><body><h2><em>{ARCHIVED}</em></h2></body></html>");
        assert!(matches!(batch(&site(), "1", &moved), Err(Error::Archived(id)) if id == "1"));
        assert!(matches!(batch(&site(), "1", "}not json"), Err(Error::Json(_))));
    }

    #[test]
    fn listing_rows_and_bookmarks() {
        let html = r##"<html><head><title>Topics</title></head><body>
<div id="bookmarks"><span><a href="/topics/LUE">LUE</a></span><span><a href="/topics/LUE-Anonymous">Anon</a></span><span><a href="#">[edit]</a></span></div>
<table>
<tr><th>Topic</th></tr>
<tr><td><div class="oh"><div class="fl"><a href="//boards.endoftheinter.net/showmessages.php?topic=777">A topic</a></div><div class="fr"><a href="/topics/LUE">LUE</a><a href="/topics/Pinned">Pinned</a></div></div></td>
<td><a href="//endoftheinter.net/profile.php?user=55">poster</a></td>
<td>120 <span>(<a href="#">+5</a>)</span></td><td>1/2/2014 10:00</td></tr>
<tr><td><div class="oh"><div class="fl closed"><a href="//boards.endoftheinter.net/showmessages.php?topic=778">Closed one</a></div></div></td>
<td>Human</td><td>3</td><td>1/1/2014 09:00</td></tr>
</table></body></html>"##;
        let page = listing(&site(), html).unwrap();
        assert_eq!(page.threads.len(), 2);

        let first = &page.threads[0];
        assert_eq!(first.id, "777");
        assert_eq!(first.title, "A topic");
        assert_eq!(first.author_id, "55");
        assert_eq!(first.post_count, 120);
        assert_eq!(first.unread_posts, 5);
        assert!(first.sticky && !first.closed);

        let second = &page.threads[1];
        assert!(second.closed);
        assert_eq!(second.author, ANONYMOUS_NAME);
        assert_eq!(second.author_id, ANONYMOUS_ID);

        assert_eq!(
            page.bookmarks,
            vec![Bookmark::new("LUE", "LUE"), Bookmark::new("Anon", "LUE-Anonymous")]
        );
    }

    #[test]
    fn text_conversion() {
        assert_eq!(html_to_text("a<br>b <i>c</i>"), "a\nb c");
    }
}
