//! Document-part tree traversal.
//!
//! Two walks over a message's part tree: attachment discovery and body-text
//! resolution. Both are depth-first, order-preserving, and bounded by a
//! depth cap so a malformed tree cannot drive unbounded recursion.

use crate::domain::AttachmentRef;

use super::traits::MessagePart;

/// Maximum nesting depth traversed in a part tree.
pub const MAX_PART_DEPTH: usize = 32;

/// Collects every downloadable attachment in the tree, depth-first.
///
/// A part contributes itself iff it has a non-empty filename and a content
/// handle; container parts never qualify but their children are always
/// traversed, whether or not the parent qualified.
pub fn collect_attachments(root: &MessagePart) -> Vec<AttachmentRef> {
    let mut found = Vec::new();
    collect_into(root, 0, &mut found);
    found
}

fn collect_into(part: &MessagePart, depth: usize, found: &mut Vec<AttachmentRef>) {
    if depth > MAX_PART_DEPTH {
        tracing::warn!("part tree exceeds depth {}, truncating walk", MAX_PART_DEPTH);
        return;
    }

    if let Some(attachment) = as_attachment(part) {
        found.push(attachment);
    }

    for child in &part.parts {
        collect_into(child, depth + 1, found);
    }
}

fn as_attachment(part: &MessagePart) -> Option<AttachmentRef> {
    let filename = part.filename.as_deref().filter(|f| !f.is_empty())?;
    let body = part.body.as_ref()?;
    let attachment_id = body.attachment_id.clone()?;

    Some(AttachmentRef {
        filename: filename.to_string(),
        mime_type: part.mime_type.clone().unwrap_or_default(),
        size: body.size,
        attachment_id,
    })
}

/// Resolves the message's body text, best effort.
///
/// Prefers the part's own inline text, then a `text/plain` child, then a
/// `text/html` child, then recurses depth-first and returns the first
/// non-empty result. Returns `None` when the tree carries no body at all.
pub fn find_body_text(root: &MessagePart) -> Option<String> {
    find_body_at(root, 0)
}

fn find_body_at(part: &MessagePart, depth: usize) -> Option<String> {
    if depth > MAX_PART_DEPTH {
        return None;
    }

    if let Some(text) = inline_text(part) {
        return Some(text);
    }

    for child in &part.parts {
        if child.mime_type.as_deref() == Some("text/plain") {
            if let Some(text) = inline_text(child) {
                return Some(text);
            }
        }
    }

    for child in &part.parts {
        if child.mime_type.as_deref() == Some("text/html") {
            if let Some(text) = inline_text(child) {
                return Some(text);
            }
        }
    }

    for child in &part.parts {
        if let Some(text) = find_body_at(child, depth + 1) {
            return Some(text);
        }
    }

    None
}

fn inline_text(part: &MessagePart) -> Option<String> {
    part.body
        .as_ref()
        .and_then(|b| b.text.clone())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AttachmentId;
    use crate::providers::email::traits::PartBody;

    fn container(parts: Vec<MessagePart>) -> MessagePart {
        MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts,
            ..Default::default()
        }
    }

    fn file_part(filename: &str, mime_type: &str, attachment_id: &str) -> MessagePart {
        MessagePart {
            filename: Some(filename.to_string()),
            mime_type: Some(mime_type.to_string()),
            body: Some(PartBody {
                text: None,
                attachment_id: Some(AttachmentId::from(attachment_id)),
                size: 1024,
            }),
            parts: Vec::new(),
        }
    }

    fn text_part(mime_type: &str, text: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime_type.to_string()),
            body: Some(PartBody {
                text: Some(text.to_string()),
                attachment_id: None,
                size: text.len() as u64,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn finds_leaf_attachment_nested_in_containers() {
        // One qualifying leaf at depth 3 behind two non-qualifying wrappers.
        let tree = container(vec![container(vec![container(vec![file_part(
            "invoice.pdf",
            "application/pdf",
            "att-deep",
        )])])]);

        let found = collect_attachments(&tree);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "invoice.pdf");
        assert_eq!(found[0].attachment_id, AttachmentId::from("att-deep"));
    }

    #[test]
    fn preserves_message_order_across_levels() {
        let tree = container(vec![
            file_part("first.pdf", "application/pdf", "att-1"),
            container(vec![file_part("second.png", "image/png", "att-2")]),
            file_part("third.pdf", "application/pdf", "att-3"),
        ]);

        let found = collect_attachments(&tree);
        let names: Vec<&str> = found.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["first.pdf", "second.png", "third.pdf"]);
    }

    #[test]
    fn part_without_filename_does_not_qualify() {
        let mut anonymous = file_part("", "application/pdf", "att-1");
        anonymous.filename = Some(String::new());
        let tree = container(vec![anonymous]);

        assert!(collect_attachments(&tree).is_empty());
    }

    #[test]
    fn part_without_content_handle_does_not_qualify() {
        let mut detached = file_part("invoice.pdf", "application/pdf", "att-1");
        detached.body = Some(PartBody::default());
        let tree = container(vec![detached]);

        assert!(collect_attachments(&tree).is_empty());
    }

    #[test]
    fn depth_cap_bounds_malformed_trees() {
        let mut tree = file_part("deep.pdf", "application/pdf", "att-deep");
        for _ in 0..(MAX_PART_DEPTH + 10) {
            tree = container(vec![tree]);
        }

        // The leaf sits past the cap; the walk terminates without reaching it.
        assert!(collect_attachments(&tree).is_empty());
    }

    #[test]
    fn body_prefers_plain_text_over_html() {
        let tree = container(vec![
            text_part("text/html", "<p>hello</p>"),
            text_part("text/plain", "hello"),
        ]);

        assert_eq!(find_body_text(&tree), Some("hello".to_string()));
    }

    #[test]
    fn body_falls_back_to_html() {
        let tree = container(vec![text_part("text/html", "<p>hello</p>")]);
        assert_eq!(find_body_text(&tree), Some("<p>hello</p>".to_string()));
    }

    #[test]
    fn body_recurses_into_nested_alternatives() {
        let tree = container(vec![container(vec![text_part("text/plain", "nested")])]);
        assert_eq!(find_body_text(&tree), Some("nested".to_string()));
    }

    #[test]
    fn body_direct_data_wins() {
        let mut tree = container(vec![text_part("text/plain", "child")]);
        tree.body = Some(PartBody {
            text: Some("direct".to_string()),
            attachment_id: None,
            size: 6,
        });

        assert_eq!(find_body_text(&tree), Some("direct".to_string()));
    }

    #[test]
    fn body_missing_returns_none() {
        let tree = container(vec![file_part("invoice.pdf", "application/pdf", "att-1")]);
        assert_eq!(find_body_text(&tree), None);
    }
}
