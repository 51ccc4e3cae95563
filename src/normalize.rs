use crate::text::extract_text;
use crate::types::{Message, RawPost};
use chrono::DateTime;
use tracing::{info, warn};

/// Source timestamp format, e.g. `Thu Apr 21 10:30:15 +0800 2022`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

const REPOST_AUTHOR_FALLBACK: &str = "[original author unknown]";
const REPOST_CONTENT_FALLBACK: &str = "[original content unavailable]";
const EMPTY_CONTENT_PLACEHOLDER: &str = "[empty content]";

/// Why a single post was dropped from a batch. Skips are logged and
/// never abort the remaining posts.
#[derive(Debug, thiserror::Error)]
pub enum Skip {
    #[error("post has no id")]
    MissingId,

    #[error("post {bid} has unparseable timestamp {raw:?}")]
    BadTimestamp { bid: String, raw: String },
}

/// Convert one raw post into a normalized [`Message`].
pub fn to_message(post: &RawPost, feed_id: u64) -> Result<Message, Skip> {
    // Expansion stubs and malformed payloads have no id and are
    // dropped here.
    if post.bid.trim().is_empty() {
        return Err(Skip::MissingId);
    }

    let markup = if post.text.trim().is_empty() {
        &post.raw_text
    } else {
        &post.text
    };
    let mut content = extract_text(markup);

    // Position flag 3 marks a repost; annotate with the original
    // author and text so the notification is self-contained.
    if post.weibo_position == 3 {
        let retweet = post.retweeted_status.as_deref();
        let original_author = retweet
            .and_then(|r| r.user.as_ref())
            .map(|u| u.screen_name.as_str())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(REPOST_AUTHOR_FALLBACK);
        let original_content = retweet
            .map(|r| r.raw_text.as_str())
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(REPOST_CONTENT_FALLBACK);

        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(&format!("@{}: {}", original_author, original_content));
    }

    if content.trim().is_empty() {
        content = EMPTY_CONTENT_PLACEHOLDER.to_string();
    }

    let update_at = DateTime::parse_from_str(&post.created_at, CREATED_AT_FORMAT)
        .map_err(|_| Skip::BadTimestamp {
            bid: post.bid.clone(),
            raw: post.created_at.clone(),
        })?
        .timestamp();

    let images: Vec<String> = post
        .pics
        .iter()
        .filter_map(|pic| pic.large.as_ref().map(|large| large.url.clone()))
        .filter(|url| !url.trim().is_empty())
        .collect();

    let author = post
        .user
        .as_ref()
        .map(|user| user.screen_name.clone())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "?".to_string());

    Ok(Message {
        author,
        content,
        link: format!("https://weibo.com/{}/{}", feed_id, post.bid),
        update_at,
        images,
    })
}

/// Normalize a batch of posts, logging and dropping the ones that
/// fail. A single bad post never aborts the batch.
pub fn normalize_batch(posts: Vec<RawPost>, feed_id: u64) -> Vec<Message> {
    let total = posts.len();
    let mut messages = Vec::with_capacity(total);

    for post in &posts {
        match to_message(post, feed_id) {
            Ok(message) => messages.push(message),
            Err(skip) => {
                warn!("Skipping post in feed {}: {}", feed_id, skip);
            }
        }
    }

    if messages.len() < total {
        info!(
            "Normalized {}/{} posts for feed {}",
            messages.len(),
            total,
            feed_id
        );
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PicEntry, PicVersion, PostUser};

    fn base_post() -> RawPost {
        RawPost {
            bid: "Kx1abCdEf".to_string(),
            text: "hello <br />world".to_string(),
            created_at: "Thu Apr 21 10:30:15 +0800 2022".to_string(),
            user: Some(PostUser {
                screen_name: "singer".to_string(),
            }),
            ..RawPost::default()
        }
    }

    fn pic(url: &str) -> PicEntry {
        PicEntry {
            large: Some(PicVersion {
                url: url.to_string(),
            }),
        }
    }

    #[test]
    fn converts_a_plain_post() {
        let message = to_message(&base_post(), 123).unwrap();
        assert_eq!(message.author, "singer");
        assert_eq!(message.content, "hello \nworld");
        assert_eq!(message.link, "https://weibo.com/123/Kx1abCdEf");
        assert_eq!(message.update_at, 1650508215);
        assert!(message.images.is_empty());
    }

    #[test]
    fn stub_post_is_skipped_for_missing_id() {
        let err = to_message(&RawPost::stub(), 123).unwrap_err();
        assert!(matches!(err, Skip::MissingId));
    }

    #[test]
    fn unparseable_timestamp_is_skipped() {
        let mut post = base_post();
        post.created_at = "yesterday".to_string();
        let err = to_message(&post, 123).unwrap_err();
        assert!(matches!(err, Skip::BadTimestamp { .. }));
    }

    #[test]
    fn falls_back_to_raw_text_when_primary_is_blank() {
        let mut post = base_post();
        post.text = "  ".to_string();
        post.raw_text = "fallback body".to_string();
        let message = to_message(&post, 123).unwrap();
        assert_eq!(message.content, "fallback body");
    }

    #[test]
    fn blank_content_becomes_placeholder() {
        let mut post = base_post();
        post.text = String::new();
        post.raw_text = String::new();
        let message = to_message(&post, 123).unwrap();
        assert_eq!(message.content, "[empty content]");
    }

    #[test]
    fn repost_with_missing_fields_uses_fallback_literals() {
        let mut post = base_post();
        post.weibo_position = 3;
        post.retweeted_status = None;
        let message = to_message(&post, 123).unwrap();
        assert!(message
            .content
            .ends_with("@[original author unknown]: [original content unavailable]"));
    }

    #[test]
    fn repost_appends_original_author_and_text() {
        let mut post = base_post();
        post.weibo_position = 3;
        post.retweeted_status = Some(Box::new(RawPost {
            raw_text: "the original".to_string(),
            user: Some(PostUser {
                screen_name: "origin".to_string(),
            }),
            ..RawPost::default()
        }));
        let message = to_message(&post, 123).unwrap();
        assert!(message.content.ends_with("@origin: the original"));
    }

    #[test]
    fn images_preserve_order_and_drop_blanks() {
        let mut post = base_post();
        post.pics = vec![
            pic("https://img.example/a.jpg"),
            pic("   "),
            PicEntry { large: None },
            pic("https://img.example/b.jpg"),
        ];
        let message = to_message(&post, 123).unwrap();
        assert_eq!(
            message.images,
            vec!["https://img.example/a.jpg", "https://img.example/b.jpg"]
        );
    }

    #[test]
    fn missing_user_falls_back_to_question_mark() {
        let mut post = base_post();
        post.user = None;
        let message = to_message(&post, 123).unwrap();
        assert_eq!(message.author, "?");
    }

    #[test]
    fn batch_drops_bad_posts_and_keeps_the_rest() {
        let mut bad = base_post();
        bad.bid = String::new();
        let messages = normalize_batch(vec![base_post(), bad, base_post()], 123);
        assert_eq!(messages.len(), 2);
    }
}
