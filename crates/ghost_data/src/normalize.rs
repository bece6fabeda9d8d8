use crate::model::{Author, Page, Post, Tag};

/// Rewrites absolute CMS URLs into site-relative paths.
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    origin: String,
}

impl UrlNormalizer {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }

    /// Strip the origin when it prefixes `url`; anything else comes back unchanged.
    ///
    /// The origin only matches on a host boundary, so `https://cms.example.com.evil/`
    /// is left alone when the origin is `https://cms.example.com`.
    pub fn normalize(&self, url: &str) -> String {
        if self.origin.is_empty() {
            return url.to_string();
        }
        match url.strip_prefix(self.origin.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with(['/', '?', '#']) => rest.to_string(),
            _ => url.to_string(),
        }
    }

    pub fn apply_to_author(&self, author: &mut Author) {
        author.path = self.normalize(&author.url);
    }

    pub fn apply_to_tag(&self, tag: &mut Tag) {
        tag.path = self.normalize(&tag.url);
    }

    /// Fill `path` on the post and on every author and tag it embeds.
    pub fn apply_to_post(&self, post: &mut Post) {
        post.path = self.normalize(&post.url);
        if let Some(author) = post.primary_author.as_mut() {
            self.apply_to_author(author);
        }
        for author in &mut post.authors {
            self.apply_to_author(author);
        }
        for tag in &mut post.tags {
            self.apply_to_tag(tag);
        }
        if let Some(tag) = post.primary_tag.as_mut() {
            self.apply_to_tag(tag);
        }
    }

    pub fn apply_to_page(&self, page: &mut Page) {
        page.path = self.normalize(&page.url);
        if let Some(author) = page.primary_author.as_mut() {
            self.apply_to_author(author);
        }
        for author in &mut page.authors {
            self.apply_to_author(author);
        }
    }
}
