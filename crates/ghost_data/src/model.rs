//! Typed records for Ghost content and the composite data handed to the templates.
//!
//! The same structs are decoded from Content API responses and serialized into the
//! output document; fields computed during a build (`path`, resolved dimensions,
//! reading time, backlinks) default to empty on input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Internal,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_dimensions: Option<ImageDimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_dimensions: Option<ImageDimensions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub feature_image: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_image_dimensions: Option<ImageDimensions>,
}

impl Tag {
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// Link from a syndicated copy back to the post it was translated or copied from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalPost {
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
    pub primary_author: Option<Author>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub uuid: Option<String>,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub custom_excerpt: Option<String>,
    #[serde(default)]
    pub feature_image: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub primary_author: Option<Author>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub primary_tag: Option<Tag>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub og_image: Option<String>,
    #[serde(default)]
    pub twitter_image: Option<String>,
    #[serde(default)]
    pub codeinjection_head: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub reading_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_image_dimensions: Option<ImageDimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_post: Option<OriginalPost>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub uuid: Option<String>,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub custom_excerpt: Option<String>,
    #[serde(default)]
    pub feature_image: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub primary_author: Option<Author>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub reading_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_image_dimensions: Option<ImageDimensions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationItem {
    pub label: String,
    pub url: String,
}

/// Global site settings. Keys this crate does not model are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub navigation: Vec<NavigationItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCount {
    pub posts: usize,
}

/// An entity together with how many public posts reference it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counted<E> {
    #[serde(flatten)]
    pub entity: E,
    pub count: PostCount,
}

/// One listing page of an author or tag: the entity, its zero-based page index,
/// the posts on that page and the entity's total post count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<E> {
    #[serde(flatten)]
    pub entity: E,
    pub page: usize,
    pub posts: Vec<Post>,
    pub count: PostCount,
}

pub type AuthorPage = Listing<Author>;
pub type TagPage = Listing<Tag>;

/// Everything the templating layer renders from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteData {
    pub settings: Option<SiteSettings>,
    pub posts: Vec<Post>,
    pub pages: Vec<Page>,
    pub authors: Vec<AuthorPage>,
    pub tags: Vec<TagPage>,
    #[serde(rename = "popularTags")]
    pub popular_tags: Vec<Counted<Tag>>,
    pub feed: Vec<Post>,
}
