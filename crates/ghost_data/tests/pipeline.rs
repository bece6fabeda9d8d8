use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use ghost_data::api::{BrowsePage, BrowseQuery, ContentApi, Pagination, Resource};
use ghost_data::assemble::{Assembler, Assembly, AssemblyOptions};
use ghost_data::dimensions::ImageProbe;
use ghost_data::error::{ApiError, ProbeError};
use ghost_data::fetch::FetchStrategy;
use ghost_data::model::{ImageDimensions, Post, SiteSettings};

const ORIGIN: &str = "https://cms.example.com";

/// In-memory Content API serving fixed records, `per_page` at a time.
struct FixtureApi {
    posts: Vec<Value>,
    pages: Vec<Value>,
    per_page: usize,
    failing_post_pages: HashSet<u32>,
    originals: HashMap<String, Value>,
    queries: Mutex<Vec<(Resource, BrowseQuery)>>,
}

impl FixtureApi {
    fn new(posts: Vec<Value>, per_page: usize) -> Self {
        Self {
            posts,
            pages: Vec::new(),
            per_page,
            failing_post_pages: HashSet::new(),
            originals: HashMap::new(),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ContentApi for FixtureApi {
    async fn browse(
        &self,
        resource: Resource,
        query: &BrowseQuery,
        page: u32,
    ) -> Result<BrowsePage, ApiError> {
        self.queries
            .lock()
            .unwrap()
            .push((resource, query.clone()));

        if resource == Resource::Posts && self.failing_post_pages.contains(&page) {
            return Err(ApiError::Status {
                resource: resource.to_string(),
                status: 503,
            });
        }

        let all = match resource {
            Resource::Posts => &self.posts,
            Resource::Pages => &self.pages,
        };
        let pages = all.len().div_ceil(self.per_page).max(1) as u32;
        let start = (page as usize - 1) * self.per_page;
        let records = all.iter().skip(start).take(self.per_page).cloned().collect();

        Ok(BrowsePage {
            records,
            pagination: Pagination {
                page,
                pages,
                total: all.len() as u32,
                next: (page < pages).then_some(page + 1),
                prev: (page > 1).then(|| page - 1),
            },
        })
    }

    async fn read_post(&self, slug: &str) -> Result<Post, ApiError> {
        match self.originals.get(slug) {
            Some(value) => Ok(serde_json::from_value(value.clone()).unwrap()),
            None => Err(ApiError::Status {
                resource: "posts".to_string(),
                status: 404,
            }),
        }
    }

    async fn settings(&self) -> Result<SiteSettings, ApiError> {
        Ok(serde_json::from_value(json!({
            "title": "Example News",
            "lang": "en",
            "url": ORIGIN,
            "navigation": [{ "label": "Home", "url": "/" }]
        }))
        .unwrap())
    }
}

/// Probe that answers from a fixed table and counts every call per URL.
#[derive(Default)]
struct CountingProbe {
    sizes: HashMap<String, ImageDimensions>,
    calls: AtomicUsize,
    per_url: Mutex<HashMap<String, usize>>,
}

impl CountingProbe {
    fn with(sizes: &[(&str, u32, u32)]) -> Self {
        Self {
            sizes: sizes
                .iter()
                .map(|(url, width, height)| {
                    (
                        url.to_string(),
                        ImageDimensions {
                            width: *width,
                            height: *height,
                        },
                    )
                })
                .collect(),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn calls_for(&self, url: &str) -> usize {
        self.per_url.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ImageProbe for CountingProbe {
    async fn probe(&self, url: &str) -> Result<ImageDimensions, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_url
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;
        self.sizes.get(url).copied().ok_or(ProbeError::Status(404))
    }
}

fn author(slug: &str) -> Value {
    json!({
        "id": format!("author-{slug}"),
        "slug": slug,
        "name": slug.to_uppercase(),
        "profile_image": format!("{ORIGIN}/content/images/{slug}.png"),
        "url": format!("{ORIGIN}/author/{slug}/")
    })
}

fn tag(name: &str) -> Value {
    let slug = name.to_lowercase();
    json!({
        "id": format!("tag-{slug}"),
        "slug": slug,
        "name": name,
        "visibility": "public",
        "url": format!("{ORIGIN}/tag/{slug}/")
    })
}

fn post(slug: &str, author_slug: &str, tags: &[&str]) -> Value {
    let tags: Vec<Value> = tags.iter().map(|name| tag(name)).collect();
    json!({
        "id": format!("post-{slug}"),
        "slug": slug,
        "title": slug.replace('-', " "),
        "html": "<p>Some words to read.</p>",
        "published_at": "2021-05-01T12:00:00.000+00:00",
        "feature_image": format!("{ORIGIN}/content/images/shared.jpg"),
        "url": format!("{ORIGIN}/{slug}/"),
        "primary_author": author(author_slug),
        "authors": [author(author_slug)],
        "tags": tags.clone(),
        "primary_tag": tags.first().cloned()
    })
}

fn options(posts_per_page: usize, strategy: FetchStrategy) -> AssemblyOptions {
    AssemblyOptions {
        origin: ORIGIN.to_string(),
        site_url: Some("https://www.example.org".to_string()),
        posts_per_page: NonZeroUsize::new(posts_per_page).unwrap(),
        strategy,
        fetch_limit: Some(15),
        rss_feed_size: 2,
        original_post_identifier: "fccOriginalPost".to_string(),
    }
}

const SEQUENTIAL: FetchStrategy = FetchStrategy::Sequential {
    delay: Duration::ZERO,
};

fn fixture_posts() -> Vec<Value> {
    vec![
        post("first", "x", &["News"]),
        post("second", "x", &["News", "Opinion"]),
        post("third", "y", &["News"]),
    ]
}

fn sample_probe() -> CountingProbe {
    CountingProbe::with(&[
        ("https://cms.example.com/content/images/shared.jpg", 1200, 800),
        ("https://cms.example.com/content/images/x.png", 64, 64),
    ])
}

async fn assemble(api: &FixtureApi, probe: &CountingProbe, posts_per_page: usize) -> Assembly {
    Assembler::new(api, api, probe, options(posts_per_page, SEQUENTIAL))
        .assemble()
        .await
}

fn slugs(posts: &[Post]) -> Vec<&str> {
    posts.iter().map(|post| post.slug.as_str()).collect()
}

#[tokio::test]
async fn authors_and_tags_are_paginated_per_entity() {
    let api = FixtureApi::new(fixture_posts(), 15);
    let probe = sample_probe();
    let Assembly { data, report } = assemble(&api, &probe, 2).await;

    assert!(report.page_failures.is_empty());
    assert_eq!(slugs(&data.posts), ["first", "second", "third"]);

    let author_pages: Vec<(&str, usize, Vec<&str>, usize)> = data
        .authors
        .iter()
        .map(|listing| {
            (
                listing.entity.slug.as_str(),
                listing.page,
                slugs(&listing.posts),
                listing.count.posts,
            )
        })
        .collect();
    assert_eq!(
        author_pages,
        [
            ("x", 0, vec!["first", "second"], 2),
            ("y", 0, vec!["third"], 1),
        ]
    );

    let tag_pages: Vec<(&str, usize, Vec<&str>, usize)> = data
        .tags
        .iter()
        .map(|listing| {
            (
                listing.entity.slug.as_str(),
                listing.page,
                slugs(&listing.posts),
                listing.count.posts,
            )
        })
        .collect();
    assert_eq!(
        tag_pages,
        [
            ("news", 0, vec!["first", "second"], 3),
            ("news", 1, vec!["third"], 3),
            ("opinion", 0, vec!["second"], 1),
        ]
    );

    let popular: Vec<(&str, usize)> = data
        .popular_tags
        .iter()
        .map(|entry| (entry.entity.name.as_str(), entry.count.posts))
        .collect();
    assert_eq!(popular, [("News", 3), ("Opinion", 1)]);
}

#[tokio::test]
async fn featured_posts_lead_posts_listings_and_feed() {
    let mut featured = post("featured-one", "y", &["News"]);
    featured["featured"] = json!(true);
    let api = FixtureApi::new(
        vec![post("a", "x", &["News"]), post("b", "x", &["News"]), featured],
        15,
    );
    let probe = sample_probe();
    let Assembly { data, .. } = assemble(&api, &probe, 2).await;

    assert_eq!(slugs(&data.posts), ["featured-one", "a", "b"]);
    assert_eq!(slugs(&data.feed), ["featured-one", "a"]);
    assert_eq!(slugs(&data.tags[0].posts), ["featured-one", "a"]);
    assert_eq!(slugs(&data.tags[1].posts), ["b"]);
    assert_eq!(data.authors[0].entity.slug, "y");
    assert_eq!(slugs(&data.authors[1].posts), ["a", "b"]);
}

#[tokio::test]
async fn urls_are_normalized_and_dates_parsed() {
    let api = FixtureApi::new(fixture_posts(), 15);
    let probe = sample_probe();
    let Assembly { data, .. } = assemble(&api, &probe, 2).await;

    let post = &data.posts[1];
    assert_eq!(post.path, "/second/");
    assert_eq!(post.primary_author.as_ref().unwrap().path, "/author/x/");
    assert_eq!(post.tags[1].path, "/tag/opinion/");
    assert_eq!(post.primary_tag.as_ref().unwrap().path, "/tag/news/");
    assert_eq!(
        post.published_at.unwrap().to_rfc3339(),
        "2021-05-01T12:00:00+00:00"
    );
    assert_eq!(post.reading_time, 1);

    assert_eq!(data.authors[0].entity.path, "/author/x/");
    assert_eq!(data.tags[0].entity.path, "/tag/news/");
    assert_eq!(slugs(&data.feed), ["first", "second"]);

    let settings = data.settings.expect("settings fetched");
    assert_eq!(settings.url.as_deref(), Some("https://www.example.org"));
}

#[tokio::test]
async fn each_image_is_probed_once_per_build() {
    let api = FixtureApi::new(fixture_posts(), 15);
    let probe = sample_probe();
    let Assembly { data, report } = assemble(&api, &probe, 2).await;

    assert_eq!(probe.calls_for("https://cms.example.com/content/images/shared.jpg"), 1);
    assert_eq!(probe.calls_for("https://cms.example.com/content/images/x.png"), 1);
    // y.png is unknown to the probe: one failed attempt, no retries.
    assert_eq!(probe.calls_for("https://cms.example.com/content/images/y.png"), 1);
    assert_eq!(probe.calls(), 3);

    assert!(data.posts.iter().all(|post| {
        post.feature_image_dimensions
            == Some(ImageDimensions {
                width: 1200,
                height: 800,
            })
    }));
    assert_eq!(
        data.authors[0].entity.profile_image_dimensions,
        Some(ImageDimensions {
            width: 64,
            height: 64
        })
    );
    assert_eq!(data.authors[1].entity.profile_image_dimensions, None);
    assert_eq!(report.image_failures.len(), 1);
    assert_eq!(
        report.image_failures[0].url,
        "https://cms.example.com/content/images/y.png"
    );
}

#[tokio::test]
async fn failed_listing_page_is_dropped_and_reported() {
    let posts = vec![
        post("p1", "x", &["News"]),
        post("p2", "x", &["News"]),
        post("p3", "x", &["News"]),
    ];

    for strategy in [SEQUENTIAL, FetchStrategy::Concurrent] {
        let mut api = FixtureApi::new(posts.clone(), 1);
        api.failing_post_pages.insert(2);
        let probe = sample_probe();

        let Assembly { data, report } = Assembler::new(&api, &api, &probe, options(10, strategy))
            .assemble()
            .await;

        assert_eq!(slugs(&data.posts), ["p1", "p3"], "{strategy:?}");
        assert_eq!(report.page_failures.len(), 1);
        assert_eq!(report.page_failures[0].resource, "posts");
        assert_eq!(report.page_failures[0].page, 2);
        assert!(!report.is_clean());
        assert_eq!(data.tags[0].count.posts, 2);
    }
}

#[tokio::test]
async fn syndicated_posts_link_back_to_the_original() {
    let mut syndicated = post("translated", "x", &["News"]);
    syndicated["codeinjection_head"] = json!(
        "<script>const fccOriginalPost = \"https://www.example.org/news/the-original/\";</script>"
    );
    let mut broken = post("broken", "x", &["News"]);
    broken["codeinjection_head"] =
        json!("<script>const fccOriginalPost = \"https://www.example.org/news/gone/\";</script>");
    let mut malformed = post("malformed", "x", &["News"]);
    malformed["codeinjection_head"] = json!("<script>var fccOriginalPost = 1;</script>");

    let mut api = FixtureApi::new(vec![syndicated, broken, malformed], 15);
    api.originals.insert(
        "the-original".to_string(),
        json!({
            "id": "orig",
            "slug": "the-original",
            "title": "The Original",
            "published_at": "2019-01-02T03:04:05.000+00:00",
            "url": "https://www.example.org/news/the-original/",
            "primary_author": {
                "id": "en-author",
                "slug": "writer",
                "name": "Writer",
                "url": "https://www.example.org/news/author/writer/"
            }
        }),
    );
    let probe = sample_probe();
    let Assembly { data, report } = assemble(&api, &probe, 10).await;

    let original = data.posts[0].original_post.as_ref().expect("backlink attached");
    assert_eq!(original.title, "The Original");
    assert_eq!(original.url, "https://www.example.org/news/the-original/");
    assert_eq!(original.primary_author.as_ref().unwrap().name, "Writer");
    assert_eq!(
        original.published_at.unwrap().to_rfc3339(),
        "2019-01-02T03:04:05+00:00"
    );

    assert!(data.posts[1].original_post.is_none());
    assert!(data.posts[2].original_post.is_none());
    assert_eq!(report.backlink_failures.len(), 1);
    assert_eq!(report.backlink_failures[0].post, "broken");
}

#[tokio::test]
async fn listings_request_published_content_with_relations() {
    let api = FixtureApi::new(fixture_posts(), 15);
    let probe = sample_probe();
    assemble(&api, &probe, 2).await;

    let queries = api.queries.lock().unwrap();
    let (_, post_query) = queries
        .iter()
        .find(|(resource, _)| *resource == Resource::Posts)
        .expect("posts browsed");
    assert_eq!(post_query.include, ["tags", "authors"]);
    assert_eq!(post_query.filter.as_deref(), Some("status:published"));

    let (_, page_query) = queries
        .iter()
        .find(|(resource, _)| *resource == Resource::Pages)
        .expect("pages browsed");
    assert_eq!(page_query.include, ["authors"]);
}

#[tokio::test]
async fn empty_site_produces_empty_listings() {
    let api = FixtureApi::new(Vec::new(), 15);
    let probe = sample_probe();
    let Assembly { data, report } = assemble(&api, &probe, 2).await;

    assert!(data.posts.is_empty());
    assert!(data.authors.is_empty());
    assert!(data.tags.is_empty());
    assert!(data.popular_tags.is_empty());
    assert!(report.is_clean());
    assert_eq!(probe.calls(), 0);
}
