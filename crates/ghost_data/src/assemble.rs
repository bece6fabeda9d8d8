//! Builds the complete [`SiteData`] for one site build.
//!
//! The pipeline never fails as a whole: unreachable pages, backlinks and images are
//! logged, left out of the data and listed in the [`BuildReport`].

use std::cmp::Reverse;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{BrowseQuery, ContentApi, Resource};
use crate::backlink::{original_post_slug, parse_original_post_url};
use crate::config::Tunables;
use crate::dimensions::{DimensionCache, DimensionKind, DimensionResolver, ImageProbe, ProbeFailure};
use crate::fetch::{FetchOutcome, FetchStrategy, fetch_all};
use crate::model::{Author, OriginalPost, Page, Post, SiteData, SiteSettings, Tag};
use crate::normalize::UrlNormalizer;
use crate::reading::reading_time;
use crate::xref::{group_by_author, group_by_tag, paginate_groups, popular_tags};

#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    /// CMS origin stripped from entity URLs.
    pub origin: String,
    /// Public site URL that replaces the CMS URL in the settings.
    pub site_url: Option<String>,
    pub posts_per_page: NonZeroUsize,
    pub strategy: FetchStrategy,
    pub fetch_limit: Option<u32>,
    pub rss_feed_size: usize,
    pub original_post_identifier: String,
}

impl AssemblyOptions {
    pub fn from_tunables(tunables: &Tunables) -> Self {
        Self {
            origin: tunables.api.url.clone(),
            site_url: tunables.site_url.clone(),
            posts_per_page: tunables.posts_per_page,
            strategy: FetchStrategy::from_tunables(tunables),
            fetch_limit: Some(tunables.fetch_limit),
            rss_feed_size: tunables.rss_feed_size,
            original_post_identifier: tunables.original_post_identifier.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailureReport {
    pub resource: String,
    pub page: u32,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BacklinkFailure {
    pub post: String,
    pub url: String,
    pub error: String,
}

/// Everything that went missing during a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub page_failures: Vec<PageFailureReport>,
    pub backlink_failures: Vec<BacklinkFailure>,
    pub image_failures: Vec<ImageFailureReport>,
    pub settings_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFailureReport {
    pub url: String,
    pub error: String,
}

impl From<ProbeFailure> for ImageFailureReport {
    fn from(failure: ProbeFailure) -> Self {
        Self {
            url: failure.url,
            error: failure.error,
        }
    }
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.page_failures.is_empty()
            && self.backlink_failures.is_empty()
            && self.image_failures.is_empty()
            && self.settings_error.is_none()
    }

    fn record_fetch<T>(&mut self, outcome: &FetchOutcome<T>) {
        self.page_failures
            .extend(outcome.failures.iter().map(|failure| PageFailureReport {
                resource: failure.resource.to_string(),
                page: failure.page,
                error: failure.error.to_string(),
            }));
    }
}

#[derive(Debug, Clone)]
pub struct Assembly {
    pub data: SiteData,
    pub report: BuildReport,
}

/// One build's worth of state: the API handles and the two image caches.
pub struct Assembler<'a> {
    api: &'a dyn ContentApi,
    backlink_api: &'a dyn ContentApi,
    probe: &'a dyn ImageProbe,
    options: AssemblyOptions,
    feature_images: DimensionCache,
    author_images: DimensionCache,
}

impl<'a> Assembler<'a> {
    pub fn new(
        api: &'a dyn ContentApi,
        backlink_api: &'a dyn ContentApi,
        probe: &'a dyn ImageProbe,
        options: AssemblyOptions,
    ) -> Self {
        Self {
            api,
            backlink_api,
            probe,
            options,
            feature_images: DimensionCache::new(),
            author_images: DimensionCache::new(),
        }
    }

    pub async fn assemble(mut self) -> Assembly {
        let mut stages = StageTimer::new();
        let mut report = BuildReport::default();

        stages.begin("Fetch settings");
        let settings = self.fetch_settings(&mut report).await;
        stages.end();

        stages.begin("Fetch posts");
        let post_query = self.browse_query(&["tags", "authors"]);
        let fetched_posts: FetchOutcome<Post> =
            fetch_all(self.api, Resource::Posts, &post_query, self.options.strategy).await;
        report.record_fetch(&fetched_posts);
        let mut posts = fetched_posts.records;
        stages.end();

        stages.begin("Fetch pages");
        let page_query = self.browse_query(&["authors"]);
        let fetched_pages: FetchOutcome<Page> =
            fetch_all(self.api, Resource::Pages, &page_query, self.options.strategy).await;
        report.record_fetch(&fetched_pages);
        let mut pages = fetched_pages.records;
        stages.end();

        stages.begin("Normalize URLs");
        let normalizer = UrlNormalizer::new(self.options.origin.clone());
        posts.iter_mut().for_each(|post| normalizer.apply_to_post(post));
        pages.iter_mut().for_each(|page| normalizer.apply_to_page(page));
        stages.end();

        // Featured posts lead the listing, otherwise API order is kept.
        posts.sort_by_key(|post| Reverse(post.featured));

        stages.begin("Resolve original posts");
        for post in &mut posts {
            self.attach_original_post(post, &mut report).await;
        }
        stages.end();

        stages.begin("Resolve image dimensions");
        let probe = self.probe;
        let mut resolver = DimensionResolver::new(probe);
        for post in &mut posts {
            self.resolve_post_images(&mut resolver, post).await;
        }
        for page in &mut pages {
            self.resolve_page_images(&mut resolver, page).await;
        }
        report.image_failures = resolver
            .into_failures()
            .into_iter()
            .map(ImageFailureReport::from)
            .collect();
        stages.end();

        for post in &mut posts {
            post.reading_time = reading_time(post.html.as_deref().unwrap_or_default());
        }
        for page in &mut pages {
            page.reading_time = reading_time(page.html.as_deref().unwrap_or_default());
        }

        stages.begin("Cross-reference authors and tags");
        let author_groups = group_by_author(&posts);
        let tag_groups = group_by_tag(&posts);
        let popular = popular_tags(&tag_groups);
        let authors = paginate_groups(author_groups, self.options.posts_per_page);
        let tags = paginate_groups(tag_groups, self.options.posts_per_page);
        stages.end();

        let feed = posts.iter().take(self.options.rss_feed_size).cloned().collect();

        info!(
            posts = posts.len(),
            pages = pages.len(),
            author_pages = authors.len(),
            tag_pages = tags.len(),
            page_failures = report.page_failures.len(),
            backlink_failures = report.backlink_failures.len(),
            image_failures = report.image_failures.len(),
            elapsed_ms = %format_ms(stages.total()),
            "Site data assembled"
        );

        Assembly {
            data: SiteData {
                settings,
                posts,
                pages,
                authors,
                tags,
                popular_tags: popular,
                feed,
            },
            report,
        }
    }

    fn browse_query(&self, include: &[&str]) -> BrowseQuery {
        let query = BrowseQuery::published(include).with_order("published_at desc");
        match self.options.fetch_limit {
            Some(limit) => query.with_limit(limit),
            None => query,
        }
    }

    async fn fetch_settings(&self, report: &mut BuildReport) -> Option<SiteSettings> {
        match self.api.settings().await {
            Ok(mut settings) => {
                if let Some(site_url) = &self.options.site_url {
                    settings.url = Some(site_url.clone());
                }
                Some(settings)
            }
            Err(error) => {
                warn!(%error, "Could not fetch site settings");
                report.settings_error = Some(error.to_string());
                None
            }
        }
    }

    async fn attach_original_post(&self, post: &mut Post, report: &mut BuildReport) {
        let Some(header) = post.codeinjection_head.as_deref() else {
            return;
        };
        let Some(url) = parse_original_post_url(header, &self.options.original_post_identifier)
        else {
            return;
        };
        let Some(slug) = original_post_slug(url) else {
            debug!(post = %post.slug, %url, "Original post URL has no slug");
            return;
        };

        match self.backlink_api.read_post(slug).await {
            Ok(original) => {
                post.original_post = Some(OriginalPost {
                    title: original.title,
                    published_at: original.published_at,
                    url: url.to_string(),
                    primary_author: original.primary_author,
                });
            }
            Err(error) => {
                warn!(post = %post.slug, %url, %error, "Could not resolve original post");
                report.backlink_failures.push(BacklinkFailure {
                    post: post.slug.clone(),
                    url: url.to_string(),
                    error: error.to_string(),
                });
            }
        }
    }

    async fn resolve_post_images(&mut self, resolver: &mut DimensionResolver<'_>, post: &mut Post) {
        if let Some(url) = post.feature_image.as_deref() {
            post.feature_image_dimensions = resolver
                .resolve(&mut self.feature_images, url, url, DimensionKind::Feature)
                .await;
        }
        if let Some(author) = post.primary_author.as_mut() {
            self.resolve_author_images(resolver, author).await;
        }
        for author in &mut post.authors {
            self.resolve_author_images(resolver, author).await;
        }
        for tag in &mut post.tags {
            self.resolve_tag_image(resolver, tag).await;
        }
        if let Some(tag) = post.primary_tag.as_mut() {
            self.resolve_tag_image(resolver, tag).await;
        }
    }

    async fn resolve_page_images(&mut self, resolver: &mut DimensionResolver<'_>, page: &mut Page) {
        if let Some(url) = page.feature_image.as_deref() {
            page.feature_image_dimensions = resolver
                .resolve(&mut self.feature_images, url, url, DimensionKind::Feature)
                .await;
        }
        if let Some(author) = page.primary_author.as_mut() {
            self.resolve_author_images(resolver, author).await;
        }
        for author in &mut page.authors {
            self.resolve_author_images(resolver, author).await;
        }
    }

    async fn resolve_author_images(
        &mut self,
        resolver: &mut DimensionResolver<'_>,
        author: &mut Author,
    ) {
        if let Some(url) = author.profile_image.as_deref() {
            author.profile_image_dimensions = resolver
                .resolve(&mut self.author_images, url, &author.slug, DimensionKind::Profile)
                .await;
        }
        if let Some(url) = author.cover_image.as_deref() {
            author.cover_image_dimensions = resolver
                .resolve(&mut self.author_images, url, &author.slug, DimensionKind::Cover)
                .await;
        }
    }

    async fn resolve_tag_image(&mut self, resolver: &mut DimensionResolver<'_>, tag: &mut Tag) {
        if let Some(url) = tag.feature_image.as_deref() {
            tag.feature_image_dimensions = resolver
                .resolve(&mut self.feature_images, url, url, DimensionKind::Feature)
                .await;
        }
    }
}

struct StageTimer {
    build_start: Instant,
    stage_start: Instant,
    current: Option<&'static str>,
}

impl StageTimer {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            build_start: now,
            stage_start: now,
            current: None,
        }
    }

    fn begin(&mut self, name: &'static str) {
        debug!(stage = name, since_start_ms = %format_ms(self.build_start.elapsed()), "BEGIN");
        self.stage_start = Instant::now();
        self.current = Some(name);
    }

    fn end(&mut self) {
        if let Some(name) = self.current.take() {
            info!(stage = name, stage_ms = %format_ms(self.stage_start.elapsed()), "END");
        }
    }

    fn total(&self) -> Duration {
        self.build_start.elapsed()
    }
}

fn format_ms(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64() * 1_000.0)
}
