use std::cmp::Ordering;
use std::collections::HashSet;
use std::num::NonZeroUsize;

use crate::model::{Author, Counted, Listing, Post, PostCount, Tag};
use crate::paginate::paginate;

/// Number of entries in the popular tags widget.
pub const POPULAR_TAG_LIMIT: usize = 15;

/// An author or tag with every post that references it, in post order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouped<E> {
    pub entity: E,
    pub posts: Vec<Post>,
}

impl<E> Grouped<E> {
    pub fn count(&self) -> PostCount {
        PostCount {
            posts: self.posts.len(),
        }
    }
}

/// Unique primary authors in order of first appearance, each with the posts they lead.
pub fn group_by_author(posts: &[Post]) -> Vec<Grouped<Author>> {
    let mut seen = HashSet::new();
    let authors: Vec<&Author> = posts
        .iter()
        .filter_map(|post| post.primary_author.as_ref())
        .filter(|author| seen.insert(author.id.as_str()))
        .collect();

    authors
        .into_iter()
        .map(|author| Grouped {
            entity: author.clone(),
            posts: posts
                .iter()
                .filter(|post| {
                    post.primary_author
                        .as_ref()
                        .is_some_and(|primary| primary.id == author.id)
                })
                .cloned()
                .collect(),
        })
        .collect()
}

/// Unique public tags in order of first appearance, each with the posts carrying it.
pub fn group_by_tag(posts: &[Post]) -> Vec<Grouped<Tag>> {
    let mut seen = HashSet::new();
    let tags: Vec<&Tag> = posts
        .iter()
        .flat_map(|post| post.tags.iter())
        .filter(|tag| tag.is_public())
        .filter(|tag| seen.insert(tag.id.as_str()))
        .collect();

    tags.into_iter()
        .map(|tag| Grouped {
            entity: tag.clone(),
            posts: posts
                .iter()
                .filter(|post| post.tags.iter().any(|candidate| candidate.slug == tag.slug))
                .cloned()
                .collect(),
        })
        .collect()
}

/// Tags ordered by post count (descending), then by case-insensitive name.
///
/// The sort is stable: names that differ only by case keep first-appearance order.
pub fn popular_tags(tags: &[Grouped<Tag>]) -> Vec<Counted<Tag>> {
    let mut ranked: Vec<Counted<Tag>> = tags
        .iter()
        .map(|group| Counted {
            entity: group.entity.clone(),
            count: group.count(),
        })
        .collect();

    ranked.sort_by(|left, right| {
        right
            .count
            .posts
            .cmp(&left.count.posts)
            .then_with(|| compare_names(&left.entity.name, &right.entity.name))
    });
    ranked.truncate(POPULAR_TAG_LIMIT);
    ranked
}

fn compare_names(left: &str, right: &str) -> Ordering {
    left.chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase))
}

/// Expand each group into one listing entry per page of `page_size` posts.
pub fn paginate_groups<E: Clone>(groups: Vec<Grouped<E>>, page_size: NonZeroUsize) -> Vec<Listing<E>> {
    groups
        .into_iter()
        .flat_map(|group| {
            let count = group.count();
            paginate(&group.posts, page_size)
                .into_iter()
                .map(move |chunk| Listing {
                    entity: group.entity.clone(),
                    page: chunk.page,
                    posts: chunk.items,
                    count,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
