//! Previous/next links for the page footer.
//!
//! The site is walked depth-first with a synthetic home page (`/index`)
//! in front. Links are computed once per config generation and shared.

use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::{Page, PageEntry, SiteConfig};
use crate::core::UrlPath;
use crate::core::path::strip_query_fragment;
use crate::log;

/// Neighbours of a page in the navigation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLink {
    First { next: Page },
    Middle { prev: Page, next: Page },
    Last { prev: Page },
}

impl PageLink {
    pub fn prev(&self) -> Option<&Page> {
        match self {
            Self::First { .. } => None,
            Self::Middle { prev, .. } | Self::Last { prev } => Some(prev),
        }
    }

    pub fn next(&self) -> Option<&Page> {
        match self {
            Self::First { next } | Self::Middle { next, .. } => Some(next),
            Self::Last { .. } => None,
        }
    }
}

type LinkMap = FxHashMap<UrlPath, PageLink>;

/// Link map of the newest config generation seen.
///
/// Generations only grow, so an older config never evicts a newer one.
static PAGE_LINKS: LazyLock<RwLock<Option<(u64, Arc<LinkMap>)>>> =
    LazyLock::new(|| RwLock::new(None));

/// Footer links for `path`, or `None` when the page is not in the
/// navigation or the site has a single page.
pub fn find_link(path: &UrlPath, config: &SiteConfig) -> Option<PageLink> {
    let generation = config.generation();
    if let Some((cached, links)) = PAGE_LINKS.read().as_ref()
        && *cached == generation
    {
        return links.get(path).cloned();
    }

    let links = Arc::new(build_links(&config.pages, config.title()));
    let mut slot = PAGE_LINKS.write();
    if slot.as_ref().is_none_or(|(cached, _)| *cached < generation) {
        *slot = Some((generation, Arc::clone(&links)));
    }
    drop(slot);
    links.get(path).cloned()
}

/// Every unique page in navigation order, home first.
pub fn walk_pages(pages: &[PageEntry], title: Option<&str>) -> Vec<Page> {
    let home = Page::new(title.unwrap_or("Home"), "/index");
    let mut seen: FxHashSet<UrlPath> = FxHashSet::default();
    seen.insert(home.path.clone());
    let mut out = vec![home];
    walk(pages, &mut seen, &mut out);
    out
}

fn walk(pages: &[PageEntry], seen: &mut FxHashSet<UrlPath>, out: &mut Vec<Page>) {
    for entry in pages {
        match entry {
            PageEntry::Section { pages, .. } => walk(pages, seen, out),
            PageEntry::Page(page) => {
                let key = UrlPath::new(strip_query_fragment(page.path.as_str()));
                if seen.insert(key) {
                    out.push(page.clone());
                } else if page.path.as_str() != "/index" {
                    log!("warning"; "ignoring duplicate page: {}", page.path);
                }
            }
        }
    }
}

fn build_links(pages: &[PageEntry], title: Option<&str>) -> LinkMap {
    let pages = walk_pages(pages, title);
    let mut links = LinkMap::default();
    if pages.len() < 2 {
        return links;
    }

    let last = pages.len() - 1;
    for (i, page) in pages.iter().enumerate() {
        let link = match i {
            0 => PageLink::First {
                next: pages[1].clone(),
            },
            i if i == last => PageLink::Last {
                prev: pages[i - 1].clone(),
            },
            i => PageLink::Middle {
                prev: pages[i - 1].clone(),
                next: pages[i + 1].clone(),
            },
        };
        let key = UrlPath::new(strip_query_fragment(page.path.as_str()));
        links.insert(key, link);
    }
    links
}
