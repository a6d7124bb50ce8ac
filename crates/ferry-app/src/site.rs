//! In-memory site: pages served to frames by the scripted host.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use ferry_nav::{
    Content, ContentLoader, ContentRef, FragmentNavigationArgs, LoadFailure, LoadResult,
    NavigatedArgs,
};
use ferry_types::Location;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tokio_util::sync::CancellationToken;

use crate::session::PageSpec;

pub struct Page {
    location: Location,
    title: String,
    keep_alive: Option<bool>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.location)
    }
}

impl Content for Page {
    fn keep_alive(&self) -> Option<bool> {
        self.keep_alive
    }

    fn on_navigated_to(&self, args: &NavigatedArgs) {
        log::debug!("{}: showing \"{}\"", args.frame, self.title);
    }

    fn on_fragment_navigation(&self, args: &FragmentNavigationArgs) {
        let anchor = args.fragment.as_deref().unwrap_or("top");
        log::debug!("{}: scrolled \"{}\" to #{anchor}", args.frame, self.title);
    }
}

enum Entry {
    Page(ContentRef),
    Broken(String),
}

/// Serves pages keyed by fragment-free location. Every load produces a
/// fresh result on the next executor turn.
#[derive(Default)]
pub struct SiteLoader {
    entries: HashMap<Location, Entry>,
}

impl SiteLoader {
    pub fn from_pages(pages: &[PageSpec]) -> ferry_types::Result<Self> {
        let mut entries = HashMap::new();
        for spec in pages {
            let location = Location::parse(&spec.location)?.without_fragment();
            let entry = match &spec.fail {
                Some(message) => Entry::Broken(message.clone()),
                None => {
                    let title = if spec.title.is_empty() {
                        location.to_string()
                    } else {
                        spec.title.clone()
                    };
                    Entry::Page(Rc::new(Page {
                        location: location.clone(),
                        title,
                        keep_alive: spec.keep_alive,
                    }))
                },
            };
            entries.insert(location, entry);
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn lookup(&self, location: &Location) -> LoadResult {
        match self.entries.get(&location.without_fragment()) {
            Some(Entry::Page(page)) => Ok(Rc::clone(page)),
            Some(Entry::Broken(message)) => Err(anyhow::anyhow!("{message}").into()),
            None => Err(anyhow::anyhow!("no page at {}", location.without_fragment()).into()),
        }
    }
}

impl ContentLoader for SiteLoader {
    fn load_content(
        &self,
        location: &Location,
        cancel: CancellationToken,
    ) -> LocalBoxFuture<'static, LoadResult> {
        log::trace!("site: loading {location}");
        let result = self.lookup(location);
        async move {
            if cancel.is_cancelled() {
                return Err(LoadFailure::Cancelled);
            }
            result
        }
        .boxed_local()
    }
}
