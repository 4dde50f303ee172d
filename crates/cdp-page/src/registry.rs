//! Driver registry keeping track of attached pages.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ids::PageId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageContext {
    pub target_id: Option<String>,
    pub cdp_session: Option<String>,
    pub recent_url: Option<String>,
}

/// Concurrent registry for pages attached through one transport.
pub struct Registry {
    pages: DashMap<PageId, PageContext>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            pages: DashMap::new(),
        }
    }

    pub fn insert_page(&self, page: PageId, target_id: Option<String>, cdp_session: Option<String>) {
        let ctx = PageContext {
            target_id,
            cdp_session,
            recent_url: None,
        };
        self.pages.insert(page, ctx);
    }

    pub fn remove_page(&self, page: &PageId) {
        self.pages.remove(page);
    }

    pub fn get(&self, page: &PageId) -> Option<PageContext> {
        self.pages.get(page).map(|entry| entry.value().clone())
    }

    pub fn set_recent_url(&self, page: &PageId, url: String) {
        if let Some(mut entry) = self.pages.get_mut(page) {
            entry.recent_url = Some(url);
        }
    }

    pub fn get_cdp_session(&self, page: &PageId) -> Option<String> {
        self.pages
            .get(page)
            .and_then(|entry| entry.cdp_session.clone())
    }

    pub fn get_target_id(&self, page: &PageId) -> Option<String> {
        self.pages
            .get(page)
            .and_then(|entry| entry.target_id.clone())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
