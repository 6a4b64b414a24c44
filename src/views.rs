use chrono::Utc;
use std::fmt;
use tracing::{debug, info, warn};
use url::{Url, form_urlencoded};

use crate::domain::TVError;
use crate::pagination::PageSize;
use crate::snapshot::ViewSnapshot;
use crate::store::KeyValueStore;

const SHARE_PREFIX: &str = "view_";
const SAVED_PREFIX: &str = "saved_";
const VIEW_PARAM: &str = "view";

/// How named views and share snapshots are laid out in the key-value store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyScheme {
    /// Named views under `saved_<name>`, shares under `view_<id>`. Listing only shows named views.
    #[default]
    Namespaced,
    /// Named views under their bare name, shares under `view_<id>`.
    /// Listing returns every key of the store, shares and unrelated keys included.
    Flat,
}

impl KeyScheme {
    fn view_key(&self, name: &str) -> String {
        match self {
            KeyScheme::Namespaced => format!("{SAVED_PREFIX}{name}"),
            KeyScheme::Flat => name.to_string(),
        }
    }
}

/// Opaque, time derived share token: Unix milliseconds in base 36.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareId(String);

impl ShareId {
    pub fn mint_at(millis: u64) -> Self {
        const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut n = millis;
        let mut out = Vec::new();
        loop {
            out.push(DIGITS[(n % 36) as usize]);
            n /= 36;
            if n == 0 {
                break;
            }
        }
        out.reverse();
        ShareId(out.into_iter().map(char::from).collect())
    }

    fn now_millis() -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
    }

    fn storage_key(&self) -> String {
        format!("{SHARE_PREFIX}{}", self.0)
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of the `view` parameter in a url, a `?query` or a bare query string, percent-decoded.
pub fn view_param(link: &str) -> Option<String> {
    let link = link.trim();
    match Url::parse(link) {
        Ok(url) => find_view(url.query_pairs()),
        Err(_) => {
            let query = link.split_once('?').map_or(link, |(_, q)| q);
            let query = query.split('#').next().unwrap_or_default();
            find_view(form_urlencoded::parse(query.as_bytes()))
        }
    }
}

fn find_view(mut pairs: form_urlencoded::Parse<'_>) -> Option<String> {
    pairs
        .find(|(k, _)| k == VIEW_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// A share id typed on its own, without any url around it.
fn bare_share_id(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| text.to_ascii_lowercase())
}

/// Saved and shared views on top of a key-value store.
pub struct ViewStore {
    store: Box<dyn KeyValueStore>,
    scheme: KeyScheme,
    base_url: String,
    page_size: PageSize,
}

impl ViewStore {
    pub fn new(store: Box<dyn KeyValueStore>, scheme: KeyScheme, base_url: &str) -> Self {
        ViewStore {
            store,
            scheme,
            base_url: base_url.to_string(),
            page_size: PageSize::default(),
        }
    }

    pub fn with_page_size(mut self, size: PageSize) -> Self {
        self.page_size = size;
        self
    }

    /// Stores `snapshot` under `name`, replacing an existing view. Materialized rows are dropped.
    pub fn save(&mut self, name: &str, snapshot: &ViewSnapshot) -> Result<(), TVError> {
        if name.trim().is_empty() {
            return Err(TVError::EmptyViewName);
        }
        let json = snapshot.without_data().to_json()?;
        self.store.set_item(&self.scheme.view_key(name), &json)?;
        info!("Saved view '{name}'");
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        let keys = self.store.keys();
        match self.scheme {
            KeyScheme::Flat => keys,
            KeyScheme::Namespaced => keys
                .iter()
                .filter_map(|k| k.strip_prefix(SAVED_PREFIX))
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn load(&self, name: &str) -> Result<ViewSnapshot, TVError> {
        let not_found = || TVError::ViewNotFound(name.to_string());
        let text = self
            .store
            .get_item(&self.scheme.view_key(name))
            .ok_or_else(not_found)?;
        ViewSnapshot::from_json(&text).map_err(|e| {
            warn!("Ignoring stored view '{name}': {e}");
            not_found()
        })
    }

    /// Removes a named view. Unknown names are fine.
    pub fn delete(&mut self, name: &str) -> Result<(), TVError> {
        self.store.remove_item(&self.scheme.view_key(name))?;
        debug!("Deleted view '{name}'");
        Ok(())
    }

    /// Stores the snapshot (with its rows) under a fresh share id and returns the link.
    pub fn generate_share_link(&mut self, snapshot: &ViewSnapshot) -> Result<String, TVError> {
        let mut link = Url::parse(&self.base_url)?;
        link.set_fragment(None);
        link.set_query(None);

        let id = self.unused_share_id(ShareId::now_millis());
        self.store.set_item(&id.storage_key(), &snapshot.to_json()?)?;
        link.query_pairs_mut().append_pair(VIEW_PARAM, &id.to_string());
        let link = link.to_string();
        info!(
            "Shared view {id} with {} rows",
            snapshot.data.as_ref().map_or(0, Vec::len)
        );
        Ok(link)
    }

    // Two shares in the same millisecond get consecutive ids.
    fn unused_share_id(&self, mut millis: u64) -> ShareId {
        loop {
            let id = ShareId::mint_at(millis);
            if self.store.get_item(&id.storage_key()).is_none() {
                return id;
            }
            millis += 1;
        }
    }

    /// Accepts a full link, a query string, or a bare share id.
    pub fn resolve_share_link(&self, link: &str) -> Option<ViewSnapshot> {
        let id = view_param(link).or_else(|| bare_share_id(link))?;
        self.resolve_share_id(&id)
    }

    pub fn resolve_share_id(&self, id: &str) -> Option<ViewSnapshot> {
        let text = self
            .store
            .get_item(&ShareId(id.to_string()).storage_key())
            .or_else(|| {
                warn!("No shared view {id}");
                None
            })?;
        ViewSnapshot::from_json(&text)
            .inspect_err(|e| warn!("Ignoring shared view {id}: {e}"))
            .ok()
    }

    pub fn reset(&self) -> ViewSnapshot {
        ViewSnapshot::with_page_size(self.page_size)
    }
}
