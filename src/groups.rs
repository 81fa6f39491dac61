//! Tab-group state and its reconciliation with the native grouping surface.
//!
//! [`GroupState`] is authoritative: every mutation lands in memory and in the
//! snapshot store even when the native surface rejects the mirroring call.
//! External drift is repaired by the next full organize pass, not chased
//! per-operation.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Category, CategorySet, GroupColor, TabDescriptor, TabId};
use crate::store::{SnapshotStore, TAB_GROUPS_BLOB};

/// Native grouping surface failures. Logged and tolerated, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Native surface unavailable: {0}")]
    Unavailable(String),
    #[error("Group operation failed: {0}")]
    Operation(String),
}

/// One group as the native surface sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeGroup {
    pub id: i64,
    pub title: String,
    pub color: GroupColor,
}

/// The browser-side tab grouping API. One production adapter per embedding
/// host; [`MockSurface`] for tests.
pub trait NativeSurface: Send {
    fn query_groups(&self) -> Result<Vec<NativeGroup>, SurfaceError>;

    /// Create a titled, colored group and return its surface id.
    fn create_group(&mut self, title: &str, color: GroupColor) -> Result<i64, SurfaceError>;

    fn add_to_group(&mut self, group_id: i64, tab: TabId) -> Result<(), SurfaceError>;
}

impl<S: NativeSurface> NativeSurface for Arc<std::sync::Mutex<S>> {
    fn query_groups(&self) -> Result<Vec<NativeGroup>, SurfaceError> {
        self.lock()
            .map_err(|_| SurfaceError::Unavailable("surface lock poisoned".to_string()))?
            .query_groups()
    }

    fn create_group(&mut self, title: &str, color: GroupColor) -> Result<i64, SurfaceError> {
        self.lock()
            .map_err(|_| SurfaceError::Unavailable("surface lock poisoned".to_string()))?
            .create_group(title, color)
    }

    fn add_to_group(&mut self, group_id: i64, tab: TabId) -> Result<(), SurfaceError> {
        self.lock()
            .map_err(|_| SurfaceError::Unavailable("surface lock poisoned".to_string()))?
            .add_to_group(group_id, tab)
    }
}

// ═══════════════════════════════════════════════════════════
// GroupState
// ═══════════════════════════════════════════════════════════

/// Authoritative grouping state. Vec order is join order; a tab id appears
/// in at most one list, and emptied lists are dropped immediately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupState {
    groups: BTreeMap<Category, Vec<TabDescriptor>>,
}

impl GroupState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tabs(&self, category: Category) -> Option<&[TabDescriptor]> {
        self.groups.get(&category).map(Vec::as_slice)
    }

    pub fn category_of(&self, id: TabId) -> Option<Category> {
        self.groups
            .iter()
            .find(|(_, tabs)| tabs.iter().any(|t| t.id == id))
            .map(|(category, _)| *category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[TabDescriptor])> {
        self.groups.iter().map(|(c, tabs)| (*c, tabs.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total_tabs(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Place `descriptor` in `category`, first removing the id from any other
    /// list. Re-inserting into the same list replaces the stored descriptor
    /// in place and keeps its join position.
    fn insert(&mut self, descriptor: TabDescriptor, category: Category) {
        let previous = self.category_of(descriptor.id);
        if let Some(old) = previous {
            if old != category {
                self.remove(descriptor.id);
            }
        }

        let tabs = self.groups.entry(category).or_default();
        match tabs.iter_mut().find(|t| t.id == descriptor.id) {
            Some(slot) => *slot = descriptor,
            None => tabs.push(descriptor),
        }
    }

    /// Remove the id wherever it is. Returns the category it left, if any.
    fn remove(&mut self, id: TabId) -> Option<Category> {
        let category = self.category_of(id)?;
        let tabs = self.groups.get_mut(&category)?;
        tabs.retain(|t| t.id != id);
        if tabs.is_empty() {
            self.groups.remove(&category);
        }
        Some(category)
    }

    fn touch(&mut self, id: TabId, at: DateTime<Utc>) -> bool {
        for tabs in self.groups.values_mut() {
            if let Some(tab) = tabs.iter_mut().find(|t| t.id == id) {
                tab.last_accessed = at;
                return true;
            }
        }
        false
    }

    fn clear(&mut self) {
        self.groups.clear();
    }
}

// ═══════════════════════════════════════════════════════════
// Reconciler
// ═══════════════════════════════════════════════════════════

pub struct TabGroupReconciler {
    state: GroupState,
    /// Tab ids currently known to exist. A resolution that completes after
    /// its tab left this set is dropped silently.
    live: HashSet<TabId>,
    surface: Box<dyn NativeSurface>,
    snapshot: Arc<SnapshotStore>,
}

impl TabGroupReconciler {
    /// Build a reconciler, restoring persisted group state. Restored tabs are
    /// considered live until proven otherwise.
    pub fn new(surface: Box<dyn NativeSurface>, snapshot: Arc<SnapshotStore>) -> Self {
        let state = match snapshot.load_json::<GroupState>(TAB_GROUPS_BLOB) {
            Ok(Some(state)) => state,
            Ok(None) => GroupState::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to restore group state, starting empty");
                GroupState::new()
            }
        };
        let live = state.iter().flat_map(|(_, tabs)| tabs.iter().map(|t| t.id)).collect();
        Self {
            state,
            live,
            surface,
            snapshot,
        }
    }

    pub fn state(&self) -> &GroupState {
        &self.state
    }

    /// Register a tab as live before kicking off its resolution, so a
    /// removal racing the resolution wins.
    pub fn register_live(&mut self, id: TabId) {
        self.live.insert(id);
    }

    pub fn is_live(&self, id: TabId) -> bool {
        self.live.contains(&id)
    }

    /// Assign a tab to a category group: mirror to the native surface, then
    /// apply the authoritative in-memory mutation and persist it.
    pub fn assign(&mut self, descriptor: TabDescriptor, category: Category, categories: &CategorySet) {
        self.live.insert(descriptor.id);
        let tab_id = descriptor.id;

        match self.native_group_for(category, categories) {
            Ok(group_id) => {
                if let Err(e) = self.surface.add_to_group(group_id, tab_id) {
                    tracing::warn!(tab = %tab_id, error = %e, "surface add_to_group failed");
                }
            }
            Err(e) => {
                tracing::warn!(%category, error = %e, "surface group resolution failed");
            }
        }

        self.state.insert(descriptor, category);
        self.persist();
        tracing::debug!(tab = %tab_id, %category, "tab assigned");
    }

    /// Apply a completed categorization. No-op if the tab was removed while
    /// the resolution was in flight.
    pub fn complete_resolution(
        &mut self,
        descriptor: TabDescriptor,
        category: Category,
        categories: &CategorySet,
    ) {
        if !self.live.contains(&descriptor.id) {
            tracing::debug!(tab = %descriptor.id, "tab removed before resolution completed, dropping");
            return;
        }
        self.assign(descriptor, category, categories);
    }

    /// Drop a closed tab from whichever list holds it.
    pub fn remove(&mut self, id: TabId) -> Option<Category> {
        self.live.remove(&id);
        let category = self.state.remove(id);
        if category.is_some() {
            self.persist();
        }
        category
    }

    /// Bump a tab's `last_accessed`. Category is untouched.
    pub fn activate(&mut self, id: TabId) {
        if self.state.touch(id, Utc::now()) {
            self.persist();
        }
    }

    /// Tabs not touched for at least `threshold_days`, across all groups.
    pub fn unused_tabs(&self, threshold_days: i64) -> Vec<TabDescriptor> {
        let cutoff = Utc::now() - Duration::days(threshold_days);
        self.state
            .iter()
            .flat_map(|(_, tabs)| tabs.iter())
            .filter(|t| t.last_accessed <= cutoff)
            .cloned()
            .collect()
    }

    /// Forget everything in preparation for a full organize pass over a
    /// fresh tab snapshot.
    pub fn reset(&mut self, live: impl IntoIterator<Item = TabId>) {
        self.state.clear();
        self.live = live.into_iter().collect();
        self.persist();
    }

    /// Reuse the surface group titled like the category, else create one.
    fn native_group_for(
        &mut self,
        category: Category,
        categories: &CategorySet,
    ) -> Result<i64, SurfaceError> {
        let title = category.as_str();
        let existing = self
            .surface
            .query_groups()?
            .into_iter()
            .find(|g| g.title == title);
        match existing {
            Some(group) => Ok(group.id),
            None => {
                let color = categories.definition(category).color;
                self.surface.create_group(title, color)
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = self.snapshot.save_json(TAB_GROUPS_BLOB, &self.state) {
            tracing::warn!(error = %e, "failed to persist group state");
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Mock surface
// ═══════════════════════════════════════════════════════════

/// In-memory surface for tests: records groups and memberships, or fails
/// every call when built with [`MockSurface::failing`].
#[derive(Default)]
pub struct MockSurface {
    groups: Vec<NativeGroup>,
    memberships: BTreeMap<i64, Vec<TabId>>,
    next_id: i64,
    fail: bool,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn groups(&self) -> &[NativeGroup] {
        &self.groups
    }

    pub fn members(&self, group_id: i64) -> &[TabId] {
        self.memberships
            .get(&group_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl NativeSurface for MockSurface {
    fn query_groups(&self) -> Result<Vec<NativeGroup>, SurfaceError> {
        if self.fail {
            return Err(SurfaceError::Unavailable("mock surface down".to_string()));
        }
        Ok(self.groups.clone())
    }

    fn create_group(&mut self, title: &str, color: GroupColor) -> Result<i64, SurfaceError> {
        if self.fail {
            return Err(SurfaceError::Unavailable("mock surface down".to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.groups.push(NativeGroup {
            id,
            title: title.to_string(),
            color,
        });
        Ok(id)
    }

    fn add_to_group(&mut self, group_id: i64, tab: TabId) -> Result<(), SurfaceError> {
        if self.fail {
            return Err(SurfaceError::Unavailable("mock surface down".to_string()));
        }
        if !self.groups.iter().any(|g| g.id == group_id) {
            return Err(SurfaceError::Operation(format!("no group {group_id}")));
        }
        self.memberships.entry(group_id).or_default().push(tab);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconciler() -> TabGroupReconciler {
        let snapshot = Arc::new(SnapshotStore::open_in_memory().unwrap());
        TabGroupReconciler::new(Box::new(MockSurface::new()), snapshot)
    }

    fn tab(id: i64, url: &str) -> TabDescriptor {
        TabDescriptor::new(TabId(id), url, "title")
    }

    #[test]
    fn assign_places_tab_in_exactly_one_list() {
        let mut r = reconciler();
        let set = CategorySet::defaults();

        r.assign(tab(1, "https://a.example/"), Category::Social, &set);
        r.assign(tab(1, "https://a.example/"), Category::Development, &set);

        assert_eq!(r.state().category_of(TabId(1)), Some(Category::Development));
        // The emptied social list is gone, not left as an empty vec.
        assert!(r.state().tabs(Category::Social).is_none());
        assert_eq!(r.state().total_tabs(), 1);
    }

    #[test]
    fn reassign_same_category_keeps_join_position() {
        let mut r = reconciler();
        let set = CategorySet::defaults();

        r.assign(tab(1, "https://a.example/"), Category::Social, &set);
        r.assign(tab(2, "https://b.example/"), Category::Social, &set);
        r.assign(tab(1, "https://a.example/page2"), Category::Social, &set);

        let tabs = r.state().tabs(Category::Social).unwrap();
        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs[0].id, TabId(1));
        assert_eq!(tabs[0].url, "https://a.example/page2");
        assert_eq!(tabs[1].id, TabId(2));
    }

    #[test]
    fn remove_deletes_emptied_list() {
        let mut r = reconciler();
        let set = CategorySet::defaults();
        r.assign(tab(1, "https://a.example/"), Category::Finance, &set);

        assert_eq!(r.remove(TabId(1)), Some(Category::Finance));
        assert!(r.state().is_empty());
        assert_eq!(r.remove(TabId(1)), None);
    }

    #[test]
    fn resolution_after_removal_is_dropped() {
        let mut r = reconciler();
        let set = CategorySet::defaults();

        r.register_live(TabId(7));
        r.remove(TabId(7));
        r.complete_resolution(tab(7, "https://a.example/"), Category::Social, &set);

        assert!(r.state().is_empty());
    }

    #[test]
    fn failing_surface_still_mutates_state() {
        let snapshot = Arc::new(SnapshotStore::open_in_memory().unwrap());
        let mut r = TabGroupReconciler::new(Box::new(MockSurface::failing()), snapshot);
        let set = CategorySet::defaults();

        r.assign(tab(1, "https://a.example/"), Category::Shopping, &set);

        assert_eq!(r.state().category_of(TabId(1)), Some(Category::Shopping));
    }

    #[test]
    fn surface_group_is_reused_by_title() {
        let surface = Arc::new(std::sync::Mutex::new(MockSurface::new()));
        let snapshot = Arc::new(SnapshotStore::open_in_memory().unwrap());
        let mut r = TabGroupReconciler::new(Box::new(Arc::clone(&surface)), snapshot);
        let set = CategorySet::defaults();

        r.assign(tab(1, "https://a.example/"), Category::Social, &set);
        r.assign(tab(2, "https://b.example/"), Category::Social, &set);
        r.assign(tab(3, "https://c.example/"), Category::Finance, &set);

        let surface = surface.lock().unwrap();
        assert_eq!(surface.groups().len(), 2);
        let social = surface.groups().iter().find(|g| g.title == "social").unwrap();
        assert_eq!(social.color, set.definition(Category::Social).color);
        assert_eq!(surface.members(social.id), &[TabId(1), TabId(2)]);
    }

    #[test]
    fn activate_bumps_last_accessed_only() {
        let mut r = reconciler();
        let set = CategorySet::defaults();
        let mut old = tab(1, "https://a.example/");
        old.last_accessed = Utc::now() - Duration::days(30);
        r.assign(old, Category::Social, &set);

        r.activate(TabId(1));

        let tabs = r.state().tabs(Category::Social).unwrap();
        assert!(Utc::now() - tabs[0].last_accessed < Duration::minutes(1));
        assert_eq!(r.state().category_of(TabId(1)), Some(Category::Social));
    }

    #[test]
    fn unused_tabs_honors_threshold_boundary() {
        let mut r = reconciler();
        let set = CategorySet::defaults();

        let mut stale = tab(1, "https://stale.example/");
        stale.last_accessed = Utc::now() - Duration::days(10);
        let fresh = tab(2, "https://fresh.example/");
        r.assign(stale, Category::Social, &set);
        r.assign(fresh, Category::Social, &set);

        let unused = r.unused_tabs(7);
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].id, TabId(1));
        assert!(r.unused_tabs(11).is_empty());
    }

    #[test]
    fn state_survives_snapshot_round_trip() {
        let snapshot = Arc::new(SnapshotStore::open_in_memory().unwrap());
        let set = CategorySet::defaults();
        {
            let mut r = TabGroupReconciler::new(Box::new(MockSurface::new()), Arc::clone(&snapshot));
            r.assign(tab(1, "https://a.example/"), Category::Social, &set);
            r.assign(tab(2, "https://b.example/"), Category::Development, &set);
        }

        let reloaded = TabGroupReconciler::new(Box::new(MockSurface::new()), snapshot);
        assert_eq!(reloaded.state().total_tabs(), 2);
        assert_eq!(reloaded.state().category_of(TabId(2)), Some(Category::Development));
        // Restored tabs count as live.
        assert!(reloaded.is_live(TabId(1)));
    }

    #[test]
    fn reset_replaces_live_set_and_state() {
        let mut r = reconciler();
        let set = CategorySet::defaults();
        r.assign(tab(1, "https://a.example/"), Category::Social, &set);

        r.reset([TabId(5), TabId(6)]);

        assert!(r.state().is_empty());
        assert!(!r.is_live(TabId(1)));
        assert!(r.is_live(TabId(5)));
    }
}
