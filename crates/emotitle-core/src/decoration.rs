use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::error::EmotitleError;
use crate::topology::{Diff, EntityKey};

pub const DELIMITER: &str = " | ";
pub const PIN_MARKER: char = '\u{1F4CC}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub pinned: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Segment {
    fn pinned(text: String) -> Self {
        Self {
            text,
            pinned: true,
            expires_at: None,
        }
    }

    fn temporary(text: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            text,
            pinned: false,
            expires_at: Some(expires_at),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSegment {
    pub text: String,
    pub pinned: bool,
}

/// Splits an `emojis` argument into segments. Text is kept verbatim apart
/// from surrounding whitespace, pin marker included.
pub fn parse_segments(raw: &str) -> Result<Vec<ParsedSegment>, EmotitleError> {
    if raw.trim().is_empty() {
        return Err(EmotitleError::EmptyEmojis);
    }

    raw.split(DELIMITER)
        .enumerate()
        .map(|(position, part)| {
            let text = part.trim();
            if text.is_empty() || text.starts_with('|') || text.ends_with('|') {
                return Err(EmotitleError::MalformedEmojis { position });
            }
            Ok(ParsedSegment {
                text: text.to_string(),
                pinned: text.starts_with(PIN_MARKER),
            })
        })
        .collect()
}

pub fn compose_title<'a>(base_name: &str, segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut title = base_name.to_string();
    for segment in segments {
        title.push_str(DELIMITER);
        title.push_str(segment);
    }
    title
}

/// Pinned segments render before temporary ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationState {
    pinned: Vec<Segment>,
    temporary: Vec<Segment>,
}

impl DecorationState {
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.pinned.iter().chain(self.temporary.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty() && self.temporary.is_empty()
    }

    pub fn has_temporary(&self) -> bool {
        !self.temporary.is_empty()
    }

    // Every temporary removal funnels through here so that eviction by blur,
    // by timer and by replacement stay idempotent with each other.
    fn evict(&mut self, mut doomed: impl FnMut(&Segment) -> bool) -> bool {
        let before = self.temporary.len();
        self.temporary.retain(|segment| !doomed(segment));
        before != self.temporary.len()
    }
}

#[derive(Debug, Default)]
pub struct DecorationStore {
    states: HashMap<EntityKey, DecorationState>,
}

impl DecorationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entity's temporary segments and appends any new pinned
    /// ones. Nothing changes when `raw` does not parse.
    pub fn set(
        &mut self,
        key: EntityKey,
        raw: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), EmotitleError> {
        let parsed = parse_segments(raw)?;
        let expires_at = now + ttl;

        let state = self.states.entry(key).or_default();
        state.evict(|_| true);
        for segment in parsed {
            if segment.pinned {
                if !state.pinned.iter().any(|pinned| pinned.text == segment.text) {
                    state.pinned.push(Segment::pinned(segment.text));
                }
            } else {
                state
                    .temporary
                    .push(Segment::temporary(segment.text, expires_at));
            }
        }
        Ok(())
    }

    /// Losing focus drops every temporary segment; gaining focus is a no-op.
    pub fn on_focus_changed(&mut self, key: EntityKey, gained_focus: bool) -> bool {
        if gained_focus {
            return false;
        }
        self.evict(key, |_| true)
    }

    /// Removes temporary segments whose expiry has passed and returns the
    /// entities whose rendering changed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<EntityKey> {
        let mut changed: Vec<EntityKey> = self
            .states
            .iter_mut()
            .filter_map(|(key, state)| {
                state
                    .evict(|segment| segment.is_expired(now))
                    .then_some(*key)
            })
            .collect();
        self.states.retain(|_, state| !state.is_empty());
        changed.sort();
        changed
    }

    pub fn reconcile(&mut self, diff: &Diff) -> Vec<EntityKey> {
        diff.removed_entities()
            .into_iter()
            .filter(|key| self.remove(*key))
            .collect()
    }

    pub fn remove(&mut self, key: EntityKey) -> bool {
        let removed = self.states.remove(&key).is_some();
        if removed {
            debug!(event = "decoration_dropped", entity = ?key);
        }
        removed
    }

    fn evict(&mut self, key: EntityKey, doomed: impl FnMut(&Segment) -> bool) -> bool {
        let Some(state) = self.states.get_mut(&key) else {
            return false;
        };
        let changed = state.evict(doomed);
        if state.is_empty() {
            self.states.remove(&key);
        }
        changed
    }

    pub fn compose(&self, key: EntityKey, base_name: &str) -> String {
        match self.states.get(&key) {
            Some(state) => compose_title(base_name, state.segments().map(|s| s.text.as_str())),
            None => base_name.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self, key: EntityKey) -> Option<&DecorationState> {
        self.states.get(&key)
    }

    pub fn is_decorated(&self, key: EntityKey) -> bool {
        self.states.contains_key(&key)
    }

    pub fn has_temporary(&self) -> bool {
        self.states.values().any(DecorationState::has_temporary)
    }

    #[cfg(test)]
    pub(crate) fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.states
            .values()
            .flat_map(|state| state.temporary.iter())
            .filter_map(|segment| segment.expires_at)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{PaneKey, TabKey};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn ttl() -> Duration {
        Duration::milliseconds(1_000)
    }

    fn pane(raw: u64) -> EntityKey {
        EntityKey::Pane(PaneKey::new(raw))
    }

    #[test]
    fn parse_detects_pin_marker_per_segment() {
        let parsed = parse_segments("📌🚀 | 📚 |  🚗 ").expect("parse");
        assert_eq!(
            parsed,
            vec![
                ParsedSegment {
                    text: "📌🚀".to_string(),
                    pinned: true
                },
                ParsedSegment {
                    text: "📚".to_string(),
                    pinned: false
                },
                ParsedSegment {
                    text: "🚗".to_string(),
                    pinned: false
                },
            ]
        );
    }

    #[test]
    fn parse_rejects_empty_and_dangling_segments() {
        assert_eq!(parse_segments("   "), Err(EmotitleError::EmptyEmojis));
        assert_eq!(
            parse_segments("📚 |  | 🚗"),
            Err(EmotitleError::MalformedEmojis { position: 1 })
        );
        assert!(parse_segments("🚀 | ").is_err());
        assert_eq!(
            parse_segments("🚀 |"),
            Err(EmotitleError::MalformedEmojis { position: 0 })
        );
        assert_eq!(
            parse_segments("| 🚀"),
            Err(EmotitleError::MalformedEmojis { position: 0 })
        );
        assert_eq!(
            parse_segments("📚 | | 🚗"),
            Err(EmotitleError::MalformedEmojis { position: 1 })
        );
    }

    #[test]
    fn pin_marker_only_counts_as_prefix() {
        let parsed = parse_segments("🚀📌 | 📌✅").expect("parse");
        assert!(!parsed[0].pinned);
        assert!(parsed[1].pinned);

        let mut store = DecorationStore::new();
        store.set(pane(2), "🚀📌", t0(), ttl()).expect("set");
        assert!(store.has_temporary());
        assert_eq!(store.expire(t0() + ttl()), vec![pane(2)]);
        assert_eq!(store.compose(pane(2), "zsh"), "zsh");
    }

    #[test]
    fn failed_set_leaves_state_untouched() {
        let mut store = DecorationStore::new();
        store.set(pane(1), "📌🚀 | 📚", t0(), ttl()).expect("set");
        let before = store.state(pane(1)).cloned();
        assert!(store.set(pane(1), "✅ |  | ❌", t0(), ttl()).is_err());
        assert_eq!(store.state(pane(1)).cloned(), before);
    }

    #[test]
    fn set_replaces_temporary_and_accumulates_pinned() {
        let mut store = DecorationStore::new();
        store.set(pane(1), "📚 | 📌🚀", t0(), ttl()).expect("set");
        store.set(pane(1), "📌🎉 | 🚗", t0(), ttl()).expect("set");
        store.set(pane(1), "📌🚀 | ✅", t0(), ttl()).expect("set");
        assert_eq!(store.compose(pane(1), "zsh"), "zsh | 📌🚀 | 📌🎉 | ✅");
    }

    #[test]
    fn blur_evicts_only_temporary_segments() {
        let mut store = DecorationStore::new();
        store.set(pane(1), "📌🚀 | 📚 | 🚗", t0(), ttl()).expect("set");
        assert!(!store.on_focus_changed(pane(1), true));
        assert!(store.on_focus_changed(pane(1), false));
        assert!(!store.on_focus_changed(pane(1), false));
        assert_eq!(store.compose(pane(1), "zsh"), "zsh | 📌🚀");
    }

    #[test]
    fn focus_change_for_removed_entity_is_ignored() {
        let mut store = DecorationStore::new();
        store.set(pane(3), "📌🚀 | 📚", t0(), ttl()).expect("set");
        assert!(store.remove(pane(3)));

        assert!(!store.on_focus_changed(pane(3), false));
        assert!(!store.on_focus_changed(pane(3), true));
        assert!(!store.is_decorated(pane(3)));
        assert!(store.expire(t0() + ttl()).is_empty());
        assert_eq!(store.compose(pane(3), "zsh"), "zsh");
    }

    #[test]
    fn expire_honours_latest_set_only() {
        let mut store = DecorationStore::new();
        let tab = EntityKey::Tab(TabKey::new(0));
        store.set(tab, "📚", t0(), ttl()).expect("set");
        let later = t0() + Duration::milliseconds(600);
        store.set(tab, "🚗", later, ttl()).expect("set");

        assert!(store.expire(t0() + Duration::milliseconds(1_000)).is_empty());
        assert_eq!(store.compose(tab, "build"), "build | 🚗");
        assert_eq!(store.next_expiry(), Some(later + ttl()));

        assert_eq!(store.expire(later + ttl()), vec![tab]);
        assert_eq!(store.compose(tab, "build"), "build");
        assert!(!store.is_decorated(tab));
        assert!(!store.has_temporary());
    }

    #[test]
    fn undecorated_entity_renders_base_name() {
        let store = DecorationStore::new();
        assert_eq!(store.compose(pane(4), "vim"), "vim");
        assert_eq!(compose_title("vim", ["a", "b"]), "vim | a | b");
    }
}
