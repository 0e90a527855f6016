// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The option pipeline: load, coerce, cache, apply and persist.
//!
//! [`OptionStore`] owns one backend for its whole life, the cache, the
//! effect registry and the notice queue. Backend failures never escape:
//! they are logged, queued as notices, and the operation carries on with
//! what it has.

use crate::backend::{BackendKind, OptionBackend};
use crate::cache::OptionCache;
use crate::codec::{decode, encode_record, OptionMap, OptionValue, WireRecord, WireValue};
use crate::defaults;
use crate::effect::{EffectCx, EffectKey, EffectRegistry, Followup};
use crate::notice::{NoticeKind, NoticeQueue};
use crate::storage::StoreError;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Upper bound on follow-up steps drained per dispatch.
pub const MAX_FOLLOWUP_STEPS: usize = 64;

/// Option pipeline over a single persistence backend.
pub struct OptionStore {
    backend: Box<dyn OptionBackend>,
    registry: EffectRegistry,
    defaults: OptionMap,
    cache: OptionCache,
    notices: NoticeQueue,
}

impl OptionStore {
    /// Build a pipeline with the built-in default table.
    pub fn new(backend: Box<dyn OptionBackend>, registry: EffectRegistry) -> Self {
        Self {
            backend,
            registry,
            defaults: defaults::builtin(),
            cache: OptionCache::new(),
            notices: NoticeQueue::default(),
        }
    }

    /// Replace the default table used for backfill.
    #[must_use]
    pub fn with_defaults(mut self, defaults: OptionMap) -> Self {
        self.defaults = defaults;
        self
    }

    /// Which backend variant this pipeline was built with.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Read-only view of the cache.
    pub fn cache(&self) -> &OptionCache {
        &self.cache
    }

    /// Registered handlers.
    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    /// Pending notices, for the presentation layer to drain.
    pub fn notices_mut(&mut self) -> &mut NoticeQueue {
        &mut self.notices
    }

    /// Read the persisted record, dispatch every entry, backfill defaults
    /// and install the result as the cache.
    ///
    /// Entries are dispatched in record order. A handler sees the entries
    /// decoded so far; follow-ups it queues run once the cache is installed,
    /// and [`Followup::Reapply`] steps read their value from that cache.
    pub fn load(&mut self) -> &OptionMap {
        let record = match self.backend.get_all() {
            Ok(record) => record,
            Err(err) => {
                self.contain("load", &err);
                WireRecord::new()
            }
        };
        debug!(
            backend = self.backend.kind().label(),
            entries = record.len(),
            "loading options"
        );

        let mut building = OptionCache::new();
        building.install(OptionMap::new());
        let mut deferred = VecDeque::new();
        for (name, raw) in &record {
            let value = decode(raw);
            building.insert(name.clone(), value.clone());
            dispatch(
                &mut self.registry,
                &building,
                &mut self.notices,
                name,
                &value,
                &mut deferred,
            );
        }

        let filled = defaults::backfill(building.entries_mut(), &self.defaults);
        if !filled.is_empty() {
            debug!(?filled, "backfilled defaults");
        }
        self.cache = building;
        self.drain(deferred);
        self.cache.entries_mut()
    }

    /// Logical value from the cache; `None` before load, when absent, or
    /// when stored as `null`.
    pub fn get(&self, name: &str) -> Option<OptionValue> {
        self.cache.get(name)
    }

    /// Persisted value straight from the backend, without decoding.
    pub fn get_raw(&mut self, name: &str) -> Option<WireValue> {
        match self.backend.get_one(name) {
            Ok(value) => value,
            Err(err) => {
                self.contain("read", &err);
                None
            }
        }
    }

    /// Store a value in the cache and persist the whole cache.
    pub fn save(&mut self, name: &str, value: OptionValue) {
        self.ensure_loaded();
        self.cache.insert(name, value);
        self.persist_cache();
    }

    /// Persist `partial` as-is when it is non-empty, leaving the cache
    /// untouched; otherwise persist the full cache.
    pub fn save_all(&mut self, partial: Option<&OptionMap>) {
        match partial.filter(|map| !map.is_empty()) {
            Some(map) => {
                let record = encode_record(map, self.backend.encoding());
                self.write(record);
            }
            None => {
                self.ensure_loaded();
                self.persist_cache();
            }
        }
    }

    /// Dispatch `value` to the handler registered for `name`. Unknown or
    /// unregistered names are ignored.
    pub fn run(&mut self, name: &str, value: &OptionValue) {
        let mut queue = VecDeque::new();
        dispatch(
            &mut self.registry,
            &self.cache,
            &mut self.notices,
            name,
            value,
            &mut queue,
        );
        self.drain(queue);
    }

    /// [`OptionStore::save`], then [`OptionStore::run`].
    pub fn run_and_save(&mut self, name: &str, value: OptionValue) {
        self.save(name, value.clone());
        self.run(name, &value);
    }

    /// Drop a name from the cache and persist the remainder.
    pub fn remove(&mut self, name: &str) {
        self.ensure_loaded();
        if self.cache.remove(name).is_none() {
            debug!(option = name, "remove of absent option");
        }
        self.persist_cache();
    }

    /// Let every handler drain its standing subscriptions.
    pub fn poll_effects(&mut self) {
        let mut queue = VecDeque::new();
        for effect in self.registry.iter_mut() {
            let mut cx = EffectCx::new(&self.cache, &mut self.notices, &mut queue);
            effect.poll(&mut cx);
        }
        self.drain(queue);
    }

    fn ensure_loaded(&mut self) {
        if !self.cache.is_loaded() {
            self.load();
        }
    }

    fn persist_cache(&mut self) {
        let encoding = self.backend.encoding();
        let record = self
            .cache
            .entries()
            .map(|entries| encode_record(entries, encoding))
            .unwrap_or_default();
        self.write(record);
    }

    fn write(&mut self, record: WireRecord) {
        if let Err(err) = self.backend.save_all(record) {
            self.contain("save", &err);
        }
    }

    fn contain(&mut self, op: &'static str, err: &StoreError) {
        warn!(
            op,
            backend = self.backend.kind().label(),
            error = %err,
            "option backend failed"
        );
        self.notices.push(
            NoticeKind::Warn,
            format!("Options could not {op}"),
            Some(err.to_string()),
        );
    }

    fn drain(&mut self, mut queue: VecDeque<Followup>) {
        let mut steps = 0;
        while let Some(step) = queue.pop_front() {
            if steps == MAX_FOLLOWUP_STEPS {
                warn!(
                    dropped = queue.len() + 1,
                    "follow-up limit reached; dropping the rest"
                );
                return;
            }
            steps += 1;
            match step {
                Followup::Run { name, value } => dispatch(
                    &mut self.registry,
                    &self.cache,
                    &mut self.notices,
                    &name,
                    &value,
                    &mut queue,
                ),
                Followup::Save { name, value } => self.save(&name, value),
                Followup::RunAndSave { name, value } => {
                    self.save(&name, value.clone());
                    dispatch(
                        &mut self.registry,
                        &self.cache,
                        &mut self.notices,
                        &name,
                        &value,
                        &mut queue,
                    );
                }
                Followup::Reapply { name } => {
                    let value = self.cache.get(&name).unwrap_or(Value::Null);
                    dispatch(
                        &mut self.registry,
                        &self.cache,
                        &mut self.notices,
                        &name,
                        &value,
                        &mut queue,
                    );
                }
            }
        }
    }
}

fn dispatch(
    registry: &mut EffectRegistry,
    options: &OptionCache,
    notices: &mut NoticeQueue,
    name: &str,
    value: &OptionValue,
    followups: &mut VecDeque<Followup>,
) {
    let Some(effect) = EffectKey::from_name(name).and_then(|key| registry.get_mut(key)) else {
        return;
    };
    debug!(option = name, %value, "applying option");
    let mut cx = EffectCx::new(options, notices, followups);
    effect.apply(value, &mut cx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireEncoding;
    use crate::effect::Effect;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Shared {
        record: WireRecord,
        saves: Vec<WireRecord>,
        fail: bool,
    }

    struct FakeBackend(Rc<RefCell<Shared>>);

    impl OptionBackend for FakeBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::LocalStore
        }

        fn encoding(&self) -> WireEncoding {
            WireEncoding::Escaped
        }

        fn get_all(&mut self) -> Result<WireRecord, StoreError> {
            let shared = self.0.borrow();
            if shared.fail {
                return Err(StoreError::Other("offline".into()));
            }
            Ok(shared.record.clone())
        }

        fn get_one(&mut self, name: &str) -> Result<Option<WireValue>, StoreError> {
            Ok(self.0.borrow().record.get(name).cloned())
        }

        fn save_all(&mut self, record: WireRecord) -> Result<(), StoreError> {
            let mut shared = self.0.borrow_mut();
            shared.record = record.clone();
            shared.saves.push(record);
            Ok(())
        }
    }

    struct Counter {
        key: EffectKey,
        calls: Rc<RefCell<Vec<OptionValue>>>,
    }

    impl Effect for Counter {
        fn key(&self) -> EffectKey {
            self.key
        }

        fn apply(&mut self, value: &OptionValue, _cx: &mut EffectCx<'_>) {
            self.calls.borrow_mut().push(value.clone());
        }
    }

    /// Re-queues itself forever.
    struct Looper;

    impl Effect for Looper {
        fn key(&self) -> EffectKey {
            EffectKey::MsgType
        }

        fn apply(&mut self, value: &OptionValue, cx: &mut EffectCx<'_>) {
            cx.run("msg_type", value.clone());
        }
    }

    fn store_with(record: &[(&str, &str)], registry: EffectRegistry) -> (OptionStore, Rc<RefCell<Shared>>) {
        let shared = Rc::new(RefCell::new(Shared {
            record: record
                .iter()
                .map(|(k, v)| ((*k).to_owned(), WireValue::from(*v)))
                .collect(),
            ..Shared::default()
        }));
        let store = OptionStore::new(Box::new(FakeBackend(Rc::clone(&shared))), registry);
        (store, shared)
    }

    #[test]
    fn load_decodes_backfills_and_dispatches_once() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let registry = EffectRegistry::new().with(Counter {
            key: EffectKey::OptDark,
            calls: Rc::clone(&calls),
        });
        let (mut store, _) = store_with(&[("opt_dark", "true"), ("n", "5")], registry);

        let loaded = store.load().clone();
        assert_eq!(loaded["opt_dark"], json!(true));
        assert_eq!(loaded["n"], json!(5));
        assert_eq!(loaded["language"], json!("zh-CN"));
        assert_eq!(*calls.borrow(), vec![json!(true)]);
        assert_eq!(store.get("store_face"), Some(json!([])));
    }

    #[test]
    fn defaults_are_not_dispatched() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let registry = EffectRegistry::new().with(Counter {
            key: EffectKey::Language,
            calls: Rc::clone(&calls),
        });
        let (mut store, _) = store_with(&[], registry);
        store.load();
        assert!(calls.borrow().is_empty());
        assert_eq!(store.get("language"), Some(json!("zh-CN")));
    }

    #[test]
    fn save_before_load_keeps_unseen_keys() {
        let (mut store, shared) = store_with(&[("chat_background_blur", "4")], EffectRegistry::new());
        store.save("opt_dark", json!(true));
        let record = shared.borrow().record.clone();
        assert_eq!(record["chat_background_blur"], WireValue::from("4"));
        assert_eq!(record["opt_dark"], WireValue::from("true"));
    }

    #[test]
    fn partial_save_all_bypasses_cache() {
        let (mut store, shared) = store_with(&[], EffectRegistry::new());
        store.load();
        let mut partial = OptionMap::new();
        partial.insert("only".into(), json!("x y"));
        store.save_all(Some(&partial));

        assert_eq!(shared.borrow().record.len(), 1);
        assert_eq!(shared.borrow().record["only"], WireValue::from("x%20y"));
        assert_eq!(store.get("only"), None);

        store.save_all(Some(&OptionMap::new()));
        assert_eq!(shared.borrow().record.len(), store.cache().len());
    }

    #[test]
    fn remove_persists_remainder() {
        let (mut store, shared) = store_with(&[("a", "1")], EffectRegistry::new());
        store.load();
        store.remove("a");
        assert_eq!(store.get("a"), None);
        assert!(!shared.borrow().record.contains_key("a"));
        assert_eq!(shared.borrow().record.len(), 11);
    }

    #[test]
    fn run_ignores_unknown_and_unregistered_names() {
        let (mut store, shared) = store_with(&[], EffectRegistry::new());
        store.run("log_level", &json!("debug"));
        store.run("opt_dark", &json!(true));
        assert!(shared.borrow().saves.is_empty());
        assert!(store.notices_mut().is_empty());
    }

    #[test]
    fn run_and_save_persists_then_applies() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let registry = EffectRegistry::new().with(Counter {
            key: EffectKey::ThemeColor,
            calls: Rc::clone(&calls),
        });
        let (mut store, shared) = store_with(&[], registry);
        store.run_and_save("theme_color", json!(3));
        assert_eq!(shared.borrow().record["theme_color"], WireValue::from("3"));
        assert_eq!(*calls.borrow(), vec![json!(3)]);
    }

    #[test]
    fn backend_failure_is_contained() {
        let (mut store, shared) = store_with(&[], EffectRegistry::new());
        shared.borrow_mut().fail = true;
        let loaded = store.load().clone();
        assert_eq!(loaded.len(), 11);
        let notices = store.notices_mut().drain(8);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Warn);
    }

    #[test]
    fn followup_chain_is_bounded() {
        let (mut store, _) = store_with(&[], EffectRegistry::new().with(Looper));
        store.run("msg_type", &json!(1));
        assert!(store.cache().get("msg_type").is_none());
    }

    #[test]
    fn get_raw_bypasses_cache() {
        let (mut store, _) = store_with(&[("language", "en-US")], EffectRegistry::new());
        assert_eq!(store.get_raw("language"), Some(WireValue::from("en-US")));
        assert_eq!(store.get_raw("missing"), None);
        assert_eq!(store.get("language"), None::<Value>);
    }
}
