// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Effect registry: maps option keys to the side-effecting handlers that
//! apply a value to the surrounding application.
//!
//! Handlers never call back into the pipeline directly. They read options
//! and queue [`Followup`]s through an [`EffectCx`]; the pipeline drains the
//! queue once the handler returns.

use crate::cache::OptionCache;
use crate::codec::OptionValue;
use crate::notice::{NoticeId, NoticeKind, NoticeQueue};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Option names that carry an apply handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectKey {
    /// UI language bundle.
    Language,
    /// Light/dark color mode.
    OptDark,
    /// Follow the environment color-scheme preference.
    OptAutoDark,
    /// Accent color id.
    ThemeColor,
    /// Alternate chat view component.
    ChatviewName,
    /// Mobile viewport scale.
    InitialScale,
    /// Numeric message-type tag.
    MsgType,
    /// Follow the host window color.
    OptAutoWinColor,
    /// Touch-revolve toggle.
    OptRevolve,
    /// Keep the host window above others.
    OptAlwaysTop,
}

impl EffectKey {
    /// Every key, in registry order.
    pub const ALL: [Self; 10] = [
        Self::Language,
        Self::OptDark,
        Self::OptAutoDark,
        Self::ThemeColor,
        Self::ChatviewName,
        Self::InitialScale,
        Self::MsgType,
        Self::OptAutoWinColor,
        Self::OptRevolve,
        Self::OptAlwaysTop,
    ];

    /// Option name this key is registered under.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Language => "language",
            Self::OptDark => "opt_dark",
            Self::OptAutoDark => "opt_auto_dark",
            Self::ThemeColor => "theme_color",
            Self::ChatviewName => "chatview_name",
            Self::InitialScale => "initial_scale",
            Self::MsgType => "msg_type",
            Self::OptAutoWinColor => "opt_auto_win_color",
            Self::OptRevolve => "opt_revolve",
            Self::OptAlwaysTop => "opt_always_top",
        }
    }

    /// Look up a key by option name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

impl fmt::Display for EffectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Work a handler asks the pipeline to do after it returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Followup {
    /// Dispatch a value without persisting it.
    Run {
        /// Option name.
        name: String,
        /// Value to apply.
        value: OptionValue,
    },
    /// Persist a value without dispatching it.
    Save {
        /// Option name.
        name: String,
        /// Value to store.
        value: OptionValue,
    },
    /// Persist, then dispatch.
    RunAndSave {
        /// Option name.
        name: String,
        /// Value to store and apply.
        value: OptionValue,
    },
    /// Dispatch whatever the cache holds for `name` when this step runs.
    Reapply {
        /// Option name.
        name: String,
    },
}

/// What a handler can see and do while it runs.
pub struct EffectCx<'a> {
    options: &'a OptionCache,
    notices: &'a mut NoticeQueue,
    followups: &'a mut VecDeque<Followup>,
}

impl<'a> EffectCx<'a> {
    /// Build a context over the pipeline's state.
    pub fn new(
        options: &'a OptionCache,
        notices: &'a mut NoticeQueue,
        followups: &'a mut VecDeque<Followup>,
    ) -> Self {
        Self {
            options,
            notices,
            followups,
        }
    }

    /// Current logical value of an option (see [`OptionCache::get`]).
    pub fn get(&self, name: &str) -> Option<OptionValue> {
        self.options.get(name)
    }

    /// Whether an option currently reads as truthy.
    pub fn is_truthy(&self, name: &str) -> bool {
        self.options.is_truthy(name)
    }

    /// Queue a user-visible notice.
    pub fn notify(
        &mut self,
        kind: NoticeKind,
        title: impl Into<String>,
        body: Option<String>,
    ) -> NoticeId {
        self.notices.push(kind, title, body)
    }

    /// Dispatch `value` under `name` after this handler returns.
    pub fn run(&mut self, name: impl Into<String>, value: OptionValue) {
        self.followups.push_back(Followup::Run {
            name: name.into(),
            value,
        });
    }

    /// Persist `value` under `name` after this handler returns.
    pub fn save(&mut self, name: impl Into<String>, value: OptionValue) {
        self.followups.push_back(Followup::Save {
            name: name.into(),
            value,
        });
    }

    /// Persist then dispatch `value` after this handler returns.
    pub fn run_and_save(&mut self, name: impl Into<String>, value: OptionValue) {
        self.followups.push_back(Followup::RunAndSave {
            name: name.into(),
            value,
        });
    }

    /// Re-dispatch the current value of `name` after this handler returns.
    ///
    /// The value is read when the step runs, so during load it sees the
    /// installed cache rather than the partially decoded record.
    pub fn reapply(&mut self, name: impl Into<String>) {
        self.followups.push_back(Followup::Reapply { name: name.into() });
    }
}

/// A side-effecting handler bound to one [`EffectKey`].
///
/// Handlers must be idempotent for a repeated value and must not panic;
/// missing collaborators are skipped.
pub trait Effect {
    /// Key this handler is registered under.
    fn key(&self) -> EffectKey;

    /// Apply a freshly loaded or changed value.
    fn apply(&mut self, value: &OptionValue, cx: &mut EffectCx<'_>);

    /// Drain standing subscriptions. Default: nothing to drain.
    fn poll(&mut self, _cx: &mut EffectCx<'_>) {}
}

/// Handlers keyed by option.
#[derive(Default)]
pub struct EffectRegistry {
    handlers: BTreeMap<EffectKey, Box<dyn Effect>>,
}

impl EffectRegistry {
    /// Empty registry; every `run` is a no-op until handlers are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, returning any handler it replaced.
    pub fn register(&mut self, effect: Box<dyn Effect>) -> Option<Box<dyn Effect>> {
        self.handlers.insert(effect.key(), effect)
    }

    /// Builder-style [`EffectRegistry::register`].
    #[must_use]
    pub fn with(mut self, effect: impl Effect + 'static) -> Self {
        self.register(Box::new(effect));
        self
    }

    /// Whether a handler exists for `key`.
    pub fn contains(&self, key: EffectKey) -> bool {
        self.handlers.contains_key(&key)
    }

    /// Handler for `key`, if registered.
    pub fn get_mut(&mut self, key: EffectKey) -> Option<&mut (dyn Effect + 'static)> {
        self.handlers.get_mut(&key).map(|effect| &mut **effect)
    }

    /// All handlers, in key order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Effect>> {
        self.handlers.values_mut()
    }

    /// Registered keys, in key order.
    pub fn keys(&self) -> impl Iterator<Item = EffectKey> + '_ {
        self.handlers.keys().copied()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}
