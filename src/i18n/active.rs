//! The language in effect right now.
//!
//! The active language is thread-scoped: `activate` affects only the calling
//! thread. Code that runs requests on a multi-threaded executor can supply its
//! own [`CurrentLanguage`] implementation instead.

use crate::i18n::LanguageRegistry;
use std::cell::RefCell;

thread_local! {
    static ACTIVE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Source of the current language. `None` means no language is active and
/// callers fall back to the source language.
pub trait CurrentLanguage: Send + Sync {
    fn current_language(&self) -> Option<String>;
}

/// Make `code` the active language for the current thread.
pub fn activate(code: &str) {
    ACTIVE.with(|active| *active.borrow_mut() = Some(code.to_string()));
}

/// Clear the active language for the current thread.
pub fn deactivate() {
    ACTIVE.with(|active| *active.borrow_mut() = None);
}

/// Get the active language for the current thread, if any.
pub fn active_language() -> Option<String> {
    ACTIVE.with(|active| active.borrow().clone())
}

/// Get the active language, or the registry's source language if none is active.
pub fn get_language(registry: &LanguageRegistry) -> String {
    active_language().unwrap_or_else(|| registry.source().code.clone())
}

/// [`CurrentLanguage`] backed by the thread-local active language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLanguage;

impl CurrentLanguage for ThreadLanguage {
    fn current_language(&self) -> Option<String> {
        active_language()
    }
}

/// [`CurrentLanguage`] that always reports the same language.
#[derive(Debug, Clone)]
pub struct FixedLanguage(pub String);

impl CurrentLanguage for FixedLanguage {
    fn current_language(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
