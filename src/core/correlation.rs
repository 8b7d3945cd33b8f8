//! Correlation identifiers and the stack of active correlation contexts
//!
//! A `CorrelationManager` is a cheap, cloneable handle to one stack. Each
//! thread owns an ambient manager (see [`CorrelationManager::current_thread`]);
//! a logger may instead be pinned to one explicit manager that every thread
//! shares. Either way the stack is only ever reached through a handle, never a
//! bare global.

use super::error::{LoggerError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Maximum length of a correlation id prefix
pub const MAX_PREFIX_LENGTH: usize = 32;

thread_local! {
    static THREAD_MANAGER: CorrelationManager = CorrelationManager::new();
}

/// Validated human-readable prefix for correlation ids
///
/// Prefixes are 1 to 32 characters from `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationPrefix(String);

impl CorrelationPrefix {
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(LoggerError::invalid_prefix(prefix, "prefix is empty"));
        }
        if prefix.chars().count() > MAX_PREFIX_LENGTH {
            return Err(LoggerError::invalid_prefix(
                prefix,
                format!("longer than {} characters", MAX_PREFIX_LENGTH),
            ));
        }
        if let Some(bad) = prefix
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            let reason = format!("character {:?} is not alphanumeric, '-' or '_'", bad);
            return Err(LoggerError::invalid_prefix(prefix, reason));
        }
        Ok(Self(prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a fresh correlation id, optionally prefixed
#[must_use]
pub fn generate_correlation_id(prefix: Option<&CorrelationPrefix>) -> String {
    let id = Uuid::new_v4().to_string();
    match prefix {
        Some(p) => format!("{}-{}", p, id),
        None => id,
    }
}

fn current_thread_label() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

/// One link in the correlation chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    pub correlation_id: String,
    pub parent_correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub thread: String,
    /// Name of the scope that pushed this context, if any
    pub scope_name: Option<String>,
}

impl CorrelationContext {
    pub fn new(correlation_id: impl Into<String>, parent_correlation_id: Option<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            parent_correlation_id,
            created_at: Utc::now(),
            thread: current_thread_label(),
            scope_name: None,
        }
    }

    #[must_use]
    pub fn with_scope_name(mut self, name: impl Into<String>) -> Self {
        self.scope_name = Some(name.into());
        self
    }
}

/// How much of the stack `clear` removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearMode {
    /// Pop the current context and restore its parent
    #[default]
    Scope,
    /// Empty the stack
    All,
}

/// Handle to a stack of correlation contexts
///
/// Push, pop and clear happen under a write lock; reads of the current
/// context take the read lock only. None of the operations fail.
#[derive(Debug, Clone, Default)]
pub struct CorrelationManager {
    stack: Arc<RwLock<Vec<CorrelationContext>>>,
}

impl CorrelationManager {
    /// Create a new, empty stack
    ///
    /// Share the returned handle between threads to get process-wide
    /// correlation instead of per-thread stacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// The ambient manager of the calling thread
    pub fn current_thread() -> Self {
        THREAD_MANAGER.with(Clone::clone)
    }

    /// Create a new correlation context without touching the stack
    pub fn new_correlation(
        &self,
        parent_id: Option<&str>,
        prefix: Option<&CorrelationPrefix>,
    ) -> CorrelationContext {
        CorrelationContext::new(
            generate_correlation_id(prefix),
            parent_id.map(str::to_string),
        )
    }

    /// Create a new correlation context and make it current
    pub fn new_current_correlation(
        &self,
        parent_id: Option<&str>,
        prefix: Option<&CorrelationPrefix>,
    ) -> CorrelationContext {
        let context = self.new_correlation(parent_id, prefix);
        self.push(context.clone());
        context
    }

    /// Push a context as the new current entry
    pub fn push(&self, context: CorrelationContext) {
        self.stack.write().push(context);
    }

    /// Id of the current context
    pub fn current(&self) -> Option<String> {
        self.stack.read().last().map(|c| c.correlation_id.clone())
    }

    /// Snapshot of the current context
    pub fn current_context(&self) -> Option<CorrelationContext> {
        self.stack.read().last().cloned()
    }

    /// Current id, creating and pushing a root correlation when none exists
    pub fn current_or_create(&self) -> String {
        let mut stack = self.stack.write();
        if let Some(top) = stack.last() {
            return top.correlation_id.clone();
        }
        let context = self.new_correlation(None, None);
        let id = context.correlation_id.clone();
        stack.push(context);
        id
    }

    /// Remove the current context (`Scope`) or every context (`All`)
    pub fn clear(&self, mode: ClearMode) {
        let mut stack = self.stack.write();
        match mode {
            ClearMode::Scope if stack.len() > 1 => {
                stack.pop();
            }
            _ => stack.clear(),
        }
    }

    /// Remove the context with `correlation_id`, searching from the top
    ///
    /// Returns `false` when no such context is on the stack.
    pub(crate) fn remove(&self, correlation_id: &str) -> bool {
        let mut stack = self.stack.write();
        match stack
            .iter()
            .rposition(|c| c.correlation_id == correlation_id)
        {
            Some(idx) => {
                stack.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.read().is_empty()
    }

    /// Whether two handles refer to the same stack
    pub fn same_stack(&self, other: &CorrelationManager) -> bool {
        Arc::ptr_eq(&self.stack, &other.stack)
    }
}
