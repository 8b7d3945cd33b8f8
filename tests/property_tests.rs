//! Property-based tests for fleet_log using proptest

use fleet_log::prelude::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Verbose),
        Just(LogLevel::Debug),
        Just(LogLevel::Information),
        Just(LogLevel::Warning),
        Just(LogLevel::Error),
        Just(LogLevel::Critical),
    ]
}

/// Non-blank messages including characters that need escaping
fn message() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9 \\n\\r\\t\"\\\\{}:,é]{0,80}"
}

/// Scalars, lists and nested maps, at most three levels deep
fn field_value() -> impl Strategy<Value = FieldValue> {
    let leaf = prop_oneof![
        "[a-zA-Z0-9 ]{0,16}".prop_map(FieldValue::String),
        any::<i64>().prop_map(FieldValue::Int),
        (-1.0e9f64..1.0e9f64).prop_map(FieldValue::Float),
        any::<bool>().prop_map(FieldValue::Bool),
        Just(FieldValue::Null),
    ];

    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(FieldValue::List),
            prop::collection::vec(("[a-z][a-zA-Z0-9]{0,8}", inner), 0..4)
                .prop_map(|pairs| FieldValue::Map(pairs.into_iter().collect::<LogContext>())),
        ]
    })
}

fn context() -> impl Strategy<Value = LogContext> {
    prop::collection::vec(("[a-z][a-zA-Z0-9]{0,10}", field_value()), 0..6)
        .prop_map(|pairs| pairs.into_iter().collect::<LogContext>())
}

#[derive(Clone, Default)]
struct CountingSink(Arc<Mutex<usize>>);

impl Sink for CountingSink {
    fn emit(&mut self, _entry: &LogEntry) -> fleet_log::Result<()> {
        *self.0.lock() += 1;
        Ok(())
    }

    fn flush(&mut self) -> fleet_log::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// Level names and their upper-case forms parse back to the same level
    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        prop_assert_eq!(level.as_str().parse::<LogLevel>().unwrap(), level);
        prop_assert_eq!(level.to_upper().parse::<LogLevel>().unwrap(), level);
        prop_assert_eq!(level.as_str().to_lowercase().parse::<LogLevel>().unwrap(), level);
    }

    /// Ordering follows the ordinal
    #[test]
    fn test_log_level_ordering(a in any_level(), b in any_level()) {
        prop_assert_eq!(a <= b, a.ordinal() <= b.ordinal());
        prop_assert_eq!(a < b, a.ordinal() < b.ordinal());
        prop_assert_eq!(a.is_severe(), a >= LogLevel::Error);
    }
}

// ============================================================================
// Structured Form Tests
// ============================================================================

proptest! {
    /// The structured line parses back into an equal entry
    #[test]
    fn test_structured_round_trip(
        level in any_level(),
        msg in message(),
        ctx in context(),
        correlation in proptest::option::of("[a-f0-9]{8}-[a-f0-9]{4}"),
        duration_us in proptest::option::of(0u64..10_000_000),
    ) {
        let mut entry = LogEntry::new(level, msg).unwrap().with_context(ctx);
        if let Some(id) = correlation {
            entry = entry.with_correlation_id(id);
        }
        if let Some(us) = duration_us {
            entry = entry.with_duration(Duration::from_micros(us));
        }

        let line = entry.serialize_structured().unwrap();
        prop_assert!(!line.contains('\n'));

        let parsed = LogEntry::deserialize(&line).unwrap();
        prop_assert_eq!(parsed.timestamp(), entry.timestamp());
        prop_assert_eq!(parsed.level(), entry.level());
        prop_assert_eq!(parsed.message(), entry.message());
        prop_assert_eq!(parsed.correlation_id(), entry.correlation_id());
        prop_assert_eq!(parsed.context(), entry.context());
        prop_assert_eq!(parsed.metadata(), entry.metadata());
        match (parsed.duration_ms(), entry.duration_ms()) {
            (Some(a), Some(b)) => prop_assert!((a - b).abs() <= 0.01),
            (None, None) => {}
            other => prop_assert!(false, "duration mismatch: {:?}", other),
        }
    }

    /// The console form is always a single line
    #[test]
    fn test_console_form_single_line(level in any_level(), msg in message(), ctx in context()) {
        let entry = LogEntry::new(level, msg).unwrap().with_context(ctx);
        let line = entry.serialize_console();

        prop_assert!(!line.contains('\n'));
        prop_assert!(!line.contains('\r'));
        prop_assert!(line.contains(level.to_upper()));
    }

    /// Garbage input never panics and is reported as a format error
    #[test]
    fn test_deserialize_rejects_garbage(text in "[^{]{0,40}") {
        prop_assert!(matches!(
            LogEntry::deserialize(&text),
            Err(LoggerError::InvalidFormat(_))
        ));
    }
}

// ============================================================================
// Pipeline Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Entries below the minimum never reach a sink; the rest always do
    #[test]
    fn test_level_filter(min in any_level(), level in any_level(), msg in message()) {
        let sink = CountingSink::default();
        let logger = Logger::builder()
            .min_level(min)
            .sink(sink.clone())
            .correlation_manager(CorrelationManager::new())
            .build();

        let entry = logger.write(msg, WriteOptions::new().with_level(level).with_pass_thru(true));

        let delivered = *sink.0.lock();
        if level < min {
            prop_assert!(entry.is_none());
            prop_assert_eq!(delivered, 0);
            prop_assert_eq!(logger.metrics().total_logged(), 0);
        } else {
            prop_assert!(entry.is_some());
            prop_assert_eq!(delivered, 1);
        }
    }

    /// Any nesting depth unwinds back to an empty stack
    #[test]
    fn test_scope_nesting_unwinds(depth in 1usize..8) {
        let manager = CorrelationManager::new();
        let logger = Logger::builder().correlation_manager(manager.clone()).build();

        let mut scopes: Vec<LogScope> = Vec::new();
        for i in 0..depth {
            let scope = logger.start_scope(format!("Level{}", i), ScopeOptions::new()).unwrap();
            if let Some(parent) = scopes.last() {
                prop_assert_eq!(scope.parent_correlation_id(), Some(parent.correlation_id()));
            }
            scopes.push(scope);
        }
        prop_assert_eq!(manager.depth(), depth);

        while let Some(scope) = scopes.pop() {
            scope.dispose();
            let current = manager.current();
            prop_assert_eq!(current.as_deref(), scopes.last().map(|s| s.correlation_id()));
        }
        prop_assert!(manager.is_empty());
    }

    /// Prefix validation accepts exactly the documented alphabet and length
    #[test]
    fn test_prefix_validation(prefix in "[a-zA-Z0-9_\\-]{1,32}", bad in "[a-zA-Z0-9]{0,4}[ .#/][a-z]{0,4}") {
        prop_assert!(CorrelationPrefix::new(prefix.clone()).is_ok());
        let id = fleet_log::generate_correlation_id(Some(&CorrelationPrefix::new(prefix.clone()).unwrap()));
        let expected_prefix = format!("{}-", prefix);
        prop_assert!(id.starts_with(&expected_prefix));
        prop_assert!(CorrelationPrefix::new(bad).is_err());
    }
}
