//! Binding of the active monitor to a unit of work.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn, Level};
use unblock_types::{current_timestamp_ms, BlockEvent, Microseconds, Report, StackFingerprint};

use crate::error::ScopeError;
use crate::handle::InstrumentedHandle;
use crate::monitor::{Access, Monitor, MonitorStats};
use crate::output::LOG_TARGET;
use crate::unblock::{Settings, Unblock};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// The context object a unit of work carries through its call chain.
///
/// A registry holds at most one active [`Monitor`]. Clones share the same
/// slot, so the registry can be handed to every handle, helper and future that
/// belongs to the unit of work. Different units of work use different
/// registries and never see each other's monitors.
///
/// # Example
///
/// ```rust
/// use unblock_sdk::{AsyncResult, Promise, Unblock};
///
/// let unblock = Unblock::new(Default::default());
/// let registry = unblock.registry();
///
/// let scope = registry.begin("/api/orders").unwrap();
/// let order = registry.instrument("datastore.Get", Promise::<u32>::ready(7));
/// assert_eq!(order.get(), Ok(7));
///
/// let report = scope.finish().unwrap();
/// assert_eq!(report.total_calls, 1);
/// assert_eq!(report.blocked_calls, 0);
/// ```
#[derive(Clone)]
pub struct ScopeRegistry {
    shared: Arc<Shared>,
}

struct Shared {
    settings: Arc<Settings>,
    // Uncontended in practice: only the owning task touches it, and it is
    // never held across a wrapped retrieval or a stack capture.
    slot: Mutex<Option<Monitor>>,
}

impl ScopeRegistry {
    pub(crate) fn new(settings: Arc<Settings>) -> Self {
        Self {
            shared: Arc::new(Shared {
                settings,
                slot: Mutex::new(None),
            }),
        }
    }

    /// Start monitoring a unit of work.
    ///
    /// The scope ends when the returned guard is dropped or finished. Fails
    /// if a scope is already active on this registry; use
    /// [`ScopeRegistry::disable_during`] to carve out nested work instead.
    pub fn begin(&self, description: impl Into<String>) -> Result<ScopeGuard, ScopeError> {
        let mut slot = self.shared.slot.lock();
        if let Some(active) = slot.as_ref() {
            return Err(ScopeError::AlreadyActive {
                active: active.description().to_string(),
            });
        }
        Ok(self.bind(&mut slot, description.into()))
    }

    /// Bind a new monitor, replacing whatever was bound.
    pub(crate) fn open(&self, description: String) -> ScopeGuard {
        let mut slot = self.shared.slot.lock();
        self.bind(&mut slot, description)
    }

    fn bind(&self, slot: &mut Option<Monitor>, description: String) -> ScopeGuard {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        let deadline = self.shared.settings.config.deadline();
        debug!(target: LOG_TARGET, scope = id, %description, ?deadline, "scope started");
        *slot = Some(Monitor::new(id, description, deadline));

        ScopeGuard {
            registry: self.clone(),
            id,
            ended: false,
        }
    }

    /// Run `job` inside a scope and report when it returns or panics.
    pub fn scope<T>(
        &self,
        description: impl Into<String>,
        job: impl FnOnce() -> T,
    ) -> Result<T, ScopeError> {
        let _scope = self.begin(description)?;
        Ok(job())
    }

    /// Whether a scope is currently active.
    pub fn is_active(&self) -> bool {
        self.shared.slot.lock().is_some()
    }

    /// Counters of the active scope, or `None` outside a scope.
    pub fn stats(&self) -> Option<MonitorStats> {
        self.shared.slot.lock().as_ref().map(Monitor::stats)
    }

    /// Run `job` with blocking detection suppressed.
    ///
    /// Retrievals inside `job` are still counted, and blocking ones are
    /// counted as ignored. The previous disabled state is restored afterwards,
    /// also when `job` panics, so nested calls compose.
    pub fn disable_during<T>(&self, job: impl FnOnce() -> T) -> Result<T, ScopeError> {
        let (scope, previous) = self.with_active(|m| (m.id(), m.set_disabled(true)))?;
        debug!(target: LOG_TARGET, scope, "blocking detection suppressed");
        let _restore = RestoreDisabled {
            registry: self,
            scope,
            previous,
        };
        Ok(job())
    }

    /// Change the deadline of the active scope.
    pub fn set_deadline(&self, deadline: Duration) -> Result<(), ScopeError> {
        self.with_active(|m| m.set_deadline(deadline))
    }

    /// Wrap a result handle so that retrievals are observed by this registry.
    pub fn instrument<H>(&self, call_site: impl Into<String>, handle: H) -> InstrumentedHandle<H> {
        InstrumentedHandle::new(handle, call_site, self.clone())
    }

    /// Count one retrieval and, when it is going to block, start timing it.
    ///
    /// Returns `None` outside a scope, for ready results and while disabled.
    pub(crate) fn observe(&self, call_site: &str, done: bool) -> Option<BlockTimer> {
        let scope = {
            let mut slot = self.shared.slot.lock();
            let monitor = slot.as_mut()?;
            match monitor.record_access(done) {
                Access::Ready => return None,
                Access::Ignored => {
                    let scope = monitor.id();
                    debug!(target: LOG_TARGET, scope, call_site, "ignored blocking call");
                    return None;
                }
                Access::Blocking => monitor.id(),
            }
        };

        let settings = &self.shared.settings;
        let frames = settings.capture.capture();
        let fingerprint = StackFingerprint::from_frames(frames, &settings.filter);
        Some(BlockTimer {
            registry: self.clone(),
            scope,
            call_site: call_site.to_string(),
            fingerprint,
            started_at_ms: current_timestamp_ms(),
            started: Instant::now(),
        })
    }

    fn with_active<R>(&self, f: impl FnOnce(&mut Monitor) -> R) -> Result<R, ScopeError> {
        self.shared.slot.lock().as_mut().map(f).ok_or(ScopeError::NoActiveScope)
    }

    /// Unbind the scope, then grade it and hand the report to the outputs.
    fn end(&self, scope: u64) -> Option<Report> {
        let monitor = {
            let mut slot = self.shared.slot.lock();
            match slot.as_ref() {
                Some(m) if m.id() == scope => slot.take(),
                _ => None,
            }
        }?;

        let settings = &self.shared.settings;
        let verbose =
            settings.config.verbose || tracing::enabled!(target: LOG_TARGET, Level::DEBUG);
        let report = settings.reporter.clone().verbose(verbose).report(&monitor);
        debug!(
            target: LOG_TARGET,
            scope,
            description = monitor.description(),
            severity = %report.severity,
            "scope ended"
        );

        for output in &settings.outputs {
            if let Err(err) = output.emit(&report) {
                warn!(target: LOG_TARGET, ?output, %err, "failed to emit report");
            }
        }
        Some(report)
    }
}

impl Default for ScopeRegistry {
    /// A registry using the process-wide [`Unblock`] settings.
    fn default() -> Self {
        Unblock::global().registry()
    }
}

impl fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.shared.slot.lock();
        f.debug_struct("ScopeRegistry")
            .field("active", &slot.as_ref().map(Monitor::description))
            .finish()
    }
}

/// Ends its scope when dropped.
///
/// Dropping happens on every exit path, including early returns, `?` and
/// panics, so a begun scope is always reported.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard {
    registry: ScopeRegistry,
    id: u64,
    ended: bool,
}

impl ScopeGuard {
    /// Unique id of this scope within the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The registry the scope is bound to.
    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    /// End the scope now and return its report.
    pub fn finish(mut self) -> Option<Report> {
        self.ended = true;
        self.registry.end(self.id)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if !self.ended {
            self.registry.end(self.id);
        }
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard").field("id", &self.id).finish()
    }
}

struct RestoreDisabled<'a> {
    registry: &'a ScopeRegistry,
    scope: u64,
    previous: bool,
}

impl Drop for RestoreDisabled<'_> {
    fn drop(&mut self) {
        if let Some(monitor) = self.registry.shared.slot.lock().as_mut() {
            if monitor.id() == self.scope {
                monitor.set_disabled(self.previous);
            }
        }
    }
}

/// Times one blocking retrieval and records it when dropped.
///
/// Dropping covers success, failure, timeout and unwinding alike. A timer
/// that outlives its scope is discarded.
pub(crate) struct BlockTimer {
    registry: ScopeRegistry,
    scope: u64,
    call_site: String,
    fingerprint: StackFingerprint,
    started_at_ms: u64,
    started: Instant,
}

impl Drop for BlockTimer {
    fn drop(&mut self) {
        let duration = Microseconds::from(self.started.elapsed());
        let event = BlockEvent::new(
            std::mem::take(&mut self.call_site),
            std::mem::take(&mut self.fingerprint),
            self.started_at_ms,
            duration,
        );

        let mut slot = self.registry.shared.slot.lock();
        match slot.as_mut() {
            Some(monitor) if monitor.id() == self.scope => monitor.push_event(event),
            _ => debug!(
                target: LOG_TARGET,
                scope = self.scope,
                "block finished after its scope ended"
            ),
        }
    }
}

impl fmt::Debug for BlockTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockTimer")
            .field("scope", &self.scope)
            .field("call_site", &self.call_site)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Output;
    use crate::stack::FixedCapture;
    use crate::{MonitorConfig, Severity};
    use std::thread;

    fn unblock(deadline_ms: u64) -> Unblock {
        Unblock::builder()
            .config(MonitorConfig {
                deadline_ms,
                ..MonitorConfig::default()
            })
            .stack_capture(FixedCapture::new([
                "std::backtrace::Backtrace::force_capture",
                "unblock_sdk::registry::ScopeRegistry::observe",
                "my_app::orders::load",
                "my_app::orders::handle",
            ]))
            .output(Output::callback(|_| {}))
            .build()
    }

    fn block_for(registry: &ScopeRegistry, site: &str, millis: u64) {
        let _timer = registry.observe(site, false);
        thread::sleep(Duration::from_millis(millis));
    }

    #[test]
    fn test_begin_twice_fails_fast() {
        let registry = unblock(100).registry();
        let _scope = registry.begin("/outer").unwrap();
        let err = registry.begin("/inner").unwrap_err();
        assert_eq!(
            err,
            ScopeError::AlreadyActive {
                active: "/outer".to_string()
            }
        );
    }

    #[test]
    fn test_concurrent_begin_binds_one_scope() {
        let registry = unblock(100).registry();
        for _ in 0..200 {
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let racers: Vec<_> = ["/a", "/b"]
                .into_iter()
                .map(|description| {
                    let registry = registry.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        registry.begin(description)
                    })
                })
                .collect();
            let outcomes: Vec<_> = racers.into_iter().map(|r| r.join().unwrap()).collect();

            let winners: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
            assert_eq!(winners.len(), 1);
            let expected = if outcomes[0].is_ok() { "/a" } else { "/b" };
            assert_eq!(registry.stats().unwrap().description, expected);
        }
        assert!(!registry.is_active());
    }

    #[test]
    fn test_guard_drop_unbinds() {
        let registry = unblock(100).registry();
        {
            let _scope = registry.begin("/x").unwrap();
            assert!(registry.is_active());
        }
        assert!(!registry.is_active());
        assert!(registry.stats().is_none());
        assert!(registry.begin("/y").is_ok());
    }

    #[test]
    fn test_observe_outside_scope_is_silent() {
        let registry = unblock(100).registry();
        assert!(registry.observe("db.get", false).is_none());
        assert!(registry.stats().is_none());
    }

    #[test]
    fn test_scope_settings_need_a_scope() {
        let registry = unblock(100).registry();
        assert_eq!(registry.disable_during(|| ()), Err(ScopeError::NoActiveScope));
        assert_eq!(registry.set_deadline(Duration::from_millis(5)), Err(ScopeError::NoActiveScope));
    }

    #[test]
    fn test_blocking_access_is_timed() {
        let registry = unblock(100).registry();
        let scope = registry.begin("/orders").unwrap();
        block_for(&registry, "datastore.Get", 2);

        let report = scope.finish().unwrap();
        assert_eq!(report.total_calls, 1);
        assert_eq!(report.blocked_calls, 1);
        assert!(report.total_blocked >= Microseconds::from_millis(2));
        // Under the deadline and not verbose.
        assert_eq!(report.severity, Severity::Info);
        assert_eq!(report.detail, crate::Detail::Elided);
    }

    #[test]
    fn test_fingerprint_skips_library_frames() {
        let registry = unblock(100).registry();
        let _scope = registry.begin("/orders").unwrap();
        let timer = registry.observe("datastore.Get", false).unwrap();
        assert_eq!(timer.fingerprint.frames(), ["my_app::orders::load", "my_app::orders::handle"]);
    }

    #[test]
    fn test_nested_disable_restores_outer_state() {
        let registry = unblock(100).registry();
        let _scope = registry.begin("/x").unwrap();

        registry
            .disable_during(|| {
                registry.disable_during(|| ()).unwrap();
                assert!(registry.stats().unwrap().disabled);
                block_for(&registry, "db.get", 0);
            })
            .unwrap();

        let stats = registry.stats().unwrap();
        assert!(!stats.disabled);
        assert_eq!(stats.total_calls, 1);
        assert_eq!(stats.ignored_calls, 1);
        assert_eq!(stats.blocked_calls, 0);
    }

    #[test]
    fn test_disable_restores_after_panic() {
        let registry = unblock(100).registry();
        let _scope = registry.begin("/x").unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            registry.disable_during(|| panic!("job failed")).unwrap();
        }));
        assert!(result.is_err());
        assert!(!registry.stats().unwrap().disabled);
    }

    #[test]
    fn test_set_deadline_changes_severity() {
        let registry = unblock(1_000).registry();
        let scope = registry.begin("/x").unwrap();
        registry.set_deadline(Duration::from_millis(1)).unwrap();
        block_for(&registry, "db.get", 5);

        let report = scope.finish().unwrap();
        assert_eq!(report.deadline, Microseconds::from_millis(1));
        assert_eq!(report.severity, Severity::Warning);
        assert_eq!(report.entries.len(), 1);
    }

    #[test]
    fn test_timer_from_ended_scope_is_discarded() {
        let registry = unblock(100).registry();
        let first = registry.begin("/first").unwrap();
        let timer = registry.observe("db.get", false).unwrap();
        first.finish();

        let second = registry.begin("/second").unwrap();
        drop(timer);
        let report = second.finish().unwrap();
        assert_eq!(report.blocked_calls, 0);
        assert_eq!(report.total_calls, 0);
    }

    #[test]
    fn test_scope_reports_to_outputs() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let registry = Unblock::builder()
            .output(Output::callback(move |r| sink.lock().push(r.clone())))
            .build()
            .registry();

        let value = registry.scope("job:cleanup", || 42).unwrap();
        assert_eq!(value, 42);

        let reports = seen.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].description, "job:cleanup");
        assert_eq!(reports[0].severity, Severity::Debug);
    }

    #[test]
    fn test_clones_share_the_active_scope() {
        let registry = unblock(100).registry();
        let _scope = registry.begin("/x").unwrap();
        let clone = registry.clone();
        thread::spawn(move || drop(clone.observe("db.get", true)))
            .join()
            .unwrap();
        assert_eq!(registry.stats().unwrap().total_calls, 1);
    }
}
