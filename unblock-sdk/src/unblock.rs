//! The main Unblock type holding process-wide monitor settings.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::warn;
use unblock_types::FrameFilter;

use crate::config::MonitorConfig;
use crate::output::{Output, LOG_TARGET};
use crate::registry::{ScopeGuard, ScopeRegistry};
use crate::reporter::Reporter;
use crate::stack::{BacktraceCapture, StackCapture};

static GLOBAL: OnceLock<Unblock> = OnceLock::new();

/// Everything a registry needs to monitor and report a scope.
pub(crate) struct Settings {
    pub(crate) config: MonitorConfig,
    pub(crate) filter: FrameFilter,
    pub(crate) capture: Arc<dyn StackCapture>,
    pub(crate) reporter: Reporter,
    pub(crate) outputs: Vec<Output>,
}

/// The entry point for monitoring blocking retrievals.
///
/// An `Unblock` holds the configuration, the stack capture strategy and the
/// report outputs. It hands out one [`ScopeRegistry`] per unit of work.
/// Cloning is cheap; clones share settings.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use unblock_sdk::{AsyncResult, Output, Promise, Severity, Unblock};
///
/// let (output, mut reports) = Output::channel(16);
/// let unblock = Unblock::builder()
///     .deadline(Duration::from_millis(250))
///     .output(output)
///     .build();
///
/// let scope = unblock.scope("/api/feed");
/// let registry = scope.registry().clone();
/// let profile = registry.instrument("users.Get", Promise::<u32>::ready(1));
/// let _ = profile.get();
/// drop(scope);
///
/// let report = reports.try_recv().unwrap();
/// assert_eq!(report.description, "/api/feed");
/// assert_eq!(report.severity, Severity::Info);
/// ```
#[derive(Clone)]
pub struct Unblock {
    settings: Arc<Settings>,
}

impl Unblock {
    /// Create an instance that reports through `tracing`.
    pub fn new(config: MonitorConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Create a builder for configuring the instance.
    pub fn builder() -> UnblockBuilder {
        UnblockBuilder::new()
    }

    /// The process-wide instance.
    ///
    /// Uses whatever was installed with [`Unblock::install_global`], or else
    /// configuration from `UNBLOCK_*` environment variables. Invalid
    /// environment configuration is logged and replaced by the defaults.
    pub fn global() -> &'static Unblock {
        GLOBAL.get_or_init(|| {
            let config = MonitorConfig::from_env().unwrap_or_else(|err| {
                warn!(target: LOG_TARGET, %err, "using default monitor configuration");
                MonitorConfig::default()
            });
            Unblock::new(config)
        })
    }

    /// Make this the process-wide instance.
    ///
    /// Fails, handing the instance back, if one was already installed or
    /// [`Unblock::global`] was already used.
    pub fn install_global(self) -> Result<&'static Unblock, Unblock> {
        GLOBAL.set(self)?;
        Ok(Self::global())
    }

    /// A fresh registry for one unit of work.
    pub fn registry(&self) -> ScopeRegistry {
        ScopeRegistry::new(self.settings.clone())
    }

    /// Begin a scope on a fresh registry.
    ///
    /// The registry is reachable through [`ScopeGuard::registry`].
    pub fn scope(&self, description: impl Into<String>) -> ScopeGuard {
        ScopeRegistry::new(self.settings.clone()).open(description.into())
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.settings.config
    }

    pub fn outputs(&self) -> &[Output] {
        &self.settings.outputs
    }
}

impl Default for Unblock {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl fmt::Debug for Unblock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unblock")
            .field("config", &self.settings.config)
            .field("capture", &self.settings.capture)
            .field("outputs", &self.settings.outputs)
            .finish()
    }
}

/// Builder for configuring an [`Unblock`].
#[derive(Debug, Default)]
pub struct UnblockBuilder {
    config: MonitorConfig,
    capture: Option<Arc<dyn StackCapture>>,
    outputs: Vec<Output>,
}

impl UnblockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default deadline of new scopes.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Always include the per-site breakdown in reports.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; every report goes to all of them. With
    /// no outputs, reports are logged through `tracing`.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Replace the stack capture strategy.
    pub fn stack_capture(mut self, capture: impl StackCapture + 'static) -> Self {
        self.capture = Some(Arc::new(capture));
        self
    }

    /// Build the instance.
    pub fn build(self) -> Unblock {
        let mut outputs = self.outputs;
        if outputs.is_empty() {
            outputs.push(Output::Log);
        }
        Unblock {
            settings: Arc::new(Settings {
                filter: self.config.frame_filter(),
                reporter: Reporter::new(&self.config),
                capture: self.capture.unwrap_or_else(|| Arc::new(BacktraceCapture)),
                config: self.config,
                outputs,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::FixedCapture;

    #[test]
    fn test_default_logs_reports() {
        let unblock = Unblock::default();
        assert_eq!(unblock.outputs().len(), 1);
        assert!(matches!(unblock.outputs()[0], Output::Log));
        assert_eq!(unblock.config(), &MonitorConfig::default());
    }

    #[test]
    fn test_builder_applies_overrides() {
        let unblock = Unblock::builder()
            .deadline(Duration::from_millis(120))
            .verbose(true)
            .output(Output::file("reports1.jsonl"))
            .output(Output::file("reports2.jsonl"))
            .stack_capture(FixedCapture::new(["my_app::main"]))
            .build();

        assert_eq!(unblock.config().deadline_ms, 120);
        assert!(unblock.config().verbose);
        assert_eq!(unblock.outputs().len(), 2);
    }

    #[test]
    fn test_registries_are_independent() {
        let unblock = Unblock::default();
        let a = unblock.registry();
        let b = unblock.registry();

        let _scope = a.begin("/a").unwrap();
        assert!(a.is_active());
        assert!(!b.is_active());
        assert!(b.begin("/b").is_ok());
    }

    #[test]
    fn test_scope_binds_fresh_registry() {
        let unblock = Unblock::default();
        let scope = unblock.scope("job:mail");
        assert_eq!(scope.registry().stats().unwrap().description, "job:mail");
    }

    #[test]
    fn test_huge_thresholds_do_not_overflow() {
        let unblock = Unblock::builder()
            .config(MonitorConfig {
                min_entry_ms: 20_000_000_000_000_000,
                ..MonitorConfig::default()
            })
            .output(Output::callback(|_| {}))
            .build();
        let scope = unblock.scope("/x");
        scope.registry().set_deadline(Duration::MAX).unwrap();
        let report = scope.finish().unwrap();
        assert_eq!(report.deadline.as_micros(), u64::MAX);
    }

    #[test]
    fn test_global_is_initialised_once() {
        let first = Unblock::global() as *const Unblock;
        let second = Unblock::global() as *const Unblock;
        assert_eq!(first, second);
        assert!(Unblock::default().install_global().is_err());
    }
}
