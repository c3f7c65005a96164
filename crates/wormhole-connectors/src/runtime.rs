//! Role runtimes wiring one module to one bridge.
//!
//! [`StargateRuntime`] runs an ingest module feeding an ingest bridge;
//! [`DimensionRuntime`] runs a delivery bridge feeding a delivery module.
//! Both follow the same lifecycle:
//!
//! ```text
//! Created --setup--> Initialized --run--> Running --+--> Draining --> Closed
//!                                                   |                 Failed
//!                                        shutdown or one side returned
//! ```
//!
//! Each side runs on its own task. Once either side returns (or shutdown is
//! requested) the runtime signals the other side to stop and waits for it.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use crate::adapter::{DeliveryBridge, DeliveryModule, IngestBridge, IngestModule};
use crate::config::{ConnectorConfig, ConnectorState, RuntimeConfig};
use crate::error::ConnectorError;
use crate::metrics::ConnectorMetrics;
use crate::registry::{DimensionRegistry, StargateRegistry};
use crate::shutdown::{self, ShutdownSignal};

type SideTask<T> = JoinHandle<(T, Result<(), ConnectorError>)>;

fn unpack<T>(
    side: &str,
    joined: Result<(T, Result<(), ConnectorError>), JoinError>,
) -> (Option<T>, Result<(), ConnectorError>) {
    match joined {
        Ok((adapter, result)) => (Some(adapter), result),
        Err(e) => (
            None,
            Err(ConnectorError::Internal(format!("{side} task panicked: {e}"))),
        ),
    }
}

/// Runs both sides until one returns or shutdown is requested, then stops
/// the other. The error of the side that returned first wins.
async fn drive<M: Send + 'static, B: Send + 'static>(
    state: &RwLock<ConnectorState>,
    mut module_task: SideTask<M>,
    mut bridge_task: SideTask<B>,
    stop: watch::Sender<bool>,
    mut shutdown: ShutdownSignal,
) -> (Option<M>, Option<B>, Result<(), ConnectorError>) {
    let mut module_done = None;
    let mut bridge_done = None;
    tokio::select! {
        () = shutdown::requested(&mut shutdown) => info!("shutdown requested"),
        joined = &mut module_task => module_done = Some(joined),
        joined = &mut bridge_task => bridge_done = Some(joined),
    }
    let bridge_first = bridge_done.is_some();

    *state.write() = ConnectorState::Draining;
    stop.send_replace(true);

    let module_joined = match module_done {
        Some(joined) => joined,
        None => module_task.await,
    };
    let bridge_joined = match bridge_done {
        Some(joined) => joined,
        None => bridge_task.await,
    };
    let (module, module_result) = unpack("module", module_joined);
    let (bridge, bridge_result) = unpack("bridge", bridge_joined);

    let result = if bridge_first {
        bridge_result.and(module_result)
    } else {
        module_result.and(bridge_result)
    };
    (module, bridge, result)
}

fn finish(state: &RwLock<ConnectorState>, role: &str, result: &Result<(), ConnectorError>) {
    match result {
        Ok(()) => {
            *state.write() = ConnectorState::Closed;
            info!(role, "stopped");
        }
        Err(e) => {
            *state.write() = ConnectorState::Failed;
            error!(role, error = %e, "stopped with error");
        }
    }
}

fn check_state(state: &RwLock<ConnectorState>, expected: ConnectorState) -> Result<(), ConnectorError> {
    let actual = *state.read();
    if actual == expected {
        Ok(())
    } else {
        Err(ConnectorError::InvalidState {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Runtime of the ingest role.
pub struct StargateRuntime {
    registry: StargateRegistry,
    state: Arc<RwLock<ConnectorState>>,
    module: Option<Box<dyn IngestModule>>,
    bridge: Option<Box<dyn IngestBridge>>,
}

impl std::fmt::Debug for StargateRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StargateRuntime")
            .field("state", &self.state())
            .field("module", &self.module.as_ref().map(|m| m.name().to_string()))
            .field("bridge", &self.bridge.as_ref().map(|b| b.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl StargateRuntime {
    /// Creates a runtime resolving names through `registry`.
    #[must_use]
    pub fn new(registry: StargateRegistry) -> Self {
        Self {
            registry,
            state: Arc::new(RwLock::new(ConnectorState::Created)),
            module: None,
            bridge: None,
        }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &StargateRegistry {
        &self.registry
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectorState {
        *self.state.read()
    }

    /// Metrics of the module, once set up.
    #[must_use]
    pub fn module_metrics(&self) -> Option<ConnectorMetrics> {
        self.module.as_ref().map(|m| m.metrics())
    }

    /// Metrics of the bridge, once set up.
    #[must_use]
    pub fn bridge_metrics(&self) -> Option<ConnectorMetrics> {
        self.bridge.as_ref().map(|b| b.metrics())
    }

    /// Creates `module` and `bridge`, connects them with a bounded queue and
    /// sets both up.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` for an unknown name or
    /// bad runtime setting, or the first `setup` error of either side.
    pub async fn setup(
        &mut self,
        module: &str,
        bridge: &str,
        config: &ConnectorConfig,
    ) -> Result<(), ConnectorError> {
        check_state(&self.state, ConnectorState::Created)?;
        let runtime = RuntimeConfig::from_config(config)?;
        let mut module = self.registry.create_module(module)?;
        let mut bridge = self.registry.create_bridge(bridge)?;

        let (tx, rx) = mpsc::channel(runtime.channel_size);
        let wired = async {
            module.setup(config, tx).await?;
            bridge.setup(config, rx).await
        };
        if let Err(e) = wired.await {
            *self.state.write() = ConnectorState::Failed;
            return Err(e);
        }

        info!(
            module = module.name(),
            bridge = bridge.name(),
            channel_size = runtime.channel_size,
            "stargate initialized"
        );
        self.module = Some(module);
        self.bridge = Some(bridge);
        *self.state.write() = ConnectorState::Initialized;
        Ok(())
    }

    /// Runs module and bridge until shutdown or until either returns.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::InvalidState` if not set up, otherwise the
    /// error of the side that failed first.
    pub async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        check_state(&self.state, ConnectorState::Initialized)?;
        let (Some(mut module), Some(mut bridge)) = (self.module.take(), self.bridge.take()) else {
            return Err(ConnectorError::InvalidState {
                expected: ConnectorState::Initialized.to_string(),
                actual: ConnectorState::Created.to_string(),
            });
        };

        let (stop, signal) = shutdown::channel();
        let module_signal = signal.clone();
        let module_task = tokio::spawn(async move {
            let result = module.run(module_signal).await;
            (module, result)
        });
        let bridge_task = tokio::spawn(async move {
            let result = bridge.run(signal).await;
            (bridge, result)
        });
        *self.state.write() = ConnectorState::Running;
        info!("stargate running");

        let (module, bridge, result) =
            drive(&self.state, module_task, bridge_task, stop, shutdown).await;
        if let Some(module) = &module {
            info!(module = module.name(), metrics = %module.metrics(), "module stopped");
        }
        if let Some(bridge) = &bridge {
            info!(bridge = bridge.name(), metrics = %bridge.metrics(), "bridge stopped");
        }
        self.module = module;
        self.bridge = bridge;
        finish(&self.state, "stargate", &result);
        result
    }
}

/// Runtime of the delivery role.
pub struct DimensionRuntime {
    registry: DimensionRegistry,
    state: Arc<RwLock<ConnectorState>>,
    module: Option<Box<dyn DeliveryModule>>,
    bridge: Option<Box<dyn DeliveryBridge>>,
}

impl std::fmt::Debug for DimensionRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DimensionRuntime")
            .field("state", &self.state())
            .field("module", &self.module.as_ref().map(|m| m.name().to_string()))
            .field("bridge", &self.bridge.as_ref().map(|b| b.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl DimensionRuntime {
    /// Creates a runtime resolving names through `registry`.
    #[must_use]
    pub fn new(registry: DimensionRegistry) -> Self {
        Self {
            registry,
            state: Arc::new(RwLock::new(ConnectorState::Created)),
            module: None,
            bridge: None,
        }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &DimensionRegistry {
        &self.registry
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectorState {
        *self.state.read()
    }

    /// Metrics of the module, once set up.
    #[must_use]
    pub fn module_metrics(&self) -> Option<ConnectorMetrics> {
        self.module.as_ref().map(|m| m.metrics())
    }

    /// Metrics of the bridge, once set up.
    #[must_use]
    pub fn bridge_metrics(&self) -> Option<ConnectorMetrics> {
        self.bridge.as_ref().map(|b| b.metrics())
    }

    /// Creates `bridge` and `module`, connects them with a bounded queue and
    /// sets both up. The bridge decodes lines with the module's transform.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` for an unknown name or
    /// bad runtime setting, or the first `setup` error of either side.
    pub async fn setup(
        &mut self,
        module: &str,
        bridge: &str,
        config: &ConnectorConfig,
    ) -> Result<(), ConnectorError> {
        check_state(&self.state, ConnectorState::Created)?;
        let runtime = RuntimeConfig::from_config(config)?;
        let mut module = self.registry.create_module(module)?;
        let mut bridge = self.registry.create_bridge(bridge)?;

        let (tx, rx) = mpsc::channel(runtime.channel_size);
        let transform = module.transform();
        let wired = async {
            module.setup(config, rx).await?;
            bridge.setup(config, tx, transform).await
        };
        if let Err(e) = wired.await {
            *self.state.write() = ConnectorState::Failed;
            return Err(e);
        }

        info!(
            module = module.name(),
            bridge = bridge.name(),
            channel_size = runtime.channel_size,
            "dimension initialized"
        );
        self.module = Some(module);
        self.bridge = Some(bridge);
        *self.state.write() = ConnectorState::Initialized;
        Ok(())
    }

    /// Runs bridge and module until shutdown or until either returns.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::InvalidState` if not set up, otherwise the
    /// error of the side that failed first.
    pub async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        check_state(&self.state, ConnectorState::Initialized)?;
        let (Some(mut module), Some(mut bridge)) = (self.module.take(), self.bridge.take()) else {
            return Err(ConnectorError::InvalidState {
                expected: ConnectorState::Initialized.to_string(),
                actual: ConnectorState::Created.to_string(),
            });
        };

        let (stop, signal) = shutdown::channel();
        let module_signal = signal.clone();
        let module_task = tokio::spawn(async move {
            let result = module.run(module_signal).await;
            (module, result)
        });
        let bridge_task = tokio::spawn(async move {
            let result = bridge.run(signal).await;
            (bridge, result)
        });
        *self.state.write() = ConnectorState::Running;
        info!("dimension running");

        let (module, bridge, result) =
            drive(&self.state, module_task, bridge_task, stop, shutdown).await;
        if let Some(bridge) = &bridge {
            info!(bridge = bridge.name(), metrics = %bridge.metrics(), "bridge stopped");
        }
        if let Some(module) = &module {
            info!(module = module.name(), metrics = %module.metrics(), "module stopped");
        }
        self.module = module;
        self.bridge = bridge;
        finish(&self.state, "dimension", &result);
        result
    }
}
