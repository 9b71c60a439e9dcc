//! Bridge lifecycle
//!
//! [`Bridge::start`] does the fatal startup work: log in to Wyze and fetch
//! the device directory. [`Bridge::run`] then drives the session refresher
//! and the MQTT listener concurrently. When either stops, the other is told
//! to stop too.

use crate::config::{BridgeConfig, WyzeCredentials};
use crate::control::BulbController;
use crate::directory::DeviceDirectory;
use crate::dispatcher::CommandDispatcher;
use crate::error::BridgeResult;
use crate::listener::{BusListener, ListenerSettings};
use crate::refresher::SessionRefresher;
use crate::shutdown;
use crate::transport::mqtt::ConnectionState;
use crate::transport::BusConnector;
use crate::wyze::{DeviceApi, Session};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Instrument};

pub struct Bridge<C: BusConnector> {
    session: Session,
    directory: Arc<DeviceDirectory>,
    refresher: SessionRefresher,
    listener: BusListener<C>,
}

impl<C: BusConnector> Bridge<C> {
    /// Authenticate and load the device directory
    ///
    /// A login failure aborts startup. A failed device fetch only leaves
    /// the directory empty.
    pub async fn start(
        config: &BridgeConfig,
        credentials: &WyzeCredentials,
        api: Arc<dyn DeviceApi>,
        session: Session,
        connector: C,
    ) -> BridgeResult<Self> {
        let span = crate::lifecycle_span!(event = "startup");
        Self::assemble(config, credentials, api, session, connector)
            .instrument(span)
            .await
    }

    async fn assemble(
        config: &BridgeConfig,
        credentials: &WyzeCredentials,
        api: Arc<dyn DeviceApi>,
        session: Session,
        connector: C,
    ) -> BridgeResult<Self> {
        let tokens = api.login(credentials).await?;
        session.replace(tokens);

        let directory = Arc::new(DeviceDirectory::load(api.as_ref()).await);

        let controller = BulbController::new(Arc::clone(&api), config.wyze.device_model.clone())
            .with_directory(Arc::clone(&directory));
        let listener = BusListener::new(
            connector,
            Arc::clone(&directory),
            CommandDispatcher::new(controller),
            ListenerSettings::from(&config.bridge),
        );
        let refresher = SessionRefresher::new(api, session.clone(), config.bridge.refresh_interval());

        info!("Bridge started with {} devices", directory.len());
        Ok(Self {
            session,
            directory,
            refresher,
            listener,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    pub fn listener_state(&self) -> watch::Receiver<ConnectionState> {
        self.listener.state()
    }

    /// Run refresher and listener until shutdown or until either one stops
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) {
        let Self {
            refresher,
            mut listener,
            ..
        } = self;
        let (stop_tx, stop_rx) = shutdown::channel();

        let refresher_task = async {
            refresher.run(stop_rx.clone()).await;
            stop_tx.send_replace(true);
        };
        let listener_task = async {
            listener.run(stop_rx.clone()).await;
            stop_tx.send_replace(true);
        };
        let forward_shutdown = async {
            let mut external = shutdown_rx;
            let mut internal = stop_rx.clone();
            tokio::select! {
                _ = shutdown::requested(&mut external) => {
                    info!("Shutdown requested, stopping bridge");
                }
                _ = shutdown::requested(&mut internal) => {
                    warn!("A bridge task stopped, stopping the rest");
                }
            }
            stop_tx.send_replace(true);
        };

        tokio::join!(refresher_task, listener_task, forward_shutdown);
        info!("Bridge stopped");
    }
}
