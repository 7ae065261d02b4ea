use crate::commands::CommandHandler;
use crate::config::Config;
use crate::consts::UPDATES_TIMEOUT_S;
use crate::events::Notifier;
use crate::pipeline::Poller;
use crate::telegram::TelegramClient;
use crate::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use wsk_chain::{RpcClient, RpcClientBuilder};
use wsk_common::FileStore;
use wsk_indexer::{IndexerClient, IndexerClientBuilder};
use wsk_store::Store;

/// The assembled service: long-lived collaborators wired once at startup
/// and injected into the poller and the command surface.
pub struct App {
    config: Config,
    store: Arc<Store>,
    rpc: Arc<RpcClient>,
    indexer: Arc<IndexerClient>,
    telegram: Arc<TelegramClient>,
}

impl App {
    /// Open the document store and build the shared clients. An unusable
    /// store is fatal here, before anything is spawned.
    pub fn new(config: Config) -> Result<Self, Error> {
        let datadir = config.datadir.join(config.network.as_str());
        let persister = FileStore::new(datadir)?;
        let store = Arc::new(Store::open(Arc::new(persister))?);

        let rpc = Arc::new(
            RpcClientBuilder::new(&config.rpc_url)
                .timeout(config.timeout)
                .build()?,
        );
        let indexer = Arc::new(
            IndexerClientBuilder::new(&config.indexer_url)
                .timeout(config.timeout)
                .build()?,
        );
        let telegram = Arc::new(TelegramClient::new(&config.telegram_token)?);

        Ok(App {
            config,
            store,
            rpc,
            indexer,
            telegram,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Best-effort operational notice to the admin chat, when configured.
    pub async fn notify_admin(&self, text: &str) {
        if let Some(admin) = self.config.admin_chat_id {
            if let Err(e) = self.telegram.send_message(admin, text).await {
                log::debug!("admin notice failed: {e}");
            }
        }
    }

    /// Drive the pipeline and the command loop until `shutdown` flips.
    ///
    /// Ticks are serialized: the interval only fires again once the previous
    /// tick returned, and a shutdown arriving mid-tick lets the tick finish
    /// before the loop exits.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), Error> {
        log::info!(
            "wallet sentry on {} watching {} wallets",
            self.config.network,
            self.store.tracked_addresses().len()
        );
        self.notify_admin(&format!("sentry up on {}", self.config.network))
            .await;

        let notifier = Notifier::new(
            self.telegram.clone(),
            self.store.clone(),
            self.config.mempool_url.clone(),
        );
        let mut poller = Poller::new(
            self.store.clone(),
            self.rpc.clone(),
            self.indexer.clone(),
            notifier,
            self.config.network,
        );
        let mut commands = CommandHandler::new(
            self.store.clone(),
            self.rpc.clone(),
            self.indexer.clone(),
            self.telegram.clone(),
            self.config.network,
            self.config.bot_password.clone(),
            self.config.max_wallets_per_chat,
        );

        let mut poll_shutdown = shutdown.clone();
        let poll_loop = async move {
            let mut interval = tokio::time::interval(self.config.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = poller.tick().await {
                            log::warn!("tick aborted, cursor kept: {e}");
                        }
                    }
                    _ = poll_shutdown.changed() => break,
                }
            }
            log::debug!("poll loop stopped");
        };

        let mut command_shutdown = shutdown;
        let telegram = self.telegram.clone();
        let command_loop = async move {
            let mut offset = 0i64;
            loop {
                tokio::select! {
                    result = telegram.get_updates(offset, UPDATES_TIMEOUT_S) => {
                        match result {
                            Ok(updates) => {
                                for update in updates {
                                    offset = offset.max(update.update_id + 1);
                                    commands.handle_update(&update).await;
                                }
                            }
                            Err(e) => {
                                log::warn!("polling updates failed: {e}");
                                tokio::time::sleep(Duration::from_secs(5)).await;
                            }
                        }
                    }
                    _ = command_shutdown.changed() => break,
                }
            }
            log::debug!("command loop stopped");
        };

        tokio::join!(poll_loop, command_loop);
        log::info!("shutdown complete");
        Ok(())
    }
}
