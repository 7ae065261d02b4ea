#![cfg_attr(not(test), deny(clippy::unwrap_used))]

use anyhow::{anyhow, Context};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};
use wsk_app::{App, Config};

pub use args::Cli;

mod args;

pub fn inner_main(args: args::Cli) -> anyhow::Result<()> {
    let (appender, _guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(appender)
        .finish();
    match tracing::subscriber::set_global_default(subscriber) {
        Ok(_) => tracing::info!("logging initialized"),
        Err(_) => tracing::debug!("logging already initialized"),
    }

    let datadir = args
        .datadir
        .clone()
        .or_else(default_datadir)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = match args.network {
        args::Network::Mainnet => Config::default_mainnet(datadir, args.telegram_bot_token),
        args::Network::Testnet => Config::default_testnet(datadir, args.telegram_bot_token),
        args::Network::Regtest => {
            let rpc_url = args
                .rpc_url
                .as_deref()
                .ok_or_else(|| anyhow!("on regtest you have to specify --rpc-url"))?;
            let indexer_url = args
                .indexer_url
                .as_deref()
                .ok_or_else(|| anyhow!("on regtest you have to specify --indexer-url"))?;
            Config::default_regtest(rpc_url, indexer_url, datadir, args.telegram_bot_token)
        }
    };
    if let Some(url) = args.rpc_url {
        config.rpc_url = url;
    }
    if let Some(url) = args.indexer_url {
        config.indexer_url = url;
    }
    if let Some(url) = args.mempool_url {
        config.mempool_url = url;
    }
    config.bot_password = args.bot_password;
    config.admin_chat_id = args.admin_chat_id;
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Some(max) = args.max_wallets_per_user {
        config.max_wallets_per_chat = max;
    }

    let (tx, rx) = tokio::sync::watch::channel(false);
    let _ = ctrlc::try_set_handler(move || {
        tracing::info!("shutdown signal received");
        let _ = tx.send(true);
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the async runtime")?;

    let admin_chat_id = config.admin_chat_id;
    let telegram_token = config.telegram_token.clone();
    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            // best-effort: tell the operator the service did not come up
            if let (Some(admin), Ok(telegram)) =
                (admin_chat_id, wsk_app::TelegramClient::new(&telegram_token))
            {
                let _ = runtime
                    .block_on(telegram.send_message(admin, &format!("sentry failed to start: {e}")));
            }
            return Err(e).context("starting the sentry (is the datadir writable?)");
        }
    };
    runtime.block_on(app.run(rx))?;
    Ok(())
}

fn default_datadir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        let mut dir = PathBuf::from(home);
        dir.push(".wsk");
        dir
    })
}
