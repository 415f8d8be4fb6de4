use clap::Parser;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, ResourceExt};
use simplewatch::k8s::{client, USER_AGENT};
use simplewatch::{WatchConfig, WatchedResource};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Namespace whose ConfigMaps are watched
    #[arg(short, long, default_value = "default")]
    namespace: String,

    /// Drop cached entries that vanished while the watch was disconnected
    #[arg(long)]
    relist_on_reconnect: bool,
}

#[tokio::main]
async fn main() -> simplewatch::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    let args = Args::parse();
    let client = client::new_strict(Some(USER_AGENT)).await?;
    let api: Api<ConfigMap> = Api::namespaced(client, &args.namespace);

    let mut config = WatchConfig::from_env();
    if args.relist_on_reconnect {
        config = config.with_relist_on_reconnect(true);
    }

    let watch = WatchedResource::from_api(api, config);
    let (_id, mut changes) = watch.subscribe().await;

    println!("Watching ConfigMaps in {}, press Ctrl-C to stop", args.namespace);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Some(change) => {
                    println!("Entity changed event [{}]: {}", change.kind, change.resource.name_any());
                }
                None => break,
            },
        }
    }

    info!("{} ConfigMaps cached at shutdown", watch.len().await);
    watch.shutdown();
    Ok(())
}
