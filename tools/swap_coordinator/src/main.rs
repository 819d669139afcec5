use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use swap_client::{
    Asset, Chain, ChainFamily, JsonFileStore, LocalSigner, Network, OrderAuth, OrderPair,
    Orderbook, OrderbookClient, QuoteClient, QuoteProvider, QuoteSelection, RelayClient,
    RetryConfig, SecretManager, StaticToken, SupportedAssets,
};
use swap_coordinator::config::{normalize_private_key, parse_gas_balance, SwapConfig};
use swap_coordinator::metrics::TracingMetrics;
use swap_coordinator::wallet::{BitcoinWallet, ChainWallet, EvmWallet, WalletRegistry};
use swap_coordinator::{Garden, SwapEvent};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swap-coordinator", version, about = "Cross-chain HTLC swap CLI")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(flatten)]
    services: ServiceArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ServiceArgs {
    /// EVM private key (hex, 0x optional)
    #[arg(long, env = "ETHEREUM_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
    #[arg(long, env = "ORDERBOOK_URL", default_value = "https://testnet.api.garden.finance")]
    orderbook_url: String,
    #[arg(long, env = "QUOTE_URL", default_value = "https://testnet.api.garden.finance/quote")]
    quote_url: String,
    #[arg(long, env = "EVM_CHAIN", default_value = "ethereum_sepolia")]
    evm_chain: Chain,
    #[arg(long, env = "EVM_RPC_URL", default_value = "https://ethereum-sepolia-rpc.publicnode.com")]
    evm_rpc_url: String,
    #[arg(long, env = "BITCOIN_CHAIN", default_value = "bitcoin_testnet")]
    bitcoin_chain: Chain,
    #[arg(
        long,
        env = "BITCOIN_EXPLORER_URL",
        default_value = "https://mempool.space/testnet4/api"
    )]
    bitcoin_explorer_url: String,
    /// Seconds between execute-loop cycles
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 5)]
    poll_interval: u64,
    /// Seconds to wait for a solver to match a new order
    #[arg(long, default_value_t = 120)]
    match_timeout: u64,
    /// Minimum native gas balance, in ether
    #[arg(long, default_value = "0.02")]
    min_gas_balance: String,
    /// Directory for cached orderbook sessions
    #[arg(long, env = "SWAP_TOKEN_DIR")]
    token_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Quote, create and drive a swap to completion
    Swap(SwapArgs),
    /// Resume pending orders of this wallet
    Execute(ExecuteArgs),
    /// Print strategy quotes for a route
    Quote(QuoteArgs),
    /// Print a matched order
    Status { order_id: String },
    /// List supported assets
    Assets,
}

#[derive(Args)]
struct SwapArgs {
    /// Source asset key, e.g. ethereum_sepolia_0x3c6a...
    #[arg(long)]
    from: String,
    /// Destination asset key, e.g. bitcoin_testnet_primary
    #[arg(long)]
    to: String,
    /// Send amount in base units
    #[arg(long)]
    amount: String,
    /// first, best or strategy:<id>
    #[arg(long, default_value = "first")]
    quote: QuoteSelection,
    /// Delivery address on the destination chain; defaults to our own
    #[arg(long)]
    destination_address: Option<String>,
    /// Initiate the source leg on-chain ourselves instead of through the relayer
    #[arg(long)]
    no_relay: bool,
    /// Return once the order is matched and initiated
    #[arg(long)]
    detach: bool,
}

#[derive(Args)]
struct ExecuteArgs {
    /// Initiate unfunded source legs on-chain; by default only the relayer initiates
    #[arg(long)]
    initiate_on_chain: bool,
}

#[derive(Args)]
struct QuoteArgs {
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[arg(long)]
    amount: String,
}

struct Services {
    config: SwapConfig,
    relay: Arc<RelayClient>,
    evm: Arc<EvmWallet>,
    bitcoin: Arc<BitcoinWallet>,
    garden: Garden,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    match cli.command {
        Command::Assets => {
            print_assets(network_of(cli.services.evm_chain));
            Ok(())
        }
        Command::Quote(args) => run_quote(&cli.services, args).await,
        Command::Status { order_id } => run_status(&cli.services, &order_id).await,
        Command::Execute(args) => {
            let services = connect(&cli.services, args.initiate_on_chain).await?;
            run_until_ctrl_c(&services.garden).await
        }
        Command::Swap(args) => {
            let services = connect(&cli.services, args.no_relay).await?;
            run_swap(services, args).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn network_of(chain: Chain) -> Network {
    if chain.is_testnet() {
        Network::Testnet
    } else {
        Network::Mainnet
    }
}

fn build_config(args: &ServiceArgs, initiate_on_chain: bool) -> Result<SwapConfig> {
    let raw_key = args
        .private_key
        .as_deref()
        .ok_or_else(|| anyhow!("ETHEREUM_PRIVATE_KEY (or --private-key) is required"))?;
    let config = SwapConfig {
        private_key: normalize_private_key(raw_key)?,
        orderbook_url: args.orderbook_url.clone(),
        quote_url: args.quote_url.clone(),
        evm_chain: args.evm_chain,
        evm_rpc_url: args.evm_rpc_url.clone(),
        bitcoin_chain: args.bitcoin_chain,
        bitcoin_explorer_url: args.bitcoin_explorer_url.clone(),
        poll_interval_secs: args.poll_interval,
        match_timeout_secs: args.match_timeout,
        min_gas_balance: parse_gas_balance(&args.min_gas_balance)?,
        token_dir: args.token_dir.clone(),
        initiate_on_chain,
        retry: RetryConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

async fn connect(args: &ServiceArgs, initiate_on_chain: bool) -> Result<Services> {
    let config = build_config(args, initiate_on_chain)?;
    let signer = Arc::new(LocalSigner::from_hex(&config.private_key)?);
    let secrets = Arc::new(
        SecretManager::from_signer(signer.as_ref())
            .await
            .context("derive master secret")?,
    );

    let mut auth = OrderAuth::new(
        &config.orderbook_url,
        signer.clone(),
        config.evm_chain_id()?,
        config.retry.clone(),
    )?;
    if let Some(dir) = config.token_dir.as_ref() {
        auth = auth.with_store(Box::new(JsonFileStore::new(dir)?));
    }
    let auth = Arc::new(auth);

    let orderbook: Arc<dyn Orderbook> = Arc::new(OrderbookClient::new(
        &config.orderbook_url,
        auth.clone(),
        config.retry.clone(),
    )?);
    let quotes = Arc::new(QuoteClient::new(&config.quote_url, config.retry.clone())?);
    let relay = Arc::new(RelayClient::new(
        &config.orderbook_url,
        auth,
        config.retry.clone(),
    )?);

    let evm = Arc::new(EvmWallet::connect(
        config.evm_chain,
        &config.evm_rpc_url,
        (*signer).clone(),
    )?);
    let bitcoin = Arc::new(BitcoinWallet::from_secrets(
        config.bitcoin_chain,
        &config.bitcoin_explorer_url,
        &secrets,
        relay.clone(),
        config.retry.clone(),
    )?);
    let wallets = WalletRegistry::new()
        .with(evm.clone())
        .with(bitcoin.clone());

    let garden_config = config.garden_config();
    let identity = ChainWallet::address(evm.as_ref());
    info!(
        %identity,
        bitcoin = %ChainWallet::address(bitcoin.as_ref()),
        "Wallets ready"
    );
    let garden = Garden::new(
        orderbook,
        quotes,
        secrets,
        wallets,
        identity,
        garden_config,
    )
    .with_metrics(Arc::new(TracingMetrics));

    Ok(Services {
        config,
        relay,
        evm,
        bitcoin,
        garden,
    })
}

async fn run_swap(services: Services, args: SwapArgs) -> Result<()> {
    let network = network_of(services.config.evm_chain);
    let from = SupportedAssets::lookup(network, &args.from)?;
    let to = SupportedAssets::lookup(network, &args.to)?;
    if from.chain.family() != ChainFamily::Evm {
        bail!("only EVM source assets are supported, got {}", from.chain);
    }

    let gas = services.evm.native_balance().await?;
    if gas < services.config.min_gas_balance {
        bail!(
            "{} holds {gas} wei of gas, at least {} wei is required",
            ChainWallet::address(services.evm.as_ref()),
            services.config.min_gas_balance
        );
    }

    let destination_address = match args.destination_address {
        Some(address) => address,
        None => match to.chain.family() {
            ChainFamily::Bitcoin => ChainWallet::address(services.bitcoin.as_ref()),
            ChainFamily::Evm => ChainWallet::address(services.evm.as_ref()),
        },
    };
    let params = services
        .garden
        .prepare_swap(
            &from,
            &to,
            &args.amount,
            &args.quote,
            Some(destination_address),
        )
        .await?;
    println!(
        "quote: {} {} -> {} {} via {}",
        params.send_amount,
        from.symbol,
        params.receive_amount,
        to.symbol,
        params.additional_data.strategy_id
    );

    let order = services.garden.swap(&params).await?;
    println!("order_id: {}", order.id());

    if !args.no_relay {
        let tx_hash = services
            .relay
            .init(&order, services.evm.as_ref())
            .await
            .context("relay initiate")?;
        println!("initiate: {tx_hash}");
    }

    if args.detach {
        return Ok(());
    }
    run_until_ctrl_c(&services.garden).await
}

async fn run_until_ctrl_c(garden: &Garden) -> Result<()> {
    let printer = spawn_event_printer(garden.subscribe());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for ctrl-c");
        }
        info!("Shutting down after the current cycle");
        let _ = shutdown_tx.send(true);
    });
    garden.execute(shutdown_rx).await?;
    printer.abort();
    Ok(())
}

fn spawn_event_printer(mut events: broadcast::Receiver<SwapEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SwapEvent::Success {
                    order,
                    action,
                    tx_hash,
                }) => println!("{} {action}: {tx_hash}", order.id()),
                Ok(SwapEvent::Error { order, error }) => {
                    eprintln!("{} failed: {error}", order.id())
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event printer fell behind")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn run_quote(args: &ServiceArgs, quote: QuoteArgs) -> Result<()> {
    let network = network_of(args.evm_chain);
    let from = SupportedAssets::lookup(network, &quote.from)?;
    let to = SupportedAssets::lookup(network, &quote.to)?;
    let client = QuoteClient::new(&args.quote_url, RetryConfig::from_env())?;
    let pair = OrderPair::new(&from, &to);
    let result = client.get_quote(&pair, &quote.amount).await?;
    println!("pair: {pair}");
    for (strategy, receive) in &result.quotes {
        println!("{strategy}: {receive}");
    }
    Ok(())
}

async fn run_status(args: &ServiceArgs, order_id: &str) -> Result<()> {
    // Matched-order lookups need no session.
    let orderbook = OrderbookClient::new(
        &args.orderbook_url,
        Arc::new(StaticToken(String::new())),
        RetryConfig::from_env(),
    )?;
    let order = orderbook
        .get_order(order_id)
        .await?
        .ok_or_else(|| anyhow!("order {order_id} is not matched or does not exist"))?;
    println!("{}", serde_json::to_string_pretty(&order)?);
    Ok(())
}

fn print_assets(network: Network) {
    for asset in SupportedAssets::all(network) {
        print_asset(&asset);
    }
}

fn print_asset(asset: &Asset) {
    println!("{}\t{}\t{} decimals", asset.key(), asset.symbol, asset.decimals);
}
