use std::sync::{Arc, RwLock};

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod blockchain;
mod config;

use blockchain::{Blockchain, BlockchainStorage};
use config::NodeConfig;

// Open the ledger from storage, or run it in memory if the database is unavailable
fn initialize_blockchain(config: &NodeConfig) -> anyhow::Result<Blockchain> {
    let data_dir = &config.data_dir;

    // Create data directory if it doesn't exist
    if let Err(e) = std::fs::create_dir_all(data_dir) {
        warn!("Failed to create data directory {}: {}", data_dir.display(), e);
    }

    match BlockchainStorage::open(data_dir) {
        Ok(storage) => {
            info!(
                "Opened storage at {} (stored height {}, tip {})",
                data_dir.display(),
                storage.get_block_height().unwrap_or(0),
                storage
                    .get_latest_block_hash()
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "none".to_string())
            );
            Blockchain::with_storage(config.ledger.clone(), Arc::new(storage))
                .context("failed to initialise ledger from storage")
        }
        Err(err) => {
            warn!("Failed to open storage at {}: {}", data_dir.display(), err);
            warn!("Creating in-memory blockchain instead");

            Blockchain::new(config.ledger.clone()).context("failed to create ledger")
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_pending_transactions,
        api::handlers::new_transaction,
        api::handlers::sign_transaction,
        api::handlers::mine_block,
        api::handlers::validate_chain,
        api::handlers::validate_candidate_chain,
        api::handlers::create_wallet,
        api::handlers::get_balance,
        api::handlers::get_all_accounts,
        api::handlers::get_stats,
        api::handlers::get_coinbase_rewards,
        api::handlers::get_transaction_log,
        api::handlers::get_difficulty,
        api::handlers::set_difficulty,
        api::handlers::get_reward,
        api::handlers::set_reward,
        api::handlers::debug_block_hash
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::AuditEntry,
            blockchain::AuditStatus,
            blockchain::AccountBalance,
            blockchain::ChainStats,
            blockchain::CoinbaseReward,
            blockchain::RewardRange,
            blockchain::validator::ValidationReport,
            blockchain::validator::ChainDefect,
            blockchain::validator::BlockReport,
            blockchain::validator::DefectKind,
            api::handlers::ChainResponse,
            api::handlers::TransactionResponse,
            api::handlers::SignRequest,
            api::handlers::SignResponse,
            api::handlers::MineResponse,
            api::handlers::CandidateChain,
            api::handlers::NewWalletRequest,
            api::handlers::WalletResponse,
            api::handlers::BalanceResponse,
            api::handlers::DifficultyResponse,
            api::handlers::RewardResponse,
            api::handlers::HashDebugResponse
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work ledger API endpoints")
    ),
    info(
        title = "PoW Ledger API",
        version = "0.1.0",
        description = "A single-node proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Loads .env, which may set RUST_LOG
    let config = NodeConfig::from_env().context("invalid configuration")?;

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let ledger: api::LedgerData = web::Data::new(RwLock::new(initialize_blockchain(&config)?));

    info!("Starting HTTP server at http://{}:{}", config.host, config.port);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(ledger.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?
    .run()
    .await?;

    Ok(())
}
