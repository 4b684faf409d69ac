use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/chain", web::get().to(handlers::get_chain))
            .route("/transactions/pending", web::get().to(handlers::get_pending_transactions))
            .route("/transactions/new", web::post().to(handlers::new_transaction))
            .route("/sign", web::post().to(handlers::sign_transaction))
            .route("/mine/{miner_address}", web::post().to(handlers::mine_block))
            .route("/validate", web::get().to(handlers::validate_chain))
            .route("/validate/chain", web::post().to(handlers::validate_candidate_chain))
            .route("/wallet/new", web::post().to(handlers::create_wallet))
            .route("/balance/{address}", web::get().to(handlers::get_balance))
            .route("/accounts", web::get().to(handlers::get_all_accounts))
            .route("/stats", web::get().to(handlers::get_stats))
            .route("/coinbase", web::get().to(handlers::get_coinbase_rewards))
            .route("/txlog", web::get().to(handlers::get_transaction_log))
            .route("/difficulty", web::get().to(handlers::get_difficulty))
            .route("/difficulty/{value}", web::post().to(handlers::set_difficulty))
            .route("/reward", web::get().to(handlers::get_reward))
            .route("/reward", web::post().to(handlers::set_reward))
            .route("/debug/hash/{index}", web::get().to(handlers::debug_block_hash))
    );
}
