use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use actix_web::{web, HttpResponse};
use log::info;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::ApiError;
use crate::blockchain::crypto;
use crate::blockchain::validator::{self, ValidationReport};
use crate::blockchain::{
    AccountBalance, AuditEntry, Block, Blockchain, ChainStats, CoinbaseReward, Transaction,
};

/// Shared ledger state. Queries take the read lock, mutations the write lock.
pub type LedgerData = web::Data<RwLock<Blockchain>>;

fn read_ledger(ledger: &LedgerData) -> Result<RwLockReadGuard<'_, Blockchain>, ApiError> {
    ledger.read().map_err(|_| ApiError::poisoned())
}

fn write_ledger(ledger: &LedgerData) -> Result<RwLockWriteGuard<'_, Blockchain>, ApiError> {
    ledger.write().map_err(|_| ApiError::poisoned())
}

/// Runs `f` under the read lock on the blocking pool. Mining holds the write
/// lock for its whole search, and lock waits stay off the request workers.
async fn query<F, R>(ledger: LedgerData, f: F) -> Result<R, ApiError>
where
    F: FnOnce(&Blockchain) -> R + Send + 'static,
    R: Send + 'static,
{
    web::block(move || -> Result<R, ApiError> {
        let guard = read_ledger(&ledger)?;
        Ok(f(&*guard))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
}

/// Runs `f` under the write lock on the blocking pool
async fn update<F, R>(ledger: LedgerData, f: F) -> Result<R, ApiError>
where
    F: FnOnce(&mut Blockchain) -> Result<R, ApiError> + Send + 'static,
    R: Send + 'static,
{
    web::block(move || -> Result<R, ApiError> {
        let mut guard = write_ledger(&ledger)?;
        f(&mut *guard)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
}

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub message: String,

    /// Size of the pending pool after admission
    pub mempool: usize,
}

/// Request for the sign endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SignRequest {
    /// Hex-encoded private key of the sender
    pub private_key: String,
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
}

/// Response for the sign endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SignResponse {
    pub signature: String,
    pub public_key: String,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Request for the candidate chain validation endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct CandidateChain {
    pub chain: Vec<Block>,
}

/// Request for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct NewWalletRequest {
    /// Amount credited to the new address through a coinbase transaction
    #[serde(default)]
    pub initial_balance: f64,
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    pub address: String,
    pub public_key: String,

    /// The wallet's private key (hex encoded). It is not stored anywhere.
    pub private_key: String,

    /// Amount credited on creation, pending until the next block
    pub initial_balance: f64,
}

/// Response for the balance endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: f64,
}

/// Response for the difficulty endpoints
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DifficultyResponse {
    pub difficulty: u32,
    pub min_difficulty: u32,
    pub max_difficulty: u32,
}

/// Response for the reward endpoints
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RewardResponse {
    pub min_reward: u64,
    pub max_reward: u64,

    /// Largest value accepted for `max_reward`
    pub reward_ceiling: u64,
}

/// Query of the set reward endpoint
#[derive(Serialize, Deserialize)]
pub struct RewardQuery {
    pub min_reward: u64,
    pub max_reward: u64,
}

/// Response for the hash debug endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HashDebugResponse {
    pub index: usize,

    /// Exact string fed to SHA-256
    pub preimage: String,
    pub stored_hash: String,
    pub calculated_hash: String,
    pub matches: bool,
}

/// Get the full blockchain
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let chain: Vec<Block> = query(ledger, |ledger| ledger.chain().to_vec()).await?;

    Ok(HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        chain,
    }))
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let pending: Vec<Transaction> =
        query(ledger, |ledger| ledger.pending_transactions().to_vec()).await?;
    Ok(HttpResponse::Ok().json(pending))
}

/// Submit a transaction
///
/// Admits a signed transaction (or a `COINBASE` credit) to the pending pool.
/// Every attempt is recorded in the transaction log.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = Transaction,
    responses(
        (status = 201, description = "Transaction added to the pending pool", body = TransactionResponse),
        (status = 400, description = "Transaction rejected"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn new_transaction(
    ledger: LedgerData,
    transaction: web::Json<Transaction>,
) -> Result<HttpResponse, ApiError> {
    let transaction = transaction.into_inner();
    let mempool = update(ledger, move |ledger| Ok(ledger.add_transaction(transaction)?)).await?;

    Ok(HttpResponse::Created().json(TransactionResponse {
        message: "Transaction added to mempool".to_string(),
        mempool,
    }))
}

/// Sign a transfer
///
/// Signs `{sender, receiver, amount}` with the given private key. Nothing is
/// submitted.
#[utoipa::path(
    post,
    path = "/api/v1/sign",
    request_body = SignRequest,
    responses(
        (status = 200, description = "Signature created", body = SignResponse),
        (status = 400, description = "Invalid private key")
    )
)]
pub async fn sign_transaction(request: web::Json<SignRequest>) -> Result<HttpResponse, ApiError> {
    let (signature, public_key) = crypto::sign_transfer(
        &request.private_key,
        &request.sender,
        &request.receiver,
        request.amount,
    )?;

    Ok(HttpResponse::Ok().json(SignResponse {
        signature,
        public_key,
    }))
}

/// Mine a new block
///
/// Seals the pending pool into a block paying a coinbase reward to the miner.
/// The ledger is locked for the whole proof-of-work search.
#[utoipa::path(
    post,
    path = "/api/v1/mine/{miner_address}",
    params(
        ("miner_address" = String, Path, description = "Address receiving the block reward")
    ),
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "Nothing was mined"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(
    ledger: LedgerData,
    miner_address: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let miner_address = miner_address.into_inner();

    let block = update(ledger, move |ledger| Ok(ledger.mine_block(&miner_address)?)).await?;

    Ok(HttpResponse::Ok().json(MineResponse {
        message: "New Block Mined".to_string(),
        block,
    }))
}

/// Validate the blockchain
///
/// Checks hashes, proof-of-work and linkage of every block
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Validation report", body = ValidationReport)
    )
)]
pub async fn validate_chain(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let report: ValidationReport = query(ledger, |ledger| ledger.validate()).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Validate a candidate chain
///
/// Runs the same checks over a chain supplied by the caller. The ledger is
/// not touched.
#[utoipa::path(
    post,
    path = "/api/v1/validate/chain",
    request_body = CandidateChain,
    responses(
        (status = 200, description = "Validation report", body = ValidationReport)
    )
)]
pub async fn validate_candidate_chain(candidate: web::Json<CandidateChain>) -> HttpResponse {
    HttpResponse::Ok().json(validator::validate_chain(&candidate.chain))
}

/// Create a new wallet
///
/// Creates a new wallet with a random keypair, optionally crediting it.
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    request_body(content = NewWalletRequest, description = "Optional initial balance"),
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse),
        (status = 400, description = "Initial balance rejected")
    )
)]
pub async fn create_wallet(
    ledger: LedgerData,
    request: Option<web::Json<NewWalletRequest>>,
) -> Result<HttpResponse, ApiError> {
    let (private_key, public_key, address) = crypto::generate_identity();
    let initial_balance = request.map(|r| r.initial_balance).unwrap_or(0.0);

    if initial_balance != 0.0 {
        let receiver = address.clone();
        update(ledger, move |ledger| Ok(ledger.credit(&receiver, initial_balance)?)).await?;
    }
    info!("Created wallet {}", address);

    Ok(HttpResponse::Created().json(WalletResponse {
        address,
        public_key,
        private_key,
        initial_balance,
    }))
}

/// Get an address balance
///
/// Replays the confirmed chain and the pending pool
#[utoipa::path(
    get,
    path = "/api/v1/balance/{address}",
    params(
        ("address" = String, Path, description = "Address to look up")
    ),
    responses(
        (status = 200, description = "Balance retrieved successfully", body = BalanceResponse)
    )
)]
pub async fn get_balance(
    ledger: LedgerData,
    address: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let address = address.into_inner();
    let lookup = address.clone();
    let balance = query(ledger, move |ledger| ledger.balance(&lookup)).await?;

    Ok(HttpResponse::Ok().json(BalanceResponse { address, balance }))
}

/// Get all accounts
///
/// Returns every address seen on the ledger with its balance
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    responses(
        (status = 200, description = "Accounts retrieved successfully", body = Vec<AccountBalance>)
    )
)]
pub async fn get_all_accounts(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let accounts: Vec<AccountBalance> = query(ledger, |ledger| ledger.accounts()).await?;
    Ok(HttpResponse::Ok().json(accounts))
}

#[utoipa::path(
    get,
    path = "/api/v1/stats",
    responses(
        (status = 200, description = "Ledger statistics", body = ChainStats)
    )
)]
pub async fn get_stats(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let stats: ChainStats = query(ledger, |ledger| ledger.stats()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// List block rewards
#[utoipa::path(
    get,
    path = "/api/v1/coinbase",
    responses(
        (status = 200, description = "Coinbase transactions on the chain", body = Vec<CoinbaseReward>)
    )
)]
pub async fn get_coinbase_rewards(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let rewards: Vec<CoinbaseReward> = query(ledger, |ledger| ledger.coinbase_rewards()).await?;
    Ok(HttpResponse::Ok().json(rewards))
}

/// Get the transaction log
///
/// Every admission attempt with its outcome, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/txlog",
    responses(
        (status = 200, description = "Transaction log", body = Vec<AuditEntry>)
    )
)]
pub async fn get_transaction_log(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let log: Vec<AuditEntry> = query(ledger, |ledger| ledger.audit_log().to_vec()).await?;
    Ok(HttpResponse::Ok().json(log))
}

fn difficulty_response(ledger: &Blockchain) -> DifficultyResponse {
    DifficultyResponse {
        difficulty: ledger.difficulty(),
        min_difficulty: ledger.config().min_difficulty,
        max_difficulty: ledger.config().max_difficulty,
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/difficulty",
    responses(
        (status = 200, description = "Current difficulty", body = DifficultyResponse)
    )
)]
pub async fn get_difficulty(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let response = query(ledger, difficulty_response).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Set the difficulty
///
/// Applies to blocks mined from now on
#[utoipa::path(
    post,
    path = "/api/v1/difficulty/{value}",
    params(
        ("value" = u32, Path, description = "Required leading zero hex characters")
    ),
    responses(
        (status = 200, description = "Difficulty updated", body = DifficultyResponse),
        (status = 400, description = "Difficulty out of range")
    )
)]
pub async fn set_difficulty(
    ledger: LedgerData,
    value: web::Path<u32>,
) -> Result<HttpResponse, ApiError> {
    let value = value.into_inner();
    let response = update(ledger, move |ledger| {
        ledger.set_difficulty(value)?;
        Ok(difficulty_response(ledger))
    })
    .await?;
    Ok(HttpResponse::Ok().json(response))
}

fn reward_response(ledger: &Blockchain) -> RewardResponse {
    let range = ledger.reward_range();
    RewardResponse {
        min_reward: range.min,
        max_reward: range.max,
        reward_ceiling: ledger.config().max_reward,
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/reward",
    responses(
        (status = 200, description = "Current reward range", body = RewardResponse)
    )
)]
pub async fn get_reward(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let response = query(ledger, reward_response).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Set the reward range
#[utoipa::path(
    post,
    path = "/api/v1/reward",
    params(
        ("min_reward" = u64, Query, description = "Smallest reward, inclusive"),
        ("max_reward" = u64, Query, description = "Largest reward, inclusive")
    ),
    responses(
        (status = 200, description = "Reward range updated", body = RewardResponse),
        (status = 400, description = "Invalid reward range")
    )
)]
pub async fn set_reward(
    ledger: LedgerData,
    params: web::Query<RewardQuery>,
) -> Result<HttpResponse, ApiError> {
    let RewardQuery {
        min_reward,
        max_reward,
    } = params.into_inner();
    let response = update(ledger, move |ledger| {
        ledger.set_reward_range(min_reward, max_reward)?;
        Ok(reward_response(ledger))
    })
    .await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Show how a block hash is computed
///
/// Returns the exact preimage of the block hash next to the stored and
/// recomputed hashes
#[utoipa::path(
    get,
    path = "/api/v1/debug/hash/{index}",
    params(
        ("index" = usize, Path, description = "Position of the block in the chain")
    ),
    responses(
        (status = 200, description = "Hash breakdown", body = HashDebugResponse),
        (status = 404, description = "No block at this position")
    )
)]
pub async fn debug_block_hash(
    ledger: LedgerData,
    index: web::Path<usize>,
) -> Result<HttpResponse, ApiError> {
    let index = index.into_inner();
    let block = query(ledger, move |ledger| ledger.chain().get(index).cloned())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Block {} not found", index)))?;

    Ok(HttpResponse::Ok().json(HashDebugResponse {
        index,
        preimage: block.hash_preimage(),
        matches: block.has_consistent_hash(),
        calculated_hash: block.calculate_hash(),
        stored_hash: block.hash,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::configure_routes;
    use crate::blockchain::params::DEFAULT_GENESIS_ADDRESS;
    use crate::blockchain::crypto::Wallet;
    use crate::blockchain::LedgerConfig;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;

    fn test_ledger() -> LedgerData {
        let config = LedgerConfig {
            initial_difficulty: 1,
            ..LedgerConfig::default()
        };
        web::Data::new(RwLock::new(Blockchain::new(config).unwrap()))
    }

    macro_rules! init_app {
        ($ledger:expr) => {
            test::init_service(
                App::new()
                    .app_data($ledger.clone())
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_get_chain_returns_genesis() {
        let ledger = test_ledger();
        let app = init_app!(ledger);

        let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["length"], 1);
        assert_eq!(body["chain"][0]["index"], 0);
        assert_eq!(body["chain"][0]["transactions"][0]["sender"], "GENESIS");
        assert_eq!(
            body["chain"][0]["transactions"][0]["receiver"],
            DEFAULT_GENESIS_ADDRESS
        );
    }

    #[actix_web::test]
    async fn test_sign_submit_and_mine() {
        let ledger = test_ledger();
        let app = init_app!(ledger);
        let wallet = Wallet::generate();
        ledger.write().unwrap().credit(wallet.address(), 40.0).unwrap();

        let req = test::TestRequest::post()
            .uri("/api/v1/sign")
            .set_json(serde_json::json!({
                "private_key": wallet.private_key_hex(),
                "sender": wallet.address(),
                "receiver": "bob",
                "amount": 15
            }))
            .to_request();
        let signed: SignResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(signed.public_key, wallet.public_key_hex());

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(serde_json::json!({
                "sender": wallet.address(),
                "receiver": "bob",
                "amount": 15,
                "signature": signed.signature,
                "public_key": signed.public_key
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: TransactionResponse = test::read_body_json(resp).await;
        assert_eq!(body.mempool, 2);

        let req = test::TestRequest::post()
            .uri("/api/v1/mine/minerB")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let mined: MineResponse = test::read_body_json(resp).await;
        assert_eq!(mined.block.index, 1);
        assert_eq!(mined.block.transactions[0].receiver, "minerB");
        assert_eq!(mined.block.transactions.len(), 3);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/balance/{}", wallet.address()))
            .to_request();
        let balance: BalanceResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance.balance, 25.0);

        let req = test::TestRequest::get().uri("/api/v1/validate").to_request();
        let report: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(report["valid"], true);
        assert_eq!(report["total_blocks"], 2);
    }

    #[actix_web::test]
    async fn test_rejected_transaction_is_logged() {
        let ledger = test_ledger();
        let app = init_app!(ledger);
        let wallet = Wallet::generate();
        let tx = Transaction::signed(&wallet, "bob", 5.0);

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(&tx)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Insufficient balance"));

        let req = test::TestRequest::get().uri("/api/v1/txlog").to_request();
        let log: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(log.as_array().unwrap().len(), 1);
        assert_eq!(log[0]["status"], "FAILED");
        assert_eq!(log[0]["reason"], "Insufficient balance");
        assert_eq!(log[0]["tx"]["receiver"], "bob");
    }

    #[actix_web::test]
    async fn test_sign_with_bad_key_is_rejected() {
        let app = init_app!(test_ledger());

        let req = test::TestRequest::post()
            .uri("/api/v1/sign")
            .set_json(serde_json::json!({
                "private_key": "not-hex",
                "sender": "a",
                "receiver": "b",
                "amount": 1.0
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_create_wallet_with_initial_balance() {
        let ledger = test_ledger();
        let app = init_app!(ledger);

        let req = test::TestRequest::post()
            .uri("/api/v1/wallet/new")
            .set_json(serde_json::json!({ "initial_balance": 50 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let wallet: WalletResponse = test::read_body_json(resp).await;

        assert_eq!(wallet.address.len(), 40);
        assert_eq!(
            Wallet::from_private_key_hex(&wallet.private_key)
                .unwrap()
                .address(),
            wallet.address
        );

        let ledger = ledger.read().unwrap();
        assert_eq!(ledger.balance(&wallet.address), 50.0);
        assert!(ledger.pending_transactions()[0].is_coinbase());
    }

    #[actix_web::test]
    async fn test_create_wallet_without_body() {
        let ledger = test_ledger();
        let app = init_app!(ledger);

        let req = test::TestRequest::post().uri("/api/v1/wallet/new").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(ledger.read().unwrap().pending_transactions().is_empty());
    }

    #[actix_web::test]
    async fn test_validate_candidate_chain_reports_tampering() {
        let ledger = test_ledger();
        ledger.write().unwrap().mine_block("miner").unwrap();
        let app = init_app!(ledger);

        let mut chain = ledger.read().unwrap().chain().to_vec();
        chain[1].transactions[0].amount = 1_000_000.0;

        let req = test::TestRequest::post()
            .uri("/api/v1/validate/chain")
            .set_json(serde_json::json!({ "chain": chain }))
            .to_request();
        let report: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(report["valid"], false);
        assert_eq!(report["invalid_blocks"], serde_json::json!([1]));
        assert_eq!(report["errors"][0]["kind"], "hash-mismatch");
        assert!(ledger.read().unwrap().validate().valid);
    }

    #[actix_web::test]
    async fn test_difficulty_endpoints() {
        let ledger = test_ledger();
        let app = init_app!(ledger);

        let req = test::TestRequest::post()
            .uri("/api/v1/difficulty/2")
            .to_request();
        let body: DifficultyResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.difficulty, 2);

        let req = test::TestRequest::post()
            .uri("/api/v1/difficulty/11")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/v1/difficulty").to_request();
        let body: DifficultyResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.difficulty, 2);
        assert_eq!(body.max_difficulty, 10);
    }

    #[actix_web::test]
    async fn test_reward_endpoints() {
        let ledger = test_ledger();
        let app = init_app!(ledger);

        let req = test::TestRequest::post()
            .uri("/api/v1/reward?min_reward=5&max_reward=3")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/reward?min_reward=8&max_reward=8")
            .to_request();
        let body: RewardResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!((body.min_reward, body.max_reward), (8, 8));

        let req = test::TestRequest::post()
            .uri("/api/v1/mine/miner")
            .to_request();
        let mined: MineResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(mined.block.transactions[0].amount, 8.0);

        let req = test::TestRequest::get().uri("/api/v1/coinbase").to_request();
        let rewards: Vec<CoinbaseReward> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].block_index, 1);
    }

    #[actix_web::test]
    async fn test_views() {
        let ledger = test_ledger();
        ledger.write().unwrap().credit("alice", 2.0).unwrap();
        let app = init_app!(ledger);

        let req = test::TestRequest::get().uri("/api/v1/accounts").to_request();
        let accounts: Vec<AccountBalance> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(accounts.len(), 2);

        let req = test::TestRequest::get().uri("/api/v1/stats").to_request();
        let stats: ChainStats = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats.total_blocks, 1);
        assert_eq!(stats.pending_transactions, 1);

        let req = test::TestRequest::get()
            .uri("/api/v1/transactions/pending")
            .to_request();
        let pending: Vec<Transaction> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending[0].receiver, "alice");
    }

    #[actix_web::test]
    async fn test_balance_read_waits_for_pending_write() {
        let ledger = test_ledger();
        let app = init_app!(ledger);

        let held = ledger.clone();
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let writer = std::thread::spawn(move || {
            let mut guard = held.write().unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(100));
            guard.credit("alice", 3.0).unwrap();
        });
        locked_rx.recv().unwrap();

        let req = test::TestRequest::get()
            .uri("/api/v1/balance/alice")
            .to_request();
        let balance: BalanceResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance.balance, 3.0);

        writer.join().unwrap();
    }

    #[actix_web::test]
    async fn test_debug_hash() {
        let app = init_app!(test_ledger());

        let req = test::TestRequest::get().uri("/api/v1/debug/hash/0").to_request();
        let body: HashDebugResponse = test::call_and_read_body_json(&app, req).await;
        assert!(body.matches);
        assert_eq!(crypto::sha256_hex(body.preimage.as_bytes()), body.stored_hash);

        let req = test::TestRequest::get().uri("/api/v1/debug/hash/7").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
