//! Solana session: RPC-backed broadcast channel, transaction construction
//! and the startup account check.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use pusher_delivery::{BroadcastChannel, DeliveryError, TxStatus};
use pusher_types::{Commitment, PriceObservation};
use pusher_wire::account::OracleAccount;
use pusher_wire::instruction::UpdateInstruction;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signature, Signer, SignerError};
use solana_sdk::transaction::Transaction;
use tracing::{info, warn};

use crate::config::PusherConfig;
use crate::error::PusherError;
use crate::publisher::{Connector, Session};
use crate::sources::{self, ObservationSource};

pub fn commitment_config(commitment: Commitment) -> CommitmentConfig {
    match commitment {
        Commitment::Processed => CommitmentConfig::processed(),
        Commitment::Confirmed => CommitmentConfig::confirmed(),
        Commitment::Finalized => CommitmentConfig::finalized(),
    }
}

/// [`BroadcastChannel`] over a non-blocking JSON-RPC client.
pub struct SolanaChannel {
    client: RpcClient,
}

impl SolanaChannel {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }
}

#[async_trait]
impl BroadcastChannel for SolanaChannel {
    type Tx = Transaction;
    type TxId = Signature;

    fn transaction_id(&self, tx: &Transaction) -> Signature {
        // The first signature is the fee payer's and names the transaction.
        tx.signatures.first().copied().unwrap_or_default()
    }

    async fn broadcast(&self, tx: &Transaction) -> pusher_delivery::Result<Signature> {
        // Preflight would reject a rebroadcast of an already-landed transaction.
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            max_retries: Some(0),
            ..Default::default()
        };
        self.client
            .send_transaction_with_config(tx, config)
            .await
            .map_err(|e| DeliveryError::Broadcast(e.to_string()))
    }

    async fn query_status(
        &self,
        id: &Signature,
        commitment: Commitment,
    ) -> pusher_delivery::Result<Option<TxStatus>> {
        let status = self
            .client
            .get_signature_status_with_commitment(id, commitment_config(commitment))
            .await
            .map_err(|e| DeliveryError::Status(e.to_string()))?;
        Ok(status.map(|result| match result {
            Ok(()) => TxStatus::Confirmed,
            Err(e) => TxStatus::Failed(e.to_string()),
        }))
    }
}

/// Build and sign an update transaction.
///
/// The single account meta is the oracle data account, writable and signing.
/// The payer and oracle signatures are deduplicated when they are the same key.
pub fn update_transaction(
    program_id: &Pubkey,
    payer: &Keypair,
    oracle: &Keypair,
    update: &UpdateInstruction,
    recent_blockhash: Hash,
) -> Result<Transaction, SignerError> {
    let instruction = Instruction::new_with_bytes(
        *program_id,
        &update.pack(),
        vec![AccountMeta::new(oracle.pubkey(), true)],
    );
    let mut tx = Transaction::new_with_payer(&[instruction], Some(&payer.pubkey()));
    let signers: Vec<&Keypair> = if oracle.pubkey() == payer.pubkey() {
        vec![payer]
    } else {
        vec![payer, oracle]
    };
    tx.try_sign(signers.as_slice(), recent_blockhash)?;
    Ok(tx)
}

/// A live connection to one RPC node plus everything needed to publish.
pub struct SolanaSession {
    channel: Arc<SolanaChannel>,
    payer: Keypair,
    oracle: Keypair,
    program_id: Pubkey,
    source: Box<dyn ObservationSource>,
}

#[async_trait]
impl Session for SolanaSession {
    type Channel = SolanaChannel;

    fn channel(&self) -> Arc<SolanaChannel> {
        Arc::clone(&self.channel)
    }

    async fn observe(&self) -> anyhow::Result<Option<PriceObservation>> {
        self.source.observe().await
    }

    async fn build_update(&self, update: &UpdateInstruction) -> anyhow::Result<Transaction> {
        let blockhash = self
            .channel
            .client()
            .get_latest_blockhash()
            .await
            .context("fetching recent blockhash")?;
        update_transaction(&self.program_id, &self.payer, &self.oracle, update, blockhash)
            .context("signing update transaction")
    }
}

/// Opens [`SolanaSession`]s from the pusher configuration.
pub struct SolanaConnector {
    config: PusherConfig,
}

impl SolanaConnector {
    pub fn new(config: PusherConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for SolanaConnector {
    type Session = SolanaSession;

    async fn connect(&self) -> Result<SolanaSession, PusherError> {
        let cfg = &self.config;
        let program_id = cfg.program_id()?;
        let payer = load_keypair(&cfg.accounts.payer_keypair)?;
        let oracle = load_keypair(&cfg.accounts.oracle_keypair)?;
        let commitment = commitment_config(cfg.network.commitment);

        let client = RpcClient::new_with_timeout_and_commitment(
            cfg.network.rpc_url.clone(),
            cfg.request_timeout(),
            commitment,
        );
        let version = client
            .get_version()
            .await
            .with_context(|| format!("querying {}", cfg.network.rpc_url))
            .map_err(PusherError::Session)?;
        info!(
            rpc_url = %cfg.network.rpc_url,
            node_version = %version.solana_core,
            payer = %payer.pubkey(),
            oracle = %oracle.pubkey(),
            "connected to RPC node"
        );

        check_oracle_account(&client, &oracle.pubkey(), &program_id, commitment).await?;
        let source = sources::build(&cfg.source)?;

        Ok(SolanaSession {
            channel: Arc::new(SolanaChannel::new(client)),
            payer,
            oracle,
            program_id,
            source,
        })
    }
}

fn load_keypair(path: &Path) -> Result<Keypair, PusherError> {
    read_keypair_file(path)
        .map_err(|e| PusherError::Config(format!("reading keypair {}: {e}", path.display())))
}

/// Refuse to run against an account the program would reject.
async fn check_oracle_account(
    client: &RpcClient,
    oracle: &Pubkey,
    program_id: &Pubkey,
    commitment: CommitmentConfig,
) -> Result<(), PusherError> {
    let account = client
        .get_account_with_commitment(oracle, commitment)
        .await
        .with_context(|| format!("fetching oracle account {oracle}"))
        .map_err(PusherError::Session)?
        .value
        .ok_or_else(|| PusherError::Config(format!("oracle account {oracle} does not exist")))?;

    check_owner(oracle, &account.owner, program_id)?;

    match OracleAccount::unpack(&account.data) {
        Ok(state) => info!(
            oracle = %oracle,
            price = state.price_f64(),
            confidence = state.confidence_f64(),
            status = %state.price_status(),
            timestamp = state.timestamp,
            publish_slot = state.publish_slot,
            "on-chain oracle state"
        ),
        Err(e) => warn!(oracle = %oracle, error = %e, "oracle account not initialised"),
    }
    Ok(())
}

fn check_owner(oracle: &Pubkey, owner: &Pubkey, program_id: &Pubkey) -> Result<(), PusherError> {
    if owner != program_id {
        return Err(PusherError::Config(format!(
            "oracle account {oracle} is owned by {owner}, expected program {program_id}"
        )));
    }
    Ok(())
}
