//! Integration test: observation to on-chain account.
//!
//! Drives one publish through the whole pipeline against a simulated chain
//! that applies update instructions to an in-memory oracle account:
//! 1. Decision policy accepts the first observation
//! 2. The update is encoded in the fixed instruction layout
//! 3. The delivery protocol broadcasts until the chain confirms
//! 4. The account is decoded and checked against what was submitted

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pusher_delivery::{
    deliver, spawn_delivery, BroadcastChannel, DeliveryConfig, DeliveryError, DeliveryOutcome,
    TxStatus,
};
use pusher_policy::{should_publish, OracleState, PolicyConfig, PublishReason};
use pusher_types::{Commitment, PriceObservation, PriceStatus};
use pusher_wire::account::{OracleAccount, ORACLE_ACCOUNT_LEN, ORACLE_MAGIC};
use pusher_wire::instruction::UpdateInstruction;

/// A signed transaction as the simulated chain sees it.
#[derive(Debug, Clone)]
struct SignedUpdate {
    id: u64,
    data: Vec<u8>,
}

/// In-memory chain holding a single oracle account.
///
/// The first `drop_first` broadcasts are lost. A landed transaction whose
/// instruction does not decode is recorded as failed.
struct SimulatedChain {
    drop_first: u32,
    broadcasts: AtomicU32,
    account: Mutex<Vec<u8>>,
    landed: Mutex<HashSet<u64>>,
    failed: Mutex<HashMap<u64, String>>,
}

impl SimulatedChain {
    fn new(drop_first: u32) -> Self {
        let mut account = vec![0u8; ORACLE_ACCOUNT_LEN];
        account[0..4].copy_from_slice(&ORACLE_MAGIC.to_le_bytes());
        account[4..8].copy_from_slice(&2u32.to_le_bytes());
        account[20..24].copy_from_slice(&(-8i32).to_le_bytes());
        Self {
            drop_first,
            broadcasts: AtomicU32::new(0),
            account: Mutex::new(account),
            landed: Mutex::new(HashSet::new()),
            failed: Mutex::new(HashMap::new()),
        }
    }

    fn oracle(&self) -> OracleAccount {
        let data = self.account.lock().expect("account lock");
        OracleAccount::unpack(&data).expect("account decodes")
    }

    /// Write current and previous fields the way the program does.
    fn apply(&self, update: &UpdateInstruction, slot: u64) {
        let mut data = self.account.lock().expect("account lock");
        let timestamp = 1_700_000_000i64 + slot as i64;
        data[32..40].copy_from_slice(&slot.to_le_bytes());
        data[96..104].copy_from_slice(&timestamp.to_le_bytes());
        data[176..184].copy_from_slice(&slot.to_le_bytes());
        data[184..192].copy_from_slice(&update.price.to_le_bytes());
        data[192..200].copy_from_slice(&update.confidence.to_le_bytes());
        data[200..208].copy_from_slice(&timestamp.to_le_bytes());
        data[208..216].copy_from_slice(&update.price.to_le_bytes());
        data[216..224].copy_from_slice(&update.confidence.to_le_bytes());
        data[224..228].copy_from_slice(&update.status.to_le_bytes());
        data[232..240].copy_from_slice(&slot.to_le_bytes());
    }
}

#[async_trait]
impl BroadcastChannel for SimulatedChain {
    type Tx = SignedUpdate;
    type TxId = u64;

    fn transaction_id(&self, tx: &SignedUpdate) -> u64 {
        tx.id
    }

    async fn broadcast(&self, tx: &SignedUpdate) -> pusher_delivery::Result<u64> {
        let n = self.broadcasts.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.drop_first {
            return Err(DeliveryError::Broadcast("packet lost".into()));
        }
        let first_landing = self.landed.lock().expect("landed lock").insert(tx.id);
        if first_landing {
            match UpdateInstruction::unpack(&tx.data) {
                Ok(update) => self.apply(&update, u64::from(n)),
                Err(e) => {
                    self.failed
                        .lock()
                        .expect("failed lock")
                        .insert(tx.id, e.to_string());
                }
            }
        }
        Ok(tx.id)
    }

    async fn query_status(
        &self,
        id: &u64,
        _commitment: Commitment,
    ) -> pusher_delivery::Result<Option<TxStatus>> {
        if let Some(reason) = self.failed.lock().expect("failed lock").get(id) {
            return Ok(Some(TxStatus::Failed(reason.clone())));
        }
        if self.landed.lock().expect("landed lock").contains(id) {
            return Ok(Some(TxStatus::Confirmed));
        }
        Ok(None)
    }
}

#[tokio::test(start_paused = true)]
async fn observation_lands_in_oracle_account() {
    let policy = PolicyConfig {
        update_threshold: 1.0,
        update_interval: Duration::from_secs(60),
        ..PolicyConfig::default()
    };
    let chain = SimulatedChain::new(0);
    let mut state = OracleState::new();
    let t0 = Instant::now();

    // =========================================================
    // Step 1: First observation is always published
    // =========================================================
    let obs = PriceObservation::from_quotes(101.0, 101.5, t0);
    let decision = should_publish(&obs, &state, &policy, t0);
    assert!(decision.publish);
    assert_eq!(decision.reason, Some(PublishReason::Baseline));
    assert_eq!(decision.status, PriceStatus::Valid);

    // =========================================================
    // Step 2: Encode and deliver
    // =========================================================
    let update = UpdateInstruction::from_price(decision.price, 0.05, decision.status)
        .expect("price fits the wire format");
    let tx = SignedUpdate {
        id: 1,
        data: update.pack(),
    };
    let result = deliver(&chain, tx, &DeliveryConfig::default()).await;
    assert!(result.confirmed(), "delivery should confirm: {:?}", result.outcome);
    assert_eq!(result.broadcasts, 1);
    state.record_submission(decision.price, decision.status, t0);

    // =========================================================
    // Step 3: Account reflects the submitted update
    // =========================================================
    let oracle = chain.oracle();
    assert_eq!(oracle.price, 10_125_000_000);
    assert_eq!(oracle.confidence, 500);
    assert_eq!(oracle.price_status(), PriceStatus::Valid);
    assert_eq!(oracle.previous_price, oracle.price);
    assert_eq!(oracle.exponent, pusher_types::PRICE_EXPONENT);
    assert_eq!(oracle.price_f64(), decision.price);

    // =========================================================
    // Step 4: A small move a second later is not published
    // =========================================================
    let t1 = t0 + Duration::from_secs(1);
    let obs = PriceObservation::reference(101.3, t1);
    assert!(!should_publish(&obs, &state, &policy, t1).publish);
}

#[tokio::test(start_paused = true)]
async fn lost_broadcasts_recovered_by_rebroadcast() {
    let chain = SimulatedChain::new(3);
    let update = UpdateInstruction::from_price(42.0, 0.0, PriceStatus::Valid).expect("encode");
    let tx = SignedUpdate {
        id: 9,
        data: update.pack(),
    };

    let result = deliver(&chain, tx, &DeliveryConfig::default()).await;

    // Broadcasts at 0s, 5s and 10s are lost; the one at 15s lands.
    assert!(result.confirmed());
    assert_eq!(result.broadcasts, 4);
    assert_eq!(result.elapsed, Duration::from_secs(15));
    assert_eq!(chain.oracle().price, 4_200_000_000);
}

#[tokio::test(start_paused = true)]
async fn malformed_instruction_rejected_without_rebroadcast() {
    let chain = SimulatedChain::new(0);
    let tx = SignedUpdate {
        id: 3,
        data: vec![7, 1, 2, 3],
    };

    let result = deliver(&chain, tx, &DeliveryConfig::default()).await;

    assert!(matches!(result.outcome, DeliveryOutcome::Rejected(_)));
    assert_eq!(result.broadcasts, 1);
    assert_eq!(result.polls, 1);
    assert_eq!(chain.oracle().price, 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_deliveries_are_independent() {
    let chain = Arc::new(SimulatedChain::new(0));
    let first = UpdateInstruction::from_price(10.0, 0.0, PriceStatus::Valid).expect("encode");
    let second = UpdateInstruction::from_price(11.0, 0.0, PriceStatus::Valid).expect("encode");

    let a = spawn_delivery(
        Arc::clone(&chain),
        SignedUpdate {
            id: 1,
            data: first.pack(),
        },
        DeliveryConfig::default(),
    );
    let b = spawn_delivery(
        Arc::clone(&chain),
        SignedUpdate {
            id: 2,
            data: second.pack(),
        },
        DeliveryConfig::default(),
    );

    let a = a.await.expect("join first");
    let b = b.await.expect("join second");
    assert!(a.confirmed());
    assert!(b.confirmed());
    assert_eq!((a.id, b.id), (1, 2));

    let price = chain.oracle().price;
    assert!(price == first.price || price == second.price);
}
