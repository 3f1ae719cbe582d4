//! Integration tests for seqfuzz-core.
//!
//! These tests drive whole call sequences through the scheduler against a
//! `TestChain` and check where every call lands.

use std::sync::Arc;

use seqfuzz_core::calls::{
    execute_call_sequence, execute_call_sequence_iteratively,
    execute_call_sequence_with_execution_tracer, AbiMethod, AbiValue, CallData, CallMessage,
    CallSequence, CallSequenceElement, ExecuteOptions,
};
use seqfuzz_core::chain::{ChainAdapter, TestChain};
use seqfuzz_core::config::EngineConfig;
use seqfuzz_core::contracts::{ContractDefinition, ContractSetupHook, Contracts};
use seqfuzz_core::errors::{ChainError, SequenceExecutionError};
use seqfuzz_core::tracer::ExecutionTracer;
use seqfuzz_types::Address;

const SENDER: u64 = 0x1;
const DEPLOYER: u64 = 0x10000;

fn plain_call(to: u64, gas_limit: u64) -> CallMessage {
    CallMessage::new(
        Address::from_low_u64(SENDER),
        Some(Address::from_low_u64(to)),
        0,
        gas_limit,
        CallData::default(),
    )
}

fn plain_element(nd: u64, td: u64) -> CallSequenceElement {
    CallSequenceElement::new(None, plain_call(0xabc, 100_000), nd, td)
}

fn vault_contracts() -> (Contracts, Arc<ContractDefinition>) {
    let mut contracts = Contracts::new();
    let vault = contracts.push(
        ContractDefinition::new(
            "Vault",
            vec![
                AbiMethod::parse("deposit(uint256)").unwrap(),
                AbiMethod::parse("withdraw(uint256)").unwrap(),
            ],
        )
        .with_setup_hook(ContractSetupHook::new(
            AbiMethod::parse("setUp()").unwrap(),
            Address::from_low_u64(DEPLOYER),
        )),
    );
    (contracts, vault)
}

fn vault_element(
    vault: &Arc<ContractDefinition>,
    target: u64,
    amount: u128,
    nd: u64,
    td: u64,
) -> CallSequenceElement {
    let call = CallMessage::with_abi_values(
        Address::from_low_u64(SENDER),
        Some(Address::from_low_u64(target)),
        0,
        100_000,
        vault.method_by_name("deposit").unwrap().clone(),
        vec![AbiValue::Uint(amount)],
    )
    .unwrap();
    CallSequenceElement::new(Some(vault), call, nd, td)
}

fn placement(element: &CallSequenceElement) -> (u64, u64, usize) {
    let r = element.chain_reference.as_ref().expect("element executed");
    (r.block_number, r.block_timestamp, r.transaction_index)
}

#[test]
fn test_empty_sequence_commits_nothing() {
    let mut chain = TestChain::new(&EngineConfig::default());
    let executed = execute_call_sequence(&mut chain, CallSequence::new()).unwrap();

    assert!(executed.is_empty());
    assert_eq!(chain.blocks().len(), 1);
    assert!(chain.pending_block().is_none());
}

#[test]
fn test_delays_place_calls_into_expected_blocks() {
    let config = EngineConfig::default().with_genesis(100, 1000);
    let mut chain = TestChain::new(&config);
    let sequence: CallSequence = vec![
        plain_element(0, 0),
        plain_element(0, 0),
        plain_element(2, 2),
    ]
    .into();

    let executed = execute_call_sequence(&mut chain, sequence).unwrap();

    assert_eq!(placement(&executed[0]), (101, 1001, 0));
    assert_eq!(placement(&executed[1]), (101, 1001, 1));
    assert_eq!(placement(&executed[2]), (103, 1003, 0));
    assert!(chain.pending_block().is_none());
    assert_eq!(chain.head().header.number, 103);
}

#[test]
fn test_new_blocks_always_advance_and_number_never_outpaces_time() {
    let mut chain = TestChain::new(&EngineConfig::default());
    let sequence: CallSequence = vec![
        // Zero timestamp delay still advances by one second.
        plain_element(3, 0),
        // Number delay clamped to the timestamp delay.
        plain_element(5, 2),
        plain_element(1, 9),
    ]
    .into();

    let executed = execute_call_sequence(&mut chain, sequence).unwrap();

    assert_eq!(placement(&executed[0]), (1, 1, 0));
    assert_eq!(placement(&executed[1]), (3, 3, 0));
    assert_eq!(placement(&executed[2]), (4, 12, 0));

    let blocks = chain.blocks();
    for pair in blocks.windows(2) {
        let (prev, next) = (&pair[0].header, &pair[1].header);
        assert!(next.number > prev.number);
        assert!(next.timestamp > prev.timestamp);
        assert!(next.number - prev.number <= next.timestamp - prev.timestamp);
    }
}

#[test]
fn test_full_block_splits_deterministically() {
    let config = EngineConfig::default().with_block_gas_limit(100_000);
    let sequence: CallSequence = (0..7)
        .map(|_| CallSequenceElement::new(None, plain_call(0xabc, 50_000), 0, 0))
        .collect();

    let mut first = TestChain::new(&config);
    let a = execute_call_sequence(&mut first, sequence.clone()).unwrap();
    let mut second = TestChain::new(&config);
    let b = execute_call_sequence(&mut second, sequence).unwrap();

    // 21k used per call, 50k required: three calls per block.
    let placements: Vec<_> = a.iter().map(placement).collect();
    assert_eq!(
        placements,
        vec![
            (1, 1, 0),
            (1, 1, 1),
            (1, 1, 2),
            (2, 2, 0),
            (2, 2, 1),
            (2, 2, 2),
            (3, 3, 0),
        ]
    );
    assert_eq!(a, b);
    assert_eq!(first.head().hash, second.head().hash);
}

#[test]
fn test_call_larger_than_empty_block_fails() {
    let config = EngineConfig::default().with_block_gas_limit(100_000);
    let mut chain = TestChain::new(&config);
    let sequence: CallSequence = vec![
        CallSequenceElement::new(None, plain_call(0xabc, 50_000), 0, 0),
        CallSequenceElement::new(None, plain_call(0xabc, 200_000), 0, 0),
    ]
    .into();

    let failure = execute_call_sequence(&mut chain, sequence).unwrap_err();

    assert!(failure.error.is_capacity_exceeded());
    match &failure.error {
        SequenceExecutionError::BlockCapacityExceeded { index, source } => {
            assert_eq!(*index, 1);
            assert!(matches!(source, ChainError::BlockGasLimitReached { .. }));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(failure.executed.len(), 1);

    // The first block was committed to retry; the fresh one stays pending.
    assert_eq!(chain.head().header.number, 1);
    let pending = chain.pending_block().expect("pending block left open");
    assert_eq!(pending.header.number, 2);
    assert!(pending.transactions.is_empty());
}

#[test]
fn test_element_source_error_keeps_prefix() {
    let mut chain = TestChain::new(&EngineConfig::default());

    let failure = execute_call_sequence_iteratively(
        &mut chain,
        |i| {
            if i == 2 {
                anyhow::bail!("generator exhausted its corpus");
            }
            Ok(Some(plain_element(0, 0)))
        },
        ExecuteOptions::new(),
    )
    .unwrap_err();

    match &failure.error {
        SequenceExecutionError::ElementSource { index, source } => {
            assert_eq!(*index, 2);
            assert!(source.to_string().contains("corpus"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(failure.executed.len(), 2);
    assert!(failure.to_string().contains("2 element(s) executed"));

    // Nothing is committed on failure.
    assert_eq!(chain.blocks().len(), 1);
    assert_eq!(chain.pending_block().unwrap().transactions.len(), 2);
}

#[test]
fn test_continuation_check_stops_and_commits() {
    let mut chain = TestChain::new(&EngineConfig::default());
    let mut fetched = 0;

    let executed = execute_call_sequence_iteratively(
        &mut chain,
        |_| {
            fetched += 1;
            Ok(Some(plain_element(1, 1)))
        },
        ExecuteOptions::new().with_continuation(|executed| Ok(executed.len() >= 3)),
    )
    .unwrap();

    assert_eq!(executed.len(), 3);
    assert_eq!(fetched, 3);
    assert!(chain.pending_block().is_none());
    assert_eq!(chain.head().header.number, 3);
}

#[test]
fn test_continuation_check_error_is_reported() {
    let mut chain = TestChain::new(&EngineConfig::default());
    let sequence = vec![plain_element(0, 0), plain_element(0, 0)];
    let mut elements = sequence.into_iter();

    let failure = execute_call_sequence_iteratively(
        &mut chain,
        |_| Ok(elements.next()),
        ExecuteOptions::new().with_continuation(|_| anyhow::bail!("oracle crashed")),
    )
    .unwrap_err();

    assert!(matches!(
        failure.error,
        SequenceExecutionError::ContinuationCheck { index: 0, .. }
    ));
    // The element that triggered the check is part of the record.
    assert_eq!(failure.executed.len(), 1);
}

#[test]
fn test_setup_hook_runs_once_per_deployed_instance() {
    let (_contracts, vault) = vault_contracts();
    let mut chain = TestChain::new(&EngineConfig::default().with_genesis(10, 100));
    let sequence: CallSequence = vec![
        vault_element(&vault, 0xaaa, 1, 1, 5),
        vault_element(&vault, 0xaaa, 2, 0, 0),
        vault_element(&vault, 0xbbb, 3, 0, 0),
    ]
    .into();

    let executed = execute_call_sequence(&mut chain, sequence).unwrap();

    // hook(0xaaa), deposit(1), deposit(2), hook(0xbbb), deposit(3)
    assert_eq!(executed.len(), 5);
    let hook = vault.setup_hook.as_ref().unwrap();
    assert!(hook.matches(&executed[0].call));
    assert!(hook.matches(&executed[3].call));
    assert_eq!(executed[0].call.from, Address::from_low_u64(DEPLOYER));
    assert_eq!(executed[0].call.to, Some(Address::from_low_u64(0xaaa)));
    assert_eq!(executed[3].call.to, Some(Address::from_low_u64(0xbbb)));

    // The hook takes the element's delays; the element shares its block.
    assert_eq!(placement(&executed[0]), (11, 105, 0));
    assert_eq!(placement(&executed[1]), (11, 105, 1));
    assert_eq!(placement(&executed[2]), (11, 105, 2));
    assert_eq!(placement(&executed[3]), (11, 105, 3));
    assert_eq!(placement(&executed[4]), (11, 105, 4));

    // The hook element records the delays it was placed with.
    assert_eq!(executed[0].block_number_delay, 1);
    assert_eq!(executed[0].block_timestamp_delay, 5);
    assert_eq!(executed[1].block_number_delay, 0);
    assert_eq!(executed[1].block_timestamp_delay, 0);

    let chain_id = chain.instance_id();
    assert!(hook.has_fired(chain_id, Address::from_low_u64(0xaaa)));
    assert!(hook.has_fired(chain_id, Address::from_low_u64(0xbbb)));
}

#[test]
fn test_setup_hook_runs_again_on_fork() {
    let (_contracts, vault) = vault_contracts();
    let base = TestChain::new(&EngineConfig::default());

    let mut first = base.fork();
    let a = execute_call_sequence(
        &mut first,
        vec![vault_element(&vault, 0xaaa, 1, 1, 1)].into(),
    )
    .unwrap();
    let again = execute_call_sequence(
        &mut first,
        vec![vault_element(&vault, 0xaaa, 2, 1, 1)].into(),
    )
    .unwrap();

    let mut second = base.fork();
    let b = execute_call_sequence(
        &mut second,
        vec![vault_element(&vault, 0xaaa, 1, 1, 1)].into(),
    )
    .unwrap();

    assert_eq!(a.len(), 2);
    assert_eq!(again.len(), 1);
    assert_eq!(b.len(), 2);
}

#[test]
fn test_setup_hook_failure_is_wrapped() {
    let (_contracts, vault) = vault_contracts();
    let mut chain = TestChain::new(&EngineConfig::default());

    // Enough gas for the element's empty input but not the hook selector.
    let call = CallMessage::new(
        Address::from_low_u64(SENDER),
        Some(Address::from_low_u64(0xaaa)),
        0,
        21_010,
        CallData::default(),
    );
    let element = CallSequenceElement::new(Some(&vault), call, 1, 1);

    let failure = execute_call_sequence(&mut chain, vec![element].into()).unwrap_err();

    match &failure.error {
        SequenceExecutionError::SetupHook {
            index,
            contract,
            source,
        } => {
            assert_eq!(*index, 0);
            assert_eq!(contract, "Vault");
            assert!(matches!(
                **source,
                SequenceExecutionError::Chain(ChainError::IntrinsicGasTooLow { .. })
            ));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(failure.executed.is_empty());
    let hook = vault.setup_hook.as_ref().unwrap();
    assert!(!hook.has_fired(chain.instance_id(), Address::from_low_u64(0xaaa)));
}

#[test]
fn test_setup_hook_capacity_failure_keeps_placement_error() {
    let (_contracts, vault) = vault_contracts();
    let mut chain = TestChain::new(&EngineConfig::default().with_block_gas_limit(100_000));
    let mut element = vault_element(&vault, 0xaaa, 1, 1, 1);
    element.call.gas_limit = 200_000;

    let failure = execute_call_sequence(&mut chain, vec![element].into()).unwrap_err();

    assert!(failure.error.is_capacity_exceeded());
    match &failure.error {
        SequenceExecutionError::SetupHook { source, .. } => assert!(matches!(
            **source,
            SequenceExecutionError::BlockCapacityExceeded { index: 0, .. }
        )),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_setup_hook_and_call_split_on_capacity() {
    let (_contracts, vault) = vault_contracts();
    let mut chain = TestChain::new(&EngineConfig::default().with_block_gas_limit(100_000));

    // After the plain call 79k remains: the hook (70k) fits, then only ~58k
    // is left for the deposit.
    let mut deposit = vault_element(&vault, 0xaaa, 1, 0, 0);
    deposit.call.gas_limit = 70_000;
    let sequence: CallSequence = vec![
        CallSequenceElement::new(None, plain_call(0xabc, 50_000), 1, 1),
        deposit,
    ]
    .into();

    let executed = execute_call_sequence(&mut chain, sequence).unwrap();

    assert_eq!(executed.len(), 3);
    let hook = vault.setup_hook.as_ref().unwrap();
    assert!(hook.matches(&executed[1].call));
    assert_eq!(executed[2].call.gas_limit, 70_000);
    assert!(!hook.matches(&executed[2].call));

    assert_eq!(placement(&executed[0]), (1, 1, 0));
    assert_eq!(placement(&executed[1]), (1, 1, 1));
    // The deposit retries in a fresh block one step past the head.
    assert_eq!(placement(&executed[2]), (2, 2, 0));
    assert_eq!(executed[2].block_number_delay, 0);
    assert_eq!(executed[2].block_timestamp_delay, 0);

    assert_eq!(chain.head().header.number, 2);
    assert_eq!(chain.block(1).unwrap().transactions.len(), 2);
    assert!(hook.has_fired(chain.instance_id(), Address::from_low_u64(0xaaa)));
}

#[test]
fn test_setup_hook_reinjected_after_discarded_failure() {
    let (_contracts, vault) = vault_contracts();
    let mut chain = TestChain::new(&EngineConfig::default());
    let hook = vault.setup_hook.as_ref().unwrap();
    let target = Address::from_low_u64(0xaaa);

    // setUp() fits in 21_100 gas (21_064 intrinsic), deposit needs 21_204.
    let mut starved = vault_element(&vault, 0xaaa, 1, 1, 1);
    starved.call.gas_limit = 21_100;
    let failure = execute_call_sequence(&mut chain, vec![starved].into()).unwrap_err();

    assert!(matches!(
        failure.error,
        SequenceExecutionError::Chain(ChainError::IntrinsicGasTooLow { .. })
    ));
    assert_eq!(failure.executed.len(), 1);
    assert!(hook.matches(&failure.executed[0].call));
    // The hook's block was never committed.
    assert!(!hook.has_fired(chain.instance_id(), target));

    let discarded = chain.discard_pending_block().expect("pending block left open");
    assert_eq!(discarded.transactions.len(), 1);

    let executed = execute_call_sequence(
        &mut chain,
        vec![vault_element(&vault, 0xaaa, 1, 1, 1)].into(),
    )
    .unwrap();

    assert_eq!(executed.len(), 2);
    assert!(hook.matches(&executed[0].call));
    assert_eq!(placement(&executed[0]), (1, 1, 0));
    assert_eq!(placement(&executed[1]), (1, 1, 1));
    assert_eq!(chain.block(1).unwrap().transactions.len(), 2);
    assert!(hook.has_fired(chain.instance_id(), target));
}

#[test]
fn test_executed_record_replays_identically() {
    let (contracts, vault) = vault_contracts();
    let config = EngineConfig::default();
    let sequence: CallSequence = vec![
        vault_element(&vault, 0xaaa, 7, 2, 30),
        vault_element(&vault, 0xaaa, 8, 0, 0),
    ]
    .into();

    let mut original_chain = TestChain::new(&config);
    let executed = execute_call_sequence(&mut original_chain, sequence).unwrap();
    assert_eq!(executed.len(), 3);

    // Round trip through JSON as a saved reproducer would.
    let json = serde_json::to_string(&executed).unwrap();
    let mut loaded: CallSequence = serde_json::from_str(&json).unwrap();
    assert!(loaded.resolve_contracts(&contracts).is_empty());

    let mut replay_chain = TestChain::new(&config);
    let replayed = execute_call_sequence(&mut replay_chain, loaded.clone_unexecuted()).unwrap();

    // The recorded hook call is not injected a second time.
    assert_eq!(replayed.len(), executed.len());
    for (a, b) in executed.iter().zip(replayed.iter()) {
        assert_eq!(a.call, b.call);
        assert_eq!(a.chain_reference, b.chain_reference);
    }
    assert_eq!(original_chain.head().hash, replay_chain.head().hash);

    let hook = vault.setup_hook.as_ref().unwrap();
    assert!(hook.has_fired(replay_chain.instance_id(), Address::from_low_u64(0xaaa)));
}

#[test]
fn test_execution_tracer_traces_last_element_by_default() {
    let (contracts, vault) = vault_contracts();
    let mut chain = TestChain::new(&EngineConfig::default());
    let sequence: CallSequence = vec![
        vault_element(&vault, 0xaaa, 1, 1, 1),
        vault_element(&vault, 0xaaa, 2, 1, 1),
    ]
    .into();

    let executed =
        execute_call_sequence_with_execution_tracer(&mut chain, &contracts, sequence, false)
            .unwrap();

    assert_eq!(executed.len(), 3);
    assert!(executed[0].execution_trace.is_none());
    assert!(executed[1].execution_trace.is_none());
    let trace = executed[2].execution_trace.as_ref().unwrap();
    assert_eq!(trace.contract_name.as_deref(), Some("Vault"));
    assert_eq!(trace.method.as_deref(), Some("deposit(uint256)"));
    assert_eq!(
        trace.transaction_hash,
        executed[2].chain_reference.as_ref().unwrap().transaction_hash
    );
}

#[test]
fn test_execution_tracer_verbose_traces_every_element() {
    let (contracts, vault) = vault_contracts();
    let mut chain = TestChain::new(&EngineConfig::default());
    let sequence: CallSequence = vec![
        vault_element(&vault, 0xaaa, 1, 1, 1),
        vault_element(&vault, 0xaaa, 2, 0, 0),
    ]
    .into();

    let executed =
        execute_call_sequence_with_execution_tracer(&mut chain, &contracts, sequence, true)
            .unwrap();

    assert!(executed.iter().all(|e| e.execution_trace.is_some()));
    let hook_trace = executed[0].execution_trace.as_ref().unwrap();
    assert_eq!(hook_trace.method.as_deref(), Some("setUp()"));
    assert_eq!(hook_trace.from, Address::from_low_u64(DEPLOYER));
}

#[test]
fn test_execution_tracer_attaches_traces_on_failure() {
    let contracts = Contracts::new();
    let config = EngineConfig::default().with_block_gas_limit(100_000);
    let mut chain = TestChain::new(&config);
    let sequence: CallSequence = vec![
        CallSequenceElement::new(None, plain_call(0xabc, 50_000), 1, 1),
        CallSequenceElement::new(None, plain_call(0xabc, 500_000), 0, 0),
    ]
    .into();

    let failure =
        execute_call_sequence_with_execution_tracer(&mut chain, &contracts, sequence, false)
            .unwrap_err();

    assert_eq!(failure.executed.len(), 1);
    assert!(failure.executed[0].execution_trace.is_some());
}

#[test]
fn test_additional_tracers_see_every_transaction() {
    let (contracts, vault) = vault_contracts();
    let tracer = ExecutionTracer::new(contracts);
    let mut chain = TestChain::new(&EngineConfig::default());
    let sequence = vec![
        vault_element(&vault, 0xaaa, 1, 1, 1),
        vault_element(&vault, 0xbbb, 2, 1, 1),
    ];
    let mut elements = sequence.into_iter();

    let executed = execute_call_sequence_iteratively(
        &mut chain,
        |_| Ok(elements.next()),
        ExecuteOptions::new().with_tracer(tracer.native_tracer()),
    )
    .unwrap();

    // Two hooks plus two deposits.
    assert_eq!(executed.len(), 4);
    assert_eq!(tracer.trace_count(), 4);
    for element in &executed {
        let hash = element.chain_reference.as_ref().unwrap().transaction_hash;
        assert!(tracer.trace(&hash).is_some());
        assert!(chain.transaction(&hash).is_some());
    }
}
