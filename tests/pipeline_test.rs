//! End-to-end runs of the replay pipeline over inline traces
//!
//! Every external capability is mocked; nothing here touches the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Selector};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use rewind::config::{Config, ContractAbiSpec};
use rewind::domain::abi::selector_of;
use rewind::infrastructure::abi::{RegistrySignature, SignatureRegistry, SignatureResolver};
use rewind::infrastructure::ethereum::{TokenDescription, TokenEnrichment};
use rewind::{ReplayOutput, ReplayPipeline, RewindError, RunOptions};

const MAIN: &str = "0x1111111111111111111111111111111111111111";
const RECIPIENT: &str = "2222222222222222222222222222222222222222";
const TOKEN: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const TOKEN_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const LENDER: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

struct MapRegistry {
    name: &'static str,
    answers: HashMap<Selector, &'static str>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SignatureRegistry for MapRegistry {
    fn name(&self) -> &str {
        self.name
    }

    async fn lookup(&self, selector: Selector) -> Result<Option<RegistrySignature>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .answers
            .get(&selector)
            .and_then(|text| RegistrySignature::from_text(text)))
    }
}

fn registry(name: &'static str, signatures: &[&'static str]) -> (Arc<dyn SignatureRegistry>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let answers = signatures.iter().map(|sig| (selector_of(sig), *sig)).collect();
    let registry: Arc<dyn SignatureRegistry> = Arc::new(MapRegistry {
        name,
        answers,
        calls: calls.clone(),
    });
    (registry, calls)
}

/// Resolver backed by a primary that knows `signatures` and an empty secondary
fn resolver(signatures: &[&'static str]) -> (Arc<SignatureResolver>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let (primary, primary_calls) = registry("primary", signatures);
    let (secondary, secondary_calls) = registry("secondary", &[]);
    let resolver = SignatureResolver::new(Some(primary), Some(secondary), Duration::from_secs(1));
    (Arc::new(resolver), primary_calls, secondary_calls)
}

struct FixedEnrichment(HashMap<Address, TokenDescription>);

#[async_trait]
impl TokenEnrichment for FixedEnrichment {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn describe(&self, address: Address) -> Result<Option<TokenDescription>> {
        Ok(self.0.get(&address).cloned())
    }
}

fn transfer_data(amount: u64) -> String {
    format!("0xa9059cbb{RECIPIENT:0>64}{amount:064x}")
}

fn invocation(from: &str, to: &str, data: &str) -> Value {
    json!({ "from": from, "to": to, "callData": data, "value": "0" })
}

fn model_json(output: &ReplayOutput) -> Value {
    serde_json::to_value(&output.model).unwrap()
}

async fn run(pipeline: &ReplayPipeline, trace: &Value) -> ReplayOutput {
    pipeline
        .run_json(&trace.to_string(), &RunOptions::default())
        .await
        .unwrap()
}

fn flash_loan_trace() -> Value {
    json!({
        "mainAddress": MAIN,
        "chain": "mainnet",
        "blockNumber": 19000000,
        "nodes": {
            "10": { "invocation": {
                "from": MAIN, "to": LENDER, "callData": "0xab9c4b5d", "value": "0",
                "decodedMethod": { "name": "flashLoan" }
            }},
            "11": { "invocation": {
                "from": LENDER, "to": MAIN, "callData": "0x920f5c84", "value": "0",
                "decodedMethod": { "name": "executeOperation" }
            }},
            "12": { "invocation": invocation(MAIN, TOKEN, &transfer_data(1)) },
            "13": { "invocations": [invocation(MAIN, TOKEN_B, &transfer_data(2))] },
            "14": { "invocation": {
                "fromAddress": MAIN, "address": TOKEN, "callData": transfer_data(3), "value": "0"
            }},
            "90": { "invocation": invocation(MAIN, TOKEN_B, &transfer_data(4)) }
        }
    })
}

#[tokio::test]
async fn test_plain_call_with_local_abi() {
    let dir = tempfile::tempdir().unwrap();
    let abi_path = dir.path().join("Token.json");
    let abi = json!([{
        "type": "function",
        "name": "transfer",
        "inputs": [
            { "name": "to", "type": "address" },
            { "name": "amount", "type": "uint256" }
        ],
        "outputs": [{ "name": "", "type": "bool" }],
        "stateMutability": "nonpayable"
    }]);
    std::fs::write(&abi_path, abi.to_string()).unwrap();

    let config = Config {
        contracts: vec![ContractAbiSpec {
            address: TOKEN.to_string(),
            abi: abi_path,
        }],
        ..Config::default()
    };
    let (resolver, primary_calls, _) = resolver(&[]);
    let pipeline = ReplayPipeline::new(config).with_resolver(resolver);

    let trace = json!({
        "mainAddress": MAIN,
        "nodes": { "1": { "invocation": invocation(MAIN, TOKEN, &transfer_data(1000)) } }
    });
    let output = run(&pipeline, &trace).await;
    let model = model_json(&output);

    assert_eq!(model["top_level"].as_array().unwrap().len(), 1);
    assert_eq!(model["top_level"][0]["name"], "transfer");
    assert_eq!(model["top_level"][0]["tier"], "typed_abi");
    assert_eq!(model["top_level"][0]["args"].as_array().unwrap().len(), 2);
    assert!(model["regions"].as_array().unwrap().is_empty());
    // the local ABI answered, so no registry was asked
    assert_eq!(primary_calls.load(Ordering::SeqCst), 0);

    assert!(output.source.contains("interface IContract_aaaa {"));
    assert!(output
        .source
        .contains("IContract_aaaa(addr1).transfer(0x2222222222222222222222222222222222222222, 1000);"));
}

#[tokio::test]
async fn test_scanned_artifacts_act_as_local_abi() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out").join("Token.sol");
    std::fs::create_dir_all(&out).unwrap();
    let artifact = json!({ "abi": [{
        "type": "function",
        "name": "transfer",
        "inputs": [{ "name": "to", "type": "address" }, { "name": "amount", "type": "uint256" }],
        "outputs": [],
        "stateMutability": "nonpayable"
    }]});
    std::fs::write(out.join("Token.json"), artifact.to_string()).unwrap();

    let pipeline = ReplayPipeline::new(Config::default());
    let trace = json!({
        "mainAddress": MAIN,
        "nodes": { "1": { "invocation": invocation(MAIN, TOKEN, &transfer_data(5)) } }
    });
    let options = RunOptions {
        abi_dirs: vec![dir.path().to_path_buf()],
        ..RunOptions::default()
    };
    let output = pipeline.run_json(&trace.to_string(), &options).await.unwrap();
    assert_eq!(model_json(&output)["top_level"][0]["tier"], "typed_abi");
}

#[tokio::test]
async fn test_unresolvable_selector_replays_raw_payload() {
    let (resolver, primary_calls, secondary_calls) = resolver(&[]);
    let pipeline = ReplayPipeline::new(Config::default()).with_resolver(resolver);

    let payload = "deadbeef00000000000000000000000000000000000000000000000000000000000000ff";
    let trace = json!({
        "mainAddress": MAIN,
        "nodes": { "7": { "invocation": invocation(MAIN, TOKEN, &format!("0x{payload}")) } }
    });
    let output = run(&pipeline, &trace).await;
    let model = model_json(&output);

    assert_eq!(model["top_level"][0]["tier"], "opaque");
    assert_eq!(model["top_level"][0]["name"], "unknownFunction_deadbeef");
    assert!(output.source.contains(&format!("hex\"{payload}\"")));
    assert!(output.source.contains("selector 0xdeadbeef could not be resolved"));
    // the miss is cached: one lookup per registry across prefetch and walk
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_flash_loan_bracket() {
    let (resolver, _, _) = resolver(&["transfer(address,uint256)"]);
    let pipeline = ReplayPipeline::new(Config::default()).with_resolver(resolver);
    let output = run(&pipeline, &flash_loan_trace()).await;
    let model = model_json(&output);

    // 12..14 sit inside the window; 90 is past it
    let top: Vec<u64> = model["top_level"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["key"].as_u64().unwrap())
        .collect();
    assert_eq!(top, vec![90]);

    let regions = model["regions"].as_array().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0]["kind"], "flash_loan");
    assert_eq!(regions[0]["callback"], "executeOperation");
    assert_eq!(regions[0]["trigger"]["key"], 10);
    let inside: Vec<u64> = regions[0]["calls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["key"].as_u64().unwrap())
        .collect();
    assert_eq!(inside, vec![12, 13, 14]);

    let source = &output.source;
    assert!(source.contains(
        "function executeOperation(address[] calldata, uint256[] calldata, uint256[] calldata, address, bytes calldata) external returns (bool) {"
    ));
    assert!(source.contains("return true;"));
    assert!(source.contains("uint256 constant FORK_BLOCK = 19000000;"));
    let trigger_at = source.find("// opens flash_loan region").unwrap();
    let tail_at = source.find("// #90 transfer(address,uint256)").unwrap();
    assert!(trigger_at < tail_at);
    assert!(source.contains("receive() external payable {}"));
}

#[tokio::test]
async fn test_output_is_deterministic() {
    let render = || async {
        let (resolver, _, _) = resolver(&["transfer(address,uint256)"]);
        let pipeline = ReplayPipeline::new(Config::default()).with_resolver(resolver);
        run(&pipeline, &flash_loan_trace()).await.source
    };
    let first = render().await;
    let second = render().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_enrichment_names_constants() {
    let token: Address = TOKEN.parse().unwrap();
    let token_b: Address = TOKEN_B.parse().unwrap();
    let mut known = HashMap::new();
    known.insert(token, TokenDescription::token("WETH", Some("Wrapped Ether"), Some(18)));
    known.insert(token_b, TokenDescription::token("USDC", None, Some(6)));

    let (resolver, _, _) = resolver(&["transfer(address,uint256)"]);
    let pipeline = ReplayPipeline::new(Config::default())
        .with_resolver(resolver)
        .with_enrichment(Arc::new(FixedEnrichment(known)));
    let output = run(&pipeline, &flash_loan_trace()).await;

    let source = &output.source;
    let usdc = source.find("address constant USDC").unwrap();
    let weth = source.find("address constant WETH").unwrap();
    let lender = source.find("address constant addr1").unwrap();
    assert!(usdc < weth && weth < lender);
    assert!(source.contains("IToken(WETH).transfer("));
}

#[tokio::test]
async fn test_missing_main_actor_is_fatal() {
    let pipeline = ReplayPipeline::new(Config::default());
    let err = pipeline
        .run_json(r#"{ "nodes": {} }"#, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RewindError::NoMainActor));

    let err = pipeline
        .run_json(r#"{ "mainAddress": "0x1111111111111111111111111111111111111111" }"#, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RewindError::MissingNodeMap { .. }));
}
