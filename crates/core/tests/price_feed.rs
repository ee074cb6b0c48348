use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quorum_core::cache::AddressCache;
use quorum_core::model::{AddressRecord, Chain, SourceUnit};
use quorum_core::project::{QuorumLayout, QuorumSettings};
use quorum_core::services::checks::{
    AddressExtractor, HitKind, PriceFeedCheck, PriceFeedError, ProposalScope,
};
use quorum_core::services::providers::{
    build_providers, AddressProvider, AddressRegistry, ProviderError, ProviderKind,
};
use tempfile::tempdir;

const FEED: &str = "0x5f4ec3df9cbd43714fe2740f5e3616155c5b8419";
const FEED_PROXY: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const TOKEN: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
const UNKNOWN: &str = "0x000000000000000000000000000000000000dead";

/// In-memory registry that counts how often it is asked.
struct FakeRegistry {
    name: &'static str,
    records: HashMap<String, AddressRecord>,
    calls: Arc<AtomicUsize>,
    fail_with: Option<fn() -> ProviderError>,
}

impl FakeRegistry {
    fn new(name: &'static str, calls: Arc<AtomicUsize>) -> Self {
        Self { name, records: HashMap::new(), calls, fail_with: None }
    }

    fn with(mut self, address: &str, record: AddressRecord) -> Self {
        self.records.insert(address.to_string(), record);
        self
    }
}

impl AddressRegistry for FakeRegistry {
    fn name(&self) -> &'static str {
        self.name
    }

    fn lookup(&self, _chain: Chain, address: &str) -> Result<Option<AddressRecord>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        Ok(self.records.get(address).cloned())
    }
}

fn feed_record() -> AddressRecord {
    AddressRecord {
        primary_address: FEED.to_string(),
        alternate_address: Some(FEED_PROXY.to_string()),
        display_name: Some("ETH / USD".to_string()),
        symbol_or_pair: Some("ETH / USD".to_string()),
        decimals: Some(8),
    }
}

fn provider(registry: FakeRegistry, cache: &Arc<AddressCache>) -> AddressProvider {
    AddressProvider::new(Box::new(registry), Arc::clone(cache))
}

fn payload(body: &str) -> SourceUnit {
    SourceUnit::from_text("src/Payload.sol", body)
}

#[test]
fn extractor_ignores_comments_and_deduplicates() {
    let extractor = AddressExtractor::new().expect("extractor");
    let text = format!(
        "// {UNKNOWN}\naddress a = {FEED};\naddress b = {};\n/* {TOKEN} */",
        FEED.to_uppercase().replacen("0X", "0x", 1)
    );
    let found: Vec<String> = extractor.extract(&text).into_iter().collect();
    assert_eq!(found, vec![FEED.to_string()]);
}

#[test]
fn extractor_rejects_longer_hex_runs() {
    let extractor = AddressExtractor::new().expect("extractor");
    let hash = format!("bytes32 h = {}00;", FEED);
    assert!(extractor.extract(&hash).is_empty());
}

#[test]
fn price_feed_registries_take_precedence_over_token_registries() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let cache = Arc::new(AddressCache::open_in_memory().expect("cache"));
    let feed_calls = Arc::new(AtomicUsize::new(0));
    let token_calls = Arc::new(AtomicUsize::new(0));

    let feeds = vec![provider(
        FakeRegistry::new("Chainlink", Arc::clone(&feed_calls)).with(FEED, feed_record()),
        &cache,
    )];
    let mut token_record = AddressRecord::new(TOKEN);
    token_record.symbol_or_pair = Some("USDC".to_string());
    let tokens = vec![provider(
        FakeRegistry::new("Coingecko", Arc::clone(&token_calls))
            .with(FEED, AddressRecord::new(FEED))
            .with(TOKEN, token_record),
        &cache,
    )];

    let scope = ProposalScope::new(&layout, "Aave", Chain::Ethereum, "0xabc");
    let check = PriceFeedCheck::new(&scope, &feeds, &tokens).expect("check");
    let body = format!("address feed = {FEED};\naddress token = {TOKEN};\naddress nope = {UNKNOWN};");
    let findings = check.verify_price_feed(&[payload(&body)]).expect("verify");

    assert_eq!(findings.price_feed_hits.len(), 1);
    assert_eq!(findings.price_feed_hits[0].provider, "Chainlink");
    assert_eq!(findings.price_feed_hits[0].kind, HitKind::Direct);
    assert_eq!(findings.token_hits.len(), 1);
    assert_eq!(findings.token_hits[0].address, TOKEN);
    assert_eq!(findings.unresolved.len(), 1);
    assert_eq!(findings.unresolved[0].address, UNKNOWN);

    // FEED resolved by the price-feed registry, so the token registry only saw two lookups.
    assert_eq!(feed_calls.load(Ordering::SeqCst), 3);
    assert_eq!(token_calls.load(Ordering::SeqCst), 2);

    let artifact = check.run.output_dir.join("Payload").join("verified_sources.json");
    let written = fs::read_to_string(artifact).expect("verified sources");
    assert!(written.contains(FEED));
    assert!(written.contains(TOKEN));
}

#[test]
fn proxy_literal_is_reported_as_proxy_hit() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let cache = Arc::new(AddressCache::open_in_memory().expect("cache"));
    let calls = Arc::new(AtomicUsize::new(0));
    let feeds = vec![provider(
        FakeRegistry::new("Chainlink", calls).with(FEED_PROXY, feed_record()),
        &cache,
    )];

    let scope = ProposalScope::new(&layout, "Aave", Chain::Ethereum, "0xabc");
    let check = PriceFeedCheck::new(&scope, &feeds, &[]).expect("check");
    let findings = check
        .verify_price_feed(&[payload(&format!("address f = {FEED_PROXY};"))])
        .expect("verify");

    assert_eq!(findings.price_feed_hits.len(), 1);
    assert_eq!(findings.price_feed_hits[0].kind, HitKind::Proxy);
    assert_eq!(findings.price_feed_hits[0].record.primary_address, FEED);
    assert_eq!(findings.proxy_hits().count(), 1);
}

#[test]
fn second_lookup_is_served_from_cache() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let cache = Arc::new(AddressCache::open_in_memory().expect("cache"));
    let calls = Arc::new(AtomicUsize::new(0));
    let feeds = vec![provider(
        FakeRegistry::new("Chainlink", Arc::clone(&calls)).with(FEED, feed_record()),
        &cache,
    )];

    let scope = ProposalScope::new(&layout, "Aave", Chain::Ethereum, "0xabc");
    let units = [payload(&format!("address f = {FEED};"))];
    PriceFeedCheck::new(&scope, &feeds, &[]).expect("first").verify_price_feed(&units).expect("first run");
    PriceFeedCheck::new(&scope, &feeds, &[]).expect("second").verify_price_feed(&units).expect("second run");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.get("Chainlink", "Ethereum", FEED).expect("cache get").is_some());
}

#[test]
fn transient_lookup_failure_counts_as_miss() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let cache = Arc::new(AddressCache::open_in_memory().expect("cache"));
    let mut failing = FakeRegistry::new("Chronicle", Arc::new(AtomicUsize::new(0)));
    failing.fail_with = Some(|| ProviderError::Http { provider: "Chronicle", message: "timeout".to_string() });
    let feeds = vec![provider(failing, &cache)];

    let scope = ProposalScope::new(&layout, "Aave", Chain::Ethereum, "0xabc");
    let findings = PriceFeedCheck::new(&scope, &feeds, &[])
        .expect("check")
        .verify_price_feed(&[payload(&format!("address f = {FEED};"))])
        .expect("verify");

    assert_eq!(findings.unresolved.len(), 1);
    assert_eq!(findings.lookup_errors.len(), 1);
    assert!(findings.lookup_errors[0].contains("timeout"));
}

#[test]
fn credential_failure_aborts_the_check() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let cache = Arc::new(AddressCache::open_in_memory().expect("cache"));
    let mut failing = FakeRegistry::new("CoinMarketCap", Arc::new(AtomicUsize::new(0)));
    failing.fail_with = Some(|| ProviderError::Unauthorized { provider: "CoinMarketCap" });
    let tokens = vec![provider(failing, &cache)];

    let scope = ProposalScope::new(&layout, "Aave", Chain::Ethereum, "0xabc");
    let err = PriceFeedCheck::new(&scope, &[], &tokens)
        .expect("check")
        .verify_price_feed(&[payload(&format!("address t = {TOKEN};"))])
        .expect_err("unauthorized must abort");

    assert!(matches!(err, PriceFeedError::Provider(ProviderError::Unauthorized { .. })));
}

/// A missing CoinMarketCap key fails while the providers are being built,
/// before any address is looked up.
#[test]
fn missing_credential_fails_provider_construction() {
    let dir = tempdir().expect("tempdir");
    let mut settings = QuorumSettings::with_main_path(dir.path());
    settings.coinmarketcap_api_key = None;
    let http = settings.http_client().expect("http client");
    let cache = Arc::new(AddressCache::open_in_memory().expect("cache"));

    for kinds in [vec![ProviderKind::CoinMarketCap], vec![ProviderKind::Chainlink, ProviderKind::CoinMarketCap]] {
        let err = build_providers(&kinds, &settings, &http, &cache).err().expect("construction should fail");
        assert!(matches!(
            err,
            ProviderError::MissingCredential { provider: "CoinMarketCap", variable: "COINMARKETCAP_API_KEY" }
        ));
        assert!(err.is_fatal());
    }

    let keyless = build_providers(&[ProviderKind::Chainlink, ProviderKind::CoinGecko], &settings, &http, &cache)
        .expect("keyless providers");
    assert_eq!(keyless.len(), 2);
}
