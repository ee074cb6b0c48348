use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::canonicalize_or_current;

const ENV_TEMPLATE: &str = "\
# Etherscan v2 API key (all chains except Metis).
export ETHSCAN_API_KEY=\"\"
# Required only when a customer enables the CoinMarketCap provider.
export COINMARKETCAP_API_KEY=\"\"
";

const EXECUTION_TEMPLATE: &str = r#"{
    "Aave": {
        "Ethereum": {
            "Proposals": []
        },
        "Arbitrum": {
            "Proposals": []
        }
    }
}
"#;

const GROUND_TRUTH_TEMPLATE: &str = r#"{
    "Aave": {
        "dev_repos": [
            "https://github.com/bgd-labs/aave-helpers",
            "https://github.com/bgd-labs/aave-address-book",
            "https://github.com/aave-dao/aave-v3-origin"
        ],
        "review_repo": "https://github.com/bgd-labs/aave-proposals-v3",
        "price_feed_providers": ["Chainlink", "Chronicle"],
        "token_validation_providers": ["Coingecko"]
    }
}
"#;

const README_TEMPLATE: &str = "\
# Quorum working directory

- `ground_truth.json`: per-customer repositories and address providers.
- `execution.json`: proposals checked by `quorum validate-batch --config execution.json`.
- `.env`: API keys and `QUORUM_PATH`; load it with `source .env`.

Aave proposals can also be checked by id: `quorum validate-proposal-id --customer Aave --proposal-id <id>`.

Check artifacts are written to `{customer}/checks/{chain}/{proposal}/`.
";

/// Template files written by `setup`, as (file name, contents).
pub const SETUP_TEMPLATES: [(&str, &str); 4] = [
    (".env", ENV_TEMPLATE),
    ("execution.json", EXECUTION_TEMPLATE),
    ("ground_truth.json", GROUND_TRUTH_TEMPLATE),
    ("README.md", README_TEMPLATE),
];

/// Create a working directory populated with templates. Existing files are
/// left alone.
pub fn setup_command(working_dir: &str) -> Result<()> {
    let target = canonicalize_or_current(working_dir)?;
    if !target.exists() {
        println!("Creating directory: {}", target.display());
        fs::create_dir_all(&target)
            .with_context(|| format!("Failed to create working directory {}", target.display()))?;
    }

    for (name, contents) in SETUP_TEMPLATES {
        let dest = target.join(name);
        if dest.exists() {
            println!("File exists: {}. Skipping.", dest.display());
            continue;
        }
        fs::write(&dest, contents).with_context(|| format!("Failed to write {}", dest.display()))?;
        println!("Wrote {}", dest.display());
    }

    export_quorum_path(&target.join(".env"), &target)?;
    println!("Quorum setup completed at {}", target.display());
    Ok(())
}

fn export_quorum_path(env_file: &Path, target: &Path) -> Result<()> {
    let line = format!("export QUORUM_PATH=\"{}\"", target.display());
    let existing = fs::read_to_string(env_file).unwrap_or_default();
    if existing.lines().any(|l| l.trim() == line) {
        return Ok(());
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(env_file)
        .with_context(|| format!("Failed to open {}", env_file.display()))?;
    writeln!(file, "\n{line}").with_context(|| format!("Failed to write {}", env_file.display()))?;
    Ok(())
}
