use anyhow::{bail, Context, Result};
use serde_json::Value;

use flo_client::logging::{init_logging, LoggingConfig};
use flo_client::{ClientConfig, FloClient};

const USAGE: &str = "usage:\n  flo list [--refresh]\n  flo invoke <name> [<json-payload>] [--force]";

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&LoggingConfig::from_env()).context("Failed to initialize logging")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let flags: Vec<&str> = args.iter().filter(|a| a.starts_with("--")).map(String::as_str).collect();
    let positional: Vec<&str> = args.iter().filter(|a| !a.starts_with("--")).map(String::as_str).collect();

    let config = ClientConfig::load().context("Failed to load configuration")?;
    let client = FloClient::new(config).context("Failed to create client")?;

    match positional.as_slice() {
        ["list"] => {
            let names = client
                .list_workflows(flags.contains(&"--refresh"))
                .await
                .context("Failed to list workflows")?;
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        ["invoke", name, rest @ ..] => {
            let payload: Value = match rest {
                [] => Value::Object(Default::default()),
                [json] => serde_json::from_str(json).context("Payload is not valid JSON")?,
                _ => bail!(USAGE),
            };

            let result = client
                .invoke_with(name, &payload, flags.contains(&"--force"))
                .await
                .with_context(|| format!("Failed to invoke {}", name))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
