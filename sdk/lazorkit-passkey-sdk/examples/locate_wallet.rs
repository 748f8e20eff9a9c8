// Example: resolving a passkey credential to its smart wallet
//
// Usage:
//   cargo run --example locate_wallet -- <credential-id-base64url> <x-hex> <y-hex>
//
// Reads LAZORKIT_RPC_URL / LAZORKIT_PROGRAM_ID from the environment.

use lazorkit_passkey_sdk::basic::wallet::{fetch_wallet_state, SmartWalletLocator};
use lazorkit_passkey_sdk::{LazorConfig, PasskeyCredential, RpcConnection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [credential_id, x_hex, y_hex] = args.as_slice() else {
        eprintln!("usage: locate_wallet <credential-id> <x-hex> <y-hex>");
        std::process::exit(2);
    };

    let config = LazorConfig::from_env()?;
    let connection = RpcConnection::new(config.rpc_url.clone());
    let credential = PasskeyCredential::from_encoded(credential_id, x_hex, y_hex)?;

    println!("Credential hash: {}", credential.credential_hash());
    println!("Wallet id:       {}", credential.wallet_id());
    println!(
        "Smart wallet:    {}",
        credential.smart_wallet_address(&config.program_id)
    );

    let locator = SmartWalletLocator::new(config.program_id, config.optimistic());
    match locator
        .locate(&connection, &credential.credential_hash())
        .await?
    {
        Some(located) => {
            let state = fetch_wallet_state(
                &connection,
                &config.program_id,
                &located.smart_wallet,
                config.settled(),
            )
            .await?;
            println!("Wallet device:   {}", located.wallet_device);
            println!("Settled nonce:   {}", state.last_nonce);
        },
        None => println!("No wallet yet; it is created on first use."),
    }

    Ok(())
}
