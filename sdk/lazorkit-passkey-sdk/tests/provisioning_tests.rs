use lazorkit_passkey_sdk::core::paymaster::PaymasterError;
use lazorkit_passkey_sdk::error::{ErrorKind, FlowStage, LazorSdkError};
use lazorkit_passkey_sdk::PasskeyWalletClient;

mod common;
use common::{test_config, MockChain, SoftwarePasskey, TxKind};

fn client(
    chain: &MockChain,
    passkey: &SoftwarePasskey,
) -> PasskeyWalletClient<MockChain, MockChain, SoftwarePasskey> {
    PasskeyWalletClient::new(chain.clone(), chain.clone(), passkey.clone(), test_config())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn absent_wallet_is_created_with_nonce_zero() -> anyhow::Result<()> {
    let chain = MockChain::new();
    let passkey = SoftwarePasskey::new();
    let credential = passkey.credential();
    let client = client(&chain, &passkey);
    let hash = credential.credential_hash();

    assert!(client.locator().locate(&chain, &hash).await?.is_none());

    let ready = client.ensure_wallet(&credential).await?;
    assert!(ready.provisioned);
    assert_eq!(
        ready.located.smart_wallet,
        client.smart_wallet_address(&credential)
    );
    assert_eq!(ready.located.device.credential_hash, hash.0);
    assert_eq!(ready.located.device.passkey_public_key, credential.public_key.0);

    let state = chain
        .wallet_state(&ready.located.smart_wallet)
        .expect("wallet state written");
    assert_eq!(state.last_nonce, 0);
    assert_eq!(state.wallet_id, credential.wallet_id());

    assert_eq!(chain.sends_of(TxKind::CreateWallet).len(), 1);
    assert_eq!(chain.confirmations(), 1);
    // Creation is not an authorized action.
    assert_eq!(passkey.calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn existing_wallet_is_located_not_recreated() -> anyhow::Result<()> {
    let chain = MockChain::new();
    let passkey = SoftwarePasskey::new();
    let credential = passkey.credential();
    let seeded = chain.seed_wallet(&credential, 4);

    let ready = client(&chain, &passkey).ensure_wallet(&credential).await?;
    assert!(!ready.provisioned);
    assert_eq!(ready.located.smart_wallet, seeded.smart_wallet);
    assert_eq!(ready.located.wallet_device, seeded.wallet_device);
    assert!(chain.sends().is_empty());
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn wallet_missing_after_creation_is_fatal() {
    let chain = MockChain::new();
    chain.drop_wallet_creation();
    let passkey = SoftwarePasskey::new();
    let credential = passkey.credential();

    let err = client(&chain, &passkey)
        .ensure_wallet(&credential)
        .await
        .expect_err("wallet never appears");
    assert_eq!(err.stage, FlowStage::Provision);
    assert_eq!(err.kind(), ErrorKind::FatalProvisioning);
    assert!(matches!(err.source, LazorSdkError::WalletNotProvisioned(_)));
    // Never retried.
    assert_eq!(chain.sends_of(TxKind::CreateWallet).len(), 1);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn rejected_creation_surfaces_at_provision_stage() {
    let chain = MockChain::new();
    chain.fail_next(TxKind::CreateWallet, [PaymasterError::new("fee payer out of funds")]);
    let passkey = SoftwarePasskey::new();

    let err = client(&chain, &passkey)
        .ensure_wallet(&passkey.credential())
        .await
        .expect_err("relayer rejected");
    assert_eq!(err.stage, FlowStage::Provision);
    assert!(matches!(
        err.source,
        LazorSdkError::Paymaster { attempts: 1, .. }
    ));
    assert!(err.to_string().starts_with("create wallet failed: "));
    assert!(err.to_string().contains("fee payer out of funds"));
}
