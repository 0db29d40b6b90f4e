use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use token_ledger::{
    AccountDirectory, Action, Amount, Host, LedgerConfig, Notice, Notifier, TokenError,
    TokenLedger, adapters::MemoryAdapter,
    host::{SameAccount, TracingNotifier},
};
use uuid::Uuid;

fn tok(s: &str) -> Amount {
    s.parse().unwrap()
}

struct Fixture {
    ledger: TokenLedger,
    authority: Uuid,
    issuer: Uuid,
}

fn setup_with_host(host: Host) -> (TokenLedger, Uuid) {
    let authority = Uuid::now_v7();
    let ledger = TokenLedger::with_host(
        LedgerConfig::new(authority),
        Arc::new(MemoryAdapter::new()),
        host,
    );
    (ledger, authority)
}

async fn setup() -> Fixture {
    let (ledger, authority) = setup_with_host(Host::default());
    let issuer = Uuid::now_v7();

    ledger
        .create(authority, issuer, tok("1000.0000 TOK"))
        .await
        .unwrap();

    Fixture {
        ledger,
        authority,
        issuer,
    }
}

/// Sum of balances equals supply and supply stays inside its bounds.
async fn assert_invariants(ledger: &TokenLedger) {
    for record in ledger.symbols().await.unwrap() {
        let holders = ledger.holders(record.code()).await.unwrap();
        let total: i64 = holders.iter().map(|h| h.balance.value).sum();

        assert_eq!(total, record.supply.value, "balances drifted for {}", record.symbol);
        assert!(record.supply.value >= 0);
        assert!(record.supply.value <= record.max_supply.value);
        for holder in holders {
            assert!(holder.balance.value >= 0);
            assert_eq!(holder.balance.symbol, record.symbol);
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<(Uuid, Notice)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipient: Uuid, notice: &Notice) {
        self.notices.lock().unwrap().push((recipient, notice.clone()));
    }
}

struct Registry {
    known: HashSet<Uuid>,
}

impl AccountDirectory for Registry {
    fn exists(&self, account: Uuid) -> bool {
        self.known.contains(&account)
    }
}

// ==================== Scenarios ====================

#[tokio::test]
async fn test_create_starts_with_zero_supply() {
    let Fixture { ledger, issuer, .. } = setup().await;

    let record = ledger.supply("TOK").await.unwrap();
    assert_eq!(record.issuer, issuer);
    assert_eq!(record.supply, tok("0.0000 TOK"));
    assert_eq!(record.max_supply, tok("1000.0000 TOK"));
    assert!(ledger.holders("TOK").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_issue_to_issuer() {
    let Fixture { ledger, issuer, .. } = setup().await;

    ledger
        .issue(issuer, issuer, tok("100.0000 TOK"), "initial", true)
        .await
        .unwrap();

    assert_eq!(ledger.supply("TOK").await.unwrap().supply, tok("100.0000 TOK"));
    assert_eq!(ledger.balance(issuer, "TOK").await.unwrap(), tok("100.0000 TOK"));
    assert_invariants(&ledger).await;
}

#[tokio::test]
async fn test_transfer_needs_balance_object_without_auto_create() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let user = Uuid::now_v7();

    ledger
        .issue(issuer, issuer, tok("100.0000 TOK"), "", true)
        .await
        .unwrap();

    let err = ledger
        .transfer(issuer, issuer, user, tok("40.0000 TOK"), "", false)
        .await
        .unwrap_err();
    assert_eq!(err, TokenError::NoBalanceObject);
    assert_eq!(ledger.balance(issuer, "TOK").await.unwrap(), tok("100.0000 TOK"));

    ledger.signup(user, user, tok("0.0000 TOK")).await.unwrap();
    ledger
        .transfer(issuer, issuer, user, tok("40.0000 TOK"), "", false)
        .await
        .unwrap();

    assert_eq!(ledger.balance(issuer, "TOK").await.unwrap(), tok("60.0000 TOK"));
    assert_eq!(ledger.balance(user, "TOK").await.unwrap(), tok("40.0000 TOK"));
    assert_invariants(&ledger).await;
}

#[tokio::test]
async fn test_burn_overdrawn_then_exact_balance() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let user = Uuid::now_v7();

    ledger
        .issue(issuer, issuer, tok("100.0000 TOK"), "", true)
        .await
        .unwrap();
    ledger
        .transfer(issuer, issuer, user, tok("40.0000 TOK"), "", true)
        .await
        .unwrap();

    let err = ledger
        .burn(issuer, issuer, tok("60.0001 TOK"), "")
        .await
        .unwrap_err();
    assert_eq!(err, TokenError::Overdrawn);
    assert_eq!(ledger.supply("TOK").await.unwrap().supply, tok("100.0000 TOK"));

    ledger
        .burn(issuer, issuer, tok("60.0000 TOK"), "")
        .await
        .unwrap();

    assert!(ledger.store().find_balance(issuer, "TOK").await.unwrap().is_none());
    assert_eq!(ledger.balance(issuer, "TOK").await.unwrap(), tok("0.0000 TOK"));
    assert_eq!(ledger.supply("TOK").await.unwrap().supply, tok("40.0000 TOK"));
    assert_invariants(&ledger).await;
}

#[tokio::test]
async fn test_issue_up_to_max_supply() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let user = Uuid::now_v7();

    ledger
        .issue(issuer, user, tok("40.0000 TOK"), "", true)
        .await
        .unwrap();

    let err = ledger
        .issue(issuer, user, tok("960.0001 TOK"), "", true)
        .await
        .unwrap_err();
    assert_eq!(err, TokenError::SupplyExceeded);

    ledger
        .issue(issuer, user, tok("960.0000 TOK"), "", true)
        .await
        .unwrap();

    let record = ledger.supply("TOK").await.unwrap();
    assert_eq!(record.supply, record.max_supply);
    assert_eq!(ledger.balance(user, "TOK").await.unwrap(), tok("1000.0000 TOK"));
    // Minted to the issuer, then moved on in full.
    assert!(ledger.store().find_balance(issuer, "TOK").await.unwrap().is_none());

    let err = ledger
        .issue(issuer, issuer, tok("0.0001 TOK"), "", true)
        .await
        .unwrap_err();
    assert_eq!(err, TokenError::SupplyExceeded);
    assert_invariants(&ledger).await;
}

// ==================== create ====================

#[tokio::test]
async fn test_create_requires_authority() {
    let Fixture { ledger, issuer, .. } = setup().await;

    let err = ledger
        .create(issuer, issuer, tok("10.00 GLD"))
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Unauthorized(_)));
    assert!(matches!(
        ledger.supply("GLD").await,
        Err(TokenError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_create_rejects_duplicates_and_bad_supply() {
    let Fixture {
        ledger,
        authority,
        issuer,
    } = setup().await;

    assert!(matches!(
        ledger.create(authority, issuer, tok("5.00 TOK")).await,
        Err(TokenError::AlreadyExists(_))
    ));
    ledger
        .create(authority, issuer, tok("1.00 GLD"))
        .await
        .unwrap();
    assert!(matches!(
        ledger
            .create(authority, issuer, Amount::new(0, "SLV,2".parse().unwrap()))
            .await,
        Err(TokenError::InvalidAmount(_))
    ));
    assert!(matches!(
        ledger
            .create(
                authority,
                issuer,
                Amount::new(100, token_ledger::Symbol::new("slv", 2))
            )
            .await,
        Err(TokenError::InvalidSymbol(_))
    ));
    assert_eq!(ledger.symbols().await.unwrap().len(), 2);
}

// ==================== issue ====================

#[tokio::test]
async fn test_issue_preconditions() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let stranger = Uuid::now_v7();

    assert!(matches!(
        ledger
            .issue(issuer, issuer, tok("1.0000 NOPE"), "", true)
            .await,
        Err(TokenError::NotFound(_))
    ));
    assert!(matches!(
        ledger
            .issue(issuer, issuer, tok("-1.0000 TOK"), "", true)
            .await,
        Err(TokenError::InvalidAmount(_))
    ));
    assert!(matches!(
        ledger.issue(issuer, issuer, tok("1.00 TOK"), "", true).await,
        Err(TokenError::InvalidAmount(_))
    ));
    assert_eq!(
        ledger
            .issue(stranger, issuer, tok("1.0000 TOK"), "", true)
            .await,
        Err(TokenError::Unauthorized(issuer))
    );

    let long_memo = "x".repeat(257);
    assert_eq!(
        ledger
            .issue(issuer, issuer, tok("1.0000 TOK"), &long_memo, true)
            .await,
        Err(TokenError::MemoTooLong(257))
    );
    ledger
        .issue(issuer, issuer, tok("1.0000 TOK"), &"x".repeat(256), true)
        .await
        .unwrap();

    assert_eq!(ledger.supply("TOK").await.unwrap().supply, tok("1.0000 TOK"));
}

#[tokio::test]
async fn test_issue_zero_is_allowed_for_issuer() {
    let Fixture { ledger, issuer, .. } = setup().await;

    ledger
        .issue(issuer, issuer, tok("0.0000 TOK"), "", true)
        .await
        .unwrap();
    assert_eq!(ledger.supply("TOK").await.unwrap().supply, tok("0.0000 TOK"));
    assert_invariants(&ledger).await;
}

#[tokio::test]
async fn test_failed_redispatch_leaves_issue_unapplied() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let user = Uuid::now_v7();

    // The transfer leg fails: nothing from the mint leg may stick.
    let err = ledger
        .issue(issuer, user, tok("50.0000 TOK"), "", false)
        .await
        .unwrap_err();
    assert_eq!(err, TokenError::NoBalanceObject);

    assert_eq!(ledger.supply("TOK").await.unwrap().supply, tok("0.0000 TOK"));
    assert!(ledger.holders("TOK").await.unwrap().is_empty());

    ledger.signup(user, user, tok("0.0000 TOK")).await.unwrap();
    ledger
        .issue(issuer, user, tok("50.0000 TOK"), "", false)
        .await
        .unwrap();
    assert_eq!(ledger.balance(user, "TOK").await.unwrap(), tok("50.0000 TOK"));
    assert_invariants(&ledger).await;
}

// ==================== signup ====================

#[tokio::test]
async fn test_signup_rules() {
    let Fixture { ledger, .. } = setup().await;
    let user = Uuid::now_v7();

    assert_eq!(
        ledger.signup(Uuid::now_v7(), user, tok("0.0000 TOK")).await,
        Err(TokenError::Unauthorized(user))
    );
    assert!(matches!(
        ledger.signup(user, user, tok("0.0001 TOK")).await,
        Err(TokenError::InvalidAmount(_))
    ));
    assert!(matches!(
        ledger.signup(user, user, tok("0.0000 NOPE")).await,
        Err(TokenError::NotFound(_))
    ));

    ledger.signup(user, user, tok("0.0000 TOK")).await.unwrap();
    let record = ledger.store().find_balance(user, "TOK").await.unwrap().unwrap();
    assert_eq!(record.balance, tok("0.0000 TOK"));

    assert!(matches!(
        ledger.signup(user, user, tok("0.0000 TOK")).await,
        Err(TokenError::AlreadyExists(_))
    ));
    assert_eq!(ledger.supply("TOK").await.unwrap().supply, tok("0.0000 TOK"));
}

#[tokio::test]
async fn test_signup_rejected_for_funded_account() {
    let Fixture { ledger, issuer, .. } = setup().await;

    ledger
        .issue(issuer, issuer, tok("1.0000 TOK"), "", true)
        .await
        .unwrap();
    assert!(matches!(
        ledger.signup(issuer, issuer, tok("0.0000 TOK")).await,
        Err(TokenError::AlreadyExists(_))
    ));
}

// ==================== burn ====================

#[tokio::test]
async fn test_burn_preconditions() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let user = Uuid::now_v7();

    ledger
        .issue(issuer, user, tok("10.0000 TOK"), "", true)
        .await
        .unwrap();

    assert_eq!(
        ledger.burn(issuer, user, tok("1.0000 TOK"), "").await,
        Err(TokenError::Unauthorized(user))
    );
    assert_eq!(
        ledger.burn(user, user, tok("10.0001 TOK"), "").await,
        Err(TokenError::SupplyExceeded)
    );
    assert!(matches!(
        ledger.burn(user, user, tok("-1.0000 TOK"), "").await,
        Err(TokenError::InvalidAmount(_))
    ));
    assert!(matches!(
        ledger.burn(issuer, issuer, tok("1.0000 TOK"), "").await,
        Err(TokenError::NotFound(_))
    ));
    assert_eq!(
        ledger
            .burn(user, user, tok("1.0000 TOK"), &"m".repeat(300))
            .await,
        Err(TokenError::MemoTooLong(300))
    );

    ledger.burn(user, user, tok("4.0000 TOK"), "fee").await.unwrap();
    assert_eq!(ledger.balance(user, "TOK").await.unwrap(), tok("6.0000 TOK"));
    assert_eq!(ledger.supply("TOK").await.unwrap().supply, tok("6.0000 TOK"));
    assert_invariants(&ledger).await;
}

#[tokio::test]
async fn test_issue_then_burn_restores_state() {
    let Fixture { ledger, issuer, .. } = setup().await;

    ledger
        .issue(issuer, issuer, tok("25.0000 TOK"), "", true)
        .await
        .unwrap();
    let supply_before = ledger.supply("TOK").await.unwrap().supply;
    let balance_before = ledger.balance(issuer, "TOK").await.unwrap();

    ledger
        .issue(issuer, issuer, tok("12.3456 TOK"), "", true)
        .await
        .unwrap();
    ledger
        .burn(issuer, issuer, tok("12.3456 TOK"), "")
        .await
        .unwrap();

    assert_eq!(ledger.supply("TOK").await.unwrap().supply, supply_before);
    assert_eq!(ledger.balance(issuer, "TOK").await.unwrap(), balance_before);
}

// ==================== transfer ====================

#[tokio::test]
async fn test_transfer_preconditions() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let user = Uuid::now_v7();

    ledger
        .issue(issuer, issuer, tok("10.0000 TOK"), "", true)
        .await
        .unwrap();

    assert_eq!(
        ledger
            .transfer(issuer, issuer, issuer, tok("1.0000 TOK"), "", true)
            .await,
        Err(TokenError::SelfTransfer)
    );
    assert_eq!(
        ledger
            .transfer(user, issuer, user, tok("1.0000 TOK"), "", true)
            .await,
        Err(TokenError::Unauthorized(issuer))
    );
    assert!(matches!(
        ledger
            .transfer(issuer, issuer, user, tok("0.0000 TOK"), "", true)
            .await,
        Err(TokenError::InvalidAmount(_))
    ));
    assert!(matches!(
        ledger
            .transfer(issuer, issuer, user, tok("1.00 TOK"), "", true)
            .await,
        Err(TokenError::InvalidAmount(_))
    ));
    assert!(matches!(
        ledger
            .transfer(issuer, issuer, user, tok("1.0000 NOPE"), "", true)
            .await,
        Err(TokenError::NotFound(_))
    ));
    assert_eq!(
        ledger
            .transfer(issuer, issuer, user, tok("10.0001 TOK"), "", true)
            .await,
        Err(TokenError::Overdrawn)
    );
    assert!(matches!(
        ledger
            .transfer(user, user, issuer, tok("1.0000 TOK"), "", true)
            .await,
        Err(TokenError::NotFound(_))
    ));

    assert_eq!(ledger.balance(issuer, "TOK").await.unwrap(), tok("10.0000 TOK"));
    assert!(ledger.store().find_balance(user, "TOK").await.unwrap().is_none());
}

#[tokio::test]
async fn test_transfer_round_trip() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let user = Uuid::now_v7();

    ledger
        .issue(issuer, issuer, tok("100.0000 TOK"), "", true)
        .await
        .unwrap();
    ledger
        .issue(issuer, user, tok("5.0000 TOK"), "", true)
        .await
        .unwrap();

    ledger
        .transfer(issuer, issuer, user, tok("33.3333 TOK"), "there", false)
        .await
        .unwrap();
    ledger
        .transfer(user, user, issuer, tok("33.3333 TOK"), "back", false)
        .await
        .unwrap();

    assert_eq!(ledger.balance(issuer, "TOK").await.unwrap(), tok("100.0000 TOK"));
    assert_eq!(ledger.balance(user, "TOK").await.unwrap(), tok("5.0000 TOK"));
    assert_invariants(&ledger).await;
}

#[tokio::test]
async fn test_transfer_of_full_balance_removes_record() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let user = Uuid::now_v7();

    ledger
        .issue(issuer, issuer, tok("7.0000 TOK"), "", true)
        .await
        .unwrap();
    ledger
        .transfer(issuer, issuer, user, tok("7.0000 TOK"), "", true)
        .await
        .unwrap();

    let holders = ledger.holders("TOK").await.unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].owner, user);
    assert!(holders.iter().all(|h| h.balance.value > 0));
}

// ==================== host ports ====================

#[tokio::test]
async fn test_transfer_checks_account_directory() {
    let issuer = Uuid::now_v7();
    let known = Uuid::now_v7();
    let unknown = Uuid::now_v7();

    let host = Host::new(
        Arc::new(SameAccount),
        Arc::new(Registry {
            known: HashSet::from([issuer, known]),
        }),
        Arc::new(TracingNotifier),
    );
    let (ledger, authority) = setup_with_host(host);

    ledger
        .create(authority, issuer, tok("100.00 GLD"))
        .await
        .unwrap();
    ledger
        .issue(issuer, issuer, tok("50.00 GLD"), "", true)
        .await
        .unwrap();

    assert_eq!(
        ledger
            .transfer(issuer, issuer, unknown, tok("1.00 GLD"), "", true)
            .await,
        Err(TokenError::UnknownAccount(unknown))
    );
    assert_eq!(
        ledger.issue(issuer, unknown, tok("1.00 GLD"), "", true).await,
        Err(TokenError::UnknownAccount(unknown))
    );
    ledger
        .transfer(issuer, issuer, known, tok("1.00 GLD"), "", true)
        .await
        .unwrap();

    assert_eq!(ledger.supply("GLD").await.unwrap().supply, tok("50.00 GLD"));
}

#[tokio::test]
async fn test_notifications_sent_after_commit() {
    let notifier = Arc::new(RecordingNotifier::default());
    let host = Host::new(
        Arc::new(SameAccount),
        Arc::new(token_ledger::host::OpenDirectory),
        notifier.clone(),
    );
    let (ledger, authority) = setup_with_host(host);
    let issuer = Uuid::now_v7();
    let user = Uuid::now_v7();

    ledger
        .create(authority, issuer, tok("100 PTS"))
        .await
        .unwrap();
    ledger
        .issue(issuer, user, tok("10 PTS"), "welcome", true)
        .await
        .unwrap();

    {
        let notices = notifier.notices.lock().unwrap();
        let recipients: Vec<(Uuid, Action)> = notices
            .iter()
            .map(|(r, n)| (*r, n.action))
            .collect();
        assert_eq!(
            recipients,
            vec![
                (issuer, Action::Issue),
                (issuer, Action::Transfer),
                (user, Action::Transfer),
            ]
        );
        assert!(notices.iter().all(|(_, n)| n.quantity == tok("10 PTS")));
    }

    // Rejected calls tell nobody.
    let _ = ledger.burn(user, user, tok("11 PTS"), "").await;
    assert_eq!(notifier.notices.lock().unwrap().len(), 3);

    ledger.burn(user, user, tok("10 PTS"), "bye").await.unwrap();
    let notices = notifier.notices.lock().unwrap();
    let (recipient, last) = notices.last().unwrap();
    assert_eq!(*recipient, user);
    assert_eq!(last.action, Action::Burn);
    assert_eq!(last.memo, "bye");
}

#[tokio::test]
async fn test_custom_authorizer_delegates_authority() {
    struct Operator(Uuid);

    impl token_ledger::Authorizer for Operator {
        fn is_authorized(&self, caller: Uuid, account: Uuid) -> bool {
            caller == account || caller == self.0
        }
    }

    let operator = Uuid::now_v7();
    let host = Host::new(
        Arc::new(Operator(operator)),
        Arc::new(token_ledger::host::OpenDirectory),
        Arc::new(TracingNotifier),
    );
    let (ledger, _authority) = setup_with_host(host);
    let issuer = Uuid::now_v7();
    let user = Uuid::now_v7();

    ledger
        .create(operator, issuer, tok("100 PTS"))
        .await
        .unwrap();
    ledger
        .issue(operator, user, tok("10 PTS"), "", true)
        .await
        .unwrap();
    ledger.burn(operator, user, tok("3 PTS"), "").await.unwrap();

    assert_eq!(ledger.balance(user, "PTS").await.unwrap(), tok("7 PTS"));
}

#[tokio::test]
async fn test_memo_limit_from_config() {
    let authority = Uuid::now_v7();
    let issuer = Uuid::now_v7();
    let mut config = LedgerConfig::new(authority);
    config.max_memo_bytes = 4;

    let ledger = TokenLedger::new(config, Arc::new(MemoryAdapter::new()));
    ledger
        .create(authority, issuer, tok("100 PTS"))
        .await
        .unwrap();

    ledger.issue(issuer, issuer, tok("1 PTS"), "abcd", true).await.unwrap();
    assert_eq!(
        ledger.issue(issuer, issuer, tok("1 PTS"), "abcde", true).await,
        Err(TokenError::MemoTooLong(5))
    );
}

// ==================== invariants ====================

#[tokio::test]
async fn test_symbols_are_independent() {
    let Fixture {
        ledger,
        authority,
        issuer,
    } = setup().await;
    let user = Uuid::now_v7();

    ledger
        .create(authority, user, tok("50.00 GLD"))
        .await
        .unwrap();
    ledger
        .issue(issuer, user, tok("10.0000 TOK"), "", true)
        .await
        .unwrap();
    ledger
        .issue(user, user, tok("20.00 GLD"), "", true)
        .await
        .unwrap();
    ledger.burn(user, user, tok("5.00 GLD"), "").await.unwrap();

    assert_eq!(ledger.balance(user, "TOK").await.unwrap(), tok("10.0000 TOK"));
    assert_eq!(ledger.balance(user, "GLD").await.unwrap(), tok("15.00 GLD"));
    assert_eq!(ledger.supply("TOK").await.unwrap().supply, tok("10.0000 TOK"));
    assert_eq!(ledger.supply("GLD").await.unwrap().supply, tok("15.00 GLD"));
    assert_invariants(&ledger).await;
}

#[tokio::test]
async fn test_random_operations_preserve_invariants() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let accounts: Vec<Uuid> = std::iter::once(issuer)
        .chain((0..4).map(|_| Uuid::now_v7()))
        .collect();
    let mut rng = StdRng::seed_from_u64(7);
    let mut committed = 0;

    for _ in 0..400 {
        let a = accounts[rng.random_range(0..accounts.len())];
        let b = accounts[rng.random_range(0..accounts.len())];
        let qty = Amount::new(
            rng.random_range(0..500_000),
            token_ledger::Symbol::new("TOK", 4),
        );
        let auto_create = rng.random_bool(0.7);

        let result = match rng.random_range(0..4) {
            0 => ledger.issue(issuer, a, qty, "", auto_create).await,
            1 => ledger.burn(a, a, qty, "").await,
            2 => ledger.transfer(a, a, b, qty, "", auto_create).await,
            _ => ledger.signup(a, a, Amount::zero(qty.symbol)).await,
        };
        if result.is_ok() {
            committed += 1;
        }

        assert_invariants(&ledger).await;
    }

    assert!(committed > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_conserve_supply() {
    let Fixture { ledger, issuer, .. } = setup().await;
    let ledger = Arc::new(ledger);
    let users: Vec<Uuid> = (0..8).map(|_| Uuid::now_v7()).collect();

    for user in &users {
        ledger
            .issue(issuer, *user, tok("100.0000 TOK"), "", true)
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..users.len() {
        let ledger = Arc::clone(&ledger);
        let from = users[i];
        let to = users[(i + 1) % users.len()];

        handles.push(tokio::spawn(async move {
            for _ in 0..25 {
                // Some of these overdraw once balances shift; that is fine.
                let _ = ledger
                    .transfer(from, from, to, tok("7.0000 TOK"), "", true)
                    .await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(ledger.supply("TOK").await.unwrap().supply, tok("800.0000 TOK"));
    assert_invariants(&ledger).await;
}
