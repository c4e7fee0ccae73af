//! Integration tests for wallet onboarding and transaction handling

use sierpinski_ledger::crypto::KeyPair;
use sierpinski_ledger::onboarding::{FounderOnboarding, StandardOnboarding};
use sierpinski_ledger::{Amount, Ledger, LedgerError, OnboardingPolicy, TransactionKind};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Helper to build a ledger with a founder and `members` onboarded wallets
fn onboarded(members: usize) -> Result<(Ledger, FounderOnboarding, Vec<StandardOnboarding>), Box<dyn std::error::Error>> {
    let mut ledger = Ledger::default();
    let policy = OnboardingPolicy::default();
    let founder = ledger.founder_onboarding(policy)?;
    let mut onboarded = Vec::new();
    for _ in 0..members {
        onboarded.push(ledger.standard_onboarding(policy, &founder.key)?);
    }
    Ok((ledger, founder, onboarded))
}

fn transfer(ledger: &mut Ledger, from: &StandardOnboarding, to: &str, amount: Amount) -> TestResult {
    let tx = ledger.factory().create(&from.wallet, to, amount)?;
    let tx = ledger.sign(&tx, &from.key)?;
    ledger.insert(vec![tx])?;
    Ok(())
}

#[test]
fn test_onboarding_then_transfer_scenario() -> TestResult {
    let (mut ledger, founder, members) = onboarded(1)?;
    let f = founder.foundational_wallet.as_str();
    let w1 = &members[0];
    let b0 = Amount::from_num(1_000_000);
    let allocation = Amount::from_num(100);

    assert_eq!(ledger.balance(&w1.wallet), allocation);
    assert_eq!(ledger.balance(f), b0 - allocation);

    transfer(&mut ledger, w1, f, Amount::from_num(5))?;
    assert_eq!(ledger.balance(&w1.wallet), allocation - Amount::from_num(5));
    assert_eq!(ledger.balance(f), b0 - allocation + Amount::from_num(5));
    assert!(ledger.verify_ledger());
    Ok(())
}

#[test]
fn test_repeated_onboarding_gives_distinct_addresses() -> TestResult {
    let (ledger, founder, members) = onboarded(5)?;
    let mut addresses: Vec<_> = members.iter().map(|m| m.wallet.clone()).collect();
    addresses.push(founder.foundational_wallet.clone());
    addresses.sort();
    addresses.dedup();
    assert_eq!(addresses.len(), 6);
    assert_eq!(ledger.registry().len(), 6);
    Ok(())
}

#[test]
fn test_second_founder_fails() -> TestResult {
    let (mut ledger, _, _) = onboarded(0)?;
    let result = ledger.founder_onboarding(OnboardingPolicy::default());
    assert!(matches!(result, Err(LedgerError::FounderAlreadyExists(_))));
    Ok(())
}

#[test]
fn test_negative_amount_leaves_log_unchanged() -> TestResult {
    let (ledger, founder, members) = onboarded(1)?;
    let before = ledger.len();
    let result = ledger
        .factory()
        .create(&members[0].wallet, &founder.foundational_wallet, Amount::from_num(-1));
    assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
    assert_eq!(ledger.len(), before);
    Ok(())
}

#[test]
fn test_member_cannot_spend_for_another() -> TestResult {
    let (ledger, founder, members) = onboarded(2)?;
    let tx = ledger.factory().create(
        &members[0].wallet,
        &founder.foundational_wallet,
        Amount::from_num(1),
    )?;
    assert!(matches!(
        ledger.sign(&tx, &members[1].key),
        Err(LedgerError::UnauthorizedSigner(_))
    ));
    Ok(())
}

#[test]
fn test_transfers_to_unregistered_addresses() -> TestResult {
    let (mut ledger, _, members) = onboarded(1)?;
    let outsider = ledger.addressing().encode(4, 40)?;
    transfer(&mut ledger, &members[0], &outsider, Amount::from_num(12.5))?;

    assert_eq!(ledger.balance(&outsider), Amount::from_num(12.5));
    let history = ledger.query_by_wallet(&outsider);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TransactionKind::Transfer);

    // Nobody holds a key for the outsider, so it cannot spend yet.
    let back = ledger
        .factory()
        .create(&outsider, &members[0].wallet, Amount::from_num(1))?;
    let rogue = KeyPair::generate()?;
    assert!(matches!(
        ledger.sign(&back, &rogue),
        Err(LedgerError::UnauthorizedSigner(_))
    ));
    Ok(())
}

#[test]
fn test_balance_matches_wallet_history() -> TestResult {
    let (mut ledger, founder, members) = onboarded(3)?;
    transfer(&mut ledger, &members[0], &members[1].wallet, Amount::from_num(30))?;
    transfer(&mut ledger, &members[1], &members[2].wallet, Amount::from_num(45.25))?;
    transfer(&mut ledger, &members[2], &founder.foundational_wallet, Amount::from_num(1))?;

    let mut wallets: Vec<String> = members.iter().map(|m| m.wallet.clone()).collect();
    wallets.push(founder.foundational_wallet.clone());
    for wallet in &wallets {
        let replayed = ledger
            .query_by_wallet(wallet)
            .iter()
            .fold(Amount::ZERO, |acc, tx| acc + tx.balance_delta(wallet));
        assert_eq!(ledger.balance(wallet), replayed, "{}", wallet);
    }
    Ok(())
}
