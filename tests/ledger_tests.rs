mod common;

use chrono::Duration;
use common::fixture;
use monarch_core::ledger::period::backup_anchor;
use monarch_core::models::{
    NewAccount, NewPaymentTransaction, NewTransaction, NewTransfer, PaymentLeg, PaymentType, WalletEdit, WalletType,
};
use monarch_core::schema::entities::{BACKUP, CURRENCY, PAYMENT, TRANSACTION, WALLET, WALLET_BACKUP};
use monarch_core::{AppError, DomainError, Order, Query, Repository, Store};
use serde_json::json;

fn exit(wallet: i64, amount: i64) -> PaymentLeg {
    PaymentLeg {
        kind: PaymentType::Exit,
        amount,
        wallet,
    }
}

fn entry(wallet: i64, amount: i64) -> PaymentLeg {
    PaymentLeg {
        kind: PaymentType::Entry,
        amount,
        wallet,
    }
}

#[tokio::test]
async fn wallet_creation_records_starting_balance_in_anchor_backup() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 1000).await;
    let b = fx.wallet("Cash", WalletType::Other, 50).await;

    // Both wallets share the backup anchoring this month (created with the first category).
    assert_eq!(fx.count(&BACKUP).await, 1);
    let mut conn = fx.store.acquire().await.unwrap();
    let backup = Repository::of(&fx.model, &BACKUP)
        .find_one(conn.as_mut(), &Query::new().eq("user", fx.user))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(backup.str("date"), Some(backup_anchor(fx.today).to_string().as_str()));

    let baselines = Repository::of(&fx.model, &WALLET_BACKUP)
        .find_many(conn.as_mut(), &Query::new().eq("backup", backup.id().unwrap()).sort("wallet", Order::Asc))
        .await
        .unwrap();
    let pairs: Vec<(i64, i64)> = baselines
        .iter()
        .map(|r| (r.i64("wallet").unwrap(), r.i64("balance").unwrap()))
        .collect();
    assert_eq!(pairs, vec![(a, 1000), (b, 50)]);
}

#[tokio::test]
async fn wallet_for_foreign_account_is_rejected_without_writes() {
    let fx = fixture().await;
    let other = fx
        .seed(
            &monarch_core::schema::entities::USER,
            json!({ "email": "bo@example.com", "name": "Bo", "surname": "Lee", "birthday": "1985-01-01", "role": fx.role }),
        )
        .await
        .id()
        .unwrap();
    let input = monarch_core::models::NewWallet {
        name: "Stolen".into(),
        balance: 10,
        kind: WalletType::Balance,
        account: fx.account,
    };
    let err = fx.ledger.create_wallet_on(other, &input, fx.today).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(fx.count(&WALLET).await, 0);
    assert_eq!(fx.count(&WALLET_BACKUP).await, 0);
}

#[tokio::test]
async fn payment_moves_balance_and_nets_total() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 1000).await;

    let tx = fx
        .ledger
        .record_payment(&NewPaymentTransaction {
            date: fx.today,
            category: fx.groceries,
            legs: vec![exit(a, 300)],
        })
        .await
        .unwrap();

    assert_eq!(fx.balance(a).await, 700);
    assert_eq!(tx.i64("totalAmount"), Some(-300));
    assert_eq!(tx.str("type"), Some("payment"));
    assert_eq!(tx.many("paymentList").len(), 1);
    assert_eq!(fx.count(&PAYMENT).await, 1);
}

#[tokio::test]
async fn multi_leg_payment_signs_each_leg() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 1000).await;
    let b = fx.wallet("Cash", WalletType::Other, 100).await;

    let tx = fx
        .ledger
        .record_payment(&NewPaymentTransaction {
            date: fx.today,
            category: fx.groceries,
            legs: vec![exit(a, 250), entry(b, 40), exit(a, 10)],
        })
        .await
        .unwrap();

    assert_eq!(tx.i64("totalAmount"), Some(-220));
    assert_eq!(fx.balance(a).await, 740);
    assert_eq!(fx.balance(b).await, 140);
}

#[tokio::test]
async fn transfer_moves_amount_and_nets_to_zero() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 500).await;
    let b = fx.wallet("Piggy", WalletType::Saving, 0).await;

    let tx = fx
        .ledger
        .record(&NewTransaction::Transfer(NewTransfer {
            date: fx.today,
            category: fx.groceries,
            amount: 200,
            exit_wallet: a,
            entry_wallet: b,
        }))
        .await
        .unwrap();

    assert_eq!(fx.balance(a).await, 300);
    assert_eq!(fx.balance(b).await, 200);
    assert_eq!(tx.i64("totalAmount"), Some(0));
    assert_eq!(tx.str("type"), Some("transfer"));
    let legs: Vec<(Option<&str>, Option<i64>)> = tx
        .many("paymentList")
        .iter()
        .map(|p| (p.str("type"), p.i64("wallet")))
        .collect();
    assert_eq!(legs, vec![(Some("exit"), Some(a)), (Some("entry"), Some(b))]);
}

#[tokio::test]
async fn transfer_across_currencies_writes_nothing() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 500).await;
    let usd = fx
        .seed(&CURRENCY, json!({ "iso": "USD", "countryIso": "US" }))
        .await
        .id()
        .unwrap();
    let uc = fx.ledger.add_user_currency(fx.user, usd).await.unwrap().id().unwrap();
    let dollars = fx
        .ledger
        .create_account(&NewAccount {
            name: "Dollars".into(),
            currency: uc,
        })
        .await
        .unwrap()
        .id()
        .unwrap();
    let c = fx.wallet_in(dollars, "USD cash", WalletType::Balance, 80).await;

    let err = fx
        .ledger
        .record_transfer(&NewTransfer {
            date: fx.today,
            category: fx.groceries,
            amount: 100,
            exit_wallet: a,
            entry_wallet: c,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Domain(DomainError::CurrencyMismatch { .. })));
    assert_eq!(fx.count(&TRANSACTION).await, 0);
    assert_eq!(fx.count(&PAYMENT).await, 0);
    assert_eq!(fx.balance(a).await, 500);
    assert_eq!(fx.balance(c).await, 80);
}

#[tokio::test]
async fn rejected_requests() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 500).await;

    let same = NewTransfer {
        date: fx.today,
        category: fx.groceries,
        amount: 1,
        exit_wallet: a,
        entry_wallet: a,
    };
    assert!(matches!(
        fx.ledger.record_transfer(&same).await,
        Err(AppError::Domain(DomainError::SameWallet(w))) if w == a
    ));
    assert!(matches!(
        fx.ledger.record(&NewTransaction::Exchange).await,
        Err(AppError::Domain(DomainError::ExchangeNotSupported))
    ));
    let empty = NewPaymentTransaction {
        date: fx.today,
        category: fx.groceries,
        legs: vec![],
    };
    assert!(matches!(fx.ledger.record_payment(&empty).await, Err(AppError::Validation(_))));
    let negative = NewPaymentTransaction {
        date: fx.today,
        category: fx.groceries,
        legs: vec![exit(a, -5)],
    };
    assert!(matches!(fx.ledger.record_payment(&negative).await, Err(AppError::Validation(_))));
    assert_eq!(fx.count(&TRANSACTION).await, 0);
}

#[tokio::test]
async fn payment_on_unknown_wallet_rolls_back() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 500).await;

    let err = fx
        .ledger
        .record_payment(&NewPaymentTransaction {
            date: fx.today,
            category: fx.groceries,
            legs: vec![exit(a, 100), exit(9999, 5)],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(fx.balance(a).await, 500);
    assert_eq!(fx.count(&TRANSACTION).await, 0);
    assert_eq!(fx.count(&PAYMENT).await, 0);
}

#[tokio::test]
async fn payment_with_unknown_category_rolls_back_balances() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 500).await;

    let err = fx
        .ledger
        .record_payment(&NewPaymentTransaction {
            date: fx.today,
            category: 4242,
            legs: vec![exit(a, 100)],
        })
        .await
        .unwrap_err();

    assert!(err.is_storage_fault());
    assert_eq!(fx.balance(a).await, 500);
    assert_eq!(fx.count(&PAYMENT).await, 0);
}

#[tokio::test]
async fn wallet_edit_keeps_balance() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 500).await;
    let row = fx
        .ledger
        .update_wallet(
            a,
            &WalletEdit {
                name: Some("Main".into()),
                kind: Some(WalletType::Reserve),
            },
        )
        .await
        .unwrap();
    assert_eq!(row.str("name"), Some("Main"));
    assert_eq!(row.str("type"), Some("reserve"));
    assert_eq!(row.i64("balance"), Some(500));
    assert!(matches!(
        fx.ledger.update_wallet(777, &WalletEdit::default()).await,
        Err(AppError::NotFound(_))
    ));
}

/// Deterministic xorshift so runs are reproducible.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

#[tokio::test]
async fn balances_equal_baseline_plus_signed_payments() {
    let fx = fixture().await;
    let starts = [1000, 250, 0];
    let mut wallets = Vec::new();
    for (i, start) in starts.iter().enumerate() {
        wallets.push(fx.wallet(&format!("w{}", i), WalletType::Balance, *start).await);
    }

    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
    let mut expected = starts.to_vec();
    for _ in 0..60 {
        let i = (rng.next() % 3) as usize;
        let amount = (rng.next() % 90) as i64 + 1;
        if rng.next() % 3 == 0 {
            let j = (i + 1 + (rng.next() % 2) as usize) % 3;
            fx.ledger
                .record_transfer(&NewTransfer {
                    date: fx.today,
                    category: fx.groceries,
                    amount,
                    exit_wallet: wallets[i],
                    entry_wallet: wallets[j],
                })
                .await
                .unwrap();
            expected[i] -= amount;
            expected[j] += amount;
        } else {
            let mut legs = Vec::new();
            for n in 0..1 + rng.next() % 4 {
                let w = if n == 0 { i } else { (rng.next() % 3) as usize };
                let amount = if n == 0 { amount } else { (rng.next() % 120) as i64 + 1 };
                let leg = if rng.next() % 2 == 0 { entry(wallets[w], amount) } else { exit(wallets[w], amount) };
                expected[w] += leg.kind.sign() * amount;
                legs.push(leg);
            }
            let count = legs.len();
            let recorded = fx
                .ledger
                .record_payment(&NewPaymentTransaction {
                    date: fx.today,
                    category: fx.groceries,
                    legs,
                })
                .await
                .unwrap();
            assert_eq!(recorded.many("paymentList").len(), count);
        }
    }

    for (i, wallet) in wallets.iter().enumerate() {
        assert_eq!(fx.balance(*wallet).await, expected[i]);
        assert_eq!(fx.ledger.balance_at(*wallet, fx.today).await.unwrap(), expected[i]);
        assert_eq!(
            fx.ledger
                .balance_at(*wallet, backup_anchor(fx.today))
                .await
                .unwrap(),
            starts[i]
        );
    }
    let total: i64 = expected.iter().sum::<i64>() - starts.iter().sum::<i64>();
    let mut conn = fx.store.acquire().await.unwrap();
    let stored = Repository::of(&fx.model, &TRANSACTION)
        .find_many(conn.as_mut(), &Query::new().populate("payment", Query::new()))
        .await
        .unwrap();
    assert_eq!(stored.len(), 60);
    for t in &stored {
        let legs: i64 = t
            .many("paymentList")
            .iter()
            .map(|p| {
                let amount = p.i64("amount").unwrap();
                if p.str("type") == Some("exit") { -amount } else { amount }
            })
            .sum();
        assert_eq!(t.i64("totalAmount"), Some(legs), "transaction {:?}", t.id());
    }
    let net: i64 = stored.iter().map(|t| t.i64("totalAmount").unwrap()).sum();
    assert_eq!(net, total);
}

#[tokio::test]
async fn amounts_out_of_range_are_rejected_without_writes() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 0).await;
    let full = fx.wallet("Full", WalletType::Saving, i64::MAX).await;

    let total_overflow = NewPaymentTransaction {
        date: fx.today,
        category: fx.groceries,
        legs: vec![entry(a, i64::MAX), entry(a, 1)],
    };
    assert!(matches!(fx.ledger.record_payment(&total_overflow).await, Err(AppError::Validation(_))));

    let balance_overflow = NewPaymentTransaction {
        date: fx.today,
        category: fx.groceries,
        legs: vec![entry(full, 1)],
    };
    assert!(matches!(fx.ledger.record_payment(&balance_overflow).await, Err(AppError::Validation(_))));

    let transfer = NewTransfer {
        date: fx.today,
        category: fx.groceries,
        amount: 1,
        exit_wallet: a,
        entry_wallet: full,
    };
    assert!(matches!(fx.ledger.record_transfer(&transfer).await, Err(AppError::Validation(_))));

    assert_eq!(fx.count(&TRANSACTION).await, 0);
    assert_eq!(fx.count(&PAYMENT).await, 0);
    assert_eq!(fx.balance(a).await, 0);
    assert_eq!(fx.balance(full).await, i64::MAX);
}

#[tokio::test]
async fn balance_before_any_backup_is_zero() {
    let fx = fixture().await;
    let a = fx.wallet("Checking", WalletType::Balance, 1000).await;
    let long_ago = backup_anchor(fx.today) - Duration::days(400);
    assert_eq!(fx.ledger.balance_at(a, long_ago).await.unwrap(), 0);
    assert!(matches!(fx.ledger.balance_at(31337, fx.today).await, Err(AppError::NotFound(_))));
}
