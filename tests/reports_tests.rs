mod common;

use common::{fixture, Fixture};
use monarch_core::models::{CategoryType, NewPaymentTransaction, NewTransfer, PaymentLeg, PaymentType, WalletType};
use monarch_core::reports::Buckets;
use monarch_core::Reports;

struct Books {
    fx: Fixture,
    reports: Reports,
    salary: i64,
    savings: i64,
}

/// Groceries (expense, 400), Salary (income, 3000), Savings (saving, accumulating, 500) and
/// Moves (operation, 0). Checking pays 300 for groceries, receives 2000 salary and moves 200
/// to the saving wallet under Savings.
async fn books() -> Books {
    let fx = fixture().await;
    let salary = fx.category("Salary", CategoryType::Income, false, 3000).await;
    let savings = fx.category("Savings", CategoryType::Saving, true, 500).await;
    let moves = fx.category("Moves", CategoryType::Operation, false, 0).await;
    let checking = fx.wallet("Checking", WalletType::Balance, 1000).await;
    let piggy = fx.wallet("Piggy", WalletType::Saving, 0).await;

    let pay = |category, kind, amount| NewPaymentTransaction {
        date: fx.today,
        category,
        legs: vec![PaymentLeg {
            kind,
            amount,
            wallet: checking,
        }],
    };
    fx.ledger.record_payment(&pay(fx.groceries, PaymentType::Exit, 300)).await.unwrap();
    fx.ledger.record_payment(&pay(salary, PaymentType::Entry, 2000)).await.unwrap();
    fx.ledger.record_payment(&pay(moves, PaymentType::Exit, 7)).await.unwrap();
    fx.ledger
        .record_transfer(&NewTransfer {
            date: fx.today,
            category: savings,
            amount: 200,
            exit_wallet: checking,
            entry_wallet: piggy,
        })
        .await
        .unwrap();

    let reports = Reports::new(fx.ledger.clone());
    Books {
        fx,
        reports,
        salary,
        savings,
    }
}

#[tokio::test]
async fn budget_box_sums_budgets_in_force() {
    let b = books().await;
    let boxed = b.reports.budget_box(b.fx.user, b.fx.year(), b.fx.month()).await.unwrap();
    assert_eq!(
        boxed,
        Buckets {
            expense: 400,
            income: 3000,
            saving: 500,
            reserve: 500,
        }
    );
}

#[tokio::test]
async fn total_box_combines_balances_and_month_totals() {
    let b = books().await;
    let boxed = b
        .reports
        .total_box(b.fx.user, b.fx.year(), b.fx.month(), b.fx.today)
        .await
        .unwrap();
    // saving: piggy balance 200 + transfer entry 200; expense: -300 groceries - 200 transfer exit
    assert_eq!(
        boxed,
        Buckets {
            expense: -500,
            income: 2000,
            saving: 400,
            reserve: 0,
        }
    );
}

#[tokio::test]
async fn category_expenses_lists_every_category_sorted() {
    let b = books().await;
    let lines = b
        .reports
        .category_expenses(b.fx.user, b.fx.year(), b.fx.month())
        .await
        .unwrap();
    let view: Vec<(&str, i64, i64, Option<i64>)> = lines
        .iter()
        .map(|l| (l.category.as_str(), l.budget, l.spent, l.accumulated))
        .collect();
    assert_eq!(
        view,
        vec![
            ("Groceries", 400, -300, None),
            ("Moves", 0, -7, None),
            ("Salary", 3000, 2000, None),
            ("Savings", 500, 0, Some(0)),
        ]
    );
    assert!(lines.iter().all(|l| l.group == "Home"));
    assert_eq!(lines[2].category_id, b.salary);
    assert_eq!(lines[3].category_id, b.savings);
}
