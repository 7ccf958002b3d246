//! Risk guard decisions against an in-memory customer store.
//!
//! Verifies:
//!   - Flagged accounts are blocked whatever the amounts
//!   - Only strictly positive pay-later lines count as pending credit
//!   - Reaching the limit exactly is allowed; exceeding it is not
//!   - Sub-accounts are checked against their commercial account's pool
//!   - Missing data and broken references block with their own message
//!   - Sums too large to represent block instead of panicking

use posrisk_core::{
    config::{GuardConfig, MissingRiskDataPolicy, DEFAULT_RISK_BODY, DEFAULT_RISK_TITLE},
    error::{RiskError, RiskResult},
    guard::{pending_credit_amount, BlockReason, RiskDecision, RiskGuard},
    order::{Order, PaymentMethod, PaymentType},
    store::{CustomerStore, InMemoryCustomerStore},
    types::{Amount, CustomerId},
    CustomerRecord,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn amt(s: &str) -> Amount {
    s.parse().unwrap()
}

fn pay_later() -> PaymentMethod {
    PaymentMethod {
        id: 3,
        name: "Customer Account".into(),
        payment_type: PaymentType::PayLater,
    }
}

fn cash() -> PaymentMethod {
    PaymentMethod {
        id: 1,
        name: "Cash".into(),
        payment_type: PaymentType::Cash,
    }
}

fn bank() -> PaymentMethod {
    PaymentMethod {
        id: 2,
        name: "Card".into(),
        payment_type: PaymentType::Bank,
    }
}

fn guard_with(records: Vec<CustomerRecord>) -> RiskGuard<InMemoryCustomerStore> {
    init_logging();
    RiskGuard::new(records.into_iter().collect(), GuardConfig::default())
}

fn reason(decision: &RiskDecision) -> &BlockReason {
    &decision.rejection().expect("expected a block").reason
}

/// Scenario A: a pay-later line bringing risk exactly to the limit.
#[test]
fn amount_equal_to_limit_is_allowed() {
    let guard = guard_with(vec![CustomerRecord::commercial(1, "Acme", amt("0"), amt("100"))]);
    let order = Order::new("A", Some(1)).with_line(pay_later(), amt("100"));

    assert_eq!(guard.evaluate(&order), RiskDecision::Allow);
}

/// Scenario B: one cent over the limit.
#[test]
fn amount_over_limit_is_blocked_with_credit_limit_message() {
    let guard = guard_with(vec![CustomerRecord::commercial(1, "Acme", amt("0"), amt("100"))]);
    let order = Order::new("B", Some(1)).with_line(pay_later(), amt("100.01"));

    let decision = guard.evaluate(&order);
    let rejection = decision.rejection().expect("should block");
    assert_eq!(
        rejection.reason,
        BlockReason::CreditLimitExceeded {
            commercial_id: 1,
            risk_total: amt("0"),
            pending: amt("100.01"),
            credit_limit: amt("100"),
        }
    );
    assert_eq!(rejection.title, DEFAULT_RISK_TITLE);
    assert_eq!(rejection.body, DEFAULT_RISK_BODY);
    assert!(rejection.body.contains("credit limit"));
}

/// Scenario C: a flagged account is blocked even far below its limit.
#[test]
fn risk_exception_blocks_regardless_of_amount() {
    let guard = guard_with(vec![
        CustomerRecord::commercial(1, "Acme", amt("0"), amt("1000")).with_risk_exception(true),
    ]);
    let order = Order::new("C", Some(1)).with_line(pay_later(), amt("1"));

    assert_eq!(
        reason(&guard.evaluate(&order)),
        &BlockReason::RiskException { commercial_id: 1 }
    );
}

/// A flagged account is blocked even with no deferred payment at all.
#[test]
fn risk_exception_blocks_cash_only_order() {
    let guard = guard_with(vec![
        CustomerRecord::commercial(1, "Acme", amt("0"), amt("1000")).with_risk_exception(true),
    ]);
    let order = Order::new("C2", Some(1)).with_line(cash(), amt("20"));

    assert!(!guard.evaluate(&order).is_allowed());
}

/// Scenario D: a refund line is excluded from the pending sum, not subtracted.
#[test]
fn refund_line_is_excluded_not_subtracted() {
    let guard = guard_with(vec![CustomerRecord::commercial(1, "Acme", amt("0"), amt("80"))]);
    let order = Order::new("D", Some(1))
        .with_line(pay_later(), amt("80"))
        .with_line(pay_later(), amt("-30"));

    let assessment = guard.assess(&order);
    assert_eq!(assessment.pending_credit_amount, amt("80"));
    assert_eq!(assessment.decision, RiskDecision::Allow);
}

/// Scenario E: a sub-account without risk data uses its parent's pool.
#[test]
fn sub_account_is_checked_against_commercial_pool() {
    let guard = guard_with(vec![
        CustomerRecord::commercial(10, "Acme Corp", amt("50"), amt("50")),
        CustomerRecord::sub_account(11, "Acme Corp, Jane Roe", 10),
    ]);
    let order = Order::new("E", Some(11)).with_line(pay_later(), amt("1"));

    let assessment = guard.assess(&order);
    assert_eq!(assessment.commercial_id, Some(10));
    assert_eq!(
        reason(&assessment.decision),
        &BlockReason::CreditLimitExceeded {
            commercial_id: 10,
            risk_total: amt("50"),
            pending: amt("1"),
            credit_limit: amt("50"),
        }
    );
}

/// Sub-account flags are ignored; only the commercial account's count.
#[test]
fn sub_account_own_figures_are_not_authoritative() {
    let mut contact = CustomerRecord::sub_account(11, "Contact", 10);
    contact.risk_total = Some(amt("0"));
    contact.credit_limit = Some(amt("1000"));
    let guard = guard_with(vec![
        CustomerRecord::commercial(10, "Parent", amt("90"), amt("100")),
        contact,
    ]);
    let order = Order::new("E2", Some(11)).with_line(pay_later(), amt("20"));

    assert!(!guard.evaluate(&order).is_allowed());
}

/// Non-pay-later lines never count, however large.
#[test]
fn settled_payment_methods_do_not_count() {
    let guard = guard_with(vec![CustomerRecord::commercial(1, "Acme", amt("40"), amt("50"))]);
    let order = Order::new("F", Some(1))
        .with_line(cash(), amt("5000"))
        .with_line(bank(), amt("300"))
        .with_line(pay_later(), amt("10"));

    let assessment = guard.assess(&order);
    assert_eq!(assessment.pending_credit_amount, amt("10"));
    assert!(assessment.decision.is_allowed());
}

#[test]
fn pending_sum_keeps_only_positive_pay_later_amounts() {
    let order = Order::new("G", None)
        .with_line(pay_later(), amt("12.50"))
        .with_line(pay_later(), amt("0"))
        .with_line(pay_later(), amt("-7"))
        .with_line(cash(), amt("99"))
        .with_line(pay_later(), amt("0.25"));

    assert_eq!(pending_credit_amount(&order.payment_lines), amt("12.75"));
}

/// With nothing deferred, the guard blocks iff the account is already over.
#[test]
fn without_deferred_amount_blocks_only_when_already_over_limit() {
    let over = guard_with(vec![CustomerRecord::commercial(1, "Over", amt("100.01"), amt("100"))]);
    let at = guard_with(vec![CustomerRecord::commercial(1, "At", amt("100"), amt("100"))]);
    let order = Order::new("H", Some(1))
        .with_line(pay_later(), amt("-20"))
        .with_line(cash(), amt("20"));

    assert!(!over.evaluate(&order).is_allowed());
    assert!(at.evaluate(&order).is_allowed());
}

/// A zero credit limit blocks any deferred payment.
#[test]
fn zero_credit_limit_blocks_any_deferred_payment() {
    let guard = guard_with(vec![CustomerRecord::commercial(1, "Acme", amt("0"), amt("0"))]);

    let deferred = Order::new("I", Some(1)).with_line(pay_later(), amt("0.01"));
    let settled = Order::new("I2", Some(1)).with_line(cash(), amt("10"));

    assert!(!guard.evaluate(&deferred).is_allowed());
    assert!(guard.evaluate(&settled).is_allowed());
}

#[test]
fn unresolved_commercial_account_blocks_with_distinct_reason() {
    let guard = guard_with(vec![CustomerRecord::sub_account(11, "Orphan", 10)]);
    let order = Order::new("J", Some(11)).with_line(pay_later(), amt("1"));

    let decision = guard.evaluate(&order);
    let rejection = decision.rejection().expect("should block");
    assert_eq!(
        rejection.reason,
        BlockReason::CommercialAccountNotFound {
            customer_id: 11,
            commercial_id: 10
        }
    );
    assert_ne!(rejection.title, DEFAULT_RISK_TITLE);
}

#[test]
fn unknown_customer_blocks() {
    let guard = guard_with(vec![]);
    let order = Order::new("K", Some(7)).with_line(cash(), amt("1"));

    assert_eq!(
        reason(&guard.evaluate(&order)),
        &BlockReason::CustomerNotFound { customer_id: 7 }
    );
}

#[test]
fn missing_risk_field_blocks_under_default_policy() {
    let mut record = CustomerRecord::commercial(1, "Acme", amt("0"), amt("100"));
    record.credit_limit = None;
    let guard = guard_with(vec![record]);
    let order = Order::new("L", Some(1)).with_line(pay_later(), amt("1"));

    let decision = guard.evaluate(&order);
    let rejection = decision.rejection().expect("should block");
    assert_eq!(
        rejection.reason,
        BlockReason::RiskDataUnavailable {
            customer_id: 1,
            field: "credit_limit"
        }
    );
    assert!(rejection.body.contains("credit_limit"));
}

#[test]
fn missing_risk_fields_read_as_zero_when_configured() {
    let record = CustomerRecord {
        id: 1,
        name: "Acme".into(),
        risk_exception: None,
        risk_total: None,
        credit_limit: Some(amt("10")),
        commercial_account_id: Some(1),
    };
    let store: InMemoryCustomerStore = vec![record].into_iter().collect();
    let guard = RiskGuard::new(
        store,
        GuardConfig::default().with_missing_risk_data(MissingRiskDataPolicy::TreatAsZero),
    );

    let within = Order::new("M", Some(1)).with_line(pay_later(), amt("10"));
    let over = Order::new("M2", Some(1)).with_line(pay_later(), amt("10.5"));

    assert!(guard.evaluate(&within).is_allowed());
    assert!(!guard.evaluate(&over).is_allowed());
}

/// The commercial reference is never defaulted, whatever the policy.
#[test]
fn missing_commercial_reference_always_blocks() {
    let mut record = CustomerRecord::commercial(1, "Acme", amt("0"), amt("100"));
    record.commercial_account_id = None;
    let store: InMemoryCustomerStore = vec![record].into_iter().collect();
    let guard = RiskGuard::new(
        store,
        GuardConfig::default().with_missing_risk_data(MissingRiskDataPolicy::TreatAsZero),
    );
    let order = Order::new("N", Some(1)).with_line(cash(), amt("1"));

    assert_eq!(
        reason(&guard.evaluate(&order)),
        &BlockReason::RiskDataUnavailable {
            customer_id: 1,
            field: "commercial_account_id"
        }
    );
}

#[test]
fn anonymous_order_is_allowed_without_deferred_payment() {
    let guard = guard_with(vec![]);
    let order = Order::new("O", None).with_line(cash(), amt("12"));

    assert!(guard.evaluate(&order).is_allowed());
}

#[test]
fn anonymous_order_with_deferred_payment_requires_customer() {
    let guard = guard_with(vec![]);
    let order = Order::new("P", None).with_line(pay_later(), amt("12"));

    assert_eq!(reason(&guard.evaluate(&order)), &BlockReason::CustomerRequired);
}

struct FailingStore;

impl CustomerStore for FailingStore {
    fn lookup(&self, _id: CustomerId) -> RiskResult<Option<CustomerRecord>> {
        Err(RiskError::Other(anyhow::anyhow!("connection reset")))
    }
}

/// A store failure is a block, never an allow and never a panic.
#[test]
fn store_failure_blocks() {
    init_logging();
    let guard = RiskGuard::new(FailingStore, GuardConfig::default());
    let order = Order::new("Q", Some(1)).with_line(pay_later(), amt("1"));

    match reason(&guard.evaluate(&order)) {
        BlockReason::StoreUnavailable { reason } => assert!(reason.contains("connection reset")),
        other => panic!("unexpected reason {other:?}"),
    }
}

#[test]
fn configured_messages_are_used_for_risk_blocks() {
    let config = GuardConfig::from_json(
        r#"{ "messages": { "risk_exceeded_title": "Riesgo excedido" } }"#,
    )
    .unwrap();
    let store: InMemoryCustomerStore =
        vec![CustomerRecord::commercial(1, "Acme", amt("0"), amt("5"))]
            .into_iter()
            .collect();
    let guard = RiskGuard::new(store, config);
    let order = Order::new("R", Some(1)).with_line(pay_later(), amt("6"));

    let decision = guard.evaluate(&order);
    let rejection = decision.rejection().unwrap();
    assert_eq!(rejection.title, "Riesgo excedido");
    assert_eq!(rejection.body, DEFAULT_RISK_BODY);
}

/// Evaluating twice gives the same answer; the guard keeps no state.
#[test]
fn evaluation_is_repeatable() {
    let guard = guard_with(vec![CustomerRecord::commercial(1, "Acme", amt("30"), amt("50"))]);
    let order = Order::new("S", Some(1)).with_line(pay_later(), amt("20"));

    let first = guard.assess(&order);
    let second = guard.assess(&order);
    assert_eq!(first, second);
    assert!(first.decision.is_allowed());
}

/// A risk total at the top of the range plus any pending credit is over
/// every representable limit.
#[test]
fn exposure_overflow_blocks_as_credit_limit_exceeded() {
    let guard = guard_with(vec![CustomerRecord::commercial(1, "Acme", Amount::MAX, Amount::MAX)]);
    let order = Order::new("T", Some(1)).with_line(pay_later(), Amount::ONE);

    assert_eq!(
        reason(&guard.evaluate(&order)),
        &BlockReason::CreditLimitExceeded {
            commercial_id: 1,
            risk_total: Amount::MAX,
            pending: Amount::ONE,
            credit_limit: Amount::MAX,
        }
    );
}

#[test]
fn pending_sum_overflow_blocks_and_reports_saturated_amount() {
    let guard = guard_with(vec![CustomerRecord::commercial(1, "Acme", amt("0"), Amount::MAX)]);
    let order = Order::new("T2", Some(1))
        .with_line(pay_later(), Amount::MAX)
        .with_line(pay_later(), Amount::MAX);

    let assessment = guard.assess(&order);
    assert_eq!(assessment.pending_credit_amount, Amount::MAX);
    assert!(matches!(
        reason(&assessment.decision),
        BlockReason::CreditLimitExceeded { .. }
    ));
}

/// A credit balance does not hide an unrepresentable pending sum.
#[test]
fn pending_sum_overflow_blocks_despite_negative_risk_total() {
    let guard = guard_with(vec![CustomerRecord::commercial(1, "Acme", amt("-1"), Amount::MAX)]);
    let order = Order::new("T3", Some(1))
        .with_line(pay_later(), Amount::MAX)
        .with_line(pay_later(), amt("2"));

    assert!(!guard.evaluate(&order).is_allowed());
}

/// The flag is read before the amounts, so unloaded figures do not turn a
/// risk exception into a data error.
#[test]
fn risk_exception_wins_over_missing_amounts() {
    let record = CustomerRecord {
        id: 1,
        name: "Acme".into(),
        risk_exception: Some(true),
        risk_total: None,
        credit_limit: None,
        commercial_account_id: Some(1),
    };
    let guard = guard_with(vec![record]);
    let order = Order::new("U", Some(1)).with_line(cash(), amt("1"));

    let assessment = guard.assess(&order);
    let rejection = assessment.decision.rejection().expect("should block");
    assert_eq!(rejection.reason, BlockReason::RiskException { commercial_id: 1 });
    assert_eq!(rejection.title, DEFAULT_RISK_TITLE);
    assert_eq!(assessment.risk_total, None);
}

/// Payment mixes covering every method and sign, as (method, amount) pairs.
fn payment_mixes() -> Vec<Vec<(PaymentMethod, Amount)>> {
    vec![
        vec![],
        vec![(cash(), amt("10"))],
        vec![(pay_later(), amt("0"))],
        vec![(pay_later(), amt("-15.5"))],
        vec![(pay_later(), amt("0.01"))],
        vec![(pay_later(), amt("40")), (pay_later(), amt("-40"))],
        vec![(bank(), amt("-3")), (pay_later(), amt("2.5")), (cash(), amt("7"))],
        vec![
            (pay_later(), amt("1000")),
            (pay_later(), amt("0.99")),
            (pay_later(), amt("-0.99")),
            (bank(), amt("1000")),
        ],
    ]
}

fn order_from(uid: &str, customer: Option<CustomerId>, mix: &[(PaymentMethod, Amount)]) -> Order {
    mix.iter().fold(Order::new(uid, customer), |order, (method, amount)| {
        order.with_line(method.clone(), *amount)
    })
}

#[test]
fn flagged_account_blocks_every_payment_mix() {
    let guard = guard_with(vec![
        CustomerRecord::commercial(1, "Acme", amt("-500"), amt("1000000")).with_risk_exception(true),
        CustomerRecord::sub_account(2, "Acme, Contact", 1),
    ]);

    for (i, mix) in payment_mixes().iter().enumerate() {
        for customer in [1, 2] {
            let order = order_from(&format!("V{i}-{customer}"), Some(customer), mix);
            assert_eq!(
                reason(&guard.evaluate(&order)),
                &BlockReason::RiskException { commercial_id: 1 },
                "mix {i} for customer {customer}"
            );
        }
    }
}

#[test]
fn pending_sum_equals_positive_pay_later_total_for_every_mix() {
    for (i, mix) in payment_mixes().iter().enumerate() {
        let expected: Amount = mix
            .iter()
            .filter(|(method, amount)| {
                method.payment_type == PaymentType::PayLater && *amount > Amount::ZERO
            })
            .map(|(_, amount)| *amount)
            .sum();
        let order = order_from(&format!("W{i}"), None, mix);

        assert_eq!(
            pending_credit_amount(&order.payment_lines),
            expected,
            "mix {i}"
        );
        assert!(pending_credit_amount(&order.payment_lines) >= Amount::ZERO);
    }
}

/// For an unflagged pool the decision is exactly `risk_total + pending > limit`.
#[test]
fn decision_follows_strict_limit_for_every_mix() {
    let limits = [amt("0"), amt("2.5"), amt("40"), amt("1000.99")];
    for limit in limits {
        let guard = guard_with(vec![CustomerRecord::commercial(1, "Acme", amt("0"), limit)]);
        for (i, mix) in payment_mixes().iter().enumerate() {
            let order = order_from(&format!("X{i}"), Some(1), mix);
            let pending = pending_credit_amount(&order.payment_lines);

            assert_eq!(
                guard.evaluate(&order).is_allowed(),
                pending <= limit,
                "mix {i} against limit {limit}"
            );
        }
    }
}
