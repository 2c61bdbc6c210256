//! Daily drawdown gate
//!
//! Validates: drawdown-aware admission control on an FTMO-style account.
//!
//! GREEN when:
//! - Balance 97,500 with peak 105,000 and daily start 103,000 passes the
//!   total-drawdown cap (7.14% < 10%) but is denied on daily drawdown with
//!   the exact reason `Daily drawdown limit breached (5.34% >= 5.00%)`.
//! - Denial is idempotent: the same state gives the same answer every time
//!   and the state is not modified.
//! - Checks run in a fixed order (daily drawdown before trade count).

use rcl_config::{LimitsSection, ProtectionSection, RiskPolicy, RiskSection};
use rcl_risk::{AccountLimits, AccountState, Admission, Denial, RiskGate};

fn policy() -> RiskPolicy {
    RiskPolicy {
        enabled: true,
        locked: false,
        risk: RiskSection {
            max_risk_per_trade: 0.01,
            min_risk_reward: 1.5,
        },
        limits: LimitsSection {
            max_concurrent_positions: 3,
            max_trades_per_day: 10,
        },
        protection: ProtectionSection {
            breakeven_threshold: 0.005,
            trail_activation: 0.01,
            trail_distance: 0.008,
        },
    }
}

fn breached_state() -> AccountState {
    let mut st = AccountState::new("ftmo-100k", 100_000.0);
    st.current_balance = 97_500.0;
    st.peak_balance = 105_000.0;
    st.daily_start_balance = 103_000.0;
    st.daily_peak_balance = 103_000.0;
    st
}

#[test]
fn daily_drawdown_breach_is_denied_with_exact_reason() {
    let gate = RiskGate::new(AccountLimits::default(), &policy());
    let st = breached_state();

    assert!((st.total_drawdown() - 0.071428).abs() < 1e-5);
    assert!((st.daily_drawdown() - 0.053398).abs() < 1e-5);

    match gate.can_trade(&st, 0) {
        Admission::Denied(d) => {
            assert!(matches!(d, Denial::DailyDrawdown { .. }));
            assert_eq!(d.to_string(), "Daily drawdown limit breached (5.34% >= 5.00%)");
        }
        Admission::Allowed => panic!("breached account must be denied"),
    }
    assert!(gate.daily_drawdown_breached(&st).is_some());
}

#[test]
fn denial_is_idempotent_and_pure() {
    let gate = RiskGate::new(AccountLimits::default(), &policy());
    let st = breached_state();
    let snapshot = st.clone();

    let first = gate.can_trade(&st, 0);
    for _ in 0..5 {
        assert_eq!(gate.can_trade(&st, 0), first);
    }
    assert_eq!(st, snapshot);
}

#[test]
fn daily_drawdown_checked_before_trade_count() {
    let gate = RiskGate::new(AccountLimits::default(), &policy());
    let mut st = breached_state();
    st.trades_today = 50;
    st.consecutive_losses = 9;
    let Admission::Denied(d) = gate.can_trade(&st, 99) else {
        panic!("must deny");
    };
    assert!(matches!(d, Denial::DailyDrawdown { .. }), "{d}");
}

#[test]
fn total_drawdown_denies_when_daily_is_fine() {
    let gate = RiskGate::new(AccountLimits::default(), &policy());
    let mut st = AccountState::new("a", 100_000.0);
    st.peak_balance = 110_000.0;
    st.current_balance = 98_000.0;
    st.daily_start_balance = 99_000.0;
    let Admission::Denied(d) = gate.can_trade(&st, 0) else {
        panic!("must deny");
    };
    assert_eq!(d.to_string(), "Total drawdown limit breached (10.91% >= 10.00%)");
}

#[test]
fn trade_count_positions_and_streak_limits() {
    let gate = RiskGate::new(AccountLimits::default(), &policy());

    let mut st = AccountState::new("a", 100_000.0);
    st.trades_today = 10;
    let Admission::Denied(d) = gate.can_trade(&st, 0) else { panic!() };
    assert_eq!(d.to_string(), "Daily trade limit reached (10 >= 10)");

    let st = AccountState::new("a", 100_000.0);
    let Admission::Denied(d) = gate.can_trade(&st, 3) else { panic!() };
    assert_eq!(d.to_string(), "Max concurrent positions reached (3 >= 3)");

    let mut st = AccountState::new("a", 100_000.0);
    st.consecutive_losses = 3;
    let Admission::Denied(d) = gate.can_trade(&st, 0) else { panic!() };
    assert_eq!(
        d.to_string(),
        "Loss streak circuit breaker tripped (3 consecutive losses >= 3)"
    );

    assert_eq!(gate.can_trade(&AccountState::new("a", 100_000.0), 2), Admission::Allowed);
}

#[test]
fn non_positive_reference_balance_is_denied_not_divided() {
    let gate = RiskGate::new(AccountLimits::default(), &policy());
    let st = AccountState::new("a", 0.0);
    assert!(matches!(
        gate.can_trade(&st, 0),
        Admission::Denied(Denial::InvalidAccountState { .. })
    ));
}
