//! Engine scenarios against the paper broker.
//!
//! Each test drives a `PositionManager` the way the daemon does: a tick or
//! bar close at a time, with the broker as the only source of truth.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use warden_domain::{
    BarClose, ClosedTrade, ExitReason, Instrument, Lots, MarketSnapshot, OwnerTag, Position, Price,
    Side, Symbol,
};
use warden_engine::{Engine, EngineConfig, Momentum, RiskStatus};
use warden_exec::{BrokerCall, BrokerPort, StubBroker};
use wardend::{EngineStatus, PositionManager};

// =============================================================================
// Fixtures
// =============================================================================

fn symbol() -> Symbol {
    Symbol::new("EURUSD").unwrap()
}

fn tag() -> OwnerTag {
    OwnerTag::new("Warden").unwrap()
}

fn config() -> EngineConfig {
    let instrument = Instrument::new(symbol(), dec!(0.0001), dec!(10), dec!(100000)).unwrap();
    EngineConfig::with_instrument(instrument, tag())
}

/// Tuesday 2024-03-05, `hour:minute` UTC
fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, hour, minute, 0).unwrap()
}

fn quote(bid: Decimal, ask: Decimal, time: DateTime<Utc>) -> MarketSnapshot {
    MarketSnapshot {
        symbol: symbol(),
        bid,
        ask,
        pip_size: dec!(0.0001),
        server_time: time,
        time_till_close_secs: Some(8 * 60 * 60),
    }
}

fn position(owner: &str, side: Side, entry: Decimal, stop: Option<Decimal>) -> Position {
    Position {
        id: Uuid::now_v7(),
        symbol: symbol(),
        owner_tag: OwnerTag::new(owner).unwrap(),
        side,
        entry_price: Price::new(entry).unwrap(),
        stop_loss: stop.map(|s| Price::new(s).unwrap()),
        take_profit: None,
        volume: Lots::new(dec!(1)).unwrap(),
        opened_at: at(9, 0),
    }
}

fn setup(config: EngineConfig) -> (PositionManager<StubBroker>, Arc<StubBroker>) {
    let broker = Arc::new(StubBroker::new(config.instrument.clone(), dec!(10000)));
    let manager = PositionManager::new(Engine::new(config).unwrap(), broker.clone(), Momentum);
    (manager, broker)
}

fn submits(broker: &StubBroker) -> Vec<BrokerCall> {
    broker
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BrokerCall::SubmitMarketOrder { .. }))
        .collect()
}

// =============================================================================
// Sizing
// =============================================================================

#[test]
fn test_risk_based_volume() {
    // 10000 × 1.8% = 180 at risk over 9 pips × 10 per pip → 2 lots
    let (mut manager, broker) = setup(config());
    let snap = quote(dec!(1.1000), dec!(1.1000), at(10, 0));
    manager.on_tick(&snap).unwrap();

    let bar = BarClose {
        symbol: symbol(),
        current_bar_open: at(10, 0),
        close: dec!(1.1003),
        prev_close: dec!(1.1000),
    };
    manager.on_bar_closed(&bar, &snap).unwrap();

    assert_eq!(
        submits(&broker),
        vec![BrokerCall::SubmitMarketOrder {
            side: Side::Long,
            lots: dec!(2),
            units: dec!(200000),
        }]
    );
}

#[test]
fn test_fixed_volume_when_dynamic_disabled() {
    let mut cfg = config();
    cfg.use_dynamic_lot = false;
    cfg.fixed_lot = dec!(0.5);
    cfg.min_lot = dec!(0.01);
    let (mut manager, broker) = setup(cfg);
    let snap = quote(dec!(1.1000), dec!(1.1000), at(10, 0));
    manager.on_tick(&snap).unwrap();

    manager.on_signal(Side::Short, dec!(1.1000), at(10, 0), &snap).unwrap();

    let positions = broker.open_positions(&symbol()).unwrap();
    assert_eq!(positions[0].volume.as_decimal(), dec!(0.5));
}

// =============================================================================
// Protective levels
// =============================================================================

#[test]
fn test_break_even_after_trigger() {
    let (mut manager, broker) = setup(config());
    let long = position("Warden", Side::Long, dec!(1.1000), Some(dec!(1.0991)));
    let id = long.id;
    broker.insert_position(long);

    // 10 pips in favor ≥ 7: stop to entry + 1 pip; trailing (1.0998) stays behind
    manager.on_tick(&quote(dec!(1.1010), dec!(1.1010), at(10, 0))).unwrap();

    assert_eq!(
        broker.calls(),
        vec![BrokerCall::ModifyStopLoss {
            position_id: id,
            stop_loss: dec!(1.1001),
        }]
    );

    // Same quote again: nothing improves
    manager.on_tick(&quote(dec!(1.1010), dec!(1.1010), at(10, 1))).unwrap();
    assert_eq!(broker.calls().len(), 1);
}

#[test]
fn test_trailing_follows_price() {
    let (mut manager, broker) = setup(config());
    broker.insert_position(position("Warden", Side::Long, dec!(1.1000), Some(dec!(1.1001))));

    manager.on_tick(&quote(dec!(1.1020), dec!(1.1020), at(10, 0))).unwrap();

    let positions = broker.open_positions(&symbol()).unwrap();
    assert_eq!(positions[0].stop_decimal(), Some(dec!(1.1008)));
}

#[test]
fn test_foreign_positions_untouched() {
    let (mut manager, broker) = setup(config());
    broker.insert_position(position("Other", Side::Long, dec!(1.1000), Some(dec!(1.0991))));

    manager.on_tick(&quote(dec!(1.1010), dec!(1.1010), at(10, 0))).unwrap();

    assert!(broker.calls().is_empty());
}

// =============================================================================
// Guards
// =============================================================================

#[test]
fn test_position_limit_denies_fifth_open() {
    let (mut manager, broker) = setup(config());
    for owner in ["Warden", "Warden", "Warden", "Other"] {
        broker.insert_position(position(owner, Side::Long, dec!(1.1000), None));
    }
    let snap = quote(dec!(1.1000), dec!(1.1000), at(10, 0));
    manager.on_tick(&snap).unwrap();

    let opened = manager.on_signal(Side::Long, dec!(1.1000), at(10, 0), &snap).unwrap();

    assert_eq!(opened, None);
    assert!(submits(&broker).is_empty());
}

#[test]
fn test_wide_spread_denies_open() {
    let (mut manager, broker) = setup(config());
    let snap = quote(dec!(1.1000), dec!(1.10005), at(10, 0));
    manager.on_tick(&snap).unwrap();

    let opened = manager.on_signal(Side::Long, dec!(1.1000), at(10, 0), &snap).unwrap();

    assert_eq!(opened, None);
    assert!(submits(&broker).is_empty());
}

#[test]
fn test_no_open_before_rollover() {
    let (mut manager, broker) = setup(config());
    let snap = quote(dec!(1.1000), dec!(1.1000), at(19, 40));
    manager.on_tick(&snap).unwrap();

    let opened = manager.on_signal(Side::Long, dec!(1.1000), at(19, 30), &snap).unwrap();

    assert_eq!(opened, None);
    assert!(submits(&broker).is_empty());
}

#[test]
fn test_same_side_deficit_denies_open() {
    let (mut manager, broker) = setup(config());
    broker.insert_position(position("Warden", Side::Short, dec!(1.1000), None));
    let snap = quote(dec!(1.1005), dec!(1.1005), at(10, 0));
    manager.on_tick(&snap).unwrap();

    let opened = manager.on_signal(Side::Short, dec!(1.1005), at(10, 0), &snap).unwrap();

    assert_eq!(opened, None);
    assert_eq!(broker.open_positions(&symbol()).unwrap().len(), 1);
}

// =============================================================================
// Closing
// =============================================================================

#[test]
fn test_forced_close_before_rollover() {
    let (mut manager, broker) = setup(config());
    broker.insert_position(position("Warden", Side::Long, dec!(1.1000), None));
    broker.insert_position(position("Other", Side::Long, dec!(1.1000), None));

    manager.on_tick(&quote(dec!(1.1000), dec!(1.1000), at(19, 57))).unwrap();

    let remaining = broker.open_positions(&symbol()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].owner_tag.as_str(), "Other");
}

#[test]
fn test_close_profitable_only() {
    let (mut manager, broker) = setup(config());
    broker.insert_position(position("Warden", Side::Long, dec!(1.1000), None));
    broker.insert_position(position("Warden", Side::Short, dec!(1.1000), None));
    let snap = quote(dec!(1.1005), dec!(1.1005), at(10, 0));
    broker.observe_quote(&snap);

    assert_eq!(manager.close_profitable(&snap).unwrap(), 1);

    let remaining = broker.open_positions(&symbol()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].side, Side::Short);
}

// =============================================================================
// Loss ceiling
// =============================================================================

fn losing_trade(net_profit: Decimal) -> ClosedTrade {
    ClosedTrade {
        position_id: Uuid::now_v7(),
        symbol: symbol(),
        owner_tag: tag(),
        side: Side::Long,
        net_profit,
        closed_at: at(9, 0),
        reason: ExitReason::StopLoss,
    }
}

#[test]
fn test_ceiling_terminates_when_flat() {
    let (mut manager, broker) = setup(config());
    broker.insert_closed(losing_trade(dec!(-205)));
    let snap = quote(dec!(1.1000), dec!(1.1000), at(10, 0));

    let bar = BarClose {
        symbol: symbol(),
        current_bar_open: at(10, 0),
        close: dec!(1.1003),
        prev_close: dec!(1.1000),
    };
    let status = manager.on_bar_closed(&bar, &snap).unwrap();

    assert_eq!(status, EngineStatus::Terminated);
    assert_eq!(manager.risk_state().status, RiskStatus::Halted);
    assert_eq!(manager.risk_state().cumulative_realized_pnl, dec!(-205));
    assert!(submits(&broker).is_empty());
}

#[test]
fn test_ceiling_waits_for_open_positions() {
    let (mut manager, broker) = setup(config());
    broker.insert_closed(losing_trade(dec!(-150)));
    broker.insert_closed(losing_trade(dec!(-55)));
    broker.insert_position(position("Warden", Side::Long, dec!(1.1000), Some(dec!(1.0991))));

    let snap = quote(dec!(1.0995), dec!(1.0995), at(10, 0));
    let bar = BarClose {
        symbol: symbol(),
        current_bar_open: at(10, 0),
        close: dec!(1.0995),
        prev_close: dec!(1.0990),
    };
    assert_eq!(manager.on_bar_closed(&bar, &snap).unwrap(), EngineStatus::Halted);
    assert!(submits(&broker).is_empty());

    // Stop hit: the book goes flat and the engine stops
    let status = manager.on_tick(&quote(dec!(1.0990), dec!(1.0990), at(10, 5))).unwrap();
    assert_eq!(status, EngineStatus::Terminated);
    assert_eq!(broker.balance(), dec!(10000) - dec!(205) - dec!(90));

    // Terminated: later events are ignored
    manager.on_tick(&quote(dec!(1.1100), dec!(1.1100), at(10, 6))).unwrap();
    assert!(broker.calls().is_empty());
}

#[test]
fn test_foreign_losses_do_not_count() {
    let (mut manager, broker) = setup(config());
    broker.insert_closed(ClosedTrade {
        owner_tag: OwnerTag::new("Other").unwrap(),
        ..losing_trade(dec!(-500))
    });
    let snap = quote(dec!(1.1000), dec!(1.1000), at(10, 0));
    manager.on_tick(&snap).unwrap();

    let bar = BarClose {
        symbol: symbol(),
        current_bar_open: at(10, 0),
        close: dec!(1.0997),
        prev_close: dec!(1.1000),
    };
    assert_eq!(manager.on_bar_closed(&bar, &snap).unwrap(), EngineStatus::Active);
    assert_eq!(submits(&broker).len(), 1);
}

#[test]
fn test_forced_close_is_idempotent() {
    let (mut manager, broker) = setup(config());
    broker.insert_position(position("Warden", Side::Long, dec!(1.1000), None));
    let snap = quote(dec!(1.1000), dec!(1.1000), at(19, 57));

    manager.on_tick(&snap).unwrap();
    assert_eq!(manager.close_before_session_end(&snap).unwrap(), 0);

    let closes = broker
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BrokerCall::ClosePosition { .. }))
        .count();
    assert_eq!(closes, 1);
}

#[test]
fn test_stops_never_loosen() {
    let (mut manager, broker) = setup(config());
    broker.insert_position(position("Warden", Side::Short, dec!(1.1000), Some(dec!(1.1009))));

    let mut previous = dec!(1.1009);
    let path = [
        dec!(1.0995),
        dec!(1.0990),
        dec!(1.0996),
        dec!(1.0975),
        dec!(1.0985),
        dec!(1.0970),
        dec!(1.0980),
    ];
    for (minute, ask) in path.into_iter().enumerate() {
        manager
            .on_tick(&quote(ask, ask, at(11, minute as u32)))
            .unwrap();

        let positions = broker.open_positions(&symbol()).unwrap();
        let Some(short) = positions.first() else {
            break;
        };
        let stop = short.stop_decimal().unwrap();
        assert!(stop <= previous, "stop moved from {} to {}", previous, stop);
        previous = stop;
    }
    assert!(previous < dec!(1.1000));
}

#[test]
fn test_ceiling_counts_every_symbol() {
    let (mut manager, broker) = setup(config());
    broker.insert_closed(losing_trade(dec!(-120)));
    broker.insert_closed(ClosedTrade {
        symbol: Symbol::new("GBPUSD").unwrap(),
        ..losing_trade(dec!(-100))
    });
    let snap = quote(dec!(1.1000), dec!(1.1000), at(10, 0));

    let bar = BarClose {
        symbol: symbol(),
        current_bar_open: at(10, 0),
        close: dec!(1.1003),
        prev_close: dec!(1.1000),
    };
    assert_eq!(manager.on_bar_closed(&bar, &snap).unwrap(), EngineStatus::Terminated);
    assert_eq!(manager.risk_state().cumulative_realized_pnl, dec!(-220));
    assert!(submits(&broker).is_empty());
}

#[test]
fn test_flip_goes_flat_then_reverses() {
    let (mut manager, broker) = setup(config());
    let first = quote(dec!(1.1000), dec!(1.1000), at(10, 0));
    manager.on_tick(&first).unwrap();
    let down = BarClose {
        symbol: symbol(),
        current_bar_open: at(10, 0),
        close: dec!(1.0997),
        prev_close: dec!(1.1000),
    };
    manager.on_bar_closed(&down, &first).unwrap();

    let second = quote(dec!(1.1001), dec!(1.1001), at(10, 15));
    manager.on_tick(&second).unwrap();
    let up = BarClose {
        symbol: symbol(),
        current_bar_open: at(10, 15),
        close: dec!(1.1001),
        prev_close: dec!(1.0997),
    };
    manager.on_bar_closed(&up, &second).unwrap();

    let sides: Vec<Side> = broker
        .open_positions(&symbol())
        .unwrap()
        .iter()
        .map(|p| p.side)
        .collect();
    assert_eq!(sides, vec![Side::Long]);
    assert_eq!(broker.closed_history(&tag(), &symbol()).unwrap()[0].side, Side::Short);
}
