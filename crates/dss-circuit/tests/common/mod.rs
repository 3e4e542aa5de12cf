#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use dss_circuit::{Circuit, CircuitOptions};
use dss_core::minutes;
use dss_engine::memory::balanced_voltages;
use dss_engine::{BusSnapshot, CircuitSnapshot, ElementSnapshot, MemoryEngine};

pub const KV_BASE: f64 = 2.4018;

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn options() -> CircuitOptions {
    CircuitOptions::new(vec![], minutes(15.0), start_time())
}

fn bus(name: &str, nodes: Vec<usize>, pu: &[f64]) -> BusSnapshot {
    BusSnapshot {
        name: name.into(),
        kv_base: KV_BASE,
        nodes,
        voltages: balanced_voltages(KV_BASE, pu, 0.0),
    }
}

fn element(class: &str, name: &str, props: &[(&str, &str)]) -> ElementSnapshot {
    ElementSnapshot {
        class: class.into(),
        name: name.into(),
        phases: None,
        buses: vec![],
        powers: vec![],
        currents: vec![],
        properties: props
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        tap: None,
        pt_ratio: None,
    }
}

/// A small feeder: one line from 650 to 671, a three-phase and a
/// single-phase load, a PV array, a battery and two controllers.
pub fn feeder_snapshot() -> CircuitSnapshot {
    let mut line = element("Line", "650671", &[("phases", "3"), ("length", "2000")]);
    line.buses = vec!["650".into(), "671".into()];
    line.powers = [[400.0, 200.0]; 3]
        .into_iter()
        .chain([[-390.0, -190.0]; 3])
        .flatten()
        .collect();
    line.currents = vec![170.0, -85.0, -160.0, -105.0, -10.0, 190.0]
        .into_iter()
        .chain(vec![-170.0, 85.0, 160.0, 105.0, 10.0, -190.0])
        .collect();

    let mut reg = element("RegControl", "reg1", &[("transformer", "reg1"), ("TapNum", "5")]);
    reg.tap = Some(5);
    let mut ctrl = element("CapControl", "cc1", &[("capacitor", "cap1"), ("PTratio", "60")]);
    ctrl.pt_ratio = Some(60.0);

    CircuitSnapshot {
        name: "Feeder".into(),
        buses: vec![
            bus("650", vec![], &[1.0, 1.0, 1.0]),
            bus("671", vec![], &[0.98, 0.98, 0.98]),
            bus("611", vec![3], &[0.97]),
            bus("bat", vec![], &[0.99, 0.99, 0.99]),
        ],
        elements: vec![
            line,
            element(
                "Load",
                "671",
                &[
                    ("phases", "3"),
                    ("bus1", "671.1.2.3"),
                    ("kV", "4.16"),
                    ("kW", "1155"),
                    ("kvar", "660"),
                    ("yearly", ""),
                ],
            ),
            element(
                "Load",
                "611",
                &[
                    ("phases", "1"),
                    ("bus1", "611.3"),
                    ("kV", "2.4"),
                    ("kW", "170"),
                    ("kvar", "80"),
                    ("yearly", ""),
                ],
            ),
            element(
                "PVSystem",
                "pv1",
                &[("phases", "3"), ("bus1", "671"), ("Pmpp", "100"), ("kvar", "0")],
            ),
            element(
                "Storage",
                "bat1",
                &[
                    ("phases", "3"),
                    ("bus1", "bat"),
                    ("kWrated", "25"),
                    ("kWhrated", "50"),
                    ("%stored", "50"),
                    ("%reserve", "20"),
                    ("State", "Idling"),
                    ("kW", "0"),
                    ("kvar", "0"),
                    ("pf", "1"),
                    ("%charge", "100"),
                    ("%discharge", "100"),
                ],
            ),
            reg,
            ctrl,
        ],
        losses: (20_000.0, 40_000.0),
    }
}

pub fn feeder_engine() -> MemoryEngine {
    MemoryEngine::from_snapshot(feeder_snapshot()).unwrap()
}

pub fn feeder() -> Circuit<MemoryEngine> {
    Circuit::new(feeder_engine(), options()).unwrap()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
