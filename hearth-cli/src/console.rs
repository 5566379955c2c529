//! Plain-console status sink.
//!
//! Everything the hub reports ends up here. Missing or malformed values
//! render as placeholders; display never fails.

use std::io::Write;

use hearth_core::config::HearthConfig;
use hearth_core::model::{HubSnapshot, ZoneStatus};

pub fn format_temp(value: Option<f64>) -> String {
    match value {
        Some(t) => format!("{:.1}", t),
        None => "???".into(),
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

pub fn print_zone_status(name: &str, status: Option<&ZoneStatus>) {
    match status {
        Some(s) => println!(
            "{}: setpoint {:.1}, {}",
            name,
            s.setpoint,
            on_off(s.on)
        ),
        None => println!("{}: unknown", name),
    }
}

pub fn print_snapshot(config: &HearthConfig, snapshot: &HubSnapshot) {
    println!("Boiler Control");
    println!("  flow setpoint   {}", format_temp(snapshot.flow_setpoint));
    match snapshot.valve_position {
        Some(p) => println!("  valve position  {:.0}%", p),
        None => println!("  valve position  ???"),
    }

    if !snapshot.sensors.is_empty() {
        println!("Sensors               temp    crc  empty   fail");
        for sensor in &snapshot.sensors {
            println!(
                "  {:<18} {:>6} {:>6} {:>6} {:>6}",
                sensor.name,
                format_temp(sensor.temperature),
                sensor.crc_errors,
                sensor.empty_errors,
                sensor.failures,
            );
        }
    }

    if !snapshot.zones.is_empty() {
        println!("Zones");
        for (id, status) in &snapshot.zones {
            println!(
                "  {:<18} setpoint {:>5.1}  {}",
                config.zone_name(*id),
                status.setpoint,
                on_off(status.on)
            );
        }
    }
}

/// Redraws the reset progress line in place.
pub fn print_progress(name: &str, elapsed: u32, percent: u8) {
    print!("\rResetting {}... {:>3}% (t={})   ", name, percent, elapsed);
    let _ = std::io::stdout().flush();
}

pub fn finish_progress_line() {
    println!();
}
