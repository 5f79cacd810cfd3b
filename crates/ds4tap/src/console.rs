use std::fmt::Write as _;
use std::io::{self, Write};

use ds4tap_report::{Axes3, Telemetry};

/// Formats one telemetry line. `node` prefixes the line when several
/// controllers share the output.
pub(crate) fn format_telemetry(node: Option<&str>, telemetry: &Telemetry) -> String {
    let mut line = String::with_capacity(128);
    if let Some(node) = node {
        let _ = write!(line, "[{node}] ");
    }

    let t = telemetry.timestamp.as_secs_f64();
    let ls = telemetry.left_stick;
    let rs = telemetry.right_stick;
    let _ = write!(
        line,
        "{t:6.3}s | LS({:3},{:3}) RS({:3},{:3}) L2={:3} R2={:3} | G:{} A:{} Batt:{:3}%",
        ls.x,
        ls.y,
        rs.x,
        rs.y,
        telemetry.trigger_l,
        telemetry.trigger_r,
        axes(telemetry.gyro),
        axes(telemetry.accel),
        telemetry.battery.percent,
    );
    if telemetry.battery.charging {
        line.push_str(" (charging)");
    } else if telemetry.battery.is_full() {
        line.push_str(" (full)");
    }

    if !telemetry.dpad.is_neutral() {
        let _ = write!(line, " | DPad:{:?}", telemetry.dpad);
    }
    let pressed = telemetry.buttons.pressed();
    if !pressed.is_empty() {
        line.push_str(" |");
        for button in pressed {
            line.push(' ');
            line.push_str(button.name());
        }
    }
    line
}

fn axes(value: Axes3) -> String {
    format!("({:6},{:6},{:6})", value.x, value.y, value.z)
}

/// Writes telemetry lines to stdout.
pub(crate) struct Console {
    out: io::Stdout,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub(crate) fn new() -> Self {
        Self { out: io::stdout() }
    }

    pub(crate) fn line(&mut self, line: &str) -> io::Result<()> {
        let mut out = self.out.lock();
        writeln!(out, "{line}")
    }
}
