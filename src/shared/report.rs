use sim868_modem::GpsFix;
use tracing::info;

// One log line per fix; coordinates only when the receiver reports a fix.
pub fn log_fix(fix: &GpsFix) {
    let utc = fix
        .utc()
        .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    if !fix.has_fix() {
        info!(
            utc = %utc,
            running = fix.run_status == 1,
            sats_in_view = fix.satellites_visible,
            "no GNSS fix yet"
        );
        return;
    }

    info!(
        utc = %utc,
        lat = %format!("{:.6}", fix.latitude),
        lon = %format!("{:.6}", fix.longitude),
        alt_m = fix.altitude,
        speed_kmh = fix.speed,
        course_deg = fix.course,
        hdop = fix.hdop,
        sats_used = fix.satellites_used,
        sats_in_view = fix.satellites_visible,
        "GNSS fix"
    );
}
