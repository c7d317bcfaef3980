//! Property tests for `+UGNSINF` payload parsing.

use proptest::prelude::*;
use sim868_modem::{GpsFix, ModemError};

// Indices that carry values; 9 and 13 are reserved.
const VALUE_FIELDS: [usize; 18] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 14, 15, 16, 17, 18, 19];

#[derive(Debug, Clone)]
struct Report {
    run_status: u8,
    fix_status: u8,
    timestamp: u64,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    speed: f64,
    course: f64,
    fix_mode: u8,
    dops: (f64, f64, f64),
    sats: (u32, u32, u32),
    cn0_max: f64,
    hpa: f64,
    vpa: f64,
}

impl Report {
    fn fields(&self) -> Vec<String> {
        vec![
            self.run_status.to_string(),
            self.fix_status.to_string(),
            format!("{}.000", self.timestamp),
            format!("{:.6}", self.latitude),
            format!("{:.6}", self.longitude),
            format!("{:.3}", self.altitude),
            format!("{:.2}", self.speed),
            format!("{:.1}", self.course),
            self.fix_mode.to_string(),
            String::new(),
            format!("{:.1}", self.dops.0),
            format!("{:.1}", self.dops.1),
            format!("{:.1}", self.dops.2),
            String::new(),
            self.sats.0.to_string(),
            self.sats.1.to_string(),
            self.sats.2.to_string(),
            format!("{:.1}", self.cn0_max),
            format!("{:.1}", self.hpa),
            format!("{:.1}", self.vpa),
        ]
    }
}

fn report() -> impl Strategy<Value = Report> {
    (
        (0u8..=1, 0u8..=1, 20_000_101_000_000u64..20_991_231_235_959),
        (-90.0f64..90.0, -180.0f64..180.0, -500.0f64..9000.0),
        (0.0f64..500.0, 0.0f64..360.0, 0u8..=2),
        (0.0f64..99.9, 0.0f64..99.9, 0.0f64..99.9),
        (0u32..64, 0u32..64, 0u32..32),
        (0.0f64..60.0, 0.0f64..999.0, 0.0f64..999.0),
    )
        .prop_map(
            |((run_status, fix_status, timestamp), (latitude, longitude, altitude), (speed, course, fix_mode), dops, sats, (cn0_max, hpa, vpa))| Report {
                run_status,
                fix_status,
                timestamp,
                latitude,
                longitude,
                altitude,
                speed,
                course,
                fix_mode,
                dops,
                sats,
                cn0_max,
                hpa,
                vpa,
            },
        )
}

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

proptest! {
    #[test]
    fn well_formed_reports_round_trip(report in report()) {
        let fix = GpsFix::parse(&report.fields().join(",")).unwrap();

        prop_assert_eq!(fix.run_status, report.run_status);
        prop_assert_eq!(fix.fix_status, report.fix_status);
        prop_assert_eq!(fix.timestamp, report.timestamp);
        prop_assert!(close(fix.latitude, report.latitude, 1e-6));
        prop_assert!(close(fix.longitude, report.longitude, 1e-6));
        prop_assert!(close(fix.altitude, report.altitude, 1e-3));
        prop_assert!(close(fix.speed, report.speed, 1e-2));
        prop_assert!(close(fix.course, report.course, 0.1));
        prop_assert_eq!(fix.fix_mode, report.fix_mode);
        prop_assert!(close(fix.hdop, report.dops.0, 0.1));
        prop_assert!(close(fix.pdop, report.dops.1, 0.1));
        prop_assert!(close(fix.vdop, report.dops.2, 0.1));
        prop_assert_eq!(fix.satellites_visible, report.sats.0);
        prop_assert_eq!(fix.satellites_used, report.sats.1);
        prop_assert_eq!(fix.glonass_visible, report.sats.2);
        prop_assert!(close(fix.cn0_max, report.cn0_max, 0.1));
        prop_assert!(close(fix.hpa, report.hpa, 0.1));
        prop_assert!(close(fix.vpa, report.vpa, 0.1));
    }

    #[test]
    fn non_numeric_field_is_rejected(
        report in report(),
        which in 0..VALUE_FIELDS.len(),
        junk in "[a-mo-zA-MO-Z]{1,6}",
    ) {
        let mut fields = report.fields();
        fields[VALUE_FIELDS[which]] = junk;
        let err = GpsFix::parse(&fields.join(",")).unwrap_err();
        prop_assert!(matches!(err, ModemError::MalformedFixData(_)));
    }

    #[test]
    fn truncated_reports_are_rejected(report in report(), keep in 0usize..20) {
        let fields = report.fields();
        let err = GpsFix::parse(&fields[..keep].join(",")).unwrap_err();
        prop_assert!(matches!(err, ModemError::MalformedFixData(_)));
    }
}
