//! Reading validator
//!
//! Only SpO2 is sanitized: values above the sensor ceiling are saturation
//! artifacts and are clamped. Every other field passes through untouched so
//! that real outliers (an implausibly fast heart rate, say) still reach the
//! classifier and the alarm logic. Out-of-range heart rates are tagged, not
//! rejected.

use chrono::{DateTime, Local};

use crate::types::{
    ParsedFields, Reading, ValidationTags, HEART_RATE_MAX_BPM, HEART_RATE_MIN_BPM,
    SPO2_CEILING_PERCENT,
};

/// Turn parsed fields into a [`Reading`].
pub fn validate(fields: ParsedFields, captured_at: DateTime<Local>) -> Reading {
    let spo2_clamped = fields.spo2_percent > SPO2_CEILING_PERCENT;
    let spo2_percent = if spo2_clamped {
        SPO2_CEILING_PERCENT
    } else {
        fields.spo2_percent
    };

    let heart_rate_out_of_range = !(HEART_RATE_MIN_BPM..=HEART_RATE_MAX_BPM)
        .contains(&fields.heart_rate_bpm);

    if spo2_clamped || heart_rate_out_of_range {
        tracing::debug!(
            heart_rate = fields.heart_rate_bpm,
            raw_spo2 = fields.spo2_percent,
            spo2_clamped,
            heart_rate_out_of_range,
            "Reading sanitized"
        );
    }

    Reading {
        heart_rate_bpm: fields.heart_rate_bpm,
        spo2_percent,
        hrv_ms: fields.hrv_ms,
        accel_g: fields.accel_g,
        class_id: fields.class_id,
        label: fields.label,
        captured_at,
        tags: ValidationTags {
            spo2_clamped,
            heart_rate_out_of_range,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(hr: u32, spo2: f64) -> ParsedFields {
        ParsedFields {
            class_id: 0,
            label: "Normal".to_string(),
            heart_rate_bpm: hr,
            spo2_percent: spo2,
            hrv_ms: 50.0,
            accel_g: 1.0,
        }
    }

    #[test]
    fn test_spo2_above_ceiling_is_clamped() {
        for raw in [99.91, 100.0, 101.2, 250.0] {
            let r = validate(fields(70, raw), Local::now());
            assert_eq!(r.spo2_percent, 99.9, "raw {raw}");
            assert!(r.tags.spo2_clamped);
        }
    }

    #[test]
    fn test_spo2_at_or_below_ceiling_passes_through() {
        for raw in [0.0, 85.3, 97.0, 99.9] {
            let r = validate(fields(70, raw), Local::now());
            assert_eq!(r.spo2_percent, raw);
            assert!(!r.tags.spo2_clamped);
        }
    }

    #[test]
    fn test_implausible_heart_rate_is_tagged_not_changed() {
        let r = validate(fields(250, 97.0), Local::now());
        assert_eq!(r.heart_rate_bpm, 250);
        assert!(r.tags.heart_rate_out_of_range);

        let r = validate(fields(12, 97.0), Local::now());
        assert_eq!(r.heart_rate_bpm, 12);
        assert!(r.tags.heart_rate_out_of_range);

        let r = validate(fields(30, 97.0), Local::now());
        assert!(!r.tags.heart_rate_out_of_range);
    }

    #[test]
    fn test_other_fields_pass_through() {
        let mut f = fields(70, 97.0);
        f.hrv_ms = 1234.5;
        f.accel_g = 16.0;
        f.class_id = 9;
        let r = validate(f, Local::now());
        assert_eq!(r.hrv_ms, 1234.5);
        assert_eq!(r.accel_g, 16.0);
        assert_eq!(r.class_id, 9);
    }
}
