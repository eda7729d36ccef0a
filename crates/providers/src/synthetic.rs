//! Synthetic seasonal fallback.
//!
//! The designed end of the provider chain: a climatological estimate from
//! latitude, elevation, and calendar month. Deterministic, infallible, and
//! always structurally valid so consumers never face a "no weather" case.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use common::{CurrentConditions, DailySeries, HourlySeries, Source, WeatherSnapshot};
use std::f64::consts::TAU;

const HOURLY_STEPS: usize = 24;
const DAILY_STEPS: usize = 7;

/// Dry-adiabatic-ish lapse rate, °C per metre of elevation.
const LAPSE_RATE_C_PER_M: f64 = 0.0065;

/// Mean temperature and annual swing by latitude band.
fn climate_band(lat: f64) -> (f64, f64) {
    match lat.abs() {
        abs if abs < 23.5 => (27.0, 1.5),
        abs if abs < 35.0 => (20.0, 8.0),
        abs if abs < 55.0 => (12.0, 11.0),
        _ => (0.0, 15.0),
    }
}

/// Sea-level monthly mean for a latitude.
fn seasonal_baseline_c(lat: f64, month: u32) -> f64 {
    let (mean, swing) = climate_band(lat);
    // Annual cycle: trough in January, peak in July, inverted south.
    let phase = (month as f64 - 1.0) / 12.0 * TAU;
    let seasonal = -phase.cos();
    let hemisphere = if lat >= 0.0 { 1.0 } else { -1.0 };
    mean + hemisphere * seasonal * swing
}

/// Monsoon months for the tropics (inter-monsoon + northeast monsoon).
fn is_wet_month(lat: f64, month: u32) -> bool {
    lat.abs() < 23.5 && matches!(month, 4 | 5 | 10 | 11 | 12)
}

/// Barometric pressure at elevation, hPa.
fn pressure_at(elevation_m: f64) -> f64 {
    1013.25 * (1.0 - 2.25577e-5 * elevation_m).max(0.0).powf(5.25588)
}

/// Rough local solar hour from longitude.
fn local_hour(utc_hour: u32, lon: f64) -> u32 {
    let offset = (lon / 15.0).round() as i64;
    (utc_hour as i64 + offset).rem_euclid(24) as u32
}

/// Build a seasonal estimate snapshot for a point.
pub fn synthesize(
    lat: f64,
    lon: f64,
    elevation_m: Option<f64>,
    now: DateTime<Utc>,
) -> WeatherSnapshot {
    let month = now.month();
    let elevation = elevation_m.unwrap_or(0.0);
    let base = seasonal_baseline_c(lat, month) - LAPSE_RATE_C_PER_M * elevation;
    let wet = is_wet_month(lat, month);
    let tropical = lat.abs() < 23.5;

    let diurnal_amp = if tropical { 3.5 } else { 4.5 };
    let humidity: u8 = match (tropical, wet) {
        (true, true) => 84,
        (true, false) => 74,
        (false, _) => 65,
    };
    let pressure = pressure_at(elevation);

    let start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    let temp_at = |hour_local: u32| -> f64 {
        // Diurnal curve peaking mid-afternoon.
        base + diurnal_amp * ((hour_local as f64 - 14.0) / 24.0 * TAU).cos()
    };
    let is_afternoon = |hour_local: u32| (13..=17).contains(&hour_local);

    let mut hourly = HourlySeries::default();
    for step in 0..HOURLY_STEPS {
        let t = start + Duration::hours(step as i64);
        let h_local = local_hour(t.hour(), lon);
        let afternoon = is_afternoon(h_local);
        hourly.time.push(t);
        hourly.temperature_c.push(temp_at(h_local));
        hourly.weather_code.push(match (wet, afternoon) {
            // Monsoon afternoons bring shower cells.
            (true, true) => 80,
            (true, false) => 3,
            (false, _) => {
                if tropical {
                    2
                } else {
                    1
                }
            }
        });
        hourly.precipitation_probability_pct.push(match (wet, afternoon) {
            (true, true) => 75,
            (true, false) => 45,
            (false, true) => 35,
            (false, false) => 15,
        });
        hourly
            .wind_speed_kmh
            .push(6.0 + 4.0 * ((h_local as f64) / 24.0 * TAU).sin().abs());
    }

    let mut daily = DailySeries::default();
    for day in 0..DAILY_STEPS {
        let date = (start + Duration::days(day as i64)).date_naive();
        // Small deterministic day-to-day wobble.
        let wobble = (day as f64 * 1.7).sin() * 0.8;
        daily.date.push(date);
        daily.temperature_max_c.push(base + diurnal_amp + wobble);
        daily.temperature_min_c.push(base - diurnal_amp + wobble);
        daily.weather_code.push(if wet { 80 } else { 2 });
        daily.precipitation_sum_mm.push(if wet { 12.0 } else { 2.0 });
        daily
            .precipitation_probability_pct
            .push(if wet { 80 } else { 30 });
    }

    let now_local = local_hour(now.hour(), lon);
    let current_temp = temp_at(now_local);
    let current = CurrentConditions {
        temperature_c: current_temp,
        apparent_temperature_c: if tropical {
            current_temp + 3.0
        } else {
            current_temp
        },
        humidity_pct: humidity,
        wind_speed_kmh: 8.0,
        wind_direction_deg: 180,
        pressure_hpa: pressure,
        precipitation_mm: 0.0,
        weather_code: if wet && is_afternoon(now_local) {
            80
        } else if tropical {
            2
        } else {
            1
        },
        is_day: (7..19).contains(&now_local),
        observed_at: now,
    };

    WeatherSnapshot {
        latitude: lat,
        longitude: lon,
        elevation_m,
        current,
        hourly,
        daily,
        source: Source::Fallback,
        fetched_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, month, 15, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_always_structurally_valid() {
        for month in 1..=12 {
            for (lat, lon, elev) in [
                (3.14, 101.69, Some(66.0)),
                (-33.87, 151.21, None),
                (89.0, 0.0, Some(3000.0)),
                (0.0, -179.9, None),
            ] {
                let snap = synthesize(lat, lon, elev, at(month));
                assert!(snap.is_structurally_valid(), "month={month} lat={lat}");
                assert_eq!(snap.source, Source::Fallback);
                assert_eq!(snap.hourly.time.len(), 24);
                assert_eq!(snap.daily.date.len(), 7);
            }
        }
    }

    #[test]
    fn test_elevation_lapse_cools_highlands() {
        // Same latitude band: Kuala Lumpur vs Cameron Highlands.
        let lowland = synthesize(3.14, 101.69, Some(66.0), at(6));
        let highland = synthesize(4.47, 101.38, Some(1_440.0), at(6));
        let delta = lowland.current.temperature_c - highland.current.temperature_c;
        assert!(
            delta > 7.0 && delta < 11.0,
            "expected ~9°C lapse, got {delta:.1}"
        );
        assert!(highland.current.pressure_hpa < lowland.current.pressure_hpa);
    }

    #[test]
    fn test_monsoon_months_are_wetter() {
        let wet = synthesize(3.14, 101.69, Some(66.0), at(11));
        let dry = synthesize(3.14, 101.69, Some(66.0), at(2));
        assert!(
            wet.daily.precipitation_probability_pct[0]
                > dry.daily.precipitation_probability_pct[0]
        );
        assert!(wet.daily.precipitation_sum_mm[0] > dry.daily.precipitation_sum_mm[0]);
    }

    #[test]
    fn test_southern_hemisphere_seasons_invert() {
        // January: summer in Sydney, winter in Berlin.
        let sydney = synthesize(-33.87, 151.21, Some(20.0), at(1));
        let berlin = synthesize(52.52, 13.40, Some(34.0), at(1));
        assert!(sydney.current.temperature_c > berlin.current.temperature_c);
    }
}
