//! Settings Tests
//!
//! Tests for:
//! - JSON presets with defaults for missing fields
//! - Rejection of unknown fields and unusable values
//! - Termination policy encoding
//! - Progress text shown while rendering

use std::time::Duration;

use prism::material::Color;
use prism::render_core::Progress;
use prism::session::progress_text;
use prism::settings::{Region, RenderSettings, SyncSettings, Termination, ToneMapping};
use prism::PrismError;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn invalid_field(err: &PrismError) -> Option<&'static str> {
    match err {
        PrismError::InvalidSetting { field, .. } => Some(*field),
        _ => None,
    }
}

// ============================================================================
// Render Settings
// ============================================================================

#[test]
fn empty_preset_is_the_default() -> anyhow::Result<()> {
    init_logging();
    let settings = RenderSettings::from_json_str("{}")?;
    assert_eq!(settings, RenderSettings::default());
    assert_eq!((settings.width, settings.height), (640, 480));
    assert_eq!(settings.termination, Termination::None);
    assert_eq!(settings.ui_poll_interval(), Duration::from_millis(30));
    assert_eq!(settings.frame_copy_interval(), Duration::from_millis(10));
    Ok(())
}

#[test]
fn preset_overrides_only_named_fields() -> anyhow::Result<()> {
    let settings = RenderSettings::from_json_str(
        r#"{
            "width": 1920,
            "height": 1080,
            "termination": { "kind": "pass_count", "passes": 256 },
            "tone_mapping": "reinhard",
            "region": { "x": 10, "y": 20, "width": 100, "height": 50 }
        }"#,
    )?;

    assert_eq!((settings.width, settings.height), (1920, 1080));
    assert_eq!(settings.termination, Termination::pass_count(256));
    assert_eq!(settings.tone_mapping, ToneMapping::Reinhard);
    assert_eq!(
        settings.region,
        Some(Region {
            x: 10,
            y: 20,
            width: 100,
            height: 50
        })
    );
    assert!((settings.gamma - 2.2).abs() < f32::EPSILON);
    Ok(())
}

#[test]
fn termination_kinds_parse() -> anyhow::Result<()> {
    let none = RenderSettings::from_json_str(r#"{ "termination": { "kind": "none" } }"#)?;
    assert_eq!(none.termination, Termination::None);

    let clock = RenderSettings::from_json_str(
        r#"{ "termination": { "kind": "wall_clock", "seconds": 1.5 } }"#,
    )?;
    assert_eq!(
        clock.termination,
        Termination::wall_clock(Duration::from_millis(1500))
    );

    let json = serde_json::to_string(&Termination::pass_count(3))?;
    assert_eq!(json, r#"{"kind":"pass_count","passes":3}"#);
    Ok(())
}

#[test]
fn unknown_fields_are_rejected() {
    let err = RenderSettings::from_json_str(r#"{ "widht": 100 }"#).unwrap_err();
    assert!(matches!(err, PrismError::Settings(_)));

    let err = RenderSettings::from_json_str(r#"{ "termination": { "kind": "forever" } }"#)
        .unwrap_err();
    assert!(matches!(err, PrismError::Settings(_)));
}

#[test]
fn unusable_values_name_the_field() {
    let cases = [
        (r#"{ "height": 0 }"#, "width/height"),
        (r#"{ "termination": { "kind": "pass_count", "passes": 0 } }"#, "termination"),
        (r#"{ "termination": { "kind": "wall_clock", "seconds": -1.0 } }"#, "termination"),
        (r#"{ "width": 64, "height": 64, "region": { "x": 60, "y": 0, "width": 8, "height": 8 } }"#, "region"),
        (r#"{ "gamma": 0.0 }"#, "gamma"),
    ];

    for (json, field) in cases {
        let err = RenderSettings::from_json_str(json).unwrap_err();
        assert_eq!(invalid_field(&err), Some(field), "{json}");
    }
}

#[test]
fn invalid_setting_message_is_readable() {
    let err = RenderSettings {
        width: 0,
        ..Default::default()
    }
    .validate()
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("width/height"));
    assert!(message.contains("0x480"));
}

// ============================================================================
// Sync Settings
// ============================================================================

#[test]
fn sync_defaults() {
    let settings = SyncSettings::default();
    assert!((settings.master_scale - 1.0).abs() < f32::EPSILON);
    assert!(settings.flip_odd_parity);
    assert_eq!(settings.error_color, Color::MAGENTA);
    assert_eq!(settings.disabled_color, Color::BLACK);
}

#[test]
fn sync_preset_parses_colors_and_scale() -> anyhow::Result<()> {
    let settings = SyncSettings::from_json_str(
        r#"{ "master_scale": 0.0254, "error_color": { "r": 1.0, "g": 0.5, "b": 0.0 } }"#,
    )?;
    assert!((settings.master_scale - 0.0254).abs() < 1e-6);
    assert_eq!(settings.error_color, Color::new(1.0, 0.5, 0.0));
    assert!(settings.flip_odd_parity);
    Ok(())
}

#[test]
fn sync_scale_must_be_positive() {
    for json in [r#"{ "master_scale": 0.0 }"#, r#"{ "master_scale": -2.0 }"#] {
        let err = SyncSettings::from_json_str(json).unwrap_err();
        assert_eq!(invalid_field(&err), Some("master_scale"));
    }
}

// ============================================================================
// Progress Text
// ============================================================================

#[test]
fn progress_text_matches_termination_policy() {
    let progress = Progress {
        passes: 12,
        elapsed: Duration::from_millis(800),
    };

    assert_eq!(progress_text(&Termination::None, progress), "Pass 12");
    assert_eq!(
        progress_text(&Termination::pass_count(100), progress),
        "Pass 12/100"
    );
    assert_eq!(
        progress_text(&Termination::wall_clock(Duration::from_secs(5)), progress),
        "Elapsed 0.8s/5.0s"
    );
}
