use appin_common::error::{AppinError, AppinResult};
use appin_config::OverviewTuning;
use appin_engine::config::parse_product_aliases;
use appin_engine::{ClassificationProfile, EngineConfig};
use chrono::TimeDelta;

/// Build the engine configuration from the `OVERVIEW_*` style settings.
pub fn engine_config(tuning: &OverviewTuning) -> AppinResult<EngineConfig> {
    let mut application = ClassificationProfile::application_by_name(&tuning.profile)
        .ok_or_else(|| {
            AppinError::Config(format!(
                "OVERVIEW_PROFILE must be `standard` or `legacy`, got `{}`",
                tuning.profile
            ))
        })?;

    if let Some(minutes) = tuning.fast_within_minutes {
        if minutes <= 0 {
            return Err(AppinError::Config(
                "FAST_WITHIN_MINUTES must be positive".to_string(),
            ));
        }
        let threshold = minutes_setting("FAST_WITHIN_MINUTES", minutes)?;
        application = application.with_speed_threshold(threshold);
    }

    if tuning.best_time_floor_secs < 0 {
        return Err(AppinError::Config(
            "BEST_TIME_FLOOR_SECS must not be negative".to_string(),
        ));
    }

    let mut config = EngineConfig {
        application,
        stale_after: minutes_setting("STALE_AFTER_MINUTES", tuning.stale_after_minutes)?,
        best_time_floor: TimeDelta::try_seconds(tuning.best_time_floor_secs)
            .ok_or_else(|| out_of_range("BEST_TIME_FLOOR_SECS"))?,
        ..EngineConfig::default()
    };

    if let Some(path) = &tuning.product_aliases_path {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppinError::Config(format!("cannot read PRODUCT_ALIASES_PATH {path}: {e}"))
        })?;
        config.product_aliases = parse_product_aliases(&raw).map_err(|e| {
            AppinError::Config(format!("invalid product aliases in {path}: {e}"))
        })?;
        tracing::info!(
            path,
            aliases = config.product_aliases.len(),
            "loaded product aliases"
        );
    }

    Ok(config)
}

fn minutes_setting(key: &str, minutes: i64) -> AppinResult<TimeDelta> {
    TimeDelta::try_minutes(minutes).ok_or_else(|| out_of_range(key))
}

fn out_of_range(key: &str) -> AppinError {
    AppinError::Config(format!("{key} is out of range"))
}
